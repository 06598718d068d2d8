//! Vault painting.
//!
//! A vault record supplies two parallel RLE glyph streams over the same
//! rectangle: terrain first, then monsters and objects. The painter
//! walks both row-major and interprets each glyph in place.

use crate::cave::CellFlags;
use crate::data::{vault_class, MonsterRace, VaultRecord};
use crate::feature::Feature;
use crate::generator::{GenerationError, Generator, SpecialLevel};
use crate::monster::AllocMode;
use crate::rng::RngMode;

impl Generator {
    /// Paint a vault centered on `(yval, xval)`.
    pub(crate) fn build_vault(
        &mut self,
        yval: i32,
        xval: i32,
        vault_index: usize,
    ) -> Result<(), GenerationError> {
        let vault = self
            .data
            .vaults
            .get(vault_index)
            .filter(|v| v.is_well_formed())
            .cloned()
            .ok_or(GenerationError::CorruptVault { index: vault_index })?;

        // Vaults are different even in persistent dungeons.
        let seeded = self.options.seed_dungeon.is_some();
        if seeded {
            self.rng.push_mode(RngMode::Stable);
        }
        self.paint_vault(yval, xval, &vault);
        if seeded {
            self.rng.pop_mode();
        }
        Ok(())
    }

    fn paint_vault(&mut self, yval: i32, xval: i32, vault: &VaultRecord) {
        let wid = i32::from(vault.wid);
        let hgt = i32::from(vault.hgt);
        let town_symbols = (vault_class::TOWN..=vault_class::TOWN + 2).contains(&vault.typ);
        let wild_symbols = vault.typ == vault_class::WILD;

        let mut mode = AllocMode::SLEEP;
        if vault.typ == vault_class::QUEST {
            mode |= AllocMode::QUEST;
        }

        // Terrain pass.
        let glyphs: Vec<char> = vault.text.expand().collect();
        for dy in 0..hgt {
            for dx in 0..wid {
                let glyph = glyphs[(dy * wid + dx) as usize];
                let y = yval - hgt / 2 + dy;
                let x = xval - wid / 2 + dx;
                if !self.cave.in_bounds(y, x) {
                    continue;
                }
                if glyph == ' ' || glyph == '-' {
                    continue;
                }

                self.cave.set_feat(y, x, Feature::Floor);
                self.cave.add_flags(y, x, CellFlags::ROOM);
                // The outer wall ring stays pierceable by tunnels; only
                // the interior is protected.
                if !town_symbols && !wild_symbols && glyph != '%' {
                    self.cave.add_flags(y, x, CellFlags::ICKY);
                }

                if let Some(digit) = glyph.to_digit(10) {
                    if digit < 8 {
                        self.cave.set_feat(y, x, Feature::shop(digit as u8));
                        continue;
                    }
                }
                if glyph.is_ascii_lowercase() {
                    self.cave
                        .set_feat(y, x, Feature::building(glyph as u8 - b'a'));
                    continue;
                }

                match glyph {
                    '%' => self.cave.set_feat(y, x, Feature::WallOuter),
                    '#' => self.cave.set_feat(y, x, Feature::WallInner),
                    ':' => self.cave.set_feat(y, x, Feature::Rubble),
                    '&' => self.cave.set_feat(y, x, Feature::Magma),
                    '$' => self.cave.set_feat(y, x, Feature::Quartz),
                    'X' => self.cave.set_feat(y, x, Feature::PermInner),
                    'Q' => self.cave.set_feat(y, x, Feature::QuestEnter),
                    'E' => self.cave.set_feat(y, x, Feature::QuestExit),
                    '<' => self.cave.set_feat(y, x, Feature::UpStairs),
                    '>' => self.cave.set_feat(y, x, Feature::DownStairs),
                    'O' => self.place_altar(y, x),
                    'A' => self.cave.set_feat(y, x, Feature::Grass),
                    'B' => self.cave.set_feat(y, x, Feature::Swamp),
                    'C' => self.cave.set_feat(y, x, Feature::Mud),
                    'H' => self.cave.set_feat(y, x, Feature::Shrub),
                    'I' => self.cave.set_feat(y, x, Feature::RockyHill),
                    'V' => self.cave.set_feat(y, x, Feature::ShallowWater),
                    'W' => self.cave.set_feat(y, x, Feature::DeepWater),
                    'J' => self.cave.set_feat(y, x, Feature::Fog),
                    'K' => self.cave.set_feat(y, x, Feature::ShallowLava),
                    'L' => self.cave.set_feat(y, x, Feature::DeepLava),
                    'F' => self.cave.set_feat(y, x, Feature::ChaosFog),
                    'Y' => self.cave.set_feat(y, x, Feature::Trees),
                    'M' => self.cave.set_feat(y, x, Feature::Mountain),
                    'S' => self.cave.set_feat(y, x, Feature::StoreExit),
                    'U' => self.cave.set_feat(y, x, Feature::Shaft),
                    ';' => {
                        // Glyphs of warding are always protected.
                        self.cave.add_flags(y, x, CellFlags::ICKY);
                        self.cave.set_feat(y, x, Feature::Glyph);
                    }
                    '*' => {
                        if self.rng.percent(50) {
                            self.place_trap(y, x);
                        }
                    }
                    '+' => self.place_secret_door(y, x),
                    'D' => {
                        // Town doors are unlocked.
                        let feat = if town_symbols {
                            Feature::DoorClosed
                        } else {
                            Feature::door(self.rng.rnd(4) as u8)
                        };
                        self.cave.set_feat(y, x, feat);
                    }
                    '^' => self.place_trap(y, x),
                    'G' => {
                        if vault.mon[0] != 0 {
                            crate::monster::place_monster_aux(
                                &mut self.cave,
                                &mut self.rng,
                                &self.data,
                                &mut self.monsters,
                                y,
                                x,
                                vault.mon[0],
                                mode,
                            );
                        }
                    }
                    _ => {}
                }
            }
        }

        // Monster and object pass.
        let glyphs: Vec<char> = vault.m_text.expand().collect();
        for dy in 0..hgt {
            for dx in 0..wid {
                let glyph = glyphs[(dy * wid + dx) as usize];
                let y = yval - hgt / 2 + dy;
                let x = xval - wid / 2 + dx;
                if !self.cave.in_bounds(y, x) {
                    continue;
                }
                if glyph == ' ' || glyph == '-' {
                    continue;
                }

                if let Some(digit) = glyph.to_digit(10) {
                    let race = vault.mon[digit as usize];
                    crate::monster::place_monster_aux(
                        &mut self.cave,
                        &mut self.rng,
                        &self.data,
                        &mut self.monsters,
                        y,
                        x,
                        race,
                        mode,
                    );
                    continue;
                }

                if glyph.is_ascii_alphabetic() {
                    // Restrict selection to races displayed as this letter.
                    let level = self.player.depth;
                    let restrict = move |r: &MonsterRace| r.d_char == glyph;
                    let race = crate::monster::get_mon_num(
                        &mut self.rng,
                        &self.data,
                        level,
                        false,
                        Some(&restrict),
                    );
                    if let Some(race) = race {
                        crate::monster::place_monster_aux(
                            &mut self.cave,
                            &mut self.rng,
                            &self.data,
                            &mut self.monsters,
                            y,
                            x,
                            race,
                            mode,
                        );
                    }
                    continue;
                }

                if "!\"$(),~'/=?[\\]_{|}".contains(glyph) {
                    // An object drawn with this picture.
                    self.place_object(y, x, false, false);
                    continue;
                }

                match glyph {
                    '*' => {
                        if self.rng.percent(50) {
                            self.place_object(y, x, false, false);
                        }
                    }
                    '.' => {
                        // Probabilistic treasure: mostly plain, sometimes
                        // good, rarely great.
                        if self.rng.percent(75) {
                            self.place_object(y, x, false, false);
                        } else if self.rng.percent(80) {
                            self.place_object(y, x, true, false);
                        } else {
                            self.place_object(y, x, true, true);
                        }
                    }
                    '&' => self.place_vault_monster(y, x, 5, mode),
                    ';' => self.place_vault_monster(y, x, 11, mode),
                    '#' => {
                        self.place_vault_monster(y, x, 9, mode);
                        self.place_object(y, x, true, false);
                    }
                    '^' => {
                        self.place_vault_monster(y, x, 40, mode);
                        self.place_object(y, x, true, true);
                    }
                    ':' => {
                        if self.rng.percent(50) {
                            self.place_vault_monster(y, x, 3, mode);
                        }
                        if self.rng.percent(50) {
                            self.place_object(y, x, false, false);
                        }
                    }
                    '@' => {
                        if self.player.inside_special != Some(SpecialLevel::Wild)
                            || self.vault_place_player
                        {
                            self.player.py = y;
                            self.player.px = x;
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    /// A monster placed `boost` levels out of depth.
    fn place_vault_monster(&mut self, y: i32, x: i32, boost: i32, mode: AllocMode) {
        let level = self.player.depth + boost;
        crate::monster::place_monster(
            &mut self.cave,
            &mut self.rng,
            &self.data,
            &mut self.monsters,
            y,
            x,
            level,
            mode,
        );
    }

    /// Pick a random vault record of a class; bounded scan.
    pub(crate) fn pick_vault(&mut self, typ: u8) -> Option<usize> {
        let count = self.data.vaults.len();
        if count == 0 {
            return None;
        }
        for _ in 0..1000 {
            let index = self.rng.rn2(count as u32) as usize;
            if self.data.vaults[index].typ == typ {
                return Some(index);
            }
        }
        None
    }

    /// Vaults bump the rating and usually trip the special feeling at
    /// shallow depths.
    fn vault_feeling(&mut self, rat: i16) {
        self.rating += i32::from(rat);
        let depth = self.player.depth;
        if depth <= 50 || self.rng.rnd(((depth - 40) * (depth - 40) + 1) as u32) < 400 {
            self.good_item_flag = true;
        }
    }

    /// Type 7: lesser vault.
    pub(crate) fn build_type7(&mut self, yval: i32, xval: i32) {
        if let Some(index) = self.pick_vault(vault_class::LESSER) {
            log::debug!("lesser vault {index}");
            let rat = self.data.vaults[index].rat;
            self.vault_feeling(rat);
            let _ = self.build_vault(yval, xval, index);
        }
    }

    /// Type 8: greater vault.
    pub(crate) fn build_type8(&mut self, yval: i32, xval: i32) {
        if let Some(index) = self.pick_vault(vault_class::GREATER) {
            log::debug!("greater vault {index}");
            let rat = self.data.vaults[index].rat;
            self.vault_feeling(rat);
            let _ = self.build_vault(yval, xval, index);
        }
    }

    /// Type 9: themed vault.
    pub(crate) fn build_type9(&mut self, yval: i32, xval: i32) {
        if let Some(index) = self.pick_vault(vault_class::THEMED) {
            log::debug!("themed vault {index}");
            let rat = self.data.vaults[index].rat;
            self.vault_feeling(rat);
            let _ = self.build_vault(yval, xval, index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::GameData;
    use crate::generator::GenOptions;

    fn granite_generator(depth: i32, seed: u64) -> Generator {
        let mut generator = Generator::new(GameData::sample(), GenOptions::default(), seed);
        generator.player.depth = depth;
        generator.cave.wipe(Feature::WallExtra);
        generator
    }

    #[test]
    fn lesser_vault_paints_icky_interior() {
        let mut generator = granite_generator(8, 21);
        generator.build_type7(30, 90);
        let mut icky = 0;
        let mut doors = 0;
        for y in 25..36 {
            for x in 80..101 {
                if generator.cave.has_flag(y, x, CellFlags::ICKY) {
                    icky += 1;
                }
                if generator.cave.feat(y, x) == Feature::SecretDoor {
                    doors += 1;
                }
            }
        }
        assert!(icky > 0, "vault interiors are protected");
        assert!(doors >= 1, "the lesser vault has secret entries");
        assert!(generator.rating >= 10);
    }

    #[test]
    fn corrupt_vault_is_rejected() {
        let mut generator = granite_generator(8, 3);
        let mut bad = generator.data.vaults[2].clone();
        bad.wid += 1;
        generator.data.vaults.push(bad);
        let index = generator.data.vaults.len() - 1;
        assert!(matches!(
            generator.build_vault(30, 90, index),
            Err(GenerationError::CorruptVault { .. })
        ));
    }

    #[test]
    fn quest_vault_places_the_player() {
        let mut generator = granite_generator(12, 5);
        // Vault 6 is the quest lair with an `@` position.
        generator.build_vault(33, 99, 6).expect("well formed");
        assert_ne!((generator.player.py, generator.player.px), (0, 0));
        // The player landed inside the vault rectangle.
        assert!((generator.player.py - 33).abs() <= 4);
        assert!((generator.player.px - 99).abs() <= 6);
    }

    #[test]
    fn digit_glyphs_use_race_fixups() {
        let mut generator = granite_generator(10, 7);
        // Vault 4 (themed) maps digit 0 to race 2.
        generator.build_vault(33, 99, 4).expect("well formed");
        let fixed = generator
            .monsters
            .iter_live()
            .filter(|(_, m)| m.race == 2)
            .count();
        assert!(fixed >= 1, "the digit glyph spawned its fixed race");
    }

    #[test]
    fn pick_vault_finds_each_class() {
        let mut generator = granite_generator(10, 9);
        for class in [
            vault_class::LESSER,
            vault_class::GREATER,
            vault_class::THEMED,
            vault_class::TOWN,
            vault_class::WILD,
            vault_class::QUEST,
        ] {
            let found = generator.pick_vault(class);
            assert!(found.is_some(), "no vault of class {class}");
            assert_eq!(generator.data.vaults[found.unwrap()].typ, class);
        }
    }
}
