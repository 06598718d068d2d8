//! Painting and allocation primitives shared by every builder.

use crate::cave::CellFlags;
use crate::consts::{
    DUN_STR_DEN, DUN_STR_DWLW, DUN_STR_RNG, DUN_STR_WLW, MAX_DEPTH,
};
use crate::feature::{Feature, MAX_GODS};
use crate::generator::{Generator, SpecialLevel};
use crate::geom::{distance, DDD};
use crate::monster::AllocMode;
use crate::object::ObjectKind;

/// Where an allocation pass may land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocSet {
    Corridor,
    Room,
    Both,
}

/// What an allocation pass drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocKind {
    Rubble,
    Trap,
    Object,
    Altar,
}

impl Generator {
    /// Whether this level should roll lit rooms: shallow levels mostly.
    pub(crate) fn roll_room_light(&mut self) -> bool {
        self.player.depth <= self.rng.rnd(25) as i32
    }

    pub(crate) fn place_rubble(&mut self, y: i32, x: i32) {
        self.cave.set_feat(y, x, Feature::Rubble);
    }

    pub(crate) fn place_up_stairs(&mut self, y: i32, x: i32) {
        self.cave.set_feat(y, x, Feature::UpStairs);
    }

    pub(crate) fn place_down_stairs(&mut self, y: i32, x: i32) {
        let feat = if self.player.inside_special == Some(SpecialLevel::Wild) {
            Feature::Shaft
        } else {
            Feature::DownStairs
        };
        self.cave.set_feat(y, x, feat);
    }

    /// Place stairs in the legal direction for this level. Bonus stairs
    /// always lead down so the up-stair count stays within its budget.
    pub(crate) fn place_random_stairs(&mut self, y: i32, x: i32) {
        if !self.cave.is_clean(y, x) {
            return;
        }
        if self.player.depth == 0 {
            self.place_down_stairs(y, x);
        } else if self.player.inside_special.is_some() || self.player.depth >= MAX_DEPTH - 1 {
            self.place_up_stairs(y, x);
        } else {
            self.place_down_stairs(y, x);
        }
    }

    /// Place an altar whose deity suits the depth: rare deities demand
    /// deep dungeons. The scan is bounded; deity zero is the fallback.
    pub(crate) fn place_altar(&mut self, y: i32, x: i32) {
        let gods = (self.data.deities.len() as u32).min(MAX_GODS);
        if gods == 0 {
            return;
        }
        let mut chosen = 0;
        for _ in 0..1000 {
            let alt = self.rng.rn2(gods);
            let rarity = u32::from(self.data.deities[alt as usize].rarity % 4);
            if self.player.depth < self.rng.randnor(rarity as i32 * 10, 3) {
                continue;
            }
            if self.rng.rn2(rarity) > 0 {
                continue;
            }
            chosen = alt;
            break;
        }
        self.cave.set_feat(y, x, Feature::altar(chosen));
    }

    pub(crate) fn place_locked_door(&mut self, y: i32, x: i32) {
        let power = self.rng.rnd(7) as u8;
        self.cave.set_feat(y, x, Feature::door(power));
    }

    pub(crate) fn place_secret_door(&mut self, y: i32, x: i32) {
        self.cave.set_feat(y, x, Feature::SecretDoor);
    }

    /// Sample the door-state distribution: open 30%, broken 10%,
    /// secret 20%, closed 30%, locked 9.9%, jammed 0.1%.
    pub(crate) fn place_random_door(&mut self, y: i32, x: i32) {
        let roll = self.rng.rn2(1000);
        let feat = if roll < 300 {
            Feature::OpenDoor
        } else if roll < 400 {
            Feature::BrokenDoor
        } else if roll < 600 {
            Feature::SecretDoor
        } else if roll < 900 {
            Feature::DoorClosed
        } else if roll < 999 {
            Feature::door(self.rng.rnd(7) as u8)
        } else {
            Feature::door(8 + self.rng.rn2(8) as u8)
        };
        self.cave.set_feat(y, x, feat);
    }

    /// Drop a random trap feature.
    pub(crate) fn place_trap(&mut self, y: i32, x: i32) {
        if !self.cave.is_naked(y, x) {
            return;
        }
        let traps = [
            Feature::TrapTrapdoor,
            Feature::TrapPit,
            Feature::TrapDart,
            Feature::TrapFire,
            Feature::TrapAcid,
            Feature::TrapTeleport,
            Feature::TrapSummon,
            Feature::TrapRune,
        ];
        let mut feat = traps[self.rng.rn2(traps.len() as u32) as usize];
        // No trapdoors where there is no level below.
        if feat == Feature::TrapTrapdoor
            && (self.player.depth >= MAX_DEPTH - 1 || self.player.inside_special.is_some())
        {
            feat = Feature::TrapPit;
        }
        self.cave.set_feat(y, x, feat);
    }

    /// Drop an object of the requested quality.
    pub(crate) fn place_object(&mut self, y: i32, x: i32, good: bool, great: bool) {
        if !self.cave.in_bounds(y, x) || !self.cave.is_floor(y, x) {
            return;
        }
        let kind = if !good && self.rng.percent(5) {
            ObjectKind::Chest
        } else {
            ObjectKind::Item { good, great }
        };
        self.objects.carry(&mut self.cave, y, x, kind);
    }

    /// Drop a small pile of gold.
    pub(crate) fn place_gold_small(&mut self, y: i32, x: i32) {
        if !self.cave.in_bounds(y, x) || !self.cave.is_floor(y, x) {
            return;
        }
        let amount = self.rng.rnd(100) as i32;
        self.objects
            .carry(&mut self.cave, y, x, ObjectKind::Gold { amount });
    }

    /// Place `num` staircases on naked grids with at least `walls`
    /// adjacent walls, relaxing the wall requirement when a pass of
    /// tries fails. Fog backgrounds force stairs into rooms.
    pub(crate) fn alloc_stairs(&mut self, feat: Feature, num: u32, walls: i32, force_room: bool) {
        for _ in 0..num {
            let mut walls = walls;
            'placed: loop {
                for _ in 0..3000 {
                    let y = self.rng.rn2(self.cave.height() as u32) as i32;
                    let x = self.rng.rn2(self.cave.width() as u32) as i32;
                    if !self.cave.is_naked(y, x) {
                        continue;
                    }
                    if force_room && !self.cave.has_flag(y, x, CellFlags::ROOM) {
                        continue;
                    }
                    if !self.cave.in_bounds_fully(y, x) {
                        continue;
                    }
                    if self.cave.next_to_walls(y, x) < walls {
                        continue;
                    }
                    if self.player.depth == 0 {
                        self.place_down_stairs(y, x);
                    } else if matches!(self.player.inside_special, Some(SpecialLevel::Quest(_)))
                        || self.player.depth >= MAX_DEPTH - 1
                    {
                        self.place_up_stairs(y, x);
                    } else {
                        self.cave.set_feat(y, x, feat);
                    }
                    break 'placed;
                }
                if walls > 0 {
                    walls -= 1;
                } else {
                    // Nothing qualified anywhere; give up on this stair.
                    break;
                }
            }
        }
    }

    /// Scatter `num` things of one kind over legal grids.
    pub(crate) fn alloc_object(&mut self, set: AllocSet, kind: AllocKind, num: u32) {
        for _ in 0..num {
            let mut spot = None;
            for _ in 0..10_000 {
                let y = self.rng.rn2(self.cave.height() as u32) as i32;
                let x = self.rng.rn2(self.cave.width() as u32) as i32;
                if !self.cave.is_naked(y, x) {
                    continue;
                }
                let room = self.cave.has_flag(y, x, CellFlags::ROOM);
                if set == AllocSet::Corridor && room {
                    continue;
                }
                if set == AllocSet::Room && !room {
                    continue;
                }
                spot = Some((y, x));
                break;
            }
            let Some((y, x)) = spot else {
                return;
            };
            match kind {
                AllocKind::Rubble => self.place_rubble(y, x),
                AllocKind::Trap => self.place_trap(y, x),
                AllocKind::Object => self.place_object(y, x, false, false),
                AllocKind::Altar => self.place_altar(y, x),
            }
        }
    }

    /// Carve a mineral streamer through granite, with the occasional
    /// treasure grid.
    pub(crate) fn build_streamer(&mut self, feat: Feature, treasure_chance: u32, max_len: u32) {
        let mut y = self.rng.rand_range(1, self.cave.height() - 2);
        let mut x = self.rng.rand_range(1, self.cave.width() - 2);
        let dir = DDD[self.rng.rn2(8) as usize];

        for _ in 0..max_len {
            for _ in 0..DUN_STR_DEN {
                let ty = self.rng.rand_spread(y, DUN_STR_RNG);
                let tx = self.rng.rand_spread(x, DUN_STR_RNG);
                if !self.cave.in_bounds(ty, tx) {
                    continue;
                }
                // Only plain granite converts to vein.
                let cur = self.cave.feat(ty, tx);
                if !cur.is_granite_or_harder() || cur.is_perma() {
                    continue;
                }
                if cur == Feature::WallSolid {
                    continue;
                }
                let mut vein = feat;
                if self.rng.one_in(treasure_chance) {
                    vein = vein.with_treasure();
                }
                self.cave.set_feat(ty, tx, vein);
            }
            y += dir.0;
            x += dir.1;
            if !self.cave.in_bounds(y, x) {
                break;
            }
        }
    }

    /// Carve a nature streamer (water, lava, trees, fog, oil, ice,
    /// acid), or pool it when the deep variant rolls a pond.
    pub(crate) fn build_streamer2(&mut self, feat: Feature, killwall: bool) {
        let poolchance = self.rng.rnd(10);
        let mut y = self.rng.rand_spread(self.cave.height() / 2, 10);
        let mut x = self.rng.rand_spread(self.cave.width() / 2, 15);
        let mut dir = DDD[self.rng.rn2(8) as usize];

        let pooling = matches!(
            feat,
            Feature::DeepWater | Feature::DeepLava | Feature::ChaosFog
        ) && poolchance <= 2;

        if !pooling {
            loop {
                for _ in 0..=DUN_STR_DWLW {
                    let ty = self.rng.rand_spread(y, DUN_STR_WLW);
                    let tx = self.rng.rand_spread(x, DUN_STR_WLW);
                    if !self.cave.in_bounds(ty, tx) {
                        continue;
                    }
                    if !self.streamer2_may_write(ty, tx, killwall) {
                        continue;
                    }
                    self.cave.set_feat(ty, tx, feat);
                }
                y += dir.0;
                x += dir.1;
                if self.rng.one_in(20) {
                    dir = DDD[self.rng.rn2(8) as usize];
                }
                if !self.cave.in_bounds(y, x) {
                    break;
                }
            }
        } else {
            // A roughly diamond-shaped pond.
            let poolsize = 5 + self.rng.rnd(10) as i32;
            let mid = poolsize / 2;
            for i in 0..poolsize {
                for j in 0..poolsize {
                    let ty = y + i;
                    let tx = x + j;
                    if !self.cave.in_bounds(ty, tx) {
                        continue;
                    }
                    if i < mid {
                        if j < mid {
                            if i + j + 1 < mid {
                                continue;
                            }
                        } else if j > mid + i {
                            continue;
                        }
                    } else if j < mid {
                        if i > mid + j {
                            continue;
                        }
                    } else if i + j > mid * 3 - 1 {
                        continue;
                    }
                    if !self.streamer2_may_write(ty, tx, true) {
                        continue;
                    }
                    self.cave.set_feat(ty, tx, feat);
                }
            }
        }
    }

    fn streamer2_may_write(&self, y: i32, x: i32, killwall: bool) -> bool {
        if self.cave.has_flag(y, x, CellFlags::ICKY) {
            return false;
        }
        let cur = self.cave.feat(y, x);
        if cur.is_stairs() {
            return false;
        }
        let floor_limit = if killwall {
            // Anything at or above the permanent band is off-limits.
            Feature::PermExtra.repr()
        } else {
            // Anything at or above the vein band is off-limits.
            Feature::Magma.repr()
        };
        cur.repr() < floor_limit
    }

    /// Perturb the level with a few spherical explosions of mixed rock.
    pub(crate) fn destroy_level(&mut self) {
        log::debug!("destroyed level");
        for _ in 0..self.rng.rnd(5) {
            let x1 = self.rng.rand_range(5, self.cave.width() - 6);
            let y1 = self.rng.rand_range(5, self.cave.height() - 6);

            for y in (y1 - 15)..=(y1 + 15) {
                for x in (x1 - 15)..=(x1 + 15) {
                    if !self.cave.in_bounds_fully(y, x) {
                        continue;
                    }
                    if distance(y1, x1, y, x) >= 16 {
                        continue;
                    }
                    let m_idx = self.cave.monster_at(y, x);
                    if m_idx != 0 {
                        self.monsters.kill(m_idx);
                        self.cave.set_monster(y, x, 0);
                    }
                    if !self.cave.is_valid_for_rewrite(y, x) {
                        continue;
                    }
                    self.objects.remove_at(&mut self.cave, y, x);
                    let t = self.rng.rn2(200);
                    let feat = if t < 20 {
                        Feature::WallExtra
                    } else if t < 70 {
                        Feature::Quartz
                    } else if t < 100 {
                        Feature::Magma
                    } else {
                        Feature::Floor
                    };
                    self.cave.set_feat(y, x, feat);
                    self.cave.remove_flags(
                        y,
                        x,
                        CellFlags::ROOM | CellFlags::ICKY | CellFlags::MARK | CellFlags::GLOW,
                    );
                }
            }
        }
    }

    /// Drop up to `num` objects on clean grids near a point.
    pub(crate) fn vault_objects(&mut self, y: i32, x: i32, num: u32) {
        for _ in 0..num {
            for _ in 0..11 {
                let j = self.rng.rand_spread(y, 2);
                let k = self.rng.rand_spread(x, 3);
                if !self.cave.in_bounds(j, k) || !self.cave.is_clean(j, k) {
                    continue;
                }
                self.place_object(j, k, false, false);
                break;
            }
        }
    }

    /// Scatter `num` traps around a point.
    pub(crate) fn vault_traps(&mut self, y: i32, x: i32, yd: i32, xd: i32, num: u32) {
        for _ in 0..num {
            for _ in 0..6 {
                let y1 = self.rng.rand_spread(y, yd);
                let x1 = self.rng.rand_spread(x, xd);
                if !self.cave.in_bounds(y1, x1) || !self.cave.is_naked(y1, x1) {
                    continue;
                }
                self.place_trap(y1, x1);
                break;
            }
        }
    }

    /// Place sleeping monsters near a point, two levels out of depth.
    pub(crate) fn vault_monsters(&mut self, y: i32, x: i32, mode: AllocMode) {
        let level = self.player.depth + 2;
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

    /// Densify traps around collected door positions.
    pub(crate) fn place_traps_near_doors(&mut self, chance: u32) {
        for i in 0..self.dun.door.len() {
            let (y, x) = self.dun.door[i];
            for (dy, dx) in DDD {
                if !self.rng.percent(chance) {
                    continue;
                }
                let ty = y + dy;
                let tx = x + dx;
                if self.cave.in_bounds(ty, tx) && self.cave.is_naked(ty, tx) {
                    self.place_trap(ty, tx);
                }
            }
        }
    }

    /// Densify traps around chests anywhere on the level.
    pub(crate) fn place_traps_near_chests(&mut self, chance: u32) {
        let mut chest_cells = Vec::new();
        for y in 0..self.cave.height() {
            for x in 0..self.cave.width() {
                if self
                    .objects
                    .any_at(&self.cave, y, x, |o| o.kind == ObjectKind::Chest)
                {
                    chest_cells.push((y, x));
                }
            }
        }
        for (y, x) in chest_cells {
            for (dy, dx) in DDD {
                if !self.rng.percent(chance) {
                    continue;
                }
                let ty = y + dy;
                let tx = x + dx;
                if self.cave.in_bounds(ty, tx) && self.cave.is_naked(ty, tx) {
                    self.place_trap(ty, tx);
                }
            }
        }
    }

    /// Place a sleeping guard at a post.
    pub(crate) fn place_guard(&mut self, y: i32, x: i32, post: crate::patrol::GuardPost) {
        let level = self.player.depth;
        let placed = crate::monster::place_monster(
            &mut self.cave,
            &mut self.rng,
            &self.data,
            &mut self.monsters,
            y,
            x,
            level,
            AllocMode::SLEEP | AllocMode::JUST_ONE,
        );
        if let Some(m_idx) = placed {
            crate::patrol::setup_guard_post(&mut self.cave, &mut self.monsters, m_idx, post, y, x);
        }
    }

    /// Place a patrolling monster.
    pub(crate) fn place_patrol(&mut self, y: i32, x: i32, kind: crate::patrol::PatrolKind) {
        let level = self.player.depth;
        let placed = crate::monster::place_monster(
            &mut self.cave,
            &mut self.rng,
            &self.data,
            &mut self.monsters,
            y,
            x,
            level,
            AllocMode::SLEEP | AllocMode::JUST_ONE,
        );
        if let Some(m_idx) = placed {
            crate::patrol::setup_monster_patrol(
                &self.cave,
                &mut self.rng,
                &mut self.monsters,
                m_idx,
                kind,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::GameData;
    use crate::generator::GenOptions;

    fn generator() -> Generator {
        let mut generator = Generator::new(GameData::sample(), GenOptions::default(), 31);
        generator.player.depth = 5;
        for y in 1..generator.cave.height() - 1 {
            for x in 1..generator.cave.width() - 1 {
                generator.cave.set_feat(y, x, Feature::Floor);
            }
        }
        generator
    }

    #[test]
    fn door_distribution_shape() {
        let mut generator = generator();
        let mut open = 0;
        let mut secret = 0;
        let mut closedish = 0;
        for _ in 0..2000 {
            generator.place_random_door(10, 10);
            let feat = generator.cave.feat(10, 10);
            match feat {
                Feature::OpenDoor | Feature::BrokenDoor => open += 1,
                Feature::SecretDoor => secret += 1,
                f if f.is_closed_door() => closedish += 1,
                other => panic!("unexpected door feature {other:?}"),
            }
        }
        // Expected: 40% open/broken, 20% secret, 40% closed/locked/jammed.
        assert!((600..=1000).contains(&open), "open {open}");
        assert!((250..=550).contains(&secret), "secret {secret}");
        assert!((600..=1000).contains(&closedish), "closedish {closedish}");
    }

    #[test]
    fn stairs_follow_level_kind() {
        let mut generator = generator();
        generator.player.depth = 0;
        generator.place_random_stairs(5, 5);
        assert_eq!(generator.cave.feat(5, 5), Feature::DownStairs);

        generator.player.depth = MAX_DEPTH - 1;
        generator.place_random_stairs(6, 6);
        assert_eq!(generator.cave.feat(6, 6), Feature::UpStairs);
    }

    #[test]
    fn wild_down_stairs_become_shafts() {
        let mut generator = generator();
        generator.player.depth = 0;
        generator.player.inside_special = Some(SpecialLevel::Wild);
        generator.place_down_stairs(7, 7);
        assert_eq!(generator.cave.feat(7, 7), Feature::Shaft);
    }

    #[test]
    fn streamer_only_eats_granite() {
        let mut generator = generator();
        generator.cave.wipe(Feature::WallExtra);
        generator.cave.set_feat(30, 30, Feature::PermSolid);
        for _ in 0..10 {
            generator.build_streamer(Feature::Magma, 90, 64);
        }
        assert_eq!(generator.cave.feat(30, 30), Feature::PermSolid);
        let magma = generator
            .cave
            .feature_stream()
            .iter()
            .filter(|&&f| {
                f == Feature::Magma.repr() || f == Feature::MagmaTreasure.repr()
            })
            .count();
        assert!(magma > 0, "streamers should carve magma");
    }

    #[test]
    fn streamer2_respects_vaults() {
        let mut generator = generator();
        for y in 20..30 {
            for x in 20..30 {
                generator.cave.add_flags(y, x, CellFlags::ICKY);
            }
        }
        for _ in 0..30 {
            generator.build_streamer2(Feature::ShallowWater, false);
        }
        for y in 20..30 {
            for x in 20..30 {
                assert_ne!(generator.cave.feat(y, x), Feature::ShallowWater);
            }
        }
    }

    #[test]
    fn destroy_level_strips_flags_and_rewrites() {
        let mut generator = generator();
        for y in 1..generator.cave.height() - 1 {
            for x in 1..generator.cave.width() - 1 {
                generator.cave.add_flags(y, x, CellFlags::ROOM | CellFlags::GLOW);
            }
        }
        generator.destroy_level();
        let stripped = (1..generator.cave.height() - 1)
            .flat_map(|y| (1..generator.cave.width() - 1).map(move |x| (y, x)))
            .filter(|&(y, x)| generator.cave.flags(y, x).is_empty())
            .count();
        assert!(stripped > 0, "at least one epicenter fired");
    }

    #[test]
    fn alloc_stairs_places_the_requested_count() {
        let mut generator = generator();
        generator.player.depth = 5;
        generator.alloc_stairs(Feature::UpStairs, 2, 3, false);
        let ups = generator
            .cave
            .feature_stream()
            .iter()
            .filter(|&&f| f == Feature::UpStairs.repr())
            .count();
        assert_eq!(ups, 2);
    }

    #[test]
    fn altar_lands_in_the_altar_band() {
        let mut generator = generator();
        generator.place_altar(12, 12);
        assert!(generator.cave.feat(12, 12).is_altar());
    }
}
