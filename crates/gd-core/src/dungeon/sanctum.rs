//! Sanctums and follies.
//!
//! A sanctum is a sealed chamber whose door opens only through one of
//! three puzzles: an echo lock of runes pressed in order, a flow conduit
//! drained by two levers, or a mirror alignment beam. The reward chamber
//! sits behind a second seal that opens with the first. A folly is the
//! opposite idea: a huge open hall stuffed with a horde.

use serde::{Deserialize, Serialize};

use crate::cave::CellFlags;
use crate::feature::Feature;
use crate::generator::Generator;
use crate::geom::los;
use crate::monster::AllocMode;

/// Puzzle state for the current level's sanctum.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PuzzleState {
    /// Rune order for the echo lock; empty when no sanctum exists.
    solution: Vec<u8>,
    /// Next rune expected.
    next: usize,
    /// Lever positions for the flow conduit.
    levers: [bool; 2],
}

impl PuzzleState {
    pub fn reset(&mut self) {
        self.solution.clear();
        self.next = 0;
        self.levers = [false, false];
    }

    pub fn solution(&self) -> &[u8] {
        &self.solution
    }
}

/// What touching a rune did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuneOutcome {
    /// Right rune; the sequence continues.
    Advanced,
    /// Right rune and the sequence is complete; the seal opened.
    Opened,
    /// Wrong rune; the sequence restarts and backlash hits.
    Backlash,
    /// Not a rune grid.
    Ignored,
}

impl Generator {
    /// Build the sanctum: sanctum-walled shell, puzzle forecourt, sealed
    /// reward chamber, and a hint idol in the corner.
    pub(crate) fn build_sanctum_vault(&mut self, y: i32, x: i32) {
        let y1 = y - 6;
        let y2 = y + 6;
        let x1 = x - 10;
        let x2 = x + 10;

        if !self.cave.in_bounds(y1, x1) || !self.cave.in_bounds(y2, x2) {
            return;
        }

        for iy in y1..=y2 {
            for ix in x1..=x2 {
                self.cave.set_feat(iy, ix, Feature::Floor);
                self.cave.add_flags(iy, ix, CellFlags::ROOM | CellFlags::GLOW);
                if iy > y1 && iy < y2 && ix > x1 && ix < x2 {
                    self.cave.add_flags(iy, ix, CellFlags::ICKY);
                }
            }
        }
        for iy in y1..=y2 {
            self.cave.set_feat(iy, x1, Feature::SanctumWall);
            self.cave.set_feat(iy, x2, Feature::SanctumWall);
        }
        for ix in x1..=x2 {
            self.cave.set_feat(y1, ix, Feature::SanctumWall);
            self.cave.set_feat(y2, ix, Feature::SanctumWall);
        }
        // A pierceable gate into the forecourt; the divider still seals
        // the reward side.
        for iy in (y - 1)..=(y + 1) {
            self.cave.set_feat(iy, x1, Feature::WallOuter);
        }

        // Inner reward chamber, sealed like the divider.
        let ry1 = y - 2;
        let ry2 = y + 2;
        let rx1 = x - 3;
        let rx2 = x + 3;
        for iy in ry1..=ry2 {
            self.cave.set_feat(iy, rx1, Feature::WallInner);
            self.cave.set_feat(iy, rx2, Feature::WallInner);
        }
        for ix in rx1..=rx2 {
            self.cave.set_feat(ry1, ix, Feature::WallInner);
            self.cave.set_feat(ry2, ix, Feature::WallInner);
        }
        self.cave.set_feat(y, rx1, Feature::SanctumDoor);

        // Divider between forecourt and the rest.
        let div_x = x - 4;
        for iy in (y1 + 1)..y2 {
            self.cave.set_feat(iy, div_x, Feature::SanctumWall);
        }
        self.cave.set_feat(y, div_x, Feature::SanctumDoor);

        // One of the three puzzles, in the forecourt.
        let puzzle_center_x = x1 + (div_x - x1) / 2;
        self.puzzle.reset();
        match self.rng.rn2(3) {
            0 => self.build_echo_lock(y, puzzle_center_x),
            1 => self.build_flow_conduit(y, puzzle_center_x),
            _ => self.build_mirror_alignment(y, puzzle_center_x),
        }

        // The reward.
        let rx = x + 1;
        match self.rng.rn2(5) {
            0 => self.place_object(y, rx, true, true),
            1 => {
                self.place_object(y, rx, true, true);
                self.place_object(y, rx + 1, true, true);
            }
            2 => self.place_object(y, rx, true, true),
            3 => self.place_object(y, rx, false, false),
            _ => self.cave.set_feat(y, rx, Feature::DreamPortal),
        }

        self.cave.set_feat(y1 + 1, x1 + 1, Feature::WhisperingIdol);
        self.rating += 40;
    }

    /// Echo lock: 3-5 runes near the forecourt center, pressed in a
    /// shuffled order.
    fn build_echo_lock(&mut self, y: i32, x: i32) {
        let num_runes = 3 + self.rng.rn2(3) as usize;
        for i in 0..num_runes {
            for _ in 0..100 {
                let ry = self.rng.rand_spread(y, 3);
                let rx = self.rng.rand_spread(x, 3);
                if self.cave.in_bounds(ry, rx) && self.cave.is_clean(ry, rx) {
                    self.cave.set_feat(ry, rx, Feature::rune(i as u8));
                    break;
                }
            }
        }
        let mut order: Vec<u8> = (0..num_runes as u8).collect();
        self.rng.shuffle(&mut order);
        self.puzzle.solution = order;
        self.puzzle.next = 0;
    }

    /// Flow conduit: two levers; both must be pulled to drain the acid.
    fn build_flow_conduit(&mut self, y: i32, x: i32) {
        for i in 0..2 {
            for _ in 0..100 {
                let ly = self.rng.rand_spread(y, 3);
                let lx = self.rng.rand_spread(x, 3);
                if self.cave.in_bounds(ly, lx) && self.cave.is_clean(ly, lx) {
                    let feat = if i == 0 {
                        Feature::LeverLeft
                    } else {
                        Feature::LeverRight
                    };
                    self.cave.set_feat(ly, lx, feat);
                    break;
                }
            }
        }
        self.cave.set_feat_checked(y, x - 1, Feature::FlowAcid);
        self.cave.set_feat_checked(y, x + 1, Feature::FlowAcid);
    }

    /// Mirror alignment: emitter above, crystal below, pressure plate on
    /// the beam line.
    fn build_mirror_alignment(&mut self, y: i32, x: i32) {
        self.cave.set_feat_checked(y - 2, x, Feature::Emitter);
        self.cave.set_feat_checked(y + 2, x, Feature::Crystal);
        self.cave.set_feat_checked(y, x, Feature::MirrorPlate);
    }

    /// Convert every sanctum seal on the level to floor.
    pub fn open_sanctum_door(&mut self) -> bool {
        let mut opened = false;
        for y in 0..self.cave.height() {
            for x in 0..self.cave.width() {
                if self.cave.feat(y, x) == Feature::SanctumDoor {
                    self.cave.set_feat(y, x, Feature::Floor);
                    opened = true;
                }
            }
        }
        if opened {
            log::debug!("the sanctum seal fades away");
        }
        opened
    }

    /// Touch a rune of the echo lock.
    pub fn handle_rune(&mut self, y: i32, x: i32) -> RuneOutcome {
        let feat = self.cave.feat(y, x);
        let rune_id = feat.repr().wrapping_sub(Feature::RuneA.repr());
        if rune_id > 4 {
            return RuneOutcome::Ignored;
        }
        if self.puzzle.solution.get(self.puzzle.next) == Some(&rune_id) {
            self.puzzle.next += 1;
            if self.puzzle.next >= self.puzzle.solution.len() {
                self.open_sanctum_door();
                self.puzzle.reset();
                return RuneOutcome::Opened;
            }
            RuneOutcome::Advanced
        } else {
            self.puzzle.next = 0;
            RuneOutcome::Backlash
        }
    }

    /// Pull a lever of the flow conduit. Returns true when the conduit
    /// drained and the seal opened.
    pub fn handle_lever(&mut self, y: i32, x: i32) -> bool {
        match self.cave.feat(y, x) {
            Feature::LeverLeft => self.puzzle.levers[0] = !self.puzzle.levers[0],
            Feature::LeverRight => self.puzzle.levers[1] = !self.puzzle.levers[1],
            _ => return false,
        }
        if self.puzzle.levers[0] && self.puzzle.levers[1] {
            // Drain the acid nearby.
            for dy in -5..=5 {
                for dx in -5..=5 {
                    let ty = y + dy;
                    let tx = x + dx;
                    if self.cave.in_bounds(ty, tx) && self.cave.feat(ty, tx) == Feature::FlowAcid {
                        self.cave.set_feat(ty, tx, Feature::Floor);
                    }
                }
            }
            self.open_sanctum_door();
            return true;
        }
        false
    }

    /// Step on the mirror plate: the beam must run clear from the
    /// emitter to the crystal. Returns true when the seal opened.
    pub fn handle_plate(&mut self, y: i32, x: i32) -> bool {
        if self.cave.feat(y, x) != Feature::MirrorPlate {
            return false;
        }
        // Emitter sits two north, crystal two south of the plate; the
        // beam needs a clear run between them.
        let clear = self.cave.feat(y - 2, x) == Feature::Emitter
            && self.cave.feat(y + 2, x) == Feature::Crystal
            && los(&self.cave, y - 2, x, y + 2, x);
        if clear {
            self.open_sanctum_door();
        }
        clear
    }

    /// Folly vault: a folly-walled hall with a horde, traps, and loot.
    pub(crate) fn build_folly_vault(&mut self, y: i32, x: i32) {
        let y1 = y - 10;
        let y2 = y + 10;
        let x1 = x - 20;
        let x2 = x + 20;

        if !self.cave.in_bounds(y1, x1) || !self.cave.in_bounds(y2, x2) {
            return;
        }

        for iy in y1..=y2 {
            for ix in x1..=x2 {
                self.cave.set_feat(iy, ix, Feature::Floor);
                self.cave.add_flags(iy, ix, CellFlags::ROOM | CellFlags::GLOW);
            }
        }
        for iy in y1..=y2 {
            self.cave.set_feat(iy, x1, Feature::FollyWall);
            self.cave.set_feat(iy, x2, Feature::FollyWall);
        }
        for ix in x1..=x2 {
            self.cave.set_feat(y1, ix, Feature::FollyWall);
            self.cave.set_feat(y2, ix, Feature::FollyWall);
        }
        // Pierceable gates on both flanks.
        for iy in (y - 1)..=(y + 1) {
            self.cave.set_feat(iy, x1, Feature::WallOuter);
            self.cave.set_feat(iy, x2, Feature::WallOuter);
        }

        let level = self.player.depth;
        for _ in 0..20 {
            let my = y + self.rng.rand_range(-5, 5);
            let mx = x + self.rng.rand_range(-10, 10);
            crate::monster::place_monster(
                &mut self.cave,
                &mut self.rng,
                &self.data,
                &mut self.monsters,
                my,
                mx,
                level,
                AllocMode::PIT | AllocMode::GROUP,
            );
        }
        for _ in 0..10 {
            let ty = y + self.rng.rand_range(-8, 8);
            let tx = x + self.rng.rand_range(-15, 15);
            self.place_trap(ty, tx);
        }
        for _ in 0..5 {
            let oy = y + self.rng.rand_range(-5, 5);
            let ox = x + self.rng.rand_range(-10, 10);
            self.place_object(oy, ox, true, true);
        }
        self.rating += 30;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::GameData;
    use crate::generator::GenOptions;

    fn sanctum_generator(seed: u64) -> Generator {
        let mut generator = Generator::new(GameData::sample(), GenOptions::default(), seed);
        generator.player.depth = 45;
        generator.cave.wipe(Feature::WallExtra);
        generator.build_sanctum_vault(33, 99);
        generator
    }

    fn count_feat(generator: &Generator, feat: Feature) -> usize {
        generator
            .cave
            .feature_stream()
            .iter()
            .filter(|&&f| f == feat.repr())
            .count()
    }

    #[test]
    fn sanctum_has_two_seals_and_an_idol() {
        let generator = sanctum_generator(1);
        assert_eq!(count_feat(&generator, Feature::SanctumDoor), 2);
        assert_eq!(count_feat(&generator, Feature::WhisperingIdol), 1);
        assert!(count_feat(&generator, Feature::SanctumWall) > 0);
    }

    #[test]
    fn opening_the_seal_clears_both_doors() {
        let mut generator = sanctum_generator(2);
        assert!(generator.open_sanctum_door());
        assert_eq!(count_feat(&generator, Feature::SanctumDoor), 0);
        assert!(!generator.open_sanctum_door(), "second open is a no-op");
    }

    #[test]
    fn echo_lock_solves_in_order() {
        // Find a seed whose sanctum rolled the echo lock.
        for seed in 0..40 {
            let mut generator = sanctum_generator(seed);
            let solution = generator.puzzle.solution().to_vec();
            if solution.is_empty() {
                continue;
            }
            // Locate each rune on the map.
            let mut rune_pos = hashbrown::HashMap::new();
            for y in 0..generator.cave.height() {
                for x in 0..generator.cave.width() {
                    let feat = generator.cave.feat(y, x);
                    let id = feat.repr().wrapping_sub(Feature::RuneA.repr());
                    if id <= 4 {
                        rune_pos.insert(id, (y, x));
                    }
                }
            }
            // A wrong rune first (if the solution allows one) resets.
            if solution.len() >= 2 {
                let wrong = solution[1];
                let (wy, wx) = rune_pos[&wrong];
                assert_eq!(generator.handle_rune(wy, wx), RuneOutcome::Backlash);
            }
            // Then the full sequence opens the seal.
            let mut last = RuneOutcome::Ignored;
            for id in &solution {
                let (ry, rx) = rune_pos[id];
                last = generator.handle_rune(ry, rx);
            }
            assert_eq!(last, RuneOutcome::Opened);
            assert_eq!(count_feat(&generator, Feature::SanctumDoor), 0);
            return;
        }
        panic!("no echo lock sanctum in 40 seeds");
    }

    #[test]
    fn flow_conduit_needs_both_levers() {
        for seed in 0..40 {
            let mut generator = sanctum_generator(seed);
            if !generator.puzzle.solution().is_empty() {
                continue;
            }
            let mut levers = Vec::new();
            for y in 0..generator.cave.height() {
                for x in 0..generator.cave.width() {
                    if matches!(
                        generator.cave.feat(y, x),
                        Feature::LeverLeft | Feature::LeverRight
                    ) {
                        levers.push((y, x));
                    }
                }
            }
            if levers.len() != 2 {
                continue; // mirror-alignment sanctum
            }
            assert!(!generator.handle_lever(levers[0].0, levers[0].1));
            assert!(generator.handle_lever(levers[1].0, levers[1].1));
            assert_eq!(count_feat(&generator, Feature::SanctumDoor), 0);
            assert_eq!(count_feat(&generator, Feature::FlowAcid), 0);
            return;
        }
        panic!("no flow conduit sanctum in 40 seeds");
    }

    #[test]
    fn folly_hall_is_packed() {
        let mut generator = Generator::new(GameData::sample(), GenOptions::default(), 77);
        generator.player.depth = 35;
        generator.cave.wipe(Feature::WallExtra);
        generator.build_folly_vault(33, 99);
        assert!(count_feat(&generator, Feature::FollyWall) > 0);
        assert!(generator.monsters.iter_live().count() >= 10);
        assert!(generator.objects.len() >= 3);
    }
}
