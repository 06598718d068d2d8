//! Monster instances and the per-level monster list.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::data::{GameData, RaceFlags};
use crate::patrol::GuardRecord;
use crate::rng::GameRng;

bitflags! {
    /// Allocation modes for monster placement.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AllocMode: u8 {
        /// Spawn asleep.
        const SLEEP = 0x01;
        /// Pick from the crowded-room (nest/pit) selection.
        const PIT = 0x02;
        /// Spawn a whole group around the grid.
        const GROUP = 0x04;
        /// Spawn exactly one, never escorts.
        const JUST_ONE = 0x08;
        /// Restrict to aquatic races.
        const AQUATIC = 0x10;
        /// Spawn hidden in concealing terrain.
        const HIDE = 0x20;
        /// Quest spawn; ignores depth checks.
        const QUEST = 0x40;
    }
}

/// A monster instance. Guard state is allocated lazily on first
/// assignment to a patrol or post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Monster {
    /// Race index; 0 marks a dead list slot.
    pub race: u16,
    pub fy: i32,
    pub fx: i32,
    pub hp: i32,
    pub maxhp: i32,
    pub sleeping: bool,
    #[serde(default)]
    pub guard: Option<GuardRecord>,
}

impl Monster {
    pub fn is_live(&self) -> bool {
        self.race != 0
    }
}

/// The level's monster list. Index 0 is a permanent dummy so cell
/// occupancy can use 0 as "none".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonsterList {
    monsters: Vec<Monster>,
}

impl Default for MonsterList {
    fn default() -> Self {
        Self::new()
    }
}

impl MonsterList {
    pub fn new() -> Self {
        Self {
            monsters: vec![Monster {
                race: 0,
                fy: 0,
                fx: 0,
                hp: 0,
                maxhp: 0,
                sleeping: false,
                guard: None,
            }],
        }
    }

    pub fn clear(&mut self) {
        self.monsters.truncate(1);
    }

    /// Number of list slots in use, including the dummy.
    pub fn high_water(&self) -> usize {
        self.monsters.len()
    }

    pub fn get(&self, idx: u16) -> Option<&Monster> {
        self.monsters.get(idx as usize).filter(|m| m.is_live())
    }

    pub fn get_mut(&mut self, idx: u16) -> Option<&mut Monster> {
        self.monsters.get_mut(idx as usize).filter(|m| m.is_live())
    }

    pub fn push(&mut self, monster: Monster) -> u16 {
        self.monsters.push(monster);
        (self.monsters.len() - 1) as u16
    }

    pub fn kill(&mut self, idx: u16) {
        if let Some(m) = self.monsters.get_mut(idx as usize) {
            m.race = 0;
            m.guard = None;
        }
    }

    /// Iterate live monsters with their indices, skipping the dummy.
    pub fn iter_live(&self) -> impl Iterator<Item = (u16, &Monster)> {
        self.monsters
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, m)| m.is_live())
            .map(|(i, m)| (i as u16, m))
    }

    pub fn indices(&self) -> impl Iterator<Item = u16> + '_ {
        self.monsters
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, m)| m.is_live())
            .map(|(i, _)| i as u16)
    }
}

/// Pick a race appropriate for the generation level, honouring an
/// optional restriction. The scan is bounded; a failed pick returns
/// `None` and the caller leaves the grid empty.
pub fn get_mon_num(
    rng: &mut GameRng,
    data: &GameData,
    level: i32,
    allow_unique: bool,
    restrict: Option<&dyn Fn(&crate::data::MonsterRace) -> bool>,
) -> Option<u16> {
    let mut candidates: Vec<u16> = Vec::new();
    for (i, race) in data.races.iter().enumerate().skip(1) {
        if race.flags.contains(RaceFlags::UNIQUE) && !allow_unique {
            continue;
        }
        if race.level > level + 2 {
            continue;
        }
        if let Some(f) = restrict {
            if !f(race) {
                continue;
            }
        }
        candidates.push(i as u16);
    }
    if candidates.is_empty() {
        return None;
    }
    // Bias toward the deepest eligible races, the way an allocation
    // table weighted by native depth would.
    let mut best: Option<u16> = None;
    for _ in 0..3 {
        let pick = candidates[rng.rn2(candidates.len() as u32) as usize];
        match best {
            Some(b) if data.races[b as usize].level >= data.races[pick as usize].level => {}
            _ => best = Some(pick),
        }
    }
    best
}

/// Roll hit points from a race's hit dice.
pub fn roll_hp(rng: &mut GameRng, data: &GameData, race: u16) -> i32 {
    let (n, s) = data.races[race as usize].hdice;
    rng.dice(n, s).max(1) as i32
}

/// Place one monster of a known race on a grid. Fails quietly when the
/// grid is unusable or the race index is empty.
pub fn place_monster_aux(
    cave: &mut crate::cave::Cave,
    rng: &mut GameRng,
    data: &GameData,
    monsters: &mut MonsterList,
    y: i32,
    x: i32,
    race: u16,
    mode: AllocMode,
) -> Option<u16> {
    if race == 0 || race as usize >= data.races.len() {
        return None;
    }
    if !cave.in_bounds(y, x) || !cave.is_floor(y, x) || cave.monster_at(y, x) != 0 {
        return None;
    }
    let hp = roll_hp(rng, data, race);
    let idx = monsters.push(Monster {
        race,
        fy: y,
        fx: x,
        hp,
        maxhp: hp,
        sleeping: mode.contains(AllocMode::SLEEP),
        guard: None,
    });
    cave.set_monster(y, x, idx);
    Some(idx)
}

/// Place a level-appropriate monster, together with its pack when the
/// race runs in groups. Returns the index of the primary spawn.
pub fn place_monster(
    cave: &mut crate::cave::Cave,
    rng: &mut GameRng,
    data: &GameData,
    monsters: &mut MonsterList,
    y: i32,
    x: i32,
    level: i32,
    mode: AllocMode,
) -> Option<u16> {
    let aquatic_only = |r: &crate::data::MonsterRace| r.flags.contains(RaceFlags::AQUATIC);
    let restrict: Option<&dyn Fn(&crate::data::MonsterRace) -> bool> =
        if mode.contains(AllocMode::AQUATIC) {
            Some(&aquatic_only)
        } else {
            None
        };
    let race = get_mon_num(rng, data, level, false, restrict)?;
    let leader = place_monster_aux(cave, rng, data, monsters, y, x, race, mode)?;

    let grouped = !mode.contains(AllocMode::JUST_ONE)
        && (mode.contains(AllocMode::GROUP)
            || mode.contains(AllocMode::PIT)
            || data.races[race as usize].flags.contains(RaceFlags::FRIENDS));
    if grouped {
        let extras = 2 + rng.rnd(4);
        for _ in 0..extras {
            let (gy, gx) = crate::geom::scatter(rng, cave, y, x, 3);
            place_monster_aux(cave, rng, data, monsters, gy, gx, race, mode);
        }
    }
    Some(leader)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_starts_with_dummy() {
        let list = MonsterList::new();
        assert_eq!(list.high_water(), 1);
        assert!(list.get(0).is_none());
        assert_eq!(list.iter_live().count(), 0);
    }

    #[test]
    fn push_and_kill() {
        let mut list = MonsterList::new();
        let idx = list.push(Monster {
            race: 3,
            fy: 5,
            fx: 5,
            hp: 10,
            maxhp: 10,
            sleeping: true,
            guard: None,
        });
        assert_eq!(idx, 1);
        assert!(list.get(idx).is_some());
        list.kill(idx);
        assert!(list.get(idx).is_none());
        // Slot is not reused; the high-water mark reflects it.
        assert_eq!(list.high_water(), 2);
    }

    #[test]
    fn get_mon_num_honours_restriction() {
        let data = GameData::sample();
        let mut rng = GameRng::new(11);
        for _ in 0..50 {
            let pick = get_mon_num(&mut rng, &data, 10, false, Some(&|r| r.d_char == 'k'));
            if let Some(idx) = pick {
                assert_eq!(data.races[idx as usize].d_char, 'k');
            }
        }
    }

    #[test]
    fn get_mon_num_excludes_uniques_and_deep_races() {
        let data = GameData::sample();
        let mut rng = GameRng::new(7);
        for _ in 0..100 {
            if let Some(idx) = get_mon_num(&mut rng, &data, 5, false, None) {
                let race = &data.races[idx as usize];
                assert!(!race.flags.contains(RaceFlags::UNIQUE));
                assert!(race.level <= 7);
            }
        }
    }
}
