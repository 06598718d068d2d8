//! Cross-level pursuit.
//!
//! When the player uses stairs next to a smart or pack monster, the
//! monster is latched and respawned adjacent to the player on the next
//! level with its hit points intact. Word-of-recall works the same way
//! for a whole ring of neighbours, sprung as an ambush in town. The
//! module also carries the ambience that escalates while a level drags
//! on.

use serde::{Deserialize, Serialize};

use crate::cave::Cave;
use crate::consts::MAX_AMBUSH;
use crate::data::{GameData, RaceFlags};
use crate::geom::{scatter, DDD};
use crate::monster::{place_monster_aux, AllocMode, MonsterList};
use crate::rng::GameRng;

/// A latched monster: race plus preserved hit points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatchedMonster {
    pub race: u16,
    pub hp: i32,
    pub maxhp: i32,
}

/// Pursuit latches surviving level transitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PursuitState {
    pursuer: Option<LatchedMonster>,
    ambushers: Vec<LatchedMonster>,
    level_start_turn: u64,
}

impl PursuitState {
    pub fn pursuer(&self) -> Option<LatchedMonster> {
        self.pursuer
    }

    pub fn ambusher_count(&self) -> usize {
        self.ambushers.len()
    }

    /// Remember when the current level started, for dread pacing.
    pub fn reset_dread(&mut self, turn: u64) {
        self.level_start_turn = turn;
    }

    /// Latch one adjacent smart or pack monster before taking stairs.
    pub fn prepare_staircase_pursuit(
        &mut self,
        cave: &Cave,
        data: &GameData,
        monsters: &MonsterList,
        py: i32,
        px: i32,
    ) {
        self.pursuer = None;
        for (dy, dx) in DDD {
            let y = py + dy;
            let x = px + dx;
            if !cave.in_bounds(y, x) {
                continue;
            }
            let m_idx = cave.monster_at(y, x);
            if m_idx == 0 {
                continue;
            }
            let Some(monster) = monsters.get(m_idx) else {
                continue;
            };
            let race = &data.races[monster.race as usize];
            if race.flags.contains(RaceFlags::SMART) || race.flags.contains(RaceFlags::FRIENDS) {
                self.pursuer = Some(LatchedMonster {
                    race: monster.race,
                    hp: monster.hp,
                    maxhp: monster.maxhp,
                });
                // Only one monster can follow.
                break;
            }
        }
    }

    /// Respawn the latched pursuer near the player on the new level.
    /// Returns the spawned index when the pursuit fires.
    pub fn execute_staircase_pursuit(
        &mut self,
        cave: &mut Cave,
        rng: &mut GameRng,
        data: &GameData,
        monsters: &mut MonsterList,
        py: i32,
        px: i32,
    ) -> Option<u16> {
        let latched = self.pursuer.take()?;
        for d in 1..10 {
            let (y, x) = scatter(rng, cave, py, px, d);
            if !cave.is_floor(y, x) || cave.monster_at(y, x) != 0 {
                continue;
            }
            if let Some(idx) = place_monster_aux(
                cave,
                rng,
                data,
                monsters,
                y,
                x,
                latched.race,
                AllocMode::empty(),
            ) {
                if let Some(m) = monsters.get_mut(idx) {
                    m.hp = latched.hp;
                    m.maxhp = latched.maxhp;
                }
                return Some(idx);
            }
        }
        None
    }

    /// Latch every adjacent monster before a recall reads.
    pub fn prepare_recall_ambush(
        &mut self,
        cave: &Cave,
        monsters: &MonsterList,
        py: i32,
        px: i32,
    ) {
        self.ambushers.clear();
        for (dy, dx) in DDD {
            let y = py + dy;
            let x = px + dx;
            if !cave.in_bounds(y, x) {
                continue;
            }
            let m_idx = cave.monster_at(y, x);
            if m_idx == 0 {
                continue;
            }
            let Some(monster) = monsters.get(m_idx) else {
                continue;
            };
            if self.ambushers.len() < MAX_AMBUSH {
                self.ambushers.push(LatchedMonster {
                    race: monster.race,
                    hp: monster.hp,
                    maxhp: monster.maxhp,
                });
            }
        }
    }

    /// Spring the ambush in town. Fires only at depth zero; a recall
    /// that lands anywhere else discards the latch.
    pub fn execute_recall_ambush(
        &mut self,
        cave: &mut Cave,
        rng: &mut GameRng,
        data: &GameData,
        monsters: &mut MonsterList,
        depth: i32,
        py: i32,
        px: i32,
    ) -> usize {
        if depth != 0 {
            self.ambushers.clear();
            return 0;
        }
        let latched = std::mem::take(&mut self.ambushers);
        let mut sprung = 0;
        for ambusher in latched {
            for d in 1..10 {
                let (y, x) = scatter(rng, cave, py, px, d);
                if !cave.is_floor(y, x) || cave.monster_at(y, x) != 0 {
                    continue;
                }
                if let Some(idx) = place_monster_aux(
                    cave,
                    rng,
                    data,
                    monsters,
                    y,
                    x,
                    ambusher.race,
                    AllocMode::empty(),
                ) {
                    if let Some(m) = monsters.get_mut(idx) {
                        m.hp = ambusher.hp;
                        m.maxhp = ambusher.maxhp;
                    }
                    sprung += 1;
                    break;
                }
            }
        }
        sprung
    }

    /// Ambience line for this turn, if one fires. The chance rises after
    /// a thousand turns on the same level; deep levels mix in the decay
    /// whispers.
    pub fn process_dread(
        &self,
        rng: &mut GameRng,
        depth: i32,
        turn: u64,
    ) -> Option<&'static str> {
        let chance = if turn.saturating_sub(self.level_start_turn) > 1000 {
            5
        } else {
            1
        };
        if !rng.percent(chance) {
            return None;
        }
        if depth >= 50 && rng.one_in(2) {
            Some(DECAY_MESSAGES[rng.rn2(DECAY_MESSAGES.len() as u32) as usize])
        } else {
            Some(DREAD_MESSAGES[rng.rn2(DREAD_MESSAGES.len() as u32) as usize])
        }
    }
}

const DREAD_MESSAGES: [&str; 10] = [
    "The rhythm of your own heartbeat starts to sound like drums in the distance.",
    "You suddenly realize the dungeon has fallen completely silent.",
    "A faint, wet slurping sound echoes from the corridor behind you.",
    "You feel a cold breath on the back of your neck.",
    "You catch a glimpse of something moving at the edge of your light.",
    "The shadows seem to stretch and grasp at your feet.",
    "You hear the faint scratching of claws on stone.",
    "The air grows heavy, making it difficult to breathe.",
    "You hear footsteps matching your own, stopping when you stop.",
    "The silence is broken by a distant, mournful wail.",
];

const DECAY_MESSAGES: [&str; 4] = [
    "Did that wall just wink at you, or was it a trick of the light?",
    "The floor beneath your feet feels disturbingly soft.",
    "You hear a scream echoing through the ruins. It sounds like your own voice.",
    "The glowing symbols on the wall are weeping a dark, viscous fluid.",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::Feature;
    use crate::monster::Monster;

    fn open_cave() -> Cave {
        let mut cave = Cave::new();
        for y in 1..cave.height() - 1 {
            for x in 1..cave.width() - 1 {
                cave.set_feat(y, x, Feature::Floor);
            }
        }
        cave
    }

    fn spawn(cave: &mut Cave, monsters: &mut MonsterList, race: u16, y: i32, x: i32) -> u16 {
        let idx = monsters.push(Monster {
            race,
            fy: y,
            fx: x,
            hp: 7,
            maxhp: 30,
            sleeping: false,
            guard: None,
        });
        cave.set_monster(y, x, idx);
        idx
    }

    #[test]
    fn pursuit_latches_smart_neighbour_and_preserves_hp() {
        let mut cave = open_cave();
        let mut monsters = MonsterList::new();
        let data = GameData::sample();
        let mut rng = GameRng::new(4);
        let mut state = PursuitState::default();

        // Race 6 (delve bandit) is SMART; race 5 (pale jelly) is not.
        spawn(&mut cave, &mut monsters, 5, 10, 9);
        spawn(&mut cave, &mut monsters, 6, 10, 11);

        state.prepare_staircase_pursuit(&cave, &data, &monsters, 10, 10);
        assert_eq!(state.pursuer().map(|p| p.race), Some(6));
        assert_eq!(state.pursuer().map(|p| p.hp), Some(7));

        // Fresh level: respawn next to the player.
        let mut next = open_cave();
        let mut next_monsters = MonsterList::new();
        let idx = state
            .execute_staircase_pursuit(&mut next, &mut rng, &data, &mut next_monsters, 30, 30)
            .expect("pursuer spawns");
        let m = next_monsters.get(idx).expect("live");
        assert_eq!(m.race, 6);
        assert_eq!(m.hp, 7);
        assert_eq!(m.maxhp, 30);
        // The latch is consumed.
        assert!(state.pursuer().is_none());
    }

    #[test]
    fn dull_neighbours_do_not_pursue() {
        let mut cave = open_cave();
        let mut monsters = MonsterList::new();
        let data = GameData::sample();
        let mut state = PursuitState::default();
        spawn(&mut cave, &mut monsters, 5, 10, 9);
        state.prepare_staircase_pursuit(&cave, &data, &monsters, 10, 10);
        assert!(state.pursuer().is_none());
    }

    #[test]
    fn recall_ambush_only_fires_in_town() {
        let mut cave = open_cave();
        let mut monsters = MonsterList::new();
        let data = GameData::sample();
        let mut rng = GameRng::new(8);
        let mut state = PursuitState::default();

        spawn(&mut cave, &mut monsters, 4, 20, 19);
        spawn(&mut cave, &mut monsters, 4, 20, 21);
        spawn(&mut cave, &mut monsters, 4, 19, 20);
        state.prepare_recall_ambush(&cave, &monsters, 20, 20);
        assert_eq!(state.ambusher_count(), 3);

        // Recall that lands below town discards the ambush.
        let mut deep = open_cave();
        let mut deep_monsters = MonsterList::new();
        let sprung =
            state.execute_recall_ambush(&mut deep, &mut rng, &data, &mut deep_monsters, 5, 30, 30);
        assert_eq!(sprung, 0);
        assert_eq!(state.ambusher_count(), 0);

        // A town landing springs it.
        state.prepare_recall_ambush(&cave, &monsters, 20, 20);
        let mut town = open_cave();
        let mut town_monsters = MonsterList::new();
        let sprung =
            state.execute_recall_ambush(&mut town, &mut rng, &data, &mut town_monsters, 0, 30, 30);
        assert_eq!(sprung, 3);
        assert_eq!(town_monsters.iter_live().count(), 3);
    }

    #[test]
    fn dread_obeys_its_pacing() {
        let mut rng = GameRng::new(3);
        let mut state = PursuitState::default();
        state.reset_dread(0);
        let mut early = 0;
        let mut late = 0;
        for _ in 0..2000 {
            if state.process_dread(&mut rng, 10, 100).is_some() {
                early += 1;
            }
            if state.process_dread(&mut rng, 10, 5000).is_some() {
                late += 1;
            }
        }
        assert!(early < late, "early {early} late {late}");
    }
}
