//! The generation context.
//!
//! A [`Generator`] owns the level grid, the RNG, the monster and object
//! pools, the per-generation scratch state, and references to the
//! read-only data tables. One call to [`Generator::generate_cave`]
//! produces one complete level; rejected attempts retry internally and
//! never leak partial state to the caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cave::Cave;
use crate::consts::{DUNGEON_HGT, DUNGEON_WID, MAX_DEPTH, MAX_MONSTERS, MAX_OBJECTS};
use crate::data::GameData;
use crate::dungeon::DunState;
use crate::monster::MonsterList;
use crate::object::ObjectPool;
use crate::pursuit::PursuitState;
use crate::rng::GameRng;

/// Special sublevels that bypass the standard cave pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecialLevel {
    /// The fighting arena.
    Arena,
    /// A quest level; the payload indexes the quest vault.
    Quest(usize),
    /// Inside a store sublevel.
    Store,
    /// A wilderness tile.
    Wild,
    /// A dream level.
    Dream,
}

/// Where the player is and what the generator must honour about them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerState {
    pub py: i32,
    pub px: i32,
    pub depth: i32,
    pub wild_x: i32,
    pub wild_y: i32,
    /// Remembered wilderness position for non-scroll regeneration.
    pub wilderness_py: i32,
    pub wilderness_px: i32,
    /// Depth the wilderness tile reverts to when not scrolling.
    pub wilderness_depth: i32,
    pub inside_special: Option<SpecialLevel>,
    /// Base stealth skill, consulted by sleeping guards.
    pub stealth: i32,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            py: 0,
            px: 0,
            depth: 0,
            wild_x: 0,
            wild_y: 0,
            wilderness_py: 0,
            wilderness_px: 0,
            wilderness_depth: 0,
            inside_special: None,
            stealth: 1,
        }
    }
}

/// Generation options, normally sourced from the game's option set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenOptions {
    /// Roll the open-floor/water/fog/maze backgrounds.
    pub allow_open_levels: bool,
    /// Halve the odds of every weird layout.
    pub weirdness_is_rare: bool,
    /// Attempt themed vaults during the room pass.
    pub allow_theme_vaults: bool,
    /// Reject boring levels for the first hundred attempts.
    pub auto_scum: bool,
    /// Nudge rooms off the block seams.
    pub dungeon_align: bool,
    /// Day half of the town cycle.
    pub daytime: bool,
    /// Persistent-dungeon seed; layouts repeat per depth when set.
    pub seed_dungeon: Option<u32>,
    /// Seed for the wilderness corner hash.
    pub seed_wild: u32,
}

impl Default for GenOptions {
    fn default() -> Self {
        Self {
            allow_open_levels: false,
            weirdness_is_rare: false,
            allow_theme_vaults: true,
            auto_scum: false,
            dungeon_align: true,
            daytime: true,
            seed_dungeon: None,
            seed_wild: 0x2b_5c_19,
        }
    }
}

/// Fatal generator failures. Recoverable rejections retry internally.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("depth {depth} outside 0..{max}", max = MAX_DEPTH)]
    InvalidDepth { depth: i32 },
    #[error("vault record {index} has malformed glyph streams")]
    CorruptVault { index: usize },
    #[error("generation kept rejecting levels ({last_cause})")]
    RetryBudgetExhausted { last_cause: &'static str },
}

/// The generation context object.
#[derive(Debug)]
pub struct Generator {
    pub cave: Cave,
    pub rng: GameRng,
    pub data: GameData,
    pub monsters: MonsterList,
    pub objects: ObjectPool,
    pub player: PlayerState,
    pub options: GenOptions,
    pub pursuit: PursuitState,
    /// Scratch state; valid only during a generation pass.
    pub(crate) dun: DunState,
    /// Quality score accumulated by room and vault builders.
    pub(crate) rating: i32,
    pub(crate) good_item_flag: bool,
    feeling: i32,
    /// Game turn; drives day/night and feeling recharge.
    pub turn: u64,
    old_turn: u64,
    /// An ancient is latched to follow the player downward.
    pub ancient_pursuit: bool,
    /// Let the next vault's `@` glyph position the player even in the
    /// wilderness (used right after birth).
    pub(crate) vault_place_player: bool,
    /// Published flag: the level is complete and playable.
    character_dungeon: bool,
    /// Where loot-distance scaling measures from.
    pub(crate) generation_origin: (i32, i32),
    /// Sanctum puzzle state for the current level.
    pub puzzle: crate::dungeon::sanctum::PuzzleState,
}

impl Generator {
    pub fn new(data: GameData, options: GenOptions, seed: u64) -> Self {
        let cave = Cave::new();
        let row = cave.row_blocks();
        let col = cave.col_blocks();
        Self {
            cave,
            rng: GameRng::new(seed),
            data,
            monsters: MonsterList::new(),
            objects: ObjectPool::default(),
            player: PlayerState::default(),
            options,
            pursuit: PursuitState::default(),
            dun: DunState::new(row, col),
            rating: 0,
            good_item_flag: false,
            feeling: 0,
            turn: 1,
            old_turn: 0,
            ancient_pursuit: false,
            vault_place_player: false,
            character_dungeon: false,
            generation_origin: (DUNGEON_HGT / 2, DUNGEON_WID / 2),
            puzzle: crate::dungeon::sanctum::PuzzleState::default(),
        }
    }

    /// The level-feeling score of the last accepted level (1 special,
    /// 2 superb .. 10 boring, 0 suppressed).
    pub fn feeling(&self) -> i32 {
        self.feeling
    }

    /// True once a level has been produced and published.
    pub fn is_ready(&self) -> bool {
        self.character_dungeon
    }

    /// Room and sector centers of the last generation, in connection
    /// order.
    pub fn room_centers(&self) -> &[(i32, i32)] {
        &self.dun.cent
    }

    /// Generate a complete level for the given depth.
    ///
    /// Levels that overflow the monster or object pools, or that fail
    /// the auto-scum quality gate, are rejected and rebuilt from the
    /// next RNG state; the loop is bounded only as a defect guard.
    pub fn generate_cave(&mut self, depth: i32) -> Result<(), GenerationError> {
        if !(0..MAX_DEPTH).contains(&depth) {
            return Err(GenerationError::InvalidDepth { depth });
        }
        self.player.depth = depth;
        self.character_dungeon = false;
        self.pursuit.reset_dread(self.turn);

        if let Some(seed) = self.options.seed_dungeon {
            self.rng.reseed_quick(u64::from(seed) + depth as u64);
            self.rng.push_mode(crate::rng::RngMode::Quick);
        }
        let result = self.run_generation(depth);
        if self.options.seed_dungeon.is_some() {
            self.rng.pop_mode();
        }
        result?;

        self.after_accept();
        self.character_dungeon = true;
        self.old_turn = self.turn;
        Ok(())
    }

    fn run_generation(&mut self, depth: i32) -> Result<(), GenerationError> {
        let mut last_cause = "unknown";
        for attempt in 0..500u32 {
            self.monsters.clear();
            self.objects.clear();
            self.good_item_flag = false;
            self.rating = 0;

            match self.player.inside_special {
                Some(SpecialLevel::Arena) => self.arena_gen()?,
                Some(SpecialLevel::Quest(which)) => self.quest_gen(which)?,
                Some(SpecialLevel::Store) => self.store_gen()?,
                Some(SpecialLevel::Wild) => self.terrain_gen()?,
                Some(SpecialLevel::Dream) => self.cave_gen()?,
                None => {
                    if depth == 0 {
                        self.town_gen()?;
                    } else {
                        self.cave_gen()?;
                    }
                }
            }

            self.feeling = self.extract_feeling();

            let mut okay = true;
            if self.objects.high_water() >= MAX_OBJECTS {
                last_cause = "too many objects";
                okay = false;
            }
            if self.monsters.high_water() >= MAX_MONSTERS {
                last_cause = "too many monsters";
                okay = false;
            }
            if okay
                && self.options.auto_scum
                && attempt < 100
                && self.player.inside_special.is_none()
            {
                let boring = self.feeling > 9
                    || (depth >= 5 && self.feeling > 8)
                    || (depth >= 10 && self.feeling > 7)
                    || (depth >= 20 && self.feeling > 6)
                    || (depth >= 40 && self.feeling > 5);
                if boring {
                    last_cause = "boring level";
                    okay = false;
                }
            }

            if okay {
                return Ok(());
            }
            log::debug!("generation restarted ({last_cause})");
        }
        Err(GenerationError::RetryBudgetExhausted { last_cause })
    }

    /// Map the accumulated rating to the feeling ladder.
    fn extract_feeling(&self) -> i32 {
        let mut feeling = match self.rating {
            r if r > 100 => 2,
            r if r > 80 => 3,
            r if r > 60 => 4,
            r if r > 40 => 5,
            r if r > 30 => 6,
            r if r > 20 => 7,
            r if r > 10 => 8,
            r if r > 0 => 9,
            _ => 10,
        };
        if self.good_item_flag {
            feeling = 1;
        }
        // Feelings recharge over a thousand turns; the town never has one.
        if self.turn - self.old_turn < 1000 || self.player.depth == 0 {
            feeling = 0;
        }
        feeling
    }

    /// Post-acceptance spawns: the travelling merchant, a pursuing
    /// ancient, and any latched staircase pursuit or recall ambush.
    fn after_accept(&mut self) {
        let depth = self.player.depth;

        if (6..MAX_DEPTH).contains(&depth) {
            if let Some(merchant) = self.data.merchant_race() {
                for _ in 0..1000 {
                    let y = self.rng.rn2(DUNGEON_HGT as u32) as i32;
                    let x = self.rng.rn2(DUNGEON_WID as u32) as i32;
                    if self.cave.is_naked(y, x) {
                        crate::monster::place_monster_aux(
                            &mut self.cave,
                            &mut self.rng,
                            &self.data,
                            &mut self.monsters,
                            y,
                            x,
                            merchant,
                            crate::monster::AllocMode::JUST_ONE,
                        );
                        break;
                    }
                }
            }
        }

        if self.ancient_pursuit {
            if let Some(ancient) = self.data.ancient_race() {
                for _ in 0..100 {
                    let (y, x) = crate::geom::scatter(
                        &mut self.rng,
                        &self.cave,
                        self.player.py,
                        self.player.px,
                        3,
                    );
                    if !self.cave.is_floor(y, x) || self.cave.monster_at(y, x) != 0 {
                        continue;
                    }
                    if crate::monster::place_monster_aux(
                        &mut self.cave,
                        &mut self.rng,
                        &self.data,
                        &mut self.monsters,
                        y,
                        x,
                        ancient,
                        crate::monster::AllocMode::JUST_ONE,
                    )
                    .is_some()
                    {
                        self.ancient_pursuit = false;
                        break;
                    }
                }
            }
        }

        self.pursuit.execute_staircase_pursuit(
            &mut self.cave,
            &mut self.rng,
            &self.data,
            &mut self.monsters,
            self.player.py,
            self.player.px,
        );
        self.pursuit.execute_recall_ambush(
            &mut self.cave,
            &mut self.rng,
            &self.data,
            &mut self.monsters,
            depth,
            self.player.py,
            self.player.px,
        );
    }
}

/// The combat and patrol boundary exposed to the rest of the engine.
impl Generator {
    /// Cover tier at a grid.
    pub fn get_cover_at(&self, y: i32, x: i32) -> crate::cover::CoverTier {
        crate::cover::get_cover_at(&self.cave, y, x)
    }

    /// Best cover between a target and an attacker.
    pub fn get_cover_vs_direction(
        &self,
        ty: i32,
        tx: i32,
        ay: i32,
        ax: i32,
    ) -> crate::cover::CoverTier {
        crate::cover::get_cover_vs_direction(&self.cave, ty, tx, ay, ax)
    }

    /// Resolve an attack through cover, applying cover damage and any
    /// barrel blasts to nearby combatants.
    pub fn attack_through_cover(
        &mut self,
        ay: i32,
        ax: i32,
        ty: i32,
        tx: i32,
        damage: i32,
    ) -> crate::cover::AttackOutcome {
        let (outcome, events) = crate::cover::attack_through_cover(
            &mut self.cave,
            &mut self.rng,
            ay,
            ax,
            ty,
            tx,
            damage,
        );
        self.apply_cover_events(&events);
        outcome
    }

    /// Damage destructible cover directly.
    pub fn damage_cover(&mut self, y: i32, x: i32, damage: i32) -> Vec<crate::cover::CoverEvent> {
        let events = crate::cover::damage_cover(&mut self.cave, &mut self.rng, y, x, damage);
        self.apply_cover_events(&events);
        events
    }

    fn apply_cover_events(&mut self, events: &[crate::cover::CoverEvent]) {
        use crate::consts::{BARREL_BLAST_DAMAGE, BARREL_BLAST_RADIUS};
        for event in events {
            if let crate::cover::CoverEvent::BarrelExploded { y, x } = *event {
                // The blast scorches everything standing nearby.
                let hit: Vec<u16> = self
                    .monsters
                    .iter_live()
                    .filter(|(_, m)| {
                        crate::geom::distance(y, x, m.fy, m.fx) <= BARREL_BLAST_RADIUS
                    })
                    .map(|(i, _)| i)
                    .collect();
                for m_idx in hit {
                    let mut dead = None;
                    if let Some(monster) = self.monsters.get_mut(m_idx) {
                        monster.hp -= BARREL_BLAST_DAMAGE;
                        if monster.hp <= 0 {
                            dead = Some((monster.fy, monster.fx));
                        }
                    }
                    if let Some((fy, fx)) = dead {
                        self.monsters.kill(m_idx);
                        self.cave.set_monster(fy, fx, 0);
                    }
                }
            }
        }
    }

    /// Run the guard state machine for one monster this turn. Returns
    /// true when the action was handled and the standard combat AI
    /// should be skipped.
    pub fn execute_patrol_behavior(&mut self, m_idx: u16) -> bool {
        let player = crate::patrol::PlayerView {
            py: self.player.py,
            px: self.player.px,
            stealth: self.player.stealth,
        };
        crate::patrol::execute_patrol_behavior(
            &mut self.cave,
            &mut self.rng,
            &self.data,
            &mut self.monsters,
            m_idx,
            player,
        )
    }

    /// Station a monster at a guard post.
    pub fn setup_guard_post(&mut self, m_idx: u16, post: crate::patrol::GuardPost, y: i32, x: i32) {
        crate::patrol::setup_guard_post(&mut self.cave, &mut self.monsters, m_idx, post, y, x);
    }

    /// Assign a patrol route to a monster.
    pub fn setup_monster_patrol(&mut self, m_idx: u16, kind: crate::patrol::PatrolKind) {
        crate::patrol::setup_monster_patrol(
            &self.cave,
            &mut self.rng,
            &mut self.monsters,
            m_idx,
            kind,
        );
    }

    /// Give a squad one shared patrol loop.
    pub fn setup_squad_patrol(&mut self, members: &[u16], center_y: i32, center_x: i32) {
        crate::patrol::setup_squad_patrol(
            &mut self.cave,
            &mut self.rng,
            &mut self.monsters,
            members,
            center_y,
            center_x,
        );
    }

    /// Put nearby smart and pack guards on alert.
    pub fn alert_nearby_guards(&mut self, y: i32, x: i32, radius: i32) {
        crate::patrol::alert_nearby_guards(&self.data, &mut self.monsters, y, x, radius);
    }

    /// Latch a pursuing neighbour before the player uses stairs.
    pub fn prepare_staircase_pursuit(&mut self) {
        self.pursuit.prepare_staircase_pursuit(
            &self.cave,
            &self.data,
            &self.monsters,
            self.player.py,
            self.player.px,
        );
    }

    /// Latch the adjacent ring before a recall reads.
    pub fn prepare_recall_ambush(&mut self) {
        self.pursuit
            .prepare_recall_ambush(&self.cave, &self.monsters, self.player.py, self.player.px);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_depth_is_fatal() {
        let mut generator = Generator::new(GameData::sample(), GenOptions::default(), 1);
        assert!(matches!(
            generator.generate_cave(-1),
            Err(GenerationError::InvalidDepth { .. })
        ));
        assert!(matches!(
            generator.generate_cave(MAX_DEPTH),
            Err(GenerationError::InvalidDepth { .. })
        ));
        assert!(!generator.is_ready());
    }

    #[test]
    fn feeling_ladder() {
        let mut generator = Generator::new(GameData::sample(), GenOptions::default(), 1);
        generator.turn = 5000;
        generator.player.depth = 3;
        generator.rating = 95;
        assert_eq!(generator.extract_feeling(), 3);
        generator.rating = 0;
        assert_eq!(generator.extract_feeling(), 10);
        generator.good_item_flag = true;
        assert_eq!(generator.extract_feeling(), 1);
        generator.player.depth = 0;
        assert_eq!(generator.extract_feeling(), 0);
    }
}
