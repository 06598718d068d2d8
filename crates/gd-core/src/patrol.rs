//! Monster patrol and guard behaviour.
//!
//! Each guarding monster lazily carries a [`GuardRecord`] with a patrol
//! route and a six-state machine. `execute_patrol_behavior` runs one
//! transition per game turn and reports whether it handled the monster's
//! action; when it returns `false` the standard pursuit AI takes over.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::cave::Cave;
use crate::consts::{
    GUARD_ALERT_RADIUS, GUARD_CHASE_TIMEOUT, PATROL_MAX_WAYPOINTS, PATROL_RADIUS,
    PATROL_REST_TURNS,
};
use crate::cover::get_cover_at;
use crate::data::{GameData, RaceFlags};
use crate::geom::{chebyshev, los};
use crate::monster::MonsterList;
use crate::rng::GameRng;

/// Guard behaviour states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumIter)]
pub enum GuardState {
    Patrol,
    Guard,
    Sleep,
    Alert,
    Chase,
    Return,
}

/// Patrol route shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumIter)]
pub enum PatrolKind {
    Random,
    Circuit,
    BackForth,
    Stationary,
}

/// Guard post placements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumIter)]
pub enum GuardPost {
    Door,
    HighGround,
    Treasure,
    Room,
}

/// One stop on a patrol route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Waypoint {
    pub y: i32,
    pub x: i32,
    pub wait_turns: i32,
}

/// Traversal direction for back-and-forth routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TraversalDir {
    #[default]
    Forward,
    Backward,
}

/// Position on the route: an explicit index/direction pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WaypointCursor {
    pub index: usize,
    pub dir: TraversalDir,
}

/// Per-monster guard data, allocated on first assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardRecord {
    pub state: GuardState,
    pub patrol: PatrolKind,
    pub post: Option<GuardPost>,
    pub home_y: i32,
    pub home_x: i32,
    pub alert_y: i32,
    pub alert_x: i32,
    pub chase_timer: i32,
    pub waypoints: Vec<Waypoint>,
    pub cursor: WaypointCursor,
}

impl GuardRecord {
    pub fn new(home_y: i32, home_x: i32) -> Self {
        Self {
            state: GuardState::Patrol,
            patrol: PatrolKind::Random,
            post: None,
            home_y,
            home_x,
            alert_y: home_y,
            alert_x: home_x,
            chase_timer: 0,
            waypoints: Vec::new(),
            cursor: WaypointCursor::default(),
        }
    }

    /// The waypoint the cursor points at, when the route has any.
    pub fn current_waypoint(&self) -> Option<Waypoint> {
        self.waypoints.get(self.cursor.index).copied()
    }
}

/// What the state machine needs to know about the player this turn.
#[derive(Debug, Clone, Copy)]
pub struct PlayerView {
    pub py: i32,
    pub px: i32,
    /// Base stealth skill; cover stealth is added per-cell.
    pub stealth: i32,
}

/// Generate 4-7 waypoints evenly spaced on a ring around a center.
/// Invalid grids collapse to the center.
fn ring_waypoints(
    cave: &Cave,
    rng: &mut GameRng,
    cy: i32,
    cx: i32,
    radius_base: i32,
    radius_spread: i32,
    rest_base: i32,
    rest_spread: u32,
) -> Vec<Waypoint> {
    let count = (4 + rng.rn2(4)) as usize;
    let count = count.min(PATROL_MAX_WAYPOINTS);
    let mut waypoints = Vec::with_capacity(count);
    for i in 0..count {
        let angle = (i as f64) * std::f64::consts::TAU / (count as f64);
        let dist = radius_base + rng.rn2(radius_spread.max(1) as u32) as i32;
        let mut y = cy + (f64::from(dist) * angle.sin()).round() as i32;
        let mut x = cx + (f64::from(dist) * angle.cos()).round() as i32;
        if !cave.in_bounds(y, x) || !cave.is_floor(y, x) {
            y = cy;
            x = cx;
        }
        waypoints.push(Waypoint {
            y,
            x,
            wait_turns: rest_base + rng.rn2(rest_spread) as i32,
        });
    }
    waypoints
}

/// Assign a patrol route to a monster.
pub fn setup_monster_patrol(
    cave: &Cave,
    rng: &mut GameRng,
    monsters: &mut MonsterList,
    m_idx: u16,
    kind: PatrolKind,
) {
    let Some(monster) = monsters.get(m_idx) else {
        return;
    };
    let (home_y, home_x) = (monster.fy, monster.fx);

    let mut record = GuardRecord::new(home_y, home_x);
    record.patrol = kind;
    match kind {
        PatrolKind::Circuit | PatrolKind::BackForth => {
            record.waypoints = ring_waypoints(
                cave,
                rng,
                home_y,
                home_x,
                3,
                PATROL_RADIUS - 2,
                5,
                PATROL_REST_TURNS,
            );
        }
        PatrolKind::Random => {}
        PatrolKind::Stationary => {
            record.waypoints = vec![Waypoint {
                y: home_y,
                x: home_x,
                wait_turns: 0,
            }];
            record.state = GuardState::Guard;
        }
    }

    if let Some(monster) = monsters.get_mut(m_idx) {
        monster.guard = Some(record);
    }
}

/// Station a monster at a guard post.
pub fn setup_guard_post(
    cave: &mut Cave,
    monsters: &mut MonsterList,
    m_idx: u16,
    post: GuardPost,
    y: i32,
    x: i32,
) {
    if monsters.get(m_idx).is_none() {
        return;
    }

    let mut record = GuardRecord::new(y, x);
    record.post = Some(post);
    record.state = GuardState::Guard;
    record.patrol = PatrolKind::Stationary;

    match post {
        GuardPost::Door | GuardPost::Room => {
            move_monster_to(cave, monsters, m_idx, y, x);
        }
        GuardPost::HighGround => {
            // Climb to the best elevation+cover score within 3 grids.
            let mut best = (y, x);
            let mut best_score =
                cave.elevation(y, x) as i32 + get_cover_at(cave, y, x) as i32;
            for dy in -3..=3 {
                for dx in -3..=3 {
                    let sy = y + dy;
                    let sx = x + dx;
                    if !cave.in_bounds(sy, sx) || !cave.is_floor(sy, sx) {
                        continue;
                    }
                    let score =
                        cave.elevation(sy, sx) as i32 + get_cover_at(cave, sy, sx) as i32;
                    if score > best_score {
                        best_score = score;
                        best = (sy, sx);
                    }
                }
            }
            move_monster_to(cave, monsters, m_idx, best.0, best.1);
            record.home_y = best.0;
            record.home_x = best.1;
        }
        GuardPost::Treasure => {
            move_monster_to(cave, monsters, m_idx, y, x);
            record.waypoints = vec![Waypoint {
                y,
                x,
                wait_turns: 50,
            }];
        }
    }

    if let Some(monster) = monsters.get_mut(m_idx) {
        monster.guard = Some(record);
    }
}

/// Give a group of monsters one shared circuit, spreading the members
/// around the loop.
pub fn setup_squad_patrol(
    cave: &mut Cave,
    rng: &mut GameRng,
    monsters: &mut MonsterList,
    members: &[u16],
    center_y: i32,
    center_x: i32,
) {
    if members.is_empty() {
        return;
    }
    let shared = ring_waypoints(cave, rng, center_y, center_x, 4, 6, 10, 20);
    let count = shared.len();

    for (i, &m_idx) in members.iter().enumerate() {
        if monsters.get(m_idx).is_none() {
            continue;
        }
        let mut record = GuardRecord::new(center_y, center_x);
        record.patrol = PatrolKind::Circuit;
        record.waypoints = shared.clone();
        record.cursor.index = i * count / members.len();

        // Start each member near its first waypoint.
        let wp = shared[record.cursor.index];
        let wy = wp.y + rng.rand_spread(0, 1);
        let wx = wp.x + rng.rand_spread(0, 1);
        if cave.in_bounds(wy, wx) && cave.is_floor(wy, wx) && cave.monster_at(wy, wx) == 0 {
            move_monster_to(cave, monsters, m_idx, wy, wx);
        }

        if let Some(monster) = monsters.get_mut(m_idx) {
            monster.guard = Some(record);
        }
    }
}

/// Put every smart or pack guard within `radius` of `(y, x)` on alert.
pub fn alert_nearby_guards(
    data: &GameData,
    monsters: &mut MonsterList,
    y: i32,
    x: i32,
    radius: i32,
) {
    let indices: Vec<u16> = monsters.indices().collect();
    for m_idx in indices {
        let Some(monster) = monsters.get(m_idx) else {
            continue;
        };
        if monster.guard.is_none() {
            continue;
        }
        if chebyshev(y, x, monster.fy, monster.fx) > radius {
            continue;
        }
        let race = &data.races[monster.race as usize];
        if !race.flags.contains(RaceFlags::SMART) && !race.flags.contains(RaceFlags::FRIENDS) {
            continue;
        }
        if let Some(monster) = monsters.get_mut(m_idx) {
            if let Some(record) = monster.guard.as_mut() {
                if matches!(
                    record.state,
                    GuardState::Patrol | GuardState::Guard | GuardState::Sleep
                ) {
                    record.state = GuardState::Alert;
                    record.alert_y = y;
                    record.alert_x = x;
                }
            }
        }
    }
}

/// Advance to the next waypoint on the route.
pub fn advance_waypoint(rng: &mut GameRng, record: &mut GuardRecord) {
    let count = record.waypoints.len();
    match record.patrol {
        PatrolKind::Circuit if count > 0 => {
            record.cursor.index = (record.cursor.index + 1) % count;
        }
        PatrolKind::BackForth if count > 0 => match record.cursor.dir {
            TraversalDir::Forward => {
                record.cursor.index += 1;
                if record.cursor.index >= count {
                    record.cursor.index = count.saturating_sub(2);
                    record.cursor.dir = TraversalDir::Backward;
                }
            }
            TraversalDir::Backward => {
                if record.cursor.index == 0 {
                    record.cursor.index = 1.min(count - 1);
                    record.cursor.dir = TraversalDir::Forward;
                } else {
                    record.cursor.index -= 1;
                }
            }
        },
        PatrolKind::Random => {
            // A random route is a single waypoint, reseeded on every
            // advance within a box around home.
            record.waypoints.clear();
            record.waypoints.push(Waypoint {
                y: record.home_y + rng.rand_spread(0, PATROL_RADIUS),
                x: record.home_x + rng.rand_spread(0, PATROL_RADIUS),
                wait_turns: 0,
            });
            record.cursor = WaypointCursor::default();
        }
        _ => {}
    }
}

fn move_monster_to(cave: &mut Cave, monsters: &mut MonsterList, m_idx: u16, y: i32, x: i32) {
    let Some(monster) = monsters.get(m_idx) else {
        return;
    };
    if !cave.in_bounds(y, x) {
        return;
    }
    let occupant = cave.monster_at(y, x);
    if occupant != 0 && occupant != m_idx {
        return;
    }
    let (fy, fx) = (monster.fy, monster.fx);
    cave.set_monster(fy, fx, 0);
    cave.set_monster(y, x, m_idx);
    if let Some(monster) = monsters.get_mut(m_idx) {
        monster.fy = y;
        monster.fx = x;
    }
}

/// Step one grid toward a target, breaking diagonals naturally by the
/// signum of each axis. Returns true when the monster moved.
fn step_toward(cave: &mut Cave, monsters: &mut MonsterList, m_idx: u16, ty: i32, tx: i32) -> bool {
    let Some(monster) = monsters.get(m_idx) else {
        return false;
    };
    let dy = (ty - monster.fy).signum();
    let dx = (tx - monster.fx).signum();
    let ny = monster.fy + dy;
    let nx = monster.fx + dx;
    if cave.is_floor(ny, nx) && cave.monster_at(ny, nx) == 0 {
        move_monster_to(cave, monsters, m_idx, ny, nx);
        true
    } else {
        false
    }
}

/// Run one turn of the guard state machine for a monster. Returns true
/// when the movement/action was fully handled here; false hands control
/// to the standard pursuit AI.
pub fn execute_patrol_behavior(
    cave: &mut Cave,
    rng: &mut GameRng,
    data: &GameData,
    monsters: &mut MonsterList,
    m_idx: u16,
    player: PlayerView,
) -> bool {
    let Some(monster) = monsters.get(m_idx) else {
        return false;
    };
    if monster.guard.is_none() {
        return false;
    }
    let (fy, fx) = (monster.fy, monster.fx);
    let race = &data.races[monster.race as usize];
    let aaf = race.aaf;

    let player_los = los(cave, fy, fx, player.py, player.px);
    let player_conceal =
        player.stealth + get_cover_at(cave, player.py, player.px).stealth_bonus();

    let state = monsters
        .get(m_idx)
        .and_then(|m| m.guard.as_ref())
        .map(|g| g.state)
        .unwrap_or(GuardState::Patrol);

    match state {
        GuardState::Sleep => {
            if player_los && player_conceal < aaf {
                if let Some(record) = monsters.get_mut(m_idx).and_then(|m| m.guard.as_mut()) {
                    record.state = GuardState::Chase;
                    record.alert_y = player.py;
                    record.alert_x = player.px;
                    record.chase_timer = GUARD_CHASE_TIMEOUT;
                }
                if let Some(m) = monsters.get_mut(m_idx) {
                    m.sleeping = false;
                }
                alert_nearby_guards(data, monsters, fy, fx, GUARD_ALERT_RADIUS);
                return false;
            }
            true
        }

        GuardState::Guard => {
            if player_los {
                if let Some(record) = monsters.get_mut(m_idx).and_then(|m| m.guard.as_mut()) {
                    record.state = GuardState::Chase;
                    record.alert_y = player.py;
                    record.alert_x = player.px;
                    record.chase_timer = GUARD_CHASE_TIMEOUT;
                }
                alert_nearby_guards(data, monsters, fy, fx, GUARD_ALERT_RADIUS);
                return false;
            }
            true
        }

        GuardState::Alert => {
            let (ty, tx) = monsters
                .get(m_idx)
                .and_then(|m| m.guard.as_ref())
                .map(|g| (g.alert_y, g.alert_x))
                .unwrap_or((fy, fx));
            if (fy, fx) == (ty, tx) {
                if let Some(record) = monsters.get_mut(m_idx).and_then(|m| m.guard.as_mut()) {
                    record.state = GuardState::Return;
                }
            } else if player_los {
                if let Some(record) = monsters.get_mut(m_idx).and_then(|m| m.guard.as_mut()) {
                    record.state = GuardState::Chase;
                    record.chase_timer = GUARD_CHASE_TIMEOUT;
                }
                return false;
            } else {
                step_toward(cave, monsters, m_idx, ty, tx);
            }
            true
        }

        GuardState::Chase => {
            if let Some(record) = monsters.get_mut(m_idx).and_then(|m| m.guard.as_mut()) {
                record.chase_timer -= 1;
            }
            if player_los {
                if let Some(record) = monsters.get_mut(m_idx).and_then(|m| m.guard.as_mut()) {
                    record.alert_y = player.py;
                    record.alert_x = player.px;
                    record.chase_timer = GUARD_CHASE_TIMEOUT;
                }
                return false;
            }
            let (ty, tx, timer) = monsters
                .get(m_idx)
                .and_then(|m| m.guard.as_ref())
                .map(|g| (g.alert_y, g.alert_x, g.chase_timer))
                .unwrap_or((fy, fx, 0));
            if (fy, fx) == (ty, tx) && timer <= 0 {
                if let Some(record) = monsters.get_mut(m_idx).and_then(|m| m.guard.as_mut()) {
                    record.state = GuardState::Return;
                }
                return true;
            }
            if timer <= 0 {
                if let Some(record) = monsters.get_mut(m_idx).and_then(|m| m.guard.as_mut()) {
                    record.state = GuardState::Return;
                }
                false
            } else {
                // Sight is lost but the trail is warm: close on the
                // last known position.
                step_toward(cave, monsters, m_idx, ty, tx);
                true
            }
        }

        GuardState::Return => {
            let (ty, tx, stationary) = {
                let record = monsters.get(m_idx).and_then(|m| m.guard.as_ref());
                match record {
                    Some(g) => {
                        if g.patrol == PatrolKind::Stationary || g.waypoints.is_empty() {
                            (g.home_y, g.home_x, g.patrol == PatrolKind::Stationary)
                        } else {
                            let wp = g.current_waypoint().unwrap_or(Waypoint {
                                y: g.home_y,
                                x: g.home_x,
                                wait_turns: 0,
                            });
                            (wp.y, wp.x, false)
                        }
                    }
                    None => (fy, fx, false),
                }
            };
            if (fy, fx) == (ty, tx) {
                if let Some(record) = monsters.get_mut(m_idx).and_then(|m| m.guard.as_mut()) {
                    record.state = if stationary {
                        GuardState::Guard
                    } else {
                        GuardState::Patrol
                    };
                }
            } else {
                step_toward(cave, monsters, m_idx, ty, tx);
            }
            true
        }

        GuardState::Patrol => {
            if player_los {
                if let Some(record) = monsters.get_mut(m_idx).and_then(|m| m.guard.as_mut()) {
                    record.state = GuardState::Chase;
                    record.alert_y = player.py;
                    record.alert_x = player.px;
                    record.chase_timer = GUARD_CHASE_TIMEOUT;
                }
                alert_nearby_guards(data, monsters, fy, fx, GUARD_ALERT_RADIUS);
                return false;
            }

            let has_route = monsters
                .get(m_idx)
                .and_then(|m| m.guard.as_ref())
                .map(|g| !g.waypoints.is_empty())
                .unwrap_or(false);

            if !has_route {
                // Random wander.
                if rng.percent(30) {
                    let dy = rng.rand_spread(0, 1);
                    let dx = rng.rand_spread(0, 1);
                    let ny = fy + dy;
                    let nx = fx + dx;
                    if cave.is_floor(ny, nx) && cave.monster_at(ny, nx) == 0 {
                        move_monster_to(cave, monsters, m_idx, ny, nx);
                    }
                }
                return true;
            }

            let wp = monsters
                .get(m_idx)
                .and_then(|m| m.guard.as_ref())
                .and_then(|g| g.current_waypoint())
                .unwrap_or(Waypoint {
                    y: fy,
                    x: fx,
                    wait_turns: 0,
                });

            if (fy, fx) == (wp.y, wp.x) {
                // Rest at the waypoint, then move on.
                let mut advance = false;
                if let Some(record) = monsters.get_mut(m_idx).and_then(|m| m.guard.as_mut()) {
                    if let Some(cur) = record.waypoints.get_mut(record.cursor.index) {
                        cur.wait_turns -= 1;
                        if cur.wait_turns <= 0 {
                            cur.wait_turns = 5 + rng.rn2(PATROL_REST_TURNS) as i32;
                            advance = true;
                        }
                    }
                }
                if advance {
                    if let Some(record) = monsters.get_mut(m_idx).and_then(|m| m.guard.as_mut()) {
                        advance_waypoint(rng, record);
                    }
                }
            } else {
                step_toward(cave, monsters, m_idx, wp.y, wp.x);
            }
            true
        }
    }
}

/// True when a monster is currently guarding or asleep at a post.
pub fn monster_is_guarding(monsters: &MonsterList, m_idx: u16) -> bool {
    monsters
        .get(m_idx)
        .and_then(|m| m.guard.as_ref())
        .map(|g| matches!(g.state, GuardState::Guard | GuardState::Sleep))
        .unwrap_or(false)
}

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
        for x in 0..cave.width() {
            cave.set_feat(0, x, Feature::PermSolid);
            let h = cave.height() - 1;
            cave.set_feat(h, x, Feature::PermSolid);
        }
        for y in 0..cave.height() {
            cave.set_feat(y, 0, Feature::PermSolid);
            let w = cave.width() - 1;
            cave.set_feat(y, w, Feature::PermSolid);
        }
        cave
    }

    fn spawn(cave: &mut Cave, monsters: &mut MonsterList, race: u16, y: i32, x: i32) -> u16 {
        let idx = monsters.push(Monster {
            race,
            fy: y,
            fx: x,
            hp: 10,
            maxhp: 10,
            sleeping: false,
            guard: None,
        });
        cave.set_monster(y, x, idx);
        idx
    }

    /// Player boxed into a far corner behind walls, so no guard ever has
    /// line of sight during route tests.
    fn hidden_player(cave: &mut Cave) -> PlayerView {
        for (y, x) in [(1, 2), (2, 1), (2, 2)] {
            cave.set_feat(y, x, Feature::WallSolid);
        }
        PlayerView {
            py: 1,
            px: 1,
            stealth: 0,
        }
    }

    #[test]
    fn circuit_visits_every_waypoint() {
        let mut cave = open_cave();
        let mut rng = GameRng::new(99);
        let mut monsters = MonsterList::new();
        let data = GameData::sample();
        let m = spawn(&mut cave, &mut monsters, 6, 33, 100);
        let player = hidden_player(&mut cave);

        setup_monster_patrol(&cave, &mut rng, &mut monsters, m, PatrolKind::Circuit);
        let route: Vec<(i32, i32)> = monsters
            .get(m)
            .and_then(|mm| mm.guard.as_ref())
            .map(|g| g.waypoints.iter().map(|w| (w.y, w.x)).collect())
            .unwrap_or_default();
        assert!((4..=7).contains(&route.len()));

        let mut visited = vec![false; route.len()];
        // Generous budget: every waypoint is reached and rested at within
        // a few hundred turns on an open floor.
        for _ in 0..2000 {
            let handled =
                execute_patrol_behavior(&mut cave, &mut rng, &data, &mut monsters, m, player);
            assert!(handled, "patrol with no line of sight is self-contained");
            let pos = monsters.get(m).map(|mm| (mm.fy, mm.fx)).unwrap();
            for (i, wp) in route.iter().enumerate() {
                if pos == *wp {
                    visited[i] = true;
                }
            }
            if visited.iter().all(|v| *v) {
                break;
            }
        }
        assert!(visited.iter().all(|v| *v), "visited: {visited:?}");
    }

    #[test]
    fn backforth_cursor_reverses_at_the_ends() {
        let mut rng = GameRng::new(3);
        let mut record = GuardRecord::new(10, 10);
        record.patrol = PatrolKind::BackForth;
        record.waypoints = (0..4)
            .map(|i| Waypoint {
                y: 10,
                x: 10 + i,
                wait_turns: 0,
            })
            .collect();

        let mut seq = Vec::new();
        for _ in 0..8 {
            advance_waypoint(&mut rng, &mut record);
            seq.push(record.cursor.index);
        }
        assert_eq!(seq, vec![1, 2, 3, 2, 1, 0, 1, 2]);
    }

    #[test]
    fn random_route_reseeds_its_single_waypoint() {
        let mut rng = GameRng::new(8);
        let mut record = GuardRecord::new(20, 40);
        record.patrol = PatrolKind::Random;

        let mut seen = Vec::new();
        for _ in 0..10 {
            advance_waypoint(&mut rng, &mut record);
            assert_eq!(record.waypoints.len(), 1);
            assert_eq!(record.cursor, WaypointCursor::default());
            let wp = record.waypoints[0];
            assert!((wp.y - 20).abs() <= PATROL_RADIUS);
            assert!((wp.x - 40).abs() <= PATROL_RADIUS);
            seen.push((wp.y, wp.x));
        }
        // The waypoint actually moves around the box.
        assert!(seen.iter().any(|&p| p != seen[0]));
    }

    #[test]
    fn stationary_guard_stays_put() {
        let mut cave = open_cave();
        let mut rng = GameRng::new(5);
        let mut monsters = MonsterList::new();
        let data = GameData::sample();
        let m = spawn(&mut cave, &mut monsters, 6, 30, 90);
        let player = hidden_player(&mut cave);

        setup_monster_patrol(&cave, &mut rng, &mut monsters, m, PatrolKind::Stationary);
        for _ in 0..50 {
            execute_patrol_behavior(&mut cave, &mut rng, &data, &mut monsters, m, player);
        }
        let pos = monsters.get(m).map(|mm| (mm.fy, mm.fx)).unwrap();
        assert_eq!(pos, (30, 90));
        assert!(monster_is_guarding(&monsters, m));
    }

    #[test]
    fn guard_chases_on_sight_and_alerts_neighbours() {
        let mut cave = open_cave();
        let mut rng = GameRng::new(5);
        let mut monsters = MonsterList::new();
        let data = GameData::sample();
        // Race 6 is the delve bandit (SMART).
        let guard = spawn(&mut cave, &mut monsters, 6, 30, 90);
        let friend = spawn(&mut cave, &mut monsters, 6, 32, 92);
        setup_monster_patrol(&cave, &mut rng, &mut monsters, guard, PatrolKind::Stationary);
        setup_monster_patrol(&cave, &mut rng, &mut monsters, friend, PatrolKind::Stationary);

        let player = PlayerView {
            py: 30,
            px: 95,
            stealth: 0,
        };
        let handled =
            execute_patrol_behavior(&mut cave, &mut rng, &data, &mut monsters, guard, player);
        assert!(!handled, "chase hands off to the standard AI");
        let g_state = monsters
            .get(guard)
            .and_then(|m| m.guard.as_ref())
            .map(|g| g.state);
        assert_eq!(g_state, Some(GuardState::Chase));
        let f_state = monsters
            .get(friend)
            .and_then(|m| m.guard.as_ref())
            .map(|g| g.state);
        assert_eq!(f_state, Some(GuardState::Alert));
    }

    #[test]
    fn chase_without_sight_closes_on_last_known_position() {
        let mut cave = open_cave();
        let mut rng = GameRng::new(5);
        let mut monsters = MonsterList::new();
        let data = GameData::sample();
        let m = spawn(&mut cave, &mut monsters, 6, 30, 90);
        let player = hidden_player(&mut cave);

        setup_monster_patrol(&cave, &mut rng, &mut monsters, m, PatrolKind::Stationary);
        if let Some(record) = monsters.get_mut(m).and_then(|mm| mm.guard.as_mut()) {
            record.state = GuardState::Chase;
            record.alert_y = 30;
            record.alert_x = 95;
            record.chase_timer = GUARD_CHASE_TIMEOUT;
        }

        for _ in 0..5 {
            let handled =
                execute_patrol_behavior(&mut cave, &mut rng, &data, &mut monsters, m, player);
            assert!(handled, "closing on the last known position is handled here");
        }
        let pos = monsters.get(m).map(|mm| (mm.fy, mm.fx)).unwrap();
        assert_eq!(pos, (30, 95), "the guard reached the alert spot");
        let state = monsters
            .get(m)
            .and_then(|mm| mm.guard.as_ref())
            .map(|g| g.state);
        assert_eq!(state, Some(GuardState::Chase));
    }

    #[test]
    fn chase_gives_up_when_the_timer_runs_out() {
        let mut cave = open_cave();
        let mut rng = GameRng::new(5);
        let mut monsters = MonsterList::new();
        let data = GameData::sample();
        let m = spawn(&mut cave, &mut monsters, 6, 30, 90);
        let player = hidden_player(&mut cave);

        setup_monster_patrol(&cave, &mut rng, &mut monsters, m, PatrolKind::Stationary);
        if let Some(record) = monsters.get_mut(m).and_then(|mm| mm.guard.as_mut()) {
            record.state = GuardState::Chase;
            record.alert_y = 30;
            record.alert_x = 95;
            record.chase_timer = 1;
        }

        execute_patrol_behavior(&mut cave, &mut rng, &data, &mut monsters, m, player);
        let state = monsters
            .get(m)
            .and_then(|mm| mm.guard.as_ref())
            .map(|g| g.state);
        assert_eq!(state, Some(GuardState::Return));
        // The guard stopped hunting before reaching the alert spot.
        let pos = monsters.get(m).map(|mm| (mm.fy, mm.fx)).unwrap();
        assert_ne!(pos, (30, 95));
    }

    #[test]
    fn sleeper_ignores_stealthy_player() {
        let mut cave = open_cave();
        let mut rng = GameRng::new(5);
        let mut monsters = MonsterList::new();
        let data = GameData::sample();
        // Pale jelly: aaf 4, so stealth 10 always beats it.
        let m = spawn(&mut cave, &mut monsters, 5, 30, 90);
        setup_monster_patrol(&cave, &mut rng, &mut monsters, m, PatrolKind::Stationary);
        if let Some(record) = monsters.get_mut(m).and_then(|mm| mm.guard.as_mut()) {
            record.state = GuardState::Sleep;
        }
        let player = PlayerView {
            py: 30,
            px: 93,
            stealth: 10,
        };
        let handled =
            execute_patrol_behavior(&mut cave, &mut rng, &data, &mut monsters, m, player);
        assert!(handled, "still asleep");
        let state = monsters
            .get(m)
            .and_then(|mm| mm.guard.as_ref())
            .map(|g| g.state);
        assert_eq!(state, Some(GuardState::Sleep));
    }

    #[test]
    fn squad_members_spread_around_the_loop() {
        let mut cave = open_cave();
        let mut rng = GameRng::new(12);
        let mut monsters = MonsterList::new();
        let members: Vec<u16> = (0..4)
            .map(|i| spawn(&mut cave, &mut monsters, 6, 30, 60 + i))
            .collect();
        setup_squad_patrol(&mut cave, &mut rng, &mut monsters, &members, 33, 99);

        let cursors: Vec<usize> = members
            .iter()
            .filter_map(|&m| monsters.get(m))
            .filter_map(|m| m.guard.as_ref())
            .map(|g| g.cursor.index)
            .collect();
        assert_eq!(cursors.len(), 4);
        // Offsets i * N / 4 are non-decreasing and not all equal.
        assert!(cursors.windows(2).all(|w| w[0] <= w[1]));
        assert!(cursors.iter().any(|&c| c != cursors[0]));
    }

    #[test]
    fn waypoints_stay_in_bounds_or_home() {
        let cave = open_cave();
        let mut rng = GameRng::new(77);
        for _ in 0..50 {
            let wps = ring_waypoints(&cave, &mut rng, 5, 5, 3, 6, 5, 10);
            for wp in wps {
                assert!(cave.in_bounds(wp.y, wp.x));
                assert!(cave.is_floor(wp.y, wp.x) || (wp.y, wp.x) == (5, 5));
            }
        }
    }
}
