//! Global tuning constants for the generator.

/// Dungeon height in grids
pub const DUNGEON_HGT: i32 = 66;

/// Dungeon width in grids
pub const DUNGEON_WID: i32 = 198;

/// Room placement block height
pub const BLOCK_HGT: i32 = 11;

/// Room placement block width
pub const BLOCK_WID: i32 = 11;

/// Maximum dungeon depth; the deepest reachable level is `MAX_DEPTH - 1`
pub const MAX_DEPTH: i32 = 100;

/// Monster list capacity; exceeding it rejects the level
pub const MAX_MONSTERS: usize = 1024;

/// Object pool capacity; exceeding it rejects the level
pub const MAX_OBJECTS: usize = 1024;

/// Number of rooms to attempt per level
pub const DUN_ROOMS: usize = 400;

/// Level/chance gate for unusual rooms
pub const DUN_UNUSUAL: u32 = 200;

/// 1/chance of a destroyed level below depth 10
pub const DUN_DEST: u32 = 15;

/// Chances (percent) for the open-level backgrounds
pub const DUN_OPEN_FLOOR: u32 = 10;
pub const DUN_OPEN_WATER: u32 = 10;
pub const DUN_OPEN_CHAOS: u32 = 10;
pub const DUN_OPEN_MAZE: u32 = 10;
pub const DUN_OPEN_FOG: u32 = 10;

/// Chance (percent) of a shaft appearing on a wilderness tile
pub const DUN_WILD_STAIRS: u32 = 30;

/// Chance (percent) of a wilderness vault
pub const DUN_WILD_VAULT: u32 = 100;

/// Tunnel: chance of a random direction
pub const DUN_TUN_RND: u32 = 10;

/// Tunnel: chance of re-correcting the direction
pub const DUN_TUN_CHG: u32 = 30;

/// Tunnel: gate for early termination once far enough off-axis
pub const DUN_TUN_CON: u32 = 15;

/// Tunnel: chance of a door where a tunnel pierces a room wall
pub const DUN_TUN_PEN: u32 = 25;

/// Tunnel: chance of a door at a corridor junction
pub const DUN_TUN_JCT: u32 = 90;

/// Streamer density (grids placed per step)
pub const DUN_STR_DEN: u32 = 5;

/// Streamer spread radius
pub const DUN_STR_RNG: i32 = 2;

/// Magma streamers per 64x64 area unit
pub const DUN_STR_MAG: u32 = 3;

/// 1/chance of treasure per magma streamer grid
pub const DUN_STR_MC: u32 = 90;

/// Quartz streamers per 64x64 area unit
pub const DUN_STR_QUA: u32 = 2;

/// 1/chance of treasure per quartz streamer grid
pub const DUN_STR_QC: u32 = 40;

/// Width of water/lava streamers
pub const DUN_STR_WLW: i32 = 1;

/// Density of water/lava streamers
pub const DUN_STR_DWLW: u32 = 8;

/// Objects allocated in rooms
pub const DUN_AMT_ROOM: u32 = 100;

/// Objects allocated anywhere
pub const DUN_AMT_ITEM: u32 = 50;

/// Altars allocated in rooms
pub const DUN_AMT_ALTAR: u32 = 3;

/// Bounds on the dun-state scratch arrays
pub const CENT_MAX: usize = 1000;
pub const DOOR_MAX: usize = 1000;
pub const WALL_MAX: usize = 2000;
pub const TUNN_MAX: usize = 9000;

/// Base count used by the monster allocation pass
pub const MIN_M_ALLOC_LEVEL: u32 = 14;

/// Wilderness monster allocation baselines
pub const MIN_M_ALLOC_WILD_DAY: u32 = 4;
pub const MIN_M_ALLOC_WILD_NIGHT: u32 = 8;

/// Patrol route radius in grids
pub const PATROL_RADIUS: i32 = 8;

/// Spread added to the 5-turn base waypoint rest
pub const PATROL_REST_TURNS: u32 = 10;

/// Maximum waypoints on a patrol route
pub const PATROL_MAX_WAYPOINTS: usize = 8;

/// Turns a guard keeps chasing after losing sight
pub const GUARD_CHASE_TIMEOUT: i32 = 20;

/// Chebyshev radius of guard alert propagation
pub const GUARD_ALERT_RADIUS: i32 = 10;

/// Cover damage-absorption percents, monotone by tier
pub const COVER_ABSORB_LIGHT: i32 = 25;
pub const COVER_ABSORB_MEDIUM: i32 = 50;
pub const COVER_ABSORB_HEAVY: i32 = 75;
pub const COVER_ABSORB_TOTAL: i32 = 100;

/// Stealth bonuses granted by standing in cover
pub const COVER_STEALTH_LIGHT: i32 = 1;
pub const COVER_STEALTH_MEDIUM: i32 = 2;
pub const COVER_STEALTH_HEAVY: i32 = 3;

/// Durability baselines for destructible cover
pub const COVER_DURABILITY_TREE: i32 = 60;
pub const COVER_DURABILITY_BOULDER: i32 = 40;
pub const COVER_DURABILITY_WALL: i32 = 100;
pub const COVER_DURABILITY_CRATE: i32 = 20;
pub const COVER_DURABILITY_BARREL: i32 = 20;

/// Barrel detonation parameters
pub const BARREL_BLAST_RADIUS: i32 = 2;
pub const BARREL_BLAST_DAMAGE: i32 = 30;

/// Monsters latched by a recall ambush
pub const MAX_AMBUSH: usize = 20;
