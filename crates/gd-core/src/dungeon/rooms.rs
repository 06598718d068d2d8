//! Room archetypes.
//!
//! Rooms are reserved on the 11x11 block grid. Each archetype declares
//! its block rectangle and a minimum depth; `room_build` verifies the
//! reservation, computes the centered grid position, and dispatches to
//! the builder.

use crate::cave::CellFlags;
use crate::consts::BLOCK_HGT;
use crate::consts::BLOCK_WID;
use crate::feature::Feature;
use crate::generator::Generator;
use crate::geom::distance;
use crate::monster::AllocMode;
use crate::patrol::{GuardPost, GuardRecord, GuardState, PatrolKind};
use crate::rng::RngMode;

/// Block-rectangle and depth gate for each room type.
#[derive(Debug, Clone, Copy)]
pub struct RoomSpec {
    pub dy1: i32,
    pub dy2: i32,
    pub dx1: i32,
    pub dx2: i32,
    pub min_level: i32,
}

/// Indexed by room type; type 0 and the unused slots are zeroed.
pub const ROOM_TABLE: [RoomSpec; 20] = {
    const Z: RoomSpec = RoomSpec {
        dy1: 0,
        dy2: 0,
        dx1: 0,
        dx2: 0,
        min_level: 0,
    };
    const fn spec(dy1: i32, dy2: i32, dx1: i32, dx2: i32, min_level: i32) -> RoomSpec {
        RoomSpec {
            dy1,
            dy2,
            dx1,
            dx2,
            min_level,
        }
    }
    [
        Z,                        // 0 = nothing
        spec(0, 0, -1, 1, 1),     // 1 = rectangular
        spec(0, 0, -1, 1, 1),     // 2 = overlapping
        spec(0, 0, -1, 1, 3),     // 3 = cross
        spec(0, 0, -1, 1, 3),     // 4 = large with inner feature
        spec(0, 0, -1, 1, 5),     // 5 = monster nest
        spec(0, 0, -1, 1, 5),     // 6 = monster pit
        spec(0, 1, -1, 1, 5),     // 7 = lesser vault
        spec(-1, 2, -2, 3, 10),   // 8 = greater vault
        spec(-1, 2, -2, 3, 5),    // 9 = themed vault
        spec(-1, 2, -2, 3, 40),   // 10 = sanctum
        spec(-1, 3, -3, 3, 30),   // 11 = folly vault
        spec(-2, 2, -2, 2, 1),    // 12 = circular
        spec(-2, 2, -2, 2, 1),    // 13 = composite
        spec(-2, 2, -2, 2, 1),    // 14 = organic cavern
        Z,                        // 15 = unused
        Z,                        // 16 = unused
        spec(0, 0, -1, 1, 10),    // 17 = guard post room
        spec(0, 0, -1, 1, 15),    // 18 = ambush corridor
        Z,                        // 19 = unused
    ]
};

impl Generator {
    /// Attempt to build a room of `typ` rooted at block `(by, bx)`.
    /// Crowded rooms (nests and pits) are limited to one per level to
    /// keep the monster list from overflowing.
    pub(crate) fn room_build(&mut self, by: i32, bx: i32, typ: usize) -> bool {
        let spec = ROOM_TABLE[typ];

        if self.player.depth < spec.min_level {
            return false;
        }
        if self.dun.crowded && (typ == 5 || typ == 6) {
            return false;
        }

        let y1 = by + spec.dy1;
        let y2 = by + spec.dy2;
        let x1 = bx + spec.dx1;
        let x2 = bx + spec.dx2;

        if y1 < 0 || y2 >= self.dun.row_rooms || x1 < 0 || x2 >= self.dun.col_rooms {
            return false;
        }
        for y in y1..=y2 {
            for x in x1..=x2 {
                if self.dun.block_used(y, x) {
                    return false;
                }
            }
        }

        // The centered grid position of the block rectangle.
        let y = ((y1 + y2 + 1) * BLOCK_HGT) / 2;
        let x = ((x1 + x2 + 1) * BLOCK_WID) / 2;

        match typ {
            1 => self.build_type1(y, x),
            2 => self.build_type2(y, x),
            3 => self.build_type3(y, x),
            4 => self.build_type4(y, x),
            5 => self.build_type5(y, x),
            6 => self.build_type6(y, x),
            7 => self.build_type7(y, x),
            8 => self.build_type8(y, x),
            9 => self.build_type9(y, x),
            10 => self.build_sanctum_vault(y, x),
            11 => self.build_folly_vault(y, x),
            12 => self.build_type12(y, x),
            13 => self.build_type13(y, x),
            14 => self.build_type14(y, x),
            17 => self.build_type17(y, x),
            18 => self.build_type18(y, x),
            _ => return false,
        }

        self.dun.push_cent(y, x);
        for y in y1..=y2 {
            for x in x1..=x2 {
                self.dun.reserve_block(y, x);
            }
        }
        if typ == 5 || typ == 6 {
            self.dun.crowded = true;
        }
        true
    }

    /// Paint a floor rectangle with ROOM (and optionally GLOW) flags.
    fn paint_room_floor(&mut self, y1: i32, x1: i32, y2: i32, x2: i32, light: bool) {
        for y in y1..=y2 {
            for x in x1..=x2 {
                if !self.cave.in_bounds(y, x) {
                    continue;
                }
                self.cave.set_feat(y, x, Feature::Floor);
                self.cave.add_flags(y, x, CellFlags::ROOM);
                if light {
                    self.cave.add_flags(y, x, CellFlags::GLOW);
                }
            }
        }
    }

    /// Ring a rectangle with outer walls.
    fn paint_outer_walls(&mut self, y1: i32, x1: i32, y2: i32, x2: i32) {
        for y in y1..=y2 {
            self.cave.set_feat_checked(y, x1, Feature::WallOuter);
            self.cave.set_feat_checked(y, x2, Feature::WallOuter);
        }
        for x in x1..=x2 {
            self.cave.set_feat_checked(y1, x, Feature::WallOuter);
            self.cave.set_feat_checked(y2, x, Feature::WallOuter);
        }
    }

    /// Ring an inner rectangle with inner walls.
    fn paint_inner_walls(&mut self, y1: i32, x1: i32, y2: i32, x2: i32) {
        for y in y1..=y2 {
            self.cave.set_feat_checked(y, x1, Feature::WallInner);
            self.cave.set_feat_checked(y, x2, Feature::WallInner);
        }
        for x in x1..=x2 {
            self.cave.set_feat_checked(y1, x, Feature::WallInner);
            self.cave.set_feat_checked(y2, x, Feature::WallInner);
        }
    }

    /// A secret door on a random side of an inner room.
    fn secret_door_on_side(&mut self, y1: i32, x1: i32, y2: i32, x2: i32, yval: i32, xval: i32) {
        match self.rng.rnd(4) {
            1 => self.place_secret_door(y1, xval),
            2 => self.place_secret_door(y2, xval),
            3 => self.place_secret_door(yval, x1),
            _ => self.place_secret_door(yval, x2),
        }
    }

    /// Type 1: plain rectangle, with rare pillar-grid and ragged-edge
    /// variants and the occasional garrison.
    pub(crate) fn build_type1(&mut self, yval: i32, xval: i32) {
        let light = self.roll_room_light();

        let y1 = yval - self.rng.rnd(4) as i32;
        let y2 = yval + self.rng.rnd(3) as i32;
        let x1 = xval - self.rng.rnd(11) as i32;
        let x2 = xval + self.rng.rnd(11) as i32;

        self.paint_room_floor(y1 - 1, x1 - 1, y2 + 1, x2 + 1, light);
        self.paint_outer_walls(y1 - 1, x1 - 1, y2 + 1, x2 + 1);

        if self.rng.one_in(20) {
            // Pillar grid.
            let mut y = y1;
            while y <= y2 {
                let mut x = x1;
                while x <= x2 {
                    self.cave.set_feat_checked(y, x, Feature::WallInner);
                    x += 2;
                }
                y += 2;
            }
        } else if self.rng.one_in(50) {
            // Ragged edges.
            let mut y = y1 + 2;
            while y <= y2 - 2 {
                self.cave.set_feat_checked(y, x1, Feature::WallInner);
                self.cave.set_feat_checked(y, x2, Feature::WallInner);
                y += 2;
            }
            let mut x = x1 + 2;
            while x <= x2 - 2 {
                self.cave.set_feat_checked(y1, x, Feature::WallInner);
                self.cave.set_feat_checked(y2, x, Feature::WallInner);
                x += 2;
            }
        }

        if self.player.depth > 5 && self.rng.percent(30) {
            self.populate_guard_posts(y1, x1, y2, x2);
        }
    }

    /// Type 2: two overlapping rectangles.
    pub(crate) fn build_type2(&mut self, yval: i32, xval: i32) {
        let light = self.roll_room_light();

        let y1a = yval - self.rng.rnd(4) as i32;
        let y2a = yval + self.rng.rnd(3) as i32;
        let x1a = xval - self.rng.rnd(11) as i32;
        let x2a = xval + self.rng.rnd(10) as i32;
        let y1b = yval - self.rng.rnd(3) as i32;
        let y2b = yval + self.rng.rnd(4) as i32;
        let x1b = xval - self.rng.rnd(10) as i32;
        let x2b = xval + self.rng.rnd(11) as i32;

        self.paint_room_floor(y1a - 1, x1a - 1, y2a + 1, x2a + 1, light);
        self.paint_room_floor(y1b - 1, x1b - 1, y2b + 1, x2b + 1, light);
        self.paint_outer_walls(y1a - 1, x1a - 1, y2a + 1, x2a + 1);
        self.paint_outer_walls(y1b - 1, x1b - 1, y2b + 1, x2b + 1);

        // Re-open both interiors over the shared walls.
        for y in y1a..=y2a {
            for x in x1a..=x2a {
                self.cave.set_feat_checked(y, x, Feature::Floor);
            }
        }
        for y in y1b..=y2b {
            for x in x1b..=x2b {
                self.cave.set_feat_checked(y, x, Feature::Floor);
            }
        }
    }

    /// Type 3: a cross, with one of four centerpiece treatments.
    pub(crate) fn build_type3(&mut self, yval: i32, xval: i32) {
        let light = self.roll_room_light();

        let dy = self.rng.rand_range(3, 4);
        let dx = self.rng.rand_range(3, 11);

        // North/south limb.
        let y1a = yval - dy;
        let y2a = yval + dy;
        let x1a = xval - 1;
        let x2a = xval + 1;
        // East/west limb.
        let y1b = yval - 1;
        let y2b = yval + 1;
        let x1b = xval - dx;
        let x2b = xval + dx;

        self.paint_room_floor(y1a - 1, x1a - 1, y2a + 1, x2a + 1, light);
        self.paint_room_floor(y1b - 1, x1b - 1, y2b + 1, x2b + 1, light);
        self.paint_outer_walls(y1a - 1, x1a - 1, y2a + 1, x2a + 1);
        self.paint_outer_walls(y1b - 1, x1b - 1, y2b + 1, x2b + 1);

        for y in y1a..=y2a {
            for x in x1a..=x2a {
                self.cave.set_feat_checked(y, x, Feature::Floor);
            }
        }
        for y in y1b..=y2b {
            for x in x1b..=x2b {
                self.cave.set_feat_checked(y, x, Feature::Floor);
            }
        }

        // Centerpiece (3 in 4; a plain cross otherwise).
        match self.rng.rn2(4) {
            1 => {
                // Solid middle pillar.
                for y in y1b..=y2b {
                    for x in x1a..=x2a {
                        self.cave.set_feat_checked(y, x, Feature::WallInner);
                    }
                }
            }
            2 => {
                // Inner treasure vault.
                self.paint_inner_walls(y1b, x1a, y2b, x2a);
                match self.rng.rn2(4) {
                    0 => self.place_secret_door(y1b, xval),
                    1 => self.place_secret_door(y2b, xval),
                    2 => self.place_secret_door(yval, x1a),
                    _ => self.place_secret_door(yval, x2a),
                }
                self.place_object(yval, xval, false, false);
                self.vault_monsters(yval, xval, AllocMode::SLEEP | AllocMode::GROUP);
                let traps = 2 + self.rng.rn2(3);
                self.vault_traps(yval, xval, 4, 4, traps);
            }
            3 => {
                if self.rng.one_in(3) {
                    // Pinch the center shut.
                    for y in y1b..=y2b {
                        if y == yval {
                            continue;
                        }
                        self.cave.set_feat_checked(y, x1a - 1, Feature::WallInner);
                        self.cave.set_feat_checked(y, x2a + 1, Feature::WallInner);
                    }
                    for x in x1a..=x2a {
                        if x == xval {
                            continue;
                        }
                        self.cave.set_feat_checked(y1b - 1, x, Feature::WallInner);
                        self.cave.set_feat_checked(y2b + 1, x, Feature::WallInner);
                    }
                    if self.rng.one_in(3) {
                        self.place_secret_door(yval, x1a - 1);
                        self.place_secret_door(yval, x2a + 1);
                        self.place_secret_door(y1b - 1, xval);
                        self.place_secret_door(y2b + 1, xval);
                    }
                } else if self.rng.one_in(3) {
                    // A plus in the center.
                    self.cave.set_feat_checked(yval, xval, Feature::WallInner);
                    self.cave.set_feat_checked(y1b, xval, Feature::WallInner);
                    self.cave.set_feat_checked(y2b, xval, Feature::WallInner);
                    self.cave.set_feat_checked(yval, x1a, Feature::WallInner);
                    self.cave.set_feat_checked(yval, x2a, Feature::WallInner);
                } else if self.rng.one_in(3) {
                    // A single pillar.
                    self.cave.set_feat_checked(yval, xval, Feature::WallInner);
                }
            }
            _ => {}
        }
    }

    /// Type 4: a large room wrapped around one of five inner features.
    pub(crate) fn build_type4(&mut self, yval: i32, xval: i32) {
        let light = self.roll_room_light();

        let y1 = yval - 4;
        let y2 = yval + 4;
        let x1 = xval - 11;
        let x2 = xval + 11;

        self.paint_room_floor(y1 - 1, x1 - 1, y2 + 1, x2 + 1, light);
        self.paint_outer_walls(y1 - 1, x1 - 1, y2 + 1, x2 + 1);

        // The inner room.
        let y1 = y1 + 2;
        let y2 = y2 - 2;
        let x1 = x1 + 2;
        let x2 = x2 - 2;
        self.paint_inner_walls(y1 - 1, x1 - 1, y2 + 1, x2 + 1);

        match self.rng.rnd(5) {
            1 => {
                // An inner room with a monster.
                self.secret_door_on_side(y1 - 1, x1 - 1, y2 + 1, x2 + 1, yval, xval);
                self.vault_monsters(yval, xval, AllocMode::SLEEP);
            }
            2 => {
                // A treasure vault behind a locked door.
                self.secret_door_on_side(y1 - 1, x1 - 1, y2 + 1, x2 + 1, yval, xval);
                for y in (yval - 1)..=(yval + 1) {
                    for x in (xval - 1)..=(xval + 1) {
                        if (y, x) == (yval, xval) {
                            continue;
                        }
                        self.cave.set_feat_checked(y, x, Feature::WallInner);
                    }
                }
                match self.rng.rnd(4) {
                    1 => self.place_locked_door(yval - 1, xval),
                    2 => self.place_locked_door(yval + 1, xval),
                    3 => self.place_locked_door(yval, xval - 1),
                    _ => self.place_locked_door(yval, xval + 1),
                }
                self.vault_monsters(yval, xval, AllocMode::SLEEP | AllocMode::GROUP);
                if self.rng.percent(80) {
                    self.place_object(yval, xval, false, false);
                } else {
                    self.place_random_stairs(yval, xval);
                }
                let traps = 2 + self.rng.rnd(3);
                self.vault_traps(yval, xval, 4, 10, traps);
            }
            3 => {
                // Inner pillars, sometimes with a pillar chamber.
                self.secret_door_on_side(y1 - 1, x1 - 1, y2 + 1, x2 + 1, yval, xval);
                for y in (yval - 1)..=(yval + 1) {
                    for x in (xval - 1)..=(xval + 1) {
                        self.cave.set_feat_checked(y, x, Feature::WallInner);
                    }
                }
                if self.rng.one_in(2) {
                    let tmp = self.rng.rnd(2) as i32;
                    for y in (yval - 1)..=(yval + 1) {
                        for x in (xval - 5 - tmp)..=(xval - 3 - tmp) {
                            self.cave.set_feat_checked(y, x, Feature::WallInner);
                        }
                        for x in (xval + 3 + tmp)..=(xval + 5 + tmp) {
                            self.cave.set_feat_checked(y, x, Feature::WallInner);
                        }
                    }
                }
                if self.rng.one_in(3) {
                    for x in (xval - 5)..=(xval + 5) {
                        self.cave.set_feat_checked(yval - 1, x, Feature::WallInner);
                        self.cave.set_feat_checked(yval + 1, x, Feature::WallInner);
                    }
                    self.cave.set_feat_checked(yval, xval - 5, Feature::WallInner);
                    self.cave.set_feat_checked(yval, xval + 5, Feature::WallInner);
                    let dy1 = self.rng.rnd(2) as i32 * 2;
                    let dy2 = self.rng.rnd(2) as i32 * 2;
                    self.place_secret_door(yval - 3 + dy1, xval - 3);
                    self.place_secret_door(yval - 3 + dy2, xval + 3);
                    self.vault_monsters(yval, xval - 2, AllocMode::SLEEP | AllocMode::GROUP);
                    self.vault_monsters(yval, xval + 2, AllocMode::SLEEP | AllocMode::GROUP);
                    if self.rng.one_in(3) {
                        self.place_object(yval, xval - 2, false, false);
                    }
                    if self.rng.one_in(3) {
                        self.place_object(yval, xval + 2, false, false);
                    }
                }
            }
            4 => {
                // A checkerboard maze.
                self.secret_door_on_side(y1 - 1, x1 - 1, y2 + 1, x2 + 1, yval, xval);
                for y in y1..=y2 {
                    for x in x1..=x2 {
                        if (x + y) & 1 != 0 {
                            self.cave.set_feat_checked(y, x, Feature::WallInner);
                        }
                    }
                }
                self.vault_monsters(yval, xval - 5, AllocMode::SLEEP | AllocMode::GROUP);
                self.vault_monsters(yval, xval + 5, AllocMode::SLEEP | AllocMode::GROUP);
                let west = self.rng.rnd(3);
                let east = self.rng.rnd(3);
                self.vault_traps(yval, xval - 3, 2, 8, west);
                self.vault_traps(yval, xval + 3, 2, 8, east);
                self.vault_objects(yval, xval, 3);
            }
            _ => {
                // Four quarters split by an inner cross.
                for y in y1..=y2 {
                    self.cave.set_feat_checked(y, xval, Feature::WallInner);
                }
                for x in x1..=x2 {
                    self.cave.set_feat_checked(yval, x, Feature::WallInner);
                }
                if self.rng.percent(50) {
                    let i = self.rng.rnd(10) as i32;
                    self.place_secret_door(y1 - 1, xval - i);
                    self.place_secret_door(y1 - 1, xval + i);
                    self.place_secret_door(y2 + 1, xval - i);
                    self.place_secret_door(y2 + 1, xval + i);
                } else {
                    let i = self.rng.rnd(3) as i32;
                    self.place_secret_door(yval + i, x1 - 1);
                    self.place_secret_door(yval - i, x1 - 1);
                    self.place_secret_door(yval + i, x2 + 1);
                    self.place_secret_door(yval - i, x2 + 1);
                }
                let loot = 2 + self.rng.rnd(2);
                self.vault_objects(yval, xval, loot);
                self.vault_monsters(yval + 1, xval - 4, AllocMode::SLEEP | AllocMode::GROUP);
                self.vault_monsters(yval + 1, xval + 4, AllocMode::SLEEP | AllocMode::GROUP);
                self.vault_monsters(yval - 1, xval - 4, AllocMode::SLEEP | AllocMode::GROUP);
                self.vault_monsters(yval - 1, xval + 4, AllocMode::SLEEP | AllocMode::GROUP);
            }
        }
    }

    /// The nest/pit shell: big room, inner chamber, one secret way in.
    fn build_crowded_shell(&mut self, yval: i32, xval: i32) -> (i32, i32, i32, i32) {
        let y1 = yval - 4;
        let y2 = yval + 4;
        let x1 = xval - 11;
        let x2 = xval + 11;

        self.paint_room_floor(y1 - 1, x1 - 1, y2 + 1, x2 + 1, false);
        self.paint_outer_walls(y1 - 1, x1 - 1, y2 + 1, x2 + 1);

        let y1 = y1 + 2;
        let y2 = y2 - 2;
        let x1 = x1 + 2;
        let x2 = x2 - 2;
        self.paint_inner_walls(y1 - 1, x1 - 1, y2 + 1, x2 + 1);
        self.secret_door_on_side(y1 - 1, x1 - 1, y2 + 1, x2 + 1, yval, xval);
        (y1, x1, y2, x2)
    }

    /// A crowded room has a rating bump and can trigger the special
    /// level feeling at shallow-to-middle depths.
    fn crowded_room_feeling(&mut self) {
        self.rating += 10;
        let depth = self.player.depth;
        if depth <= 40 && self.rng.rnd((depth * depth + 1) as u32) < 300 {
            self.good_item_flag = true;
        }
    }

    /// Type 5: monster nest.
    pub(crate) fn build_type5(&mut self, yval: i32, xval: i32) {
        // Inhabitants stay fresh even in persistent dungeons.
        let seeded = self.options.seed_dungeon.is_some();
        if seeded {
            self.rng.push_mode(RngMode::Stable);
        }

        self.build_crowded_shell(yval, xval);
        let level = self.player.depth;
        crate::monster::place_monster(
            &mut self.cave,
            &mut self.rng,
            &self.data,
            &mut self.monsters,
            yval,
            xval,
            level,
            AllocMode::SLEEP | AllocMode::PIT,
        );
        log::debug!("monster nest at ({yval},{xval})");
        self.crowded_room_feeling();

        if seeded {
            self.rng.pop_mode();
        }
    }

    /// Type 6: monster pit.
    pub(crate) fn build_type6(&mut self, yval: i32, xval: i32) {
        let seeded = self.options.seed_dungeon.is_some();
        if seeded {
            self.rng.push_mode(RngMode::Stable);
        }

        self.build_crowded_shell(yval, xval);
        let level = self.player.depth;
        crate::monster::place_monster(
            &mut self.cave,
            &mut self.rng,
            &self.data,
            &mut self.monsters,
            yval,
            xval,
            level,
            AllocMode::SLEEP | AllocMode::PIT | AllocMode::GROUP,
        );
        log::debug!("monster pit at ({yval},{xval})");
        self.crowded_room_feeling();

        if seeded {
            self.rng.pop_mode();
        }
    }

    /// Type 12: circular room.
    pub(crate) fn build_type12(&mut self, yval: i32, xval: i32) {
        let light = self.roll_room_light();
        let rad = self.rng.rand_range(3, 7);

        for y in (yval - rad)..=(yval + rad) {
            for x in (xval - rad)..=(xval + rad) {
                if !self.cave.in_bounds(y, x) {
                    continue;
                }
                if distance(yval, xval, y, x) <= rad {
                    self.cave.set_feat(y, x, Feature::Floor);
                    self.cave.add_flags(y, x, CellFlags::ROOM);
                    if light {
                        self.cave.add_flags(y, x, CellFlags::GLOW);
                    }
                }
            }
        }

        self.wall_in_floor_fringe(yval - rad - 1, xval - rad - 1, yval + rad + 1, xval + rad + 1);
    }

    /// Type 13: a composite of overlapping rectangles.
    pub(crate) fn build_type13(&mut self, yval: i32, xval: i32) {
        let light = self.roll_room_light();
        let num_rects = self.rng.rand_range(2, 3);

        for i in 0..num_rects {
            let h = self.rng.rand_range(3, 9);
            let w = self.rng.rand_range(3, 9);
            let (oy, ox) = if i == 0 {
                (0, 0)
            } else {
                (self.rng.rand_range(-4, 4), self.rng.rand_range(-4, 4))
            };
            let y1 = yval + oy - h / 2;
            let x1 = xval + ox - w / 2;
            for y in y1..=(y1 + h) {
                for x in x1..=(x1 + w) {
                    if !self.cave.in_bounds(y, x) {
                        continue;
                    }
                    self.cave.set_feat(y, x, Feature::Floor);
                    self.cave.add_flags(y, x, CellFlags::ROOM);
                    if light {
                        self.cave.add_flags(y, x, CellFlags::GLOW);
                    }
                }
            }
        }

        self.wall_in_floor_fringe(yval - 15, xval - 15, yval + 15, xval + 15);
    }

    /// Type 14: organic cavern grown by cellular automata.
    pub(crate) fn build_type14(&mut self, yval: i32, xval: i32) {
        let light = self.roll_room_light();
        const H: usize = 20;
        const W: usize = 20;

        // Bordered scratch grid, 45% initial wall noise.
        let mut grid = [[true; W + 2]; H + 2];
        for (y, row) in grid.iter_mut().enumerate() {
            for (x, cell) in row.iter_mut().enumerate() {
                *cell = if y == 0 || y == H + 1 || x == 0 || x == W + 1 {
                    true
                } else {
                    self.rng.percent(45)
                };
            }
        }

        for _ in 0..4 {
            let mut next = grid;
            for y in 1..=H {
                for x in 1..=W {
                    let mut walls = 0;
                    for dy in 0..3 {
                        for dx in 0..3 {
                            if grid[y + dy - 1][x + dx - 1] {
                                walls += 1;
                            }
                        }
                    }
                    next[y][x] = if grid[y][x] { walls >= 4 } else { walls >= 5 };
                }
            }
            grid = next;
        }

        let y1 = yval - (H as i32) / 2;
        let x1 = xval - (W as i32) / 2;
        for y in 0..H as i32 {
            for x in 0..W as i32 {
                if !grid[(y + 1) as usize][(x + 1) as usize] {
                    let gy = y1 + y;
                    let gx = x1 + x;
                    if !self.cave.in_bounds(gy, gx) {
                        continue;
                    }
                    self.cave.set_feat(gy, gx, Feature::Floor);
                    self.cave.add_flags(gy, gx, CellFlags::ROOM);
                    if light {
                        self.cave.add_flags(gy, gx, CellFlags::GLOW);
                    }
                }
            }
        }

        self.wall_in_floor_fringe(y1 - 1, x1 - 1, y1 + H as i32 + 1, x1 + W as i32 + 1);
        // The automata can leave isolated pockets; bridge them.
        self.ensure_connectivity(y1, x1, y1 + H as i32 - 1, x1 + W as i32 - 1);
    }

    /// Type 17: guard post room with fortified corners.
    pub(crate) fn build_type17(&mut self, yval: i32, xval: i32) {
        let light = self.roll_room_light();
        let y1 = yval - 3;
        let y2 = yval + 3;
        let x1 = xval - 9;
        let x2 = xval + 9;

        self.paint_room_floor(y1 - 1, x1 - 1, y2 + 1, x2 + 1, light);
        self.paint_outer_walls(y1 - 1, x1 - 1, y2 + 1, x2 + 1);

        // Watchers on opposite corners, a walker in the middle.
        self.place_guard(y1 + 1, x1 + 1, GuardPost::HighGround);
        self.place_guard(y2 - 1, x2 - 1, GuardPost::HighGround);
        self.place_patrol(yval, xval, PatrolKind::Circuit);

        self.cave.set_feat_checked(y1 + 2, x1 + 2, Feature::Boulder);
        self.cave.set_feat_checked(y2 - 2, x2 - 2, Feature::Boulder);
        self.cave.set_feat_checked(y1 + 2, x2 - 2, Feature::StonePillar);
        self.cave.set_feat_checked(y2 - 2, x1 + 2, Feature::StonePillar);
    }

    /// Type 18: ambush corridor, a floor stripe flanked by tall grass
    /// with sleepers hidden in it.
    pub(crate) fn build_type18(&mut self, yval: i32, xval: i32) {
        let y1 = yval - 2;
        let y2 = yval + 2;
        let x1 = xval - 11;
        let x2 = xval + 11;

        for y in y1..=y2 {
            for x in x1..=x2 {
                if !self.cave.in_bounds(y, x) {
                    continue;
                }
                let feat = if y == yval {
                    Feature::Floor
                } else {
                    Feature::TallGrass
                };
                self.cave.set_feat(y, x, feat);
                self.cave.add_flags(y, x, CellFlags::ROOM);
            }
        }
        for x in (x1 - 1)..=(x2 + 1) {
            self.cave.set_feat_checked(y1 - 1, x, Feature::WallOuter);
            self.cave.set_feat_checked(y2 + 1, x, Feature::WallOuter);
        }

        let num_ambushers = 2 + self.rng.rn2(3);
        let level = self.player.depth;
        for _ in 0..num_ambushers {
            let my = if self.rng.one_in(2) { y1 } else { y2 };
            let mx = x1 + 2 + self.rng.rn2((x2 - x1 - 3) as u32) as i32;
            let placed = crate::monster::place_monster(
                &mut self.cave,
                &mut self.rng,
                &self.data,
                &mut self.monsters,
                my,
                mx,
                level,
                AllocMode::SLEEP | AllocMode::HIDE | AllocMode::JUST_ONE,
            );
            if let Some(m_idx) = placed {
                if let Some(monster) = self.monsters.get_mut(m_idx) {
                    let mut record = GuardRecord::new(my, mx);
                    record.state = GuardState::Sleep;
                    record.patrol = PatrolKind::Stationary;
                    monster.guard = Some(record);
                }
            }
        }
    }

    /// Wall in every non-floor grid of a rectangle that touches floor.
    fn wall_in_floor_fringe(&mut self, y1: i32, x1: i32, y2: i32, x2: i32) {
        for y in y1..=y2 {
            for x in x1..=x2 {
                if !self.cave.in_bounds(y, x) {
                    continue;
                }
                if self.cave.feat(y, x) == Feature::Floor {
                    continue;
                }
                let mut next_to_floor = false;
                for dy in -1..=1 {
                    for dx in -1..=1 {
                        if self.cave.in_bounds(y + dy, x + dx)
                            && self.cave.feat(y + dy, x + dx) == Feature::Floor
                        {
                            next_to_floor = true;
                        }
                    }
                }
                if next_to_floor {
                    self.cave.set_feat(y, x, Feature::WallOuter);
                }
            }
        }
    }

    /// Station a single guard somewhere defensible in a room rectangle:
    /// a doorway, high ground, or failing those any floor grid.
    pub(crate) fn populate_guard_posts(&mut self, y1: i32, x1: i32, y2: i32, x2: i32) {
        for _ in 0..100 {
            let y = self.rng.rand_range(y1, y2.max(y1));
            let x = self.rng.rand_range(x1, x2.max(x1));
            if !self.cave.in_bounds(y, x) || !self.cave.is_floor(y, x) {
                continue;
            }

            if self.rng.percent(50) {
                for dy in -1..=1 {
                    for dx in -1..=1 {
                        if self.cave.in_bounds(y + dy, x + dx)
                            && self.cave.feat(y + dy, x + dx).is_closed_door()
                        {
                            self.place_guard(y, x, GuardPost::Door);
                            return;
                        }
                    }
                }
            }

            if self.cave.elevation(y, x) > crate::cave::Elevation::Ground && self.rng.percent(60) {
                self.place_guard(y, x, GuardPost::HighGround);
                return;
            }

            self.place_guard(y, x, GuardPost::Room);
            return;
        }
    }
}
