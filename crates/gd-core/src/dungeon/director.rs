//! The level director.
//!
//! `cave_gen` drives the standard dungeon pass order; `terrain_gen`
//! synthesises one wilderness tile with seed-stable corners; the town,
//! store, arena, and quest generators are thin vault wrappers on top.

use crate::cave::{CellFlags, Sector};
use crate::consts::{
    DUN_AMT_ALTAR, DUN_AMT_ITEM, DUN_AMT_ROOM, DUN_DEST, DUN_OPEN_CHAOS, DUN_OPEN_FLOOR,
    DUN_OPEN_FOG, DUN_OPEN_MAZE, DUN_OPEN_WATER, DUN_ROOMS, DUN_STR_MAG, DUN_STR_MC, DUN_STR_QC,
    DUN_STR_QUA, DUN_UNUSUAL, DUN_WILD_STAIRS, DUN_WILD_VAULT, MAX_DEPTH, MIN_M_ALLOC_LEVEL,
    MIN_M_ALLOC_WILD_DAY, MIN_M_ALLOC_WILD_NIGHT,
};
use crate::cover::{CoverData, CoverTier};
use crate::data::vault_class;
use crate::dungeon::plasma::{
    plasma_recursive, HeightMap, TERRAIN_LEVEL_BG, TERRAIN_TABLE, TERRAIN_TABLE_SIZE,
};
use crate::dungeon::DunState;
use crate::feature::Feature;
use crate::generator::{GenerationError, Generator, SpecialLevel};
use crate::monster::AllocMode;
use crate::rng::{hash_corner, hash_level, RngMode};

use super::primitives::{AllocKind, AllocSet};

/// Background of a generated level, decided up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LevelBackground {
    Granite,
    OpenFloor,
    ShallowWater,
    ChaosFog,
    /// Per-cell random mix of floor, granite, quartz, and magma.
    Scatter,
    Fog,
}

impl Generator {
    /// Generate a standard dungeon level.
    pub(crate) fn cave_gen(&mut self) -> Result<(), GenerationError> {
        let depth = self.player.depth;

        // Background choice; open levels are rolled first, scaled down
        // when weirdness is rare.
        let mut lit_level = false;
        let mut background = LevelBackground::Granite;
        if self.options.allow_open_levels {
            let scale = if self.options.weirdness_is_rare { 2 } else { 1 };
            if self.rng.percent(DUN_OPEN_FLOOR / scale) {
                background = LevelBackground::OpenFloor;
                lit_level = true;
            } else if self.rng.percent(DUN_OPEN_WATER / scale) {
                background = LevelBackground::ShallowWater;
                lit_level = true;
            } else if self.rng.percent(DUN_OPEN_CHAOS / scale) {
                background = LevelBackground::ChaosFog;
            } else if self.rng.percent(DUN_OPEN_MAZE / scale) {
                background = LevelBackground::Scatter;
                lit_level = true;
            } else if self.rng.percent(DUN_OPEN_FOG / scale) {
                background = LevelBackground::Fog;
            }
        }

        match background {
            LevelBackground::Granite => self.cave.wipe(Feature::WallExtra),
            LevelBackground::OpenFloor => self.cave.wipe(Feature::Floor),
            LevelBackground::ShallowWater => self.cave.wipe(Feature::ShallowWater),
            LevelBackground::ChaosFog => self.cave.wipe(Feature::ChaosFog),
            LevelBackground::Fog => self.cave.wipe(Feature::Fog),
            LevelBackground::Scatter => {
                self.cave.wipe(Feature::Floor);
                for y in 0..self.cave.height() {
                    for x in 0..self.cave.width() {
                        let feat = match (x + y + self.rng.rnd(12) as i32) % 12 {
                            0..=8 => Feature::Floor,
                            9 => Feature::WallExtra,
                            10 => Feature::Quartz,
                            _ => Feature::Magma,
                        };
                        self.cave.set_feat(y, x, feat);
                    }
                }
            }
        }

        let destroyed = depth > 10 && self.rng.one_in(DUN_DEST);

        let row_rooms = self.cave.row_blocks();
        let col_rooms = self.cave.col_blocks();
        self.dun = DunState::new(row_rooms, col_rooms);

        // Quilt the block grid into sectors, biased by depth.
        let mut by = 0;
        while by < row_rooms {
            let mut bx = 0;
            while bx < col_rooms {
                let roll = self.rng.rn2(100) as i32;
                let sector = if roll < depth / 2 {
                    Sector::Cavern
                } else if roll < 10 {
                    Sector::Plaza
                } else if roll < 20 {
                    Sector::Dark
                } else if roll < 40 + depth / 4 {
                    Sector::Hill
                } else if roll < 45 + depth / 5 {
                    Sector::Pit
                } else if roll < 50 + depth / 6 {
                    Sector::Cliff
                } else {
                    Sector::Ruins
                };
                for dy in 0..2 {
                    for dx in 0..2 {
                        if by + dy < row_rooms && bx + dx < col_rooms {
                            self.cave.set_sector(by + dy, bx + dx, sector);
                        }
                    }
                }
                bx += 2;
            }
            by += 2;
        }

        // Build the special sectors and withdraw their blocks.
        let mut by = 0;
        while by < row_rooms {
            let mut bx = 0;
            while bx < col_rooms {
                let sector = self.cave.sector(by, bx);
                if sector != Sector::Ruins {
                    match sector {
                        Sector::Cavern => self.build_sector_cavern(by, bx),
                        Sector::Plaza => self.build_sector_plaza(by, bx),
                        Sector::Dark => self.build_sector_dark(by, bx),
                        Sector::Hill => self.build_sector_hill(by, bx),
                        Sector::Pit => self.build_sector_pit(by, bx),
                        Sector::Cliff => self.build_sector_cliff(by, bx),
                        Sector::Ruins => {}
                    }
                    self.dun.reserve_sector(by, bx);
                    self.dun
                        .push_cent(by * crate::consts::BLOCK_HGT + crate::consts::BLOCK_HGT,
                                   bx * crate::consts::BLOCK_WID + crate::consts::BLOCK_WID);
                }
                bx += 2;
            }
            by += 2;
        }

        // The room pass.
        for _ in 0..DUN_ROOMS {
            let by = self.rng.rn2(row_rooms as u32) as i32;
            let mut bx = self.rng.rn2(col_rooms as u32) as i32;

            if self.cave.sector(by, bx) != Sector::Ruins {
                continue;
            }

            if self.options.dungeon_align {
                if bx % 3 == 0 {
                    bx += 1;
                }
                if bx % 3 == 2 {
                    bx -= 1;
                }
            }

            if destroyed {
                // Destroyed levels are boring.
                self.room_build(by, bx, 1);
                continue;
            }

            if self.options.allow_theme_vaults {
                let chance = if self.options.weirdness_is_rare { 10 } else { 70 };
                if self.rng.percent(chance) && self.room_build(by, bx, 9) {
                    continue;
                }
            }

            if self.rng.rn2(DUN_UNUSUAL) < depth as u32 {
                let k = self.rng.rn2(100);

                if self.rng.rn2(DUN_UNUSUAL) < depth as u32 {
                    if k < 5 && depth >= 10 && self.room_build(by, bx, 17) {
                        continue;
                    }
                    if k < 10 && depth >= 15 && self.room_build(by, bx, 18) {
                        continue;
                    }
                    if k < 20 && depth >= 30 && self.room_build(by, bx, 11) {
                        continue;
                    }
                    if k < 20 && depth >= 40 && self.room_build(by, bx, 10) {
                        continue;
                    }
                    if k < 20 && self.room_build(by, bx, 8) {
                        continue;
                    }
                    if k < 25 && self.room_build(by, bx, 7) {
                        continue;
                    }
                    if k < 50 && self.room_build(by, bx, 6) {
                        continue;
                    }
                    if k < 80 && self.room_build(by, bx, 5) {
                        continue;
                    }
                }

                if k < 25 && self.room_build(by, bx, 4) {
                    continue;
                }
                if k < 50 && self.room_build(by, bx, 3) {
                    continue;
                }
                if k < 100 && self.room_build(by, bx, 2) {
                    continue;
                }
            }

            self.room_build(by, bx, 1);
        }

        self.paint_boundary_ring(Feature::PermSolid);

        // Scramble the center list, then connect consecutive centers.
        if !self.dun.cent.is_empty() {
            for _ in 0..self.dun.cent.len() {
                let a = self.rng.rn2(self.dun.cent.len() as u32) as usize;
                let b = self.rng.rn2(self.dun.cent.len() as u32) as usize;
                self.dun.cent.swap(a, b);
            }
        }

        self.dun.door.clear();

        if !self.dun.cent.is_empty() {
            let (mut py, mut px) = self.dun.cent[self.dun.cent.len() - 1];
            for i in 0..self.dun.cent.len() {
                let (cy, cx) = self.dun.cent[i];
                if self.rng.percent(75) {
                    self.build_tunnel_winding(cy, cx, py, px);
                } else {
                    self.build_tunnel(cy, cx, py, px);
                }
                py = cy;
                px = cx;
            }

            // Extra links keep the corridor graph loopy.
            for i in 0..self.dun.cent.len() {
                if self.rng.percent(40) {
                    let target = self.rng.rn2(self.dun.cent.len() as u32) as usize;
                    if target != i {
                        let (ay, ax) = self.dun.cent[i];
                        let (ty, tx) = self.dun.cent[target];
                        self.build_tunnel_winding(ay, ax, ty, tx);
                    }
                }
            }
        }

        // Junction doors.
        if background == LevelBackground::Granite {
            for i in 0..self.dun.door.len() {
                let (y, x) = self.dun.door[i];
                self.try_door(y, x - 1);
                self.try_door(y, x + 1);
                self.try_door(y - 1, x);
                self.try_door(y + 1, x);
            }
        }

        // Mineral streamers, scaled by level area.
        let scale = self.area_scale();
        if background == LevelBackground::Granite {
            for _ in 0..DUN_STR_MAG * scale {
                let len = 32 + self.rng.rnd(32);
                self.build_streamer(Feature::Magma, DUN_STR_MC, len);
            }
            for _ in 0..DUN_STR_QUA * scale {
                let len = 32 + self.rng.rnd(32);
                self.build_streamer(Feature::Quartz, DUN_STR_QC, len);
            }
        }

        if destroyed {
            self.destroy_level();
        }

        // Nature streamers by depth band.
        if depth <= 2 && self.rng.rnd(20) > 15 {
            for _ in 0..self.rng.rnd(DUN_STR_QUA) {
                self.build_streamer2(Feature::Trees, true);
            }
        }
        if depth <= 19 && self.rng.rnd(20) > 15 {
            for _ in 0..self.rng.rnd(DUN_STR_QUA - 1) {
                self.build_streamer2(Feature::ShallowWater, false);
            }
            if self.rng.rnd(20) > 15 {
                for _ in 0..self.rng.rnd(DUN_STR_QUA) {
                    self.build_streamer2(Feature::DeepWater, true);
                }
            }
        } else if depth > 19 && self.rng.rnd(20) > 15 {
            for _ in 0..self.rng.rnd(DUN_STR_QUA) {
                self.build_streamer2(Feature::ShallowLava, false);
            }
            if self.rng.rnd(20) > 15 {
                for _ in 0..self.rng.rnd(DUN_STR_QUA - 1) {
                    self.build_streamer2(Feature::DeepLava, true);
                }
            }
        } else if self.rng.rnd(10) > 7 {
            for _ in 0..self.rng.rnd(DUN_STR_QUA) {
                self.build_streamer2(Feature::ChaosFog, true);
            }
        }
        if self.rng.rnd(10) > 7 {
            self.build_streamer2(Feature::Oil, false);
        }
        if self.rng.rnd(10) > 7 {
            self.build_streamer2(Feature::Ice, false);
        }
        if self.rng.rnd(10) > 7 {
            self.build_streamer2(Feature::Acid, false);
        }

        // A carver can give up against a bad wall; stitch whatever got
        // disconnected back together before anything is allocated.
        self.connect_level();

        // Stairs near walls; fog backgrounds force them into rooms.
        let force_room = matches!(
            background,
            LevelBackground::Fog | LevelBackground::ChaosFog
        );
        let down = self.rng.rand_range(3, 4) as u32;
        self.alloc_stairs(Feature::DownStairs, down, 3, force_room);
        let up = self.rng.rand_range(1, 3) as u32;
        self.alloc_stairs(Feature::UpStairs, up, 3, force_room);

        self.find_generation_origin();
        self.new_player_spot();

        // Monsters and objects change even in persistent dungeons.
        let seeded = self.options.seed_dungeon.is_some();
        if seeded {
            self.rng.push_mode(RngMode::Stable);
        }

        let k = (depth / 3).clamp(2, 10);

        let mut count = (MIN_M_ALLOC_LEVEL + self.rng.rnd(8)) * 4;
        if !self.dun.crowded {
            count += 100;
        }
        for _ in 0..count + k as u32 {
            if background == LevelBackground::ShallowWater {
                self.alloc_monster(AllocMode::SLEEP | AllocMode::AQUATIC);
            }
            self.alloc_monster(AllocMode::SLEEP);
        }

        // Good items.
        for _ in 0..6 {
            for _ in 0..1000 {
                let y = self.rng.rn2(self.cave.height() as u32) as i32;
                let x = self.rng.rn2(self.cave.width() as u32) as i32;
                if self.cave.is_naked(y, x) {
                    self.place_object(y, x, true, false);
                    break;
                }
            }
        }

        // Small gold piles.
        for _ in 0..50 {
            for _ in 0..1000 {
                let y = self.rng.rn2(self.cave.height() as u32) as i32;
                let x = self.rng.rn2(self.cave.width() as u32) as i32;
                if self.cave.is_naked(y, x) {
                    self.place_gold_small(y, x);
                    break;
                }
            }
        }

        // Traps, scaled by area, with densification at doors and chests.
        let base_traps = 5 + self.rng.rn2(6);
        let total_traps = base_traps * scale;
        self.alloc_object(AllocSet::Both, AllocKind::Trap, total_traps / 2);
        self.alloc_object(AllocSet::Corridor, AllocKind::Trap, total_traps / 2);
        self.place_traps_near_doors(20);
        self.place_traps_near_chests(40);

        // Rubble, objects, and altars.
        let rubble = self.rng.rnd(k as u32);
        self.alloc_object(AllocSet::Corridor, AllocKind::Rubble, rubble);
        let room_objects = self.rng.randnor(DUN_AMT_ROOM as i32, 3).max(0) as u32;
        self.alloc_object(AllocSet::Room, AllocKind::Object, room_objects);
        let altars = self.rng.randnor(DUN_AMT_ALTAR as i32, 3).max(0) as u32;
        self.alloc_object(AllocSet::Room, AllocKind::Altar, altars);
        let loose_objects = self.rng.randnor(DUN_AMT_ITEM as i32, 3).max(0) as u32;
        self.alloc_object(AllocSet::Both, AllocKind::Object, loose_objects);

        self.populate_features();
        self.populate_cover_features();

        // Open lit levels glow everywhere outside room floors.
        if lit_level {
            for y in 0..self.cave.height() {
                for x in 0..self.cave.width() {
                    if !self.cave.has_flag(y, x, CellFlags::ROOM) || !self.cave.is_floor(y, x) {
                        self.cave.add_flags(y, x, CellFlags::GLOW);
                    }
                }
            }
        }

        if seeded {
            self.rng.pop_mode();
        }
        Ok(())
    }

    /// Stitch stranded walkable components onto the main one by carving
    /// through ordinary rock. Breadth-first from the largest component;
    /// whenever the search first touches another walkable component the
    /// wall cells along the search path become floor. Permanent walls,
    /// special walls, and protected interiors are never carved (sealed
    /// chambers connect through their own doors instead).
    pub(crate) fn connect_level(&mut self) {
        let h = self.cave.height();
        let w = self.cave.width();
        let idx = |y: i32, x: i32| (y * w + x) as usize;

        let walkable = |cave: &crate::cave::Cave, y: i32, x: i32| {
            let feat = cave.feat(y, x);
            feat.is_passable() || feat.is_door() || feat == Feature::Rubble
        };
        let carvable = |cave: &crate::cave::Cave, y: i32, x: i32| {
            if !cave.is_valid_for_rewrite(y, x) {
                return false;
            }
            !matches!(
                cave.feat(y, x),
                Feature::SanctumWall | Feature::FollyWall | Feature::Mountain
            )
        };

        // Find the largest walkable component.
        let mut comp = vec![0u32; (h * w) as usize];
        let mut sizes = vec![0usize];
        for sy in 1..h - 1 {
            for sx in 1..w - 1 {
                if comp[idx(sy, sx)] != 0 || !walkable(&self.cave, sy, sx) {
                    continue;
                }
                let label = sizes.len() as u32;
                let mut size = 0usize;
                let mut queue = vec![(sy, sx)];
                comp[idx(sy, sx)] = label;
                while let Some((cy, cx)) = queue.pop() {
                    size += 1;
                    // Movement is eight-way; diagonal-only floors (the
                    // checkerboard mazes) still count as connected.
                    for (dy, dx) in crate::geom::DDD {
                        let ny = cy + dy;
                        let nx = cx + dx;
                        if !self.cave.in_bounds_fully(ny, nx) {
                            continue;
                        }
                        if comp[idx(ny, nx)] == 0 && walkable(&self.cave, ny, nx) {
                            comp[idx(ny, nx)] = label;
                            queue.push((ny, nx));
                        }
                    }
                }
                sizes.push(size);
            }
        }
        if sizes.len() <= 2 {
            return;
        }
        let main = (1..sizes.len()).max_by_key(|&i| sizes[i]).unwrap_or(1) as u32;

        // Breadth-first through walkable and carvable grids alike,
        // rooted on the main component.
        let mut parent = vec![u32::MAX; (h * w) as usize];
        let mut queue = std::collections::VecDeque::new();
        for y in 1..h - 1 {
            for x in 1..w - 1 {
                if comp[idx(y, x)] == main {
                    parent[idx(y, x)] = idx(y, x) as u32;
                    queue.push_back((y, x));
                }
            }
        }
        let mut rescued = vec![false; sizes.len()];
        while let Some((cy, cx)) = queue.pop_front() {
            for (dy, dx) in crate::geom::DDD {
                let ny = cy + dy;
                let nx = cx + dx;
                if !self.cave.in_bounds_fully(ny, nx) {
                    continue;
                }
                if parent[idx(ny, nx)] != u32::MAX {
                    continue;
                }
                let open = walkable(&self.cave, ny, nx);
                if !open && !carvable(&self.cave, ny, nx) {
                    continue;
                }
                parent[idx(ny, nx)] = idx(cy, cx) as u32;
                queue.push_back((ny, nx));

                let label = comp[idx(ny, nx)];
                if open && label != 0 && label != main && !rescued[label as usize] {
                    // Carve the search path back to the main component.
                    rescued[label as usize] = true;
                    let mut cursor = idx(ny, nx) as u32;
                    loop {
                        let cell = cursor as i32;
                        let (py, px) = (cell / w, cell % w);
                        if !walkable(&self.cave, py, px) {
                            self.cave.set_feat(py, px, Feature::Floor);
                        }
                        let up = parent[cursor as usize];
                        if up == cursor {
                            break;
                        }
                        cursor = up;
                    }
                }
            }
        }
    }

    /// Levels scale some allocations by how many 64x64 units they cover.
    fn area_scale(&self) -> u32 {
        let area = (self.cave.height() * self.cave.width()) as u32;
        let standard = 64 * 64;
        (area + standard - 1) / standard
    }

    fn paint_boundary_ring(&mut self, feat: Feature) {
        let h = self.cave.height();
        let w = self.cave.width();
        for x in 0..w {
            self.cave.set_feat(0, x, feat);
            self.cave.set_feat(h - 1, x, feat);
        }
        for y in 0..h {
            self.cave.set_feat(y, 0, feat);
            self.cave.set_feat(y, w - 1, feat);
        }
    }

    /// Place one level-appropriate monster on an empty walkable grid.
    fn alloc_monster(&mut self, mode: AllocMode) {
        let level = self.player.depth;
        for _ in 0..1000 {
            let y = self.rng.rn2(self.cave.height() as u32) as i32;
            let x = self.rng.rn2(self.cave.width() as u32) as i32;
            if !self.cave.is_floor(y, x) || self.cave.monster_at(y, x) != 0 {
                continue;
            }
            if (y, x) == (self.player.py, self.player.px) {
                continue;
            }
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
            return;
        }
    }

    /// Remember where loot-distance scaling measures from: the level's
    /// entry staircase, or the center as a fallback.
    fn find_generation_origin(&mut self) {
        let start_feat = self.start_feature();
        for y in 0..self.cave.height() {
            for x in 0..self.cave.width() {
                if self.cave.feat(y, x) == start_feat {
                    self.generation_origin = (y, x);
                    return;
                }
            }
        }
        self.generation_origin = (self.cave.height() / 2, self.cave.width() / 2);
    }

    fn start_feature(&self) -> Feature {
        if self.player.depth == 0 {
            if self.player.inside_special == Some(SpecialLevel::Wild) {
                Feature::Shaft
            } else {
                Feature::DownStairs
            }
        } else {
            Feature::UpStairs
        }
    }

    /// Drop the player on an entry staircase, or any unprotected naked
    /// grid when no staircase qualifies.
    pub(crate) fn new_player_spot(&mut self) {
        let start_feat = self.start_feature();
        let mut candidates = Vec::new();
        for y in 0..self.cave.height() {
            for x in 0..self.cave.width() {
                if self.cave.feat(y, x) == start_feat && self.cave.monster_at(y, x) == 0 {
                    candidates.push((y, x));
                }
            }
        }
        if !candidates.is_empty() {
            let (y, x) = candidates[self.rng.rn2(candidates.len() as u32) as usize];
            self.player.py = y;
            self.player.px = x;
            return;
        }

        for _ in 0..100_000 {
            let y = self.rng.rand_range(1, self.cave.height() - 2);
            let x = self.rng.rand_range(1, self.cave.width() - 2);
            if !self.cave.is_naked(y, x) {
                continue;
            }
            if self.cave.has_flag(y, x, CellFlags::ICKY) {
                continue;
            }
            self.player.py = y;
            self.player.px = x;
            return;
        }
    }

    /// Move the player while keeping them near a remembered location.
    pub(crate) fn old_player_spot(&mut self) {
        let mut d = 4;
        for _ in 0..10_000 {
            d += 1;
            let (y, x) = crate::geom::scatter(
                &mut self.rng,
                &self.cave,
                self.player.py,
                self.player.px,
                d / 5,
            );
            if !self.cave.is_naked(y, x) {
                continue;
            }
            if self.cave.has_flag(y, x, CellFlags::ICKY) {
                continue;
            }
            self.player.py = y;
            self.player.px = x;
            return;
        }
    }

    /// Generate a wilderness tile with plasma fractals. The corners are
    /// seeded from a stable hash so adjacent tiles agree at their seams.
    pub(crate) fn terrain_gen(&mut self) -> Result<(), GenerationError> {
        let daytime = self.options.daytime;
        let h = self.cave.height();
        let w = self.cave.width();

        // Right after birth the player has no position; let the town
        // vault seat them.
        if self.player.py == 0 && self.player.px == 0 {
            self.vault_place_player = true;
        }

        // Scrolling: walking off an edge moves to the adjacent tile and
        // re-enters through the opposite edge.
        let mut scroll = 0;
        if !self.vault_place_player
            && (self.player.py <= 2
                || self.player.py >= h - 3
                || self.player.px <= 2
                || self.player.px >= w - 3)
        {
            if self.player.py <= 2 {
                scroll = 1;
                self.player.wild_y -= 1;
            } else if self.player.py >= h - 3 {
                scroll = 2;
                self.player.wild_y += 1;
            } else if self.player.px <= 2 {
                scroll = 3;
                self.player.wild_x -= 1;
            } else {
                scroll = 4;
                self.player.wild_x += 1;
            }
        }

        self.cave.wipe(Feature::Floor);

        let table_type = 0usize;
        let roughness = 1;
        let seed_wild = self.options.seed_wild;
        let (wild_x, wild_y) = (self.player.wild_x, self.player.wild_y);

        // Corner heights come from the stable per-corner hash; the
        // interior stream from an independent one.
        let mut map = HeightMap::new(h, w, TERRAIN_LEVEL_BG);
        let corner = |rng: &mut crate::rng::GameRng, cx: i32, cy: i32| {
            rng.reseed_quick(hash_corner(cx, cy, seed_wild));
            rng.scoped(RngMode::Quick, |r| r.rn2(TERRAIN_TABLE_SIZE as u32) as i32)
        };
        let tl = corner(&mut self.rng, wild_x, wild_y);
        let bl = corner(&mut self.rng, wild_x, wild_y + 1);
        let tr = corner(&mut self.rng, wild_x + 1, wild_y);
        let br = corner(&mut self.rng, wild_x + 1, wild_y + 1);
        map.set(1, 1, tl);
        map.set(h - 2, 1, bl);
        map.set(1, w - 2, tr);
        map.set(h - 2, w - 2, br);

        self.rng.reseed_quick(hash_level(wild_x, wild_y, seed_wild));
        self.rng.push_mode(RngMode::Quick);
        {
            let rng = &mut self.rng;
            plasma_recursive(
                &mut map,
                rng,
                1,
                1,
                w - 2,
                h - 2,
                TERRAIN_TABLE_SIZE - 1,
                roughness,
            );
        }

        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let height = map.get(y, x).clamp(0, TERRAIN_TABLE_SIZE - 1);
                let feat = TERRAIN_TABLE[table_type][height as usize];
                self.cave.set_feat(y, x, feat);
                if daytime {
                    self.cave.add_flags(y, x, CellFlags::GLOW);
                }
                if feat.is_passable() {
                    // Pseudo-rooms make the allocators work outdoors.
                    self.cave.add_flags(y, x, CellFlags::ROOM);
                }
            }
        }

        self.paint_boundary_ring(Feature::Unseen);

        // A way down, sometimes.
        if self.rng.percent(DUN_WILD_STAIRS) {
            self.alloc_stairs(Feature::Shaft, 1, 0, false);
        }
        self.rng.pop_mode();

        // Pick the new depth.
        if scroll != 0 {
            if self.player.wild_x == 0 && self.player.wild_y == 0 {
                self.player.depth = 0;
            } else {
                let drift = self.rng.randnor(0, 3);
                self.player.depth = (self.player.depth + drift).clamp(0, MAX_DEPTH - 1);
            }
        } else {
            self.player.depth = self.player.wilderness_depth;
        }

        // Wilderness vaults; the home tile always gets the town.
        if self.rng.percent(DUN_WILD_VAULT) || self.player.depth == 0 {
            let mut number = if self.player.depth != 0 {
                self.rng.randnor(0, 1).abs().max(1)
            } else {
                1
            };
            while number > 0 {
                let vault_index = if self.player.wild_x == 0 && self.player.wild_y == 0 {
                    Some(self.data.town_vault)
                } else if self.player.depth != 0 {
                    self.pick_vault(vault_class::WILD)
                } else {
                    self.pick_vault(vault_class::TOWN)
                };
                let Some(vault_index) = vault_index else {
                    break;
                };
                let vault = &self.data.vaults[vault_index];
                let rat = vault.rat;
                let vh = i32::from(vault.hgt);
                let vw = i32::from(vault.wid);
                self.rating += i32::from(rat);
                let vy = self.rng.rand_range(vh / 2 + 1, h - vh / 2 - 1);
                let vx = self.rng.rand_range(vw / 2 + 1, w - vw / 2 - 1);
                self.build_vault(vy, vx, vault_index)?;
                number -= 1;
            }
        }

        // Seat the player.
        if self.vault_place_player {
            self.vault_place_player = false;
        } else {
            match scroll {
                1 => {
                    self.player.py = h - 3;
                    self.old_player_spot();
                }
                2 => {
                    self.player.py = 2;
                    self.old_player_spot();
                }
                3 => {
                    self.player.px = w - 3;
                    self.old_player_spot();
                }
                4 => {
                    self.player.px = 2;
                    self.old_player_spot();
                }
                _ => {
                    if self.player.wilderness_px > 0 && self.player.wilderness_py > 0 {
                        self.player.py = self.player.wilderness_py;
                        self.player.px = self.player.wilderness_px;
                        self.old_player_spot();
                    } else {
                        self.new_player_spot();
                    }
                }
            }
        }

        // Inhabitants; the home town itself stays quiet.
        let k = (self.player.depth / 3).clamp(2, 10) as u32;
        let base = if daytime {
            MIN_M_ALLOC_WILD_DAY
        } else {
            MIN_M_ALLOC_WILD_NIGHT
        };
        if self.player.depth > 0 || self.player.wild_x != 0 || self.player.wild_y != 0 {
            let count = base + self.rng.rnd(4) + k;
            for _ in 0..count {
                self.alloc_monster(AllocMode::empty());
            }
            // Aquatic spawns are nocturnal.
            let aquatic = MIN_M_ALLOC_WILD_NIGHT + self.rng.rnd(4) + k;
            for _ in 0..aquatic {
                self.alloc_monster(AllocMode::AQUATIC);
            }
        }

        let room_objects = self.rng.randnor(DUN_AMT_ROOM as i32, 3).max(0) as u32;
        self.alloc_object(AllocSet::Room, AllocKind::Object, room_objects);
        let altars = self.rng.randnor(DUN_AMT_ALTAR as i32, 3).max(0) as u32;
        self.alloc_object(AllocSet::Room, AllocKind::Altar, altars);
        let loose = self.rng.randnor(DUN_AMT_ITEM as i32, 3).max(0) as u32;
        self.alloc_object(AllocSet::Room, AllocKind::Object, loose);

        Ok(())
    }

    /// The home town: the wilderness tile at the origin, plus the
    /// scholar.
    pub(crate) fn town_gen(&mut self) -> Result<(), GenerationError> {
        self.player.inside_special = Some(SpecialLevel::Wild);
        self.player.wild_x = 0;
        self.player.wild_y = 0;
        self.terrain_gen()?;
        self.lite_up_town(self.options.daytime);

        if let Some(scholar) = self.data.scholar_race() {
            for _ in 0..1000 {
                let y = self.rng.rand_range(20, self.cave.height() - 20);
                let x = self.rng.rand_range(20, self.cave.width() - 20);
                if self.cave.is_naked(y, x) {
                    crate::monster::place_monster_aux(
                        &mut self.cave,
                        &mut self.rng,
                        &self.data,
                        &mut self.monsters,
                        y,
                        x,
                        scholar,
                        AllocMode::JUST_ONE,
                    );
                    break;
                }
            }
        }
        Ok(())
    }

    /// A store interior: one vault on bedrock.
    pub(crate) fn store_gen(&mut self) -> Result<(), GenerationError> {
        self.cave.wipe(Feature::PermSolid);
        let vault_index = self.data.store_vault;
        let vault = self
            .data
            .vaults
            .get(vault_index)
            .ok_or(GenerationError::CorruptVault { index: vault_index })?;
        let y = i32::from(vault.hgt) / 2 + 2;
        let x = i32::from(vault.wid) / 2 + 2;
        self.build_vault(y, x, vault_index)?;
        self.lite_up_town(self.options.daytime);
        Ok(())
    }

    /// The arena: one vault on bedrock.
    pub(crate) fn arena_gen(&mut self) -> Result<(), GenerationError> {
        self.cave.wipe(Feature::PermSolid);
        let vault_index = self.data.arena_vault;
        let vault = self
            .data
            .vaults
            .get(vault_index)
            .ok_or(GenerationError::CorruptVault { index: vault_index })?;
        let y = i32::from(vault.hgt) / 2 + 2;
        let x = i32::from(vault.wid) / 2 + 2;
        self.build_vault(y, x, vault_index)?;
        self.lite_up_town(self.options.daytime);
        Ok(())
    }

    /// A quest level: the quest vault on the base its record asks for.
    pub(crate) fn quest_gen(&mut self, which: usize) -> Result<(), GenerationError> {
        let vault = self
            .data
            .vaults
            .get(which)
            .filter(|v| v.typ == vault_class::QUEST)
            .cloned()
            .ok_or(GenerationError::CorruptVault { index: which })?;

        match vault.gen_info {
            1 => {
                // A wilderness base somewhere far away.
                self.player.wild_x = self.rng.rand_range(-100, 100);
                self.player.wild_y = self.rng.rand_range(-100, 100);
                let special = self.player.inside_special;
                self.player.inside_special = Some(SpecialLevel::Wild);
                self.terrain_gen()?;
                self.player.inside_special = special;
            }
            2 => self.cave.wipe(Feature::Fog),
            _ => self.cave.wipe(Feature::PermSolid),
        }

        let h = self.cave.height();
        let w = self.cave.width();
        let vh = i32::from(vault.hgt);
        let vw = i32::from(vault.wid);

        // Vault placement repeats under a fixed dungeon seed.
        let y;
        let x;
        if let Some(seed) = self.options.seed_dungeon {
            self.rng.reseed_quick(u64::from(seed) ^ which as u64);
            let bounds = (vh, vw, h, w);
            let (qy, qx) = self.rng.scoped(RngMode::Quick, |r| {
                (
                    r.rand_range(bounds.0 / 2 + 1, bounds.2 - bounds.0 / 2 - 1),
                    r.rand_range(bounds.1 / 2 + 1, bounds.3 - bounds.1 / 2 - 1),
                )
            });
            y = qy;
            x = qx;
        } else {
            y = self.rng.rand_range(vh / 2 + 1, h - vh / 2 - 1);
            x = self.rng.rand_range(vw / 2 + 1, w - vw / 2 - 1);
        }

        self.build_vault(y, x, which)?;
        Ok(())
    }

    /// Day/night lighting for town-like levels: everything glows during
    /// the day, and storefronts glow around the clock.
    pub(crate) fn lite_up_town(&mut self, daytime: bool) {
        if daytime {
            for y in 0..self.cave.height() {
                for x in 0..self.cave.width() {
                    self.cave.add_flags(y, x, CellFlags::GLOW);
                }
            }
        }
        for y in 1..self.cave.height() - 1 {
            for x in 1..self.cave.width() - 1 {
                let feat = self.cave.feat(y, x);
                if feat.is_shop() || feat.is_building() || feat == Feature::StoreExit {
                    for dy in -1..=1 {
                        for dx in -1..=1 {
                            self.cave.add_flags(y + dy, x + dx, CellFlags::GLOW);
                        }
                    }
                }
            }
        }
    }

    /// The feature pass: ruins, glowing tiles, fountains, the
    /// cartographer's desk, and heroic remains in dead ends.
    pub(crate) fn populate_features(&mut self) {
        let depth = self.player.depth;

        if depth > 0 && self.rng.percent(5) {
            self.place_ancient_ruin();
        }

        if depth > 0 {
            let count = self.rng.rand_range(3, 8);
            for _ in 0..count {
                for _ in 0..1000 {
                    let y = self.rng.rand_range(1, self.cave.height() - 2);
                    let x = self.rng.rand_range(1, self.cave.width() - 2);
                    if self.cave.is_naked(y, x) {
                        self.cave.set_feat(y, x, Feature::GlowingTile);
                        break;
                    }
                }
            }
        }

        let fountains = self.rng.rand_range(2, 5);
        for _ in 0..fountains {
            for _ in 0..1000 {
                let y = self.rng.rn2(self.cave.height() as u32) as i32;
                let x = self.rng.rn2(self.cave.width() as u32) as i32;
                if self.cave.is_clean(y, x) && self.cave.has_flag(y, x, CellFlags::ROOM) {
                    self.cave.set_feat(y, x, Feature::Fountain);
                    break;
                }
            }
        }

        if self.rng.percent(40) {
            for _ in 0..1000 {
                let y = self.rng.rn2(self.cave.height() as u32) as i32;
                let x = self.rng.rn2(self.cave.width() as u32) as i32;
                if self.cave.is_clean(y, x) && self.cave.has_flag(y, x, CellFlags::ROOM) {
                    self.cave.set_feat(y, x, Feature::Cartographer);
                    break;
                }
            }
        }

        let remains = self.rng.rand_range(1, 3);
        for _ in 0..remains {
            for _ in 0..1000 {
                let y = self.rng.rand_range(1, self.cave.height() - 2);
                let x = self.rng.rand_range(1, self.cave.width() - 2);
                if self.cave.is_naked(y, x) && self.cave.next_to_walls(y, x) >= 3 {
                    self.cave.set_feat(y, x, Feature::HeroicRemains);
                    break;
                }
            }
        }
    }

    /// The cover pass: scatter destructible cover around room centers.
    /// Must run after every terrain mutation, or later passes would
    /// overwrite the records.
    pub fn populate_cover_features(&mut self) {
        for i in 0..self.dun.cent.len() {
            let (y, x) = self.dun.cent[i];
            if !self.rng.percent(50) {
                continue;
            }
            let count = 2 + self.rng.rn2(4);
            for _ in 0..count {
                let ty = self.rng.rand_spread(y, 4);
                let tx = self.rng.rand_spread(x, 4);
                if !self.cave.in_bounds(ty, tx) || !self.cave.is_naked(ty, tx) {
                    continue;
                }
                if self.cave.has_flag(ty, tx, CellFlags::ICKY) {
                    continue;
                }
                let roll = self.rng.rn2(100);
                let (feat, durability, tier) = if roll < 30 {
                    (
                        Feature::Crate,
                        crate::consts::COVER_DURABILITY_CRATE,
                        CoverTier::Light,
                    )
                } else if roll < 50 {
                    (
                        Feature::Barrel,
                        crate::consts::COVER_DURABILITY_BARREL,
                        CoverTier::Light,
                    )
                } else if roll < 70 {
                    (
                        Feature::StonePillar,
                        crate::consts::COVER_DURABILITY_WALL,
                        CoverTier::Heavy,
                    )
                } else {
                    (
                        Feature::Boulder,
                        crate::consts::COVER_DURABILITY_BOULDER,
                        CoverTier::Medium,
                    )
                };
                self.cave
                    .install_cover(ty, tx, CoverData::new(tier, durability, feat));
            }
        }

        // Cover may have landed on someone's patrol stop; blocked
        // waypoints collapse to home.
        let indices: Vec<u16> = self.monsters.indices().collect();
        for m_idx in indices {
            let Some(monster) = self.monsters.get(m_idx) else {
                continue;
            };
            let Some(record) = monster.guard.as_ref() else {
                continue;
            };
            let home = (record.home_y, record.home_x);
            let blocked: Vec<usize> = record
                .waypoints
                .iter()
                .enumerate()
                .filter(|(_, wp)| !self.cave.is_floor(wp.y, wp.x))
                .map(|(i, _)| i)
                .collect();
            if blocked.is_empty() {
                continue;
            }
            if let Some(monster) = self.monsters.get_mut(m_idx) {
                if let Some(record) = monster.guard.as_mut() {
                    for i in blocked {
                        record.waypoints[i].y = home.0;
                        record.waypoints[i].x = home.1;
                    }
                }
            }
        }
    }

    /// Rarely, a collapsed city block: a rubble field with cross streets
    /// and a few buried doorways.
    pub(crate) fn place_ancient_ruin(&mut self) {
        for _ in 0..100 {
            let y = self.rng.rand_range(10, self.cave.height() - 30);
            let x = self.rng.rand_range(10, self.cave.width() - 30);

            let mut safe = true;
            'check: for dy in 0..20 {
                for dx in 0..20 {
                    let ty = y + dy;
                    let tx = x + dx;
                    if !self.cave.in_bounds(ty, tx)
                        || self.cave.is_perma(ty, tx)
                        || self.cave.has_flag(ty, tx, CellFlags::ROOM)
                        || matches!(
                            self.cave.feat(ty, tx),
                            Feature::Shaft | Feature::QuestEnter | Feature::QuestExit
                        )
                    {
                        safe = false;
                        break 'check;
                    }
                }
            }
            if !safe {
                continue;
            }

            for dy in 0..20 {
                for dx in 0..20 {
                    let feat = if self.rng.percent(70) {
                        Feature::Rubble
                    } else {
                        Feature::Floor
                    };
                    self.cave.set_feat(y + dy, x + dx, feat);
                    // Marked as a room so stairs avoid the field.
                    self.cave.add_flags(y + dy, x + dx, CellFlags::ROOM);
                }
            }
            for dy in 0..20 {
                self.cave.set_feat(y + dy, x + 10, Feature::Floor);
            }
            for dx in 0..20 {
                self.cave.set_feat(y + 10, x + dx, Feature::Floor);
            }

            let doors = self.rng.rand_range(1, 3);
            for _ in 0..doors {
                for _ in 0..100 {
                    let ty = self.rng.rand_range(y + 1, y + 18);
                    let tx = self.rng.rand_range(x + 1, x + 18);
                    if self.cave.feat(ty, tx) == Feature::Rubble {
                        self.cave.set_feat(ty, tx, Feature::RuinDoor);
                        break;
                    }
                }
            }

            log::debug!("ancient ruin at ({y},{x})");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::GameData;
    use crate::generator::GenOptions;

    #[test]
    fn ancient_ruin_respects_rooms() {
        let mut generator = Generator::new(GameData::sample(), GenOptions::default(), 51);
        generator.player.depth = 8;
        generator.cave.wipe(Feature::WallExtra);
        // Flag everything as rooms: no placement site exists.
        for y in 0..generator.cave.height() {
            for x in 0..generator.cave.width() {
                generator.cave.add_flags(y, x, CellFlags::ROOM);
            }
        }
        generator.place_ancient_ruin();
        let rubble = generator
            .cave
            .feature_stream()
            .iter()
            .filter(|&&f| f == Feature::Rubble.repr())
            .count();
        assert_eq!(rubble, 0);
    }

    #[test]
    fn cover_pass_installs_records_near_centers() {
        let mut generator = Generator::new(GameData::sample(), GenOptions::default(), 9);
        generator.player.depth = 6;
        generator.cave.wipe(Feature::Floor);
        for i in 0..20 {
            generator.dun.push_cent(20 + i, 40 + 3 * i);
        }
        generator.populate_cover_features();
        let covers = generator.cave.cover_pool.iter().count();
        assert!(covers > 0, "some centers rolled cover");
        for (_, data) in generator.cave.cover_pool.iter() {
            assert!(data.durability > 0);
            assert!(data.durability <= data.max_durability);
        }
    }

    #[test]
    fn lite_up_town_lights_storefronts_at_night() {
        let mut generator = Generator::new(GameData::sample(), GenOptions::default(), 5);
        generator.cave.wipe(Feature::Floor);
        generator.cave.set_feat(10, 10, Feature::Shop3);
        generator.lite_up_town(false);
        assert!(generator.cave.has_flag(9, 9, CellFlags::GLOW));
        assert!(generator.cave.has_flag(11, 11, CellFlags::GLOW));
        assert!(!generator.cave.has_flag(40, 40, CellFlags::GLOW));
    }
}
