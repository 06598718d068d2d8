//! Corridor construction.
//!
//! Two carvers share the same bookkeeping and wall-piercing rules. A
//! tunnel may pierce a room's outer wall exactly one grid at a time;
//! every piercing converts the surrounding outer walls to solid walls so
//! that no second corridor can enter through an adjacent grid.
//!
//! Both carvers queue their work in the scratch arrays and only commit
//! at the end, which keeps a self-intersecting corridor from spraying
//! doors along its own length.

use crate::cave::CellFlags;
use crate::consts::{DUN_TUN_CHG, DUN_TUN_CON, DUN_TUN_JCT, DUN_TUN_PEN, DUN_TUN_RND};
use crate::feature::Feature;
use crate::generator::Generator;
use crate::geom::DDD;

/// Grids a tunnel may never enter: the dungeon border, vault edges,
/// hardened granite, and the special wall kinds.
fn tunnel_blocked(feat: Feature) -> bool {
    matches!(
        feat,
        Feature::PermSolid
            | Feature::PermOuter
            | Feature::WallSolid
            | Feature::SanctumWall
            | Feature::FollyWall
            | Feature::Mountain
    )
}

impl Generator {
    /// The cardinal direction from `(y1, x1)` toward `(y2, x2)`,
    /// breaking diagonals by coin flip.
    fn correct_dir(&mut self, y1: i32, x1: i32, y2: i32, x2: i32) -> (i32, i32) {
        let mut rdir = (y2 - y1).signum();
        let mut cdir = (x2 - x1).signum();
        if rdir != 0 && cdir != 0 {
            if self.rng.percent(50) {
                rdir = 0;
            } else {
                cdir = 0;
            }
        }
        (rdir, cdir)
    }

    fn rand_dir(&mut self) -> (i32, i32) {
        DDD[self.rng.rn2(4) as usize]
    }

    /// Carve a mostly straight tunnel with occasional bends between two
    /// points. Must run before streamers: the granite sub-types still
    /// distinguish legal piercing grids.
    pub(crate) fn build_tunnel(&mut self, row1: i32, col1: i32, row2: i32, col2: i32) {
        self.dun.tunn.clear();
        self.dun.wall.clear();

        let mut row1 = row1;
        let mut col1 = col1;
        let start_row = row1;
        let start_col = col1;
        let mut door_flag = false;
        let mut loops = 0;

        let (mut row_dir, mut col_dir) = self.correct_dir(row1, col1, row2, col2);

        'carve: while row1 != row2 || col1 != col2 {
            loops += 1;
            if loops > 2000 {
                break;
            }

            if self.rng.percent(DUN_TUN_CHG) {
                let d = self.correct_dir(row1, col1, row2, col2);
                row_dir = d.0;
                col_dir = d.1;
                if self.rng.percent(DUN_TUN_RND) {
                    let d = self.rand_dir();
                    row_dir = d.0;
                    col_dir = d.1;
                }
            }

            let mut tmp_row = row1 + row_dir;
            let mut tmp_col = col1 + col_dir;

            // Never leave the dungeon.
            let mut redirects = 0;
            while !self.cave.in_bounds_fully(tmp_row, tmp_col) {
                redirects += 1;
                if redirects > 100 {
                    break 'carve;
                }
                let d = self.correct_dir(row1, col1, row2, col2);
                row_dir = d.0;
                col_dir = d.1;
                if self.rng.percent(DUN_TUN_RND) {
                    let d = self.rand_dir();
                    row_dir = d.0;
                    col_dir = d.1;
                }
                tmp_row = row1 + row_dir;
                tmp_col = col1 + col_dir;
            }

            let feat = self.cave.feat(tmp_row, tmp_col);

            if tunnel_blocked(feat) {
                continue;
            }
            // Protected vault interiors are never entered or rewritten.
            if self.cave.has_flag(tmp_row, tmp_col, CellFlags::ICKY) {
                continue;
            }

            if feat == Feature::WallOuter {
                // Pierce an outer wall: the next grid along the same
                // direction must not be another outer/solid wall.
                let y = tmp_row + row_dir;
                let x = tmp_col + col_dir;
                let next = self.cave.feat(y, x);
                if matches!(
                    next,
                    Feature::PermSolid | Feature::PermOuter | Feature::WallOuter | Feature::WallSolid
                ) {
                    continue;
                }

                row1 = tmp_row;
                col1 = tmp_col;
                self.dun.push_wall(row1, col1);

                // Forbid re-entry next to this piercing.
                for wy in (row1 - 1)..=(row1 + 1) {
                    for wx in (col1 - 1)..=(col1 + 1) {
                        if self.cave.feat(wy, wx) == Feature::WallOuter {
                            self.cave.set_feat(wy, wx, Feature::WallSolid);
                        }
                    }
                }
            } else if self.cave.has_flag(tmp_row, tmp_col, CellFlags::ROOM) {
                // Travel freely through rooms.
                row1 = tmp_row;
                col1 = tmp_col;
            } else if feat.is_granite_or_harder() {
                // Carve through plain granite.
                row1 = tmp_row;
                col1 = tmp_col;
                self.dun.push_tunn(row1, col1);
                door_flag = false;
            } else {
                // Corridor intersection or open ground.
                row1 = tmp_row;
                col1 = tmp_col;

                if !door_flag {
                    self.dun.push_door(row1, col1);
                    door_flag = true;
                }

                // Occasionally stop early once far enough off-axis.
                if !self.rng.percent(DUN_TUN_CON) {
                    let dr = (row1 - start_row).abs();
                    let dc = (col1 - start_col).abs();
                    if dr > 10 || dc > 10 {
                        break;
                    }
                }
            }
        }

        self.commit_tunnel();
    }

    /// Carve a drunken-walk tunnel. Respects the same piercing rules as
    /// the straight carver; if the walk fails to reach the target within
    /// its budget the straight carver takes over.
    pub(crate) fn build_tunnel_winding(&mut self, row1: i32, col1: i32, row2: i32, col2: i32) {
        self.dun.tunn.clear();
        self.dun.wall.clear();

        let mut y = row1;
        let mut x = col1;
        let mut door_flag = false;
        let mut loops = 0;

        while (y != row2 || x != col2) && loops < 20_000 {
            loops += 1;

            let (dir_y, dir_x) = if self.rng.percent(60) {
                // Step a cardinal component toward the target.
                let mut dy = (row2 - y).signum();
                let mut dx = (col2 - x).signum();
                if dy != 0 && dx != 0 {
                    if self.rng.one_in(2) {
                        dx = 0;
                    } else {
                        dy = 0;
                    }
                }
                (dy, dx)
            } else {
                DDD[self.rng.rn2(4) as usize]
            };

            if !self.cave.in_bounds_fully(y + dir_y, x + dir_x) {
                continue;
            }
            let ny = y + dir_y;
            let nx = x + dir_x;
            let feat = self.cave.feat(ny, nx);

            if tunnel_blocked(feat) {
                continue;
            }
            if self.cave.has_flag(ny, nx, CellFlags::ICKY) {
                continue;
            }

            if feat == Feature::WallOuter {
                // Same piercing discipline as the straight carver.
                let next = self.cave.feat(ny + dir_y, nx + dir_x);
                if matches!(
                    next,
                    Feature::PermSolid | Feature::PermOuter | Feature::WallOuter | Feature::WallSolid
                ) {
                    continue;
                }

                y = ny;
                x = nx;
                self.dun.push_wall(y, x);

                for wy in (y - 1)..=(y + 1) {
                    for wx in (x - 1)..=(x + 1) {
                        if self.cave.feat(wy, wx) == Feature::WallOuter {
                            self.cave.set_feat(wy, wx, Feature::WallSolid);
                        }
                    }
                }
            } else if self.cave.has_flag(ny, nx, CellFlags::ROOM) {
                y = ny;
                x = nx;
            } else if feat.is_granite_or_harder() {
                y = ny;
                x = nx;
                self.dun.push_tunn(y, x);
                door_flag = false;
            } else {
                y = ny;
                x = nx;
                if !door_flag {
                    self.dun.push_door(y, x);
                    door_flag = true;
                }
            }
        }

        if loops >= 20_000 {
            self.build_tunnel(row1, col1, row2, col2);
            return;
        }

        self.commit_tunnel();
    }

    /// Convert the queued tunnel grids to floor and apply the wall
    /// piercings, each with its door chance.
    fn commit_tunnel(&mut self) {
        for i in 0..self.dun.tunn.len() {
            let (y, x) = self.dun.tunn[i];
            self.cave.set_feat(y, x, Feature::Floor);
        }
        for i in 0..self.dun.wall.len() {
            let (y, x) = self.dun.wall[i];
            self.cave.set_feat(y, x, Feature::Floor);
            if self.rng.percent(DUN_TUN_PEN) {
                self.place_random_door(y, x);
            }
        }
    }

    /// Count plain corridor floors cardinally adjacent to a grid.
    fn next_to_corr(&self, y1: i32, x1: i32) -> i32 {
        let mut k = 0;
        for (dy, dx) in &DDD[0..4] {
            let y = y1 + dy;
            let x = x1 + dx;
            if self.cave.feat(y, x) != Feature::Floor {
                continue;
            }
            if self.cave.has_flag(y, x, CellFlags::ROOM) {
                continue;
            }
            k += 1;
        }
        k
    }

    /// A grid between two walls and next to two corridor floors can
    /// take a junction door.
    fn possible_doorway(&self, y: i32, x: i32) -> bool {
        if self.next_to_corr(y, x) < 2 {
            return false;
        }
        if self.cave.feat(y - 1, x).is_wall_like() && self.cave.feat(y + 1, x).is_wall_like() {
            return true;
        }
        if self.cave.feat(y, x - 1).is_wall_like() && self.cave.feat(y, x + 1).is_wall_like() {
            return true;
        }
        false
    }

    /// Maybe place a door at a corridor junction.
    pub(crate) fn try_door(&mut self, y: i32, x: i32) {
        if !self.cave.in_bounds_fully(y, x) {
            return;
        }
        if self.cave.feat(y, x).is_wall_like() {
            return;
        }
        if self.cave.has_flag(y, x, CellFlags::ROOM) {
            return;
        }
        if self.rng.percent(DUN_TUN_JCT) && self.possible_doorway(y, x) {
            self.place_random_door(y, x);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::GameData;
    use crate::generator::GenOptions;

    fn granite_generator() -> Generator {
        let mut generator = Generator::new(GameData::sample(), GenOptions::default(), 17);
        generator.player.depth = 5;
        generator.cave.wipe(Feature::WallExtra);
        for x in 0..generator.cave.width() {
            generator.cave.set_feat(0, x, Feature::PermSolid);
            let h = generator.cave.height() - 1;
            generator.cave.set_feat(h, x, Feature::PermSolid);
        }
        for y in 0..generator.cave.height() {
            generator.cave.set_feat(y, 0, Feature::PermSolid);
            let w = generator.cave.width() - 1;
            generator.cave.set_feat(y, w, Feature::PermSolid);
        }
        generator
    }

    /// Paint a walled room with floor inside and outer walls around it.
    fn paint_room(generator: &mut Generator, y1: i32, x1: i32, y2: i32, x2: i32) {
        for y in (y1 - 1)..=(y2 + 1) {
            for x in (x1 - 1)..=(x2 + 1) {
                generator.cave.set_feat(y, x, Feature::Floor);
                generator.cave.add_flags(y, x, CellFlags::ROOM);
            }
        }
        for y in (y1 - 1)..=(y2 + 1) {
            generator.cave.set_feat(y, x1 - 1, Feature::WallOuter);
            generator.cave.set_feat(y, x2 + 1, Feature::WallOuter);
        }
        for x in (x1 - 1)..=(x2 + 1) {
            generator.cave.set_feat(y1 - 1, x, Feature::WallOuter);
            generator.cave.set_feat(y2 + 1, x, Feature::WallOuter);
        }
    }

    fn connected(generator: &Generator, from: (i32, i32), to: (i32, i32)) -> bool {
        let cave = &generator.cave;
        let mut seen = vec![false; (cave.height() * cave.width()) as usize];
        let mut queue = vec![from];
        seen[(from.0 * cave.width() + from.1) as usize] = true;
        while let Some((y, x)) = queue.pop() {
            if (y, x) == to {
                return true;
            }
            for (dy, dx) in &DDD[0..4] {
                let ny = y + dy;
                let nx = x + dx;
                if !cave.in_bounds(ny, nx) {
                    continue;
                }
                let idx = (ny * cave.width() + nx) as usize;
                if seen[idx] {
                    continue;
                }
                let feat = cave.feat(ny, nx);
                if feat.is_passable() || feat.is_door() {
                    seen[idx] = true;
                    queue.push((ny, nx));
                }
            }
        }
        false
    }

    #[test]
    fn straight_tunnel_connects_two_rooms() {
        let mut generator = granite_generator();
        paint_room(&mut generator, 10, 10, 16, 20);
        paint_room(&mut generator, 40, 150, 46, 160);
        generator.build_tunnel(13, 15, 43, 155);
        assert!(connected(&generator, (13, 15), (43, 155)));
    }

    #[test]
    fn winding_tunnel_connects_two_rooms() {
        let mut generator = granite_generator();
        paint_room(&mut generator, 10, 10, 16, 20);
        paint_room(&mut generator, 40, 150, 46, 160);
        generator.build_tunnel_winding(13, 15, 43, 155);
        assert!(connected(&generator, (13, 15), (43, 155)));
    }

    #[test]
    fn piercing_hardens_adjacent_outer_walls() {
        let mut generator = granite_generator();
        paint_room(&mut generator, 10, 10, 16, 20);
        paint_room(&mut generator, 10, 60, 16, 70);
        generator.build_tunnel(13, 15, 13, 65);

        // The piercing queue survives the commit; every pierced grid
        // must have hardened its remaining outer-wall neighbours.
        let piercings: Vec<(i32, i32)> = generator.dun.wall.clone();
        assert!(!piercings.is_empty(), "the tunnel pierced at least one wall");
        for (y, x) in piercings {
            let feat = generator.cave.feat(y, x);
            assert!(feat == Feature::Floor || feat.is_door());
            for (dy, dx) in DDD {
                assert_ne!(
                    generator.cave.feat(y + dy, x + dx),
                    Feature::WallOuter,
                    "outer wall left adjacent to piercing at ({y},{x})"
                );
            }
        }
    }

    #[test]
    fn tunnels_never_touch_perm_walls() {
        let mut generator = granite_generator();
        paint_room(&mut generator, 10, 10, 16, 20);
        // A vault-like permanent box in the path.
        for y in 20..30 {
            for x in 40..60 {
                generator.cave.set_feat(y, x, Feature::PermOuter);
            }
        }
        generator.build_tunnel(13, 15, 50, 180);
        for y in 20..30 {
            for x in 40..60 {
                assert_eq!(generator.cave.feat(y, x), Feature::PermOuter);
            }
        }
    }

    #[test]
    fn junction_door_needs_two_corridors_between_walls() {
        let mut generator = granite_generator();
        // A straight corridor of floor through granite.
        for x in 50..60 {
            generator.cave.set_feat(30, x, Feature::Floor);
        }
        // Junction candidate mid-corridor: walls above and below, floor
        // either side.
        assert!(generator.possible_doorway(30, 55));
        // A grid in open floor does not qualify.
        for y in 28..33 {
            for x in 70..80 {
                generator.cave.set_feat(y, x, Feature::Floor);
            }
        }
        assert!(!generator.possible_doorway(30, 75));
    }
}
