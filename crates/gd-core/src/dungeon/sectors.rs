//! Sector builders.
//!
//! The dungeon is quilted at 2x2-block granularity; each non-ruins
//! sector square is synthesised whole by one of these builders and its
//! blocks are withdrawn from room placement.

use crate::cave::{CellFlags, Elevation};
use crate::consts::{BLOCK_HGT, BLOCK_WID};
use crate::dungeon::plasma::{plasma_recursive, HeightMap};
use crate::feature::Feature;
use crate::generator::Generator;
use crate::geom::distance;
use crate::monster::AllocMode;

impl Generator {
    /// Grid rectangle of the sector rooted at block `(by, bx)`, clamped
    /// at the dungeon edge.
    fn sector_rect(&self, by: i32, bx: i32) -> (i32, i32, i32, i32) {
        let y1 = by * BLOCK_HGT;
        let x1 = bx * BLOCK_WID;
        let y2 = ((by + 2) * BLOCK_HGT).min(self.cave.height() - 1);
        let x2 = ((bx + 2) * BLOCK_WID).min(self.cave.width() - 1);
        (y1, x1, y2, x2)
    }

    /// Cavern sector: plasma-thresholded open rock.
    pub(crate) fn build_sector_cavern(&mut self, by: i32, bx: i32) {
        let (y1, x1, y2, x2) = self.sector_rect(by, bx);
        let h = y2 - y1 + 1;
        let w = x2 - x1 + 1;

        let mut map = HeightMap::new(h, w, 0);
        map.set(0, 0, self.rng.rn2(100) as i32);
        map.set(0, w - 1, self.rng.rn2(100) as i32);
        map.set(h - 1, 0, self.rng.rn2(100) as i32);
        map.set(h - 1, w - 1, self.rng.rn2(100) as i32);
        plasma_recursive(&mut map, &mut self.rng, 0, 0, w - 1, h - 1, 100, 1);

        for y in 0..h {
            for x in 0..w {
                let gy = y1 + y;
                let gx = x1 + x;
                if map.get(y, x) > 50 {
                    self.cave.set_feat(gy, gx, Feature::Floor);
                    self.cave.add_flags(gy, gx, CellFlags::ROOM);
                } else {
                    self.cave.set_feat(gy, gx, Feature::WallInner);
                }
            }
        }
    }

    /// Plaza sector: open floor crossed by hazard streams, with forced
    /// bridge patches.
    pub(crate) fn build_sector_plaza(&mut self, by: i32, bx: i32) {
        let (y1, x1, y2, x2) = self.sector_rect(by, bx);

        for y in y1..=y2 {
            for x in x1..=x2 {
                self.cave.set_feat(y, x, Feature::Floor);
                self.cave.add_flags(y, x, CellFlags::ROOM);
            }
        }

        let hazard = match self.rng.rn2(3) {
            0 => Feature::ShallowLava,
            1 => Feature::Acid,
            _ => Feature::Ice,
        };

        let num_streams = 1 + self.rng.rn2(3);
        for _ in 0..num_streams {
            let (sy, sx, ey, ex) = if self.rng.one_in(2) {
                (
                    y1 + 1,
                    self.rng.rand_range(x1 + 1, x2 - 1),
                    y2 - 1,
                    self.rng.rand_range(x1 + 1, x2 - 1),
                )
            } else {
                (
                    self.rng.rand_range(y1 + 1, y2 - 1),
                    x1 + 1,
                    self.rng.rand_range(y1 + 1, y2 - 1),
                    x2 - 1,
                )
            };

            let mut cy = sy;
            let mut cx = sx;
            let mut safety = 0;
            while (cy != ey || cx != ex) && safety < 1000 {
                safety += 1;
                self.cave.set_feat(cy, cx, hazard);

                let mut dy = (ey - cy).signum();
                let mut dx = (ex - cx).signum();
                if self.rng.percent(30) {
                    dy = self.rng.rand_range(-1, 1);
                    dx = self.rng.rand_range(-1, 1);
                }
                let ny = cy + dy;
                let nx = cx + dx;
                if ny >= y1 && ny <= y2 && nx >= x1 && nx <= x2 {
                    cy = ny;
                    cx = nx;
                }
            }
        }

        // Two guaranteed crossing patches.
        for _ in 0..2 {
            let py = self.rng.rand_range(y1 + 2, y2 - 2);
            let px = self.rng.rand_range(x1 + 2, x2 - 2);
            for dy in -1..=1 {
                for dx in -1..=1 {
                    self.cave.set_feat_checked(py + dy, px + dx, Feature::Floor);
                }
            }
        }

        self.ensure_connectivity(y1, x1, y2, x2);
    }

    /// Dark sector: noise smoothed into a labyrinth, with one glowing
    /// prize at its heart.
    pub(crate) fn build_sector_dark(&mut self, by: i32, bx: i32) {
        let (y1, x1, y2, x2) = self.sector_rect(by, bx);
        let h = y2 - y1 + 1;
        let w = x2 - x1 + 1;

        for y in y1..=y2 {
            for x in x1..=x2 {
                let feat = if self.rng.percent(40) {
                    Feature::WallExtra
                } else {
                    Feature::Floor
                };
                self.cave.set_feat(y, x, feat);
                self.cave.add_flags(y, x, CellFlags::ROOM);
            }
        }

        // Cellular smoothing: walls persist at 4+ neighbours, grow at 5+.
        for _ in 0..4 {
            let mut next = vec![false; (h * w) as usize];
            for y in 0..h {
                for x in 0..w {
                    let mut walls = 0;
                    for dy in -1..=1 {
                        for dx in -1..=1 {
                            let ny = y1 + y + dy;
                            let nx = x1 + x + dx;
                            if !self.cave.in_bounds(ny, nx)
                                || self.cave.feat(ny, nx) == Feature::WallExtra
                            {
                                walls += 1;
                            }
                        }
                    }
                    let alive = self.cave.feat(y1 + y, x1 + x) == Feature::WallExtra;
                    next[(y * w + x) as usize] = if alive { walls >= 4 } else { walls >= 5 };
                }
            }
            for y in 0..h {
                for x in 0..w {
                    let feat = if next[(y * w + x) as usize] {
                        Feature::WallExtra
                    } else {
                        Feature::Floor
                    };
                    self.cave.set_feat(y1 + y, x1 + x, feat);
                }
            }
        }

        self.ensure_connectivity(y1, x1, y2, x2);

        // Heart of the maze: a glowing tile with a deep prize.
        for _ in 0..1000 {
            let ty = self.rng.rand_range(y1 + 1, y2 - 1);
            let tx = self.rng.rand_range(x1 + 1, x2 - 1);
            if self.cave.is_floor(ty, tx) {
                self.cave.set_feat(ty, tx, Feature::GlowingTile);
                self.place_object(ty, tx, true, true);
                break;
            }
        }
    }

    /// Hill sector: concentric elevation with a lit summit.
    pub(crate) fn build_sector_hill(&mut self, by: i32, bx: i32) {
        let (y1, x1, y2, x2) = self.sector_rect(by, bx);
        let cy = (y1 + y2) / 2;
        let cx = (x1 + x2) / 2;
        let max_dist = (y2 - y1).max(x2 - x1) / 2;

        for y in y1..=y2 {
            for x in x1..=x2 {
                let dist = distance(cy, cx, y, x);
                let (elev, feat) = if dist < max_dist / 3 {
                    (Elevation::High, Feature::HillTop)
                } else if dist < 2 * max_dist / 3 {
                    (Elevation::Hill, Feature::SlopeUp)
                } else {
                    (Elevation::Ground, Feature::Floor)
                };
                self.cave.set_feat(y, x, feat);
                self.cave.set_elevation(y, x, elev);
                self.cave.add_flags(y, x, CellFlags::ROOM);
                if elev == Elevation::High {
                    self.cave.add_flags(y, x, CellFlags::GLOW);
                }
            }
        }

        // Slope markers on ground cells touching the hillside.
        for y in (y1 - 1)..=(y2 + 1) {
            for x in (x1 - 1)..=(x2 + 1) {
                if !self.cave.in_bounds(y, x) {
                    continue;
                }
                if self.cave.elevation(y, x) != Elevation::Ground {
                    continue;
                }
                let mut touches_hill = false;
                for dy in -1..=1 {
                    for dx in -1..=1 {
                        if self.cave.in_bounds(y + dy, x + dx)
                            && self.cave.elevation(y + dy, x + dx) > Elevation::Ground
                        {
                            touches_hill = true;
                        }
                    }
                }
                if touches_hill && self.cave.feat(y, x) == Feature::Floor {
                    self.cave.set_feat(y, x, Feature::SlopeDown);
                }
            }
        }

        // A defending band on the summit, usually.
        if self.rng.percent(60) {
            let my = cy + self.rng.rand_spread(0, 1);
            let mx = cx + self.rng.rand_spread(0, 1);
            if self.cave.in_bounds(my, mx) && self.cave.elevation(my, mx) == Elevation::High {
                self.vault_monsters(my, mx, AllocMode::SLEEP | AllocMode::GROUP);
            }
        }
    }

    /// Pit sector: a depression with one hazard theme.
    pub(crate) fn build_sector_pit(&mut self, by: i32, bx: i32) {
        let (y1, x1, y2, x2) = self.sector_rect(by, bx);
        let cy = (y1 + y2) / 2;
        let cx = (x1 + x2) / 2;

        for y in y1..=y2 {
            for x in x1..=x2 {
                if distance(cy, cx, y, x) < 3 {
                    self.cave.set_elevation(y, x, Elevation::Low);
                    self.cave.set_feat(y, x, Feature::Pit);
                } else {
                    self.cave.set_elevation(y, x, Elevation::Ground);
                    self.cave.set_feat(y, x, Feature::SlopeDown);
                }
                self.cave.add_flags(y, x, CellFlags::ROOM);
            }
        }

        // One hazard theme for the whole pit.
        let hazard = self.rng.rn2(3);
        for y in (y1 + 2)..=(y2 - 2) {
            for x in (x1 + 2)..=(x2 - 2) {
                if self.cave.elevation(y, x) != Elevation::Low {
                    continue;
                }
                match hazard {
                    0 => {
                        if self.rng.percent(30) {
                            self.cave.set_feat(y, x, Feature::ShallowWater);
                        }
                    }
                    1 => {
                        if self.rng.percent(15) {
                            self.place_trap(y, x);
                        }
                    }
                    _ => {
                        if self.rng.percent(20) {
                            let level = self.player.depth;
                            crate::monster::place_monster(
                                &mut self.cave,
                                &mut self.rng,
                                &self.data,
                                &mut self.monsters,
                                y,
                                x,
                                level,
                                AllocMode::SLEEP,
                            );
                        }
                    }
                }
            }
        }
    }

    /// Cliff sector: a split elevation face with a few climbable ledges.
    pub(crate) fn build_sector_cliff(&mut self, by: i32, bx: i32) {
        let (y1, x1, y2, x2) = self.sector_rect(by, bx);
        let vertical = self.rng.one_in(2);
        let high_first = self.rng.one_in(2);

        if vertical {
            let cliff_x = (x1 + x2) / 2;
            for y in y1..=y2 {
                for x in x1..=x2 {
                    let on_high = if high_first { x < cliff_x - 1 } else { x > cliff_x + 1 };
                    let edge_x = if high_first { cliff_x - 1 } else { cliff_x + 1 };
                    let on_edge = x == cliff_x || x == edge_x;
                    if on_high {
                        self.cave.set_elevation(y, x, Elevation::High);
                        self.cave.set_feat(y, x, Feature::Floor);
                    } else if on_edge {
                        self.cave.set_elevation(y, x, Elevation::High);
                        self.cave.set_feat(y, x, Feature::CliffDown);
                    } else {
                        self.cave.set_elevation(y, x, Elevation::Ground);
                        self.cave.set_feat(y, x, Feature::CliffUp);
                    }
                    self.cave.add_flags(y, x, CellFlags::ROOM);
                }
            }
            let num_ledges = 1 + self.rng.rn2(2);
            for _ in 0..num_ledges {
                let ly = self.rng.rand_range(y1 + 2, y2 - 2);
                let lx = cliff_x + if high_first { 1 } else { -1 };
                if self.cave.in_bounds(ly, lx) {
                    self.cave.set_feat(ly, lx, Feature::Ledge);
                    self.cave.set_elevation(ly, lx, Elevation::Hill);
                }
            }
        } else {
            let cliff_y = (y1 + y2) / 2;
            for y in y1..=y2 {
                for x in x1..=x2 {
                    let on_high = if high_first { y < cliff_y - 1 } else { y > cliff_y + 1 };
                    let edge_y = if high_first { cliff_y - 1 } else { cliff_y + 1 };
                    let on_edge = y == cliff_y || y == edge_y;
                    if on_high {
                        self.cave.set_elevation(y, x, Elevation::High);
                        self.cave.set_feat(y, x, Feature::Floor);
                    } else if on_edge {
                        self.cave.set_elevation(y, x, Elevation::High);
                        self.cave.set_feat(y, x, Feature::CliffDown);
                    } else {
                        self.cave.set_elevation(y, x, Elevation::Ground);
                        self.cave.set_feat(y, x, Feature::CliffUp);
                    }
                    self.cave.add_flags(y, x, CellFlags::ROOM);
                }
            }
            let num_ledges = 1 + self.rng.rn2(2);
            for _ in 0..num_ledges {
                let lx = self.rng.rand_range(x1 + 3, x2 - 3);
                let ly = cliff_y + if high_first { 1 } else { -1 };
                if self.cave.in_bounds(ly, lx) {
                    self.cave.set_feat(ly, lx, Feature::Ledge);
                    self.cave.set_elevation(ly, lx, Elevation::Hill);
                }
            }
        }

        // Archers overlooking the face, sometimes.
        if self.rng.percent(50) {
            for _ in 0..10 {
                let hy = self.rng.rand_range(y1, y2);
                let hx = self.rng.rand_range(x1, x2);
                if self.cave.elevation(hy, hx) == Elevation::High
                    && self.cave.feat(hy, hx) == Feature::Floor
                {
                    self.vault_monsters(hy, hx, AllocMode::SLEEP);
                    break;
                }
            }
        }
    }

    /// Plain walkable floor, the currency of sector connectivity.
    /// Hazard streams and walls both split a sector; bridges must be
    /// real floor.
    fn is_plain_floor(&self, y: i32, x: i32) -> bool {
        matches!(
            self.cave.feat(y, x),
            Feature::Floor | Feature::GlowingTile
        )
    }

    /// Flood-fill the floor components of a rectangle and bridge them
    /// until one remains. Bounded against pathological grids.
    pub(crate) fn ensure_connectivity(&mut self, y1: i32, x1: i32, y2: i32, x2: i32) {
        let h = y2 - y1 + 1;
        let w = x2 - x1 + 1;

        for _ in 0..100 {
            let mut comp = vec![0u32; (h * w) as usize];
            let mut comp_count = 0u32;

            for sy in 0..h {
                for sx in 0..w {
                    if comp[(sy * w + sx) as usize] != 0 {
                        continue;
                    }
                    if !self.is_plain_floor(y1 + sy, x1 + sx) {
                        continue;
                    }
                    comp_count += 1;
                    let mut queue = vec![(sy, sx)];
                    comp[(sy * w + sx) as usize] = comp_count;
                    while let Some((cy, cx)) = queue.pop() {
                        for (dy, dx) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
                            let ny = cy + dy;
                            let nx = cx + dx;
                            if ny < 0 || ny >= h || nx < 0 || nx >= w {
                                continue;
                            }
                            let idx = (ny * w + nx) as usize;
                            if comp[idx] != 0 || !self.is_plain_floor(y1 + ny, x1 + nx) {
                                continue;
                            }
                            comp[idx] = comp_count;
                            queue.push((ny, nx));
                        }
                    }
                }
            }

            if comp_count <= 1 {
                break;
            }

            // Closest pair between component 1 and any other.
            let mut best = None;
            let mut best_dist = i32::MAX;
            for ay in 0..h {
                for ax in 0..w {
                    if comp[(ay * w + ax) as usize] != 1 {
                        continue;
                    }
                    for oy in 0..h {
                        for ox in 0..w {
                            if comp[(oy * w + ox) as usize] <= 1 {
                                continue;
                            }
                            let d = (ay - oy) * (ay - oy) + (ax - ox) * (ax - ox);
                            if d < best_dist {
                                best_dist = d;
                                best = Some((ay, ax, oy, ox));
                            }
                        }
                    }
                }
            }

            let Some((ay, ax, oy, ox)) = best else {
                break;
            };

            // A straight-ish bridge between the pair.
            let mut cy = ay;
            let mut cx = ax;
            while cy != oy || cx != ox {
                cy += (oy - cy).signum();
                cx += (ox - cx).signum();
                self.cave.set_feat(y1 + cy, x1 + cx, Feature::Floor);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::GameData;
    use crate::generator::GenOptions;

    fn generator_at_depth(depth: i32, seed: u64) -> Generator {
        let mut generator = Generator::new(GameData::sample(), GenOptions::default(), seed);
        generator.player.depth = depth;
        generator.cave.wipe(Feature::WallExtra);
        generator
    }

    fn floor_components(generator: &Generator, y1: i32, x1: i32, y2: i32, x2: i32) -> u32 {
        let h = y2 - y1 + 1;
        let w = x2 - x1 + 1;
        let mut comp = vec![0u32; (h * w) as usize];
        let mut count = 0;
        for sy in 0..h {
            for sx in 0..w {
                if comp[(sy * w + sx) as usize] != 0
                    || !generator.is_plain_floor(y1 + sy, x1 + sx)
                {
                    continue;
                }
                count += 1;
                let mut queue = vec![(sy, sx)];
                comp[(sy * w + sx) as usize] = count;
                while let Some((cy, cx)) = queue.pop() {
                    for (dy, dx) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
                        let ny = cy + dy;
                        let nx = cx + dx;
                        if ny < 0 || ny >= h || nx < 0 || nx >= w {
                            continue;
                        }
                        let idx = (ny * w + nx) as usize;
                        if comp[idx] == 0 && generator.is_plain_floor(y1 + ny, x1 + nx) {
                            comp[idx] = count;
                            queue.push((ny, nx));
                        }
                    }
                }
            }
        }
        count
    }

    #[test]
    fn cavern_thresholds_to_floor_and_wall() {
        let mut generator = generator_at_depth(20, 5);
        generator.build_sector_cavern(1, 2);
        let (y1, x1, y2, x2) = generator.sector_rect(1, 2);
        let mut floors = 0;
        let mut walls = 0;
        for y in y1..=y2 {
            for x in x1..=x2 {
                match generator.cave.feat(y, x) {
                    Feature::Floor => {
                        floors += 1;
                        assert!(generator.cave.has_flag(y, x, CellFlags::ROOM));
                    }
                    Feature::WallInner => walls += 1,
                    other => panic!("unexpected {other:?}"),
                }
            }
        }
        assert!(floors > 0);
        assert!(walls > 0);
    }

    #[test]
    fn plaza_stays_connected() {
        for seed in 0..8 {
            let mut generator = generator_at_depth(15, seed);
            generator.build_sector_plaza(2, 4);
            let (y1, x1, y2, x2) = generator.sector_rect(2, 4);
            assert!(floor_components(&generator, y1, x1, y2, x2) <= 1);
        }
    }

    #[test]
    fn dark_sector_is_connected_and_has_a_heart() {
        for seed in 0..8 {
            let mut generator = generator_at_depth(12, 100 + seed);
            generator.build_sector_dark(1, 3);
            let (y1, x1, y2, x2) = generator.sector_rect(1, 3);
            assert!(floor_components(&generator, y1, x1, y2, x2) <= 1);
            let mut hearts = 0;
            for y in y1..=y2 {
                for x in x1..=x2 {
                    if generator.cave.feat(y, x) == Feature::GlowingTile {
                        hearts += 1;
                    }
                }
            }
            assert_eq!(hearts, 1);
        }
    }

    #[test]
    fn hill_builds_concentric_elevation() {
        let mut generator = generator_at_depth(10, 9);
        generator.build_sector_hill(1, 2);
        let (y1, x1, y2, x2) = generator.sector_rect(1, 2);
        let cy = (y1 + y2) / 2;
        let cx = (x1 + x2) / 2;
        assert_eq!(generator.cave.elevation(cy, cx), Elevation::High);
        assert_eq!(generator.cave.feat(cy, cx), Feature::HillTop);
        assert_eq!(generator.cave.elevation(y1, x1), Elevation::Ground);
        // The summit is lit.
        assert!(generator.cave.has_flag(cy, cx, CellFlags::GLOW));
    }

    #[test]
    fn pit_centers_low_with_pit_feature() {
        let mut generator = generator_at_depth(10, 11);
        generator.build_sector_pit(2, 6);
        let (y1, x1, y2, x2) = generator.sector_rect(2, 6);
        let cy = (y1 + y2) / 2;
        let cx = (x1 + x2) / 2;
        assert_eq!(generator.cave.elevation(cy, cx), Elevation::Low);
        assert_eq!(generator.cave.elevation(y1, x1), Elevation::Ground);
    }

    #[test]
    fn cliff_has_both_elevations_and_a_ledge() {
        for seed in 0..8 {
            let mut generator = generator_at_depth(10, 200 + seed);
            generator.build_sector_cliff(1, 4);
            let (y1, x1, y2, x2) = generator.sector_rect(1, 4);
            let mut high = 0;
            let mut ground = 0;
            let mut ledges = 0;
            for y in y1..=y2 {
                for x in x1..=x2 {
                    match generator.cave.elevation(y, x) {
                        Elevation::High => high += 1,
                        Elevation::Ground => ground += 1,
                        Elevation::Hill => ledges += 1,
                        Elevation::Low => {}
                    }
                }
            }
            assert!(high > 0);
            assert!(ground > 0);
            assert!((1..=2).contains(&ledges));
        }
    }

    #[test]
    fn connectivity_bridges_two_pockets() {
        let mut generator = generator_at_depth(5, 3);
        // Two floor pockets separated by granite.
        for x in 12..15 {
            generator.cave.set_feat(12, x, Feature::Floor);
        }
        for x in 25..28 {
            generator.cave.set_feat(18, x, Feature::Floor);
        }
        generator.ensure_connectivity(11, 11, 21, 32);
        assert_eq!(floor_components(&generator, 11, 11, 21, 32), 1);
    }
}
