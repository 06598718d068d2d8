//! Diamond-square plasma fractal.
//!
//! Works on an explicit scratch heightmap rather than the feature grid;
//! the caller seeds the corners, runs the recursion, and maps heights to
//! terrain through one of the lookup tables.
//!
//! ```text
//!   A-----U-----B
//!   |           |
//!   L     M     R
//!   |           |
//!   C-----D-----E
//! ```
//!
//! A, B, C, E are given; M is the perturbed mean of the four, and each
//! edge midpoint the perturbed mean of its two corners plus M.

use crate::feature::Feature;
use crate::rng::GameRng;

/// Scratch heightmap with values in `0..=depth_max`.
#[derive(Debug, Clone)]
pub struct HeightMap {
    height: i32,
    width: i32,
    values: Vec<i32>,
}

impl HeightMap {
    pub fn new(height: i32, width: i32, fill: i32) -> Self {
        Self {
            height,
            width,
            values: vec![fill; (height * width) as usize],
        }
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn get(&self, y: i32, x: i32) -> i32 {
        self.values[(y * self.width + x) as usize]
    }

    pub fn set(&mut self, y: i32, x: i32, v: i32) {
        self.values[(y * self.width + x) as usize] = v;
    }
}

fn perturb_mid(
    map: &mut HeightMap,
    rng: &mut GameRng,
    corners: [i32; 4],
    xmid: i32,
    ymid: i32,
    rough: i32,
    depth_max: i32,
) {
    let spread = rough * 2 + 1;
    let offset = rng.rnd(spread as u32) as i32 - (rough + 1);
    let sum: i32 = corners.iter().sum();
    let mut avg = sum / 4 + offset;
    if sum % 4 > 1 {
        avg += 1;
    }
    map.set(ymid, xmid, avg.clamp(0, depth_max));
}

fn perturb_end(
    map: &mut HeightMap,
    rng: &mut GameRng,
    corners: [i32; 3],
    xmid: i32,
    ymid: i32,
    rough: i32,
    depth_max: i32,
) {
    let spread = rough * 2 + 1;
    let offset = rng.rnd(spread as u32) as i32 - (rough + 1);
    let sum: i32 = corners.iter().sum();
    let mut avg = sum / 3 + offset;
    if sum % 3 != 0 {
        avg += 1;
    }
    map.set(ymid, xmid, avg.clamp(0, depth_max));
}

/// Fill `map` inside the rectangle whose four corners are already set.
/// Recurses into quadrants until the rectangle is one grid wide.
pub fn plasma_recursive(
    map: &mut HeightMap,
    rng: &mut GameRng,
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
    depth_max: i32,
    rough: i32,
) {
    let xmid = (x2 - x1) / 2 + x1;
    let ymid = (y2 - y1) / 2 + y1;

    if x1 + 1 == x2 {
        return;
    }

    // M
    perturb_mid(
        map,
        rng,
        [map.get(y1, x1), map.get(y2, x1), map.get(y1, x2), map.get(y2, x2)],
        xmid,
        ymid,
        rough,
        depth_max,
    );
    // U
    perturb_end(
        map,
        rng,
        [map.get(y1, x1), map.get(y1, x2), map.get(ymid, xmid)],
        xmid,
        y1,
        rough,
        depth_max,
    );
    // R
    perturb_end(
        map,
        rng,
        [map.get(y1, x2), map.get(y2, x2), map.get(ymid, xmid)],
        x2,
        ymid,
        rough,
        depth_max,
    );
    // D
    perturb_end(
        map,
        rng,
        [map.get(y2, x2), map.get(y2, x1), map.get(ymid, xmid)],
        xmid,
        y2,
        rough,
        depth_max,
    );
    // L
    perturb_end(
        map,
        rng,
        [map.get(y2, x1), map.get(y1, x1), map.get(ymid, xmid)],
        x1,
        ymid,
        rough,
        depth_max,
    );

    plasma_recursive(map, rng, x1, y1, xmid, ymid, depth_max, rough);
    plasma_recursive(map, rng, xmid, y1, x2, ymid, depth_max, rough);
    plasma_recursive(map, rng, x1, ymid, xmid, y2, depth_max, rough);
    plasma_recursive(map, rng, xmid, ymid, x2, y2, depth_max, rough);
}

/// Size of the wilderness terrain tables.
pub const TERRAIN_TABLE_SIZE: i32 = 22;

/// Background table index written before the fractal runs.
pub const TERRAIN_LEVEL_BG: i32 = 11;

/// Wilderness terrain tables: heights map to features, normal and watery.
pub const TERRAIN_TABLE: [[Feature; TERRAIN_TABLE_SIZE as usize]; 2] = [
    [
        Feature::DeepWater,
        Feature::DeepWater,
        Feature::DeepWater,
        Feature::DeepWater,
        Feature::ShallowWater,
        Feature::ShallowWater,
        Feature::ShallowWater,
        Feature::ShallowWater,
        Feature::ShallowWater,
        Feature::Mud,
        Feature::Mud,
        Feature::Swamp,
        Feature::Swamp,
        Feature::Grass,
        Feature::Grass,
        Feature::Grass,
        Feature::Shrub,
        Feature::Shrub,
        Feature::Trees,
        Feature::Trees,
        Feature::RockyHill,
        Feature::Mountain,
    ],
    [
        Feature::DeepWater,
        Feature::DeepWater,
        Feature::DeepWater,
        Feature::DeepWater,
        Feature::DeepWater,
        Feature::DeepWater,
        Feature::DeepWater,
        Feature::DeepWater,
        Feature::DeepWater,
        Feature::ShallowWater,
        Feature::ShallowWater,
        Feature::ShallowWater,
        Feature::ShallowWater,
        Feature::Mud,
        Feature::Mud,
        Feature::Mud,
        Feature::Swamp,
        Feature::Swamp,
        Feature::Swamp,
        Feature::Grass,
        Feature::Grass,
        Feature::Shrub,
    ],
];

/// Inverse of the terrain tables: the first height producing a feature.
pub fn table_backwards(feat: Feature, table: usize) -> i32 {
    let entries = &TERRAIN_TABLE[table.min(1)];
    entries
        .iter()
        .position(|&f| f == feat)
        .map(|i| i as i32)
        .unwrap_or(TERRAIN_LEVEL_BG)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plasma_fills_within_bounds() {
        let mut rng = GameRng::new(9);
        let mut map = HeightMap::new(33, 33, 0);
        let depth_max = 99;
        map.set(0, 0, rng.rn2(100) as i32);
        map.set(0, 32, rng.rn2(100) as i32);
        map.set(32, 0, rng.rn2(100) as i32);
        map.set(32, 32, rng.rn2(100) as i32);
        plasma_recursive(&mut map, &mut rng, 0, 0, 32, 32, depth_max, 1);
        for y in 0..=32 {
            for x in 0..=32 {
                let v = map.get(y, x);
                assert!((0..=depth_max).contains(&v), "({y},{x}) = {v}");
            }
        }
    }

    #[test]
    fn plasma_is_deterministic() {
        let run = |seed| {
            let mut rng = GameRng::new(seed);
            let mut map = HeightMap::new(17, 17, 0);
            map.set(0, 0, 10);
            map.set(0, 16, 40);
            map.set(16, 0, 70);
            map.set(16, 16, 99);
            plasma_recursive(&mut map, &mut rng, 0, 0, 16, 16, 99, 1);
            map.values
        };
        assert_eq!(run(5), run(5));
        assert_ne!(run(5), run(6));
    }

    #[test]
    fn tables_invert() {
        assert_eq!(table_backwards(Feature::DeepWater, 0), 0);
        assert_eq!(table_backwards(Feature::Mountain, 0), 21);
        assert_eq!(table_backwards(Feature::Grass, 1), 19);
        // Unknown features land on the background entry.
        assert_eq!(table_backwards(Feature::Floor, 0), TERRAIN_LEVEL_BG);
    }

    #[test]
    fn corners_survive_the_fractal() {
        let mut rng = GameRng::new(2);
        let mut map = HeightMap::new(17, 17, 0);
        map.set(0, 0, 5);
        map.set(0, 16, 50);
        map.set(16, 0, 80);
        map.set(16, 16, 20);
        plasma_recursive(&mut map, &mut rng, 0, 0, 16, 16, 99, 1);
        assert_eq!(map.get(0, 0), 5);
        assert_eq!(map.get(0, 16), 50);
        assert_eq!(map.get(16, 0), 80);
        assert_eq!(map.get(16, 16), 20);
    }
}
