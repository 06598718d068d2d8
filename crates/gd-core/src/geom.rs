//! Grid geometry helpers: direction tables, distance, line of sight,
//! and scattered placement.

use crate::cave::Cave;
use crate::rng::GameRng;

/// The four cardinal directions followed by the four diagonals (dy, dx).
pub const DDD: [(i32, i32); 8] = [
    (-1, 0),
    (0, 1),
    (1, 0),
    (0, -1),
    (-1, 1),
    (1, 1),
    (1, -1),
    (-1, -1),
];

/// Eight compass directions in clockwise order starting north (dy, dx).
/// The index order matters to the directional cover bitmap.
pub const COMPASS: [(i32, i32); 8] = [
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
];

/// Grid distance: the longer axis plus half the shorter.
pub fn distance(y1: i32, x1: i32, y2: i32, x2: i32) -> i32 {
    let dy = (y1 - y2).abs();
    let dx = (x1 - x2).abs();
    let (hi, lo) = if dy > dx { (dy, dx) } else { (dx, dy) };
    hi + lo / 2
}

/// Chebyshev distance.
pub fn chebyshev(y1: i32, x1: i32, y2: i32, x2: i32) -> i32 {
    (y1 - y2).abs().max((x1 - x2).abs())
}

/// Iterate the interior grids of the integer-stepped line from `(ay, ax)`
/// toward `(ty, tx)`, exclusive of both endpoints. Step `i` of `dist`
/// lands on `a + (delta * i) / dist` with truncating division.
pub fn line_interior(
    ay: i32,
    ax: i32,
    ty: i32,
    tx: i32,
) -> impl Iterator<Item = (i32, i32)> {
    let dy = ty - ay;
    let dx = tx - ax;
    let dist = distance(ay, ax, ty, tx);
    (1..dist.max(0)).map(move |i| (ay + (dy * i) / dist, ax + (dx * i) / dist))
}

/// Line of sight between two grids. Walks the integer-stepped line and
/// fails on any sight-blocking interior grid.
pub fn los(cave: &Cave, y1: i32, x1: i32, y2: i32, x2: i32) -> bool {
    if !cave.in_bounds(y1, x1) || !cave.in_bounds(y2, x2) {
        return false;
    }
    for (y, x) in line_interior(y1, x1, y2, x2) {
        if !cave.in_bounds(y, x) {
            return false;
        }
        if cave.feat(y, x).blocks_sight() {
            return false;
        }
    }
    true
}

/// Pick a random in-bounds grid within distance `d` of `(cy, cx)`.
/// Falls back to the center if no candidate survives the try budget.
pub fn scatter(rng: &mut GameRng, cave: &Cave, cy: i32, cx: i32, d: i32) -> (i32, i32) {
    for _ in 0..100 {
        let y = rng.rand_spread(cy, d);
        let x = rng.rand_spread(cx, d);
        if !cave.in_bounds_fully(y, x) {
            continue;
        }
        if distance(cy, cx, y, x) > d {
            continue;
        }
        return (y, x);
    }
    (cy, cx)
}

/// Convert a target-to-attacker offset into a compass octant index, or
/// `None` when the two grids coincide.
pub fn compass_octant(dy: i32, dx: i32) -> Option<usize> {
    Some(match (dy.signum(), dx.signum()) {
        (-1, 0) => 0,
        (-1, 1) => 1,
        (0, 1) => 2,
        (1, 1) => 3,
        (1, 0) => 4,
        (1, -1) => 5,
        (0, -1) => 6,
        (-1, -1) => 7,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_axes() {
        assert_eq!(distance(0, 0, 0, 10), 10);
        assert_eq!(distance(0, 0, 10, 0), 10);
        assert_eq!(distance(0, 0, 4, 4), 6);
    }

    #[test]
    fn line_interior_straight() {
        let pts: Vec<_> = line_interior(0, 5, 10, 5).collect();
        assert_eq!(pts.len(), 9);
        assert!(pts.contains(&(5, 5)));
        for (y, x) in pts {
            assert_eq!(x, 5);
            assert!((1..10).contains(&y));
        }
    }

    #[test]
    fn line_interior_empty_when_adjacent() {
        assert_eq!(line_interior(3, 3, 3, 4).count(), 0);
        assert_eq!(line_interior(3, 3, 3, 3).count(), 0);
    }

    #[test]
    fn octants() {
        assert_eq!(compass_octant(-5, 0), Some(0));
        assert_eq!(compass_octant(-3, 7), Some(1));
        assert_eq!(compass_octant(0, 2), Some(2));
        assert_eq!(compass_octant(9, 9), Some(3));
        assert_eq!(compass_octant(1, 0), Some(4));
        assert_eq!(compass_octant(4, -4), Some(5));
        assert_eq!(compass_octant(0, -1), Some(6));
        assert_eq!(compass_octant(-2, -2), Some(7));
        assert_eq!(compass_octant(0, 0), None);
    }
}
