//! Tactical cover.
//!
//! Terrain features map to ordered cover tiers; directional queries walk
//! the attack line and the eight neighbours of the target. Destructible
//! cover carries a durability record in the cave's cover pool and reverts
//! to bare floor when it breaks.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, FromRepr};

use crate::cave::Cave;
use crate::consts::{
    BARREL_BLAST_DAMAGE, BARREL_BLAST_RADIUS, COVER_ABSORB_HEAVY, COVER_ABSORB_LIGHT,
    COVER_ABSORB_MEDIUM, COVER_ABSORB_TOTAL, COVER_DURABILITY_TREE, COVER_STEALTH_HEAVY,
    COVER_STEALTH_LIGHT, COVER_STEALTH_MEDIUM,
};
use crate::feature::Feature;
use crate::geom::{compass_octant, distance, line_interior, COMPASS};
use crate::rng::GameRng;

/// Cover tiers, totally ordered.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    FromRepr,
)]
#[repr(u8)]
pub enum CoverTier {
    #[default]
    None = 0,
    Light = 1,
    Medium = 2,
    Heavy = 3,
    Total = 4,
}

impl CoverTier {
    /// Cover granted by a bare terrain feature.
    pub fn of_feature(feat: Feature) -> Self {
        match feat {
            Feature::WallInner
            | Feature::WallOuter
            | Feature::WallSolid
            | Feature::PermInner
            | Feature::PermOuter
            | Feature::PermSolid
            | Feature::StonePillar => Self::Heavy,
            Feature::Trees | Feature::Boulder | Feature::Rubble => Self::Medium,
            Feature::FallenTree
            | Feature::Crate
            | Feature::TallGrass
            | Feature::Reeds
            | Feature::Shrub
            | Feature::Barrel => Self::Light,
            // Fog conceals without stopping anything solid.
            f if f.is_fog() => Self::Light,
            _ => Self::None,
        }
    }

    /// Percent of a hit's damage the cover absorbs.
    pub fn absorb_percent(self) -> i32 {
        match self {
            Self::None => 0,
            Self::Light => COVER_ABSORB_LIGHT,
            Self::Medium => COVER_ABSORB_MEDIUM,
            Self::Heavy => COVER_ABSORB_HEAVY,
            Self::Total => COVER_ABSORB_TOTAL,
        }
    }

    /// Percent chance an attack strikes the cover instead of the target.
    pub fn miss_chance(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Light => 25,
            Self::Medium => 40,
            Self::Heavy => 60,
            Self::Total => 100,
        }
    }

    /// Stealth bonus for standing in this tier of cover.
    pub fn stealth_bonus(self) -> i32 {
        match self {
            Self::None => 0,
            Self::Light => COVER_STEALTH_LIGHT,
            Self::Medium => COVER_STEALTH_MEDIUM,
            Self::Heavy | Self::Total => COVER_STEALTH_HEAVY,
        }
    }
}

/// A destructible cover record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverData {
    pub tier: CoverTier,
    pub durability: i32,
    pub max_durability: i32,
    /// The terrain feature the record represents.
    pub feat: Feature,
}

impl CoverData {
    pub fn new(tier: CoverTier, durability: i32, feat: Feature) -> Self {
        Self {
            tier,
            durability,
            max_durability: durability,
            feat,
        }
    }
}

/// Side effects of damaging cover, surfaced to the combat boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverEvent {
    BarrelExploded { y: i32, x: i32 },
    TreeToppled { y: i32, x: i32 },
    CoverDestroyed { y: i32, x: i32 },
    CoverWeakened { y: i32, x: i32 },
}

/// Result of resolving an attack through cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackOutcome {
    pub hit: bool,
    pub damage_to_target: i32,
    pub damage_to_cover: i32,
}

/// Cover tier at a grid: a live destructible record wins over the bare
/// feature mapping.
pub fn get_cover_at(cave: &Cave, y: i32, x: i32) -> CoverTier {
    if !cave.in_bounds(y, x) {
        return CoverTier::None;
    }
    if let Some(data) = cave.cover_data(y, x) {
        if data.durability > 0 {
            return data.tier;
        }
        return CoverTier::None;
    }
    CoverTier::of_feature(cave.feat(y, x))
}

/// Best cover between target and attacker along the attack line, plus the
/// target's own light/medium self-cover. Fog grids are skipped: they give
/// concealment, not ablation.
pub fn get_cover_vs_direction(cave: &Cave, ty: i32, tx: i32, ay: i32, ax: i32) -> CoverTier {
    let mut best = CoverTier::None;
    for (y, x) in line_interior(ay, ax, ty, tx) {
        if !cave.in_bounds(y, x) {
            continue;
        }
        if cave.feat(y, x).is_fog() {
            continue;
        }
        let cover = get_cover_at(cave, y, x);
        if cover > best {
            best = cover;
        }
        if best >= CoverTier::Total {
            return CoverTier::Total;
        }
    }
    let target_cover = get_cover_at(cave, ty, tx);
    if target_cover > best && target_cover <= CoverTier::Medium {
        best = target_cover;
    }
    best
}

/// Bitmap of the eight directions around `(y, x)` holding solid cover.
fn directional_cover(cave: &Cave, y: i32, x: i32) -> u8 {
    let mut dirs = 0u8;
    for (dir, (dy, dx)) in COMPASS.iter().enumerate() {
        let ny = y + dy;
        let nx = x + dx;
        if !cave.in_bounds(ny, nx) {
            continue;
        }
        let feat = cave.feat(ny, nx);
        if feat.is_granite_or_harder()
            || matches!(feat, Feature::Trees | Feature::Boulder | Feature::StonePillar)
        {
            dirs |= 1 << dir;
        }
    }
    dirs
}

/// True when the target stands directly behind heavy-or-better cover in
/// the attacker's quadrant.
pub fn attack_blocked_by_cover(cave: &Cave, ty: i32, tx: i32, ay: i32, ax: i32) -> bool {
    let Some(dir) = compass_octant(ay - ty, ax - tx) else {
        return false;
    };
    if directional_cover(cave, ty, tx) & (1 << dir) == 0 {
        return false;
    }
    let (dy, dx) = COMPASS[dir];
    get_cover_at(cave, ty + dy, tx + dx) >= CoverTier::Heavy
}

/// Damage the destructible cover at a grid. Barrels detonate, trees can
/// topple into fallen-tree cover, crates gain a record lazily. Returns
/// the events the caller should surface or apply to combatants.
pub fn damage_cover(cave: &mut Cave, rng: &mut GameRng, y: i32, x: i32, damage: i32) -> Vec<CoverEvent> {
    let mut events = Vec::new();
    damage_cover_inner(cave, rng, y, x, damage, &mut events);
    events
}

fn damage_cover_inner(
    cave: &mut Cave,
    rng: &mut GameRng,
    y: i32,
    x: i32,
    damage: i32,
    events: &mut Vec<CoverEvent>,
) {
    if !cave.in_bounds(y, x) {
        return;
    }
    let feat = cave.feat(y, x);

    if feat == Feature::Barrel {
        cave.destroy_cover(y, x);
        events.push(CoverEvent::BarrelExploded { y, x });
        // The blast chews through nearby cover as well.
        for by in (y - BARREL_BLAST_RADIUS)..=(y + BARREL_BLAST_RADIUS) {
            for bx in (x - BARREL_BLAST_RADIUS)..=(x + BARREL_BLAST_RADIUS) {
                if (by, bx) == (y, x) || !cave.in_bounds(by, bx) {
                    continue;
                }
                if distance(y, x, by, bx) > BARREL_BLAST_RADIUS {
                    continue;
                }
                if cave.cover_data(by, bx).is_some() || cave.feat(by, bx) == Feature::Barrel {
                    damage_cover_inner(cave, rng, by, bx, BARREL_BLAST_DAMAGE, events);
                }
            }
        }
        return;
    }

    if let Some(data) = cave.cover_data(y, x) {
        let remaining = data.durability - damage;
        let max = data.max_durability;
        if remaining <= 0 {
            cave.destroy_cover(y, x);
            events.push(CoverEvent::CoverDestroyed { y, x });
        } else {
            let idx = cave.cell(y, x).cover;
            if let Some(record) = cave.cover_pool.get_mut(idx) {
                record.durability = remaining;
            }
            if remaining < max / 4 {
                events.push(CoverEvent::CoverWeakened { y, x });
            }
        }
        return;
    }

    if feat == Feature::Trees && damage > 20 {
        if (rng.rn2(100) as i32) < damage {
            events.push(CoverEvent::TreeToppled { y, x });
            cave.install_cover(
                y,
                x,
                CoverData::new(CoverTier::Light, COVER_DURABILITY_TREE / 2, Feature::FallenTree),
            );
        }
        return;
    }

    if feat == Feature::Crate {
        cave.install_cover(y, x, CoverData::new(CoverTier::Light, 20, Feature::Crate));
        damage_cover_inner(cave, rng, y, x, damage, events);
    }
}

/// Pure resolution of an attack against a known cover tier, given the
/// already-rolled miss value. Split out so the probability table is unit
/// testable without an RNG.
pub fn resolve_cover_attack(cover: CoverTier, miss_roll: u32, damage: i32) -> AttackOutcome {
    if cover == CoverTier::None {
        return AttackOutcome {
            hit: true,
            damage_to_target: damage,
            damage_to_cover: 0,
        };
    }
    if miss_roll < cover.miss_chance() {
        return AttackOutcome {
            hit: false,
            damage_to_target: 0,
            damage_to_cover: damage,
        };
    }
    let absorbed = damage * cover.absorb_percent() / 100;
    AttackOutcome {
        hit: damage - absorbed > 0,
        damage_to_target: damage - absorbed,
        damage_to_cover: absorbed,
    }
}

/// Resolve an attack from `(ay, ax)` against a target at `(ty, tx)`.
/// Applies cover damage to the nearest qualifying cover grid and returns
/// the outcome together with any cover events.
pub fn attack_through_cover(
    cave: &mut Cave,
    rng: &mut GameRng,
    ay: i32,
    ax: i32,
    ty: i32,
    tx: i32,
    damage: i32,
) -> (AttackOutcome, Vec<CoverEvent>) {
    let cover = get_cover_vs_direction(cave, ty, tx, ay, ax);

    if cover == CoverTier::None {
        return (
            AttackOutcome {
                hit: true,
                damage_to_target: damage,
                damage_to_cover: 0,
            },
            Vec::new(),
        );
    }

    if attack_blocked_by_cover(cave, ty, tx, ay, ax) {
        let events = apply_to_nearest_cover(cave, rng, ay, ax, ty, tx, cover, damage);
        return (
            AttackOutcome {
                hit: false,
                damage_to_target: 0,
                damage_to_cover: damage,
            },
            events,
        );
    }

    let outcome = resolve_cover_attack(cover, rng.rn2(100), damage);
    let events = if outcome.damage_to_cover > 0 {
        apply_to_nearest_cover(cave, rng, ay, ax, ty, tx, cover, outcome.damage_to_cover)
    } else {
        Vec::new()
    };
    (outcome, events)
}

/// Walk attacker-to-target and damage the first grid holding cover at
/// least as good as the resolved tier, falling back to the target's own
/// grid.
fn apply_to_nearest_cover(
    cave: &mut Cave,
    rng: &mut GameRng,
    ay: i32,
    ax: i32,
    ty: i32,
    tx: i32,
    tier: CoverTier,
    damage: i32,
) -> Vec<CoverEvent> {
    let dy = ty - ay;
    let dx = tx - ax;
    let dist = distance(ay, ax, ty, tx);
    for i in 1..=dist {
        let cy = ay + (dy * i) / dist;
        let cx = ax + (dx * i) / dist;
        if get_cover_at(cave, cy, cx) >= tier {
            return damage_cover(cave, rng, cy, cx, damage);
        }
    }
    if get_cover_at(cave, ty, tx) >= tier {
        return damage_cover(cave, rng, ty, tx, damage);
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_cave() -> Cave {
        let mut cave = Cave::new();
        for y in 0..cave.height() {
            for x in 0..cave.width() {
                cave.set_feat(y, x, Feature::Floor);
            }
        }
        cave
    }

    #[test]
    fn tier_ordering() {
        assert!(CoverTier::None < CoverTier::Light);
        assert!(CoverTier::Light < CoverTier::Medium);
        assert!(CoverTier::Medium < CoverTier::Heavy);
        assert!(CoverTier::Heavy < CoverTier::Total);
    }

    #[test]
    fn feature_mapping() {
        assert_eq!(CoverTier::of_feature(Feature::WallInner), CoverTier::Heavy);
        assert_eq!(CoverTier::of_feature(Feature::StonePillar), CoverTier::Heavy);
        assert_eq!(CoverTier::of_feature(Feature::Trees), CoverTier::Medium);
        assert_eq!(CoverTier::of_feature(Feature::Boulder), CoverTier::Medium);
        assert_eq!(CoverTier::of_feature(Feature::Rubble), CoverTier::Medium);
        assert_eq!(CoverTier::of_feature(Feature::TallGrass), CoverTier::Light);
        assert_eq!(CoverTier::of_feature(Feature::Fog), CoverTier::Light);
        assert_eq!(CoverTier::of_feature(Feature::Barrel), CoverTier::Light);
        assert_eq!(CoverTier::of_feature(Feature::Floor), CoverTier::None);
    }

    #[test]
    fn pillar_gives_heavy_directional_cover() {
        let mut cave = open_cave();
        cave.set_feat(5, 5, Feature::StonePillar);
        // Attacker north, target south, pillar between them on the line.
        assert_eq!(get_cover_vs_direction(&cave, 10, 5, 0, 5), CoverTier::Heavy);
    }

    #[test]
    fn fog_is_skipped_for_blocking() {
        let mut cave = open_cave();
        cave.set_feat(5, 5, Feature::Fog);
        assert_eq!(get_cover_vs_direction(&cave, 10, 5, 0, 5), CoverTier::None);
        // But standing in fog grants light self-cover.
        assert_eq!(get_cover_vs_direction(&cave, 5, 5, 0, 5), CoverTier::Light);
    }

    #[test]
    fn adjacent_heavy_cover_blocks_the_quadrant() {
        let mut cave = open_cave();
        cave.set_feat(4, 5, Feature::StonePillar);
        // Attacker due north of the target at (5, 5): blocked.
        assert!(attack_blocked_by_cover(&cave, 5, 5, 0, 5));
        // Attacker due south: the pillar does not help.
        assert!(!attack_blocked_by_cover(&cave, 5, 5, 10, 5));
    }

    #[test]
    fn resolve_outcomes_conserve_damage() {
        for tier in [CoverTier::Light, CoverTier::Medium, CoverTier::Heavy] {
            for roll in [0, 24, 25, 39, 40, 59, 60, 99] {
                let out = resolve_cover_attack(tier, roll, 100);
                assert_eq!(out.damage_to_target + out.damage_to_cover, 100);
                if !out.hit {
                    assert_eq!(out.damage_to_target, 0);
                }
            }
        }
        let out = resolve_cover_attack(CoverTier::Total, 99, 100);
        assert!(!out.hit);
        assert_eq!(out.damage_to_target, 0);
        assert_eq!(out.damage_to_cover, 100);
    }

    #[test]
    fn forced_miss_routes_damage_into_cover() {
        // Miss roll 0 always strikes the cover for any tier above None.
        let out = resolve_cover_attack(CoverTier::Heavy, 0, 100);
        assert!(!out.hit);
        assert_eq!(out.damage_to_target, 0);
        assert_eq!(out.damage_to_cover, 100);
    }

    #[test]
    fn attack_through_pillar_line() {
        let mut cave = open_cave();
        cave.set_feat(5, 5, Feature::StonePillar);
        let mut rng = GameRng::new(42);
        let (out, _) = attack_through_cover(&mut cave, &mut rng, 0, 5, 10, 5, 100);
        assert_eq!(out.damage_to_target + out.damage_to_cover, 100);
        if !out.hit {
            assert_eq!(out.damage_to_target, 0);
        }
    }

    #[test]
    fn cover_record_breaks_to_floor() {
        let mut cave = open_cave();
        let mut rng = GameRng::new(1);
        cave.install_cover(6, 6, CoverData::new(CoverTier::Medium, 30, Feature::Boulder));
        let events = damage_cover(&mut cave, &mut rng, 6, 6, 50);
        assert!(events.contains(&CoverEvent::CoverDestroyed { y: 6, x: 6 }));
        assert_eq!(cave.feat(6, 6), Feature::Floor);
        assert!(cave.cover_data(6, 6).is_none());
    }

    #[test]
    fn cover_record_decrements() {
        let mut cave = open_cave();
        let mut rng = GameRng::new(1);
        cave.install_cover(6, 6, CoverData::new(CoverTier::Medium, 30, Feature::Boulder));
        damage_cover(&mut cave, &mut rng, 6, 6, 10);
        let data = cave.cover_data(6, 6).copied();
        assert_eq!(data.map(|d| d.durability), Some(20));
        assert_eq!(data.map(|d| d.max_durability), Some(30));
    }

    #[test]
    fn barrel_detonates_to_floor() {
        let mut cave = open_cave();
        let mut rng = GameRng::new(1);
        cave.set_feat(7, 7, Feature::Barrel);
        let events = damage_cover(&mut cave, &mut rng, 7, 7, 5);
        assert!(events.contains(&CoverEvent::BarrelExploded { y: 7, x: 7 }));
        assert_eq!(cave.feat(7, 7), Feature::Floor);
    }

    #[test]
    fn crate_gains_record_lazily() {
        let mut cave = open_cave();
        let mut rng = GameRng::new(1);
        cave.set_feat(8, 8, Feature::Crate);
        assert!(cave.cover_data(8, 8).is_none());
        damage_cover(&mut cave, &mut rng, 8, 8, 5);
        let data = cave.cover_data(8, 8).copied();
        assert_eq!(data.map(|d| d.durability), Some(15));
    }

    #[test]
    fn ray_symmetry_same_quadrant() {
        // Attackers on the same ray see the same cover tier.
        let mut cave = open_cave();
        cave.set_feat(5, 5, Feature::Boulder);
        let near = get_cover_vs_direction(&cave, 10, 5, 2, 5);
        let far = get_cover_vs_direction(&cave, 10, 5, 0, 5);
        assert_eq!(near, far);
    }
}
