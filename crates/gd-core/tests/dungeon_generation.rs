//! Whole-level invariants of the dungeon generator.

use gd_core::data::GameData;
use gd_core::feature::Feature;
use gd_core::{CellFlags, GenOptions, Generator, SpecialLevel, DUNGEON_HGT, DUNGEON_WID, MAX_DEPTH};

fn generate(depth: i32, seed: u64) -> Generator {
    let mut generator = Generator::new(GameData::sample(), GenOptions::default(), seed);
    generator
        .generate_cave(depth)
        .expect("generation should succeed");
    assert!(generator.is_ready());
    generator
}

fn count_feature(generator: &Generator, feat: Feature) -> usize {
    generator
        .cave
        .feature_stream()
        .iter()
        .filter(|&&f| f == feat.repr())
        .count()
}

/// A grid the player can eventually move through: walkable terrain,
/// any door, and clearable obstacles (rubble, destructible cover).
fn traversable(feat: Feature) -> bool {
    feat.is_passable()
        || feat.is_door()
        || matches!(
            feat,
            Feature::Rubble
                | Feature::Boulder
                | Feature::Crate
                | Feature::Barrel
                | Feature::StonePillar
        )
}

#[test]
fn boundary_ring_is_permanent_solid() {
    for (depth, seed) in [(1, 11), (5, 42), (11, 100), (20, 7)] {
        let generator = generate(depth, seed);
        let cave = &generator.cave;
        for x in 0..DUNGEON_WID {
            assert_eq!(cave.feat(0, x), Feature::PermSolid, "top ring at x={x}");
            assert_eq!(
                cave.feat(DUNGEON_HGT - 1, x),
                Feature::PermSolid,
                "bottom ring at x={x}"
            );
        }
        for y in 0..DUNGEON_HGT {
            assert_eq!(cave.feat(y, 0), Feature::PermSolid, "left ring at y={y}");
            assert_eq!(
                cave.feat(y, DUNGEON_WID - 1),
                Feature::PermSolid,
                "right ring at y={y}"
            );
        }
    }
}

#[test]
fn same_seed_gives_identical_levels() {
    let a = generate(5, 987_654);
    let b = generate(5, 987_654);
    assert_eq!(a.cave.feature_stream(), b.cave.feature_stream());
    assert_eq!(a.cave.flag_stream(), b.cave.flag_stream());
    assert_eq!(a.cave.elevation_stream(), b.cave.elevation_stream());
    assert_eq!((a.player.py, a.player.px), (b.player.py, b.player.px));

    let c = generate(5, 987_655);
    assert_ne!(a.cave.feature_stream(), c.cave.feature_stream());
}

#[test]
fn stair_counts_are_budgeted() {
    for seed in [1, 2, 3] {
        let generator = generate(5, seed);
        let up = count_feature(&generator, Feature::UpStairs);
        let down = count_feature(&generator, Feature::DownStairs);
        assert!((1..=3).contains(&up), "seed {seed}: {up} up stairs");
        assert!(down >= 3, "seed {seed}: {down} down stairs");
    }
}

#[test]
fn terminal_depth_has_no_way_down() {
    let generator = generate(MAX_DEPTH - 1, 31);
    assert_eq!(count_feature(&generator, Feature::DownStairs), 0);
    assert!(count_feature(&generator, Feature::UpStairs) >= 1);
}

#[test]
fn depth_five_carves_magma_but_no_greater_vault() {
    let generator = generate(5, 42);
    let magma = count_feature(&generator, Feature::Magma)
        + count_feature(&generator, Feature::MagmaTreasure);
    assert!(magma > 0, "mineral streamers ran");
    // Greater vaults gate at depth 10; their permanent pillars are the
    // only source of inner permanent walls.
    assert_eq!(count_feature(&generator, Feature::PermInner), 0);
}

#[test]
fn room_cells_are_reachable_from_the_player() {
    for (depth, seed) in [(5, 3), (12, 9), (18, 21)] {
        let generator = generate(depth, seed);
        let cave = &generator.cave;

        let (py, px) = (generator.player.py, generator.player.px);
        assert!(cave.in_bounds_fully(py, px), "player in bounds");
        assert!(
            traversable(cave.feat(py, px)),
            "player on walkable ground at ({py},{px})"
        );

        // Flood from the player across traversable grids, eight-way.
        let mut seen = vec![false; (DUNGEON_HGT * DUNGEON_WID) as usize];
        let mut queue = vec![(py, px)];
        seen[(py * DUNGEON_WID + px) as usize] = true;
        while let Some((y, x)) = queue.pop() {
            for (dy, dx) in gd_core::geom::DDD {
                let ny = y + dy;
                let nx = x + dx;
                if !cave.in_bounds_fully(ny, nx) {
                    continue;
                }
                let idx = (ny * DUNGEON_WID + nx) as usize;
                if seen[idx] || !traversable(cave.feat(ny, nx)) {
                    continue;
                }
                seen[idx] = true;
                queue.push((ny, nx));
            }
        }

        let mut unreachable = 0;
        let mut total = 0;
        for y in 1..DUNGEON_HGT - 1 {
            for x in 1..DUNGEON_WID - 1 {
                if !cave.has_flag(y, x, CellFlags::ROOM) {
                    continue;
                }
                let feat = cave.feat(y, x);
                if !feat.is_passable() && !feat.is_door() {
                    continue;
                }
                total += 1;
                if !seen[(y * DUNGEON_WID + x) as usize] {
                    unreachable += 1;
                }
            }
        }
        assert!(total > 0, "seed {seed}: the level has room cells");
        assert_eq!(
            unreachable, 0,
            "depth {depth} seed {seed}: {unreachable}/{total} room cells unreachable"
        );
    }
}

#[test]
fn cover_records_stay_within_durability_bounds() {
    for seed in [4, 5, 6] {
        let generator = generate(6, seed);
        for (_, data) in generator.cave.cover_pool.iter() {
            assert!(data.durability > 0);
            assert!(data.durability <= data.max_durability);
        }
    }
}

#[test]
fn guard_records_are_anchored_to_the_level() {
    // Depth 16 rolls guard posts and ambush corridors.
    for seed in [8, 9, 10, 11] {
        let generator = generate(16, seed);
        let cave = &generator.cave;
        for (_, monster) in generator.monsters.iter_live() {
            let Some(record) = &monster.guard else {
                continue;
            };
            assert!(cave.in_bounds(record.home_y, record.home_x));
            assert!(
                cave.is_floor(record.home_y, record.home_x),
                "guard home on walkable ground"
            );
            for wp in &record.waypoints {
                assert!(
                    cave.is_floor(wp.y, wp.x)
                        || (wp.y, wp.x) == (record.home_y, record.home_x),
                    "waypoint ({},{}) neither floor nor home",
                    wp.y,
                    wp.x
                );
            }
        }
    }
}

#[test]
fn persistent_dungeons_repeat_their_layout() {
    let options = GenOptions {
        seed_dungeon: Some(0xC0FFEE),
        ..GenOptions::default()
    };
    let mut a = Generator::new(GameData::sample(), options.clone(), 1);
    a.generate_cave(8).expect("generates");
    let mut b = Generator::new(GameData::sample(), options, 2);
    b.generate_cave(8).expect("generates");
    // Different stable streams, same quick stream: the room skeleton
    // repeats even though inhabitants differ.
    assert_eq!(a.room_centers(), b.room_centers());
}

#[test]
fn town_layout() {
    let mut generator = Generator::new(GameData::sample(), GenOptions::default(), 1);
    generator.generate_cave(0).expect("town generates");
    let cave = &generator.cave;

    assert_eq!(count_feature(&generator, Feature::UpStairs), 0);
    assert_eq!(count_feature(&generator, Feature::DownStairs), 1);
    assert_eq!(count_feature(&generator, Feature::StoreExit), 4);
    for building in 0..8u8 {
        assert_eq!(
            count_feature(&generator, Feature::building(building)),
            1,
            "building {building} present once"
        );
    }

    // Daytime: every interior grid glows.
    for y in 1..DUNGEON_HGT - 1 {
        for x in 1..DUNGEON_WID - 1 {
            assert!(
                cave.has_flag(y, x, CellFlags::GLOW),
                "unlit town grid at ({y},{x})"
            );
        }
    }

    // The wilderness edge ring is unseen, not permanent rock.
    assert_eq!(cave.feat(0, 0), Feature::Unseen);
}

#[test]
fn special_levels_paint_their_vaults() {
    // Arena: one vault on bedrock, player at the `@`.
    let mut arena = Generator::new(GameData::sample(), GenOptions::default(), 3);
    arena.player.inside_special = Some(SpecialLevel::Arena);
    arena.generate_cave(1).expect("arena generates");
    assert!(count_feature(&arena, Feature::PermSolid) > 10_000);
    assert_eq!(count_feature(&arena, Feature::StoreExit), 1);
    assert_ne!((arena.player.py, arena.player.px), (0, 0));

    // Quest: the quest vault drops onto its wilderness base.
    let mut quest = Generator::new(GameData::sample(), GenOptions::default(), 4);
    quest.player.py = 30;
    quest.player.px = 90;
    quest.player.inside_special = Some(SpecialLevel::Quest(6));
    quest.generate_cave(12).expect("quest generates");
    assert_eq!(count_feature(&quest, Feature::QuestEnter), 1);
    assert_eq!(count_feature(&quest, Feature::QuestExit), 1);

    // A quest index that is not a quest vault is a fatal input error.
    let mut bad = Generator::new(GameData::sample(), GenOptions::default(), 5);
    bad.player.inside_special = Some(SpecialLevel::Quest(0));
    assert!(bad.generate_cave(12).is_err());
}

#[test]
fn wilderness_tiles_share_their_corner_seams() {
    // Strip wilderness camp vaults so the terrain is purely fractal.
    let mut data = GameData::sample();
    data.vaults.retain(|v| v.typ != gd_core::data::vault_class::WILD);

    let tile = |wild_x: i32, wild_y: i32| {
        let mut generator = Generator::new(data.clone(), GenOptions::default(), 9);
        generator.player.inside_special = Some(SpecialLevel::Wild);
        generator.player.wild_x = wild_x;
        generator.player.wild_y = wild_y;
        generator.player.wilderness_depth = 5;
        generator.player.py = DUNGEON_HGT / 2;
        generator.player.px = DUNGEON_WID / 2;
        generator.generate_cave(5).expect("wilderness generates");
        generator
    };

    let a = tile(3, 4);
    let b = tile(4, 4);

    // Tile A's right corners are tile B's left corners.
    assert_eq!(
        a.cave.feat(1, DUNGEON_WID - 2),
        b.cave.feat(1, 1),
        "top seam corner"
    );
    assert_eq!(
        a.cave.feat(DUNGEON_HGT - 2, DUNGEON_WID - 2),
        b.cave.feat(DUNGEON_HGT - 2, 1),
        "bottom seam corner"
    );
}

#[test]
fn feelings_are_suppressed_on_fresh_levels_and_in_town() {
    let generator = generate(5, 77);
    // Less than a thousand turns since the last level: no feeling.
    assert_eq!(generator.feeling(), 0);
}
