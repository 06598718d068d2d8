//! Read-only game data consumed by the generator.
//!
//! Vaults, monster races, and deities are parsed from data files by the
//! surrounding engine; the generator only reads the narrow slices of each
//! record described here. A small built-in sample table backs the test
//! suite and standalone use.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// A run-length-encoded glyph stream, as stored in vault data files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RleText {
    runs: Vec<(char, u8)>,
}

impl RleText {
    /// Encode a row-major map from its text rows.
    pub fn from_rows(rows: &[&str]) -> Self {
        let mut runs: Vec<(char, u8)> = Vec::new();
        for row in rows {
            for ch in row.chars() {
                match runs.last_mut() {
                    Some((prev, count)) if *prev == ch && *count < u8::MAX => *count += 1,
                    _ => runs.push((ch, 1)),
                }
            }
        }
        Self { runs }
    }

    /// Total expanded length.
    pub fn len(&self) -> usize {
        self.runs.iter().map(|(_, n)| *n as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Iterate the expanded glyphs.
    pub fn expand(&self) -> impl Iterator<Item = char> + '_ {
        self.runs
            .iter()
            .flat_map(|&(ch, n)| std::iter::repeat(ch).take(n as usize))
    }
}

/// Vault classes recognised by the painter.
pub mod vault_class {
    pub const LESSER: u8 = 7;
    pub const GREATER: u8 = 8;
    pub const THEMED: u8 = 9;
    pub const TOWN: u8 = 10;
    pub const ARENA: u8 = 11;
    pub const WILD: u8 = 13;
    pub const QUEST: u8 = 99;
}

/// A vault layout record. `text` carries terrain glyphs, `m_text` the
/// monster/object glyphs; both streams cover the same `wid * hgt`
/// rectangle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultRecord {
    pub typ: u8,
    pub wid: u8,
    pub hgt: u8,
    /// Rating contribution when built.
    pub rat: i16,
    /// Quest-generation base: 0 bedrock, 1 wilderness, 2 fog.
    pub gen_info: u8,
    pub text: RleText,
    pub m_text: RleText,
    /// Race-index fixups referenced by digit glyphs.
    pub mon: [u16; 10],
}

impl VaultRecord {
    /// Both glyph streams must cover the full rectangle.
    pub fn is_well_formed(&self) -> bool {
        let area = self.wid as usize * self.hgt as usize;
        self.text.len() == area && self.m_text.len() == area
    }
}

/// A deity record; the generator reads only its rarity tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeityRecord {
    pub name: String,
    pub rarity: u8,
}

bitflags! {
    /// Monster race flags read by the generator.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RaceFlags: u16 {
        /// Coordinates with and alerts nearby guards.
        const SMART = 0x0001;
        /// Appears in packs; pack members share alerts.
        const FRIENDS = 0x0002;
        /// Pursues the player across level transitions.
        const ANCIENT = 0x0004;
        /// Spawned on flooded levels.
        const AQUATIC = 0x0008;
        /// Never appears in nests or random selections.
        const UNIQUE = 0x0010;
    }
}

impl Serialize for RaceFlags {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.bits().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RaceFlags {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(RaceFlags::from_bits_truncate(u16::deserialize(deserializer)?))
    }
}

/// A monster race record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonsterRace {
    pub name: String,
    /// Display character; vault letter glyphs restrict selection to it.
    pub d_char: char,
    /// Native depth.
    pub level: i32,
    /// Alertness radius; sleeping guards wake when beaten stealth falls
    /// short of it.
    pub aaf: i32,
    /// Hit dice (count, sides).
    pub hdice: (u32, u32),
    pub flags: RaceFlags,
}

/// The read-only tables a [`crate::generator::Generator`] consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameData {
    /// Race 0 is a placeholder meaning "none".
    pub races: Vec<MonsterRace>,
    pub deities: Vec<DeityRecord>,
    pub vaults: Vec<VaultRecord>,
    /// Index into `vaults` for the home town layout.
    pub town_vault: usize,
    /// Index into `vaults` for the default arena layout.
    pub arena_vault: usize,
    /// Index into `vaults` for store interiors.
    pub store_vault: usize,
}

impl GameData {
    /// Built-in sample tables, sufficient for generation and tests.
    pub fn sample() -> Self {
        let mut races = vec![MonsterRace {
            name: "nothing".into(),
            d_char: ' ',
            level: 0,
            aaf: 0,
            hdice: (0, 0),
            flags: RaceFlags::empty(),
        }];
        let mut race = |name: &str, d_char: char, level: i32, aaf: i32, hdice: (u32, u32), flags: RaceFlags| {
            races.push(MonsterRace {
                name: name.into(),
                d_char,
                level,
                aaf,
                hdice,
                flags,
            });
        };
        race("cave rat", 'r', 1, 8, (2, 4), RaceFlags::FRIENDS);
        race("mire leech", 'w', 2, 6, (3, 4), RaceFlags::AQUATIC);
        race("hollow kobold", 'k', 2, 12, (3, 6), RaceFlags::FRIENDS);
        race("gutter hound", 'C', 3, 15, (3, 8), RaceFlags::FRIENDS);
        race("pale jelly", 'j', 4, 4, (8, 6), RaceFlags::empty());
        race("delve bandit", 'p', 5, 18, (5, 8), RaceFlags::SMART);
        race("watch ogre", 'O', 8, 14, (8, 10), RaceFlags::SMART);
        race("drowned one", 'z', 9, 10, (7, 8), RaceFlags::AQUATIC);
        race("sentry golem", 'g', 12, 20, (12, 10), RaceFlags::SMART);
        race("grave wight", 'W', 15, 16, (10, 10), RaceFlags::SMART);
        race("shard drake", 'd', 20, 20, (14, 12), RaceFlags::empty());
        race("vault reaver", 'X', 26, 22, (18, 12), RaceFlags::SMART);
        race("abyss stalker", 'U', 34, 25, (22, 12), RaceFlags::SMART | RaceFlags::FRIENDS);
        race("throne herald", 'A', 45, 30, (30, 14), RaceFlags::SMART);
        race(
            "the ancient of days",
            'P',
            60,
            40,
            (60, 20),
            RaceFlags::SMART | RaceFlags::ANCIENT | RaceFlags::UNIQUE,
        );
        race("wandering merchant", 't', 1, 20, (10, 10), RaceFlags::SMART | RaceFlags::UNIQUE);
        race("town scholar", 't', 1, 20, (8, 8), RaceFlags::UNIQUE);

        let deities = (0..10)
            .map(|i| DeityRecord {
                name: format!("deity-{i}"),
                rarity: (i % 4) as u8,
            })
            .collect();

        let vaults = sample_vaults();

        Self {
            races,
            deities,
            vaults,
            town_vault: 0,
            arena_vault: 1,
            store_vault: 1,
        }
    }

    /// Race index of the travelling merchant, if present.
    pub fn merchant_race(&self) -> Option<u16> {
        self.races
            .iter()
            .position(|r| r.name == "wandering merchant")
            .map(|i| i as u16)
    }

    /// Race index of the town scholar, if present.
    pub fn scholar_race(&self) -> Option<u16> {
        self.races
            .iter()
            .position(|r| r.name == "town scholar")
            .map(|i| i as u16)
    }

    /// First race flagged ANCIENT, if present.
    pub fn ancient_race(&self) -> Option<u16> {
        self.races
            .iter()
            .position(|r| r.flags.contains(RaceFlags::ANCIENT))
            .map(|i| i as u16)
    }
}

impl Default for GameData {
    fn default() -> Self {
        Self::sample()
    }
}

fn sample_vaults() -> Vec<VaultRecord> {
    let mut vaults = Vec::new();

    // 0: the home town. Buildings a-h, four store exits, one stair down.
    let town_rows = [
        ".....................",
        ".a.b.c.d..S..e.f.g.h.",
        ".....................",
        "..S.......>.......S..",
        ".....................",
        "..........S..........",
        ".....................",
    ];
    let town_mon = [
        "                     ",
        "                     ",
        "                     ",
        "         @           ",
        "                     ",
        "                     ",
        "                     ",
    ];
    vaults.push(VaultRecord {
        typ: vault_class::TOWN,
        wid: 21,
        hgt: 7,
        rat: 0,
        gen_info: 0,
        text: RleText::from_rows(&town_rows),
        m_text: RleText::from_rows(&town_mon),
        mon: [0; 10],
    });

    // 1: arena floor. Permanent shell with a fighting pit.
    let arena_rows = [
        "XXXXXXXXXXXXXXX",
        "X.............X",
        "X.............X",
        "X......S......X",
        "X.............X",
        "X.............X",
        "XXXXXXXXXXXXXXX",
    ];
    let arena_mon = [
        "               ",
        "               ",
        "       &       ",
        "               ",
        "       @       ",
        "               ",
        "               ",
    ];
    vaults.push(VaultRecord {
        typ: vault_class::ARENA,
        wid: 15,
        hgt: 7,
        rat: 0,
        gen_info: 0,
        text: RleText::from_rows(&arena_rows),
        m_text: RleText::from_rows(&arena_mon),
        mon: [0; 10],
    });

    // 2: a lesser vault. A walkway ring inside the granite shell, then
    // a secret treasury.
    let lesser_rows = [
        "%%%%%%%%%%%",
        "%.........%",
        "%.##+####.%",
        "%.#.....#.%",
        "%.#######.%",
        "%.........%",
        "%%%%%%%%%%%",
    ];
    let lesser_mon = [
        "           ",
        "  k     k  ",
        "           ",
        "   .*.*.   ",
        "           ",
        "           ",
        "           ",
    ];
    vaults.push(VaultRecord {
        typ: vault_class::LESSER,
        wid: 11,
        hgt: 7,
        rat: 10,
        gen_info: 0,
        text: RleText::from_rows(&lesser_rows),
        m_text: RleText::from_rows(&lesser_mon),
        mon: [0; 10],
    });

    // 3: a greater vault. Twin sanctuaries off a patrol ring, permanent
    // pillars, mean garrison.
    let greater_rows = [
        "%%%%%%%%%%%%%%%%%%%",
        "%.................%",
        "%.###+###.###+###.%",
        "%.#.....#.#.....#.%",
        "%.#..X..#.#..X..#.%",
        "%.#.....#.#.....#.%",
        "%.#######.#######.%",
        "%.................%",
        "%%%%%%%%%%%%%%%%%%%",
    ];
    let greater_mon = [
        "                   ",
        "  ;             ;  ",
        "                   ",
        "    .^.     .^.    ",
        "   #           #   ",
        "    .:.     .:.    ",
        "                   ",
        "  ;             ;  ",
        "                   ",
    ];
    vaults.push(VaultRecord {
        typ: vault_class::GREATER,
        wid: 19,
        hgt: 9,
        rat: 35,
        gen_info: 0,
        text: RleText::from_rows(&greater_rows),
        m_text: RleText::from_rows(&greater_mon),
        mon: [0; 10],
    });

    // 4: a themed vault -- a drowned shrine.
    let themed_rows = [
        "%%%%%%%%%%%%%",
        "%VVVVVVVVVVV%",
        "%V....O....V%",
        "%V.W.....W.V%",
        "%VVVVVVVVVVV%",
        "%%%%%%%%%%%%%",
    ];
    let themed_mon = [
        "             ",
        "             ",
        "   w..0..w   ",
        "   ...:...   ",
        "             ",
        "             ",
    ];
    vaults.push(VaultRecord {
        typ: vault_class::THEMED,
        wid: 13,
        hgt: 6,
        rat: 20,
        gen_info: 0,
        text: RleText::from_rows(&themed_rows),
        m_text: RleText::from_rows(&themed_mon),
        mon: [2, 0, 0, 0, 0, 0, 0, 0, 0, 0],
    });

    // 5: a wilderness camp.
    let wild_rows = [
        "YYYYYYYYY",
        "Y.......Y",
        "Y.A...A.Y",
        "Y...U...Y",
        "YYYYYYYYY",
    ];
    let wild_mon = [
        "         ",
        "         ",
        "  p...p  ",
        "         ",
        "         ",
    ];
    vaults.push(VaultRecord {
        typ: vault_class::WILD,
        wid: 9,
        hgt: 5,
        rat: 5,
        gen_info: 0,
        text: RleText::from_rows(&wild_rows),
        m_text: RleText::from_rows(&wild_mon),
        mon: [0; 10],
    });

    // 6: a quest lair on a wilderness base.
    let quest_rows = [
        "%%%%%%%%%%%",
        "%#########%",
        "%#.......#%",
        "%E...Q...#%",
        "%#.......#%",
        "%#########%",
        "%%%%%%%%%%%",
    ];
    let quest_mon = [
        "           ",
        "           ",
        "   ..^..   ",
        " @ ..;..   ",
        "   ..^..   ",
        "           ",
        "           ",
    ];
    vaults.push(VaultRecord {
        typ: vault_class::QUEST,
        wid: 11,
        hgt: 7,
        rat: 0,
        gen_info: 1,
        text: RleText::from_rows(&quest_rows),
        m_text: RleText::from_rows(&quest_mon),
        mon: [0; 10],
    });

    vaults
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rle_round_trips_rows() {
        let rle = RleText::from_rows(&["aab", "bba"]);
        let expanded: String = rle.expand().collect();
        assert_eq!(expanded, "aabbba");
        assert_eq!(rle.len(), 6);
    }

    #[test]
    fn rle_long_runs_split_at_255() {
        let row = "x".repeat(600);
        let rle = RleText::from_rows(&[&row]);
        assert_eq!(rle.len(), 600);
        assert_eq!(rle.expand().count(), 600);
    }

    #[test]
    fn sample_vaults_are_well_formed() {
        let data = GameData::sample();
        for (i, v) in data.vaults.iter().enumerate() {
            assert!(v.is_well_formed(), "vault {i} has mismatched streams");
        }
        assert_eq!(data.vaults[data.town_vault].typ, vault_class::TOWN);
        assert_eq!(data.vaults[data.arena_vault].typ, vault_class::ARENA);
    }

    #[test]
    fn sample_races_cover_special_roles() {
        let data = GameData::sample();
        assert!(data.merchant_race().is_some());
        assert!(data.scholar_race().is_some());
        assert!(data.ancient_race().is_some());
        assert!(data.races[0].d_char == ' ');
    }
}
