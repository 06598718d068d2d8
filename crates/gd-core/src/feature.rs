//! Terrain feature kinds.
//!
//! Features are laid out in numeric bands so that ordered comparisons
//! classify whole families at once: `0x20..=0x2F` are the closed door
//! powers, `0x30..=0x3F` run from secret doors through rubble and the
//! mineral veins up to the permanent walls, `0x40..=0x47` are shop
//! fronts, `0x48..=0x61` are town buildings, and everything above is
//! extended terrain. The vein/wall band ordering is load-bearing: "is
//! granite or harder" is a single `>=` test, and a vein grid becomes its
//! treasure variant by adding 4 to the representation.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, FromRepr};

/// One terrain feature kind per grid.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    FromRepr,
)]
#[repr(u8)]
pub enum Feature {
    /// Outside the playable area (wilderness tile edge).
    Unseen = 0x00,
    #[default]
    Floor = 0x01,
    Glyph = 0x02,
    GlowingTile = 0x03,
    OpenDoor = 0x04,
    BrokenDoor = 0x05,
    UpStairs = 0x06,
    DownStairs = 0x07,
    Shaft = 0x08,
    QuestEnter = 0x09,
    QuestExit = 0x0A,
    StoreExit = 0x0B,
    ArenaEnter = 0x0C,
    DreamExit = 0x0D,
    DreamPortal = 0x0E,

    TrapTrapdoor = 0x10,
    TrapPit = 0x11,
    TrapDart = 0x12,
    TrapFire = 0x13,
    TrapAcid = 0x14,
    TrapTeleport = 0x15,
    TrapSummon = 0x16,
    TrapRune = 0x17,

    DoorClosed = 0x20,
    DoorLocked1 = 0x21,
    DoorLocked2 = 0x22,
    DoorLocked3 = 0x23,
    DoorLocked4 = 0x24,
    DoorLocked5 = 0x25,
    DoorLocked6 = 0x26,
    DoorLocked7 = 0x27,
    DoorJammed0 = 0x28,
    DoorJammed1 = 0x29,
    DoorJammed2 = 0x2A,
    DoorJammed3 = 0x2B,
    DoorJammed4 = 0x2C,
    DoorJammed5 = 0x2D,
    DoorJammed6 = 0x2E,
    DoorJammed7 = 0x2F,

    SecretDoor = 0x30,
    Rubble = 0x31,
    Magma = 0x32,
    Quartz = 0x33,
    MagmaHidden = 0x34,
    QuartzHidden = 0x35,
    MagmaTreasure = 0x36,
    QuartzTreasure = 0x37,
    WallExtra = 0x38,
    WallInner = 0x39,
    WallOuter = 0x3A,
    WallSolid = 0x3B,
    PermExtra = 0x3C,
    PermInner = 0x3D,
    PermOuter = 0x3E,
    PermSolid = 0x3F,

    Shop0 = 0x40,
    Shop1 = 0x41,
    Shop2 = 0x42,
    Shop3 = 0x43,
    Shop4 = 0x44,
    Shop5 = 0x45,
    Shop6 = 0x46,
    Shop7 = 0x47,

    BldgA = 0x48,
    BldgB = 0x49,
    BldgC = 0x4A,
    BldgD = 0x4B,
    BldgE = 0x4C,
    BldgF = 0x4D,
    BldgG = 0x4E,
    BldgH = 0x4F,
    BldgI = 0x50,
    BldgJ = 0x51,
    BldgK = 0x52,
    BldgL = 0x53,
    BldgM = 0x54,
    BldgN = 0x55,
    BldgO = 0x56,
    BldgP = 0x57,
    BldgQ = 0x58,
    BldgR = 0x59,
    BldgS = 0x5A,
    BldgT = 0x5B,
    BldgU = 0x5C,
    BldgV = 0x5D,
    BldgW = 0x5E,
    BldgX = 0x5F,
    BldgY = 0x60,
    BldgZ = 0x61,

    ShallowWater = 0x62,
    DeepWater = 0x63,
    ShallowLava = 0x64,
    DeepLava = 0x65,
    Fog = 0x66,
    DenseFog = 0x67,
    Smoke = 0x68,
    ChaosFog = 0x69,
    Grass = 0x6A,
    TallGrass = 0x6B,
    Reeds = 0x6C,
    Shrub = 0x6D,
    Swamp = 0x6E,
    Mud = 0x6F,
    Trees = 0x70,
    FallenTree = 0x71,
    RockyHill = 0x72,
    Mountain = 0x73,
    Boulder = 0x74,
    Crate = 0x75,
    Barrel = 0x76,
    StonePillar = 0x77,
    Ice = 0x78,
    Acid = 0x79,
    Oil = 0x7A,
    RuinDoor = 0x7B,
    Pit = 0x7C,
    SlopeUp = 0x7D,
    SlopeDown = 0x7E,
    CliffUp = 0x7F,
    CliffDown = 0x80,
    Ledge = 0x81,
    HillTop = 0x82,
    Fountain = 0x83,
    Cartographer = 0x84,
    HeroicRemains = 0x85,
    WhisperingIdol = 0x86,
    SanctumWall = 0x87,
    SanctumDoor = 0x88,
    FollyWall = 0x89,
    RuneA = 0x8A,
    RuneB = 0x8B,
    RuneC = 0x8C,
    RuneD = 0x8D,
    RuneE = 0x8E,
    LeverLeft = 0x8F,
    LeverRight = 0x90,
    Emitter = 0x91,
    Crystal = 0x92,
    MirrorPlate = 0x93,
    FlowAcid = 0x94,

    Altar0 = 0x95,
    Altar1 = 0x96,
    Altar2 = 0x97,
    Altar3 = 0x98,
    Altar4 = 0x99,
    Altar5 = 0x9A,
    Altar6 = 0x9B,
    Altar7 = 0x9C,
    Altar8 = 0x9D,
    Altar9 = 0x9E,
}

/// Number of deities an altar can be dedicated to.
pub const MAX_GODS: u32 = 10;

impl Feature {
    /// Raw band representation.
    #[inline]
    pub const fn repr(self) -> u8 {
        self as u8
    }

    /// Build a feature from a raw band value, falling back to floor.
    #[inline]
    pub fn from_band(v: u8) -> Self {
        Self::from_repr(v).unwrap_or(Self::Floor)
    }

    /// Closed door of the given power: 0 closed, 1-7 locked, 8-15 jammed.
    pub fn door(power: u8) -> Self {
        Self::from_band(Self::DoorClosed.repr() + (power & 0x0F))
    }

    /// Shop front `0..8`.
    pub fn shop(index: u8) -> Self {
        Self::from_band(Self::Shop0.repr() + index.min(7))
    }

    /// Town building `0..26` (a..z).
    pub fn building(index: u8) -> Self {
        Self::from_band(Self::BldgA.repr() + index.min(25))
    }

    /// Altar dedicated to deity `index`.
    pub fn altar(index: u32) -> Self {
        Self::from_band(Self::Altar0.repr() + index.min(MAX_GODS - 1) as u8)
    }

    /// Puzzle rune `0..5` (A..E).
    pub fn rune(index: u8) -> Self {
        Self::from_band(Self::RuneA.repr() + index.min(4))
    }

    /// Vein grids become their treasure variant by adding 4.
    pub fn with_treasure(self) -> Self {
        match self {
            Self::Magma | Self::Quartz => Self::from_band(self.repr() + 4),
            other => other,
        }
    }

    /// Granite or permanent wall.
    #[inline]
    pub const fn is_granite_or_harder(self) -> bool {
        self.repr() >= Self::WallExtra.repr() && self.repr() <= Self::PermSolid.repr()
    }

    /// Anything in the vein-through-permanent band ("wall-like").
    #[inline]
    pub const fn is_wall_like(self) -> bool {
        self.repr() >= Self::Magma.repr() && self.repr() <= Self::PermSolid.repr()
    }

    /// Permanent wall sub-band.
    #[inline]
    pub const fn is_perma(self) -> bool {
        self.repr() >= Self::PermExtra.repr() && self.repr() <= Self::PermSolid.repr()
    }

    /// Mineral vein, with or without treasure.
    #[inline]
    pub const fn is_vein(self) -> bool {
        self.repr() >= Self::Magma.repr() && self.repr() <= Self::QuartzTreasure.repr()
    }

    /// Closed, locked, or jammed door.
    #[inline]
    pub const fn is_closed_door(self) -> bool {
        self.repr() >= Self::DoorClosed.repr() && self.repr() <= Self::DoorJammed7.repr()
    }

    /// Any door state, including secret and ruin doors.
    pub const fn is_door(self) -> bool {
        self.is_closed_door()
            || matches!(
                self,
                Self::OpenDoor | Self::BrokenDoor | Self::SecretDoor | Self::RuinDoor | Self::SanctumDoor
            )
    }

    /// One of the trap features.
    #[inline]
    pub const fn is_trap(self) -> bool {
        self.repr() >= Self::TrapTrapdoor.repr() && self.repr() <= Self::TrapRune.repr()
    }

    /// Shop front.
    #[inline]
    pub const fn is_shop(self) -> bool {
        self.repr() >= Self::Shop0.repr() && self.repr() <= Self::Shop7.repr()
    }

    /// Town building.
    #[inline]
    pub const fn is_building(self) -> bool {
        self.repr() >= Self::BldgA.repr() && self.repr() <= Self::BldgZ.repr()
    }

    /// Altar of any deity.
    #[inline]
    pub const fn is_altar(self) -> bool {
        self.repr() >= Self::Altar0.repr() && self.repr() <= Self::Altar9.repr()
    }

    /// Stairs or shaft.
    pub const fn is_stairs(self) -> bool {
        matches!(self, Self::UpStairs | Self::DownStairs | Self::Shaft)
    }

    /// Fog-family features: concealment without solid cover.
    pub const fn is_fog(self) -> bool {
        matches!(self, Self::Fog | Self::DenseFog | Self::Smoke | Self::ChaosFog)
    }

    /// Water of any depth.
    pub const fn is_water(self) -> bool {
        matches!(self, Self::ShallowWater | Self::DeepWater)
    }

    /// Lava of any depth.
    pub const fn is_lava(self) -> bool {
        matches!(self, Self::ShallowLava | Self::DeepLava)
    }

    /// Features a creature can occupy.
    pub const fn is_passable(self) -> bool {
        if self.is_trap() {
            return true;
        }
        match self {
            Self::Floor
            | Self::Glyph
            | Self::GlowingTile
            | Self::OpenDoor
            | Self::BrokenDoor
            | Self::UpStairs
            | Self::DownStairs
            | Self::Shaft
            | Self::QuestEnter
            | Self::QuestExit
            | Self::StoreExit
            | Self::ArenaEnter
            | Self::DreamExit
            | Self::DreamPortal
            | Self::ShallowWater
            | Self::DeepWater
            | Self::ShallowLava
            | Self::DeepLava
            | Self::Fog
            | Self::DenseFog
            | Self::Smoke
            | Self::ChaosFog
            | Self::Grass
            | Self::TallGrass
            | Self::Reeds
            | Self::Shrub
            | Self::Swamp
            | Self::Mud
            | Self::Trees
            | Self::FallenTree
            | Self::RockyHill
            | Self::Ice
            | Self::Acid
            | Self::Oil
            | Self::Pit
            | Self::SlopeUp
            | Self::SlopeDown
            | Self::CliffDown
            | Self::Ledge
            | Self::HillTop
            | Self::Fountain
            | Self::Cartographer
            | Self::HeroicRemains
            | Self::WhisperingIdol
            | Self::RuneA
            | Self::RuneB
            | Self::RuneC
            | Self::RuneD
            | Self::RuneE
            | Self::LeverLeft
            | Self::LeverRight
            | Self::MirrorPlate
            | Self::FlowAcid => true,
            f if f.is_altar() => true,
            _ => false,
        }
    }

    /// Blocks line of sight.
    pub const fn blocks_sight(self) -> bool {
        if self.is_closed_door() {
            return true;
        }
        // Secret doors, rubble, veins, and walls all read as rock.
        if self.repr() >= Self::SecretDoor.repr() && self.repr() <= Self::PermSolid.repr() {
            return true;
        }
        matches!(
            self,
            Self::Mountain
                | Self::StonePillar
                | Self::SanctumWall
                | Self::SanctumDoor
                | Self::FollyWall
                | Self::RuinDoor
        )
    }

    /// Display character, used for debug dumps of generated levels.
    pub const fn symbol(self) -> char {
        match self {
            Self::Unseen => ' ',
            Self::Floor | Self::GlowingTile => '.',
            Self::Glyph => ';',
            Self::OpenDoor => '\'',
            Self::BrokenDoor => '\'',
            Self::UpStairs => '<',
            Self::DownStairs => '>',
            Self::Shaft => '>',
            Self::QuestEnter | Self::QuestExit | Self::ArenaEnter => 'Q',
            Self::StoreExit => 'S',
            Self::DreamExit | Self::DreamPortal => '*',
            Self::SecretDoor => '#',
            Self::Rubble => ':',
            Self::Magma | Self::MagmaHidden => '%',
            Self::Quartz | Self::QuartzHidden => '%',
            Self::MagmaTreasure | Self::QuartzTreasure => '$',
            Self::ShallowWater | Self::DeepWater => '~',
            Self::ShallowLava | Self::DeepLava => '~',
            Self::Fog | Self::DenseFog | Self::Smoke | Self::ChaosFog => '=',
            Self::Grass | Self::TallGrass | Self::Reeds | Self::Shrub => '"',
            Self::Swamp | Self::Mud => '_',
            Self::Trees | Self::FallenTree => 'T',
            Self::RockyHill | Self::Mountain | Self::HillTop => '^',
            Self::Boulder => '0',
            Self::Crate => '8',
            Self::Barrel => '&',
            Self::StonePillar => 'I',
            Self::Ice | Self::Acid | Self::Oil => ',',
            Self::RuinDoor => '+',
            Self::Pit => 'v',
            Self::SlopeUp | Self::SlopeDown | Self::CliffUp | Self::CliffDown | Self::Ledge => '/',
            Self::Fountain => '{',
            Self::Cartographer => '?',
            Self::HeroicRemains => '!',
            Self::WhisperingIdol => 'i',
            Self::SanctumWall | Self::FollyWall => '#',
            Self::SanctumDoor => '+',
            Self::Emitter | Self::Crystal | Self::MirrorPlate => 'o',
            Self::FlowAcid => ',',
            f if f.is_trap() => '^',
            f if f.is_closed_door() => '+',
            f if f.is_shop() => '1',
            f if f.is_building() => 'B',
            f if f.is_altar() => '_',
            _ => '#',
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_ordering() {
        assert!(Feature::WallExtra.is_granite_or_harder());
        assert!(Feature::PermSolid.is_granite_or_harder());
        assert!(!Feature::Magma.is_granite_or_harder());
        assert!(Feature::Magma.is_wall_like());
        assert!(Feature::QuartzTreasure.is_wall_like());
        assert!(!Feature::Rubble.is_wall_like());
        assert!(!Feature::Boulder.is_granite_or_harder());
        assert!(!Feature::TallGrass.is_wall_like());
    }

    #[test]
    fn door_band() {
        assert!(Feature::door(0).is_closed_door());
        assert_eq!(Feature::door(0), Feature::DoorClosed);
        assert_eq!(Feature::door(7), Feature::DoorLocked7);
        assert_eq!(Feature::door(8), Feature::DoorJammed0);
        assert_eq!(Feature::door(15), Feature::DoorJammed7);
        assert!(!Feature::OpenDoor.is_closed_door());
        assert!(Feature::OpenDoor.is_door());
        assert!(Feature::SecretDoor.is_door());
    }

    #[test]
    fn treasure_veins() {
        assert_eq!(Feature::Magma.with_treasure(), Feature::MagmaTreasure);
        assert_eq!(Feature::Quartz.with_treasure(), Feature::QuartzTreasure);
        assert_eq!(Feature::Floor.with_treasure(), Feature::Floor);
    }

    #[test]
    fn banded_constructors() {
        assert_eq!(Feature::shop(3), Feature::Shop3);
        assert_eq!(Feature::building(25), Feature::BldgZ);
        assert_eq!(Feature::altar(0), Feature::Altar0);
        assert_eq!(Feature::rune(4), Feature::RuneE);
    }

    #[test]
    fn sight_and_passability() {
        assert!(Feature::WallExtra.blocks_sight());
        assert!(Feature::SecretDoor.blocks_sight());
        assert!(Feature::DoorClosed.blocks_sight());
        assert!(!Feature::Fog.blocks_sight());
        assert!(!Feature::OpenDoor.blocks_sight());
        assert!(Feature::TallGrass.is_passable());
        assert!(!Feature::Boulder.is_passable());
        assert!(!Feature::CliffUp.is_passable());
        assert!(Feature::CliffDown.is_passable());
    }
}
