//! The level grid.
//!
//! Cells are plain old data so whole grids can be snapshotted and compared
//! in determinism tests. Ownership of variable-size records (destructible
//! cover, per-cell object lists) lives in typed pools addressed by index;
//! the cell itself only carries the indices.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, FromRepr};

use crate::consts::{BLOCK_HGT, BLOCK_WID, DUNGEON_HGT, DUNGEON_WID};
use crate::cover::{CoverData, CoverTier};
use crate::feature::Feature;

bitflags! {
    /// Per-cell flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CellFlags: u8 {
        /// Inside the footprint of a built room or sector.
        const ROOM = 0x01;
        /// Anti-teleport vault interior; never rewritten once set.
        const ICKY = 0x02;
        /// Permanently lit.
        const GLOW = 0x04;
        /// Remembered by the player.
        const MARK = 0x08;
    }
}

impl Serialize for CellFlags {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.bits().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CellFlags {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(CellFlags::from_bits_truncate(u8::deserialize(deserializer)?))
    }
}

/// Cell elevation layer, ordered for cover scoring.
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
pub enum Elevation {
    Low = 0,
    #[default]
    Ground = 1,
    Hill = 2,
    High = 3,
}

/// Terrain archetype of a 2x2-block sector.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumIter,
)]
pub enum Sector {
    #[default]
    Ruins,
    Cavern,
    Plaza,
    Dark,
    Hill,
    Pit,
    Cliff,
}

/// Sentinel for "no object list" on a cell.
pub const OBJ_NONE: u32 = u32::MAX;

/// Sentinel for "no cover record" on a cell.
pub const COVER_NONE_IDX: u16 = u16::MAX;

/// A single grid cell. POD and copyable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Cell {
    /// Terrain feature kind.
    pub feat: Feature,
    /// ROOM/ICKY/GLOW/MARK flags.
    pub flags: CellFlags,
    /// Elevation layer.
    pub elevation: Elevation,
    /// Monster occupying this cell (0 = none).
    pub monster: u16,
    /// Head of the intrusive object list ([`OBJ_NONE`] = empty).
    pub object_head: u32,
    /// Index into the cover pool ([`COVER_NONE_IDX`] = none).
    pub cover: u16,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            feat: Feature::Floor,
            flags: CellFlags::empty(),
            elevation: Elevation::Ground,
            monster: 0,
            object_head: OBJ_NONE,
            cover: COVER_NONE_IDX,
        }
    }
}

/// Pool of destructible cover records. Indices stored in cells stay valid
/// until the record is freed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoverPool {
    slots: Vec<Option<CoverData>>,
    free: Vec<u16>,
}

impl CoverPool {
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }

    pub fn insert(&mut self, data: CoverData) -> u16 {
        if let Some(idx) = self.free.pop() {
            self.slots[idx as usize] = Some(data);
            idx
        } else {
            self.slots.push(Some(data));
            (self.slots.len() - 1) as u16
        }
    }

    pub fn remove(&mut self, idx: u16) -> Option<CoverData> {
        let slot = self.slots.get_mut(idx as usize)?;
        let data = slot.take();
        if data.is_some() {
            self.free.push(idx);
        }
        data
    }

    pub fn get(&self, idx: u16) -> Option<&CoverData> {
        self.slots.get(idx as usize).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, idx: u16) -> Option<&mut CoverData> {
        self.slots.get_mut(idx as usize).and_then(|s| s.as_mut())
    }

    /// Iterate live records together with their indices.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &CoverData)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|d| (i as u16, d)))
    }
}

/// The dungeon grid plus its terrain-coupled pools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cave {
    height: i32,
    width: i32,
    cells: Vec<Cell>,
    /// Sector archetype per placement block.
    pub sectors: Vec<Sector>,
    /// Destructible cover records.
    pub cover_pool: CoverPool,
}

impl Cave {
    pub fn new() -> Self {
        Self::with_size(DUNGEON_HGT, DUNGEON_WID)
    }

    pub fn with_size(height: i32, width: i32) -> Self {
        let blocks = (height / BLOCK_HGT) * (width / BLOCK_WID);
        Self {
            height,
            width,
            cells: vec![Cell::default(); (height * width) as usize],
            sectors: vec![Sector::Ruins; blocks as usize],
            cover_pool: CoverPool::default(),
        }
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    /// Block-grid rows available for room placement.
    pub fn row_blocks(&self) -> i32 {
        self.height / BLOCK_HGT
    }

    /// Block-grid columns available for room placement.
    pub fn col_blocks(&self) -> i32 {
        self.width / BLOCK_WID
    }

    #[inline]
    fn idx(&self, y: i32, x: i32) -> usize {
        debug_assert!(self.in_bounds(y, x));
        (y * self.width + x) as usize
    }

    /// Grid coordinates inside the array.
    #[inline]
    pub fn in_bounds(&self, y: i32, x: i32) -> bool {
        y >= 0 && y < self.height && x >= 0 && x < self.width
    }

    /// Grid coordinates strictly inside the permanent boundary ring.
    #[inline]
    pub fn in_bounds_fully(&self, y: i32, x: i32) -> bool {
        y >= 1 && y < self.height - 1 && x >= 1 && x < self.width - 1
    }

    pub fn cell(&self, y: i32, x: i32) -> &Cell {
        &self.cells[self.idx(y, x)]
    }

    pub fn cell_mut(&mut self, y: i32, x: i32) -> &mut Cell {
        let i = self.idx(y, x);
        &mut self.cells[i]
    }

    pub fn feat(&self, y: i32, x: i32) -> Feature {
        self.cell(y, x).feat
    }

    pub fn set_feat(&mut self, y: i32, x: i32, feat: Feature) {
        // Dropping a feature on a cell releases any cover record it owned.
        let i = self.idx(y, x);
        let cover = self.cells[i].cover;
        if cover != COVER_NONE_IDX && feat != self.cells[i].feat {
            self.cover_pool.remove(cover);
            self.cells[i].cover = COVER_NONE_IDX;
        }
        self.cells[i].feat = feat;
    }

    /// Set a feature only when the target is in bounds; room builders use
    /// this so block-aligned painting near the map edge stays safe.
    pub fn set_feat_checked(&mut self, y: i32, x: i32, feat: Feature) {
        if self.in_bounds(y, x) {
            self.set_feat(y, x, feat);
        }
    }

    pub fn flags(&self, y: i32, x: i32) -> CellFlags {
        self.cell(y, x).flags
    }

    pub fn add_flags(&mut self, y: i32, x: i32, flags: CellFlags) {
        self.cell_mut(y, x).flags |= flags;
    }

    pub fn remove_flags(&mut self, y: i32, x: i32, flags: CellFlags) {
        self.cell_mut(y, x).flags &= !flags;
    }

    pub fn has_flag(&self, y: i32, x: i32, flag: CellFlags) -> bool {
        self.cell(y, x).flags.contains(flag)
    }

    pub fn elevation(&self, y: i32, x: i32) -> Elevation {
        self.cell(y, x).elevation
    }

    pub fn set_elevation(&mut self, y: i32, x: i32, elevation: Elevation) {
        self.cell_mut(y, x).elevation = elevation;
    }

    pub fn monster_at(&self, y: i32, x: i32) -> u16 {
        self.cell(y, x).monster
    }

    pub fn set_monster(&mut self, y: i32, x: i32, m_idx: u16) {
        self.cell_mut(y, x).monster = m_idx;
    }

    /// Sector archetype of the block containing block coords `(by, bx)`.
    pub fn sector(&self, by: i32, bx: i32) -> Sector {
        self.sectors[(by * self.col_blocks() + bx) as usize]
    }

    pub fn set_sector(&mut self, by: i32, bx: i32, sector: Sector) {
        let cols = self.col_blocks();
        self.sectors[(by * cols + bx) as usize] = sector;
    }

    /// Creature-passable grid (open doors count, closed do not).
    pub fn is_floor(&self, y: i32, x: i32) -> bool {
        self.in_bounds(y, x) && self.feat(y, x).is_passable()
    }

    /// Plain floor with no objects.
    pub fn is_clean(&self, y: i32, x: i32) -> bool {
        self.in_bounds(y, x)
            && self.feat(y, x) == Feature::Floor
            && self.cell(y, x).object_head == OBJ_NONE
    }

    /// Plain floor with no objects and no monster.
    pub fn is_naked(&self, y: i32, x: i32) -> bool {
        self.is_clean(y, x) && self.cell(y, x).monster == 0
    }

    /// Permanent wall.
    pub fn is_perma(&self, y: i32, x: i32) -> bool {
        self.in_bounds(y, x) && self.feat(y, x).is_perma()
    }

    /// A grid that may legally be rewritten by destruction: not permanent
    /// and not protected by a vault.
    pub fn is_valid_for_rewrite(&self, y: i32, x: i32) -> bool {
        self.in_bounds(y, x)
            && !self.feat(y, x).is_perma()
            && !self.has_flag(y, x, CellFlags::ICKY)
    }

    /// Cover record on a cell, if any.
    pub fn cover_data(&self, y: i32, x: i32) -> Option<&CoverData> {
        let idx = self.cell(y, x).cover;
        if idx == COVER_NONE_IDX {
            None
        } else {
            self.cover_pool.get(idx)
        }
    }

    /// Install a cover record on a cell, replacing any previous one and
    /// rewriting the terrain to the record's feature.
    pub fn install_cover(&mut self, y: i32, x: i32, data: CoverData) {
        if !self.in_bounds(y, x) {
            return;
        }
        let feat = data.feat;
        let old = self.cell(y, x).cover;
        if old != COVER_NONE_IDX {
            self.cover_pool.remove(old);
        }
        let idx = self.cover_pool.insert(data);
        let i = self.idx(y, x);
        self.cells[i].cover = idx;
        self.cells[i].feat = feat;
    }

    /// Release a cell's cover record and revert the terrain to bare floor.
    pub fn destroy_cover(&mut self, y: i32, x: i32) {
        if !self.in_bounds(y, x) {
            return;
        }
        let i = self.idx(y, x);
        let idx = self.cells[i].cover;
        if idx != COVER_NONE_IDX {
            self.cover_pool.remove(idx);
            self.cells[i].cover = COVER_NONE_IDX;
        }
        self.cells[i].feat = Feature::Floor;
    }

    /// Wipe every cell back to the given background feature, clearing
    /// flags, occupancy, cover, and elevation.
    pub fn wipe(&mut self, background: Feature) {
        for cell in &mut self.cells {
            *cell = Cell {
                feat: background,
                ..Cell::default()
            };
        }
        for sector in &mut self.sectors {
            *sector = Sector::Ruins;
        }
        self.cover_pool.clear();
    }

    /// Count granite-or-harder grids cardinally adjacent to `(y, x)`.
    /// Assumes the grid is fully in bounds.
    pub fn next_to_walls(&self, y: i32, x: i32) -> i32 {
        let mut k = 0;
        for (dy, dx) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
            if self.feat(y + dy, x + dx).is_granite_or_harder() {
                k += 1;
            }
        }
        k
    }

    /// Raw feature stream, row-major. Used by persistence and by the
    /// determinism tests.
    pub fn feature_stream(&self) -> Vec<u8> {
        self.cells.iter().map(|c| c.feat.repr()).collect()
    }

    /// Raw flag stream, row-major.
    pub fn flag_stream(&self) -> Vec<u8> {
        self.cells.iter().map(|c| c.flags.bits()).collect()
    }

    /// Raw elevation stream, row-major.
    pub fn elevation_stream(&self) -> Vec<u8> {
        self.cells.iter().map(|c| c.elevation as u8).collect()
    }

    /// ASCII rendering for debug output in tests.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(((self.width + 1) * self.height) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                out.push(self.feat(y, x).symbol());
            }
            out.push('\n');
        }
        out
    }

    /// Best cover tier granted by the terrain feature alone.
    pub fn feature_cover(&self, y: i32, x: i32) -> CoverTier {
        CoverTier::of_feature(self.feat(y, x))
    }
}

impl Default for Cave {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds() {
        let cave = Cave::new();
        assert!(cave.in_bounds(0, 0));
        assert!(cave.in_bounds(DUNGEON_HGT - 1, DUNGEON_WID - 1));
        assert!(!cave.in_bounds(-1, 0));
        assert!(!cave.in_bounds(DUNGEON_HGT, 0));
        assert!(!cave.in_bounds_fully(0, 5));
        assert!(cave.in_bounds_fully(1, 1));
    }

    #[test]
    fn naked_and_clean() {
        let mut cave = Cave::new();
        assert!(cave.is_naked(5, 5));
        cave.set_monster(5, 5, 3);
        assert!(cave.is_clean(5, 5));
        assert!(!cave.is_naked(5, 5));
        cave.set_feat(6, 6, Feature::WallExtra);
        assert!(!cave.is_clean(6, 6));
    }

    #[test]
    fn cover_pool_reuses_slots() {
        let mut pool = CoverPool::default();
        let a = pool.insert(CoverData::new(CoverTier::Light, 20, Feature::Crate));
        pool.remove(a);
        let b = pool.insert(CoverData::new(CoverTier::Medium, 40, Feature::Boulder));
        assert_eq!(a, b);
        assert_eq!(pool.get(b).map(|c| c.tier), Some(CoverTier::Medium));
    }

    #[test]
    fn destroy_cover_reverts_to_floor() {
        let mut cave = Cave::new();
        cave.install_cover(4, 4, CoverData::new(CoverTier::Light, 20, Feature::Crate));
        assert_eq!(cave.feat(4, 4), Feature::Crate);
        cave.destroy_cover(4, 4);
        assert_eq!(cave.feat(4, 4), Feature::Floor);
        assert!(cave.cover_data(4, 4).is_none());
    }

    #[test]
    fn wipe_resets_everything() {
        let mut cave = Cave::new();
        cave.set_feat(3, 3, Feature::DeepWater);
        cave.add_flags(3, 3, CellFlags::ROOM | CellFlags::ICKY);
        cave.wipe(Feature::WallExtra);
        assert_eq!(cave.feat(3, 3), Feature::WallExtra);
        assert!(cave.flags(3, 3).is_empty());
    }
}
