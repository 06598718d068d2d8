//! Per-generation scratch state.
//!
//! Lives only for one `cave_gen` pass. The arrays carry hard caps so a
//! runaway carver degrades instead of growing without bound.

use crate::consts::{CENT_MAX, DOOR_MAX, TUNN_MAX, WALL_MAX};

/// Scratch bookkeeping shared by the room, sector, and tunnel passes.
#[derive(Debug, Clone, Default)]
pub struct DunState {
    /// Chosen room/sector centers, in placement order.
    pub cent: Vec<(i32, i32)>,
    /// Candidate door positions collected while tunneling.
    pub door: Vec<(i32, i32)>,
    /// Wall piercing grids of the current tunnel.
    pub wall: Vec<(i32, i32)>,
    /// Carved corridor grids of the current tunnel.
    pub tunn: Vec<(i32, i32)>,
    /// Blocks along each axis.
    pub row_rooms: i32,
    pub col_rooms: i32,
    /// Which blocks are reserved.
    room_map: Vec<bool>,
    /// A nest or pit has been placed; further ones are refused.
    pub crowded: bool,
}

impl DunState {
    pub fn new(row_rooms: i32, col_rooms: i32) -> Self {
        Self {
            cent: Vec::new(),
            door: Vec::new(),
            wall: Vec::new(),
            tunn: Vec::new(),
            row_rooms,
            col_rooms,
            room_map: vec![false; (row_rooms * col_rooms) as usize],
            crowded: false,
        }
    }

    pub fn push_cent(&mut self, y: i32, x: i32) {
        if self.cent.len() < CENT_MAX {
            self.cent.push((y, x));
        }
    }

    pub fn push_door(&mut self, y: i32, x: i32) {
        if self.door.len() < DOOR_MAX {
            self.door.push((y, x));
        }
    }

    pub fn push_wall(&mut self, y: i32, x: i32) {
        if self.wall.len() < WALL_MAX {
            self.wall.push((y, x));
        }
    }

    pub fn push_tunn(&mut self, y: i32, x: i32) {
        if self.tunn.len() < TUNN_MAX {
            self.tunn.push((y, x));
        }
    }

    pub fn block_used(&self, by: i32, bx: i32) -> bool {
        self.room_map[(by * self.col_rooms + bx) as usize]
    }

    pub fn reserve_block(&mut self, by: i32, bx: i32) {
        if by >= 0 && by < self.row_rooms && bx >= 0 && bx < self.col_rooms {
            self.room_map[(by * self.col_rooms + bx) as usize] = true;
        }
    }

    /// Reserve the 2x2 block square rooted at `(by, bx)`.
    pub fn reserve_sector(&mut self, by: i32, bx: i32) {
        for dy in 0..2 {
            for dx in 0..2 {
                self.reserve_block(by + dy, bx + dx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_hold() {
        let mut dun = DunState::new(6, 18);
        for i in 0..(TUNN_MAX + 100) {
            dun.push_tunn(i as i32, 0);
        }
        assert_eq!(dun.tunn.len(), TUNN_MAX);
        for i in 0..(CENT_MAX + 5) {
            dun.push_cent(i as i32, 0);
        }
        assert_eq!(dun.cent.len(), CENT_MAX);
    }

    #[test]
    fn block_reservation() {
        let mut dun = DunState::new(6, 18);
        assert!(!dun.block_used(2, 3));
        dun.reserve_sector(2, 3);
        assert!(dun.block_used(2, 3));
        assert!(dun.block_used(3, 4));
        assert!(!dun.block_used(4, 4));
        // Edge reservations clip instead of wrapping.
        dun.reserve_sector(5, 17);
        assert!(dun.block_used(5, 17));
    }
}
