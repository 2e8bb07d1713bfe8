//! Per-(device, slot) occupancy.
//!
//! Pure bookkeeping: which slots are free and, for occupied ones, which
//! pending result they belong to. Mutated only by the core loop.

use super::pending::Sequence;
use super::topology::Topology;

/// Position of one execution slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId {
    /// Row in the topology (not the device id).
    pub device_index: usize,
    pub slot: usize,
}

/// Occupancy table, one row per device, `capacity` cells per row.
#[derive(Debug, Clone)]
pub struct SlotMatrix {
    rows: Vec<Vec<Option<Sequence>>>,
    max_capacity: usize,
    occupied: usize,
}

impl SlotMatrix {
    pub fn new(topology: &Topology) -> Self {
        let rows = (0..topology.len())
            .map(|i| vec![None; topology.capacity(i)])
            .collect();
        Self {
            rows,
            max_capacity: topology.max_capacity(),
            occupied: 0,
        }
    }

    /// First free slot in fill order.
    ///
    /// Slot index is the outer loop and device row the inner one, so slot 0
    /// of every device is taken before slot 1 of any device.
    pub fn find_free(&self) -> Option<SlotId> {
        (0..self.max_capacity).find_map(|slot| {
            self.rows.iter().enumerate().find_map(|(device_index, row)| {
                matches!(row.get(slot), Some(None)).then_some(SlotId { device_index, slot })
            })
        })
    }

    /// Mark `id` as running `sequence`.
    ///
    /// # Panics
    /// If the slot is out of range or already occupied.
    pub fn occupy(&mut self, id: SlotId, sequence: Sequence) {
        let cell = &mut self.rows[id.device_index][id.slot];
        assert!(cell.is_none(), "slot {id:?} already occupied");
        *cell = Some(sequence);
        self.occupied += 1;
    }

    /// Free `id`, returning the sequence it held.
    pub fn release(&mut self, id: SlotId) -> Option<Sequence> {
        let released = self
            .rows
            .get_mut(id.device_index)
            .and_then(|row| row.get_mut(id.slot))
            .and_then(Option::take);
        if released.is_some() {
            self.occupied -= 1;
        }
        released
    }

    pub fn get(&self, id: SlotId) -> Option<Sequence> {
        self.rows
            .get(id.device_index)
            .and_then(|row| row.get(id.slot))
            .copied()
            .flatten()
    }

    /// Occupied slots in row-major order.
    pub fn occupied(&self) -> impl Iterator<Item = (SlotId, Sequence)> + '_ {
        self.rows.iter().enumerate().flat_map(|(device_index, row)| {
            row.iter().enumerate().filter_map(move |(slot, cell)| {
                cell.map(|seq| (SlotId { device_index, slot }, seq))
            })
        })
    }

    /// Occupied slot count on one device row.
    pub fn occupied_on(&self, device_index: usize) -> usize {
        self.rows
            .get(device_index)
            .map_or(0, |row| row.iter().filter(|c| c.is_some()).count())
    }

    pub fn occupied_count(&self) -> usize {
        self.occupied
    }

    pub fn capacity(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    pub fn is_full(&self) -> bool {
        self.occupied == self.capacity()
    }
}
