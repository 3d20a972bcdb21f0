use std::collections::{BTreeMap, VecDeque};

use image::RgbImage;
use ndarray::Array3;

use crate::algorithms::Image;
use crate::model::{LabelMap, RoiSets};

/// Snapshots kept per plane, including the original at index 0.
pub const HISTORY_CAPACITY: usize = 20;

/// Deep copy of one plane's editable artifacts.
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySnapshot {
    pub label_map: LabelMap,
    pub overlay: Array3<u8>,
    pub sets: RoiSets,
    pub areas: BTreeMap<u32, f32>,
    pub circularities: BTreeMap<u32, f32>,
    pub rendered: RgbImage,
    pub adjusted: Image,
}

/// Per-plane bounded undo stacks.
#[derive(Debug, Clone, Default)]
pub struct EditStore {
    stacks: Vec<VecDeque<HistorySnapshot>>,
}

impl EditStore {
    pub fn new(planes: usize) -> Self {
        Self {
            stacks: (0..planes).map(|_| VecDeque::new()).collect(),
        }
    }

    pub fn planes(&self) -> usize {
        self.stacks.len()
    }

    pub fn len(&self, z: usize) -> usize {
        self.stacks.get(z).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self, z: usize) -> bool {
        self.len(z) == 0
    }

    pub fn top(&self, z: usize) -> Option<&HistorySnapshot> {
        self.stacks.get(z).and_then(VecDeque::back)
    }

    pub fn original(&self, z: usize) -> Option<&HistorySnapshot> {
        self.stacks.get(z).and_then(VecDeque::front)
    }

    /// Pushes unconditionally; a full stack drops its oldest edit but keeps the original.
    pub fn commit(&mut self, z: usize, snapshot: HistorySnapshot) {
        let Some(stack) = self.stacks.get_mut(z) else {
            return;
        };
        if stack.len() >= HISTORY_CAPACITY {
            stack.remove(1);
        }
        stack.push_back(snapshot);
    }

    /// Pushes only onto an empty stack. Returns whether the snapshot was stored.
    pub fn commit_if_new(&mut self, z: usize, snapshot: HistorySnapshot) -> bool {
        if !self.is_empty(z) || z >= self.stacks.len() {
            return false;
        }
        self.commit(z, snapshot);
        true
    }

    /// Drops the newest entry and returns the new top; the original is never popped.
    pub fn undo(&mut self, z: usize) -> Option<&HistorySnapshot> {
        let stack = self.stacks.get_mut(z)?;
        if stack.len() <= 1 {
            return None;
        }
        stack.pop_back();
        stack.back()
    }

    /// Truncates to the original entry and returns it.
    pub fn reset(&mut self, z: usize) -> Option<&HistorySnapshot> {
        let stack = self.stacks.get_mut(z)?;
        stack.truncate(1);
        stack.front()
    }

    pub fn clear(&mut self) {
        self.stacks.iter_mut().for_each(VecDeque::clear);
    }
}
