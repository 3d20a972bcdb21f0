use std::collections::BTreeSet;

/// Per-plane label sets. `removed` is always `filtered_out ∪ erased`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoiSets {
    filtered_out: BTreeSet<u32>,
    erased: BTreeSet<u32>,
    locked: BTreeSet<u32>,
    removed: BTreeSet<u32>,
}

impl RoiSets {
    pub fn new(filtered_out: BTreeSet<u32>) -> Self {
        let mut sets = Self {
            filtered_out,
            ..Self::default()
        };
        sets.recompute_removed();
        sets
    }

    pub fn from_parts(
        filtered_out: BTreeSet<u32>,
        erased: BTreeSet<u32>,
        locked: BTreeSet<u32>,
    ) -> Self {
        let mut sets = Self {
            filtered_out,
            erased,
            locked,
            removed: BTreeSet::new(),
        };
        sets.recompute_removed();
        sets
    }

    pub fn filtered_out(&self) -> &BTreeSet<u32> {
        &self.filtered_out
    }

    pub fn erased(&self) -> &BTreeSet<u32> {
        &self.erased
    }

    pub fn locked(&self) -> &BTreeSet<u32> {
        &self.locked
    }

    pub fn removed(&self) -> &BTreeSet<u32> {
        &self.removed
    }

    pub fn is_removed(&self, label: u32) -> bool {
        self.removed.contains(&label)
    }

    pub fn is_locked(&self, label: u32) -> bool {
        self.locked.contains(&label)
    }

    pub fn set_filtered_out(&mut self, filtered_out: BTreeSet<u32>) {
        self.filtered_out = filtered_out;
        self.recompute_removed();
    }

    /// Returns `false` when the label was already erased.
    pub fn erase(&mut self, label: u32) -> bool {
        let inserted = self.erased.insert(label);
        self.recompute_removed();
        inserted
    }

    /// Returns the new lock state of the label.
    pub fn toggle_lock(&mut self, label: u32) -> bool {
        if self.locked.remove(&label) {
            false
        } else {
            self.locked.insert(label);
            true
        }
    }

    pub fn recompute_removed(&mut self) {
        self.removed = self.filtered_out.union(&self.erased).copied().collect();
    }
}
