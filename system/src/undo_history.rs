use crate::Snapshot;
use std::collections::VecDeque;

pub const DEFAULT_UNDO_LIMIT: usize = 50;

/// Committed snapshots, newest last. The oldest entry is evicted once `limit` is reached.
pub struct UndoHistory {
    entries: VecDeque<Snapshot>,
    limit: usize,
}

impl UndoHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        if self.entries.len() == self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
    }

    pub fn pop(&mut self) -> Option<Snapshot> {
        self.entries.pop_back()
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for UndoHistory {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Color;

    #[test]
    fn it_evicts_oldest_entries() {
        let snapshots = (0..4u8)
            .map(|v| Snapshot::encode(1, 1, &[Color::rgb(v, v, v)]).expect(""))
            .collect::<Vec<_>>();
        let mut history = UndoHistory::new(3);
        for snapshot in &snapshots {
            history.push(snapshot.clone());
        }

        assert_eq!(history.len(), 3);
        assert!(history.pop().expect("").ptr_eq(&snapshots[3]));
        assert!(history.pop().expect("").ptr_eq(&snapshots[2]));
        assert!(history.pop().expect("").ptr_eq(&snapshots[1]));
        assert!(history.pop().is_none());
    }
}
