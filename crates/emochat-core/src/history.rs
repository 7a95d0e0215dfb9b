use serde::{Deserialize, Serialize};

/// Encoded turns of one conversation, user and bot alternating.
///
/// Holds at most `2 * max_history` entries once [`History::evict`] has run; the oldest
/// entries go first.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    max_history: usize,
    entries: Vec<Vec<u32>>,
}

impl History {
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            entries: vec![],
        }
    }

    pub fn capacity(&self) -> usize {
        2 * self.max_history
    }

    pub fn push(&mut self, tokens: Vec<u32>) {
        self.entries.push(tokens);
    }

    /// Drop entries from the front until the length is within capacity.
    pub fn evict(&mut self) {
        let excess = self.entries.len().saturating_sub(self.capacity());
        if excess > 0 {
            log::debug!("evicting {excess} history entries");
            self.entries.drain(..excess);
        }
    }

    pub fn entries(&self) -> &[Vec<u32>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evict_keeps_newest_entries() {
        let mut history = History::new(2);
        for turn in 0..7u32 {
            history.push(vec![turn]);
        }
        assert_eq!(history.len(), 7);
        assert_eq!(history.capacity(), 4);

        history.evict();
        assert_eq!(history.entries(), &[vec![3u32], vec![4], vec![5], vec![6]]);
    }

    #[test]
    fn length_stays_bounded_over_many_turns() {
        let mut history = History::new(3);
        for turn in 0..50u32 {
            history.push(vec![turn, turn]);
            history.push(vec![turn + 100]);
            history.evict();
            assert!(history.len() <= 6);
            assert_eq!(history.entries().last(), Some(&vec![turn + 100]));
        }
        assert_eq!(history.entries()[0], vec![47, 47]);
    }

    #[test]
    fn zero_max_history_forgets_everything() {
        let mut history = History::new(0);
        history.push(vec![1]);
        history.push(vec![2]);
        history.evict();
        assert!(history.is_empty());
    }
}
