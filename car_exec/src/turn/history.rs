//! Turn labels and the bounded turn history

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::{collections::VecDeque, fmt};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A completed turn segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TurnHistoryEntry {
    pub label: TurnLabel,

    /// Time spent in the segment.
    ///
    /// Units: seconds
    pub duration_s: f64,
}

/// Completed turn segments, oldest first, holding at most `cap` entries.
#[derive(Debug, Clone, Serialize)]
pub struct TurnHistory {
    cap: usize,
    entries: VecDeque<TurnHistoryEntry>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Direction of a turn segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TurnLabel {
    Left,
    Right,
    Straight,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for TurnLabel {
    fn default() -> Self {
        TurnLabel::Straight
    }
}

impl fmt::Display for TurnLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TurnLabel::Left => "L",
            TurnLabel::Right => "R",
            TurnLabel::Straight => "S",
        };
        write!(f, "{}", s)
    }
}

impl TurnHistoryEntry {
    pub fn new(label: TurnLabel, duration_s: f64) -> Self {
        Self { label, duration_s }
    }
}

impl fmt::Display for TurnHistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} {}", self.duration_s, self.label)
    }
}

impl TurnHistory {
    /// A cap of zero is treated as one.
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            cap,
            entries: VecDeque::with_capacity(cap + 1),
        }
    }

    /// Append an entry, evicting the oldest if the history is full.
    pub fn push(&mut self, entry: TurnHistoryEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.cap {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn get(&self, index: usize) -> Option<&TurnHistoryEntry> {
        self.entries.get(index)
    }

    /// Iterate oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &TurnHistoryEntry> + '_ {
        self.entries.iter()
    }

    /// The most recent `n` entries, oldest first.
    pub fn last_n(&self, n: usize) -> Vec<TurnHistoryEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).copied().collect()
    }

    /// Render entries as a comma separated list such as `1.2 S, 0.6 L`.
    pub fn format_entries(entries: &[TurnHistoryEntry]) -> String {
        entries
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_eviction() {
        let mut history = TurnHistory::new(3);
        for i in 0..5 {
            history.push(TurnHistoryEntry::new(TurnLabel::Left, i as f64));
            assert!(history.len() <= 3);
        }

        let durations: Vec<f64> = history.iter().map(|e| e.duration_s).collect();
        assert_eq!(durations, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_last_n_and_format() {
        let mut history = TurnHistory::new(35);
        history.push(TurnHistoryEntry::new(TurnLabel::Straight, 1.23));
        history.push(TurnHistoryEntry::new(TurnLabel::Left, 0.6));
        history.push(TurnHistoryEntry::new(TurnLabel::Right, 0.44));

        let last = history.last_n(2);
        assert_eq!(last.len(), 2);
        assert_eq!(last[0].label, TurnLabel::Left);
        assert_eq!(TurnHistory::format_entries(&last), "0.6 L, 0.4 R");

        assert_eq!(history.last_n(10).len(), 3);
        assert_eq!(TurnHistory::format_entries(&[]), "");
    }
}
