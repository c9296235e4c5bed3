//! # Turn predictor
//!
//! Laps of a closed track repeat, so the turns that followed the last time
//! the recent sequence of turns was seen are a good guess at what comes next.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;

use super::{
    history::{TurnHistory, TurnHistoryEntry},
    params::TurnParams,
};

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Predict the next two turn segments.
///
/// The last `pattern_len` labels are searched for in earlier history, most
/// recent first, starting `search_gap` entries before the window just ahead
/// of the trailing one. The two entries following the first match are
/// returned. `None` if the history is too short or nothing matches.
pub fn predict(history: &TurnHistory, params: &TurnParams) -> Option<[TurnHistoryEntry; 2]> {
    let len = history.len();
    let k = params.pattern_len;

    if len < params.min_history || k == 0 || len < k {
        return None;
    }

    let pattern: Vec<_> = history.iter().skip(len - k).map(|e| e.label).collect();

    let start = len.checked_sub(k + 1 + params.search_gap)?;

    for i in (0..=start).rev() {
        let matches = (0..k).all(|j| history.get(i + j).map(|e| e.label) == Some(pattern[j]));

        if matches {
            let next = history.get(i + k)?;
            let after = history.get(i + k + 1)?;

            trace!("Turn pattern matched at {}, predicting {} then {}", i, next, after);

            return Some([*next, *after]);
        }
    }

    None
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
