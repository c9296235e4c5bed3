//! # Drive command

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The command produced once per tick for the motor driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DriveCmd {
    /// Throttle demand, between 0 (stopped) and the configured ceiling (at most 1).
    pub throttle: f64,

    /// Steering demand between -1 and +1.
    ///
    /// Positive steering turns the car to the left, negative to the right.
    pub steering: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DriveCmd {
    /// Zero throttle with the wheels straight.
    pub fn stop() -> Self {
        Self::default()
    }

    /// True if both demands are within their output ranges.
    pub fn is_valid(&self) -> bool {
        (0.0..=1.0).contains(&self.throttle) && (-1.0..=1.0).contains(&self.steering)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_drive_cmd_validity() {
        assert!(DriveCmd::stop().is_valid());
        assert!(DriveCmd { throttle: 0.2, steering: -1.0 }.is_valid());
        assert!(!DriveCmd { throttle: 1.2, steering: 0.0 }.is_valid());
        assert!(!DriveCmd { throttle: 0.1, steering: f64::NAN }.is_valid());

        let json = serde_json::to_string(&DriveCmd { throttle: 0.25, steering: 0.5 }).unwrap();
        assert_eq!(json, r#"{"throttle":0.25,"steering":0.5}"#);
    }
}
