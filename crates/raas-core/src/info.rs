//! Per-registration call counters.

use serde::{Deserialize, Serialize};

/// Snapshot of one registration's call counters.
///
/// All counters are monotonically non-decreasing for the life of the
/// registration. A call that is still running has been counted in
/// `called_num` but in neither of the other two.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Calls accepted by a handshake.
    pub called_num: u64,
    /// Calls whose output completed normally.
    pub completed_num: u64,
    /// Calls whose output ended with an error.
    pub error_num: u64,
}

impl ServiceInfo {
    /// Create a snapshot from explicit counter values.
    #[must_use]
    pub const fn new(called_num: u64, completed_num: u64, error_num: u64) -> Self {
        Self {
            called_num,
            completed_num,
            error_num,
        }
    }

    /// Calls accepted but not yet finished.
    ///
    /// Calls cancelled by registration disposal are never finished, so
    /// they stay in this count.
    #[must_use]
    pub const fn in_flight(&self) -> u64 {
        self.called_num
            .saturating_sub(self.completed_num)
            .saturating_sub(self.error_num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight() {
        assert_eq!(ServiceInfo::new(5, 2, 1).in_flight(), 2);
        assert_eq!(ServiceInfo::default().in_flight(), 0);
    }
}
