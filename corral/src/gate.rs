use serde::{Deserialize, Serialize};

/// System-wide cap on concurrently `Running` runs.
///
/// Checking the running count and inserting in a separate step is racy: two
/// near-simultaneous requests can both observe a count below the ceiling.
/// The ceiling is therefore handed to [`RunLedger::create`] and enforced by
/// the store as a single atomic admission-gated insert, so the cap holds
/// strictly.
///
/// [`RunLedger::create`]: crate::ledger::RunLedger::create
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum AdmissionCeiling {
    /// No system-wide cap; every non-duplicate request is admitted.
    Unlimited,
    /// At most this many runs may be `Running` at once.
    Limit(u32),
}

impl AdmissionCeiling {
    /// Whether a request would be admitted given the current running count.
    ///
    /// Stores use this for the in-transaction check; callers should not
    /// pre-check with a separate read, since the count can change between
    /// the read and the insert.
    pub fn admits(&self, running: u64) -> bool {
        match self {
            AdmissionCeiling::Unlimited => true,
            AdmissionCeiling::Limit(limit) => running < u64::from(*limit),
        }
    }
}

impl Default for AdmissionCeiling {
    fn default() -> Self {
        AdmissionCeiling::Unlimited
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_always_admits() {
        assert!(AdmissionCeiling::Unlimited.admits(0));
        assert!(AdmissionCeiling::Unlimited.admits(10_000));
    }

    #[test]
    fn limit_refuses_at_ceiling() {
        let ceiling = AdmissionCeiling::Limit(1);
        assert!(ceiling.admits(0));
        assert!(!ceiling.admits(1));
        assert!(!ceiling.admits(2));
    }

    #[test]
    fn zero_limit_refuses_everything() {
        assert!(!AdmissionCeiling::Limit(0).admits(0));
    }
}
