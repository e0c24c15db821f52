//! Out-of-order delivery protection.

use crate::identifiers::TransactionId;

/// Discards tagged messages that do not advance the transaction id.
///
/// A page context admits a message only if its id is strictly greater than
/// the last admitted one. Untagged messages are always admitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionGuard {
    last: Option<TransactionId>,
}

impl TransactionGuard {
    /// Creates a guard that has processed nothing.
    #[must_use]
    pub const fn new() -> Self {
        Self { last: None }
    }

    /// Admits `id` if it is newer than every admitted id.
    ///
    /// Returns `false` for duplicates and late deliveries.
    pub fn admit(&mut self, id: Option<TransactionId>) -> bool {
        let Some(id) = id else {
            return true;
        };
        match self.last {
            Some(last) if id <= last => false,
            _ => {
                self.last = Some(id);
                true
            }
        }
    }

    /// Last admitted id.
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<TransactionId> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> Option<TransactionId> {
        Some(TransactionId::new(n))
    }

    #[test]
    fn test_admits_increasing_ids() {
        let mut guard = TransactionGuard::new();
        assert!(guard.admit(id(1)));
        assert!(guard.admit(id(2)));
        assert!(guard.admit(id(10)));
        assert_eq!(guard.last(), id(10));
    }

    #[test]
    fn test_rejects_duplicates_and_late_ids() {
        let mut guard = TransactionGuard::new();
        assert!(guard.admit(id(5)));
        assert!(!guard.admit(id(5)));
        assert!(!guard.admit(id(4)));
        assert_eq!(guard.last(), id(5));
    }

    #[test]
    fn test_compares_numerically() {
        // "10" < "9" as strings; numerically it is newer.
        let mut guard = TransactionGuard::new();
        assert!(guard.admit(id(9)));
        assert!(guard.admit(id(10)));
        assert!(!guard.admit(id(9)));
    }

    #[test]
    fn test_untagged_always_admitted() {
        let mut guard = TransactionGuard::new();
        assert!(guard.admit(id(3)));
        assert!(guard.admit(None));
        assert_eq!(guard.last(), id(3));
    }
}
