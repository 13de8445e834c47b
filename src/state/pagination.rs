/// Pagination state definitions for the listing traversal
///
/// This module defines every state the pagination driver can be in and
/// which transitions between them are legal.
use std::fmt;

/// Represents the current step of the listing traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaginationState {
    /// Nothing fetched yet
    Start,

    /// A listing batch request is in flight
    FetchingBatch,

    /// Child references of the batch are being registered and scheduled
    RegisteringEntries,

    /// The store is being checkpointed after a batch
    Persisting,

    /// No cursor remains; waiting for scheduled workers to finish
    Draining,

    /// Traversal and all scheduled work are complete
    Done,
}

impl PaginationState {
    /// Returns true once nothing further can happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true while the driver is still walking listing batches
    pub fn is_walking(&self) -> bool {
        matches!(
            self,
            Self::FetchingBatch | Self::RegisteringEntries | Self::Persisting
        )
    }

    /// Returns true if moving from `self` to `next` is legal
    ///
    /// `Start -> Done` covers an account that reports no items at all.
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Start, Self::FetchingBatch)
                | (Self::Start, Self::Done)
                | (Self::FetchingBatch, Self::RegisteringEntries)
                | (Self::RegisteringEntries, Self::Persisting)
                | (Self::Persisting, Self::FetchingBatch)
                | (Self::Persisting, Self::Draining)
                | (Self::Draining, Self::Done)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::FetchingBatch => "fetching_batch",
            Self::RegisteringEntries => "registering_entries",
            Self::Persisting => "persisting",
            Self::Draining => "draining",
            Self::Done => "done",
        }
    }

    /// Returns all possible pagination states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Start,
            Self::FetchingBatch,
            Self::RegisteringEntries,
            Self::Persisting,
            Self::Draining,
            Self::Done,
        ]
    }
}

impl fmt::Display for PaginationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_cycle() {
        use PaginationState::*;
        let path = [
            Start,
            FetchingBatch,
            RegisteringEntries,
            Persisting,
            FetchingBatch,
            RegisteringEntries,
            Persisting,
            Draining,
            Done,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} should be legal",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_empty_account_shortcut() {
        assert!(PaginationState::Start.can_transition_to(PaginationState::Done));
    }

    #[test]
    fn test_illegal_transitions() {
        use PaginationState::*;
        assert!(!Start.can_transition_to(Persisting));
        assert!(!FetchingBatch.can_transition_to(Persisting));
        assert!(!RegisteringEntries.can_transition_to(FetchingBatch));
        assert!(!Persisting.can_transition_to(Done));
        assert!(!Done.can_transition_to(Start));
        assert!(!Draining.can_transition_to(FetchingBatch));
    }

    #[test]
    fn test_terminal_has_no_exits() {
        for next in PaginationState::all_states() {
            assert!(!PaginationState::Done.can_transition_to(next));
        }
        assert!(PaginationState::Done.is_terminal());
    }

    #[test]
    fn test_is_walking() {
        assert!(PaginationState::FetchingBatch.is_walking());
        assert!(PaginationState::Persisting.is_walking());
        assert!(!PaginationState::Start.is_walking());
        assert!(!PaginationState::Draining.is_walking());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", PaginationState::FetchingBatch), "fetching_batch");
        assert_eq!(format!("{}", PaginationState::Done), "done");
    }
}
