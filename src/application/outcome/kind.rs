//! Outcome kinds of a propagated item and of a whole batch

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of propagating one item to one roaming partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OutcomeKind {
    Unspecified,
    NoOperation,
    AdminDown,
    OutOfService,
    Filtered,
    InvalidSessionId,
    UnknownSessionId,
    UnknownProviderIdStart,
    UnknownProviderIdStop,
    UnknownLocation,
    InvalidToken,
    CouldNotConvertFormat,
    Error,
    Timeout,
    /// Accepted into a retry queue, not yet delivered.
    Enqueued,
    Success,
}

/// Coarse classification used when deciding what to do with a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeCategory {
    /// Nothing was attempted and nothing is known.
    Undetermined,
    /// The partner is switched off or marked unhealthy; nothing was sent.
    Unavailable,
    /// The partner understood the request and declined it.
    Rejected,
    /// May succeed when retried.
    Transient,
    /// Accepted for later delivery.
    Deferred,
    Confirmed,
}

impl OutcomeKind {
    pub const ALL: [OutcomeKind; 16] = [
        Self::Unspecified,
        Self::NoOperation,
        Self::AdminDown,
        Self::OutOfService,
        Self::Filtered,
        Self::InvalidSessionId,
        Self::UnknownSessionId,
        Self::UnknownProviderIdStart,
        Self::UnknownProviderIdStop,
        Self::UnknownLocation,
        Self::InvalidToken,
        Self::CouldNotConvertFormat,
        Self::Error,
        Self::Timeout,
        Self::Enqueued,
        Self::Success,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unspecified => "Unspecified",
            Self::NoOperation => "NoOperation",
            Self::AdminDown => "AdminDown",
            Self::OutOfService => "OutOfService",
            Self::Filtered => "Filtered",
            Self::InvalidSessionId => "InvalidSessionId",
            Self::UnknownSessionId => "UnknownSessionId",
            Self::UnknownProviderIdStart => "UnknownProviderIdStart",
            Self::UnknownProviderIdStop => "UnknownProviderIdStop",
            Self::UnknownLocation => "UnknownLocation",
            Self::InvalidToken => "InvalidToken",
            Self::CouldNotConvertFormat => "CouldNotConvertFormat",
            Self::Error => "Error",
            Self::Timeout => "Timeout",
            Self::Enqueued => "Enqueued",
            Self::Success => "Success",
        }
    }

    pub fn category(&self) -> OutcomeCategory {
        match self {
            Self::Unspecified | Self::NoOperation => OutcomeCategory::Undetermined,
            Self::AdminDown | Self::OutOfService => OutcomeCategory::Unavailable,
            Self::Filtered
            | Self::InvalidSessionId
            | Self::UnknownSessionId
            | Self::UnknownProviderIdStart
            | Self::UnknownProviderIdStop
            | Self::UnknownLocation
            | Self::InvalidToken
            | Self::CouldNotConvertFormat => OutcomeCategory::Rejected,
            Self::Error | Self::Timeout => OutcomeCategory::Transient,
            Self::Enqueued => OutcomeCategory::Deferred,
            Self::Success => OutcomeCategory::Confirmed,
        }
    }

    /// Delivery confirmed by the partner.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Delivered or queued for delivery.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Success | Self::Enqueued)
    }

    /// `Enqueued` is the only kind a later attempt can still change.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Enqueued)
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == OutcomeCategory::Transient
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a batch: either every item agrees, or the batch is mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BatchOutcomeKind {
    Uniform(OutcomeKind),
    Mixed,
}

impl BatchOutcomeKind {
    /// The shared per-item kind, `None` for mixed batches.
    pub fn uniform(&self) -> Option<OutcomeKind> {
        match self {
            Self::Uniform(kind) => Some(*kind),
            Self::Mixed => None,
        }
    }

    pub fn is_mixed(&self) -> bool {
        matches!(self, Self::Mixed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uniform(kind) => kind.as_str(),
            Self::Mixed => "Mixed",
        }
    }
}

impl From<OutcomeKind> for BatchOutcomeKind {
    fn from(kind: OutcomeKind) -> Self {
        Self::Uniform(kind)
    }
}

impl PartialEq<OutcomeKind> for BatchOutcomeKind {
    fn eq(&self, other: &OutcomeKind) -> bool {
        self.uniform() == Some(*other)
    }
}

impl fmt::Display for BatchOutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_enqueued_is_non_terminal() {
        let non_terminal: Vec<_> = OutcomeKind::ALL
            .iter()
            .filter(|k| !k.is_terminal())
            .collect();
        assert_eq!(non_terminal, vec![&OutcomeKind::Enqueued]);
    }

    #[test]
    fn enqueued_is_accepted_but_not_success() {
        assert!(OutcomeKind::Enqueued.is_accepted());
        assert!(!OutcomeKind::Enqueued.is_success());
        assert!(!OutcomeKind::Enqueued.is_retryable());
    }

    #[test]
    fn categories_follow_error_taxonomy() {
        assert_eq!(OutcomeKind::OutOfService.category(), OutcomeCategory::Unavailable);
        assert_eq!(OutcomeKind::UnknownLocation.category(), OutcomeCategory::Rejected);
        assert_eq!(OutcomeKind::Timeout.category(), OutcomeCategory::Transient);
        assert!(OutcomeKind::Error.is_retryable());
        assert!(!OutcomeKind::Filtered.is_retryable());
    }

    #[test]
    fn batch_kind_compares_with_item_kind() {
        let batch = BatchOutcomeKind::from(OutcomeKind::Success);
        assert_eq!(batch, OutcomeKind::Success);
        assert_ne!(BatchOutcomeKind::Mixed, OutcomeKind::Success);
        assert_eq!(BatchOutcomeKind::Mixed.to_string(), "Mixed");
    }
}
