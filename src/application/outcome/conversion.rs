//! Conversion tables between subsystem-specific result codes and
//! [`OutcomeKind`].
//!
//! Adapters speak the vocabulary of their subsystem (charge detail record
//! delivery, EVSE data pushes); everything above the adapters uses the
//! canonical kinds. Subsystem → canonical is total; canonical → subsystem is
//! fallible because every subsystem knows only a subset.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::kind::OutcomeKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{kind} has no {subsystem} equivalent")]
pub struct UnmappedOutcome {
    pub kind: OutcomeKind,
    pub subsystem: &'static str,
}

/// Result codes of charge detail record delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CdrDeliveryStatus {
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
    CouldNotConvertCdrFormat,
    Error,
    Timeout,
    Enqueued,
    Forwarded,
}

const CDR_TABLE: [(CdrDeliveryStatus, OutcomeKind); 16] = [
    (CdrDeliveryStatus::Unspecified, OutcomeKind::Unspecified),
    (CdrDeliveryStatus::NoOperation, OutcomeKind::NoOperation),
    (CdrDeliveryStatus::AdminDown, OutcomeKind::AdminDown),
    (CdrDeliveryStatus::OutOfService, OutcomeKind::OutOfService),
    (CdrDeliveryStatus::Filtered, OutcomeKind::Filtered),
    (CdrDeliveryStatus::InvalidSessionId, OutcomeKind::InvalidSessionId),
    (CdrDeliveryStatus::UnknownSessionId, OutcomeKind::UnknownSessionId),
    (CdrDeliveryStatus::UnknownProviderIdStart, OutcomeKind::UnknownProviderIdStart),
    (CdrDeliveryStatus::UnknownProviderIdStop, OutcomeKind::UnknownProviderIdStop),
    (CdrDeliveryStatus::UnknownLocation, OutcomeKind::UnknownLocation),
    (CdrDeliveryStatus::InvalidToken, OutcomeKind::InvalidToken),
    (CdrDeliveryStatus::CouldNotConvertCdrFormat, OutcomeKind::CouldNotConvertFormat),
    (CdrDeliveryStatus::Error, OutcomeKind::Error),
    (CdrDeliveryStatus::Timeout, OutcomeKind::Timeout),
    (CdrDeliveryStatus::Enqueued, OutcomeKind::Enqueued),
    (CdrDeliveryStatus::Forwarded, OutcomeKind::Success),
];

/// Result codes of EVSE data and status pushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PushDataStatus {
    Unspecified,
    NoOperation,
    AdminDown,
    OutOfService,
    LockedAndDisabled,
    UnknownEvse,
    ConversionFailed,
    Error,
    Timeout,
    Enqueued,
    Success,
}

const PUSH_DATA_TABLE: [(PushDataStatus, OutcomeKind); 11] = [
    (PushDataStatus::Unspecified, OutcomeKind::Unspecified),
    (PushDataStatus::NoOperation, OutcomeKind::NoOperation),
    (PushDataStatus::AdminDown, OutcomeKind::AdminDown),
    (PushDataStatus::OutOfService, OutcomeKind::OutOfService),
    (PushDataStatus::LockedAndDisabled, OutcomeKind::Filtered),
    (PushDataStatus::UnknownEvse, OutcomeKind::UnknownLocation),
    (PushDataStatus::ConversionFailed, OutcomeKind::CouldNotConvertFormat),
    (PushDataStatus::Error, OutcomeKind::Error),
    (PushDataStatus::Timeout, OutcomeKind::Timeout),
    (PushDataStatus::Enqueued, OutcomeKind::Enqueued),
    (PushDataStatus::Success, OutcomeKind::Success),
];

fn to_canonical<S: PartialEq + Copy>(table: &[(S, OutcomeKind)], status: S) -> OutcomeKind {
    table
        .iter()
        .find(|(s, _)| *s == status)
        .map(|(_, kind)| *kind)
        .unwrap_or(OutcomeKind::Unspecified)
}

fn from_canonical<S: Copy>(
    table: &[(S, OutcomeKind)],
    kind: OutcomeKind,
    subsystem: &'static str,
) -> Result<S, UnmappedOutcome> {
    table
        .iter()
        .find(|(_, k)| *k == kind)
        .map(|(s, _)| *s)
        .ok_or(UnmappedOutcome { kind, subsystem })
}

impl From<CdrDeliveryStatus> for OutcomeKind {
    fn from(status: CdrDeliveryStatus) -> Self {
        to_canonical(&CDR_TABLE, status)
    }
}

impl TryFrom<OutcomeKind> for CdrDeliveryStatus {
    type Error = UnmappedOutcome;

    fn try_from(kind: OutcomeKind) -> Result<Self, UnmappedOutcome> {
        from_canonical(&CDR_TABLE, kind, "CDR delivery")
    }
}

impl From<PushDataStatus> for OutcomeKind {
    fn from(status: PushDataStatus) -> Self {
        to_canonical(&PUSH_DATA_TABLE, status)
    }
}

impl TryFrom<OutcomeKind> for PushDataStatus {
    type Error = UnmappedOutcome;

    fn try_from(kind: OutcomeKind) -> Result<Self, UnmappedOutcome> {
        from_canonical(&PUSH_DATA_TABLE, kind, "push data")
    }
}
