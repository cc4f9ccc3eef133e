//! Status value types tracked per entity

use std::fmt;

use serde::{Deserialize, Serialize};

/// Administrative status, set by the operator's staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum AdminStatus {
    #[default]
    Unspecified,
    Operational,
    InternalUse,
    OutOfService,
    Blocked,
    Planned,
    UnderConstruction,
    Deleted,
}

impl AdminStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unspecified => "Unspecified",
            Self::Operational => "Operational",
            Self::InternalUse => "InternalUse",
            Self::OutOfService => "OutOfService",
            Self::Blocked => "Blocked",
            Self::Planned => "Planned",
            Self::UnderConstruction => "UnderConstruction",
            Self::Deleted => "Deleted",
        }
    }
}

impl fmt::Display for AdminStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for AdminStatus {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "operational" => Self::Operational,
            "internaluse" => Self::InternalUse,
            "outofservice" => Self::OutOfService,
            "blocked" => Self::Blocked,
            "planned" => Self::Planned,
            "underconstruction" => Self::UnderConstruction,
            "deleted" => Self::Deleted,
            _ => Self::Unspecified,
        }
    }
}

/// Operational status of a single EVSE
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum EvseStatus {
    #[default]
    Unspecified,
    Available,
    Reserved,
    Charging,
    Occupied,
    OutOfService,
    Offline,
    Blocked,
    Error,
}

impl EvseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unspecified => "Unspecified",
            Self::Available => "Available",
            Self::Reserved => "Reserved",
            Self::Charging => "Charging",
            Self::Occupied => "Occupied",
            Self::OutOfService => "OutOfService",
            Self::Offline => "Offline",
            Self::Blocked => "Blocked",
            Self::Error => "Error",
        }
    }

    /// Whether a driver could start charging right now.
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

impl fmt::Display for EvseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for EvseStatus {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "available" => Self::Available,
            "reserved" => Self::Reserved,
            "charging" => Self::Charging,
            "occupied" => Self::Occupied,
            "outofservice" => Self::OutOfService,
            "offline" => Self::Offline,
            "blocked" => Self::Blocked,
            "error" => Self::Error,
            _ => Self::Unspecified,
        }
    }
}

/// Operational status of the aggregating levels: network, operator,
/// pool and station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum SiteStatus {
    #[default]
    Unspecified,
    Available,
    PartiallyAvailable,
    Occupied,
    OutOfService,
    Offline,
    Error,
}

impl SiteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unspecified => "Unspecified",
            Self::Available => "Available",
            Self::PartiallyAvailable => "PartiallyAvailable",
            Self::Occupied => "Occupied",
            Self::OutOfService => "OutOfService",
            Self::Offline => "Offline",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for SiteStatus {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "available" => Self::Available,
            "partiallyavailable" => Self::PartiallyAvailable,
            "occupied" => Self::Occupied,
            "outofservice" => Self::OutOfService,
            "offline" => Self::Offline,
            "error" => Self::Error,
            _ => Self::Unspecified,
        }
    }
}
