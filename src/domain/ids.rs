//! Identifiers for the roaming hierarchy
//!
//! Parsing and formatting of the real-world identifier schemes (e.g.
//! `DE*GEF*E1234*1`) is the business of the protocol adapters; inside the
//! core an identifier is an opaque, ordered string.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Roaming network identifier
    RoamingNetworkId
);
string_id!(
    /// Charging station operator identifier
    OperatorId
);
string_id!(
    /// Charging pool identifier
    ChargingPoolId
);
string_id!(
    /// Charging station identifier
    ChargingStationId
);
string_id!(
    /// EVSE identifier
    EvseId
);
string_id!(
    /// Identity of whoever produced an operation result: the hub itself or
    /// one of the roaming partners behind an adapter.
    AuthorizatorId
);
string_id!(
    /// Who asked for a mutation (user, API key, importer, ...)
    Actor
);
string_id!(
    /// Charging session identifier as known to the partner
    SessionId
);

impl Actor {
    /// Actor used for mutations the hub performs on its own behalf.
    pub fn system() -> Self {
        Self::new("system")
    }
}

/// Correlates everything that happens because of one logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventTrackingId(Uuid);

impl EventTrackingId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventTrackingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventTrackingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to any node of the roaming hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id")]
pub enum EntityRef {
    RoamingNetwork(RoamingNetworkId),
    Operator(OperatorId),
    ChargingPool(ChargingPoolId),
    ChargingStation(ChargingStationId),
    Evse(EvseId),
}

impl EntityRef {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RoamingNetwork(_) => "roaming_network",
            Self::Operator(_) => "operator",
            Self::ChargingPool(_) => "charging_pool",
            Self::ChargingStation(_) => "charging_station",
            Self::Evse(_) => "evse",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::RoamingNetwork(id) => id.as_str(),
            Self::Operator(id) => id.as_str(),
            Self::ChargingPool(id) => id.as_str(),
            Self::ChargingStation(id) => id.as_str(),
            Self::Evse(id) => id.as_str(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}
