//! Outbound port to one roaming partner
//!
//! [`RoamingAdapter`] is the contract between the propagation pipeline and
//! a partner-specific transport. Implementations own the wire format; the
//! pipeline only sees [`PushItem`]s going out and [`OperationResult`]s
//! coming back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use super::item::{PushItem, PushKind};
use crate::application::outcome::{OperationResult, OutcomeKind};
use crate::domain::ids::AuthorizatorId;

/// Transport-level failure of a single propagation attempt.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AdapterError {
    #[error("partner did not answer within {0:?}")]
    Timeout(Duration),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("could not convert {item} into the partner format: {reason}")]
    Conversion { item: String, reason: String },

    #[error("partner rejected the request ({kind}): {reason}")]
    Rejected { kind: OutcomeKind, reason: String },
}

impl AdapterError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn outcome_kind(&self) -> OutcomeKind {
        match self {
            Self::Timeout(_) => OutcomeKind::Timeout,
            Self::Transport(_) => OutcomeKind::Error,
            Self::Conversion { .. } => OutcomeKind::CouldNotConvertFormat,
            Self::Rejected { kind, .. } => *kind,
        }
    }
}

#[async_trait]
pub trait RoamingAdapter: Send + Sync {
    fn id(&self) -> &AuthorizatorId;

    /// Switched off by an administrator.
    fn is_admin_down(&self) -> bool {
        false
    }

    /// Marked unhealthy, e.g. by a failing connectivity check.
    fn is_out_of_service(&self) -> bool {
        false
    }

    /// Items this partner is not interested in are reported `Filtered`
    /// without a transport call.
    fn accepts(&self, _item: &PushItem, _kind: PushKind) -> bool {
        true
    }

    async fn propagate(&self, item: &PushItem, kind: PushKind) -> Result<OperationResult, AdapterError>;
}

pub type SharedAdapter = Arc<dyn RoamingAdapter>;

/// Health flags an adapter implementation can embed.
#[derive(Debug, Default)]
pub struct AdapterSwitches {
    admin_down: AtomicBool,
    out_of_service: AtomicBool,
}

impl AdapterSwitches {
    pub fn new(admin_down: bool, out_of_service: bool) -> Self {
        Self {
            admin_down: AtomicBool::new(admin_down),
            out_of_service: AtomicBool::new(out_of_service),
        }
    }

    pub fn is_admin_down(&self) -> bool {
        self.admin_down.load(Ordering::SeqCst)
    }

    pub fn is_out_of_service(&self) -> bool {
        self.out_of_service.load(Ordering::SeqCst)
    }

    pub fn set_admin_down(&self, down: bool) {
        if self.admin_down.swap(down, Ordering::SeqCst) != down {
            info!(admin_down = down, "Adapter admin switch changed");
        }
    }

    pub fn set_out_of_service(&self, out_of_service: bool) {
        if self.out_of_service.swap(out_of_service, Ordering::SeqCst) != out_of_service {
            info!(out_of_service, "Adapter health changed");
        }
    }
}
