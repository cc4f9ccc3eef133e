//! Domain errors

use thiserror::Error;

use super::events::Veto;

/// Why a structural mutation of the fleet did not happen.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FleetError {
    #[error("{entity} {id} already exists")]
    AlreadyExists { entity: &'static str, id: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} {id} rejected: {}", describe_vetoes(.vetoes))]
    Vetoed {
        entity: &'static str,
        id: String,
        vetoes: Vec<Veto>,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

fn describe_vetoes(vetoes: &[Veto]) -> String {
    vetoes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl FleetError {
    pub fn is_veto(&self) -> bool {
        matches!(self, Self::Vetoed { .. })
    }
}

/// Result type for domain operations
pub type FleetResult<T> = Result<T, FleetError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::VetoCause;

    #[test]
    fn veto_message_lists_every_observer() {
        let err = FleetError::Vetoed {
            entity: "charging station",
            id: "ST1".into(),
            vetoes: vec![
                Veto {
                    observer: "geo".into(),
                    cause: VetoCause::Rejected,
                },
                Veto {
                    observer: "billing".into(),
                    cause: VetoCause::Fault("timeout".into()),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "charging station ST1 rejected: vetoed by geo; observer billing failed: timeout"
        );
        assert!(err.is_veto());
    }
}
