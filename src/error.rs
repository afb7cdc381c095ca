use sea_orm::DbErr;
use thiserror::Error;

use crate::entities::EntityKind;
use crate::pipeline::{Stage, StageReport};

#[derive(Debug, Error)]
pub enum SeedError {
    /// A candidate row stayed invalid for the whole retry budget. Fatal for the stage.
    #[error("could not produce a valid {target} after {attempts} attempts: {reason}")]
    ConstraintExhausted {
        target: String,
        attempts: u32,
        reason: String,
    },

    /// Fewer parent rows exist than the request needs.
    #[error("requested {requested} from {population}, but only {available} exist")]
    InsufficientPopulation {
        population: String,
        requested: usize,
        available: usize,
    },

    #[error("store rejected {entity} rows: {source}")]
    Persistence {
        entity: EntityKind,
        #[source]
        source: DbErr,
    },

    #[error("transaction error: {0}")]
    Transaction(#[source] DbErr),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SeedError {
    pub fn insufficient(population: impl Into<String>, requested: usize, available: usize) -> Self {
        SeedError::InsufficientPopulation {
            population: population.into(),
            requested,
            available,
        }
    }
}

/// A run that stopped early. `completed` holds the stages that were committed before `stage` failed.
#[derive(Debug, Error)]
#[error("stage {stage} failed: {source}")]
pub struct RunError {
    pub stage: Stage,
    #[source]
    pub source: SeedError,
    pub completed: Vec<StageReport>,
}
