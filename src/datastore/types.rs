/*!
 * Data Store Types
 * Durability scopes, errors and the event meta data record
 */

use crate::core::types::{EventNumber, Experiment, RunNumber};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Data store operation result
pub type StoreResult<T> = Result<T, StoreError>;

/// Data store errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Entry '{name}' ({durability}) is not registered")]
    NotRegistered { name: String, durability: Durability },

    #[error("Entry '{name}' ({durability}) is already registered with a different type")]
    TypeMismatch { name: String, durability: Durability },

    #[error("Entry '{name}' ({durability}) has no object")]
    Empty { name: String, durability: Durability },
}

/// Lifetime scope of a store entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Durability {
    /// Cleared after every event
    Event,
    /// Cleared at every run boundary
    Run,
    /// Cleared when the job terminates
    Persistent,
}

impl Durability {
    pub const ALL: [Durability; 3] = [Durability::Event, Durability::Run, Durability::Persistent];

    #[inline]
    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Durability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Durability::Event => "event",
            Durability::Run => "run",
            Durability::Persistent => "persistent",
        };
        f.write_str(name)
    }
}

/// Identification of the event being processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventMetaData {
    pub experiment: Experiment,
    pub run: RunNumber,
    pub event: EventNumber,
}

impl EventMetaData {
    pub fn new(experiment: Experiment, run: RunNumber, event: EventNumber) -> Self {
        Self {
            experiment,
            run,
            event,
        }
    }

    /// Whether two records belong to the same run
    pub fn same_run(&self, other: &EventMetaData) -> bool {
        self.experiment == other.experiment && self.run == other.run
    }
}

impl std::fmt::Display for EventMetaData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "exp {} run {} evt {}", self.experiment, self.run, self.event)
    }
}
