//! Run configuration files.

use lartrace_algorithms::{AssociationConfig, ConsolidationConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::Result;

/// Parameters for every pass, as read from `--config`.
///
/// Missing sections and fields take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub association: AssociationConfig,
    pub consolidation: ConsolidationConfig,
}

impl RunConfig {
    /// Loads a JSON configuration file, or the defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Ok(serde_json::from_str(&fs::read_to_string(path)?)?),
            None => Ok(Self::default()),
        }
    }
}
