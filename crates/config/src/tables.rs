//! Environment-scoped table naming.
//!
//! Every persisted table is named `{env}_{layer}_{table}` so several
//! environments can share one database without colliding.

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Environment};

/// Data refinement layer a table belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataLayer {
    /// Raw ingested data
    Bronze,
    /// Cleaned, validated records
    #[default]
    Silver,
    /// Aggregated, reporting-ready data
    Gold,
}

impl DataLayer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bronze => "bronze",
            Self::Silver => "silver",
            Self::Gold => "gold",
        }
    }
}

impl std::str::FromStr for DataLayer {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bronze" => Ok(Self::Bronze),
            "silver" => Ok(Self::Silver),
            "gold" => Ok(Self::Gold),
            other => Err(ConfigError::ValidationError(format!(
                "unknown data layer '{other}' (expected bronze, silver or gold)"
            ))),
        }
    }
}

/// Logical tables owned by Reagent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableName {
    AgentRuns,
    Transcripts,
}

impl TableName {
    pub const ALL: [TableName; 2] = [TableName::AgentRuns, TableName::Transcripts];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AgentRuns => "agent_runs",
            Self::Transcripts => "transcripts",
        }
    }
}

/// Builds physical table names for one environment and layer.
#[derive(Debug, Clone)]
pub struct TableNameManager {
    environment: Environment,
    layer: DataLayer,
}

impl TableNameManager {
    pub fn new(environment: Environment, layer: DataLayer) -> Self {
        Self { environment, layer }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn layer(&self) -> DataLayer {
        self.layer
    }

    /// Physical name of `table`.
    pub fn get(&self, table: TableName) -> String {
        format!(
            "{}_{}_{}",
            self.environment.as_str(),
            self.layer.as_str(),
            table.as_str()
        )
    }

    /// Physical names of every table, in declaration order.
    pub fn all(&self) -> Vec<String> {
        TableName::ALL.iter().map(|t| self.get(*t)).collect()
    }
}
