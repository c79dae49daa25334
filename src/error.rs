use std::fmt::{self, Debug, Display};
use std::io;

use strum::Display as StrumDisplay;

use crate::population::AgentId;

/// The stage of the daily pipeline (or loading) in which a data consistency
/// error was detected.
#[derive(Copy, Clone, Debug, PartialEq, Eq, StrumDisplay)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Load,
    Occupancy,
    Contributions,
    Transitions,
    Testing,
    Statistics,
}

/// Provides `AbmError` and maps to other errors to
/// convert to an `AbmError`
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum AbmError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CSVError(csv::Error),
    /// A token of an input file could not be parsed into the expected type.
    ParseError(String),
    /// Bad parameters or rule tables. Raised before any random draw.
    ConfigError(String),
    /// Inputs or runtime state that contradict the model's invariants.
    DataError {
        day: Option<u32>,
        stage: Stage,
        agent: Option<AgentId>,
        message: String,
    },
    ReportError(String),
    AbmError(String),
}

impl AbmError {
    pub fn config(message: impl Into<String>) -> Self {
        AbmError::ConfigError(message.into())
    }

    pub fn data(
        day: Option<u32>,
        stage: Stage,
        agent: Option<AgentId>,
        message: impl Into<String>,
    ) -> Self {
        AbmError::DataError {
            day,
            stage,
            agent,
            message: message.into(),
        }
    }
}

impl From<io::Error> for AbmError {
    fn from(error: io::Error) -> Self {
        AbmError::IoError(error)
    }
}

impl From<serde_json::Error> for AbmError {
    fn from(error: serde_json::Error) -> Self {
        AbmError::JsonError(error)
    }
}

impl From<csv::Error> for AbmError {
    fn from(error: csv::Error) -> Self {
        AbmError::CSVError(error)
    }
}

impl From<String> for AbmError {
    fn from(error: String) -> Self {
        AbmError::AbmError(error)
    }
}

impl From<&str> for AbmError {
    fn from(error: &str) -> Self {
        AbmError::AbmError(error.to_string())
    }
}

impl std::error::Error for AbmError {}

impl Display for AbmError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AbmError::ConfigError(message) => write!(f, "Configuration error: {message}"),
            AbmError::ParseError(message) => write!(f, "Parse error: {message}"),
            AbmError::ReportError(message) => write!(f, "Report error: {message}"),
            AbmError::DataError {
                day,
                stage,
                agent,
                message,
            } => {
                write!(f, "Data consistency error in stage {stage}")?;
                if let Some(day) = day {
                    write!(f, " on day {day}")?;
                }
                if let Some(agent) = agent {
                    write!(f, " for agent {agent}")?;
                }
                write!(f, ": {message}")
            }
            _ => write!(f, "Error: {self:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_error_names_day_stage_and_agent() {
        let error = AbmError::data(
            Some(12),
            Stage::Testing,
            Some(AgentId::new(4)),
            "pending test on a deceased agent",
        );
        assert_eq!(
            error.to_string(),
            "Data consistency error in stage testing on day 12 for agent 5: pending test on a deceased agent"
        );
    }

    #[test]
    fn converts_from_str() {
        let error: AbmError = "boom".into();
        assert!(matches!(error, AbmError::AbmError(ref m) if m == "boom"));
    }
}
