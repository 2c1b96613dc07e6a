//! Error types shared across the planner.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures while reading or interpreting input data files.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("cannot read \"{path}\": {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("line {line}: {message}")]
    Parse { line: u64, message: String },
    #[error("missing column `{0}`")]
    MissingColumn(String),
    #[error("timestamps must be strictly increasing (line {line})")]
    Unordered { line: u64 },
    #[error("duplicate cost entry for {technology} / {parameter}")]
    DuplicateCost {
        technology: String,
        parameter: String,
    },
    #[error("unknown technology `{0}`")]
    UnknownTechnology(String),
    #[error("{0}")]
    Invalid(String),
}

impl DataError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Structural problems in a network that would make the optimisation meaningless.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("network has no snapshots")]
    NoSnapshots,
    #[error("{component} `{name}` references unknown bus `{bus}`")]
    UnknownBus {
        component: &'static str,
        name: String,
        bus: String,
    },
    #[error("{component} `{name}` references unknown carrier `{carrier}`")]
    UnknownCarrier {
        component: &'static str,
        name: String,
        carrier: String,
    },
    #[error("duplicate {component} name `{name}`")]
    DuplicateName {
        component: &'static str,
        name: String,
    },
    #[error("{component} `{name}` has {actual} values, expected {expected}")]
    LengthMismatch {
        component: &'static str,
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("{component} `{name}`: {message}")]
    InvalidParameter {
        component: &'static str,
        name: String,
        message: String,
    },
}

/// Outcome of a solver run that did not produce an optimum.
#[derive(Debug, Error)]
pub enum SolveError {
    #[error("problem is infeasible")]
    Infeasible,
    #[error("problem is unbounded")]
    Unbounded,
    #[error("solver failed: {0}")]
    Solver(String),
}

impl From<good_lp::ResolutionError> for SolveError {
    fn from(err: good_lp::ResolutionError) -> Self {
        match err {
            good_lp::ResolutionError::Infeasible => Self::Infeasible,
            good_lp::ResolutionError::Unbounded => Self::Unbounded,
            other => Self::Solver(other.to_string()),
        }
    }
}

/// Umbrella error for a complete planning run.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Solve(#[from] SolveError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solver_outcomes_map_to_solve_errors() {
        use good_lp::ResolutionError;

        assert!(matches!(
            SolveError::from(ResolutionError::Infeasible),
            SolveError::Infeasible
        ));
        assert!(matches!(
            SolveError::from(ResolutionError::Unbounded),
            SolveError::Unbounded
        ));
        let other = SolveError::from(ResolutionError::Other("numerical trouble"));
        assert!(matches!(other, SolveError::Solver(ref m) if m.contains("numerical trouble")));
    }

    #[test]
    fn planner_error_is_transparent() {
        let err = PlannerError::from(SolveError::Unbounded);
        assert_eq!(err.to_string(), "problem is unbounded");
    }
}
