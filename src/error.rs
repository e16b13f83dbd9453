//! Error types for the Nodal circuit simulation engine.
//!
//! This module provides a unified error type [`CircuitError`] that covers
//! all error conditions that can occur while flattening a topology,
//! validating component properties, and solving the circuit.

use thiserror::Error;

/// Result type alias using [`CircuitError`].
pub type Result<T> = std::result::Result<T, CircuitError>;

/// Coarse classification of a [`CircuitError`].
///
/// Topology errors are reported before (or in lieu of) iterating and are
/// never retried; convergence errors may be retried by the caller with a
/// smaller step or relaxed tolerances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Topology,
    Convergence,
    Parameter,
    Cancelled,
    Io,
}

/// Unified error type for all Nodal operations.
#[derive(Error, Debug)]
pub enum CircuitError {
    // ============ Topology Errors ============
    /// No ground component in the topology
    #[error("Circuit has no ground reference (add a 'ground' component)")]
    MissingGround,

    /// Two ground components assert different reference potentials
    #[error("Ambiguous ground: '{first}' and '{second}' declare different references")]
    AmbiguousGround { first: String, second: String },

    /// Terminal with no connection (strict mode only)
    #[error("Terminal '{terminal}' is not connected to anything")]
    DanglingTerminal { terminal: String },

    /// Floating node (not connected to ground path)
    #[error("Floating node '{node}' detected - no path to ground")]
    FloatingNode { node: String },

    /// Connection references a component that does not exist
    #[error("Connection references unknown component '{component}'")]
    UnknownComponent { component: String },

    /// Connection references a terminal the component does not have
    #[error("Component '{component}' has no terminal '{terminal}'")]
    UnknownTerminal { component: String, terminal: String },

    /// Duplicate component identifier
    #[error("Duplicate component id '{name}'")]
    DuplicateComponent { name: String },

    /// Malformed terminal reference
    #[error("Invalid terminal reference '{text}' (expected '<component>.<terminal>')")]
    InvalidTerminalRef { text: String },

    /// Invalid circuit topology
    #[error("Invalid circuit topology: {message}")]
    InvalidTopology { message: String },

    /// Matrix is singular and cannot be solved
    #[error("Singular matrix at row {row} - circuit may have a floating node or an under-constrained loop")]
    SingularMatrix { row: usize },

    // ============ Convergence Errors ============
    /// Newton-Raphson iteration did not converge
    #[error("Newton-Raphson did not converge after {iterations} iterations (residual: {residual:.2e}){}", time_suffix(*.time_index))]
    ConvergenceFailure {
        iterations: usize,
        residual: f64,
        time_index: Option<usize>,
    },

    // ============ Parameter Errors ============
    /// Invalid parameter value
    #[error("Invalid parameter '{param}' for component '{component}': {message}")]
    InvalidParameter {
        component: String,
        param: String,
        message: String,
    },

    /// Property not understood by the component kind
    #[error("Unknown parameter '{param}' for component '{component}'")]
    UnknownParameter { component: String, param: String },

    /// Invalid simulation parameter
    #[error("Invalid simulation parameter: {message}")]
    InvalidSimulationParam { message: String },

    // ============ Run Control ============
    /// Run cancelled by the host before the step at `time_index` committed
    #[error("Simulation cancelled at time index {time_index}")]
    Cancelled { time_index: usize },

    // ============ I/O Errors ============
    /// Error reading a topology file
    #[error("Failed to read topology file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Malformed topology or state JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error writing results
    #[error("Output error: {message}")]
    OutputError { message: String },
}

fn time_suffix(time_index: Option<usize>) -> String {
    match time_index {
        Some(k) => format!(" at time index {k}"),
        None => " at the DC operating point".to_string(),
    }
}

impl CircuitError {
    /// Create an invalid parameter error
    pub fn invalid_parameter(
        component: impl Into<String>,
        param: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            component: component.into(),
            param: param.into(),
            message: message.into(),
        }
    }

    /// Create an invalid simulation parameter error
    pub fn invalid_simulation(message: impl Into<String>) -> Self {
        Self::InvalidSimulationParam {
            message: message.into(),
        }
    }

    /// Create a convergence failure error
    pub fn convergence_failure(iterations: usize, residual: f64, time_index: Option<usize>) -> Self {
        Self::ConvergenceFailure {
            iterations,
            residual,
            time_index,
        }
    }

    /// Attach a time index to a convergence or cancellation error raised by
    /// the Newton-Raphson engine, which does not know where it is in a run.
    pub fn at_time_index(self, index: usize) -> Self {
        match self {
            Self::ConvergenceFailure {
                iterations,
                residual,
                ..
            } => Self::ConvergenceFailure {
                iterations,
                residual,
                time_index: Some(index),
            },
            Self::Cancelled { .. } => Self::Cancelled { time_index: index },
            other => other,
        }
    }

    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingGround
            | Self::AmbiguousGround { .. }
            | Self::DanglingTerminal { .. }
            | Self::FloatingNode { .. }
            | Self::UnknownComponent { .. }
            | Self::UnknownTerminal { .. }
            | Self::DuplicateComponent { .. }
            | Self::InvalidTerminalRef { .. }
            | Self::InvalidTopology { .. }
            | Self::SingularMatrix { .. } => ErrorCategory::Topology,
            Self::ConvergenceFailure { .. } => ErrorCategory::Convergence,
            Self::InvalidParameter { .. }
            | Self::UnknownParameter { .. }
            | Self::InvalidSimulationParam { .. } => ErrorCategory::Parameter,
            Self::Cancelled { .. } => ErrorCategory::Cancelled,
            Self::FileReadError { .. } | Self::Json(_) | Self::OutputError { .. } => ErrorCategory::Io,
        }
    }
}
