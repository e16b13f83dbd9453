//! MNA (Modified Nodal Analysis) solver.
//!
//! This module provides the numerical engine for circuit simulation.
//!
//! ## Modified Nodal Analysis
//!
//! MNA assembles a system of equations Ax = z where:
//! - x contains node voltages and branch currents
//! - A is the conductance/coefficient matrix
//! - z is the source vector
//!
//! The matrix structure is:
//! ```text
//! [ G   B ] [ v ]   [ i ]
//! [ C   D ] [ j ] = [ e ]
//! ```
//!
//! where:
//! - G is the conductance matrix (node equations)
//! - B, C connect voltage sources, inductors and meters to nodes
//! - D carries the inductor companion terms during transient analysis
//! - v is the vector of node voltages
//! - j is the vector of branch currents
//! - i is the sum of current sources into each node
//! - e is the vector of branch constraint values
//!
//! Nonlinear devices are handled by the [`NewtonRaphson`] state machine;
//! [`Transient`] steps reactive elements with Backward Euler.

mod ac;
mod mna;
mod newton;
mod output;
mod simulator;

pub use ac::{solve_ac, AcSolution, ComplexMatrix, Phasor};
pub use mna::{MnaMatrix, PIVOT_THRESHOLD};
pub use newton::{NewtonConfig, NewtonRaphson, NewtonReport, NewtonState, OperatingPoint};
pub use output::{Sample, TimeSeries};
pub use simulator::{CancelFlag, Progress, Simulator, SimulatorConfig, Transient, TransientParams};

/// Default absolute convergence tolerance (volts).
pub const DEFAULT_ABS_TOL: f64 = 1e-6;

/// Default relative convergence tolerance.
pub const DEFAULT_REL_TOL: f64 = 1e-3;

/// Default Newton-Raphson iteration budget per solve.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Default number of transient steps per batch.
pub const DEFAULT_BATCH_SIZE: usize = 256;
