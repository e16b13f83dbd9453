//! # Nodal Core
//!
//! A circuit simulation engine for schematic editors.
//!
//! This library provides:
//! - Flattening of an editor topology (components + wires) into numbered nodes
//! - Modified Nodal Analysis (MNA) based circuit simulation
//! - Linear components (R, C, L, series R-L loads), sources, meters,
//!   ideal transformers, op-amps and nonlinear diodes
//! - DC operating point, fixed-step transient and single-frequency AC solves
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`circuit`] - Topology input, node mapping and validation
//! - [`components`] - Component models and the stamp contract
//! - [`solver`] - MNA assembly, Newton-Raphson and transient stepping
//! - [`error`] - Unified error type
//!
//! ## Usage
//!
//! ### Native CLI
//!
//! ```bash
//! nodal rectifier.json tran --dt 1e-5 --t-stop 0.04 --format csv > out.csv
//! ```
//!
//! ### Library
//!
//! ```no_run
//! use nodal_core::{Simulator, SimulatorConfig, Topology, Transient, TransientParams};
//!
//! # fn main() -> nodal_core::Result<()> {
//! let topology = Topology::from_file("rectifier.json".as_ref())?;
//! let simulator = Simulator::from_topology(&topology, SimulatorConfig::new())?;
//! let mut run = Transient::new(simulator, TransientParams::new(1e-5, 0.04))?;
//! let series = run.run_to_end()?;
//! println!("{:?}", series.time_range());
//! # Ok(())
//! # }
//! ```
//!
//! ### WASM
//!
//! ```javascript
//! import { WasmTransient } from 'nodal_core';
//!
//! const run = new WasmTransient(topologyJson, 1e-5, 0.04);
//! while (!run.run_batch(200)) { await nextFrame(); }
//! const series = JSON.parse(run.series_json());
//! ```
//!
//! ## Circuit Simulation Method
//!
//! For each time step `t_k -> t_k + dt`:
//!
//! 1. Reactive elements (C, L, loads) are replaced by Backward-Euler
//!    companion models built from the state committed at `t_k`
//! 2. The system matrix A and source vector z are assembled from every
//!    component's stamp
//! 3. Nonlinear elements are re-linearized and the system re-solved by
//!    Newton-Raphson until convergence
//! 4. The converged solution is committed into component state and
//!    appended to the output series

pub mod circuit;
pub mod components;
pub mod error;
pub mod solver;

// Re-export main types for convenience
pub use circuit::{Circuit, ComponentKind, ComponentSpec, Topology};
pub use error::{CircuitError, ErrorCategory, Result};
pub use solver::{
    CancelFlag, NewtonConfig, Progress, Sample, Simulator, SimulatorConfig, TimeSeries, Transient,
    TransientParams,
};

// WASM bindings
#[cfg(feature = "wasm")]
mod wasm;

#[cfg(feature = "wasm")]
pub use wasm::WasmTransient;

/// Thermal voltage at room temperature (approximately 26mV)
pub const THERMAL_VOLTAGE: f64 = 0.02585;
