//! Main simulator interface.
//!
//! [`Simulator`] owns a built [`Circuit`] and answers DC operating point
//! and small-signal requests. [`Transient`] drives it through fixed time
//! steps, committing each converged step into component state and
//! appending it to a [`TimeSeries`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::circuit::{Circuit, PropertyMap, Topology};
use crate::components::{Analysis, Component, StampContext};
use crate::error::{CircuitError, Result};

use super::ac::{solve_ac, AcSolution};
use super::newton::{NewtonConfig, NewtonRaphson, NewtonReport};
use super::output::{Sample, TimeSeries};
use super::DEFAULT_BATCH_SIZE;

/// Fraction of `dt` used for the t = 0 solve when starting from persisted
/// state: a vanishing step pins capacitor voltages and inductor currents.
const INITIAL_STEP_FRACTION: f64 = 1e-6;

/// Configuration for the simulator.
#[derive(Debug, Clone, Default)]
pub struct SimulatorConfig {
    /// Newton-Raphson budget and tolerances.
    pub newton: NewtonConfig,
    /// Reject unconnected terminals instead of giving them their own node.
    pub strict: bool,
}

impl SimulatorConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum Newton-Raphson iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.newton.max_iterations = max_iterations;
        self
    }

    /// Set the absolute convergence tolerance (in volts).
    pub fn with_abs_tol(mut self, abs_tol: f64) -> Self {
        self.newton.abs_tol = abs_tol;
        self
    }

    /// Set the relative convergence tolerance.
    pub fn with_rel_tol(mut self, rel_tol: f64) -> Self {
        self.newton.rel_tol = rel_tol;
        self
    }

    /// Enable strict node mapping.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// Shared cancellation flag, checked between time steps and between
/// Newton iterations.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe to call from another thread.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear a previous request so a run can resume.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The main circuit simulator.
#[derive(Debug, Clone)]
pub struct Simulator {
    /// The circuit being simulated
    circuit: Circuit,
    /// Newton-Raphson solver
    newton: NewtonRaphson,
    cancel: CancelFlag,
    /// Last converged solution vector
    x: Vec<f64>,
}

impl Simulator {
    /// Create a new simulator for the given circuit with default configuration.
    pub fn new(circuit: Circuit) -> Self {
        Self::with_config(circuit, NewtonConfig::default())
    }

    /// Create a new simulator for the given circuit with custom Newton settings.
    pub fn with_config(circuit: Circuit, config: NewtonConfig) -> Self {
        let size = circuit.matrix_size();
        Self {
            circuit,
            newton: NewtonRaphson::new(config, size),
            cancel: CancelFlag::new(),
            x: vec![0.0; size],
        }
    }

    /// Build and validate a topology, then wrap it in a simulator.
    pub fn from_topology(topology: &Topology, config: SimulatorConfig) -> Result<Self> {
        config.newton.validate()?;
        let circuit = Circuit::from_topology(topology, config.strict)?;
        log::info!(
            "simulator ready: {} components, {} nodes, {} branches{}",
            circuit.components.len(),
            circuit.num_nodes,
            circuit.num_branches,
            if circuit.has_nonlinear() { ", nonlinear" } else { "" }
        );
        Ok(Self::with_config(circuit, config.newton))
    }

    /// Get a reference to the circuit.
    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    /// Handle for cancelling runs on this simulator.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Last converged solution vector.
    pub fn solution(&self) -> &[f64] {
        &self.x
    }

    /// Newton-Raphson iterations used by the most recent solve.
    pub fn last_iterations(&self) -> usize {
        self.newton.iteration()
    }

    /// Get the current voltage at a node by name.
    pub fn node_voltage(&self, name: &str) -> Option<f64> {
        let node = self.circuit.find_node(name)?;
        Some(self.circuit.node_index(node).map(|i| self.x[i]).unwrap_or(0.0))
    }

    fn context(&self, analysis: Analysis) -> StampContext {
        StampContext::new(self.circuit.num_nodes, analysis)
    }

    /// Run one Newton-Raphson request without committing anything.
    fn solve_point(&mut self, ctx: &StampContext) -> Result<NewtonReport> {
        let report = self.newton.solve(&self.circuit, ctx, &self.cancel)?;
        self.x.copy_from_slice(&self.newton.operating_point().x);
        Ok(report)
    }

    /// Store converged diode voltages so the next solve starts from them.
    fn commit_linearization(&mut self) {
        let op = self.newton.operating_point();
        for (&idx, &vd) in self.newton.nonlinear_indices().iter().zip(&op.linearization) {
            if let Component::Diode(d) = &mut self.circuit.components[idx] {
                d.update_state(vd);
            }
        }
    }

    /// Store reactive state from the last solution.
    fn commit_reactive(&mut self, ctx: &StampContext) {
        for component in &mut self.circuit.components {
            component.commit(ctx, &self.x);
        }
    }

    /// Collect every output of the last solution.
    fn sample(&self, ctx: &StampContext) -> Sample {
        let mut sample = Sample::new(ctx.time());
        for (idx, name) in self.circuit.node_map.names().iter().enumerate().skip(1) {
            sample.values.insert(name.clone(), self.x[idx - 1]);
        }
        for component in &self.circuit.components {
            component.record_outputs(ctx, &self.x, &mut sample.values);
        }
        sample
    }

    /// Solve the DC operating point.
    ///
    /// Capacitors are open and inductors shorted. Converged diode voltages
    /// are kept as the seed for later solves; reactive state is untouched.
    pub fn dc_operating_point(&mut self) -> Result<Sample> {
        let ctx = self.context(Analysis::Dc);
        let report = self.solve_point(&ctx)?;
        self.commit_linearization();
        log::debug!("DC operating point converged in {} iteration(s)", report.iterations);
        Ok(self.sample(&ctx))
    }

    /// Solve the DC operating point and adopt it as the initial state of
    /// every reactive component.
    pub fn initialize_from_operating_point(&mut self) -> Result<Sample> {
        let sample = self.dc_operating_point()?;
        let ctx = self.context(Analysis::Dc);
        self.commit_reactive(&ctx);
        Ok(sample)
    }

    /// Report the persisted initial state at t = 0 without changing it.
    fn initial_conditions(&mut self, dt: f64) -> Result<Sample> {
        let ctx = self.context(Analysis::Transient {
            dt: dt * INITIAL_STEP_FRACTION,
            time: 0.0,
        });
        self.solve_point(&ctx)?;
        self.commit_linearization();
        let mut sample = self.sample(&ctx);
        sample.time = 0.0;
        Ok(sample)
    }

    /// Advance one Backward-Euler step ending at `time`.
    ///
    /// Companion models use the state committed at the previous step; the
    /// new state is committed only after the step converges. Device currents
    /// are sampled before that commit, while the companions still describe
    /// this step. Errors carry `time_index`.
    pub fn transient_step(&mut self, time_index: usize, dt: f64, time: f64) -> Result<Sample> {
        let ctx = self.context(Analysis::Transient { dt, time });
        let report = self
            .solve_point(&ctx)
            .map_err(|e| e.at_time_index(time_index))?;

        self.commit_linearization();
        let sample = self.sample(&ctx);
        self.commit_reactive(&ctx);

        log::debug!(
            "step {time_index} (t = {time:.6e}) converged in {} iteration(s)",
            report.iterations
        );
        Ok(sample)
    }

    /// Persistent state of every stateful component, keyed by component id.
    pub fn component_states(&self) -> BTreeMap<String, PropertyMap> {
        self.circuit
            .components
            .iter()
            .map(|c| (c.name().to_string(), c.state()))
            .filter(|(_, state)| !state.is_empty())
            .collect()
    }

    /// Small-signal solve at `frequency` Hz around the stored operating point.
    pub fn ac_solve(&self, frequency: f64) -> Result<AcSolution> {
        solve_ac(&self.circuit, frequency)
    }
}

/// Transient run settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TransientParams {
    /// Fixed time step (seconds)
    pub dt: f64,
    /// End time (seconds)
    pub t_stop: f64,
    /// Start from the DC operating point instead of the persisted state
    pub use_operating_point: bool,
    /// Steps per batch for [`Transient::run_to_end`]
    pub batch_size: usize,
}

impl TransientParams {
    pub fn new(dt: f64, t_stop: f64) -> Self {
        Self {
            dt,
            t_stop,
            use_operating_point: false,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_operating_point(mut self, use_operating_point: bool) -> Self {
        self.use_operating_point = use_operating_point;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(CircuitError::invalid_simulation(format!(
                "dt must be finite and > 0 (got {})",
                self.dt
            )));
        }
        if !(self.t_stop.is_finite() && self.t_stop >= 0.0) {
            return Err(CircuitError::invalid_simulation(format!(
                "t_stop must be finite and >= 0 (got {})",
                self.t_stop
            )));
        }
        if self.batch_size == 0 {
            return Err(CircuitError::invalid_simulation("batch_size must be at least 1"));
        }
        Ok(())
    }

    /// Number of steps after t = 0.
    pub fn num_steps(&self) -> usize {
        // Tolerate rounding in t_stop / dt
        (self.t_stop / self.dt - 1e-9).ceil().max(0.0) as usize
    }

    /// Step size and end time of step `k` (1-based).
    ///
    /// Steps are `dt` long except the last, which is shortened to end exactly
    /// at `t_stop` when `t_stop` is not a whole number of steps.
    pub fn step(&self, k: usize) -> (f64, f64) {
        let end = k as f64 * self.dt;
        if k == self.num_steps() && end > self.t_stop + self.dt * 1e-9 {
            (self.t_stop - (k - 1) as f64 * self.dt, self.t_stop)
        } else {
            (self.dt, end)
        }
    }
}

/// Outcome of [`Transient::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// More steps remain; `time_index` is the last committed step
    Running { time_index: usize },
    Finished,
}

/// A transient run in progress.
///
/// Steps are taken in batches through [`advance`](Self::advance) so a host
/// event loop can regain control between batches.
#[derive(Debug, Clone)]
pub struct Transient {
    simulator: Simulator,
    params: TransientParams,
    series: TimeSeries,
    /// Last committed step (0 is the initial condition)
    time_index: usize,
    num_steps: usize,
    started: bool,
}

impl Transient {
    pub fn new(simulator: Simulator, params: TransientParams) -> Result<Self> {
        params.validate()?;
        let num_steps = params.num_steps();
        Ok(Self {
            simulator,
            params,
            series: TimeSeries::new(),
            time_index: 0,
            num_steps,
            started: false,
        })
    }

    fn start(&mut self) -> Result<()> {
        log::info!(
            "transient run: dt = {:e} s, t_stop = {:e} s, {} steps",
            self.params.dt,
            self.params.t_stop,
            self.num_steps
        );
        let initial = if self.params.use_operating_point {
            self.simulator.initialize_from_operating_point()
        } else {
            self.simulator.initial_conditions(self.params.dt)
        }
        .map_err(|e| e.at_time_index(0))?;
        self.series.push(initial);
        self.started = true;
        Ok(())
    }

    /// Take up to `max_steps` steps.
    ///
    /// The cancel flag is checked before every step; a cancelled run keeps
    /// everything committed so far and can resume after the flag is reset.
    pub fn advance(&mut self, max_steps: usize) -> Result<Progress> {
        if !self.started {
            self.start()?;
        }

        let cancel = self.simulator.cancel_flag();
        for _ in 0..max_steps {
            if self.time_index >= self.num_steps {
                break;
            }
            let next = self.time_index + 1;
            if cancel.is_cancelled() {
                log::warn!("transient run cancelled before step {next}");
                return Err(CircuitError::Cancelled { time_index: next });
            }

            let (dt, time) = self.params.step(next);
            let sample = self.simulator.transient_step(next, dt, time)?;
            self.series.push(sample);
            self.time_index = next;
        }

        if self.is_finished() {
            log::info!("transient run finished: {} samples", self.series.len());
            Ok(Progress::Finished)
        } else {
            Ok(Progress::Running {
                time_index: self.time_index,
            })
        }
    }

    /// Run every remaining step, batch by batch.
    pub fn run_to_end(&mut self) -> Result<&TimeSeries> {
        while self.advance(self.params.batch_size)? != Progress::Finished {}
        Ok(&self.series)
    }

    pub fn is_finished(&self) -> bool {
        self.started && self.time_index >= self.num_steps
    }

    /// Last committed step index.
    pub fn time_index(&self) -> usize {
        self.time_index
    }

    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    pub fn params(&self) -> &TransientParams {
        &self.params
    }

    pub fn series(&self) -> &TimeSeries {
        &self.series
    }

    pub fn into_series(self) -> TimeSeries {
        self.series
    }

    pub fn simulator(&self) -> &Simulator {
        &self.simulator
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.simulator.cancel_flag()
    }
}
