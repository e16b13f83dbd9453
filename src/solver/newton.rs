//! Newton-Raphson iteration for nonlinear components.
//!
//! One solve request (the DC operating point, or one transient step) runs
//! an explicit state machine:
//!
//! ```text
//! Init -> Assemble -> Solve -> Update -> CheckConverged -> { Assemble | Done }
//! ```
//!
//! Linear stamps are collected once in `Init` and reused for every
//! iteration; only the diodes are re-stamped in `Assemble`. A circuit with
//! no nonlinear devices goes straight from `Solve` to `Done`.

use crate::circuit::Circuit;
use crate::components::{Component, Diode, Stamp, StampContext};
use crate::error::{CircuitError, Result};

use super::mna::MnaMatrix;
use super::simulator::CancelFlag;
use super::{DEFAULT_ABS_TOL, DEFAULT_MAX_ITERATIONS, DEFAULT_REL_TOL};

/// Iteration budget and tolerances.
#[derive(Debug, Clone, PartialEq)]
pub struct NewtonConfig {
    /// Maximum Newton-Raphson iterations per solve.
    pub max_iterations: usize,
    /// Absolute voltage tolerance (volts).
    pub abs_tol: f64,
    /// Relative voltage tolerance.
    pub rel_tol: f64,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            abs_tol: DEFAULT_ABS_TOL,
            rel_tol: DEFAULT_REL_TOL,
        }
    }
}

impl NewtonConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum Newton-Raphson iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the absolute tolerance (in volts).
    pub fn with_abs_tol(mut self, abs_tol: f64) -> Self {
        self.abs_tol = abs_tol;
        self
    }

    /// Set the relative tolerance.
    pub fn with_rel_tol(mut self, rel_tol: f64) -> Self {
        self.rel_tol = rel_tol;
        self
    }

    /// Reject budgets and tolerances that can never converge.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(CircuitError::invalid_simulation("max_iterations must be at least 1"));
        }
        if !(self.abs_tol > 0.0 && self.abs_tol.is_finite()) {
            return Err(CircuitError::invalid_simulation(format!(
                "abs_tol must be finite and > 0 (got {})",
                self.abs_tol
            )));
        }
        if !(self.rel_tol > 0.0 && self.rel_tol.is_finite()) {
            return Err(CircuitError::invalid_simulation(format!(
                "rel_tol must be finite and > 0 (got {})",
                self.rel_tol
            )));
        }
        Ok(())
    }

    /// Convergence test for one device.
    ///
    /// Both tolerances must hold; the relative one is waived when both
    /// voltages are themselves below `abs_tol`.
    pub fn converged(&self, v_new: f64, v_old: f64) -> bool {
        let diff = (v_new - v_old).abs();
        let scale = v_new.abs().max(v_old.abs());
        diff < self.abs_tol && (scale < self.abs_tol || diff < self.rel_tol * scale)
    }
}

/// States of one solve request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewtonState {
    /// Seed linearization voltages and collect the fixed linear stamps
    Init,
    /// Build the system from the linear part plus linearized diodes
    Assemble,
    /// Factor and solve
    Solve,
    /// Extract and limit new diode voltages
    Update,
    /// Compare against the previous iterate
    CheckConverged,
    Done,
}

/// The current iterate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperatingPoint {
    /// Node voltages then branch currents
    pub x: Vec<f64>,
    /// Linearization voltage of each nonlinear device, in component order
    pub linearization: Vec<f64>,
}

/// Diagnostics for a converged solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewtonReport {
    pub iterations: usize,
    /// Largest linearization change in the final iteration
    pub max_delta: f64,
}

/// Newton-Raphson solver for nonlinear circuits.
#[derive(Debug, Clone)]
pub struct NewtonRaphson {
    config: NewtonConfig,
    state: NewtonState,
    matrix: MnaMatrix,
    /// Linear part of the system, restored before every assembly
    base_a: Vec<f64>,
    base_z: Vec<f64>,
    stamp: Stamp,
    /// Component indices of nonlinear devices
    nonlinear: Vec<usize>,
    op: OperatingPoint,
    /// Limited voltages produced by `Update`
    pending: Vec<f64>,
    iteration: usize,
    max_delta: f64,
}

fn diode_at(circuit: &Circuit, index: usize) -> Option<&Diode> {
    match &circuit.components[index] {
        Component::Diode(d) => Some(d),
        _ => None,
    }
}

impl NewtonRaphson {
    /// Create a solver for systems of dimension `size`.
    pub fn new(config: NewtonConfig, size: usize) -> Self {
        Self {
            config,
            state: NewtonState::Init,
            matrix: MnaMatrix::new(size),
            base_a: vec![0.0; size * size],
            base_z: vec![0.0; size],
            stamp: Stamp::new(),
            nonlinear: Vec::new(),
            op: OperatingPoint {
                x: vec![0.0; size],
                linearization: Vec::new(),
            },
            pending: Vec::new(),
            iteration: 0,
            max_delta: 0.0,
        }
    }

    pub fn config(&self) -> &NewtonConfig {
        &self.config
    }

    pub fn state(&self) -> NewtonState {
        self.state
    }

    /// Iterations (assemblies) performed by the current request.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn operating_point(&self) -> &OperatingPoint {
        &self.op
    }

    /// Component indices matching [`OperatingPoint::linearization`].
    pub fn nonlinear_indices(&self) -> &[usize] {
        &self.nonlinear
    }

    /// Start a new solve request.
    pub fn reset(&mut self) {
        self.state = NewtonState::Init;
        self.iteration = 0;
        self.max_delta = 0.0;
    }

    /// Run one state's action and move to the next state.
    pub fn step(&mut self, circuit: &Circuit, ctx: &StampContext) -> Result<NewtonState> {
        self.state = match self.state {
            NewtonState::Init => {
                self.init(circuit, ctx);
                NewtonState::Assemble
            }
            NewtonState::Assemble => {
                self.assemble(circuit, ctx);
                NewtonState::Solve
            }
            NewtonState::Solve => {
                let x = self.matrix.factor_and_solve()?;
                self.op.x.copy_from_slice(x);
                if self.nonlinear.is_empty() {
                    NewtonState::Done
                } else {
                    NewtonState::Update
                }
            }
            NewtonState::Update => {
                self.update(circuit, ctx);
                NewtonState::CheckConverged
            }
            NewtonState::CheckConverged => self.check_converged()?,
            NewtonState::Done => NewtonState::Done,
        };
        Ok(self.state)
    }

    /// Drive the state machine to `Done`.
    ///
    /// `cancel` is polled before every assembly; a cancelled request returns
    /// [`CircuitError::Cancelled`] and leaves component state untouched.
    pub fn solve(&mut self, circuit: &Circuit, ctx: &StampContext, cancel: &CancelFlag) -> Result<NewtonReport> {
        self.reset();
        loop {
            if self.state == NewtonState::Assemble && cancel.is_cancelled() {
                return Err(CircuitError::Cancelled { time_index: 0 });
            }
            if self.step(circuit, ctx)? == NewtonState::Done {
                return Ok(NewtonReport {
                    iterations: self.iteration,
                    max_delta: self.max_delta,
                });
            }
        }
    }

    fn init(&mut self, circuit: &Circuit, ctx: &StampContext) {
        self.nonlinear = circuit
            .components
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_nonlinear())
            .map(|(i, _)| i)
            .collect();

        self.op.linearization = self
            .nonlinear
            .iter()
            .filter_map(|&i| diode_at(circuit, i))
            .map(|d| d.vd)
            .collect();
        self.pending = self.op.linearization.clone();

        self.matrix.clear();
        for component in &circuit.components {
            self.stamp.clear();
            component.stamp(ctx, &mut self.stamp);
            self.matrix.apply(&self.stamp);
        }
        self.base_a.copy_from_slice(&self.matrix.a);
        self.base_z.copy_from_slice(&self.matrix.z);
    }

    fn assemble(&mut self, circuit: &Circuit, ctx: &StampContext) {
        self.matrix.a.copy_from_slice(&self.base_a);
        self.matrix.z.copy_from_slice(&self.base_z);

        for (k, &i) in self.nonlinear.iter().enumerate() {
            if let Some(d) = diode_at(circuit, i) {
                self.stamp.clear();
                d.stamp_linearized(self.op.linearization[k], ctx, &mut self.stamp);
                self.matrix.apply(&self.stamp);
            }
        }
        self.iteration += 1;
    }

    fn update(&mut self, circuit: &Circuit, ctx: &StampContext) {
        for (k, &i) in self.nonlinear.iter().enumerate() {
            if let Some(d) = diode_at(circuit, i) {
                let v_new = d.voltage(ctx, &self.op.x);
                self.pending[k] = d.limit_voltage(v_new, self.op.linearization[k]);
            }
        }
    }

    fn check_converged(&mut self) -> Result<NewtonState> {
        let mut converged = true;
        self.max_delta = 0.0;
        for (v_new, v_old) in self.pending.iter().zip(&self.op.linearization) {
            self.max_delta = self.max_delta.max((v_new - v_old).abs());
            converged &= self.config.converged(*v_new, *v_old);
        }
        self.op.linearization.copy_from_slice(&self.pending);

        log::trace!(
            "newton iteration {}: max delta {:.3e}",
            self.iteration,
            self.max_delta
        );

        if converged {
            Ok(NewtonState::Done)
        } else if self.iteration >= self.config.max_iterations {
            Err(CircuitError::convergence_failure(self.iteration, self.max_delta, None))
        } else {
            Ok(NewtonState::Assemble)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{ComponentKind, ComponentSpec, Topology};
    use crate::components::Analysis;
    use approx::assert_abs_diff_eq;

    fn diode_circuit(source: f64) -> Circuit {
        let mut t = Topology::new();
        t.add(ComponentSpec::new("V1", ComponentKind::VoltageSource).with("dc", source))
            .add(ComponentSpec::new("R1", ComponentKind::Resistor).with("resistance", 1e3))
            .add(ComponentSpec::new("D1", ComponentKind::Diode))
            .add(ComponentSpec::new("GND", ComponentKind::Ground));
        t.connect("V1.pos", "R1.a").unwrap();
        t.connect("R1.b", "D1.anode").unwrap();
        t.connect("D1.cathode", "GND.gnd").unwrap();
        t.connect("V1.neg", "GND.gnd").unwrap();
        Circuit::from_topology(&t, true).unwrap()
    }

    fn dc(circuit: &Circuit) -> StampContext {
        StampContext::new(circuit.num_nodes, Analysis::Dc)
    }

    #[test]
    fn test_convergence_rule() {
        let cfg = NewtonConfig::default();
        assert!(cfg.converged(0.65, 0.65 + 1e-7));
        assert!(!cfg.converged(0.65, 0.65 + 1e-5));
        // Relative tolerance binds for tiny voltages above abs_tol
        assert!(!cfg.converged(2e-6, 2.5e-6));
        // Both below abs_tol
        assert!(cfg.converged(0.0, 1e-7));
    }

    #[test]
    fn test_state_sequence() {
        let circuit = diode_circuit(5.0);
        let ctx = dc(&circuit);
        let mut nr = NewtonRaphson::new(NewtonConfig::default(), circuit.matrix_size());

        assert_eq!(nr.state(), NewtonState::Init);
        assert_eq!(nr.step(&circuit, &ctx).unwrap(), NewtonState::Assemble);
        assert_eq!(nr.step(&circuit, &ctx).unwrap(), NewtonState::Solve);
        assert_eq!(nr.step(&circuit, &ctx).unwrap(), NewtonState::Update);
        assert_eq!(nr.step(&circuit, &ctx).unwrap(), NewtonState::CheckConverged);
        // From a zero seed the first update is far from converged
        assert_eq!(nr.step(&circuit, &ctx).unwrap(), NewtonState::Assemble);
        assert_eq!(nr.iteration(), 1);
    }

    #[test]
    fn test_forward_biased_diode_converges() {
        let circuit = diode_circuit(5.0);
        let ctx = dc(&circuit);
        let mut nr = NewtonRaphson::new(NewtonConfig::default(), circuit.matrix_size());
        let report = nr.solve(&circuit, &ctx, &CancelFlag::new()).unwrap();
        assert!(report.iterations > 1 && report.iterations < 50);

        let vd = nr.operating_point().linearization[0];
        assert!(vd > 0.55 && vd < 0.8, "vd = {vd}");

        // KCL at the anode: resistor current equals diode current
        let x = &nr.operating_point().x;
        let i_r = (x[0] - x[1]) / 1e3;
        let d = diode_at(&circuit, nr.nonlinear_indices()[0]).unwrap();
        assert_abs_diff_eq!(i_r, d.compute_model(x[1]).id, epsilon = 1e-6);
    }

    #[test]
    fn test_iteration_budget_exhausted() {
        let circuit = diode_circuit(5.0);
        let ctx = dc(&circuit);
        let mut nr = NewtonRaphson::new(NewtonConfig::default().with_max_iterations(2), circuit.matrix_size());
        let err = nr.solve(&circuit, &ctx, &CancelFlag::new()).unwrap_err();
        assert!(matches!(err, CircuitError::ConvergenceFailure { iterations: 2, time_index: None, .. }));
    }

    #[test]
    fn test_linear_circuit_single_pass() {
        let mut t = Topology::new();
        t.add(ComponentSpec::new("I1", ComponentKind::CurrentSource).with("dc", 1e-3))
            .add(ComponentSpec::new("R1", ComponentKind::Resistor).with("resistance", 2e3))
            .add(ComponentSpec::new("GND", ComponentKind::Ground));
        t.connect("I1.neg", "R1.a").unwrap();
        t.connect("I1.pos", "GND.gnd").unwrap();
        t.connect("R1.b", "GND.gnd").unwrap();
        let circuit = Circuit::from_topology(&t, true).unwrap();

        let mut nr = NewtonRaphson::new(NewtonConfig::default(), circuit.matrix_size());
        let report = nr.solve(&circuit, &dc(&circuit), &CancelFlag::new()).unwrap();
        assert_eq!(report.iterations, 1);
        assert_abs_diff_eq!(nr.operating_point().x[0], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_cancelled_before_first_assembly() {
        let circuit = diode_circuit(5.0);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let mut nr = NewtonRaphson::new(NewtonConfig::default(), circuit.matrix_size());
        let err = nr.solve(&circuit, &dc(&circuit), &cancel).unwrap_err();
        assert!(matches!(err, CircuitError::Cancelled { .. }));
        assert_eq!(nr.iteration(), 0);
    }
}
