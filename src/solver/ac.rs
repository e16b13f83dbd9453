//! Single-frequency small-signal solve.
//!
//! Components contribute complex admittance stamps `Y(jω)`; the system is
//! solved once by Gaussian elimination with partial pivoting. Nonlinear
//! devices are linearized at their stored operating point.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use num_complex::Complex64;
use serde::Serialize;

use super::mna::PIVOT_THRESHOLD;
use crate::circuit::Circuit;
use crate::components::{AcStamp, Analysis, StampContext};
use crate::error::{CircuitError, Result};

/// Dense complex system `Y·x = z`.
#[derive(Debug, Clone)]
pub struct ComplexMatrix {
    /// Row-major admittance matrix
    pub y: Vec<Complex64>,
    pub z: Vec<Complex64>,
    pub size: usize,
}

impl ComplexMatrix {
    pub fn new(size: usize) -> Self {
        Self {
            y: vec![Complex64::new(0.0, 0.0); size * size],
            z: vec![Complex64::new(0.0, 0.0); size],
            size,
        }
    }

    /// Sum an AC stamp into the system.
    pub fn apply(&mut self, stamp: &AcStamp) {
        for &(row, col, value) in &stamp.g {
            self.y[row * self.size + col] += value;
        }
        for &(row, value) in &stamp.z {
            self.z[row] += value;
        }
    }

    /// Solve by elimination, consuming the system.
    pub fn solve(mut self) -> Result<Vec<Complex64>> {
        let n = self.size;

        for k in 0..n {
            let (pivot_row, max_val) = (k..n)
                .map(|i| (i, self.y[i * n + k].norm()))
                .fold((k, -1.0), |best, cur| if cur.1 > best.1 { cur } else { best });

            if max_val.is_nan() || max_val < PIVOT_THRESHOLD {
                return Err(CircuitError::SingularMatrix { row: k });
            }

            if pivot_row != k {
                for j in 0..n {
                    self.y.swap(k * n + j, pivot_row * n + j);
                }
                self.z.swap(k, pivot_row);
            }

            let pivot = self.y[k * n + k];
            for i in (k + 1)..n {
                let factor = self.y[i * n + k] / pivot;
                if factor == Complex64::new(0.0, 0.0) {
                    continue;
                }
                for j in k..n {
                    let v = self.y[k * n + j];
                    self.y[i * n + j] -= factor * v;
                }
                let zk = self.z[k];
                self.z[i] -= factor * zk;
            }
        }

        let mut x = vec![Complex64::new(0.0, 0.0); n];
        for i in (0..n).rev() {
            let mut sum = self.z[i];
            for j in (i + 1)..n {
                sum -= self.y[i * n + j] * x[j];
            }
            x[i] = sum / self.y[i * n + i];
        }
        Ok(x)
    }
}

/// Phasor reading of one node or branch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Phasor {
    pub magnitude: f64,
    /// Phase in degrees
    pub phase: f64,
}

impl From<Complex64> for Phasor {
    fn from(c: Complex64) -> Self {
        Self {
            magnitude: c.norm(),
            phase: c.arg().to_degrees(),
        }
    }
}

/// Result of a single-frequency solve.
#[derive(Debug, Clone)]
pub struct AcSolution {
    /// Frequency in Hz
    pub frequency: f64,
    /// Raw solution vector (node voltages then branch currents)
    pub x: Vec<Complex64>,
    /// Node voltages keyed by node name, branch currents keyed `<id>_I`
    pub values: BTreeMap<String, Complex64>,
}

impl AcSolution {
    /// Phasor view of every output.
    pub fn phasors(&self) -> BTreeMap<String, Phasor> {
        self.values.iter().map(|(k, v)| (k.clone(), Phasor::from(*v))).collect()
    }
}

/// Assemble and solve the small-signal system at `frequency` Hz.
pub fn solve_ac(circuit: &Circuit, frequency: f64) -> Result<AcSolution> {
    if !frequency.is_finite() || frequency < 0.0 {
        return Err(CircuitError::invalid_simulation(format!(
            "AC frequency must be finite and >= 0 (got {frequency})"
        )));
    }

    let omega = 2.0 * PI * frequency;
    let ctx = StampContext::new(circuit.num_nodes, Analysis::Dc);
    let mut matrix = ComplexMatrix::new(circuit.matrix_size());
    let mut stamp = AcStamp::new();
    for component in &circuit.components {
        stamp.clear();
        component.ac_stamp(&ctx, omega, &mut stamp);
        matrix.apply(&stamp);
    }

    let x = matrix.solve()?;

    let mut values = BTreeMap::new();
    for (idx, name) in circuit.node_map.names().iter().enumerate().skip(1) {
        values.insert(name.clone(), x[idx - 1]);
    }
    for component in &circuit.components {
        if let Some(branch) = component.branch() {
            values.insert(format!("{}_I", component.name()), x[ctx.branch(branch)]);
        }
    }

    log::debug!("AC solve at {frequency} Hz: {} unknowns", x.len());

    Ok(AcSolution { frequency, x, values })
}
