//! The stamp contract.
//!
//! Every component contributes `(row, col, value)` conductance entries and
//! `(row, value)` right-hand-side entries for the current operating point.
//! Stamps are transient: they are rebuilt on every assembly and summed into
//! the global system, never overwritten.
//!
//! Rows and columns are MNA indices: node `k` (k ≥ 1) maps to `k - 1`,
//! branch `b` maps to `(num_nodes - 1) + b`, and ground has no row.

use std::ops::Neg;

use num_complex::Complex64;

use crate::circuit::{BranchId, NodeId};

/// Which analysis a stamp is being produced for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Analysis {
    /// DC operating point: capacitors open, inductors shorted
    Dc,
    /// One Backward-Euler step ending at `time`
    Transient { dt: f64, time: f64 },
}

/// Everything a component needs to resolve its stamp.
#[derive(Debug, Clone, Copy)]
pub struct StampContext {
    /// Number of nodes including ground
    pub num_nodes: usize,
    pub analysis: Analysis,
}

impl StampContext {
    pub fn new(num_nodes: usize, analysis: Analysis) -> Self {
        Self {
            num_nodes,
            analysis,
        }
    }

    /// Matrix row of a node, `None` for ground.
    pub fn node(&self, node: NodeId) -> Option<usize> {
        if node.is_ground() {
            None
        } else {
            Some(node.0 - 1)
        }
    }

    /// Matrix row of a branch current.
    pub fn branch(&self, branch: BranchId) -> usize {
        (self.num_nodes - 1) + branch.0
    }

    /// Simulation time the stamp applies at (0 for DC).
    pub fn time(&self) -> f64 {
        match self.analysis {
            Analysis::Dc => 0.0,
            Analysis::Transient { time, .. } => time,
        }
    }

    /// Read a node voltage out of a solution vector.
    pub fn voltage(&self, x: &[f64], node: NodeId) -> f64 {
        self.node(node).map(|i| x[i]).unwrap_or(0.0)
    }

    /// Read a branch current out of a solution vector.
    pub fn current(&self, x: &[f64], branch: BranchId) -> f64 {
        x[self.branch(branch)]
    }
}

/// Scalar types a stamp can carry: real for DC/transient, complex for AC.
pub trait StampValue: Copy + Neg<Output = Self> + From<f64> {}

impl<T: Copy + Neg<Output = T> + From<f64>> StampValue for T {}

/// A component's contribution to `G·x = z`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stamp<T = f64> {
    /// Conductance entries `(row, col, value)`
    pub g: Vec<(usize, usize, T)>,
    /// Right-hand-side entries `(row, value)`
    pub z: Vec<(usize, T)>,
}

/// Complex admittance stamp for AC analysis.
pub type AcStamp = Stamp<Complex64>;

impl<T: StampValue> Stamp<T> {
    pub fn new() -> Self {
        Self {
            g: Vec::new(),
            z: Vec::new(),
        }
    }

    /// Drop all entries, keeping the allocations.
    pub fn clear(&mut self) {
        self.g.clear();
        self.z.clear();
    }

    /// Add to matrix element at (row, col).
    pub fn add(&mut self, row: usize, col: usize, value: T) {
        self.g.push((row, col, value));
    }

    /// Add to source vector element.
    pub fn add_source(&mut self, row: usize, value: T) {
        self.z.push((row, value));
    }

    /// Stamp a conductance between two nodes.
    /// For a conductance G between nodes n1 and n2:
    ///   A[n1,n1] += G
    ///   A[n2,n2] += G
    ///   A[n1,n2] -= G
    ///   A[n2,n1] -= G
    pub fn conductance(&mut self, n1: Option<usize>, n2: Option<usize>, g: T) {
        if let Some(i) = n1 {
            self.add(i, i, g);
        }
        if let Some(j) = n2 {
            self.add(j, j, g);
        }
        if let (Some(i), Some(j)) = (n1, n2) {
            self.add(i, j, -g);
            self.add(j, i, -g);
        }
    }

    /// Stamp a current source between two nodes.
    /// Current flows from n+ through the source to n-.
    pub fn current_source(&mut self, n_pos: Option<usize>, n_neg: Option<usize>, current: T) {
        if let Some(i) = n_pos {
            self.add_source(i, -current);
        }
        if let Some(j) = n_neg {
            self.add_source(j, current);
        }
    }

    /// Couple a branch current into the KCL rows of its two nodes.
    /// The branch current enters at n+ and leaves at n-.
    pub fn branch_incidence(&mut self, n_pos: Option<usize>, n_neg: Option<usize>, br: usize) {
        let one = T::from(1.0);
        if let Some(i) = n_pos {
            self.add(i, br, one);
        }
        if let Some(j) = n_neg {
            self.add(j, br, -one);
        }
    }

    /// Stamp a voltage source between two nodes with branch current at index br.
    /// V[n+] - V[n-] = E
    pub fn voltage_source(&mut self, n_pos: Option<usize>, n_neg: Option<usize>, br: usize, voltage: T) {
        let one = T::from(1.0);
        self.branch_incidence(n_pos, n_neg, br);
        if let Some(i) = n_pos {
            self.add(br, i, one);
        }
        if let Some(j) = n_neg {
            self.add(br, j, -one);
        }
        self.add_source(br, voltage);
    }

    /// Stamp a VCCS (Voltage-Controlled Current Source).
    /// I = gm * (V[ctrl+] - V[ctrl-]) flows from out+ through the source to out-.
    pub fn vccs(
        &mut self,
        n_out_pos: Option<usize>,
        n_out_neg: Option<usize>,
        n_ctrl_pos: Option<usize>,
        n_ctrl_neg: Option<usize>,
        gm: T,
    ) {
        if let (Some(i), Some(k)) = (n_out_pos, n_ctrl_pos) {
            self.add(i, k, gm);
        }
        if let (Some(i), Some(l)) = (n_out_pos, n_ctrl_neg) {
            self.add(i, l, -gm);
        }
        if let (Some(j), Some(k)) = (n_out_neg, n_ctrl_pos) {
            self.add(j, k, -gm);
        }
        if let (Some(j), Some(l)) = (n_out_neg, n_ctrl_neg) {
            self.add(j, l, gm);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Dense view of a stamp over `n` rows, for inspecting test stamps.
    pub(crate) fn dense(stamp: &Stamp, n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let mut g = vec![vec![0.0; n]; n];
        let mut z = vec![0.0; n];
        for &(r, c, v) in &stamp.g {
            g[r][c] += v;
        }
        for &(r, v) in &stamp.z {
            z[r] += v;
        }
        (g, z)
    }

    /// Symmetric with zero row sums: a passive two-terminal element obeying KCL.
    pub(crate) fn assert_passive(stamp: &Stamp, n: usize) {
        let (g, z) = dense(stamp, n);
        for r in 0..n {
            let row_sum: f64 = g[r].iter().sum();
            assert!(row_sum.abs() < 1e-12, "row {r} sums to {row_sum}");
            for c in 0..n {
                assert_eq!(g[r][c], g[c][r], "asymmetric at ({r},{c})");
            }
        }
        let z_sum: f64 = z.iter().sum();
        assert!(z_sum.abs() < 1e-12);
    }

    #[test]
    fn test_repeated_entries_accumulate() {
        let mut s = Stamp::new();
        s.conductance(Some(0), Some(1), 1.0);
        s.conductance(Some(0), Some(1), 2.0);
        let (g, _) = dense(&s, 2);
        assert_eq!(g[0][0], 3.0);
        assert_eq!(g[0][1], -3.0);
        assert_passive(&s, 2);
    }

    #[test]
    fn test_ground_entries_are_dropped() {
        let mut s = Stamp::new();
        s.conductance(Some(0), None, 0.5);
        assert_eq!(s.g, vec![(0, 0, 0.5)]);

        s.clear();
        s.current_source(None, Some(1), 2.0);
        assert_eq!(s.z, vec![(1, 2.0)]);
    }

    #[test]
    fn test_context_indices() {
        let ctx = StampContext::new(4, Analysis::Transient { dt: 1e-3, time: 0.5 });
        assert_eq!(ctx.node(NodeId::GROUND), None);
        assert_eq!(ctx.node(NodeId(3)), Some(2));
        assert_eq!(ctx.branch(BranchId(1)), 4);
        assert_eq!(ctx.time(), 0.5);
        assert_eq!(ctx.voltage(&[1.0, 2.0, 3.0], NodeId::GROUND), 0.0);
    }
}
