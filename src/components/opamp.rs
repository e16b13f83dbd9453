//! Operational Amplifier model.
//!
//! The op-amp is a finite-gain amplifier Vout = A * (V+ - V-) built from a
//! voltage-controlled current source, an output resistance to ground and an
//! input resistance between the inputs. The Norton form stays well
//! conditioned even for very large gains.

use num_complex::Complex64;

use super::stamp::{AcStamp, Stamp, StampContext, StampValue};
use crate::circuit::{ComponentId, NodeId};

/// Parameters for an op-amp model.
#[derive(Debug, Clone, PartialEq)]
pub struct OpAmpParams {
    /// Open-loop DC gain (A_OL)
    pub gain: f64,
    /// Output resistance (R_out)
    pub r_out: f64,
    /// Input resistance (R_in)
    pub r_in: f64,
}

impl Default for OpAmpParams {
    fn default() -> Self {
        Self::ua741()
    }
}

impl OpAmpParams {
    /// Create parameters for a typical 741-style op-amp.
    pub fn ua741() -> Self {
        Self {
            gain: 2e5,
            r_out: 75.0,
            r_in: 2e6,
        }
    }
}

/// An operational amplifier component.
#[derive(Debug, Clone)]
pub struct OpAmp {
    pub id: ComponentId,
    pub name: String,
    pub nodes: [NodeId; 3], // [output, non-inverting (+), inverting (-)]
    pub params: OpAmpParams,
}

impl OpAmp {
    /// Create a new op-amp.
    pub fn new(id: ComponentId, name: String, nodes: [NodeId; 3], params: OpAmpParams) -> Self {
        Self {
            id,
            name,
            nodes,
            params,
        }
    }

    /// Get the output node.
    pub fn output(&self) -> NodeId {
        self.nodes[0]
    }

    /// Get the non-inverting input node.
    pub fn input_pos(&self) -> NodeId {
        self.nodes[1]
    }

    /// Get the inverting input node.
    pub fn input_neg(&self) -> NodeId {
        self.nodes[2]
    }

    /// Get the effective transconductance for MNA stamping (A / R_out).
    pub fn transconductance(&self) -> f64 {
        self.params.gain / self.params.r_out
    }

    /// Get the input conductance.
    pub fn input_conductance(&self) -> f64 {
        1.0 / self.params.r_in
    }

    /// Get the output conductance.
    pub fn output_conductance(&self) -> f64 {
        1.0 / self.params.r_out
    }

    fn stamp_into<T: StampValue>(&self, ctx: &StampContext, stamp: &mut Stamp<T>) {
        let n_out = ctx.node(self.output());
        let n_pos = ctx.node(self.input_pos());
        let n_neg = ctx.node(self.input_neg());

        // gm·(V+ - V-) is pushed into the output node, which sees R_out to
        // ground: Vout = gm·R_out·(V+ - V-) = A·(V+ - V-)
        stamp.vccs(None, n_out, n_pos, n_neg, T::from(self.transconductance()));
        stamp.conductance(n_out, None, T::from(self.output_conductance()));
        stamp.conductance(n_pos, n_neg, T::from(self.input_conductance()));
    }

    pub fn stamp(&self, ctx: &StampContext, stamp: &mut Stamp) {
        self.stamp_into(ctx, stamp);
    }

    pub fn ac_stamp(&self, ctx: &StampContext, stamp: &mut AcStamp) {
        self.stamp_into::<Complex64>(ctx, stamp);
    }

    /// Current delivered by the output into the output node.
    pub fn current(&self, ctx: &StampContext, x: &[f64]) -> f64 {
        let v_diff = ctx.voltage(x, self.input_pos()) - ctx.voltage(x, self.input_neg());
        let v_out = ctx.voltage(x, self.output());
        (self.params.gain * v_diff - v_out) / self.params.r_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::stamp::tests::dense;
    use crate::components::stamp::Analysis;

    #[test]
    fn test_open_loop_output_follows_gain() {
        // Drive in+ = 1 mV through the matrix by hand: the output row reads
        // g_out·Vout - gm·V+ = 0
        let op = OpAmp::new(
            ComponentId(0),
            "U1".into(),
            [NodeId(1), NodeId(2), NodeId(0)],
            OpAmpParams::ua741(),
        );
        let ctx = StampContext::new(3, Analysis::Dc);
        let mut stamp = Stamp::new();
        op.stamp(&ctx, &mut stamp);
        let (g, _) = dense(&stamp, 2);

        let v_pos = 1e-3;
        let v_out = -g[0][1] * v_pos / g[0][0];
        assert!((v_out - op.params.gain * v_pos).abs() < 1e-6);
    }
}
