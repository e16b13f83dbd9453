//! Ideal two-winding transformer.
//!
//!   V(p1,p2) = ratio · V(s1,s2)
//!   I_s      = -ratio · I_p
//!
//! One branch unknown carries the primary current. The windings are
//! galvanically isolated, so each side needs its own path to ground.

use num_complex::Complex64;

use super::stamp::{AcStamp, Stamp, StampContext, StampValue};
use crate::circuit::{BranchId, ComponentId, NodeId};

#[derive(Debug, Clone)]
pub struct Transformer {
    pub id: ComponentId,
    pub name: String,
    pub nodes: [NodeId; 4], // [p1, p2, s1, s2]
    /// Turns ratio N1/N2
    pub ratio: f64,
    pub branch: BranchId,
}

impl Transformer {
    pub fn new(id: ComponentId, name: String, nodes: [NodeId; 4], ratio: f64, branch: BranchId) -> Self {
        Self {
            id,
            name,
            nodes,
            ratio,
            branch,
        }
    }

    fn stamp_into<T: StampValue>(&self, ctx: &StampContext, stamp: &mut Stamp<T>) {
        let p1 = ctx.node(self.nodes[0]);
        let p2 = ctx.node(self.nodes[1]);
        let s1 = ctx.node(self.nodes[2]);
        let s2 = ctx.node(self.nodes[3]);
        let br = ctx.branch(self.branch);
        let one = T::from(1.0);
        let n = T::from(self.ratio);

        // Primary current enters p1, the reflected secondary current leaves s1
        stamp.branch_incidence(p1, p2, br);
        if let Some(i) = s1 {
            stamp.add(i, br, -n);
        }
        if let Some(j) = s2 {
            stamp.add(j, br, n);
        }

        // V[p1] - V[p2] - n·(V[s1] - V[s2]) = 0
        if let Some(i) = p1 {
            stamp.add(br, i, one);
        }
        if let Some(j) = p2 {
            stamp.add(br, j, -one);
        }
        if let Some(k) = s1 {
            stamp.add(br, k, -n);
        }
        if let Some(l) = s2 {
            stamp.add(br, l, n);
        }
    }

    pub fn stamp(&self, ctx: &StampContext, stamp: &mut Stamp) {
        self.stamp_into(ctx, stamp);
    }

    pub fn ac_stamp(&self, ctx: &StampContext, stamp: &mut AcStamp) {
        self.stamp_into::<Complex64>(ctx, stamp);
    }

    /// Primary current, entering at `p1`.
    pub fn current(&self, ctx: &StampContext, x: &[f64]) -> f64 {
        ctx.current(x, self.branch)
    }
}
