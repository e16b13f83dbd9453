//! Component models for circuit simulation.
//!
//! This module provides models for all supported circuit components:
//! - Linear: Resistor, Capacitor, Inductor, series R-L Load
//! - Sources: Voltage Source, Current Source
//! - Nonlinear: Diode
//! - Active/coupled: Op-Amp, Transformer
//! - Instruments: Ammeter, Voltmeter, Wattmeter
//!
//! Each component implements stamping into the MNA matrix. Ground and
//! junction markers only shape the node map and never become components.

mod diode;
mod linear;
mod load;
mod meters;
mod opamp;
mod properties;
mod sources;
pub mod stamp;
mod transformer;

pub use diode::{Diode, DiodeModel, DiodeParams, MAX_EXP_ARG};
pub use linear::{Capacitor, Inductor, Resistor};
pub use load::Load;
pub use meters::{Ammeter, Voltmeter, Wattmeter};
pub use opamp::{OpAmp, OpAmpParams};
pub use sources::{CurrentSource, VoltageSource, Waveform};
pub use stamp::{AcStamp, Analysis, Stamp, StampContext};
pub use transformer::Transformer;

use std::collections::BTreeMap;

use crate::circuit::{BranchId, ComponentId, ComponentKind, ComponentSpec, NodeId, PropertyMap};
use crate::error::Result;
use properties::Props;

/// Resistance substituted for an open circuit (discharged capacitor at DC,
/// disconnected load) so the matrix stays well conditioned.
pub const OPEN_CIRCUIT_RESISTANCE: f64 = 1e9;

/// Default internal resistance of voltmeters and wattmeter voltage coils.
pub const METER_RESISTANCE: f64 = 1e7;

/// Backward-Euler equivalent of a reactive element for one time step:
/// `i = conductance·v + current_source`, with `i` flowing from the first
/// terminal to the second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompanionModel {
    pub conductance: f64,
    pub current_source: f64,
}

impl CompanionModel {
    /// Stand-in for an open circuit.
    pub fn open() -> Self {
        Self {
            conductance: 1.0 / OPEN_CIRCUIT_RESISTANCE,
            current_source: 0.0,
        }
    }

    /// Branch current for a given terminal voltage.
    pub fn current(&self, voltage: f64) -> f64 {
        self.conductance * voltage + self.current_source
    }
}

/// Elements with state carried from one time step to the next.
pub trait Reactive {
    /// Companion model for a step of size `dt`, built from the state
    /// committed at the start of the step.
    fn companion(&self, dt: f64) -> CompanionModel;

    /// Commit the converged terminal voltage and branch current.
    fn update_state(&mut self, voltage: f64, current: f64);
}

/// A circuit component.
#[derive(Debug, Clone)]
pub enum Component {
    Resistor(Resistor),
    Capacitor(Capacitor),
    Inductor(Inductor),
    Load(Load),
    VoltageSource(VoltageSource),
    CurrentSource(CurrentSource),
    Diode(Diode),
    OpAmp(OpAmp),
    Transformer(Transformer),
    Ammeter(Ammeter),
    Voltmeter(Voltmeter),
    Wattmeter(Wattmeter),
}

fn next_branch(counter: &mut usize) -> BranchId {
    let branch = BranchId(*counter);
    *counter += 1;
    branch
}

fn waveform(props: &Props<'_>) -> Result<(Waveform, f64)> {
    let wave = Waveform {
        dc: props.get("dc", 0.0),
        amplitude: props.get("amplitude", 0.0),
        frequency: props.non_negative("frequency", 0.0)?,
        phase: props.get("phase", 0.0),
    };
    let ac = props.non_negative("ac_magnitude", 0.0)?;
    Ok((wave, ac))
}

const SOURCE_PROPS: &[&str] = &["dc", "amplitude", "frequency", "phase", "ac_magnitude"];

impl Component {
    /// Build a component from its topology spec.
    ///
    /// Returns `Ok(None)` for ground and junction markers. Property values
    /// are validated here; a bad value is fatal before any solve starts.
    pub fn from_spec(
        id: ComponentId,
        spec: &ComponentSpec,
        nodes: &[NodeId],
        branch_counter: &mut usize,
    ) -> Result<Option<Self>> {
        let name = spec.id.clone();
        let two = || [nodes[0], nodes[1]];

        let component = match spec.kind {
            ComponentKind::Ground => {
                Props::new(spec, &["reference"])?;
                return Ok(None);
            }
            ComponentKind::Junction => {
                Props::new(spec, &[])?;
                return Ok(None);
            }

            ComponentKind::Resistor => {
                let p = Props::new(spec, &["resistance"])?;
                Component::Resistor(Resistor::new(id, name, two(), p.positive("resistance", 1e3)?))
            }

            ComponentKind::Capacitor => {
                let p = Props::new(spec, &["capacitance"])?;
                Component::Capacitor(Capacitor::new(
                    id,
                    name,
                    two(),
                    p.positive("capacitance", 1e-6)?,
                    p.state("voltage"),
                ))
            }

            ComponentKind::Inductor => {
                let p = Props::new(spec, &["inductance"])?;
                Component::Inductor(Inductor::new(
                    id,
                    name,
                    two(),
                    p.positive("inductance", 1e-3)?,
                    next_branch(branch_counter),
                    p.state("current"),
                ))
            }

            ComponentKind::Load => {
                let p = Props::new(spec, &["resistance", "inductance", "level"])?;
                Component::Load(Load::new(
                    id,
                    name,
                    two(),
                    p.positive("resistance", 100.0)?,
                    p.non_negative("inductance", 0.1)?,
                    p.in_range("level", 100.0, 0.0, 100.0)?,
                    p.state("current"),
                ))
            }

            ComponentKind::Diode => {
                let p = Props::new(spec, &["saturation_current", "emission_coefficient"])?;
                let defaults = DiodeParams::default();
                let params = DiodeParams {
                    is: p.positive("saturation_current", defaults.is)?,
                    n: p.positive("emission_coefficient", defaults.n)?,
                };
                Component::Diode(Diode::new(id, name, two(), params, p.state("vd")))
            }

            ComponentKind::VoltageSource => {
                let p = Props::new(spec, SOURCE_PROPS)?;
                let (wave, ac) = waveform(&p)?;
                Component::VoltageSource(VoltageSource::new(id, name, two(), wave, ac, next_branch(branch_counter)))
            }

            ComponentKind::CurrentSource => {
                let p = Props::new(spec, SOURCE_PROPS)?;
                let (wave, ac) = waveform(&p)?;
                Component::CurrentSource(CurrentSource::new(id, name, two(), wave, ac))
            }

            ComponentKind::Ammeter => {
                Props::new(spec, &[])?;
                Component::Ammeter(Ammeter::new(id, name, two(), next_branch(branch_counter)))
            }

            ComponentKind::Voltmeter => {
                let p = Props::new(spec, &["resistance"])?;
                Component::Voltmeter(Voltmeter::new(id, name, two(), p.positive("resistance", METER_RESISTANCE)?))
            }

            ComponentKind::Wattmeter => {
                let p = Props::new(spec, &["resistance"])?;
                Component::Wattmeter(Wattmeter::new(
                    id,
                    name,
                    [nodes[0], nodes[1], nodes[2], nodes[3]],
                    p.positive("resistance", METER_RESISTANCE)?,
                    next_branch(branch_counter),
                ))
            }

            ComponentKind::Transformer => {
                let p = Props::new(spec, &["ratio"])?;
                Component::Transformer(Transformer::new(
                    id,
                    name,
                    [nodes[0], nodes[1], nodes[2], nodes[3]],
                    p.positive("ratio", 1.0)?,
                    next_branch(branch_counter),
                ))
            }

            ComponentKind::OpAmp => {
                let p = Props::new(spec, &["gain", "r_out", "r_in"])?;
                let defaults = OpAmpParams::default();
                let params = OpAmpParams {
                    gain: p.positive("gain", defaults.gain)?,
                    r_out: p.positive("r_out", defaults.r_out)?,
                    r_in: p.positive("r_in", defaults.r_in)?,
                };
                Component::OpAmp(OpAmp::new(id, name, [nodes[0], nodes[1], nodes[2]], params))
            }
        };

        Ok(Some(component))
    }

    /// Get the component ID.
    pub fn id(&self) -> ComponentId {
        match self {
            Component::Resistor(r) => r.id,
            Component::Capacitor(c) => c.id,
            Component::Inductor(l) => l.id,
            Component::Load(x) => x.id,
            Component::VoltageSource(v) => v.id,
            Component::CurrentSource(i) => i.id,
            Component::Diode(d) => d.id,
            Component::OpAmp(o) => o.id,
            Component::Transformer(t) => t.id,
            Component::Ammeter(a) => a.id,
            Component::Voltmeter(v) => v.id,
            Component::Wattmeter(w) => w.id,
        }
    }

    /// Get the component name (its stable topology id).
    pub fn name(&self) -> &str {
        match self {
            Component::Resistor(r) => &r.name,
            Component::Capacitor(c) => &c.name,
            Component::Inductor(l) => &l.name,
            Component::Load(x) => &x.name,
            Component::VoltageSource(v) => &v.name,
            Component::CurrentSource(i) => &i.name,
            Component::Diode(d) => &d.name,
            Component::OpAmp(o) => &o.name,
            Component::Transformer(t) => &t.name,
            Component::Ammeter(a) => &a.name,
            Component::Voltmeter(v) => &v.name,
            Component::Wattmeter(w) => &w.name,
        }
    }

    /// Nodes the component touches, in terminal order.
    pub fn nodes(&self) -> &[NodeId] {
        match self {
            Component::Resistor(r) => &r.nodes,
            Component::Capacitor(c) => &c.nodes,
            Component::Inductor(l) => &l.nodes,
            Component::Load(x) => &x.nodes,
            Component::VoltageSource(v) => &v.nodes,
            Component::CurrentSource(i) => &i.nodes,
            Component::Diode(d) => &d.nodes,
            Component::OpAmp(o) => &o.nodes,
            Component::Transformer(t) => &t.nodes,
            Component::Ammeter(a) => &a.nodes,
            Component::Voltmeter(v) => &v.nodes,
            Component::Wattmeter(w) => &w.nodes,
        }
    }

    /// Auxiliary branch-current unknown, if the component has one.
    pub fn branch(&self) -> Option<BranchId> {
        match self {
            Component::Inductor(l) => Some(l.branch),
            Component::VoltageSource(v) => Some(v.branch),
            Component::Transformer(t) => Some(t.branch),
            Component::Ammeter(a) => Some(a.branch),
            Component::Wattmeter(w) => Some(w.branch),
            _ => None,
        }
    }

    /// Check if this component is nonlinear (requires Newton-Raphson iteration).
    pub fn is_nonlinear(&self) -> bool {
        matches!(self, Component::Diode(_))
    }

    /// Groups of nodes this component ties together electrically.
    ///
    /// Used for the ground-path check: a transformer's windings are separate
    /// groups, and an op-amp output is referenced to ground through R_out.
    pub fn conduction_groups(&self) -> Vec<Vec<NodeId>> {
        match self {
            Component::Transformer(t) => vec![t.nodes[..2].to_vec(), t.nodes[2..].to_vec()],
            Component::Wattmeter(w) => vec![w.nodes[..2].to_vec(), w.nodes[2..].to_vec()],
            Component::OpAmp(o) => vec![vec![o.output(), NodeId::GROUND], vec![o.input_pos(), o.input_neg()]],
            other => vec![other.nodes().to_vec()],
        }
    }

    /// Stamp the linear part of the component for the given analysis.
    ///
    /// Reactive elements stamp their companion model; nonlinear devices
    /// stamp nothing here and are linearized by the Newton-Raphson engine.
    pub fn stamp(&self, ctx: &StampContext, stamp: &mut Stamp) {
        match self {
            Component::Resistor(r) => r.stamp(ctx, stamp),
            Component::Capacitor(c) => c.stamp(ctx, stamp),
            Component::Inductor(l) => l.stamp(ctx, stamp),
            Component::Load(x) => x.stamp(ctx, stamp),
            Component::VoltageSource(v) => v.stamp(ctx, stamp),
            Component::CurrentSource(i) => i.stamp(ctx, stamp),
            Component::OpAmp(o) => o.stamp(ctx, stamp),
            Component::Transformer(t) => t.stamp(ctx, stamp),
            Component::Ammeter(a) => a.stamp(ctx, stamp),
            Component::Voltmeter(v) => v.stamp(ctx, stamp),
            Component::Wattmeter(w) => w.stamp(ctx, stamp),
            Component::Diode(_) => {}
        }
    }

    /// Stamp the small-signal admittance at angular frequency `omega`.
    pub fn ac_stamp(&self, ctx: &StampContext, omega: f64, stamp: &mut AcStamp) {
        match self {
            Component::Resistor(r) => r.ac_stamp(ctx, stamp),
            Component::Capacitor(c) => c.ac_stamp(ctx, omega, stamp),
            Component::Inductor(l) => l.ac_stamp(ctx, omega, stamp),
            Component::Load(x) => x.ac_stamp(ctx, omega, stamp),
            Component::VoltageSource(v) => v.ac_stamp(ctx, stamp),
            Component::CurrentSource(i) => i.ac_stamp(ctx, stamp),
            Component::Diode(d) => d.ac_stamp(ctx, stamp),
            Component::OpAmp(o) => o.ac_stamp(ctx, stamp),
            Component::Transformer(t) => t.ac_stamp(ctx, stamp),
            Component::Ammeter(a) => a.ac_stamp(ctx, stamp),
            Component::Voltmeter(v) => v.ac_stamp(ctx, stamp),
            Component::Wattmeter(w) => w.ac_stamp(ctx, stamp),
        }
    }

    /// Keys [`record_outputs`](Self::record_outputs) writes for this component.
    pub fn output_keys(&self) -> Vec<String> {
        let suffixes: &[&str] = match self {
            Component::Voltmeter(_) => &["V"],
            Component::Wattmeter(_) => &["I", "V", "P"],
            _ => &["I"],
        };
        suffixes.iter().map(|s| format!("{}_{}", self.name(), s)).collect()
    }

    /// Write this component's readings for a solution into `out`, keyed
    /// `<id>_I` (current), `<id>_V` (meter voltage) and `<id>_P` (power).
    pub fn record_outputs(&self, ctx: &StampContext, x: &[f64], out: &mut BTreeMap<String, f64>) {
        let key = |suffix: &str| format!("{}_{}", self.name(), suffix);
        let current = match self {
            Component::Resistor(r) => Some(r.current(ctx, x)),
            Component::Capacitor(c) => Some(c.current(ctx, x)),
            Component::Inductor(l) => Some(l.current(ctx, x)),
            Component::Load(l) => Some(l.current(ctx, x)),
            Component::VoltageSource(v) => Some(v.current(ctx, x)),
            Component::CurrentSource(i) => Some(i.current_at(ctx.time())),
            Component::Diode(d) => Some(d.current(ctx, x)),
            Component::OpAmp(o) => Some(o.current(ctx, x)),
            Component::Transformer(t) => Some(t.current(ctx, x)),
            Component::Ammeter(a) => Some(a.current(ctx, x)),
            Component::Wattmeter(w) => {
                out.insert(key("V"), w.voltage(ctx, x));
                out.insert(key("P"), w.power(ctx, x));
                Some(w.current(ctx, x))
            }
            Component::Voltmeter(v) => {
                out.insert(key("V"), v.voltage(ctx, x));
                None
            }
        };
        if let Some(i) = current {
            out.insert(key("I"), i);
        }
    }

    /// Commit the converged solution of a transient step into the
    /// component's persistent state.
    pub fn commit(&mut self, ctx: &StampContext, x: &[f64]) {
        match self {
            Component::Capacitor(c) => {
                let (v, i) = (c.voltage(ctx, x), c.current(ctx, x));
                c.update_state(v, i);
            }
            Component::Inductor(l) => {
                let (v, i) = (
                    ctx.voltage(x, l.nodes[0]) - ctx.voltage(x, l.nodes[1]),
                    l.current(ctx, x),
                );
                l.update_state(v, i);
            }
            Component::Load(l) => {
                let (v, i) = (l.voltage(ctx, x), l.current(ctx, x));
                l.update_state(v, i);
            }
            _ => {}
        }
    }

    /// Persistent state record, empty for stateless components.
    pub fn state(&self) -> PropertyMap {
        match self {
            Component::Capacitor(c) => c.state(),
            Component::Inductor(l) => l.state(),
            Component::Load(l) => l.state(),
            Component::Diode(d) => d.state(),
            _ => PropertyMap::new(),
        }
    }
}
