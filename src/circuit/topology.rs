//! The topology boundary consumed from the schematic editor.
//!
//! A [`Topology`] is a flat list of component instances (stable id, kind tag,
//! property mapping, optional persisted state) plus the wires joining their
//! terminals. It is plain data: the editor produces it, the persistence layer
//! saves it, and [`Circuit::from_topology`](super::Circuit::from_topology)
//! turns it into something the solver can run.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::types::TerminalRef;
use crate::error::{CircuitError, Result};

/// Numeric key/value mapping used for both properties and state records.
pub type PropertyMap = BTreeMap<String, f64>;

/// Component variants understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Ground,
    Junction,
    Resistor,
    Capacitor,
    Inductor,
    Load,
    Diode,
    VoltageSource,
    CurrentSource,
    Ammeter,
    Voltmeter,
    Wattmeter,
    Transformer,
    OpAmp,
}

impl ComponentKind {
    /// Terminal names, in the order the component model indexes them.
    pub fn terminal_names(&self) -> &'static [&'static str] {
        match self {
            Self::Ground => &["gnd"],
            Self::Junction => &["node"],
            Self::Resistor | Self::Capacitor | Self::Inductor | Self::Load => &["a", "b"],
            Self::Diode => &["anode", "cathode"],
            Self::VoltageSource | Self::CurrentSource | Self::Ammeter | Self::Voltmeter => {
                &["pos", "neg"]
            }
            Self::Wattmeter => &["i_in", "i_out", "v_pos", "v_neg"],
            Self::Transformer => &["p1", "p2", "s1", "s2"],
            Self::OpAmp => &["out", "in_pos", "in_neg"],
        }
    }

    /// Index of a named terminal.
    pub fn terminal_index(&self, name: &str) -> Option<usize> {
        self.terminal_names().iter().position(|t| *t == name)
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ground => "ground",
            Self::Junction => "junction",
            Self::Resistor => "resistor",
            Self::Capacitor => "capacitor",
            Self::Inductor => "inductor",
            Self::Load => "load",
            Self::Diode => "diode",
            Self::VoltageSource => "voltage_source",
            Self::CurrentSource => "current_source",
            Self::Ammeter => "ammeter",
            Self::Voltmeter => "voltmeter",
            Self::Wattmeter => "wattmeter",
            Self::Transformer => "transformer",
            Self::OpAmp => "op_amp",
        };
        f.write_str(name)
    }
}

/// One component instance as produced by the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    /// Stable identifier, also used as the prefix of output keys
    pub id: String,
    pub kind: ComponentKind,
    #[serde(default)]
    pub properties: PropertyMap,
    /// Persisted simulation state (e.g. inductor current) from a previous run
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub state: PropertyMap,
}

impl ComponentSpec {
    pub fn new(id: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            id: id.into(),
            kind,
            properties: PropertyMap::new(),
            state: PropertyMap::new(),
        }
    }

    /// Set a property (builder style).
    pub fn with(mut self, key: &str, value: f64) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }

    /// Set a state entry (builder style).
    pub fn with_state(mut self, key: &str, value: f64) -> Self {
        self.state.insert(key.to_string(), value);
        self
    }
}

/// A zero-resistance wire between two terminals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub from: TerminalRef,
    pub to: TerminalRef,
}

/// A complete schematic topology.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub components: Vec<ComponentSpec>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl Topology {
    /// Create an empty topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a topology from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the topology to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a topology JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CircuitError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json(&content)
    }

    /// Add a component.
    pub fn add(&mut self, component: ComponentSpec) -> &mut Self {
        self.components.push(component);
        self
    }

    /// Wire two terminals given as `"<component>.<terminal>"`.
    pub fn connect(&mut self, from: &str, to: &str) -> Result<&mut Self> {
        self.connections.push(Connection {
            from: from.parse()?,
            to: to.parse()?,
        });
        Ok(self)
    }

    /// Look up a component by id.
    pub fn component(&self, id: &str) -> Option<&ComponentSpec> {
        self.components.iter().find(|c| c.id == id)
    }

    /// Write state records (as returned by
    /// [`Simulator::component_states`](crate::Simulator::component_states))
    /// back into the matching components so they survive a save/load cycle.
    pub fn apply_states(&mut self, states: &BTreeMap<String, PropertyMap>) {
        for component in &mut self.components {
            if let Some(state) = states.get(&component.id) {
                component.state = state.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topology_json_roundtrip_keeps_state() {
        let mut topo = Topology::new();
        topo.add(ComponentSpec::new("L1", ComponentKind::Inductor).with("inductance", 0.5))
            .add(ComponentSpec::new("GND", ComponentKind::Ground));
        topo.connect("L1.b", "GND.gnd").unwrap();

        let mut states = BTreeMap::new();
        states.insert("L1".to_string(), PropertyMap::from([("current".to_string(), 0.25)]));
        topo.apply_states(&states);

        let json = topo.to_json().unwrap();
        let back = Topology::from_json(&json).unwrap();
        assert_eq!(back, topo);
        assert_eq!(back.component("L1").unwrap().state["current"], 0.25);
    }

    #[test]
    fn test_kind_names_are_snake_case() {
        let kind: ComponentKind = serde_json::from_str("\"voltage_source\"").unwrap();
        assert_eq!(kind, ComponentKind::VoltageSource);
        assert_eq!(kind.to_string(), "voltage_source");
        assert_eq!(ComponentKind::Diode.terminal_index("cathode"), Some(1));
        assert_eq!(ComponentKind::Diode.terminal_index("gate"), None);
    }
}
