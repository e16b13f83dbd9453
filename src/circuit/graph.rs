//! Circuit graph structure.

use super::node_map::{map_nodes, NodeMap};
use super::topology::Topology;
use super::types::{BranchId, ComponentId, NodeId, TerminalRef};
use super::validate::validate_circuit;
use crate::components::Component;
use crate::error::Result;

/// A complete circuit ready for simulation.
#[derive(Debug, Clone)]
pub struct Circuit {
    /// All stamping components, in topology order
    pub components: Vec<Component>,

    /// Terminal-to-node assignment and node names
    pub node_map: NodeMap,

    /// Number of nodes (including ground)
    pub num_nodes: usize,

    /// Number of branch current variables (voltage sources, inductors, meters)
    pub num_branches: usize,
}

impl Circuit {
    /// Flatten and validate a topology.
    ///
    /// Node mapping, component construction and the ground-path check all
    /// run here, so every topology and parameter error surfaces before the
    /// first solve.
    pub fn from_topology(topology: &Topology, strict: bool) -> Result<Self> {
        let node_map = map_nodes(topology, strict)?;

        let mut components = Vec::new();
        let mut num_branches = 0usize;
        for (idx, spec) in topology.components.iter().enumerate() {
            let id = ComponentId(components.len());
            let nodes = node_map.component_nodes(idx);
            if let Some(component) = Component::from_spec(id, spec, nodes, &mut num_branches)? {
                components.push(component);
            }
        }

        let circuit = Self {
            components,
            num_nodes: node_map.num_nodes(),
            node_map,
            num_branches,
        };

        validate_circuit(&circuit)?;

        log::debug!(
            "built circuit: {} components, {} nodes, {} branches",
            circuit.components.len(),
            circuit.num_nodes,
            circuit.num_branches
        );

        Ok(circuit)
    }

    /// Get the total size of the MNA solution vector.
    pub fn matrix_size(&self) -> usize {
        (self.num_nodes - 1) + self.num_branches
    }

    /// Get the matrix index for a node voltage.
    /// Returns None for ground (node 0).
    pub fn node_index(&self, node: NodeId) -> Option<usize> {
        if node.is_ground() {
            None
        } else {
            Some(node.0 - 1)
        }
    }

    /// Get the matrix index for a branch current.
    pub fn branch_index(&self, branch: BranchId) -> usize {
        (self.num_nodes - 1) + branch.0
    }

    /// Find a node ID by name.
    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.node_map.find(name)
    }

    /// Get the name of a node.
    pub fn node_name(&self, node: NodeId) -> &str {
        self.node_map.name(node)
    }

    /// Node a terminal landed on.
    pub fn terminal_node(&self, terminal: &TerminalRef) -> Option<NodeId> {
        self.node_map.node_of(terminal)
    }

    /// Find a component by its topology id.
    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name() == name)
    }

    /// Check if the circuit has any nonlinear components.
    pub fn has_nonlinear(&self) -> bool {
        self.components.iter().any(|c| c.is_nonlinear())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{ComponentKind, ComponentSpec};
    use crate::error::CircuitError;

    fn rc() -> Topology {
        let mut t = Topology::new();
        t.add(ComponentSpec::new("V1", ComponentKind::VoltageSource).with("dc", 1.0))
            .add(ComponentSpec::new("R1", ComponentKind::Resistor))
            .add(ComponentSpec::new("out", ComponentKind::Junction))
            .add(ComponentSpec::new("C1", ComponentKind::Capacitor))
            .add(ComponentSpec::new("GND", ComponentKind::Ground));
        t.connect("V1.pos", "R1.a").unwrap();
        t.connect("R1.b", "out.node").unwrap();
        t.connect("out.node", "C1.a").unwrap();
        t.connect("C1.b", "GND.gnd").unwrap();
        t.connect("V1.neg", "GND.gnd").unwrap();
        t
    }

    #[test]
    fn test_from_topology_sizes() {
        let circuit = Circuit::from_topology(&rc(), true).unwrap();
        assert_eq!(circuit.components.len(), 3);
        assert_eq!(circuit.num_nodes, 3);
        assert_eq!(circuit.num_branches, 1);
        assert_eq!(circuit.matrix_size(), 3);
        assert!(!circuit.has_nonlinear());

        let out = circuit.find_node("out").unwrap();
        assert_eq!(circuit.node_index(out), Some(1));
        assert_eq!(circuit.terminal_node(&TerminalRef::new("C1", "a")), Some(out));
        assert_eq!(circuit.branch_index(BranchId(0)), 2);
        assert!(circuit.component("C1").is_some());
    }

    #[test]
    fn test_bad_parameter_fails_build() {
        let mut topo = rc();
        topo.components[1].properties.insert("resistance".into(), -1.0);
        assert!(matches!(
            Circuit::from_topology(&topo, true),
            Err(CircuitError::InvalidParameter { .. })
        ));
    }
}
