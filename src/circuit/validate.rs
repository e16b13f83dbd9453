//! Circuit validation.

use std::collections::{HashSet, VecDeque};

use crate::error::{CircuitError, Result};

use super::types::NodeId;
use super::Circuit;

/// Validate a circuit for simulation.
///
/// Checks:
/// - At least one component contributes to the matrix
/// - No node name shadows a component output key
/// - No node hangs off a single component terminal
/// - Every node has a conduction path to ground
///
/// Transformer windings and the two sides of a wattmeter are separate
/// conduction groups; an op-amp output counts as grounded through R_out.
pub fn validate_circuit(circuit: &Circuit) -> Result<()> {
    if circuit.components.is_empty() {
        return Err(CircuitError::InvalidTopology {
            message: "Circuit has no components".to_string(),
        });
    }

    // Node voltages and device readings share one output namespace
    let keys: HashSet<String> = circuit.components.iter().flat_map(|c| c.output_keys()).collect();
    if let Some(name) = circuit.node_map.names().iter().find(|n| keys.contains(*n)) {
        return Err(CircuitError::InvalidTopology {
            message: format!("node name '{name}' collides with a component output"),
        });
    }

    // A lone terminal carries no current and leaves its node undetermined
    let mut touches = vec![0usize; circuit.num_nodes];
    for component in &circuit.components {
        for node in component.nodes() {
            touches[node.0] += 1;
        }
    }
    if let Some(lone) = touches.iter().skip(1).position(|&n| n < 2) {
        return Err(CircuitError::FloatingNode {
            node: circuit.node_name(NodeId(lone + 1)).to_string(),
        });
    }

    // Node adjacency from conduction groups
    let mut adjacent: Vec<Vec<usize>> = vec![Vec::new(); circuit.num_nodes];
    for component in &circuit.components {
        for group in component.conduction_groups() {
            for pair in group.windows(2) {
                let (a, b) = (pair[0].0, pair[1].0);
                if a != b {
                    adjacent[a].push(b);
                    adjacent[b].push(a);
                }
            }
        }
    }

    let mut reached = vec![false; circuit.num_nodes];
    let mut queue = VecDeque::from([NodeId::GROUND.0]);
    reached[NodeId::GROUND.0] = true;
    while let Some(n) = queue.pop_front() {
        for &m in &adjacent[n] {
            if !reached[m] {
                reached[m] = true;
                queue.push_back(m);
            }
        }
    }

    if let Some(floating) = reached.iter().position(|r| !r) {
        return Err(CircuitError::FloatingNode {
            node: circuit.node_name(NodeId(floating)).to_string(),
        });
    }

    Ok(())
}
