//! Node mapping: flattening wires and junctions into electrical nodes.
//!
//! Every terminal of every component is a key in a union-find structure.
//! Each wire unions its two endpoints; a junction is a single terminal, so
//! all wires landing on it end up in the same class. Classes containing a
//! ground terminal collapse to node 0 and the rest are numbered 1..N in
//! first-appearance order.

use std::collections::{HashMap, HashSet};

use super::topology::{ComponentKind, Topology};
use super::types::{NodeId, TerminalRef};
use crate::error::{CircuitError, Result};

/// Union-find over terminal keys.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

/// Result of node mapping: which node each terminal landed on.
#[derive(Debug, Clone)]
pub struct NodeMap {
    /// Node of each terminal, indexed by component position then terminal index
    component_nodes: Vec<Vec<NodeId>>,
    /// Kind of each component, for terminal name lookup
    kinds: Vec<ComponentKind>,
    /// Component id -> position
    component_index: HashMap<String, usize>,
    /// Display name of each node (index 0 is ground)
    names: Vec<String>,
}

impl NodeMap {
    /// Number of nodes including ground.
    pub fn num_nodes(&self) -> usize {
        self.names.len()
    }

    /// Nodes of the component at position `index`, in terminal order.
    pub fn component_nodes(&self, index: usize) -> &[NodeId] {
        &self.component_nodes[index]
    }

    /// Node a terminal resolved to.
    pub fn node_of(&self, terminal: &TerminalRef) -> Option<NodeId> {
        let idx = *self.component_index.get(&terminal.component)?;
        let t = self.kinds[idx].terminal_index(&terminal.terminal)?;
        Some(self.component_nodes[idx][t])
    }

    /// Display name of a node.
    pub fn name(&self, node: NodeId) -> &str {
        &self.names[node.0]
    }

    /// All node names, ground first.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Find a node by display name. `"0"` and `"GND"` both name ground.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        if name == "GND" {
            return Some(NodeId::GROUND);
        }
        self.names.iter().position(|n| n == name).map(NodeId)
    }
}

/// Partition terminals into nodes.
///
/// With `strict` set, any terminal that no wire touches is rejected as
/// dangling; otherwise it simply becomes a node of its own.
pub fn map_nodes(topology: &Topology, strict: bool) -> Result<NodeMap> {
    let mut component_index = HashMap::with_capacity(topology.components.len());
    let mut offsets = Vec::with_capacity(topology.components.len());
    let mut total = 0usize;

    for (idx, comp) in topology.components.iter().enumerate() {
        if component_index.insert(comp.id.clone(), idx).is_some() {
            return Err(CircuitError::DuplicateComponent {
                name: comp.id.clone(),
            });
        }
        offsets.push(total);
        total += comp.kind.terminal_names().len();
    }

    let key_of = |terminal: &TerminalRef| -> Result<usize> {
        let idx = *component_index
            .get(&terminal.component)
            .ok_or_else(|| CircuitError::UnknownComponent {
                component: terminal.component.clone(),
            })?;
        let t = topology.components[idx]
            .kind
            .terminal_index(&terminal.terminal)
            .ok_or_else(|| CircuitError::UnknownTerminal {
                component: terminal.component.clone(),
                terminal: terminal.terminal.clone(),
            })?;
        Ok(offsets[idx] + t)
    };

    let mut uf = UnionFind::new(total);
    let mut wired = vec![false; total];
    for conn in &topology.connections {
        let a = key_of(&conn.from)?;
        let b = key_of(&conn.to)?;
        wired[a] = true;
        wired[b] = true;
        uf.union(a, b);
    }

    if strict {
        for (idx, comp) in topology.components.iter().enumerate() {
            for (t, name) in comp.kind.terminal_names().iter().enumerate() {
                if !wired[offsets[idx] + t] {
                    return Err(CircuitError::DanglingTerminal {
                        terminal: TerminalRef::new(comp.id.as_str(), *name).to_string(),
                    });
                }
            }
        }
    }

    // Ground classes
    let mut ground_roots = HashSet::new();
    let mut reference: Option<(&str, f64)> = None;
    for (idx, comp) in topology.components.iter().enumerate() {
        if comp.kind != ComponentKind::Ground {
            continue;
        }
        let r = comp.properties.get("reference").copied().unwrap_or(0.0);
        match reference {
            None => reference = Some((comp.id.as_str(), r)),
            Some((first, r0)) if r0 != r => {
                return Err(CircuitError::AmbiguousGround {
                    first: first.to_string(),
                    second: comp.id.clone(),
                });
            }
            Some(_) => {}
        }
        ground_roots.insert(uf.find(offsets[idx]));
    }
    if ground_roots.is_empty() {
        return Err(CircuitError::MissingGround);
    }

    // Number the remaining classes in first-appearance order
    let mut root_to_node: HashMap<usize, NodeId> = HashMap::new();
    let mut next_id = 1usize;
    let mut component_nodes = Vec::with_capacity(topology.components.len());
    for (idx, comp) in topology.components.iter().enumerate() {
        let count = comp.kind.terminal_names().len();
        let mut nodes = Vec::with_capacity(count);
        for t in 0..count {
            let root = uf.find(offsets[idx] + t);
            let node = if ground_roots.contains(&root) {
                NodeId::GROUND
            } else {
                *root_to_node.entry(root).or_insert_with(|| {
                    let id = NodeId(next_id);
                    next_id += 1;
                    id
                })
            };
            nodes.push(node);
        }
        component_nodes.push(nodes);
    }

    // Junction ids name their nodes; the rest get N<k>, skipping taken names
    let mut junction_names: Vec<Option<&str>> = vec![None; next_id];
    for (idx, comp) in topology.components.iter().enumerate() {
        if comp.kind != ComponentKind::Junction {
            continue;
        }
        let node = component_nodes[idx][0];
        if node.is_ground() || junction_names[node.0].is_some() {
            continue;
        }
        if comp.id == "0" || comp.id == "GND" {
            return Err(CircuitError::InvalidTopology {
                message: format!("junction '{}' on a non-ground node uses a ground name", comp.id),
            });
        }
        junction_names[node.0] = Some(comp.id.as_str());
    }
    let taken: HashSet<&str> = junction_names.iter().flatten().copied().collect();
    let names: Vec<String> = (0..next_id)
        .map(|n| match junction_names[n] {
            _ if n == 0 => "0".to_string(),
            Some(name) => name.to_string(),
            None => {
                let mut name = format!("N{n}");
                let mut k = 1;
                while taken.contains(name.as_str()) {
                    name = format!("N{n}_{k}");
                    k += 1;
                }
                name
            }
        })
        .collect();

    log::debug!(
        "mapped {} terminals onto {} nodes ({} ground classes)",
        total,
        next_id,
        ground_roots.len()
    );

    Ok(NodeMap {
        component_nodes,
        kinds: topology.components.iter().map(|c| c.kind).collect(),
        component_index,
        names,
    })
}
