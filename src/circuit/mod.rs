//! Circuit graph representation and validation.
//!
//! This module turns a [`Topology`] (components plus wires, as the editor
//! produces it) into a [`Circuit`]: terminals merged into numbered nodes,
//! components built from their properties, and the ground path checked.

mod graph;
mod node_map;
mod topology;
mod types;
mod validate;

pub use graph::Circuit;
pub use node_map::{map_nodes, NodeMap};
pub use topology::{ComponentKind, ComponentSpec, Connection, PropertyMap, Topology};
pub use types::*;
pub use validate::validate_circuit;
