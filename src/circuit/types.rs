//! Core types for circuit representation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CircuitError;

/// A unique identifier for a node in the circuit.
/// Node 0 is always ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    /// The ground node (always index 0).
    pub const GROUND: NodeId = NodeId(0);

    /// Check if this is the ground node.
    pub fn is_ground(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ground() {
            write!(f, "GND")
        } else {
            write!(f, "N{}", self.0)
        }
    }
}

/// Position of a component in the circuit's component list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentId(pub usize);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// Index for extra variables in the MNA matrix (e.g., voltage source currents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BranchId(pub usize);

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I{}", self.0)
    }
}

/// A named connection point on a component, written `"<component>.<terminal>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TerminalRef {
    pub component: String,
    pub terminal: String,
}

impl TerminalRef {
    pub fn new(component: impl Into<String>, terminal: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            terminal: terminal.into(),
        }
    }
}

impl fmt::Display for TerminalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.component, self.terminal)
    }
}

impl FromStr for TerminalRef {
    type Err = CircuitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Component ids may themselves contain dots; the terminal is the last segment.
        match s.rsplit_once('.') {
            Some((component, terminal)) if !component.is_empty() && !terminal.is_empty() => {
                Ok(Self::new(component, terminal))
            }
            _ => Err(CircuitError::InvalidTerminalRef {
                text: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for TerminalRef {
    type Error = CircuitError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TerminalRef> for String {
    fn from(value: TerminalRef) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_ref_parse() {
        let t: TerminalRef = "R1.a".parse().unwrap();
        assert_eq!(t, TerminalRef::new("R1", "a"));

        let dotted: TerminalRef = "amp.stage1.out".parse().unwrap();
        assert_eq!(dotted.component, "amp.stage1");
        assert_eq!(dotted.terminal, "out");

        assert!("R1".parse::<TerminalRef>().is_err());
        assert!(".a".parse::<TerminalRef>().is_err());
    }

    #[test]
    fn test_terminal_ref_json() {
        let t: TerminalRef = serde_json::from_str("\"V1.pos\"").unwrap();
        assert_eq!(t, TerminalRef::new("V1", "pos"));
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"V1.pos\"");
    }
}
