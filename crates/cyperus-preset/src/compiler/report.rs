use std::fmt;

use serde::Serialize;

use crate::arena::{LevelId, NodeKey};
use crate::error::PortDirection;

/// A non-fatal problem found while compiling. The rest of the graph is
/// still built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompileWarning {
    /// The node's type has no engine counterpart; it was not created.
    UnsupportedNode { node: NodeKey, tag: String },
    /// The link touches an unsupported node and was not connected.
    SkippedLink {
        level: LevelId,
        link: i64,
        node: NodeKey,
    },
    /// A declared module port had no engine port of the same name.
    UnmatchedPort {
        node: NodeKey,
        direction: PortDirection,
        name: String,
    },
}

impl fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileWarning::UnsupportedNode { node, tag } => {
                write!(f, "unsupported node type {:?} ({}), skipped", tag, node)
            }
            CompileWarning::SkippedLink { level, link, node } => {
                write!(f, "link {} at level {} touches skipped {}", link, level, node)
            }
            CompileWarning::UnmatchedPort {
                node,
                direction,
                name,
            } => write!(f, "{} declares {} port {:?} the engine did not report", node, direction, name),
        }
    }
}

/// What a successful compile did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompileReport {
    pub buses: usize,
    pub modules: usize,
    pub connections: usize,
    /// Deepest bus nesting expanded; the root is 0.
    pub max_depth: usize,
    pub warnings: Vec<CompileWarning>,
}

impl CompileReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

impl fmt::Display for CompileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} buses, {} modules, {} connections (depth {}), {} warnings",
            self.buses,
            self.modules,
            self.connections,
            self.max_depth,
            self.warnings.len()
        )
    }
}
