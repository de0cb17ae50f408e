//! Flattened, validated view of a preset's nested levels.
//!
//! Levels are numbered in pre-order: the root is level 0, and each bus/add
//! node's subgraph gets the next number when it is reached. Nodes are
//! addressed by `(level, local_id)` since local ids only need to be unique
//! within their own level.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::document::GraphDocument;
use crate::error::{EndpointRole, ParseError, PortDirection};
use crate::kind::NodeKind;

pub type LevelId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeKey {
    pub level: LevelId,
    pub local_id: i64,
}

impl NodeKey {
    pub fn new(level: LevelId, local_id: i64) -> Self {
        Self { level, local_id }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {} at level {}", self.local_id, self.level)
    }
}

#[derive(Debug, Clone)]
pub struct ArenaNode {
    pub key: NodeKey,
    pub kind: NodeKind,
    /// Declared module port names, in document order.
    pub input_names: Vec<String>,
    pub output_names: Vec<String>,
    /// Level holding this node's subgraph (bus/add only).
    pub child_level: Option<LevelId>,
}

#[derive(Debug, Clone)]
pub struct ArenaLink {
    /// Position in the level's link list.
    pub index: usize,
    pub id: i64,
    pub origin: NodeKey,
    pub origin_slot: usize,
    pub target: NodeKey,
    pub target_slot: usize,
}

#[derive(Debug, Clone)]
pub struct Level {
    pub id: LevelId,
    /// The bus/add node that owns this level; `None` for the root.
    pub parent: Option<NodeKey>,
    /// Bus nesting depth; the root is 0.
    pub depth: usize,
    pub nodes: Vec<ArenaNode>,
    pub links: Vec<ArenaLink>,
    /// Local ids of this level's bus/input nodes, in document order.
    pub bus_inputs: Vec<i64>,
    pub bus_outputs: Vec<i64>,
    by_local_id: HashMap<i64, usize>,
}

impl Level {
    pub fn node(&self, local_id: i64) -> Option<&ArenaNode> {
        self.by_local_id.get(&local_id).map(|&i| &self.nodes[i])
    }

    /// Names of this level's bus/input (or bus/output) nodes, in order.
    pub fn bus_port_names(&self, direction: PortDirection) -> Vec<&str> {
        let ids = match direction {
            PortDirection::Input => &self.bus_inputs,
            PortDirection::Output => &self.bus_outputs,
        };
        ids.iter()
            .filter_map(|id| self.node(*id))
            .filter_map(|node| match &node.kind {
                NodeKind::BusInput { name } | NodeKind::BusOutput { name } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct GraphArena {
    levels: Vec<Level>,
}

impl GraphArena {
    /// Classify and validate every level of `document`.
    pub fn build(document: &GraphDocument) -> Result<Self, ParseError> {
        let mut arena = GraphArena { levels: Vec::new() };
        arena.add_level(document, None, 0)?;
        Ok(arena)
    }

    pub fn root(&self) -> &Level {
        &self.levels[0]
    }

    pub fn level(&self, id: LevelId) -> &Level {
        &self.levels[id]
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn node(&self, key: NodeKey) -> Option<&ArenaNode> {
        self.levels.get(key.level).and_then(|level| level.node(key.local_id))
    }

    /// Deepest bus nesting in the document.
    pub fn max_depth(&self) -> usize {
        self.levels.iter().map(|l| l.depth).max().unwrap_or(0)
    }

    fn add_level(
        &mut self,
        doc: &GraphDocument,
        parent: Option<NodeKey>,
        depth: usize,
    ) -> Result<LevelId, ParseError> {
        let id = self.levels.len();
        self.levels.push(Level {
            id,
            parent,
            depth,
            nodes: Vec::with_capacity(doc.nodes.len()),
            links: Vec::with_capacity(doc.links.len()),
            bus_inputs: Vec::new(),
            bus_outputs: Vec::new(),
            by_local_id: HashMap::new(),
        });

        let mut nodes = Vec::with_capacity(doc.nodes.len());
        let mut by_local_id = HashMap::new();
        let mut bus_inputs = Vec::new();
        let mut bus_outputs = Vec::new();
        let mut input_names = HashSet::new();
        let mut output_names = HashSet::new();

        for (index, node) in doc.nodes.iter().enumerate() {
            if by_local_id.insert(node.id, index).is_some() {
                return Err(ParseError::DuplicateNodeId { level: id, node: node.id });
            }

            let key = NodeKey::new(id, node.id);
            let kind = NodeKind::classify(node, id)?;

            let owner_level = parent.map(|p| p.level).unwrap_or(id);
            let owner = parent.map(|p| p.local_id).unwrap_or(node.id);
            let check_name = |direction: PortDirection, name: &str, seen: &mut HashSet<String>| {
                if name.is_empty() || name.contains(',') {
                    return Err(ParseError::InvalidPortName {
                        level: owner_level,
                        node: owner,
                        direction,
                        name: name.to_string(),
                    });
                }
                if !seen.insert(name.to_string()) {
                    return Err(ParseError::DuplicatePortName {
                        level: owner_level,
                        node: owner,
                        direction,
                        name: name.to_string(),
                    });
                }
                Ok(())
            };
            match &kind {
                NodeKind::BusInput { name } => {
                    check_name(PortDirection::Input, name.as_str(), &mut input_names)?;
                    bus_inputs.push(node.id);
                }
                NodeKind::BusOutput { name } => {
                    check_name(PortDirection::Output, name.as_str(), &mut output_names)?;
                    bus_outputs.push(node.id);
                }
                _ => {}
            }

            // Recurse now so level ids follow document pre-order.
            let child_level = match (&kind, node.subgraph.as_deref()) {
                (NodeKind::BusAdd { .. }, Some(subgraph)) => {
                    Some(self.add_level(subgraph, Some(key), depth + 1)?)
                }
                _ => None,
            };

            nodes.push(ArenaNode {
                key,
                kind,
                input_names: node.input_names(),
                output_names: node.output_names(),
                child_level,
            });
        }

        let level = &mut self.levels[id];
        level.nodes = nodes;
        level.by_local_id = by_local_id;
        level.bus_inputs = bus_inputs;
        level.bus_outputs = bus_outputs;

        let mut links = Vec::with_capacity(doc.links.len());
        for (index, link) in doc.links.iter().enumerate() {
            let arena_link = ArenaLink {
                index,
                id: link.id,
                origin: NodeKey::new(id, link.origin_id),
                origin_slot: link.origin_slot,
                target: NodeKey::new(id, link.target_id),
                target_slot: link.target_slot,
            };
            self.check_endpoint(&arena_link, EndpointRole::Origin)?;
            self.check_endpoint(&arena_link, EndpointRole::Target)?;
            links.push(arena_link);
        }
        self.levels[id].links = links;

        Ok(id)
    }

    /// A link endpoint must exist, be usable in its role, and name a real slot.
    fn check_endpoint(&self, link: &ArenaLink, role: EndpointRole) -> Result<(), ParseError> {
        let (key, slot) = match role {
            EndpointRole::Origin => (link.origin, link.origin_slot),
            EndpointRole::Target => (link.target, link.target_slot),
        };
        let level = &self.levels[key.level];
        let node = level.node(key.local_id).ok_or(ParseError::UnknownLinkEndpoint {
            level: key.level,
            link: link.id,
            node: key.local_id,
        })?;

        let available = match (&node.kind, role) {
            (NodeKind::MainInputs { slots }, EndpointRole::Origin)
            | (NodeKind::MainOutputs { slots }, EndpointRole::Target) => Some(*slots),
            (NodeKind::BusAdd { .. }, _) => {
                let child = node.child_level.map(|c| &self.levels[c]);
                Some(child.map_or(0, |c| match role {
                    EndpointRole::Origin => c.bus_outputs.len(),
                    EndpointRole::Target => c.bus_inputs.len(),
                }))
            }
            // A pass-through is a single port; the slot is not consulted.
            (NodeKind::BusInput { .. }, EndpointRole::Origin)
            | (NodeKind::BusOutput { .. }, EndpointRole::Target) => None,
            (NodeKind::Module(_), EndpointRole::Origin) => Some(node.output_names.len()),
            (NodeKind::Module(_), EndpointRole::Target) => Some(node.input_names.len()),
            // Skipped at compile time, so nothing to check.
            (NodeKind::Unsupported { .. }, _) => None,
            _ => {
                return Err(ParseError::InvalidLinkEndpoint {
                    level: key.level,
                    link: link.id,
                    node: key.local_id,
                    node_type: node.kind.label().to_string(),
                    role,
                })
            }
        };

        match available {
            Some(available) if slot >= available => Err(ParseError::SlotOutOfRange {
                level: key.level,
                link: link.id,
                node: key.local_id,
                slot,
                available,
            }),
            _ => Ok(()),
        }
    }
}
