//! Side table of engine-assigned identifiers.
//!
//! Every entry is written exactly once, after the engine call that produced
//! it succeeded. Link resolution and the writer read from here; the authored
//! document is never touched during compilation.

use std::collections::HashMap;

use crate::arena::{LevelId, NodeKey};
use crate::error::ConsistencyError;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeBinding {
    /// main/inputs or main/outputs: raw engine ids by slot.
    Mains { ids: Vec<String> },
    /// bus/add: the new bus and its ports, in engine order.
    Bus {
        bus_id: String,
        input_ids: Vec<String>,
        output_ids: Vec<String>,
    },
    /// bus/input or bus/output inside the bus `bus_id`.
    BusPort { bus_id: String, port_id: String },
    /// A module; ports are by declared slot, `None` when the engine
    /// reported no port of that name.
    Module {
        bus_id: String,
        module_id: String,
        input_ids: Vec<Option<String>>,
        output_ids: Vec<Option<String>>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Bindings {
    nodes: HashMap<NodeKey, NodeBinding>,
    connections: HashMap<(LevelId, usize), String>,
    level_buses: HashMap<LevelId, String>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, key: NodeKey, binding: NodeBinding) -> Result<(), ConsistencyError> {
        if self.nodes.contains_key(&key) {
            return Err(ConsistencyError::AlreadyBound(key));
        }
        self.nodes.insert(key, binding);
        Ok(())
    }

    pub fn node(&self, key: NodeKey) -> Option<&NodeBinding> {
        self.nodes.get(&key)
    }

    /// Record the connection made for the link at `index` in `level`.
    pub fn bind_connection(
        &mut self,
        level: LevelId,
        index: usize,
        link_id: i64,
        connection_id: String,
    ) -> Result<(), ConsistencyError> {
        if self.connections.contains_key(&(level, index)) {
            return Err(ConsistencyError::ConnectionAlreadyBound {
                level,
                link: link_id,
            });
        }
        self.connections.insert((level, index), connection_id);
        Ok(())
    }

    pub fn connection(&self, level: LevelId, index: usize) -> Option<&str> {
        self.connections.get(&(level, index)).map(String::as_str)
    }

    /// Record the bus that owns a nested level. Set together with the
    /// owning bus/add node's binding.
    pub fn bind_level_bus(&mut self, level: LevelId, bus_id: String) {
        self.level_buses.entry(level).or_insert(bus_id);
    }

    pub fn level_bus(&self, level: LevelId) -> Option<&str> {
        self.level_buses.get(&level).map(String::as_str)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
