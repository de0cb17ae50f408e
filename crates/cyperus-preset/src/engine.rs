//! The engine control boundary.
//!
//! Every request blocks until the engine answers. The compiler issues them
//! strictly in order, one at a time, since each step depends on ids returned
//! by the previous ones.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::kind::ModuleSpec;

/// The engine's physical ports, in engine order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainPorts {
    #[serde(rename = "in")]
    pub inputs: Vec<String>,
    #[serde(rename = "out")]
    pub outputs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    pub id: String,
    pub name: String,
}

impl PortInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Ports of a bus or module as reported by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortList {
    #[serde(rename = "in")]
    pub inputs: Vec<PortInfo>,
    #[serde(rename = "out")]
    pub outputs: Vec<PortInfo>,
}

/// Synchronous request/response access to a running engine.
pub trait EngineControl {
    fn list_main(&mut self) -> Result<MainPorts, EngineError>;

    /// Create a bus under `parent_bus_id` (empty for the root) with ports
    /// named by the comma-separated lists. Returns the new bus id.
    fn add_bus(
        &mut self,
        parent_bus_id: &str,
        title: &str,
        input_names: &str,
        output_names: &str,
    ) -> Result<String, EngineError>;

    fn list_bus_port(&mut self, bus_id: &str) -> Result<PortList, EngineError>;

    /// Create a module inside `bus_id`. Returns the module id.
    fn add_module(&mut self, bus_id: &str, module: &ModuleSpec) -> Result<String, EngineError>;

    fn list_module_port(&mut self, module_id: &str) -> Result<PortList, EngineError>;

    /// Connect two addressed ports. Returns the connection id.
    fn add_connection(&mut self, origin: &str, target: &str) -> Result<String, EngineError>;
}

impl<E: EngineControl + ?Sized> EngineControl for &mut E {
    fn list_main(&mut self) -> Result<MainPorts, EngineError> {
        (**self).list_main()
    }

    fn add_bus(
        &mut self,
        parent_bus_id: &str,
        title: &str,
        input_names: &str,
        output_names: &str,
    ) -> Result<String, EngineError> {
        (**self).add_bus(parent_bus_id, title, input_names, output_names)
    }

    fn list_bus_port(&mut self, bus_id: &str) -> Result<PortList, EngineError> {
        (**self).list_bus_port(bus_id)
    }

    fn add_module(&mut self, bus_id: &str, module: &ModuleSpec) -> Result<String, EngineError> {
        (**self).add_module(bus_id, module)
    }

    fn list_module_port(&mut self, module_id: &str) -> Result<PortList, EngineError> {
        (**self).list_module_port(module_id)
    }

    fn add_connection(&mut self, origin: &str, target: &str) -> Result<String, EngineError> {
        (**self).add_connection(origin, target)
    }
}
