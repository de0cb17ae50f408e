//! In-process stand-in for a running engine.
//!
//! Issues UUID ids the way the real server does, keeps the bus/module tree it
//! was asked to build, and refuses connections between addresses it never
//! handed out. Used for dry-run compiles and tests.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;
use uuid::Uuid;

use crate::address::PortAddress;
use crate::engine::{EngineControl, MainPorts, PortInfo, PortList};
use crate::error::EngineError;
use crate::kind::ModuleSpec;

/// One request as the engine received it.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    ListMain,
    AddBus {
        parent: String,
        title: String,
        inputs: String,
        outputs: String,
    },
    ListBusPort {
        bus_id: String,
    },
    AddModule {
        bus_id: String,
        operation: &'static str,
        params: Vec<(&'static str, f32)>,
    },
    ListModulePort {
        module_id: String,
    },
    AddConnection {
        origin: String,
        target: String,
    },
}

impl EngineCall {
    pub fn operation(&self) -> &'static str {
        match self {
            EngineCall::ListMain => "list_main",
            EngineCall::AddBus { .. } => "add_bus",
            EngineCall::ListBusPort { .. } => "list_bus_port",
            EngineCall::AddModule { operation, .. } => operation,
            EngineCall::ListModulePort { .. } => "list_module_port",
            EngineCall::AddConnection { .. } => "add_connection",
        }
    }
}

#[derive(Debug, Clone)]
pub struct VirtualBus {
    pub parent: String,
    pub title: String,
    pub ports: PortList,
}

#[derive(Debug, Clone)]
pub struct VirtualModule {
    pub bus_id: String,
    pub spec: ModuleSpec,
    pub ports: PortList,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualConnection {
    pub id: String,
    pub origin: String,
    pub target: String,
}

#[derive(Debug, Default)]
pub struct VirtualEngine {
    mains: MainPorts,
    buses: BTreeMap<String, VirtualBus>,
    modules: BTreeMap<String, VirtualModule>,
    connections: Vec<VirtualConnection>,
    sources: HashSet<String>,
    sinks: HashSet<String>,
    calls: Vec<EngineCall>,
    failing: HashSet<&'static str>,
}

impl VirtualEngine {
    /// An engine with the given number of physical inputs and outputs.
    pub fn new(main_inputs: usize, main_outputs: usize) -> Self {
        let mains = MainPorts {
            inputs: (0..main_inputs).map(|_| new_id()).collect(),
            outputs: (0..main_outputs).map(|_| new_id()).collect(),
        };
        let mut engine = Self {
            mains,
            ..Self::default()
        };
        for id in &engine.mains.inputs {
            engine.sources.insert(PortAddress::main(id.clone()).to_string());
        }
        for id in &engine.mains.outputs {
            engine.sinks.insert(PortAddress::main(id.clone()).to_string());
        }
        engine
    }

    /// Make every request named `operation` fail (e.g. `"add_bus"` or
    /// `"add_modules_oscillator_sine"`).
    pub fn fail_on(mut self, operation: &'static str) -> Self {
        self.failing.insert(operation);
        self
    }

    pub fn mains(&self) -> &MainPorts {
        &self.mains
    }

    pub fn calls(&self) -> &[EngineCall] {
        &self.calls
    }

    pub fn buses(&self) -> &BTreeMap<String, VirtualBus> {
        &self.buses
    }

    pub fn modules(&self) -> &BTreeMap<String, VirtualModule> {
        &self.modules
    }

    pub fn connections(&self) -> &[VirtualConnection] {
        &self.connections
    }

    fn record(&mut self, call: EngineCall) -> Result<(), EngineError> {
        let operation = call.operation();
        debug!(operation, "virtual engine request");
        self.calls.push(call);
        if self.failing.contains(operation) {
            return Err(EngineError::Rejected {
                operation,
                reason: "failure injected".to_string(),
            });
        }
        Ok(())
    }

    /// Bus ports are sources from inside the bus and sinks from outside, so
    /// both directions are usable on either end of a connection.
    fn register_bus_ports(&mut self, bus_id: &str, ports: &PortList) {
        for port in ports.inputs.iter().chain(&ports.outputs) {
            let addr = PortAddress::bus(bus_id, port.id.clone()).to_string();
            self.sources.insert(addr.clone());
            self.sinks.insert(addr);
        }
    }

    fn register_module_ports(&mut self, bus_id: &str, module_id: &str, ports: &PortList) {
        for port in &ports.inputs {
            self.sinks
                .insert(PortAddress::module_input(bus_id, module_id, port.id.clone()).to_string());
        }
        for port in &ports.outputs {
            self.sources
                .insert(PortAddress::module_output(bus_id, module_id, port.id.clone()).to_string());
        }
    }
}

impl EngineControl for VirtualEngine {
    fn list_main(&mut self) -> Result<MainPorts, EngineError> {
        self.record(EngineCall::ListMain)?;
        Ok(self.mains.clone())
    }

    fn add_bus(
        &mut self,
        parent_bus_id: &str,
        title: &str,
        input_names: &str,
        output_names: &str,
    ) -> Result<String, EngineError> {
        self.record(EngineCall::AddBus {
            parent: parent_bus_id.to_string(),
            title: title.to_string(),
            inputs: input_names.to_string(),
            outputs: output_names.to_string(),
        })?;

        if !parent_bus_id.is_empty() && !self.buses.contains_key(parent_bus_id) {
            return Err(EngineError::Rejected {
                operation: "add_bus",
                reason: format!("no parent bus {}", parent_bus_id),
            });
        }

        let id = new_id();
        let ports = PortList {
            inputs: named_ports(input_names),
            outputs: named_ports(output_names),
        };
        self.register_bus_ports(&id, &ports);
        self.buses.insert(
            id.clone(),
            VirtualBus {
                parent: parent_bus_id.to_string(),
                title: title.to_string(),
                ports,
            },
        );
        Ok(id)
    }

    fn list_bus_port(&mut self, bus_id: &str) -> Result<PortList, EngineError> {
        self.record(EngineCall::ListBusPort {
            bus_id: bus_id.to_string(),
        })?;
        self.buses
            .get(bus_id)
            .map(|bus| bus.ports.clone())
            .ok_or_else(|| EngineError::Rejected {
                operation: "list_bus_port",
                reason: format!("no bus {}", bus_id),
            })
    }

    fn add_module(&mut self, bus_id: &str, module: &ModuleSpec) -> Result<String, EngineError> {
        self.record(EngineCall::AddModule {
            bus_id: bus_id.to_string(),
            operation: module.operation(),
            params: module.params(),
        })?;

        if !bus_id.is_empty() && !self.buses.contains_key(bus_id) {
            return Err(EngineError::Rejected {
                operation: module.operation(),
                reason: format!("no bus {}", bus_id),
            });
        }

        let id = new_id();
        let (inputs, outputs) = module_port_names(module);
        let ports = PortList {
            inputs: inputs.iter().map(|name| PortInfo::new(new_id(), *name)).collect(),
            outputs: outputs.iter().map(|name| PortInfo::new(new_id(), *name)).collect(),
        };
        self.register_module_ports(bus_id, &id, &ports);
        self.modules.insert(
            id.clone(),
            VirtualModule {
                bus_id: bus_id.to_string(),
                spec: module.clone(),
                ports,
            },
        );
        Ok(id)
    }

    fn list_module_port(&mut self, module_id: &str) -> Result<PortList, EngineError> {
        self.record(EngineCall::ListModulePort {
            module_id: module_id.to_string(),
        })?;
        self.modules
            .get(module_id)
            .map(|module| module.ports.clone())
            .ok_or_else(|| EngineError::Rejected {
                operation: "list_module_port",
                reason: format!("no module {}", module_id),
            })
    }

    fn add_connection(&mut self, origin: &str, target: &str) -> Result<String, EngineError> {
        self.record(EngineCall::AddConnection {
            origin: origin.to_string(),
            target: target.to_string(),
        })?;

        if !self.sources.contains(origin) {
            return Err(EngineError::Rejected {
                operation: "add_connection",
                reason: format!("unknown origin port {}", origin),
            });
        }
        if !self.sinks.contains(target) {
            return Err(EngineError::Rejected {
                operation: "add_connection",
                reason: format!("unknown target port {}", target),
            });
        }

        let id = new_id();
        self.connections.push(VirtualConnection {
            id: id.clone(),
            origin: origin.to_string(),
            target: target.to_string(),
        });
        Ok(id)
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn named_ports(csv: &str) -> Vec<PortInfo> {
    csv.split(',')
        .filter(|name| !name.is_empty())
        .map(|name| PortInfo::new(new_id(), name))
        .collect()
}

/// Port names the server gives each module type.
pub fn module_port_names(module: &ModuleSpec) -> (&'static [&'static str], &'static [&'static str]) {
    match module {
        ModuleSpec::OscillatorSine { .. }
        | ModuleSpec::OscillatorTriangle { .. }
        | ModuleSpec::OscillatorClock { .. } => (&["frequency"], &["out"]),
        ModuleSpec::UtilsFloat { .. } => (&[], &["out"]),
        ModuleSpec::EnvelopeFollower { .. }
        | ModuleSpec::FilterBandpass { .. }
        | ModuleSpec::DelaySimple { .. } => (&["in"], &["out"]),
    }
}
