use tracing::{debug, info, warn};

use super::{opaque, CompileWarning, Compiler};
use crate::arena::{ArenaNode, NodeKey};
use crate::bindings::NodeBinding;
use crate::engine::{EngineControl, PortInfo};
use crate::error::{CompileError, PortDirection};
use crate::kind::ModuleSpec;

impl<E: EngineControl> Compiler<'_, E> {
    pub(super) fn create_module(
        &mut self,
        node: &ArenaNode,
        spec: &ModuleSpec,
        bus_id: &str,
    ) -> Result<(), CompileError> {
        let operation = spec.operation();
        debug!(bus = bus_id, operation, params = ?spec.params(), "add_module");
        let module_id = opaque(operation, self.engine.add_module(bus_id, spec)?)?;

        debug!(module = %module_id, "list_module_port");
        let ports = self.engine.list_module_port(&module_id)?;
        for port in ports.inputs.iter().chain(&ports.outputs) {
            opaque("list_module_port", port.id.clone())?;
        }

        let input_ids =
            self.match_ports(node.key, PortDirection::Input, &node.input_names, &ports.inputs);
        let output_ids =
            self.match_ports(node.key, PortDirection::Output, &node.output_names, &ports.outputs);

        info!(
            node = %node.key,
            module = %module_id,
            bus = bus_id,
            kind = spec.tag(),
            "created module"
        );
        self.bindings.bind(
            node.key,
            NodeBinding::Module {
                bus_id: bus_id.to_string(),
                module_id,
                input_ids,
                output_ids,
            },
        )?;
        self.report.modules += 1;

        Ok(())
    }

    /// Engine port order is not guaranteed, so declared ports match by name.
    fn match_ports(
        &mut self,
        node: NodeKey,
        direction: PortDirection,
        declared: &[String],
        reported: &[PortInfo],
    ) -> Vec<Option<String>> {
        declared
            .iter()
            .map(|name| {
                let found = reported.iter().find(|port| &port.name == name);
                if found.is_none() {
                    warn!(
                        node = %node,
                        %direction,
                        port = %name,
                        "engine reported no port with this name"
                    );
                    self.report.warnings.push(CompileWarning::UnmatchedPort {
                        node,
                        direction,
                        name: name.clone(),
                    });
                }
                found.map(|port| port.id.clone())
            })
            .collect()
    }
}
