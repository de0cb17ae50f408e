use tracing::{debug, info, warn};

use super::{opaque, CompileWarning, Compiler};
use crate::arena::{ArenaNode, LevelId, NodeKey};
use crate::bindings::NodeBinding;
use crate::engine::{EngineControl, PortInfo};
use crate::error::{CompileError, EngineError, PortDirection};
use crate::kind::NodeKind;

impl<E: EngineControl> Compiler<'_, E> {
    /// Create every node of `level` in document order, recursing fully into
    /// each bus before moving on, then connect the level's links.
    pub(super) fn expand_level(&mut self, level: LevelId, bus_id: &str) -> Result<(), CompileError> {
        let arena = self.arena;
        let current = arena.level(level);
        self.report.max_depth = self.report.max_depth.max(current.depth);

        for node in &current.nodes {
            match &node.kind {
                // Bound up front, or by the enclosing bus/add.
                NodeKind::MainInputs { .. }
                | NodeKind::MainOutputs { .. }
                | NodeKind::BusInput { .. }
                | NodeKind::BusOutput { .. } => {}
                NodeKind::BusAdd { title } => {
                    let child_bus = self.create_bus(node, title, bus_id)?;
                    if let Some(child) = node.child_level {
                        self.expand_level(child, &child_bus)?;
                    }
                }
                NodeKind::Module(spec) => self.create_module(node, spec, bus_id)?,
                NodeKind::Unsupported { tag } => {
                    warn!(node = %node.key, tag = %tag, "unsupported node type, skipping");
                    self.skipped.insert(node.key);
                    self.report.warnings.push(CompileWarning::UnsupportedNode {
                        node: node.key,
                        tag: tag.clone(),
                    });
                }
            }
        }

        self.translate_links(level)
    }

    /// Create a bus for a bus/add node and bind its ports, plus the
    /// bus/input and bus/output nodes of its subgraph, by position.
    fn create_bus(
        &mut self,
        node: &ArenaNode,
        title: &str,
        parent_bus_id: &str,
    ) -> Result<String, CompileError> {
        let arena = self.arena;
        let child = node.child_level.map(|c| arena.level(c));
        let (input_names, output_names) = match child {
            Some(level) => (
                level.bus_port_names(PortDirection::Input).join(","),
                level.bus_port_names(PortDirection::Output).join(","),
            ),
            None => (String::new(), String::new()),
        };

        debug!(
            parent = parent_bus_id,
            title,
            inputs = %input_names,
            outputs = %output_names,
            "add_bus"
        );
        let bus_id = self
            .engine
            .add_bus(parent_bus_id, title, &input_names, &output_names)?;
        let bus_id = opaque("add_bus", bus_id)?;

        debug!(bus = %bus_id, "list_bus_port");
        let ports = self.engine.list_bus_port(&bus_id)?;
        let expected_inputs = child.map_or(0, |c| c.bus_inputs.len());
        let expected_outputs = child.map_or(0, |c| c.bus_outputs.len());
        let input_ids = port_ids(&bus_id, PortDirection::Input, &ports.inputs, expected_inputs)?;
        let output_ids = port_ids(&bus_id, PortDirection::Output, &ports.outputs, expected_outputs)?;

        if let Some(level) = child {
            for (local_id, port_id) in level.bus_inputs.iter().zip(&input_ids) {
                self.bindings.bind(
                    NodeKey::new(level.id, *local_id),
                    NodeBinding::BusPort {
                        bus_id: bus_id.clone(),
                        port_id: port_id.clone(),
                    },
                )?;
            }
            for (local_id, port_id) in level.bus_outputs.iter().zip(&output_ids) {
                self.bindings.bind(
                    NodeKey::new(level.id, *local_id),
                    NodeBinding::BusPort {
                        bus_id: bus_id.clone(),
                        port_id: port_id.clone(),
                    },
                )?;
            }
            self.bindings.bind_level_bus(level.id, bus_id.clone());
        }

        info!(
            node = %node.key,
            bus = %bus_id,
            parent = parent_bus_id,
            title,
            inputs = input_ids.len(),
            outputs = output_ids.len(),
            "created bus"
        );
        self.bindings.bind(
            node.key,
            NodeBinding::Bus {
                bus_id: bus_id.clone(),
                input_ids,
                output_ids,
            },
        )?;
        self.report.buses += 1;

        Ok(bus_id)
    }
}

/// Bus ports pair with pass-through nodes by position, so the engine must
/// return exactly as many as were requested.
fn port_ids(
    bus_id: &str,
    direction: PortDirection,
    ports: &[PortInfo],
    expected: usize,
) -> Result<Vec<String>, EngineError> {
    if ports.len() != expected {
        return Err(EngineError::PortCountMismatch {
            operation: "list_bus_port",
            bus: bus_id.to_string(),
            direction,
            expected,
            returned: ports.len(),
        });
    }
    ports
        .iter()
        .map(|port| opaque("list_bus_port", port.id.clone()))
        .collect()
}
