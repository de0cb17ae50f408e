use tracing::{debug, warn};

use super::{CompileWarning, Compiler};
use crate::address::PortAddress;
use crate::arena::{ArenaLink, LevelId};
use crate::bindings::NodeBinding;
use crate::engine::EngineControl;
use crate::error::{CompileError, ConsistencyError, EndpointRole, PortDirection};
use crate::kind::NodeKind;

impl<E: EngineControl> Compiler<'_, E> {
    /// Connect a level's links in list order.
    pub(super) fn translate_links(&mut self, level: LevelId) -> Result<(), CompileError> {
        let arena = self.arena;

        for link in &arena.level(level).links {
            let skipped = [link.origin, link.target]
                .into_iter()
                .find(|key| self.skipped.contains(key));
            if let Some(node) = skipped {
                warn!(
                    link = link.id,
                    level,
                    node = %node,
                    "link touches a skipped node, not connecting"
                );
                self.report.warnings.push(CompileWarning::SkippedLink {
                    level,
                    link: link.id,
                    node,
                });
                continue;
            }

            let origin = self.resolve(level, link, EndpointRole::Origin)?.to_string();
            let target = self.resolve(level, link, EndpointRole::Target)?.to_string();

            debug!(link = link.id, level, %origin, %target, "add_connection");
            let connection = self.engine.add_connection(&origin, &target)?;
            self.bindings.bind_connection(level, link.index, link.id, connection)?;
            self.report.connections += 1;
        }

        Ok(())
    }

    /// Build the address of one end of `link` from the side table.
    fn resolve(
        &self,
        level: LevelId,
        link: &ArenaLink,
        role: EndpointRole,
    ) -> Result<PortAddress, ConsistencyError> {
        let (key, slot) = match role {
            EndpointRole::Origin => (link.origin, link.origin_slot),
            EndpointRole::Target => (link.target, link.target_slot),
        };
        let direction = match role {
            EndpointRole::Origin => PortDirection::Output,
            EndpointRole::Target => PortDirection::Input,
        };

        let unresolved = || ConsistencyError::UnresolvedNode {
            level,
            link: link.id,
            node: key,
        };
        let unresolved_port = || ConsistencyError::UnresolvedPort {
            level,
            link: link.id,
            node: key,
            direction,
            slot,
        };
        let unaddressable = || ConsistencyError::UnaddressableEndpoint {
            level,
            link: link.id,
            node: key,
        };

        let node = self.arena.node(key).ok_or_else(unresolved)?;
        let binding = self.bindings.node(key).ok_or_else(unresolved)?;

        match (&node.kind, binding, role) {
            (NodeKind::MainInputs { .. }, NodeBinding::Mains { ids }, EndpointRole::Origin)
            | (NodeKind::MainOutputs { .. }, NodeBinding::Mains { ids }, EndpointRole::Target) => ids
                .get(slot)
                .map(|id| PortAddress::main(id.clone()))
                .ok_or_else(unresolved_port),
            (
                NodeKind::BusAdd { .. },
                NodeBinding::Bus {
                    bus_id,
                    input_ids,
                    output_ids,
                },
                _,
            ) => {
                let ids = match role {
                    EndpointRole::Origin => output_ids,
                    EndpointRole::Target => input_ids,
                };
                ids.get(slot)
                    .map(|port| PortAddress::bus(bus_id.clone(), port.clone()))
                    .ok_or_else(unresolved_port)
            }
            (NodeKind::BusInput { .. }, NodeBinding::BusPort { bus_id, port_id }, EndpointRole::Origin)
            | (NodeKind::BusOutput { .. }, NodeBinding::BusPort { bus_id, port_id }, EndpointRole::Target) => {
                Ok(PortAddress::bus(bus_id.clone(), port_id.clone()))
            }
            (
                NodeKind::Module(_),
                NodeBinding::Module {
                    bus_id,
                    module_id,
                    input_ids,
                    output_ids,
                },
                _,
            ) => match role {
                EndpointRole::Origin => output_ids
                    .get(slot)
                    .and_then(Option::as_ref)
                    .map(|port| PortAddress::module_output(bus_id, module_id, port.clone()))
                    .ok_or_else(unresolved_port),
                EndpointRole::Target => input_ids
                    .get(slot)
                    .and_then(Option::as_ref)
                    .map(|port| PortAddress::module_input(bus_id, module_id, port.clone()))
                    .ok_or_else(unresolved_port),
            },
            _ => Err(unaddressable()),
        }
    }
}
