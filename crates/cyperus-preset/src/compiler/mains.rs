use tracing::debug;

use super::Compiler;
use crate::bindings::NodeBinding;
use crate::engine::EngineControl;
use crate::error::{BindingError, CompileError, PortDirection};
use crate::kind::NodeKind;

impl<E: EngineControl> Compiler<'_, E> {
    /// Bind every main/inputs and main/outputs node, at any level, to the
    /// engine's physical ports by position.
    pub(super) fn bind_mains(&mut self) -> Result<(), CompileError> {
        debug!("list_main");
        let mains = self.engine.list_main()?;
        debug!(
            inputs = mains.inputs.len(),
            outputs = mains.outputs.len(),
            "engine main ports"
        );

        let arena = self.arena;
        for level in arena.levels() {
            for node in &level.nodes {
                let (slots, available, direction) = match node.kind {
                    NodeKind::MainInputs { slots } => (slots, &mains.inputs, PortDirection::Input),
                    NodeKind::MainOutputs { slots } => (slots, &mains.outputs, PortDirection::Output),
                    _ => continue,
                };

                if slots > available.len() {
                    return Err(BindingError::MainPortOutOfRange {
                        node: node.key,
                        direction,
                        index: slots - 1,
                        available: available.len(),
                    }
                    .into());
                }

                let ids = available[..slots].to_vec();
                self.bindings.bind(node.key, NodeBinding::Mains { ids })?;
            }
        }

        Ok(())
    }
}
