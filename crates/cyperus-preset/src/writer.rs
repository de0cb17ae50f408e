//! Produces and persists the compiled (annotated) document.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{ser::PrettyFormatter, Value};

use crate::arena::{GraphArena, LevelId, NodeKey};
use crate::bindings::{Bindings, NodeBinding};
use crate::document::{GraphDocument, PortSlot};
use crate::error::WriteError;

/// A copy of `document` with every engine-assigned id from `bindings`
/// written into it: `properties.id`, main `ids`, `bus_input_ids` /
/// `bus_output_ids`, module port ids, subgraph `bus_id`, and each link's
/// connection id. Nodes and links that were never bound are left as authored.
pub fn annotate(document: &GraphDocument, arena: &GraphArena, bindings: &Bindings) -> GraphDocument {
    let mut annotated = document.clone();
    overlay(&mut annotated, arena, 0, bindings);
    annotated
}

fn overlay(doc: &mut GraphDocument, arena: &GraphArena, level: LevelId, bindings: &Bindings) {
    if let Some(bus_id) = bindings.level_bus(level) {
        doc.bus_id = Some(bus_id.to_string());
    }

    for node in &mut doc.nodes {
        let key = NodeKey::new(level, node.id);
        let props = &mut node.properties;

        match bindings.node(key) {
            Some(NodeBinding::Mains { ids }) => {
                props.insert("ids".into(), string_array(ids));
            }
            Some(NodeBinding::Bus {
                bus_id,
                input_ids,
                output_ids,
            }) => {
                props.insert("id".into(), Value::String(bus_id.clone()));
                props.insert("bus_input_ids".into(), string_array(input_ids));
                props.insert("bus_output_ids".into(), string_array(output_ids));
            }
            Some(NodeBinding::BusPort { port_id, .. }) => {
                props.insert("id".into(), Value::String(port_id.clone()));
            }
            Some(NodeBinding::Module {
                module_id,
                input_ids,
                output_ids,
                ..
            }) => {
                props.insert("id".into(), Value::String(module_id.clone()));
                fill_port_ids(node.inputs.as_deref_mut(), input_ids);
                fill_port_ids(node.outputs.as_deref_mut(), output_ids);
            }
            None => {}
        }

        let child = arena.node(key).and_then(|n| n.child_level);
        if let (Some(child), Some(subgraph)) = (child, node.subgraph.as_deref_mut()) {
            overlay(subgraph, arena, child, bindings);
        }
    }

    for (index, link) in doc.links.iter_mut().enumerate() {
        if let Some(connection) = bindings.connection(level, index) {
            link.connection_id = Value::String(connection.to_string());
        }
    }
}

fn string_array(ids: &[String]) -> Value {
    Value::Array(ids.iter().cloned().map(Value::String).collect())
}

fn fill_port_ids(slots: Option<&mut [PortSlot]>, ids: &[Option<String>]) {
    for (slot, id) in slots.unwrap_or_default().iter_mut().zip(ids) {
        if let Some(id) = id {
            slot.id = Some(Value::String(id.clone()));
        }
    }
}

/// Serialize with the four-space indentation the editor writes.
pub fn to_string_indented(document: &GraphDocument) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    document.serialize(&mut serializer)?;
    // serde_json only ever emits UTF-8.
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Writes annotated documents to a fixed path.
#[derive(Debug, Clone)]
pub struct GraphWriter {
    path: PathBuf,
}

impl GraphWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, document: &GraphDocument) -> Result<(), WriteError> {
        let json = to_string_indented(document)?;
        let io_err = |source| WriteError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        // Atomic write: write to temp, then rename
        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, json).map_err(io_err)?;
        std::fs::rename(&temp_path, &self.path).map_err(io_err)?;

        Ok(())
    }
}
