//! Serialized preset documents, as written by the graph editor.
//!
//! Only the fields the compiler reads are typed; everything else (layout,
//! groups, editor config, extra link elements) is carried through verbatim
//! so a compiled preset can be reopened in the editor.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One graph level: the root document or a bus's nested subgraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<Node>,

    pub links: Vec<Link>,

    /// Engine id of the bus that owns this subgraph. Filled in on compile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bus_id: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique within the enclosing level only.
    pub id: i64,

    #[serde(rename = "type")]
    pub node_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default)]
    pub properties: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subgraph: Option<Box<GraphDocument>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<PortSlot>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<PortSlot>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Node {
    pub fn input_names(&self) -> Vec<String> {
        slot_names(self.inputs.as_deref())
    }

    pub fn output_names(&self) -> Vec<String> {
        slot_names(self.outputs.as_deref())
    }
}

fn slot_names(slots: Option<&[PortSlot]>) -> Vec<String> {
    slots
        .unwrap_or_default()
        .iter()
        .map(|slot| slot.name.clone())
        .collect()
}

/// A named input or output on a module node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortSlot {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A connection between two nodes of the same level.
///
/// Serialized as the editor's positional tuple
/// `[id, origin_id, origin_slot, target_id, target_slot, type, connection_id]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Value>", into = "Vec<Value>")]
pub struct Link {
    pub id: i64,
    pub origin_id: i64,
    pub origin_slot: usize,
    pub target_id: i64,
    pub target_slot: usize,
    pub type_tag: Value,
    /// Placeholder until compiled, then the engine's connection id.
    pub connection_id: Value,
    /// Trailing tuple elements beyond the seventh.
    pub trailing: Vec<Value>,
}

pub const LINK_FIELDS: usize = 7;

impl TryFrom<Vec<Value>> for Link {
    type Error = String;

    fn try_from(mut fields: Vec<Value>) -> Result<Self, Self::Error> {
        if fields.len() < LINK_FIELDS {
            return Err(format!(
                "link tuple has {} fields, expected {}",
                fields.len(),
                LINK_FIELDS
            ));
        }

        let trailing = fields.split_off(LINK_FIELDS);
        let id = int_field(&fields[0], "id")?;
        let origin_id = int_field(&fields[1], "origin_id")?;
        let origin_slot = slot_field(&fields[2], "origin_slot")?;
        let target_id = int_field(&fields[3], "target_id")?;
        let target_slot = slot_field(&fields[4], "target_slot")?;

        let mut rest = fields.into_iter().skip(5);
        let type_tag = rest.next().unwrap_or(Value::Null);
        let connection_id = rest.next().unwrap_or(Value::Null);

        Ok(Link {
            id,
            origin_id,
            origin_slot,
            target_id,
            target_slot,
            type_tag,
            connection_id,
            trailing,
        })
    }
}

impl From<Link> for Vec<Value> {
    fn from(link: Link) -> Self {
        let mut fields = vec![
            Value::from(link.id),
            Value::from(link.origin_id),
            Value::from(link.origin_slot),
            Value::from(link.target_id),
            Value::from(link.target_slot),
            link.type_tag,
            link.connection_id,
        ];
        fields.extend(link.trailing);
        fields
    }
}

fn int_field(value: &Value, name: &str) -> Result<i64, String> {
    value
        .as_i64()
        .ok_or_else(|| format!("link field `{}` must be an integer, got {}", name, value))
}

fn slot_field(value: &Value, name: &str) -> Result<usize, String> {
    value
        .as_u64()
        .map(|v| v as usize)
        .ok_or_else(|| format!("link field `{}` must be a slot index, got {}", name, value))
}
