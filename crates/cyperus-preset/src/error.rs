//! Error types for loading and compiling presets.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::arena::{LevelId, NodeKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDirection {
    Input,
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => f.write_str("input"),
            PortDirection::Output => f.write_str("output"),
        }
    }
}

/// Which end of a link a node sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointRole {
    Origin,
    Target,
}

impl fmt::Display for EndpointRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointRole::Origin => f.write_str("origin"),
            EndpointRole::Target => f.write_str("target"),
        }
    }
}

/// The preset could not be turned into a graph. Nothing was sent to the engine.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read preset {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed preset document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("node {node} ({node_type}) at level {level} is missing required field `{field}`")]
    MissingField {
        level: LevelId,
        node: i64,
        node_type: String,
        field: &'static str,
    },

    #[error("node {node} at level {level}: property `{property}` must be numeric, got {value}")]
    InvalidNumber {
        level: LevelId,
        node: i64,
        property: &'static str,
        value: String,
    },

    #[error("duplicate node id {node} at level {level}")]
    DuplicateNodeId { level: LevelId, node: i64 },

    #[error("bus node {node} at level {level} has two bus {direction} ports named {name:?}")]
    DuplicatePortName {
        level: LevelId,
        node: i64,
        direction: PortDirection,
        name: String,
    },

    /// Bus port names travel to the engine as one comma-separated list.
    #[error("bus node {node} at level {level}: bus {direction} port name {name:?} is empty or contains ','")]
    InvalidPortName {
        level: LevelId,
        node: i64,
        direction: PortDirection,
        name: String,
    },

    #[error("link {link} at level {level} references unknown node {node}")]
    UnknownLinkEndpoint { level: LevelId, link: i64, node: i64 },

    #[error("link {link} at level {level} cannot use {node_type} node {node} as its {role}")]
    InvalidLinkEndpoint {
        level: LevelId,
        link: i64,
        node: i64,
        node_type: String,
        role: EndpointRole,
    },

    #[error("link {link} at level {level}: slot {slot} is out of range for node {node} ({available} available)")]
    SlotOutOfRange {
        level: LevelId,
        link: i64,
        node: i64,
        slot: usize,
        available: usize,
    },
}

/// The document asks for main ports the engine does not have.
#[derive(Debug, Error)]
pub enum BindingError {
    #[error("{node} references main {direction} {index} but the engine exposes {available}")]
    MainPortOutOfRange {
        node: NodeKey,
        direction: PortDirection,
        index: usize,
        available: usize,
    },
}

/// A request to the engine failed or returned something unusable.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{operation} rejected: {reason}")]
    Rejected {
        operation: &'static str,
        reason: String,
    },

    #[error("{operation} returned id {id:?} containing a reserved address separator")]
    MalformedId { operation: &'static str, id: String },

    #[error("{operation} returned {returned} {direction} ports for bus {bus}, expected {expected}")]
    PortCountMismatch {
        operation: &'static str,
        bus: String,
        direction: PortDirection,
        expected: usize,
        returned: usize,
    },
}

/// Compilation reached a state the expansion order should make impossible.
#[derive(Debug, Error)]
pub enum ConsistencyError {
    #[error("link {link} at level {level} references {node}, which has no engine id")]
    UnresolvedNode {
        level: LevelId,
        link: i64,
        node: NodeKey,
    },

    #[error("link {link} at level {level}: {direction} slot {slot} of {node} has no engine port")]
    UnresolvedPort {
        level: LevelId,
        link: i64,
        node: NodeKey,
        direction: PortDirection,
        slot: usize,
    },

    #[error("link {link} at level {level} cannot be addressed through {node}")]
    UnaddressableEndpoint {
        level: LevelId,
        link: i64,
        node: NodeKey,
    },

    #[error("{0} was assigned an engine id twice")]
    AlreadyBound(NodeKey),

    #[error("link {link} at level {level} was connected twice")]
    ConnectionAlreadyBound { level: LevelId, link: i64 },
}

/// Any fatal outcome of compiling a preset.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Consistency(#[from] ConsistencyError),
}

/// Failure persisting an annotated document.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to serialize preset: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write preset {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}
