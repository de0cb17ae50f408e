//! Compiles editor preset graphs into live cyperus engine routing.
//!
//! A preset is a nested node graph: buses contain subgraphs, which contain
//! modules, pass-through ports and further buses. [`Preset`] loads and
//! validates one, [`Preset::compile`] replays it against an
//! [`EngineControl`] implementation, and [`GraphWriter`] persists the result
//! with every engine-assigned id filled in.
//!
//! ```no_run
//! use cyperus_preset::{GraphWriter, Preset, VirtualEngine};
//!
//! let preset = Preset::load("presets/four_sines.json")?;
//! let mut engine = VirtualEngine::new(4, 4);
//! let compiled = preset.compile(&mut engine)?;
//! let annotated = preset.annotate(&compiled);
//! GraphWriter::new("preset_active/four_sines.json").write(&annotated)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod address;
pub mod arena;
pub mod bindings;
pub mod compiler;
pub mod document;
pub mod engine;
pub mod error;
pub mod kind;
pub mod virtual_engine;
pub mod writer;

use std::path::Path;

pub use address::PortAddress;
pub use arena::{GraphArena, LevelId, NodeKey};
pub use bindings::{Bindings, NodeBinding};
pub use compiler::{compile, Compilation, CompileReport, CompileWarning};
pub use document::{GraphDocument, Link, Node, PortSlot};
pub use engine::{EngineControl, MainPorts, PortInfo, PortList};
pub use error::{
    BindingError, CompileError, ConsistencyError, EngineError, ParseError, PortDirection,
    WriteError,
};
pub use kind::{ModuleSpec, NodeKind};
pub use virtual_engine::VirtualEngine;
pub use writer::{annotate, GraphWriter};

/// A loaded, validated preset.
#[derive(Debug, Clone)]
pub struct Preset {
    document: GraphDocument,
    arena: GraphArena,
}

impl Preset {
    pub fn from_document(document: GraphDocument) -> Result<Self, ParseError> {
        let arena = GraphArena::build(&document)?;
        Ok(Self { document, arena })
    }

    pub fn from_json(json: &str) -> Result<Self, ParseError> {
        Self::from_document(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ParseError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// The document as authored.
    pub fn document(&self) -> &GraphDocument {
        &self.document
    }

    pub fn arena(&self) -> &GraphArena {
        &self.arena
    }

    pub fn compile<E: EngineControl>(&self, engine: &mut E) -> Result<Compilation, CompileError> {
        compile(&self.arena, engine)
    }

    /// The authored document with `compilation`'s ids written in.
    pub fn annotate(&self, compilation: &Compilation) -> GraphDocument {
        annotate(&self.document, &self.arena, &compilation.bindings)
    }
}
