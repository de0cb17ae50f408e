//! Replays a preset graph against a live engine.
//!
//! Order of work:
//! 1. bind main ports ([`mains`])
//! 2. walk the root level in node order, creating buses and modules; each
//!    bus/add recurses into its subgraph before the next sibling ([`expand`],
//!    [`modules`])
//! 3. once a level's nodes (and everything beneath them) exist, connect that
//!    level's links in list order ([`links`])
//!
//! Engine-assigned ids land in [`Bindings`]; the arena is read-only.
//! A failure stops the run and leaves whatever the engine already built.

mod expand;
mod links;
mod mains;
mod modules;
mod report;

use std::collections::HashSet;

pub use report::{CompileReport, CompileWarning};

use crate::address::is_opaque_token;
use crate::arena::{GraphArena, NodeKey};
use crate::bindings::Bindings;
use crate::engine::EngineControl;
use crate::error::{CompileError, EngineError};

/// The result of a successful compile.
#[derive(Debug, Clone)]
pub struct Compilation {
    pub bindings: Bindings,
    pub report: CompileReport,
}

/// Compile `arena` into `engine`.
pub fn compile<E: EngineControl>(
    arena: &GraphArena,
    engine: &mut E,
) -> Result<Compilation, CompileError> {
    let mut compiler = Compiler {
        arena,
        engine,
        bindings: Bindings::new(),
        report: CompileReport::default(),
        skipped: HashSet::new(),
    };

    compiler.bind_mains()?;
    compiler.expand_level(0, "")?;

    Ok(Compilation {
        bindings: compiler.bindings,
        report: compiler.report,
    })
}

struct Compiler<'a, E> {
    arena: &'a GraphArena,
    engine: &'a mut E,
    bindings: Bindings,
    report: CompileReport,
    /// Unsupported nodes; links touching them are not attempted.
    skipped: HashSet<NodeKey>,
}

/// Engine ids end up inside addresses, so they must not contain separators.
fn opaque(operation: &'static str, id: String) -> Result<String, EngineError> {
    if is_opaque_token(&id) {
        Ok(id)
    } else {
        Err(EngineError::MalformedId { operation, id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::NodeBinding;
    use crate::document::GraphDocument;
    use crate::engine::{MainPorts, PortInfo, PortList};
    use crate::error::{BindingError, ConsistencyError, PortDirection};
    use crate::kind::ModuleSpec;
    use crate::virtual_engine::{EngineCall, VirtualEngine};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn arena(value: serde_json::Value) -> GraphArena {
        let doc: GraphDocument = serde_json::from_value(value).unwrap();
        GraphArena::build(&doc).unwrap()
    }

    #[test]
    fn mains_bind_by_position() {
        let a = arena(json!({
            "nodes": [
                {"id": 1, "type": "main/inputs", "properties": {"ids": [null, null]}},
                {"id": 2, "type": "main/outputs", "properties": {"ids": [null]}}
            ],
            "links": []
        }));
        let mut engine = VirtualEngine::new(4, 4);
        let compiled = compile(&a, &mut engine).unwrap();

        let mains = engine.mains().clone();
        assert_eq!(
            compiled.bindings.node(NodeKey::new(0, 1)),
            Some(&NodeBinding::Mains {
                ids: mains.inputs[..2].to_vec()
            })
        );
        assert_eq!(
            compiled.bindings.node(NodeKey::new(0, 2)),
            Some(&NodeBinding::Mains {
                ids: mains.outputs[..1].to_vec()
            })
        );
    }

    #[test]
    fn too_many_main_ports_is_a_binding_error() {
        let a = arena(json!({
            "nodes": [{"id": 1, "type": "main/outputs", "properties": {"ids": [null, null, null]}}],
            "links": []
        }));
        let mut engine = VirtualEngine::new(2, 2);
        let err = compile(&a, &mut engine).unwrap_err();

        match err {
            CompileError::Binding(BindingError::MainPortOutOfRange {
                direction,
                index,
                available,
                ..
            }) => {
                assert_eq!(direction, PortDirection::Output);
                assert_eq!((index, available), (2, 2));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        // Nothing is created once binding fails.
        assert_eq!(engine.calls(), &[EngineCall::ListMain]);
    }

    #[test]
    fn unsupported_nodes_and_their_links_are_skipped() {
        let a = arena(json!({
            "nodes": [
                {"id": 1, "type": "main/inputs", "properties": {"ids": [null]}},
                {"id": 2, "type": "reverb/unknown", "properties": {}},
                {"id": 3, "type": "main/outputs", "properties": {"ids": [null]}}
            ],
            "links": [
                [1, 1, 0, 2, 0, "audio", null],
                [2, 1, 0, 3, 0, "audio", null]
            ]
        }));
        let mut engine = VirtualEngine::new(1, 1);
        let compiled = compile(&a, &mut engine).unwrap();

        assert_eq!(compiled.report.connections, 1);
        assert_eq!(
            compiled.report.warnings,
            vec![
                CompileWarning::UnsupportedNode {
                    node: NodeKey::new(0, 2),
                    tag: "reverb/unknown".to_string()
                },
                CompileWarning::SkippedLink {
                    level: 0,
                    link: 1,
                    node: NodeKey::new(0, 2)
                },
            ]
        );
        assert_eq!(compiled.bindings.connection(0, 0), None);
        assert!(compiled.bindings.connection(0, 1).is_some());
    }

    #[test]
    fn links_from_unbound_nodes_fail_before_connecting() {
        // A root-level bus/input has no enclosing bus to give it an id.
        let a = arena(json!({
            "nodes": [
                {"id": 1, "type": "cyperus/bus/input", "properties": {"name": "in"}},
                {"id": 2, "type": "main/outputs", "properties": {"ids": [null]}}
            ],
            "links": [[1, 1, 0, 2, 0, "audio", null]]
        }));
        let mut engine = VirtualEngine::new(0, 1);
        let err = compile(&a, &mut engine).unwrap_err();

        match err {
            CompileError::Consistency(ConsistencyError::UnresolvedNode { level, link, node }) => {
                assert_eq!((level, link), (0, 1));
                assert_eq!(node, NodeKey::new(0, 1));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!engine
            .calls()
            .iter()
            .any(|call| matches!(call, EngineCall::AddConnection { .. })));
    }

    /// Reports ports whose names differ from what the document declares.
    struct RenamingEngine(VirtualEngine);

    impl EngineControl for RenamingEngine {
        fn list_main(&mut self) -> Result<MainPorts, EngineError> {
            self.0.list_main()
        }

        fn add_bus(&mut self, p: &str, t: &str, i: &str, o: &str) -> Result<String, EngineError> {
            self.0.add_bus(p, t, i, o)
        }

        fn list_bus_port(&mut self, bus_id: &str) -> Result<PortList, EngineError> {
            self.0.list_bus_port(bus_id)
        }

        fn add_module(&mut self, bus_id: &str, module: &ModuleSpec) -> Result<String, EngineError> {
            self.0.add_module(bus_id, module)
        }

        fn list_module_port(&mut self, module_id: &str) -> Result<PortList, EngineError> {
            let mut ports = self.0.list_module_port(module_id)?;
            for port in &mut ports.inputs {
                port.name = format!("{}_renamed", port.name);
            }
            Ok(ports)
        }

        fn add_connection(&mut self, origin: &str, target: &str) -> Result<String, EngineError> {
            self.0.add_connection(origin, target)
        }
    }

    #[test]
    fn unmatched_module_ports_warn_then_fail_when_linked() {
        let sine = json!({
            "id": 2,
            "type": "oscillator/sine",
            "properties": {"frequency": 1, "amplitude": 1, "phase": 0},
            "inputs": [{"name": "frequency"}],
            "outputs": [{"name": "out"}]
        });

        let a = arena(json!({"nodes": [sine.clone()], "links": []}));
        let mut engine = RenamingEngine(VirtualEngine::new(0, 0));
        let compiled = compile(&a, &mut engine).unwrap();
        assert_eq!(
            compiled.report.warnings,
            vec![CompileWarning::UnmatchedPort {
                node: NodeKey::new(0, 2),
                direction: PortDirection::Input,
                name: "frequency".to_string()
            }]
        );

        let a = arena(json!({
            "nodes": [
                {"id": 1, "type": "main/inputs", "properties": {"ids": [null]}},
                sine
            ],
            "links": [[1, 1, 0, 2, 0, "audio", null]]
        }));
        let mut engine = RenamingEngine(VirtualEngine::new(1, 0));
        let err = compile(&a, &mut engine).unwrap_err();
        assert!(matches!(
            err,
            CompileError::Consistency(ConsistencyError::UnresolvedPort {
                direction: PortDirection::Input,
                slot: 0,
                ..
            })
        ));
    }

    /// Returns ids that cannot be embedded in an address.
    struct ColonEngine;

    impl EngineControl for ColonEngine {
        fn list_main(&mut self) -> Result<MainPorts, EngineError> {
            Ok(MainPorts::default())
        }

        fn add_bus(&mut self, _: &str, _: &str, _: &str, _: &str) -> Result<String, EngineError> {
            Ok("bus:1".to_string())
        }

        fn list_bus_port(&mut self, _: &str) -> Result<PortList, EngineError> {
            Ok(PortList::default())
        }

        fn add_module(&mut self, _: &str, _: &ModuleSpec) -> Result<String, EngineError> {
            Ok("module".to_string())
        }

        fn list_module_port(&mut self, _: &str) -> Result<PortList, EngineError> {
            Ok(PortList {
                inputs: vec![],
                outputs: vec![PortInfo::new("out>1", "out")],
            })
        }

        fn add_connection(&mut self, _: &str, _: &str) -> Result<String, EngineError> {
            Ok("c".to_string())
        }
    }

    #[test]
    fn ids_with_separators_are_rejected() {
        let a = arena(json!({
            "nodes": [{
                "id": 1,
                "type": "cyperus/bus/add",
                "title": "main0",
                "properties": {},
                "subgraph": {"nodes": [], "links": []}
            }],
            "links": []
        }));
        let err = compile(&a, &mut ColonEngine).unwrap_err();
        assert!(matches!(
            err,
            CompileError::Engine(EngineError::MalformedId { operation: "add_bus", .. })
        ));

        let a = arena(json!({
            "nodes": [{"id": 1, "type": "utils/float", "properties": {"value": 1}, "outputs": [{"name": "out"}]}],
            "links": []
        }));
        let err = compile(&a, &mut ColonEngine).unwrap_err();
        assert!(matches!(
            err,
            CompileError::Engine(EngineError::MalformedId { operation: "list_module_port", .. })
        ));
    }
}
