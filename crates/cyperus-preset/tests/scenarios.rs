use cyperus_preset::virtual_engine::EngineCall;
use cyperus_preset::{
    CompileError, CompileWarning, EngineControl, EngineError, GraphWriter, MainPorts, ModuleSpec,
    NodeKey, ParseError, PortList, Preset, VirtualEngine,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;

const MAIN0_SINE: &str = include_str!("fixtures/main0_sine.json");

fn preset(value: Value) -> Preset {
    Preset::from_json(&value.to_string()).unwrap()
}

fn connections(engine: &VirtualEngine) -> Vec<(String, String)> {
    engine
        .calls()
        .iter()
        .filter_map(|call| match call {
            EngineCall::AddConnection { origin, target } => Some((origin.clone(), target.clone())),
            _ => None,
        })
        .collect()
}

fn only_key<V>(map: &std::collections::BTreeMap<String, V>) -> String {
    assert_eq!(map.len(), 1);
    map.keys().next().unwrap().clone()
}

#[test]
fn main0_sine_compiles_in_order() {
    let preset = Preset::from_json(MAIN0_SINE).unwrap();
    let mut engine = VirtualEngine::new(4, 4);
    let compiled = preset.compile(&mut engine).unwrap();

    let bus = only_key(engine.buses());
    let module = only_key(engine.modules());
    let bus_ports = engine.buses()[&bus].ports.clone();
    let module_ports = engine.modules()[&module].ports.clone();
    let main_in = engine.mains().inputs[0].clone();
    let main_out = engine.mains().outputs[0].clone();
    let bus_in = &bus_ports.inputs[0].id;
    let bus_out = &bus_ports.outputs[0].id;
    let mod_in = &module_ports.inputs[0].id;
    let mod_out = &module_ports.outputs[0].id;

    let setup: Vec<_> = engine.calls()[..5].to_vec();
    assert_eq!(
        setup,
        vec![
            EngineCall::ListMain,
            EngineCall::AddBus {
                parent: String::new(),
                title: "main0".to_string(),
                inputs: "in".to_string(),
                outputs: "out".to_string(),
            },
            EngineCall::ListBusPort { bus_id: bus.clone() },
            EngineCall::AddModule {
                bus_id: bus.clone(),
                operation: "add_modules_oscillator_sine",
                params: vec![("frequency", 440.0), ("amplitude", 1.0), ("phase", 0.0)],
            },
            EngineCall::ListModulePort {
                module_id: module.clone()
            },
        ]
    );

    // The bus's own links are connected before the root's.
    assert_eq!(
        connections(&engine),
        vec![
            (format!("/{}:{}", bus, bus_in), format!("/{}?{}<{}", bus, module, mod_in)),
            (format!("/{}?{}>{}", bus, module, mod_out), format!("/{}:{}", bus, bus_out)),
            (main_in.clone(), format!("/{}:{}", bus, bus_in)),
            (format!("/{}:{}", bus, bus_out), main_out.clone()),
        ]
    );

    let report = &compiled.report;
    assert_eq!((report.buses, report.modules, report.connections), (1, 1, 4));
    assert_eq!(report.max_depth, 1);
    assert!(report.is_clean());

    let out = serde_json::to_value(preset.annotate(&compiled)).unwrap();
    assert_eq!(out["nodes"][0]["properties"]["ids"], json!([main_in]));
    assert_eq!(out["nodes"][1]["properties"]["ids"], json!([main_out]));

    let bus_node = &out["nodes"][2];
    assert_eq!(bus_node["properties"]["id"], json!(bus));
    assert_eq!(bus_node["properties"]["bus_input_ids"], json!([bus_in]));
    assert_eq!(bus_node["properties"]["bus_output_ids"], json!([bus_out]));
    assert_eq!(bus_node["subgraph"]["bus_id"], json!(bus));

    let inner = &bus_node["subgraph"]["nodes"];
    assert_eq!(inner[0]["properties"]["id"], json!(bus_in));
    assert_eq!(inner[1]["properties"]["id"], json!(bus_out));
    assert_eq!(inner[2]["properties"]["id"], json!(module));
    assert_eq!(inner[2]["inputs"][0]["id"], json!(mod_in));
    assert_eq!(inner[2]["outputs"][0]["id"], json!(mod_out));

    let ids: Vec<&str> = engine.connections().iter().map(|c| c.id.as_str()).collect();
    assert_eq!(bus_node["subgraph"]["links"][0][6], json!(ids[0]));
    assert_eq!(bus_node["subgraph"]["links"][1][6], json!(ids[1]));
    assert_eq!(out["links"][0][6], json!(ids[2]));
    assert_eq!(out["links"][1][6], json!(ids[3]));

    // Editor fields survive.
    assert_eq!(out["version"], json!(0.4));
    assert_eq!(out["nodes"][2]["pos"], json!([300, 120]));
}

#[test]
fn compiling_leaves_the_authored_document_untouched() {
    let preset = Preset::from_json(MAIN0_SINE).unwrap();
    let before = preset.document().clone();
    preset.compile(&mut VirtualEngine::new(1, 1)).unwrap();
    assert_eq!(preset.document(), &before);
}

#[test]
fn unknown_module_is_skipped_and_everything_else_wires() {
    let preset = preset(json!({
        "nodes": [
            {"id": 1, "type": "cyperus/main/inputs", "properties": {"ids": [null]}},
            {"id": 2, "type": "reverb/unknown", "properties": {"size": 0.9},
             "inputs": [{"name": "in"}], "outputs": [{"name": "out"}]},
            {"id": 3, "type": "envelope/follower",
             "properties": {"attack": 0.1, "decay": 0.2, "scale": 1.0},
             "inputs": [{"name": "in"}], "outputs": [{"name": "out"}]},
            {"id": 4, "type": "cyperus/main/outputs", "properties": {"ids": [null]}}
        ],
        "links": [
            [1, 1, 0, 2, 0, "audio", null],
            [2, 2, 0, 4, 0, "audio", null],
            [3, 1, 0, 3, 0, "audio", null],
            [4, 3, 0, 4, 0, "audio", null]
        ]
    }));
    let mut engine = VirtualEngine::new(1, 1);
    let compiled = preset.compile(&mut engine).unwrap();

    assert_eq!(compiled.report.modules, 1);
    assert_eq!(compiled.report.connections, 2);
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
            CompileWarning::SkippedLink {
                level: 0,
                link: 2,
                node: NodeKey::new(0, 2)
            },
        ]
    );

    let out = serde_json::to_value(preset.annotate(&compiled)).unwrap();
    assert_eq!(out["links"][0][6], Value::Null);
    assert_eq!(out["links"][1][6], Value::Null);
    assert!(out["links"][2][6].is_string());
    assert!(out["links"][3][6].is_string());
    assert_eq!(out["nodes"][1]["properties"], json!({"size": 0.9}));
}

#[test]
fn nested_bus_is_created_under_its_parent() {
    let preset = preset(json!({
        "nodes": [{
            "id": 1,
            "type": "cyperus/bus/add",
            "title": "outer",
            "properties": {},
            "subgraph": {
                "nodes": [
                    {"id": 1, "type": "cyperus/bus/input", "properties": {"name": "left"}},
                    {"id": 2, "type": "cyperus/bus/input", "properties": {"name": "right"}},
                    {
                        "id": 3,
                        "type": "cyperus/bus/add",
                        "title": "inner",
                        "properties": {},
                        "subgraph": {
                            "nodes": [
                                {"id": 1, "type": "cyperus/bus/output", "properties": {"name": "out"}}
                            ],
                            "links": []
                        }
                    }
                ],
                "links": []
            }
        }],
        "links": []
    }));
    let mut engine = VirtualEngine::new(0, 0);
    let compiled = preset.compile(&mut engine).unwrap();

    let buses: Vec<(String, String, String, String)> = engine
        .calls()
        .iter()
        .filter_map(|call| match call {
            EngineCall::AddBus {
                parent,
                title,
                inputs,
                outputs,
            } => Some((parent.clone(), title.clone(), inputs.clone(), outputs.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(buses.len(), 2);
    assert_eq!(
        buses[0],
        (String::new(), "outer".to_string(), "left,right".to_string(), String::new())
    );

    let outer = engine
        .buses()
        .iter()
        .find(|(_, bus)| bus.title == "outer")
        .map(|(id, _)| id.clone())
        .unwrap();
    assert_eq!(
        buses[1],
        (outer, "inner".to_string(), String::new(), "out".to_string())
    );
    assert_eq!(compiled.report.max_depth, 2);

    // Port counts follow the pass-through children.
    let out = serde_json::to_value(preset.annotate(&compiled)).unwrap();
    let outer_props = &out["nodes"][0]["properties"];
    assert_eq!(outer_props["bus_input_ids"].as_array().unwrap().len(), 2);
    assert_eq!(outer_props["bus_output_ids"].as_array().unwrap().len(), 0);
    let inner_props = &out["nodes"][0]["subgraph"]["nodes"][2]["properties"];
    assert_eq!(inner_props["bus_input_ids"].as_array().unwrap().len(), 0);
    assert_eq!(inner_props["bus_output_ids"].as_array().unwrap().len(), 1);
}

#[test]
fn without_buses_links_connect_in_list_order() {
    let preset = preset(json!({
        "nodes": [
            {"id": 10, "type": "main/inputs", "properties": {"ids": [null, null]}},
            {"id": 20, "type": "filter/bandpass",
             "properties": {"amplitude": 1, "frequency": 800, "q": 4},
             "inputs": [{"name": "in"}], "outputs": [{"name": "out"}]},
            {"id": 30, "type": "delay/simple",
             "properties": {"amplitude": 1, "time": 0.5, "feedback": 0.3},
             "inputs": [{"name": "in"}], "outputs": [{"name": "out"}]},
            {"id": 40, "type": "main/outputs", "properties": {"ids": [null, null]}}
        ],
        "links": [
            [7, 30, 0, 40, 1, "audio", null],
            [3, 10, 1, 20, 0, "audio", null],
            [5, 20, 0, 30, 0, "audio", null],
            [1, 10, 0, 40, 0, "audio", null]
        ]
    }));
    let mut engine = VirtualEngine::new(2, 2);
    let compiled = preset.compile(&mut engine).unwrap();
    assert_eq!(compiled.report.connections, 4);

    let made = connections(&engine);
    let mains = engine.mains().clone();
    assert_eq!(made[0].1, mains.outputs[1]);
    assert_eq!(made[1].0, mains.inputs[1]);
    assert_eq!(made[3], (mains.inputs[0].clone(), mains.outputs[0].clone()));

    // No bus ids: module addresses hang off the empty root bus.
    for (origin, target) in &made {
        for address in [origin, target] {
            assert!(!address.contains(':'), "bus address {}", address);
            assert!(address.starts_with("/?") || !address.starts_with('/'));
        }
    }

    let out = serde_json::to_value(preset.annotate(&compiled)).unwrap();
    for (i, connection) in engine.connections().iter().enumerate() {
        assert_eq!(out["links"][i][6], json!(connection.id));
    }
}

#[test]
fn engine_failure_stops_compilation() {
    let preset = Preset::from_json(MAIN0_SINE).unwrap();
    let mut engine = VirtualEngine::new(1, 1).fail_on("add_modules_oscillator_sine");
    let err = preset.compile(&mut engine).unwrap_err();

    assert!(matches!(
        err,
        CompileError::Engine(EngineError::Rejected {
            operation: "add_modules_oscillator_sine",
            ..
        })
    ));
    // The bus stays built; nothing after the failure is attempted.
    assert_eq!(engine.buses().len(), 1);
    assert!(connections(&engine).is_empty());
}

#[test]
fn short_bus_port_list_is_an_engine_error() {
    struct DroppingEngine(VirtualEngine);

    impl EngineControl for DroppingEngine {
        fn list_main(&mut self) -> Result<MainPorts, EngineError> {
            self.0.list_main()
        }
        fn add_bus(&mut self, p: &str, t: &str, i: &str, o: &str) -> Result<String, EngineError> {
            self.0.add_bus(p, t, i, o)
        }
        fn list_bus_port(&mut self, bus_id: &str) -> Result<PortList, EngineError> {
            let mut ports = self.0.list_bus_port(bus_id)?;
            ports.outputs.clear();
            Ok(ports)
        }
        fn add_module(&mut self, bus_id: &str, m: &ModuleSpec) -> Result<String, EngineError> {
            self.0.add_module(bus_id, m)
        }
        fn list_module_port(&mut self, module_id: &str) -> Result<PortList, EngineError> {
            self.0.list_module_port(module_id)
        }
        fn add_connection(&mut self, origin: &str, target: &str) -> Result<String, EngineError> {
            self.0.add_connection(origin, target)
        }
    }

    let preset = Preset::from_json(MAIN0_SINE).unwrap();
    let err = preset
        .compile(&mut DroppingEngine(VirtualEngine::new(1, 1)))
        .unwrap_err();
    assert!(matches!(
        err,
        CompileError::Engine(EngineError::PortCountMismatch {
            expected: 1,
            returned: 0,
            ..
        })
    ));
}

#[test]
fn module_ports_match_by_name_not_position() {
    /// Reports an extra port ahead of the real ones.
    struct ShuffledEngine(VirtualEngine);

    impl EngineControl for ShuffledEngine {
        fn list_main(&mut self) -> Result<MainPorts, EngineError> {
            self.0.list_main()
        }
        fn add_bus(&mut self, p: &str, t: &str, i: &str, o: &str) -> Result<String, EngineError> {
            self.0.add_bus(p, t, i, o)
        }
        fn list_bus_port(&mut self, bus_id: &str) -> Result<PortList, EngineError> {
            self.0.list_bus_port(bus_id)
        }
        fn add_module(&mut self, bus_id: &str, m: &ModuleSpec) -> Result<String, EngineError> {
            self.0.add_module(bus_id, m)
        }
        fn list_module_port(&mut self, module_id: &str) -> Result<PortList, EngineError> {
            let mut ports = self.0.list_module_port(module_id)?;
            ports
                .inputs
                .insert(0, cyperus_preset::PortInfo::new("decoy", "gain"));
            ports.inputs.reverse();
            Ok(ports)
        }
        fn add_connection(&mut self, origin: &str, target: &str) -> Result<String, EngineError> {
            self.0.add_connection(origin, target)
        }
    }

    let preset = Preset::from_json(MAIN0_SINE).unwrap();
    let mut engine = ShuffledEngine(VirtualEngine::new(1, 1));
    let compiled = preset.compile(&mut engine).unwrap();
    assert_eq!(compiled.report.connections, 4);

    let out = serde_json::to_value(preset.annotate(&compiled)).unwrap();
    let sine = &out["nodes"][2]["subgraph"]["nodes"][2];
    let real = engine.0.modules().values().next().unwrap().ports.inputs[0].id.clone();
    assert_eq!(sine["inputs"][0]["id"], json!(real));
}

#[test]
fn recompiling_gives_the_same_shape_with_new_ids() {
    let preset = Preset::from_json(MAIN0_SINE).unwrap();
    let mut first = VirtualEngine::new(1, 1);
    let mut second = VirtualEngine::new(1, 1);
    preset.compile(&mut first).unwrap();
    preset.compile(&mut second).unwrap();

    let ops = |e: &VirtualEngine| e.calls().iter().map(EngineCall::operation).collect::<Vec<_>>();
    assert_eq!(ops(&first), ops(&second));
    assert_ne!(connections(&first), connections(&second));
}

#[test]
fn written_output_can_be_compiled_again() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("preset_active").join("main0_sine.json");

    let preset = Preset::from_json(MAIN0_SINE).unwrap();
    let compiled = preset.compile(&mut VirtualEngine::new(1, 1)).unwrap();
    GraphWriter::new(&path).write(&preset.annotate(&compiled)).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\n    \"nodes\": ["));

    let reloaded = Preset::load(&path).unwrap();
    let again = reloaded.compile(&mut VirtualEngine::new(1, 1)).unwrap();
    assert_eq!(again.report, compiled.report);
}

#[test]
fn short_link_tuples_fail_to_load() {
    let err = Preset::from_json(
        &json!({
            "nodes": [],
            "links": [[1, 1, 0, 2, 0, "audio"]]
        })
        .to_string(),
    )
    .unwrap_err();
    match err {
        ParseError::Json(e) => assert!(e.to_string().contains("link tuple has 6 fields")),
        other => panic!("expected json error, got {:?}", other),
    }
}

#[test]
fn missing_preset_file_names_the_path() {
    let err = Preset::load("/nonexistent/preset.json").unwrap_err();
    assert!(matches!(err, ParseError::Io { .. }));
    assert!(err.to_string().contains("/nonexistent/preset.json"));
}
