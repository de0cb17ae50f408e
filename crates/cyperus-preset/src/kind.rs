//! The closed node vocabulary.
//!
//! Editor type tags are classified once, at load time. Structural tags may
//! carry the editor's `cyperus/` namespace (`cyperus/bus/add`); both spellings
//! are accepted.

use serde_json::{Map, Value};

use crate::arena::LevelId;
use crate::document::Node;
use crate::error::ParseError;

const NAMESPACE: &str = "cyperus/";

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Physical engine inputs; `slots` is the length of `properties.ids`.
    MainInputs { slots: usize },
    MainOutputs { slots: usize },
    /// Creates a nested bus. The title names the bus on the engine.
    BusAdd { title: String },
    /// Pass-through input inside a bus subgraph.
    BusInput { name: String },
    BusOutput { name: String },
    Module(ModuleSpec),
    /// A tag this compiler cannot create. The node is skipped.
    Unsupported { tag: String },
}

impl NodeKind {
    pub fn classify(node: &Node, level: LevelId) -> Result<Self, ParseError> {
        let tag = node.node_type.strip_prefix(NAMESPACE).unwrap_or(&node.node_type);
        let props = Props {
            node,
            level,
            properties: &node.properties,
        };

        let kind = match tag {
            "main/inputs" => NodeKind::MainInputs {
                slots: props.array_len("ids")?,
            },
            "main/outputs" => NodeKind::MainOutputs {
                slots: props.array_len("ids")?,
            },
            "bus/add" => {
                if node.subgraph.is_none() {
                    return Err(props.missing("subgraph"));
                }
                let title = node.title.clone().ok_or_else(|| props.missing("title"))?;
                NodeKind::BusAdd { title }
            }
            "bus/input" => NodeKind::BusInput {
                name: props.string("name")?,
            },
            "bus/output" => NodeKind::BusOutput {
                name: props.string("name")?,
            },
            other => match ModuleSpec::from_tag(other, &props)? {
                Some(spec) => NodeKind::Module(spec),
                None => NodeKind::Unsupported {
                    tag: node.node_type.clone(),
                },
            },
        };

        Ok(kind)
    }

    /// Short name for diagnostics.
    pub fn label(&self) -> &str {
        match self {
            NodeKind::MainInputs { .. } => "main/inputs",
            NodeKind::MainOutputs { .. } => "main/outputs",
            NodeKind::BusAdd { .. } => "bus/add",
            NodeKind::BusInput { .. } => "bus/input",
            NodeKind::BusOutput { .. } => "bus/output",
            NodeKind::Module(spec) => spec.tag(),
            NodeKind::Unsupported { tag } => tag,
        }
    }
}

/// A concrete processing module and its creation parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleSpec {
    OscillatorSine {
        frequency: f32,
        amplitude: f32,
        phase: f32,
    },
    OscillatorTriangle {
        frequency: f32,
        amplitude: f32,
    },
    OscillatorClock {
        frequency: f32,
        amplitude: f32,
    },
    EnvelopeFollower {
        attack: f32,
        decay: f32,
        scale: f32,
    },
    UtilsFloat {
        value: f32,
    },
    FilterBandpass {
        amplitude: f32,
        frequency: f32,
        q: f32,
    },
    DelaySimple {
        amplitude: f32,
        time: f32,
        feedback: f32,
    },
}

impl ModuleSpec {
    fn from_tag(tag: &str, props: &Props<'_>) -> Result<Option<Self>, ParseError> {
        let spec = match tag {
            "oscillator/sine" => ModuleSpec::OscillatorSine {
                frequency: props.float("frequency")?,
                amplitude: props.float("amplitude")?,
                phase: props.float("phase")?,
            },
            "oscillator/triangle" => ModuleSpec::OscillatorTriangle {
                frequency: props.float("frequency")?,
                amplitude: props.float("amplitude")?,
            },
            "oscillator/clock" => ModuleSpec::OscillatorClock {
                frequency: props.float("frequency")?,
                amplitude: props.float("amplitude")?,
            },
            "envelope/follower" => ModuleSpec::EnvelopeFollower {
                attack: props.float("attack")?,
                decay: props.float("decay")?,
                scale: props.float("scale")?,
            },
            "utils/float" => ModuleSpec::UtilsFloat {
                value: props.float("value")?,
            },
            "filter/bandpass" => ModuleSpec::FilterBandpass {
                amplitude: props.float("amplitude")?,
                frequency: props.float("frequency")?,
                q: props.float("q")?,
            },
            "delay/simple" => ModuleSpec::DelaySimple {
                amplitude: props.float("amplitude")?,
                time: props.float("time")?,
                feedback: props.float("feedback")?,
            },
            _ => return Ok(None),
        };
        Ok(Some(spec))
    }

    pub fn tag(&self) -> &'static str {
        match self {
            ModuleSpec::OscillatorSine { .. } => "oscillator/sine",
            ModuleSpec::OscillatorTriangle { .. } => "oscillator/triangle",
            ModuleSpec::OscillatorClock { .. } => "oscillator/clock",
            ModuleSpec::EnvelopeFollower { .. } => "envelope/follower",
            ModuleSpec::UtilsFloat { .. } => "utils/float",
            ModuleSpec::FilterBandpass { .. } => "filter/bandpass",
            ModuleSpec::DelaySimple { .. } => "delay/simple",
        }
    }

    /// Name of the engine request that creates this module.
    pub fn operation(&self) -> &'static str {
        match self {
            ModuleSpec::OscillatorSine { .. } => "add_modules_oscillator_sine",
            ModuleSpec::OscillatorTriangle { .. } => "add_modules_oscillator_triangle",
            ModuleSpec::OscillatorClock { .. } => "add_modules_oscillator_clock",
            ModuleSpec::EnvelopeFollower { .. } => "add_modules_envelope_follower",
            ModuleSpec::UtilsFloat { .. } => "add_modules_utils_float",
            ModuleSpec::FilterBandpass { .. } => "add_modules_filter_bandpass",
            ModuleSpec::DelaySimple { .. } => "add_modules_delay_simple",
        }
    }

    /// Creation parameters in wire order.
    pub fn params(&self) -> Vec<(&'static str, f32)> {
        match *self {
            ModuleSpec::OscillatorSine {
                frequency,
                amplitude,
                phase,
            } => vec![
                ("frequency", frequency),
                ("amplitude", amplitude),
                ("phase", phase),
            ],
            ModuleSpec::OscillatorTriangle {
                frequency,
                amplitude,
            }
            | ModuleSpec::OscillatorClock {
                frequency,
                amplitude,
            } => vec![("frequency", frequency), ("amplitude", amplitude)],
            ModuleSpec::EnvelopeFollower {
                attack,
                decay,
                scale,
            } => vec![("attack", attack), ("decay", decay), ("scale", scale)],
            ModuleSpec::UtilsFloat { value } => vec![("value", value)],
            ModuleSpec::FilterBandpass {
                amplitude,
                frequency,
                q,
            } => vec![("amplitude", amplitude), ("frequency", frequency), ("q", q)],
            ModuleSpec::DelaySimple {
                amplitude,
                time,
                feedback,
            } => vec![
                ("amplitude", amplitude),
                ("time", time),
                ("feedback", feedback),
            ],
        }
    }
}

/// Typed reads from a node's `properties`, with errors that name the node.
struct Props<'a> {
    node: &'a Node,
    level: LevelId,
    properties: &'a Map<String, Value>,
}

impl Props<'_> {
    fn missing(&self, field: &'static str) -> ParseError {
        ParseError::MissingField {
            level: self.level,
            node: self.node.id,
            node_type: self.node.node_type.clone(),
            field,
        }
    }

    fn get(&self, field: &'static str) -> Result<&Value, ParseError> {
        match self.properties.get(field) {
            Some(Value::Null) | None => Err(self.missing(field)),
            Some(value) => Ok(value),
        }
    }

    fn array_len(&self, field: &'static str) -> Result<usize, ParseError> {
        self.get(field)?
            .as_array()
            .map(Vec::len)
            .ok_or_else(|| self.missing(field))
    }

    fn string(&self, field: &'static str) -> Result<String, ParseError> {
        self.get(field)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.missing(field))
    }

    /// Numbers and numeric strings both coerce; the editor writes either.
    fn float(&self, field: &'static str) -> Result<f32, ParseError> {
        let value = self.get(field)?;
        let parsed = match value {
            Value::Number(n) => n.as_f64().map(|v| v as f32),
            Value::String(s) => s.trim().parse::<f32>().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| ParseError::InvalidNumber {
            level: self.level,
            node: self.node.id,
            property: field,
            value: value.to_string(),
        })
    }
}
