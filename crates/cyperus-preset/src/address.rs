//! Port addressing for the engine control protocol.
//!
//! Addresses are built from engine-issued ids and never parsed back:
//!
//! | port | form |
//! |---|---|
//! | main | the raw engine id |
//! | bus | `/<bus>:<port>` |
//! | module input | `/<bus>?<module><<port>` |
//! | module output | `/<bus>?<module>><port>` |

use std::fmt;

/// Characters with structural meaning inside an address.
pub const RESERVED: [char; 4] = [':', '?', '<', '>'];

/// True if `id` can be embedded in a bus or module address.
pub fn is_opaque_token(id: &str) -> bool {
    !id.contains(RESERVED)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PortAddress {
    /// A physical main port, addressed by its raw engine id.
    Main(String),
    Bus {
        bus: String,
        port: String,
    },
    ModuleInput {
        bus: String,
        module: String,
        port: String,
    },
    ModuleOutput {
        bus: String,
        module: String,
        port: String,
    },
}

impl PortAddress {
    pub fn main(id: impl Into<String>) -> Self {
        PortAddress::Main(id.into())
    }

    pub fn bus(bus: impl Into<String>, port: impl Into<String>) -> Self {
        PortAddress::Bus {
            bus: bus.into(),
            port: port.into(),
        }
    }

    pub fn module_input(
        bus: impl Into<String>,
        module: impl Into<String>,
        port: impl Into<String>,
    ) -> Self {
        PortAddress::ModuleInput {
            bus: bus.into(),
            module: module.into(),
            port: port.into(),
        }
    }

    pub fn module_output(
        bus: impl Into<String>,
        module: impl Into<String>,
        port: impl Into<String>,
    ) -> Self {
        PortAddress::ModuleOutput {
            bus: bus.into(),
            module: module.into(),
            port: port.into(),
        }
    }
}

impl fmt::Display for PortAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortAddress::Main(id) => f.write_str(id),
            PortAddress::Bus { bus, port } => write!(f, "/{}:{}", bus, port),
            PortAddress::ModuleInput { bus, module, port } => {
                write!(f, "/{}?{}<{}", bus, module, port)
            }
            PortAddress::ModuleOutput { bus, module, port } => {
                write!(f, "/{}?{}>{}", bus, module, port)
            }
        }
    }
}
