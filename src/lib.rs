//! `mcprouter`: template routing and dispatch for small MCP (Model Context
//! Protocol) servers.
//!
//! Requests arrive either as a resource read (`resource://addition/15,27,10`)
//! or as a tool call with structured arguments. The core matches them against
//! a frozen [`Registry`] of URI templates and tool schemas, coerces and
//! validates parameters, invokes a pure [`Handler`], and packages the outcome
//! into a protocol response. Every per-request failure becomes a JSON-RPC
//! error; only inconsistent registrations stop the server from starting.
//!
//! # Quick start
//!
//! ```rust
//! use mcprouter::{BoundParameters, FnHandler, OutcomeValue, ResourceDef, Server, UriTemplate};
//! use mcprouter::{IncomingRequest, ResponseEnvelope};
//!
//! let server = Server::builder()
//!     .resource(
//!         ResourceDef::new("addition", UriTemplate::parse("resource://addition/{numbers*}").unwrap())
//!             .expression("Sum", "+"),
//!         FnHandler::new(|p: &BoundParameters| Ok(OutcomeValue::Number(p.operands().sum()))),
//!     )
//!     .server_info("my-server", "0.1.0")
//!     .build()
//!     .unwrap();
//!
//! let envelope = server
//!     .dispatch(&IncomingRequest::resource_read("resource://addition/1,2"))
//!     .unwrap();
//! let ResponseEnvelope::Resource(read) = envelope else { unreachable!() };
//! assert_eq!(read.contents[0].text, "Sum: 1.0 + 2.0 = 3.0");
//! ```

pub mod invoker;
pub mod loader;
pub mod matcher;
pub mod registry;
pub mod response;
pub mod server;
pub mod servers;
pub mod template;
pub mod transport_stdio;
pub mod types;
mod validate;

// Re-export the most commonly used items at the crate root.
pub use invoker::{FnHandler, Handler};
pub use loader::{load_resources, load_tools, parse_resources, parse_tools};
pub use registry::{Registry, RegistryBuilder, ResourceDef};
pub use response::Render;
pub use server::{Server, ServerBuilder};
pub use template::{Segment, UriTemplate};
pub use transport_stdio::{serve, stdio, LineTransport, Transport};
pub use types::{
    BoundParameters, ConfigError, DispatchError, HandlerError, IncomingRequest, JsonRpcRequest,
    JsonRpcResponse, McpError, McpResponse, OutcomeValue, ParamType, ParamValue, ResponseEnvelope,
    RpcError, ToolSchema, PROTOCOL_VERSION,
};
