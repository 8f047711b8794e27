//! The example servers: greeting, math over resource templates (fixed and
//! list shapes), and math over tools.

use std::fmt;
use std::str::FromStr;

use crate::invoker::FnHandler;
use crate::registry::ResourceDef;
use crate::server::Server;
use crate::template::{Segment, UriTemplate};
use crate::types::{BoundParameters, HandlerError, McpError, OutcomeValue};

pub const GREETING_SERVER_NAME: &str = "Greeting Server";
pub const MATH_SERVER_NAME: &str = "math-server";

const MATH_RESOURCES_JSON: &[u8] = include_bytes!("../defs/math_resources.json");
const MATH_TOOLS_JSON: &[u8] = include_bytes!("../defs/math_tools.json");

/// Sum of every bound operand, left to right.
pub fn add(params: &BoundParameters) -> Result<OutcomeValue, HandlerError> {
    Ok(OutcomeValue::Number(
        params.operands().fold(0.0, |acc, x| acc + x),
    ))
}

/// Product of every bound operand, left to right.
pub fn multiply(params: &BoundParameters) -> Result<OutcomeValue, HandlerError> {
    Ok(OutcomeValue::Number(
        params.operands().fold(1.0, |acc, x| acc * x),
    ))
}

pub fn greeting_server() -> Result<Server, McpError> {
    let greet = format!("Hello from {GREETING_SERVER_NAME}!");
    let farewell = format!("Goodbye from {GREETING_SERVER_NAME}!");

    Server::builder()
        .resource(
            ResourceDef::new("greet", UriTemplate::parse("resource://greet")?)
                .description("A friendly greeting"),
            FnHandler::new(move |_: &BoundParameters| Ok(OutcomeValue::Text(greet.clone()))),
        )
        .resource(
            ResourceDef::new("farewell", UriTemplate::parse("resource://farewell")?)
                .description("A polite farewell"),
            FnHandler::new(move |_: &BoundParameters| Ok(OutcomeValue::Text(farewell.clone()))),
        )
        .server_info(GREETING_SERVER_NAME, env!("CARGO_PKG_VERSION"))
        .build()
}

/// Which template shape the math resources use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathShape {
    /// `resource://addition/{a}/{b}`
    Fixed,
    /// `resource://addition/{numbers*}`
    List,
}

pub fn math_resource_server(shape: MathShape) -> Result<Server, McpError> {
    let builder = Server::builder().server_info(MATH_SERVER_NAME, env!("CARGO_PKG_VERSION"));

    let builder = match shape {
        MathShape::Fixed => builder
            .resource(
                fixed_pair("addition")?
                    .description("Dynamic addition, e.g. resource://addition/10/20")
                    .expression("Addition result", "+"),
                FnHandler::new(add),
            )
            .resource(
                fixed_pair("multiplication")?
                    .description("Dynamic multiplication, e.g. resource://multiplication/5/8")
                    .expression("Multiplication result", "×"),
                FnHandler::new(multiply),
            ),
        MathShape::List => builder
            .resources_json(MATH_RESOURCES_JSON)
            .handle_resource("addition", FnHandler::new(add))
            .handle_resource("multiplication", FnHandler::new(multiply)),
    };

    builder.build()
}

pub fn math_tool_server() -> Result<Server, McpError> {
    Server::builder()
        .tools_json(MATH_TOOLS_JSON)
        .handle_tool("add", FnHandler::new(add))
        .handle_tool("multiply", FnHandler::new(multiply))
        .server_info(MATH_SERVER_NAME, env!("CARGO_PKG_VERSION"))
        .build()
}

fn fixed_pair(name: &str) -> Result<ResourceDef, McpError> {
    let template = UriTemplate::from_segments(
        "resource",
        vec![Segment::literal(name), Segment::param("a"), Segment::param("b")],
    )?;
    Ok(ResourceDef::new(name, template))
}

/// Server selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerKind {
    Greeting,
    Math,
    MathList,
    MathTools,
}

impl ServerKind {
    pub fn build(self) -> Result<Server, McpError> {
        match self {
            ServerKind::Greeting => greeting_server(),
            ServerKind::Math => math_resource_server(MathShape::Fixed),
            ServerKind::MathList => math_resource_server(MathShape::List),
            ServerKind::MathTools => math_tool_server(),
        }
    }
}

impl FromStr for ServerKind {
    type Err = McpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "greeting" => Ok(ServerKind::Greeting),
            "math" => Ok(ServerKind::Math),
            "math-list" => Ok(ServerKind::MathList),
            "math-tools" => Ok(ServerKind::MathTools),
            other => Err(McpError::Other(format!(
                "unknown server \"{other}\" (expected greeting, math, math-list or math-tools)"
            ))),
        }
    }
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ServerKind::Greeting => "greeting",
            ServerKind::Math => "math",
            ServerKind::MathList => "math-list",
            ServerKind::MathTools => "math-tools",
        })
    }
}
