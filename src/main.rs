use std::process::ExitCode;

use mcprouter::servers::ServerKind;
use mcprouter::{serve, stdio};

const DEFAULT_SERVER: &str = "math-list";

#[tokio::main]
async fn main() -> ExitCode {
    // stdout carries the protocol, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let kind = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("MCP_SERVER").ok())
        .unwrap_or_else(|| DEFAULT_SERVER.into());

    let server = match kind.parse::<ServerKind>().and_then(ServerKind::build) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(server = %kind, error = %e, "refusing to start");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(server = %kind, name = server.name(), "starting MCP server on stdio");

    let mut transport = stdio();
    if let Err(e) = serve(&server, &mut transport).await {
        tracing::error!(error = %e, "transport failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
