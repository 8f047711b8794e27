//! Line-delimited JSON-RPC transport: one message per line, in both
//! directions. The binary runs it over stdin/stdout; tests run it over
//! in-memory buffers.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::server::Server;
use crate::types::{new_error_response, JsonRpcRequest, McpError, ERR_CODE_PARSE};

/// A duplex channel carrying discrete protocol frames.
#[async_trait]
pub trait Transport: Send {
    /// Next inbound frame as raw bytes, or `None` once the peer has closed
    /// the channel. Frames are not guaranteed to be valid UTF-8.
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, McpError>;
    async fn send(&mut self, frame: &str) -> Result<(), McpError>;
}

/// [`Transport`] over any buffered reader and writer, framing by `\n`.
pub struct LineTransport<R, W> {
    reader: R,
    writer: W,
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        LineTransport { reader, writer }
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}

/// Transport over the process's stdin and stdout.
pub fn stdio() -> LineTransport<BufReader<tokio::io::Stdin>, tokio::io::Stdout> {
    LineTransport::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
}

#[async_trait]
impl<R, W> Transport for LineTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, McpError> {
        let mut frame = Vec::new();
        if self.reader.read_until(b'\n', &mut frame).await? == 0 {
            return Ok(None);
        }
        if frame.last() == Some(&b'\n') {
            frame.pop();
            if frame.last() == Some(&b'\r') {
                frame.pop();
            }
        }
        Ok(Some(frame))
    }

    async fn send(&mut self, frame: &str) -> Result<(), McpError> {
        self.writer.write_all(frame.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// Serve requests one at a time until the peer closes the channel.
///
/// Malformed frames get a parse error reply; only transport I/O failures end
/// the loop early.
pub async fn serve<T: Transport>(server: &Server, transport: &mut T) -> Result<(), McpError> {
    tracing::info!(server = server.name(), "serving");

    while let Some(frame) = transport.recv().await? {
        let text = match String::from_utf8(frame) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "frame is not valid UTF-8");
                transport.send(&parse_error(&e)?).await?;
                continue;
            }
        };
        if text.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<JsonRpcRequest>(&text) {
            Ok(req) => {
                tracing::debug!(method = %req.method, "request");
                let resp = server.handle(req);
                if resp.is_notification() {
                    continue;
                }
                serde_json::to_string(&resp)?
            }
            Err(e) => {
                tracing::warn!(error = %e, "malformed frame");
                parse_error(&e)?
            }
        };
        transport.send(&reply).await?;
    }

    tracing::info!(server = server.name(), "peer closed, stopping");
    Ok(())
}

fn parse_error(detail: &dyn std::fmt::Display) -> Result<String, McpError> {
    let resp = new_error_response(None, ERR_CODE_PARSE, format!("parse error: {detail}"));
    Ok(serde_json::to_string(&resp)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::FnHandler;
    use crate::registry::ResourceDef;
    use crate::template::UriTemplate;
    use crate::types::{BoundParameters, JsonRpcResponse, OutcomeValue, ERR_CODE_NOT_FOUND};

    fn test_server() -> Server {
        Server::builder()
            .resource(
                ResourceDef::new("greet", UriTemplate::parse("resource://greet").unwrap()),
                FnHandler::new(|_: &BoundParameters| Ok(OutcomeValue::Text("Hello".into()))),
            )
            .build()
            .unwrap()
    }

    async fn run(input: &str) -> Vec<JsonRpcResponse> {
        run_bytes(input.as_bytes()).await
    }

    async fn run_bytes(input: &[u8]) -> Vec<JsonRpcResponse> {
        let srv = test_server();
        let mut transport = LineTransport::new(input, Vec::new());
        serve(&srv, &mut transport).await.unwrap();
        let out = String::from_utf8(transport.into_writer()).unwrap();
        out.lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_serves_each_line() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"resources/read","params":{"uri":"resource://greet"}}"#,
            "\n",
        );
        let replies = run(input).await;
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].id, Some(serde_json::json!(1)));
        assert_eq!(
            replies[1].result.as_ref().unwrap()["contents"][0]["text"],
            "Hello"
        );
    }

    #[tokio::test]
    async fn test_malformed_frame_gets_parse_error() {
        let input = "{not json\n\n{\"jsonrpc\":\"2.0\",\"id\":5,\"method\":\"ping\"}\n";
        let replies = run(input).await;
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].error.as_ref().unwrap().code, ERR_CODE_PARSE);
        assert!(replies[1].error.is_none());
    }

    #[tokio::test]
    async fn test_invalid_utf8_frame_gets_parse_error() {
        let mut input = b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\",\"x\":\"\xff\"}\n".to_vec();
        input.extend_from_slice(
            br#"{"jsonrpc":"2.0","id":2,"method":"resources/read","params":{"uri":"resource://greet"}}"#,
        );
        input.extend_from_slice(b"\r\n");

        let replies = run_bytes(&input).await;
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].error.as_ref().unwrap().code, ERR_CODE_PARSE);
        assert_eq!(replies[1].id, Some(serde_json::json!(2)));
        assert_eq!(
            replies[1].result.as_ref().unwrap()["contents"][0]["text"],
            "Hello"
        );
    }

    #[tokio::test]
    async fn test_errors_do_not_stop_the_loop() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"resources/read","params":{"uri":"resource://invalid"}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"resources/read","params":{"uri":"resource://greet"}}"#,
        );
        let replies = run(input).await;
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].error.as_ref().unwrap().code, ERR_CODE_NOT_FOUND);
        assert!(replies[1].result.is_some());
    }
}
