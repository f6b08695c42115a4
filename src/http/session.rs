//! One client connection, end to end.
//!
//! # Data Flow
//! ```text
//! AwaitingRequest  → read request head off the transport
//! RequestParsed    → host rewritten, UserRequest built
//! UpstreamDispatched → upstream answered
//! ResponseSent     → relay bytes written, write side shut down
//! ```
//!
//! # Design Decisions
//! - Strictly linear; any error aborts the session without partial recovery
//! - Nothing is written before the upstream answered, so a failure leaves the
//!   client with a closed connection (or a 502 when configured)
//! - Shutdown only interrupts a session still waiting for its request head;
//!   once a request is read it runs to completion

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::ProxyError;
use crate::http::framing::read_request_head;
use crate::http::request::RequestRewriter;
use crate::http::response::{bad_gateway_response, ResponseTransformer};
use crate::lifecycle::ShutdownSignal;
use crate::net::ConnectionId;

/// Position of a session in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingRequest,
    RequestParsed,
    UpstreamDispatched,
    ResponseSent,
}

/// Everything a session needs, built once at startup and shared.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub rewriter: RequestRewriter,
    pub transformer: ResponseTransformer,
    pub max_request_head_bytes: usize,
    pub bad_gateway_on_error: bool,
}

/// Drives a single request/response exchange.
#[derive(Debug)]
pub struct ProxySession<'a> {
    id: ConnectionId,
    state: SessionState,
    context: &'a SessionContext,
    shutdown: Option<ShutdownSignal>,
}

impl<'a> ProxySession<'a> {
    pub fn new(id: ConnectionId, context: &'a SessionContext) -> Self {
        Self {
            id,
            state: SessionState::AwaitingRequest,
            context,
            shutdown: None,
        }
    }

    /// Give up waiting for the request head once `shutdown` fires.
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Read, rewrite, dispatch, transform and reply on `stream`.
    pub async fn handle<S>(&mut self, stream: S) -> Result<(), ProxyError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (read_half, mut write_half) = tokio::io::split(stream);
        let mut reader = BufReader::new(read_half);

        let limit = self.context.max_request_head_bytes;
        let raw = match self.shutdown.as_mut() {
            Some(shutdown) => tokio::select! {
                biased;
                head = read_request_head(&mut reader, limit) => head?,
                _ = shutdown.recv() => {
                    tracing::debug!(connection_id = %self.id, "Closing idle connection on shutdown");
                    return Ok(());
                }
            },
            None => read_request_head(&mut reader, limit).await?,
        };
        let request = self.context.rewriter.rewrite(&raw)?;
        self.advance(SessionState::RequestParsed);
        tracing::debug!(
            connection_id = %self.id,
            method = %request.method,
            url = %request.url,
            "Request parsed"
        );

        let response = match self.context.transformer.dispatch(&request).await {
            Ok(response) => response,
            Err(e @ ProxyError::UpstreamUnavailable(_)) if self.context.bad_gateway_on_error => {
                write_half.write_all(&bad_gateway_response()).await?;
                write_half.shutdown().await?;
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        self.advance(SessionState::UpstreamDispatched);

        let status = response.status;
        let message = self.context.transformer.build_relay_response(response)?;
        write_half.write_all(&message).await?;
        write_half.flush().await?;
        write_half.shutdown().await?;
        self.advance(SessionState::ResponseSent);

        tracing::info!(
            connection_id = %self.id,
            method = %request.method,
            url = %request.url,
            status,
            bytes = message.len(),
            "Request proxied"
        );
        Ok(())
    }

    fn advance(&mut self, next: SessionState) {
        tracing::debug!(
            connection_id = %self.id,
            from = ?self.state,
            to = ?next,
            "Session state change"
        );
        self.state = next;
    }
}
