//! Proxy server setup and accept loop.
//!
//! # Responsibilities
//! - Build the request rewriter, response transformer and upstream client
//!   from the validated configuration
//! - Accept connections and hand each to a [`ProxySession`]
//! - Stop accepting on shutdown, drop connections that never sent a request
//!   and let in-flight sessions finish
//!
//! # Design Decisions
//! - Sessions run one at a time by default; `listener.concurrent` spawns a
//!   task per connection instead
//! - A failed session is logged and dropped; the loop keeps accepting

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::request::RequestRewriter;
use crate::http::response::ResponseTransformer;
use crate::http::session::{ProxySession, SessionContext};
use crate::lifecycle::ShutdownSignal;
use crate::net::{ConnectionGuard, ConnectionTracker, Listener};
use crate::rewrite::host::SubstringHostRewrite;
use crate::rewrite::marker::WordMarker;
use crate::upstream::{ReqwestUpstream, UpstreamClient};

/// Back-off after a failed accept so a persistent error does not spin.
const ACCEPT_ERROR_DELAY: Duration = Duration::from_millis(100);

/// Forward proxy bound to one upstream origin.
#[derive(Debug)]
pub struct ProxyServer {
    config: Arc<ProxyConfig>,
    context: Arc<SessionContext>,
    tracker: ConnectionTracker,
}

impl ProxyServer {
    /// Create a server that talks to the upstream through `reqwest`.
    pub fn new(config: ProxyConfig) -> Result<Self, ProxyError> {
        let client = ReqwestUpstream::new(&config.upstream)?;
        Self::with_client(config, Arc::new(client))
    }

    /// Create a server with a custom upstream client.
    pub fn with_client(
        config: ProxyConfig,
        client: Arc<dyn UpstreamClient>,
    ) -> Result<Self, ProxyError> {
        let host_rewrite = SubstringHostRewrite::from_parts(
            &config.listener.host,
            config.listener.port,
            &config.upstream.base_url,
        )?;

        let marker = if config.rewrite.enabled {
            Some(WordMarker::new(
                config.rewrite.word_length,
                config.rewrite.marker.clone(),
                config.rewrite.unicode_words,
            )?)
        } else {
            None
        };

        tracing::info!(
            proxy_authority = %host_rewrite.proxy_authority(),
            upstream_host = %host_rewrite.upstream_host(),
            rewrite_enabled = config.rewrite.enabled,
            word_length = config.rewrite.word_length,
            "Proxy configured"
        );

        let context = SessionContext {
            rewriter: RequestRewriter::new(Arc::new(host_rewrite)),
            transformer: ResponseTransformer::new(config.upstream.base_url.clone(), client, marker),
            max_request_head_bytes: config.listener.max_request_head_bytes,
            bad_gateway_on_error: config.upstream.bad_gateway_on_error,
        };

        Ok(Self {
            config: Arc::new(config),
            context: Arc::new(context),
            tracker: ConnectionTracker::new(),
        })
    }

    /// Accept and serve connections until `shutdown` fires.
    pub async fn run(self, listener: Listener, mut shutdown: ShutdownSignal) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            concurrent = self.config.listener.concurrent,
            "Proxy server starting"
        );

        loop {
            let (stream, peer) = tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_ERROR_DELAY).await;
                        continue;
                    }
                },
            };

            let guard = self.tracker.track();
            let signal = shutdown.clone();
            if self.config.listener.concurrent {
                let context = Arc::clone(&self.context);
                tokio::spawn(async move {
                    serve_connection(&context, stream, peer, guard, signal).await;
                });
            } else {
                serve_connection(&self.context, stream, peer, guard, signal).await;
            }
        }

        tracing::info!(
            in_flight = self.tracker.active_count(),
            "Stopped accepting, draining sessions"
        );
        self.tracker.wait_idle().await;
        tracing::info!("Proxy server stopped");
        Ok(())
    }
}

async fn serve_connection(
    context: &SessionContext,
    stream: TcpStream,
    peer: SocketAddr,
    guard: ConnectionGuard,
    shutdown: ShutdownSignal,
) {
    let mut session = ProxySession::new(guard.id(), context).with_shutdown(shutdown);
    if let Err(e) = session.handle(stream).await {
        tracing::warn!(
            connection_id = %guard.id(),
            peer_addr = %peer,
            state = ?session.state(),
            kind = e.kind(),
            error = %e,
            "Session aborted"
        );
    }
}
