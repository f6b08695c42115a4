//! TCP listener for client connections.
//!
//! # Responsibilities
//! - Bind to the configured host and port
//! - Accept incoming TCP connections
//! - Report bind and accept failures distinctly

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("Failed to accept: {0}")]
    Accept(std::io::Error),
}

/// Listening socket the proxy accepts clients on.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    /// Bind to `host:port` from the listener config.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let address = format!("{}:{}", config.host, config.port);
        let inner = TcpListener::bind(address.as_str())
            .await
            .map_err(|source| ListenerError::Bind {
                address: address.clone(),
                source,
            })?;

        if let Ok(local_addr) = inner.local_addr() {
            tracing::info!(address = %local_addr, "Listener bound");
        }
        Ok(Self { inner })
    }

    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ListenerError> {
        let (stream, peer) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        tracing::debug!(peer_addr = %peer, "Connection accepted");
        Ok((stream, peer))
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}
