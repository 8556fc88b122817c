//! `ChatRelayServer` builder and accept loop.
//!
//! This is the entry point for running a relay. It ties together all the
//! layers: transport → session → dispatch → room.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use chatrelay_protocol::{Codec, DelimitedCodec};
use chatrelay_room::{MembershipSnapshot, Registry};
use chatrelay_transport::{Connection, TcpLineTransport, Transport, TransportError};

use crate::supervisor::supervise;
use crate::{ChatRelayError, Dispatcher, RelayConfig};

/// Builder for configuring and starting a relay server.
///
/// # Example
///
/// ```rust,no_run
/// use chatrelay::prelude::*;
///
/// # async fn run() -> Result<(), ChatRelayError> {
/// let server = ChatRelayServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .snapshot("roomClientMap.json")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct ChatRelayServerBuilder {
    bind_addr: String,
    config: RelayConfig,
    snapshot: Option<PathBuf>,
}

impl ChatRelayServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            config: RelayConfig::default(),
            snapshot: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the relay configuration.
    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Seeds room membership from the snapshot at `path` when the server
    /// is built. A missing or unreadable file starts the relay empty.
    pub fn snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot = Some(path.into());
        self
    }

    /// Binds a newline-delimited TCP listener and builds the server.
    pub async fn build(
        self,
    ) -> Result<ChatRelayServer<TcpLineTransport>, ChatRelayError> {
        let transport = TcpLineTransport::bind(&self.bind_addr)
            .await?
            .with_max_line_length(self.config.session.max_line_length);
        self.finish(transport).await
    }

    /// Binds a WebSocket listener (one line per frame) and builds the
    /// server.
    #[cfg(feature = "websocket")]
    pub async fn build_websocket(
        self,
    ) -> Result<
        ChatRelayServer<chatrelay_transport::WebSocketLineTransport>,
        ChatRelayError,
    > {
        let transport =
            chatrelay_transport::WebSocketLineTransport::bind(&self.bind_addr)
                .await?;
        self.finish(transport).await
    }

    async fn finish<T>(
        self,
        transport: T,
    ) -> Result<ChatRelayServer<T>, ChatRelayError>
    where
        T: Transport<Error = TransportError>,
    {
        let registry = Arc::new(Registry::new());
        if let Some(path) = &self.snapshot {
            let snapshot = MembershipSnapshot::load_or_default(path).await;
            registry.load_snapshot(&snapshot);
        }

        Ok(ChatRelayServer {
            transport,
            dispatcher: Arc::new(Dispatcher::new(registry, &self.config)),
            config: self.config,
        })
    }
}

impl Default for ChatRelayServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound relay server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ChatRelayServer<T, K = DelimitedCodec> {
    transport: T,
    dispatcher: Arc<Dispatcher<K>>,
    config: RelayConfig,
}

impl ChatRelayServer<TcpLineTransport> {
    /// Creates a new builder.
    pub fn builder() -> ChatRelayServerBuilder {
        ChatRelayServerBuilder::new()
    }
}

impl<T, K> ChatRelayServer<T, K>
where
    T: Transport<Error = TransportError>,
    T::Connection: Connection<Error = TransportError>,
    K: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The shared registry. Stays valid after the server stops, so the
    /// caller can snapshot membership on shutdown.
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(self.dispatcher.registry())
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), ChatRelayError> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Runs the accept loop until `shutdown` completes.
    ///
    /// Each accepted connection is handed to its own [`supervise`] task.
    /// Connections already running are left to finish on their own.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), ChatRelayError> {
        tracing::info!(
            addr = ?self.transport.local_addr().ok(),
            "chatrelay server running"
        );
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let dispatcher = Arc::clone(&self.dispatcher);
                        let session = self.config.session.clone();
                        tokio::spawn(async move {
                            if let Err(e) = supervise(conn, dispatcher, session).await {
                                tracing::debug!(
                                    error = %e,
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
                () = &mut shutdown => break,
            }
        }

        tracing::info!("chatrelay server shutting down");
        self.transport.shutdown().await?;
        Ok(())
    }
}
