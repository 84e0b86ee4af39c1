//! `SkirmishServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → room registry.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use skirmish_protocol::{Codec, JsonCodec};
use skirmish_room::{RegistryConfig, ResultSink, RoomRegistry};
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::transport::WebSocketListener;
use crate::{Authenticator, ServerConfig, SkirmishError};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<A: Authenticator, C: Codec, S: ResultSink> {
    pub(crate) rooms: Mutex<RoomRegistry<S>>,
    pub(crate) auth: A,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a Skirmish server.
///
/// ```rust,no_run
/// use skirmish::prelude::*;
///
/// # async fn start() -> Result<(), SkirmishError> {
/// let server = SkirmishServerBuilder::new()
///     .bind("127.0.0.1:3001")
///     .build(TokenAuthenticator, TracingSink)
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Default)]
pub struct SkirmishServerBuilder {
    config: ServerConfig,
}

impl SkirmishServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Binds the listener. Frames are JSON.
    pub async fn build<A, S>(
        self,
        auth: A,
        sink: S,
    ) -> Result<SkirmishServer<A, JsonCodec, S>, SkirmishError>
    where
        A: Authenticator,
        S: ResultSink,
    {
        let listener = WebSocketListener::bind(&self.config.bind_addr).await?;
        let registry = RoomRegistry::new(
            RegistryConfig {
                match_config: self.config.match_config.clone(),
                ..RegistryConfig::default()
            },
            sink,
        );

        let state = Arc::new(ServerState {
            rooms: Mutex::new(registry),
            auth,
            codec: JsonCodec,
            config: self.config,
        });
        Ok(SkirmishServer { listener, state })
    }
}

/// A bound Skirmish server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct SkirmishServer<A: Authenticator, C: Codec, S: ResultSink> {
    listener: WebSocketListener,
    state: Arc<ServerState<A, C, S>>,
}

impl<A, C, S> SkirmishServer<A, C, S>
where
    A: Authenticator,
    C: Codec + Clone,
    S: ResultSink,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until the process is terminated.
    pub async fn run(self) -> Result<(), SkirmishError> {
        self.run_until(std::future::pending()).await
    }

    /// Accepts connections until `shutdown` resolves, then stops every
    /// room.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<(), SkirmishError> {
        tracing::info!(addr = %self.state.config.bind_addr, "skirmish server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        tracing::info!("shutting down");
        self.state.rooms.lock().await.shutdown_all().await;
        Ok(())
    }
}
