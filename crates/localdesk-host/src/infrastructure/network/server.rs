//! The host's single TCP listener.
//!
//! Phones find the host through one advertised port and use it for
//! everything: `GET /` with an upgrade request opens the WebSocket session
//! channel, every other route is the HTTP bootstrap surface.  Failing to
//! bind is the only fatal network error at startup.
//!
//! # Shutdown
//!
//! The server polls the shared `running` flag every 200 ms and stops
//! accepting once it is cleared (see `main.rs`).

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::application::dispatch::SessionDispatcher;
use crate::application::state::HostState;

use super::{http_api, session_server};

#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not be bound (port in use, no permission).
    #[error("failed to bind host listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("host server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// HTTP routes and the session upgrade route, merged.
pub fn router(state: Arc<HostState>, dispatcher: Arc<SessionDispatcher>) -> Router {
    http_api::router(state).merge(session_server::routes(dispatcher))
}

/// A bound, not yet serving, host listener.
pub struct HostServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    router: Router,
}

impl HostServer {
    /// Binds the listener.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound.
    pub async fn bind(
        addr: SocketAddr,
        state: Arc<HostState>,
        dispatcher: Arc<SessionDispatcher>,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;
        info!("session channel and HTTP surface listening on {local_addr}");
        Ok(Self {
            listener,
            local_addr,
            router: router(state, dispatcher),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves until `running` is cleared.
    pub async fn run(self, running: Arc<AtomicBool>) -> Result<(), ServerError> {
        let shutdown = async move {
            while running.load(Ordering::Relaxed) {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            info!("shutdown flag set; stopping host listener");
        };
        axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServerError::Serve)?;
        debug!("host listener stopped");
        Ok(())
    }
}
