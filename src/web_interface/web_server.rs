use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use log::info;
use warp::{Filter, Rejection, Reply};

use super::routes::*;
use crate::configuration::config::Config;
use crate::data_capture::recorder::RequestRecorder;
use crate::error_handling::types::WebError;
use crate::live_feed::LiveFeed;
use crate::storage::{RequestStore, RetentionPolicy};

/// Shared handles given to every route.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RequestStore>,
    pub live_feed: Arc<LiveFeed>,
    pub recorder: Arc<RequestRecorder>,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let store = Arc::new(RequestStore::new(RetentionPolicy::new(
            config.retention_seconds,
            config.max_requests,
        )));
        let live_feed = Arc::new(LiveFeed::new());
        let recorder = Arc::new(RequestRecorder::new(
            Arc::clone(&store),
            Arc::clone(&live_feed),
            config.proxy_hostname.as_deref(),
        ));
        Self {
            store,
            live_feed,
            recorder,
            max_body_bytes: config.max_body_bytes,
        }
    }
}

/// Every endpoint of the service, API routes first.
pub fn routes(
    state: AppState,
    frontend_dir: &Path,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    inbound_route(state.clone())
        .or(list_requests_route(state.clone()))
        .or(get_raw_request_route(state.clone()))
        .or(get_request_route(state.clone()))
        .or(delete_request_route(state.clone()))
        .or(delete_all_requests_route(state.clone()))
        .or(live_channel_route(state))
        .or(healthz_route())
        .or(index_route(frontend_dir))
        .with(warp::log("http_intercepter::web"))
}

/// Web server for the capture endpoint, the API and the live channel
pub struct WebServer {
    config: Config,
    state: AppState,
}

impl WebServer {
    /// Create a new WebServer instance
    pub fn new(config: Config) -> Self {
        let state = AppState::new(&config);
        Self { config, state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Binds the configured address and returns the bound address with the server future.
    ///
    /// The future completes once `shutdown` resolves and in-flight requests finish.
    pub fn bind_with_shutdown(
        &self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(SocketAddr, impl Future<Output = ()>), WebError> {
        let addr = self
            .config
            .socket_addr()
            .map_err(|e| WebError::BindFailed(e.to_string()))?;
        let routes = routes(self.state.clone(), &self.config.frontend_dist_dir);

        let (bound, server) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(addr, shutdown)
            .map_err(|e| WebError::BindFailed(format!("{}: {}", addr, e)))?;
        info!("Listening on http://{}", bound);
        if self.config.frontend_dist_dir.is_dir() {
            info!(
                "Serving frontend from {}",
                self.config.frontend_dist_dir.display()
            );
        }
        Ok((bound, server))
    }

    /// Runs until Ctrl-C.
    pub async fn start(&self) -> Result<(), WebError> {
        let (_, server) = self.bind_with_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })?;
        server.await;
        Ok(())
    }
}
