use crate::{
    command::CommandSender,
    config::QueryConfig,
    data::DataManager,
    error::{HarvesterError, Result},
    services::Service,
};
use async_trait::async_trait;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, Instrument, Span};

use super::handlers::{command_handler, health_handler, results_handler};

/// Shared state for the Axum server
#[derive(Clone)]
pub struct ServerState {
    pub(crate) data_manager: Arc<dyn DataManager>,
    pub(crate) commands: CommandSender,
}

pub(crate) fn router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/results", get(results_handler))
        .route("/commands/:command", post(command_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// HTTP view over stored task results, plus a remote command entry point
pub struct QueryService {
    config: QueryConfig,
    state: ServerState,
    token: CancellationToken,
    span: Span,
}

impl QueryService {
    pub fn new(
        config: QueryConfig,
        data_manager: Arc<dyn DataManager>,
        commands: CommandSender,
        token: CancellationToken,
    ) -> Self {
        Self {
            config,
            state: ServerState {
                data_manager,
                commands,
            },
            token,
            span: Span::none(),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.config.ip, self.config.port)
    }
}

#[async_trait]
impl Service for QueryService {
    fn name(&self) -> &str {
        "query"
    }

    async fn start(&self) -> Result<()> {
        let app = router(self.state.clone());
        let addr = self.address();
        let token = self.token.clone();

        async move {
            info!("Starting query service on {}", addr);

            let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
                HarvesterError::component(
                    "query_service".to_string(),
                    format!("Failed to bind {}: {}", addr, e),
                )
            })?;

            info!("Query service listening on {}", addr);

            axum::serve(listener, app)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
                .map_err(|e| {
                    HarvesterError::component(
                        "query_service".to_string(),
                        format!("Server error: {}", e),
                    )
                })?;

            info!("Query service stopped");
            Ok::<(), HarvesterError>(())
        }
        .instrument(self.span.clone())
        .await
    }

    async fn shutdown(&self) -> Result<()> {
        self.token.cancel();
        Ok(())
    }
}

/// Query service builder
pub struct QueryServiceBuilder {
    config: Option<QueryConfig>,
    data_manager: Option<Arc<dyn DataManager>>,
    commands: Option<CommandSender>,
    token: Option<CancellationToken>,
    span: Span,
}

impl QueryServiceBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            data_manager: None,
            commands: None,
            token: None,
            span: Span::none(),
        }
    }

    pub fn config(mut self, config: QueryConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn data_manager(mut self, data_manager: Arc<dyn DataManager>) -> Self {
        self.data_manager = Some(data_manager);
        self
    }

    /// Queue that `POST /commands/{command}` pushes onto
    pub fn commands(mut self, commands: CommandSender) -> Self {
        self.commands = Some(commands);
        self
    }

    /// Token that ends the server. A fresh one is used when not set.
    pub fn token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn build(self) -> Result<QueryService> {
        let config = self.config.ok_or_else(|| {
            HarvesterError::component("query_service", "Query configuration is required")
        })?;

        let data_manager = self.data_manager.ok_or_else(|| {
            HarvesterError::component("query_service", "Data manager is required")
        })?;

        let commands = self.commands.ok_or_else(|| {
            HarvesterError::component("query_service", "Command sender is required")
        })?;

        let mut service = QueryService::new(
            config,
            data_manager,
            commands,
            self.token.unwrap_or_default(),
        );
        service.span = self.span;
        Ok(service)
    }
}

impl Default for QueryServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
