//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        DbAdapter, InMemoryDb, NoopCrmAdapter, OpenAiChatAdapter, OpenAiVisionAdapter,
        WordPressAdapter,
    },
    config::{Config, Environment},
    error::ApiError,
    web::{build_router, state::AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use diagnostic_core::flow::DiagnosticFlow;
use diagnostic_core::ports::{CrmSyncService, DatabaseService};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.to_string()));
    let registry = tracing_subscriber::registry().with(filter);
    if config.environment == Environment::Production {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
    info!(environment = ?config.environment, "Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    let db: Arc<dyn DatabaseService> = match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            let db_adapter = DbAdapter::new(db_pool);
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            Arc::new(db_adapter)
        }
        None => {
            warn!("DATABASE_URL not set, using the in-memory store; data is lost on restart");
            Arc::new(InMemoryDb::new())
        }
    };

    // --- 3. Initialize Service Adapters ---
    let openai_config = match &config.openai_api_key {
        Some(key) => OpenAIConfig::new().with_api_key(key),
        None => {
            warn!("OPENAI_API_KEY not set; comments and diagnoses will use fallback texts");
            OpenAIConfig::new()
        }
    };
    let openai_client = Client::with_config(openai_config);

    let chat_adapter = Arc::new(OpenAiChatAdapter::new(
        openai_client.clone(),
        config.chat_model.clone(),
    ));
    let vision_adapter = Arc::new(OpenAiVisionAdapter::new(
        openai_client,
        config.vision_model.clone(),
    ));

    let crm: Arc<dyn CrmSyncService> = match &config.wordpress_webhook_url {
        Some(url) => {
            info!("CRM sync enabled");
            Arc::new(WordPressAdapter::new(
                url.clone(),
                config.wordpress_api_key.clone(),
            )?)
        }
        None => Arc::new(NoopCrmAdapter),
    };

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db,
        config: config.clone(),
        flow: DiagnosticFlow::new(
            chat_adapter.clone(),
            chat_adapter.clone(),
            vision_adapter.clone(),
        ),
        diagnoses: chat_adapter,
        images: vision_adapter,
        crm,
    });

    // --- 5. Create the Web Router ---
    let app = build_router(app_state, true);

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
