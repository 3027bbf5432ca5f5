use anyhow::Result;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use language_tutor::{
    ai_providers::AiProviderFactory,
    ai_service::AiService,
    api::{create_router, AppState},
    card_service::FlashcardService,
    config::{Config, LoggingConfig},
    database::Database,
    log_system_event,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    let _guard = setup_logging(&config.logging)?;
    // Emitted here because the subscriber did not exist while loading
    config.log_configuration_summary();
    config.validate()?;

    log_system_event!(startup, component = "server", "Starting language tutor server");

    let db = Database::new(&config.database.url).await?;
    info!("Database initialized successfully");

    // One provider client for the whole process
    let provider = AiProviderFactory::create_provider(
        config.ai.provider,
        config.ai.api_key.clone(),
        config.ai.base_url.clone(),
        config.ai.model.clone(),
    );
    let ai_service = AiService::new(provider)
        .with_retry_policy(config.ai.retry_policy(), config.ai.max_attempts)
        .with_languages(config.learning.language_pair());

    info!(
        provider = ai_service.provider_name(),
        model = ai_service.model_name(),
        "Initialized AI service"
    );

    let state = AppState::new(FlashcardService::new(db), ai_service);

    let app = create_router(state).layer(ServiceBuilder::new().layer(CorsLayer::permissive()));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    log_system_event!(shutdown, component = "server", "Server stopped");
    Ok(())
}

/// Console and daily-rolling file output. The returned guard must live as long
/// as the process so buffered file lines get flushed.
fn setup_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    use std::fs;
    use tracing_subscriber::fmt;

    let env_filter = EnvFilter::try_new(&config.level)
        .unwrap_or_else(|_| EnvFilter::new("info,language_tutor=debug"));

    let console_layer = config.console_enabled.then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(true)
            .boxed()
    });

    let (file_layer, guard) = if config.file_enabled {
        fs::create_dir_all(&config.log_directory).unwrap_or_else(|e| {
            eprintln!("Warning: Could not create logs directory: {}", e);
        });

        let file_appender =
            tracing_appender::rolling::daily(&config.log_directory, "language-tutor.log");
        let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

        // No ANSI colors for files
        let layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_writer(non_blocking_file)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!(
        log_directory = %config.log_directory,
        file_enabled = config.file_enabled,
        console_enabled = config.console_enabled,
        "Logging initialized"
    );

    Ok(guard)
}
