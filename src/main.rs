//! Shell extension host
//!
//! Main entry point that wires the extension manager to its collaborators,
//! loads every installed extension, and keeps them in line with the
//! settings file until shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use shellext_core::config::AppConfig;
use shellext_core::error::AppError;
use shellext_core::events::ExtensionEvent;
use shellext_core::traits::ModuleLoader;
use shellext_lifecycle::{
    ClosureHandler, ExtensionFinder, ExtensionManager, FileSettings, MarkerFile, StagedUpdates,
    ThemeStylesheets,
};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Extension host error");
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    match std::env::var("SHELLEXT_CONFIG") {
        Ok(path) => AppConfig::load(&path),
        Err(_) => {
            let env = std::env::var("SHELLEXT_ENV").unwrap_or_else(|_| "development".to_string());
            AppConfig::load_layered(&env)
        }
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

#[cfg(feature = "dynamic")]
fn module_loader() -> Arc<dyn ModuleLoader> {
    tracing::info!("Loading extension code from shared libraries");
    Arc::new(shellext_lifecycle::DynamicModuleLoader::new())
}

#[cfg(not(feature = "dynamic"))]
fn module_loader() -> Arc<dyn ModuleLoader> {
    tracing::info!("Dynamic loading disabled, only compiled-in extensions can run");
    Arc::new(shellext_lifecycle::StaticModuleLoader::new())
}

/// Main host run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        shell_version = %config.shell.version,
        session_mode = %config.session.name,
        "Starting shell extension host"
    );

    // ── Step 1: Data directories ─────────────────────────────────
    let ext = &config.extensions;
    for dir in [&ext.data_dir, &ext.user_dir, &ext.updates_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| AppError::internal(format!("Failed to create dir '{dir}': {e}")))?;
    }

    // ── Step 2: Settings ─────────────────────────────────────────
    let settings = Arc::new(FileSettings::open(&ext.settings_file, ext.settings_read_only).await?);

    // ── Step 3: Extension manager ────────────────────────────────
    let finder = ExtensionFinder::from_config(ext);
    let manager = ExtensionManager::builder()
        .shell_version(config.shell.version.clone())
        .session_mode(config.session.clone())
        .module_loader(module_loader())
        .settings(settings.clone())
        .stylesheets(Arc::new(ThemeStylesheets::new()))
        .updates(Arc::new(StagedUpdates::new(&ext.updates_dir, finder.user_dir())))
        .upgrade_marker(Arc::new(MarkerFile::new(&ext.data_dir, config.shell.major())))
        .finder(finder)
        .build()
        .await?;
    let manager = Arc::new(manager);

    manager
        .events()
        .subscribe(ClosureHandler::wrap("log", |event| {
            if let ExtensionEvent::StateChanged { extension } = &event.payload {
                tracing::debug!(
                    uuid = %extension.uuid,
                    state = %extension.state,
                    enabled = extension.enabled,
                    "Extension state changed"
                );
            }
        }))
        .await;

    // ── Step 4: Load extensions ──────────────────────────────────
    let count = manager.load_extensions().await?;
    tracing::info!(
        count,
        active = manager.enable_order().await.len(),
        "Extensions ready"
    );

    // ── Step 5: Follow settings ──────────────────────────────────
    let watcher = manager.clone().spawn_settings_watcher();

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let poll_settings = settings.clone();
    let poll_every = Duration::from_secs(ext.settings_poll_seconds.max(1));
    let poller = tokio::spawn(async move {
        let mut interval = tokio::time::interval(poll_every);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = poll_settings.reload().await {
                        tracing::warn!(error = %e, "Failed to re-read settings file");
                    }
                }
                _ = shutdown_rx.changed() => break,
            }
        }
    });

    // ── Step 6: Graceful shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, disabling extensions...");
    let _ = shutdown_tx.send(true);
    let _ = tokio::time::timeout(Duration::from_secs(5), poller).await;
    watcher.abort();

    manager.disable_all().await;

    tracing::info!("Shell extension host shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
