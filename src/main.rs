use std::sync::Arc;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use ussd_registration::config::{ServerConfig, SmsConfig, UssdConfig};
use ussd_registration::notify::{AfricasTalkingNotifier, LogNotifier, Notifier};
use ussd_registration::registration::{RegistrationFinalizer, RegistrationLedger};
use ussd_registration::store::{LibSqlRegistrationStore, RegistrationStore};
use ussd_registration::ussd::{Clock, SessionStore, SystemClock, UssdEngine, spawn_sweeper};
use ussd_registration::webhook::ussd_routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let server_config = ServerConfig::from_env();
    let _log_guard = init_tracing(&server_config);

    let ussd_config = UssdConfig::from_env();

    eprintln!("📱 USSD Registration v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Event: {} ({})", ussd_config.event.name, ussd_config.event.display_date);
    eprintln!("   USSD code: {}", ussd_config.ussd_code);
    eprintln!(
        "   Africa's Talking: http://0.0.0.0:{}/ussd/africastalking",
        server_config.port
    );
    eprintln!("   Generic: http://0.0.0.0:{}/ussd/generic", server_config.port);
    eprintln!("   Stats: http://0.0.0.0:{}/api/registrations/stats", server_config.port);

    // ── Database ─────────────────────────────────────────────────────────
    let store: Arc<dyn RegistrationStore> = Arc::new(
        LibSqlRegistrationStore::new_local(&server_config.db_path)
            .await
            .with_context(|| {
                format!("Failed to open database at {}", server_config.db_path.display())
            })?,
    );
    eprintln!("   Database: {}", server_config.db_path.display());

    // ── Startup Recovery: reload persisted registrations ────────────────
    let ledger = RegistrationLedger::new();
    match store.list().await {
        Ok(persisted) => {
            let restored = ledger.restore(persisted).await;
            if restored > 0 {
                eprintln!("   Restored {} registrations from DB", restored);
            }
        }
        Err(e) => tracing::warn!("Could not load persisted registrations: {}", e),
    }

    // ── Notifications ────────────────────────────────────────────────────
    let notifier: Arc<dyn Notifier> = match SmsConfig::from_env()? {
        Some(sms) => {
            eprintln!("   SMS: Africa's Talking ({})", sms.username);
            Arc::new(AfricasTalkingNotifier::new(sms, &ussd_config.helpline))
        }
        None => {
            eprintln!("   SMS: disabled (set AT_API_KEY to enable)");
            Arc::new(LogNotifier::new(&ussd_config.helpline))
        }
    };

    // ── Dialog engine ────────────────────────────────────────────────────
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let sessions = SessionStore::new(ussd_config.session_timeout, Arc::clone(&clock));
    let finalizer = RegistrationFinalizer::new(&ussd_config, ledger, store, notifier, clock);
    let engine = Arc::new(UssdEngine::new(&ussd_config, Arc::clone(&sessions), finalizer));

    let sweeper = spawn_sweeper(sessions, ussd_config.sweep_interval);

    // ── HTTP server ──────────────────────────────────────────────────────
    let app = ussd_routes(engine);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", server_config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", server_config.port))?;
    tracing::info!(port = server_config.port, "USSD server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    sweeper.stop();
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Stderr logging, plus a daily rolling file when a log directory is set.
///
/// The returned guard must live until exit so buffered lines are flushed.
fn init_tracing(config: &ServerConfig) -> Option<WorkerGuard> {
    let env_filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(env_filter());

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "ussd-registration.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(env_filter());
            tracing_subscriber::registry().with(stderr).with(file).init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(stderr).init();
            None
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
