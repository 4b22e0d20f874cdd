use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rust_merchan_report::cli::Cli;
use rust_merchan_report::config::Config;
use rust_merchan_report::db::Database;
use rust_merchan_report::dispatch::{
    preview_run, CancelFlag, DispatchSequencer, DispatchSettings, TokioPacer,
};
use rust_merchan_report::errors::AppError;
use rust_merchan_report::period::RunCalendar;
use rust_merchan_report::queries::PgVisitStore;
use rust_merchan_report::report_job::{JobOptions, ReportJob};
use rust_merchan_report::whatsapp_gateway::WhatsAppGatewayClient;

/// Main entry point for the daily report run.
///
/// Computes the reporting calendar, loads metrics from the monitoring database,
/// builds one dispatch item per eligible leader and either previews or sends them.
///
/// Exits with status 1 when the leader directory is empty; every other failure is
/// returned as an error.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_merchan_report=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    if cli.send {
        tracing::debug!("--enviar has no effect; real sending is the default");
    }

    let today = cli.date.unwrap_or_else(|| chrono::Local::now().date_naive());
    let Some(calendar) = RunCalendar::for_today(today) else {
        tracing::info!("{} is a Sunday: no report today", today);
        return Ok(());
    };
    tracing::info!(
        "Reporting for {} (run day {})",
        calendar.reference_label(),
        calendar.today
    );

    // Load configuration
    let mut config = Config::from_env()?;
    if cli.preview {
        config.dispatch.preview_mode = true;
    }

    let db = Database::new(&config.database_url).await?;
    let store = PgVisitStore::new(db.pool.clone(), config.queries.clone());

    let options = JobOptions {
        executive_only: cli.executive_only,
    };
    let built = match ReportJob::new(&store, &config, options) {
        Ok(job) => job.build_items(&calendar).await,
        Err(e) => Err(e),
    };
    db.close().await;

    let items = match built {
        Ok(items) => items,
        Err(e) if matches!(e.root(), AppError::NoLeaders) => {
            tracing::error!("⚠ No leaders found in the area directory");
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let settings = DispatchSettings::from_config(&config.dispatch);
    let mut stdout = std::io::stdout();

    if settings.preview_mode {
        preview_run(&items, settings.preview_chars, &mut stdout);
        return Ok(());
    }

    let sender = WhatsAppGatewayClient::from_config(&config.gateway)?;
    tracing::info!("✓ WhatsApp gateway client initialized");

    let cancel = CancelFlag::new();
    cancel.cancel_on_ctrl_c();

    let summary = DispatchSequencer::new(sender, TokioPacer, settings, cancel)
        .run(&items, &mut stdout)
        .await;

    if summary.failed > 0 {
        tracing::warn!(
            "⚠ {} of {} recipient(s) did not receive their report",
            summary.failed,
            summary.total
        );
    }

    Ok(())
}
