//! Smoke test for the WhatsApp gateway: sends two short messages to the test phone.

use rust_merchan_report::config::Config;
use rust_merchan_report::dispatch::{CancelFlag, DispatchSequencer, DispatchSettings, TokioPacer};
use rust_merchan_report::models::{DispatchCategory, DispatchItem};
use rust_merchan_report::recipients::normalize_phone_to_e164;
use rust_merchan_report::whatsapp_gateway::WhatsAppGatewayClient;

/// Main entry point for the gateway smoke test.
///
/// Always sends for real, regardless of the preview setting. Exits with status 1
/// when any message fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    let phone = config
        .recipients
        .test_phone_e164
        .as_deref()
        .map(normalize_phone_to_e164)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| anyhow::anyhow!("TEST_PHONE_E164 must be set"))?;

    tracing::info!("Sending 2 test messages to {}", phone);

    let mut settings = DispatchSettings::from_config(&config.dispatch);
    settings.preview_mode = false;
    settings.kickoff_phone = None;

    let sender = WhatsAppGatewayClient::from_config(&config.gateway)?;
    let cancel = CancelFlag::new();
    cancel.cancel_on_ctrl_c();

    let batch = vec![DispatchItem {
        recipient: "TESTE".to_string(),
        phone,
        messages: vec!["oi".to_string(), "oi (2)".to_string()],
        category: DispatchCategory::Test,
    }];

    let summary = DispatchSequencer::new(sender, TokioPacer, settings, cancel)
        .run(&batch, &mut std::io::stdout())
        .await;

    if summary.failed > 0 || summary.succeeded == 0 {
        tracing::error!("✗ Test send failed");
        std::process::exit(1);
    }

    tracing::info!("✓ Test messages sent");
    Ok(())
}
