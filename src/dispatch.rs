//! Batch dispatch of report messages.
//!
//! The sequencer walks the batch in order, one recipient at a time:
//! optional warm-up and kickoff notice, then every message of every item, with a
//! cooldown between steps. A session stays open while consecutive items share a
//! phone and is closed when the phone changes or the batch ends.

use crate::config::DispatchConfig;
use crate::models::{DispatchItem, DispatchSummary};
use crate::whatsapp_gateway::MessageSender;
use async_trait::async_trait;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const RULE: &str = "============================================================";

/// Why the sequencer is waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseReason {
    WarmUp,
    SameRecipient,
    BetweenRecipients,
}

/// Source of pacing waits.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, reason: PauseReason, duration: Duration);
}

/// Real-time pacing.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, reason: PauseReason, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        tracing::info!("⏱ Waiting {}s ({:?})", duration.as_secs(), reason);
        tokio::time::sleep(duration).await;
    }
}

/// Cooperative interruption flag, checked between dispatch steps.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sets the flag on the first Ctrl-C. Must be called inside a tokio runtime.
    pub fn cancel_on_ctrl_c(&self) {
        let flag = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("⚠ Dispatch interrupted by operator (Ctrl+C)");
                flag.cancel();
            }
        });
    }
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub preview_mode: bool,
    pub between_recipients: Duration,
    pub same_recipient: Duration,
    /// Settle time after `warm_up`; `None` skips the warm-up entirely.
    pub warmup: Option<Duration>,
    pub kickoff_phone: Option<String>,
    /// Preview truncation length in characters; 0 prints bodies in full.
    pub preview_chars: usize,
}

impl DispatchSettings {
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self {
            preview_mode: config.preview_mode,
            between_recipients: config.between_recipients(),
            same_recipient: config.same_recipient(),
            warmup: (config.warmup_secs > 0).then(|| Duration::from_secs(config.warmup_secs)),
            kickoff_phone: config.kickoff_phone.clone(),
            preview_chars: config.preview_chars,
        }
    }
}

/// Truncates to `limit` characters with a `...` suffix; 0 disables truncation.
pub fn truncate_preview(body: &str, limit: usize) -> String {
    if limit == 0 || body.chars().count() <= limit {
        return body.to_string();
    }
    let cut: String = body.chars().take(limit).collect();
    format!("{}...", cut)
}

/// Writes the human-readable preview of a batch.
pub fn preview_batch<W: Write>(
    items: &[DispatchItem],
    preview_chars: usize,
    out: &mut W,
) -> std::io::Result<()> {
    let total = items.len();
    writeln!(out, "{}", RULE)?;
    writeln!(out, "MODO TESTE - PRÉVIA DAS MENSAGENS")?;
    writeln!(out, "{}", RULE)?;
    writeln!(out, "Total de destinatários: {}", total)?;
    writeln!(out, "{}", RULE)?;

    for (i, item) in items.iter().enumerate() {
        writeln!(out)?;
        writeln!(
            out,
            "[{}/{}] {}: {}",
            i + 1,
            total,
            item.category.as_str().to_uppercase(),
            item.recipient
        )?;
        writeln!(out, "Telefone: {}", item.phone)?;
        for (j, body) in item.messages.iter().enumerate() {
            writeln!(out)?;
            writeln!(out, "--- Mensagem {} ---", j + 1)?;
            writeln!(out, "{}", truncate_preview(body, preview_chars))?;
        }
    }

    Ok(())
}

/// Preview-mode dispatch: writes the batch to `out` and counts every item as sent.
pub fn preview_run<W: Write>(
    items: &[DispatchItem],
    preview_chars: usize,
    out: &mut W,
) -> DispatchSummary {
    if let Err(e) = preview_batch(items, preview_chars, out) {
        tracing::warn!("⚠ Failed to write preview: {}", e);
    }
    let summary = DispatchSummary {
        total: items.len(),
        succeeded: items.len(),
        ..Default::default()
    };
    log_summary(&summary);
    summary
}

pub fn kickoff_message(total: usize) -> String {
    format!(
        "🤖 Iniciando envio dos relatórios de merchandising ({} destinatários).",
        total
    )
}

pub struct DispatchSequencer<S, P> {
    sender: S,
    pacer: P,
    settings: DispatchSettings,
    cancel: CancelFlag,
}

impl<S: MessageSender, P: Pacer> DispatchSequencer<S, P> {
    pub fn new(sender: S, pacer: P, settings: DispatchSettings, cancel: CancelFlag) -> Self {
        Self {
            sender,
            pacer,
            settings,
            cancel,
        }
    }

    /// Runs the whole batch. Preview mode writes to `out` and never touches the sender.
    pub async fn run<W: Write>(&self, items: &[DispatchItem], out: &mut W) -> DispatchSummary {
        if self.settings.preview_mode {
            return preview_run(items, self.settings.preview_chars, out);
        }

        tracing::info!("Starting dispatch of {} recipient(s)", items.len());
        let mut summary = DispatchSummary {
            total: items.len(),
            ..Default::default()
        };

        let mut open_phone: Option<&str> = None;

        if let Some(settle) = self.settings.warmup {
            if let Err(e) = self.sender.warm_up().await {
                tracing::warn!("⚠ Warm-up failed: {}", e);
            }
            self.pacer.pause(PauseReason::WarmUp, settle).await;
        }

        if let Some(phone) = self.settings.kickoff_phone.as_deref() {
            if !self.cancel.is_cancelled() {
                match self.sender.send(phone, &kickoff_message(items.len())).await {
                    Ok(()) => tracing::info!("✓ Kickoff notice sent to {}", phone),
                    Err(e) => tracing::warn!("⚠ Kickoff notice to {} failed: {}", phone, e),
                }
                open_phone = Some(phone);
            }
        }

        for (i, item) in items.iter().enumerate() {
            if self.cancel.is_cancelled() {
                summary.interrupted = true;
                break;
            }

            if let Some(previous) = open_phone {
                if previous == item.phone {
                    self.pacer
                        .pause(PauseReason::SameRecipient, self.settings.same_recipient)
                        .await;
                } else {
                    self.close_session(previous).await;
                    open_phone = None;
                    self.pacer
                        .pause(PauseReason::BetweenRecipients, self.settings.between_recipients)
                        .await;
                }
                if self.cancel.is_cancelled() {
                    summary.interrupted = true;
                    break;
                }
            }

            tracing::info!(
                "[{}/{}] {}: {} ({}), {} message(s)",
                i + 1,
                items.len(),
                item.category.as_str().to_uppercase(),
                item.recipient,
                item.phone,
                item.messages.len()
            );

            open_phone = Some(item.phone.as_str());

            if self.send_item(item, &mut summary).await {
                summary.succeeded += 1;
                tracing::info!("✓ Messages delivered to {}", item.recipient);
            } else {
                summary.failed += 1;
                tracing::error!("✗ Failed to deliver messages to {}", item.recipient);
            }

            if summary.interrupted {
                break;
            }
        }

        if let Some(phone) = open_phone {
            self.close_session(phone).await;
        }
        if let Err(e) = self.sender.teardown().await {
            tracing::warn!("⚠ Teardown failed: {}", e);
        }

        log_summary(&summary);
        summary
    }

    /// Sends every message of one item; stops at the first failure or interruption.
    async fn send_item(&self, item: &DispatchItem, summary: &mut DispatchSummary) -> bool {
        for (j, body) in item.messages.iter().enumerate() {
            if j > 0 {
                self.pacer
                    .pause(PauseReason::SameRecipient, self.settings.same_recipient)
                    .await;
                if self.cancel.is_cancelled() {
                    summary.interrupted = true;
                    return false;
                }
            }

            if let Err(e) = self.sender.send(&item.phone, body).await {
                tracing::error!(
                    "✗ Message {}/{} to {} failed: {}",
                    j + 1,
                    item.messages.len(),
                    item.phone,
                    e
                );
                return false;
            }
        }
        true
    }

    async fn close_session(&self, phone: &str) {
        if let Err(e) = self.sender.close_session(phone).await {
            tracing::warn!("⚠ Failed to close session for {}: {}", phone, e);
        }
    }
}

fn log_summary(summary: &DispatchSummary) {
    tracing::info!(
        "Dispatch summary: total={} succeeded={} failed={}{}",
        summary.total,
        summary.succeeded,
        summary.failed,
        if summary.interrupted { " (interrupted)" } else { "" }
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use crate::models::DispatchCategory;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        WarmUp,
        Send(String, String),
        Close(String),
        Teardown,
        Pause(PauseReason),
    }

    type Log = Arc<Mutex<Vec<Event>>>;

    struct RecordingSender {
        log: Log,
        fail_on: Option<&'static str>,
        cancel_after_send: Option<CancelFlag>,
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
        async fn warm_up(&self) -> Result<(), AppError> {
            self.log.lock().unwrap().push(Event::WarmUp);
            Err(AppError::ExternalApiError("no browser".to_string()))
        }

        async fn send(&self, phone: &str, body: &str) -> Result<(), AppError> {
            self.log
                .lock()
                .unwrap()
                .push(Event::Send(phone.to_string(), body.to_string()));
            if let Some(flag) = &self.cancel_after_send {
                flag.cancel();
            }
            if self.fail_on == Some(body) {
                return Err(AppError::ExternalApiError("boom".to_string()));
            }
            Ok(())
        }

        async fn close_session(&self, phone: &str) -> Result<(), AppError> {
            self.log.lock().unwrap().push(Event::Close(phone.to_string()));
            Ok(())
        }

        async fn teardown(&self) -> Result<(), AppError> {
            self.log.lock().unwrap().push(Event::Teardown);
            Err(AppError::ExternalApiError("already closed".to_string()))
        }
    }

    struct RecordingPacer {
        log: Log,
    }

    #[async_trait]
    impl Pacer for RecordingPacer {
        async fn pause(&self, reason: PauseReason, _duration: Duration) {
            self.log.lock().unwrap().push(Event::Pause(reason));
        }
    }

    fn settings(preview_mode: bool) -> DispatchSettings {
        DispatchSettings {
            preview_mode,
            between_recipients: Duration::from_secs(7),
            same_recipient: Duration::from_secs(5),
            warmup: None,
            kickoff_phone: None,
            preview_chars: 10,
        }
    }

    fn item(recipient: &str, phone: &str, messages: &[&str]) -> DispatchItem {
        DispatchItem {
            recipient: recipient.to_string(),
            phone: phone.to_string(),
            messages: messages.iter().map(|m| m.to_string()).collect(),
            category: DispatchCategory::AreaLeader,
        }
    }

    fn sequencer(
        log: &Log,
        fail_on: Option<&'static str>,
        settings: DispatchSettings,
        cancel: CancelFlag,
        cancel_after_send: bool,
    ) -> DispatchSequencer<RecordingSender, RecordingPacer> {
        DispatchSequencer::new(
            RecordingSender {
                log: log.clone(),
                fail_on,
                cancel_after_send: cancel_after_send.then(|| cancel.clone()),
            },
            RecordingPacer { log: log.clone() },
            settings,
            cancel,
        )
    }

    fn send(phone: &str, body: &str) -> Event {
        Event::Send(phone.to_string(), body.to_string())
    }

    #[tokio::test]
    async fn test_shared_phone_keeps_session_and_failure_skips_rest_of_item() {
        let log: Log = Arc::default();
        let seq = sequencer(&log, Some("m1"), settings(false), CancelFlag::new(), false);
        let items = vec![
            item("Ana", "123", &["a1"]),
            item("Bruno", "123", &["m1", "m2"]),
            item("Carla", "456", &["c1"]),
        ];

        let summary = seq.run(&items, &mut std::io::sink()).await;

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                send("123", "a1"),
                Event::Pause(PauseReason::SameRecipient),
                send("123", "m1"),
                Event::Close("123".to_string()),
                Event::Pause(PauseReason::BetweenRecipients),
                send("456", "c1"),
                Event::Close("456".to_string()),
                Event::Teardown,
            ]
        );
        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert!(!summary.interrupted);
    }

    #[tokio::test]
    async fn test_messages_to_same_phone_are_paced() {
        let log: Log = Arc::default();
        let seq = sequencer(&log, None, settings(false), CancelFlag::new(), false);

        let summary = seq.run(&[item("Ana", "123", &["m1", "m2"])], &mut std::io::sink()).await;

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                send("123", "m1"),
                Event::Pause(PauseReason::SameRecipient),
                send("123", "m2"),
                Event::Close("123".to_string()),
                Event::Teardown,
            ]
        );
        assert_eq!(summary.succeeded, 1);
    }

    #[tokio::test]
    async fn test_preview_never_calls_sender() {
        let log: Log = Arc::default();
        let seq = sequencer(&log, Some("m1"), settings(true), CancelFlag::new(), false);
        let items = vec![
            item("Ana", "123", &["m1"]),
            item("Bruno", "456", &["ção e mais texto"]),
        ];

        let mut out = Vec::new();
        let summary = seq.run(&items, &mut out).await;

        assert!(log.lock().unwrap().is_empty());
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 0);

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Total de destinatários: 2"));
        assert!(text.contains("[2/2] LIDER_AREA: Bruno"));
        assert!(text.contains("ção e mais..."));
    }

    #[tokio::test]
    async fn test_warmup_and_kickoff_are_best_effort() {
        let log: Log = Arc::default();
        let mut s = settings(false);
        s.warmup = Some(Duration::from_secs(3));
        s.kickoff_phone = Some("999".to_string());
        let seq = sequencer(&log, None, s, CancelFlag::new(), false);

        let summary = seq.run(&[item("Ana", "123", &["a1"])], &mut std::io::sink()).await;

        let events = log.lock().unwrap().clone();
        assert_eq!(events[0], Event::WarmUp);
        assert_eq!(events[1], Event::Pause(PauseReason::WarmUp));
        assert_eq!(events[2], send("999", &kickoff_message(1)));
        assert_eq!(events[3], Event::Close("999".to_string()));
        assert_eq!(events[4], Event::Pause(PauseReason::BetweenRecipients));
        assert_eq!(events[5], send("123", "a1"));
        assert_eq!(summary.succeeded, 1);
    }

    #[tokio::test]
    async fn test_interruption_stops_sending_but_tears_down() {
        let log: Log = Arc::default();
        let cancel = CancelFlag::new();
        let seq = sequencer(&log, None, settings(false), cancel, true);
        let items = vec![
            item("Ana", "123", &["a1"]),
            item("Bruno", "456", &["b1"]),
        ];

        let summary = seq.run(&items, &mut std::io::sink()).await;

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                send("123", "a1"),
                Event::Close("123".to_string()),
                Event::Teardown,
            ]
        );
        assert!(summary.interrupted);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.total, 2);
    }

    #[tokio::test]
    async fn test_interruption_mid_item_counts_as_failed() {
        let log: Log = Arc::default();
        let cancel = CancelFlag::new();
        let seq = sequencer(&log, None, settings(false), cancel, true);

        let summary = seq.run(&[item("Ana", "123", &["a1", "a2"])], &mut std::io::sink()).await;

        assert!(!log.lock().unwrap().contains(&send("123", "a2")));
        assert!(summary.interrupted);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn test_truncate_preview_is_char_safe() {
        assert_eq!(truncate_preview("ãéíõú", 3), "ãéí...");
        assert_eq!(truncate_preview("abc", 3), "abc");
        assert_eq!(truncate_preview("abcdef", 0), "abcdef");
    }

    #[test]
    fn test_settings_from_config() {
        let s = DispatchSettings::from_config(&DispatchConfig::default());
        assert!(s.preview_mode);
        assert_eq!(s.warmup, None);
        assert_eq!(s.between_recipients, Duration::from_secs(7));
    }
}
