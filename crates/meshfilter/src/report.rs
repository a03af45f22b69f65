//! Statistics reporting.
//!
//! Reads [`Snapshot`]s from the shared recorder; never mutates counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use meshfilter_core::{OutcomeRecorder, Snapshot};
use tokio::task::JoinHandle;

const RULE: &str = "============================================================";

/// Logs counter summaries on a message-count threshold and, optionally, a timer.
#[derive(Debug)]
pub struct StatsReporter {
    recorder: Arc<OutcomeRecorder>,
    every_messages: u64,
    last_threshold: AtomicU64,
}

impl StatsReporter {
    pub fn new(recorder: Arc<OutcomeRecorder>, every_messages: u64) -> Self {
        Self {
            recorder,
            every_messages: every_messages.max(1),
            last_threshold: AtomicU64::new(0),
        }
    }

    pub fn recorder(&self) -> &Arc<OutcomeRecorder> {
        &self.recorder
    }

    /// Call after each message. Logs a summary when the total has just
    /// reached a multiple of the threshold. Returns whether it did.
    pub fn after_message(&self) -> bool {
        let snapshot = self.recorder.snapshot();
        let total = snapshot.total;
        if total == 0 || total % self.every_messages != 0 {
            return false;
        }
        // Unparseable messages leave the total unchanged; report once.
        if self.last_threshold.swap(total, Ordering::Relaxed) == total {
            return false;
        }
        log_summary(&snapshot);
        true
    }

    /// Log a summary every `interval` until the handle is aborted.
    pub fn spawn_interval(&self, interval: Duration) -> JoinHandle<()> {
        let recorder = Arc::clone(&self.recorder);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                log_summary(&recorder.snapshot());
            }
        })
    }

    /// Log the summary unconditionally, e.g. at shutdown.
    pub fn log_final(&self) -> Snapshot {
        let snapshot = self.recorder.snapshot();
        log_summary(&snapshot);
        snapshot
    }
}

/// Summary lines for a snapshot; empty when nothing was counted yet.
pub fn summary_lines(s: &Snapshot) -> Vec<String> {
    if s.total == 0 {
        return Vec::new();
    }
    let mut lines = vec![
        RULE.to_string(),
        "MESSAGE STATISTICS:".to_string(),
        format!("  Total messages: {}", s.total),
        format!("  Forwarded: {} ({:.1}%)", s.forwarded, s.percent(s.forwarded)),
        format!("    - Exempt senders: {}", s.forwarded_exempt),
        format!("  Rejected: {} ({:.1}%)", s.rejected(), s.percent(s.rejected())),
    ];
    if s.decrypted > 0 || s.decryption_failed > 0 {
        lines.push(format!("  Decrypted: {}", s.decrypted));
        lines.push(format!("  Decryption failed: {}", s.decryption_failed));
    }
    lines.push("  Rejection reasons:".to_string());
    lines.push(format!(
        "    - Encrypted (no decoded data): {}",
        s.rejected_encrypted
    ));
    lines.push(format!(
        "    - No bitfield (older firmware): {}",
        s.rejected_no_bitfield
    ));
    lines.push(format!(
        "    - Bitfield disabled by user: {}",
        s.rejected_bitfield_disabled
    ));
    lines.push(RULE.to_string());
    lines
}

fn log_summary(snapshot: &Snapshot) {
    for line in summary_lines(snapshot) {
        tracing::info!("{line}");
    }
}
