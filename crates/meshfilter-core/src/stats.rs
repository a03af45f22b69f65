//! Outcome accounting.
//!
//! One [`OutcomeRecorder`] per running service. The message path records
//! while a reporter reads snapshots; both go through one lock so a snapshot
//! is always a whole number of messages.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::authz::{Outcome, RejectReason};

/// Point-in-time copy of all counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub total: u64,
    /// All forwarded messages, exempt ones included.
    pub forwarded: u64,
    pub forwarded_exempt: u64,
    pub rejected_encrypted: u64,
    pub rejected_no_bitfield: u64,
    pub rejected_bitfield_disabled: u64,
    pub decrypted: u64,
    pub decryption_failed: u64,
}

impl Snapshot {
    pub fn rejected(&self) -> u64 {
        self.total - self.forwarded
    }

    /// Share of `total`, in percent.
    pub fn percent(&self, count: u64) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            100.0 * count as f64 / self.total as f64
        }
    }

    /// `(name, count)` pairs in report order.
    pub fn entries(&self) -> [(&'static str, u64); 8] {
        [
            ("total", self.total),
            ("forwarded", self.forwarded),
            ("forwarded_exempt", self.forwarded_exempt),
            ("rejected_encrypted", self.rejected_encrypted),
            ("rejected_no_bitfield", self.rejected_no_bitfield),
            ("rejected_bitfield_disabled", self.rejected_bitfield_disabled),
            ("decrypted", self.decrypted),
            ("decryption_failed", self.decryption_failed),
        ]
    }

    /// Number of messages accounted for by the outcome categories.
    pub fn classified(&self) -> u64 {
        self.forwarded
            + self.rejected_encrypted
            + self.rejected_no_bitfield
            + self.rejected_bitfield_disabled
    }
}

/// What happened to an encrypted payload on its way through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptStatus {
    /// Payload arrived decoded, or there was no key or no ciphertext to
    /// try; nothing was attempted.
    NotNeeded,
    Decrypted,
    Failed,
}

/// Thread-safe counters.
#[derive(Debug, Default)]
pub struct OutcomeRecorder {
    counters: Mutex<Snapshot>,
}

impl OutcomeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one classified message.
    pub fn record(&self, outcome: Outcome) -> Snapshot {
        self.record_with(outcome, DecryptStatus::NotNeeded)
    }

    /// Count one classified message together with its decryption result.
    ///
    /// Returns the counters as they were right after this message.
    pub fn record_with(&self, outcome: Outcome, decrypt: DecryptStatus) -> Snapshot {
        let mut c = self.counters.lock();
        c.total += 1;
        match outcome {
            Outcome::Forwarded { exempt } => {
                c.forwarded += 1;
                if exempt {
                    c.forwarded_exempt += 1;
                }
            }
            Outcome::Rejected { reason } => match reason {
                RejectReason::Encrypted => c.rejected_encrypted += 1,
                RejectReason::NoBitfield => c.rejected_no_bitfield += 1,
                RejectReason::BitfieldDisabled => c.rejected_bitfield_disabled += 1,
            },
        }
        match decrypt {
            DecryptStatus::NotNeeded => {}
            DecryptStatus::Decrypted => c.decrypted += 1,
            DecryptStatus::Failed => c.decryption_failed += 1,
        }
        *c
    }

    pub fn snapshot(&self) -> Snapshot {
        *self.counters.lock()
    }
}
