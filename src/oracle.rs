//! Server-side verification of settled transactions.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::model::TransactionRecord;

/// Outcome of verifying one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The purchase is genuine and has been delivered.
    Verified,
    /// The purchase was refused by the server.
    Rejected,
    /// The server could not decide yet; keep the record for a later retry.
    Undetermined,
}

/// A batch verification result, partitioned by transaction identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verification {
    pub verified: Vec<String>,
    pub rejected: Vec<String>,
    pub undetermined: Vec<String>,
}

impl Verification {
    pub fn push(&mut self, transaction_id: impl Into<String>, verdict: Verdict) {
        let id = transaction_id.into();
        match verdict {
            Verdict::Verified => self.verified.push(id),
            Verdict::Rejected => self.rejected.push(id),
            Verdict::Undetermined => self.undetermined.push(id),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.verified.is_empty() && self.rejected.is_empty() && self.undetermined.is_empty()
    }
}

/// Authority that confirms whether purchased/restored transactions are valid.
///
/// Each call resolves exactly once for the whole batch.
#[async_trait]
pub trait VerificationOracle: Send + Sync {
    async fn verify(&self, records: &[TransactionRecord]) -> Verification;
}

/// Oracle answering from a fixed table. Unknown transactions are undetermined.
#[derive(Debug, Clone, Default)]
pub struct VerdictTable {
    verdicts: HashMap<String, Verdict>,
}

impl VerdictTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, transaction_id: impl Into<String>, verdict: Verdict) {
        self.verdicts.insert(transaction_id.into(), verdict);
    }

    pub fn with(mut self, transaction_id: impl Into<String>, verdict: Verdict) -> Self {
        self.insert(transaction_id, verdict);
        self
    }
}

impl FromIterator<(String, Verdict)> for VerdictTable {
    fn from_iter<I: IntoIterator<Item = (String, Verdict)>>(iter: I) -> Self {
        Self {
            verdicts: iter.into_iter().collect(),
        }
    }
}

#[async_trait]
impl VerificationOracle for VerdictTable {
    async fn verify(&self, records: &[TransactionRecord]) -> Verification {
        let mut verification = Verification::default();
        for record in records {
            let verdict = self
                .verdicts
                .get(&record.transaction_id)
                .copied()
                .unwrap_or(Verdict::Undetermined);
            verification.push(record.transaction_id.clone(), verdict);
        }
        verification
    }
}
