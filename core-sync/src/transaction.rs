//! # Sync Transaction State Machine
//!
//! Tracks one outgoing metadata batch from creation to confirmation.
//!
//! ## State Machine
//!
//! ```text
//! Initialized → Posted → Confirmed
//!      ↓          ↓  ↘
//!      └──────→ Errored  Rejected
//! ```
//!
//! Transitions consume the transaction and return it in its new state, so a
//! stale copy can never be advanced twice.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::SyncTransaction;
//! use bridge_traits::SystemClock;
//!
//! let clock = SystemClock;
//! let tx = SyncTransaction::new("https://example.com/feed.xml", 0, &clock);
//! let tx = tx.post("remote-tx-id", &clock)?;
//! let tx = tx.confirm(&clock)?;
//! ```

use crate::{Result, SyncError};
use bridge_traits::time::Clock;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Local identifier of a sync transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(Uuid);

impl TransactionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a transaction ID from a string
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self> {
        Ok(Self(
            Uuid::parse_str(s).map_err(|e| SyncError::InvalidTransactionId(e.to_string()))?,
        ))
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Status
// ============================================================================

/// Lifecycle state of a sync transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Created locally, not yet handed to the store
    Initialized,
    /// Accepted by the store, awaiting confirmation
    Posted,
    /// Durably stored
    Confirmed,
    /// Failed before or while posting
    Errored,
    /// Dropped by the store after posting
    Rejected,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Confirmed | TransactionStatus::Errored | TransactionStatus::Rejected
        )
    }

    /// True once the store holds the batch
    pub fn is_accepted(&self) -> bool {
        matches!(self, TransactionStatus::Posted | TransactionStatus::Confirmed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Initialized => "initialized",
            TransactionStatus::Posted => "posted",
            TransactionStatus::Confirmed => "confirmed",
            TransactionStatus::Errored => "errored",
            TransactionStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "initialized" => Ok(TransactionStatus::Initialized),
            "posted" => Ok(TransactionStatus::Posted),
            "confirmed" => Ok(TransactionStatus::Confirmed),
            "errored" => Ok(TransactionStatus::Errored),
            "rejected" => Ok(TransactionStatus::Rejected),
            _ => Err(SyncError::InvalidStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Sync Transaction Entity
// ============================================================================

/// One metadata batch on its way into the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncTransaction {
    pub id: TransactionId,
    /// Podcast the batch belongs to
    pub subscribe_url: String,
    /// Sequence number of the batch
    pub metadata_batch: u64,
    pub status: TransactionStatus,
    /// Store-assigned identifier, known once posted
    pub remote_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SyncTransaction {
    pub fn new(subscribe_url: impl Into<String>, metadata_batch: u64, clock: &dyn Clock) -> Self {
        let now = clock.now();
        Self {
            id: TransactionId::new(),
            subscribe_url: subscribe_url.into(),
            metadata_batch,
            status: TransactionStatus::Initialized,
            remote_id: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record that the store accepted the batch
    ///
    /// # Errors
    ///
    /// Returns an error unless the transaction is `Initialized`
    pub fn post(self, remote_id: impl Into<String>, clock: &dyn Clock) -> Result<Self> {
        let mut tx = self.transition(TransactionStatus::Posted, clock)?;
        tx.remote_id = Some(remote_id.into());
        Ok(tx)
    }

    /// Record that the store confirmed the batch
    ///
    /// # Errors
    ///
    /// Returns an error unless the transaction is `Posted`
    pub fn confirm(self, clock: &dyn Clock) -> Result<Self> {
        self.transition(TransactionStatus::Confirmed, clock)
    }

    /// Record that the store dropped the batch after posting
    ///
    /// # Errors
    ///
    /// Returns an error unless the transaction is `Posted`
    pub fn reject(self, clock: &dyn Clock) -> Result<Self> {
        self.transition(TransactionStatus::Rejected, clock)
    }

    /// Record a failure
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction already reached a terminal state
    pub fn fail(self, error_message: impl Into<String>, clock: &dyn Clock) -> Result<Self> {
        let mut tx = self.transition(TransactionStatus::Errored, clock)?;
        tx.error_message = Some(error_message.into());
        Ok(tx)
    }

    fn transition(mut self, to: TransactionStatus, clock: &dyn Clock) -> Result<Self> {
        self.validate_transition(to)?;
        self.status = to;
        self.updated_at = clock.now();
        Ok(self)
    }

    fn validate_transition(&self, to: TransactionStatus) -> Result<()> {
        use TransactionStatus::*;

        let valid = matches!(
            (self.status, to),
            (Initialized, Posted)
                | (Initialized, Errored)
                | (Posted, Confirmed)
                | (Posted, Errored)
                | (Posted, Rejected)
        );

        if !valid {
            return Err(SyncError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: to.as_str().to_string(),
                reason: format!(
                    "Cannot transition from {} to {}",
                    self.status.as_str(),
                    to.as_str()
                ),
            });
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
