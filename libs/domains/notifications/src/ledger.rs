//! Delivery ledger: idempotency bookkeeping for sends that have a delivery row.

use crate::error::NotificationResult;
use crate::models::DeliveryRef;
use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
        }
    }
}

#[async_trait]
pub trait DeliveryLedger: Send + Sync {
    /// Whether the referenced delivery already succeeded.
    async fn is_sent(&self, delivery: &DeliveryRef) -> NotificationResult<bool>;

    /// Records a successful send. Stamps `sent_at` and the provider's message id.
    async fn mark_sent(&self, delivery: &DeliveryRef, provider_id: &str) -> NotificationResult<()>;

    /// Records a terminal failure. A row that is already `sent` keeps its status.
    async fn mark_failed(&self, delivery: &DeliveryRef, reason: &str) -> NotificationResult<()>;
}

/// Ledger backed by the `thread_invites`, `broadcast_deliveries` and
/// `thread_message_deliveries` tables.
#[derive(Clone)]
pub struct PgDeliveryLedger {
    db: DatabaseConnection,
}

impl PgDeliveryLedger {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DeliveryLedger for PgDeliveryLedger {
    async fn is_sent(&self, delivery: &DeliveryRef) -> NotificationResult<bool> {
        let sql = format!("SELECT status FROM {} WHERE id = $1", delivery.table());
        let row = self
            .db
            .query_one_raw(Statement::from_sql_and_values(
                DbBackend::Postgres,
                sql,
                [delivery.id().into()],
            ))
            .await?;

        match row {
            Some(row) => {
                let status: String = row.try_get("", "status")?;
                Ok(status == DeliveryStatus::Sent.as_str())
            }
            None => {
                warn!(table = delivery.table(), id = %delivery.id(), "Delivery row not found");
                Ok(false)
            }
        }
    }

    async fn mark_sent(&self, delivery: &DeliveryRef, provider_id: &str) -> NotificationResult<()> {
        let sql = format!(
            "UPDATE {} SET status = 'sent', provider_id = $2, sent_at = now() WHERE id = $1",
            delivery.table()
        );
        let result = self
            .db
            .execute_raw(Statement::from_sql_and_values(
                DbBackend::Postgres,
                sql,
                [delivery.id().into(), provider_id.into()],
            ))
            .await?;

        if result.rows_affected() == 0 {
            warn!(table = delivery.table(), id = %delivery.id(), "No delivery row to mark sent");
        }
        Ok(())
    }

    async fn mark_failed(&self, delivery: &DeliveryRef, reason: &str) -> NotificationResult<()> {
        let sql = format!(
            "UPDATE {} SET status = 'failed' WHERE id = $1 AND status <> 'sent'",
            delivery.table()
        );
        let result = self
            .db
            .execute_raw(Statement::from_sql_and_values(
                DbBackend::Postgres,
                sql,
                [delivery.id().into()],
            ))
            .await?;

        debug!(
            table = delivery.table(),
            id = %delivery.id(),
            rows = result.rows_affected(),
            reason,
            "Marked delivery failed"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRecord {
    pub status: DeliveryStatus,
    pub provider_id: Option<String>,
}

/// In-process ledger for tests and local runs.
#[derive(Clone, Default)]
pub struct InMemoryDeliveryLedger {
    records: Arc<Mutex<HashMap<DeliveryRef, LedgerRecord>>>,
}

impl InMemoryDeliveryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a row in the given state.
    pub fn insert(&self, delivery: DeliveryRef, status: DeliveryStatus) {
        if let Ok(mut records) = self.records.lock() {
            records.insert(
                delivery,
                LedgerRecord {
                    status,
                    provider_id: None,
                },
            );
        }
    }

    pub fn get(&self, delivery: &DeliveryRef) -> Option<LedgerRecord> {
        self.records
            .lock()
            .ok()
            .and_then(|records| records.get(delivery).cloned())
    }
}

#[async_trait]
impl DeliveryLedger for InMemoryDeliveryLedger {
    async fn is_sent(&self, delivery: &DeliveryRef) -> NotificationResult<bool> {
        Ok(self
            .get(delivery)
            .is_some_and(|record| record.status == DeliveryStatus::Sent))
    }

    async fn mark_sent(&self, delivery: &DeliveryRef, provider_id: &str) -> NotificationResult<()> {
        if let Ok(mut records) = self.records.lock() {
            records.insert(
                *delivery,
                LedgerRecord {
                    status: DeliveryStatus::Sent,
                    provider_id: Some(provider_id.to_string()),
                },
            );
        }
        Ok(())
    }

    async fn mark_failed(&self, delivery: &DeliveryRef, _reason: &str) -> NotificationResult<()> {
        if let Ok(mut records) = self.records.lock() {
            let record = records.entry(*delivery).or_insert(LedgerRecord {
                status: DeliveryStatus::Pending,
                provider_id: None,
            });
            if record.status != DeliveryStatus::Sent {
                record.status = DeliveryStatus::Failed;
            }
        }
        Ok(())
    }
}
