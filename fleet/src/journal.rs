//! Transaction journal
//!
//! Records every transaction the fleet submits in SQLite via sqlx

use std::{
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::Serialize;
use solana_sdk::signature::Signature;
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};

/// Journal status of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxState {
    /// Sent but not yet confirmed
    Pending = 0,
    /// Confirmed (landed successfully)
    Confirmed = 1,
    /// Landed with an error or never landed
    Failed = 2,
    /// Gave up waiting; the outcome is unknown
    Unconfirmed = 3,
}

impl TxState {
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => TxState::Confirmed,
            2 => TxState::Failed,
            3 => TxState::Unconfirmed,
            _ => TxState::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TxState::Pending => "pending",
            TxState::Confirmed => "confirmed",
            TxState::Failed => "failed",
            TxState::Unconfirmed => "unconfirmed",
        }
    }
}

/// One journaled transaction
#[derive(Debug, Clone, Serialize)]
pub struct JournalEntry {
    pub signature: String,
    /// Operation the transaction carried (e.g. "claim", "recycle-settle")
    pub intent: String,
    pub wallet_count: i64,
    pub sent_at: i64,
    pub status: TxState,
    pub slot: Option<i64>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JournalStats {
    pub total_count: u64,
    pub confirmed_count: u64,
    pub failed_count: u64,
    pub unconfirmed_count: u64,
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[derive(Debug, Clone)]
pub struct Journal {
    pool: Pool<Sqlite>,
}

impl Journal {
    /// Open (creating if needed) the journal database at `db_path`
    pub async fn open(db_path: &Path) -> Result<Self, sqlx::Error> {
        if !db_path.exists() {
            std::fs::File::create(db_path)?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&format!("sqlite:{}", db_path.display()))
            .await?;
        Self::init(pool).await
    }

    /// Journal that lives only as long as the process
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        // A single connection that is never recycled keeps the database alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::init(pool).await
    }

    async fn init(pool: Pool<Sqlite>) -> Result<Self, sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS fleet_txs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                signature TEXT NOT NULL UNIQUE,
                intent TEXT NOT NULL,
                wallet_count INTEGER NOT NULL,
                sent_at INTEGER NOT NULL,
                confirmed_at INTEGER,
                status INTEGER NOT NULL DEFAULT 0,
                slot INTEGER,
                error_message TEXT
            )
        "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_fleet_txs_status ON fleet_txs(status)")
            .execute(&pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_fleet_txs_sent_at ON fleet_txs(sent_at)")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }

    /// Record a freshly submitted transaction
    pub async fn record_sent(
        &self,
        signature: &Signature,
        intent: &str,
        wallet_count: usize,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO fleet_txs (signature, intent, wallet_count, sent_at, status)
            VALUES (?, ?, ?, ?, 0)
        "#,
        )
        .bind(signature.to_string())
        .bind(intent)
        .bind(wallet_count as i64)
        .bind(now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_confirmed(&self, signature: &Signature, slot: u64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE fleet_txs SET status = 1, confirmed_at = ?, slot = ? WHERE signature = ?")
            .bind(now())
            .bind(slot as i64)
            .bind(signature.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn mark_failed(&self, signature: &Signature, error_message: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE fleet_txs SET status = 2, error_message = ? WHERE signature = ?")
            .bind(error_message)
            .bind(signature.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn mark_unconfirmed(&self, signature: &Signature) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE fleet_txs SET status = 3 WHERE signature = ?")
            .bind(signature.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Most recent transactions first
    pub async fn recent(&self, limit: i64) -> Result<Vec<JournalEntry>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT signature, intent, wallet_count, sent_at, status, slot, error_message
            FROM fleet_txs
            ORDER BY id DESC
            LIMIT ?
        "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| JournalEntry {
                signature: row.get("signature"),
                intent: row.get("intent"),
                wallet_count: row.get("wallet_count"),
                sent_at: row.get("sent_at"),
                status: TxState::from_i32(row.get("status")),
                slot: row.get("slot"),
                error_message: row.get("error_message"),
            })
            .collect())
    }

    pub async fn stats(&self) -> Result<JournalStats, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) as total_count,
                SUM(CASE WHEN status = 1 THEN 1 ELSE 0 END) as confirmed_count,
                SUM(CASE WHEN status = 2 THEN 1 ELSE 0 END) as failed_count,
                SUM(CASE WHEN status = 3 THEN 1 ELSE 0 END) as unconfirmed_count
            FROM fleet_txs
        "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(JournalStats {
            total_count: row.get::<i64, _>("total_count") as u64,
            confirmed_count: row.get::<Option<i64>, _>("confirmed_count").unwrap_or(0) as u64,
            failed_count: row.get::<Option<i64>, _>("failed_count").unwrap_or(0) as u64,
            unconfirmed_count: row.get::<Option<i64>, _>("unconfirmed_count").unwrap_or(0) as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracks_transaction_lifecycle() {
        let journal = Journal::in_memory().await.unwrap();
        let landed = Signature::new_unique();
        let failed = Signature::new_unique();
        let lost = Signature::new_unique();

        journal.record_sent(&landed, "claim", 8).await.unwrap();
        journal.record_sent(&failed, "stake", 4).await.unwrap();
        journal.record_sent(&lost, "recycle-settle", 2).await.unwrap();
        journal.mark_confirmed(&landed, 1234).await.unwrap();
        journal.mark_failed(&failed, "custom program error: 0x1775").await.unwrap();
        journal.mark_unconfirmed(&lost).await.unwrap();

        let stats = journal.stats().await.unwrap();
        assert_eq!(
            stats,
            JournalStats {
                total_count: 3,
                confirmed_count: 1,
                failed_count: 1,
                unconfirmed_count: 1,
            }
        );

        let recent = journal.recent(10).await.unwrap();
        assert_eq!(recent[0].signature, lost.to_string());
        assert_eq!(recent[0].status, TxState::Unconfirmed);
        assert_eq!(recent[2].slot, Some(1234));
        assert_eq!(recent[2].wallet_count, 8);
    }

    #[tokio::test]
    async fn duplicate_sends_are_ignored() {
        let journal = Journal::in_memory().await.unwrap();
        let sig = Signature::new_unique();
        journal.record_sent(&sig, "claim", 1).await.unwrap();
        journal.record_sent(&sig, "claim", 1).await.unwrap();
        assert_eq!(journal.stats().await.unwrap().total_count, 1);
    }
}
