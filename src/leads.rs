//! Append-only persistence for visitor leads and knowledge gaps.
//!
//! A **lead** is a visitor who expressed interest in getting in touch (at
//! minimum an email address). A **knowledge gap** is a question the
//! assistant could not answer from the knowledge base. Both are written
//! exactly once per tool invocation and never updated or deleted here.

use anyhow::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

/// Default stored when the visitor didn't give a name.
pub const NAME_NOT_PROVIDED: &str = "Name not provided";
/// Default stored when the model passed no notes.
pub const NOTES_NOT_PROVIDED: &str = "not provided";

/// A recorded contact lead.
#[derive(Debug, Clone, Serialize)]
pub struct Lead {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub notes: String,
    pub created_at: i64,
}

/// A recorded unanswerable question.
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeGap {
    pub id: i64,
    pub question: String,
    pub created_at: i64,
}

/// Aggregate counters for the `stats` command.
#[derive(Debug, Clone, Serialize)]
pub struct LeadStats {
    pub total_leads: i64,
    pub total_knowledge_gaps: i64,
}

/// SQLite-backed store for leads and knowledge gaps.
pub struct LeadStore {
    pool: SqlitePool,
}

impl LeadStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a lead; omitted name/notes get their placeholder defaults.
    /// Returns the auto-assigned id.
    pub async fn insert_lead(
        &self,
        email: &str,
        name: Option<&str>,
        notes: Option<&str>,
    ) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            "INSERT INTO leads (email, name, notes, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(email)
        .bind(name.unwrap_or(NAME_NOT_PROVIDED))
        .bind(notes.unwrap_or(NOTES_NOT_PROVIDED))
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Record a question the assistant couldn't answer. Returns the id.
    pub async fn insert_gap(&self, question: &str) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();
        let result =
            sqlx::query("INSERT INTO knowledge_gaps (question, created_at) VALUES (?, ?)")
                .bind(question)
                .bind(now)
                .execute(&self.pool)
                .await?;

        Ok(result.last_insert_rowid())
    }

    /// All leads, newest first.
    pub async fn list_leads(&self) -> Result<Vec<Lead>> {
        let rows = sqlx::query(
            "SELECT id, email, name, notes, created_at FROM leads ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Lead {
                id: row.get("id"),
                email: row.get("email"),
                name: row.get("name"),
                notes: row.get("notes"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    /// All knowledge gaps, newest first.
    pub async fn list_gaps(&self) -> Result<Vec<KnowledgeGap>> {
        let rows = sqlx::query(
            "SELECT id, question, created_at FROM knowledge_gaps ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| KnowledgeGap {
                id: row.get("id"),
                question: row.get("question"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    pub async fn stats(&self) -> Result<LeadStats> {
        let total_leads: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM leads")
            .fetch_one(&self.pool)
            .await?;
        let total_knowledge_gaps: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM knowledge_gaps")
            .fetch_one(&self.pool)
            .await?;

        Ok(LeadStats {
            total_leads,
            total_knowledge_gaps,
        })
    }
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// CLI entry point for `concierge leads`.
pub async fn run_leads(store: &LeadStore) -> Result<()> {
    let leads = store.list_leads().await?;
    if leads.is_empty() {
        println!("No leads recorded.");
        return Ok(());
    }

    for lead in &leads {
        println!(
            "{}. [{}] {} <{}>",
            lead.id,
            format_ts(lead.created_at),
            lead.name,
            lead.email
        );
        println!("    notes: {}", lead.notes);
    }
    Ok(())
}

/// CLI entry point for `concierge gaps`.
pub async fn run_gaps(store: &LeadStore) -> Result<()> {
    let gaps = store.list_gaps().await?;
    if gaps.is_empty() {
        println!("No knowledge gaps recorded.");
        return Ok(());
    }

    for gap in &gaps {
        println!("{}. [{}] {}", gap.id, format_ts(gap.created_at), gap.question);
    }
    Ok(())
}
