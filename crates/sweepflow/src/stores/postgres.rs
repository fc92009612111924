use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::{ConfigError, SweepError, SweepResult};
use crate::sweep::deleter::CrossStoreDeleter;
use crate::sweep::model::{Batch, Identifier};
use crate::sweep::source::{BatchSource, RecordStore};

/// SQL type of the identifier column; ids travel as text and are cast on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Uuid,
    Text,
}

impl IdKind {
    fn array_cast(&self) -> &'static str {
        match self {
            IdKind::Uuid => "uuid[]",
            IdKind::Text => "text[]",
        }
    }
}

/// Shape of a table purged by retention key, plus its optional history shadow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionTable {
    pub table: String,
    pub history_table: Option<String>,
    pub id_column: String,
    pub id_kind: IdKind,
    pub retention_key: String,
}

impl RetentionTable {
    /// `"AuditEvent"` keyed by `"lastUpdated"`, shadowed by `"AuditEvent_History"`.
    pub fn audit_events() -> Self {
        Self {
            table: "AuditEvent".to_string(),
            history_table: Some("AuditEvent_History".to_string()),
            id_column: "id".to_string(),
            id_kind: IdKind::Uuid,
            retention_key: "lastUpdated".to_string(),
        }
    }

    /// Cache category of the rows; same as the resource table name.
    pub fn category(&self) -> &str {
        &self.table
    }
}

/// Double-quotes a plain SQL identifier. Anything beyond `[A-Za-z_][A-Za-z0-9_]*` is rejected.
pub fn quote_ident(name: &str) -> SweepResult<String> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(ConfigError::Invalid {
            field: "table",
            reason: format!("'{name}' is not a plain SQL identifier"),
        }
        .into());
    }
    Ok(format!("\"{name}\""))
}

/// One table addressed by identifier.
#[derive(Clone)]
pub struct PgTable {
    pool: PgPool,
    name: String,
    delete_sql: String,
}

impl PgTable {
    pub fn new(pool: PgPool, table: &str, id_column: &str, id_kind: IdKind) -> SweepResult<Self> {
        let delete_sql = format!(
            "DELETE FROM {} WHERE {} = ANY($1::{})",
            quote_ident(table)?,
            quote_ident(id_column)?,
            id_kind.array_cast()
        );
        Ok(Self {
            pool,
            name: table.to_string(),
            delete_sql,
        })
    }
}

#[async_trait]
impl RecordStore for PgTable {
    fn name(&self) -> &str {
        &self.name
    }

    async fn delete_ids(&self, ids: &[Identifier]) -> SweepResult<u64> {
        if ids.is_empty() {
            return Err(SweepError::EmptyBatch);
        }

        let deleted = sqlx::query(&self.delete_sql)
            .bind(ids)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }
}

/// Relational origin: ids of rows whose retention key is older than a cutoff
/// frozen at construction, oldest first.
///
/// No cursor is carried. Deleting a batch removes it from the eligible set,
/// so re-running the same query yields the next-oldest survivors.
#[derive(Clone)]
pub struct PgRetentionSource {
    primary: Arc<PgTable>,
    history: Option<Arc<PgTable>>,
    pool: PgPool,
    category: String,
    cutoff: DateTime<Utc>,
    select_sql: String,
}

impl PgRetentionSource {
    pub fn new(pool: PgPool, table: &RetentionTable, cutoff: DateTime<Utc>) -> SweepResult<Self> {
        let select_sql = format!(
            r#"
            SELECT {id}::text
            FROM {table}
            WHERE {key} < $1
            ORDER BY {key} ASC
            LIMIT $2
            "#,
            id = quote_ident(&table.id_column)?,
            table = quote_ident(&table.table)?,
            key = quote_ident(&table.retention_key)?,
        );

        let primary = Arc::new(PgTable::new(
            pool.clone(),
            &table.table,
            &table.id_column,
            table.id_kind,
        )?);
        let history = match &table.history_table {
            Some(name) => Some(Arc::new(PgTable::new(
                pool.clone(),
                name,
                &table.id_column,
                table.id_kind,
            )?)),
            None => None,
        };

        Ok(Self {
            primary,
            history,
            pool,
            category: table.category().to_string(),
            cutoff,
            select_sql,
        })
    }

    pub fn cutoff(&self) -> DateTime<Utc> {
        self.cutoff
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    /// Deleter removing from the table, then its history table.
    pub fn deleter(&self) -> CrossStoreDeleter {
        let deleter = CrossStoreDeleter::new(self.primary.clone());
        match &self.history {
            Some(history) => deleter.with_secondary(history.clone()),
            None => deleter,
        }
    }
}

#[async_trait]
impl BatchSource for PgRetentionSource {
    fn name(&self) -> &str {
        &self.category
    }

    async fn fetch_batch(&self, limit: usize) -> SweepResult<Batch> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let ids: Vec<String> = sqlx::query_scalar(&self.select_sql)
            .bind(self.cutoff)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(Batch::new(ids))
    }
}
