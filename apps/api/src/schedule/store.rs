//! Schedule persistence for static, dynamic and read-only resulting entries.
//!
//! `AppState` holds an `Arc<dyn ScheduleStore>`; `PgScheduleStore` is the
//! production backend. Deletes are soft: rows get `deleted_at` and drop out of
//! every listing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;

use crate::models::schedule::{
    DynamicEntryRow, NewDynamicEntry, NewStaticEntry, ResultingEntryRow, StaticEntryRow,
};
use crate::schedule::models::NewEntry;

/// Optional `[start, end)` listing window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DateWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateWindow {
    /// Whether an entry spanning `starting..ending` belongs in the window.
    ///
    /// Undated entries always do. A recurring entry only needs to have started
    /// before the window ends; a one-off must also not have finished before it opens.
    pub fn admits(
        &self,
        starting: Option<DateTime<Utc>>,
        ending: Option<DateTime<Utc>>,
        recurring: bool,
    ) -> bool {
        let starts_in_time = match (self.end, starting) {
            (Some(end), Some(s)) => s < end,
            _ => true,
        };
        let not_finished = match (self.start, ending.or(starting)) {
            (Some(start), Some(last)) if !recurring => last >= start,
            _ => true,
        };
        starts_in_time && not_finished
    }
}

/// Rows written by one interpretation.
#[derive(Debug, Default)]
pub struct InsertedEntries {
    pub static_entries: Vec<StaticEntryRow>,
    pub dynamic_entries: Vec<DynamicEntryRow>,
}

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn insert_static(&self, entry: &NewStaticEntry) -> Result<StaticEntryRow, sqlx::Error>;

    async fn insert_dynamic(&self, entry: &NewDynamicEntry)
        -> Result<DynamicEntryRow, sqlx::Error>;

    /// Writes all entries or none of them.
    async fn insert_batch(&self, entries: &[NewEntry]) -> Result<InsertedEntries, sqlx::Error>;

    async fn list_static(
        &self,
        user_uid: &str,
        window: &DateWindow,
    ) -> Result<Vec<StaticEntryRow>, sqlx::Error>;

    async fn list_dynamic(
        &self,
        user_uid: &str,
        window: &DateWindow,
    ) -> Result<Vec<DynamicEntryRow>, sqlx::Error>;

    async fn list_resulting(
        &self,
        user_uid: &str,
        window: &DateWindow,
    ) -> Result<Vec<ResultingEntryRow>, sqlx::Error>;

    /// Returns `false` if no live entry with `id` belongs to `user_uid`.
    async fn soft_delete_static(&self, user_uid: &str, id: i32) -> Result<bool, sqlx::Error>;

    async fn soft_delete_dynamic(&self, user_uid: &str, id: i32) -> Result<bool, sqlx::Error>;
}

#[derive(Clone)]
pub struct PgScheduleStore {
    pool: PgPool,
}

impl PgScheduleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const INSERT_STATIC_SQL: &str = r#"
    INSERT INTO static_entries
        (user_uid, original_input_text, description, starting_datetime, ending_datetime,
         frequency_per_period, frequency_period)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
    RETURNING *
"#;

const INSERT_DYNAMIC_SQL: &str = r#"
    INSERT INTO dynamic_entries
        (user_uid, original_input_text, description, starting_datetime, ending_datetime,
         frequency_per_period, frequency_period, dependency_name, dependency_type)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
    RETURNING *
"#;

async fn insert_static_in(
    tx: &mut Transaction<'_, Postgres>,
    entry: &NewStaticEntry,
) -> Result<StaticEntryRow, sqlx::Error> {
    sqlx::query_as::<_, StaticEntryRow>(INSERT_STATIC_SQL)
        .bind(&entry.user_uid)
        .bind(&entry.original_input_text)
        .bind(&entry.description)
        .bind(entry.starting_datetime)
        .bind(entry.ending_datetime)
        .bind(entry.frequency_per_period)
        .bind(entry.frequency_period.as_str())
        .fetch_one(&mut **tx)
        .await
}

async fn insert_dynamic_in(
    tx: &mut Transaction<'_, Postgres>,
    entry: &NewDynamicEntry,
) -> Result<DynamicEntryRow, sqlx::Error> {
    sqlx::query_as::<_, DynamicEntryRow>(INSERT_DYNAMIC_SQL)
        .bind(&entry.user_uid)
        .bind(&entry.original_input_text)
        .bind(&entry.description)
        .bind(entry.starting_datetime)
        .bind(entry.ending_datetime)
        .bind(entry.frequency_per_period)
        .bind(entry.frequency_period.map(|p| p.as_str()))
        .bind(&entry.dependency_name)
        .bind(entry.dependency_type.map(|d| d.as_str()))
        .fetch_one(&mut **tx)
        .await
}

#[async_trait]
impl ScheduleStore for PgScheduleStore {
    async fn insert_static(&self, entry: &NewStaticEntry) -> Result<StaticEntryRow, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let row = insert_static_in(&mut tx, entry).await?;
        tx.commit().await?;
        info!("Inserted static entry {} for user {}", row.id, row.user_uid);
        Ok(row)
    }

    async fn insert_dynamic(
        &self,
        entry: &NewDynamicEntry,
    ) -> Result<DynamicEntryRow, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let row = insert_dynamic_in(&mut tx, entry).await?;
        tx.commit().await?;
        info!("Inserted dynamic entry {} for user {}", row.id, row.user_uid);
        Ok(row)
    }

    async fn insert_batch(&self, entries: &[NewEntry]) -> Result<InsertedEntries, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = InsertedEntries::default();

        for entry in entries {
            match entry {
                NewEntry::Static(e) => inserted
                    .static_entries
                    .push(insert_static_in(&mut tx, e).await?),
                NewEntry::Dynamic(e) => inserted
                    .dynamic_entries
                    .push(insert_dynamic_in(&mut tx, e).await?),
            }
        }

        tx.commit().await?;
        info!(
            "Inserted {} static and {} dynamic entries",
            inserted.static_entries.len(),
            inserted.dynamic_entries.len()
        );
        Ok(inserted)
    }

    async fn list_static(
        &self,
        user_uid: &str,
        window: &DateWindow,
    ) -> Result<Vec<StaticEntryRow>, sqlx::Error> {
        // Mirrors DateWindow::admits.
        sqlx::query_as::<_, StaticEntryRow>(
            r#"
            SELECT * FROM static_entries
            WHERE user_uid = $1
              AND deleted_at IS NULL
              AND ($3::timestamptz IS NULL OR starting_datetime IS NULL OR starting_datetime < $3)
              AND ($2::timestamptz IS NULL
                   OR frequency_period <> 'never'
                   OR COALESCE(ending_datetime, starting_datetime) IS NULL
                   OR COALESCE(ending_datetime, starting_datetime) >= $2)
            ORDER BY starting_datetime ASC NULLS LAST, id ASC
            "#,
        )
        .bind(user_uid)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await
    }

    async fn list_dynamic(
        &self,
        user_uid: &str,
        window: &DateWindow,
    ) -> Result<Vec<DynamicEntryRow>, sqlx::Error> {
        sqlx::query_as::<_, DynamicEntryRow>(
            r#"
            SELECT * FROM dynamic_entries
            WHERE user_uid = $1
              AND deleted_at IS NULL
              AND ($3::timestamptz IS NULL OR starting_datetime IS NULL OR starting_datetime < $3)
              AND ($2::timestamptz IS NULL
                   OR COALESCE(frequency_period, 'never') <> 'never'
                   OR COALESCE(ending_datetime, starting_datetime) IS NULL
                   OR COALESCE(ending_datetime, starting_datetime) >= $2)
            ORDER BY id ASC
            "#,
        )
        .bind(user_uid)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await
    }

    async fn list_resulting(
        &self,
        user_uid: &str,
        window: &DateWindow,
    ) -> Result<Vec<ResultingEntryRow>, sqlx::Error> {
        sqlx::query_as::<_, ResultingEntryRow>(
            r#"
            SELECT * FROM resulting_entries
            WHERE user_uid = $1
              AND deleted_at IS NULL
              AND ($3::timestamptz IS NULL OR starting_datetime < $3)
              AND ($2::timestamptz IS NULL OR ending_datetime >= $2)
            ORDER BY starting_datetime ASC
            "#,
        )
        .bind(user_uid)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await
    }

    async fn soft_delete_static(&self, user_uid: &str, id: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE static_entries SET deleted_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND user_uid = $2 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(user_uid)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn soft_delete_dynamic(&self, user_uid: &str, id: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE dynamic_entries SET deleted_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND user_uid = $2 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(user_uid)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
