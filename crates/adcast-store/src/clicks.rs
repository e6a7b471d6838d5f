use adcast_core::ClickEvent;
use chrono::Utc;
use tracing::instrument;

use crate::database::Database;
use crate::error::StoreError;
use crate::schema;

/// Writes click telemetry into the configured clicks table.
#[derive(Clone)]
pub struct ClickRepo {
    db: Database,
    table: String,
    insert_sql: String,
}

impl ClickRepo {
    /// Bind to `table`, creating it if needed.
    pub fn new(db: Database, table: &str) -> Result<Self, StoreError> {
        if !schema::is_valid_table_name(table) {
            return Err(StoreError::InvalidTableName(table.to_string()));
        }
        db.with_conn(|conn| {
            conn.execute_batch(&schema::create_clicks_table(table))
                .map_err(|e| StoreError::Database(format!("create {table}: {e}")))
        })?;

        let insert_sql = format!(
            "INSERT INTO {table} (ad_id, timestamp, video_time, x, y, hover_time, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        );
        Ok(Self {
            db,
            table: table.to_string(),
            insert_sql,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Persist one click. Returns the new row id.
    #[instrument(skip(self, click), fields(table = %self.table, ad_id = click.ad_id))]
    pub fn insert(&self, click: &ClickEvent) -> Result<i64, StoreError> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            conn.execute(
                &self.insert_sql,
                rusqlite::params![
                    click.ad_id,
                    click.timestamp,
                    click.video_time,
                    click.position.x,
                    click.position.y,
                    click.hover_time,
                    now,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Number of stored clicks, optionally for one ad.
    pub fn count(&self, ad_id: Option<i64>) -> Result<u64, StoreError> {
        self.db.with_conn(|conn| {
            let n: i64 = match ad_id {
                Some(id) => conn.query_row(
                    &format!("SELECT COUNT(*) FROM {} WHERE ad_id = ?1", self.table),
                    [id],
                    |row| row.get(0),
                )?,
                None => conn.query_row(
                    &format!("SELECT COUNT(*) FROM {}", self.table),
                    [],
                    |row| row.get(0),
                )?,
            };
            Ok(n as u64)
        })
    }
}
