//! PostgreSQL-backed [`ImportStore`]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dropload_common::ImportStatus;
use sqlx::PgPool;

use super::{
    ImportFormat, ImportFormatColumn, ImportLogEntry, ImportStore, InsertOutcome, StoreError,
    StoreResult,
};
use crate::spec::{data_table_name, ColumnValue, Spec};

const LOG_COLUMNS: &str =
    "id, import_format_id, creation_date, import_status, num_rows_processed, file_checksum";

#[derive(Debug, sqlx::FromRow)]
struct FormatRow {
    id: i64,
    name: String,
}

impl From<FormatRow> for ImportFormat {
    fn from(row: FormatRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ColumnRow {
    id: i64,
    import_format_id: i64,
    position: i32,
    name: String,
    width: i64,
    datatype: String,
    nullable: bool,
}

impl From<ColumnRow> for ImportFormatColumn {
    fn from(row: ColumnRow) -> Self {
        Self {
            id: row.id,
            import_format_id: row.import_format_id,
            position: row.position,
            name: row.name,
            width: row.width,
            datatype: row.datatype,
            nullable: row.nullable,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LogRow {
    id: i64,
    import_format_id: i64,
    creation_date: DateTime<Utc>,
    import_status: String,
    num_rows_processed: i64,
    file_checksum: Option<String>,
}

impl TryFrom<LogRow> for ImportLogEntry {
    type Error = StoreError;

    fn try_from(row: LogRow) -> Result<Self, Self::Error> {
        let status = row.import_status.parse::<ImportStatus>().map_err(|e| {
            StoreError::corrupt(format!("import_log {} has bad status: {e}", row.id))
        })?;
        Ok(Self {
            id: row.id,
            import_format_id: row.import_format_id,
            creation_date: row.creation_date,
            status,
            rows_processed: row.num_rows_processed,
            file_checksum: row.file_checksum,
        })
    }
}

/// Quote an identifier for interpolation into DDL/DML
///
/// Spec and column names are already restricted to ASCII alphanumerics; quoting
/// keeps their case intact.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn create_table_sql(spec: &Spec) -> String {
    let mut columns = vec![
        "import_data_id BIGSERIAL PRIMARY KEY".to_string(),
        "import_log_id BIGINT NOT NULL REFERENCES import_log(id)".to_string(),
    ];
    for column in spec.columns() {
        let null = if column.nullable() { "" } else { " NOT NULL" };
        columns.push(format!(
            "{} {}{null}",
            quote_ident(column.name()),
            column.datatype().sql_type()
        ));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(&spec.data_table()),
        columns.join(", ")
    )
}

fn insert_row_sql(spec: &Spec) -> String {
    let names: Vec<String> = spec.columns().iter().map(|c| quote_ident(c.name())).collect();
    let placeholders: Vec<String> = (2..=spec.columns().len() + 1).map(|i| format!("${i}")).collect();
    format!(
        "INSERT INTO {} (import_log_id, {}) VALUES ($1, {})",
        quote_ident(&spec.data_table()),
        names.join(", "),
        placeholders.join(", ")
    )
}

/// [`ImportStore`] over a shared connection pool
#[derive(Debug, Clone)]
pub struct PgImportStore {
    pool: PgPool,
}

impl PgImportStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImportStore for PgImportStore {
    async fn find_format(&self, name: &str) -> StoreResult<Option<ImportFormat>> {
        let row = sqlx::query_as::<_, FormatRow>("SELECT id, name FROM import_format WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ImportFormat::from))
    }

    async fn list_formats(&self) -> StoreResult<Vec<ImportFormat>> {
        let rows = sqlx::query_as::<_, FormatRow>("SELECT id, name FROM import_format ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(ImportFormat::from).collect())
    }

    #[tracing::instrument(skip(self, spec), fields(spec = %spec.name()))]
    async fn insert_format(&self, spec: &Spec) -> StoreResult<InsertOutcome> {
        let mut tx = self.pool.begin().await?;

        let inserted: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO import_format (name)
            VALUES ($1)
            ON CONFLICT (name) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(spec.name())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(format_id) = inserted else {
            tx.rollback().await?;
            let existing = self
                .find_format(spec.name())
                .await?
                .ok_or_else(|| StoreError::not_found("import format", spec.name()))?;
            return Ok(InsertOutcome::AlreadyExists(existing));
        };

        for (position, column) in spec.columns().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO import_format_column
                    (import_format_id, position, name, width, datatype, nullable)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(format_id)
            .bind(position as i32)
            .bind(column.name())
            .bind(i64::from(column.width()))
            .bind(column.datatype().as_str())
            .bind(column.nullable())
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(&create_table_sql(spec)).execute(&mut *tx).await?;

        tx.commit().await?;

        Ok(InsertOutcome::Inserted(ImportFormat {
            id: format_id,
            name: spec.name().to_string(),
        }))
    }

    async fn load_format_columns(&self, format_id: i64) -> StoreResult<Vec<ImportFormatColumn>> {
        let rows = sqlx::query_as::<_, ColumnRow>(
            r#"
            SELECT id, import_format_id, position, name, width, datatype, nullable
            FROM import_format_column
            WHERE import_format_id = $1
            ORDER BY position
            "#,
        )
        .bind(format_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ImportFormatColumn::from).collect())
    }

    #[tracing::instrument(skip(self, format), fields(format = %format.name))]
    async fn delete_format(&self, format: &ImportFormat) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "DROP TABLE IF EXISTS {}",
            quote_ident(&data_table_name(&format.name))
        ))
        .execute(&mut *tx)
        .await?;

        for table in ["import_format_column", "import_log"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE import_format_id = $1"))
                .bind(format.id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM import_format WHERE id = $1")
            .bind(format.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_or_create_log(
        &self,
        format_id: i64,
        creation_date: DateTime<Utc>,
        file_checksum: Option<&str>,
    ) -> StoreResult<(ImportLogEntry, bool)> {
        let created = sqlx::query_as::<_, LogRow>(&format!(
            r#"
            INSERT INTO import_log
                (import_format_id, creation_date, import_status, num_rows_processed, file_checksum)
            VALUES ($1, $2, $3, 0, $4)
            ON CONFLICT (import_format_id, creation_date) DO NOTHING
            RETURNING {LOG_COLUMNS}
            "#
        ))
        .bind(format_id)
        .bind(creation_date)
        .bind(ImportStatus::InProgress.as_str())
        .bind(file_checksum)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = created {
            return Ok((row.try_into()?, true));
        }

        let existing = sqlx::query_as::<_, LogRow>(&format!(
            "SELECT {LOG_COLUMNS} FROM import_log WHERE import_format_id = $1 AND creation_date = $2"
        ))
        .bind(format_id)
        .bind(creation_date)
        .fetch_one(&self.pool)
        .await?;

        Ok((existing.try_into()?, false))
    }

    async fn advance_log(
        &self,
        log_id: i64,
        delta: i64,
        status: Option<ImportStatus>,
    ) -> StoreResult<ImportLogEntry> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, LogRow>(&format!(
            r#"
            UPDATE import_log
            SET num_rows_processed = num_rows_processed + $2,
                import_status = COALESCE($3, import_status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {LOG_COLUMNS}
            "#
        ))
        .bind(log_id)
        .bind(delta)
        .bind(status.map(|s| s.as_str()))
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::not_found("import log", log_id))?;

        tx.commit().await?;
        row.try_into()
    }

    async fn insert_row(&self, spec: &Spec, log_id: i64, values: &[ColumnValue]) -> StoreResult<()> {
        let sql = insert_row_sql(spec);
        let mut query = sqlx::query(&sql).bind(log_id);
        for value in values {
            query = match value {
                ColumnValue::Text(text) => query.bind(text.as_str()),
                ColumnValue::Integer(number) => query.bind(*number),
                ColumnValue::Boolean(flag) => query.bind(*flag),
            };
        }
        query.execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::spec::SpecColumn;
    use dropload_common::Datatype;

    fn color_spec() -> Spec {
        Spec::new(
            "colors",
            vec![
                SpecColumn::new("color", 7, Datatype::Text).unwrap(),
                SpecColumn::new("flag", 1, Datatype::Boolean).unwrap(),
                SpecColumn::new("Count", 3, Datatype::Integer).unwrap(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_create_table_sql() {
        assert_eq!(
            create_table_sql(&color_spec()),
            "CREATE TABLE IF NOT EXISTS \"import_data_colors\" (\
             import_data_id BIGSERIAL PRIMARY KEY, \
             import_log_id BIGINT NOT NULL REFERENCES import_log(id), \
             \"color\" TEXT NOT NULL, \
             \"flag\" BOOLEAN NOT NULL, \
             \"Count\" BIGINT NOT NULL)"
        );
    }

    #[test]
    fn test_insert_row_sql() {
        assert_eq!(
            insert_row_sql(&color_spec()),
            "INSERT INTO \"import_data_colors\" (import_log_id, \"color\", \"flag\", \"Count\") \
             VALUES ($1, $2, $3, $4)"
        );
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("abc"), "\"abc\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore] // Requires database
    async fn test_insert_format_is_idempotent(pool: PgPool) {
        let store = PgImportStore::new(pool);
        let spec = color_spec();

        let first = store.insert_format(&spec).await.unwrap();
        assert!(matches!(first, InsertOutcome::Inserted(_)));
        let second = store.insert_format(&spec).await.unwrap();
        assert_eq!(second, InsertOutcome::AlreadyExists(first.format().clone()));

        let columns = store.load_format_columns(first.format().id).await.unwrap();
        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["color", "flag", "Count"]);
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore] // Requires database
    async fn test_journal_round_trip(pool: PgPool) {
        let store = PgImportStore::new(pool);
        let spec = color_spec();
        let format = store.insert_format(&spec).await.unwrap().format().clone();
        let stamp = "2024-01-01T00:00:00.000Z".parse::<DateTime<Utc>>().unwrap();

        let (entry, created) = store.find_or_create_log(format.id, stamp, Some("abc")).await.unwrap();
        assert!(created);
        assert_eq!(entry.status, ImportStatus::InProgress);

        let (again, created) = store.find_or_create_log(format.id, stamp, None).await.unwrap();
        assert!(!created);
        assert_eq!(again.id, entry.id);
        assert_eq!(again.file_checksum.as_deref(), Some("abc"));

        store
            .insert_row(
                &spec,
                entry.id,
                &[
                    ColumnValue::Text("Red    ".to_string()),
                    ColumnValue::Boolean(true),
                    ColumnValue::Integer(7),
                ],
            )
            .await
            .unwrap();

        let advanced = store.advance_log(entry.id, 1, None).await.unwrap();
        assert_eq!(advanced.rows_processed, 1);
        assert_eq!(advanced.status, ImportStatus::InProgress);

        let done = store
            .advance_log(entry.id, 0, Some(ImportStatus::Complete))
            .await
            .unwrap();
        assert_eq!(done.status, ImportStatus::Complete);
        assert_eq!(done.rows_processed, 1);

        store.delete_format(&format).await.unwrap();
        assert!(store.find_format("colors").await.unwrap().is_none());
    }
}
