use crate::error::Result;
use crate::models::{ClassificationModel, ModelTable};
use indexmap::IndexMap;
use polars::prelude::*;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::future::Future;
use std::num::NonZeroUsize;
use std::path::Path;
use tokio::runtime::Runtime;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SqliteDataType {
    INTEGER,
    #[default]
    TEXT,
    REAL,
    BLOB,
}
impl std::fmt::Display for SqliteDataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqliteDataType::INTEGER => write!(f, "INTEGER"),
            SqliteDataType::TEXT => write!(f, "TEXT"),
            SqliteDataType::REAL => write!(f, "REAL"),
            SqliteDataType::BLOB => write!(f, "BLOB"),
        }
    }
}
impl SqliteDataType {
    pub fn from_polar_type(data_type: &DataType) -> Self {
        match data_type {
            DataType::Boolean
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64 => SqliteDataType::INTEGER,
            DataType::Float32 | DataType::Float64 => SqliteDataType::REAL,
            DataType::Binary | DataType::BinaryOffset => SqliteDataType::BLOB,
            _ => SqliteDataType::TEXT,
        }
    }
}
#[derive(Debug, Clone, PartialEq)]
pub struct SqliteColOption {
    type_sql: SqliteDataType,
    nullable: bool,
    primary_key: bool,
}
impl Default for SqliteColOption {
    fn default() -> Self {
        Self {
            type_sql: SqliteDataType::default(),
            nullable: true,
            primary_key: false,
        }
    }
}
impl SqliteColOption {
    pub fn with_type_sql(mut self, type_sql: SqliteDataType) -> Self {
        self.type_sql = type_sql;
        self
    }
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = if self.primary_key { false } else { nullable };
        self
    }
    pub fn with_primary_key(mut self, primary_key: bool) -> Self {
        self.primary_key = primary_key;
        self.nullable = false;
        self
    }
    pub fn build_col_def<T: Into<String>>(&self, column_name: T) -> String {
        let mut col_def = format!("{} {}", column_name.into(), self.type_sql);
        if self.primary_key {
            col_def.push_str(" PRIMARY KEY");
        }
        if !self.nullable {
            col_def.push_str(" NOT NULL");
        }
        col_def
    }
}
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqliteSchema {
    columns: IndexMap<String, SqliteColOption>,
}
impl SqliteSchema {
    pub fn new<T: Into<String>>(col_name: T, col_type: SqliteColOption) -> Self {
        let mut columns: IndexMap<String, SqliteColOption> = IndexMap::new();
        columns.insert(col_name.into(), col_type);
        Self { columns }
    }
    pub fn from_polars_schema(schema: &Schema) -> Self {
        let columns = schema
            .iter_fields()
            .map(|field| {
                let type_of = SqliteDataType::from_polar_type(field.dtype());
                (
                    field.name().to_string(),
                    SqliteColOption::default().with_type_sql(type_of),
                )
            })
            .collect();
        Self { columns }
    }
    pub fn iter_fields(&self) -> impl Iterator<Item = (&String, &SqliteColOption)> {
        self.columns.iter()
    }
    pub fn with_column<T: Into<String>>(&mut self, column: T, type_of: SqliteColOption) -> &Self {
        self.columns.insert(column.into(), type_of);
        self
    }
    /// Overrides the options of columns already present in `self` with the
    /// ones declared in `other`; columns only in `other` are ignored.
    pub fn overlay(mut self, other: &SqliteSchema) -> Self {
        for (column, options) in other.iter_fields() {
            if let Some(current) = self.columns.get_mut(column) {
                *current = options.clone();
            }
        }
        self
    }
    pub fn finish<T: Into<String>>(&self, table_name: T) -> String {
        let col_definitions: Vec<String> = self
            .columns
            .iter()
            .map(|(column, options)| options.build_col_def(column))
            .collect();

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);",
            table_name.into(),
            col_definitions.join(",\n    ")
        )
    }
}

/// SQLite handle shared by every writer of a run. Owns the runtime that
/// drives the sqlx pool.
pub struct Database {
    rt: Runtime,
    pool: SqlitePool,
}
impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let rt = Runtime::new()?;
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        let pool = rt.block_on(
            SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(options),
        )?;
        info!(path = %path.as_ref().display(), "database opened");
        Ok(Self { rt, pool })
    }
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.rt.block_on(future)
    }
    /// Runs a one-off statement. It is not kept in the prepared statement
    /// cache, since bulk INSERT texts never repeat.
    pub fn execute(&self, qry: &str) -> Result<()> {
        self.block_on(sqlx::query(qry).persistent(false).execute(&self.pool))?;
        Ok(())
    }
    pub fn count_rows(&self, table: &str) -> Result<i64> {
        let (count,): (i64,) = self.block_on(
            sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table)).fetch_one(&self.pool),
        )?;
        Ok(count)
    }
    /// Creates the classification table if needed and inserts every model in
    /// one transaction.
    pub fn add_all(&self, table: ModelTable, models: &[ClassificationModel]) -> Result<()> {
        let mut schema = SqliteSchema::new(
            "id",
            SqliteColOption::default()
                .with_type_sql(SqliteDataType::INTEGER)
                .with_primary_key(true),
        );
        schema.with_column("code", SqliteColOption::default());
        schema.with_column("name_en", SqliteColOption::default());
        schema.with_column("level", SqliteColOption::default());
        schema.with_column(
            "parent_id",
            SqliteColOption::default().with_type_sql(SqliteDataType::INTEGER),
        );
        self.execute(&schema.finish(table.table_name()))?;

        let insert = format!(
            "INSERT INTO {} (id, code, name_en, level, parent_id) VALUES (?, ?, ?, ?, ?)",
            table
        );
        self.block_on(async {
            let mut tx = self.pool.begin().await?;
            for model in models {
                sqlx::query(&insert)
                    .bind(model.id)
                    .bind(model.code.as_deref())
                    .bind(model.name_en.as_deref())
                    .bind(model.level.as_deref())
                    .bind(model.parent_id)
                    .execute(&mut tx)
                    .await?;
            }
            tx.commit().await
        })?;
        info!(table = %table, rows = models.len(), "classification stored");
        Ok(())
    }
}

fn sql_literal(value: &AnyValue) -> String {
    match value {
        AnyValue::Null => "NULL".to_string(),
        AnyValue::Boolean(v) => {
            if *v {
                "1".to_string()
            } else {
                "0".to_string()
            }
        }
        AnyValue::String(v) => format!("'{}'", v.replace('\'', "''")),
        AnyValue::StringOwned(v) => format!("'{}'", v.replace('\'', "''")),
        AnyValue::Int32(v) => v.to_string(),
        AnyValue::Int64(v) => v.to_string(),
        AnyValue::UInt32(v) => v.to_string(),
        AnyValue::UInt64(v) => v.to_string(),
        AnyValue::Float32(v) if v.is_finite() => v.to_string(),
        AnyValue::Float64(v) if v.is_finite() => v.to_string(),
        AnyValue::Float32(_) | AnyValue::Float64(_) => "NULL".to_string(),
        _ => format!("'{}'", value.to_string().replace('\'', "''")),
    }
}

/// Bulk writer for one destination table. Builds multi-row INSERT
/// statements of at most `batch_size` rows.
#[derive(Clone)]
pub struct SqlWriter<'a> {
    db: &'a Database,
    table_name: String,
    batch_size: NonZeroUsize,
    schema: Option<SqliteSchema>,
}
impl<'a> SqlWriter<'a> {
    pub fn new<T: Into<String>>(db: &'a Database, table_name: T) -> Self {
        SqlWriter {
            db,
            table_name: table_name.into(),
            batch_size: NonZeroUsize::new(10_000).unwrap_or(NonZeroUsize::MIN),
            schema: None,
        }
    }
    pub fn with_schema(mut self, schema: Option<SqliteSchema>) -> Self {
        self.schema = schema;
        self
    }
    pub fn with_batch_size(mut self, batch_size: NonZeroUsize) -> Self {
        self.batch_size = batch_size;
        self
    }
    /// Creates the table from the frame's schema when missing, then appends
    /// every row. Returns the number of rows written.
    pub fn finish(&self, df: &DataFrame) -> Result<usize> {
        let table_name = self.table_name.as_str();
        let mut schema = SqliteSchema::from_polars_schema(df.schema());
        if let Some(declared) = self.schema.as_ref() {
            schema = schema.overlay(declared);
        }
        self.db.execute(&schema.finish(table_name))?;

        let columns = df.get_column_names_str().join(",");
        let batch_size: usize = self.batch_size.into();
        let mut offset = 0;
        while offset < df.height() {
            let batch = df.slice(offset as i64, batch_size);
            let mut row_sql = Vec::with_capacity(batch.height());
            for i in 0..batch.height() {
                if let Some(row) = batch.get(i) {
                    let values: Vec<String> = row.iter().map(sql_literal).collect();
                    row_sql.push(format!("({})", values.join(",")));
                }
            }
            let full_insert = format!(
                "INSERT INTO {} ({}) VALUES {}",
                table_name,
                columns,
                row_sql.join(",")
            );
            self.db.execute(&full_insert)?;
            debug!(table = table_name, offset, rows = batch.height(), "batch written");
            offset += batch_size;
        }
        info!(table = table_name, rows = df.height(), "table written");
        Ok(df.height())
    }
}
