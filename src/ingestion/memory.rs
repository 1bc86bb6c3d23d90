//! In-process database implementing both [`DatabaseHandle`] and [`QueryEngine`].
//!
//! Backed by an in-memory DuckDB connection. Registered buffers are written to a private
//! scratch directory that is set as DuckDB's `file_search_path`, so generated statements such
//! as
//!
//! ```sql
//! CREATE TABLE t AS SELECT *, 'a.csv' AS filename FROM 'data-0.csv'
//! ```
//!
//! resolve `'data-0.csv'` to the registered buffer. DuckDB picks the reader (CSV, JSON/NDJSON,
//! Parquet) from the extension in the buffer name.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use duckdb::types::Value as SqlValue;
use duckdb::{params, Connection};
use tempfile::TempDir;

use crate::error::{ImportError, ImportResult};
use crate::types::{DataSet, DataType, Field, Schema, Value};

use super::engine::{quote_literal, DatabaseHandle, QueryEngine};

/// In-memory DuckDB database with a scratch directory for registered buffers.
pub struct MemoryDatabase {
    conn: Arc<Mutex<Connection>>,
    scratch: TempDir,
    files: Mutex<BTreeSet<String>>,
    statements: Mutex<Vec<String>>,
}

impl MemoryDatabase {
    /// Create a new database with an empty catalog and no registered buffers.
    pub fn new() -> ImportResult<Self> {
        let scratch = tempfile::tempdir()?;
        let conn = Connection::open_in_memory().map_err(database_error)?;
        let search_path = quote_literal(&scratch.path().to_string_lossy());
        conn.execute_batch(&format!("SET file_search_path = {search_path}"))
            .map_err(database_error)?;
        tracing::debug!(scratch = %scratch.path().display(), "opened in-memory duckdb");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            scratch,
            files: Mutex::new(BTreeSet::new()),
            statements: Mutex::new(Vec::new()),
        })
    }

    /// Read table `name` back as a [`DataSet`], columns in table order.
    pub fn table(&self, name: &str) -> ImportResult<DataSet> {
        let conn = lock(&self.conn)?;

        let mut columns = conn
            .prepare(
                "SELECT column_name, data_type FROM information_schema.columns \
                 WHERE table_name = ? ORDER BY ordinal_position",
            )
            .map_err(database_error)?;
        let fields = columns
            .query_map(params![name], |row| {
                let column: String = row.get(0)?;
                let sql_type: String = row.get(1)?;
                Ok(Field::new(column, data_type_from_sql(&sql_type)))
            })
            .map_err(database_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(database_error)?;
        if fields.is_empty() {
            return Err(ImportError::Query {
                message: format!("table '{name}' does not exist"),
            });
        }

        let width = fields.len();
        let mut select = conn
            .prepare(&format!("SELECT * FROM {}", quote_identifier(name)))
            .map_err(database_error)?;
        let rows = select
            .query_map([], |row| {
                (0..width)
                    .map(|idx| row.get::<_, SqlValue>(idx).map(convert_value))
                    .collect::<duckdb::Result<Vec<Value>>>()
            })
            .map_err(database_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(database_error)?;

        Ok(DataSet::new(Schema::new(fields), rows))
    }

    /// Every statement passed to [`QueryEngine::query`], in call order.
    pub fn statements(&self) -> Vec<String> {
        lock(&self.statements).map(|s| s.clone()).unwrap_or_default()
    }

    /// Names of the currently registered buffers, sorted.
    pub fn registered_files(&self) -> Vec<String> {
        lock(&self.files)
            .map(|f| f.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn buffer_path(&self, name: &str) -> ImportResult<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(ImportError::Database {
                message: format!("invalid buffer name '{name}'"),
            });
        }
        Ok(self.scratch.path().join(name))
    }
}

impl fmt::Debug for MemoryDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDatabase")
            .field("scratch", &self.scratch.path())
            .field("files", &self.registered_files())
            .finish()
    }
}

#[async_trait]
impl DatabaseHandle for MemoryDatabase {
    async fn register_file_buffer(&self, name: &str, bytes: Bytes) -> ImportResult<()> {
        let path = self.buffer_path(name)?;
        tracing::debug!(name, bytes = bytes.len(), "register file buffer");
        tokio::fs::write(&path, &bytes).await?;
        lock(&self.files)?.insert(name.to_string());
        Ok(())
    }

    async fn drop_file(&self, name: &str) -> ImportResult<()> {
        let path = self.buffer_path(name)?;
        if !lock(&self.files)?.remove(name) {
            return Err(ImportError::Database {
                message: format!("no registered file named '{name}'"),
            });
        }
        tokio::fs::remove_file(&path).await?;
        Ok(())
    }
}

#[async_trait]
impl QueryEngine for MemoryDatabase {
    async fn query(&self, sql: &str) -> ImportResult<()> {
        lock(&self.statements)?.push(sql.to_string());

        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            conn.execute_batch(&sql).map_err(|e| ImportError::Query {
                message: e.to_string(),
            })
        })
        .await
        .map_err(|e| ImportError::Database {
            message: format!("query task failed: {e}"),
        })?
    }
}

fn lock<T>(m: &Mutex<T>) -> ImportResult<MutexGuard<'_, T>> {
    m.lock().map_err(|_| ImportError::Database {
        message: "memory database mutex poisoned".to_string(),
    })
}

fn database_error(e: duckdb::Error) -> ImportError {
    ImportError::Database {
        message: e.to_string(),
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn data_type_from_sql(sql_type: &str) -> DataType {
    let upper = sql_type.to_ascii_uppercase();
    match upper.as_str() {
        "TINYINT" | "SMALLINT" | "INTEGER" | "BIGINT" | "HUGEINT" | "UTINYINT" | "USMALLINT"
        | "UINTEGER" | "UBIGINT" => DataType::Int64,
        "FLOAT" | "REAL" | "DOUBLE" => DataType::Float64,
        "BOOLEAN" => DataType::Bool,
        _ => DataType::Utf8,
    }
}

fn convert_value(v: SqlValue) -> Value {
    match v {
        SqlValue::Null => Value::Null,
        SqlValue::Boolean(b) => Value::Bool(b),
        SqlValue::TinyInt(n) => Value::Int64(i64::from(n)),
        SqlValue::SmallInt(n) => Value::Int64(i64::from(n)),
        SqlValue::Int(n) => Value::Int64(i64::from(n)),
        SqlValue::BigInt(n) => Value::Int64(n),
        SqlValue::UTinyInt(n) => Value::Int64(i64::from(n)),
        SqlValue::USmallInt(n) => Value::Int64(i64::from(n)),
        SqlValue::UInt(n) => Value::Int64(i64::from(n)),
        SqlValue::UBigInt(n) => {
            i64::try_from(n).map_or_else(|_| Value::Utf8(n.to_string()), Value::Int64)
        }
        SqlValue::HugeInt(n) => {
            i64::try_from(n).map_or_else(|_| Value::Utf8(n.to_string()), Value::Int64)
        }
        SqlValue::Float(f) => Value::Float64(f64::from(f)),
        SqlValue::Double(f) => Value::Float64(f),
        SqlValue::Text(s) => Value::Utf8(s),
        other => Value::Utf8(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_types_map_to_column_types() {
        assert_eq!(data_type_from_sql("BIGINT"), DataType::Int64);
        assert_eq!(data_type_from_sql("double"), DataType::Float64);
        assert_eq!(data_type_from_sql("DECIMAL(18,3)"), DataType::Utf8);
        assert_eq!(data_type_from_sql("BOOLEAN"), DataType::Bool);
        assert_eq!(data_type_from_sql("VARCHAR"), DataType::Utf8);
        assert_eq!(data_type_from_sql("DATE"), DataType::Utf8);
    }

    #[tokio::test]
    async fn create_then_insert_reads_registered_buffers() {
        let db = MemoryDatabase::new().unwrap();
        db.register_file_buffer("data-0.csv", Bytes::from_static(b"id,score\n1,2.5\n"))
            .await
            .unwrap();
        db.register_file_buffer("data-1.json", Bytes::from_static(br#"[{"id":7,"score":3.5}]"#))
            .await
            .unwrap();

        db.query("CREATE TABLE t AS SELECT * FROM 'data-0.csv'").await.unwrap();
        db.query("INSERT INTO t SELECT * FROM 'data-1.json'").await.unwrap();

        let t = db.table("t").unwrap();
        assert_eq!(t.schema.field_names().collect::<Vec<_>>(), vec!["id", "score"]);
        assert_eq!(
            t.rows,
            vec![
                vec![Value::Int64(1), Value::Float64(2.5)],
                vec![Value::Int64(7), Value::Float64(3.5)],
            ]
        );
    }

    #[tokio::test]
    async fn failed_insert_leaves_table_unchanged() {
        let db = MemoryDatabase::new().unwrap();
        db.register_file_buffer("a.csv", Bytes::from_static(b"v\n1\n")).await.unwrap();
        db.register_file_buffer("b.csv", Bytes::from_static(b"v\nabc\n")).await.unwrap();

        db.query("CREATE TABLE t AS SELECT * FROM 'a.csv'").await.unwrap();
        let err = db.query("INSERT INTO t SELECT * FROM 'b.csv'").await.unwrap_err();
        assert!(matches!(err, ImportError::Query { .. }), "{err:?}");
        assert_eq!(db.table("t").unwrap().row_count(), 1);
    }

    #[tokio::test]
    async fn table_lifecycle_errors() {
        let db = MemoryDatabase::new().unwrap();
        db.register_file_buffer("a.csv", Bytes::from_static(b"x\n1\n")).await.unwrap();

        let missing = db.query("INSERT INTO t SELECT * FROM 'a.csv'").await.unwrap_err();
        assert!(matches!(missing, ImportError::Query { .. }));

        db.query("CREATE TABLE t AS SELECT * FROM 'a.csv'").await.unwrap();
        let dup = db.query("CREATE TABLE t AS SELECT * FROM 'a.csv'").await.unwrap_err();
        assert!(matches!(dup, ImportError::Query { .. }));

        db.drop_file("a.csv").await.unwrap();
        assert!(matches!(
            db.drop_file("a.csv").await,
            Err(ImportError::Database { .. })
        ));
        assert!(db.registered_files().is_empty());
        assert_eq!(db.statements().len(), 3);
        assert!(matches!(db.table("nope"), Err(ImportError::Query { .. })));
    }

    #[tokio::test]
    async fn buffer_names_cannot_escape_scratch_dir() {
        let db = MemoryDatabase::new().unwrap();
        for name in ["", "..", "../x.csv", "dir/x.csv"] {
            let err = db
                .register_file_buffer(name, Bytes::from_static(b"x\n1\n"))
                .await
                .unwrap_err();
            assert!(matches!(err, ImportError::Database { .. }), "{name}");
        }
        assert!(db.registered_files().is_empty());
    }

    #[tokio::test]
    async fn buffer_without_extension_has_no_reader() {
        let db = MemoryDatabase::new().unwrap();
        db.register_file_buffer("data-0", Bytes::from_static(b"a,b\n1,2\n")).await.unwrap();

        let err = db.query("CREATE TABLE t AS SELECT * FROM 'data-0'").await.unwrap_err();
        assert!(matches!(err, ImportError::Query { .. }));
        assert_eq!(db.registered_files(), vec!["data-0".to_string()]);
    }
}
