use crate::context::TxContext;
use crate::schema::{self, NF_SCHEMA};
use anyhow::{Context, Result};
use rusqlite::Connection;
use std::time::Duration;
use tracing::{debug, warn};

const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Distinct insert statements in one projection, with headroom.
const STATEMENT_CACHE_CAPACITY: usize = 32;

pub struct Db {
    pub conn: Connection,
}

impl Db {
    /// Open `dsn` (a path or `file:` URI) and tune it for bulk writes.
    pub fn open(dsn: &str) -> Result<Self> {
        let conn = Connection::open(dsn).with_context(|| format!("could not open database {dsn}"))?;
        apply_pragmas(&conn)?;
        conn.set_prepared_statement_cache_capacity(STATEMENT_CACHE_CAPACITY);
        Ok(Db { conn })
    }

    /// The metadata table answering a query is the only signal that the schema exists.
    pub fn schema_exists(&self) -> bool {
        let mut stmt = match self.conn.prepare("SELECT version FROM nf_schema LIMIT 1") {
            Ok(stmt) => stmt,
            Err(_) => return false,
        };
        let answered = stmt.query([]).is_ok();
        answered
    }

    /// Create every table and stamp `version` into the metadata table.
    /// Runs in its own transaction, never inside a data transaction.
    pub fn create_schema(&mut self, version: &str) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(&schema::ddl())?;
        tx.execute("DELETE FROM nf_schema", [])
            .context("could not clean nf_schema table")?;
        tx.execute(&NF_SCHEMA.insert_sql(), [version])
            .context("could not insert new nf_schema version")?;
        tx.commit()?;
        debug!(version, "schema created");
        Ok(())
    }

    /// Start the data transaction that every repository writes through.
    pub fn begin(&mut self) -> Result<TxContext<'_>> {
        let tx = self.conn.transaction().context("could not start transaction")?;
        Ok(TxContext::new(tx))
    }

    /// Release cached statements, then the connection. Failures are logged, not returned:
    /// by now the commit or rollback has already happened.
    pub fn close(self) {
        self.conn.flush_prepared_statement_cache();
        if let Err((_, e)) = self.conn.close() {
            warn!(error = %e, "failed to close database");
        }
    }
}

fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous")?;
    let mode: String = conn
        .pragma_update_and_check(None, "journal_mode", "WAL", |r| r.get(0))
        .context("failed to set journal_mode")?;
    debug!(journal_mode = %mode, "journal mode");
    conn.pragma_update(None, "cache_size", -64000i64) // 64 MB
        .context("failed to set cache_size")?;
    conn.pragma_update(None, "temp_store", "MEMORY")
        .context("failed to set temp_store")?;
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("failed to set foreign_keys")?;
    conn.busy_timeout(BUSY_TIMEOUT).context("failed to set busy_timeout")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_target_has_no_schema() {
        let db = Db::open(":memory:").unwrap();
        assert!(!db.schema_exists());
    }

    #[test]
    fn schema_stamped_with_version() {
        let mut db = Db::open(":memory:").unwrap();
        db.create_schema("1.2.3").unwrap();
        assert!(db.schema_exists());
        assert_eq!(db.schema_version().unwrap().as_deref(), Some("1.2.3"));
    }

    #[test]
    fn recreating_schema_replaces_version_row() {
        let mut db = Db::open(":memory:").unwrap();
        db.create_schema("1").unwrap();
        db.create_schema("2").unwrap();
        assert_eq!(db.count_rows("nf_schema").unwrap(), 1);
        assert_eq!(db.schema_version().unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn unopenable_target_is_an_error() {
        let err = Db::open("/nonexistent-dir/deeper/scan.sqlite").err().unwrap();
        assert!(format!("{err:#}").contains("could not open database"));
    }

    #[test]
    fn foreign_keys_enforced() {
        let mut db = Db::open(":memory:").unwrap();
        db.create_schema("1").unwrap();
        let res = db.conn.execute("INSERT INTO hosts (scan_id) VALUES (42)", []);
        assert!(res.is_err());
    }
}
