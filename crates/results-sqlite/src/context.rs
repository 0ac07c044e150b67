use crate::error::RollbackFailed;
use crate::schema::{self, Table};
use anyhow::{anyhow, Context, Result};
use rusqlite::{ToSql, Transaction};
use std::collections::HashMap;

/// Everything a repository needs while the data transaction is open.
///
/// Statements are prepared through the connection's cache keyed by SQL text,
/// and flushed when the owning [`crate::Db`] is closed.
pub struct TxContext<'conn> {
    tx: Transaction<'conn>,
    statements: HashMap<&'static str, String>,
}

impl<'conn> TxContext<'conn> {
    pub(crate) fn new(tx: Transaction<'conn>) -> Self {
        let statements = schema::ALL.iter().map(|t| (t.name, t.insert_sql())).collect();
        TxContext { tx, statements }
    }

    /// Insert one row into `table` and return its generated id.
    pub fn insert(&self, table: &Table, params: &[&dyn ToSql]) -> Result<i64> {
        let sql = self
            .statements
            .get(table.name)
            .ok_or_else(|| anyhow!("no insert statement for table {}", table.name))?;
        let mut stmt = self
            .tx
            .prepare_cached(sql)
            .with_context(|| format!("could not prepare insert into {}", table.name))?;
        stmt.execute(params)
            .with_context(|| format!("insert into {} failed", table.name))?;
        Ok(self.tx.last_insert_rowid())
    }

    pub fn commit(self) -> Result<()> {
        self.tx.commit().context("failed commit")
    }

    /// Roll back after `cause`. Returns `cause` itself, or [`RollbackFailed`] carrying both.
    pub fn rollback(self, cause: anyhow::Error) -> anyhow::Error {
        match self.tx.rollback() {
            Ok(()) => cause,
            Err(rollback) => RollbackFailed { rollback, cause }.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Db;

    #[test]
    fn rollback_failure_keeps_both_errors() {
        let mut db = Db::open(":memory:").unwrap();
        let ctx = db.begin().unwrap();
        // end the transaction behind the context's back so its own rollback fails
        ctx.tx.execute_batch("ROLLBACK").unwrap();
        let err = ctx.rollback(anyhow!("insert into hosts failed"));
        let failed = err.downcast_ref::<RollbackFailed>().expect("rollback failure");
        assert_eq!(failed.cause.to_string(), "insert into hosts failed");
        let text = format!("{err:#}");
        assert!(text.contains("insert into hosts failed"), "{text}");
        assert_eq!(text.matches("no transaction is active").count(), 1, "{text}");
        db.close();
    }

    #[test]
    fn clean_rollback_returns_the_cause() {
        let mut db = Db::open(":memory:").unwrap();
        let ctx = db.begin().unwrap();
        let err = ctx.rollback(anyhow!("boom"));
        assert!(err.downcast_ref::<RollbackFailed>().is_none());
        assert_eq!(err.to_string(), "boom");
        db.close();
    }
}
