use crate::{schema, Db};
use anyhow::{anyhow, Result};
use rusqlite::OptionalExtension;

impl Db {
    /// Whether the projection has created `table`. Names outside the schema are an error.
    pub fn has_table(&self, table: &str) -> Result<bool> {
        let t = schema::table(table).ok_or_else(|| anyhow!("unknown table: {table}"))?;
        let found = self
            .conn
            .query_row("SELECT 1 FROM sqlite_schema WHERE type = 'table' AND name = ?1", [t.name], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// Row count of one of the projection tables.
    pub fn count_rows(&self, table: &str) -> Result<i64> {
        let t = schema::table(table).ok_or_else(|| anyhow!("unknown table: {table}"))?;
        let cnt: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(1) FROM {}", t.name), [], |r| r.get(0))?;
        Ok(cnt)
    }

    /// Version stamped when the schema was created, if any.
    pub fn schema_version(&self) -> Result<Option<String>> {
        let v = self
            .conn
            .query_row("SELECT version FROM nf_schema LIMIT 1", [], |r| r.get(0))
            .optional()?;
        Ok(v)
    }
}
