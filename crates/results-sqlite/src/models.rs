use uuid::Uuid;

pub type ScanId = i64;
pub type HostId = i64;
pub type OsId = i64;
pub type PortId = i64;

/// Where and how a scan is projected.
#[derive(Debug, Clone, Default)]
pub struct ConnectionConfig {
    /// SQLite path or `file:` URI.
    pub dsn: String,
    /// Pinned scan identifier; a random one is generated when absent or empty.
    pub scan_identifier: Option<String>,
    /// Stamped into `nf_schema` when the schema is first created.
    pub current_version: String,
}

impl ConnectionConfig {
    pub fn new(dsn: impl Into<String>, current_version: impl Into<String>) -> Self {
        ConnectionConfig { dsn: dsn.into(), scan_identifier: None, current_version: current_version.into() }
    }

    pub fn with_scan_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.scan_identifier = Some(identifier.into());
        self
    }

    pub fn scan_identifier(&self) -> String {
        match self.scan_identifier.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        }
    }
}

/// Outcome of a committed projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub scan_id: ScanId,
    pub identifier: String,
}
