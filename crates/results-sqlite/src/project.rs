use crate::{ConnectionConfig, Db, Projection, ScanRepository};
use anyhow::{Context, Result};
use scanfmt_core::ScanRun;
use tracing::info;

/// Project `run` into the database behind `target` as one scan.
///
/// All rows are committed together or none are. The connection and its cached
/// statements are released on every path.
pub fn project(run: &ScanRun, target: &ConnectionConfig) -> Result<Projection> {
    let mut db = Db::open(&target.dsn)?;
    let outcome = db.project(run, target);
    db.close();
    outcome
}

impl Db {
    /// One projection on an open connection. Cached insert statements are
    /// released before returning, whatever the outcome.
    pub(crate) fn project(&mut self, run: &ScanRun, target: &ConnectionConfig) -> Result<Projection> {
        let outcome = self.insert_scan(run, target);
        self.conn.flush_prepared_statement_cache();
        outcome
    }

    fn insert_scan(&mut self, run: &ScanRun, target: &ConnectionConfig) -> Result<Projection> {
        if !self.schema_exists() {
            self.create_schema(&target.current_version)
                .context("could not generate schema")?;
        }
        let identifier = target.scan_identifier();
        let ctx = self.begin()?;
        match ScanRepository.insert(&ctx, run, &identifier) {
            Ok(scan_id) => {
                ctx.commit()?;
                info!(scan_id, identifier = %identifier, hosts = run.hosts.len(), "scan inserted");
                Ok(Projection { scan_id, identifier })
            }
            Err(e) => Err(ctx.rollback(e.context("could not insert new scan"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanfmt_core::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn target(dir: &TempDir) -> ConnectionConfig {
        let path: PathBuf = dir.path().join("scans.sqlite");
        ConnectionConfig::new(path.to_str().unwrap(), "1")
    }

    fn port(id: u16, scripts: &[(&str, &str)]) -> Port {
        Port {
            protocol: "tcp".into(),
            port_id: id,
            state: PortState { state: "open".into(), reason: "syn-ack".into(), reason_ttl: "64".into() },
            service: PortService { name: "http".into(), cpe: vec!["cpe:/a:nginx".into()], ..Default::default() },
            scripts: scripts
                .iter()
                .map(|(id, out)| Script { id: id.to_string(), output: out.to_string() })
                .collect(),
        }
    }

    fn host(ip: &str, state: &str, ports: Vec<Port>) -> Host {
        Host {
            addresses: vec![HostAddress { address: ip.into(), address_type: "ipv4".into(), ..Default::default() }],
            host_names: vec![HostName { name: "example.com".into(), record_type: "PTR".into() }],
            status: HostStatus { state: state.into(), reason: "syn-ack".into() },
            trace: Trace {
                port: "80".into(),
                protocol: "tcp".into(),
                hops: vec![
                    Hop { ttl: "1".into(), ip_addr: "10.0.0.1".into(), ..Default::default() },
                    Hop { ttl: "2".into(), ip_addr: ip.into(), ..Default::default() },
                ],
            },
            ports,
            ..Default::default()
        }
    }

    fn os() -> Os {
        Os {
            port_used: vec![OsPortUsed { state: "open".into(), protocol: "tcp".into(), port_id: 80 }],
            classes: vec![OsClass { os_family: "Linux".into(), os_gen: "5.X".into(), ..Default::default() }],
            matches: vec![
                OsMatch { name: "Linux 5.4".into(), accuracy: "98".into(), line: "1".into() },
                OsMatch { name: "Linux 5.10".into(), accuracy: "95".into(), line: "2".into() },
            ],
        }
    }

    fn run(hosts: Vec<Host>) -> ScanRun {
        ScanRun { scanner: "nmap".into(), args: "nmap -sV".into(), hosts, ..Default::default() }
    }

    fn count(cfg: &ConnectionConfig, table: &str) -> i64 {
        let db = Db::open(&cfg.dsn).unwrap();
        let n = db.count_rows(table).unwrap();
        db.close();
        n
    }

    fn inject_failure(cfg: &ConnectionConfig, table: &str, when: &str) {
        let mut db = Db::open(&cfg.dsn).unwrap();
        if !db.schema_exists() {
            db.create_schema(&cfg.current_version).unwrap();
        }
        db.conn
            .execute_batch(&format!(
                "CREATE TRIGGER fail_{table} BEFORE INSERT ON {table} {when} \
                 BEGIN SELECT RAISE(ABORT, 'injected failure'); END;"
            ))
            .unwrap();
        db.close();
    }

    #[test]
    fn single_host_port_script() {
        let dir = TempDir::new().unwrap();
        let cfg = target(&dir);
        let scan = run(vec![host("192.168.1.10", "up", vec![port(80, &[("http-title", "Welcome")])])]);
        let p = project(&scan, &cfg).unwrap();
        assert!(!p.identifier.is_empty());
        assert!(p.scan_id > 0);
        assert_eq!(count(&cfg, "scans"), 1);
        assert_eq!(count(&cfg, "hosts"), 1);
        assert_eq!(count(&cfg, "ports"), 1);
        assert_eq!(count(&cfg, "ports_scripts"), 1);
        assert_eq!(count(&cfg, "host_addresses"), 1);
        assert_eq!(count(&cfg, "host_names"), 1);
        assert_eq!(count(&cfg, "host_traces_hops"), 2);
        assert_eq!(count(&cfg, "host_os"), 0);
    }

    #[test]
    fn child_rows_reference_generated_ids() {
        let dir = TempDir::new().unwrap();
        let cfg = target(&dir);
        let mut h = host("192.168.1.10", "up", vec![port(80, &[("a", "1")]), port(443, &[("b", "2")])]);
        h.os = os();
        let p = project(&run(vec![h]), &cfg).unwrap();

        let db = Db::open(&cfg.dsn).unwrap();
        let (scan_id, addr): (i64, String) = db
            .conn
            .query_row("SELECT scan_id, nf_address_joined FROM hosts", [], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap();
        assert_eq!(scan_id, p.scan_id);
        assert_eq!(addr, "192.168.1.10");
        let linked: i64 = db
            .conn
            .query_row(
                "SELECT COUNT(1) FROM ports_scripts s JOIN ports p ON s.ports_id = p.id \
                 JOIN hosts h ON p.host_id = h.id WHERE h.scan_id = ?1",
                [p.scan_id],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(linked, 2);
        let matches: i64 = db
            .conn
            .query_row(
                "SELECT COUNT(1) FROM host_os_match m JOIN host_os o ON m.host_os_id = o.id",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(matches, 2);
        assert_eq!(db.count_rows("host_os").unwrap(), 1);
        assert_eq!(db.count_rows("host_os_class").unwrap(), 1);
        assert_eq!(db.count_rows("host_os_port_used").unwrap(), 1);
        let joined: String = db
            .conn
            .query_row("SELECT nf_match_names_joined FROM host_os", [], |r| r.get(0))
            .unwrap();
        assert_eq!(joined, "Linux 5.4, Linux 5.10");
        db.close();
    }

    #[test]
    fn schema_created_once() {
        let dir = TempDir::new().unwrap();
        let mut cfg = target(&dir);
        project(&run(vec![]), &cfg).unwrap();
        cfg.current_version = "2".into();
        project(&run(vec![]), &cfg).unwrap();

        let db = Db::open(&cfg.dsn).unwrap();
        for table in crate::schema::ALL {
            assert!(db.has_table(table.name).unwrap(), "missing table {}", table.name);
        }
        assert!(db.has_table("sqlite_sequence").is_err());
        assert_eq!(db.count_rows("nf_schema").unwrap(), 1);
        assert_eq!(db.schema_version().unwrap().as_deref(), Some("1"));
        assert_eq!(db.count_rows("scans").unwrap(), 2);
        db.close();
    }

    #[test]
    fn fresh_database_has_no_tables() {
        let db = Db::open(":memory:").unwrap();
        assert!(!db.has_table("scans").unwrap());
        db.close();
    }

    #[test]
    fn one_connection_projects_repeatedly() {
        let dir = TempDir::new().unwrap();
        let cfg = target(&dir);
        let mut db = Db::open(&cfg.dsn).unwrap();
        let hosts = || vec![Host { ports: vec![port(22, &[("banner", "ssh")])], ..Default::default() }];
        let a = db.project(&run(hosts()), &cfg).unwrap();
        let b = db.project(&run(hosts()), &cfg).unwrap();
        assert_ne!(a.scan_id, b.scan_id);
        assert_eq!(db.count_rows("scans").unwrap(), 2);
        assert_eq!(db.count_rows("ports").unwrap(), 2);
        assert_eq!(db.count_rows("ports_scripts").unwrap(), 2);
        db.close();
    }

    #[test]
    fn generated_identifiers_differ() {
        let dir = TempDir::new().unwrap();
        let cfg = target(&dir);
        let a = project(&run(vec![]), &cfg).unwrap();
        let b = project(&run(vec![]), &cfg).unwrap();
        assert_ne!(a.identifier, b.identifier);
        assert_ne!(a.scan_id, b.scan_id);
    }

    #[test]
    fn pinned_identifier_is_stored() {
        let dir = TempDir::new().unwrap();
        let cfg = target(&dir).with_scan_identifier("nightly");
        let p = project(&run(vec![]), &cfg).unwrap();
        assert_eq!(p.identifier, "nightly");
        let db = Db::open(&cfg.dsn).unwrap();
        let stored: String = db
            .conn
            .query_row("SELECT nf_identifier FROM scans WHERE id = ?1", [p.scan_id], |r| r.get(0))
            .unwrap();
        assert_eq!(stored, "nightly");
        db.close();
    }

    #[test]
    fn addressless_host_is_projected() {
        let dir = TempDir::new().unwrap();
        let cfg = target(&dir);
        let scan = run(vec![Host { status: HostStatus { state: "down".into(), ..Default::default() }, ..Default::default() }]);
        project(&scan, &cfg).unwrap();
        assert_eq!(count(&cfg, "hosts"), 1);
        assert_eq!(count(&cfg, "host_addresses"), 0);
    }

    #[test]
    fn failed_port_insert_rolls_back_everything() {
        let dir = TempDir::new().unwrap();
        let cfg = target(&dir);
        inject_failure(&cfg, "ports", "WHEN NEW.port_id = 8443");
        let scan = run(vec![
            host("192.168.1.10", "up", vec![port(80, &[("a", "1")]), port(443, &[])]),
            host("192.168.1.11", "up", vec![port(22, &[]), port(8443, &[])]),
        ]);
        let err = project(&scan, &cfg).unwrap_err();
        assert!(format!("{err:#}").contains("injected failure"));
        for table in ["scans", "hosts", "host_addresses", "host_names", "host_traces_hops", "ports", "ports_scripts"] {
            assert_eq!(count(&cfg, table), 0, "{table}");
        }
    }

    #[test]
    fn failed_os_match_insert_rolls_back_everything() {
        let dir = TempDir::new().unwrap();
        let cfg = target(&dir);
        let mut h = host("192.168.1.10", "up", vec![port(80, &[])]);
        h.os = os();
        project(&run(vec![host("192.168.1.20", "up", vec![port(22, &[])])]), &cfg).unwrap();

        inject_failure(&cfg, "host_os_match", "");
        let err = project(&run(vec![h]), &cfg).unwrap_err();
        let text = format!("{err:#}");
        assert!(text.contains("could not insert new scan"));
        assert!(text.contains("host_os_match"));
        assert!(err.downcast_ref::<crate::RollbackFailed>().is_none());

        // only the earlier, successful scan remains
        assert_eq!(count(&cfg, "scans"), 1);
        assert_eq!(count(&cfg, "hosts"), 1);
        assert_eq!(count(&cfg, "ports"), 1);
        assert_eq!(count(&cfg, "host_os"), 0);
    }
}
