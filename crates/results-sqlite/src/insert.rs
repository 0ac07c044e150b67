//! Repositories implementing the insertion cascade.
//!
//! Parents are always written before children: scan, then per host the host row,
//! its addresses/names/hops, its OS block, then its ports with their scripts.
//! Every method takes the transaction context explicitly.

use crate::context::TxContext;
use crate::schema::{
    HOSTS, HOST_ADDRESSES, HOST_NAMES, HOST_OS, HOST_OS_CLASS, HOST_OS_MATCH, HOST_OS_PORT_USED,
    HOST_TRACES_HOPS, PORTS, PORTS_SCRIPTS, SCANS,
};
use crate::{HostId, OsId, PortId, ScanId};
use anyhow::{Context, Result};
use rusqlite::params;
use scanfmt_core::{Host, Hop, HostAddress, HostName, Os, Port, ScanRun, Script, DEFAULT_DELIMITER};
use time::OffsetDateTime;
use tracing::debug;

pub struct ScanRepository;

impl ScanRepository {
    pub fn insert(&self, ctx: &TxContext<'_>, run: &ScanRun, identifier: &str) -> Result<ScanId> {
        let created = OffsetDateTime::now_utc().unix_timestamp();
        let scan_id = ctx.insert(
            &SCANS,
            params![
                identifier,
                run.scanner,
                run.args,
                run.scan_info.scan_type,
                run.scan_info.protocol,
                run.scan_info.num_services,
                run.scan_info.services,
                run.run_stats.finished.time,
                run.run_stats.finished.time_str,
                run.run_stats.finished.elapsed,
                run.run_stats.finished.summary,
                run.run_stats.finished.exit,
                run.run_stats.hosts.up,
                run.run_stats.hosts.down,
                run.run_stats.hosts.total,
                run.verbose.level,
                run.debugging.level,
                run.start,
                run.start_str,
                run.version,
                created,
            ],
        )?;
        HostRepository.insert_all(ctx, scan_id, &run.hosts)?;
        Ok(scan_id)
    }
}

pub struct HostRepository;

impl HostRepository {
    pub fn insert_all(&self, ctx: &TxContext<'_>, scan_id: ScanId, hosts: &[Host]) -> Result<()> {
        for (i, host) in hosts.iter().enumerate() {
            let host_id = self
                .insert(ctx, scan_id, host)
                .with_context(|| format!("host #{i} ({})", host.joined_addresses(DEFAULT_DELIMITER)))?;
            debug!(host_id, ports = host.ports.len(), "host projected");
        }
        Ok(())
    }

    fn insert(&self, ctx: &TxContext<'_>, scan_id: ScanId, host: &Host) -> Result<HostId> {
        let host_id = ctx.insert(
            &HOSTS,
            params![
                scan_id,
                host.joined_addresses(DEFAULT_DELIMITER),
                host.joined_host_names(DEFAULT_DELIMITER),
                host.start_time,
                host.end_time,
                host.status.state,
                host.status.reason,
                host.uptime.seconds,
                host.uptime.last_boot,
                host.distance.value,
                host.tcp_sequence.index,
                host.tcp_sequence.difficulty,
                host.tcp_sequence.values,
                host.ip_id_sequence.class,
                host.ip_id_sequence.values,
                host.tcp_ts_sequence.class,
                host.tcp_ts_sequence.values,
                host.trace.port,
                host.trace.protocol,
            ],
        )?;
        self.insert_addresses(ctx, host_id, &host.addresses)?;
        self.insert_names(ctx, host_id, &host.host_names)?;
        self.insert_hops(ctx, host_id, &host.trace.hops)?;
        if !host.os.is_empty() {
            OsRepository.insert(ctx, host_id, &host.os)?;
        }
        PortRepository.insert_all(ctx, host_id, &host.ports)?;
        Ok(host_id)
    }

    fn insert_addresses(&self, ctx: &TxContext<'_>, host_id: HostId, addresses: &[HostAddress]) -> Result<()> {
        for a in addresses {
            ctx.insert(&HOST_ADDRESSES, params![host_id, a.address, a.address_type, a.vendor])?;
        }
        Ok(())
    }

    fn insert_names(&self, ctx: &TxContext<'_>, host_id: HostId, names: &[HostName]) -> Result<()> {
        for n in names {
            ctx.insert(&HOST_NAMES, params![host_id, n.name, n.record_type])?;
        }
        Ok(())
    }

    fn insert_hops(&self, ctx: &TxContext<'_>, host_id: HostId, hops: &[Hop]) -> Result<()> {
        for h in hops {
            ctx.insert(&HOST_TRACES_HOPS, params![host_id, h.ttl, h.ip_addr, h.rtt, h.host])?;
        }
        Ok(())
    }
}

pub struct OsRepository;

impl OsRepository {
    pub fn insert(&self, ctx: &TxContext<'_>, host_id: HostId, os: &Os) -> Result<OsId> {
        let match_names: Vec<&str> = os.matches.iter().map(|m| m.name.as_str()).collect();
        let families: Vec<&str> = os.classes.iter().map(|c| c.os_family.as_str()).collect();
        let os_id = ctx.insert(
            &HOST_OS,
            params![host_id, match_names.join(DEFAULT_DELIMITER), families.join(DEFAULT_DELIMITER)],
        )?;
        for c in &os.classes {
            ctx.insert(
                &HOST_OS_CLASS,
                params![
                    os_id,
                    c.class_type,
                    c.vendor,
                    c.os_family,
                    c.os_gen,
                    c.accuracy,
                    c.cpe.join(DEFAULT_DELIMITER),
                ],
            )?;
        }
        for p in &os.port_used {
            ctx.insert(&HOST_OS_PORT_USED, params![os_id, p.state, p.protocol, p.port_id])?;
        }
        for m in &os.matches {
            ctx.insert(&HOST_OS_MATCH, params![os_id, m.name, m.accuracy, m.line])?;
        }
        Ok(os_id)
    }
}

pub struct PortRepository;

impl PortRepository {
    pub fn insert_all(&self, ctx: &TxContext<'_>, host_id: HostId, ports: &[Port]) -> Result<()> {
        for port in ports {
            let port_id = self.insert(ctx, host_id, port)?;
            self.insert_scripts(ctx, port_id, &port.scripts)?;
        }
        Ok(())
    }

    fn insert(&self, ctx: &TxContext<'_>, host_id: HostId, port: &Port) -> Result<PortId> {
        ctx.insert(
            &PORTS,
            params![
                host_id,
                port.protocol,
                port.port_id,
                port.state.state,
                port.state.reason,
                port.state.reason_ttl,
                port.service.name,
                port.service.product,
                port.service.version,
                port.service.extra_info,
                port.service.method,
                port.service.conf,
                port.service.cpe.join(DEFAULT_DELIMITER),
            ],
        )
    }

    fn insert_scripts(&self, ctx: &TxContext<'_>, port_id: PortId, scripts: &[Script]) -> Result<()> {
        for s in scripts {
            ctx.insert(&PORTS_SCRIPTS, params![port_id, s.id, s.output])?;
        }
        Ok(())
    }
}
