use serde::{Deserialize, Serialize};

/// One completed scan: run metadata plus every scanned host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanRun {
    pub scanner: String,
    pub args: String,
    pub start: i64,
    pub start_str: String,
    pub version: String,
    pub scan_info: ScanInfo,
    pub hosts: Vec<Host>,
    pub verbose: Verbose,
    pub debugging: Debugging,
    pub run_stats: RunStats,
}

impl ScanRun {
    /// A copy of this run's metadata carrying `hosts` instead of the original host list.
    pub fn with_hosts(&self, hosts: Vec<Host>) -> ScanRun {
        ScanRun {
            scanner: self.scanner.clone(),
            args: self.args.clone(),
            start: self.start,
            start_str: self.start_str.clone(),
            version: self.version.clone(),
            scan_info: self.scan_info.clone(),
            hosts,
            verbose: self.verbose.clone(),
            debugging: self.debugging.clone(),
            run_stats: self.run_stats.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanInfo {
    #[serde(rename = "type")]
    pub scan_type: String,
    pub protocol: String,
    pub num_services: i64,
    pub services: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Verbose {
    pub level: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Debugging {
    pub level: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunStats {
    pub finished: Finished,
    pub hosts: StatHosts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Finished {
    pub time: i64,
    pub time_str: String,
    pub elapsed: f64,
    pub summary: String,
    pub exit: String,
}

/// Host counters as reported by the scanner. `up + down == total` is not checked here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatHosts {
    pub up: i64,
    pub down: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Host {
    pub start_time: i64,
    pub end_time: i64,
    pub ports: Vec<Port>,
    pub addresses: Vec<HostAddress>,
    pub host_names: Vec<HostName>,
    pub status: HostStatus,
    pub os: Os,
    pub trace: Trace,
    pub uptime: Uptime,
    pub distance: Distance,
    pub tcp_sequence: TcpSequence,
    pub ip_id_sequence: IpIdSequence,
    pub tcp_ts_sequence: TcpTsSequence,
}

impl Host {
    /// Address values in declaration order, joined with `delim`. Empty for an address-less host.
    pub fn joined_addresses(&self, delim: &str) -> String {
        self.addresses
            .iter()
            .map(|a| a.address.as_str())
            .collect::<Vec<_>>()
            .join(delim)
    }

    pub fn joined_host_names(&self, delim: &str) -> String {
        self.host_names
            .iter()
            .map(|n| n.name.as_str())
            .collect::<Vec<_>>()
            .join(delim)
    }

    pub fn is_up(&self) -> bool {
        self.status.state == "up"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostAddress {
    pub address: String,
    pub address_type: String,
    pub vendor: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostName {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostStatus {
    pub state: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Port {
    pub protocol: String,
    pub port_id: u16,
    pub state: PortState,
    pub service: PortService,
    pub scripts: Vec<Script>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortState {
    pub state: String,
    pub reason: String,
    pub reason_ttl: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortService {
    pub name: String,
    pub product: String,
    pub version: String,
    pub extra_info: String,
    pub method: String,
    pub conf: String,
    pub cpe: Vec<String>,
}

/// Output of a port script (NSE-style).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Script {
    pub id: String,
    pub output: String,
}

/// OS fingerprint data. Classes and matches are lists; older records usually carry one of each.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Os {
    pub port_used: Vec<OsPortUsed>,
    pub classes: Vec<OsClass>,
    pub matches: Vec<OsMatch>,
}

impl Os {
    pub fn is_empty(&self) -> bool {
        self.port_used.is_empty() && self.classes.is_empty() && self.matches.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsPortUsed {
    pub state: String,
    pub protocol: String,
    pub port_id: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsClass {
    #[serde(rename = "type")]
    pub class_type: String,
    pub vendor: String,
    pub os_family: String,
    pub os_gen: String,
    pub accuracy: String,
    pub cpe: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsMatch {
    pub name: String,
    pub accuracy: String,
    pub line: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Trace {
    pub port: String,
    pub protocol: String,
    pub hops: Vec<Hop>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hop {
    pub ttl: String,
    pub ip_addr: String,
    pub rtt: String,
    pub host: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Uptime {
    pub seconds: String,
    pub last_boot: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Distance {
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpSequence {
    pub index: String,
    pub difficulty: String,
    pub values: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpIdSequence {
    pub class: String,
    pub values: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpTsSequence {
    pub class: String,
    pub values: String,
}
