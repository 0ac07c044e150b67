//! Relational layout of a projected scan.
//!
//! Each table is declared once; both the DDL and the parameterized insert
//! statement are generated from the same ordered column list, so repositories
//! bind values in declaration order: parent id first, then `columns`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Real,
    Text,
}

impl SqlType {
    fn keyword(self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub sql_type: SqlType,
}

const fn text(name: &'static str) -> Column {
    Column { name, sql_type: SqlType::Text }
}

const fn integer(name: &'static str) -> Column {
    Column { name, sql_type: SqlType::Integer }
}

const fn real(name: &'static str) -> Column {
    Column { name, sql_type: SqlType::Real }
}

/// Column holding the generated id of the parent row.
#[derive(Debug, Clone, Copy)]
pub struct ForeignKey {
    pub column: &'static str,
    pub table: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct Table {
    pub name: &'static str,
    /// Adds `id INTEGER NOT NULL PRIMARY KEY`; only the metadata table goes without.
    pub keyed: bool,
    pub parent: Option<ForeignKey>,
    pub columns: &'static [Column],
}

impl Table {
    /// Column names in bind order.
    pub fn column_names(&self) -> Vec<&'static str> {
        self.parent
            .iter()
            .map(|fk| fk.column)
            .chain(self.columns.iter().map(|c| c.name))
            .collect()
    }

    pub fn create_sql(&self) -> String {
        let mut defs = Vec::with_capacity(self.columns.len() + 2);
        if self.keyed {
            defs.push("id INTEGER NOT NULL PRIMARY KEY".to_string());
        }
        if let Some(fk) = self.parent {
            defs.push(format!("{} INTEGER NOT NULL REFERENCES {}(id)", fk.column, fk.table));
        }
        defs.extend(self.columns.iter().map(|c| format!("{} {}", c.name, c.sql_type.keyword())));
        let mut sql = format!("CREATE TABLE IF NOT EXISTS {} (\n  {}\n);\n", self.name, defs.join(",\n  "));
        if let Some(fk) = self.parent {
            sql.push_str(&format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_{col} ON {table}({col});\n",
                table = self.name,
                col = fk.column
            ));
        }
        sql
    }

    pub fn insert_sql(&self) -> String {
        let names = self.column_names();
        let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();
        format!("INSERT INTO {} ({}) VALUES ({})", self.name, names.join(", "), placeholders.join(", "))
    }
}

pub const SCANS: Table = Table {
    name: "scans",
    keyed: true,
    parent: None,
    columns: &[
        text("nf_identifier"),
        text("scanner"),
        text("args"),
        text("scan_info_type"),
        text("scan_info_protocol"),
        integer("scan_info_num_services"),
        text("scan_info_services"),
        integer("run_stats_finished_time"),
        text("run_stats_finished_time_str"),
        real("run_stats_finished_elapsed"),
        text("run_stats_finished_summary"),
        text("run_stats_finished_exit"),
        integer("run_stats_stat_hosts_up"),
        integer("run_stats_stat_hosts_down"),
        integer("run_stats_stat_hosts_total"),
        integer("verbose_level"),
        integer("debugging_level"),
        integer("start"),
        text("start_str"),
        text("version"),
        integer("nf_created"),
    ],
};

pub const HOSTS: Table = Table {
    name: "hosts",
    keyed: true,
    parent: Some(ForeignKey { column: "scan_id", table: "scans" }),
    columns: &[
        text("nf_address_joined"),
        text("nf_host_names_joined"),
        integer("start_time"),
        integer("end_time"),
        text("status_state"),
        text("status_reason"),
        text("uptime_seconds"),
        text("uptime_last_boot"),
        text("distance_value"),
        text("tcp_sequence_index"),
        text("tcp_sequence_difficulty"),
        text("tcp_sequence_values"),
        text("ip_id_sequence_class"),
        text("ip_id_sequence_values"),
        text("tcp_ts_sequence_class"),
        text("tcp_ts_sequence_values"),
        text("traces_port"),
        text("traces_protocol"),
    ],
};

pub const HOST_ADDRESSES: Table = Table {
    name: "host_addresses",
    keyed: true,
    parent: Some(ForeignKey { column: "host_id", table: "hosts" }),
    columns: &[text("address"), text("address_type"), text("vendor")],
};

pub const HOST_NAMES: Table = Table {
    name: "host_names",
    keyed: true,
    parent: Some(ForeignKey { column: "host_id", table: "hosts" }),
    columns: &[text("name"), text("type")],
};

pub const HOST_TRACES_HOPS: Table = Table {
    name: "host_traces_hops",
    keyed: true,
    parent: Some(ForeignKey { column: "host_id", table: "hosts" }),
    columns: &[text("ttl"), text("ip_address"), text("rtt"), text("host")],
};

pub const HOST_OS: Table = Table {
    name: "host_os",
    keyed: true,
    parent: Some(ForeignKey { column: "host_id", table: "hosts" }),
    columns: &[text("nf_match_names_joined"), text("nf_os_families_joined")],
};

pub const HOST_OS_CLASS: Table = Table {
    name: "host_os_class",
    keyed: true,
    parent: Some(ForeignKey { column: "host_os_id", table: "host_os" }),
    columns: &[
        text("type"),
        text("vendor"),
        text("osfamily"),
        text("osgen"),
        text("accuracy"),
        text("cpe"),
    ],
};

pub const HOST_OS_PORT_USED: Table = Table {
    name: "host_os_port_used",
    keyed: true,
    parent: Some(ForeignKey { column: "host_os_id", table: "host_os" }),
    columns: &[text("state"), text("protocol"), integer("port_id")],
};

pub const HOST_OS_MATCH: Table = Table {
    name: "host_os_match",
    keyed: true,
    parent: Some(ForeignKey { column: "host_os_id", table: "host_os" }),
    columns: &[text("name"), text("accuracy"), text("line")],
};

pub const PORTS: Table = Table {
    name: "ports",
    keyed: true,
    parent: Some(ForeignKey { column: "host_id", table: "hosts" }),
    columns: &[
        text("protocol"),
        integer("port_id"),
        text("state_state"),
        text("state_reason"),
        text("state_reason_ttl"),
        text("service_name"),
        text("service_product"),
        text("service_version"),
        text("service_extra_info"),
        text("service_method"),
        text("service_conf"),
        text("service_cpe"),
    ],
};

pub const PORTS_SCRIPTS: Table = Table {
    name: "ports_scripts",
    keyed: true,
    parent: Some(ForeignKey { column: "ports_id", table: "ports" }),
    columns: &[text("script_id"), text("script_output")],
};

/// Single-row metadata table; its presence marks an existing schema.
pub const NF_SCHEMA: Table = Table {
    name: "nf_schema",
    keyed: false,
    parent: None,
    columns: &[text("version")],
};

/// Every table, parents before children.
pub const ALL: &[&Table] = &[
    &SCANS,
    &HOSTS,
    &HOST_ADDRESSES,
    &HOST_NAMES,
    &HOST_TRACES_HOPS,
    &HOST_OS,
    &HOST_OS_CLASS,
    &HOST_OS_PORT_USED,
    &HOST_OS_MATCH,
    &PORTS,
    &PORTS_SCRIPTS,
    &NF_SCHEMA,
];

pub fn table(name: &str) -> Option<&'static Table> {
    ALL.iter().copied().find(|t| t.name == name)
}

pub fn ddl() -> String {
    ALL.iter().map(|t| t.create_sql()).collect()
}
