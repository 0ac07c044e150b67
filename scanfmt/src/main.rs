use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use results_sqlite::ConnectionConfig;
use scanfmt_core::{trace, ScanRun};
use std::fs::OpenOptions;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod config;

use config::Config;

const UP_FILTER: &str = r#"Status.State == "up""#;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat { Text, Json }

#[derive(Debug, Parser)]
#[command(name = "scanfmt", version, about = "Filter scan results and project them into SQLite")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./scanfmt.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Args)]
struct FilterArgs {
    /// Filter expression; repeat to require several
    #[arg(long = "filter", value_name = "EXPR")]
    filters: Vec<String>,
    /// Keep only hosts whose status is "up"
    #[arg(long, default_value_t = false)]
    skip_down_hosts: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// Write the hosts matching every filter as JSON
    Filter {
        /// Scan JSON file, or - for stdin
        input: PathBuf,
        #[command(flatten)]
        filter: FilterArgs,
        /// Output file (overwrites)
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
        #[arg(long, default_value_t = false)]
        pretty: bool,
    },
    /// Store the (filtered) scan in a SQLite database
    Sqlite {
        /// Scan JSON file, or - for stdin
        input: PathBuf,
        /// Database path or file: URI
        #[arg(long)]
        dsn: Option<String>,
        /// Identifier stored with the scan; a random one is generated if omitted
        #[arg(long)]
        scan_id: Option<String>,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// List intermediate traceroute hops and per-host paths
    Hops {
        /// Scan JSON file, or - for stdin
        input: PathBuf,
        /// Name of the scanning machine at the start of each path
        #[arg(long, default_value = "localhost")]
        origin: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();
}

fn read_scan(input: &Path) -> Result<ScanRun> {
    let text = if input == Path::new("-") {
        let mut s = String::new();
        std::io::stdin().read_to_string(&mut s).context("reading scan from stdin")?;
        s
    } else {
        std::fs::read_to_string(input).with_context(|| format!("reading scan {}", input.display()))?
    };
    let run: ScanRun = serde_json::from_str(&text).context("decoding scan JSON")?;
    debug!(hosts = run.hosts.len(), "scan loaded");
    Ok(run)
}

/// Command-line filters win over configured ones; the up-host check always comes first.
fn effective_filters(args: &FilterArgs, cfg: Option<&Config>) -> Vec<String> {
    let mut filters = Vec::new();
    let skip_down = args.skip_down_hosts || cfg.and_then(|c| c.skip_down_hosts).unwrap_or(false);
    if skip_down {
        filters.push(UP_FILTER.to_string());
    }
    if !args.filters.is_empty() {
        filters.extend(args.filters.iter().cloned());
    } else if let Some(c) = cfg {
        filters.extend(c.filters.iter().cloned());
    }
    filters
}

fn apply_filters(run: ScanRun, filters: &[String]) -> Result<ScanRun> {
    if filters.is_empty() {
        return Ok(run);
    }
    let filtered = host_filter::filter(&run, filters)?;
    info!(before = run.hosts.len(), after = filtered.hosts.len(), "hosts filtered");
    Ok(filtered)
}

fn sqlite_target(dsn: Option<String>, scan_id: Option<String>, cfg: Option<&Config>) -> Result<ConnectionConfig> {
    let defaults = cfg.and_then(|c| c.sqlite.clone()).unwrap_or_default();
    let dsn = dsn
        .or(defaults.dsn)
        .ok_or_else(|| anyhow!("no database given: pass --dsn or set sqlite.dsn in the config"))?;
    let mut target = ConnectionConfig::new(&dsn, scanfmt_core::version());
    if let Some(id) = scan_id.or(defaults.scan_identifier) {
        target = target.with_scan_identifier(&id);
    }
    Ok(target)
}

fn hops_json(run: &ScanRun, origin: &str) -> serde_json::Value {
    let paths: Vec<serde_json::Value> = run
        .hosts
        .iter()
        .filter(|h| !h.trace.hops.is_empty())
        .map(|h| {
            let address = h.joined_addresses(scanfmt_core::DEFAULT_DELIMITER);
            let edges = trace::hop_edges(&h.trace.hops, origin, &address);
            serde_json::json!({ "host": address, "edges": edges })
        })
        .collect();
    let hops: Vec<_> = run.all_hops().into_values().collect();
    serde_json::json!({ "hops": hops, "paths": paths })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let loaded_cfg = config::load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Version => {
            println!("scanfmt {} (core {})", env!("CARGO_PKG_VERSION"), scanfmt_core::version());
        }
        Commands::Filter { input, filter, out, pretty } => {
            let run = read_scan(&input)?;
            let filters = effective_filters(&filter, loaded_cfg.as_ref());
            let filtered = apply_filters(run, &filters)?;
            let body = if pretty { serde_json::to_string_pretty(&filtered)? } else { serde_json::to_string(&filtered)? };
            if let Some(path) = out {
                let file = OpenOptions::new().create(true).truncate(true).write(true).open(&path)
                    .with_context(|| format!("opening {}", path.display()))?;
                let mut w = BufWriter::new(file);
                writeln!(w, "{}", body)?;
                w.flush()?;
            } else {
                println!("{}", body);
            }
        }
        Commands::Sqlite { input, dsn, scan_id, filter } => {
            let run = read_scan(&input)?;
            let filters = effective_filters(&filter, loaded_cfg.as_ref());
            let filtered = apply_filters(run, &filters)?;
            let target = sqlite_target(dsn, scan_id, loaded_cfg.as_ref())?;
            let projection = results_sqlite::project(&filtered, &target)?;
            let obj = serde_json::json!({ "scan_id": projection.scan_id, "identifier": projection.identifier });
            println!("{}", serde_json::to_string(&obj)?);
        }
        Commands::Hops { input, origin, format } => {
            let run = read_scan(&input)?;
            match format {
                OutputFormat::Text => {
                    for (ip, hop) in run.all_hops() {
                        println!("{}\tttl={}\trtt={}\t{}", ip, hop.ttl, hop.rtt, hop.host);
                    }
                    for host in run.hosts.iter().filter(|h| !h.trace.hops.is_empty()) {
                        let address = host.joined_addresses(scanfmt_core::DEFAULT_DELIMITER);
                        let edges = trace::hop_edges(&host.trace.hops, &origin, &address);
                        let mut path = vec![origin.clone()];
                        path.extend(edges.into_iter().map(|(_, to)| to));
                        println!("{}", path.join(" -> "));
                    }
                }
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string(&hops_json(&run, &origin))?);
                }
            }
        }
    }
    Ok(())
}
