//! Host predicates over a parsed scan.
//!
//! A filter expression is compiled once into a typed program and then run
//! against each host. Several expressions are applied one after another, so
//! a host survives only if every expression accepts it.

mod access;
mod ast;
mod compile;
mod eval;
mod lexer;
mod parser;

use scanfmt_core::{Host, ScanRun};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },
    #[error("type error: {0}")]
    Type(String),
    #[error("evaluation error: {0}")]
    Eval(String),
    #[error("filter #{index} `{expr}`: {source}")]
    Expression {
        index: usize,
        expr: String,
        #[source]
        source: Box<FilterError>,
    },
}

/// A compiled host predicate.
#[derive(Debug, Clone)]
pub struct Predicate {
    source: String,
    program: compile::Op,
}

impl Predicate {
    pub fn compile(src: &str) -> Result<Predicate, FilterError> {
        let expr = parser::parse(src)?;
        let program = compile::compile(&expr)?;
        Ok(Predicate { source: src.to_string(), program })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, host: &Host) -> Result<bool, FilterError> {
        let mut scopes = vec![access::Node::Host(host)];
        eval::truth(&self.program, &mut scopes)
    }
}

/// Hosts of `hosts` accepted by `predicate`, in their original order.
pub fn filter_hosts(hosts: &[Host], predicate: &Predicate) -> Result<Vec<Host>, FilterError> {
    let mut kept = Vec::new();
    for host in hosts {
        if predicate.matches(host)? {
            kept.push(host.clone());
        }
    }
    Ok(kept)
}

/// Apply `expressions` in sequence and return a new run holding the hosts that
/// pass all of them. `run` is never modified; any failure discards the whole result.
pub fn filter<S: AsRef<str>>(run: &ScanRun, expressions: &[S]) -> Result<ScanRun, FilterError> {
    let mut survivors: Vec<&Host> = run.hosts.iter().collect();
    for (index, expr) in expressions.iter().enumerate() {
        let expr = expr.as_ref();
        let wrap = |source: FilterError| FilterError::Expression {
            index,
            expr: expr.to_string(),
            source: Box::new(source),
        };
        let predicate = Predicate::compile(expr).map_err(wrap)?;
        let before = survivors.len();
        let mut kept = Vec::with_capacity(before);
        for host in survivors {
            if predicate.matches(host).map_err(wrap)? {
                kept.push(host);
            }
        }
        survivors = kept;
        debug!(index, expr, before, after = survivors.len(), "filter applied");
    }
    Ok(run.with_hosts(survivors.into_iter().cloned().collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanfmt_core::{HostAddress, HostStatus, Port, PortService};

    fn host(ip: &str, state: &str, ports: &[u16]) -> Host {
        Host {
            addresses: vec![HostAddress { address: ip.into(), address_type: "ipv4".into(), ..Default::default() }],
            status: HostStatus { state: state.into(), reason: "syn-ack".into() },
            ports: ports
                .iter()
                .map(|&port_id| Port {
                    protocol: "tcp".into(),
                    port_id,
                    service: PortService { name: format!("svc{port_id}"), ..Default::default() },
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    fn run(hosts: Vec<Host>) -> ScanRun {
        ScanRun { scanner: "nmap".into(), args: "nmap -p- 10.0.0.0/24".into(), hosts, ..Default::default() }
    }

    fn ips(run: &ScanRun) -> Vec<String> {
        run.hosts.iter().map(|h| h.joined_addresses(",")).collect()
    }

    #[test]
    fn keeps_up_hosts_with_ports_intact() {
        let scan = run(vec![host("10.0.0.1", "up", &[22, 80]), host("10.0.0.2", "down", &[])]);
        let out = filter(&scan, &[r#"Status.State == "up""#]).unwrap();
        assert_eq!(out.hosts.len(), 1);
        assert_eq!(out.hosts[0], scan.hosts[0]);
        assert_eq!(out.hosts[0].ports.len(), 2);
        assert_eq!(out.args, scan.args);
    }

    #[test]
    fn sequential_expressions_conjoin() {
        let scan = run(vec![
            host("10.0.0.1", "up", &[80]),
            host("10.0.0.2", "up", &[22]),
            host("10.0.0.3", "down", &[80]),
            host("10.0.0.4", "up", &[443, 80]),
        ]);
        let chained = filter(&scan, &[r#"Status.State == "up""#, "any(Port, {.PortID in [80]})"]).unwrap();
        let single = filter(&scan, &[r#"Status.State == "up" && any(Port, {.PortID in [80]})"#]).unwrap();
        assert_eq!(chained, single);
        assert_eq!(ips(&chained), vec!["10.0.0.1", "10.0.0.4"]);
    }

    #[test]
    fn input_is_untouched_and_order_kept() {
        let scan = run(vec![
            host("10.0.0.5", "up", &[]),
            host("10.0.0.1", "down", &[]),
            host("10.0.0.9", "up", &[]),
            host("10.0.0.2", "up", &[]),
        ]);
        let snapshot = scan.clone();
        let out = filter(&scan, &[r#"Status.State == "up""#]).unwrap();
        assert_eq!(ips(&out), vec!["10.0.0.5", "10.0.0.9", "10.0.0.2"]);
        assert_eq!(scan, snapshot);

        let _ = filter(&scan, &["Status.State =="]).unwrap_err();
        assert_eq!(scan, snapshot);
    }

    #[test]
    fn no_expressions_keeps_everything() {
        let scan = run(vec![host("10.0.0.1", "up", &[]), host("10.0.0.2", "down", &[])]);
        let out = filter::<&str>(&scan, &[]).unwrap();
        assert_eq!(out, scan);
    }

    #[test]
    fn errors_name_the_failing_expression() {
        let scan = run(vec![host("10.0.0.1", "up", &[80])]);
        let err = filter(&scan, &[r#"Status.State == "up""#, "any(Port, {.PortID in [80]"]).unwrap_err();
        match &err {
            FilterError::Expression { index, expr, source } => {
                assert_eq!(*index, 1);
                assert_eq!(expr, "any(Port, {.PortID in [80]");
                assert!(matches!(**source, FilterError::Syntax { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().starts_with("filter #1"));

        let err = filter(&scan, &["Status.State == 1"]).unwrap_err();
        assert!(matches!(err, FilterError::Expression { ref source, .. } if matches!(**source, FilterError::Type(_))));
    }

    #[test]
    fn evaluation_failure_discards_result() {
        let mut scan = run(vec![host("10.0.0.1", "up", &[]), host("10.0.0.2", "up", &[])]);
        scan.hosts[0].status.reason = "ok".into();
        scan.hosts[1].status.reason = "[".into();
        let err = filter(&scan, &["Status.State matches Status.Reason"]).unwrap_err();
        assert!(matches!(err, FilterError::Expression { ref source, .. } if matches!(**source, FilterError::Eval(_))));
    }

    #[test]
    fn long_chains_and_deep_nesting() {
        let scan = run(vec![Host::default(), host("10.0.0.1", "up", &[22])]);
        let chain = (0..5000).map(|i| format!("StartTime == {i}")).collect::<Vec<_>>().join(" || ");
        let out = filter(&scan, &[chain.as_str()]).unwrap();
        assert_eq!(out.hosts.len(), 2);
        let p = Predicate::compile(&chain).unwrap();
        assert!(p.matches(&scan.hosts[0]).unwrap());

        let deep = format!("{}true{}", "(".repeat(300), ")".repeat(300));
        let err = filter(&scan, &[deep.as_str()]).unwrap_err();
        let FilterError::Expression { source, .. } = err else { panic!("expected a wrapped error") };
        assert!(matches!(*source, FilterError::Syntax { ref message, .. } if message == "expression nested too deeply"));
    }

    #[test]
    fn predicate_is_reusable() {
        let p = Predicate::compile(r#"any(Port, {.Service.Name startsWith "svc2"})"#).unwrap();
        assert_eq!(p.source(), r#"any(Port, {.Service.Name startsWith "svc2"})"#);
        let hosts = vec![host("10.0.0.1", "up", &[22]), host("10.0.0.2", "up", &[80]), host("10.0.0.3", "up", &[25])];
        let kept = filter_hosts(&hosts, &p).unwrap();
        assert_eq!(kept.len(), 2);
        assert!(p.matches(&hosts[2]).unwrap());
        assert!(!p.matches(&hosts[1]).unwrap());
    }
}
