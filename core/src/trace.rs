//! Path helpers over traceroute hops.
//!
//! The final hop of a trace is by convention the scanned host itself, so path
//! building drops it by position. A trace that was already trimmed upstream
//! will lose a real hop here.

use std::collections::BTreeMap;

use crate::{Hop, ScanRun};

/// Intermediate hops of a trace: everything but the last entry.
pub fn path_hops(hops: &[Hop]) -> &[Hop] {
    match hops.split_last() {
        Some((_, rest)) => rest,
        None => hops,
    }
}

/// Ordered `(from, to)` edges from `start` through every intermediate hop to `end`.
/// With no intermediate hops the path is the single edge `start -> end`.
pub fn hop_edges(hops: &[Hop], start: &str, end: &str) -> Vec<(String, String)> {
    let path = path_hops(hops);
    let mut edges = Vec::with_capacity(path.len() + 1);
    let mut previous = start.to_string();
    for hop in path {
        edges.push((previous, hop.ip_addr.clone()));
        previous = hop.ip_addr.clone();
    }
    edges.push((previous, end.to_string()));
    edges
}

impl ScanRun {
    /// Unique intermediate hops across every host, keyed by hop address.
    pub fn all_hops(&self) -> BTreeMap<String, Hop> {
        let mut hops = BTreeMap::new();
        for host in &self.hosts {
            for hop in path_hops(&host.trace.hops) {
                hops.insert(hop.ip_addr.clone(), hop.clone());
            }
        }
        hops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Host, Trace};

    fn hop(ip: &str) -> Hop {
        Hop { ttl: "1".into(), ip_addr: ip.into(), rtt: "0.5".into(), host: String::new() }
    }

    fn host_with(hops: Vec<Hop>) -> Host {
        Host { trace: Trace { hops, ..Default::default() }, ..Default::default() }
    }

    #[test]
    fn drops_final_hop() {
        let hops = vec![hop("10.0.0.1"), hop("10.0.1.1"), hop("192.168.1.5")];
        let path = path_hops(&hops);
        assert_eq!(path.len(), 2);
        assert_eq!(path[1].ip_addr, "10.0.1.1");
    }

    #[test]
    fn single_and_empty_traces_have_no_intermediate_hops() {
        assert!(path_hops(&[]).is_empty());
        assert!(path_hops(&[hop("192.168.1.5")]).is_empty());
    }

    #[test]
    fn edges_chain_through_hops() {
        let hops = vec![hop("10.0.0.1"), hop("10.0.1.1"), hop("192.168.1.5")];
        let edges = hop_edges(&hops, "scanner", "target0");
        assert_eq!(
            edges,
            vec![
                ("scanner".to_string(), "10.0.0.1".to_string()),
                ("10.0.0.1".to_string(), "10.0.1.1".to_string()),
                ("10.0.1.1".to_string(), "target0".to_string()),
            ]
        );
    }

    #[test]
    fn single_hop_is_direct_edge() {
        let edges = hop_edges(&[hop("192.168.1.5")], "scanner", "target0");
        assert_eq!(edges, vec![("scanner".to_string(), "target0".to_string())]);
    }

    #[test]
    fn all_hops_deduplicates_across_hosts() {
        let run = ScanRun {
            hosts: vec![
                host_with(vec![hop("10.0.0.1"), hop("192.168.1.5")]),
                host_with(vec![hop("10.0.0.1"), hop("10.0.2.1"), hop("192.168.1.6")]),
                host_with(vec![hop("192.168.1.7")]),
            ],
            ..Default::default()
        };
        let hops = run.all_hops();
        assert_eq!(hops.keys().cloned().collect::<Vec<_>>(), vec!["10.0.0.1", "10.0.2.1"]);
    }
}
