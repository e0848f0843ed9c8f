//! Network topology helpers.
//!
//! Ceph needs to know the public network its daemons bind to. It is derived
//! from the servers taking part in a run.

use ipnetwork::{IpNetwork, Ipv4Network};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::Server;

/// Prefix assumed for a server that has no netmask in its facts.
const FALLBACK_PREFIX: u8 = 24;

/// Computes network facts for a set of servers.
pub trait NetworkTopology: Send + Sync {
    /// The network shared by the servers, in CIDR notation.
    fn public_network(&self, servers: &[Server]) -> Result<IpNetwork>;
}

/// Derives networks from discovered server facts.
///
/// Each server contributes the network of its default IPv4 interface
/// (`ansible_default_ipv4.address` / `netmask`); the network shared by most
/// servers wins and ties go to the lowest network.
#[derive(Debug, Default, Clone, Copy)]
pub struct FactsNetworkTopology;

impl NetworkTopology for FactsNetworkTopology {
    fn public_network(&self, servers: &[Server]) -> Result<IpNetwork> {
        let mut counts: BTreeMap<IpNetwork, usize> = BTreeMap::new();
        for server in servers {
            let network = server_network(server)?;
            *counts.entry(network).or_default() += 1;
        }

        let mut best: Option<(IpNetwork, usize)> = None;
        for (network, count) in counts {
            if best.map_or(true, |(_, seen)| count > seen) {
                best = Some((network, count));
            }
        }

        let (network, _) = best.ok_or_else(|| {
            Error::Internal("cannot compute public network without servers".to_string())
        })?;
        debug!("Public network of {} servers is {}", servers.len(), network);
        Ok(network)
    }
}

/// Network of the server's default interface.
pub fn server_network(server: &Server) -> Result<IpNetwork> {
    let default_ipv4 = server
        .facts
        .pointer("/ansible_facts/ansible_default_ipv4")
        .or_else(|| server.facts.pointer("/ansible_default_ipv4"));

    if let Some(iface) = default_ipv4 {
        let address = iface.get("address").and_then(|v| v.as_str());
        let netmask = iface.get("netmask").and_then(|v| v.as_str());
        if let (Some(address), Some(netmask)) = (address, netmask) {
            let address: Ipv4Addr = parse(server, address)?;
            let netmask: Ipv4Addr = parse(server, netmask)?;
            let network = Ipv4Network::with_netmask(address, netmask)
                .map_err(|e| invalid(server, e.to_string()))?;
            return normalize(server, IpAddr::V4(network.network()), network.prefix());
        }
    }

    let address: IpAddr = parse(server, server.ansible_host())?;
    let prefix = match address {
        IpAddr::V4(_) => FALLBACK_PREFIX,
        IpAddr::V6(_) => 64,
    };
    normalize(server, address, prefix)
}

fn normalize(server: &Server, address: IpAddr, prefix: u8) -> Result<IpNetwork> {
    let network = IpNetwork::new(address, prefix).map_err(|e| invalid(server, e.to_string()))?;
    IpNetwork::new(network.network(), prefix).map_err(|e| invalid(server, e.to_string()))
}

fn parse<T: std::str::FromStr>(server: &Server, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| invalid(server, format!("'{value}': {e}")))
}

fn invalid(server: &Server, message: String) -> Error {
    Error::Internal(format!(
        "server {} has no usable network address: {message}",
        server.model_id
    ))
}
