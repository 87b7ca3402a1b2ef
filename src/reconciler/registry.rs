//! Known Address Registry
//!
//! The platform's receiving deposit address per network. An explicit
//! collaborator rather than a global: a missing address is a typed condition
//! (the recipient can never match) instead of an undefined fallback.

use std::collections::HashMap;

use super::types::Network;

/// Per-network platform deposit addresses
#[derive(Debug, Clone, Default)]
pub struct KnownAddressRegistry {
    addresses: HashMap<Network, String>,
}

impl KnownAddressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from (network, address) pairs, skipping empty addresses
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Network, String)>,
    {
        let addresses = pairs
            .into_iter()
            .filter(|(_, addr)| !addr.trim().is_empty())
            .collect();
        Self { addresses }
    }

    /// Register or replace the deposit address for a network
    pub fn set(&mut self, network: Network, address: impl Into<String>) {
        self.addresses.insert(network, address.into());
    }

    /// The platform's deposit address for a network, if configured
    pub fn address_for(&self, network: Network) -> Option<&str> {
        self.addresses.get(&network).map(String::as_str)
    }

    /// Case-insensitive, whitespace-trimmed comparison against the known
    /// address for this network. False when no address is configured.
    pub fn matches(&self, network: Network, reported: &str) -> bool {
        match self.address_for(network) {
            Some(known) => known.trim().eq_ignore_ascii_case(reported.trim()),
            None => false,
        }
    }

    /// Networks with a configured address
    pub fn configured_networks(&self) -> Vec<Network> {
        let mut networks: Vec<Network> = self.addresses.keys().copied().collect();
        networks.sort_by_key(|n| n.canonical_index());
        networks
    }
}
