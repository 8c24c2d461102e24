use std::str::FromStr;

use pallas_addresses::Network;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkId {
    Mainnet,
    Testnet,
}

impl NetworkId {
    pub fn value(&self) -> u8 {
        match self {
            NetworkId::Mainnet => 1,
            NetworkId::Testnet => 0,
        }
    }

    pub fn matches(&self, network: Network) -> bool {
        match (self, network) {
            (NetworkId::Mainnet, Network::Mainnet) => true,
            (NetworkId::Testnet, Network::Testnet) => true,
            (NetworkId::Testnet, Network::Other(_)) => true,
            _ => false,
        }
    }
}

impl From<NetworkId> for u8 {
    fn from(val: NetworkId) -> Self {
        val.value()
    }
}

impl From<NetworkId> for Network {
    fn from(val: NetworkId) -> Self {
        match val {
            NetworkId::Mainnet => Network::Mainnet,
            NetworkId::Testnet => Network::Testnet,
        }
    }
}

impl FromStr for NetworkId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Mainnet" => Ok(NetworkId::Mainnet),
            "Testnet" => Ok(NetworkId::Testnet),
            _ => Err(format!("unknown network {s}")),
        }
    }
}
