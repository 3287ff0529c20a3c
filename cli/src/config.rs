//! Network configuration and contract addresses

use anyhow::{Context, Result};
use gdp_keeper::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";
const MAINNET_USDC: &str = "0xA0b86a33E6441e54B9c8c604Dc395d6Af2dc0Ae8";

fn zero_address() -> String {
    ZERO_ADDRESS.to_string()
}

/// Contract addresses as written in config files, validated by [`NetworksConfig::resolve`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAddresses {
    #[serde(default = "zero_address")]
    pub market: String,
    #[serde(default = "zero_address")]
    pub usdc: String,
    #[serde(default = "zero_address")]
    pub oracle: String,
    #[serde(default = "zero_address")]
    pub long_token: String,
    #[serde(default = "zero_address")]
    pub short_token: String,
}

impl Default for ContractAddresses {
    fn default() -> Self {
        Self {
            market: zero_address(),
            usdc: zero_address(),
            oracle: zero_address(),
            long_token: zero_address(),
            short_token: zero_address(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEntry {
    pub chain_id: u64,
    pub rpc_url: String,
    #[serde(default)]
    pub explorer_url: Option<String>,
    #[serde(default)]
    pub contracts: ContractAddresses,
}

/// All known networks, keyed by id (`mainnet`, `sepolia`, `local`, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworksConfig {
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown network: {network}. Known networks: {known}")]
    UnknownNetwork { network: String, known: String },

    #[error("network {network}: RPC URL {url:?} must start with http:// or https://")]
    BadRpcUrl { network: String, url: String },

    #[error("network {network}: {field} address {value:?} is not 0x followed by 40 hex digits")]
    BadAddress {
        network: String,
        field: &'static str,
        value: String,
    },

    #[error("network {network}: market contract address is not set")]
    MarketNotDeployed { network: String },
}

/// Resolved, validated settings for one network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub network: String,
    pub chain_id: u64,
    pub rpc_url: String,
    pub explorer_url: Option<String>,
    pub market: Address,
    pub usdc: Address,
    pub oracle: Address,
    pub long_token: Address,
    pub short_token: Address,
}

impl NetworkConfig {
    /// Block explorer page for `address`, if the network has an explorer
    pub fn address_url(&self, address: &Address) -> Option<String> {
        self.explorer_url
            .as_ref()
            .map(|base| format!("{}/address/{}", base.trim_end_matches('/'), address))
    }
}

impl NetworksConfig {
    /// Networks known without any config file
    pub fn builtin() -> Self {
        let mut networks = BTreeMap::new();
        networks.insert(
            "mainnet".to_string(),
            NetworkEntry {
                chain_id: 1,
                rpc_url: "https://eth.llamarpc.com".to_string(),
                explorer_url: Some("https://etherscan.io".to_string()),
                contracts: ContractAddresses {
                    usdc: MAINNET_USDC.to_string(),
                    ..ContractAddresses::default()
                },
            },
        );
        networks.insert(
            "sepolia".to_string(),
            NetworkEntry {
                chain_id: 11_155_111,
                rpc_url: "https://ethereum-sepolia-rpc.publicnode.com".to_string(),
                explorer_url: Some("https://sepolia.etherscan.io".to_string()),
                contracts: ContractAddresses::default(),
            },
        );
        networks.insert(
            "local".to_string(),
            NetworkEntry {
                chain_id: 31_337,
                rpc_url: "http://localhost:8546".to_string(),
                explorer_url: None,
                contracts: ContractAddresses::default(),
            },
        );
        Self { networks }
    }

    /// Built-in networks, with entries from `path` added or replacing them
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let file: NetworksConfig = toml::from_str(&data)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        let mut config = Self::builtin();
        config.networks.extend(file.networks);
        Ok(config)
    }

    /// Fill `network`'s contract addresses from a Foundry `run-latest.json`.
    ///
    /// Returns how many addresses were taken from the file.
    pub fn import_broadcast(&mut self, network: &str, path: &Path) -> Result<usize> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read broadcast file: {}", path.display()))?;
        let broadcast: Broadcast = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse broadcast file: {}", path.display()))?;

        let known = self.known_networks();
        let entry = self
            .networks
            .get_mut(network)
            .ok_or_else(|| ConfigError::UnknownNetwork {
                network: network.to_string(),
                known,
            })?;

        if let Some(chain) = broadcast.chain {
            if chain != entry.chain_id {
                anyhow::bail!(
                    "Broadcast {} was recorded on chain {}, but {} is chain {}",
                    path.display(),
                    chain,
                    network,
                    entry.chain_id
                );
            }
        }

        let mut imported = 0;
        for tx in broadcast.transactions {
            if tx.transaction_type != "CREATE" {
                continue;
            }
            let (Some(name), Some(address)) = (tx.contract_name, tx.contract_address) else {
                continue;
            };
            let slot = match name.as_str() {
                "GDPMarket" => &mut entry.contracts.market,
                "MockUSDC" | "USDC" => &mut entry.contracts.usdc,
                "MockGDPOracle" | "USGDPOracle" => &mut entry.contracts.oracle,
                "LongToken" => &mut entry.contracts.long_token,
                "ShortToken" => &mut entry.contracts.short_token,
                _ => continue,
            };
            log::debug!("broadcast: {} at {}", name, address);
            *slot = address;
            imported += 1;
        }
        Ok(imported)
    }

    /// Validate and resolve `network`, optionally overriding its RPC URL
    pub fn resolve(&self, network: &str, rpc_url: Option<String>) -> Result<NetworkConfig, ConfigError> {
        let entry = self
            .networks
            .get(network)
            .ok_or_else(|| ConfigError::UnknownNetwork {
                network: network.to_string(),
                known: self.known_networks(),
            })?;

        let rpc_url = rpc_url.unwrap_or_else(|| entry.rpc_url.clone());
        if !(rpc_url.starts_with("http://") || rpc_url.starts_with("https://")) {
            return Err(ConfigError::BadRpcUrl {
                network: network.to_string(),
                url: rpc_url,
            });
        }

        let parse = |field: &'static str, value: &str| {
            value.parse::<Address>().map_err(|_| ConfigError::BadAddress {
                network: network.to_string(),
                field,
                value: value.to_string(),
            })
        };
        let contracts = &entry.contracts;
        let market = parse("market", &contracts.market)?;
        if market.is_zero() {
            return Err(ConfigError::MarketNotDeployed {
                network: network.to_string(),
            });
        }

        Ok(NetworkConfig {
            network: network.to_string(),
            chain_id: entry.chain_id,
            rpc_url,
            explorer_url: entry.explorer_url.clone(),
            market,
            usdc: parse("usdc", &contracts.usdc)?,
            oracle: parse("oracle", &contracts.oracle)?,
            long_token: parse("long_token", &contracts.long_token)?,
            short_token: parse("short_token", &contracts.short_token)?,
        })
    }

    fn known_networks(&self) -> String {
        self.networks.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

#[derive(Deserialize)]
struct Broadcast {
    #[serde(default)]
    transactions: Vec<BroadcastTransaction>,
    #[serde(default)]
    chain: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BroadcastTransaction {
    #[serde(default)]
    transaction_type: String,
    contract_name: Option<String>,
    contract_address: Option<String>,
}

/// Expand `~` and environment variables in a user-supplied path
pub fn expand_path(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path).with_context(|| format!("Failed to expand path: {}", path))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MARKET: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_builtin_networks() {
        let config = NetworksConfig::builtin();
        assert_eq!(config.networks["mainnet"].chain_id, 1);
        assert_eq!(config.networks["sepolia"].chain_id, 11_155_111);
        assert_eq!(config.networks["local"].rpc_url, "http://localhost:8546");
        assert_eq!(config.networks["mainnet"].contracts.usdc, MAINNET_USDC);
    }

    #[test]
    fn test_unknown_network() {
        let err = NetworksConfig::builtin().resolve("devnet", None).unwrap_err();
        assert!(err.to_string().contains("local, mainnet, sepolia"));
    }

    #[test]
    fn test_undeployed_market_rejected() {
        assert_eq!(
            NetworksConfig::builtin().resolve("sepolia", None),
            Err(ConfigError::MarketNotDeployed {
                network: "sepolia".to_string()
            })
        );
    }

    #[test]
    fn test_toml_overrides_builtin() {
        let file = write_temp(&format!(
            r#"
            [networks.local]
            chain_id = 31337
            rpc_url = "http://127.0.0.1:8545"

            [networks.local.contracts]
            market = "{MARKET}"
            "#
        ));
        let config = NetworksConfig::load(file.path()).unwrap();
        assert!(config.networks.contains_key("mainnet"));

        let local = config.resolve("local", None).unwrap();
        assert_eq!(local.rpc_url, "http://127.0.0.1:8545");
        assert_eq!(local.market, MARKET.parse().unwrap());
        assert!(local.oracle.is_zero());
        assert_eq!(local.address_url(&local.market), None);
    }

    #[test]
    fn test_rpc_override_and_validation() {
        let mut config = NetworksConfig::builtin();
        config.networks.get_mut("mainnet").unwrap().contracts.market = MARKET.to_string();

        let resolved = config
            .resolve("mainnet", Some("https://rpc.example.org".to_string()))
            .unwrap();
        assert_eq!(resolved.rpc_url, "https://rpc.example.org");
        assert_eq!(
            resolved.address_url(&resolved.market).unwrap(),
            format!("https://etherscan.io/address/{}", MARKET.to_lowercase())
        );

        assert!(matches!(
            config.resolve("mainnet", Some("ws://rpc.example.org".to_string())),
            Err(ConfigError::BadRpcUrl { .. })
        ));

        config.networks.get_mut("mainnet").unwrap().contracts.oracle = "0x1234".to_string();
        assert!(matches!(
            config.resolve("mainnet", None),
            Err(ConfigError::BadAddress { field: "oracle", .. })
        ));
    }

    #[test]
    fn test_import_broadcast() {
        let file = write_temp(&format!(
            r#"{{
                "chain": 31337,
                "transactions": [
                    {{ "transactionType": "CREATE", "contractName": "MockUSDC",
                       "contractAddress": "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512" }},
                    {{ "transactionType": "CREATE", "contractName": "GDPMarket",
                       "contractAddress": "{MARKET}" }},
                    {{ "transactionType": "CALL", "contractName": "GDPMarket",
                       "contractAddress": "0x0000000000000000000000000000000000000001" }},
                    {{ "transactionType": "CREATE", "contractName": "Multicall3",
                       "contractAddress": "0x0000000000000000000000000000000000000002" }}
                ]
            }}"#
        ));

        let mut config = NetworksConfig::builtin();
        assert_eq!(config.import_broadcast("local", file.path()).unwrap(), 2);
        let local = config.resolve("local", None).unwrap();
        assert_eq!(local.market, MARKET.parse().unwrap());
        assert!(!local.usdc.is_zero());

        let err = config.import_broadcast("sepolia", file.path()).unwrap_err();
        assert!(err.to_string().contains("chain 31337"));
    }
}
