use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::path::Path;

use crate::utils::error::{AntaError, Result};
use crate::utils::validation::{validate_non_empty_string, Validate};

/// 網段展開的上限，避免誤填 /8 之類的網段
pub const MAX_EXPANDED_HOSTS: u32 = 65536;

/// ANTA 庫存檔（YAML）的頂層結構
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct InventoryFile {
    #[serde(default)]
    pub anta_inventory: Option<InventoryInput>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct InventoryInput {
    #[serde(default)]
    pub hosts: Option<Vec<InventoryHost>>,
    #[serde(default)]
    pub networks: Option<Vec<InventoryNetwork>>,
    #[serde(default)]
    pub ranges: Option<Vec<InventoryRange>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct InventoryHost {
    pub host: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub tags: Option<BTreeSet<String>>,
    #[serde(default)]
    pub disable_cache: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct InventoryNetwork {
    pub network: String,
    #[serde(default)]
    pub tags: Option<BTreeSet<String>>,
    #[serde(default)]
    pub disable_cache: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct InventoryRange {
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub tags: Option<BTreeSet<String>>,
    #[serde(default)]
    pub disable_cache: bool,
}

/// 展開後的單一主機定義
#[derive(Debug, Clone, PartialEq)]
pub struct HostEntry {
    pub host: String,
    pub name: Option<String>,
    pub port: Option<u16>,
    pub tags: BTreeSet<String>,
    pub disable_cache: bool,
}

impl InventoryInput {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| AntaError::InventoryError {
            message: format!("cannot read {}: {}", path.as_ref().display(), e),
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let file: InventoryFile = serde_yaml::from_str(content).map_err(|e| AntaError::InventoryError {
            message: format!("invalid inventory format: {}", e),
        })?;
        let input = file.anta_inventory.unwrap_or_default();
        input.validate()?;
        Ok(input)
    }

    /// 依 hosts、networks、ranges 的順序展開為主機清單
    pub fn expand(&self) -> Result<Vec<HostEntry>> {
        let mut entries = Vec::new();

        for host in self.hosts.iter().flatten() {
            entries.push(HostEntry {
                host: host.host.clone(),
                name: host.name.clone(),
                port: host.port,
                tags: host.tags.clone().unwrap_or_default(),
                disable_cache: host.disable_cache,
            });
        }

        for network in self.networks.iter().flatten() {
            let (base, prefix) = parse_ipv4_network(&network.network)?;
            let size = 1u64 << (32 - prefix as u64);
            if size > MAX_EXPANDED_HOSTS as u64 {
                return Err(AntaError::InventoryError {
                    message: format!(
                        "network {} expands to {} hosts (limit {})",
                        network.network, size, MAX_EXPANDED_HOSTS
                    ),
                });
            }
            for offset in 0..size as u32 {
                entries.push(HostEntry {
                    host: Ipv4Addr::from(u32::from(base) + offset).to_string(),
                    name: None,
                    port: None,
                    tags: network.tags.clone().unwrap_or_default(),
                    disable_cache: network.disable_cache,
                });
            }
        }

        for range in self.ranges.iter().flatten() {
            let start = parse_ipv4(&range.start)?;
            let end = parse_ipv4(&range.end)?;
            let (start, end) = (u32::from(start), u32::from(end));
            if end < start {
                return Err(AntaError::InventoryError {
                    message: format!("range end {} is lower than start {}", range.end, range.start),
                });
            }
            if end - start >= MAX_EXPANDED_HOSTS {
                return Err(AntaError::InventoryError {
                    message: format!("range {}-{} exceeds {} hosts", range.start, range.end, MAX_EXPANDED_HOSTS),
                });
            }
            for address in start..=end {
                entries.push(HostEntry {
                    host: Ipv4Addr::from(address).to_string(),
                    name: None,
                    port: None,
                    tags: range.tags.clone().unwrap_or_default(),
                    disable_cache: range.disable_cache,
                });
            }
        }

        Ok(entries)
    }
}

impl Validate for InventoryInput {
    fn validate(&self) -> Result<()> {
        for host in self.hosts.iter().flatten() {
            validate_non_empty_string("hosts.host", &host.host)?;
        }
        for network in self.networks.iter().flatten() {
            parse_ipv4_network(&network.network)?;
        }
        for range in self.ranges.iter().flatten() {
            parse_ipv4(&range.start)?;
            parse_ipv4(&range.end)?;
        }
        Ok(())
    }
}

fn parse_ipv4(value: &str) -> Result<Ipv4Addr> {
    value.trim().parse::<Ipv4Addr>().map_err(|e| AntaError::InventoryError {
        message: format!("'{}' is not a valid IPv4 address: {}", value, e),
    })
}

/// 解析 `a.b.c.d/len`，主機位元必須為零
fn parse_ipv4_network(value: &str) -> Result<(Ipv4Addr, u8)> {
    let (address, prefix) = value.split_once('/').ok_or_else(|| AntaError::InventoryError {
        message: format!("'{}' is not a network in CIDR notation", value),
    })?;
    let address = parse_ipv4(address)?;
    let prefix: u8 = prefix
        .trim()
        .parse()
        .ok()
        .filter(|p| *p <= 32)
        .ok_or_else(|| AntaError::InventoryError {
            message: format!("'{}' has an invalid prefix length", value),
        })?;

    let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
    if u32::from(address) & !mask != 0 {
        return Err(AntaError::InventoryError {
            message: format!("'{}' has host bits set", value),
        });
    }
    Ok((address, prefix))
}
