//! 把 `ResultManager` 輸出成表格、JSON、CSV、Markdown 或純文字

pub mod csv_reporter;
pub mod json;
pub mod md_reporter;
pub mod table;
pub mod text;

use std::path::Path;

use crate::utils::error::Result;

/// 以全大寫顯示的分類縮寫
const ACRONYM_CATEGORIES: &[&str] = &[
    "aaa", "avt", "bfd", "bgp", "igmp", "ip", "isis", "lanz", "lldp", "mlag", "ntp", "ospf", "ptp",
    "snmp", "stp", "stun", "vlan", "vxlan",
];

/// `bgp` → `BGP`、`routing` → `Routing`、`path selection` → `Path Selection`
pub fn convert_categories(categories: &[String]) -> Vec<String> {
    categories
        .iter()
        .map(|category| {
            category
                .split_whitespace()
                .map(|word| {
                    if ACRONYM_CATEGORIES.contains(&word.to_lowercase().as_str()) {
                        word.to_uppercase()
                    } else {
                        title_case(word)
                    }
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// 寫入報表檔案，必要時建立上層目錄
pub(crate) fn write_report(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, content)?;
    tracing::info!("Report written to {}", path.display());
    Ok(())
}
