use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use crate::adapters::device::{AsyncEosDevice, DeviceOptions};
use crate::config::inventory::InventoryInput;
use crate::domain::ports::AntaDevice;
use crate::utils::error::{AntaError, Result};

/// 裝置註冊表，以名稱為鍵；過濾後的庫存與原庫存共用同一批裝置
#[derive(Clone, Default)]
pub struct AntaInventory {
    devices: BTreeMap<String, Arc<dyn AntaDevice>>,
}

impl std::fmt::Debug for AntaInventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AntaInventory")
            .field("devices", &self.devices.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl AntaInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 從 YAML 庫存檔建立 EOS 裝置；`defaults` 提供帳號密碼與連線選項
    pub fn parse<P: AsRef<Path>>(path: P, defaults: &DeviceOptions) -> Result<Self> {
        let input = InventoryInput::from_file(&path)?;
        let inventory = Self::from_input(&input, defaults)?;
        tracing::debug!(
            "Loaded {} device(s) from {}",
            inventory.len(),
            path.as_ref().display()
        );
        Ok(inventory)
    }

    pub fn from_input(input: &InventoryInput, defaults: &DeviceOptions) -> Result<Self> {
        let mut inventory = Self::new();
        for entry in input.expand()? {
            let mut options = defaults.clone();
            options.host = entry.host;
            options.name = entry.name;
            options.port = entry.port;
            options.tags = entry.tags;
            options.disable_cache = defaults.disable_cache || entry.disable_cache;
            inventory.add_device(Arc::new(AsyncEosDevice::new(options)?))?;
        }
        Ok(inventory)
    }

    pub fn add_device(&mut self, device: Arc<dyn AntaDevice>) -> Result<()> {
        let name = device.name().to_string();
        if self.devices.contains_key(&name) {
            return Err(AntaError::InventoryError {
                message: format!("device name '{}' is already in the inventory", name),
            });
        }
        self.devices.insert(name, device);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn AntaDevice>> {
        self.devices.get(name)
    }

    pub fn devices(&self) -> impl Iterator<Item = &Arc<dyn AntaDevice>> {
        self.devices.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    /// 庫存中所有標籤（含裝置名稱）
    pub fn tags(&self) -> BTreeSet<String> {
        self.devices
            .values()
            .flat_map(|device| device.tags().iter().cloned())
            .collect()
    }

    /// 依連線狀態、標籤與裝置名稱過濾
    pub fn get_inventory(
        &self,
        established_only: bool,
        tags: Option<&BTreeSet<String>>,
        devices: Option<&BTreeSet<String>>,
    ) -> AntaInventory {
        let devices = self
            .devices
            .iter()
            .filter(|(_, device)| !established_only || device.established())
            .filter(|(_, device)| match tags {
                Some(tags) if !tags.is_empty() => !device.tags().is_disjoint(tags),
                _ => true,
            })
            .filter(|(name, _)| match devices {
                Some(names) if !names.is_empty() => names.contains(*name),
                _ => true,
            })
            .map(|(name, device)| (name.clone(), device.clone()))
            .collect();
        AntaInventory { devices }
    }

    /// 並行刷新所有裝置狀態
    pub async fn connect_inventory(&self) {
        tracing::debug!("Refreshing {} device(s)", self.devices.len());
        futures::future::join_all(self.devices.values().map(|device| device.refresh())).await;
        let established = self.devices.values().filter(|d| d.established()).count();
        tracing::debug!("{}/{} device(s) established", established, self.devices.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::inventory::InventoryInput;

    fn defaults() -> DeviceOptions {
        DeviceOptions::new("", "admin", "admin")
    }

    fn inventory() -> AntaInventory {
        let yaml = r#"
anta_inventory:
  hosts:
    - host: 10.0.0.1
      name: leaf1
      tags: ['leaf']
    - host: 10.0.0.2
      name: leaf2
      tags: ['leaf']
    - host: 10.0.0.11
      name: spine1
      tags: ['spine']
"#;
        let input = InventoryInput::from_yaml_str(yaml).unwrap();
        AntaInventory::from_input(&input, &defaults()).unwrap()
    }

    #[test]
    fn test_filter_by_tags_and_names() {
        let inventory = inventory();
        assert_eq!(inventory.len(), 3);

        let leafs: BTreeSet<String> = ["leaf".to_string()].into();
        let filtered = inventory.get_inventory(false, Some(&leafs), None);
        assert_eq!(filtered.names().collect::<Vec<_>>(), vec!["leaf1", "leaf2"]);

        let names: BTreeSet<String> = ["spine1".to_string()].into();
        let filtered = inventory.get_inventory(false, None, Some(&names));
        assert_eq!(filtered.names().collect::<Vec<_>>(), vec!["spine1"]);

        // 裝置名稱本身就是標籤
        let by_name_tag: BTreeSet<String> = ["leaf2".to_string()].into();
        assert_eq!(inventory.get_inventory(false, Some(&by_name_tag), None).len(), 1);
    }

    #[test]
    fn test_established_only_filters_unrefreshed_devices() {
        let inventory = inventory();
        assert!(inventory.get_inventory(true, None, None).is_empty());
    }

    #[test]
    fn test_duplicate_device_name_rejected() {
        let yaml = "anta_inventory:\n  hosts:\n    - host: 10.0.0.1\n      name: leaf1\n    - host: 10.0.0.2\n      name: leaf1\n";
        let input = InventoryInput::from_yaml_str(yaml).unwrap();
        assert!(AntaInventory::from_input(&input, &defaults()).is_err());
    }

    #[test]
    fn test_inventory_tags() {
        let tags = inventory().tags();
        assert!(tags.contains("leaf"));
        assert!(tags.contains("spine"));
        assert!(tags.contains("spine1"));
    }
}
