use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::core::catalog::AntaCatalog;
use crate::core::inventory::AntaInventory;
use crate::core::result_manager::ResultManager;
use crate::core::test::TestInstance;
use crate::domain::ports::AntaDevice;
use crate::utils::monitor::SystemMonitor;

pub const DEFAULT_MAX_CONCURRENCY: usize = 50000;
pub const MAX_CONCURRENCY_ENV: &str = "ANTA_MAX_CONCURRENCY";

/// `ANTA_MAX_CONCURRENCY`，未設定或非正整數時使用預設值
pub fn max_concurrency_from_env() -> usize {
    match std::env::var(MAX_CONCURRENCY_ENV) {
        Ok(value) => match value.trim().parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => {
                tracing::warn!(
                    "Invalid {}='{}', falling back to {}",
                    MAX_CONCURRENCY_ENV,
                    value,
                    DEFAULT_MAX_CONCURRENCY
                );
                DEFAULT_MAX_CONCURRENCY
            }
        },
        Err(_) => DEFAULT_MAX_CONCURRENCY,
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// 只在這些裝置上執行
    pub devices: Option<BTreeSet<String>>,
    /// 只執行這些測試名稱
    pub tests: Option<BTreeSet<String>>,
    pub tags: Option<BTreeSet<String>>,
    pub established_only: bool,
    pub dry_run: bool,
    pub max_concurrency: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            devices: None,
            tests: None,
            tags: None,
            established_only: true,
            dry_run: false,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// 過濾並連線庫存，回傳可執行測試的裝置
async fn setup_inventory(inventory: &AntaInventory, options: &RunOptions) -> Option<AntaInventory> {
    let selected = inventory.get_inventory(false, options.tags.as_ref(), options.devices.as_ref());
    if selected.is_empty() {
        tracing::warn!(
            "No inventory matching the tags/devices filters{}{}",
            describe_filter("tags", options.tags.as_ref()),
            describe_filter("devices", options.devices.as_ref())
        );
        return None;
    }

    if options.dry_run {
        return Some(selected);
    }

    selected.connect_inventory().await;
    let established = selected.get_inventory(options.established_only, None, None);
    if established.is_empty() {
        tracing::warn!("No reachable device was found.");
        return None;
    }
    Some(established)
}

fn describe_filter(label: &str, values: Option<&BTreeSet<String>>) -> String {
    match values {
        Some(values) if !values.is_empty() => {
            format!(" ({}: {})", label, values.iter().cloned().collect::<Vec<_>>().join(", "))
        }
        _ => String::new(),
    }
}

/// 依標籤決定每台裝置要執行的測試索引
///
/// 指定標籤時，裝置標籤需與之相交，並取得交集所對應的測試；未指定時取得
/// 未標記的測試加上與裝置標籤相交的測試。
pub fn prepare_tests(
    inventory: &AntaInventory,
    catalog: &mut AntaCatalog,
    tests: Option<&BTreeSet<String>>,
    tags: Option<&BTreeSet<String>>,
) -> BTreeMap<String, BTreeSet<usize>> {
    catalog.build_indexes(tests);

    let mut device_to_tests: BTreeMap<String, BTreeSet<usize>> = BTreeMap::new();
    for device in inventory.devices() {
        let selected = match tags {
            Some(tags) if !tags.is_empty() => {
                let matching: BTreeSet<String> = device.tags().intersection(tags).cloned().collect();
                if matching.is_empty() {
                    continue;
                }
                catalog.get_tests_by_tags(&matching, false)
            }
            _ => {
                let mut selected = catalog.untagged_tests();
                selected.extend(catalog.get_tests_by_tags(device.tags(), false));
                selected
            }
        };
        if !selected.is_empty() {
            device_to_tests.insert(device.name().to_string(), selected);
        }
    }
    device_to_tests
}

/// 執行 NRFU：選取裝置與測試，以 `max_concurrency` 為上限並行執行，結果寫入 `manager`
///
/// 回傳選取的測試實例數量（dry-run 時也一樣）。
pub async fn main(
    manager: &mut ResultManager,
    inventory: &AntaInventory,
    catalog: &mut AntaCatalog,
    options: &RunOptions,
    monitor: Option<&SystemMonitor>,
) -> usize {
    if catalog.is_empty() {
        tracing::warn!("The list of tests is empty, exiting");
        return 0;
    }

    let Some(selected_inventory) = setup_inventory(inventory, options).await else {
        return 0;
    };
    if let Some(monitor) = monitor {
        monitor.log_stats("inventory ready");
    }

    let device_to_tests = prepare_tests(&selected_inventory, catalog, options.tests.as_ref(), options.tags.as_ref());
    let total: usize = device_to_tests.values().map(BTreeSet::len).sum();
    if total == 0 {
        tracing::warn!(
            "There are no tests{}{} to run in the current test catalog and device inventory, please verify your inputs.",
            describe_filter("tags", options.tags.as_ref()),
            describe_filter("tests", options.tests.as_ref())
        );
        return 0;
    }

    let instances: Vec<TestInstance> = device_to_tests
        .iter()
        .filter_map(|(name, indices)| selected_inventory.get(name).map(|device| (device, indices)))
        .flat_map(|(device, indices)| {
            indices
                .iter()
                .filter_map(|index| catalog.test(*index))
                .map(|definition| TestInstance::new(Arc::clone(device), definition))
                .collect::<Vec<_>>()
        })
        .collect();

    tracing::info!(
        "Preparing to run {} test(s) on {} device(s), max concurrency {}",
        instances.len(),
        device_to_tests.len(),
        options.max_concurrency
    );

    if options.dry_run {
        for instance in &instances {
            tracing::info!(
                "(dry-run) {} on {} with {} command(s)",
                instance.result().test,
                instance.result().name,
                instance.commands().len()
            );
        }
        tracing::info!("Dry-run mode, exiting before running the tests.");
        return instances.len();
    }

    let count = instances.len();
    let mut results = stream::iter(instances.into_iter().map(TestInstance::run))
        .buffer_unordered(options.max_concurrency.max(1));
    while let Some(result) = results.next().await {
        tracing::debug!("{} on {}: {}", result.test, result.name, result.result);
        manager.add(result);
    }

    if let Some(monitor) = monitor {
        monitor.log_stats("tests completed");
        monitor.log_summary(count);
    }
    log_cache_statistics(selected_inventory.devices()).await;
    count
}

async fn log_cache_statistics<'a>(devices: impl Iterator<Item = &'a Arc<dyn AntaDevice>>) {
    for device in devices {
        match device.cache_statistics().await {
            Some(stats) => tracing::info!(
                "Cache statistics for '{}': {} hits / {} command(s) ({:.2}%)",
                device.name(),
                stats.hits,
                stats.total,
                stats.hit_ratio()
            ),
            None => tracing::info!("Caching is not enabled on {}", device.name()),
        }
    }
}
