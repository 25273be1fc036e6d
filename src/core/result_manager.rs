use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::model::{TestResult, TestStatus};
use crate::utils::error::Result;

/// 排序欄位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Name,
    Test,
    Result,
    Categories,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceStats {
    pub tests_success_count: usize,
    pub tests_skipped_count: usize,
    pub tests_failure_count: usize,
    pub tests_error_count: usize,
    pub tests_unset_count: usize,
    pub tests_failure: BTreeSet<String>,
    pub categories_failed: BTreeSet<String>,
    pub categories_skipped: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryStats {
    pub tests_success_count: usize,
    pub tests_skipped_count: usize,
    pub tests_failure_count: usize,
    pub tests_error_count: usize,
    pub tests_unset_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TestStats {
    pub devices_success_count: usize,
    pub devices_skipped_count: usize,
    pub devices_failure_count: usize,
    pub devices_error_count: usize,
    pub devices_unset_count: usize,
    pub devices_failure: BTreeSet<String>,
}

/// 測試結果彙總
///
/// `status` 的升級規則：`unset` 接受第一個非 error 狀態，`skipped` 可升級為
/// `success`/`failure`，`success` 只能升級為 `failure`。`error` 不改變 `status`，
/// 只設定 `error_status`。
#[derive(Debug, Clone, Default)]
pub struct ResultManager {
    results: Vec<TestResult>,
    status: TestStatus,
    error_status: bool,
}

impl ResultManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    pub fn status(&self) -> TestStatus {
        self.status
    }

    pub fn error_status(&self) -> bool {
        self.error_status
    }

    pub fn add(&mut self, result: TestResult) {
        self.update_status(result.result);
        self.results.push(result);
    }

    pub fn extend(&mut self, results: impl IntoIterator<Item = TestResult>) {
        for result in results {
            self.add(result);
        }
    }

    fn update_status(&mut self, test_status: TestStatus) {
        if test_status == TestStatus::Error {
            self.error_status = true;
            return;
        }
        match (self.status, test_status) {
            (TestStatus::Unset, _) => self.status = test_status,
            (TestStatus::Skipped, TestStatus::Success | TestStatus::Failure) => self.status = test_status,
            (TestStatus::Success, TestStatus::Failure) => self.status = TestStatus::Failure,
            _ => {}
        }
    }

    /// 整體狀態；未忽略錯誤時，任何 error 結果都會使狀態為 `error`
    pub fn get_status(&self, ignore_error: bool) -> TestStatus {
        if self.error_status && !ignore_error {
            TestStatus::Error
        } else {
            self.status
        }
    }

    pub fn get_results(&self, status: Option<&BTreeSet<TestStatus>>, sort_by: Option<&[SortField]>) -> Vec<&TestResult> {
        let mut results: Vec<&TestResult> = self
            .results
            .iter()
            .filter(|r| status.map(|s| s.contains(&r.result)).unwrap_or(true))
            .collect();
        if let Some(fields) = sort_by {
            results.sort_by(|a, b| {
                fields
                    .iter()
                    .map(|field| match field {
                        SortField::Name => a.name.cmp(&b.name),
                        SortField::Test => a.test.cmp(&b.test),
                        SortField::Result => a.result.as_str().cmp(b.result.as_str()),
                        SortField::Categories => a.categories.cmp(&b.categories),
                    })
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        results
    }

    pub fn get_total_results(&self, status: Option<&BTreeSet<TestStatus>>) -> usize {
        match status {
            Some(status) => self.results.iter().filter(|r| status.contains(&r.result)).count(),
            None => self.results.len(),
        }
    }

    pub fn results_by_status(&self) -> BTreeMap<TestStatus, Vec<&TestResult>> {
        let mut grouped: BTreeMap<TestStatus, Vec<&TestResult>> = BTreeMap::new();
        for result in &self.results {
            grouped.entry(result.result).or_default().push(result);
        }
        grouped
    }

    /// 隱藏指定狀態後的新 manager
    pub fn filter(&self, hide: &BTreeSet<TestStatus>) -> ResultManager {
        let mut manager = ResultManager::new();
        manager.extend(self.results.iter().filter(|r| !hide.contains(&r.result)).cloned());
        manager
    }

    pub fn filter_by_tests(&self, tests: &BTreeSet<String>) -> ResultManager {
        let mut manager = ResultManager::new();
        manager.extend(self.results.iter().filter(|r| tests.contains(&r.test)).cloned());
        manager
    }

    pub fn filter_by_devices(&self, devices: &BTreeSet<String>) -> ResultManager {
        let mut manager = ResultManager::new();
        manager.extend(self.results.iter().filter(|r| devices.contains(&r.name)).cloned());
        manager
    }

    pub fn get_tests(&self) -> BTreeSet<String> {
        self.results.iter().map(|r| r.test.clone()).collect()
    }

    pub fn get_devices(&self) -> BTreeSet<String> {
        self.results.iter().map(|r| r.name.clone()).collect()
    }

    pub fn device_stats(&self) -> BTreeMap<String, DeviceStats> {
        let mut stats: BTreeMap<String, DeviceStats> = BTreeMap::new();
        for result in &self.results {
            let entry = stats.entry(result.name.clone()).or_default();
            match result.result {
                TestStatus::Success => entry.tests_success_count += 1,
                TestStatus::Skipped => {
                    entry.tests_skipped_count += 1;
                    entry.categories_skipped.extend(result.categories.iter().cloned());
                }
                TestStatus::Failure | TestStatus::Error => {
                    if result.result == TestStatus::Failure {
                        entry.tests_failure_count += 1;
                    } else {
                        entry.tests_error_count += 1;
                    }
                    entry.tests_failure.insert(result.test.clone());
                    entry.categories_failed.extend(result.categories.iter().cloned());
                }
                TestStatus::Unset => entry.tests_unset_count += 1,
            }
        }
        stats
    }

    pub fn category_stats(&self) -> BTreeMap<String, CategoryStats> {
        let mut stats: BTreeMap<String, CategoryStats> = BTreeMap::new();
        for result in &self.results {
            for category in &result.categories {
                let entry = stats.entry(category.clone()).or_default();
                match result.result {
                    TestStatus::Success => entry.tests_success_count += 1,
                    TestStatus::Skipped => entry.tests_skipped_count += 1,
                    TestStatus::Failure => entry.tests_failure_count += 1,
                    TestStatus::Error => entry.tests_error_count += 1,
                    TestStatus::Unset => entry.tests_unset_count += 1,
                }
            }
        }
        stats
    }

    pub fn test_stats(&self) -> BTreeMap<String, TestStats> {
        let mut stats: BTreeMap<String, TestStats> = BTreeMap::new();
        for result in &self.results {
            let entry = stats.entry(result.test.clone()).or_default();
            match result.result {
                TestStatus::Success => entry.devices_success_count += 1,
                TestStatus::Skipped => entry.devices_skipped_count += 1,
                TestStatus::Failure => {
                    entry.devices_failure_count += 1;
                    entry.devices_failure.insert(result.name.clone());
                }
                TestStatus::Error => {
                    entry.devices_error_count += 1;
                    entry.devices_failure.insert(result.name.clone());
                }
                TestStatus::Unset => entry.devices_unset_count += 1,
            }
        }
        stats
    }

    pub fn json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.results)?)
    }
}
