use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use crate::checks::{self, TestSpec};
use crate::config::catalog::{read_catalog_file, CommonInputs, RawTestDefinition, ResultOverwrite};
use crate::domain::ports::AntaTest;
use crate::utils::error::{AntaError, Result};

/// 已驗證的測試定義：輸入已解析成測試實例，可在多台裝置間共用
#[derive(Clone)]
pub struct AntaTestDefinition {
    pub spec: &'static TestSpec,
    pub inputs: Value,
    pub filters: Option<BTreeSet<String>>,
    pub result_overwrite: ResultOverwrite,
    pub test: Arc<dyn AntaTest>,
}

impl std::fmt::Debug for AntaTestDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AntaTestDefinition")
            .field("test", &format!("{}.{}", self.spec.module, self.spec.name))
            .field("inputs", &self.inputs)
            .field("filters", &self.filters)
            .finish()
    }
}

impl AntaTestDefinition {
    pub fn new(module: &str, name: &str, inputs: Value) -> Result<Self> {
        let location = format!("{}.{}", module, name);
        let spec = checks::find(module, name).ok_or_else(|| AntaError::CatalogError {
            location: location.clone(),
            message: format!("test '{}' is not defined in module '{}'", name, module),
        })?;

        let (common, specific) = CommonInputs::split(&location, inputs.clone())?;
        let test = spec.build(specific)?;

        Ok(Self {
            spec,
            inputs,
            filters: common.filters.and_then(|f| f.tags),
            result_overwrite: common.result_overwrite.unwrap_or_default(),
            test,
        })
    }

    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    pub fn module(&self) -> &'static str {
        self.spec.module
    }
}

/// 測試目錄，附帶依標籤查詢的索引
#[derive(Debug, Clone, Default)]
pub struct AntaCatalog {
    tests: Vec<AntaTestDefinition>,
    filename: Option<String>,
    tag_to_tests: BTreeMap<Option<String>, BTreeSet<usize>>,
    indexes_built: bool,
}

impl AntaCatalog {
    pub fn new(tests: Vec<AntaTestDefinition>) -> Self {
        Self {
            tests,
            ..Self::default()
        }
    }

    pub fn parse<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = read_catalog_file(&path)?;
        let mut catalog = Self::from_raw(raw)?;
        catalog.filename = Some(path.as_ref().display().to_string());
        tracing::debug!(
            "Loaded {} test definition(s) from {}",
            catalog.len(),
            path.as_ref().display()
        );
        Ok(catalog)
    }

    pub fn from_raw(raw: Vec<RawTestDefinition>) -> Result<Self> {
        let tests = raw
            .into_iter()
            .map(|def| AntaTestDefinition::new(&def.module, &def.name, def.inputs))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(tests))
    }

    /// 從 `(module, name, inputs)` 清單建立
    pub fn from_list<I, M, N>(tests: I) -> Result<Self>
    where
        I: IntoIterator<Item = (M, N, Value)>,
        M: AsRef<str>,
        N: AsRef<str>,
    {
        let tests = tests
            .into_iter()
            .map(|(module, name, inputs)| AntaTestDefinition::new(module.as_ref(), name.as_ref(), inputs))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(tests))
    }

    pub fn merge(mut self, other: AntaCatalog) -> AntaCatalog {
        self.tests.extend(other.tests);
        self.filename = None;
        self.clear_indexes();
        self
    }

    pub fn tests(&self) -> &[AntaTestDefinition] {
        &self.tests
    }

    pub fn test(&self, index: usize) -> Option<&AntaTestDefinition> {
        self.tests.get(index)
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    pub fn clear_indexes(&mut self) {
        self.tag_to_tests.clear();
        self.indexes_built = false;
    }

    /// 建立標籤索引；`filtered_tests` 限定只索引指定名稱的測試
    pub fn build_indexes(&mut self, filtered_tests: Option<&BTreeSet<String>>) {
        self.tag_to_tests.clear();
        for (index, test) in self.tests.iter().enumerate() {
            if let Some(names) = filtered_tests {
                if !names.is_empty() && !names.contains(test.name()) {
                    continue;
                }
            }
            match &test.filters {
                Some(tags) if !tags.is_empty() => {
                    for tag in tags {
                        self.tag_to_tests
                            .entry(Some(tag.clone()))
                            .or_default()
                            .insert(index);
                    }
                }
                _ => {
                    self.tag_to_tests.entry(None).or_default().insert(index);
                }
            }
        }
        self.indexes_built = true;
    }

    /// 沒有 filter 標籤的測試
    pub fn untagged_tests(&mut self) -> BTreeSet<usize> {
        if !self.indexes_built {
            self.build_indexes(None);
        }
        self.tag_to_tests.get(&None).cloned().unwrap_or_default()
    }

    /// 非嚴格模式：任一標籤命中即選取；嚴格模式：測試標籤需包含所有指定標籤
    pub fn get_tests_by_tags(&mut self, tags: &BTreeSet<String>, strict: bool) -> BTreeSet<usize> {
        if !self.indexes_built {
            self.build_indexes(None);
        }
        if strict {
            let indexed: BTreeSet<usize> = self
                .tag_to_tests
                .iter()
                .filter(|(tag, _)| tag.is_some())
                .flat_map(|(_, indices)| indices.iter().copied())
                .collect();
            return indexed
                .into_iter()
                .filter(|index| {
                    self.tests[*index]
                        .filters
                        .as_ref()
                        .map(|test_tags| tags.is_subset(test_tags))
                        .unwrap_or(false)
                })
                .collect();
        }
        tags.iter()
            .filter_map(|tag| self.tag_to_tests.get(&Some(tag.clone())))
            .flat_map(|indices| indices.iter().copied())
            .collect()
    }

    pub fn get_tests_by_names(&self, names: &BTreeSet<String>) -> BTreeSet<usize> {
        self.tests
            .iter()
            .enumerate()
            .filter(|(_, test)| names.contains(test.name()))
            .map(|(index, _)| index)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog() -> AntaCatalog {
        AntaCatalog::from_list(vec![
            ("anta.tests.system", "VerifyUptime", json!({"minimum": 10})),
            (
                "anta.tests.software",
                "VerifyEOSVersion",
                json!({"versions": ["4.31.1F"], "filters": {"tags": ["leaf"]}}),
            ),
            (
                "anta.tests.configuration",
                "VerifyZeroTouch",
                json!({"filters": {"tags": ["leaf", "spine"]}}),
            ),
        ])
        .unwrap()
    }

    fn tags(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_unknown_test_rejected() {
        let err = AntaCatalog::from_list(vec![("anta.tests.system", "VerifyFoo", Value::Null)]).unwrap_err();
        assert!(matches!(err, AntaError::CatalogError { .. }));
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let err = AntaCatalog::from_list(vec![("anta.tests.system", "VerifyUptime", json!({"minimum": "x"}))])
            .unwrap_err();
        assert!(matches!(err, AntaError::InputValidationError { .. }));
    }

    #[test]
    fn test_tag_indexes() {
        let mut catalog = catalog();
        assert_eq!(catalog.untagged_tests(), [0].into());
        assert_eq!(catalog.get_tests_by_tags(&tags(&["leaf"]), false), [1, 2].into());
        assert_eq!(catalog.get_tests_by_tags(&tags(&["spine"]), false), [2].into());
        assert_eq!(catalog.get_tests_by_tags(&tags(&["leaf", "spine"]), true), [2].into());
        assert!(catalog.get_tests_by_tags(&tags(&["border"]), false).is_empty());
    }

    #[test]
    fn test_indexes_restricted_to_names() {
        let mut catalog = catalog();
        catalog.build_indexes(Some(&tags(&["VerifyZeroTouch"])));
        assert!(catalog.untagged_tests().is_empty());
        assert_eq!(catalog.get_tests_by_tags(&tags(&["leaf"]), false), [2].into());
        assert_eq!(catalog.get_tests_by_names(&tags(&["VerifyUptime"])), [0].into());
    }

    #[test]
    fn test_merge_catalogs() {
        let other = AntaCatalog::from_list(vec![("anta.tests.system", "VerifyNTP", Value::Null)]).unwrap();
        let merged = catalog().merge(other);
        assert_eq!(merged.len(), 4);
        assert_eq!(merged.tests()[3].name(), "VerifyNTP");
    }
}
