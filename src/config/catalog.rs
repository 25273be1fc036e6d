use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_yaml::Value as YamlValue;
use std::collections::BTreeSet;
use std::path::Path;

use crate::utils::error::{AntaError, Result};

/// 測試目錄檔格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogFormat {
    Yaml,
    Json,
}

impl CatalogFormat {
    /// 依副檔名判斷，預設 YAML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => CatalogFormat::Json,
            _ => CatalogFormat::Yaml,
        }
    }
}

/// 所有測試共有的輸入欄位
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Filters {
    #[serde(default)]
    pub tags: Option<BTreeSet<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ResultOverwrite {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub custom_field: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommonInputs {
    pub filters: Option<Filters>,
    pub result_overwrite: Option<ResultOverwrite>,
}

/// 目錄中的一筆原始測試定義（尚未對應到實作）
#[derive(Debug, Clone, PartialEq)]
pub struct RawTestDefinition {
    pub module: String,
    pub name: String,
    pub inputs: Value,
}

impl CommonInputs {
    /// 從輸入中移除共有欄位，剩餘部分交給各測試自行解析
    pub fn split(location: &str, inputs: Value) -> Result<(CommonInputs, Value)> {
        let mut map = match inputs {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(AntaError::CatalogError {
                    location: location.to_string(),
                    message: format!("inputs must be a mapping, got {}", other),
                })
            }
        };

        let filters = map
            .remove("filters")
            .filter(|v| !v.is_null())
            .map(serde_json::from_value::<Filters>)
            .transpose()
            .map_err(|e| AntaError::CatalogError {
                location: location.to_string(),
                message: format!("invalid filters: {}", e),
            })?;
        let result_overwrite = map
            .remove("result_overwrite")
            .filter(|v| !v.is_null())
            .map(serde_json::from_value::<ResultOverwrite>)
            .transpose()
            .map_err(|e| AntaError::CatalogError {
                location: location.to_string(),
                message: format!("invalid result_overwrite: {}", e),
            })?;

        Ok((
            CommonInputs {
                filters,
                result_overwrite,
            },
            Value::Object(map),
        ))
    }
}

pub fn read_catalog_file<P: AsRef<Path>>(path: P) -> Result<Vec<RawTestDefinition>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| AntaError::CatalogError {
        location: path.display().to_string(),
        message: format!("cannot read file: {}", e),
    })?;
    parse_catalog_str(&content, CatalogFormat::from_path(path)).map_err(|e| match e {
        AntaError::CatalogError { location, message } => AntaError::CatalogError {
            location: format!("{} ({})", path.display(), location),
            message,
        },
        other => other,
    })
}

/// 解析 `module: [ {TestName: inputs}, ... ]`，子模組可巢狀
///
/// 兩種格式都讀成 `serde_yaml::Value`，以保留檔案中的模組與測試順序。
pub fn parse_catalog_str(content: &str, format: CatalogFormat) -> Result<Vec<RawTestDefinition>> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let root: YamlValue = match format {
        CatalogFormat::Yaml => serde_yaml::from_str(content)?,
        CatalogFormat::Json => serde_json::from_str(content)?,
    };

    let modules = match root {
        YamlValue::Null => return Ok(Vec::new()),
        YamlValue::Mapping(modules) => modules,
        other => {
            return Err(AntaError::CatalogError {
                location: "catalog".to_string(),
                message: format!("expected a mapping of modules, got {}", describe(&other)),
            })
        }
    };

    let mut definitions = Vec::new();
    for (module, tests) in modules {
        let module = key_to_string("catalog", module)?;
        flatten_module(&module, tests, &mut definitions)?;
    }
    Ok(definitions)
}

fn flatten_module(module: &str, tests: YamlValue, out: &mut Vec<RawTestDefinition>) -> Result<()> {
    match tests {
        YamlValue::Sequence(items) => {
            for item in items {
                match item {
                    YamlValue::Mapping(entry) if entry.len() == 1 => {
                        for (name, inputs) in entry {
                            out.push(RawTestDefinition {
                                module: module.to_string(),
                                name: key_to_string(module, name)?,
                                inputs: to_json(module, inputs)?,
                            });
                        }
                    }
                    YamlValue::String(name) => out.push(RawTestDefinition {
                        module: module.to_string(),
                        name,
                        inputs: Value::Null,
                    }),
                    other => {
                        return Err(AntaError::CatalogError {
                            location: module.to_string(),
                            message: format!(
                                "each test must be a single-key mapping 'TestName: inputs', got {}",
                                describe(&other)
                            ),
                        })
                    }
                }
            }
            Ok(())
        }
        YamlValue::Mapping(submodules) => {
            for (submodule, tests) in submodules {
                let submodule = key_to_string(module, submodule)?;
                flatten_module(&format!("{}.{}", module, submodule), tests, out)?;
            }
            Ok(())
        }
        YamlValue::Null => Ok(()),
        other => Err(AntaError::CatalogError {
            location: module.to_string(),
            message: format!("expected a list of tests, got {}", describe(&other)),
        }),
    }
}

fn key_to_string(location: &str, key: YamlValue) -> Result<String> {
    match key {
        YamlValue::String(key) => Ok(key),
        other => Err(AntaError::CatalogError {
            location: location.to_string(),
            message: format!("keys must be strings, got {}", describe(&other)),
        }),
    }
}

fn to_json(location: &str, value: YamlValue) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| AntaError::CatalogError {
        location: location.to_string(),
        message: format!("unsupported input value: {}", e),
    })
}

fn describe(value: &YamlValue) -> &'static str {
    match value {
        YamlValue::Null => "null",
        YamlValue::Bool(_) => "a boolean",
        YamlValue::Number(_) => "a number",
        YamlValue::String(_) => "a string",
        YamlValue::Sequence(_) => "a list",
        YamlValue::Mapping(_) => "a mapping",
        YamlValue::Tagged(_) => "a tagged value",
    }
}
