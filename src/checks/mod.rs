//! 驗證測試，依 EOS 功能分模組
//!
//! 每個測試是一個 struct，欄位即 catalog 輸入；registry 以 `(module, name)`
//! 對應到該 struct。

pub mod configuration;
pub mod connectivity;
pub mod hardware;
pub mod interfaces;
pub mod mlag;
pub mod routing;
pub mod security;
pub mod services;
pub mod software;
pub mod system;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::{Arc, OnceLock};

use crate::domain::model::AntaCommand;
use crate::domain::ports::AntaTest;
use crate::utils::error::{AntaError, Result};

type BuildFn = fn(Value) -> std::result::Result<Arc<dyn AntaTest>, String>;

/// 測試登錄項：目錄中的模組路徑與名稱、描述、分類及建構函式
#[derive(Clone, Copy)]
pub struct TestSpec {
    pub module: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub categories: &'static [&'static str],
    build: BuildFn,
}

impl std::fmt::Debug for TestSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestSpec")
            .field("module", &self.module)
            .field("name", &self.name)
            .finish()
    }
}

impl TestSpec {
    pub fn of<T>(
        module: &'static str,
        name: &'static str,
        description: &'static str,
        categories: &'static [&'static str],
    ) -> Self
    where
        T: AntaTest + DeserializeOwned + 'static,
    {
        Self {
            module,
            name,
            description,
            categories,
            build: build_test::<T>,
        }
    }

    /// 嚴格解析並驗證測試輸入（不含 filters / result_overwrite）
    pub fn build(&self, inputs: Value) -> Result<Arc<dyn AntaTest>> {
        let inputs = if inputs.is_null() {
            Value::Object(serde_json::Map::new())
        } else {
            inputs
        };
        (self.build)(inputs).map_err(|message| AntaError::InputValidationError {
            test: format!("{}.{}", self.module, self.name),
            message,
        })
    }
}

fn build_test<T>(inputs: Value) -> std::result::Result<Arc<dyn AntaTest>, String>
where
    T: AntaTest + DeserializeOwned + 'static,
{
    let test: T = serde_json::from_value(inputs).map_err(|e| e.to_string())?;
    test.validate_inputs().map_err(|e| e.to_string())?;
    Ok(Arc::new(test))
}

/// 取第 `index` 個指令的 JSON 輸出
pub(crate) fn json_at(commands: &[AntaCommand], index: usize) -> Result<&Map<String, Value>> {
    command_at(commands, index)?.json_output()
}

pub(crate) fn text_at(commands: &[AntaCommand], index: usize) -> Result<&str> {
    command_at(commands, index)?.text_output()
}

pub(crate) fn command_at(commands: &[AntaCommand], index: usize) -> Result<&AntaCommand> {
    commands
        .get(index)
        .ok_or_else(|| AntaError::test(format!("expected at least {} collected command(s)", index + 1)))
}

pub fn registry() -> &'static [TestSpec] {
    static REGISTRY: OnceLock<Vec<TestSpec>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut specs = Vec::new();
        specs.extend(configuration::specs());
        specs.extend(connectivity::specs());
        specs.extend(hardware::specs());
        specs.extend(interfaces::specs());
        specs.extend(mlag::specs());
        specs.extend(routing::specs());
        specs.extend(security::specs());
        specs.extend(services::specs());
        specs.extend(software::specs());
        specs.extend(system::specs());
        specs
    })
}

pub fn find(module: &str, name: &str) -> Option<&'static TestSpec> {
    registry()
        .iter()
        .find(|spec| spec.module == module && spec.name == name)
}
