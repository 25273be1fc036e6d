use std::path::Path;

use super::write_report;
use crate::core::result_manager::ResultManager;
use crate::utils::error::Result;

/// 結果序列化為 JSON 陣列；指定 `output` 時同時寫入檔案
pub fn report_json(manager: &ResultManager, output: Option<&Path>) -> Result<String> {
    let content = manager.json()?;
    if let Some(path) = output {
        write_report(path, &content)?;
    }
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::fixtures;
    use serde_json::Value;

    #[test]
    fn test_json_report_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("nrfu.json");
        let content = report_json(&fixtures::manager(), Some(&path)).unwrap();

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, serde_json::from_str::<Value>(&content).unwrap());
        assert_eq!(written.as_array().unwrap().len(), 4);
        assert_eq!(written[1]["result"], "failure");
        assert_eq!(written[1]["categories"][0], "bgp");
    }
}
