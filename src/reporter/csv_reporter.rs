use std::path::Path;

use super::convert_categories;
use crate::core::result_manager::ResultManager;
use crate::domain::model::TestResult;
use crate::utils::error::Result;

pub const HEADERS: [&str; 6] = [
    "Device",
    "Test Name",
    "Test Status",
    "Messages",
    "Test description",
    "Test category",
];

fn record(result: &TestResult) -> [String; 6] {
    [
        result.name.clone(),
        result.test.clone(),
        result.result.to_string(),
        result.messages.join(" - "),
        result.description.clone(),
        convert_categories(&result.categories).join(", "),
    ]
}

/// 將結果寫成 CSV 檔
pub fn generate(manager: &ResultManager, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut writer = ::csv::Writer::from_path(path)?;
    writer.write_record(HEADERS)?;
    for result in manager.results() {
        writer.write_record(record(result))?;
    }
    writer.flush()?;
    tracing::info!("CSV report saved to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::fixtures;

    #[test]
    fn test_csv_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        generate(&fixtures::manager(), &path).unwrap();

        let mut reader = ::csv::Reader::from_path(&path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, HEADERS.to_vec());

        let rows: Vec<::csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 4);
        assert_eq!(&rows[1][0], "leaf1");
        assert_eq!(&rows[1][2], "failure");
        assert_eq!(&rows[1][5], "BGP");
    }

    #[test]
    fn test_messages_joined() {
        let mut result = TestResult::new("leaf1", "VerifyX", vec!["mlag".to_string(), "system".to_string()], "d", None);
        result.messages = vec!["first".to_string(), "second".to_string()];
        let row = record(&result);
        assert_eq!(row[3], "first - second");
        assert_eq!(row[5], "MLAG, System");
    }
}
