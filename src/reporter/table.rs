use std::collections::BTreeSet;

use super::convert_categories;
use crate::core::result_manager::ResultManager;
use crate::domain::model::TestStatus;

/// 純文字表格：欄寬依內容計算，儲存格可含多行
#[derive(Debug, Clone)]
pub struct TextTable {
    title: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TextTable {
    pub fn new(title: impl Into<String>, headers: &[&str]) -> Self {
        Self {
            title: title.into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn add_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (idx, cell) in row.iter().enumerate().take(widths.len()) {
                let width = cell.lines().map(|l| l.chars().count()).max().unwrap_or(0);
                widths[idx] = widths[idx].max(width);
            }
        }
        widths
    }

    pub fn render(&self) -> String {
        let widths = self.widths();
        let separator = format!(
            "+{}+",
            widths.iter().map(|w| "-".repeat(w + 2)).collect::<Vec<_>>().join("+")
        );

        let mut out = String::new();
        out.push_str(&format!("{:^width$}\n", self.title, width = separator.chars().count()));
        out.push_str(&separator);
        out.push('\n');
        out.push_str(&render_line(&self.headers.iter().map(String::as_str).collect::<Vec<_>>(), &widths));
        out.push_str(&separator.replace('-', "="));
        out.push('\n');
        for row in &self.rows {
            let lines: Vec<Vec<&str>> = row.iter().map(|cell| cell.lines().collect()).collect();
            let height = lines.iter().map(Vec::len).max().unwrap_or(0).max(1);
            for line_idx in 0..height {
                let cells: Vec<&str> = (0..widths.len())
                    .map(|col| {
                        lines
                            .get(col)
                            .and_then(|cell| cell.get(line_idx))
                            .copied()
                            .unwrap_or("")
                    })
                    .collect();
                out.push_str(&render_line(&cells, &widths));
            }
            out.push_str(&separator);
            out.push('\n');
        }
        out
    }
}

fn render_line(cells: &[&str], widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!(" {:<width$} ", cell, width = width))
        .collect();
    format!("|{}|\n", padded.join("|"))
}

fn format_set(values: &BTreeSet<String>) -> String {
    values.iter().cloned().collect::<Vec<_>>().join(", ")
}

/// 所有結果，一列一筆
pub fn report_all(manager: &ResultManager, title: &str) -> TextTable {
    let mut table = TextTable::new(
        title,
        &["Device", "Test Name", "Test Status", "Message(s)", "Test description", "Test category"],
    );
    for result in manager.results() {
        table.add_row(vec![
            result.name.clone(),
            result.test.clone(),
            result.result.to_string(),
            result.messages.join("\n"),
            result.description.clone(),
            convert_categories(&result.categories).join(", "),
        ]);
    }
    table
}

/// 依裝置彙總；`devices` 限定要列出的裝置
pub fn report_summary_devices(manager: &ResultManager, devices: Option<&BTreeSet<String>>, title: &str) -> TextTable {
    let mut table = TextTable::new(
        title,
        &[
            "Device",
            "# of success",
            "# of skipped",
            "# of failure",
            "# of errors",
            "List of failed or error test cases",
        ],
    );
    for (device, stats) in manager.device_stats() {
        if devices.map(|d| !d.is_empty() && !d.contains(&device)).unwrap_or(false) {
            continue;
        }
        table.add_row(vec![
            device,
            stats.tests_success_count.to_string(),
            stats.tests_skipped_count.to_string(),
            stats.tests_failure_count.to_string(),
            stats.tests_error_count.to_string(),
            format_set(&stats.tests_failure),
        ]);
    }
    table
}

/// 依測試彙總；`tests` 限定要列出的測試
pub fn report_summary_tests(manager: &ResultManager, tests: Option<&BTreeSet<String>>, title: &str) -> TextTable {
    let mut table = TextTable::new(
        title,
        &[
            "Test Name",
            "# of success",
            "# of skipped",
            "# of failure",
            "# of errors",
            "List of failed or error nodes",
        ],
    );
    for (test, stats) in manager.test_stats() {
        if tests.map(|t| !t.is_empty() && !t.contains(&test)).unwrap_or(false) {
            continue;
        }
        table.add_row(vec![
            test,
            stats.devices_success_count.to_string(),
            stats.devices_skipped_count.to_string(),
            stats.devices_failure_count.to_string(),
            stats.devices_error_count.to_string(),
            format_set(&stats.devices_failure),
        ]);
    }
    table
}

/// 總覽一列：各狀態的結果數量
pub fn report_totals(manager: &ResultManager) -> TextTable {
    let mut table = TextTable::new("Summary", &["Total", "Success", "Skipped", "Failure", "Error"]);
    let count = |status: TestStatus| manager.get_total_results(Some(&[status].into())).to_string();
    table.add_row(vec![
        manager.len().to_string(),
        count(TestStatus::Success),
        count(TestStatus::Skipped),
        count(TestStatus::Failure),
        count(TestStatus::Error),
    ]);
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::fixtures;

    #[test]
    fn test_report_all() {
        let table = report_all(&fixtures::manager(), "All tests results");
        assert_eq!(table.rows().len(), 4);
        assert_eq!(table.rows()[1][5], "BGP");

        let rendered = table.render();
        assert!(rendered.contains("All tests results"));
        assert!(rendered.contains("| Device "));
        assert!(rendered.contains("VerifyBGPPeerSession"));
        assert!(rendered.lines().filter(|l| l.starts_with('|')).all(|l| l.ends_with('|')));
    }

    #[test]
    fn test_summary_devices() {
        let table = report_summary_devices(&fixtures::manager(), None, "Summary per device");
        assert_eq!(
            table.rows()[1],
            vec!["spine1", "0", "1", "0", "1", "VerifyUptime"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );

        let only: BTreeSet<String> = ["leaf1".to_string()].into();
        assert_eq!(report_summary_devices(&fixtures::manager(), Some(&only), "t").rows().len(), 1);
    }

    #[test]
    fn test_summary_tests() {
        let table = report_summary_tests(&fixtures::manager(), None, "Summary per test");
        let uptime = table.rows().iter().find(|r| r[0] == "VerifyUptime").unwrap();
        assert_eq!(uptime[1], "1");
        assert_eq!(uptime[4], "1");
        assert_eq!(uptime[5], "spine1");
    }

    #[test]
    fn test_multiline_cells_are_aligned() {
        let mut table = TextTable::new("t", &["a", "b"]);
        table.add_row(vec!["x".to_string(), "line one\nline two".to_string()]);
        let rendered = table.render();
        let widths: BTreeSet<usize> = rendered
            .lines()
            .skip(1)
            .map(|l| l.chars().count())
            .collect();
        assert_eq!(widths.len(), 1);
    }
}
