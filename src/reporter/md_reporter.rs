use chrono::Local;
use std::fmt::Write as _;
use std::path::Path;

use super::{convert_categories, write_report};
use crate::core::result_manager::ResultManager;
use crate::domain::model::TestStatus;
use crate::utils::error::{AntaError, Result};

const TOC: &str = "**Table of Contents:**

- [ANTA Report](#anta-report)
  - [Test Results Summary](#test-results-summary)
    - [Summary Totals](#summary-totals)
    - [Summary Totals Device Under Test](#summary-totals-device-under-test)
    - [Summary Totals Per Category](#summary-totals-per-category)
  - [Test Results](#test-results)
";

/// 表格儲存格不可含 `|` 或換行
fn safe_cell(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', "<br>")
}

fn table_header(out: &mut String, headers: &[&str]) -> std::fmt::Result {
    writeln!(out, "| {} |", headers.join(" | "))?;
    writeln!(
        out,
        "| {} |",
        headers.iter().map(|h| "-".repeat(h.len())).collect::<Vec<_>>().join(" | ")
    )
}

fn table_row(out: &mut String, cells: &[String]) -> std::fmt::Result {
    writeln!(
        out,
        "| {} |",
        cells.iter().map(|c| safe_cell(c)).collect::<Vec<_>>().join(" | ")
    )
}

fn write_summary_totals(out: &mut String, manager: &ResultManager) -> std::fmt::Result {
    writeln!(out, "### Summary Totals\n")?;
    table_header(
        out,
        &[
            "Total Tests",
            "Total Tests Success",
            "Total Tests Skipped",
            "Total Tests Failure",
            "Total Tests Error",
        ],
    )?;
    let count = |status: TestStatus| manager.get_total_results(Some(&[status].into())).to_string();
    table_row(
        out,
        &[
            manager.len().to_string(),
            count(TestStatus::Success),
            count(TestStatus::Skipped),
            count(TestStatus::Failure),
            count(TestStatus::Error),
        ],
    )?;
    writeln!(out)
}

fn write_summary_devices(out: &mut String, manager: &ResultManager) -> std::fmt::Result {
    writeln!(out, "### Summary Totals Device Under Test\n")?;
    table_header(
        out,
        &[
            "Device Under Test",
            "Total Tests",
            "Tests Success",
            "Tests Skipped",
            "Tests Failure",
            "Tests Error",
            "Categories Skipped",
            "Categories Failed",
        ],
    )?;
    for (device, stats) in manager.device_stats() {
        let total = stats.tests_success_count
            + stats.tests_skipped_count
            + stats.tests_failure_count
            + stats.tests_error_count
            + stats.tests_unset_count;
        let skipped: Vec<String> = stats.categories_skipped.into_iter().collect();
        let failed: Vec<String> = stats.categories_failed.into_iter().collect();
        table_row(
            out,
            &[
                device,
                total.to_string(),
                stats.tests_success_count.to_string(),
                stats.tests_skipped_count.to_string(),
                stats.tests_failure_count.to_string(),
                stats.tests_error_count.to_string(),
                convert_categories(&skipped).join(", "),
                convert_categories(&failed).join(", "),
            ],
        )?;
    }
    writeln!(out)
}

fn write_summary_categories(out: &mut String, manager: &ResultManager) -> std::fmt::Result {
    writeln!(out, "### Summary Totals Per Category\n")?;
    table_header(
        out,
        &[
            "Test Category",
            "Total Tests",
            "Tests Success",
            "Tests Skipped",
            "Tests Failure",
            "Tests Error",
        ],
    )?;
    for (category, stats) in manager.category_stats() {
        let total = stats.tests_success_count
            + stats.tests_skipped_count
            + stats.tests_failure_count
            + stats.tests_error_count
            + stats.tests_unset_count;
        table_row(
            out,
            &[
                convert_categories(&[category]).join(""),
                total.to_string(),
                stats.tests_success_count.to_string(),
                stats.tests_skipped_count.to_string(),
                stats.tests_failure_count.to_string(),
                stats.tests_error_count.to_string(),
            ],
        )?;
    }
    writeln!(out)
}

fn write_results(out: &mut String, manager: &ResultManager) -> std::fmt::Result {
    writeln!(out, "## Test Results\n")?;
    table_header(
        out,
        &[
            "Device Under Test",
            "Categories",
            "Test",
            "Description",
            "Custom Field",
            "Result",
            "Messages",
        ],
    )?;
    for result in manager.results() {
        table_row(
            out,
            &[
                result.name.clone(),
                convert_categories(&result.categories).join(", "),
                result.test.clone(),
                result.description.clone(),
                result.custom_field.clone().unwrap_or_else(|| "-".to_string()),
                result.result.to_string(),
                result.messages.join(", "),
            ],
        )?;
    }
    Ok(())
}

/// 產生 Markdown 報表內容
pub fn render_report(manager: &ResultManager) -> Result<String> {
    let mut out = String::new();
    build(&mut out, manager).map_err(|e| AntaError::test(format!("failed to render markdown report: {}", e)))?;
    Ok(out)
}

fn build(out: &mut String, manager: &ResultManager) -> std::fmt::Result {
    writeln!(out, "# ANTA Report\n")?;
    writeln!(out, "_Generated on {}_\n", Local::now().format("%Y-%m-%d %H:%M:%S %Z"))?;
    writeln!(out, "{}", TOC)?;
    writeln!(out, "## Test Results Summary\n")?;
    write_summary_totals(out, manager)?;
    write_summary_devices(out, manager)?;
    write_summary_categories(out, manager)?;
    write_results(out, manager)
}

pub fn generate(manager: &ResultManager, path: &Path) -> Result<()> {
    let content = render_report(manager)?;
    write_report(path, &content)
}
