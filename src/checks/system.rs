use regex::Regex;
use serde::Deserialize;

use super::{json_at, text_at, TestSpec};
use crate::domain::model::{AntaCommand, TestResult};
use crate::domain::ports::{AntaTest, CommandSpec};
use crate::utils::error::{AntaError, Result};
use crate::utils::validation::validate_positive_number;

const MODULE: &str = "anta.tests.system";

/// CPU idle 低於此百分比視為高使用率
const CPU_IDLE_THRESHOLD: f64 = 25.0;
/// 可用記憶體比例低於此值視為高使用率
const MEMORY_FREE_THRESHOLD: f64 = 0.25;
const DISK_USAGE_THRESHOLD: u32 = 75;

const EXPECTED_RELOAD_CAUSES: &[&str] = &["Reload requested by the user.", "Reload requested after FPGA upgrade"];

pub fn specs() -> Vec<TestSpec> {
    vec![
        TestSpec::of::<VerifyUptime>(
            MODULE,
            "VerifyUptime",
            "Verifies the device uptime.",
            &["system"],
        ),
        TestSpec::of::<VerifyReloadCause>(
            MODULE,
            "VerifyReloadCause",
            "Verifies the last reload cause of the device.",
            &["system"],
        ),
        TestSpec::of::<VerifyCoredump>(
            MODULE,
            "VerifyCoredump",
            "Verifies there are no core dump files.",
            &["system"],
        ),
        TestSpec::of::<VerifyAgentLogs>(
            MODULE,
            "VerifyAgentLogs",
            "Verifies there are no agent crash reports.",
            &["system"],
        ),
        TestSpec::of::<VerifyCPUUtilization>(
            MODULE,
            "VerifyCPUUtilization",
            "Verifies whether the CPU utilization is below 75%.",
            &["system"],
        ),
        TestSpec::of::<VerifyMemoryUtilization>(
            MODULE,
            "VerifyMemoryUtilization",
            "Verifies whether the memory utilization is below 75%.",
            &["system"],
        ),
        TestSpec::of::<VerifyFileSystemUtilization>(
            MODULE,
            "VerifyFileSystemUtilization",
            "Verifies that no partition is utilizing more than 75% of its disk space.",
            &["system"],
        ),
        TestSpec::of::<VerifyNTP>(
            MODULE,
            "VerifyNTP",
            "Verifies if NTP is synchronised.",
            &["system"],
        ),
    ]
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyUptime {
    /// 最小運作秒數
    pub minimum: u64,
}

impl AntaTest for VerifyUptime {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaCommand::new("show uptime").with_revision(1).into()]
    }

    fn validate_inputs(&self) -> Result<()> {
        validate_positive_number("minimum", self.minimum as usize, 1)
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let output = json_at(commands, 0)?;
        let uptime = output
            .get("upTime")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| AntaError::CommandOutputError {
                command: "show uptime".to_string(),
                reason: "missing 'upTime'".to_string(),
            })?;
        if uptime > self.minimum as f64 {
            result.is_success(None);
        } else {
            result.fail(format!(
                "Device uptime is incorrect - Expected: {}s Actual: {}s",
                self.minimum, uptime
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyReloadCause {}

impl AntaTest for VerifyReloadCause {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaCommand::new("show reload cause").with_revision(1).into()]
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let output = json_at(commands, 0)?;
        let causes = output
            .get("resetCauses")
            .and_then(|c| c.as_array())
            .cloned()
            .unwrap_or_default();
        let Some(last) = causes.first() else {
            result.is_success(Some("No reload cause".to_string()));
            return Ok(());
        };
        let description = last.get("description").and_then(|d| d.as_str()).unwrap_or_default();
        if EXPECTED_RELOAD_CAUSES.contains(&description) {
            result.is_success(None);
        } else {
            result.fail(format!("Reload cause is: {}", description));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyCoredump {}

impl AntaTest for VerifyCoredump {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaCommand::new("show system coredump").with_revision(1).into()]
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let output = json_at(commands, 0)?;
        // minidump 是 EOS 正常行為
        let core_files: Vec<&str> = output
            .get("coreFiles")
            .and_then(|c| c.as_array())
            .map(|files| {
                files
                    .iter()
                    .filter_map(|f| f.as_str())
                    .filter(|f| *f != "minidump")
                    .collect()
            })
            .unwrap_or_default();
        if core_files.is_empty() {
            result.is_success(None);
        } else {
            result.fail(format!("Core dump(s) have been found: {}", core_files.join(", ")));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyAgentLogs {}

impl AntaTest for VerifyAgentLogs {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaCommand::text("show agent logs crash").into()]
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let output = text_at(commands, 0)?;
        if output.trim().is_empty() {
            result.is_success(None);
            return Ok(());
        }
        let agent = Regex::new(r"===> (.*?) <===").map_err(|e| AntaError::test(e.to_string()))?;
        let agents: Vec<String> = agent
            .captures_iter(output)
            .map(|caps| format!(" * {}", &caps[1]))
            .collect();
        result.fail(format!("Device has reported agent crashes:\n{}", agents.join("\n")));
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyCPUUtilization {}

impl AntaTest for VerifyCPUUtilization {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaCommand::new("show processes top once").with_revision(1).into()]
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let output = json_at(commands, 0)?;
        let idle = output
            .get("cpuInfo")
            .and_then(|c| c.get("%Cpu(s)"))
            .and_then(|c| c.get("idle"))
            .and_then(|i| i.as_f64())
            .ok_or_else(|| AntaError::CommandOutputError {
                command: "show processes top once".to_string(),
                reason: "missing CPU idle counter".to_string(),
            })?;
        if idle > CPU_IDLE_THRESHOLD {
            result.is_success(None);
        } else {
            result.fail(format!(
                "Device has reported a high CPU utilization - Expected: < 75% Actual: {}%",
                100.0 - idle
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyMemoryUtilization {}

impl AntaTest for VerifyMemoryUtilization {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaCommand::new("show version").with_revision(1).into()]
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let output = json_at(commands, 0)?;
        let field = |name: &str| {
            output
                .get(name)
                .and_then(|v| v.as_f64())
                .ok_or_else(|| AntaError::CommandOutputError {
                    command: "show version".to_string(),
                    reason: format!("missing '{}'", name),
                })
        };
        let total = field("memTotal")?;
        let free = field("memFree")?;
        if total <= 0.0 {
            return Err(AntaError::test("device reported a total memory of 0"));
        }
        let ratio = free / total;
        if ratio > MEMORY_FREE_THRESHOLD {
            result.is_success(None);
        } else {
            result.fail(format!(
                "Device has reported a high memory usage - Expected: < 75% Actual: {:.2}%",
                (1.0 - ratio) * 100.0
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyFileSystemUtilization {}

impl AntaTest for VerifyFileSystemUtilization {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaCommand::text("bash timeout 10 df -h").into()]
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let output = text_at(commands, 0)?;
        result.is_success(None);
        for line in output.lines().skip(1) {
            if line.trim().is_empty() || line.contains("loop") {
                continue;
            }
            let usage = line
                .split_whitespace()
                .nth(4)
                .and_then(|col| col.trim_end_matches('%').parse::<u32>().ok());
            if let Some(percentage) = usage {
                if percentage > DISK_USAGE_THRESHOLD {
                    result.fail(format!(
                        "Mount point: {} - Higher disk space utilization - Expected: 75% Actual: {}%",
                        line, percentage
                    ));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyNTP {}

impl AntaTest for VerifyNTP {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaCommand::text("show ntp status").into()]
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let output = text_at(commands, 0)?;
        let status = output
            .lines()
            .next()
            .and_then(|line| line.split(',').next())
            .unwrap_or_default()
            .trim();
        if status == "synchronised" {
            result.is_success(None);
        } else {
            result.fail(format!("NTP status mismatch - Expected: synchronised Actual: {}", status));
        }
        Ok(())
    }
}
