use serde::Deserialize;

use super::{json_at, text_at, TestSpec};
use crate::domain::model::{AntaCommand, TestResult};
use crate::domain::ports::{AntaTest, CommandSpec};
use crate::utils::error::{AntaError, Result};

const MODULE: &str = "anta.tests.security";

pub fn specs() -> Vec<TestSpec> {
    vec![
        TestSpec::of::<VerifySSHStatus>(
            MODULE,
            "VerifySSHStatus",
            "Verifies if the SSHD agent is disabled in the default VRF.",
            &["security"],
        ),
        TestSpec::of::<VerifyAPIHttpStatus>(
            MODULE,
            "VerifyAPIHttpStatus",
            "Verifies if eAPI HTTP server is disabled globally.",
            &["security"],
        ),
    ]
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifySSHStatus {}

impl AntaTest for VerifySSHStatus {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaCommand::text("show management ssh").into()]
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let output = text_at(commands, 0)?;
        let line = output
            .lines()
            .find(|line| line.starts_with("SSHD status"))
            .ok_or_else(|| AntaError::test("Could not find SSH status in returned output"))?;
        if line.contains("disabled") {
            result.is_success(None);
        } else {
            result.fail(format!("{} != disabled", line));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyAPIHttpStatus {}

impl AntaTest for VerifyAPIHttpStatus {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaCommand::new("show management api http-commands").with_revision(1).into()]
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let output = json_at(commands, 0)?;
        let enabled = output.get("enabled").and_then(|e| e.as_bool()).unwrap_or(false);
        let running = output
            .get("httpServer")
            .and_then(|s| s.get("running"))
            .and_then(|r| r.as_bool())
            .unwrap_or(false);
        if !enabled || !running {
            result.is_success(None);
        } else {
            result.fail("eAPI HTTP server is enabled globally");
        }
        Ok(())
    }
}
