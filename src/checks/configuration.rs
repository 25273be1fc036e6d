use regex::Regex;
use serde::Deserialize;

use super::{json_at, text_at, TestSpec};
use crate::domain::model::{AntaCommand, TestResult};
use crate::domain::ports::{AntaTest, CommandSpec};
use crate::utils::error::{AntaError, Result};

const MODULE: &str = "anta.tests.configuration";

pub fn specs() -> Vec<TestSpec> {
    vec![
        TestSpec::of::<VerifyZeroTouch>(
            MODULE,
            "VerifyZeroTouch",
            "Verifies ZeroTouch is disabled.",
            &["configuration"],
        ),
        TestSpec::of::<VerifyRunningConfigDiffs>(
            MODULE,
            "VerifyRunningConfigDiffs",
            "Verifies there is no difference between the running-config and the startup-config.",
            &["configuration"],
        ),
        TestSpec::of::<VerifyRunningConfigLines>(
            MODULE,
            "VerifyRunningConfigLines",
            "Search the Running-Config for the given RegEx patterns.",
            &["configuration"],
        ),
    ]
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyZeroTouch {}

impl AntaTest for VerifyZeroTouch {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaCommand::new("show zerotouch").with_revision(1).into()]
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let mode = json_at(commands, 0)?.get("mode").and_then(|m| m.as_str()).unwrap_or_default();
        if mode == "disabled" {
            result.is_success(None);
        } else {
            result.fail("ZTP is NOT disabled");
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyRunningConfigDiffs {}

impl AntaTest for VerifyRunningConfigDiffs {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaCommand::text("show running-config diffs").into()]
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let diffs = text_at(commands, 0)?;
        if diffs.is_empty() {
            result.is_success(None);
        } else {
            result.fail(diffs);
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyRunningConfigLines {
    pub regex_patterns: Vec<String>,
}

impl VerifyRunningConfigLines {
    fn compiled(&self) -> Result<Vec<Regex>> {
        self.regex_patterns
            .iter()
            .map(|pattern| {
                Regex::new(&format!("(?m){}", pattern)).map_err(|e| AntaError::InvalidConfigValueError {
                    field: "regex_patterns".to_string(),
                    value: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect()
    }
}

impl AntaTest for VerifyRunningConfigLines {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaCommand::text("show running-config").into()]
    }

    fn validate_inputs(&self) -> Result<()> {
        self.compiled().map(|_| ())
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let config = text_at(commands, 0)?;
        let missing: Vec<&str> = self
            .compiled()?
            .iter()
            .zip(&self.regex_patterns)
            .filter(|(regex, _)| !regex.is_match(config))
            .map(|(_, pattern)| pattern.as_str())
            .collect();
        if missing.is_empty() {
            result.is_success(None);
        } else {
            result.fail(format!(
                "Following patterns were not found: '{}'",
                missing.join("', '")
            ));
        }
        Ok(())
    }
}
