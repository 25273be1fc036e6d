use serde::Deserialize;
use std::collections::BTreeSet;

use super::{json_at, TestSpec};
use crate::domain::model::{AntaCommand, TestResult};
use crate::domain::ports::{AntaTest, CommandSpec};
use crate::utils::error::Result;
use crate::utils::tools::get_value;
use crate::utils::validation::validate_non_empty_list;

const MODULE: &str = "anta.tests.software";

pub fn specs() -> Vec<TestSpec> {
    vec![
        TestSpec::of::<VerifyEOSVersion>(
            MODULE,
            "VerifyEOSVersion",
            "Verifies the EOS version of the device.",
            &["software"],
        ),
        TestSpec::of::<VerifyTerminAttrVersion>(
            MODULE,
            "VerifyTerminAttrVersion",
            "Verifies the TerminAttr version of the device.",
            &["software"],
        ),
        TestSpec::of::<VerifyEOSExtensions>(
            MODULE,
            "VerifyEOSExtensions",
            "Verifies that all EOS extensions installed on the device are enabled for boot persistence.",
            &["software"],
        ),
    ]
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyEOSVersion {
    pub versions: Vec<String>,
}

impl AntaTest for VerifyEOSVersion {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaCommand::new("show version").with_revision(1).into()]
    }

    fn validate_inputs(&self) -> Result<()> {
        validate_non_empty_list("versions", &self.versions)
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let output = json_at(commands, 0)?;
        let version = output.get("version").and_then(|v| v.as_str()).unwrap_or_default();
        if self.versions.iter().any(|v| v == version) {
            result.is_success(None);
        } else {
            result.fail(format!(
                "EOS version mismatch - Actual: {} not in Expected: {}",
                version,
                self.versions.join(", ")
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyTerminAttrVersion {
    pub versions: Vec<String>,
}

impl AntaTest for VerifyTerminAttrVersion {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaCommand::new("show version detail").with_revision(1).into()]
    }

    fn validate_inputs(&self) -> Result<()> {
        validate_non_empty_list("versions", &self.versions)
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let output = serde_json::Value::Object(json_at(commands, 0)?.clone());
        let version = get_value(&output, "details.packages.TerminAttr-core.version")
            .and_then(|v| v.as_str())
            .unwrap_or("not installed");
        if self.versions.iter().any(|v| v == version) {
            result.is_success(None);
        } else {
            result.fail(format!(
                "TerminAttr version mismatch - Actual: {} not in Expected: {}",
                version,
                self.versions.join(", ")
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyEOSExtensions {}

impl AntaTest for VerifyEOSExtensions {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            AntaCommand::new("show extensions").with_revision(2).into(),
            AntaCommand::new("show boot-extensions").with_revision(1).into(),
        ]
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let installed: BTreeSet<String> = json_at(commands, 0)?
            .get("extensions")
            .and_then(|e| e.as_object())
            .map(|extensions| {
                extensions
                    .iter()
                    .filter(|(_, ext)| ext.get("status").and_then(|s| s.as_str()) == Some("installed"))
                    .map(|(name, _)| name.clone())
                    .collect()
            })
            .unwrap_or_default();
        let boot: BTreeSet<String> = json_at(commands, 1)?
            .get("extensions")
            .and_then(|e| e.as_array())
            .map(|extensions| {
                extensions
                    .iter()
                    .filter_map(|ext| ext.as_str())
                    .map(|ext| ext.trim_end_matches(" force").trim().to_string())
                    .filter(|ext| !ext.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        if installed == boot {
            result.is_success(None);
        } else {
            result.fail(format!(
                "EOS extensions mismatch - Installed: {:?} Configured: {:?}",
                installed, boot
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::checks::harness::{assert_status, run};
    use crate::domain::model::TestStatus;
    use serde_json::json;

    #[test]
    fn test_eos_version() {
        let ok = run(
            super::MODULE,
            "VerifyEOSVersion",
            json!({"versions": ["4.31.1F", "4.30.3M"]}),
            vec![json!({"version": "4.31.1F", "modelName": "vEOS-lab"})],
        );
        assert_status(&ok, TestStatus::Success);

        let ko = run(
            super::MODULE,
            "VerifyEOSVersion",
            json!({"versions": ["4.31.1F"]}),
            vec![json!({"version": "4.27.0F"})],
        );
        assert_status(&ko, TestStatus::Failure);
        assert_eq!(
            ko.messages,
            vec!["EOS version mismatch - Actual: 4.27.0F not in Expected: 4.31.1F".to_string()]
        );
    }

    #[test]
    fn test_terminattr_version() {
        let output = json!({"details": {"packages": {"TerminAttr-core": {"version": "v1.29.0"}}}});
        let ok = run(
            super::MODULE,
            "VerifyTerminAttrVersion",
            json!({"versions": ["v1.29.0"]}),
            vec![output.clone()],
        );
        assert_status(&ok, TestStatus::Success);

        let ko = run(
            super::MODULE,
            "VerifyTerminAttrVersion",
            json!({"versions": ["v1.17.0"]}),
            vec![output],
        );
        assert_status(&ko, TestStatus::Failure);
    }

    #[test]
    fn test_eos_extensions() {
        let extensions = json!({"extensions": {
            "AristaCloudGateway-1.0.1-1.swix": {"status": "installed"},
            "other.swix": {"status": "notInstalled"}
        }});
        let ok = run(
            super::MODULE,
            "VerifyEOSExtensions",
            serde_json::Value::Null,
            vec![extensions.clone(), json!({"extensions": ["AristaCloudGateway-1.0.1-1.swix\n"]})],
        );
        assert_status(&ok, TestStatus::Success);

        let ko = run(
            super::MODULE,
            "VerifyEOSExtensions",
            serde_json::Value::Null,
            vec![extensions, json!({"extensions": []})],
        );
        assert_status(&ko, TestStatus::Failure);
    }

    #[test]
    fn test_empty_versions_rejected() {
        let spec = crate::checks::find(super::MODULE, "VerifyEOSVersion").unwrap();
        assert!(spec.build(json!({"versions": []})).is_err());
    }
}
