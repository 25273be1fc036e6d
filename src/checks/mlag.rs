use serde::Deserialize;
use serde_json::{Map, Value};

use super::{json_at, TestSpec};
use crate::domain::model::{AntaCommand, TestResult};
use crate::domain::ports::{AntaTest, CommandSpec};
use crate::utils::error::Result;

const MODULE: &str = "anta.tests.mlag";

pub fn specs() -> Vec<TestSpec> {
    vec![
        TestSpec::of::<VerifyMlagStatus>(
            MODULE,
            "VerifyMlagStatus",
            "Verifies the health status of the MLAG configuration.",
            &["mlag"],
        ),
        TestSpec::of::<VerifyMlagInterfaces>(
            MODULE,
            "VerifyMlagInterfaces",
            "Verifies there are no inactive or active-partial MLAG ports.",
            &["mlag"],
        ),
        TestSpec::of::<VerifyMlagConfigSanity>(
            MODULE,
            "VerifyMlagConfigSanity",
            "Verifies there are no MLAG config-sanity inconsistencies.",
            &["mlag"],
        ),
    ]
}

fn str_field<'a>(output: &'a Map<String, Value>, key: &str) -> &'a str {
    output.get(key).and_then(|v| v.as_str()).unwrap_or_default()
}

/// MLAG 未啟用時標記為 skipped，回傳 true
fn skip_if_disabled(output: &Map<String, Value>, result: &mut TestResult) -> bool {
    if str_field(output, "state") == "disabled" {
        result.is_skipped(Some("MLAG is disabled".to_string()));
        return true;
    }
    false
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyMlagStatus {}

impl AntaTest for VerifyMlagStatus {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaCommand::new("show mlag").with_revision(2).into()]
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let output = json_at(commands, 0)?;
        if skip_if_disabled(output, result) {
            return Ok(());
        }
        result.is_success(None);
        let expectations = [
            ("state", "active", "MLAG state"),
            ("negStatus", "connected", "Operational state"),
            ("localIntfStatus", "up", "Local interface state"),
            ("peerLinkStatus", "up", "Peer link state"),
        ];
        for (key, expected, label) in expectations {
            let actual = str_field(output, key);
            if actual != expected {
                result.fail(format!("{} is not {} - Actual: {}", label, expected, actual));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyMlagInterfaces {}

impl AntaTest for VerifyMlagInterfaces {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaCommand::new("show mlag").with_revision(2).into()]
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let output = json_at(commands, 0)?;
        if skip_if_disabled(output, result) {
            return Ok(());
        }
        let ports = output.get("mlagPorts");
        let count = |key: &str| ports.and_then(|p| p.get(key)).and_then(|c| c.as_u64()).unwrap_or(0);
        let inactive = count("Inactive");
        let partial = count("Active-partial");
        if inactive == 0 && partial == 0 {
            result.is_success(None);
        } else {
            result.fail(format!(
                "MLAG status is not ok - Inactive Ports: {} Partial Active Ports: {}",
                inactive, partial
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyMlagConfigSanity {}

impl AntaTest for VerifyMlagConfigSanity {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaCommand::new("show mlag config-sanity").with_revision(1).into()]
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let output = json_at(commands, 0)?;
        if output.get("mlagActive").and_then(|a| a.as_bool()) == Some(false) {
            result.is_skipped(Some("MLAG is disabled".to_string()));
            return Ok(());
        }
        result.is_success(None);
        for key in ["globalConfiguration", "interfaceConfiguration"] {
            let inconsistent = output
                .get(key)
                .and_then(|c| c.as_object())
                .map(|c| !c.is_empty())
                .unwrap_or(false);
            if inconsistent {
                result.fail(format!("MLAG config-sanity found in {}", key));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MODULE;
    use crate::checks::harness::{assert_status, run};
    use crate::domain::model::TestStatus;
    use serde_json::{json, Value};

    #[test]
    fn test_mlag_status() {
        let healthy = json!({"state": "active", "negStatus": "connected", "localIntfStatus": "up", "peerLinkStatus": "up"});
        assert_status(&run(MODULE, "VerifyMlagStatus", Value::Null, vec![healthy]), TestStatus::Success);

        let disabled = run(MODULE, "VerifyMlagStatus", Value::Null, vec![json!({"state": "disabled"})]);
        assert_status(&disabled, TestStatus::Skipped);
        assert_eq!(disabled.messages, vec!["MLAG is disabled".to_string()]);

        let degraded = json!({"state": "active", "negStatus": "connected", "localIntfStatus": "down", "peerLinkStatus": "up"});
        let ko = run(MODULE, "VerifyMlagStatus", Value::Null, vec![degraded]);
        assert_status(&ko, TestStatus::Failure);
        assert_eq!(ko.messages, vec!["Local interface state is not up - Actual: down".to_string()]);
    }

    #[test]
    fn test_mlag_interfaces() {
        let ok = run(
            MODULE,
            "VerifyMlagInterfaces",
            Value::Null,
            vec![json!({"state": "active", "mlagPorts": {"Disabled": 0, "Configured": 0, "Inactive": 0, "Active-partial": 0, "Active-full": 1}})],
        );
        assert_status(&ok, TestStatus::Success);

        let ko = run(
            MODULE,
            "VerifyMlagInterfaces",
            Value::Null,
            vec![json!({"state": "active", "mlagPorts": {"Inactive": 1, "Active-partial": 0, "Active-full": 1}})],
        );
        assert_status(&ko, TestStatus::Failure);
        assert_eq!(
            ko.messages,
            vec!["MLAG status is not ok - Inactive Ports: 1 Partial Active Ports: 0".to_string()]
        );
    }

    #[test]
    fn test_mlag_config_sanity() {
        let ok = run(
            MODULE,
            "VerifyMlagConfigSanity",
            Value::Null,
            vec![json!({"globalConfiguration": {}, "interfaceConfiguration": {}, "mlagActive": true, "mlagConnected": true})],
        );
        assert_status(&ok, TestStatus::Success);

        let disabled = run(MODULE, "VerifyMlagConfigSanity", Value::Null, vec![json!({"mlagActive": false})]);
        assert_status(&disabled, TestStatus::Skipped);

        let ko = run(
            MODULE,
            "VerifyMlagConfigSanity",
            Value::Null,
            vec![json!({"globalConfiguration": {"mlag": {"globalParameters": {"dual-primary-detection-delay": {}}}}, "interfaceConfiguration": {}, "mlagActive": true})],
        );
        assert_status(&ko, TestStatus::Failure);
        assert_eq!(ko.messages, vec!["MLAG config-sanity found in globalConfiguration".to_string()]);
    }
}
