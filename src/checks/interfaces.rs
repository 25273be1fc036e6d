use serde::Deserialize;
use serde_json::{Map, Value};

use super::{json_at, TestSpec};
use crate::domain::model::{AntaCommand, TestResult};
use crate::domain::ports::{AntaTest, CommandSpec};
use crate::utils::error::Result;
use crate::utils::validation::validate_non_empty_list;

const MODULE: &str = "anta.tests.interfaces";

pub fn specs() -> Vec<TestSpec> {
    vec![
        TestSpec::of::<VerifyInterfaceErrors>(
            MODULE,
            "VerifyInterfaceErrors",
            "Verifies there are no interface error counters.",
            &["interfaces"],
        ),
        TestSpec::of::<VerifyInterfaceDiscards>(
            MODULE,
            "VerifyInterfaceDiscards",
            "Verifies there are no interface discard counters.",
            &["interfaces"],
        ),
        TestSpec::of::<VerifyInterfaceErrDisabled>(
            MODULE,
            "VerifyInterfaceErrDisabled",
            "Verifies there are no interfaces in the errdisabled state.",
            &["interfaces"],
        ),
        TestSpec::of::<VerifyInterfacesStatus>(
            MODULE,
            "VerifyInterfacesStatus",
            "Verifies the operational states of specified interfaces to ensure they match expected configurations.",
            &["interfaces"],
        ),
        TestSpec::of::<VerifyLoopbackCount>(
            MODULE,
            "VerifyLoopbackCount",
            "Verifies the number of loopback interfaces and their status.",
            &["interfaces"],
        ),
    ]
}

/// 回傳 `counters` 中所有非零計數器名稱
fn non_zero_counters(counters: &Map<String, Value>, keys: Option<&[&str]>) -> Vec<String> {
    counters
        .iter()
        .filter(|(name, _)| keys.map(|k| k.contains(&name.as_str())).unwrap_or(true))
        .filter(|(_, value)| value.as_f64().map(|v| v != 0.0).unwrap_or(false))
        .map(|(name, value)| format!("{}: {}", name, value))
        .collect()
}

fn interface_map<'a>(output: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    output.get(key).and_then(|v| v.as_object())
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyInterfaceErrors {}

impl AntaTest for VerifyInterfaceErrors {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaCommand::new("show interfaces counters errors").with_revision(1).into()]
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let output = json_at(commands, 0)?;
        result.is_success(None);
        if let Some(interfaces) = interface_map(output, "interfaceErrorCounters") {
            for (name, counters) in interfaces {
                let Some(counters) = counters.as_object() else { continue };
                let errors = non_zero_counters(counters, None);
                if !errors.is_empty() {
                    result.fail(format!("Interface: {} - Non-zero error counter(s) - {}", name, errors.join(", ")));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyInterfaceDiscards {}

impl AntaTest for VerifyInterfaceDiscards {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaCommand::new("show interfaces counters discards").with_revision(1).into()]
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let output = json_at(commands, 0)?;
        result.is_success(None);
        if let Some(interfaces) = interface_map(output, "interfaces") {
            for (name, counters) in interfaces {
                let Some(counters) = counters.as_object() else { continue };
                let discards = non_zero_counters(counters, Some(&["inDiscards", "outDiscards"]));
                if !discards.is_empty() {
                    result.fail(format!("Interface: {} - Non-zero discard counter(s): {}", name, discards.join(", ")));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyInterfaceErrDisabled {}

impl AntaTest for VerifyInterfaceErrDisabled {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaCommand::new("show interfaces status").with_revision(1).into()]
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let output = json_at(commands, 0)?;
        result.is_success(None);
        if let Some(interfaces) = interface_map(output, "interfaceStatuses") {
            for (name, status) in interfaces {
                if status.get("linkStatus").and_then(|s| s.as_str()) == Some("errdisabled") {
                    result.fail(format!("Interface: {} - Link status Error disabled", name));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum InterfaceState {
    #[serde(rename = "up")]
    Up,
    #[serde(rename = "down")]
    Down,
    #[serde(rename = "adminDown")]
    AdminDown,
}

impl InterfaceState {
    fn as_str(&self) -> &'static str {
        match self {
            InterfaceState::Up => "up",
            InterfaceState::Down => "down",
            InterfaceState::AdminDown => "adminDown",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterfaceStateInput {
    pub name: String,
    pub status: InterfaceState,
    #[serde(default)]
    pub line_protocol_status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyInterfacesStatus {
    pub interfaces: Vec<InterfaceStateInput>,
}

impl AntaTest for VerifyInterfacesStatus {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaCommand::new("show interfaces description").with_revision(1).into()]
    }

    fn validate_inputs(&self) -> Result<()> {
        validate_non_empty_list("interfaces", &self.interfaces)
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let output = json_at(commands, 0)?;
        let descriptions = interface_map(output, "interfaceDescriptions");
        result.is_success(None);
        for expected in &self.interfaces {
            let Some(actual) = descriptions.and_then(|d| d.get(&expected.name)) else {
                result.fail(format!("{} - Not configured", expected.name));
                continue;
            };
            let status = actual.get("interfaceStatus").and_then(|s| s.as_str()).unwrap_or_default();
            let protocol = actual.get("lineProtocolStatus").and_then(|s| s.as_str()).unwrap_or_default();

            match &expected.line_protocol_status {
                Some(expected_protocol) => {
                    if status != expected.status.as_str() || protocol != expected_protocol {
                        result.fail(format!(
                            "{} - Status mismatch - Expected: {}/{} Actual: {}/{}",
                            expected.name,
                            expected.status.as_str(),
                            expected_protocol,
                            status,
                            protocol
                        ));
                    }
                }
                // "up" 只看 line protocol，其它狀態看管理狀態
                None if expected.status == InterfaceState::Up => {
                    if protocol != "up" {
                        result.fail(format!(
                            "{} - Status mismatch - Expected: up/up Actual: {}/{}",
                            expected.name, status, protocol
                        ));
                    }
                }
                None => {
                    if status != expected.status.as_str() {
                        result.fail(format!(
                            "{} - Status mismatch - Expected: {} Actual: {}",
                            expected.name,
                            expected.status.as_str(),
                            status
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyLoopbackCount {
    /// 預期的 loopback 數量
    pub number: usize,
}

impl AntaTest for VerifyLoopbackCount {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaCommand::new("show ip interface brief").into()]
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let output = json_at(commands, 0)?;
        let loopbacks: Vec<(&String, &Value)> = interface_map(output, "interfaces")
            .map(|interfaces| {
                interfaces
                    .iter()
                    .filter(|(name, _)| name.starts_with("Loopback"))
                    .collect()
            })
            .unwrap_or_default();

        result.is_success(None);
        if loopbacks.len() != self.number {
            result.fail(format!(
                "Loopback interface(s) count mismatch: Expected {} Actual: {}",
                self.number,
                loopbacks.len()
            ));
        }
        for (name, loopback) in loopbacks {
            let status = loopback.get("interfaceStatus").and_then(|s| s.as_str()).unwrap_or_default();
            let protocol = loopback.get("lineProtocolStatus").and_then(|s| s.as_str()).unwrap_or_default();
            if status != "connected" || protocol != "up" {
                result.fail(format!(
                    "Interface: {} - Invalid line protocol status - Expected: up Actual: {}",
                    name, protocol
                ));
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
    fn test_interface_errors() {
        let clean = json!({"interfaceErrorCounters": {
            "Ethernet1": {"inErrors": 0, "frameTooLongs": 0, "outErrors": 0, "frameTooShorts": 0, "fcsErrors": 0, "alignmentErrors": 0, "symbolErrors": 0},
            "Ethernet6": {"inErrors": 0, "frameTooLongs": 0, "outErrors": 0, "frameTooShorts": 0, "fcsErrors": 0, "alignmentErrors": 0, "symbolErrors": 0}
        }});
        assert_status(&run(MODULE, "VerifyInterfaceErrors", Value::Null, vec![clean]), TestStatus::Success);

        let dirty = json!({"interfaceErrorCounters": {
            "Ethernet1": {"inErrors": 42, "outErrors": 0},
            "Ethernet6": {"inErrors": 0, "outErrors": 0}
        }});
        let ko = run(MODULE, "VerifyInterfaceErrors", Value::Null, vec![dirty]);
        assert_status(&ko, TestStatus::Failure);
        assert_eq!(
            ko.messages,
            vec!["Interface: Ethernet1 - Non-zero error counter(s) - inErrors: 42".to_string()]
        );
    }

    #[test]
    fn test_interface_discards() {
        let ok = run(
            MODULE,
            "VerifyInterfaceDiscards",
            Value::Null,
            vec![json!({"inDiscardsTotal": 0, "interfaces": {"Ethernet2": {"outDiscards": 0, "inDiscards": 0}}})],
        );
        assert_status(&ok, TestStatus::Success);

        let ko = run(
            MODULE,
            "VerifyInterfaceDiscards",
            Value::Null,
            vec![json!({"interfaces": {"Ethernet2": {"outDiscards": 42, "inDiscards": 0}}})],
        );
        assert_status(&ko, TestStatus::Failure);
    }

    #[test]
    fn test_interface_errdisabled() {
        let ok = run(
            MODULE,
            "VerifyInterfaceErrDisabled",
            Value::Null,
            vec![json!({"interfaceStatuses": {"Management1": {"linkStatus": "connected"}}})],
        );
        assert_status(&ok, TestStatus::Success);

        let ko = run(
            MODULE,
            "VerifyInterfaceErrDisabled",
            Value::Null,
            vec![json!({"interfaceStatuses": {"Ethernet2": {"linkStatus": "errdisabled"}}})],
        );
        assert_status(&ko, TestStatus::Failure);
        assert_eq!(ko.messages, vec!["Interface: Ethernet2 - Link status Error disabled".to_string()]);
    }

    #[test]
    fn test_interfaces_status() {
        let output = json!({"interfaceDescriptions": {
            "Ethernet8": {"interfaceStatus": "up", "lineProtocolStatus": "up", "description": ""},
            "Ethernet2": {"interfaceStatus": "adminDown", "lineProtocolStatus": "down", "description": ""}
        }});
        let ok = run(
            MODULE,
            "VerifyInterfacesStatus",
            json!({"interfaces": [{"name": "Ethernet8", "status": "up"}, {"name": "Ethernet2", "status": "adminDown"}]}),
            vec![output.clone()],
        );
        assert_status(&ok, TestStatus::Success);

        let ko = run(
            MODULE,
            "VerifyInterfacesStatus",
            json!({"interfaces": [
                {"name": "Ethernet2", "status": "up"},
                {"name": "Ethernet12", "status": "up"},
                {"name": "Ethernet8", "status": "up", "line_protocol_status": "lowerLayerDown"}
            ]}),
            vec![output],
        );
        assert_status(&ko, TestStatus::Failure);
        assert_eq!(
            ko.messages,
            vec![
                "Ethernet2 - Status mismatch - Expected: up/up Actual: adminDown/down".to_string(),
                "Ethernet12 - Not configured".to_string(),
                "Ethernet8 - Status mismatch - Expected: up/lowerLayerDown Actual: up/up".to_string(),
            ]
        );
    }

    #[test]
    fn test_interfaces_status_rejects_unknown_state() {
        let spec = crate::checks::find(MODULE, "VerifyInterfacesStatus").unwrap();
        assert!(spec.build(json!({"interfaces": [{"name": "Ethernet1", "status": "sideways"}]})).is_err());
        assert!(spec.build(json!({"interfaces": []})).is_err());
    }

    #[test]
    fn test_loopback_count() {
        let output = json!({"interfaces": {
            "Loopback42": {"name": "Loopback42", "interfaceStatus": "connected", "lineProtocolStatus": "up"},
            "Loopback666": {"name": "Loopback666", "interfaceStatus": "connected", "lineProtocolStatus": "down"},
            "Ethernet1": {"name": "Ethernet1", "interfaceStatus": "connected", "lineProtocolStatus": "up"}
        }});
        let ko = run(MODULE, "VerifyLoopbackCount", json!({"number": 2}), vec![output.clone()]);
        assert_status(&ko, TestStatus::Failure);
        assert_eq!(
            ko.messages,
            vec!["Interface: Loopback666 - Invalid line protocol status - Expected: up Actual: down".to_string()]
        );

        let count = run(MODULE, "VerifyLoopbackCount", json!({"number": 3}), vec![output]);
        assert_eq!(count.messages[0], "Loopback interface(s) count mismatch: Expected 3 Actual: 2");
    }
}
