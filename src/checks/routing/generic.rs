use serde::Deserialize;
use serde_json::{Map, Value};
use std::net::Ipv4Addr;

use crate::checks::{json_at, TestSpec};
use crate::domain::model::{AntaCommand, AntaTemplate, TestResult};
use crate::domain::ports::{AntaTest, CommandSpec};
use crate::utils::error::{AntaError, Result};
use crate::utils::validation::validate_non_empty_list;

const MODULE: &str = "anta.tests.routing.generic";

pub fn specs() -> Vec<TestSpec> {
    vec![
        TestSpec::of::<VerifyRoutingTableSize>(
            MODULE,
            "VerifyRoutingTableSize",
            "Verifies the size of the IP routing table of the default VRF.",
            &["routing"],
        ),
        TestSpec::of::<VerifyRoutingTableEntry>(
            MODULE,
            "VerifyRoutingTableEntry",
            "Verifies that the provided routes are present in the routing table of a specified VRF.",
            &["routing"],
        ),
    ]
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyRoutingTableSize {
    pub minimum: u64,
    pub maximum: u64,
}

impl AntaTest for VerifyRoutingTableSize {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaCommand::new("show ip route summary").with_revision(3).into()]
    }

    fn validate_inputs(&self) -> Result<()> {
        if self.minimum > self.maximum {
            return Err(AntaError::InvalidConfigValueError {
                field: "minimum".to_string(),
                value: self.minimum.to_string(),
                reason: format!("Minimum {} is greater than maximum {}", self.minimum, self.maximum),
            });
        }
        Ok(())
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let total = json_at(commands, 0)?
            .get("vrfs")
            .and_then(|v| v.get("default"))
            .and_then(|v| v.get("totalRoutes"))
            .and_then(|v| v.as_u64())
            .ok_or_else(|| AntaError::CommandOutputError {
                command: "show ip route summary".to_string(),
                reason: "missing 'vrfs.default.totalRoutes'".to_string(),
            })?;
        if (self.minimum..=self.maximum).contains(&total) {
            result.is_success(None);
        } else {
            result.fail(format!(
                "Routing table routes are outside the routes range - Expected: {} <= to >= {} Actual: {}",
                self.minimum, self.maximum, total
            ));
        }
        Ok(())
    }
}

fn default_vrf() -> String {
    "default".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyRoutingTableEntry {
    #[serde(default = "default_vrf")]
    pub vrf: String,
    pub routes: Vec<Ipv4Addr>,
}

impl AntaTest for VerifyRoutingTableEntry {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaTemplate::new("show ip route vrf {vrf} {route}").with_revision(4).into()]
    }

    fn render(&self, template: &AntaTemplate) -> Result<Vec<AntaCommand>> {
        self.routes
            .iter()
            .map(|route| {
                let mut params = Map::new();
                params.insert("vrf".to_string(), Value::String(self.vrf.clone()));
                params.insert("route".to_string(), Value::String(route.to_string()));
                template.render(params)
            })
            .collect()
    }

    fn validate_inputs(&self) -> Result<()> {
        validate_non_empty_list("routes", &self.routes)
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let mut missing = Vec::new();
        for command in commands {
            let Some(route) = command.param_str("route") else { continue };
            let found = command
                .json_output()?
                .get("vrfs")
                .and_then(|v| v.get(&self.vrf))
                .and_then(|v| v.get("routes"))
                .and_then(|r| r.as_object())
                .and_then(|routes| routes.keys().next())
                .map(|prefix| prefix.split('/').next() == Some(route))
                .unwrap_or(false);
            if !found {
                missing.push(route.to_string());
            }
        }

        if missing.is_empty() {
            result.is_success(None);
        } else {
            result.fail(format!(
                "The following route(s) are missing from the routing table of VRF {}: {}",
                self.vrf,
                missing.join(", ")
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MODULE;
    use crate::checks::harness::{assert_status, run};
    use crate::domain::model::TestStatus;
    use serde_json::json;

    #[test]
    fn test_routing_table_size() {
        let output = json!({"vrfs": {"default": {"totalRoutes": 42}}});
        let ok = run(MODULE, "VerifyRoutingTableSize", json!({"minimum": 42, "maximum": 666}), vec![output.clone()]);
        assert_status(&ok, TestStatus::Success);

        let ko = run(MODULE, "VerifyRoutingTableSize", json!({"minimum": 100, "maximum": 666}), vec![output]);
        assert_status(&ko, TestStatus::Failure);
        assert_eq!(
            ko.messages,
            vec!["Routing table routes are outside the routes range - Expected: 100 <= to >= 666 Actual: 42".to_string()]
        );
    }

    #[test]
    fn test_routing_table_size_bounds_validated() {
        let spec = crate::checks::find(MODULE, "VerifyRoutingTableSize").unwrap();
        assert!(spec.build(json!({"minimum": 666, "maximum": 42})).is_err());
    }

    fn route_output(prefix: &str) -> serde_json::Value {
        json!({"vrfs": {"default": {"routes": {(prefix): {"routeType": "eBGP", "vias": [{"nexthopAddr": "10.1.255.4"}]}}}}})
    }

    #[test]
    fn test_routing_table_entry() {
        let inputs = json!({"routes": ["10.1.0.1", "10.1.0.2"]});
        let ok = run(
            MODULE,
            "VerifyRoutingTableEntry",
            inputs.clone(),
            vec![route_output("10.1.0.1/32"), route_output("10.1.0.2/32")],
        );
        assert_status(&ok, TestStatus::Success);

        let ko = run(
            MODULE,
            "VerifyRoutingTableEntry",
            inputs,
            vec![route_output("10.1.0.1/32"), json!({"vrfs": {"default": {"routes": {}}}})],
        );
        assert_status(&ko, TestStatus::Failure);
        assert_eq!(
            ko.messages,
            vec!["The following route(s) are missing from the routing table of VRF default: 10.1.0.2".to_string()]
        );
    }
}
