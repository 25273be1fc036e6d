use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::IpAddr;

use super::TestSpec;
use crate::domain::model::{AntaCommand, AntaTemplate, TestResult};
use crate::domain::ports::{AntaTest, CommandSpec};
use crate::utils::error::{AntaError, Result};
use crate::utils::validation::{validate_non_empty_list, validate_range};

const MODULE: &str = "anta.tests.connectivity";

const PING_TEMPLATE: &str = "ping vrf {vrf} {destination} source {source} size {size} repeat {repeat}";

pub fn specs() -> Vec<TestSpec> {
    vec![TestSpec::of::<VerifyReachability>(
        MODULE,
        "VerifyReachability",
        "Test network reachability to one or many destination IP(s).",
        &["connectivity"],
    )]
}

fn default_vrf() -> String {
    "default".to_string()
}

fn default_repeat() -> u32 {
    2
}

fn default_size() -> u32 {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PingHost {
    pub destination: IpAddr,
    /// 來源介面或 IP
    pub source: String,
    #[serde(default = "default_vrf")]
    pub vrf: String,
    #[serde(default = "default_repeat")]
    pub repeat: u32,
    #[serde(default = "default_size")]
    pub size: u32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyReachability {
    pub hosts: Vec<PingHost>,
}

impl AntaTest for VerifyReachability {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaTemplate::new(PING_TEMPLATE).with_revision(2).into()]
    }

    fn render(&self, template: &AntaTemplate) -> Result<Vec<AntaCommand>> {
        self.hosts
            .iter()
            .map(|host| match serde_json::to_value(host)? {
                Value::Object(params) => template.render(params),
                _ => Err(AntaError::test("ping host did not serialize to an object")),
            })
            .collect()
    }

    fn validate_inputs(&self) -> Result<()> {
        validate_non_empty_list("hosts", &self.hosts)?;
        for host in &self.hosts {
            validate_range("repeat", host.repeat, 1, 10000)?;
            validate_range("size", host.size, 36, 18024)?;
        }
        Ok(())
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        result.is_success(None);
        for command in commands {
            let repeat = command.params.get("repeat").and_then(|r| r.as_u64()).unwrap_or(0);
            let summary = command
                .json_output()?
                .get("messages")
                .and_then(|m| m.get(0))
                .and_then(|m| m.as_str())
                .unwrap_or_default();
            if !summary.contains(&format!("{} received", repeat)) {
                result.fail(format!(
                    "Host: {} Source: {} VRF: {} - Unreachable",
                    command.param_str("destination").unwrap_or_default(),
                    command.param_str("source").unwrap_or_default(),
                    command.param_str("vrf").unwrap_or_default()
                ));
            }
        }
        Ok(())
    }
}
