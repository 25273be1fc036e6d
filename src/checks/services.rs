use serde::Deserialize;
use serde_json::{Map, Value};

use super::{json_at, TestSpec};
use crate::domain::model::{AntaCommand, AntaTemplate, OutputFormat, TestResult};
use crate::domain::ports::{AntaTest, CommandSpec};
use crate::utils::error::Result;
use crate::utils::validation::{validate_non_empty_list, validate_non_empty_string};

const MODULE: &str = "anta.tests.services";

pub fn specs() -> Vec<TestSpec> {
    vec![
        TestSpec::of::<VerifyHostname>(
            MODULE,
            "VerifyHostname",
            "Verifies the hostname of a device.",
            &["services"],
        ),
        TestSpec::of::<VerifyDNSLookup>(
            MODULE,
            "VerifyDNSLookup",
            "Verifies the DNS name to IP address resolution.",
            &["services"],
        ),
    ]
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyHostname {
    pub hostname: String,
}

impl AntaTest for VerifyHostname {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaCommand::new("show hostname").with_revision(1).into()]
    }

    fn validate_inputs(&self) -> Result<()> {
        validate_non_empty_string("hostname", &self.hostname)
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let hostname = json_at(commands, 0)?
            .get("hostname")
            .and_then(|h| h.as_str())
            .unwrap_or_default();
        if hostname == self.hostname {
            result.is_success(None);
        } else {
            result.fail(format!(
                "Incorrect Hostname - Expected: {} Actual: {}",
                self.hostname, hostname
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyDNSLookup {
    pub domain_names: Vec<String>,
}

impl AntaTest for VerifyDNSLookup {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaTemplate::new("bash timeout 10 nslookup {domain}")
            .with_ofmt(OutputFormat::Text)
            .into()]
    }

    fn render(&self, template: &AntaTemplate) -> Result<Vec<AntaCommand>> {
        self.domain_names
            .iter()
            .map(|domain| {
                let mut params = Map::new();
                params.insert("domain".to_string(), Value::String(domain.clone()));
                template.render(params)
            })
            .collect()
    }

    fn validate_inputs(&self) -> Result<()> {
        validate_non_empty_list("domain_names", &self.domain_names)
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let mut failed = Vec::new();
        for command in commands {
            if command.text_output()?.contains("Can't find") {
                failed.push(command.param_str("domain").unwrap_or_default().to_string());
            }
        }
        if failed.is_empty() {
            result.is_success(None);
        } else {
            result.fail(format!(
                "The following domain(s) are not resolved to an IP address: {}",
                failed.join(", ")
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
    fn test_hostname() {
        let ok = run(MODULE, "VerifyHostname", json!({"hostname": "s1-spine1"}), vec![json!({"hostname": "s1-spine1", "fqdn": "s1-spine1.fun.aristanetworks.com"})]);
        assert_status(&ok, TestStatus::Success);

        let ko = run(MODULE, "VerifyHostname", json!({"hostname": "s1-spine1"}), vec![json!({"hostname": "s1-spine2"})]);
        assert_status(&ko, TestStatus::Failure);
        assert_eq!(
            ko.messages,
            vec!["Incorrect Hostname - Expected: s1-spine1 Actual: s1-spine2".to_string()]
        );
    }

    #[test]
    fn test_dns_lookup() {
        let resolved = "Server:\t\t127.0.0.1\nAddress:\t127.0.0.1#53\n\nNon-authoritative answer:\nName:\tarista.com\nAddress: 151.101.130.132\n";
        let unresolved = "Server:\t\t127.0.0.1\nAddress:\t127.0.0.1#53\n\n** server can't find arista.ca: NXDOMAIN\n\nCan't find arista.ca: No answer\n";
        let inputs = json!({"domain_names": ["arista.com", "arista.ca"]});

        let ok = run(MODULE, "VerifyDNSLookup", inputs.clone(), vec![json!(resolved), json!(resolved)]);
        assert_status(&ok, TestStatus::Success);

        let ko = run(MODULE, "VerifyDNSLookup", inputs, vec![json!(resolved), json!(unresolved)]);
        assert_status(&ko, TestStatus::Failure);
        assert_eq!(
            ko.messages,
            vec!["The following domain(s) are not resolved to an IP address: arista.ca".to_string()]
        );
    }
}
