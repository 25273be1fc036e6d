use serde::Deserialize;
use serde_json::Value;

use super::{json_at, TestSpec};
use crate::domain::model::{AntaCommand, TestResult};
use crate::domain::ports::{AntaTest, CommandSpec};
use crate::utils::error::Result;
use crate::utils::validation::validate_non_empty_list;

const MODULE: &str = "anta.tests.hardware";

/// 虛擬平台沒有實體感測器
const VIRTUAL_PLATFORMS: &[&str] = &["cEOSLab", "vEOS-lab", "cEOSCloudLab"];

pub fn specs() -> Vec<TestSpec> {
    vec![
        TestSpec::of::<VerifyTransceiversManufacturers>(
            MODULE,
            "VerifyTransceiversManufacturers",
            "Verifies if all the transceivers come from approved manufacturers.",
            &["hardware"],
        ),
        TestSpec::of::<VerifyTemperature>(
            MODULE,
            "VerifyTemperature",
            "Verifies if the device temperature is within acceptable limits.",
            &["hardware"],
        ),
        TestSpec::of::<VerifyEnvironmentCooling>(
            MODULE,
            "VerifyEnvironmentCooling",
            "Verifies the status of power supply fans and all fan trays.",
            &["hardware"],
        ),
        TestSpec::of::<VerifyAdverseDrops>(
            MODULE,
            "VerifyAdverseDrops",
            "Verifies there are no adverse drops on DCS-7280 and DCS-7500 family switches.",
            &["hardware"],
        ),
    ]
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyTransceiversManufacturers {
    pub manufacturers: Vec<String>,
}

impl AntaTest for VerifyTransceiversManufacturers {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaCommand::new("show inventory").with_revision(2).into()]
    }

    fn skip_on_platforms(&self) -> &'static [&'static str] {
        VIRTUAL_PLATFORMS
    }

    fn validate_inputs(&self) -> Result<()> {
        validate_non_empty_list("manufacturers", &self.manufacturers)
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let output = json_at(commands, 0)?;
        result.is_success(None);
        let Some(slots) = output.get("xcvrSlots").and_then(|s| s.as_object()) else {
            return Ok(());
        };
        for (slot, transceiver) in slots {
            let manufacturer = transceiver.get("mfgName").and_then(|m| m.as_str()).unwrap_or_default();
            if !self.manufacturers.iter().any(|m| m == manufacturer) {
                result.fail(format!(
                    "Interface: {} - Transceiver is from unapproved manufacturers - Expected: {} Actual: {}",
                    slot,
                    self.manufacturers.join(", "),
                    manufacturer
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyTemperature {}

impl AntaTest for VerifyTemperature {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaCommand::new("show system environment temperature").with_revision(1).into()]
    }

    fn skip_on_platforms(&self) -> &'static [&'static str] {
        VIRTUAL_PLATFORMS
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let status = json_at(commands, 0)?
            .get("systemStatus")
            .and_then(|s| s.as_str())
            .unwrap_or_default();
        if status == "temperatureOk" {
            result.is_success(None);
        } else {
            result.fail(format!(
                "Device temperature exceeds acceptable limits - Expected: temperatureOk Actual: {}",
                status
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyEnvironmentCooling {
    /// 可接受的風扇狀態，例如 `ok`
    pub states: Vec<String>,
}

impl VerifyEnvironmentCooling {
    fn check_fans(&self, fans: Option<&Value>, location: &str, result: &mut TestResult) {
        let Some(fans) = fans.and_then(|f| f.as_array()) else { return };
        for fan in fans {
            let status = fan.get("status").and_then(|s| s.as_str()).unwrap_or_default();
            if !self.states.iter().any(|s| s == status) {
                let label = fan.get("label").and_then(|l| l.as_str()).unwrap_or("unknown");
                result.fail(format!(
                    "{} Fan: {} - Invalid state - Expected: {} Actual: {}",
                    location,
                    label,
                    self.states.join(", "),
                    status
                ));
            }
        }
    }
}

impl AntaTest for VerifyEnvironmentCooling {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaCommand::new("show system environment cooling").with_revision(1).into()]
    }

    fn skip_on_platforms(&self) -> &'static [&'static str] {
        VIRTUAL_PLATFORMS
    }

    fn validate_inputs(&self) -> Result<()> {
        validate_non_empty_list("states", &self.states)
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let output = json_at(commands, 0)?;
        result.is_success(None);
        for (key, kind) in [("powerSupplySlots", "Power Slot"), ("fanTraySlots", "Fan Tray")] {
            let Some(slots) = output.get(key).and_then(|s| s.as_array()) else { continue };
            for slot in slots {
                let label = slot.get("label").and_then(|l| l.as_str()).unwrap_or("unknown");
                self.check_fans(slot.get("fans"), &format!("{}: {}", kind, label), result);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyAdverseDrops {}

impl AntaTest for VerifyAdverseDrops {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaCommand::new("show hardware counter drop").into()]
    }

    fn skip_on_platforms(&self) -> &'static [&'static str] {
        VIRTUAL_PLATFORMS
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let drops = json_at(commands, 0)?
            .get("totalAdverseDrops")
            .and_then(|d| d.as_u64())
            .unwrap_or_default();
        if drops == 0 {
            result.is_success(None);
        } else {
            result.fail(format!("Incorrect total adverse drops counter - Expected: 0 Actual: {}", drops));
        }
        Ok(())
    }
}
