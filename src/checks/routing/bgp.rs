use serde::Deserialize;
use serde_json::Value;
use std::net::IpAddr;

use crate::checks::{command_at, TestSpec};
use crate::domain::model::{AntaCommand, TestResult};
use crate::domain::ports::{AntaTest, CommandSpec};
use crate::utils::error::Result;
use crate::utils::tools::get_item;
use crate::utils::validation::validate_non_empty_list;

const MODULE: &str = "anta.tests.routing.bgp";

pub fn specs() -> Vec<TestSpec> {
    vec![TestSpec::of::<VerifyBGPPeerSession>(
        MODULE,
        "VerifyBGPPeerSession",
        "Verifies the session state of BGP peers.",
        &["bgp"],
    )]
}

fn default_vrf() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BgpPeer {
    pub peer_address: IpAddr,
    #[serde(default = "default_vrf")]
    pub vrf: String,
}

impl std::fmt::Display for BgpPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Peer: {} VRF: {}", self.peer_address, self.vrf)
    }
}

/// 確認每個 peer 的 session 為 Established，且收發佇列皆為空
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyBGPPeerSession {
    pub bgp_peers: Vec<BgpPeer>,
}

impl AntaTest for VerifyBGPPeerSession {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![AntaCommand::new("show bgp neighbors vrf all").with_revision(3).into()]
    }

    fn validate_inputs(&self) -> Result<()> {
        validate_non_empty_list("bgp_peers", &self.bgp_peers)
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let command = command_at(commands, 0)?;
        // BGP 未啟用屬於已知錯誤，以 failure 呈現
        if command.error() {
            result.fail(format!("BGP is not configured: {}", command.errors.join(", ")));
            return Ok(());
        }

        let output = command.json_output()?;
        result.is_success(None);
        for peer in &self.bgp_peers {
            let address = Value::String(peer.peer_address.to_string());
            let found = output
                .get("vrfs")
                .and_then(|v| v.get(&peer.vrf))
                .and_then(|v| v.get("peerList"))
                .and_then(|p| p.as_array())
                .and_then(|peers| get_item(peers, "peerAddress", &address));
            let Some(found) = found else {
                result.fail(format!("{} - Not found", peer));
                continue;
            };

            let state = found.get("state").and_then(|s| s.as_str()).unwrap_or_default();
            if state != "Established" {
                result.fail(format!(
                    "{} - Session state is not established - State: {}",
                    peer, state
                ));
                continue;
            }

            let queue = |key: &str| found.get(key).and_then(Value::as_u64).unwrap_or(0);
            let (in_queue, out_queue) = (queue("inMsgQueue"), queue("outMsgQueue"));
            if in_queue != 0 || out_queue != 0 {
                result.fail(format!(
                    "{} - Session has non-empty message queues - InQ: {} OutQ: {}",
                    peer, in_queue, out_queue
                ));
            }
        }
        Ok(())
    }
}
