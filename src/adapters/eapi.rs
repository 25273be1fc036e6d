use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

use crate::domain::model::{CommandVersion, OutputFormat};

/// eAPI 傳輸層錯誤
#[derive(Error, Debug)]
pub enum EapiError {
    #[error("Timeout after {timeout:?} while sending '{command}'")]
    Timeout { command: String, timeout: Duration },

    #[error("Connection error: {0}")]
    Connect(String),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("{errmsg}")]
    Command {
        code: i64,
        errmsg: String,
        failed: String,
        errors: Vec<String>,
        passed: Vec<Value>,
    },

    #[error("Invalid eAPI response: {0}")]
    InvalidResponse(String),
}

/// `runCmds` 的單一指令：純字串或帶 revision/input 的物件
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum EapiCommand {
    Plain(String),
    Detailed {
        cmd: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        revision: Option<u8>,
        #[serde(skip_serializing_if = "Option::is_none")]
        input: Option<String>,
    },
}

impl EapiCommand {
    pub fn new(command: &str, revision: Option<u8>) -> Self {
        match revision {
            Some(revision) => EapiCommand::Detailed {
                cmd: command.to_string(),
                revision: Some(revision),
                input: None,
            },
            None => EapiCommand::Plain(command.to_string()),
        }
    }

    pub fn enable(password: Option<&str>) -> Self {
        match password {
            Some(password) => EapiCommand::Detailed {
                cmd: "enable".to_string(),
                revision: None,
                input: Some(password.to_string()),
            },
            None => EapiCommand::Plain("enable".to_string()),
        }
    }

    pub fn cmd(&self) -> &str {
        match self {
            EapiCommand::Plain(cmd) => cmd,
            EapiCommand::Detailed { cmd, .. } => cmd,
        }
    }
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Vec<Value>>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Vec<Value>,
}

/// Arista eAPI JSON-RPC 用戶端（`/command-api`）
#[derive(Debug, Clone)]
pub struct EapiClient {
    endpoint: String,
    username: String,
    password: String,
    timeout: Duration,
    client: Client,
}

static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

impl EapiClient {
    pub fn new(
        base_url: &str,
        username: String,
        password: String,
        timeout: Duration,
        insecure: bool,
    ) -> Result<Self, EapiError> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(insecure)
            .build()
            .map_err(|e| EapiError::Connect(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: format!("{}/command-api", base_url.trim_end_matches('/')),
            username,
            password,
            timeout,
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// 送出 `runCmds`，回傳每個指令的輸出；text 格式時回傳 `output` 字串
    pub async fn run_cmds(
        &self,
        commands: &[EapiCommand],
        version: CommandVersion,
        format: OutputFormat,
    ) -> Result<Vec<Value>, EapiError> {
        let request_id = REQUEST_ID.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "method": "runCmds",
            "params": {
                "version": version,
                "cmds": commands,
                "format": format,
                "timestamps": false,
                "autoComplete": false,
                "expandAliases": false,
            },
            "id": format!("anta-{}", request_id),
        });
        let last_command = commands.last().map(EapiCommand::cmd).unwrap_or_default();

        tracing::trace!("eAPI request to {}: {}", self.endpoint, body);
        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.username, Some(&self.password))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e, last_command))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EapiError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let payload: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| EapiError::InvalidResponse(e.to_string()))?;

        if let Some(error) = payload.error {
            return Err(Self::command_error(error, commands));
        }

        let results = payload
            .result
            .ok_or_else(|| EapiError::InvalidResponse("missing 'result' field".to_string()))?;

        Ok(match format {
            OutputFormat::Json => results,
            OutputFormat::Text => results
                .into_iter()
                .map(|item| item.get("output").cloned().unwrap_or(Value::String(String::new())))
                .collect(),
        })
    }

    fn transport_error(&self, error: reqwest::Error, command: &str) -> EapiError {
        if error.is_timeout() {
            EapiError::Timeout {
                command: command.to_string(),
                timeout: self.timeout,
            }
        } else if error.is_connect() {
            EapiError::Connect(error.to_string())
        } else {
            EapiError::Connect(format!("{} ({})", error, self.endpoint))
        }
    }

    /// eAPI 在第一個失敗的指令停止，`data` 最後一筆對應失敗指令
    fn command_error(error: JsonRpcError, commands: &[EapiCommand]) -> EapiError {
        let failed_at = error.data.len().saturating_sub(1);
        let errors = error
            .data
            .get(failed_at)
            .and_then(|item| item.get("errors"))
            .and_then(Value::as_array)
            .map(|errors| {
                errors
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|errors| !errors.is_empty())
            .unwrap_or_else(|| vec![error.message.clone()]);

        EapiError::Command {
            code: error.code,
            errmsg: error.message,
            failed: commands
                .get(failed_at)
                .map(|c| c.cmd().to_string())
                .unwrap_or_default(),
            errors,
            passed: error.data.into_iter().take(failed_at).collect(),
        }
    }
}
