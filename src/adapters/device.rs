use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::RwLock;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::adapters::eapi::{EapiClient, EapiCommand, EapiError};
use crate::core::cache::{CommandCache, DEFAULT_CACHE_MAX_SIZE, DEFAULT_CACHE_TTL};
use crate::domain::model::{AntaCommand, CommandVersion, OutputFormat};
use crate::domain::ports::AntaDevice;
use crate::utils::error::{AntaError, Result};

pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_CONNECTIONS: usize = 100;

/// 建立 EOS 裝置所需的連線參數
#[derive(Debug, Clone)]
pub struct DeviceOptions {
    pub host: String,
    pub name: Option<String>,
    pub port: Option<u16>,
    pub proto: String,
    pub username: String,
    pub password: String,
    pub enable: bool,
    pub enable_password: Option<String>,
    pub tags: BTreeSet<String>,
    pub timeout: Duration,
    pub insecure: bool,
    pub disable_cache: bool,
    pub cache_max_size: usize,
    pub cache_ttl: Duration,
    pub max_connections: usize,
}

impl DeviceOptions {
    pub fn new(host: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            name: None,
            port: None,
            proto: "https".to_string(),
            username: username.into(),
            password: password.into(),
            enable: false,
            enable_password: None,
            tags: BTreeSet::new(),
            timeout: DEFAULT_TIMEOUT,
            insecure: false,
            disable_cache: false,
            cache_max_size: DEFAULT_CACHE_MAX_SIZE,
            cache_ttl: DEFAULT_CACHE_TTL,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct DeviceState {
    is_online: bool,
    established: bool,
    hw_model: Option<String>,
}

/// 透過 eAPI 操作的 Arista EOS 裝置
#[derive(Debug)]
pub struct AsyncEosDevice {
    name: String,
    host: String,
    port: u16,
    tags: BTreeSet<String>,
    enable: bool,
    enable_password: Option<String>,
    client: EapiClient,
    cache: Option<CommandCache>,
    state: RwLock<DeviceState>,
    connections: Semaphore,
}

impl AsyncEosDevice {
    pub fn new(options: DeviceOptions) -> Result<Self> {
        if options.host.trim().is_empty() {
            return Err(AntaError::MissingConfigError {
                field: "host".to_string(),
            });
        }
        let port = options.port.unwrap_or(DEFAULT_PORT);
        let name = options
            .name
            .clone()
            .unwrap_or_else(|| format!("{}:{}", options.host, port));
        let host_part = if options.host.contains(':') && !options.host.starts_with('[') {
            format!("[{}]", options.host)
        } else {
            options.host.clone()
        };
        let base_url = format!("{}://{}:{}", options.proto, host_part, port);
        crate::utils::validation::validate_url("host", &base_url)?;

        let client = EapiClient::new(
            &base_url,
            options.username,
            options.password,
            options.timeout,
            options.insecure,
        )
        .map_err(|e| AntaError::InventoryError {
            message: format!("{}: {}", name, e),
        })?;

        let mut tags = options.tags;
        tags.insert(name.clone());

        let cache = if options.disable_cache {
            None
        } else {
            Some(CommandCache::new(options.cache_max_size, options.cache_ttl))
        };

        Ok(Self {
            name,
            host: options.host,
            port,
            tags,
            enable: options.enable,
            enable_password: options.enable_password,
            client,
            cache,
            state: RwLock::new(DeviceState::default()),
            connections: Semaphore::new(options.max_connections.max(1)),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn read_state(&self) -> DeviceState {
        self.state
            .read()
            .map(|state| state.clone())
            .unwrap_or_default()
    }

    fn write_state(&self, new_state: DeviceState) {
        match self.state.write() {
            Ok(mut state) => *state = new_state,
            Err(poisoned) => *poisoned.into_inner() = new_state,
        }
    }

    fn eapi_commands(&self, command: &AntaCommand) -> Vec<EapiCommand> {
        let mut commands = Vec::with_capacity(2);
        if self.enable {
            commands.push(EapiCommand::enable(self.enable_password.as_deref()));
        }
        commands.push(EapiCommand::new(&command.command, command.revision));
        commands
    }

    fn record_command_error(&self, command: &mut AntaCommand, errors: Vec<String>) {
        command.errors = errors;
        if command.requires_privileges() {
            tracing::error!(
                "Command '{}' requires privileged mode on {}. Verify user permissions and if the `enable` option is required.",
                command.command,
                self.name
            );
        }
        if !command.supported() {
            tracing::error!(
                "Command '{}' is not supported on {} ({})",
                command.command,
                self.name,
                self.hw_model().unwrap_or_else(|| "unknown model".to_string())
            );
        } else if command.returned_known_eos_error() {
            tracing::debug!("{} on {} returned a known EOS error: {:?}", command.command, self.name, command.errors);
        } else {
            tracing::error!(
                "Command '{}' failed on {}: {}",
                command.command,
                self.name,
                command.errors.join(", ")
            );
        }
    }
}

#[async_trait]
impl AntaDevice for AsyncEosDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    fn is_online(&self) -> bool {
        self.read_state().is_online
    }

    fn established(&self) -> bool {
        self.read_state().established
    }

    fn hw_model(&self) -> Option<String> {
        self.read_state().hw_model
    }

    fn cache(&self) -> Option<&CommandCache> {
        self.cache.as_ref()
    }

    async fn refresh(&self) {
        tracing::debug!("Refreshing device {} ({})", self.name, self.client.endpoint());
        let commands = self.eapi_commands(&AntaCommand::new("show version"));
        let response = {
            let _permit = self.connections.acquire().await.ok();
            self.client
                .run_cmds(&commands, CommandVersion::Latest, OutputFormat::Json)
                .await
        };

        let mut state = DeviceState::default();
        match response {
            Ok(mut outputs) => {
                state.is_online = true;
                state.hw_model = outputs
                    .pop()
                    .as_ref()
                    .and_then(|output| output.get("modelName"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                if state.hw_model.is_none() {
                    tracing::error!("Cannot parse 'show version' returned by device {}", self.name);
                }
            }
            // eAPI 有回應但指令失敗（例如認證或權限問題）仍視為在線
            Err(e @ (EapiError::Command { .. } | EapiError::HttpStatus { .. })) => {
                state.is_online = true;
                tracing::warn!("Device {} answered 'show version' with an error: {}", self.name, e);
            }
            Err(e) => {
                tracing::warn!("Could not connect to device {}: {}", self.name, e);
            }
        }
        state.established = state.is_online && state.hw_model.is_some();
        self.write_state(state);
    }

    async fn collect_uncached(&self, command: &mut AntaCommand) {
        let _permit = match self.connections.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                command.errors = vec![format!("Connection pool closed: {}", e)];
                return;
            }
        };

        let commands = self.eapi_commands(command);
        match self.client.run_cmds(&commands, command.version, command.ofmt).await {
            Ok(mut outputs) => {
                command.output = outputs.pop();
                if command.output.is_none() {
                    command.errors = vec!["eAPI returned no output".to_string()];
                }
                tracing::debug!("{}: collected '{}'", self.name, command.command);
            }
            Err(EapiError::Command { errors, .. }) => self.record_command_error(command, errors),
            Err(e @ EapiError::Timeout { .. }) => {
                tracing::error!(
                    "{} occurred while sending a command to {}. Consider increasing the timeout.",
                    e,
                    self.name
                );
                command.errors = vec![e.to_string()];
            }
            Err(e) => {
                tracing::error!("Error while sending '{}' to {}: {}", command.command, self.name, e);
                command.errors = vec![e.to_string()];
            }
        }
    }
}
