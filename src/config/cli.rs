use clap::{Args, Parser, Subcommand, ValueEnum};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::adapters::device::DeviceOptions;
use crate::core::result_manager::ResultManager;
use crate::domain::model::{CommandVersion, OutputFormat, TestStatus};
use crate::utils::error::{AntaError, Result};
use crate::utils::validation::{validate_non_empty_string, Validate};

/// 行程結束碼
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Ok = 0,
    InternalError = 1,
    UsageError = 2,
    TestsError = 3,
    TestsFailed = 4,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// `--ignore-status` 一律成功；`--ignore-error` 計算狀態時忽略 error
pub fn exit_code(manager: &ResultManager, ignore_status: bool, ignore_error: bool) -> ExitCode {
    if ignore_status {
        return ExitCode::Ok;
    }
    match manager.get_status(ignore_error) {
        TestStatus::Unset | TestStatus::Skipped | TestStatus::Success => ExitCode::Ok,
        TestStatus::Failure => ExitCode::TestsFailed,
        TestStatus::Error => ExitCode::TestsError,
    }
}

#[derive(Debug, Parser)]
#[command(name = "anta")]
#[command(about = "Arista Network Test Automation (ANTA) CLI", version)]
pub struct Cli {
    #[arg(long, env = "ANTA_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// 另存 JSON 格式的日誌
    #[arg(long, env = "ANTA_LOG_FILE", global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run ANTA tests on selected inventory devices
    Nrfu(NrfuArgs),
    /// Commands to validate configuration files
    #[command(subcommand)]
    Check(CheckCommand),
    /// Commands to get information from or generate inventories
    #[command(subcommand)]
    Get(GetCommand),
    /// Commands to execute EOS commands on remote devices
    #[command(subcommand)]
    Debug(DebugCommand),
}

#[derive(Debug, Clone, Args)]
pub struct InventoryArgs {
    #[arg(short = 'i', long, env = "ANTA_INVENTORY")]
    pub inventory: PathBuf,

    #[arg(short = 'u', long, env = "ANTA_USERNAME")]
    pub username: String,

    #[arg(short = 'p', long, env = "ANTA_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Password to access EOS Privileged EXEC mode
    #[arg(long, env = "ANTA_ENABLE_PASSWORD", hide_env_values = true)]
    pub enable_password: Option<String>,

    /// Some commands may require EOS Privileged EXEC mode
    #[arg(long, env = "ANTA_ENABLE")]
    pub enable: bool,

    /// Global API timeout in seconds
    #[arg(long, env = "ANTA_TIMEOUT")]
    pub timeout: Option<f64>,

    /// Disable SSH Host Key validation and TLS certificate verification
    #[arg(long, env = "ANTA_INSECURE")]
    pub insecure: bool,

    #[arg(long, env = "ANTA_DISABLE_CACHE")]
    pub disable_cache: bool,

    /// List of tags using comma as separator: tag1,tag2,tag3
    #[arg(long, env = "ANTA_TAGS", value_delimiter = ',')]
    pub tags: Vec<String>,
}

impl InventoryArgs {
    pub fn tag_filter(&self) -> Option<BTreeSet<String>> {
        if self.tags.is_empty() {
            None
        } else {
            Some(self.tags.iter().cloned().collect())
        }
    }

    /// 裝置預設值：先套用設定檔，再以 CLI 參數覆寫
    pub fn device_options(&self, base: DeviceOptions) -> DeviceOptions {
        let mut options = base;
        options.username = self.username.clone();
        options.password = self.password.clone();
        options.enable = self.enable;
        options.enable_password = self.enable_password.clone();
        options.insecure = self.insecure;
        options.disable_cache = self.disable_cache;
        if let Some(timeout) = self.timeout {
            options.timeout = Duration::from_secs_f64(timeout);
        }
        options
    }
}

impl Validate for InventoryArgs {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("username", &self.username)?;
        if self.enable_password.is_some() && !self.enable {
            return Err(AntaError::InvalidConfigValueError {
                field: "enable-password".to_string(),
                value: "***".to_string(),
                reason: "Providing a password to access EOS Privileged EXEC mode requires '--enable' option."
                    .to_string(),
            });
        }
        if let Some(timeout) = self.timeout {
            if !(timeout > 0.0 && timeout.is_finite()) {
                return Err(AntaError::InvalidConfigValueError {
                    field: "timeout".to_string(),
                    value: timeout.to_string(),
                    reason: "Timeout must be a positive number of seconds".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Args)]
pub struct CatalogArgs {
    #[arg(short = 'c', long, env = "ANTA_CATALOG")]
    pub catalog: PathBuf,
}

#[derive(Debug, Args)]
pub struct NrfuArgs {
    #[command(flatten)]
    pub inventory: InventoryArgs,

    #[command(flatten)]
    pub catalog: CatalogArgs,

    /// Run tests on a specific device. Can be provided multiple times.
    #[arg(short = 'd', long = "device", env = "ANTA_NRFU_DEVICE", value_delimiter = ',')]
    pub devices: Vec<String>,

    /// Run a specific test. Can be provided multiple times.
    #[arg(short = 't', long = "test", env = "ANTA_NRFU_TEST", value_delimiter = ',')]
    pub tests: Vec<String>,

    /// Exit code will always be 0
    #[arg(long, env = "ANTA_NRFU_IGNORE_STATUS")]
    pub ignore_status: bool,

    /// Exit code will be 0 if all tests succeeded or 1 if any test failed
    #[arg(long, env = "ANTA_NRFU_IGNORE_ERROR")]
    pub ignore_error: bool,

    /// Hide results by type: success / failure / error / skipped
    #[arg(long, env = "ANTA_NRFU_HIDE", value_delimiter = ',')]
    pub hide: Vec<TestStatus>,

    /// Print the tests that would run without connecting to devices
    #[arg(long, env = "ANTA_NRFU_DRY_RUN")]
    pub dry_run: bool,

    /// Runtime settings file (TOML)
    #[arg(long, env = "ANTA_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Log CPU and memory usage of the run
    #[arg(long)]
    pub monitor: bool,

    #[command(subcommand)]
    pub report: Option<ReportCommand>,
}

impl NrfuArgs {
    pub fn device_filter(&self) -> Option<BTreeSet<String>> {
        non_empty_set(&self.devices)
    }

    pub fn test_filter(&self) -> Option<BTreeSet<String>> {
        non_empty_set(&self.tests)
    }

    pub fn hidden(&self) -> BTreeSet<TestStatus> {
        self.hide.iter().copied().collect()
    }
}

impl Validate for NrfuArgs {
    fn validate(&self) -> Result<()> {
        self.inventory.validate()?;
        if self.hide.contains(&TestStatus::Unset) {
            return Err(AntaError::InvalidConfigValueError {
                field: "hide".to_string(),
                value: "unset".to_string(),
                reason: "Only success, failure, error and skipped results can be hidden".to_string(),
            });
        }
        Ok(())
    }
}

fn non_empty_set(values: &[String]) -> Option<BTreeSet<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().cloned().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GroupBy {
    Device,
    Test,
}

#[derive(Debug, Subcommand)]
pub enum ReportCommand {
    /// ANTA command to check network state with table results
    Table {
        #[arg(long, value_enum)]
        group_by: Option<GroupBy>,
    },
    /// ANTA command to check network state with JSON results
    Json {
        /// Path to save report as a JSON file
        #[arg(short = 'o', long, env = "ANTA_NRFU_JSON_OUTPUT")]
        output: Option<PathBuf>,
    },
    /// ANTA command to check network state with CSV report
    Csv {
        #[arg(long, env = "ANTA_NRFU_CSV_CSV_OUTPUT")]
        csv_output: PathBuf,
    },
    /// ANTA command to check network state with Markdown report
    MdReport {
        #[arg(long, env = "ANTA_NRFU_MD_REPORT_MD_OUTPUT")]
        md_output: PathBuf,
    },
    /// ANTA command to check network state with text results
    Text,
}

#[derive(Debug, Subcommand)]
pub enum CheckCommand {
    /// Check that the catalog is valid
    Catalog(CatalogArgs),
}

#[derive(Debug, Subcommand)]
pub enum GetCommand {
    /// Show inventory loaded in ANTA
    Inventory {
        #[command(flatten)]
        inventory: InventoryArgs,
        /// Only show devices with established connection
        #[arg(long)]
        connected: bool,
    },
    /// Get list of configured tags in user inventory
    Tags {
        #[command(flatten)]
        inventory: InventoryArgs,
    },
    /// Show all builtin ANTA tests
    Tests {
        /// Filter tests by module name prefix
        #[arg(long, default_value = "anta.tests")]
        module: String,
        /// Filter by specific test name
        #[arg(long)]
        test: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum DebugCommand {
    /// Run arbitrary command to an ANTA device
    RunCmd {
        #[command(flatten)]
        inventory: InventoryArgs,
        /// Device from inventory to use
        #[arg(short = 'd', long)]
        device: String,
        /// Command to run
        #[arg(short = 'c', long)]
        command: String,
        #[arg(long, value_enum, default_value = "json")]
        ofmt: OfmtArg,
        /// EOS eAPI version
        #[arg(long, default_value = "latest")]
        version: String,
        /// eAPI command revision
        #[arg(short = 'r', long, value_parser = clap::value_parser!(u8).range(1..=99))]
        revision: Option<u8>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OfmtArg {
    Json,
    Text,
}

impl From<OfmtArg> for OutputFormat {
    fn from(value: OfmtArg) -> Self {
        match value {
            OfmtArg::Json => OutputFormat::Json,
            OfmtArg::Text => OutputFormat::Text,
        }
    }
}

pub fn parse_version(value: &str) -> Result<CommandVersion> {
    serde_json::from_value(serde_json::Value::String(value.to_string())).map_err(|_| {
        AntaError::InvalidConfigValueError {
            field: "version".to_string(),
            value: value.to_string(),
            reason: "expected 1 or latest".to_string(),
        }
    })
}
