use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::OnceLock;

use crate::utils::error::{AntaError, Result};
use crate::utils::validation::validate_range;

/// eAPI 回傳格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Text,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Text => write!(f, "text"),
        }
    }
}

/// eAPI 指令版本：`1` 或 `"latest"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CommandVersion {
    One,
    #[default]
    Latest,
}

impl fmt::Display for CommandVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandVersion::One => write!(f, "1"),
            CommandVersion::Latest => write!(f, "latest"),
        }
    }
}

impl Serialize for CommandVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            CommandVersion::One => serializer.serialize_u8(1),
            CommandVersion::Latest => serializer.serialize_str("latest"),
        }
    }
}

impl<'de> Deserialize<'de> for CommandVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(1) => Ok(CommandVersion::One),
            Raw::Text(s) if s == "1" => Ok(CommandVersion::One),
            Raw::Text(s) if s == "latest" => Ok(CommandVersion::Latest),
            Raw::Number(n) => Err(serde::de::Error::custom(format!(
                "invalid eAPI version {}, expected 1 or 'latest'",
                n
            ))),
            Raw::Text(s) => Err(serde::de::Error::custom(format!(
                "invalid eAPI version '{}', expected 1 or 'latest'",
                s
            ))),
        }
    }
}

/// 只比對錯誤訊息開頭
const KNOWN_EOS_ERRORS: &[&str] = &[
    r"^BGP inactive",
    r"^VRF '.*' is not active",
    r"^.* does not support IP",
    r"^IS-IS (.*) is disabled because: .*",
    r"^No source interface .*",
];

pub const MIN_REVISION: u8 = 1;
pub const MAX_REVISION: u8 = 99;

/// eAPI 指令 revision 必須介於 1..=99
pub fn validate_revision(revision: u8) -> Result<u8> {
    validate_range("revision", revision, MIN_REVISION, MAX_REVISION)?;
    Ok(revision)
}

fn deserialize_revision<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<u8>, D::Error> {
    Option::<u8>::deserialize(deserializer)?
        .map(|revision| validate_revision(revision).map_err(serde::de::Error::custom))
        .transpose()
}

/// 超出範圍的 revision 不寫入，沿用裝置預設
fn checked_revision(command: &str, revision: u8) -> Option<u8> {
    match validate_revision(revision) {
        Ok(revision) => Some(revision),
        Err(e) => {
            tracing::warn!("Ignoring revision of '{}': {}", command, e);
            None
        }
    }
}

fn known_eos_errors() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        KNOWN_EOS_ERRORS
            .iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
            .collect()
    })
}

/// 送往裝置的單一指令，收集後持有輸出或錯誤
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AntaCommand {
    pub command: String,
    #[serde(default)]
    pub version: CommandVersion,
    #[serde(default, deserialize_with = "deserialize_revision")]
    pub revision: Option<u8>,
    #[serde(default)]
    pub ofmt: OutputFormat,
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub errors: Vec<String>,
}

fn default_use_cache() -> bool {
    true
}

impl AntaCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            version: CommandVersion::Latest,
            revision: None,
            ofmt: OutputFormat::Json,
            use_cache: true,
            output: None,
            template: None,
            params: Map::new(),
            errors: Vec::new(),
        }
    }

    pub fn text(command: impl Into<String>) -> Self {
        Self::new(command).with_ofmt(OutputFormat::Text)
    }

    pub fn with_ofmt(mut self, ofmt: OutputFormat) -> Self {
        self.ofmt = ofmt;
        self
    }

    pub fn with_version(mut self, version: CommandVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_revision(mut self, revision: u8) -> Self {
        self.revision = checked_revision(&self.command, revision);
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// 快取鍵：同一指令、版本、revision 與格式視為相同
    pub fn uid(&self) -> String {
        let revision = self.revision.map(|r| r.to_string()).unwrap_or_default();
        format!("{}_{}_{}_{}", self.command, self.version, revision, self.ofmt)
    }

    pub fn json_output(&self) -> Result<&Map<String, Value>> {
        if self.ofmt != OutputFormat::Json {
            return Err(AntaError::CommandOutputError {
                command: self.command.clone(),
                reason: "output format is text, not json".to_string(),
            });
        }
        match &self.output {
            Some(Value::Object(map)) => Ok(map),
            Some(_) => Err(AntaError::CommandOutputError {
                command: self.command.clone(),
                reason: "json output is not an object".to_string(),
            }),
            None => Err(AntaError::CommandOutputError {
                command: self.command.clone(),
                reason: "command has not been collected".to_string(),
            }),
        }
    }

    pub fn text_output(&self) -> Result<&str> {
        if self.ofmt != OutputFormat::Text {
            return Err(AntaError::CommandOutputError {
                command: self.command.clone(),
                reason: "output format is json, not text".to_string(),
            });
        }
        match &self.output {
            Some(Value::String(text)) => Ok(text),
            _ => Err(AntaError::CommandOutputError {
                command: self.command.clone(),
                reason: "command has not been collected".to_string(),
            }),
        }
    }

    pub fn error(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn collected(&self) -> bool {
        self.output.is_some() && !self.error()
    }

    pub fn requires_privileges(&self) -> bool {
        self.errors
            .iter()
            .any(|e| e.contains("privileged mode required"))
    }

    pub fn supported(&self) -> bool {
        !self
            .errors
            .iter()
            .any(|e| e.contains("not supported on this hardware platform"))
    }

    pub fn returned_known_eos_error(&self) -> bool {
        self.errors
            .iter()
            .any(|e| known_eos_errors().iter().any(|re| re.is_match(e)))
    }

    /// 取得模板參數（例如 VerifyReachability 的 `destination`）
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }
}

impl fmt::Display for AntaCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)
    }
}

/// 帶 `{param}` 佔位符的指令模板
#[derive(Debug, Clone, PartialEq)]
pub struct AntaTemplate {
    pub template: String,
    pub version: CommandVersion,
    pub revision: Option<u8>,
    pub ofmt: OutputFormat,
    pub use_cache: bool,
}

impl AntaTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            version: CommandVersion::Latest,
            revision: None,
            ofmt: OutputFormat::Json,
            use_cache: true,
        }
    }

    pub fn with_ofmt(mut self, ofmt: OutputFormat) -> Self {
        self.ofmt = ofmt;
        self
    }

    pub fn with_revision(mut self, revision: u8) -> Self {
        self.revision = checked_revision(&self.template, revision);
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn render(&self, params: Map<String, Value>) -> Result<AntaCommand> {
        static PLACEHOLDER: OnceLock<Option<Regex>> = OnceLock::new();
        let placeholder = PLACEHOLDER
            .get_or_init(|| Regex::new(r"\{(\w+)\}").ok())
            .as_ref()
            .ok_or_else(|| AntaError::config("invalid template placeholder pattern"))?;

        if let Some(missing) = placeholder
            .captures_iter(&self.template)
            .map(|caps| caps[1].to_string())
            .find(|key| !params.contains_key(key))
        {
            return Err(AntaError::TemplateRenderError {
                template: self.template.clone(),
                key: missing,
            });
        }

        let command = placeholder
            .replace_all(&self.template, |caps: &regex::Captures| {
                params
                    .get(&caps[1])
                    .map(crate::utils::tools::display_value)
                    .unwrap_or_default()
            })
            .to_string();

        Ok(AntaCommand {
            command,
            version: self.version,
            revision: self.revision,
            ofmt: self.ofmt,
            use_cache: self.use_cache,
            output: None,
            template: Some(self.template.clone()),
            params,
            errors: Vec::new(),
        })
    }
}

/// 測試結果狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    #[default]
    Unset,
    Success,
    Failure,
    Error,
    Skipped,
}

impl TestStatus {
    pub const ALL: [TestStatus; 5] = [
        TestStatus::Unset,
        TestStatus::Success,
        TestStatus::Failure,
        TestStatus::Error,
        TestStatus::Skipped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Unset => "unset",
            TestStatus::Success => "success",
            TestStatus::Failure => "failure",
            TestStatus::Error => "error",
            TestStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TestStatus {
    type Err = AntaError;

    fn from_str(s: &str) -> Result<Self> {
        TestStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.to_lowercase())
            .ok_or_else(|| AntaError::InvalidConfigValueError {
                field: "status".to_string(),
                value: s.to_string(),
                reason: "expected one of unset, success, failure, error, skipped".to_string(),
            })
    }
}

/// 單一裝置上單一測試的結果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestResult {
    pub name: String,
    pub test: String,
    pub categories: Vec<String>,
    pub description: String,
    pub result: TestStatus,
    pub messages: Vec<String>,
    pub custom_field: Option<String>,
}

impl TestResult {
    pub fn new(
        name: impl Into<String>,
        test: impl Into<String>,
        categories: Vec<String>,
        description: impl Into<String>,
        custom_field: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            test: test.into(),
            categories,
            description: description.into(),
            result: TestStatus::Unset,
            messages: Vec::new(),
            custom_field,
        }
    }

    pub fn is_success(&mut self, message: Option<String>) {
        self.set_status(TestStatus::Success, message);
    }

    pub fn is_failure(&mut self, message: Option<String>) {
        self.set_status(TestStatus::Failure, message);
    }

    pub fn is_skipped(&mut self, message: Option<String>) {
        self.set_status(TestStatus::Skipped, message);
    }

    pub fn is_error(&mut self, message: Option<String>) {
        self.set_status(TestStatus::Error, message);
    }

    /// 測試本體的簡寫：記錄一則失敗訊息
    pub fn fail(&mut self, message: impl Into<String>) {
        self.is_failure(Some(message.into()));
    }

    fn set_status(&mut self, status: TestStatus, message: Option<String>) {
        self.result = status;
        if let Some(message) = message {
            self.messages.push(message);
        }
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Test '{}' (on '{}'): Result '{}'\nMessages: {:?}",
            self.test, self.name, self.result, self.messages
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_uid_distinguishes_format_and_revision() {
        let json_cmd = AntaCommand::new("show version");
        let text_cmd = AntaCommand::text("show version");
        let rev_cmd = AntaCommand::new("show version").with_revision(1);
        assert_ne!(json_cmd.uid(), text_cmd.uid());
        assert_ne!(json_cmd.uid(), rev_cmd.uid());
        assert_eq!(json_cmd.uid(), AntaCommand::new("show version").uid());
    }

    #[test]
    fn test_command_revision_range() {
        assert_eq!(AntaCommand::new("show version").with_revision(99).revision, Some(99));
        assert_eq!(AntaCommand::new("show version").with_revision(0).revision, None);
        assert_eq!(AntaCommand::new("show version").with_revision(100).revision, None);
        assert_eq!(AntaTemplate::new("show ip route {route}").with_revision(200).revision, None);
        assert!(validate_revision(0).is_err());

        let cmd: AntaCommand = serde_json::from_value(json!({"command": "show version", "revision": 3})).unwrap();
        assert_eq!(cmd.revision, Some(3));
        let missing: AntaCommand = serde_json::from_value(json!({"command": "show version"})).unwrap();
        assert_eq!(missing.revision, None);
        assert!(serde_json::from_value::<AntaCommand>(json!({"command": "show version", "revision": 0})).is_err());
        assert!(serde_json::from_value::<AntaCommand>(json!({"command": "show version", "revision": 200})).is_err());
    }

    #[test]
    fn test_command_outputs() {
        let mut cmd = AntaCommand::new("show version");
        assert!(!cmd.collected());
        assert!(cmd.json_output().is_err());

        cmd.output = Some(json!({"modelName": "DCS-7280CR3-32P4"}));
        assert!(cmd.collected());
        assert_eq!(cmd.json_output().unwrap()["modelName"], "DCS-7280CR3-32P4");
        assert!(cmd.text_output().is_err());

        let mut text = AntaCommand::text("show running-config diffs");
        text.output = Some(json!(""));
        assert_eq!(text.text_output().unwrap(), "");
    }

    #[test]
    fn test_command_error_classification() {
        let mut cmd = AntaCommand::new("show bgp summary");
        cmd.errors = vec!["BGP inactive".to_string()];
        assert!(cmd.error());
        assert!(cmd.returned_known_eos_error());
        assert!(cmd.supported());

        // 較長的訊息中含有已知錯誤字樣時不算
        let mut cmd = AntaCommand::new("show ip bgp summary vrf all");
        cmd.errors = vec!["Unexpected failure: BGP inactive on peer group".to_string()];
        assert!(!cmd.returned_known_eos_error());

        let mut cmd = AntaCommand::new("show ip route vrf BLUE");
        cmd.errors = vec!["VRF 'BLUE' is not active".to_string()];
        assert!(cmd.returned_known_eos_error());

        let mut cmd = AntaCommand::new("show hardware counter drop");
        cmd.errors = vec!["Unavailable command (not supported on this hardware platform)".to_string()];
        assert!(!cmd.supported());
        assert!(!cmd.returned_known_eos_error());

        let mut cmd = AntaCommand::new("show running-config");
        cmd.errors = vec!["Invalid input (privileged mode required)".to_string()];
        assert!(cmd.requires_privileges());
    }

    #[test]
    fn test_template_render() {
        let template = AntaTemplate::new("ping vrf {vrf} {destination} repeat {repeat}");
        let mut params = Map::new();
        params.insert("vrf".to_string(), json!("MGMT"));
        params.insert("destination".to_string(), json!("10.0.0.1"));
        params.insert("repeat".to_string(), json!(2));

        let cmd = template.render(params).unwrap();
        assert_eq!(cmd.command, "ping vrf MGMT 10.0.0.1 repeat 2");
        assert_eq!(cmd.param_str("vrf"), Some("MGMT"));
        assert_eq!(cmd.template.as_deref(), Some(template.template.as_str()));
    }

    #[test]
    fn test_template_render_missing_param() {
        let template = AntaTemplate::new("show ip route vrf {vrf} {route}");
        let mut params = Map::new();
        params.insert("vrf".to_string(), json!("default"));

        match template.render(params) {
            Err(AntaError::TemplateRenderError { key, .. }) => assert_eq!(key, "route"),
            other => panic!("unexpected render result: {:?}", other),
        }
    }

    #[test]
    fn test_result_status_setters() {
        let mut result = TestResult::new("leaf1", "VerifyUptime", vec![], "", None);
        assert_eq!(result.result, TestStatus::Unset);
        result.is_success(None);
        result.fail("uptime too low");
        assert_eq!(result.result, TestStatus::Failure);
        assert_eq!(result.messages, vec!["uptime too low".to_string()]);
    }

    #[test]
    fn test_version_serde() {
        assert_eq!(serde_json::to_value(CommandVersion::One).unwrap(), json!(1));
        assert_eq!(serde_json::to_value(CommandVersion::Latest).unwrap(), json!("latest"));
        let v: CommandVersion = serde_json::from_value(json!("latest")).unwrap();
        assert_eq!(v, CommandVersion::Latest);
        assert!(serde_json::from_value::<CommandVersion>(json!(2)).is_err());
        assert_eq!("FAILURE".parse::<TestStatus>().unwrap(), TestStatus::Failure);
    }
}
