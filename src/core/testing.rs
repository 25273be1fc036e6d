//! 引擎單元測試用的記憶體內裝置

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::core::cache::CommandCache;
use crate::domain::model::AntaCommand;
use crate::domain::ports::AntaDevice;

/// 記錄同時進行中的收集數與其峰值，可跨裝置共用
#[derive(Debug, Default)]
pub struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// 依指令字串回傳預設輸出或錯誤的假裝置
pub struct FakeDevice {
    pub name: String,
    pub tags: BTreeSet<String>,
    pub hw_model: Option<String>,
    pub established: bool,
    pub outputs: HashMap<String, std::result::Result<Value, Vec<String>>>,
    pub cache: Option<CommandCache>,
    pub calls: AtomicUsize,
    pub latency: Option<(Arc<InFlight>, Duration)>,
}

impl FakeDevice {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tags: [name.to_string()].into(),
            hw_model: Some("DCS-7050SX3-48YC8".to_string()),
            established: true,
            outputs: HashMap::new(),
            cache: None,
            calls: AtomicUsize::new(0),
            latency: None,
        }
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags.extend(tags.iter().map(|t| t.to_string()));
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.hw_model = Some(model.to_string());
        self
    }

    pub fn with_output(mut self, command: &str, output: Value) -> Self {
        self.outputs.insert(command.to_string(), Ok(output));
        self
    }

    pub fn with_errors(mut self, command: &str, errors: &[&str]) -> Self {
        self.outputs
            .insert(command.to_string(), Err(errors.iter().map(|e| e.to_string()).collect()));
        self
    }

    pub fn with_cache(mut self) -> Self {
        self.cache = Some(CommandCache::default());
        self
    }

    /// 每次收集延遲 `delay`，期間計入 `tracker`
    pub fn with_latency(mut self, tracker: Arc<InFlight>, delay: Duration) -> Self {
        self.latency = Some((tracker, delay));
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.established = false;
        self
    }

    pub fn into_arc(self) -> Arc<dyn AntaDevice> {
        Arc::new(self)
    }
}

#[async_trait]
impl AntaDevice for FakeDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    fn is_online(&self) -> bool {
        self.established
    }

    fn established(&self) -> bool {
        self.established
    }

    fn hw_model(&self) -> Option<String> {
        self.hw_model.clone()
    }

    fn cache(&self) -> Option<&CommandCache> {
        self.cache.as_ref()
    }

    async fn refresh(&self) {}

    async fn collect_uncached(&self, command: &mut AntaCommand) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some((tracker, delay)) = &self.latency {
            let now = tracker.current.fetch_add(1, Ordering::SeqCst) + 1;
            tracker.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(*delay).await;
            tracker.current.fetch_sub(1, Ordering::SeqCst);
        }
        match self.outputs.get(&command.command) {
            Some(Ok(output)) => command.output = Some(output.clone()),
            Some(Err(errors)) => command.errors = errors.clone(),
            None => command.errors = vec![format!("Invalid input (at token 0: '{}')", command.command)],
        }
    }
}
