use crate::core::cache::{CacheStatistics, CommandCache};
use crate::domain::model::{AntaCommand, AntaTemplate, TestResult};
use crate::utils::error::{AntaError, Result};
use async_trait::async_trait;
use std::collections::BTreeSet;

/// 受測裝置介面：傳輸細節由實作決定，快取邏輯共用
#[async_trait]
pub trait AntaDevice: Send + Sync {
    fn name(&self) -> &str;

    /// 裝置標籤，永遠包含裝置名稱本身
    fn tags(&self) -> &BTreeSet<String>;

    fn is_online(&self) -> bool;

    fn established(&self) -> bool;

    fn hw_model(&self) -> Option<String>;

    fn cache(&self) -> Option<&CommandCache>;

    /// 更新 `is_online`、`established` 與 `hw_model`
    async fn refresh(&self);

    /// 直接向裝置送出指令，結果或錯誤寫回 `command`
    async fn collect_uncached(&self, command: &mut AntaCommand);

    async fn collect(&self, command: &mut AntaCommand) {
        let cache = match self.cache() {
            Some(cache) if command.use_cache => cache,
            _ => {
                self.collect_uncached(command).await;
                return;
            }
        };

        let key = command.uid();
        let _guard = cache.lock_key(&key).await;
        if let Some(output) = cache.get(&key).await {
            tracing::debug!("Cache hit for {} on {}", command.command, self.name());
            command.output = Some(output);
            return;
        }

        self.collect_uncached(command).await;
        if command.collected() {
            if let Some(output) = &command.output {
                cache.insert(key, output.clone()).await;
            }
        }
    }

    async fn collect_commands(&self, commands: &mut [AntaCommand]) {
        futures::future::join_all(commands.iter_mut().map(|command| self.collect(command))).await;
    }

    async fn cache_statistics(&self) -> Option<CacheStatistics> {
        match self.cache() {
            Some(cache) => Some(cache.statistics().await),
            None => None,
        }
    }
}

/// 測試宣告的指令：固定指令或需依輸入渲染的模板
#[derive(Debug, Clone)]
pub enum CommandSpec {
    Command(AntaCommand),
    Template(AntaTemplate),
}

impl From<AntaCommand> for CommandSpec {
    fn from(command: AntaCommand) -> Self {
        CommandSpec::Command(command)
    }
}

impl From<AntaTemplate> for CommandSpec {
    fn from(template: AntaTemplate) -> Self {
        CommandSpec::Template(template)
    }
}

/// 宣告式驗證測試：結構本身即為測試輸入，`test` 只檢查已收集的輸出
///
/// 名稱、描述與分類由 `checks::TestSpec` 登錄，不在實例上重複。
pub trait AntaTest: Send + Sync {
    fn commands(&self) -> Vec<CommandSpec>;

    fn render(&self, template: &AntaTemplate) -> Result<Vec<AntaCommand>> {
        Err(AntaError::test(format!(
            "render() is not implemented for template '{}'",
            template.template
        )))
    }

    /// 硬體型號命中時直接略過測試
    fn skip_on_platforms(&self) -> &'static [&'static str] {
        &[]
    }

    fn validate_inputs(&self) -> Result<()> {
        Ok(())
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()>;
}
