//! `--monitor`：在各執行階段取樣 NRFU 行程的資源用量

#[cfg(feature = "cli")]
use std::sync::Mutex;
#[cfg(feature = "cli")]
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Copy)]
pub struct ResourceSample {
    pub cpu_percent: f32,
    pub rss_mb: u64,
    pub peak_rss_mb: u64,
    pub elapsed: Duration,
}

#[cfg(feature = "cli")]
struct Sampler {
    system: System,
    pid: Pid,
    peak_rss_mb: u64,
}

/// 停用時不建立 `sysinfo` 狀態，所有紀錄皆為 no-op
#[cfg(feature = "cli")]
pub struct SystemMonitor {
    sampler: Option<Mutex<Sampler>>,
    started: Instant,
}

#[cfg(feature = "cli")]
impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        let sampler = if enabled {
            match sysinfo::get_current_pid() {
                Ok(pid) => Some(Mutex::new(Sampler {
                    system: System::new(),
                    pid,
                    peak_rss_mb: 0,
                })),
                Err(e) => {
                    tracing::warn!("Resource monitoring unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };
        Self {
            sampler,
            started: Instant::now(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sampler.is_some()
    }

    pub fn sample(&self) -> Option<ResourceSample> {
        let mut sampler = self.sampler.as_ref()?.lock().ok()?;
        let pid = sampler.pid;
        sampler
            .system
            .refresh_processes_specifics(ProcessesToUpdate::Some(&[pid]), true, ProcessRefreshKind::everything());
        let (cpu_percent, rss_mb) = {
            let process = sampler.system.process(pid)?;
            (process.cpu_usage(), process.memory() / 1024 / 1024)
        };
        sampler.peak_rss_mb = sampler.peak_rss_mb.max(rss_mb);

        Some(ResourceSample {
            cpu_percent,
            rss_mb,
            peak_rss_mb: sampler.peak_rss_mb,
            elapsed: self.started.elapsed(),
        })
    }

    pub fn log_stats(&self, phase: &str) {
        if let Some(sample) = self.sample() {
            tracing::info!(
                "📊 [{}] CPU {:.1}% | RSS {}MB (peak {}MB) | {:?} elapsed",
                phase,
                sample.cpu_percent,
                sample.rss_mb,
                sample.peak_rss_mb,
                sample.elapsed
            );
        }
    }

    /// 測試執行完畢後的吞吐量摘要
    pub fn log_summary(&self, tests_run: usize) {
        if let Some(sample) = self.sample() {
            let seconds = sample.elapsed.as_secs_f64();
            let rate = if seconds > 0.0 { tests_run as f64 / seconds } else { 0.0 };
            tracing::info!(
                "📊 {} test(s) in {:?} ({:.1} tests/s), peak RSS {}MB",
                tests_run,
                sample.elapsed,
                rate,
                sample.peak_rss_mb
            );
        }
    }
}

#[cfg(not(feature = "cli"))]
pub struct SystemMonitor;

#[cfg(not(feature = "cli"))]
impl SystemMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn is_enabled(&self) -> bool {
        false
    }

    pub fn log_stats(&self, _phase: &str) {}

    pub fn log_summary(&self, _tests_run: usize) {}
}
