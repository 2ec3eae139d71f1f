//! 运行环境相关的小工具：panic hook、控制台日志与计时。

use std::time::Duration;

#[cfg(feature = "console_error_panic_hook")]
pub fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
pub fn set_panic_hook() {}

/// 浏览器里写到 console，原生环境交给 tracing。
pub fn console_log(message: &str) {
    #[cfg(target_arch = "wasm32")]
    web_sys::console::log_1(&message.into());

    #[cfg(not(target_arch = "wasm32"))]
    tracing::info!(target: "quoridor_core", "{message}");
}

/// 自 Unix 纪元起的毫秒数。
#[cfg(target_arch = "wasm32")]
pub fn now_ms() -> f64 {
    web_sys::js_sys::Date::now()
}

#[cfg(not(target_arch = "wasm32"))]
pub fn now_ms() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

/// `std::time::Instant` 在 wasm32-unknown-unknown 上不可用，用毫秒时间戳代替。
#[derive(Debug, Clone, Copy)]
pub struct WasmInstant {
    timestamp: f64,
}

impl WasmInstant {
    pub fn now() -> Self {
        Self {
            timestamp: now_ms(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        let elapsed_ms = (now_ms() - self.timestamp).max(0.0);
        Duration::from_millis(elapsed_ms as u64)
    }
}

impl std::ops::Add<Duration> for WasmInstant {
    type Output = WasmInstant;

    fn add(self, duration: Duration) -> Self::Output {
        Self {
            timestamp: self.timestamp + duration.as_millis() as f64,
        }
    }
}

impl PartialOrd for WasmInstant {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.timestamp.partial_cmp(&other.timestamp)
    }
}

impl PartialEq for WasmInstant {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_lies_after_start() {
        let start = WasmInstant::now();
        let deadline = start + Duration::from_millis(50);
        assert!(deadline > start);
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
