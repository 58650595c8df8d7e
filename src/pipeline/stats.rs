/// 帧率统计 (Frame Rate Meter)
///
/// 滚动窗口: 每处理满一个窗口的帧数报告一次平均帧率并重置,
/// 与上游传感器的名义帧率无关,量的是实际处理吞吐。
use std::time::Instant;

/// 默认统计窗口 (帧)
pub const FPS_WINDOW: u64 = 30;

pub struct FrameRateMeter {
    window: u64,
    count: u64,
    last: Instant,
}

impl FrameRateMeter {
    pub fn new() -> Self {
        Self::with_window(FPS_WINDOW)
    }

    pub fn with_window(window: u64) -> Self {
        Self {
            window: window.max(1),
            count: 0,
            last: Instant::now(),
        }
    }

    /// 记一帧;窗口满时返回平均帧率并重置计数与计时
    pub fn tick(&mut self) -> Option<f64> {
        self.count += 1;
        if self.count < self.window {
            return None;
        }
        let elapsed = self.last.elapsed().as_secs_f64();
        let rate = self.count as f64 / elapsed;
        self.count = 0;
        self.last = Instant::now();
        Some(rate)
    }

    pub fn frames_in_window(&self) -> u64 {
        self.count
    }
}

impl Default for FrameRateMeter {
    fn default() -> Self {
        Self::new()
    }
}
