/// 感知流水线 (Perception Pipeline)
///
/// 两个逻辑角色,通过共享帧槽位交接:
/// - Capture:   采集线程,总线订阅 → 槽位写入 + 回显
/// - Consumer:  标定阶段 (一次性) → 稳态检测循环 (持续),同一线程顺序执行
pub mod calibration;
pub mod capture;
pub mod detect_loop;
pub mod republish;
pub mod stats;

use crate::bus::CloudBus;
use crate::cloud::slot::SharedCloudSlot;
use republish::Republisher;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use calibration::{CalibrationError, CalibrationStage, CalibrationStatus};
pub use capture::spawn_capture;
pub use detect_loop::{DetectionLoop, FrameReport, Tick};
pub use stats::FrameRateMeter;

/// 流水线共享状态: 所有阶段显式持有,不走全局变量
pub struct PipelineContext {
    pub slot: Arc<SharedCloudSlot>,
    pub stop: Arc<AtomicBool>,
    pub republisher: Arc<Republisher>,
}

impl PipelineContext {
    pub fn new(bus: &Arc<CloudBus>) -> Self {
        Self {
            slot: Arc::new(SharedCloudSlot::new()),
            stop: Arc::new(AtomicBool::new(false)),
            republisher: Arc::new(Republisher::new(bus)),
        }
    }

    /// 请求整条流水线停止
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}
