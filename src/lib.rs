pub mod bus; // 点云消息总线
pub mod cloud; // 点云帧模型/共享槽位/合成源
pub mod config; // 命令行参数
pub mod detection; // 人体检测系统
pub mod ground; // 地平面估计
pub mod pipeline; // 采集/标定/稳态检测流水线
pub mod viewer; // 显示层契约

pub use crate::bus::{CloudBus, CloudPublisher, TOPIC_DEPTH_POINTS, TOPIC_ECHO, TOPIC_OUTPUT};
pub use crate::cloud::slot::{ClaimedCloud, SharedCloudSlot, TryClaim};
pub use crate::cloud::source::{spawn_synthetic_source, PersonBox, SyntheticScene};
pub use crate::cloud::{CloudFrame, CloudPoint, Intrinsics, COLS, ROWS};
pub use crate::config::Args;
pub use crate::detection::{
    Detection, DetectorConfig, GroundBasedDetector, PeopleDetector, PersonClassifier, PersonCluster,
};
pub use crate::ground::{fit_plane, GroundPlane, PlaneFitError};
pub use crate::pipeline::{
    spawn_capture, CalibrationError, CalibrationStage, CalibrationStatus, DetectionLoop,
    FrameRateMeter, FrameReport, PipelineContext, Tick,
};
pub use crate::viewer::{ConsoleViewer, Viewer, ViewerEvent};
