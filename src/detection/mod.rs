/// 检测系统 (Detection System)
///
/// 基于地面的人体检测:
/// - Detector:   地平面细化 + 候选切片 + 网格聚类
/// - Classifier: 聚类几何特征的线性打分
pub mod classifier;
pub mod detector;
pub mod types;

pub use classifier::{ClassifierError, PersonClassifier};
pub use detector::{DetectorConfig, GroundBasedDetector, PeopleDetector};
pub use types::{Detection, PersonCluster};
