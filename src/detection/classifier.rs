/// 线性人体分类器 (Linear Person Classifier)
///
/// 从 JSON 模型文件加载权重,对聚类的几何特征向量打分。
/// 得分无界,越大越像人;接受阈值由主循环控制,分类器只负责打分。
use crate::detection::types::PersonCluster;
use ndarray::Array1;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// 特征维度 (见 cluster_features)
pub const FEATURE_DIM: usize = 6;

/// 模型加载失败原因
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("failed to read classifier model {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse classifier model {path}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("classifier expects {expected} weights, model has {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// 模型文件结构: { "dim": 6, "weights": [...], "bias": ... }
#[derive(Debug, Deserialize)]
struct ModelFile {
    dim: usize,
    weights: Vec<f32>,
    bias: f32,
}

#[derive(Debug)]
pub struct PersonClassifier {
    weights: Array1<f32>,
    bias: f32,
}

impl PersonClassifier {
    /// 从 JSON 模型文件加载
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let text = std::fs::read_to_string(path).map_err(|source| ClassifierError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let model: ModelFile =
            serde_json::from_str(&text).map_err(|source| ClassifierError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        if model.dim != FEATURE_DIM || model.weights.len() != model.dim {
            return Err(ClassifierError::DimensionMismatch {
                expected: FEATURE_DIM,
                got: model.weights.len(),
            });
        }
        Ok(Self {
            weights: Array1::from_vec(model.weights),
            bias: model.bias,
        })
    }

    /// 直接由权重构造 (测试和程序内模型用)
    pub fn from_weights(weights: Vec<f32>, bias: f32) -> Result<Self, ClassifierError> {
        if weights.len() != FEATURE_DIM {
            return Err(ClassifierError::DimensionMismatch {
                expected: FEATURE_DIM,
                got: weights.len(),
            });
        }
        Ok(Self {
            weights: Array1::from_vec(weights),
            bias,
        })
    }

    /// 线性打分: w·f + b
    pub fn score(&self, features: &Array1<f32>) -> f32 {
        self.weights.dot(features) + self.bias
    }

    /// 对聚类打分
    pub fn score_cluster(&self, cluster: &PersonCluster) -> f32 {
        self.score(&cluster_features(cluster))
    }
}

/// 聚类几何特征向量:
/// [距地高度, x跨度, y跨度, z跨度, 高宽比, ln(点数)]
pub fn cluster_features(cluster: &PersonCluster) -> Array1<f32> {
    let e = cluster.extent();
    let horizontal = cluster.horizontal_extent().max(1e-3);
    Array1::from_vec(vec![
        cluster.height,
        e[0],
        e[1],
        e[2],
        cluster.height / horizontal,
        (cluster.n_points.max(1) as f32).ln(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_cluster() -> PersonCluster {
        PersonCluster {
            min: [-0.3, -0.3, 2.7],
            max: [0.3, 1.28, 3.3],
            center: [0.0, 0.5, 3.0],
            height: 1.7,
            n_points: 5000,
            confidence: 0.0,
        }
    }

    #[test]
    fn test_feature_vector_shape() {
        let f = cluster_features(&sample_cluster());
        assert_eq!(f.len(), FEATURE_DIM);
        assert!((f[0] - 1.7).abs() < 1e-6);
        assert!((f[4] - 1.7 / 0.6).abs() < 1e-3);
    }

    #[test]
    fn test_linear_score() {
        // 只看高度的权重: score = height - 1
        let clf = PersonClassifier::from_weights(vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0], -1.0).unwrap();
        let score = clf.score_cluster(&sample_cluster());
        assert!((score - 0.7).abs() < 1e-5);
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = PersonClassifier::from_weights(vec![1.0, 2.0], 0.0).unwrap_err();
        assert!(matches!(
            err,
            ClassifierError::DimensionMismatch {
                expected: FEATURE_DIM,
                got: 2
            }
        ));
    }

    #[test]
    fn test_load_from_json() {
        let dir = std::env::temp_dir();
        let path = dir.join("person_svm_test.json");
        std::fs::write(
            &path,
            r#"{ "dim": 6, "weights": [1.0, 0.0, 0.0, 0.0, 0.0, 0.0], "bias": -1.0 }"#,
        )
        .unwrap();

        let clf = PersonClassifier::load(&path).unwrap();
        assert!((clf.score_cluster(&sample_cluster()) - 0.7).abs() < 1e-5);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_missing_file() {
        let err = PersonClassifier::load(Path::new("/nonexistent/model.json")).unwrap_err();
        assert!(matches!(err, ClassifierError::Io { .. }));
    }

    #[test]
    fn test_load_bad_dim() {
        let dir = std::env::temp_dir();
        let path = dir.join("person_svm_bad_dim.json");
        std::fs::write(&path, r#"{ "dim": 2, "weights": [1.0, 2.0], "bias": 0.0 }"#).unwrap();
        let err = PersonClassifier::load(&path).unwrap_err();
        assert!(matches!(err, ClassifierError::DimensionMismatch { .. }));
        std::fs::remove_file(&path).ok();
    }
}
