//! 基于地面的人体检测器 (Ground-Based People Detector)
//! 职责: 细化地平面 → 切出高于地面的候选点 → 平面投影网格聚类 →
//! 几何过滤 → 线性分类器打分
//!
//! 聚类按网格扫描顺序返回,同一帧多次检测结果完全一致。

use crate::cloud::CloudFrame;
use crate::detection::classifier::PersonClassifier;
use crate::detection::types::{Detection, PersonCluster};
use crate::ground::{fit_plane, GroundPlane};
use anyhow::Result;
use std::collections::{HashMap, HashSet};

/// 检测器契约: 一帧点云 + 当前地平面 → 聚类列表 + 细化后的平面
pub trait PeopleDetector {
    fn detect(&mut self, cloud: &CloudFrame, ground: &GroundPlane) -> Result<Detection>;
}

/// 检测参数
#[derive(Clone, Copy, Debug)]
pub struct DetectorConfig {
    pub voxel_size: f32,   // 体素尺寸 (米): 地面容差与聚类网格分辨率的基准
    pub min_height: f32,   // 人体最小身高
    pub max_height: f32,   // 人体最大身高
    pub min_width: f32,    // 人体最小宽度
    pub max_width: f32,    // 人体最大宽度
    pub min_points: usize, // 聚类最少点数
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            voxel_size: 0.06,
            min_height: 1.3,
            max_height: 2.3,
            min_width: 0.1,
            max_width: 8.0,
            min_points: 30,
        }
    }
}

pub struct GroundBasedDetector {
    config: DetectorConfig,
    classifier: PersonClassifier,
}

impl GroundBasedDetector {
    pub fn new(config: DetectorConfig, classifier: PersonClassifier) -> Self {
        Self { config, classifier }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// 用贴近当前平面的点重新拟合,吸收传感器抖动和标定误差
    fn refine_ground(&self, cloud: &CloudFrame, ground: &GroundPlane) -> GroundPlane {
        let tolerance = self.config.voxel_size;
        let inliers: Vec<[f32; 3]> = cloud
            .iter_valid()
            .map(|p| p.position())
            .filter(|p| ground.signed_distance(*p).abs() <= tolerance)
            .collect();

        // 内点太少时保持原平面
        if inliers.len() < 3 {
            return *ground;
        }
        let mut refined = match fit_plane(&inliers) {
            Ok(plane) => plane,
            Err(_) => return *ground,
        };
        // 朝向与上一帧保持一致
        if refined.normal_dot(ground) < 0.0 {
            refined = refined.flipped();
        }
        refined
    }
}

impl PeopleDetector for GroundBasedDetector {
    fn detect(&mut self, cloud: &CloudFrame, ground: &GroundPlane) -> Result<Detection> {
        let cfg = self.config;

        // 1. 细化地平面
        let refined = self.refine_ground(cloud, ground);

        // 2. 候选点: 高于地面 2 倍体素的有效点
        let min_elevation = 2.0 * cfg.voxel_size;
        let candidates: Vec<([f32; 3], f32)> = cloud
            .iter_valid()
            .map(|p| p.position())
            .filter_map(|p| {
                let h = refined.height_above(p);
                (h > min_elevation).then_some((p, h))
            })
            .collect();

        // 3. 平面投影 2D 网格 + 8邻域泛洪聚类
        let cell = 2.0 * cfg.voxel_size;
        let (u_axis, v_axis) = plane_basis(refined.normal());
        let mut grid: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
        for (i, (p, _)) in candidates.iter().enumerate() {
            let gu = (dot3(*p, u_axis) / cell).floor() as i64;
            let gv = (dot3(*p, v_axis) / cell).floor() as i64;
            grid.entry((gu, gv)).or_default().push(i);
        }

        // 网格键排序后再泛洪,聚类顺序与 HashMap 布局无关
        let mut cells: Vec<(i64, i64)> = grid.keys().copied().collect();
        cells.sort_unstable();

        let mut clusters = Vec::new();
        let mut visited: HashSet<(i64, i64)> = HashSet::new();
        for seed in cells {
            if visited.contains(&seed) {
                continue;
            }
            let mut member_points: Vec<usize> = Vec::new();
            let mut stack = vec![seed];
            visited.insert(seed);
            while let Some((cu, cv)) = stack.pop() {
                if let Some(indices) = grid.get(&(cu, cv)) {
                    member_points.extend_from_slice(indices);
                }
                for du in -1..=1 {
                    for dv in -1..=1 {
                        if du == 0 && dv == 0 {
                            continue;
                        }
                        let next = (cu + du, cv + dv);
                        if grid.contains_key(&next) && visited.insert(next) {
                            stack.push(next);
                        }
                    }
                }
            }

            // 4. 几何过滤: 点数、身高、宽度
            if member_points.len() < cfg.min_points {
                continue;
            }
            let mut min = [f32::INFINITY; 3];
            let mut max = [f32::NEG_INFINITY; 3];
            let mut sum = [0.0f64; 3];
            let mut height = 0.0f32;
            for &idx in &member_points {
                let (p, h) = candidates[idx];
                for axis in 0..3 {
                    min[axis] = min[axis].min(p[axis]);
                    max[axis] = max[axis].max(p[axis]);
                    sum[axis] += p[axis] as f64;
                }
                height = height.max(h);
            }
            if height < cfg.min_height || height > cfg.max_height {
                continue;
            }
            let n = member_points.len();
            let center = [
                (sum[0] / n as f64) as f32,
                (sum[1] / n as f64) as f32,
                (sum[2] / n as f64) as f32,
            ];
            let mut cluster = PersonCluster {
                min,
                max,
                center,
                height,
                n_points: n,
                confidence: 0.0,
            };
            let width = cluster.horizontal_extent();
            if width < cfg.min_width || width > cfg.max_width {
                continue;
            }

            // 5. 分类器打分
            cluster.confidence = self.classifier.score_cluster(&cluster);
            clusters.push(cluster);
        }

        Ok(Detection {
            clusters,
            ground: refined,
        })
    }
}

// ========== 向量辅助 ==========

fn dot3(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross3(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn normalize3(v: [f32; 3]) -> [f32; 3] {
    let n = dot3(v, v).sqrt();
    if n <= f32::EPSILON {
        return [1.0, 0.0, 0.0];
    }
    [v[0] / n, v[1] / n, v[2] / n]
}

/// 平面内的正交切向基 (u, v)
fn plane_basis(normal: [f32; 3]) -> ([f32; 3], [f32; 3]) {
    // 选与法向量最不平行的坐标轴起步
    let seed = if normal[0].abs() < 0.9 {
        [1.0, 0.0, 0.0]
    } else {
        [0.0, 0.0, 1.0]
    };
    let u = normalize3(cross3(normal, seed));
    let v = normalize3(cross3(normal, u));
    (u, v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::source::SyntheticScene;
    use crate::detection::classifier::PersonClassifier;

    fn height_only_classifier() -> PersonClassifier {
        // score = height - 1
        PersonClassifier::from_weights(vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0], -1.0).unwrap()
    }

    fn floor_plane(floor_y: f32) -> GroundPlane {
        GroundPlane::from_coeffs(0.0, 1.0, 0.0, -floor_y).unwrap()
    }

    #[test]
    fn test_single_person_detected() {
        let mut scene = SyntheticScene::new(1);
        let frame = scene.next_frame();
        let ground = floor_plane(scene.floor_y);

        let mut detector =
            GroundBasedDetector::new(DetectorConfig::default(), height_only_classifier());
        let det = detector.detect(&frame, &ground).unwrap();

        assert_eq!(det.clusters.len(), 1);
        let person = &det.clusters[0];
        assert!((person.height - 1.7).abs() < 0.05);
        assert!((person.confidence - 0.7).abs() < 0.05);
        assert!(person.n_points > 1000);
    }

    #[test]
    fn test_empty_scene_no_clusters() {
        let mut scene = SyntheticScene::new(1);
        scene.person = None;
        let frame = scene.next_frame();
        let ground = floor_plane(scene.floor_y);

        let mut detector =
            GroundBasedDetector::new(DetectorConfig::default(), height_only_classifier());
        let det = detector.detect(&frame, &ground).unwrap();
        assert!(det.clusters.is_empty());
    }

    #[test]
    fn test_short_cluster_filtered_by_height() {
        let mut scene = SyntheticScene::new(1);
        if let Some(person) = &mut scene.person {
            person.height = 1.0; // 低于 min_height = 1.3
        }
        let frame = scene.next_frame();
        let ground = floor_plane(scene.floor_y);

        let mut detector =
            GroundBasedDetector::new(DetectorConfig::default(), height_only_classifier());
        let det = detector.detect(&frame, &ground).unwrap();
        assert!(det.clusters.is_empty());
    }

    #[test]
    fn test_ground_refinement_converges() {
        let mut scene = SyntheticScene::new(1);
        scene.person = None;
        let frame = scene.next_frame();

        // 标定值偏离真实地面 5cm,仍在体素容差内
        let coarse = floor_plane(scene.floor_y - 0.05);
        let mut detector =
            GroundBasedDetector::new(DetectorConfig::default(), height_only_classifier());
        let det = detector.detect(&frame, &coarse).unwrap();

        let refined = det.ground;
        // 细化后地面点几乎贴合平面
        let sample = frame.at(320, 460);
        assert!(sample.is_valid());
        assert!(refined.signed_distance(sample.position()).abs() < 0.01);
        // 朝向未翻转
        assert!(refined.normal_dot(&coarse) > 0.9);
    }

    #[test]
    fn test_detection_is_deterministic() {
        let ground = floor_plane(1.4);
        let frame = SyntheticScene::new(3).next_frame();

        let mut d1 = GroundBasedDetector::new(DetectorConfig::default(), height_only_classifier());
        let mut d2 = GroundBasedDetector::new(DetectorConfig::default(), height_only_classifier());
        let a = d1.detect(&frame, &ground).unwrap();
        let b = d2.detect(&frame, &ground).unwrap();

        assert_eq!(a.clusters.len(), b.clusters.len());
        for (ca, cb) in a.clusters.iter().zip(&b.clusters) {
            assert_eq!(ca.n_points, cb.n_points);
            assert_eq!(ca.confidence.to_bits(), cb.confidence.to_bits());
        }
    }
}
