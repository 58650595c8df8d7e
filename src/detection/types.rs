/// 人体检测结果数据结构
/// Data structures for ground-based people detection
use crate::ground::GroundPlane;

// ========== 数据结构 ==========

/// 人体聚类 (Person cluster above the ground plane)
#[derive(Clone, Debug)]
pub struct PersonCluster {
    pub min: [f32; 3],    // 包围盒最小角 (相机坐标系)
    pub max: [f32; 3],    // 包围盒最大角
    pub center: [f32; 3], // 质心
    pub height: f32,      // 距地面的最大高度
    pub n_points: usize,  // 聚类包含的点数
    pub confidence: f32,  // 分类器得分,越大越像人
}

impl PersonCluster {
    /// 包围盒各轴尺寸
    pub fn extent(&self) -> [f32; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    /// 水平方向最大跨度 (人体宽度的代理)
    pub fn horizontal_extent(&self) -> f32 {
        let e = self.extent();
        e[0].max(e[2])
    }

    /// 盒顶中心 (标签锚点)
    pub fn top_center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) / 2.0,
            self.min[1],
            (self.min[2] + self.max[2]) / 2.0,
        ]
    }
}

/// 单帧检测输出 (检测器 → 主循环)
#[derive(Clone, Debug)]
pub struct Detection {
    pub clusters: Vec<PersonCluster>,
    pub ground: GroundPlane, // 本帧细化后的地平面,作为下一帧的输入
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_extent() {
        let cluster = PersonCluster {
            min: [-0.3, -0.4, 2.7],
            max: [0.3, 1.3, 3.3],
            center: [0.0, 0.5, 3.0],
            height: 1.7,
            n_points: 1000,
            confidence: 0.5,
        };
        let e = cluster.extent();
        assert!((e[0] - 0.6).abs() < 1e-6);
        assert!((e[1] - 1.7).abs() < 1e-6);
        assert!((cluster.horizontal_extent() - 0.6).abs() < 1e-6);
        assert!((cluster.top_center()[1] - -0.4).abs() < 1e-6);
    }
}
