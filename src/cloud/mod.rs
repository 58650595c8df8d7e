/// 点云帧模型 (Point Cloud Frame Model)
///
/// 结构化深度点云: 每帧是 640x480 的有序网格,网格位置与传感器像素一一对应,
/// 缺失深度的位置用 NaN 占位。帧在总线和槽位间以 Arc 共享,避免复制。
pub mod slot;
pub mod source;

use std::sync::Arc;

// ========== 公共常量 ==========

/// 帧网格宽度 (列数)
pub const COLS: usize = 640;
/// 帧网格高度 (行数)
pub const ROWS: usize = 480;

// ========== 数据结构 ==========

/// 单个点: 相机坐标系位置 + 颜色
#[derive(Clone, Copy, Debug)]
pub struct CloudPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub rgb: [u8; 3],
}

impl CloudPoint {
    /// 缺失深度的占位点
    pub const INVALID: CloudPoint = CloudPoint {
        x: f32::NAN,
        y: f32::NAN,
        z: f32::NAN,
        rgb: [0, 0, 0],
    };

    pub fn new(x: f32, y: f32, z: f32, rgb: [u8; 3]) -> Self {
        Self { x, y, z, rgb }
    }

    /// 深度有效 (三个坐标均为有限值)
    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn position(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

/// 点云帧 (采集线程 → 检测/渲染)
#[derive(Clone)]
pub struct CloudFrame {
    pub width: u32,
    pub height: u32,
    pub points: Vec<CloudPoint>, // 行优先, width*height 个点
    pub seq: u64,                // 帧序号 (生产者单调递增)
}

impl CloudFrame {
    /// 全 NaN 的空帧
    pub fn empty(seq: u64) -> Self {
        Self {
            width: COLS as u32,
            height: ROWS as u32,
            points: vec![CloudPoint::INVALID; COLS * ROWS],
            seq,
        }
    }

    pub fn from_points(width: u32, height: u32, points: Vec<CloudPoint>, seq: u64) -> Self {
        debug_assert_eq!(points.len(), (width * height) as usize);
        Self {
            width,
            height,
            points,
            seq,
        }
    }

    /// 网格访问 (列, 行)
    pub fn at(&self, col: usize, row: usize) -> &CloudPoint {
        &self.points[row * self.width as usize + col]
    }

    pub fn at_mut(&mut self, col: usize, row: usize) -> &mut CloudPoint {
        &mut self.points[row * self.width as usize + col]
    }

    /// 有效点迭代器 (跳过 NaN)
    pub fn iter_valid(&self) -> impl Iterator<Item = &CloudPoint> {
        self.points.iter().filter(|p| p.is_valid())
    }

    pub fn valid_count(&self) -> usize {
        self.iter_valid().count()
    }

    /// 共享句柄 (总线与槽位间传递用)
    pub fn shared(self) -> Arc<CloudFrame> {
        Arc::new(self)
    }
}

/// 针孔相机内参 (Kinect RGB 标定值为默认)
#[derive(Clone, Copy, Debug)]
pub struct Intrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

impl Default for Intrinsics {
    fn default() -> Self {
        // Kinect RGB 相机出厂标定
        Self {
            fx: 525.0,
            fy: 525.0,
            cx: 319.5,
            cy: 239.5,
        }
    }
}

impl Intrinsics {
    /// 3D点 → 像素坐标 (点在相机后方时返回 None)
    pub fn project(&self, p: [f32; 3]) -> Option<(f32, f32)> {
        if p[2] <= 0.0 || !p[2].is_finite() {
            return None;
        }
        let u = self.fx * p[0] / p[2] + self.cx;
        let v = self.fy * p[1] / p[2] + self.cy;
        Some((u, v))
    }

    /// 像素 + 深度 → 3D点
    pub fn unproject(&self, col: f32, row: f32, depth: f32) -> [f32; 3] {
        [
            (col - self.cx) * depth / self.fx,
            (row - self.cy) * depth / self.fy,
            depth,
        ]
    }

    /// 像素对应的单位化前向射线 (z 分量为 1)
    pub fn ray(&self, col: f32, row: f32) -> [f32; 3] {
        [(col - self.cx) / self.fx, (row - self.cy) / self.fy, 1.0]
    }
}
