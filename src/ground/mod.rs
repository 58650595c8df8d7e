/// 地平面估计 (Ground Plane Estimation)
///
/// 最小二乘平面拟合: 质心 + 协方差矩阵最小特征向量法。
/// 平面系数 (a,b,c,d) 满足 a*x+b*y+c*z+d=0,法向量恒为单位长度,
/// 且朝向固定为"传感器原点在非负一侧",保证 height_above 的符号稳定。
use nalgebra::{Matrix3, SymmetricEigen, Vector3};
use thiserror::Error;

/// 平面拟合失败原因
#[derive(Debug, Error)]
pub enum PlaneFitError {
    #[error("plane fit needs at least 3 points, got {0}")]
    TooFewPoints(usize),
    #[error("points are coincident or collinear, plane is underdetermined")]
    Degenerate,
}

/// 地平面: 单位法向量 + 截距
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundPlane {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
}

impl GroundPlane {
    /// 由原始系数构造,归一化并定向;法向量为零时无平面可言
    pub fn from_coeffs(a: f32, b: f32, c: f32, d: f32) -> Option<Self> {
        let norm = (a * a + b * b + c * c).sqrt();
        if norm <= f32::EPSILON || !norm.is_finite() {
            return None;
        }
        Some(
            Self {
                a: a / norm,
                b: b / norm,
                c: c / norm,
                d: d / norm,
            }
            .oriented_toward_origin(),
        )
    }

    pub fn coeffs(&self) -> [f32; 4] {
        [self.a, self.b, self.c, self.d]
    }

    pub fn normal(&self) -> [f32; 3] {
        [self.a, self.b, self.c]
    }

    /// 点到平面的有符号距离 (法向量已单位化)
    pub fn signed_distance(&self, p: [f32; 3]) -> f32 {
        self.a * p[0] + self.b * p[1] + self.c * p[2] + self.d
    }

    /// 点在地面之上的高度 (定向约定下即有符号距离)
    pub fn height_above(&self, p: [f32; 3]) -> f32 {
        self.signed_distance(p)
    }

    /// 翻转法向量 (同一几何平面的另一侧)
    pub fn flipped(self) -> Self {
        Self {
            a: -self.a,
            b: -self.b,
            c: -self.c,
            d: -self.d,
        }
    }

    /// 两平面法向量的点积 (用于保持逐帧细化的朝向一致)
    pub fn normal_dot(&self, other: &GroundPlane) -> f32 {
        self.a * other.a + self.b * other.b + self.c * other.c
    }

    /// 固定朝向: 传感器原点的有符号距离非负
    fn oriented_toward_origin(self) -> Self {
        if self.d < 0.0 {
            self.flipped()
        } else {
            self
        }
    }
}

/// 最小二乘拟合: 返回单位法向量、已定向的平面
pub fn fit_plane(points: &[[f32; 3]]) -> Result<GroundPlane, PlaneFitError> {
    if points.len() < 3 {
        return Err(PlaneFitError::TooFewPoints(points.len()));
    }

    // f64 累加,避免大坐标下的精度损失
    let n = points.len() as f64;
    let mut centroid = Vector3::<f64>::zeros();
    for p in points {
        centroid += Vector3::new(p[0] as f64, p[1] as f64, p[2] as f64);
    }
    centroid /= n;

    let mut cov = Matrix3::<f64>::zeros();
    for p in points {
        let d = Vector3::new(p[0] as f64, p[1] as f64, p[2] as f64) - centroid;
        cov += d * d.transpose();
    }
    cov /= n;

    let eigen = SymmetricEigen::new(cov);
    let evals = eigen.eigenvalues;

    let mut min_i = 0;
    for i in 1..3 {
        if evals[i] < evals[min_i] {
            min_i = i;
        }
    }

    // 秩检查: 次小特征值相对最大特征值过小说明点共线
    let mut sorted = [evals[0], evals[1], evals[2]];
    sorted.sort_by(f64::total_cmp);
    if sorted[2] <= f64::EPSILON || sorted[1] <= sorted[2] * 1e-9 {
        return Err(PlaneFitError::Degenerate);
    }

    let normal = eigen.eigenvectors.column(min_i);
    let d = -normal.dot(&centroid);

    GroundPlane::from_coeffs(
        normal[0] as f32,
        normal[1] as f32,
        normal[2] as f32,
        d as f32,
    )
    .ok_or(PlaneFitError::Degenerate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_few_points() {
        for n in 0..3 {
            let pts: Vec<[f32; 3]> = (0..n).map(|i| [i as f32, 0.0, 0.0]).collect();
            match fit_plane(&pts) {
                Err(PlaneFitError::TooFewPoints(got)) => assert_eq!(got, n),
                other => panic!("expected TooFewPoints, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_collinear_points_degenerate() {
        let pts = [[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [2.0, 0.0, 1.0]];
        assert!(matches!(fit_plane(&pts), Err(PlaneFitError::Degenerate)));
    }

    #[test]
    fn test_floor_plane_from_three_picks() {
        // 相机坐标系 y 轴朝下,地面在相机下方 1 米: 平面 y=1
        let pts = [[0.0, 1.0, 2.0], [1.0, 1.0, 3.0], [-1.0, 1.0, 2.5]];
        let plane = fit_plane(&pts).unwrap();

        // 单位法向量
        let [a, b, c, _] = plane.coeffs();
        assert!((a * a + b * b + c * c - 1.0).abs() < 1e-5);

        // 同一几何平面: 地面点距离 0,原点高度 1
        assert!(plane.signed_distance([0.5, 1.0, 4.0]).abs() < 1e-5);
        assert!((plane.signed_distance([0.0, 0.0, 0.0]) - 1.0).abs() < 1e-5);

        // 定向约定: 头顶 (y < 1) 的高度为正
        let head = [0.0, 1.0 - 1.7, 2.0];
        assert!((plane.height_above(head) - 1.7).abs() < 1e-5);
    }

    #[test]
    fn test_noisy_plane_fit() {
        // y = 0.8 平面加 ±2mm 抖动
        let mut pts = Vec::new();
        for i in 0..20 {
            let x = (i % 5) as f32 * 0.3 - 0.6;
            let z = (i / 5) as f32 * 0.4 + 1.0;
            let noise = if i % 2 == 0 { 0.002 } else { -0.002 };
            pts.push([x, 0.8 + noise, z]);
        }
        let plane = fit_plane(&pts).unwrap();
        assert!(plane.b.abs() > 0.999);
        assert!((plane.signed_distance([0.0, 0.8, 2.0])).abs() < 0.01);
    }

    #[test]
    fn test_from_coeffs_normalizes_and_orients() {
        // 未归一化且朝向"错误"的输入
        let plane = GroundPlane::from_coeffs(0.0, 2.0, 0.0, -2.0).unwrap();
        assert!((plane.b - -1.0).abs() < 1e-6);
        assert!((plane.d - 1.0).abs() < 1e-6);
        assert!(plane.signed_distance([0.0, 0.0, 0.0]) >= 0.0);

        assert!(GroundPlane::from_coeffs(0.0, 0.0, 0.0, 1.0).is_none());
    }

    #[test]
    fn test_flip_keeps_geometry() {
        let plane = GroundPlane::from_coeffs(0.0, 1.0, 0.0, -1.0).unwrap();
        let flipped = plane.flipped();
        assert!(plane.signed_distance([0.3, 1.0, 2.0]).abs() < 1e-6);
        assert!(flipped.signed_distance([0.3, 1.0, 2.0]).abs() < 1e-6);
        assert!(plane.normal_dot(&flipped) < 0.0);
    }
}
