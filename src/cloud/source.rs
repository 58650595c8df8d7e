/// 合成深度相机 (Synthetic Depth Camera)
///
/// 逐像素投射针孔射线,与地面和人形盒求交,生成结构化 640x480 点云帧。
/// 作为真实传感器驱动的替身,供演示程序和端到端测试使用。
use super::{CloudFrame, CloudPoint, Intrinsics, COLS, ROWS};
use crate::bus::{CloudBus, TOPIC_DEPTH_POINTS};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// 站立在地面上的人形盒 (轴对齐)
#[derive(Clone, Copy, Debug)]
pub struct PersonBox {
    pub center_x: f32, // 横向位置 (米)
    pub center_z: f32, // 距相机深度 (米)
    pub width: f32,    // 水平方向尺寸
    pub height: f32,   // 身高
}

impl Default for PersonBox {
    fn default() -> Self {
        Self {
            center_x: 0.0,
            center_z: 3.0,
            width: 0.6,
            height: 1.7,
        }
    }
}

/// 射线投射场景: 相机在原点,y 轴朝下,地面在相机下方 floor_y 米
pub struct SyntheticScene {
    pub intrinsics: Intrinsics,
    pub floor_y: f32,
    pub person: Option<PersonBox>,
    pub noise_sigma: f32, // 深度抖动幅度,0 为无噪声
    pub walk: bool,       // 人物横向往返运动 (演示用)
    rng: StdRng,
    seq: u64,
}

impl SyntheticScene {
    pub fn new(seed: u64) -> Self {
        Self {
            intrinsics: Intrinsics::default(),
            floor_y: 1.4,
            person: Some(PersonBox::default()),
            noise_sigma: 0.0,
            walk: false,
            rng: StdRng::seed_from_u64(seed),
            seq: 0,
        }
    }

    /// 生成下一帧 (seq 单调递增)
    pub fn next_frame(&mut self) -> CloudFrame {
        self.seq += 1;
        if self.walk {
            if let Some(person) = &mut self.person {
                person.center_x = 0.8 * (self.seq as f32 * 0.05).sin();
            }
        }

        let mut points = Vec::with_capacity(COLS * ROWS);
        for row in 0..ROWS {
            for col in 0..COLS {
                points.push(self.cast(col as f32, row as f32));
            }
        }
        CloudFrame::from_points(COLS as u32, ROWS as u32, points, self.seq)
    }

    /// 单像素射线与场景求交,取最近命中
    fn cast(&mut self, col: f32, row: f32) -> CloudPoint {
        let dir = self.intrinsics.ray(col, row);

        let mut nearest: Option<(f32, [u8; 3])> = None;

        // 地面: y = floor_y,只有朝下的射线会命中
        if dir[1] > 1e-6 {
            let t = self.floor_y / dir[1];
            if t > 0.0 {
                // 棋盘格纹理,便于肉眼确认地面
                let x = dir[0] * t;
                let z = dir[2] * t;
                let checker = ((x.floor() as i64 + z.floor() as i64) & 1) == 0;
                let shade = if checker { 95 } else { 115 };
                nearest = Some((t, [shade, shade, shade + 10]));
            }
        }

        // 人形盒 (slab 求交)
        if let Some(person) = &self.person {
            let half = person.width / 2.0;
            let lo = [
                person.center_x - half,
                self.floor_y - person.height,
                person.center_z - half,
            ];
            let hi = [person.center_x + half, self.floor_y, person.center_z + half];
            if let Some(t) = ray_box(dir, lo, hi) {
                if nearest.map_or(true, |(tn, _)| t < tn) {
                    nearest = Some((t, [205, 120, 80]));
                }
            }
        }

        match nearest {
            Some((mut t, rgb)) => {
                if self.noise_sigma > 0.0 {
                    t += self.rng.gen_range(-self.noise_sigma..=self.noise_sigma);
                }
                CloudPoint::new(dir[0] * t, dir[1] * t, dir[2] * t, rgb)
            }
            None => CloudPoint::INVALID, // 天空,无深度
        }
    }
}

/// 射线与轴对齐盒求交,返回最近的正向命中距离
fn ray_box(dir: [f32; 3], lo: [f32; 3], hi: [f32; 3]) -> Option<f32> {
    let mut t_min = 0.0f32;
    let mut t_max = f32::INFINITY;
    for axis in 0..3 {
        if dir[axis].abs() < 1e-9 {
            if lo[axis] > 0.0 || hi[axis] < 0.0 {
                return None; // 射线起点在原点,平行且在 slab 之外
            }
            continue;
        }
        let inv = 1.0 / dir[axis];
        let (t0, t1) = {
            let ta = lo[axis] * inv;
            let tb = hi[axis] * inv;
            if ta < tb {
                (ta, tb)
            } else {
                (tb, ta)
            }
        };
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_min > t_max {
            return None;
        }
    }
    if t_min > 0.0 {
        Some(t_min)
    } else {
        None
    }
}

/// 独立线程按固定帧率向总线发布合成帧,直到停止标志置位
pub fn spawn_synthetic_source(
    bus: Arc<CloudBus>,
    mut scene: SyntheticScene,
    fps: u32,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    let publisher = bus.advertise(TOPIC_DEPTH_POINTS);
    thread::spawn(move || {
        println!("📹 合成深度源启动: {} fps", fps);
        let interval = Duration::from_secs_f64(1.0 / fps.max(1) as f64);
        while !stop.load(Ordering::Relaxed) {
            let frame = scene.next_frame();
            publisher.publish(frame.shared());
            thread::sleep(interval);
        }
        println!("✅ 合成深度源退出");
    })
}
