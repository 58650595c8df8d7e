/// 点云窗口显示 (Point Cloud Window Viewer)
///
/// 结构化点云按网格直接栅格化成 RGBA 纹理,包围盒与拾取点经针孔
/// 投影叠加。鼠标左键拾取地面点,G 键结束标定,Esc 或关窗退出。
use depth_sentinel::{CloudFrame, CloudPoint, Intrinsics, PersonCluster, Viewer, ViewerEvent};
use macroquad::prelude::*;

/// 拾取时在点击位置附近搜索有效点的半径 (像素)
const PICK_RADIUS: i32 = 6;

pub struct WindowViewer {
    intrinsics: Intrinsics,
    texture: Option<Texture2D>,
    rgba: Vec<u8>,
    points: Vec<CloudPoint>, // 最近一帧的网格点,拾取与投影用
    cloud_width: usize,
    cloud_height: usize,

    picks: Vec<[f32; 3]>,
    boxes: Vec<PersonCluster>,

    pending: Vec<ViewerEvent>,
    closed: bool,

    // 画面到屏幕的变换 (每帧 draw 时更新)
    scale: f32,
    offset: Vec2,
}

impl WindowViewer {
    pub fn new(intrinsics: Intrinsics) -> Self {
        // 关窗事件转成 Closed,由流水线决定退出
        prevent_quit();
        Self {
            intrinsics,
            texture: None,
            rgba: Vec::new(),
            points: Vec::new(),
            cloud_width: 0,
            cloud_height: 0,
            picks: Vec::new(),
            boxes: Vec::new(),
            pending: Vec::new(),
            closed: false,
            scale: 1.0,
            offset: Vec2::ZERO,
        }
    }

    /// 每个显示帧开头采集输入
    pub fn begin_frame(&mut self) {
        if is_quit_requested() || is_key_pressed(KeyCode::Escape) {
            self.closed = true;
            self.pending.push(ViewerEvent::Closed);
        }
        if is_key_pressed(KeyCode::G) {
            self.pending.push(ViewerEvent::CalibrationDone);
        }
        if is_mouse_button_pressed(MouseButton::Left) {
            let (mx, my) = mouse_position();
            if let Some(p) = self.pick_at(mx, my) {
                self.pending.push(ViewerEvent::PointPicked(p));
            }
        }
    }

    /// 屏幕坐标 → 画面像素 → 附近最近的有效点
    fn pick_at(&self, mx: f32, my: f32) -> Option<[f32; 3]> {
        if self.points.is_empty() || self.scale <= 0.0 {
            return None;
        }
        let u = ((mx - self.offset.x) / self.scale).round() as i32;
        let v = ((my - self.offset.y) / self.scale).round() as i32;

        let w = self.cloud_width as i32;
        let h = self.cloud_height as i32;
        let mut best: Option<(i32, [f32; 3])> = None;
        for dv in -PICK_RADIUS..=PICK_RADIUS {
            for du in -PICK_RADIUS..=PICK_RADIUS {
                let (cu, cv) = (u + du, v + dv);
                if cu < 0 || cv < 0 || cu >= w || cv >= h {
                    continue;
                }
                let p = &self.points[(cv * w + cu) as usize];
                if !p.is_valid() {
                    continue;
                }
                let d2 = du * du + dv * dv;
                if best.map_or(true, |(bd2, _)| d2 < bd2) {
                    best = Some((d2, p.position()));
                }
            }
        }
        best.map(|(_, p)| p)
    }

    /// 画面内 3D 点 → 屏幕坐标
    fn to_screen(&self, p: [f32; 3]) -> Option<Vec2> {
        let (u, v) = self.intrinsics.project(p)?;
        Some(vec2(
            self.offset.x + u * self.scale,
            self.offset.y + v * self.scale,
        ))
    }

    /// 渲染当前帧: 点云纹理 + 标定点 + 包围盒 + 状态栏
    pub fn draw(&mut self, status: &str) {
        clear_background(Color::from_rgba(12, 12, 20, 255));

        if let Some(texture) = &self.texture {
            // 等比缩放居中
            let base_w = texture.width();
            let base_h = texture.height();
            self.scale = (screen_width() / base_w).min(screen_height() / base_h);
            let dest = vec2(base_w * self.scale, base_h * self.scale);
            self.offset = vec2(
                (screen_width() - dest.x) / 2.0,
                (screen_height() - dest.y) / 2.0,
            );

            draw_texture_ex(
                texture,
                self.offset.x,
                self.offset.y,
                WHITE,
                DrawTextureParams {
                    dest_size: Some(dest),
                    ..Default::default()
                },
            );

            // 标定点
            for pick in &self.picks {
                if let Some(s) = self.to_screen(*pick) {
                    draw_circle_lines(s.x, s.y, 6.0, 2.0, RED);
                    draw_circle(s.x, s.y, 2.0, RED);
                }
            }

            // 人体包围盒: 12 条棱边 + 置信度标签
            for cluster in &self.boxes {
                self.draw_box_edges(cluster);
            }
        }

        draw_text(status, 10.0, 24.0, 24.0, WHITE);
    }

    fn draw_box_edges(&self, cluster: &PersonCluster) {
        let lo = cluster.min;
        let hi = cluster.max;
        let corner = |mask: usize| -> [f32; 3] {
            [
                if mask & 1 != 0 { hi[0] } else { lo[0] },
                if mask & 2 != 0 { hi[1] } else { lo[1] },
                if mask & 4 != 0 { hi[2] } else { lo[2] },
            ]
        };
        const EDGES: [(usize, usize); 12] = [
            (0, 1),
            (0, 2),
            (0, 4),
            (1, 3),
            (1, 5),
            (2, 3),
            (2, 6),
            (3, 7),
            (4, 5),
            (4, 6),
            (5, 7),
            (6, 7),
        ];
        for (a, b) in EDGES {
            if let (Some(sa), Some(sb)) = (self.to_screen(corner(a)), self.to_screen(corner(b))) {
                draw_line(sa.x, sa.y, sb.x, sb.y, 2.0, GREEN);
            }
        }
        if let Some(anchor) = self.to_screen(cluster.top_center()) {
            let label = format!("{:.2}", cluster.confidence);
            draw_text(&label, anchor.x - 14.0, anchor.y - 8.0, 20.0, GREEN);
        }
    }
}

impl Viewer for WindowViewer {
    fn show_cloud(&mut self, cloud: &CloudFrame) {
        let w = cloud.width as usize;
        let h = cloud.height as usize;
        self.cloud_width = w;
        self.cloud_height = h;
        self.points.clear();
        self.points.extend_from_slice(&cloud.points);

        // 结构化网格与像素一一对应,直接铺成 RGBA
        self.rgba.resize(w * h * 4, 0);
        for (i, p) in cloud.points.iter().enumerate() {
            let px = &mut self.rgba[i * 4..i * 4 + 4];
            if p.is_valid() {
                px[0] = p.rgb[0];
                px[1] = p.rgb[1];
                px[2] = p.rgb[2];
                px[3] = 255;
            } else {
                px.copy_from_slice(&[18, 18, 28, 255]);
            }
        }

        // 只在分辨率变化时重建纹理,否则原地更新像素
        let needs_rebuild = self
            .texture
            .as_ref()
            .map_or(true, |t| t.width() != w as f32 || t.height() != h as f32);
        if needs_rebuild {
            let texture = Texture2D::from_rgba8(w as u16, h as u16, &self.rgba);
            texture.set_filter(FilterMode::Nearest);
            self.texture = Some(texture);
        } else if let Some(texture) = &self.texture {
            texture.update(&Image {
                bytes: self.rgba.clone(),
                width: w as u16,
                height: h as u16,
            });
        }
    }

    fn show_picks(&mut self, picks: &[[f32; 3]]) {
        self.picks = picks.to_vec();
    }

    fn clear_shapes(&mut self) {
        self.boxes.clear();
    }

    fn draw_person_box(&mut self, cluster: &PersonCluster) {
        self.boxes.push(cluster.clone());
    }

    fn poll_events(&mut self) -> Vec<ViewerEvent> {
        std::mem::take(&mut self.pending)
    }

    fn was_stopped(&self) -> bool {
        self.closed
    }
}
