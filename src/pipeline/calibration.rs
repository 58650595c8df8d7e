/// 标定阶段 (Calibration Stage)
///
/// 一次性交互阶段,显式状态机:
/// WaitingForInitialFrame → AwaitingPicks → PlaneComputed
///
/// AwaitingPicks 全程持有槽位锁: 采集线程的写入被挡在门外,操作员
/// 点选时画面保持同一帧。嵌入循环反复调用 step(),每步只推进一格,
/// 窗口后端可以在两步之间刷新画面。
use crate::cloud::slot::{ClaimedCloud, SharedCloudSlot};
use crate::ground::{fit_plane, GroundPlane};
use crate::viewer::{Viewer, ViewerEvent};
use std::time::{Duration, Instant};
use thiserror::Error;

/// 拟合平面所需的最少地面点数
pub const MIN_PICKS: usize = 3;

/// 等待首帧时的提示间隔
const WAITING_LOG_INTERVAL: Duration = Duration::from_secs(2);
/// 首帧轮询的空转延时
const POLL_DELAY: Duration = Duration::from_millis(1);

/// 标定中止原因 (均为致命错误,流水线不会进入稳态)
#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("display closed before calibration finished")]
    ViewerClosed,
    #[error("stop requested before calibration finished")]
    Stopped,
}

/// step() 返回的状态快照
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalibrationStatus {
    WaitingForInitialFrame,
    AwaitingPicks { picks: usize },
    PlaneComputed,
}

enum CalState<'a> {
    WaitingForInitialFrame,
    AwaitingPicks {
        claim: ClaimedCloud<'a>,
        picks: Vec<[f32; 3]>,
    },
    PlaneComputed(GroundPlane),
}

pub struct CalibrationStage<'a> {
    slot: &'a SharedCloudSlot,
    state: CalState<'a>,
    last_waiting_log: Option<Instant>,
}

impl<'a> CalibrationStage<'a> {
    pub fn new(slot: &'a SharedCloudSlot) -> Self {
        Self {
            slot,
            state: CalState::WaitingForInitialFrame,
            last_waiting_log: None,
        }
    }

    pub fn status(&self) -> CalibrationStatus {
        match &self.state {
            CalState::WaitingForInitialFrame => CalibrationStatus::WaitingForInitialFrame,
            CalState::AwaitingPicks { picks, .. } => CalibrationStatus::AwaitingPicks {
                picks: picks.len(),
            },
            CalState::PlaneComputed(_) => CalibrationStatus::PlaneComputed,
        }
    }

    /// 标定结果 (PlaneComputed 之后才有)
    pub fn into_ground(self) -> Option<GroundPlane> {
        match self.state {
            CalState::PlaneComputed(ground) => Some(ground),
            _ => None,
        }
    }

    /// 推进一格状态机
    pub fn step<V: Viewer>(&mut self, viewer: &mut V) -> Result<CalibrationStatus, CalibrationError> {
        if viewer.was_stopped() {
            return Err(CalibrationError::Stopped);
        }

        let state = std::mem::replace(&mut self.state, CalState::WaitingForInitialFrame);
        self.state = match state {
            CalState::WaitingForInitialFrame => self.step_waiting(viewer),
            CalState::AwaitingPicks { claim, picks } => self.step_picking(viewer, claim, picks)?,
            done @ CalState::PlaneComputed(_) => done,
        };
        Ok(self.status())
    }

    /// 驱动状态机直到平面算出 (无头/测试场景用,窗口后端自行逐步调用 step)
    pub fn run<V: Viewer>(&mut self, viewer: &mut V) -> Result<GroundPlane, CalibrationError> {
        loop {
            if let CalibrationStatus::PlaneComputed = self.step(viewer)? {
                if let CalState::PlaneComputed(ground) = &self.state {
                    return Ok(*ground);
                }
            }
        }
    }

    fn step_waiting<V: Viewer>(&mut self, viewer: &mut V) -> CalState<'a> {
        if self.slot.has_fresh() {
            if let Some(claim) = self.slot.blocking_claim() {
                viewer.show_cloud(claim.cloud());
                println!(
                    "🎯 请在画面上点选至少 {} 个地面点,完成后按 G 键拟合地平面",
                    MIN_PICKS
                );
                return CalState::AwaitingPicks {
                    claim,
                    picks: Vec::new(),
                };
            }
        }
        if self
            .last_waiting_log
            .map_or(true, |t| t.elapsed() >= WAITING_LOG_INTERVAL)
        {
            println!("⏳ 尚未收到点云帧,等待深度相机...");
            self.last_waiting_log = Some(Instant::now());
        }
        std::thread::sleep(POLL_DELAY);
        CalState::WaitingForInitialFrame
    }

    fn step_picking<V: Viewer>(
        &mut self,
        viewer: &mut V,
        claim: ClaimedCloud<'a>,
        mut picks: Vec<[f32; 3]>,
    ) -> Result<CalState<'a>, CalibrationError> {
        for event in viewer.poll_events() {
            match event {
                ViewerEvent::PointPicked(p) => {
                    println!("📍 拾取地面点: {:.3} {:.3} {:.3}", p[0], p[1], p[2]);
                    picks.push(p);
                    viewer.show_picks(&picks);
                }
                ViewerEvent::CalibrationDone => {
                    if picks.len() < MIN_PICKS {
                        println!(
                            "⚠️  地面点不足: 已选 {} 个,至少需要 {} 个,请继续点选",
                            picks.len(),
                            MIN_PICKS
                        );
                        continue;
                    }
                    match fit_plane(&picks) {
                        Ok(ground) => {
                            let [a, b, c, d] = ground.coeffs();
                            println!("📐 Ground plane: {} {} {} {}", a, b, c, d);
                            // claim 在此释放,采集线程恢复写入
                            drop(claim);
                            return Ok(CalState::PlaneComputed(ground));
                        }
                        Err(e) => {
                            println!("⚠️  平面拟合失败 ({}),请重新点选地面点", e);
                            picks.clear();
                            viewer.show_picks(&picks);
                        }
                    }
                }
                ViewerEvent::Closed => return Err(CalibrationError::ViewerClosed),
            }
        }
        Ok(CalState::AwaitingPicks { claim, picks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::slot::TryClaim;
    use crate::cloud::CloudFrame;
    use crate::detection::PersonCluster;
    use std::collections::VecDeque;

    /// 按脚本逐步回放交互事件的桩
    struct ScriptedViewer {
        batches: VecDeque<Vec<ViewerEvent>>,
        shown_seqs: Vec<u64>,
        picks_highlighted: usize,
        stopped: bool,
    }

    impl ScriptedViewer {
        fn new(batches: Vec<Vec<ViewerEvent>>) -> Self {
            Self {
                batches: batches.into(),
                shown_seqs: Vec::new(),
                picks_highlighted: 0,
                stopped: false,
            }
        }
    }

    impl Viewer for ScriptedViewer {
        fn show_cloud(&mut self, cloud: &CloudFrame) {
            self.shown_seqs.push(cloud.seq);
        }
        fn show_picks(&mut self, picks: &[[f32; 3]]) {
            self.picks_highlighted = picks.len();
        }
        fn clear_shapes(&mut self) {}
        fn draw_person_box(&mut self, _cluster: &PersonCluster) {}
        fn poll_events(&mut self) -> Vec<ViewerEvent> {
            self.batches.pop_front().unwrap_or_default()
        }
        fn was_stopped(&self) -> bool {
            self.stopped
        }
    }

    fn floor_picks() -> Vec<ViewerEvent> {
        vec![
            ViewerEvent::PointPicked([0.0, 1.0, 2.0]),
            ViewerEvent::PointPicked([1.0, 1.0, 3.0]),
            ViewerEvent::PointPicked([-1.0, 1.0, 2.5]),
            ViewerEvent::CalibrationDone,
        ]
    }

    #[test]
    fn test_waits_until_first_frame() {
        let slot = SharedCloudSlot::new();
        let mut stage = CalibrationStage::new(&slot);
        let mut viewer = ScriptedViewer::new(vec![]);

        assert_eq!(
            stage.step(&mut viewer).unwrap(),
            CalibrationStatus::WaitingForInitialFrame
        );

        slot.write(CloudFrame::empty(9).shared());
        assert_eq!(
            stage.step(&mut viewer).unwrap(),
            CalibrationStatus::AwaitingPicks { picks: 0 }
        );
        assert_eq!(viewer.shown_seqs, vec![9]);
    }

    #[test]
    fn test_slot_locked_while_picking() {
        let slot = SharedCloudSlot::new();
        slot.write(CloudFrame::empty(1).shared());

        let mut stage = CalibrationStage::new(&slot);
        let mut viewer = ScriptedViewer::new(vec![]);
        stage.step(&mut viewer).unwrap();
        assert_eq!(
            stage.status(),
            CalibrationStatus::AwaitingPicks { picks: 0 }
        );

        // 标定持锁期间槽位对其他认领方表现为忙
        assert!(matches!(slot.try_claim(), TryClaim::Busy));
    }

    #[test]
    fn test_three_picks_compute_plane() {
        let slot = SharedCloudSlot::new();
        slot.write(CloudFrame::empty(1).shared());

        let mut stage = CalibrationStage::new(&slot);
        let mut viewer = ScriptedViewer::new(vec![floor_picks()]);

        stage.step(&mut viewer).unwrap(); // 认领首帧
        let status = stage.step(&mut viewer).unwrap(); // 消化整批事件
        assert_eq!(status, CalibrationStatus::PlaneComputed);

        let ground = stage.into_ground().unwrap();
        // y=1 平面,原点在正侧
        assert!(ground.signed_distance([0.5, 1.0, 4.0]).abs() < 1e-5);
        assert!((ground.signed_distance([0.0, 0.0, 0.0]) - 1.0).abs() < 1e-5);

        // 锁已释放
        assert!(matches!(slot.try_claim(), TryClaim::Fresh(_)));
    }

    #[test]
    fn test_too_few_picks_rejected_and_reprompted() {
        let slot = SharedCloudSlot::new();
        slot.write(CloudFrame::empty(1).shared());

        let premature = vec![
            ViewerEvent::PointPicked([0.0, 1.0, 2.0]),
            ViewerEvent::PointPicked([1.0, 1.0, 3.0]),
            ViewerEvent::CalibrationDone, // 只有 2 个点,应被拒绝
        ];
        let followup = vec![
            ViewerEvent::PointPicked([-1.0, 1.0, 2.5]),
            ViewerEvent::CalibrationDone,
        ];
        let mut stage = CalibrationStage::new(&slot);
        let mut viewer = ScriptedViewer::new(vec![premature, followup]);

        stage.step(&mut viewer).unwrap();
        // 拒绝后仍在点选状态,已有点保留
        assert_eq!(
            stage.step(&mut viewer).unwrap(),
            CalibrationStatus::AwaitingPicks { picks: 2 }
        );
        assert_eq!(
            stage.step(&mut viewer).unwrap(),
            CalibrationStatus::PlaneComputed
        );
    }

    #[test]
    fn test_collinear_picks_restart_picking() {
        let slot = SharedCloudSlot::new();
        slot.write(CloudFrame::empty(1).shared());

        let collinear = vec![
            ViewerEvent::PointPicked([0.0, 1.0, 1.0]),
            ViewerEvent::PointPicked([1.0, 1.0, 1.0]),
            ViewerEvent::PointPicked([2.0, 1.0, 1.0]),
            ViewerEvent::CalibrationDone,
        ];
        let mut stage = CalibrationStage::new(&slot);
        let mut viewer = ScriptedViewer::new(vec![collinear, floor_picks()]);

        stage.step(&mut viewer).unwrap();
        // 共线点拟合失败,清空重来
        assert_eq!(
            stage.step(&mut viewer).unwrap(),
            CalibrationStatus::AwaitingPicks { picks: 0 }
        );
        assert_eq!(
            stage.step(&mut viewer).unwrap(),
            CalibrationStatus::PlaneComputed
        );
    }

    #[test]
    fn test_viewer_closed_aborts() {
        let slot = SharedCloudSlot::new();
        slot.write(CloudFrame::empty(1).shared());

        let mut stage = CalibrationStage::new(&slot);
        let mut viewer = ScriptedViewer::new(vec![vec![ViewerEvent::Closed]]);

        stage.step(&mut viewer).unwrap();
        assert!(matches!(
            stage.step(&mut viewer),
            Err(CalibrationError::ViewerClosed)
        ));
    }

    #[test]
    fn test_stop_flag_aborts() {
        let slot = SharedCloudSlot::new();
        let mut stage = CalibrationStage::new(&slot);
        let mut viewer = ScriptedViewer::new(vec![]);
        viewer.stopped = true;

        assert!(matches!(
            stage.step(&mut viewer),
            Err(CalibrationError::Stopped)
        ));
    }

    #[test]
    fn test_run_drives_to_completion() {
        let slot = SharedCloudSlot::new();
        slot.write(CloudFrame::empty(1).shared());

        let mut stage = CalibrationStage::new(&slot);
        let mut viewer = ScriptedViewer::new(vec![floor_picks()]);
        let ground = stage.run(&mut viewer).unwrap();
        assert!(ground.signed_distance([0.0, 1.0, 2.0]).abs() < 1e-5);
    }
}
