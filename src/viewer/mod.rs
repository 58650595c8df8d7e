/// 显示层契约 (Viewer Contract)
///
/// 主循环只通过这个契约和显示后端打交道: 窗口版 (macroquad) 与
/// 无头控制台版可互换,测试里可以换成脚本化的桩。
use crate::cloud::CloudFrame;
use crate::detection::PersonCluster;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 操作员交互事件
#[derive(Clone, Debug, PartialEq)]
pub enum ViewerEvent {
    /// 在画面上拾取了一个 3D 点 (标定用)
    PointPicked([f32; 3]),
    /// 操作员宣布标定完成 (G 键)
    CalibrationDone,
    /// 显示窗口被关闭
    Closed,
}

pub trait Viewer {
    /// 显示一帧点云
    fn show_cloud(&mut self, cloud: &CloudFrame);
    /// 高亮已拾取的标定点
    fn show_picks(&mut self, picks: &[[f32; 3]]);
    /// 清除上一帧遗留的包围盒
    fn clear_shapes(&mut self);
    /// 叠加一个人体包围盒
    fn draw_person_box(&mut self, cluster: &PersonCluster);
    /// 取走本轮积累的交互事件
    fn poll_events(&mut self) -> Vec<ViewerEvent>;
    /// 显示端是否要求停止
    fn was_stopped(&self) -> bool;
}

/// 无头模式: 不渲染,只跟随停止标志 (ctrl-c)
pub struct ConsoleViewer {
    stop: Arc<AtomicBool>,
    frames_shown: u64,
}

impl ConsoleViewer {
    pub fn new(stop: Arc<AtomicBool>) -> Self {
        Self {
            stop,
            frames_shown: 0,
        }
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }
}

impl Viewer for ConsoleViewer {
    fn show_cloud(&mut self, _cloud: &CloudFrame) {
        self.frames_shown += 1;
    }

    fn show_picks(&mut self, _picks: &[[f32; 3]]) {}

    fn clear_shapes(&mut self) {}

    fn draw_person_box(&mut self, _cluster: &PersonCluster) {}

    fn poll_events(&mut self) -> Vec<ViewerEvent> {
        Vec::new()
    }

    fn was_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_viewer_follows_stop_flag() {
        let stop = Arc::new(AtomicBool::new(false));
        let mut viewer = ConsoleViewer::new(Arc::clone(&stop));
        assert!(!viewer.was_stopped());
        assert!(viewer.poll_events().is_empty());

        viewer.show_cloud(&CloudFrame::empty(1));
        assert_eq!(viewer.frames_shown(), 1);

        stop.store(true, Ordering::Relaxed);
        assert!(viewer.was_stopped());
    }
}
