/// 转发器 (Republisher)
///
/// 两条互不相干的转发路径,都是 fire-and-forget:
/// - 回显: 启动即广告,每个入站帧原样转发
/// - 输出: 惰性广告,第一个处理完成的帧到达时才出现在总线上
use crate::bus::{CloudBus, CloudPublisher, TOPIC_ECHO, TOPIC_OUTPUT};
use crate::cloud::CloudFrame;
use once_cell::sync::OnceCell;
use std::sync::Arc;

pub struct Republisher {
    bus: Arc<CloudBus>,
    echo: CloudPublisher,
    output: OnceCell<CloudPublisher>,
}

impl Republisher {
    pub fn new(bus: &Arc<CloudBus>) -> Self {
        Self {
            bus: Arc::clone(bus),
            echo: bus.advertise(TOPIC_ECHO),
            output: OnceCell::new(),
        }
    }

    /// 入站帧回显 (采集线程每帧调用,不看消费端状态)
    pub fn publish_echo(&self, frame: Arc<CloudFrame>) {
        self.echo.publish(frame);
    }

    /// 稳态输出;首次调用时才广告输出主题
    pub fn publish_output(&self, frame: Arc<CloudFrame>) {
        let publisher = self.output.get_or_init(|| {
            println!("📤 输出主题上线: {}", TOPIC_OUTPUT);
            self.bus.advertise(TOPIC_OUTPUT)
        });
        publisher.publish(frame);
    }

    /// 输出主题是否已广告
    pub fn output_advertised(&self) -> bool {
        self.output.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_forwards_frames() {
        let bus = CloudBus::new();
        let rx = bus.subscribe(TOPIC_ECHO);
        let republisher = Republisher::new(&bus);

        republisher.publish_echo(CloudFrame::empty(11).shared());
        assert_eq!(rx.recv().unwrap().seq, 11);
    }

    #[test]
    fn test_output_advertised_lazily() {
        let bus = CloudBus::new();
        let rx = bus.subscribe(TOPIC_OUTPUT);
        let republisher = Republisher::new(&bus);

        assert!(!republisher.output_advertised());

        republisher.publish_output(CloudFrame::empty(1).shared());
        assert!(republisher.output_advertised());
        assert_eq!(rx.recv().unwrap().seq, 1);

        // 再次发布不重复广告
        republisher.publish_output(CloudFrame::empty(2).shared());
        assert_eq!(rx.recv().unwrap().seq, 2);
    }
}
