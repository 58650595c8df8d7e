/// 点云消息总线 (Cloud Message Bus)
///
/// 命名主题的发布/订阅: 驱动端发布深度帧,流水线订阅;回显与结果
/// 走同一条总线的其他主题。发送一律 try_send,队列满或订阅者消失
/// 直接丢帧,绝不阻塞发布方。
use crate::cloud::CloudFrame;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ========== 主题常量 ==========

/// 深度相机入站主题
pub const TOPIC_DEPTH_POINTS: &str = "/camera/depth/points";
/// 回显主题 (每个入站帧原样转发)
pub const TOPIC_ECHO: &str = "/echo_cloud";
/// 稳态输出主题 (首个处理完成的帧到达时才开始广告)
pub const TOPIC_OUTPUT: &str = "output";

/// 每个订阅者的队列深度 (满则丢帧)
const SUBSCRIBER_QUEUE: usize = 4;

type Subscribers = Vec<Sender<Arc<CloudFrame>>>;

/// 主题注册表
pub struct CloudBus {
    topics: Mutex<HashMap<String, Subscribers>>,
}

/// 某个主题的发布句柄
pub struct CloudPublisher {
    bus: Arc<CloudBus>,
    topic: String,
}

impl CloudBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            topics: Mutex::new(HashMap::new()),
        })
    }

    /// 订阅主题,返回有界接收端
    pub fn subscribe(&self, topic: &str) -> Receiver<Arc<CloudFrame>> {
        let (tx, rx) = bounded(SUBSCRIBER_QUEUE);
        let mut topics = self.topics.lock().unwrap();
        topics.entry(topic.to_string()).or_default().push(tx);
        rx
    }

    /// 获取主题的发布句柄
    pub fn advertise(self: &Arc<Self>, topic: &str) -> CloudPublisher {
        CloudPublisher {
            bus: Arc::clone(self),
            topic: topic.to_string(),
        }
    }

    /// 向主题的所有订阅者转发一帧,断开的订阅者就地剔除
    pub fn publish(&self, topic: &str, frame: Arc<CloudFrame>) {
        let mut topics = self.topics.lock().unwrap();
        if let Some(subs) = topics.get_mut(topic) {
            subs.retain(|tx| match tx.try_send(Arc::clone(&frame)) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => true, // 丢帧,订阅关系保留
                Err(TrySendError::Disconnected(_)) => false,
            });
        }
    }

    /// 主题当前的订阅者数量
    pub fn subscriber_count(&self, topic: &str) -> usize {
        let topics = self.topics.lock().unwrap();
        topics.get(topic).map_or(0, |subs| subs.len())
    }
}

impl CloudPublisher {
    pub fn publish(&self, frame: Arc<CloudFrame>) {
        self.bus.publish(&self.topic, frame);
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}
