/// 采集线程 (Capture Worker)
///
/// 总线订阅 → 槽位覆盖写入 → 回显转发。不做过滤,不做背压:
/// 槽位的覆盖语义吸收生产端压力,消费端慢时直接丢旧帧。
use crate::cloud::slot::SharedCloudSlot;
use crate::cloud::CloudFrame;
use crate::pipeline::republish::Republisher;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// 停止标志的轮询间隔
const RECV_TIMEOUT: Duration = Duration::from_millis(100);

pub fn spawn_capture(
    rx: Receiver<Arc<CloudFrame>>,
    slot: Arc<SharedCloudSlot>,
    republisher: Arc<Republisher>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        println!("✅ 采集线程启动");
        let mut received: u64 = 0;
        loop {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            match rx.recv_timeout(RECV_TIMEOUT) {
                Ok(frame) => {
                    received += 1;
                    if received == 1 {
                        println!(
                            "✅ 采集线程收到第一帧: {}x{} ({} 个有效点)",
                            frame.width,
                            frame.height,
                            frame.valid_count()
                        );
                    }
                    // 标定持有槽位锁时,这里的写入会阻塞,
                    // 上游通道队满丢帧,生产者不受影响
                    slot.write(Arc::clone(&frame));
                    republisher.publish_echo(frame);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    println!("⚠️  深度帧通道断开,采集线程退出");
                    break;
                }
            }
        }
        println!("✅ 采集线程退出 (共接收 {} 帧)", received);
    })
}
