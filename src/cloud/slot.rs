/// 共享帧槽位 (Shared Frame Slot)
///
/// 生产者与消费者之间的单槽缓冲: 写入总是覆盖旧帧 (保留最新,不排队),
/// fresh 标志记录"自上次消费以来是否写入过新帧"。
/// 消费者稳态用 try_claim 非阻塞认领,标定阶段用 blocking_claim 长期持有。
use super::CloudFrame;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

struct SlotState {
    cloud: Option<Arc<CloudFrame>>,
    fresh: bool,
}

/// 单槽互斥帧缓冲
pub struct SharedCloudSlot {
    state: Mutex<SlotState>,
}

/// 非阻塞认领的三种结果
pub enum TryClaim<'a> {
    /// 拿到锁且有新帧,认领成功 (fresh 已清除)
    Fresh(ClaimedCloud<'a>),
    /// 拿到锁但帧已被消费过
    NoNewFrame,
    /// 锁被占用,立即返回
    Busy,
}

/// 认领到的帧: 持有槽位锁直到 drop,期间生产者写入会阻塞
pub struct ClaimedCloud<'a> {
    cloud: Arc<CloudFrame>,
    _guard: MutexGuard<'a, SlotState>,
}

impl ClaimedCloud<'_> {
    pub fn cloud(&self) -> &CloudFrame {
        &self.cloud
    }

    /// 共享句柄 (锁释放后仍可用,用于转发)
    pub fn share(&self) -> Arc<CloudFrame> {
        Arc::clone(&self.cloud)
    }

    pub fn seq(&self) -> u64 {
        self.cloud.seq
    }
}

impl SharedCloudSlot {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                cloud: None,
                fresh: false,
            }),
        }
    }

    /// 写入新帧 (阻塞拿锁,无条件覆盖未读帧)
    pub fn write(&self, frame: Arc<CloudFrame>) {
        let mut state = self.state.lock().unwrap();
        state.cloud = Some(frame);
        state.fresh = true;
    }

    /// 非阻塞认领最新帧
    pub fn try_claim(&self) -> TryClaim<'_> {
        let guard = match self.state.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return TryClaim::Busy,
            Err(TryLockError::Poisoned(e)) => panic!("cloud slot poisoned: {}", e),
        };
        let mut guard = guard;
        match (&guard.cloud, guard.fresh) {
            (Some(cloud), true) => {
                let cloud = Arc::clone(cloud);
                guard.fresh = false;
                TryClaim::Fresh(ClaimedCloud {
                    cloud,
                    _guard: guard,
                })
            }
            _ => TryClaim::NoNewFrame,
        }
    }

    /// 阻塞认领: 只要写入过帧就返回,不清除 fresh
    /// (标定用过的帧允许被首轮稳态检测再次消费)
    pub fn blocking_claim(&self) -> Option<ClaimedCloud<'_>> {
        let guard = self.state.lock().unwrap();
        let cloud = Arc::clone(guard.cloud.as_ref()?);
        Some(ClaimedCloud {
            cloud,
            _guard: guard,
        })
    }

    /// 是否有未消费的新帧 (短暂拿锁)
    pub fn has_fresh(&self) -> bool {
        self.state.lock().unwrap().fresh
    }
}

impl Default for SharedCloudSlot {
    fn default() -> Self {
        Self::new()
    }
}
