/// 稳态检测循环 (Steady-State Detection Loop)
///
/// 紧轮询: 认领不到新帧立即进入下一轮,不休眠不退避。
/// 每成功认领一帧: 检测 → 重绘 → 严格大于阈值过滤 → 计数报告 →
/// 帧率统计 → 释放槽位锁 → 惰性输出转发。
/// 检测与渲染期间一直持有槽位锁,生产端写入被覆盖语义化解。
use crate::cloud::slot::TryClaim;
use crate::detection::{Detection, PeopleDetector};
use crate::ground::GroundPlane;
use crate::pipeline::stats::FrameRateMeter;
use crate::pipeline::PipelineContext;
use crate::viewer::Viewer;
use anyhow::Result;

/// 一次 tick 的结果
pub enum Tick {
    /// 处理了一帧
    Processed(FrameReport),
    /// 无新帧或槽位忙,本轮什么都没做
    Skipped,
}

/// 单帧处理报告
#[derive(Clone, Debug)]
pub struct FrameReport {
    pub seq: u64,
    pub accepted: usize,
    pub rejected: usize, // 得分不超过阈值的聚类数,与接受数一并上报
    pub confidences: Vec<f32>,
    pub frame_rate: Option<f64>, // 窗口报满时的平均帧率
}

pub struct DetectionLoop<'a, D: PeopleDetector> {
    ctx: &'a PipelineContext,
    detector: D,
    ground: GroundPlane,
    min_confidence: f32,
    meter: FrameRateMeter,
    frames_processed: u64,
}

impl<'a, D: PeopleDetector> DetectionLoop<'a, D> {
    pub fn new(
        ctx: &'a PipelineContext,
        detector: D,
        ground: GroundPlane,
        min_confidence: f32,
    ) -> Self {
        Self {
            ctx,
            detector,
            ground,
            min_confidence,
            meter: FrameRateMeter::new(),
            frames_processed: 0,
        }
    }

    /// 当前地平面 (随逐帧细化漂移)
    pub fn ground(&self) -> &GroundPlane {
        &self.ground
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// 一轮迭代
    pub fn tick<V: Viewer>(&mut self, viewer: &mut V) -> Result<Tick> {
        // 1. 非阻塞认领;拿不到就跳过,无新帧与槽位忙不作区分
        let claim = match self.ctx.slot.try_claim() {
            TryClaim::Fresh(claim) => claim,
            TryClaim::NoNewFrame | TryClaim::Busy => return Ok(Tick::Skipped),
        };

        // 2. 检测;细化后的平面作为下一帧的输入
        let Detection { clusters, ground } = self.detector.detect(claim.cloud(), &self.ground)?;
        self.ground = ground;

        // 3. 重绘: 清掉上一帧的包围盒,重新显示点云
        viewer.clear_shapes();
        viewer.show_cloud(claim.cloud());

        // 4. 置信度过滤: 严格大于阈值才算检出
        let mut accepted = 0;
        let mut rejected = 0;
        let mut confidences = Vec::with_capacity(clusters.len());
        for (i, cluster) in clusters.iter().enumerate() {
            println!("Confidence {}: {:.3}", i, cluster.confidence);
            confidences.push(cluster.confidence);
            if cluster.confidence > self.min_confidence {
                viewer.draw_person_box(cluster);
                accepted += 1;
            } else {
                rejected += 1;
            }
        }

        // 5. 人数报告 (含被阈值挡下的数量)
        println!("👥 {} people found ({} below threshold)", accepted, rejected);

        // 6. 帧率窗口
        let frame_rate = self.meter.tick();
        if let Some(rate) = frame_rate {
            println!("📊 Average framerate: {:.1} Hz", rate);
        }

        // 7. 先释放槽位锁,再转发,转发不占用生产端的写入窗口
        let seq = claim.seq();
        let frame = claim.share();
        drop(claim);
        self.ctx.republisher.publish_output(frame);

        self.frames_processed += 1;
        Ok(Tick::Processed(FrameReport {
            seq,
            accepted,
            rejected,
            confidences,
            frame_rate,
        }))
    }

    /// 紧轮询直到停止标志、显示端关闭或达到帧数上限 (0 为不限)
    pub fn run<V: Viewer>(&mut self, viewer: &mut V, max_frames: u64) -> Result<()> {
        println!(
            "🔍 检测循环启动: 置信度阈值 {} (严格大于才接受)",
            self.min_confidence
        );
        loop {
            if self.ctx.stop_requested() || viewer.was_stopped() {
                println!("✅ 检测循环退出 (共处理 {} 帧)", self.frames_processed);
                return Ok(());
            }
            if max_frames > 0 && self.frames_processed >= max_frames {
                println!("✅ 达到帧数上限 {},检测循环退出", max_frames);
                return Ok(());
            }
            self.tick(viewer)?;
        }
    }
}
