/// 深度卫兵 (Depth Sentinel)
///
/// 基于地面平面的实时人体检测系统
///
/// 系统架构:
/// 1. 深度源线程: 射线投射生成结构化点云,按固定帧率发布到总线
/// 2. 采集线程:   总线订阅 → 共享槽位覆盖写入 + 回显转发
/// 3. 主线程:     交互标定 (一次性) → 稳态检测循环 (窗口或无头)
use anyhow::{Context, Result};
use clap::Parser;
use depth_sentinel::{
    spawn_capture, spawn_synthetic_source, Args, CalibrationStage, CalibrationStatus, CloudBus,
    ConsoleViewer, DetectionLoop, GroundBasedDetector, GroundPlane, Intrinsics, PersonClassifier,
    PipelineContext, SyntheticScene, Tick, Viewer, TOPIC_DEPTH_POINTS,
};
use macroquad::prelude::{next_frame, Conf};
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;

mod viewer3d;
use viewer3d::WindowViewer;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() {
    let args = Args::parse();

    println!("🚀 深度卫兵系统启动");
    println!("📦 分类器模型: {}", args.svm);
    println!(
        "🔍 检测参数: 置信度 > {} | 身高 {:.2}-{:.2} m | 体素 {:.3} m",
        args.min_confidence, args.min_height, args.max_height, args.voxel_size
    );
    println!("📹 深度源帧率: {} fps", args.fps);
    println!();

    let exit = if args.headless {
        run_headless(args)
    } else {
        run_windowed(args)
    };
    if let Err(e) = exit {
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }
}

/// 后台线程组: 合成深度源 + 采集线程
struct Runtime {
    ctx: PipelineContext,
    source: JoinHandle<()>,
    capture: JoinHandle<()>,
}

fn start_runtime(args: &Args) -> Result<Runtime> {
    let bus = CloudBus::new();
    let ctx = PipelineContext::new(&bus);

    // Ctrl-C → 停止标志,各线程看到后自行退出
    let stop = Arc::clone(&ctx.stop);
    ctrlc::set_handler(move || {
        println!("\n🛑 收到停止信号");
        stop.store(true, Ordering::Relaxed);
    })
    .context("安装 Ctrl-C 处理器失败")?;

    // ========== 合成深度源 ==========
    let mut scene = SyntheticScene::new(42);
    scene.walk = true;
    scene.noise_sigma = 0.004;
    let source = spawn_synthetic_source(Arc::clone(&bus), scene, args.fps, Arc::clone(&ctx.stop));

    // ========== 采集线程 ==========
    let capture = spawn_capture(
        bus.subscribe(TOPIC_DEPTH_POINTS),
        Arc::clone(&ctx.slot),
        Arc::clone(&ctx.republisher),
        Arc::clone(&ctx.stop),
    );

    Ok(Runtime {
        ctx,
        source,
        capture,
    })
}

impl Runtime {
    fn shutdown(self) {
        self.ctx.request_stop();
        let _ = self.source.join();
        let _ = self.capture.join();
        println!("✅ 流水线已停止");
    }
}

fn load_detector(args: &Args) -> Result<GroundBasedDetector> {
    let classifier = PersonClassifier::load(Path::new(&args.svm))
        .with_context(|| format!("加载分类器模型失败: {}", args.svm))?;
    Ok(GroundBasedDetector::new(args.detector_config(), classifier))
}

// ========== 无头模式 ==========

fn run_headless(args: Args) -> Result<()> {
    let ground = args
        .preset_ground()?
        .context("无头模式没有交互标定,需要用 --ground \"a b c d\" 预置地平面")?;
    let detector = load_detector(&args)?;
    let runtime = start_runtime(&args)?;

    let [a, b, c, d] = ground.coeffs();
    println!("🖥️  无头模式: 预置地平面 {:.4} {:.4} {:.4} {:.4}", a, b, c, d);

    let mut viewer = ConsoleViewer::new(Arc::clone(&runtime.ctx.stop));
    let result = {
        let mut detect = DetectionLoop::new(&runtime.ctx, detector, ground, args.min_confidence);
        detect.run(&mut viewer, args.max_frames)
    };

    runtime.shutdown();
    result
}

// ========== 窗口模式 ==========

fn window_conf() -> Conf {
    Conf {
        window_title: "深度卫兵 - Depth Sentinel".to_owned(),
        window_width: 960,
        window_height: 720,
        window_resizable: true,
        ..Default::default()
    }
}

fn run_windowed(args: Args) -> Result<()> {
    macroquad::Window::from_config(window_conf(), async move {
        if let Err(e) = window_main(args).await {
            eprintln!("❌ 窗口模式异常退出: {:#}", e);
            std::process::exit(1);
        }
    });
    Ok(())
}

async fn window_main(args: Args) -> Result<()> {
    let detector = load_detector(&args)?;
    let runtime = start_runtime(&args)?;
    let mut viewer = WindowViewer::new(Intrinsics::default());

    // ========== 标定阶段 ==========
    let ground = match calibrate(&args, &runtime.ctx, &mut viewer).await {
        Ok(ground) => ground,
        Err(e) => {
            runtime.shutdown();
            return Err(e);
        }
    };

    // ========== 稳态检测 ==========
    let result = detection_phase(&args, &runtime.ctx, detector, ground, &mut viewer).await;
    runtime.shutdown();
    result
}

/// 交互标定: 每个显示帧推进一格状态机,拾取期间槽位锁一直持有
async fn calibrate(
    args: &Args,
    ctx: &PipelineContext,
    viewer: &mut WindowViewer,
) -> Result<GroundPlane> {
    if let Some(ground) = args.preset_ground()? {
        let [a, b, c, d] = ground.coeffs();
        println!("📐 使用预置地平面: {:.4} {:.4} {:.4} {:.4}", a, b, c, d);
        return Ok(ground);
    }

    let mut stage = CalibrationStage::new(&ctx.slot);
    loop {
        viewer.begin_frame();
        let status = stage.step(viewer)?;
        let line = match status {
            CalibrationStatus::WaitingForInitialFrame => "⏳ 等待第一帧...".to_string(),
            CalibrationStatus::AwaitingPicks { picks } => {
                format!("🎯 标定: 已拾取 {} 点 | 左键拾取地面, G 键拟合", picks)
            }
            CalibrationStatus::PlaneComputed => "📐 地平面就绪".to_string(),
        };
        viewer.draw(&line);
        next_frame().await;
        if status == CalibrationStatus::PlaneComputed {
            break;
        }
    }
    stage.into_ground().context("标定结束但没有得到地平面")
}

async fn detection_phase(
    args: &Args,
    ctx: &PipelineContext,
    detector: GroundBasedDetector,
    ground: GroundPlane,
    viewer: &mut WindowViewer,
) -> Result<()> {
    let mut detect = DetectionLoop::new(ctx, detector, ground, args.min_confidence);
    let mut status = String::from("🔍 检测中...");
    loop {
        viewer.begin_frame();
        // 稳态阶段不消费交互事件,直接丢弃
        viewer.poll_events();

        if ctx.stop_requested() || viewer.was_stopped() {
            break;
        }
        if args.max_frames > 0 && detect.frames_processed() >= args.max_frames {
            println!("✅ 达到帧数上限 {},退出", args.max_frames);
            break;
        }

        if let Tick::Processed(report) = detect.tick(viewer)? {
            status = format!(
                "👥 {} 人 ({} 低于阈值) | 帧 {}",
                report.accepted, report.rejected, report.seq
            );
            if let Some(rate) = report.frame_rate {
                status.push_str(&format!(" | 📊 {:.1} Hz", rate));
            }
        }

        viewer.draw(&status);
        next_frame().await;
    }
    Ok(())
}
