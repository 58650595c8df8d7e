/// 命令行参数 (Command Line Arguments)
use crate::detection::DetectorConfig;
use crate::ground::GroundPlane;
use anyhow::{bail, Context, Result};
use clap::Parser;

/// 深度卫兵参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "深度卫兵 - 基于地面的实时人体检测", long_about = None)]
pub struct Args {
    /// 人体分类器模型文件 (JSON)
    #[arg(long = "svm", default_value = "models/person_svm.json")]
    pub svm: String,

    /// 最小接受置信度,严格大于才算检出
    #[arg(long = "conf", default_value_t = -1.5, allow_negative_numbers = true)]
    pub min_confidence: f32,

    /// 人体最小身高 (米)
    #[arg(long = "min_h", default_value_t = 1.3)]
    pub min_height: f32,

    /// 人体最大身高 (米)
    #[arg(long = "max_h", default_value_t = 2.3)]
    pub max_height: f32,

    /// 检测器体素尺寸 (米)
    #[arg(long = "voxel", default_value_t = 0.06)]
    pub voxel_size: f32,

    /// 无头模式: 不开窗口,只有控制台输出 (需要 --ground)
    #[arg(long, default_value_t = false)]
    pub headless: bool,

    /// 预置地平面 "a,b,c,d",跳过交互标定
    #[arg(long, allow_hyphen_values = true)]
    pub ground: Option<String>,

    /// 合成深度源帧率
    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// 处理帧数上限,0 为持续运行
    #[arg(long = "max-frames", default_value_t = 0)]
    pub max_frames: u64,
}

impl Args {
    /// 检测参数 (身高与体素来自命令行,宽度与点数用内置限制)
    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            voxel_size: self.voxel_size,
            min_height: self.min_height,
            max_height: self.max_height,
            ..DetectorConfig::default()
        }
    }

    /// 解析 --ground 预置平面
    pub fn preset_ground(&self) -> Result<Option<GroundPlane>> {
        let Some(raw) = &self.ground else {
            return Ok(None);
        };
        let coeffs: Vec<f32> = raw
            .split(',')
            .map(|s| s.trim().parse::<f32>())
            .collect::<Result<_, _>>()
            .with_context(|| format!("invalid --ground value {:?}", raw))?;
        if coeffs.len() != 4 {
            bail!(
                "--ground expects 4 comma-separated coefficients, got {}",
                coeffs.len()
            );
        }
        let plane = GroundPlane::from_coeffs(coeffs[0], coeffs[1], coeffs[2], coeffs[3])
            .context("--ground normal must be non-zero")?;
        Ok(Some(plane))
    }
}
