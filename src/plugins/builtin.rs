//! # 内置插件
//!
//! - `Color`（基础插件）：`Grayscale`, `Invert`
//! - `Statistics`（批处理插件）：`Brightness` 记录每张图像的平均亮度，
//!   批处理结束后汇总
//!
//! ## 依赖关系
//! - 被 `plugins/mod.rs` 注册
//! - 使用 `image` crate

use super::{BasicPlugin, BatchInfo, BatchPlugin, PluginOutput};

use image::DynamicImage;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

const GRAYSCALE_RUN_ID: &str = "color.grayscale";
const INVERT_RUN_ID: &str = "color.invert";
const BRIGHTNESS_RUN_ID: &str = "statistics.brightness";

/// 颜色处理插件
#[derive(Debug, Default, Clone, Copy)]
pub struct ColorPlugin;

impl BasicPlugin for ColorPlugin {
    fn name(&self) -> &str {
        "Color"
    }

    fn actions(&self) -> Vec<String> {
        vec!["Grayscale".to_string(), "Invert".to_string()]
    }

    fn run_id(&self, action: &str) -> Option<String> {
        match action {
            "Grayscale" => Some(GRAYSCALE_RUN_ID.to_string()),
            "Invert" => Some(INVERT_RUN_ID.to_string()),
            _ => None,
        }
    }

    fn run(&self, run_id: &str, image: &DynamicImage) -> Option<DynamicImage> {
        match run_id {
            GRAYSCALE_RUN_ID => Some(image.grayscale()),
            INVERT_RUN_ID => {
                let mut inverted = image.clone();
                inverted.invert();
                Some(inverted)
            }
            _ => None,
        }
    }
}

/// 单张图像的亮度采样
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrightnessSample {
    /// 平均亮度 (0-255)
    pub mean: f64,
}

/// 一次批处理的亮度汇总
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrightnessSummary {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// 亮度统计插件
#[derive(Debug, Default)]
pub struct StatisticsPlugin {
    summary: Mutex<Option<BrightnessSummary>>,
}

impl StatisticsPlugin {
    /// 最近一次批处理的汇总
    pub fn summary(&self) -> Option<BrightnessSummary> {
        *self.summary.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn mean_brightness(image: &DynamicImage) -> f64 {
        let luma = image.to_luma8();
        let pixels = luma.as_raw();
        if pixels.is_empty() {
            return 0.0;
        }
        pixels.iter().map(|&v| v as f64).sum::<f64>() / pixels.len() as f64
    }
}

impl BatchPlugin for StatisticsPlugin {
    fn name(&self) -> &str {
        "Statistics"
    }

    fn actions(&self) -> Vec<String> {
        vec!["Brightness".to_string()]
    }

    fn run_id(&self, action: &str) -> Option<String> {
        (action == "Brightness").then(|| BRIGHTNESS_RUN_ID.to_string())
    }

    fn pre_load(&self) {
        *self.summary.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn run(&self, run_id: &str, image: &DynamicImage, source: &Path) -> PluginOutput {
        let sample = BrightnessSample {
            mean: Self::mean_brightness(image),
        };

        PluginOutput {
            image: Some(image.clone()),
            info: Some(BatchInfo::new(run_id, source, sample)),
        }
    }

    fn post_load(&self, infos: &[BatchInfo]) {
        let samples: Vec<f64> = infos
            .iter()
            .filter_map(|info| {
                let sample = info.payload::<BrightnessSample>()?;
                debug!(file = %info.file_path().display(), mean = sample.mean, "brightness sample");
                Some(sample.mean)
            })
            .collect();

        if samples.is_empty() {
            return;
        }

        let summary = BrightnessSummary {
            count: samples.len(),
            mean: samples.iter().sum::<f64>() / samples.len() as f64,
            min: samples.iter().copied().fold(f64::INFINITY, f64::min),
            max: samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        };

        info!(
            count = summary.count,
            mean = summary.mean,
            min = summary.min,
            max = summary.max,
            "brightness statistics"
        );
        *self.summary.lock().unwrap_or_else(|e| e.into_inner()) = Some(summary);
    }
}
