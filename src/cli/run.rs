//! # run 子命令 CLI 定义
//!
//! 批量处理图像：缩放、旋转/翻转/裁剪、插件链
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/run.rs`

use crate::batch::collector;
use crate::batch::naming::DEFAULT_PATTERN;
use crate::steps::{Interpolation, ResizeMode, ResizePolicy};

use clap::Args;
use std::path::PathBuf;

/// run 子命令参数
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Input image files or directories
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    // ─────────────────────────────────────────────────────────────
    // 输入与输出
    // ─────────────────────────────────────────────────────────────
    /// Output directory (created if missing)
    #[arg(short, long, default_value = "processed")]
    pub output: PathBuf,

    /// Write each output next to its input instead of --output
    #[arg(long, default_value_t = false)]
    pub same_dir: bool,

    /// Output file name pattern: <c:N> base name (0 keep, 1 lower, 2 upper),
    /// <d:N[:S]> zero padded index starting at S, <old> original extension
    #[arg(short = 'n', long, default_value = DEFAULT_PATTERN)]
    pub name: String,

    /// Glob pattern for files inside input directories (comma separated)
    #[arg(long, default_value = collector::DEFAULT_PATTERN)]
    pub pattern: String,

    /// Recurse into subdirectories
    #[arg(long, default_value_t = false)]
    pub recursive: bool,

    /// Overwrite existing output files (the old file is restored if saving fails)
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,

    /// Delete the original file after it was copied or processed without failures
    #[arg(long, default_value_t = false)]
    pub delete_original: bool,

    /// Compression / quality 0-100 (JPEG quality, PNG compression level)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub compression: Option<u8>,

    // ─────────────────────────────────────────────────────────────
    // 缩放
    // ─────────────────────────────────────────────────────────────
    /// Resize target: a scale factor for --resize-mode scale, otherwise a side length in pixels
    #[arg(long)]
    pub scale: Option<f32>,

    /// How the resize target is interpreted
    #[arg(long, value_enum, default_value_t = ResizeMode::Scale)]
    pub resize_mode: ResizeMode,

    /// Only enlarge or only shrink images
    #[arg(long, value_enum, default_value_t = ResizePolicy::Always)]
    pub resize_policy: ResizePolicy,

    /// Interpolation method
    #[arg(long, value_enum, default_value_t = Interpolation::Area)]
    pub interpolation: Interpolation,

    /// Resize in linear light
    #[arg(long, default_value_t = false)]
    pub gamma_correct: bool,

    // ─────────────────────────────────────────────────────────────
    // 变换
    // ─────────────────────────────────────────────────────────────
    /// Clockwise rotation in degrees (multiple of 90)
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub rotate: i32,

    /// Mirror horizontally
    #[arg(long, default_value_t = false)]
    pub flip_h: bool,

    /// Mirror vertically
    #[arg(long, default_value_t = false)]
    pub flip_v: bool,

    /// Crop to the region stored in '<input>.crop'
    #[arg(long, default_value_t = false)]
    pub crop_from_metadata: bool,

    // ─────────────────────────────────────────────────────────────
    // 插件
    // ─────────────────────────────────────────────────────────────
    /// Plugin action as 'Plugin | Action' (repeatable, applied in order)
    #[arg(long = "plugin")]
    pub plugins: Vec<String>,

    // ─────────────────────────────────────────────────────────────
    // 执行与报告
    // ─────────────────────────────────────────────────────────────
    /// Number of parallel jobs (0 = auto)
    #[arg(short, long, default_value_t = 0, env = "IMGBATCH_JOBS")]
    pub jobs: usize,

    /// Write a CSV report with one row per file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Print the full processing log after the run
    #[arg(long, default_value_t = false)]
    pub show_log: bool,
}
