//! # 进度条工具
//!
//! 封装 `indicatif` 提供统一的进度条样式，并把批处理的进度回调
//! 接到进度条上。
//!
//! ## 依赖关系
//! - 被 `commands/run.rs` 使用
//! - 使用 `indicatif` crate

use crate::batch::BatchObserver;

use indicatif::{ProgressBar, ProgressStyle};

/// 创建标准进度条
pub fn create_progress_bar(len: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
    ) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(message.to_string());
    pb
}

/// 由批处理回调驱动的进度条
pub struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    pub fn new(len: usize, message: &str) -> Self {
        Self {
            bar: create_progress_bar(len as u64, message),
        }
    }

    pub fn bar(&self) -> &ProgressBar {
        &self.bar
    }
}

impl BatchObserver for ProgressObserver {
    fn on_progress(&self, completed: usize) {
        self.bar.set_position(completed as u64);
    }

    fn on_finished(&self) {
        self.bar.finish_and_clear();
    }
}
