//! # 处理步骤
//!
//! 处理链由若干 `BatchStep` 组成，按配置顺序依次作用于同一张图像。
//! 步骤在整个批处理期间只读，可被多个工作线程同时共享。
//!
//! ## 依赖关系
//! - 被 `batch/config.rs`, `batch/item.rs`, `batch/runner.rs` 使用
//! - 子模块: resize, transform, plugin

pub mod plugin;
pub mod resize;
pub mod transform;

pub use plugin::PluginStep;
pub use resize::{Interpolation, ResizeMode, ResizePolicy, ResizeStep};
pub use transform::TransformStep;

use crate::batch::log::LogEvent;
use crate::imaging::ImageDoc;
use crate::plugins::BatchInfo;

use std::sync::Arc;

/// 一个步骤作用于图像后的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// 图像已被修改
    Applied,
    /// 按策略无需处理（不算失败）
    Skipped,
    /// 处理失败，图像保持失败前的状态
    Failed,
}

/// 处理步骤接口
pub trait BatchStep: Send + Sync {
    /// 日志中使用的步骤名称
    fn name(&self) -> &str;

    /// 步骤是否会产生任何效果（无副作用）
    fn is_active(&self) -> bool;

    /// 处理图像；日志和插件元数据追加到调用者提供的列表
    fn compute(
        &self,
        doc: &mut ImageDoc,
        log: &mut Vec<LogEvent>,
        batch_info: &mut Vec<BatchInfo>,
    ) -> StepOutcome;

    /// 在任何文件开始处理之前调用一次
    fn pre_load(&self) {}

    /// 整个批处理结束后调用一次，传入所有文件收集到的元数据
    fn post_load(&self, _batch_info: &[BatchInfo]) {}
}

/// 在所有批处理项之间共享的处理链
pub type StepChain = Arc<Vec<Box<dyn BatchStep>>>;
