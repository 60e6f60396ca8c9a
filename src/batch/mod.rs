//! # 批处理引擎
//!
//! 将一组输入文件按配置的处理链转换为输出文件。
//!
//! ## 功能
//! - 输入文件收集与输出文件命名
//! - 单文件状态机：跳过、重命名、复制或完整处理
//! - 覆盖输出时的备份与恢复
//! - 并行执行、取消与进度反馈
//!
//! ## 依赖关系
//! - 被 `commands/run.rs` 使用
//! - 使用 `steps/`, `imaging/`, `plugins/`
//! - 使用 `rayon` 进行并行处理

pub mod backup;
pub mod collector;
pub mod config;
pub mod item;
pub mod log;
pub mod naming;
pub mod runner;

pub use collector::FileCollector;
pub use config::{BatchConfig, OverwriteMode};
pub use item::BatchItem;
pub use runner::{BatchObserver, BatchRunner, ItemStatus};
