//! # 图像模块
//!
//! 批处理引擎所依赖的图像加载/保存能力。
//!
//! ## 依赖关系
//! - 被 `batch/`, `steps/`, `plugins/` 使用
//! - 子模块: codec

pub mod codec;

pub use codec::{FileCodec, ImageCodec, ImageDoc};
