//! # 统一错误处理模块
//!
//! 定义 imgbatch 的所有错误类型，使用 `thiserror` 派生。
//!
//! 单个文件的处理失败不会以错误形式向上传播，而是记录在
//! `BatchItem` 的日志与失败计数中；这里的错误只用于配置校验、
//! 命令层以及调用约定被破坏的情况。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// imgbatch 统一错误类型
#[derive(Error, Debug)]
pub enum BatchError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to rename {from} -> {to}")]
    RenameError {
        from: String,
        to: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy {from} -> {to}")]
    CopyError {
        from: String,
        to: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove file: {path}")]
    RemoveError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Back-up file already exists: {path}")]
    BackupExists { path: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 图像编解码错误
    // ─────────────────────────────────────────────────────────────
    #[error("Image codec error for {path}: {source}")]
    ImageError {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    // ─────────────────────────────────────────────────────────────
    // 配置错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No input files given")]
    EmptyFileList,

    #[error("Output file name pattern is empty")]
    EmptyPattern,

    #[error("Output directory cannot be used: {path}")]
    OutputDirUnusable {
        path: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Invalid file name pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid plugin descriptor '{0}' (expected 'plugin | action')")]
    InvalidPluginDescriptor(String),

    // ─────────────────────────────────────────────────────────────
    // 执行错误
    // ─────────────────────────────────────────────────────────────
    #[error("Batch item already processed: {path}")]
    AlreadyProcessed { path: String },

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    // ─────────────────────────────────────────────────────────────
    // CSV 错误
    // ─────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    // ─────────────────────────────────────────────────────────────
    // 其他
    // ─────────────────────────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

impl BatchError {
    /// 包含底层原因的完整描述
    pub fn describe(&self) -> String {
        let mut text = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            let cause_text = cause.to_string();
            if !text.contains(&cause_text) {
                text.push_str(": ");
                text.push_str(&cause_text);
            }
            source = std::error::Error::source(cause);
        }
        text
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, BatchError>;
