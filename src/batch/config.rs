//! # 批处理配置
//!
//! 一次批处理运行的完整描述：输入文件、输出目录、命名模式、
//! 覆盖模式、压缩参数与处理链。校验通过后不再修改。
//!
//! ## 依赖关系
//! - 被 `batch/runner.rs`, `commands/run.rs` 使用
//! - 使用 `batch/naming.rs` 校验命名模式

use super::naming::FileNameConverter;
use crate::error::{BatchError, Result};
use crate::steps::{BatchStep, StepChain};

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 输出文件已存在时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwriteMode {
    #[default]
    SkipExisting,
    Overwrite,
}

/// 批处理配置
#[derive(Clone)]
pub struct BatchConfig {
    files: Vec<PathBuf>,
    output_dir: PathBuf,
    pattern: String,
    mode: OverwriteMode,
    delete_original: bool,
    input_dir_is_output_dir: bool,
    compression: Option<u8>,
    steps: StepChain,
}

impl BatchConfig {
    pub fn new(files: Vec<PathBuf>, output_dir: impl Into<PathBuf>, pattern: &str) -> Self {
        Self {
            files,
            output_dir: output_dir.into(),
            pattern: pattern.to_string(),
            mode: OverwriteMode::default(),
            delete_original: false,
            input_dir_is_output_dir: false,
            compression: None,
            steps: Arc::new(Vec::new()),
        }
    }

    pub fn with_mode(mut self, mode: OverwriteMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_delete_original(mut self, delete_original: bool) -> Self {
        self.delete_original = delete_original;
        self
    }

    /// 输出写到每个输入文件所在目录
    pub fn with_input_dir_as_output(mut self, enabled: bool) -> Self {
        self.input_dir_is_output_dir = enabled;
        self
    }

    /// 0-100，`None` 使用编码器默认值
    pub fn with_compression(mut self, compression: Option<u8>) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_steps(mut self, steps: Vec<Box<dyn BatchStep>>) -> Self {
        self.steps = Arc::new(steps);
        self
    }

    /// 校验配置；输出目录不存在时会被创建
    pub fn validate(&self) -> Result<()> {
        if !self.input_dir_is_output_dir {
            if self.output_dir.as_os_str().is_empty() {
                return Err(BatchError::OutputDirUnusable {
                    path: String::new(),
                    source: None,
                });
            }

            if !self.output_dir.is_dir() {
                fs::create_dir_all(&self.output_dir).map_err(|e| {
                    BatchError::OutputDirUnusable {
                        path: self.output_dir.display().to_string(),
                        source: Some(e),
                    }
                })?;
            }
        }

        if self.files.is_empty() {
            return Err(BatchError::EmptyFileList);
        }

        FileNameConverter::new(&self.pattern)?;

        if let Some(c) = self.compression {
            if c > 100 {
                return Err(BatchError::InvalidArgument(format!(
                    "compression must be within 0..=100, got {}",
                    c
                )));
            }
        }

        Ok(())
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn mode(&self) -> OverwriteMode {
        self.mode
    }

    pub fn delete_original(&self) -> bool {
        self.delete_original
    }

    pub fn input_dir_is_output_dir(&self) -> bool {
        self.input_dir_is_output_dir
    }

    pub fn compression(&self) -> Option<u8> {
        self.compression
    }

    pub fn steps(&self) -> &StepChain {
        &self.steps
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let steps: Vec<&str> = self.steps.iter().map(|s| s.name()).collect();
        f.debug_struct("BatchConfig")
            .field("files", &self.files.len())
            .field("output_dir", &self.output_dir)
            .field("pattern", &self.pattern)
            .field("mode", &self.mode)
            .field("delete_original", &self.delete_original)
            .field("input_dir_is_output_dir", &self.input_dir_is_output_dir)
            .field("compression", &self.compression)
            .field("steps", &steps)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_creates_output_dir() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("nested").join("out");
        let config = BatchConfig::new(vec![PathBuf::from("a.png")], &out, "<c:0>.<old>");

        config.validate().unwrap();
        assert!(out.is_dir());
    }

    #[test]
    fn test_validate_rejects_empty_inputs() {
        let dir = TempDir::new().unwrap();

        let config = BatchConfig::new(vec![], dir.path(), "<c:0>.<old>");
        assert!(matches!(config.validate(), Err(BatchError::EmptyFileList)));

        let config = BatchConfig::new(vec![PathBuf::from("a.png")], dir.path(), "");
        assert!(matches!(config.validate(), Err(BatchError::EmptyPattern)));

        let config = BatchConfig::new(vec![PathBuf::from("a.png")], "", "<c:0>");
        assert!(matches!(
            config.validate(),
            Err(BatchError::OutputDirUnusable { .. })
        ));
    }

    #[test]
    fn test_validate_uncreatable_output_dir() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();

        let config = BatchConfig::new(vec![PathBuf::from("a.png")], blocker.join("out"), "<c:0>");
        assert!(matches!(
            config.validate(),
            Err(BatchError::OutputDirUnusable { .. })
        ));
    }

    #[test]
    fn test_same_dir_does_not_need_output_dir() {
        let config = BatchConfig::new(vec![PathBuf::from("a.png")], "", "<c:0>_small")
            .with_input_dir_as_output(true);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_compression_out_of_range() {
        let dir = TempDir::new().unwrap();
        let config = BatchConfig::new(vec![PathBuf::from("a.png")], dir.path(), "<c:0>")
            .with_compression(Some(150));
        assert!(matches!(
            config.validate(),
            Err(BatchError::InvalidArgument(_))
        ));
    }
}
