//! # 单文件批处理项
//!
//! 一个输入/输出文件对的完整处理流程。`compute()` 只能调用一次，
//! 依次决定跳过、重命名、复制还是完整处理，并在覆盖输出时使用备份保护。
//!
//! ## 流程
//! 1. 输出已存在且为跳过模式 -> 记为失败，结束
//! 2. 输入不存在 -> 记为失败，结束
//! 3. 输入即输出且没有处理步骤 -> 无事可做，记为失败
//! 4. 没有处理步骤、扩展名相同、同一目录且要求删除原文件 -> 重命名
//! 5. 没有处理步骤、扩展名相同 -> 复制（成功后按需删除原文件）
//! 6. 其他 -> 加载、执行处理链、备份、保存、收尾
//!
//! ## 依赖关系
//! - 被 `batch/runner.rs` 使用
//! - 使用 `batch/backup.rs`, `steps/`, `imaging/`

use super::backup::{self, FinalizeOutcome};
use super::config::OverwriteMode;
use super::log::LogEvent;
use crate::error::{BatchError, Result};
use crate::imaging::ImageCodec;
use crate::plugins::BatchInfo;
use crate::steps::{StepChain, StepOutcome};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// 批处理项的终止状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    NotStarted,
    SkippedExists,
    SkippedNoOp,
    InputMissing,
    SkippedDuplicate,
    Renamed,
    Copied,
    Processed,
}

/// 单文件批处理项
pub struct BatchItem {
    input: PathBuf,
    output: PathBuf,
    mode: OverwriteMode,
    delete_original: bool,
    compression: Option<u8>,
    steps: StepChain,
    codec: Arc<dyn ImageCodec>,

    backup_name: fn(&Path) -> PathBuf,

    state: ItemState,
    log: Vec<LogEvent>,
    failures: u32,
    backup: Option<PathBuf>,
    batch_info: Vec<BatchInfo>,
}

impl BatchItem {
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        steps: StepChain,
        codec: Arc<dyn ImageCodec>,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            mode: OverwriteMode::default(),
            delete_original: false,
            compression: None,
            steps,
            codec,
            backup_name: backup::backup_path_for,
            state: ItemState::NotStarted,
            log: Vec::new(),
            failures: 0,
            backup: None,
            batch_info: Vec::new(),
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

    pub fn with_compression(mut self, compression: Option<u8>) -> Self {
        self.compression = compression;
        self
    }

    #[cfg(test)]
    fn with_backup_name(mut self, backup_name: fn(&Path) -> PathBuf) -> Self {
        self.backup_name = backup_name;
        self
    }

    /// 输出路径与前面的批处理项重复：记为失败，不再执行
    pub fn mark_duplicate(&mut self, first_input: &Path) {
        if self.was_processed() {
            return;
        }
        self.state = ItemState::SkippedDuplicate;
        self.fail(LogEvent::DuplicateOutput {
            output: self.output.clone(),
            first_input: first_input.to_path_buf(),
        });
    }

    /// 执行处理流程，返回是否成功
    ///
    /// 第二次调用返回 `BatchError::AlreadyProcessed`，不会重复执行。
    pub fn compute(&mut self) -> Result<bool> {
        if self.was_processed() {
            return Err(BatchError::AlreadyProcessed {
                path: self.input.display().to_string(),
            });
        }

        debug!(input = %self.input.display(), output = %self.output.display(), "computing item");

        if self.output.exists() && self.mode == OverwriteMode::SkipExisting {
            self.state = ItemState::SkippedExists;
            self.fail(LogEvent::OutputExists {
                output: self.output.clone(),
            });
        } else if !self.input.exists() {
            self.state = ItemState::InputMissing;
            self.fail(LogEvent::InputMissing {
                input: self.input.clone(),
            });
        } else if self.input == self.output && self.steps.is_empty() {
            self.state = ItemState::SkippedNoOp;
            self.fail(LogEvent::NothingToDo);
        } else if self.steps.is_empty() && self.same_extension() {
            if self.delete_original && self.input.parent() == self.output.parent() {
                self.state = ItemState::Renamed;
                if !self.rename_file() {
                    self.failures += 1;
                }
            } else {
                self.state = ItemState::Copied;
                if self.copy_file() {
                    self.delete_original_file();
                } else {
                    self.failures += 1;
                }
            }
        } else {
            self.state = ItemState::Processed;
            self.process();
        }

        Ok(!self.has_failed())
    }

    fn process(&mut self) {
        self.log.push(LogEvent::Processing {
            input: self.input.clone(),
        });

        let mut doc = match self.codec.load(&self.input) {
            Ok(doc) if !doc.is_null() => doc,
            Ok(_) => {
                self.fail(LogEvent::LoadFailed {
                    reason: "image is empty".to_string(),
                });
                return;
            }
            Err(e) => {
                self.fail(LogEvent::LoadFailed {
                    reason: e.describe(),
                });
                return;
            }
        };

        let steps = Arc::clone(&self.steps);
        for step in steps.iter() {
            if !step.is_active() {
                self.log.push(LogEvent::StepInactive {
                    step: step.name().to_string(),
                });
                continue;
            }

            let outcome = step.compute(&mut doc, &mut self.log, &mut self.batch_info);
            if outcome == StepOutcome::Failed {
                self.fail(LogEvent::StepFailed {
                    step: step.name().to_string(),
                });
            }
        }

        if !self.prepare_backup() {
            self.failures += 1;
            return;
        }

        let saved = match self.codec.save(&doc.image, &self.output, self.compression) {
            Ok(()) => {
                self.log.push(LogEvent::Saved {
                    output: self.output.clone(),
                });
                true
            }
            Err(e) => {
                self.fail(LogEvent::SaveFailed {
                    output: self.output.clone(),
                    reason: e.describe(),
                });
                false
            }
        };

        if !self.finalize_backup(saved) {
            self.failures += 1;
            return;
        }

        self.delete_original_file();
    }

    fn rename_file(&mut self) -> bool {
        if !self.prepare_backup() {
            return false;
        }

        let renamed = fs::rename(&self.input, &self.output).map_err(|e| BatchError::RenameError {
            from: self.input.display().to_string(),
            to: self.output.display().to_string(),
            source: e,
        });

        let ok = match renamed {
            Ok(()) => {
                self.log.push(LogEvent::Renamed {
                    from: self.input.clone(),
                    to: self.output.clone(),
                });
                true
            }
            Err(e) => {
                self.log.push(LogEvent::RenameFailed {
                    reason: e.describe(),
                });
                false
            }
        };

        self.finalize_backup(ok) && ok
    }

    fn copy_file(&mut self) -> bool {
        if !self.prepare_backup() {
            return false;
        }

        let copied = fs::copy(&self.input, &self.output).map_err(|e| BatchError::CopyError {
            from: self.input.display().to_string(),
            to: self.output.display().to_string(),
            source: e,
        });

        let ok = match copied {
            Ok(_) => {
                self.log.push(LogEvent::Copied {
                    from: self.input.clone(),
                    to: self.output.clone(),
                });
                true
            }
            Err(e) => {
                self.log.push(LogEvent::CopyFailed {
                    from: self.input.clone(),
                    to: self.output.clone(),
                    reason: e.describe(),
                });
                false
            }
        };

        self.finalize_backup(ok) && ok
    }

    /// 仅在覆盖模式下，将已存在的输出移到备份位置
    fn prepare_backup(&mut self) -> bool {
        if self.mode != OverwriteMode::Overwrite {
            return true;
        }

        match backup::prepare(&self.output, self.backup_name) {
            Ok(backup) => {
                self.backup = backup;
                true
            }
            Err(BatchError::BackupExists { path }) => {
                self.log.push(LogEvent::BackupExists {
                    backup: PathBuf::from(path),
                });
                false
            }
            Err(e) => {
                self.log.push(LogEvent::BackupFailed {
                    output: self.output.clone(),
                    reason: e.describe(),
                });
                false
            }
        }
    }

    /// 写入失败且没有备份时删除残留输出；有备份时交给 `backup::finalize`
    fn finalize_backup(&mut self, written: bool) -> bool {
        if !written && self.backup.is_none() {
            self.discard_partial_output();
        }

        match backup::finalize(&self.output, self.backup.as_deref(), written) {
            FinalizeOutcome::Untouched | FinalizeOutcome::Discarded => {
                self.backup = None;
                true
            }
            FinalizeOutcome::Restored => {
                self.backup = None;
                self.log.push(LogEvent::Restored {
                    output: self.output.clone(),
                });
                true
            }
            FinalizeOutcome::DiscardFailed(e) => {
                self.log.push(LogEvent::BackupRemoveFailed {
                    backup: self.backup.clone().unwrap_or_default(),
                    reason: e.describe(),
                });
                false
            }
            FinalizeOutcome::RestoreFailed(e) => {
                self.log.push(LogEvent::RestoreFailed {
                    backup: self.backup.clone().unwrap_or_default(),
                    reason: e.describe(),
                });
                false
            }
        }
    }

    /// 新建输出写入失败后删除残留文件
    fn discard_partial_output(&self) {
        if self.output.exists() {
            if let Err(e) = fs::remove_file(&self.output) {
                warn!(output = %self.output.display(), "could not remove partial output: {}", e);
            }
        }
    }

    fn delete_original_file(&mut self) {
        if !self.delete_original || self.input == self.output {
            return;
        }

        if self.failures > 0 {
            self.log.push(LogEvent::OriginalKept {
                failures: self.failures,
            });
            return;
        }

        match fs::remove_file(&self.input) {
            Ok(()) => self.log.push(LogEvent::OriginalDeleted {
                path: self.input.clone(),
            }),
            Err(e) => self.fail(LogEvent::OriginalDeleteFailed {
                path: self.input.clone(),
                reason: e.to_string(),
            }),
        }
    }

    fn fail(&mut self, event: LogEvent) {
        self.log.push(event);
        self.failures += 1;
    }

    fn same_extension(&self) -> bool {
        self.input.extension() == self.output.extension()
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn state(&self) -> ItemState {
        self.state
    }

    pub fn log(&self) -> &[LogEvent] {
        &self.log
    }

    /// 渲染后的日志行
    pub fn log_lines(&self) -> Vec<String> {
        self.log.iter().map(|e| e.to_string()).collect()
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn has_failed(&self) -> bool {
        self.failures != 0
    }

    pub fn was_processed(&self) -> bool {
        self.state != ItemState::NotStarted
    }

    /// 无法恢复时残留的备份位置
    pub fn backup_path(&self) -> Option<&Path> {
        self.backup.as_deref()
    }

    pub fn batch_info(&self) -> &[BatchInfo] {
        &self.batch_info
    }
}
