//! # 批处理日志事件
//!
//! 核心逻辑只记录结构化事件（类型 + 参数），显示用的文本由 `Display`
//! 统一生成，宿主可以自行替换格式化方式。
//!
//! ## 依赖关系
//! - 被 `batch/item.rs`, `steps/` 使用
//! - 被 `batch/runner.rs` 渲染为字符串

use std::fmt;
use std::path::PathBuf;

/// 步骤判定为无需执行的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// 缩放因子为 1
    ScaleFactorOne,
    /// 需要放大，但策略为只缩小
    WouldIncrease,
    /// 需要缩小，但策略为只放大
    WouldDecrease,
    /// 图像尺寸已符合目标
    SizeMatches,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ScaleFactorOne => write!(f, "scale factor is 1 -> ignoring"),
            SkipReason::WouldIncrease => write!(
                f,
                "I need to increase the image, but the option is set to decrease only -> skipping"
            ),
            SkipReason::WouldDecrease => write!(
                f,
                "I need to decrease the image, but the option is set to increase only -> skipping"
            ),
            SkipReason::SizeMatches => write!(f, "image size matches scale factor -> skipping"),
        }
    }
}

/// 单个批处理项产生的日志事件
#[derive(Debug, Clone, PartialEq)]
pub enum LogEvent {
    // ─────────────────────────────────────────────────────────────
    // 前置检查
    // ─────────────────────────────────────────────────────────────
    OutputExists { output: PathBuf },
    InputMissing { input: PathBuf },
    NothingToDo,
    DuplicateOutput { output: PathBuf, first_input: PathBuf },

    // ─────────────────────────────────────────────────────────────
    // 重命名 / 复制 / 删除原文件
    // ─────────────────────────────────────────────────────────────
    Renamed { from: PathBuf, to: PathBuf },
    RenameFailed { reason: String },
    Copied { from: PathBuf, to: PathBuf },
    CopyFailed { from: PathBuf, to: PathBuf, reason: String },
    OriginalDeleted { path: PathBuf },
    OriginalDeleteFailed { path: PathBuf, reason: String },
    OriginalKept { failures: u32 },

    // ─────────────────────────────────────────────────────────────
    // 处理链
    // ─────────────────────────────────────────────────────────────
    Processing { input: PathBuf },
    LoadFailed { reason: String },
    StepInactive { step: String },
    StepSkipped { step: String, reason: SkipReason },
    Resized { step: String, scale_factor: f32 },
    ResizedToSide { step: String, side: u32 },
    Transformed { step: String, cropped: bool },
    PluginFailed { step: String, plugin: String },
    PluginsApplied { step: String },
    StepError { step: String, message: String },
    StepFailed { step: String },

    // ─────────────────────────────────────────────────────────────
    // 保存与备份
    // ─────────────────────────────────────────────────────────────
    Saved { output: PathBuf },
    SaveFailed { output: PathBuf, reason: String },
    BackupExists { backup: PathBuf },
    BackupFailed { output: PathBuf, reason: String },
    BackupRemoveFailed { backup: PathBuf, reason: String },
    Restored { output: PathBuf },
    RestoreFailed { backup: PathBuf, reason: String },
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogEvent::OutputExists { output } => write!(
                f,
                "{} already exists -> skipping (check 'overwrite' if you want to overwrite the file)",
                output.display()
            ),
            LogEvent::InputMissing { input } => write!(
                f,
                "Error: input file does not exist\nInput: {}",
                input.display()
            ),
            LogEvent::NothingToDo => write!(f, "Skipping: nothing to do here."),
            LogEvent::DuplicateOutput {
                output,
                first_input,
            } => write!(
                f,
                "{} is also written by {} -> skipping",
                output.display(),
                first_input.display()
            ),
            LogEvent::Renamed { from, to } => {
                write!(f, "Renaming: {} -> {}", from.display(), to.display())
            }
            LogEvent::RenameFailed { reason } => {
                write!(f, "Error: could not rename file\n{}", reason)
            }
            LogEvent::Copied { from, to } => {
                write!(f, "Copying: {} -> {}", from.display(), to.display())
            }
            LogEvent::CopyFailed { from, to, reason } => write!(
                f,
                "Error: could not copy file\nInput: {}\nOutput: {}\n{}",
                from.display(),
                to.display(),
                reason
            ),
            LogEvent::OriginalDeleted { path } => write!(f, "{} deleted.", path.display()),
            LogEvent::OriginalDeleteFailed { path, reason } => {
                write!(f, "I could not delete {}: {}", path.display(), reason)
            }
            LogEvent::OriginalKept { failures } => write!(
                f,
                "I did not delete the original because I detected {} failure(s).",
                failures
            ),
            LogEvent::Processing { input } => write!(f, "processing {}", input.display()),
            LogEvent::LoadFailed { reason } => write!(f, "Error while loading: {}", reason),
            LogEvent::StepInactive { step } => write!(f, "{} inactive -> skipping", step),
            LogEvent::StepSkipped { step, reason } => write!(f, "{} {}", step, reason),
            LogEvent::Resized { step, scale_factor } => write!(
                f,
                "{} image resized, scale factor: {}%",
                step,
                scale_factor * 100.0
            ),
            LogEvent::ResizedToSide { step, side } => {
                write!(f, "{} image resized, new side: {} px", step, side)
            }
            LogEvent::Transformed { step, cropped } => {
                if *cropped {
                    write!(f, "{} image transformed and cropped.", step)
                } else {
                    write!(f, "{} image transformed.", step)
                }
            }
            LogEvent::PluginFailed { step, plugin } => {
                write!(f, "{} Cannot apply {}.", step, plugin)
            }
            LogEvent::PluginsApplied { step } => write!(f, "{} plugins applied.", step),
            LogEvent::StepError { step, message } => write!(f, "{} error, {}", step, message),
            LogEvent::StepFailed { step } => write!(f, "{} failed", step),
            LogEvent::Saved { output } => write!(f, "{} saved...", output.display()),
            LogEvent::SaveFailed { output, reason } => {
                write!(f, "Could not save: {} ({})", output.display(), reason)
            }
            LogEvent::BackupExists { backup } => write!(
                f,
                "Error: back-up ({}) file already exists",
                backup.display()
            ),
            LogEvent::BackupFailed { output, reason } => write!(
                f,
                "Error: could not move existing file {} to a back-up\n{}",
                output.display(),
                reason
            ),
            LogEvent::BackupRemoveFailed { backup, reason } => write!(
                f,
                "Error: could not delete existing file {}\n{}",
                backup.display(),
                reason
            ),
            LogEvent::Restored { output } => write!(
                f,
                "I could not save to {} so I restored the original file.",
                output.display()
            ),
            LogEvent::RestoreFailed { backup, reason } => write!(
                f,
                "Ui - a lot of things went wrong sorry, your original file can be found here: {}\n{}",
                backup.display(),
                reason
            ),
        }
    }
}
