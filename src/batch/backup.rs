//! # 覆盖保护
//!
//! 写入已存在的输出文件之前，先把原文件改名为唯一的备份文件；
//! 写入结束后根据写入是否成功决定删除备份还是恢复原文件。
//!
//! 备份文件名: `<原文件名><唯一标记>.<原扩展名>`，与输出文件位于同一目录。
//!
//! ## 依赖关系
//! - 被 `batch/item.rs` 使用
//! - 使用 `uuid` 生成唯一标记

use crate::error::{BatchError, Result};

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// 收尾阶段的结果
#[derive(Debug)]
pub enum FinalizeOutcome {
    /// 没有需要处理的备份
    Untouched,
    /// 保存成功，备份已删除
    Discarded,
    /// 保存失败，原文件已恢复
    Restored,
    /// 保存成功，但备份无法删除
    DiscardFailed(BatchError),
    /// 保存失败，且原文件无法恢复；备份仍在原处
    RestoreFailed(BatchError),
}

/// 生成备份文件路径
pub fn backup_path_for(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let token = Uuid::new_v4().simple();

    let name = match output.extension() {
        Some(ext) => format!("{}{}.{}", stem, token, ext.to_string_lossy()),
        None => format!("{}{}", stem, token),
    };
    output.with_file_name(name)
}

/// 输出文件已存在时将其移到 `backup_name` 给出的备份位置
///
/// 返回备份路径；输出不存在时返回 `None`。
pub fn prepare(output: &Path, backup_name: fn(&Path) -> PathBuf) -> Result<Option<PathBuf>> {
    if !output.exists() {
        return Ok(None);
    }

    let backup = backup_name(output);
    if backup.exists() {
        return Err(BatchError::BackupExists {
            path: backup.display().to_string(),
        });
    }

    fs::rename(output, &backup).map_err(|e| BatchError::RenameError {
        from: output.display().to_string(),
        to: backup.display().to_string(),
        source: e,
    })?;

    debug!(output = %output.display(), backup = %backup.display(), "existing output backed up");
    Ok(Some(backup))
}

/// 写入结束后删除或恢复备份
///
/// 是否删除备份只取决于 `written`；写入失败时先清除残留的输出，
/// 再把备份改回原名。任何一步失败都保留备份并返回 `RestoreFailed`。
pub fn finalize(output: &Path, backup: Option<&Path>, written: bool) -> FinalizeOutcome {
    let Some(backup) = backup else {
        return FinalizeOutcome::Untouched;
    };

    if written {
        if !backup.exists() {
            return FinalizeOutcome::Untouched;
        }

        return match fs::remove_file(backup) {
            Ok(()) => FinalizeOutcome::Discarded,
            Err(e) => FinalizeOutcome::DiscardFailed(BatchError::RemoveError {
                path: backup.display().to_string(),
                source: e,
            }),
        };
    }

    if output.symlink_metadata().is_ok() {
        if let Err(e) = fs::remove_file(output) {
            warn!(
                backup = %backup.display(),
                "could not clear failed output, the original is still available at the backup location"
            );
            return FinalizeOutcome::RestoreFailed(BatchError::RemoveError {
                path: output.display().to_string(),
                source: e,
            });
        }
    }

    match fs::rename(backup, output) {
        Ok(()) => {
            debug!(output = %output.display(), "original restored from backup");
            FinalizeOutcome::Restored
        }
        Err(e) => {
            warn!(
                backup = %backup.display(),
                "could not restore original, it is still available at the backup location"
            );
            FinalizeOutcome::RestoreFailed(BatchError::RenameError {
                from: backup.display().to_string(),
                to: output.display().to_string(),
                source: e,
            })
        }
    }
}
