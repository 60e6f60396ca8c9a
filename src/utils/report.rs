//! # 运行报告
//!
//! 每个批处理项一行的汇总数据，用于终端表格和 CSV 报告。
//!
//! ## 依赖关系
//! - 被 `batch/runner.rs` 生成
//! - 被 `commands/run.rs` 输出
//! - 使用 `tabled` 和 `csv`

use crate::batch::BatchItem;
use crate::error::{BatchError, Result};

use serde::Serialize;
use std::path::Path;
use tabled::Tabled;

/// 单个批处理项的报告行
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct ItemReport {
    #[tabled(rename = "#")]
    pub index: usize,
    #[tabled(rename = "Input")]
    pub input: String,
    #[tabled(rename = "Output")]
    pub output: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Log lines")]
    pub log_lines: usize,
}

impl ItemReport {
    pub fn from_item(index: usize, item: &BatchItem) -> Self {
        let status = if !item.was_processed() {
            "not processed"
        } else if item.has_failed() {
            "FAIL"
        } else {
            "OK"
        };

        Self {
            index,
            input: item.input().display().to_string(),
            output: item.output().display().to_string(),
            status: status.to_string(),
            log_lines: item.log().len(),
        }
    }

    /// 仍在处理中的批处理项
    pub fn in_flight(index: usize, input: &Path) -> Self {
        Self {
            index,
            input: input.display().to_string(),
            output: String::new(),
            status: "running".to_string(),
            log_lines: 0,
        }
    }
}

/// 保存报告到 CSV
pub fn write_csv(reports: &[ItemReport], output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;

    for report in reports {
        wtr.serialize(report)?;
    }

    wtr.flush().map_err(|e| BatchError::FileWriteError {
        path: output_path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_write_csv_with_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.csv");
        let reports = vec![
            ItemReport {
                index: 0,
                input: "a.png".to_string(),
                output: "out/a.png".to_string(),
                status: "OK".to_string(),
                log_lines: 3,
            },
            ItemReport::in_flight(1, Path::new("b.png")),
        ];

        write_csv(&reports, &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "index,input,output,status,log_lines");
        assert_eq!(lines[1], "0,a.png,out/a.png,OK,3");
        assert_eq!(lines[2], "1,b.png,,running,0");
    }
}
