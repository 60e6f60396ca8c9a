//! # 文件收集器
//!
//! 根据输入路径和模式收集待处理的图像文件列表。
//!
//! ## 功能
//! - 支持多个文件和目录输入，保持给定顺序
//! - 目录内按 glob 模式匹配（逗号分隔多模式）
//! - 可选递归目录搜索
//!
//! ## 依赖关系
//! - 被 `commands/run.rs` 调用
//! - 使用 `walkdir` 遍历目录，`glob` 匹配文件名

use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// 默认匹配的图像扩展名
pub const DEFAULT_PATTERN: &str = "*.jpg,*.jpeg,*.png,*.webp";

/// 文件收集器
pub struct FileCollector {
    /// 输入路径
    inputs: Vec<PathBuf>,
    /// 匹配模式列表
    patterns: Vec<Pattern>,
    /// 是否递归
    recursive: bool,
}

impl FileCollector {
    /// 创建新的文件收集器
    pub fn new(inputs: Vec<PathBuf>) -> Self {
        Self {
            inputs,
            patterns: Self::parse_patterns(DEFAULT_PATTERN),
            recursive: false,
        }
    }

    /// 设置匹配模式（逗号分隔的多模式）
    pub fn with_pattern(mut self, pattern: &str) -> Self {
        self.patterns = Self::parse_patterns(pattern);
        if self.patterns.is_empty() {
            self.patterns = Self::parse_patterns("*");
        }
        self
    }

    /// 设置是否递归搜索
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    fn parse_patterns(pattern: &str) -> Vec<Pattern> {
        pattern
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|s| match Pattern::new(s) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!("ignoring invalid pattern '{}': {}", s, e);
                    None
                }
            })
            .collect()
    }

    /// 收集所有匹配的文件
    ///
    /// 直接给出的文件不做模式过滤；不存在的路径原样保留，
    /// 由批处理项报告为缺失的输入。
    pub fn collect(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for input in &self.inputs {
            if input.is_dir() {
                files.extend(self.collect_dir(input));
            } else {
                files.push(input.clone());
            }
        }
        files
    }

    fn collect_dir(&self, dir: &Path) -> Vec<PathBuf> {
        let max_depth = if self.recursive { usize::MAX } else { 1 };

        WalkDir::new(dir)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|entry| self.matches_patterns(entry.path()))
            .map(|e| e.path().to_path_buf())
            .collect()
    }

    /// 检查文件是否匹配任一模式（不区分大小写）
    fn matches_patterns(&self, path: &Path) -> bool {
        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => return false,
        };

        let options = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::new()
        };
        self.patterns
            .iter()
            .any(|p| p.matches_with(filename, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_default_pattern_matches_images() {
        let collector = FileCollector::new(vec![]);
        assert!(collector.matches_patterns(Path::new("a.jpg")));
        assert!(collector.matches_patterns(Path::new("IMG_0001.JPG")));
        assert!(collector.matches_patterns(Path::new("b.webp")));
        assert!(!collector.matches_patterns(Path::new("notes.txt")));
    }

    #[test]
    fn test_collect_directory_sorted() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("c.png"));
        touch(&dir.path().join("a.jpg"));
        touch(&dir.path().join("b.txt"));
        fs::create_dir(dir.path().join("sub")).unwrap();
        touch(&dir.path().join("sub").join("d.png"));

        let files = FileCollector::new(vec![dir.path().to_path_buf()]).collect();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "c.png"]);

        let files = FileCollector::new(vec![dir.path().to_path_buf()])
            .recursive(true)
            .collect();
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn test_explicit_files_keep_order() {
        let dir = TempDir::new().unwrap();
        let b = dir.path().join("b.png");
        let a = dir.path().join("a.png");
        touch(&a);
        touch(&b);
        let missing = dir.path().join("missing.png");

        let files = FileCollector::new(vec![b.clone(), a.clone(), missing.clone(), b.clone()])
            .with_pattern("*.jpg")
            .collect();
        assert_eq!(files, vec![b.clone(), a, missing, b]);
    }

    #[test]
    fn test_custom_pattern() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("scan_01.tif"));
        touch(&dir.path().join("photo.png"));

        let files = FileCollector::new(vec![dir.path().to_path_buf()])
            .with_pattern("scan_*.tif")
            .collect();
        assert_eq!(files.len(), 1);
    }
}
