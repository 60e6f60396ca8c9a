//! # 输出文件名模式
//!
//! 根据模式与文件序号生成输出文件名。
//!
//! ## 模式语法
//! - `<c:N>`   原文件名（不含扩展名）；N=0 保持，1 小写，2 大写
//! - `<d:N>`   序号，补零到 N 位
//! - `<d:N:S>` 序号 + S，补零到 N 位
//! - `<old>`   原扩展名（不含点）
//! - 其他文本原样保留；模式中既没有 `<old>` 也不以 `.扩展名` 结尾时追加原扩展名
//!
//! ## 依赖关系
//! - 被 `batch/config.rs`, `batch/runner.rs` 使用
//! - 使用 `regex` 解析标签

use crate::error::{BatchError, Result};

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// 默认模式：保持原文件名
pub const DEFAULT_PATTERN: &str = "<c:0>.<old>";

/// 序号最多补零的位数
const MAX_DIGITS: usize = 32;

fn tag_regex() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| {
        Regex::new(r"<(?:c:(?P<case>\d+)|d:(?P<digits>\d+)(?::(?P<start>\d+))?|(?P<old>old))>")
            .expect("tag pattern is valid")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameCase {
    Keep,
    Lower,
    Upper,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Name(NameCase),
    Number { digits: usize, start: usize },
    OldExtension,
}

/// 文件名转换器
#[derive(Debug, Clone)]
pub struct FileNameConverter {
    segments: Vec<Segment>,
    /// 模式自带扩展名（`<old>` 或字面的 `.ext` 结尾）
    has_extension: bool,
}

impl FileNameConverter {
    /// 解析模式
    pub fn new(pattern: &str) -> Result<Self> {
        if pattern.trim().is_empty() {
            return Err(BatchError::EmptyPattern);
        }

        let invalid = |reason: String| BatchError::InvalidPattern {
            pattern: pattern.to_string(),
            reason,
        };

        let mut segments = Vec::new();
        let mut last = 0;

        for caps in tag_regex().captures_iter(pattern) {
            let Some(tag) = caps.get(0) else { continue };
            push_literal(&mut segments, &pattern[last..tag.start()], &invalid)?;
            last = tag.end();

            let segment = if let Some(case) = caps.name("case") {
                match case.as_str() {
                    "0" => Segment::Name(NameCase::Keep),
                    "1" => Segment::Name(NameCase::Lower),
                    "2" => Segment::Name(NameCase::Upper),
                    other => return Err(invalid(format!("unknown case mode '{}'", other))),
                }
            } else if let Some(digits) = caps.name("digits") {
                let digits = digits
                    .as_str()
                    .parse::<usize>()
                    .ok()
                    .filter(|d| *d <= MAX_DIGITS)
                    .ok_or_else(|| invalid(format!("digit count must be at most {}", MAX_DIGITS)))?;
                let start = match caps.name("start") {
                    Some(s) => s
                        .as_str()
                        .parse::<u32>()
                        .map_err(|_| invalid("start index out of range".to_string()))?,
                    None => 0,
                };
                Segment::Number {
                    digits,
                    start: start as usize,
                }
            } else {
                Segment::OldExtension
            };
            segments.push(segment);
        }
        push_literal(&mut segments, &pattern[last..], &invalid)?;

        let has_extension = segments.contains(&Segment::OldExtension)
            || matches!(
                segments.last(),
                Some(Segment::Literal(text))
                    if text.rsplit_once('.').is_some_and(|(_, ext)| !ext.is_empty())
            );

        Ok(Self {
            segments,
            has_extension,
        })
    }

    /// 为第 `index` 个输入文件生成输出文件名
    pub fn convert(&self, file_name: &str, index: usize) -> String {
        let path = Path::new(file_name);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut name = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => name.push_str(text),
                Segment::Name(NameCase::Keep) => name.push_str(&stem),
                Segment::Name(NameCase::Lower) => name.push_str(&stem.to_lowercase()),
                Segment::Name(NameCase::Upper) => name.push_str(&stem.to_uppercase()),
                Segment::Number { digits, start } => {
                    let number = index.saturating_add(*start);
                    name.push_str(&format!("{:0width$}", number, width = *digits))
                }
                Segment::OldExtension => name.push_str(&extension),
            }
        }

        if !self.has_extension && !extension.is_empty() {
            name.push('.');
            name.push_str(&extension);
        }
        name
    }
}

fn push_literal(
    segments: &mut Vec<Segment>,
    text: &str,
    invalid: &impl Fn(String) -> BatchError,
) -> Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    if text.contains(&['<', '>', '/', '\\'][..]) {
        return Err(invalid(format!("unexpected characters in '{}'", text)));
    }
    segments.push(Segment::Literal(text.to_string()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pattern_keeps_name() {
        let converter = FileNameConverter::new(DEFAULT_PATTERN).unwrap();
        assert_eq!(converter.convert("Photo.JPG", 3), "Photo.JPG");
    }

    #[test]
    fn test_suffix_with_old_extension() {
        let converter = FileNameConverter::new("<c:0>_out.<old>").unwrap();
        assert_eq!(converter.convert("A.jpg", 0), "A_out.jpg");
        assert_eq!(converter.convert("B.png", 1), "B_out.png");
    }

    #[test]
    fn test_case_and_numbering() {
        let converter = FileNameConverter::new("<c:1>_<d:3:1>.png").unwrap();
        assert_eq!(converter.convert("Holiday.JPG", 0), "holiday_001.png");
        assert_eq!(converter.convert("Holiday.JPG", 41), "holiday_042.png");

        let converter = FileNameConverter::new("img<d:2>").unwrap();
        assert_eq!(converter.convert("x.webp", 7), "img07.webp");

        let converter = FileNameConverter::new("<c:2>").unwrap();
        assert_eq!(converter.convert("abc.png", 0), "ABC.png");
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(matches!(
            FileNameConverter::new("  "),
            Err(BatchError::EmptyPattern)
        ));
        assert!(FileNameConverter::new("<c:7>").is_err());
        assert!(FileNameConverter::new("<x:1>.png").is_err());
        assert!(FileNameConverter::new("../<c:0>").is_err());
    }

    #[test]
    fn test_dotted_stem_still_gets_extension() {
        let converter = FileNameConverter::new("<c:0>_small").unwrap();
        assert_eq!(converter.convert("v1.2_photo.jpg", 0), "v1.2_photo_small.jpg");

        let converter = FileNameConverter::new("<c:1>").unwrap();
        assert_eq!(converter.convert("Archive.Tar.png", 0), "archive.tar.png");

        let converter = FileNameConverter::new("<c:0>.webp").unwrap();
        assert_eq!(converter.convert("v1.2_photo.jpg", 0), "v1.2_photo.webp");
    }

    #[test]
    fn test_numbering_bounds() {
        let huge = format!("<d:2:{}>", u64::MAX);
        assert!(matches!(
            FileNameConverter::new(&huge),
            Err(BatchError::InvalidPattern { .. })
        ));
        assert!(FileNameConverter::new("<d:1000>").is_err());

        let converter = FileNameConverter::new(&format!("<d:1:{}>", u32::MAX)).unwrap();
        let expected = format!("{}.png", usize::MAX);
        assert_eq!(converter.convert("a.png", usize::MAX), expected);
    }
}
