//! # 图像编解码
//!
//! 读取/保存图像文件，并读取裁剪区域元数据。
//!
//! ## 功能
//! - `ImageCodec` trait：批处理项通过它加载与保存图像
//! - `FileCodec`：基于 `image` crate 的默认实现
//! - 裁剪区域保存在旁路文件 `<input>.crop` 中（`x y width height`）
//!
//! ## 依赖关系
//! - 被 `batch/item.rs`, `batch/runner.rs` 使用
//! - 使用 `image` crate

use crate::error::{BatchError, Result};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ColorType, DynamicImage, ImageFormat};
use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 未指定压缩参数时的 JPEG 质量
const DEFAULT_JPEG_QUALITY: u8 = 90;

/// 图像中保存的裁剪区域
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// 解析 `x y width height` 格式
    pub fn parse(text: &str) -> Option<Self> {
        let values: Vec<u32> = text
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .map(|s| s.parse().ok())
            .collect::<Option<Vec<_>>>()?;

        match values.as_slice() {
            [x, y, w, h] => Some(Self::new(*x, *y, *w, *h)),
            _ => None,
        }
    }
}

/// 已加载的图像及其元数据
#[derive(Debug, Clone)]
pub struct ImageDoc {
    pub image: DynamicImage,
    pub crop: Option<CropRect>,
    pub source: PathBuf,
}

impl ImageDoc {
    pub fn new(image: DynamicImage, source: impl Into<PathBuf>) -> Self {
        Self {
            image,
            crop: None,
            source: source.into(),
        }
    }

    pub fn with_crop(mut self, crop: CropRect) -> Self {
        self.crop = Some(crop);
        self
    }

    /// 图像是否为空（宽或高为 0）
    pub fn is_null(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }
}

/// 图像加载/保存能力
pub trait ImageCodec: Send + Sync {
    fn load(&self, path: &Path) -> Result<ImageDoc>;

    /// `compression` 为 `None` 时使用编码器默认值
    fn save(&self, image: &DynamicImage, path: &Path, compression: Option<u8>) -> Result<()>;
}

/// 基于文件系统与 `image` crate 的编解码器
#[derive(Debug, Default, Clone, Copy)]
pub struct FileCodec;

impl ImageCodec for FileCodec {
    fn load(&self, path: &Path) -> Result<ImageDoc> {
        if !path.is_file() {
            return Err(BatchError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let image = image::open(path).map_err(|e| BatchError::ImageError {
            path: path.display().to_string(),
            source: e,
        })?;

        let mut doc = ImageDoc::new(image, path);
        doc.crop = read_crop_sidecar(path);
        Ok(doc)
    }

    fn save(&self, image: &DynamicImage, path: &Path, compression: Option<u8>) -> Result<()> {
        let format = ImageFormat::from_path(path)
            .map_err(|_| BatchError::UnsupportedFormat(path.display().to_string()))?;

        let file = File::create(path).map_err(|e| BatchError::FileWriteError {
            path: path.display().to_string(),
            source: e,
        })?;
        let mut writer = BufWriter::new(file);

        let encoded = match format {
            ImageFormat::Jpeg => {
                let quality = compression.unwrap_or(DEFAULT_JPEG_QUALITY).clamp(1, 100);
                let encoder = JpegEncoder::new_with_quality(&mut writer, quality);
                jpeg_compatible(image).write_with_encoder(encoder)
            }
            ImageFormat::Png => {
                let encoder = PngEncoder::new_with_quality(
                    &mut writer,
                    png_compression(compression),
                    FilterType::Adaptive,
                );
                image.write_with_encoder(encoder)
            }
            other => image.write_to(&mut writer, other),
        };

        encoded.map_err(|e| BatchError::ImageError {
            path: path.display().to_string(),
            source: e,
        })?;
        writer.flush().map_err(|e| BatchError::FileWriteError {
            path: path.display().to_string(),
            source: e,
        })?;

        debug!(path = %path.display(), ?format, "image saved");
        Ok(())
    }
}

/// 裁剪元数据旁路文件路径
pub fn crop_sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".crop");
    PathBuf::from(name)
}

fn read_crop_sidecar(path: &Path) -> Option<CropRect> {
    let sidecar = crop_sidecar_path(path);
    let text = fs::read_to_string(&sidecar).ok()?;

    let rect = CropRect::parse(&text);
    if rect.is_none() {
        warn!(path = %sidecar.display(), "ignoring malformed crop metadata");
    }
    rect
}

/// JPEG 不支持透明通道和高位深，需要先转换
fn jpeg_compatible(image: &DynamicImage) -> Cow<'_, DynamicImage> {
    match image.color() {
        ColorType::L8 | ColorType::Rgb8 => Cow::Borrowed(image),
        ColorType::La8 | ColorType::L16 | ColorType::La16 => {
            Cow::Owned(DynamicImage::ImageLuma8(image.to_luma8()))
        }
        _ => Cow::Owned(DynamicImage::ImageRgb8(image.to_rgb8())),
    }
}

/// 质量越高压缩越少
fn png_compression(compression: Option<u8>) -> CompressionType {
    match compression {
        None => CompressionType::Default,
        Some(q) if q >= 67 => CompressionType::Fast,
        Some(q) if q >= 34 => CompressionType::Default,
        Some(_) => CompressionType::Best,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;
    use tempfile::TempDir;

    #[test]
    fn test_crop_rect_parse() {
        assert_eq!(CropRect::parse("1 2 30 40"), Some(CropRect::new(1, 2, 30, 40)));
        assert_eq!(CropRect::parse("1,2,30,40\n"), Some(CropRect::new(1, 2, 30, 40)));
        assert_eq!(CropRect::parse("1 2 30"), None);
        assert_eq!(CropRect::parse("a b c d"), None);
        assert!(CropRect::new(0, 0, 0, 10).is_empty());
    }

    #[test]
    fn test_load_reads_crop_sidecar() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("photo.png");
        RgbaImage::new(8, 6).save(&path).unwrap();
        fs::write(crop_sidecar_path(&path), "1 1 4 3").unwrap();

        let doc = FileCodec.load(&path).unwrap();
        assert_eq!(doc.image.width(), 8);
        assert_eq!(doc.crop, Some(CropRect::new(1, 1, 4, 3)));
    }

    #[test]
    fn test_save_jpeg_drops_alpha() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.jpg");
        let image = DynamicImage::ImageRgba8(RgbaImage::new(5, 7));

        FileCodec.save(&image, &path, Some(75)).unwrap();
        assert_eq!(image::image_dimensions(&path).unwrap(), (5, 7));
    }

    #[test]
    fn test_save_unknown_extension_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.unknown");
        let image = DynamicImage::ImageRgb8(image::RgbImage::new(2, 2));

        assert!(matches!(
            FileCodec.save(&image, &path, None),
            Err(BatchError::UnsupportedFormat(_))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(FileCodec.load(&dir.path().join("missing.png")).is_err());
    }
}
