//! # 缩放步骤
//!
//! 按比例或按某一边的目标像素长度缩放图像。
//!
//! ## 功能
//! - 模式: 比例缩放 / 长边 / 短边 / 宽度 / 高度
//! - 策略: 总是 / 只放大 / 只缩小（策略不允许时跳过，不算失败）
//! - 插值方式与可选的线性光（gamma 校正）缩放
//! - 目标尺寸超过单边或总像素上限时记为失败
//!
//! ## 依赖关系
//! - 实现 `steps::BatchStep`
//! - 使用 `image::imageops`

use super::{BatchStep, StepOutcome};
use crate::batch::log::{LogEvent, SkipReason};
use crate::error::{BatchError, Result};
use crate::imaging::ImageDoc;
use crate::plugins::BatchInfo;

use clap::ValueEnum;
use image::imageops::{self, FilterType};
use image::DynamicImage;

const STEP_NAME: &str = "[Resize Batch]";
const GAMMA: f32 = 2.2;

/// 目标图像的单边上限
pub const MAX_DIMENSION: u32 = 32768;
/// 目标图像的像素总数上限
pub const MAX_PIXELS: u64 = 100_000_000;

/// 缩放模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ResizeMode {
    /// Target is a scale factor
    #[default]
    Scale,
    /// Target is the length of the long side in px
    LongSide,
    /// Target is the length of the short side in px
    ShortSide,
    /// Target is the width in px
    Width,
    /// Target is the height in px
    Height,
}

/// 缩放方向策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ResizePolicy {
    #[default]
    Always,
    IncreaseOnly,
    DecreaseOnly,
}

/// 插值方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Interpolation {
    Nearest,
    /// Pixel area averaging when shrinking
    #[default]
    Area,
    Linear,
    Cubic,
    Lanczos,
}

impl Interpolation {
    fn filter_type(self) -> FilterType {
        match self {
            Interpolation::Nearest => FilterType::Nearest,
            Interpolation::Area | Interpolation::Linear => FilterType::Triangle,
            Interpolation::Cubic => FilterType::CatmullRom,
            Interpolation::Lanczos => FilterType::Lanczos3,
        }
    }
}

/// 缩放步骤
#[derive(Debug, Clone)]
pub struct ResizeStep {
    target: f32,
    mode: ResizeMode,
    policy: ResizePolicy,
    interpolation: Interpolation,
    gamma_correct: bool,
}

impl ResizeStep {
    /// `target` 在比例模式下是缩放因子，其他模式下是像素长度
    pub fn new(target: f32) -> Result<Self> {
        if !target.is_finite() || target <= 0.0 {
            return Err(BatchError::InvalidArgument(format!(
                "resize target must be positive, got {}",
                target
            )));
        }

        Ok(Self {
            target,
            mode: ResizeMode::default(),
            policy: ResizePolicy::default(),
            interpolation: Interpolation::default(),
            gamma_correct: false,
        })
    }

    pub fn with_mode(mut self, mode: ResizeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_policy(mut self, policy: ResizePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn with_gamma_correction(mut self, gamma_correct: bool) -> Self {
        self.gamma_correct = gamma_correct;
        self
    }

    /// 计算目标尺寸；无需缩放时返回跳过原因
    pub fn target_size(
        &self,
        width: u32,
        height: u32,
    ) -> std::result::Result<(u32, u32), SkipReason> {
        if self.target == 1.0 {
            return Err(SkipReason::ScaleFactorOne);
        }

        if self.mode == ResizeMode::Scale {
            self.check_policy(self.target)?;
            return Ok((
                scaled(width as f32 * self.target),
                scaled(height as f32 * self.target),
            ));
        }

        // 旋转到目标边对应宽度
        let transposed = match self.mode {
            ResizeMode::LongSide => width < height,
            ResizeMode::ShortSide => width > height,
            ResizeMode::Height => true,
            ResizeMode::Width | ResizeMode::Scale => false,
        };
        let (nw, nh) = if transposed {
            (height, width)
        } else {
            (width, height)
        };

        let factor = self.target / nw as f32;
        self.check_policy(factor)?;
        if factor == 1.0 {
            return Err(SkipReason::SizeMatches);
        }

        let size = (scaled(self.target), scaled(factor * nh as f32));
        Ok(if transposed { (size.1, size.0) } else { size })
    }

    fn check_policy(&self, factor: f32) -> std::result::Result<(), SkipReason> {
        match self.policy {
            ResizePolicy::DecreaseOnly if factor > 1.0 => Err(SkipReason::WouldIncrease),
            ResizePolicy::IncreaseOnly if factor < 1.0 => Err(SkipReason::WouldDecrease),
            _ => Ok(()),
        }
    }

    fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> Option<DynamicImage> {
        if width == 0 || height == 0 || image.width() == 0 || image.height() == 0 {
            return None;
        }

        let filter = self.interpolation.filter_type();
        if self.gamma_correct {
            return Some(resize_linear_light(image, width, height, filter));
        }

        let shrinking = width < image.width() && height < image.height();
        let resized = match self.interpolation {
            Interpolation::Area if shrinking => image.thumbnail_exact(width, height),
            _ => image.resize_exact(width, height, filter),
        };
        Some(resized)
    }
}

fn scaled(value: f32) -> u32 {
    value.round().max(1.0) as u32
}

/// 在线性光空间中缩放，避免 sRGB 平均导致的变暗
fn resize_linear_light(
    image: &DynamicImage,
    width: u32,
    height: u32,
    filter: FilterType,
) -> DynamicImage {
    let mut linear = image.to_rgba32f();
    for pixel in linear.pixels_mut() {
        for c in &mut pixel.0[..3] {
            *c = c.max(0.0).powf(GAMMA);
        }
    }

    let mut resized = imageops::resize(&linear, width, height, filter);
    for pixel in resized.pixels_mut() {
        for c in &mut pixel.0[..3] {
            *c = c.max(0.0).powf(1.0 / GAMMA);
        }
    }

    let resized = DynamicImage::ImageRgba32F(resized);
    if image.color().has_alpha() {
        DynamicImage::ImageRgba8(resized.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(resized.to_rgb8())
    }
}

impl BatchStep for ResizeStep {
    fn name(&self) -> &str {
        STEP_NAME
    }

    fn is_active(&self) -> bool {
        self.mode != ResizeMode::Scale || self.target != 1.0
    }

    fn compute(
        &self,
        doc: &mut ImageDoc,
        log: &mut Vec<LogEvent>,
        _batch_info: &mut Vec<BatchInfo>,
    ) -> StepOutcome {
        let (width, height) = match self.target_size(doc.image.width(), doc.image.height()) {
            Ok(size) => size,
            Err(reason) => {
                log.push(LogEvent::StepSkipped {
                    step: STEP_NAME.to_string(),
                    reason,
                });
                return StepOutcome::Skipped;
            }
        };

        let pixels = u64::from(width) * u64::from(height);
        if width > MAX_DIMENSION || height > MAX_DIMENSION || pixels > MAX_PIXELS {
            log.push(LogEvent::StepError {
                step: STEP_NAME.to_string(),
                message: format!(
                    "target size {}x{} exceeds the limit ({} px per side, {} px total).",
                    width, height, MAX_DIMENSION, MAX_PIXELS
                ),
            });
            return StepOutcome::Failed;
        }

        let Some(resized) = self.resize(&doc.image, width, height) else {
            log.push(LogEvent::StepError {
                step: STEP_NAME.to_string(),
                message: "could not resize image.".to_string(),
            });
            return StepOutcome::Failed;
        };

        doc.image = resized;
        log.push(match self.mode {
            ResizeMode::Scale => LogEvent::Resized {
                step: STEP_NAME.to_string(),
                scale_factor: self.target,
            },
            _ => LogEvent::ResizedToSide {
                step: STEP_NAME.to_string(),
                side: scaled(self.target),
            },
        });
        StepOutcome::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn doc(width: u32, height: u32) -> ImageDoc {
        ImageDoc::new(
            DynamicImage::ImageRgb8(RgbImage::new(width, height)),
            "test.png",
        )
    }

    fn run(step: &ResizeStep, doc: &mut ImageDoc) -> (StepOutcome, Vec<LogEvent>) {
        let mut log = Vec::new();
        let mut infos = Vec::new();
        let outcome = step.compute(doc, &mut log, &mut infos);
        (outcome, log)
    }

    #[test]
    fn test_rejects_non_positive_target() {
        assert!(ResizeStep::new(0.0).is_err());
        assert!(ResizeStep::new(-2.0).is_err());
        assert!(ResizeStep::new(f32::NAN).is_err());
    }

    #[test]
    fn test_factor_one_is_noop_in_every_mode() {
        for mode in ResizeMode::value_variants() {
            let step = ResizeStep::new(1.0).unwrap().with_mode(*mode);
            let mut d = doc(40, 20);
            let (outcome, log) = run(&step, &mut d);

            assert_eq!(outcome, StepOutcome::Skipped);
            assert_eq!((d.image.width(), d.image.height()), (40, 20));
            assert!(matches!(
                log[0],
                LogEvent::StepSkipped {
                    reason: SkipReason::ScaleFactorOne,
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_scale_halves_image() {
        let step = ResizeStep::new(0.5).unwrap();
        let mut d = doc(40, 20);
        let (outcome, _) = run(&step, &mut d);

        assert_eq!(outcome, StepOutcome::Applied);
        assert_eq!((d.image.width(), d.image.height()), (20, 10));
    }

    #[test]
    fn test_increase_only_skips_shrinking() {
        let step = ResizeStep::new(20.0)
            .unwrap()
            .with_mode(ResizeMode::LongSide)
            .with_policy(ResizePolicy::IncreaseOnly);
        let mut d = doc(40, 30);
        let (outcome, log) = run(&step, &mut d);

        assert_eq!(outcome, StepOutcome::Skipped);
        assert_eq!(d.image.width(), 40);
        assert!(matches!(
            log[0],
            LogEvent::StepSkipped {
                reason: SkipReason::WouldDecrease,
                ..
            }
        ));
    }

    #[test]
    fn test_decrease_only_skips_growing() {
        let step = ResizeStep::new(2.0)
            .unwrap()
            .with_policy(ResizePolicy::DecreaseOnly);
        let mut d = doc(10, 10);
        let (outcome, _) = run(&step, &mut d);

        assert_eq!(outcome, StepOutcome::Skipped);
        assert_eq!(d.image.width(), 10);
    }

    #[test]
    fn test_side_modes_compute_target_size() {
        let long = ResizeStep::new(100.0).unwrap().with_mode(ResizeMode::LongSide);
        assert_eq!(long.target_size(200, 400), Ok((50, 100)));
        assert_eq!(long.target_size(400, 200), Ok((100, 50)));

        let short = ResizeStep::new(100.0).unwrap().with_mode(ResizeMode::ShortSide);
        assert_eq!(short.target_size(200, 400), Ok((100, 200)));

        let height = ResizeStep::new(50.0).unwrap().with_mode(ResizeMode::Height);
        assert_eq!(height.target_size(400, 200), Ok((100, 50)));

        let width = ResizeStep::new(200.0).unwrap().with_mode(ResizeMode::Width);
        assert_eq!(width.target_size(200, 80), Err(SkipReason::SizeMatches));
    }

    #[test]
    fn test_gamma_correct_resize_keeps_alpha() {
        let step = ResizeStep::new(0.5).unwrap().with_gamma_correction(true);
        let mut d = ImageDoc::new(
            DynamicImage::ImageRgba8(image::RgbaImage::new(8, 8)),
            "alpha.png",
        );
        let (outcome, _) = run(&step, &mut d);

        assert_eq!(outcome, StepOutcome::Applied);
        assert_eq!(d.image.color(), image::ColorType::Rgba8);
        assert_eq!(d.image.width(), 4);
    }

    #[test]
    fn test_is_active() {
        assert!(!ResizeStep::new(1.0).unwrap().is_active());
        assert!(ResizeStep::new(0.5).unwrap().is_active());
        assert!(ResizeStep::new(1.0)
            .unwrap()
            .with_mode(ResizeMode::LongSide)
            .is_active());
    }

    #[test]
    fn test_oversized_target_fails_without_touching_image() {
        let mut d = doc(10, 10);
        let (outcome, log) = run(&ResizeStep::new(10000.0).unwrap(), &mut d);
        assert_eq!(outcome, StepOutcome::Failed);
        assert!(matches!(log[0], LogEvent::StepError { .. }));
        assert_eq!((d.image.width(), d.image.height()), (10, 10));

        // 每边都在上限内，但像素总数超限
        let mut d = doc(2, 2);
        let (outcome, _) = run(&ResizeStep::new(12000.0).unwrap(), &mut d);
        assert_eq!(outcome, StepOutcome::Failed);
        assert_eq!(d.image.width(), 2);
    }
}
