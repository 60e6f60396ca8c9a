//! # 几何变换步骤
//!
//! 按元数据裁剪、旋转（90° 的倍数）、水平/垂直翻转。
//! 执行顺序固定：裁剪 -> 旋转 -> 翻转。
//!
//! ## 依赖关系
//! - 实现 `steps::BatchStep`
//! - 使用 `imaging::ImageDoc` 中的裁剪区域

use super::{BatchStep, StepOutcome};
use crate::batch::log::LogEvent;
use crate::error::{BatchError, Result};
use crate::imaging::ImageDoc;
use crate::plugins::BatchInfo;

use image::DynamicImage;

const STEP_NAME: &str = "[Transform Batch]";

/// 旋转角度（顺时针）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    /// 角度必须是 90 的倍数，负数表示逆时针
    pub fn from_degrees(angle: i32) -> Result<Self> {
        if angle % 90 != 0 {
            return Err(BatchError::InvalidArgument(format!(
                "rotation angle must be a multiple of 90 degrees, got {}",
                angle
            )));
        }

        Ok(match angle.rem_euclid(360) {
            90 => Rotation::Cw90,
            180 => Rotation::Cw180,
            270 => Rotation::Cw270,
            _ => Rotation::None,
        })
    }

    fn apply(self, image: DynamicImage) -> DynamicImage {
        match self {
            Rotation::None => image,
            Rotation::Cw90 => image.rotate90(),
            Rotation::Cw180 => image.rotate180(),
            Rotation::Cw270 => image.rotate270(),
        }
    }
}

/// 几何变换步骤
#[derive(Debug, Clone)]
pub struct TransformStep {
    rotation: Rotation,
    flip_horizontal: bool,
    flip_vertical: bool,
    crop_from_metadata: bool,
}

impl TransformStep {
    pub fn new(angle: i32) -> Result<Self> {
        Ok(Self {
            rotation: Rotation::from_degrees(angle)?,
            flip_horizontal: false,
            flip_vertical: false,
            crop_from_metadata: false,
        })
    }

    pub fn with_flips(mut self, horizontal: bool, vertical: bool) -> Self {
        self.flip_horizontal = horizontal;
        self.flip_vertical = vertical;
        self
    }

    pub fn with_crop_from_metadata(mut self, crop: bool) -> Self {
        self.crop_from_metadata = crop;
        self
    }
}

impl BatchStep for TransformStep {
    fn name(&self) -> &str {
        STEP_NAME
    }

    fn is_active(&self) -> bool {
        self.rotation != Rotation::None
            || self.flip_horizontal
            || self.flip_vertical
            || self.crop_from_metadata
    }

    fn compute(
        &self,
        doc: &mut ImageDoc,
        log: &mut Vec<LogEvent>,
        _batch_info: &mut Vec<BatchInfo>,
    ) -> StepOutcome {
        if !self.is_active() {
            log.push(LogEvent::StepInactive {
                step: STEP_NAME.to_string(),
            });
            return StepOutcome::Skipped;
        }

        let mut image = doc.image.clone();

        let crop = doc
            .crop
            .filter(|rect| self.crop_from_metadata && !rect.is_empty());
        if let Some(rect) = crop {
            image = image.crop_imm(rect.x, rect.y, rect.width, rect.height);
        }

        image = self.rotation.apply(image);
        if self.flip_horizontal {
            image = image.fliph();
        }
        if self.flip_vertical {
            image = image.flipv();
        }

        if image.width() == 0 || image.height() == 0 {
            log.push(LogEvent::StepError {
                step: STEP_NAME.to_string(),
                message: "could not transform image.".to_string(),
            });
            return StepOutcome::Failed;
        }

        doc.image = image;
        if crop.is_some() {
            // 裁剪已生效，避免后续步骤重复使用
            doc.crop = None;
        }
        log.push(LogEvent::Transformed {
            step: STEP_NAME.to_string(),
            cropped: crop.is_some(),
        });
        StepOutcome::Applied
    }
}
