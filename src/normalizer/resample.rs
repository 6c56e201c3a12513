//! # 渐进式降采样模块
//!
//! ## 设计思路
//!
//! 单次绘制缩小超过 2 倍时，双线性这类小半径滤镜会明显丢细节（摩尔纹、锯齿）。
//! 这里把一次大比例缩放拆成多轮，每轮最多缩小 2 倍，最后一轮精确落在目标尺寸。
//!
//! 轮次规划（[`PassPlan`]）与像素绘制分离：
//! - `PassPlan` 只依赖几何信息，是可重复迭代的纯尺寸序列，便于单独测试；
//! - `resample` 按计划逐轮绘制，每轮按值接管上一轮画布，产出下一张后即释放。
//!
//! ## 实现思路
//!
//! 1. 第 0 轮：把源矩形换算到原始像素坐标，只对这块区域做旋转 / 镜像，
//!    再绘制到 `target * 2^(p-1)`（不超过源矩形）
//! 2. 之后每轮整帧绘制到上一轮的一半，最后一轮为目标尺寸
//!
//! 非 `Normal` 方向时第 0 轮会多持有一块源矩形大小的中间画布；
//! 不裁剪时它与整张解码画布等大，峰值内存约为解码画布的两倍。

use image::imageops::{self, FilterType};

use super::geometry::CropGeometry;
use super::orientation::Orientation;
use super::surface::{check_allocation, SourceRect, Surface};
use super::NormalizeError;

/// 单轮绘制的目标尺寸。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassStep {
    pub index: u32,
    pub width: u32,
    pub height: u32,
}

/// 渐进缩放的轮次计划。
///
/// 迭代器产出 `pass_factor` 个尺寸，`Clone` 后可从头重新迭代。
///
/// # 示例
/// ```rust
/// use image_normalizer::normalizer::{CropGeometry, PassPlan};
///
/// let geometry = CropGeometry {
///     source_x: 0,
///     source_y: 0,
///     source_width: 1000,
///     source_height: 1000,
///     target_width: 125,
///     target_height: 125,
///     pass_factor: 3,
/// };
/// let sizes: Vec<_> = PassPlan::new(&geometry).map(|s| s.width).collect();
/// assert_eq!(sizes, vec![500, 250, 125]);
/// ```
#[derive(Debug, Clone)]
pub struct PassPlan {
    source: (u32, u32),
    target: (u32, u32),
    passes: u32,
    next: u32,
}

impl PassPlan {
    pub fn new(geometry: &CropGeometry) -> Self {
        Self {
            source: (geometry.source_width, geometry.source_height),
            target: (geometry.target_width, geometry.target_height),
            passes: geometry.pass_factor.max(1),
            next: 0,
        }
    }

    fn size_at(&self, index: u32) -> (u32, u32) {
        let shift = self.passes - 1 - index;
        (
            scaled_up(self.target.0, shift, self.source.0),
            scaled_up(self.target.1, shift, self.source.1),
        )
    }
}

impl Iterator for PassPlan {
    type Item = PassStep;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.passes {
            return None;
        }

        let index = self.next;
        self.next += 1;
        let (width, height) = self.size_at(index);
        Some(PassStep {
            index,
            width,
            height,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.passes - self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PassPlan {}

/// `value * 2^shift`，不超过 `cap`（`cap` 为 0 时按 `value` 处理）。
fn scaled_up(value: u32, shift: u32, cap: u32) -> u32 {
    let cap = cap.max(value) as u64;
    let scaled = (value as u64).checked_shl(shift).unwrap_or(u64::MAX);
    scaled.min(cap) as u32
}

/// 按几何信息对画布做方向校正、裁剪与渐进缩放。
///
/// `surface` 为解码得到的原始方向画布；`geometry` 的源矩形位于方向校正后的坐标系。
pub fn resample(
    surface: &Surface,
    geometry: &CropGeometry,
    orientation: Orientation,
    filter: FilterType,
    max_surface_pixels: u64,
) -> Result<Surface, NormalizeError> {
    let mut plan = PassPlan::new(geometry);
    let first = plan.next().ok_or(NormalizeError::InvalidDimensions {
        width: geometry.target_width,
        height: geometry.target_height,
    })?;

    let rect = SourceRect {
        x: geometry.source_x,
        y: geometry.source_y,
        width: geometry.source_width,
        height: geometry.source_height,
    };
    log::debug!(
        "🧩 第 {} 轮绘制：源矩形 {}x{}+{}+{} -> {}x{}（方向 {:?}）",
        first.index,
        rect.width,
        rect.height,
        rect.x,
        rect.y,
        first.width,
        first.height,
        orientation
    );
    let mut current = match orientation {
        Orientation::Normal => {
            surface.draw_region(rect, first.width, first.height, filter, max_surface_pixels)?
        }
        other => {
            let region = oriented_region(surface, rect, other, max_surface_pixels)?;
            if region.dimensions() == (first.width, first.height) {
                region
            } else {
                halve_into(region, first, filter, max_surface_pixels)?
            }
        }
    };

    for step in plan {
        log::debug!(
            "🧩 第 {} 轮绘制：{}x{} -> {}x{}",
            step.index,
            current.width(),
            current.height(),
            step.width,
            step.height
        );
        current = halve_into(current, step, filter, max_surface_pixels)?;
    }

    Ok(current)
}

/// 只把源矩形覆盖的原始像素取出并做方向校正，产出校正后坐标系下的源区域。
fn oriented_region(
    surface: &Surface,
    rect: SourceRect,
    orientation: Orientation,
    max_surface_pixels: u64,
) -> Result<Surface, NormalizeError> {
    let (raw_width, raw_height) = surface.dimensions();
    let (frame_width, frame_height) = orientation.logical_dimensions(raw_width, raw_height);
    if rect.x as u64 + rect.width as u64 > frame_width as u64
        || rect.y as u64 + rect.height as u64 > frame_height as u64
    {
        return Err(NormalizeError::SurfaceAllocation {
            width: rect.width,
            height: rect.height,
            reason: format!(
                "源矩形 {}x{}+{}+{} 超出校正后画面 {}x{}",
                rect.width, rect.height, rect.x, rect.y, frame_width, frame_height
            ),
        });
    }
    check_allocation(rect.width, rect.height, max_surface_pixels)?;

    let raw = orientation.to_raw_rect(rect, raw_width, raw_height);
    let view = imageops::crop_imm(surface.as_rgba(), raw.x, raw.y, raw.width, raw.height);
    Ok(Surface::from_rgba(orientation.apply(&*view)))
}

/// 接管上一轮画布，整帧绘制到下一轮尺寸后释放。
fn halve_into(
    previous: Surface,
    step: PassStep,
    filter: FilterType,
    max_surface_pixels: u64,
) -> Result<Surface, NormalizeError> {
    let (width, height) = previous.dimensions();
    previous.draw_region(
        SourceRect::full(width, height),
        step.width,
        step.height,
        filter,
        max_surface_pixels,
    )
}
