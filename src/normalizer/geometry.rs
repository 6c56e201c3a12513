//! # 裁剪 / 缩放几何计算模块
//!
//! 所有函数均为纯函数，不涉及 I/O 与像素，可以脱离图片独立测试。
//!
//! # 设计思路
//!
//! - 先把原始宽高换算到“方向校正后”的逻辑画面，后续所有矩形都落在逻辑画面内。
//! - 体积预算到缩放比例的映射抽象为 [`ScaleStrategy`]，默认实现按像素面积估算编码体积，
//!   调用方可注入自己的估算函数。
//! - `pass_factor` 取满足 `target << p >= source` 的最小 `p`，保证每一轮缩放不超过 2 倍。
//!
//! # 实现步骤
//! 1. 校验宽高（0 视为前置条件被破坏）
//! 2. 计算逻辑宽高
//! 3. 按目标宽高比居中裁剪（可选）
//! 4. 按预算求缩放比例，四舍五入得到目标尺寸，最小 1px
//! 5. 计算缩放轮数

use serde::Serialize;

use super::config::NormalizeOptions;
use super::orientation::Orientation;
use super::NormalizeError;

/// 一次规范化所需的几何信息。
///
/// 源矩形位于**方向校正后**的画面坐标系内。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropGeometry {
    pub source_x: u32,
    pub source_y: u32,
    pub source_width: u32,
    pub source_height: u32,
    pub target_width: u32,
    pub target_height: u32,
    /// 渐进缩放的绘制轮数（≥1）。
    pub pass_factor: u32,
}

impl CropGeometry {
    /// 源矩形即完整画面且不缩放。
    pub fn is_identity(&self, logical_width: u32, logical_height: u32) -> bool {
        self.source_x == 0
            && self.source_y == 0
            && self.source_width == logical_width
            && self.source_height == logical_height
            && self.target_width == logical_width
            && self.target_height == logical_height
    }
}

/// 体积预算 → 线性缩放比例的策略。
///
/// 返回值会被夹到 `(0, 1]`；`>= 1` 表示已在预算内、无需缩小。
pub trait ScaleStrategy: Send + Sync {
    fn scale_ratio(&self, width: u32, height: u32, budget_bytes: u64) -> f64;
}

/// 默认策略：按 `width * height * bytes_per_pixel` 估算编码体积，
/// 比例取 `sqrt(budget / estimate)`。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AreaBudgetStrategy {
    pub bytes_per_pixel: f64,
}

impl AreaBudgetStrategy {
    pub fn new(bytes_per_pixel: f64) -> Self {
        Self { bytes_per_pixel }
    }

    /// 按输出格式选择经验系数。
    pub fn for_media_type(media_type: &str) -> Self {
        match media_type.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Self::new(0.25),
            "image/webp" => Self::new(0.2),
            _ => Self::new(1.0),
        }
    }
}

impl Default for AreaBudgetStrategy {
    fn default() -> Self {
        Self::new(0.25)
    }
}

impl ScaleStrategy for AreaBudgetStrategy {
    fn scale_ratio(&self, width: u32, height: u32, budget_bytes: u64) -> f64 {
        let estimate = width as f64 * height as f64 * self.bytes_per_pixel;
        if estimate <= budget_bytes as f64 {
            return 1.0;
        }
        (budget_bytes as f64 / estimate).sqrt()
    }
}

/// 计算裁剪矩形、目标尺寸与缩放轮数。
///
/// # 示例
/// ```rust
/// use image_normalizer::normalizer::{compute, AreaBudgetStrategy, NormalizeOptions, Orientation};
///
/// let geometry = compute(
///     4000,
///     3000,
///     Orientation::Rotate90,
///     &NormalizeOptions::default(),
///     &AreaBudgetStrategy::default(),
/// )?;
/// assert_eq!((geometry.target_width, geometry.target_height), (3000, 4000));
/// assert_eq!(geometry.pass_factor, 1);
/// # Ok::<(), image_normalizer::normalizer::NormalizeError>(())
/// ```
pub fn compute(
    width: u32,
    height: u32,
    orientation: Orientation,
    options: &NormalizeOptions,
    strategy: &dyn ScaleStrategy,
) -> Result<CropGeometry, NormalizeError> {
    if width == 0 || height == 0 {
        return Err(NormalizeError::InvalidDimensions { width, height });
    }

    let (logical_width, logical_height) = orientation.logical_dimensions(width, height);
    let (source_x, source_y, source_width, source_height) = match options.target_aspect {
        Some(aspect) => center_crop_to_aspect(logical_width, logical_height, aspect),
        None => (0, 0, logical_width, logical_height),
    };

    let ratio = match options.budget_bytes() {
        Some(budget) => clamp_ratio(strategy.scale_ratio(source_width, source_height, budget)),
        None => 1.0,
    };

    let (target_width, target_height) = if ratio >= 1.0 {
        (source_width, source_height)
    } else {
        (
            scale_dimension(source_width, ratio),
            scale_dimension(source_height, ratio),
        )
    };

    Ok(CropGeometry {
        source_x,
        source_y,
        source_width,
        source_height,
        target_width,
        target_height,
        pass_factor: pass_factor(
            (source_width, source_height),
            (target_width, target_height),
        ),
    })
}

/// 满足 `target << p >= source`（两个轴）的最小 `p`，至少为 1。
///
/// 等价于 `max(1, ceil(log2(source / target)))`，但全程整数运算，
/// 不会因浮点误差在 2 的整数次幂处多算一轮。
pub fn pass_factor(source: (u32, u32), target: (u32, u32)) -> u32 {
    let (source_w, source_h) = (source.0 as u64, source.1 as u64);
    let (target_w, target_h) = (target.0.max(1) as u64, target.1.max(1) as u64);

    let mut passes = 1u32;
    while (target_w << passes) < source_w || (target_h << passes) < source_h {
        passes += 1;
    }
    passes
}

/// 在画面中居中裁掉较长的一边，使剩余区域符合 `aspect`。
fn center_crop_to_aspect(width: u32, height: u32, aspect: (u32, u32)) -> (u32, u32, u32, u32) {
    let (aspect_w, aspect_h) = (aspect.0.max(1) as u64, aspect.1.max(1) as u64);
    let (w, h) = (width as u64, height as u64);

    if w * aspect_h > h * aspect_w {
        // 画面更宽：保留高度，裁宽度
        let crop_w = ((h * aspect_w + aspect_h / 2) / aspect_h).clamp(1, w);
        let x = (w - crop_w) / 2;
        (x as u32, 0, crop_w as u32, height)
    } else {
        // 画面更高（或比例一致）：保留宽度，裁高度
        let crop_h = ((w * aspect_h + aspect_w / 2) / aspect_w).clamp(1, h);
        let y = (h - crop_h) / 2;
        (0, y as u32, width, crop_h as u32)
    }
}

fn clamp_ratio(ratio: f64) -> f64 {
    if ratio.is_nan() || ratio <= 0.0 {
        // 预算极小时比例趋近 0，交给 scale_dimension 夹到 1px
        return f64::MIN_POSITIVE;
    }
    ratio.min(1.0)
}

fn scale_dimension(value: u32, ratio: f64) -> u32 {
    ((value as f64 * ratio).round() as u32).clamp(1, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::orientation::resolve;
    use proptest::prelude::*;

    fn default_strategy() -> AreaBudgetStrategy {
        AreaBudgetStrategy::default()
    }

    // =========================================================================
    // compute
    // =========================================================================

    #[test]
    fn compute_without_budget_keeps_full_frame() {
        let geometry = compute(
            1920,
            1080,
            Orientation::Normal,
            &NormalizeOptions::default(),
            &default_strategy(),
        )
        .unwrap();

        assert!(geometry.is_identity(1920, 1080));
        assert_eq!(geometry.pass_factor, 1);
    }

    #[test]
    fn compute_swaps_logical_frame_for_rotated_orientations() {
        let geometry = compute(
            4000,
            3000,
            Orientation::FlipHRotate270,
            &NormalizeOptions::default(),
            &default_strategy(),
        )
        .unwrap();

        assert_eq!((geometry.source_width, geometry.source_height), (3000, 4000));
        assert_eq!((geometry.target_width, geometry.target_height), (3000, 4000));
    }

    #[test]
    fn compute_large_jpeg_under_500_kib_needs_multiple_passes() {
        // 4000x3000 * 0.25 B/px ≈ 2.86 MiB 估算，远超 500 KiB
        let geometry = compute(
            4000,
            3000,
            Orientation::Normal,
            &NormalizeOptions::new(Some(500)),
            &default_strategy(),
        )
        .unwrap();

        let estimate = geometry.target_width as f64 * geometry.target_height as f64 * 0.25;
        assert!(estimate <= 500.0 * 1024.0 * 1.01);
        assert!(geometry.target_width < 4000);
        assert!(geometry.pass_factor >= 2);
    }

    #[test]
    fn compute_tiny_budget_clamps_to_one_pixel() {
        let strategy = AreaBudgetStrategy::new(1_000_000.0);
        let geometry = compute(
            4000,
            3000,
            Orientation::Normal,
            &NormalizeOptions::new(Some(1)),
            &strategy,
        )
        .unwrap();

        assert_eq!((geometry.target_width, geometry.target_height), (1, 1));
        assert_eq!(geometry.pass_factor, 12);
    }

    #[test]
    fn compute_rejects_zero_dimensions() {
        let result = compute(
            0,
            100,
            Orientation::Normal,
            &NormalizeOptions::default(),
            &default_strategy(),
        );

        assert!(matches!(
            result,
            Err(NormalizeError::InvalidDimensions { width: 0, height: 100 })
        ));
    }

    #[test]
    fn compute_center_crops_wide_frame_to_square() {
        let options = NormalizeOptions {
            target_aspect: Some((1, 1)),
            ..NormalizeOptions::default()
        };
        let geometry =
            compute(800, 600, Orientation::Normal, &options, &default_strategy()).unwrap();

        assert_eq!(geometry.source_x, 100);
        assert_eq!(geometry.source_y, 0);
        assert_eq!((geometry.source_width, geometry.source_height), (600, 600));
        assert_eq!((geometry.target_width, geometry.target_height), (600, 600));
    }

    #[test]
    fn compute_center_crops_tall_frame_after_orientation() {
        // 原始 800x600，旋转后逻辑画面 600x800；裁成 3:2 横图
        let options = NormalizeOptions {
            target_aspect: Some((3, 2)),
            ..NormalizeOptions::default()
        };
        let geometry =
            compute(800, 600, Orientation::Rotate270, &options, &default_strategy()).unwrap();

        assert_eq!((geometry.source_width, geometry.source_height), (600, 400));
        assert_eq!((geometry.source_x, geometry.source_y), (0, 200));
    }

    #[test]
    fn area_strategy_returns_one_when_within_budget() {
        let strategy = AreaBudgetStrategy::new(1.0);
        assert_eq!(strategy.scale_ratio(100, 100, 10_000), 1.0);
        assert!((strategy.scale_ratio(200, 200, 10_000) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn media_type_selects_bytes_per_pixel() {
        assert_eq!(AreaBudgetStrategy::for_media_type("IMAGE/JPEG").bytes_per_pixel, 0.25);
        assert_eq!(AreaBudgetStrategy::for_media_type("image/png").bytes_per_pixel, 1.0);
    }

    // =========================================================================
    // pass_factor
    // =========================================================================

    #[test]
    fn pass_factor_is_one_up_to_two_times() {
        assert_eq!(pass_factor((100, 100), (100, 100)), 1);
        assert_eq!(pass_factor((200, 200), (100, 100)), 1);
        assert_eq!(pass_factor((201, 200), (100, 100)), 2);
    }

    #[test]
    fn pass_factor_counts_halvings_for_power_of_two_ratios() {
        assert_eq!(pass_factor((1024, 1024), (128, 128)), 3);
        assert_eq!(pass_factor((1025, 1024), (128, 128)), 4);
    }

    proptest! {
        #[test]
        fn prop_source_rect_stays_inside_oriented_frame(
            width in 1u32..20_000,
            height in 1u32..20_000,
            tag in 0u16..10,
            max_kib in proptest::option::of(1u32..50_000),
            aspect in proptest::option::of((1u32..32, 1u32..32)),
        ) {
            let orientation = resolve(Some(tag));
            let options = NormalizeOptions {
                max_size_kib: max_kib,
                target_aspect: aspect,
                ..NormalizeOptions::default()
            };
            let geometry = compute(width, height, orientation, &options, &default_strategy()).unwrap();
            let (logical_w, logical_h) = orientation.logical_dimensions(width, height);

            prop_assert!(geometry.source_x + geometry.source_width <= logical_w);
            prop_assert!(geometry.source_y + geometry.source_height <= logical_h);
            prop_assert!(geometry.source_width >= 1 && geometry.source_height >= 1);
            prop_assert!(geometry.target_width >= 1 && geometry.target_height >= 1);
            prop_assert!(geometry.target_width <= geometry.source_width);
            prop_assert!(geometry.target_height <= geometry.source_height);
            prop_assert!(geometry.pass_factor >= 1);
        }

        #[test]
        fn prop_within_budget_means_no_resize(
            width in 1u32..4_000,
            height in 1u32..4_000,
        ) {
            // 1.0 B/px 时 width*height 字节一定落在预算内
            let budget_kib = ((width as u64 * height as u64) / 1024 + 1) as u32;
            let geometry = compute(
                width,
                height,
                Orientation::Normal,
                &NormalizeOptions::new(Some(budget_kib)),
                &AreaBudgetStrategy::new(1.0),
            ).unwrap();

            prop_assert_eq!(geometry.pass_factor, 1);
            prop_assert_eq!((geometry.target_width, geometry.target_height), (width, height));
        }

        #[test]
        fn prop_pass_factor_matches_ceil_log2(
            target in 1u32..512,
            shift in 0u32..6,
            extra in 0u32..512,
        ) {
            let source = (target << shift) + extra;
            let expected = ((source as f64 / target as f64).log2().ceil() as u32).max(1);
            prop_assert_eq!(pass_factor((source, source), (target, target)), expected);
        }
    }
}
