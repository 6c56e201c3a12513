//! # 方向解析模块
//!
//! ## 设计思路
//!
//! 将 EXIF Orientation 标签（1~8）映射为封闭枚举，而不是在各处散落数字常量，
//! 让编译器替我们检查分支是否穷尽。
//!
//! | 标签 | 枚举 | 变换（先镜像，再顺时针旋转） |
//! |---|---|---|
//! | 1 | `Normal` | 无 |
//! | 2 | `FlipH` | 水平镜像 |
//! | 3 | `Rotate180` | 旋转 180° |
//! | 4 | `FlipV` | 垂直镜像 |
//! | 5 | `FlipHRotate270` | 水平镜像 + 旋转 270°（转置） |
//! | 6 | `Rotate90` | 旋转 90° |
//! | 7 | `FlipHRotate90` | 水平镜像 + 旋转 90°（反转置） |
//! | 8 | `Rotate270` | 旋转 270° |
//!
//! 标签 5~8 的逻辑画面宽高互换。

use image::imageops;
use image::{GenericImageView, Rgba, RgbaImage};

use super::surface::SourceRect;

/// 已解析的图片方向。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Orientation {
    #[default]
    Normal,
    Rotate90,
    Rotate180,
    Rotate270,
    FlipH,
    FlipV,
    FlipHRotate90,
    FlipHRotate270,
}

/// 将 EXIF 标签解析为方向。缺失或越界（非 1~8）一律视为 `Normal`。
pub fn resolve(tag: Option<u16>) -> Orientation {
    match tag {
        Some(2) => Orientation::FlipH,
        Some(3) => Orientation::Rotate180,
        Some(4) => Orientation::FlipV,
        Some(5) => Orientation::FlipHRotate270,
        Some(6) => Orientation::Rotate90,
        Some(7) => Orientation::FlipHRotate90,
        Some(8) => Orientation::Rotate270,
        _ => Orientation::Normal,
    }
}

impl Orientation {
    pub fn to_exif_tag(self) -> u16 {
        match self {
            Self::Normal => 1,
            Self::FlipH => 2,
            Self::Rotate180 => 3,
            Self::FlipV => 4,
            Self::FlipHRotate270 => 5,
            Self::Rotate90 => 6,
            Self::FlipHRotate90 => 7,
            Self::Rotate270 => 8,
        }
    }

    /// 逻辑画面是否相对原始像素宽高互换。
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Self::Rotate90 | Self::Rotate270 | Self::FlipHRotate90 | Self::FlipHRotate270
        )
    }

    /// 原始宽高 → 逻辑（校正后）宽高。
    pub fn logical_dimensions(self, width: u32, height: u32) -> (u32, u32) {
        if self.swaps_dimensions() {
            (height, width)
        } else {
            (width, height)
        }
    }

    /// 按“先镜像、后旋转”的顺序把方向校正应用到像素上。
    ///
    /// 接受任意像素视图，裁剪出的子区域可以直接传入而无需先复制。
    pub fn apply<I>(self, pixels: &I) -> RgbaImage
    where
        I: GenericImageView<Pixel = Rgba<u8>>,
    {
        match self {
            Self::Normal => {
                let (width, height) = pixels.dimensions();
                RgbaImage::from_fn(width, height, |x, y| pixels.get_pixel(x, y))
            }
            Self::Rotate90 => imageops::rotate90(pixels),
            Self::Rotate180 => imageops::rotate180(pixels),
            Self::Rotate270 => imageops::rotate270(pixels),
            Self::FlipH => imageops::flip_horizontal(pixels),
            Self::FlipV => imageops::flip_vertical(pixels),
            Self::FlipHRotate90 => imageops::rotate90(&imageops::flip_horizontal(pixels)),
            Self::FlipHRotate270 => imageops::rotate270(&imageops::flip_horizontal(pixels)),
        }
    }

    /// 校正后坐标系中的矩形 → 原始像素坐标系中覆盖同一批像素的矩形。
    ///
    /// `rect` 必须位于校正后的画面内；`raw_width` / `raw_height` 为原始像素宽高。
    pub fn to_raw_rect(self, rect: SourceRect, raw_width: u32, raw_height: u32) -> SourceRect {
        let SourceRect {
            x,
            y,
            width: w,
            height: h,
        } = rect;
        let (rx, ry, rw, rh) = match self {
            Self::Normal => (x, y, w, h),
            Self::Rotate90 => (y, raw_height - x - w, h, w),
            Self::Rotate180 => (raw_width - x - w, raw_height - y - h, w, h),
            Self::Rotate270 => (raw_width - y - h, x, h, w),
            Self::FlipH => (raw_width - x - w, y, w, h),
            Self::FlipV => (x, raw_height - y - h, w, h),
            Self::FlipHRotate90 => (raw_width - y - h, raw_height - x - w, h, w),
            Self::FlipHRotate270 => (y, x, h, w),
        };
        SourceRect {
            x: rx,
            y: ry,
            width: rw,
            height: rh,
        }
    }
}

impl From<image::metadata::Orientation> for Orientation {
    fn from(value: image::metadata::Orientation) -> Self {
        use image::metadata::Orientation as Exif;

        match value {
            Exif::NoTransforms => Self::Normal,
            Exif::Rotate90 => Self::Rotate90,
            Exif::Rotate180 => Self::Rotate180,
            Exif::Rotate270 => Self::Rotate270,
            Exif::FlipHorizontal => Self::FlipH,
            Exif::FlipVertical => Self::FlipV,
            Exif::Rotate90FlipH => Self::FlipHRotate270,
            Exif::Rotate270FlipH => Self::FlipHRotate90,
        }
    }
}
