//! # 画布模块
//!
//! ## 设计思路
//!
//! `Surface` 是流水线里唯一的像素容器，对外只提供两类能力：
//! “把某个矩形区域绘制到新尺寸的画布上”和“导出 RGBA 像素”。
//! 缩放统一走 `fast_image_resize`，失败时回退到 `image::imageops`。
//!
//! ## 实现思路
//!
//! - 画布分配前先做零面积与像素上限检查，失败返回 `SurfaceAllocation`。
//! - 绘制使用 RGBA8（`U8x4`），由 `fast_image_resize` 负责 alpha 预乘。
//! - 绘制总是产出新的画布，输入画布的所有权由调用方决定何时释放。

use fast_image_resize as fr;
use image::imageops::FilterType;
use image::{DynamicImage, ImageBuffer, Rgba, RgbaImage};

use super::NormalizeError;

/// 画布内的矩形区域。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl SourceRect {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// RGBA 像素画布。
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pixels: RgbaImage,
}

impl Surface {
    pub fn from_image(image: DynamicImage) -> Self {
        Self {
            pixels: image.into_rgba8(),
        }
    }

    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn as_rgba(&self) -> &RgbaImage {
        &self.pixels
    }

    /// 把 `rect` 区域缩放绘制到一块 `width x height` 的新画布上。
    pub fn draw_region(
        &self,
        rect: SourceRect,
        width: u32,
        height: u32,
        filter: FilterType,
        max_pixels: u64,
    ) -> Result<Surface, NormalizeError> {
        check_allocation(width, height, max_pixels)?;

        let (surface_w, surface_h) = self.dimensions();
        if rect.width == 0
            || rect.height == 0
            || rect.x as u64 + rect.width as u64 > surface_w as u64
            || rect.y as u64 + rect.height as u64 > surface_h as u64
        {
            return Err(NormalizeError::SurfaceAllocation {
                width,
                height,
                reason: format!(
                    "源矩形 {}x{}+{}+{} 超出画布 {}x{}",
                    rect.width, rect.height, rect.x, rect.y, surface_w, surface_h
                ),
            });
        }

        if rect == SourceRect::full(surface_w, surface_h) && (width, height) == (surface_w, surface_h)
        {
            return Ok(self.clone());
        }

        match Self::resize_with_fast_image_resize(&self.pixels, rect, width, height, filter) {
            Ok(pixels) => Ok(Self { pixels }),
            Err(err) => {
                log::warn!("⚠️ fast_image_resize 绘制失败，回退 imageops::resize：{}", err);
                let cropped =
                    image::imageops::crop_imm(&self.pixels, rect.x, rect.y, rect.width, rect.height)
                        .to_image();
                Ok(Self {
                    pixels: image::imageops::resize(&cropped, width, height, filter),
                })
            }
        }
    }

    fn resize_with_fast_image_resize(
        pixels: &RgbaImage,
        rect: SourceRect,
        width: u32,
        height: u32,
        filter: FilterType,
    ) -> Result<RgbaImage, NormalizeError> {
        let (src_width, src_height) = pixels.dimensions();
        let src_image = fr::images::ImageRef::new(
            src_width,
            src_height,
            pixels.as_raw(),
            fr::PixelType::U8x4,
        )
        .map_err(|e| resize_failure(width, height, format!("构建源图像缓冲失败：{}", e)))?;

        let mut dst_image = fr::images::Image::new(width, height, fr::PixelType::U8x4);

        let mut resizer = fr::Resizer::new();
        let options = fr::ResizeOptions::new()
            .resize_alg(Self::to_fast_alg(filter))
            .crop(
                rect.x as f64,
                rect.y as f64,
                rect.width as f64,
                rect.height as f64,
            );

        resizer
            .resize(&src_image, &mut dst_image, Some(&options))
            .map_err(|e| resize_failure(width, height, format!("fast_image_resize 执行失败：{}", e)))?;

        ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(width, height, dst_image.into_vec())
            .ok_or_else(|| resize_failure(width, height, "fast_image_resize 输出缓冲长度异常".to_string()))
    }

    fn to_fast_alg(filter: FilterType) -> fr::ResizeAlg {
        match filter {
            FilterType::Nearest => fr::ResizeAlg::Nearest,
            FilterType::Triangle => fr::ResizeAlg::Convolution(fr::FilterType::Bilinear),
            FilterType::CatmullRom => fr::ResizeAlg::Convolution(fr::FilterType::CatmullRom),
            FilterType::Gaussian => fr::ResizeAlg::Convolution(fr::FilterType::Mitchell),
            FilterType::Lanczos3 => fr::ResizeAlg::Convolution(fr::FilterType::Lanczos3),
        }
    }
}

/// 绘制失败归入重采样阶段的 `SurfaceAllocation`。
fn resize_failure(width: u32, height: u32, reason: String) -> NormalizeError {
    NormalizeError::SurfaceAllocation {
        width,
        height,
        reason,
    }
}

pub(crate) fn check_allocation(width: u32, height: u32, max_pixels: u64) -> Result<(), NormalizeError> {
    if width == 0 || height == 0 {
        return Err(NormalizeError::SurfaceAllocation {
            width,
            height,
            reason: "面积为 0".to_string(),
        });
    }

    let pixels = width as u64 * height as u64;
    if pixels > max_pixels {
        return Err(NormalizeError::SurfaceAllocation {
            width,
            height,
            reason: format!("{} 像素超过上限 {}", pixels, max_pixels),
        });
    }

    Ok(())
}
