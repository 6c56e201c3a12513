//! # 编码模块
//!
//! ## 设计思路
//!
//! 把最终画布序列化为目标媒体类型，同时产出 data URI 与二进制字节。
//! 二进制字节不直接取编码器输出，而是再经 [`base64_to_bytes`] 从 data URI 解回，
//! 保证两者逐字节一致，`byte_size` 就是解码后长度。
//!
//! ## 实现思路
//!
//! - JPEG 不支持 alpha，编码前转 RGB8，质量取配置值。
//! - WebP 使用 `image` 自带的无损编码器。
//! - 其余受支持格式直接走 `ImageBuffer::write_to`。

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};

use super::data_uri::{base64_to_bytes, bytes_to_data_uri};
use super::surface::Surface;
use super::NormalizeError;

/// 编码结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub data_uri: String,
    pub bytes: Vec<u8>,
    pub byte_size: usize,
}

/// 媒体类型 → 输出格式；不支持时返回 `None`。
fn output_format(media_type: &str) -> Option<ImageFormat> {
    match media_type.trim().to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
        "image/png" => Some(ImageFormat::Png),
        "image/webp" => Some(ImageFormat::WebP),
        "image/bmp" => Some(ImageFormat::Bmp),
        "image/gif" => Some(ImageFormat::Gif),
        _ => None,
    }
}

pub fn is_supported_media_type(media_type: &str) -> bool {
    output_format(media_type).is_some()
}

/// 把画布编码为 `media_type`。
pub fn encode(
    surface: &Surface,
    media_type: &str,
    jpeg_quality: u8,
) -> Result<EncodedImage, NormalizeError> {
    let format = output_format(media_type)
        .ok_or_else(|| NormalizeError::UnsupportedMediaType(media_type.to_string()))?;

    let raw = encode_raw(surface, format, jpeg_quality)?;
    let data_uri = bytes_to_data_uri(format.to_mime_type(), &raw);
    let bytes = base64_to_bytes(&data_uri)?.bytes;
    let byte_size = bytes.len();

    log::debug!(
        "🗜️ 编码完成 - 格式: {} 尺寸: {}x{} 体积: {:.2} KiB",
        format.to_mime_type(),
        surface.width(),
        surface.height(),
        byte_size as f64 / 1024.0
    );

    Ok(EncodedImage {
        data_uri,
        bytes,
        byte_size,
    })
}

fn encode_raw(
    surface: &Surface,
    format: ImageFormat,
    jpeg_quality: u8,
) -> Result<Vec<u8>, NormalizeError> {
    let mut buffer = Cursor::new(Vec::new());

    match format {
        ImageFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(surface.as_rgba().clone()).to_rgb8();
            let encoder = JpegEncoder::new_with_quality(&mut buffer, jpeg_quality.clamp(1, 100));
            rgb.write_with_encoder(encoder)
                .map_err(|e| encode_error(format, e))?;
        }
        _ => {
            surface
                .as_rgba()
                .write_to(&mut buffer, format)
                .map_err(|e| encode_error(format, e))?;
        }
    }

    Ok(buffer.into_inner())
}

/// 编码器无法序列化该格式（像素布局不受支持或底层写入失败）。
fn encode_error(format: ImageFormat, err: image::ImageError) -> NormalizeError {
    NormalizeError::UnsupportedMediaType(format!("{} 编码失败：{}", format.to_mime_type(), err))
}
