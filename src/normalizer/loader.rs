//! # 加载与解码模块
//!
//! ## 设计思路
//!
//! 统一处理不同来源（本地文件 / Data URI / 内存字节）的原始字节加载，
//! 并在“尽可能早”的阶段执行输入校验，尽快失败，减少不必要的内存与 CPU 消耗。
//!
//! ## 实现思路
//!
//! - 文件：`tokio::fs` 读取 metadata 做体积限制，再读取内容。
//! - Data URI：先按 payload 长度估算解码体积，超限直接拒绝，再解码。
//! - 媒体类型：优先按文件签名（`infer`）识别，识别不了再看声明类型或扩展名。
//! - 解码：放到阻塞线程池执行；先读 header 尺寸做像素上限检查，再完整解码，
//!   EXIF 方向与解码共用同一个 decoder。

use std::io::Cursor;
use std::path::Path;

use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};

use super::data_uri::{base64_to_bytes, estimated_decoded_len};
use super::orientation::Orientation;
use super::source::{ImageInfo, ImageSource, RawImageData};
use super::surface::Surface;
use super::{ImageNormalizer, NormalizeError, NormalizerConfig};

impl ImageNormalizer {
    /// 按来源加载原始字节并识别媒体类型。
    pub(super) async fn load_raw(
        &self,
        source: ImageSource,
        config: &NormalizerConfig,
    ) -> Result<RawImageData, NormalizeError> {
        match source {
            ImageSource::FilePath(path) => Self::load_from_file(&path, config).await,
            ImageSource::Base64(data) => Self::load_from_data_uri(&data, config),
            ImageSource::Bytes { bytes, name } => Self::load_from_bytes(bytes, name, config),
        }
    }

    async fn load_from_file(
        path: &Path,
        config: &NormalizerConfig,
    ) -> Result<RawImageData, NormalizeError> {
        log::info!("📁 开始读取本地图片 - 路径: {}", path.display());

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| NormalizeError::Load(format!("无法读取文件信息 {}：{}", path.display(), e)))?;

        if !metadata.is_file() {
            return Err(NormalizeError::InvalidInput(format!(
                "不是普通文件：{}",
                path.display()
            )));
        }
        Self::validate_file_size(metadata.len(), config)?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| NormalizeError::Load(format!("无法读取图片文件：{}", e)))?;
        let media_type = detect_media_type(&bytes, None, Some(path))?;

        Ok(RawImageData {
            original_byte_size: bytes.len() as u64,
            bytes,
            media_type,
            name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            source_hint: "file",
        })
    }

    fn load_from_data_uri(
        data: &str,
        config: &NormalizerConfig,
    ) -> Result<RawImageData, NormalizeError> {
        log::info!("📝 开始处理 base64 图片");

        let estimated = estimated_decoded_len(data);
        if estimated > config.max_file_size {
            return Err(NormalizeError::ResourceLimit(format!(
                "Base64 预计解码体积过大：{:.2} MB（限制：{:.2} MB）",
                estimated as f64 / 1024.0 / 1024.0,
                config.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }

        let payload = base64_to_bytes(data)?;
        Self::validate_file_size(payload.bytes.len() as u64, config)?;
        let media_type = detect_media_type(&payload.bytes, Some(payload.media_type.as_str()), None)?;

        Ok(RawImageData {
            original_byte_size: payload.bytes.len() as u64,
            bytes: payload.bytes,
            media_type,
            name: None,
            source_hint: "base64",
        })
    }

    fn load_from_bytes(
        bytes: Vec<u8>,
        name: Option<String>,
        config: &NormalizerConfig,
    ) -> Result<RawImageData, NormalizeError> {
        log::info!("📦 开始处理内存图片 - 名称: {}", name.as_deref().unwrap_or("-"));

        Self::validate_file_size(bytes.len() as u64, config)?;
        let media_type = detect_media_type(&bytes, None, name.as_deref().map(Path::new))?;

        Ok(RawImageData {
            original_byte_size: bytes.len() as u64,
            bytes,
            media_type,
            name,
            source_hint: "bytes",
        })
    }

    fn validate_file_size(len: u64, config: &NormalizerConfig) -> Result<(), NormalizeError> {
        if len > config.max_file_size {
            return Err(NormalizeError::ResourceLimit(format!(
                "文件过大：{:.2} MB（限制：{:.2} MB）",
                len as f64 / 1024.0 / 1024.0,
                config.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }
        Ok(())
    }

    /// 在阻塞线程池中解码，返回画布信息与原始字节。
    pub(super) async fn decode_raw(
        &self,
        raw: RawImageData,
        config: &NormalizerConfig,
    ) -> Result<(ImageInfo, Vec<u8>), NormalizeError> {
        let max_pixels = config.max_decoded_pixels;

        tokio::task::spawn_blocking(move || decode_blocking(raw, max_pixels))
            .await
            .map_err(|e| NormalizeError::Decode(format!("解码任务异常退出：{}", e)))?
    }
}

fn decode_blocking(
    raw: RawImageData,
    max_pixels: u64,
) -> Result<(ImageInfo, Vec<u8>), NormalizeError> {
    let (header_width, header_height) = guessed_reader(&raw.bytes)?
        .into_dimensions()
        .map_err(|e| NormalizeError::Decode(format!("无法读取图片尺寸：{}", e)))?;
    validate_pixel_limits(header_width, header_height, max_pixels)?;

    let mut decoder = guessed_reader(&raw.bytes)?
        .into_decoder()
        .map_err(|e| NormalizeError::Decode(format!("无法创建解码器：{}", e)))?;
    let orientation_tag = orientation_tag_from_decoder(&mut decoder);

    let decoded = DynamicImage::from_decoder(decoder)
        .map_err(|e| NormalizeError::Decode(format!("图片解码失败：{}", e)))?;
    let (width, height) = (decoded.width(), decoded.height());
    if width == 0 || height == 0 {
        return Err(NormalizeError::InvalidDimensions { width, height });
    }
    validate_pixel_limits(width, height, max_pixels)?;

    log::info!(
        "✅ 图片解码成功 - 来源: {} 类型: {} 尺寸: {}x{} EXIF 方向: {:?}",
        raw.source_hint,
        raw.media_type,
        width,
        height,
        orientation_tag
    );

    let info = ImageInfo {
        width,
        height,
        surface: Surface::from_image(decoded),
        media_type: raw.media_type,
        source_byte_size: raw.original_byte_size,
        orientation_tag,
        name: raw.name,
    };
    Ok((info, raw.bytes))
}

fn guessed_reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, NormalizeError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| NormalizeError::Decode(format!("无法识别图片格式：{}", e)))
}

fn validate_pixel_limits(width: u32, height: u32, max_pixels: u64) -> Result<(), NormalizeError> {
    let pixels = width as u64 * height as u64;
    if pixels > max_pixels {
        return Err(NormalizeError::ResourceLimit(format!(
            "图片像素过大：{} 像素（限制：{} 像素）",
            pixels, max_pixels
        )));
    }
    Ok(())
}

/// 没有 EXIF 块时返回 `None`；读取出错同样视为没有方向信息，不让流水线失败。
fn orientation_tag_from_decoder(decoder: &mut impl ImageDecoder) -> Option<u16> {
    match decoder.exif_metadata() {
        Ok(Some(_)) => {}
        Ok(None) => return None,
        Err(err) => {
            log::debug!("🔍 EXIF 读取失败，按无方向处理：{}", err);
            return None;
        }
    }

    decoder
        .orientation()
        .ok()
        .map(|orientation| Orientation::from(orientation).to_exif_tag())
}

/// 从图片字节读取 EXIF Orientation 标签。
pub fn read_exif_orientation(bytes: &[u8]) -> Option<u16> {
    let mut decoder = guessed_reader(bytes).ok()?.into_decoder().ok()?;
    orientation_tag_from_decoder(&mut decoder)
}

/// 识别媒体类型。
///
/// 签名优先；签名识别不了时依次使用声明类型、扩展名。结果必须是 `image/*`。
pub fn detect_media_type(
    bytes: &[u8],
    declared: Option<&str>,
    path: Option<&Path>,
) -> Result<String, NormalizeError> {
    if bytes.is_empty() {
        return Err(NormalizeError::InvalidInput("图片内容为空".to_string()));
    }

    if let Some(kind) = infer::get(bytes) {
        if kind.matcher_type() != infer::MatcherType::Image {
            return Err(NormalizeError::InvalidInput(format!(
                "文件签名不是图片类型：{}",
                kind.mime_type()
            )));
        }
        return Ok(canonical_media_type(kind.mime_type()));
    }

    if let Some(declared) = declared {
        let declared = declared.trim().to_ascii_lowercase();
        if declared.starts_with("image/") {
            return Ok(canonical_media_type(&declared));
        }
        return Err(NormalizeError::InvalidInput(format!(
            "声明的类型不是图片：{}",
            declared
        )));
    }

    path.and_then(|path| ImageFormat::from_path(path).ok())
        .map(|format| format.to_mime_type().to_string())
        .ok_or_else(|| NormalizeError::InvalidInput("无法识别图片类型".to_string()))
}

fn canonical_media_type(media_type: &str) -> String {
    match media_type {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        // APNG 与 PNG 共用容器，动画与否交给 `is_animated` 判断
        "image/apng" => "image/png".to_string(),
        other => other.to_string(),
    }
}

/// 是否为动图：GIF 一律视为动图；WebP 看动画标记；PNG 看是否为 APNG。
pub fn is_animated(bytes: &[u8], media_type: &str) -> bool {
    match media_type {
        "image/gif" => true,
        "image/webp" => WebPDecoder::new(Cursor::new(bytes))
            .map(|decoder| decoder.has_animation())
            .unwrap_or(false),
        "image/png" => PngDecoder::new(Cursor::new(bytes))
            .and_then(|decoder| decoder.is_apng())
            .unwrap_or(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::io::Write;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    /// 在 JPEG 的 SOI 之后插入只含 Orientation 的 APP1 段。
    fn jpeg_with_orientation(tag: u16) -> Vec<u8> {
        let image = image::RgbImage::from_pixel(8, 4, image::Rgb([200, 100, 50]));
        let mut jpeg = Cursor::new(Vec::new());
        image.write_to(&mut jpeg, ImageFormat::Jpeg).unwrap();
        let jpeg = jpeg.into_inner();

        let mut tiff = Vec::new();
        tiff.extend_from_slice(b"MM\x00\x2A\x00\x00\x00\x08");
        tiff.extend_from_slice(&1u16.to_be_bytes());
        tiff.extend_from_slice(&0x0112u16.to_be_bytes());
        tiff.extend_from_slice(&3u16.to_be_bytes());
        tiff.extend_from_slice(&1u32.to_be_bytes());
        tiff.extend_from_slice(&tag.to_be_bytes());
        tiff.extend_from_slice(&[0, 0]);
        tiff.extend_from_slice(&0u32.to_be_bytes());

        let mut app1 = Vec::new();
        app1.extend_from_slice(&[0xFF, 0xE1]);
        app1.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
        app1.extend_from_slice(b"Exif\x00\x00");
        app1.extend_from_slice(&tiff);

        let mut out = Vec::with_capacity(jpeg.len() + app1.len());
        out.extend_from_slice(&jpeg[..2]);
        out.extend_from_slice(&app1);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    #[test]
    fn detect_prefers_signature_over_declared_type() {
        let bytes = png_bytes(2, 2);
        assert_eq!(
            detect_media_type(&bytes, Some("image/jpeg"), None).unwrap(),
            "image/png"
        );
    }

    #[test]
    fn detect_rejects_non_image_signature() {
        let pdf = b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n";
        assert!(matches!(
            detect_media_type(pdf, Some("image/png"), None),
            Err(NormalizeError::InvalidInput(_))
        ));
        assert!(matches!(
            detect_media_type(&[], None, None),
            Err(NormalizeError::InvalidInput(_))
        ));
    }

    #[test]
    fn detect_falls_back_to_extension() {
        let unknown = [0x01u8, 0x02, 0x03, 0x04];
        assert_eq!(
            detect_media_type(&unknown, None, Some(Path::new("photo.JPG"))).unwrap(),
            "image/jpeg"
        );
        assert!(detect_media_type(&unknown, None, Some(Path::new("notes.txt"))).is_err());
    }

    #[test]
    fn gif_is_always_animated_and_static_png_is_not() {
        assert!(is_animated(&[], "image/gif"));
        assert!(!is_animated(&png_bytes(4, 4), "image/png"));
        assert!(!is_animated(b"garbage", "image/webp"));
    }

    #[test]
    fn reads_orientation_from_jpeg_exif() {
        assert_eq!(read_exif_orientation(&jpeg_with_orientation(6)), Some(6));
        assert_eq!(read_exif_orientation(&jpeg_with_orientation(3)), Some(3));
        assert_eq!(read_exif_orientation(&png_bytes(2, 2)), None);
    }

    #[tokio::test]
    async fn load_file_reads_bytes_and_name() {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        let bytes = png_bytes(3, 5);
        file.write_all(&bytes).unwrap();

        let normalizer = ImageNormalizer::new(NormalizerConfig::default()).unwrap();
        let config = normalizer.config_snapshot().unwrap();
        let raw = normalizer
            .load_raw(ImageSource::FilePath(file.path().to_path_buf()), &config)
            .await
            .unwrap();

        assert_eq!(raw.media_type, "image/png");
        assert_eq!(raw.original_byte_size, bytes.len() as u64);
        assert!(raw.name.as_deref().is_some_and(|n| n.ends_with(".png")));

        let (info, original) = normalizer.decode_raw(raw, &config).await.unwrap();
        assert_eq!((info.width, info.height), (3, 5));
        assert_eq!(original, bytes);
    }

    #[tokio::test]
    async fn load_missing_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let normalizer = ImageNormalizer::new(NormalizerConfig::default()).unwrap();
        let config = normalizer.config_snapshot().unwrap();

        let result = normalizer
            .load_raw(ImageSource::FilePath(dir.path().join("missing.png")), &config)
            .await;
        assert!(matches!(result, Err(NormalizeError::Load(_))));
    }

    #[tokio::test]
    async fn load_rejects_file_over_size_limit() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&png_bytes(16, 16)).unwrap();

        let normalizer = ImageNormalizer::new(NormalizerConfig {
            max_file_size: 8,
            ..NormalizerConfig::default()
        })
        .unwrap();
        let config = normalizer.config_snapshot().unwrap();

        let result = normalizer
            .load_raw(ImageSource::FilePath(file.path().to_path_buf()), &config)
            .await;
        assert!(matches!(result, Err(NormalizeError::ResourceLimit(_))));
    }

    #[tokio::test]
    async fn decode_enforces_pixel_limit() {
        let normalizer = ImageNormalizer::new(NormalizerConfig {
            max_decoded_pixels: 100,
            ..NormalizerConfig::default()
        })
        .unwrap();
        let config = normalizer.config_snapshot().unwrap();
        let raw = normalizer
            .load_raw(
                ImageSource::Bytes {
                    bytes: png_bytes(20, 20),
                    name: None,
                },
                &config,
            )
            .await
            .unwrap();

        let result = normalizer.decode_raw(raw, &config).await;
        assert!(matches!(result, Err(NormalizeError::ResourceLimit(_))));
    }

    #[tokio::test]
    async fn data_uri_with_text_payload_is_invalid_input() {
        let normalizer = ImageNormalizer::new(NormalizerConfig::default()).unwrap();
        let config = normalizer.config_snapshot().unwrap();

        // "hello world" 既无图片签名，声明类型也不是 image/*
        let result = normalizer
            .load_raw(
                ImageSource::Base64("data:text/plain;base64,aGVsbG8gd29ybGQ=".to_string()),
                &config,
            )
            .await;
        assert!(matches!(result, Err(NormalizeError::InvalidInput(_))));
    }
}
