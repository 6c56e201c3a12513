//! 端到端场景测试：用 `image` 现场生成图片，走完整条规范化流水线。

use std::io::Cursor;

use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use image_normalizer::normalizer::{
    base64_to_bytes, bytes_to_data_uri, ImageNormalizer, ImageSource, NormalizeError,
    NormalizeOptions, NormalizerConfig, NormalizerService, Outcome,
};

fn jpeg(image: &RgbImage) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Jpeg)
        .expect("jpeg encode failed");
    buffer.into_inner()
}

fn rgba_bytes(image: &RgbaImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, format).expect("encode failed");
    buffer.into_inner()
}

fn smooth_gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width) as u8,
            (y * 255 / height) as u8,
            128,
        ])
    })
}

fn noise(width: u32, height: u32) -> RgbImage {
    let mut state: u32 = 0x9E37_79B9;
    RgbImage::from_fn(width, height, |_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let [a, b, c, _] = state.to_le_bytes();
        Rgb([a, b, c])
    })
}

/// 在 SOI 之后插入只含 Orientation 的 EXIF APP1 段。
fn with_exif_orientation(jpeg: &[u8], tag: u16) -> Vec<u8> {
    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"MM\x00\x2A\x00\x00\x00\x08");
    tiff.extend_from_slice(&1u16.to_be_bytes());
    tiff.extend_from_slice(&0x0112u16.to_be_bytes());
    tiff.extend_from_slice(&3u16.to_be_bytes());
    tiff.extend_from_slice(&1u32.to_be_bytes());
    tiff.extend_from_slice(&tag.to_be_bytes());
    tiff.extend_from_slice(&[0, 0]);
    tiff.extend_from_slice(&0u32.to_be_bytes());

    let mut out = Vec::with_capacity(jpeg.len() + tiff.len() + 10);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
    out.extend_from_slice(b"Exif\x00\x00");
    out.extend_from_slice(&tiff);
    out.extend_from_slice(&jpeg[2..]);
    out
}

fn normalizer() -> ImageNormalizer {
    ImageNormalizer::new(NormalizerConfig::default()).expect("normalizer init failed")
}

fn source(bytes: Vec<u8>, name: &str) -> ImageSource {
    ImageSource::Bytes {
        bytes,
        name: Some(name.to_string()),
    }
}

#[tokio::test]
async fn large_jpeg_is_downscaled_progressively_under_budget() {
    let bytes = jpeg(&smooth_gradient(4000, 3000));

    let result = normalizer()
        .normalize(source(bytes, "large.jpg"), &NormalizeOptions::new(Some(500)))
        .await
        .expect("normalize failed");

    let geometry = result.geometry.expect("geometry missing");
    assert_eq!(result.outcome, Outcome::Encoded);
    assert!(geometry.pass_factor >= 2, "pass_factor = {}", geometry.pass_factor);
    assert!(result.byte_size as f64 / 1024.0 <= 500.0);
    assert!(result.width < 4000 && result.height < 3000);
    assert_eq!(
        (result.width, result.height),
        (geometry.target_width, geometry.target_height)
    );
    assert_eq!(result.media_type, "image/jpeg");

    // data URI 与二进制字节逐字节一致
    let payload = base64_to_bytes(&result.data_uri).expect("data uri should decode");
    assert_eq!(payload.bytes, result.bytes);
    assert_eq!(payload.bytes.len(), result.byte_size);
}

#[tokio::test]
async fn animated_gif_bypasses_pipeline_unchanged() {
    let gif = rgba_bytes(
        &RgbaImage::from_pixel(100, 100, Rgba([200, 10, 10, 255])),
        ImageFormat::Gif,
    );

    let result = normalizer()
        .normalize(source(gif.clone(), "spinner.gif"), &NormalizeOptions::new(Some(1)))
        .await
        .expect("gif bypass failed");

    assert_eq!(result.outcome, Outcome::BypassedAnimated);
    assert_eq!(result.bytes, gif);
    assert_eq!(result.byte_size, gif.len());
    assert_eq!((result.width, result.height), (100, 100));
    assert!(result.geometry.is_none());
    assert!(result.data_uri.starts_with("data:image/gif;base64,"));
}

#[tokio::test]
async fn gif_is_reencoded_when_bypass_disabled() {
    let gif = rgba_bytes(
        &RgbaImage::from_pixel(100, 100, Rgba([10, 200, 10, 255])),
        ImageFormat::Gif,
    );
    let options = NormalizeOptions {
        bypass_animated: false,
        force_resize: true,
        ..NormalizeOptions::default()
    };

    let result = normalizer()
        .normalize(source(gif, "still.gif"), &options)
        .await
        .expect("gif encode failed");

    assert_eq!(result.outcome, Outcome::Encoded);
    assert_eq!(result.media_type, "image/gif");
    assert_eq!((result.width, result.height), (100, 100));
}

#[tokio::test]
async fn noisy_jpeg_over_tiny_budget_fails_with_size_exceeded() {
    let bytes = jpeg(&noise(4000, 3000));

    let err = normalizer()
        .normalize(source(bytes, "noise.jpg"), &NormalizeOptions::new(Some(1)))
        .await
        .expect_err("1 KiB budget cannot be met");

    match err {
        NormalizeError::SizeExceeded {
            actual_kib,
            limit_kib,
        } => {
            assert_eq!(limit_kib, 1);
            assert!(actual_kib > 1.0);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn malformed_data_uri_is_rejected() {
    for input in ["not a data uri", "data:image/png,iVBORw0KGgo=", "data:image/png;base64,%%%"] {
        let result = normalizer()
            .normalize(
                ImageSource::Base64(input.to_string()),
                &NormalizeOptions::default(),
            )
            .await;

        assert!(
            matches!(result, Err(NormalizeError::MalformedBase64(_))),
            "{input:?}: {result:?}"
        );
    }
}

#[tokio::test]
async fn exif_rotation_swaps_output_dimensions() {
    let bytes = with_exif_orientation(&jpeg(&smooth_gradient(80, 40)), 6);

    let result = normalizer()
        .normalize(source(bytes, "portrait.jpg"), &NormalizeOptions::default())
        .await
        .expect("normalize failed");

    assert_eq!(result.raw_info.orientation_tag, Some(6));
    assert_eq!(result.outcome, Outcome::Encoded);
    assert_eq!((result.width, result.height), (40, 80));
    assert_eq!((result.raw_info.width, result.raw_info.height), (80, 40));
}

#[tokio::test]
async fn data_uri_input_round_trips_through_pipeline() {
    let png = rgba_bytes(
        &RgbaImage::from_fn(300, 200, |x, y| Rgba([x as u8, y as u8, 0, 255])),
        ImageFormat::Png,
    );
    let options = NormalizeOptions {
        target_aspect: Some((1, 1)),
        ..NormalizeOptions::default()
    };

    let result = normalizer()
        .normalize(ImageSource::Base64(bytes_to_data_uri("image/png", &png)), &options)
        .await
        .expect("normalize failed");

    assert_eq!((result.width, result.height), (200, 200));
    let decoded = image::load_from_memory(&result.bytes).expect("output should decode");
    assert_eq!((decoded.width(), decoded.height()), (200, 200));
}

#[tokio::test]
async fn file_source_is_read_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    let path = dir.path().join("photo.jpg");
    std::fs::write(&path, jpeg(&smooth_gradient(640, 480))).expect("write failed");

    let result = normalizer()
        .normalize(ImageSource::FilePath(path), &NormalizeOptions::new(Some(20)))
        .await
        .expect("normalize failed");

    assert_eq!(result.raw_info.name.as_deref(), Some("photo.jpg"));
    assert!(result.size_kib() <= 20.0);
}

#[tokio::test]
async fn service_cancel_of_finished_request_is_noop() {
    let service = NormalizerService::new().expect("service init failed");
    let png = rgba_bytes(&RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255])), ImageFormat::Png);

    service
        .process("upload-1", source(png, "dot.png"), &NormalizeOptions::default())
        .await
        .expect("process failed");

    assert!(!service.cancel("upload-1").expect("cancel failed"));
}
