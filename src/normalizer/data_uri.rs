//! # Data URI 编解码
//!
//! `data:<type>/<subtype>;base64,<payload>` 与二进制字节之间的互转。
//! 前缀形态不符或 payload 无法解码时统一返回 `MalformedBase64`。

use base64::{Engine as _, engine::general_purpose};
use once_cell::sync::Lazy;
use regex::Regex;

use super::NormalizeError;

// 子类型允许 `svg+xml`、`vnd.microsoft.icon` 这类带符号的写法
static DATA_URI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^data:([\w.+-]+/[\w.+-]+);base64,(.+)$")
        .expect("data uri regex must compile")
});

/// 解析后的 data URI。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUriPayload {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

/// 把 data URI 解码为带媒体类型标记的字节。
///
/// # 示例
/// ```rust
/// use image_normalizer::normalizer::base64_to_bytes;
///
/// let payload = base64_to_bytes("data:image/png;base64,iVBORw0KGgo=")?;
/// assert_eq!(payload.media_type, "image/png");
/// assert_eq!(payload.bytes, b"\x89PNG\r\n\x1a\n");
/// # Ok::<(), image_normalizer::normalizer::NormalizeError>(())
/// ```
pub fn base64_to_bytes(data_uri: &str) -> Result<DataUriPayload, NormalizeError> {
    let captures = DATA_URI_RE.captures(data_uri.trim()).ok_or_else(|| {
        NormalizeError::MalformedBase64(format!(
            "缺少 data:<type>/<subtype>;base64, 前缀：{}",
            preview(data_uri)
        ))
    })?;

    let media_type = captures[1].to_ascii_lowercase();
    let bytes = general_purpose::STANDARD
        .decode(captures[2].trim())
        .map_err(|e| NormalizeError::MalformedBase64(format!("Base64 解码失败：{}", e)))?;

    Ok(DataUriPayload { media_type, bytes })
}

/// 把字节编码为 `data:<media_type>;base64,<payload>`。
pub fn bytes_to_data_uri(media_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        media_type,
        general_purpose::STANDARD.encode(bytes)
    )
}

/// 估算 data URI payload 解码后的字节上限，用于在解码前拒绝超大输入。
pub(crate) fn estimated_decoded_len(data_uri: &str) -> u64 {
    let payload = match data_uri.find(";base64,") {
        Some(start) => &data_uri[start + 8..],
        None => data_uri,
    };
    (payload.len() as u64).div_ceil(4) * 3
}

fn preview(value: &str) -> String {
    const MAX: usize = 32;
    let mut chars = value.chars();
    let head: String = chars.by_ref().take(MAX).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}
