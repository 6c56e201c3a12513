//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入类型”和“流水线中间结果”解耦：
//! - `ImageSource` 表示外部来源语义
//! - `RawImageData` 表示已加载但未解码的字节
//! - `ImageInfo` 表示解码后的画布与元信息，单次调用内只创建一次、不再修改
//! - `NormalizedImage` 是交给调用方的最终结果

use std::path::PathBuf;

use serde::Serialize;

use super::geometry::CropGeometry;
use super::surface::Surface;

/// 图片输入来源。
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// 本地文件路径来源。
    FilePath(PathBuf),
    /// `data:<type>/<subtype>;base64,<payload>` 字符串。
    Base64(String),
    /// 已在内存中的字节（例如上传表单的文件体）。
    Bytes { bytes: Vec<u8>, name: Option<String> },
}

impl ImageSource {
    /// 命令行入参：`data:` 开头视为 data URI，其余视为路径。
    pub fn from_arg(input: &str) -> Self {
        if input.trim_start().starts_with("data:") {
            Self::Base64(input.to_string())
        } else {
            Self::FilePath(PathBuf::from(input))
        }
    }
}

/// 加载阶段输出：原始字节与来源标识。
#[derive(Debug, Clone)]
pub struct RawImageData {
    pub bytes: Vec<u8>,
    pub media_type: String,
    /// 加载时的原始体积（字节）。
    pub original_byte_size: u64,
    pub name: Option<String>,
    /// 来源提示（用于日志与诊断）。
    pub source_hint: &'static str,
}

/// 解码阶段输出。
#[derive(Debug, Clone)]
pub struct ImageInfo {
    /// 原始（未做方向校正）宽度。
    pub width: u32,
    pub height: u32,
    pub surface: Surface,
    pub media_type: String,
    pub source_byte_size: u64,
    /// EXIF Orientation 原始标签，读取失败或缺失时为 `None`。
    pub orientation_tag: Option<u16>,
    pub name: Option<String>,
}

/// 本次调用走的是哪条路径。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// 完整执行几何、重采样与编码。
    Encoded,
    /// 动图原样透传。
    BypassedAnimated,
    /// 无需裁剪、缩放或方向校正，原始字节原样返回。
    AlreadyWithinBudget,
}

/// 规范化结果，返回后由调用方独占。
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub surface: Surface,
    pub media_type: String,
    pub width: u32,
    pub height: u32,
    pub data_uri: String,
    pub bytes: Vec<u8>,
    pub byte_size: usize,
    /// 注册到 [`super::BlobRegistry`] 的对象 URL。
    pub object_url: String,
    pub raw_info: ImageInfo,
    /// 透传路径下为 `None`。
    pub geometry: Option<CropGeometry>,
    pub outcome: Outcome,
}

impl NormalizedImage {
    pub fn size_kib(&self) -> f64 {
        self.byte_size as f64 / 1024.0
    }

    /// 供 CLI / 日志输出的摘要（不含像素与字节）。
    pub fn summary(&self) -> NormalizedSummary {
        NormalizedSummary {
            name: self.raw_info.name.clone(),
            media_type: self.media_type.clone(),
            width: self.width,
            height: self.height,
            byte_size: self.byte_size,
            source_width: self.raw_info.width,
            source_height: self.raw_info.height,
            source_byte_size: self.raw_info.source_byte_size,
            orientation_tag: self.raw_info.orientation_tag,
            object_url: self.object_url.clone(),
            geometry: self.geometry,
            outcome: self.outcome,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NormalizedSummary {
    pub name: Option<String>,
    pub media_type: String,
    pub width: u32,
    pub height: u32,
    pub byte_size: usize,
    pub source_width: u32,
    pub source_height: u32,
    pub source_byte_size: u64,
    pub orientation_tag: Option<u16>,
    pub object_url: String,
    pub geometry: Option<CropGeometry>,
    pub outcome: Outcome,
}
