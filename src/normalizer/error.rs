//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载规范化链路中的所有失败来源，调用侧可以按分支匹配
//! （例如 `SizeExceeded` 提示“文件过大”，`Decode` 提示通用失败）。
//! 每个错误都是终态：流水线不做重试，也不返回部分结果。
//!
//! ## 实现思路
//!
//! - `thiserror` 派生可读消息。
//! - `code()` 输出稳定的机器可读错误码，`stage()` 标注出错所在阶段，
//!   供 CLI / 上层服务做结构化上报。

/// 图片规范化统一错误类型。
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    /// 输入不是图片（签名、扩展名或声明的 MIME 均不属于 `image/*`）。
    #[error("输入错误：{0}")]
    InvalidInput(String),

    /// 字符串不符合 `data:<type>/<subtype>;base64,<payload>` 形态。
    #[error("Base64 格式错误：{0}")]
    MalformedBase64(String),

    #[error("加载错误：{0}")]
    Load(String),

    #[error("解码错误：{0}")]
    Decode(String),

    /// 几何计算的前置条件被破坏（宽或高为 0）。
    #[error("尺寸非法：{width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// 重采样阶段无法分配中间画布。
    #[error("画布分配失败：{width}x{height}（{reason}）")]
    SurfaceAllocation {
        width: u32,
        height: u32,
        reason: String,
    },

    #[error("不支持的输出格式：{0}")]
    UnsupportedMediaType(String),

    /// 编码结果超过体积上限，携带实际值与限制值（KiB）。
    #[error("文件大小 {actual_kib:.2} KiB 超出限制 {limit_kib} KiB")]
    SizeExceeded { actual_kib: f64, limit_kib: u32 },

    #[error("已取消：{0}")]
    Cancelled(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),
}

impl NormalizeError {
    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::MalformedBase64(_) => "malformed_base64",
            Self::Load(_) => "load_error",
            Self::Decode(_) => "decode_error",
            Self::InvalidDimensions { .. } => "invalid_dimensions",
            Self::SurfaceAllocation { .. } => "surface_allocation_error",
            Self::UnsupportedMediaType(_) => "unsupported_media_type",
            Self::SizeExceeded { .. } => "size_exceeded",
            Self::Cancelled(_) => "cancelled",
            Self::ResourceLimit(_) => "resource_limit",
        }
    }

    /// 错误所属的流水线阶段。
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidInput(_)
            | Self::MalformedBase64(_)
            | Self::Load(_)
            | Self::Decode(_)
            | Self::ResourceLimit(_) => "loading",
            Self::InvalidDimensions { .. } => "geometry",
            Self::SurfaceAllocation { .. } => "resample",
            Self::UnsupportedMediaType(_) => "encode",
            Self::SizeExceeded { .. } => "validate",
            Self::Cancelled(_) => "cancelled",
        }
    }
}
