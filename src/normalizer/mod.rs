//! # 图片规范化模块（normalizer）
//!
//! ## 设计思路
//!
//! 把用户提供的图片（本地文件或 Data URI）规范化为“方向正确、尺寸受控”的位图，
//! 再编码回可传输的形态（Data URI + 二进制字节），并校验体积上限。
//! 核心是几何计算与渐进式降采样，其余部分都是围绕它的薄适配层。
//!
//! - `service`：按请求 ID 管理取消标志的服务入口
//! - `handler`：编排整条处理流水线
//! - `loader`：负责文件 / Data URI / 内存字节加载、媒体类型识别、解码与 EXIF
//! - `orientation`：EXIF 方向标签解析与像素变换
//! - `geometry`：裁剪矩形、目标尺寸与缩放轮数（纯函数）
//! - `resample` / `surface`：逐轮 ≤2 倍的渐进绘制
//! - `encoder` / `data_uri`：编码与 Data URI 互转
//! - `blob`：对象 URL 注册表
//! - `config/error/source/cancel`：配置、错误、中间数据模型、取消标志
//!
//! ## 新同事快速上手
//!
//! 可以按下面顺序理解调用链：
//!
//! ```text
//! CLI / 上层服务
//!    ↓
//! service.rs（请求 ID + 取消标志）
//!    ↓
//! handler.rs（统一编排 + 阶段耗时日志）
//!    ├─ loader.rs（加载 + 类型识别 + 解码 + EXIF）
//!    ├─ orientation.rs → geometry.rs（方向 → 裁剪 / 缩放几何）
//!    ├─ resample.rs + surface.rs（渐进降采样）
//!    └─ encoder.rs + data_uri.rs（编码 + Data URI）
//!    ↓
//! NormalizedImage 或 NormalizeError
//! ```
//!
//! ## 分层职责建议
//!
//! - 配置与策略变更优先改 `config.rs`
//! - 业务流程顺序变更优先改 `handler.rs`
//! - 尺寸算法调整只动 `geometry.rs` / `resample.rs`，它们不依赖 I/O，可直接单测

mod blob;
mod cancel;
mod config;
mod data_uri;
mod encoder;
mod error;
mod geometry;
mod handler;
mod loader;
mod orientation;
mod resample;
mod service;
mod source;
mod surface;

pub use blob::{BlobEntry, BlobRegistry, OBJECT_URL_PREFIX};
pub use cancel::CancelFlag;
pub use config::{NormalizeOptions, NormalizerConfig, PerformanceProfile};
pub use data_uri::{base64_to_bytes, bytes_to_data_uri, DataUriPayload};
pub use encoder::{encode, is_supported_media_type, EncodedImage};
pub use error::NormalizeError;
pub use geometry::{compute, pass_factor, AreaBudgetStrategy, CropGeometry, ScaleStrategy};
pub use handler::{ImageNormalizer, PipelineStage};
pub use loader::{detect_media_type, is_animated, read_exif_orientation};
pub use orientation::{resolve, Orientation};
pub use resample::{resample, PassPlan, PassStep};
pub use service::NormalizerService;
pub use source::{ImageInfo, ImageSource, NormalizedImage, NormalizedSummary, Outcome};
pub use surface::{SourceRect, Surface};
