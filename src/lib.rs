//! # 图片规范化工具 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │          调用方（CLI / 上传服务 / 其他 Rust 代码）        │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↕ Result<NormalizedImage, NormalizeError>
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕                                                  │
//! │  ┌─ error ────── AppError（CLI 统一错误类型）             │
//! │  │                                                       │
//! │  └─ normalizer ─ 加载 → 方向 → 透传检查 → 几何 →          │
//! │      │           渐进降采样 → 编码 → 体积校验              │
//! │      ├─ geometry   裁剪 / 缩放 / 轮数（纯函数）           │
//! │      ├─ resample   逐轮 ≤2 倍绘制                         │
//! │      └─ service    请求 ID + 取消                         │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | CLI 层统一错误类型 `AppError` |
//! | [`normalizer`] | 图片加载、方向校正、裁剪缩放、编码与体积校验 |

pub mod error;
pub mod normalizer;
