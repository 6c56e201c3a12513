//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 库内部只使用 `NormalizeError`；命令行入口还会碰到参数解析、写文件、
//! JSON 序列化等错误，这里用 `AppError` 把它们收拢到一个类型里，
//! `main` 只需要处理一种错误。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `NormalizeError` / `io::Error` / `serde_json::Error` 提供 `From` 转换，无需手动 map。
//! - `code()` 输出稳定错误码，规范化错误沿用其自身的错误码。

use serde::Serialize;

use crate::normalizer::NormalizeError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 图片规范化流水线错误
    #[error("{0}")]
    Normalize(#[from] NormalizeError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 输出序列化失败
    #[error("JSON 序列化失败: {0}")]
    Json(#[from] serde_json::Error),

    /// 命令行参数不合法
    #[error("参数错误: {0}")]
    Argument(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Normalize(err) => err.code(),
            Self::Io(_) => "io_error",
            Self::Json(_) => "json_error",
            Self::Argument(_) => "invalid_argument",
        }
    }

    /// 进程退出码：参数错误为 2，其余失败为 1。
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Argument(_) => 2,
            _ => 1,
        }
    }
}

/// 序列化为 `{ "code": ..., "message": ... }`，供 `--json` 输出。
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("AppError", 2)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}
