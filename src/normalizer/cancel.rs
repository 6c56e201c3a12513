//! 取消标志。
//!
//! 流水线只在挂起点之间检查标志（加载前、解码前、重采样前、编码前），
//! 被取消时直接返回 `Cancelled`，不会交出任何半成品。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::NormalizeError;

/// 可跨任务共享的取消标志，克隆后指向同一状态。
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// 已取消时返回 `Cancelled`，`stage` 写入错误消息。
    pub fn check(&self, stage: &str) -> Result<(), NormalizeError> {
        if self.is_cancelled() {
            return Err(NormalizeError::Cancelled(format!("在 {} 阶段前取消", stage)));
        }
        Ok(())
    }
}
