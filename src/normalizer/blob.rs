//! # 对象 URL 注册表
//!
//! ## 设计思路
//!
//! 为规范化结果发放进程内的 `blob:image-normalizer/<n>` 地址，调用方可以凭地址
//! 取回字节，用完后主动撤销。注册表容量有限，超出后淘汰最久未访问的条目，
//! 避免忘记撤销时字节无限堆积。
//!
//! ## 实现思路
//!
//! - `lru::LruCache` 放在 `Mutex` 里，`resolve` 会刷新访问顺序。
//! - 序号用 `AtomicU64` 单调递增，撤销后的地址不会被复用。

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;

use super::NormalizeError;

pub const OBJECT_URL_PREFIX: &str = "blob:image-normalizer/";

/// 注册表中的一条记录。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    pub media_type: String,
    pub bytes: Arc<Vec<u8>>,
}

pub struct BlobRegistry {
    entries: Mutex<LruCache<String, BlobEntry>>,
    next_id: AtomicU64,
}

impl BlobRegistry {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            next_id: AtomicU64::new(1),
        }
    }

    /// 注册字节并返回新的对象 URL。
    pub fn create_object_url(
        &self,
        media_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, NormalizeError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let url = format!("{}{}", OBJECT_URL_PREFIX, id);

        let mut guard = self
            .entries
            .lock()
            .map_err(|_| NormalizeError::ResourceLimit("对象 URL 注册表锁已中毒".to_string()))?;
        if let Some((evicted, _)) = guard.push(
            url.clone(),
            BlobEntry {
                media_type: media_type.to_string(),
                bytes: Arc::new(bytes),
            },
        ) {
            log::debug!("🧹 对象 URL 注册表已满，淘汰：{}", evicted);
        }

        Ok(url)
    }

    pub fn resolve(&self, url: &str) -> Option<BlobEntry> {
        let mut guard = self.entries.lock().ok()?;
        guard.get(url).cloned()
    }

    /// 撤销对象 URL，返回是否确实存在。
    pub fn revoke(&self, url: &str) -> bool {
        match self.entries.lock() {
            Ok(mut guard) => guard.pop(url).is_some(),
            Err(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
