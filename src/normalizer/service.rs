//! # 服务层
//!
//! ## 设计思路
//!
//! `NormalizerService` 在处理器外面包一层“按请求 ID 管理”的能力：
//! 每个请求登记一个取消标志，调用方随时可以按 ID 取消；请求结束后标志立即注销。
//!
//! ## 实现思路
//!
//! 对外仅暴露少量稳定 API：
//! - `process`：执行完整规范化链路
//! - `cancel`：按请求 ID 取消
//! - `set_performance_profile` / `get_performance_profile`：字符串形式切换、读取档位

use std::collections::HashMap;
use std::sync::Mutex;

use super::cancel::CancelFlag;
use super::source::{ImageSource, NormalizedImage};
use super::{ImageNormalizer, NormalizeError, NormalizeOptions, NormalizerConfig, PerformanceProfile};

pub struct NormalizerService {
    normalizer: ImageNormalizer,
    cancel_flags: Mutex<HashMap<String, CancelFlag>>,
}

impl NormalizerService {
    /// 使用默认配置创建服务。
    ///
    /// # 示例
    /// ```rust
    /// use image_normalizer::normalizer::NormalizerService;
    ///
    /// let service = NormalizerService::new()?;
    /// assert_eq!(service.get_performance_profile()?, "balanced");
    /// # Ok::<(), image_normalizer::normalizer::NormalizeError>(())
    /// ```
    pub fn new() -> Result<Self, NormalizeError> {
        Self::with_config(NormalizerConfig::default())
    }

    pub fn with_config(config: NormalizerConfig) -> Result<Self, NormalizeError> {
        Ok(Self::with_normalizer(ImageNormalizer::new(config)?))
    }

    /// 使用已构建好的处理器（例如注入了自定义缩放策略）。
    pub fn with_normalizer(normalizer: ImageNormalizer) -> Self {
        Self {
            normalizer,
            cancel_flags: Mutex::new(HashMap::new()),
        }
    }

    pub fn normalizer(&self) -> &ImageNormalizer {
        &self.normalizer
    }

    /// 执行一次规范化；同一请求 ID 在处理期间可被 [`Self::cancel`] 取消。
    pub async fn process(
        &self,
        request_id: &str,
        source: ImageSource,
        options: &NormalizeOptions,
    ) -> Result<NormalizedImage, NormalizeError> {
        let cancel_flag = CancelFlag::new();
        let _registration = self.register(request_id, &cancel_flag)?;

        let result = self
            .normalizer
            .normalize_with_cancel(source, options, &cancel_flag)
            .await;

        if let Err(NormalizeError::Cancelled(_)) = &result {
            log::info!("🛑 请求已取消 - ID: {}", request_id);
        }

        result
    }

    /// 登记取消标志；返回的守卫在请求结束或 future 被丢弃时注销。
    fn register(
        &self,
        request_id: &str,
        cancel_flag: &CancelFlag,
    ) -> Result<Registration<'_>, NormalizeError> {
        let mut guard = self
            .cancel_flags
            .lock()
            .map_err(|_| NormalizeError::ResourceLimit("取消标志锁已中毒".to_string()))?;
        if guard.contains_key(request_id) {
            return Err(NormalizeError::InvalidInput(format!(
                "请求 ID 正在处理中：{}",
                request_id
            )));
        }
        guard.insert(request_id.to_string(), cancel_flag.clone());

        Ok(Registration {
            flags: &self.cancel_flags,
            request_id: request_id.to_string(),
        })
    }

    /// 取消进行中的请求；请求不存在（已结束或从未开始）时返回 `false`。
    pub fn cancel(&self, request_id: &str) -> Result<bool, NormalizeError> {
        let guard = self
            .cancel_flags
            .lock()
            .map_err(|_| NormalizeError::ResourceLimit("取消标志锁已中毒".to_string()))?;

        if let Some(flag) = guard.get(request_id) {
            flag.cancel();
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn in_flight(&self) -> usize {
        self.cancel_flags
            .lock()
            .map(|guard| guard.len())
            .unwrap_or(0)
    }

    pub fn set_performance_profile(&self, profile: &str) -> Result<(), NormalizeError> {
        let profile = PerformanceProfile::from_str(profile)?;
        self.normalizer.set_performance_profile(profile)
    }

    pub fn get_performance_profile(&self) -> Result<String, NormalizeError> {
        let profile = self.normalizer.get_performance_profile()?;
        Ok(profile.as_str().to_string())
    }
}

/// 请求登记守卫，`Drop` 时移除对应的取消标志。
struct Registration<'a> {
    flags: &'a Mutex<HashMap<String, CancelFlag>>,
    request_id: String,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        // 锁中毒时仍要注销，否则该 ID 会被永久占用
        let mut guard = self
            .flags
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if guard.remove(&self.request_id).is_some() {
            log::debug!("🧹 已注销请求 - ID: {}", self.request_id);
        }
    }
}
