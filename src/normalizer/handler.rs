//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `ImageNormalizer` 只负责流程编排与配置管理。处理链路固定为：
//! 1. 读取配置快照
//! 2. 按来源加载原始字节并解码（含 EXIF 方向）
//! 3. 动图透传检查
//! 4. 几何计算，必要时走“已足够小”捷径
//! 5. 渐进式重采样
//! 6. 编码并校验体积上限
//!
//! 各阶段严格按顺序推进，不回退、不重试；任何失败都作为终态返回给调用方。
//!
//! ## 实现思路
//!
//! - 配置通过 `Arc<RwLock<NormalizerConfig>>` 支持运行时动态切档。
//! - 单次请求内使用“同一配置快照”，避免处理中途配置漂移。
//! - 记录 `load/decode/resample/encode/total` 阶段耗时，便于性能诊断。

use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use super::blob::BlobRegistry;
use super::cancel::CancelFlag;
use super::data_uri::bytes_to_data_uri;
use super::encoder::encode;
use super::geometry::{compute, AreaBudgetStrategy, CropGeometry, ScaleStrategy};
use super::loader::is_animated;
use super::orientation::{resolve, Orientation};
use super::resample::resample;
use super::source::{ImageInfo, ImageSource, NormalizedImage, Outcome};
use super::{NormalizeError, NormalizeOptions, NormalizerConfig, PerformanceProfile};

/// 流水线阶段，只允许向后推进。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineStage {
    Loading,
    OrientationDetect,
    BypassCheck,
    Geometry,
    Resample,
    Encode,
    Validate,
    Done,
    Failed,
}

impl PipelineStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::OrientationDetect => "orientation_detect",
            Self::BypassCheck => "bypass_check",
            Self::Geometry => "geometry",
            Self::Resample => "resample",
            Self::Encode => "encode",
            Self::Validate => "validate",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 记录当前阶段与耗时。
struct StageTracker {
    current: PipelineStage,
    started_at: Instant,
}

impl StageTracker {
    fn new() -> Self {
        log::debug!("➡️ 进入阶段：{}", PipelineStage::Loading);
        Self {
            current: PipelineStage::Loading,
            started_at: Instant::now(),
        }
    }

    fn advance(&mut self, next: PipelineStage) {
        debug_assert!(next > self.current, "阶段回退：{} -> {}", self.current, next);
        log::debug!("➡️ 进入阶段：{} -> {}", self.current, next);
        self.current = next;
    }

    fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

#[derive(Debug, Default)]
struct StageTimings {
    load: Duration,
    decode: Duration,
    resample: Duration,
    encode: Duration,
}

/// 图片规范化处理器。
///
/// 封装了配置状态、对象 URL 注册表与可选的缩放策略，并编排各子模块实现完整流程。
pub struct ImageNormalizer {
    pub(super) config: Arc<RwLock<NormalizerConfig>>,
    blobs: Arc<BlobRegistry>,
    strategy: Option<Arc<dyn ScaleStrategy>>,
}

impl ImageNormalizer {
    /// 根据初始配置创建处理器。
    ///
    /// # 示例
    /// ```rust
    /// use image_normalizer::normalizer::{ImageNormalizer, NormalizerConfig};
    ///
    /// let normalizer = ImageNormalizer::new(NormalizerConfig::default())?;
    /// # Ok::<(), image_normalizer::normalizer::NormalizeError>(())
    /// ```
    pub fn new(config: NormalizerConfig) -> Result<Self, NormalizeError> {
        config.validate()?;
        let blobs = Arc::new(BlobRegistry::new(config.object_url_capacity));
        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            blobs,
            strategy: None,
        })
    }

    /// 使用自定义缩放策略替代按媒体类型选择的默认策略。
    pub fn with_strategy(mut self, strategy: Arc<dyn ScaleStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// 获取配置快照。
    ///
    /// 作用：保证单次请求链路使用一致参数。
    pub(crate) fn config_snapshot(&self) -> Result<NormalizerConfig, NormalizeError> {
        self.config
            .read()
            .map(|cfg| cfg.clone())
            .map_err(|_| NormalizeError::ResourceLimit("配置读取锁已中毒".to_string()))
    }

    /// 设置性能档位。
    pub fn set_performance_profile(&self, profile: PerformanceProfile) -> Result<(), NormalizeError> {
        let mut config = self
            .config
            .write()
            .map_err(|_| NormalizeError::ResourceLimit("配置写入锁已中毒".to_string()))?;
        config.apply_performance_profile(profile);

        log::info!(
            "⚙️ 已切换图片性能档位：{:?}（filter={:?}, jpeg_quality={}）",
            profile,
            config.resize_filter,
            config.jpeg_quality
        );

        Ok(())
    }

    /// 获取当前生效档位。
    pub fn get_performance_profile(&self) -> Result<PerformanceProfile, NormalizeError> {
        let config = self
            .config
            .read()
            .map_err(|_| NormalizeError::ResourceLimit("配置读取锁已中毒".to_string()))?;
        Ok(config.infer_performance_profile())
    }

    /// 整体替换配置，写入前先校验。
    pub fn update_config(&self, next: NormalizerConfig) -> Result<(), NormalizeError> {
        next.validate()?;
        let mut config = self
            .config
            .write()
            .map_err(|_| NormalizeError::ResourceLimit("配置写入锁已中毒".to_string()))?;
        *config = next;
        Ok(())
    }

    /// 规范化结果所注册的对象 URL 表。
    pub fn blobs(&self) -> &BlobRegistry {
        &self.blobs
    }

    /// 处理主入口。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use image_normalizer::normalizer::{ImageNormalizer, ImageSource, NormalizeOptions, NormalizerConfig};
    ///
    /// # async fn demo() -> Result<(), image_normalizer::normalizer::NormalizeError> {
    /// let normalizer = ImageNormalizer::new(NormalizerConfig::default())?;
    /// let result = normalizer
    ///     .normalize(ImageSource::FilePath("photo.jpg".into()), &NormalizeOptions::new(Some(500)))
    ///     .await?;
    /// assert!(result.size_kib() <= 500.0);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn normalize(
        &self,
        source: ImageSource,
        options: &NormalizeOptions,
    ) -> Result<NormalizedImage, NormalizeError> {
        self.normalize_with_cancel(source, options, &CancelFlag::new())
            .await
    }

    /// 带取消标志的处理入口；标志在各阶段开始前检查。
    pub async fn normalize_with_cancel(
        &self,
        source: ImageSource,
        options: &NormalizeOptions,
        cancel: &CancelFlag,
    ) -> Result<NormalizedImage, NormalizeError> {
        let mut tracker = StageTracker::new();
        let result = self.run(source, options, cancel, &mut tracker).await;

        match &result {
            Ok(image) => {
                tracker.advance(PipelineStage::Done);
                log::debug!(
                    "🏁 规范化结束 - 路径: {:?} 输出: {}x{} {:.2} KiB",
                    image.outcome,
                    image.width,
                    image.height,
                    image.size_kib()
                );
            }
            Err(err) => {
                let failed_at = tracker.current;
                tracker.advance(PipelineStage::Failed);
                log::warn!(
                    "❌ 图片规范化失败 - 阶段: {} 错误码: {} 耗时: {}ms - {}",
                    failed_at,
                    err.code(),
                    tracker.elapsed().as_millis(),
                    err
                );
            }
        }

        result
    }

    async fn run(
        &self,
        source: ImageSource,
        options: &NormalizeOptions,
        cancel: &CancelFlag,
        tracker: &mut StageTracker,
    ) -> Result<NormalizedImage, NormalizeError> {
        options.validate()?;
        let config = self.config_snapshot()?;
        let mut timings = StageTimings::default();

        cancel.check("load")?;
        let load_start = Instant::now();
        let raw = self.load_raw(source, &config).await?;
        timings.load = load_start.elapsed();

        cancel.check("decode")?;
        let decode_start = Instant::now();
        let (info, original_bytes) = self.decode_raw(raw, &config).await?;
        timings.decode = decode_start.elapsed();

        tracker.advance(PipelineStage::OrientationDetect);
        let orientation = resolve(info.orientation_tag);

        tracker.advance(PipelineStage::BypassCheck);
        if options.bypass_animated && is_animated(&original_bytes, &info.media_type) {
            log::info!("🎞️ 动图原样透传 - 类型: {}", info.media_type);
            return self.pass_through(info, original_bytes, None, Outcome::BypassedAnimated);
        }

        tracker.advance(PipelineStage::Geometry);
        let strategy = self.strategy_for(&info.media_type);
        let geometry = compute(info.width, info.height, orientation, options, strategy.as_ref())?;
        if Self::is_already_within_budget(&info, &geometry, orientation, options) {
            log::info!(
                "✨ 图片已满足要求，跳过重新编码 - {}x{} {:.2} KiB",
                info.width,
                info.height,
                original_bytes.len() as f64 / 1024.0
            );
            return self.pass_through(
                info,
                original_bytes,
                Some(geometry),
                Outcome::AlreadyWithinBudget,
            );
        }
        drop(original_bytes);

        tracker.advance(PipelineStage::Resample);
        cancel.check("resample")?;
        let resample_start = Instant::now();
        log::info!(
            "🧩 渐进降采样：{}x{} -> {}x{}（{} 轮，filter={:?}）",
            geometry.source_width,
            geometry.source_height,
            geometry.target_width,
            geometry.target_height,
            geometry.pass_factor,
            config.resize_filter
        );
        let surface = resample(
            &info.surface,
            &geometry,
            orientation,
            config.resize_filter,
            config.max_surface_pixels,
        )?;
        timings.resample = resample_start.elapsed();

        tracker.advance(PipelineStage::Encode);
        cancel.check("encode")?;
        let encode_start = Instant::now();
        let encoded = encode(&surface, &info.media_type, config.jpeg_quality)?;
        timings.encode = encode_start.elapsed();

        tracker.advance(PipelineStage::Validate);
        validate_size(encoded.byte_size, options)?;

        let media_type = info.media_type.clone();
        let object_url = self
            .blobs
            .create_object_url(&media_type, encoded.bytes.clone())?;

        log::info!(
            "✅ 图片规范化完成 - load={}ms decode={}ms resample={}ms encode={}ms total={}ms",
            timings.load.as_millis(),
            timings.decode.as_millis(),
            timings.resample.as_millis(),
            timings.encode.as_millis(),
            tracker.elapsed().as_millis()
        );

        Ok(NormalizedImage {
            width: surface.width(),
            height: surface.height(),
            surface,
            media_type,
            data_uri: encoded.data_uri,
            bytes: encoded.bytes,
            byte_size: encoded.byte_size,
            object_url,
            raw_info: info,
            geometry: Some(geometry),
            outcome: Outcome::Encoded,
        })
    }

    fn strategy_for(&self, media_type: &str) -> Arc<dyn ScaleStrategy> {
        match &self.strategy {
            Some(strategy) => Arc::clone(strategy),
            None => Arc::new(AreaBudgetStrategy::for_media_type(media_type)),
        }
    }

    /// “已足够小”：几何恒等、无需方向校正、未强制缩放且原始体积在预算内。
    fn is_already_within_budget(
        info: &ImageInfo,
        geometry: &CropGeometry,
        orientation: Orientation,
        options: &NormalizeOptions,
    ) -> bool {
        !options.force_resize
            && orientation == Orientation::Normal
            && geometry.is_identity(info.width, info.height)
            && options
                .budget_bytes()
                .is_none_or(|budget| info.source_byte_size <= budget)
    }

    /// 原始字节原样返回（动图透传或已足够小）。
    fn pass_through(
        &self,
        info: ImageInfo,
        bytes: Vec<u8>,
        geometry: Option<CropGeometry>,
        outcome: Outcome,
    ) -> Result<NormalizedImage, NormalizeError> {
        let data_uri = bytes_to_data_uri(&info.media_type, &bytes);
        let object_url = self.blobs.create_object_url(&info.media_type, bytes.clone())?;

        Ok(NormalizedImage {
            surface: info.surface.clone(),
            media_type: info.media_type.clone(),
            width: info.width,
            height: info.height,
            data_uri,
            byte_size: bytes.len(),
            bytes,
            object_url,
            raw_info: info,
            geometry,
            outcome,
        })
    }
}

/// 编码结果超过上限时返回 `SizeExceeded`，不做降级重试。
fn validate_size(byte_size: usize, options: &NormalizeOptions) -> Result<(), NormalizeError> {
    let Some(limit_kib) = options.max_size_kib else {
        return Ok(());
    };

    let actual_kib = byte_size as f64 / 1024.0;
    if actual_kib > limit_kib as f64 {
        return Err(NormalizeError::SizeExceeded {
            actual_kib,
            limit_kib,
        });
    }
    Ok(())
}
