//! # 配置模块
//!
//! ## 设计思路
//!
//! 配置分两层：
//! - `NormalizerConfig`：处理器级别的资源上限与质量策略，运行时可切换档位；
//! - `NormalizeOptions`：单次调用的选项，构造时一次性套用默认值，之后不再修改。
//!
//! 性能档位（quality / balanced / speed）作为高层语义，映射到底层滤镜与 JPEG 质量。
//!
//! ## 实现思路
//!
//! - `Default` 提供与浏览器画布接近的平衡配置（双线性滤镜、JPEG 质量 92）。
//! - `PerformanceProfile` 负责档位字符串解析与反向输出。
//! - `validate` 在写入配置前集中校验取值范围。

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use super::NormalizeError;

/// 处理器级配置。
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// 加载原始字节时允许的最大文件体积（字节）。
    pub max_file_size: u64,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 重采样阶段单张中间画布的像素上限。
    pub max_surface_pixels: u64,
    /// 每一轮缩放使用的滤镜。
    pub resize_filter: FilterType,
    /// JPEG 输出质量（1~100）。
    pub jpeg_quality: u8,
    /// 对象 URL 注册表的容量，超出后淘汰最久未使用的条目。
    pub object_url_capacity: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            max_decoded_pixels: 100_000_000,
            max_surface_pixels: 100_000_000,
            resize_filter: FilterType::Triangle,
            jpeg_quality: 92,
            object_url_capacity: 64,
        }
    }
}

impl NormalizerConfig {
    pub fn validate(&self) -> Result<(), NormalizeError> {
        if self.max_file_size == 0 {
            return Err(NormalizeError::InvalidInput(
                "max_file_size 必须大于 0".to_string(),
            ));
        }
        if self.max_decoded_pixels == 0 || self.max_surface_pixels == 0 {
            return Err(NormalizeError::InvalidInput(
                "像素上限必须大于 0".to_string(),
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(NormalizeError::InvalidInput(format!(
                "jpeg_quality 必须在 1~100 之间：{}",
                self.jpeg_quality
            )));
        }
        if self.object_url_capacity == 0 {
            return Err(NormalizeError::InvalidInput(
                "object_url_capacity 必须大于 0".to_string(),
            ));
        }
        Ok(())
    }

    /// 基于当前参数反推性能档位。
    pub fn infer_performance_profile(&self) -> PerformanceProfile {
        match self.resize_filter {
            FilterType::Lanczos3 | FilterType::CatmullRom => PerformanceProfile::Quality,
            FilterType::Nearest => PerformanceProfile::Speed,
            _ => PerformanceProfile::Balanced,
        }
    }

    pub fn apply_performance_profile(&mut self, profile: PerformanceProfile) {
        match profile {
            PerformanceProfile::Quality => {
                self.resize_filter = FilterType::Lanczos3;
                self.jpeg_quality = 95;
            }
            PerformanceProfile::Balanced => {
                self.resize_filter = FilterType::Triangle;
                self.jpeg_quality = 92;
            }
            PerformanceProfile::Speed => {
                self.resize_filter = FilterType::Nearest;
                self.jpeg_quality = 80;
            }
        }
    }
}

/// 性能档位。
///
/// - `Quality`：Lanczos3 + 高质量 JPEG
/// - `Balanced`：双线性，接近浏览器画布默认行为
/// - `Speed`：最近邻，优先速度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceProfile {
    Quality,
    Balanced,
    Speed,
}

impl PerformanceProfile {
    /// 从外部字符串解析档位。
    ///
    /// # 示例
    /// ```rust
    /// use image_normalizer::normalizer::PerformanceProfile;
    ///
    /// let p = PerformanceProfile::from_str(" Balanced ")?;
    /// assert_eq!(p.as_str(), "balanced");
    /// # Ok::<(), image_normalizer::normalizer::NormalizeError>(())
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(profile: &str) -> Result<Self, NormalizeError> {
        match profile.trim().to_lowercase().as_str() {
            "quality" => Ok(Self::Quality),
            "balanced" => Ok(Self::Balanced),
            "speed" => Ok(Self::Speed),
            other => Err(NormalizeError::InvalidInput(format!(
                "未知性能档位：{}（可选：quality / balanced / speed）",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quality => "quality",
            Self::Balanced => "balanced",
            Self::Speed => "speed",
        }
    }
}

/// 单次规范化调用的选项。
///
/// 通过 `Default` 或 `new` 构造后即视为不可变；处理器只读取、从不回写。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizeOptions {
    /// 编码结果的体积上限（KiB）；`None` 表示不限制。
    pub max_size_kib: Option<u32>,
    /// 动图（GIF / 动态 WebP / APNG）是否原样透传。
    pub bypass_animated: bool,
    /// 跳过“已足够小”的捷径，始终重新编码。
    pub force_resize: bool,
    /// 目标宽高比 `(w, h)`；设置后先居中裁剪较长的一边。
    pub target_aspect: Option<(u32, u32)>,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            max_size_kib: None,
            bypass_animated: true,
            force_resize: false,
            target_aspect: None,
        }
    }
}

impl NormalizeOptions {
    pub fn new(max_size_kib: Option<u32>) -> Self {
        Self {
            max_size_kib,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), NormalizeError> {
        if self.max_size_kib == Some(0) {
            return Err(NormalizeError::InvalidInput(
                "max_size_kib 必须大于 0".to_string(),
            ));
        }
        if let Some((w, h)) = self.target_aspect {
            if w == 0 || h == 0 {
                return Err(NormalizeError::InvalidInput(format!(
                    "target_aspect 必须为正数：{}:{}",
                    w, h
                )));
            }
        }
        Ok(())
    }

    /// 体积预算（字节）。
    pub fn budget_bytes(&self) -> Option<u64> {
        self.max_size_kib.map(|kib| kib as u64 * 1024)
    }
}
