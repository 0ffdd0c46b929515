//! # 安全包络配置
//!
//! 运动控制的安全限制。启动时加载一次，之后不可变。

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 配置错误（仅在启动时出现，属于致命错误）
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 数值区间非法（min >= max 或非正数）
    #[error("invalid range for {field}: [{min}, {max}]")]
    InvalidRange { field: &'static str, min: f64, max: f64 },

    /// 默认值落在区间之外
    #[error("default duration {value} outside [{min}, {max}]")]
    DefaultOutOfRange { value: f64, min: f64, max: f64 },

    /// 速度上限非法
    #[error("non-positive speed limit for {field}: {value}")]
    NonPositiveLimit { field: &'static str, value: f64 },
}

/// 安全包络
///
/// Bridge 层用它对工具调用的参数进行截断。比 SDK 硬限幅宽松
/// （例如 `max_safe_omega = 2.0` 而 SDK 侧硬限幅为 1.5），
/// 硬限幅在 [`crate::manager::ActionManager::update_target_velocity`]
/// 中作为最后一道防线。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SafetyEnvelope {
    /// 前进/后退最大安全速度 (m/s)
    pub max_safe_speed_vx: f64,
    /// 横向最大安全速度 (m/s)
    pub max_safe_speed_vy: f64,
    /// 旋转最大安全角速度 (rad/s)
    pub max_safe_omega: f64,
    /// 单次移动最小持续时间 (秒)
    pub min_duration: f64,
    /// 单次移动最大持续时间 (秒)
    pub max_duration: f64,
    /// 未指定时的默认持续时间 (秒)
    pub default_duration: f64,
    /// 单次旋转最小角度 (度)
    pub min_rotation_degrees: f64,
    /// 单次旋转最大角度 (度)
    pub max_rotation_degrees: f64,
}

impl Default for SafetyEnvelope {
    fn default() -> Self {
        Self {
            max_safe_speed_vx: 1.0,
            max_safe_speed_vy: 1.0,
            max_safe_omega: 2.0,
            min_duration: 0.1,
            max_duration: 10.0,
            default_duration: 1.0,
            min_rotation_degrees: -180.0,
            max_rotation_degrees: 180.0,
        }
    }
}

impl SafetyEnvelope {
    /// 校验配置的内部一致性
    ///
    /// 由 [`crate::bridge::Bridge::new`] 在构造时调用，失败即拒绝启动。
    ///
    /// # 错误
    ///
    /// - `ConfigError::NonPositiveLimit`: 速度上限不是正数
    /// - `ConfigError::InvalidRange`: 时间或角度区间颠倒
    /// - `ConfigError::DefaultOutOfRange`: 默认持续时间不在区间内
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("max_safe_speed_vx", self.max_safe_speed_vx),
            ("max_safe_speed_vy", self.max_safe_speed_vy),
            ("max_safe_omega", self.max_safe_omega),
        ] {
            if !(value > 0.0) {
                return Err(ConfigError::NonPositiveLimit { field, value });
            }
        }

        if !(self.min_duration > 0.0) || self.min_duration >= self.max_duration {
            return Err(ConfigError::InvalidRange {
                field: "duration",
                min: self.min_duration,
                max: self.max_duration,
            });
        }

        if self.min_rotation_degrees >= self.max_rotation_degrees {
            return Err(ConfigError::InvalidRange {
                field: "rotation_degrees",
                min: self.min_rotation_degrees,
                max: self.max_rotation_degrees,
            });
        }

        if self.default_duration < self.min_duration || self.default_duration > self.max_duration {
            return Err(ConfigError::DefaultOutOfRange {
                value: self.default_duration,
                min: self.min_duration,
                max: self.max_duration,
            });
        }

        Ok(())
    }
}
