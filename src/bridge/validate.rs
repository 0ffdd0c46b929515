//! 参数安全校验
//!
//! 接收工具调用提出的运动参数，按安全包络逐项截断，
//! 并生成列举每个被截断字段的告警文本。除诊断日志外没有副作用。

use serde::Serialize;
use tracing::warn;

use crate::config::SafetyEnvelope;

// 浮点截断判定阈值
const CLIP_EPSILON: f64 = 1e-3;

/// 修正后的运动参数（实际下发的值）
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SafeMotionParams {
    pub vx: f64,
    pub vy: f64,
    pub vyaw: f64,
    pub duration: f64,
}

/// 校验运动参数是否在安全范围内，超限自动截断
///
/// # 参数
///
/// - `vx` / `vy`: 平移速度 (m/s)
/// - `vyaw`: 旋转角速度 (rad/s)
/// - `duration`: 持续时间 (秒)，`None` 时使用默认持续时间
///
/// # 返回
///
/// `(是否全部有效, 告警文本, 修正后参数)`。任一字段被截断
/// （偏差超过 1e-3）即判定为无效，告警文本以分号拼接各字段的说明。
pub fn validate_movement(
    envelope: &SafetyEnvelope,
    vx: f64,
    vy: f64,
    vyaw: f64,
    duration: Option<f64>,
) -> (bool, String, SafeMotionParams) {
    let mut warnings: Vec<String> = Vec::new();

    let vx_safe = clamp_axis(&mut warnings, "vx", vx, envelope.max_safe_speed_vx);
    let vy_safe = clamp_axis(&mut warnings, "vy", vy, envelope.max_safe_speed_vy);
    let vyaw_safe = clamp_axis(&mut warnings, "vyaw", vyaw, envelope.max_safe_omega);

    let duration_safe = match duration {
        Some(d) if !d.is_finite() => {
            warnings.push(format!("duration={} 非法，已使用默认值 {:.2}", d, envelope.default_duration));
            envelope.default_duration
        }
        Some(d) => {
            let safe = d.clamp(envelope.min_duration, envelope.max_duration);
            if (d - safe).abs() > CLIP_EPSILON {
                warnings.push(format!("duration={:.2} 超限，已截断为 {:.2}", d, safe));
            }
            safe
        }
        None => envelope.default_duration,
    };

    if !warnings.is_empty() {
        warn!("[Safety] 参数验证警告: {}", warnings.join("; "));
    }

    let is_valid = warnings.is_empty();
    let warning = warnings.join("; ");
    (
        is_valid,
        warning,
        SafeMotionParams { vx: vx_safe, vy: vy_safe, vyaw: vyaw_safe, duration: duration_safe },
    )
}

/// 校验旋转角度是否在安全范围内
///
/// # 返回
///
/// `(是否有效, 告警文本, 修正后角度)`
pub fn validate_rotation(envelope: &SafetyEnvelope, degrees: f64) -> (bool, String, f64) {
    if !degrees.is_finite() {
        let warning = format!("角度={} 非法，已重置为 0.0°", degrees);
        warn!("[Safety] {}", warning);
        return (false, warning, 0.0);
    }

    let degrees_safe = degrees.clamp(envelope.min_rotation_degrees, envelope.max_rotation_degrees);

    let mut warning = String::new();
    if (degrees - degrees_safe).abs() > CLIP_EPSILON {
        warning = format!("角度={:.1}° 超限，已截断为 {:.1}°", degrees, degrees_safe);
        warn!("[Safety] {}", warning);
    }

    let is_valid = warning.is_empty();
    (is_valid, warning, degrees_safe)
}

// 单轴对称截断；非有限数值重置为 0
fn clamp_axis(warnings: &mut Vec<String>, name: &str, value: f64, limit: f64) -> f64 {
    if !value.is_finite() {
        warnings.push(format!("{}={} 非法，已重置为 0.00", name, value));
        return 0.0;
    }
    let safe = value.clamp(-limit, limit);
    if (value - safe).abs() > CLIP_EPSILON {
        warnings.push(format!("{}={:.2} 超限，已截断为 {:.2}", name, value, safe));
    }
    safe
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_range_params_pass_unchanged() {
        let envelope = SafetyEnvelope::default();
        let (ok, warning, params) = validate_movement(&envelope, 0.5, -0.3, 1.0, Some(2.0));
        assert!(ok);
        assert!(warning.is_empty());
        assert_eq!(params, SafeMotionParams { vx: 0.5, vy: -0.3, vyaw: 1.0, duration: 2.0 });
    }

    #[test]
    fn test_all_axes_clipped_with_warning() {
        let envelope = SafetyEnvelope::default();
        let (ok, warning, params) = validate_movement(&envelope, 3.0, -2.0, 5.0, Some(15.0));

        assert!(!ok);
        assert_eq!(params.vx, 1.0);
        assert_eq!(params.vy, -1.0);
        assert_eq!(params.vyaw, 2.0);
        assert_eq!(params.duration, 10.0);

        // 告警逐项列举被截断的字段
        assert!(warning.contains("vx=3.00"));
        assert!(warning.contains("1.00"));
        assert!(warning.contains("vy=-2.00"));
        assert!(warning.contains("vyaw=5.00"));
        assert!(warning.contains("duration=15.00"));
        assert!(warning.contains("10.00"));
    }

    #[test]
    fn test_missing_duration_uses_default() {
        let envelope = SafetyEnvelope::default();
        let (ok, _, params) = validate_movement(&envelope, 0.2, 0.0, 0.0, None);
        assert!(ok);
        assert_eq!(params.duration, envelope.default_duration);
    }

    #[test]
    fn test_too_short_duration_raised_to_minimum() {
        let envelope = SafetyEnvelope::default();
        let (ok, warning, params) = validate_movement(&envelope, 0.2, 0.0, 0.0, Some(0.01));
        assert!(!ok);
        assert_eq!(params.duration, envelope.min_duration);
        assert!(warning.contains("duration=0.01"));
    }

    #[test]
    fn test_non_finite_velocity_reset_to_zero() {
        let envelope = SafetyEnvelope::default();
        let (ok, warning, params) = validate_movement(&envelope, f64::NAN, 0.0, 0.0, None);
        assert!(!ok);
        assert_eq!(params.vx, 0.0);
        assert!(warning.contains("vx="));
    }

    #[test]
    fn test_rotation_clamped_to_envelope() {
        let envelope = SafetyEnvelope::default();

        let (ok, warning, degrees) = validate_rotation(&envelope, 90.0);
        assert!(ok);
        assert!(warning.is_empty());
        assert_eq!(degrees, 90.0);

        let (ok, warning, degrees) = validate_rotation(&envelope, 270.0);
        assert!(!ok);
        assert_eq!(degrees, 180.0);
        assert!(warning.contains("270.0"));

        let (ok, _, degrees) = validate_rotation(&envelope, -361.0);
        assert!(!ok);
        assert_eq!(degrees, -180.0);
    }

    #[test]
    fn test_clip_epsilon_tolerates_float_noise() {
        let envelope = SafetyEnvelope::default();
        // 偏差小于 1e-3 不算截断
        let (ok, warning, _) = validate_movement(&envelope, 1.0 + 1e-4, 0.0, 0.0, None);
        assert!(ok);
        assert!(warning.is_empty());
    }
}
