//! Bridge 层：LLM 工具调用到机器人控制的转换桥梁
//!
//! - 解析 LLM 返回的工具调用（名称 + JSON 参数）为带类型的 [`ToolCall`]
//! - 按安全包络校验 / 截断参数
//! - 在单一分发点把工具调用映射到 ActionManager 的接口
//! - 返回结构化执行结果（不抛错，错误也是一种结果）
//!
//! Bridge 通过构造参数持有 ActionManager 句柄与手臂客户端，
//! 不存在全局可变状态。

pub mod schema;
mod validate;

pub use schema::{robot_tools, tool_name_cn};
pub use validate::{SafeMotionParams, validate_movement, validate_rotation};

use serde::Serialize;
use serde_json::{Value, json};
use std::f64::consts::PI;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{ConfigError, SafetyEnvelope};
use crate::manager::{ActionManager, TaskCommand};
use crate::sdk::{ARM_ACTION_FACE_WAVE, ArmActionClient};

// 旋转规划使用的固定角速度 (rad/s)；持续时间由角度换算
const ROTATION_OMEGA: f64 = 1.0;

/// 工具调用解析错误
#[derive(Error, Debug)]
pub enum BridgeError {
    /// 未知工具名称
    #[error("未知工具: {0}")]
    UnknownTool(String),
}

/// 带类型的工具调用
///
/// 字符串名称 + 参数字典只在 [`ToolCall::parse`] 处出现一次，
/// 之后的分发全部基于枚举。
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    /// 移动机器人（缺省参数按 0 处理，与 LLM 省略字段的习惯一致）
    MoveRobot { vx: f64, vy: f64, vyaw: f64, duration: Option<f64> },
    /// 停止机器人（直接切空闲，不入队）
    StopRobot,
    /// 按角度旋转（度），由规划器换算为 vyaw + 持续时间
    RotateAngle { degrees: f64 },
    /// 紧急停止
    EmergencyStop,
    /// 挥手（face wave）
    WaveHand,
}

impl ToolCall {
    /// 解析 `(工具名, JSON 参数)`
    ///
    /// 数值参数接受 JSON number 或可解析的字符串（LLM 偶尔会给字符串数字），
    /// 缺失时按 0 处理。
    pub fn parse(name: &str, arguments: &Value) -> Result<Self, BridgeError> {
        match name {
            "move_robot" => Ok(ToolCall::MoveRobot {
                vx: number_field(arguments, "vx").unwrap_or(0.0),
                vy: number_field(arguments, "vy").unwrap_or(0.0),
                vyaw: number_field(arguments, "vyaw").unwrap_or(0.0),
                duration: number_field(arguments, "duration"),
            }),
            "stop_robot" => Ok(ToolCall::StopRobot),
            "rotate_angle" => Ok(ToolCall::RotateAngle {
                degrees: number_field(arguments, "degrees").unwrap_or(0.0),
            }),
            "emergency_stop" => Ok(ToolCall::EmergencyStop),
            "wave_hand" => Ok(ToolCall::WaveHand),
            other => Err(BridgeError::UnknownTool(other.to_string())),
        }
    }

    /// 工具名称
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::MoveRobot { .. } => "move_robot",
            ToolCall::StopRobot => "stop_robot",
            ToolCall::RotateAngle { .. } => "rotate_angle",
            ToolCall::EmergencyStop => "emergency_stop",
            ToolCall::WaveHand => "wave_hand",
        }
    }
}

fn number_field(arguments: &Value, key: &str) -> Option<f64> {
    match arguments.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

/// 工具执行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    SuccessWithWarning,
    Error,
}

/// 工具执行结果（结构化返回，不抛错）
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub status: ToolStatus,
    pub message: String,
    /// 参数被截断时的告警说明
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// 任务 ID 与实际下发的参数等附加数据
    #[serde(skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl ToolResult {
    fn success(message: impl Into<String>, data: Value) -> Self {
        Self { status: ToolStatus::Success, message: message.into(), warning: None, data }
    }

    fn clipped(message: impl Into<String>, warning: String, data: Value) -> Self {
        Self {
            status: ToolStatus::SuccessWithWarning,
            message: message.into(),
            warning: Some(warning),
            data,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self { status: ToolStatus::Error, message: message.into(), warning: None, data: Value::Null }
    }

    pub fn is_error(&self) -> bool {
        self.status == ToolStatus::Error
    }
}

/// 工具调用执行器
pub struct Bridge {
    manager: ActionManager,
    envelope: SafetyEnvelope,
    arm: Option<Arc<dyn ArmActionClient>>,
}

impl Bridge {
    /// 创建 Bridge，构造时校验安全包络
    ///
    /// # 错误
    ///
    /// - `ConfigError`: 安全包络内部不一致（区间颠倒、非正限幅等）。
    ///   这是启动期唯一的致命错误路径；带病的包络若进入截断逻辑
    ///   会在运行中引发 panic，必须在这里拒绝。
    pub fn new(manager: ActionManager, envelope: SafetyEnvelope) -> Result<Self, ConfigError> {
        envelope.validate()?;
        Ok(Self { manager, envelope, arm: None })
    }

    /// 注入手臂动作客户端（挥手等动作需要）
    pub fn with_arm_client(mut self, arm: Arc<dyn ArmActionClient>) -> Self {
        self.arm = Some(arm);
        self
    }

    /// 解析并执行单个工具调用
    pub fn dispatch(&self, name: &str, arguments: &Value) -> ToolResult {
        match ToolCall::parse(name, arguments) {
            Ok(call) => self.execute(&call),
            Err(e) => {
                error!("[Bridge] {}", e);
                ToolResult::error(e.to_string())
            }
        }
    }

    /// 执行带类型的工具调用（唯一分发点）
    pub fn execute(&self, call: &ToolCall) -> ToolResult {
        if !self.manager.is_running() {
            error!("[Bridge] ActionManager 未运行");
            return ToolResult::error("ActionManager 未运行");
        }

        info!("[Bridge] 执行工具: {} ({})", tool_name_cn(call.name()), call.name());

        match *call {
            ToolCall::MoveRobot { vx, vy, vyaw, duration } => self.execute_move(vx, vy, vyaw, duration),
            ToolCall::StopRobot => self.execute_stop(),
            ToolCall::RotateAngle { degrees } => self.execute_rotate(degrees),
            ToolCall::EmergencyStop => self.execute_emergency_stop(),
            ToolCall::WaveHand => self.execute_wave_hand(),
        }
    }

    /// 顺序执行多个工具调用（逐个加入任务队列）
    ///
    /// 单个调用失败只记录错误，不影响后续调用。
    pub fn execute_sequential(&self, calls: &[(String, Value)]) -> Vec<ToolResult> {
        if calls.is_empty() {
            warn!("[Bridge] 工具调用列表为空");
            return Vec::new();
        }

        info!("[Bridge] 开始顺序执行 {} 个工具调用", calls.len());
        let mut results = Vec::with_capacity(calls.len());
        for (idx, (name, arguments)) in calls.iter().enumerate() {
            info!("[Bridge] 执行工具 {}/{}: {}", idx + 1, calls.len(), name);
            let result = self.dispatch(name, arguments);
            if result.is_error() {
                error!("[Bridge] 工具 {} 执行失败: {}", name, result.message);
            }
            results.push(result);
        }
        results
    }

    fn execute_move(&self, vx: f64, vy: f64, vyaw: f64, duration: Option<f64>) -> ToolResult {
        let (is_valid, warning, params) =
            validate_movement(&self.envelope, vx, vy, vyaw, duration);

        let task_id = self.manager.add_task(
            TaskCommand::Move { vx: params.vx, vy: params.vy, vyaw: params.vyaw },
            params.duration,
        );

        let mut message = format!(
            "机器人移动任务已添加: vx={:.2}, vy={:.2}, vyaw={:.2}, duration={:.2}s (task_id: {})",
            params.vx, params.vy, params.vyaw, params.duration, task_id
        );
        if !warning.is_empty() {
            message.push_str(&format!(" (已截断参数: {})", warning));
        }
        info!("[Bridge] {}", message);

        let data = json!({
            "task_id": task_id,
            "vx": params.vx,
            "vy": params.vy,
            "vyaw": params.vyaw,
            "duration": params.duration,
        });

        if is_valid {
            ToolResult::success(message, data)
        } else {
            ToolResult::clipped(message, warning, data)
        }
    }

    fn execute_stop(&self) -> ToolResult {
        // 停止是一种状态而不是任务：直接切空闲，不进队列
        self.manager.set_idle();
        let message = "机器人已停止运动";
        info!("[Bridge] {}", message);
        ToolResult::success(message, json!({ "vx": 0.0, "vy": 0.0, "vyaw": 0.0 }))
    }

    fn execute_rotate(&self, degrees: f64) -> ToolResult {
        let (is_valid, warning, degrees_safe) = validate_rotation(&self.envelope, degrees);

        // 固定角速度规划：duration = |radians| / ω，方向随角度符号
        // （零度走负方向分支，duration 被抬到下限）
        let radians = degrees_safe * PI / 180.0;
        let duration = (radians.abs() / ROTATION_OMEGA)
            .clamp(self.envelope.min_duration, self.envelope.max_duration);
        let vyaw = if radians > 0.0 { ROTATION_OMEGA } else { -ROTATION_OMEGA };

        let task_id = self
            .manager
            .add_task(TaskCommand::Rotate { vyaw, degrees: degrees_safe }, duration);

        let mut message = format!(
            "机器人旋转任务已添加: {:.1}° (vyaw={:.2} rad/s, duration={:.2}s, task_id: {})",
            degrees_safe, vyaw, duration, task_id
        );
        if !warning.is_empty() {
            message.push_str(&format!(" (已截断参数: {})", warning));
        }
        info!("[Bridge] {}", message);

        let data = json!({
            "task_id": task_id,
            "degrees": degrees_safe,
            "radians": radians,
            "vyaw": vyaw,
            "duration": duration,
        });

        if is_valid {
            ToolResult::success(message, data)
        } else {
            ToolResult::clipped(message, warning, data)
        }
    }

    fn execute_emergency_stop(&self) -> ToolResult {
        self.manager.emergency_stop();
        let message = "执行紧急停止！机器人已进入阻尼模式";
        warn!("[Bridge] {}", message);
        ToolResult::success(message, json!({ "emergency": true }))
    }

    fn execute_wave_hand(&self) -> ToolResult {
        let Some(arm) = &self.arm else {
            let message = "G1 手臂动作客户端未初始化";
            error!("[Bridge] {}", message);
            return ToolResult::error(message);
        };

        match arm.execute_action(ARM_ACTION_FACE_WAVE) {
            Ok(()) => {
                let message = "挥手动作已执行";
                info!("[Bridge] {}", message);
                ToolResult::success(message, json!({ "action": "wave_hand", "type": "face_wave" }))
            }
            Err(e) => {
                let message = format!("挥手动作执行失败: {}", e);
                error!("[Bridge] {}", message);
                ToolResult::error(message)
            }
        }
    }
}
