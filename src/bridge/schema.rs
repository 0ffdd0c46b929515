//! 工具定义：机器人控制工具的 JSON Schema
//!
//! 以 OpenAI Function Calling 标准格式定义可供 LLM 调用的工具，
//! 参数说明中的数值范围直接取自安全包络，保证提示词与实际截断行为一致。

use serde_json::{Value, json};

use crate::config::SafetyEnvelope;

/// 生成注册到 LLM 的完整工具列表
pub fn robot_tools(envelope: &SafetyEnvelope) -> Value {
    json!([
        {
            "type": "function",
            "function": {
                "name": "move_robot",
                "description": "控制机器人移动。可设置前进/后退速度、横向速度、旋转速度和持续时间。",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "vx": {
                            "type": "number",
                            "description": format!(
                                "前进速度 (m/s)，正值为前进，负值为后退。范围: [{}, {}]",
                                -envelope.max_safe_speed_vx, envelope.max_safe_speed_vx
                            ),
                        },
                        "vy": {
                            "type": "number",
                            "description": format!(
                                "横向速度 (m/s)，正值为向左，负值为向右。范围: [{}, {}]",
                                -envelope.max_safe_speed_vy, envelope.max_safe_speed_vy
                            ),
                        },
                        "vyaw": {
                            "type": "number",
                            "description": format!(
                                "旋转角速度 (rad/s)，正值为逆时针（左转），负值为顺时针（右转）。范围: [{}, {}]",
                                -envelope.max_safe_omega, envelope.max_safe_omega
                            ),
                        },
                        "duration": {
                            "type": "number",
                            "description": format!(
                                "持续时间 (秒)。范围: [{}, {}]，默认: {}",
                                envelope.min_duration, envelope.max_duration, envelope.default_duration
                            ),
                            "default": envelope.default_duration,
                        },
                    },
                    "required": ["vx", "vy", "vyaw"],
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": "stop_robot",
                "description": "立即停止机器人的所有运动。将速度设置为零。",
                "parameters": { "type": "object", "properties": {} }
            }
        },
        {
            "type": "function",
            "function": {
                "name": "rotate_angle",
                "description": "让机器人旋转指定角度。正值为逆时针（左转），负值为顺时针（右转）。",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "degrees": {
                            "type": "number",
                            "description": format!(
                                "旋转角度 (度)。范围: [{}, {}]",
                                envelope.min_rotation_degrees, envelope.max_rotation_degrees
                            ),
                        },
                    },
                    "required": ["degrees"],
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": "emergency_stop",
                "description": "紧急停止！立即切换到阻尼模式并停止所有运动。用于危险情况。",
                "parameters": { "type": "object", "properties": {} }
            }
        },
        {
            "type": "function",
            "function": {
                "name": "wave_hand",
                "description": "让机器人挥手打招呼。用于友好互动场景。",
                "parameters": { "type": "object", "properties": {} }
            }
        },
    ])
}

/// 工具名称到中文的映射（用于日志）
pub fn tool_name_cn(name: &str) -> &str {
    match name {
        "move_robot" => "移动机器人",
        "stop_robot" => "停止运动",
        "rotate_angle" => "旋转角度",
        "emergency_stop" => "紧急停止",
        "wave_hand" => "挥手动作",
        other => other,
    }
}
