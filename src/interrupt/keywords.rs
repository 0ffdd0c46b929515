//! 语音命令识别与分类
//!
//! 1. 打断命令检测（停止播放、闭嘴等，仅在模型播放中启用）
//! 2. 停止 / 急停意图检测
//! 3. 复杂指令检测（含数字或修饰词，需要走工具调用）
//! 4. 本地关键词快速路径（前进、后退、急停等，不经过 LLM）

use std::sync::Arc;
use tracing::{info, warn};

use crate::manager::ActionManager;
use crate::sdk::{ARM_ACTION_FACE_WAVE, ArmActionClient};

// 强触发打断关键词
const INTERRUPT_STRONG: &[&str] = &[
    "打断",
    "别说了",
    "不要说了",
    "闭嘴",
    "安静",
    "停止播放",
    "暂停播放",
    "停止回答",
    "停止讲",
    "停止说话",
    "停播",
    "停一下声音",
    "不要播了",
    "停止",
];

// 弱触发：停止意图词 × 语音相关词 同时出现
const INTERRUPT_WEAK_STOP: &[&str] = &["停止", "暂停", "停一下"];
const INTERRUPT_WEAK_SPEECH: &[&str] = &["说", "讲", "回答", "播放", "声音", "语音"];

// 打断语句中的停止运动意图
const STOP_INTENT: &[&str] = &["停", "急停", "别动", "站住"];

// 打断路径中需要升级为急停的关键词（其余停止意图只切空闲）
const EMERGENCY_INTENT: &[&str] = &["急停"];

// 本地关键词路径的急停触发词（比打断路径更宽）
const LOCAL_EMERGENCY: &[&str] = &["急停", "停止电机", "别动"];

// 复杂指令标记：中文数字、量词、修饰词、复合动作连接词
// （"一" 单独出现太容易误触，如"介绍一下"，只保留明确的量词搭配）
const COMPLEX_MARKERS: &[&str] = &[
    "一米", "一度", "一秒", "一步", "一圈", "二", "三", "四", "五", "六", "七", "八", "九", "十",
    "半", "慢慢", "快速", "缓缓", "稍微", "一点", "并且", "同时", "然后",
];

// 自我介绍关键词
const INTRO_KEYWORDS: &[&str] = &[
    "我是",
    "我的名字",
    "我叫",
    "你好我是",
    "大家好我是",
    "你可以叫我",
    "我的名字叫",
    "让我介绍一下",
    "我来介绍",
    "自我介绍",
];

/// 检测是否为打断命令（仅在模型播放中有意义）
pub fn is_interrupt_command(transcript: &str) -> bool {
    let t = transcript.trim().to_lowercase();
    if t.is_empty() {
        return false;
    }

    if INTERRUPT_STRONG.iter().any(|k| t.contains(k)) {
        return true;
    }

    // 弱触发：同时包含停止意图和语音相关词
    let has_stop_word = INTERRUPT_WEAK_STOP.iter().any(|k| t.contains(k)) || t == "停";
    has_stop_word && INTERRUPT_WEAK_SPEECH.iter().any(|k| t.contains(k))
}

/// 检测打断语句是否包含停止运动的意图
pub fn has_stop_intent(transcript: &str) -> bool {
    STOP_INTENT.iter().any(|k| transcript.contains(k))
}

/// 检测打断语句是否需要升级为急停（而非普通停止）
pub fn is_emergency_intent(transcript: &str) -> bool {
    EMERGENCY_INTENT.iter().any(|k| transcript.contains(k))
}

/// 检测指令是否为复杂指令（需要 LLM 工具调用处理）
pub fn is_complex_command(text: &str) -> bool {
    let t = text.trim();
    if t.is_empty() {
        return false;
    }

    if t.chars().any(|c| c.is_ascii_digit()) {
        return true;
    }

    COMPLEX_MARKERS.iter().any(|m| t.contains(m))
}

/// 检测文本是否为自我介绍（音频管线用它触发自动挥手）
pub fn detect_self_introduction(text: &str) -> bool {
    let t = text.trim();
    if t.is_empty() {
        return false;
    }
    INTRO_KEYWORDS.iter().any(|k| t.contains(k))
}

/// 基于本地关键词匹配执行动作（简单指令的快速路径，不经过 LLM）
///
/// 返回是否成功匹配并执行了动作指令。
pub fn execute_local_keywords(
    text: &str,
    manager: &ActionManager,
    arm: Option<&Arc<dyn ArmActionClient>>,
) -> bool {
    if !manager.is_running() {
        warn!("[G1] ActionManager 未运行，指令被忽略");
        return false;
    }

    let t = text.trim();

    // 急停优先于其他一切匹配
    if LOCAL_EMERGENCY.iter().any(|k| t.contains(k)) {
        manager.emergency_stop();
        return true;
    }

    if ["挥手", "招招手", "打个招呼", "挥挥手", "招手"].iter().any(|k| t.contains(k)) {
        info!("[Local] 检测到挥手指令: {}", t);
        match arm {
            Some(arm) => {
                if let Err(e) = arm.execute_action(ARM_ACTION_FACE_WAVE) {
                    tracing::error!("[Local] 挥手动作执行失败: {}", e);
                } else {
                    info!("[Local] 挥手动作执行成功（face wave）");
                }
            }
            None => warn!("[Local] 手臂客户端未初始化，无法执行挥手"),
        }
        return true;
    }

    if ["前进", "向前", "往前"].iter().any(|k| t.contains(k)) {
        manager.update_target_velocity(0.5, 0.0, 0.0, Some(2.0));
        return true;
    }

    if ["后退", "往后", "向后"].iter().any(|k| t.contains(k)) {
        manager.update_target_velocity(-0.5, 0.0, 0.0, Some(2.0));
        return true;
    }

    if ["左转", "向左"].iter().any(|k| t.contains(k)) {
        manager.update_target_velocity(0.0, 0.0, 0.8, Some(2.0));
        return true;
    }

    if ["右转", "向右"].iter().any(|k| t.contains(k)) {
        manager.update_target_velocity(0.0, 0.0, -0.8, Some(2.0));
        return true;
    }

    if ["停止", "停车", "站住"].iter().any(|k| t.contains(k)) {
        manager.set_idle();
        return true;
    }

    false
}
