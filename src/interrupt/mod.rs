//! 打断与播放协调
//!
//! 把三件事绑定为一次原子抢占：ASR 检测到的用户打断、音频播放中止、
//! 在途 LLM 响应取消。核心是响应序号计数器：每次进入响应模式序号 +1，
//! 收尾回调携带进入时观察到的序号，序号不匹配的收尾一律忽略，
//! 防止"打断后紧接新响应"被迟到的"旧响应结束"回调撤销。
//!
//! 播放器与 LLM 传输层是范围外的协作方，通过 [`PlaybackControl`] 与
//! [`ResponseTransport`] 两个 trait 注入。

mod keywords;

pub use keywords::{
    detect_self_introduction, execute_local_keywords, has_stop_intent, is_complex_command,
    is_emergency_intent, is_interrupt_command,
};

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::manager::ActionManager;
use crate::sdk::ArmActionClient;

// 机器人说完话后的回声冷却期：该窗口内忽略 ASR，防止回声自激
const ECHO_COOLDOWN: Duration = Duration::from_millis(1500);

// 等待本地播放排空的上限
const PLAYBACK_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// 音频播放控制（范围外协作方的接缝）
pub trait PlaybackControl: Send + Sync {
    /// 立刻停止本地播放并清空解码 / 输出队列
    fn interrupt(&self);

    /// 阻塞等待本地播放真正结束（带超时）
    fn wait_until_idle(&self, timeout: Duration);
}

/// LLM 响应传输控制（范围外协作方的接缝）
pub trait ResponseTransport: Send + Sync {
    /// 请求服务端取消当前在途响应
    fn cancel_response(&self);
}

/// 一条 ASR 转写的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptDisposition {
    /// 空转写，忽略
    Empty,
    /// 响应中收到非打断语句，忽略
    IgnoredWhileResponding,
    /// 已触发打断抢占；`needs_tool_call` 为真表示打断语句本身
    /// 是复杂动作指令，上层应继续走工具调用
    Interrupted { needs_tool_call: bool },
    /// 处于回声冷却期，忽略
    CoolingDown,
    /// 本地关键词已执行（快速路径）
    ExecutedLocally,
    /// 需要上层走 LLM 工具调用
    NeedsToolCall,
}

/// 响应模式协调器
///
/// 持有 ActionManager 的非拥有句柄（克隆共享内部状态），
/// ActionManager 先于协调器创建、后于其销毁。
pub struct ResponseCoordinator {
    manager: ActionManager,
    playback: Option<Arc<dyn PlaybackControl>>,
    transport: Option<Arc<dyn ResponseTransport>>,
    arm: Option<Arc<dyn ArmActionClient>>,
    responding: AtomicBool,
    /// 响应序号：使旧 response 的收尾线程失效
    resp_seq: AtomicU64,
    /// 打断后丢弃当前 response 的后续输出（直到 done）
    drop_output: AtomicBool,
    last_speak_end: Mutex<Option<Instant>>,
}

impl ResponseCoordinator {
    pub fn new(manager: ActionManager) -> Self {
        Self {
            manager,
            playback: None,
            transport: None,
            arm: None,
            responding: AtomicBool::new(false),
            resp_seq: AtomicU64::new(0),
            drop_output: AtomicBool::new(false),
            last_speak_end: Mutex::new(None),
        }
    }

    /// 注入音频播放器
    pub fn with_playback(mut self, playback: Arc<dyn PlaybackControl>) -> Self {
        self.playback = Some(playback);
        self
    }

    /// 注入 LLM 响应传输控制
    pub fn with_transport(mut self, transport: Arc<dyn ResponseTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// 注入手臂动作客户端（本地挥手关键词需要）
    pub fn with_arm_client(mut self, arm: Arc<dyn ArmActionClient>) -> Self {
        self.arm = Some(arm);
        self
    }

    // ==================== 响应模式与序号 ====================

    /// 是否正在响应（模型输出 / 播放中）
    pub fn is_responding(&self) -> bool {
        self.responding.load(Ordering::SeqCst)
    }

    /// 当前响应序号
    pub fn current_seq(&self) -> u64 {
        self.resp_seq.load(Ordering::SeqCst)
    }

    /// 进入响应模式，返回本轮序号
    ///
    /// 已处于响应模式时不重复进入（返回当前序号）。
    pub fn enter_response_mode(&self) -> u64 {
        if self.responding.swap(true, Ordering::SeqCst) {
            return self.current_seq();
        }
        let seq = self.resp_seq.fetch_add(1, Ordering::SeqCst) + 1;
        info!("进入响应模式 (seq={})", seq);
        seq
    }

    /// 序号匹配时退出响应模式
    ///
    /// 返回是否真正退出。序号不匹配说明本轮响应已被打断 / 替换，
    /// 这个迟到的收尾回调被忽略。
    pub fn exit_response_mode_if(&self, seq: u64, reason: &str) -> bool {
        if seq != self.current_seq() {
            info!("旧响应收尾被忽略 (seq={} != {}): {}", seq, self.current_seq(), reason);
            return false;
        }
        self.responding.store(false, Ordering::SeqCst);
        info!("退出响应模式: {}", reason);
        true
    }

    /// 强制退出响应模式，并使序号 +1，令旧的收尾线程失效
    pub fn force_exit_response_mode(&self, reason: &str) {
        self.responding.store(false, Ordering::SeqCst);
        self.resp_seq.fetch_add(1, Ordering::SeqCst);
        // 强制退出也开启冷却窗口，防止打断后的余音触发
        *self.last_speak_end.lock() = Some(Instant::now());
        info!("强制退出响应模式: {}", reason);
    }

    /// 是否处于回声冷却期
    pub fn in_cooldown(&self) -> bool {
        match *self.last_speak_end.lock() {
            Some(end) => end.elapsed() < ECHO_COOLDOWN,
            None => false,
        }
    }

    /// 打断后是否应丢弃当前 response 的后续输出
    pub fn should_drop_output(&self) -> bool {
        self.drop_output.load(Ordering::SeqCst)
    }

    // ==================== 服务端事件 ====================

    /// 服务端 response 结束事件
    ///
    /// 刚发生过打断时直接恢复输入（播放器已被清空），返回 `None`；
    /// 否则返回本轮序号，调用方应在独立线程里用它调用
    /// [`Self::finish_after_playback`] 等待本地播放排空。
    pub fn on_response_done(&self) -> Option<u64> {
        if self.drop_output.swap(false, Ordering::SeqCst) {
            self.force_exit_response_mode("server_done_after_interrupt");
            return None;
        }
        Some(self.current_seq())
    }

    /// 等待本地播放排空后退出响应模式并开启冷却窗口
    ///
    /// 阻塞调用；`seq` 不匹配时只更新冷却窗口，不改变响应状态。
    pub fn finish_after_playback(&self, seq: u64) {
        if let Some(playback) = &self.playback {
            playback.wait_until_idle(PLAYBACK_DRAIN_TIMEOUT);
        }
        self.exit_response_mode_if(seq, "local_playback_end");
        *self.last_speak_end.lock() = Some(Instant::now());
    }

    // ==================== ASR 入口 ====================

    /// 处理一条 ASR 转写（所有打断语义的唯一入口）
    ///
    /// 响应中：打断命令或复杂指令触发原子抢占（丢弃输出、中止播放、
    /// 取消在途响应、强制退出响应模式），含停止意图时同步停止运动，
    /// 含急停意图时触发急停。
    /// 空闲中：先过冷却窗口，再尝试本地关键词快速路径，
    /// 剩余情况交给上层走 LLM 工具调用。
    pub fn handle_transcript(&self, transcript: &str) -> TranscriptDisposition {
        let t = transcript.trim();
        if t.is_empty() {
            return TranscriptDisposition::Empty;
        }

        if self.is_responding() {
            let complex = is_complex_command(t);
            if !is_interrupt_command(t) && !complex {
                info!("[ASR-IGNORED] {}", t);
                return TranscriptDisposition::IgnoredWhileResponding;
            }

            info!("[ASR-Interrupt] 触发打断 (complex={}): {}", complex, t);
            self.interrupt_playback(t);

            let stop = has_stop_intent(t);
            if stop {
                warn!("[Safety] 检测到打断指令包含停止意图: {}, 强制停止运动", t);
                if is_emergency_intent(t) {
                    self.manager.emergency_stop();
                    warn!("[Safety] 已触发 emergency_stop()");
                } else {
                    self.manager.set_idle();
                    info!("[Safety] 已触发 set_idle()");
                }
            }

            // 复杂指令且非纯停止：打断之后还要继续执行动作
            return TranscriptDisposition::Interrupted { needs_tool_call: complex && !stop };
        }

        // 空闲态：检查冷却时间（防止回声自激）
        if self.in_cooldown() {
            info!("[ASR-COOLED] 处于回声冷却期，忽略输入: {}", t);
            return TranscriptDisposition::CoolingDown;
        }

        info!("[ASR] {}", t);

        if is_complex_command(t) {
            info!("[G1] 检测到复杂指令，跳过关键词匹配: {}", t);
            return TranscriptDisposition::NeedsToolCall;
        }

        if execute_local_keywords(t, &self.manager, self.arm.as_ref()) {
            info!("[G1] 本地关键词指令已执行");
            return TranscriptDisposition::ExecutedLocally;
        }

        TranscriptDisposition::NeedsToolCall
    }

    /// 打断当前播放（抢占的机械部分）
    fn interrupt_playback(&self, transcript: &str) {
        info!("[ASR-INTERRUPT] {}", transcript);
        self.drop_output.store(true, Ordering::SeqCst);

        // 1) 本地立刻停（清队列 + 重置输出流）
        if let Some(playback) = &self.playback {
            playback.interrupt();
        }

        // 2) 让服务端也取消当前 response
        if let Some(transport) = &self.transport {
            transport.cancel_response();
            info!("response.cancel sent");
        }

        // 3) 立即退出 responding，允许继续对话
        self.force_exit_response_mode("interrupted_by_user");
    }
}
