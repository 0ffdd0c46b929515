//! 终端键盘急停监听（SSH/Headless）
//!
//! 监听 stdin 的空格键，提供不依赖图形界面的物理急停能力。
//! Linux 下把终端切到 cbreak 模式（无需回车即可读键，保留 Ctrl+C），
//! 以 100ms 间隔 poll，线程退出时恢复终端设置。
//!
//! 空格键同时触发 ActionManager 急停和 SDK 直接阻尼（双重保险）。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{error, info, warn};

use crate::manager::ActionManager;
use crate::sdk::LocoClient;

/// 键盘急停监听器
///
/// [`EmergencyKeyListener::start`] 启动监听线程；drop 时设置退出标志
/// 并等待线程结束（poll 间隔 100ms，退出延迟不超过一个周期）。
pub struct EmergencyKeyListener {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl EmergencyKeyListener {
    /// 启动终端键盘监听线程
    ///
    /// SSH 模式下必须保持终端窗口处于激活状态按键才有效。
    /// stdin 不是 TTY 时（管道、CI 环境）监听线程记录错误后直接退出。
    pub fn start(manager: ActionManager, sdk: Arc<dyn LocoClient>) -> Self {
        info!("[EmergencyStop] 正在启动终端键盘监听线程...");

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = shutdown.clone();
        let handle = thread::spawn(move || monitor_loop(manager, sdk, shutdown_flag));

        info!("[EmergencyStop] 键盘监听已启动 (请保持终端窗口激活，按 Space 键急停)");
        Self { shutdown, handle: Some(handle) }
    }

    /// 停止监听线程并等待其退出
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for EmergencyKeyListener {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

/// 执行急停逻辑（空格键触发）
fn trigger_emergency_stop(manager: &ActionManager, sdk: &Arc<dyn LocoClient>) {
    warn!("{}", "=".repeat(60));
    warn!("[EmergencyStop] 检测到 Space 键，执行紧急停止！");
    warn!("{}", "=".repeat(60));

    // 1. ActionManager 急停
    manager.emergency_stop();
    info!("[EmergencyStop] ActionManager 急停已触发");

    // 2. SDK 直接阻尼（双重保险）
    match sdk.damp() {
        Ok(()) => info!("[EmergencyStop] SDK Damp 模式已激活（双重保险）"),
        Err(e) => error!("[EmergencyStop] SDK Damp 调用失败: {}", e),
    }

    warn!("[EmergencyStop] 紧急停止完成，机器人已进入安全状态");
}

#[cfg(unix)]
fn monitor_loop(manager: ActionManager, sdk: Arc<dyn LocoClient>, shutdown: Arc<AtomicBool>) {
    use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
    use nix::sys::termios::{self, LocalFlags, SetArg, Termios};
    use std::io::Read;
    use std::os::fd::AsFd;

    // 退出时必须恢复终端设置，否则终端会乱码
    struct TermiosGuard {
        saved: Termios,
    }

    impl Drop for TermiosGuard {
        fn drop(&mut self) {
            let _ = termios::tcsetattr(std::io::stdin(), SetArg::TCSADRAIN, &self.saved);
        }
    }

    let stdin = std::io::stdin();

    let saved = match termios::tcgetattr(&stdin) {
        Ok(attrs) => attrs,
        Err(e) => {
            error!("[EmergencyStop] 无法读取终端属性 (stdin 不是 TTY?): {}", e);
            return;
        }
    };

    // cbreak 模式：关闭行缓冲与回显，保留 Ctrl+C
    let mut raw = saved.clone();
    raw.local_flags.remove(LocalFlags::ICANON | LocalFlags::ECHO);
    if let Err(e) = termios::tcsetattr(&stdin, SetArg::TCSANOW, &raw) {
        error!("[EmergencyStop] 无法设置终端 cbreak 模式: {}", e);
        return;
    }
    let _guard = TermiosGuard { saved };

    while !shutdown.load(Ordering::SeqCst) {
        // poll 检测是否有输入，100ms 超时避免阻塞退出
        let mut fds = [PollFd::new(stdin.as_fd(), PollFlags::POLLIN)];
        match poll(&mut fds, PollTimeout::from(100u8)) {
            Ok(n) if n > 0 => {
                let mut buf = [0u8; 1];
                match stdin.lock().read(&mut buf) {
                    Ok(1) if buf[0] == b' ' => trigger_emergency_stop(&manager, &sdk),
                    Ok(_) => {}
                    Err(e) => {
                        error!("[EmergencyStop] 读取 stdin 失败: {}", e);
                        break;
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                error!("[EmergencyStop] poll 失败: {}", e);
                break;
            }
        }
    }
}

#[cfg(not(unix))]
fn monitor_loop(_manager: ActionManager, _sdk: Arc<dyn LocoClient>, shutdown: Arc<AtomicBool>) {
    use std::time::Duration;

    // 非 unix 平台暂不支持终端按键监听；线程保持空转直到退出，
    // 以便上层生命周期管理保持一致
    warn!("[EmergencyStop] 当前平台不支持终端按键监听，急停热键不可用");
    while !shutdown.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(100));
    }
}
