//! 100Hz 心跳控制循环
//!
//! SDK 侧看门狗会在指令流中断时切断运动，因此本循环在任何分支下
//! 都必须发出一条指令（EMERGENCY 发 damp，其余发 set_velocity），
//! 包括自动停止发生的那个 tick。
//!
//! 定时基于绝对时间锚点（`next_target += 10ms`），消除累积误差；
//! 轻微滞后（<= 100ms）通过缩短后续休眠自然追赶，严重滞后重置锚点。

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::ManagerCore;
use super::state::ActionType;

/// 循环间隔：10ms（100Hz）
pub(crate) const LOOP_INTERVAL: Duration = Duration::from_millis(10);

// 滞后超过该阈值才重置时间锚点，允许轻微抖动自动追赶
const LAG_RESET_THRESHOLD: Duration = Duration::from_millis(100);

// 每 1000 次循环输出一次状态日志（约 10 秒）
const REPORT_EVERY: u64 = 1000;

/// 心跳循环入口（运行在独立线程中，直到运行标志被清除）
pub(crate) fn run(core: Arc<ManagerCore>) {
    info!("控制循环线程已启动 (100Hz)");

    let mut next_target = Instant::now();
    let mut loop_count: u64 = 0;
    let mut last_report = Instant::now();

    while core.running.load(Ordering::Relaxed) {
        next_target += LOOP_INTERVAL;

        tick(&core, &mut loop_count, &mut last_report);

        // 基于绝对时间控制循环频率
        let now = Instant::now();
        match next_target.checked_duration_since(now) {
            Some(remaining) => spin_sleep::sleep(remaining),
            None => {
                let lag = now.duration_since(next_target);
                if lag > LAG_RESET_THRESHOLD {
                    warn!("循环严重滞后 {:.1}ms, 重置时间锚点", lag.as_secs_f64() * 1000.0);
                    next_target = now;
                }
                // 轻微滞后：不重置，后续循环自行追赶
            }
        }
    }

    info!("控制循环线程已退出");
}

/// 单个 tick：读状态、发指令、周期性输出频率统计
fn tick(core: &ManagerCore, loop_count: &mut u64, last_report: &mut Instant) {
    // 读取当前目标速度（短临界区，只做拷贝）
    let (vx, vy, vyaw, action) = {
        let vs = core.velocity.lock();
        (vs.vx, vs.vy, vs.vyaw, vs.action)
    };

    match action {
        ActionType::Emergency => core.send_damp(),
        _ => {
            // 二次加锁检查急停：emergency_stop() 可能在上面的拷贝之后触发，
            // damp 必须赢得这次竞争
            let mut command = Some((vx, vy, vyaw));
            {
                let mut vs = core.velocity.lock();
                if vs.action == ActionType::Emergency {
                    command = None;
                } else if vs.action == ActionType::Move {
                    let now = Instant::now();
                    if vs.move_expired(now) {
                        let elapsed = vs.move_duration.unwrap_or_default().as_secs_f64();
                        vs.zero(ActionType::Idle, false);
                        info!("动作执行完成 ({:.2}s), 自动切换至空闲状态", elapsed);
                        // 本 tick 仍需发送零速度指令以维持心跳
                        command = Some((0.0, 0.0, 0.0));
                    }
                }
            }

            match command {
                Some((vx, vy, vyaw)) => core.send_move(vx, vy, vyaw),
                None => {
                    warn!("在指令发送前检测到急停信号, 已拦截移动指令");
                    core.send_damp();
                }
            }
        }
    }

    *loop_count += 1;
    if *loop_count % REPORT_EVERY == 0 {
        let now = Instant::now();
        let elapsed = now.duration_since(*last_report).as_secs_f64();
        let actual_freq = if elapsed > 0.0 { REPORT_EVERY as f64 / elapsed } else { 0.0 };
        *last_report = now;

        info!(
            "[心跳] 循环计数: {}, 频率: {:.1}Hz, 状态: {}, 速度: ({:.2}, {:.2}, {:.2})",
            loop_count,
            actual_freq,
            action.name(),
            vx,
            vy,
            vyaw
        );
    }
}
