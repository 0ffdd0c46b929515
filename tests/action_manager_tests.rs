//! ActionManager 跨线程集成测试
//!
//! 用 Mock SDK 客户端记录全部指令流，验证：
//! 1. 心跳循环持续发送指令且速度永不超出硬限幅
//! 2. 急停抢占：清队列、取消当前任务、damp 赢得竞争
//! 3. 自动停止边界：到期后切空闲但心跳不中断
//! 4. 任务流水线与历史淘汰
//!
//! 测试依赖真实时间（100Hz 循环 + sleep），断言留有 CI 抖动余量。

use g1_motion::{ActionManager, ActionType, LocoClient, SdkError, TaskCommand, TaskStatus};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Mock SDK 收到的指令
#[derive(Debug, Clone, Copy, PartialEq)]
enum SdkCommand {
    Move { vx: f64, vy: f64, vyaw: f64 },
    Damp,
    SquatToStand,
}

/// 记录指令流的 Mock 运动客户端
struct MockLocoClient {
    commands: Mutex<Vec<SdkCommand>>,
    damp_count: AtomicU64,
}

impl MockLocoClient {
    fn new() -> Arc<Self> {
        Arc::new(Self { commands: Mutex::new(Vec::new()), damp_count: AtomicU64::new(0) })
    }

    fn commands(&self) -> Vec<SdkCommand> {
        self.commands.lock().unwrap().clone()
    }

    fn damp_count(&self) -> u64 {
        self.damp_count.load(Ordering::Relaxed)
    }
}

impl LocoClient for MockLocoClient {
    fn set_velocity(&self, vx: f64, vy: f64, vyaw: f64) -> Result<(), SdkError> {
        self.commands.lock().unwrap().push(SdkCommand::Move { vx, vy, vyaw });
        Ok(())
    }

    fn damp(&self) -> Result<(), SdkError> {
        self.commands.lock().unwrap().push(SdkCommand::Damp);
        self.damp_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn squat_to_stand(&self) -> Result<(), SdkError> {
        self.commands.lock().unwrap().push(SdkCommand::SquatToStand);
        Ok(())
    }
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

fn started_manager() -> (ActionManager, Arc<MockLocoClient>) {
    init_tracing();
    let sdk = MockLocoClient::new();
    let manager = ActionManager::new(sdk.clone());
    manager.start();
    (manager, sdk)
}

#[test]
fn test_heartbeat_emits_steady_command_stream() {
    let (manager, sdk) = started_manager();

    thread::sleep(Duration::from_millis(300));
    manager.stop();

    // 300ms @ 100Hz 理论 30 条；CI 抖动留余量
    let commands = sdk.commands();
    let move_count = commands
        .iter()
        .filter(|c| matches!(c, SdkCommand::Move { .. }))
        .count();
    assert!(move_count >= 20, "期望至少 20 条心跳指令，实际 {}", move_count);

    // 空闲状态下发送的是零速度
    assert!(commands.iter().all(|c| matches!(
        c,
        SdkCommand::Move { vx, vy, vyaw } if *vx == 0.0 && *vy == 0.0 && *vyaw == 0.0
    )));
}

#[test]
fn test_emitted_velocities_never_exceed_hard_limits() {
    let (manager, sdk) = started_manager();

    // 远超硬限幅的输入
    manager.update_target_velocity(5.0, -4.0, 9.0, Some(0.5));
    thread::sleep(Duration::from_millis(200));
    manager.stop();

    for command in sdk.commands() {
        if let SdkCommand::Move { vx, vy, vyaw } = command {
            assert!(vx.abs() <= 1.0, "vx 超出硬限幅: {}", vx);
            assert!(vy.abs() <= 1.0, "vy 超出硬限幅: {}", vy);
            assert!(vyaw.abs() <= 1.5, "vyaw 超出硬限幅: {}", vyaw);
        }
    }
}

#[test]
fn test_emergency_preemption_cancels_everything() {
    let (manager, sdk) = started_manager();

    let task_id = manager.add_task(TaskCommand::Move { vx: 0.5, vy: 0.0, vyaw: 0.0 }, 5.0);
    // 等执行器取走任务并开始移动
    thread::sleep(Duration::from_millis(150));
    assert_eq!(manager.get_task_status(&task_id).unwrap().status, TaskStatus::Running);

    manager.emergency_stop();

    // 状态：EMERGENCY + 急停标志 + 队列已清空 + 当前任务已取消
    let state = manager.get_state();
    assert_eq!(state.action, ActionType::Emergency);
    assert!(state.emergency);
    assert_eq!(manager.task_queue_len(), 0);
    assert_eq!(manager.get_task_status(&task_id).unwrap().status, TaskStatus::Cancelled);
    assert!(sdk.damp_count() >= 1, "急停必须同步发送 damp");

    // 急停之后心跳只发 damp，不再出现非零移动指令
    let boundary = sdk.commands().len();
    thread::sleep(Duration::from_millis(200));
    let commands = sdk.commands();
    for command in &commands[boundary..] {
        match command {
            SdkCommand::Damp => {}
            SdkCommand::Move { vx, vy, vyaw } => {
                assert_eq!((*vx, *vy, *vyaw), (0.0, 0.0, 0.0), "急停后不得发送非零移动指令");
            }
            SdkCommand::SquatToStand => panic!("急停后不应出现恢复指令"),
        }
    }
    assert!(
        commands[boundary..].iter().any(|c| matches!(c, SdkCommand::Damp)),
        "急停状态下心跳应持续发送 damp"
    );

    manager.stop();
}

#[test]
fn test_auto_stop_boundary_keeps_heartbeat_alive() {
    let (manager, sdk) = started_manager();

    manager.update_target_velocity(0.5, 0.0, 0.0, Some(0.2));

    // 250ms 时应已自动切换空闲
    thread::sleep(Duration::from_millis(250));
    assert_eq!(manager.get_state().action, ActionType::Idle);

    thread::sleep(Duration::from_millis(150));
    manager.stop();

    let commands = sdk.commands();
    let moving = commands
        .iter()
        .filter(|c| matches!(c, SdkCommand::Move { vx, .. } if *vx == 0.5))
        .count();
    let stopped = commands
        .iter()
        .filter(|c| {
            matches!(c, SdkCommand::Move { vx, vy, vyaw } if *vx == 0.0 && *vy == 0.0 && *vyaw == 0.0)
        })
        .count();

    // 0.2s @ 100Hz 约 20 条移动指令，之后全部为零速度
    assert!(moving >= 10, "期望至少 10 条移动指令，实际 {}", moving);
    assert!(stopped >= 15, "自动停止后心跳必须继续发送零速度，实际 {}", stopped);

    // 移动指令之后不再出现非零速度（单调：move → idle）
    let last_moving = commands
        .iter()
        .rposition(|c| matches!(c, SdkCommand::Move { vx, .. } if *vx == 0.5))
        .unwrap();
    assert!(commands[last_moving + 1..].iter().all(|c| matches!(
        c,
        SdkCommand::Move { vx, vy, vyaw } if *vx == 0.0 && *vy == 0.0 && *vyaw == 0.0
    )));
}

#[test]
fn test_task_pipeline_runs_to_completion() {
    let (manager, _sdk) = started_manager();

    let task_id = manager.add_task(TaskCommand::Move { vx: 0.3, vy: 0.0, vyaw: 0.0 }, 0.2);
    thread::sleep(Duration::from_millis(500));

    let task = manager.get_task_status(&task_id).unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.started_at_us.is_some());
    assert!(task.ended_at_us.is_some());
    assert!(task.ended_at_us >= task.started_at_us);

    manager.stop();
}

#[test]
fn test_at_most_one_task_running() {
    let (manager, _sdk) = started_manager();

    let ids: Vec<String> = (0..3)
        .map(|_| manager.add_task(TaskCommand::Move { vx: 0.2, vy: 0.0, vyaw: 0.0 }, 0.15))
        .collect();

    // 整个执行窗口内任意时刻至多一个任务处于 Running
    for _ in 0..60 {
        let running = ids
            .iter()
            .filter_map(|id| manager.get_task_status(id))
            .filter(|t| t.status == TaskStatus::Running)
            .count();
        assert!(running <= 1, "同时有 {} 个任务处于 Running", running);
        thread::sleep(Duration::from_millis(10));
    }

    manager.stop();
}

#[test]
fn test_completed_ring_evicts_oldest() {
    let sdk = MockLocoClient::new();
    let manager = ActionManager::with_history_capacity(sdk, 3);
    manager.start();

    let ids: Vec<String> = (0..5).map(|_| manager.add_task(TaskCommand::Stop, 0.0)).collect();
    thread::sleep(Duration::from_millis(400));

    // 容量 3：最早完成的 task_0 / task_1 被淘汰
    assert!(manager.get_task_status(&ids[0]).is_none());
    assert!(manager.get_task_status(&ids[1]).is_none());
    for id in &ids[2..] {
        assert_eq!(manager.get_task_status(id).unwrap().status, TaskStatus::Completed);
    }

    manager.stop();
}

#[test]
fn test_start_is_idempotent() {
    let (manager, sdk) = started_manager();

    // 重复启动不产生第二条心跳线程
    manager.start();
    assert!(manager.is_running());

    thread::sleep(Duration::from_millis(200));
    manager.stop();
    assert!(!manager.is_running());

    // 粗略频率检查：200ms 内不应出现双倍心跳（400Hz 量级）
    let move_count = sdk
        .commands()
        .iter()
        .filter(|c| matches!(c, SdkCommand::Move { .. }))
        .count();
    assert!(move_count <= 60, "重复 start 产生了多余的心跳线程? 指令数 {}", move_count);
}

#[test]
fn test_stop_emits_final_zero_velocity() {
    let (manager, sdk) = started_manager();

    manager.update_target_velocity(0.5, 0.0, 0.0, None);
    thread::sleep(Duration::from_millis(100));
    manager.stop();

    let commands = sdk.commands();
    assert!(
        matches!(
            commands.last(),
            Some(SdkCommand::Move { vx, vy, vyaw }) if *vx == 0.0 && *vy == 0.0 && *vyaw == 0.0
        ),
        "stop() 必须补发一条零速度指令"
    );
}

#[test]
fn test_recover_from_emergency_resumes_heartbeat_moves() {
    let (manager, sdk) = started_manager();

    manager.emergency_stop();
    thread::sleep(Duration::from_millis(100));

    assert!(manager.recover_from_emergency());
    assert_eq!(manager.get_state().action, ActionType::Idle);
    assert!(sdk.commands().contains(&SdkCommand::SquatToStand));

    // 恢复后心跳回到零速度移动指令
    let boundary = sdk.commands().len();
    thread::sleep(Duration::from_millis(100));
    assert!(
        sdk.commands()[boundary..]
            .iter()
            .any(|c| matches!(c, SdkCommand::Move { .. })),
        "恢复后心跳应重新发送移动指令"
    );

    manager.stop();
}
