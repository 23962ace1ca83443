use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::access::{is_authorized, TagHistory};
use crate::model::{bounded_text, AccessStatus, HubSettings, MotionStatus, MAX_UID_LEN, TAG_NONE};

/// 一次刷卡的处理结论。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagDecision {
    /// 冷却窗口内的重复读取，不产生任何下游副作用。
    Suppressed,
    Granted,
    Denied,
}

/// 共享状态快照（锁内拷出，锁外使用）。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub access_status: AccessStatus,
    pub last_tag: String,
    pub motion: MotionStatus,
    pub wifi_connected: bool,
    pub mqtt_connected: bool,
}

/// 门禁枢纽全局状态（状态字段 + 标签历史），整体由一把互斥锁保护。
///
/// 字段不直接暴露；所有读写经由方法，临界区保持最小。
pub struct HubState {
    pub settings: HubSettings,
    access_status: AccessStatus,
    last_tag: String,
    motion: MotionStatus,
    wifi_connected: bool,
    mqtt_connected: bool,
    sd_ready: bool,
    sensor_logging_enabled: bool,
    tag_history: TagHistory,
}

impl HubState {
    pub fn bootstrap(settings: HubSettings) -> Self {
        let tag_history = TagHistory::new(settings.tag_history_max, settings.cooldown_ms);
        Self {
            settings,
            access_status: AccessStatus::SystemReady,
            last_tag: TAG_NONE.to_string(),
            motion: MotionStatus::NoMotion,
            wifi_connected: false,
            mqtt_connected: false,
            sd_ready: false,
            sensor_logging_enabled: false,
            tag_history,
        }
    }

    /// 处理一次刷卡：限流判定 + 授权判定 + 状态落位。
    pub fn handle_tag_read(&mut self, uid: &str, now_ms: u64) -> TagDecision {
        if !self.tag_history.admit_read(uid, now_ms) {
            return TagDecision::Suppressed;
        }
        let (tag, _) = bounded_text(uid, MAX_UID_LEN);
        self.last_tag = tag;
        if is_authorized(uid) {
            self.access_status = AccessStatus::Granted;
            // 放行后开启环境记录，拒绝则关闭（沿用部署约定）
            self.sensor_logging_enabled = true;
            TagDecision::Granted
        } else {
            self.access_status = AccessStatus::Denied;
            self.sensor_logging_enabled = false;
            TagDecision::Denied
        }
    }

    /// 处理人体感应状态变化。
    pub fn handle_motion(&mut self, motion: MotionStatus) {
        self.motion = motion;
    }

    pub fn set_access_status(&mut self, status: AccessStatus) {
        self.access_status = status;
    }

    /// 更新网络健康状态（None 表示保持不变）。
    pub fn update_health(&mut self, wifi: Option<bool>, mqtt: Option<bool>) {
        if let Some(connected) = wifi {
            self.wifi_connected = connected;
        }
        if let Some(connected) = mqtt {
            self.mqtt_connected = connected;
        }
    }

    pub fn set_sd_ready(&mut self, ready: bool) {
        self.sd_ready = ready;
        if !ready {
            self.access_status = AccessStatus::SdCardError;
        }
    }

    pub fn sd_ready(&self) -> bool {
        self.sd_ready
    }

    pub fn sensor_logging_enabled(&self) -> bool {
        self.sensor_logging_enabled
    }

    pub fn motion(&self) -> MotionStatus {
        self.motion
    }

    pub fn tag_history(&self) -> &TagHistory {
        &self.tag_history
    }

    /// 拷出一份显示用快照。
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            access_status: self.access_status,
            last_tag: self.last_tag.clone(),
            motion: self.motion,
            wifi_connected: self.wifi_connected,
            mqtt_connected: self.mqtt_connected,
        }
    }
}

/// 有界等待地拿一次快照：try_lock 重试若干次，拿不到返回 None。
///
/// 显示路径专用——持锁方卡住时宁可用上一帧的旧值，也不冻结 UI。
/// 摄取路径的写者不用本函数，丢状态更新比短暂停顿代价更高。
pub fn try_snapshot(state: &Arc<Mutex<HubState>>, attempts: u32, interval_ms: u64) -> Option<StatusSnapshot> {
    for attempt in 0..attempts {
        if let Ok(state) = state.try_lock() {
            return Some(state.snapshot());
        }
        if attempt + 1 < attempts {
            thread::sleep(Duration::from_millis(interval_ms));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HubSettings;

    fn state() -> HubState {
        HubState::bootstrap(HubSettings::default())
    }

    #[test]
    fn boot_snapshot_has_sentinels() {
        let snapshot = state().snapshot();
        assert_eq!(snapshot.access_status, AccessStatus::SystemReady);
        assert_eq!(snapshot.last_tag, TAG_NONE);
        assert_eq!(snapshot.motion, MotionStatus::NoMotion);
        assert!(!snapshot.wifi_connected);
    }

    #[test]
    fn authorized_tag_grants_and_enables_sensor_logging() {
        let mut state = state();
        let decision = state.handle_tag_read("224c8d04", 0);
        assert_eq!(decision, TagDecision::Granted);
        let snapshot = state.snapshot();
        assert_eq!(snapshot.access_status, AccessStatus::Granted);
        assert_eq!(snapshot.last_tag, "224c8d04");
        assert!(state.sensor_logging_enabled());
    }

    #[test]
    fn unauthorized_tag_denies_and_disables_sensor_logging() {
        let mut state = state();
        state.handle_tag_read("224c8d04", 0);
        let decision = state.handle_tag_read("deadbeef", 2000);
        assert_eq!(decision, TagDecision::Denied);
        assert_eq!(state.snapshot().access_status, AccessStatus::Denied);
        assert_eq!(state.snapshot().last_tag, "deadbeef");
        assert!(!state.sensor_logging_enabled());
    }

    #[test]
    fn rapid_repeat_is_suppressed_without_state_change() {
        let mut state = state();
        assert_eq!(state.handle_tag_read("224c8d04", 0), TagDecision::Granted);
        let before = state.snapshot();
        assert_eq!(state.handle_tag_read("224c8d04", 300), TagDecision::Suppressed);
        assert_eq!(state.snapshot(), before);
        // 统计仍然累积
        assert_eq!(state.tag_history().get("224c8d04").unwrap().read_attempts, 2);
    }

    #[test]
    fn motion_transitions_round_trip() {
        let mut state = state();
        assert_eq!(state.motion(), MotionStatus::NoMotion);
        state.handle_motion(MotionStatus::Detected);
        assert_eq!(state.snapshot().motion, MotionStatus::Detected);
        state.handle_motion(MotionStatus::NoMotion);
        assert_eq!(state.snapshot().motion, MotionStatus::NoMotion);
    }

    #[test]
    fn sd_failure_sets_status_but_access_still_works() {
        let mut state = state();
        state.set_sd_ready(false);
        assert_eq!(state.snapshot().access_status, AccessStatus::SdCardError);
        // 存储故障不阻断门禁判定
        assert_eq!(state.handle_tag_read("224c8d04", 0), TagDecision::Granted);
        assert_eq!(state.snapshot().access_status, AccessStatus::Granted);
    }

    #[test]
    fn bounded_snapshot_succeeds_on_free_lock() {
        let shared = Arc::new(Mutex::new(state()));
        let snapshot = try_snapshot(&shared, 3, 1);
        assert!(snapshot.is_some());
    }
}
