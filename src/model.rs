use std::fmt;

use serde::Serialize;

/// 门禁总体状态（仅在显示/日志边界渲染为文本）。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessStatus {
    SystemReady,
    Granted,
    Denied,
    WifiConnected,
    SdCardError,
}

impl AccessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessStatus::SystemReady => "SYSTEM READY",
            AccessStatus::Granted => "ACCESS GRANTED",
            AccessStatus::Denied => "ACCESS DENIED",
            AccessStatus::WifiConnected => "WIFI CONNECTED",
            AccessStatus::SdCardError => "SD CARD ERROR",
        }
    }
}

/// 人体感应状态（含 RFID 联动的中间态）。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotionStatus {
    NoMotion,
    Detected,
    DetectedRfidActive,
    NoMotionRfidSleep,
}

impl MotionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MotionStatus::NoMotion => "NO MOTION",
            MotionStatus::Detected => "MOTION DETECTED",
            MotionStatus::DetectedRfidActive => "MOTION (RFID ON)",
            MotionStatus::NoMotionRfidSleep => "NO MOTION (RFID SLEEP)",
        }
    }

    /// 是否处于“检测到移动”一侧。
    pub fn is_detected(&self) -> bool {
        matches!(self, MotionStatus::Detected | MotionStatus::DetectedRfidActive)
    }
}

/// 上行消息类别，决定发布主题与 payload 的 type 字段。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Pir,
    Access,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Pir => "PIR",
            EventKind::Access => "ACCESS",
        }
    }
}

/// UID 上限长度（超出部分截断）。
pub const MAX_UID_LEN: usize = 15;

/// 未读到任何标签时的占位值。
pub const TAG_NONE: &str = "NONE";

/// 有界拷贝：超过 max 截断，并返回是否发生截断。
pub fn bounded_text(value: &str, max: usize) -> (String, bool) {
    if value.len() <= max {
        return (value.to_string(), false);
    }
    // 按字符边界回退，避免切在多字节中间
    let mut end = max;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    (value[..end].to_string(), true)
}

/// 待发布的上行消息（值语义，入队后最多消费一次）。
#[derive(Clone, Debug)]
pub struct OutgoingMessage {
    pub kind: EventKind,
    pub uid: String,
    pub status: String,
}

impl OutgoingMessage {
    /// 刷卡事件消息（status 为 AUTHORIZED / UNAUTHORIZED）。
    pub fn access(uid: &str, authorized: bool) -> Self {
        let (uid, _) = bounded_text(uid, MAX_UID_LEN);
        Self {
            kind: EventKind::Access,
            uid,
            status: if authorized { "AUTHORIZED" } else { "UNAUTHORIZED" }.to_string(),
        }
    }

    /// 人体感应消息（uid 留空）。
    pub fn motion(detected: bool) -> Self {
        Self {
            kind: EventKind::Pir,
            uid: String::new(),
            status: if detected { "MOTION_DETECTED" } else { "NO_MOTION" }.to_string(),
        }
    }

    /// 序列化为 MQTT payload（{"type":..,"uid":..,"status":..}）。
    pub fn to_payload(&self) -> String {
        let payload = MqttPayload {
            kind: self.kind.as_str(),
            uid: &self.uid,
            status: &self.status,
        };
        serde_json::to_string(&payload).unwrap_or_else(|_| "{}".to_string())
    }
}

#[derive(Serialize)]
struct MqttPayload<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    uid: &'a str,
    status: &'a str,
}

/// 运行参数（各任务节拍与窗口，编译期固定）。
#[derive(Clone, Debug)]
pub struct HubSettings {
    pub cooldown_ms: u64,
    pub tag_history_max: usize,
    pub publish_queue_max: usize,
    pub display_period_ms: u64,
    pub wifi_retry_secs: u64,
    pub mqtt_backoff_secs: u64,
    pub sensor_interval_secs: u64,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            cooldown_ms: 1000,
            tag_history_max: 10,
            publish_queue_max: 5,
            display_period_ms: 100,
            wifi_retry_secs: 5,
            mqtt_backoff_secs: 10,
            sensor_interval_secs: 60,
        }
    }
}

impl fmt::Display for OutgoingMessage {
    /// 便于日志输出的格式化展示。
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} uid={} status={}", self.kind.as_str(), self.uid, self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_payload_matches_wire_schema() {
        let msg = OutgoingMessage::access("224c8d04", true);
        assert_eq!(
            msg.to_payload(),
            r#"{"type":"ACCESS","uid":"224c8d04","status":"AUTHORIZED"}"#
        );
    }

    #[test]
    fn motion_payload_has_empty_uid() {
        let msg = OutgoingMessage::motion(true);
        assert_eq!(
            msg.to_payload(),
            r#"{"type":"PIR","uid":"","status":"MOTION_DETECTED"}"#
        );
        let msg = OutgoingMessage::motion(false);
        assert_eq!(msg.status, "NO_MOTION");
    }

    #[test]
    fn bounded_text_reports_truncation() {
        let (value, truncated) = bounded_text("0123456789abcdef", MAX_UID_LEN);
        assert_eq!(value, "0123456789abcde");
        assert!(truncated);
        let (value, truncated) = bounded_text("224c8d04", MAX_UID_LEN);
        assert_eq!(value, "224c8d04");
        assert!(!truncated);
    }

    #[test]
    fn unauthorized_access_message() {
        let msg = OutgoingMessage::access("deadbeef", false);
        assert_eq!(msg.status, "UNAUTHORIZED");
        assert_eq!(msg.kind, EventKind::Access);
    }
}
