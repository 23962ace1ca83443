use crate::model::{bounded_text, MAX_UID_LEN};

/// 事件负载中的标记子串，按优先级匹配。
pub const MARK_MOTION_RFID_ON: &str = "PIR_STATUS:MOTION_DETECTED_RFID_ACTIVATED";
pub const MARK_MOTION_RFID_SLEEP: &str = "PIR_STATUS:NO_MOTION_RFID_SLEEP";
pub const MARK_MOTION_ON: &str = "PIR_STATUS:MOTION_DETECTED";
pub const MARK_MOTION_OFF: &str = "PIR_STATUS:NO_MOTION";
pub const MARK_PIR: &str = "PIR_STATUS:";
pub const MARK_UID_LONG: &str = "RFID_UID:";
pub const MARK_UID_SHORT: &str = "UID:";

/// 一行输入解析出的事件体。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventBody {
    /// 检测到移动；rfid_activated 表示读卡器被联动唤醒。
    MotionOn { rfid_activated: bool },
    /// 移动消失；rfid_sleep 表示读卡器进入休眠。
    MotionOff { rfid_sleep: bool },
    /// PIR 上报但不属于已知状态，保留原文。
    MotionOther(String),
    /// 刷卡事件；truncated 表示 UID 超长被截断。
    TagRead { uid: String, truncated: bool },
    /// 无法识别的行，原文保留用于日志。
    Unrecognized(String),
}

/// 单行解析结果：可选外部时间戳 + 事件体。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedEvent {
    pub timestamp: Option<String>,
    pub body: EventBody,
}

/// 解析一行上报文本。
///
/// 行格式为 `[<timestamp>] <EVENT_KIND>:<payload>`，时间戳括号是否存在
/// 取决于外设固件代数；缺失时由调用方补本地时间。匹配按子串包含进行，
/// 且只作用于去掉时间戳括号后的负载部分。
pub fn parse_line(line: &str) -> ParsedEvent {
    let (timestamp, payload) = split_timestamp(line);

    let body = if payload.contains(MARK_MOTION_RFID_ON) {
        EventBody::MotionOn { rfid_activated: true }
    } else if payload.contains(MARK_MOTION_RFID_SLEEP) {
        EventBody::MotionOff { rfid_sleep: true }
    } else if payload.contains(MARK_MOTION_ON) {
        EventBody::MotionOn { rfid_activated: false }
    } else if payload.contains(MARK_MOTION_OFF) {
        EventBody::MotionOff { rfid_sleep: false }
    } else if let Some(uid) = extract_uid(payload) {
        let (uid, truncated) = bounded_text(&uid, MAX_UID_LEN);
        EventBody::TagRead { uid, truncated }
    } else if payload.contains(MARK_PIR) {
        // 未知 PIR 状态兜底，排在 UID 提取之后
        EventBody::MotionOther(payload.to_string())
    } else {
        EventBody::Unrecognized(payload.to_string())
    };

    ParsedEvent { timestamp, body }
}

/// 剥离行首 `[...]` 时间戳；无括号时整行即负载。
fn split_timestamp(line: &str) -> (Option<String>, &str) {
    let trimmed = line.trim_start();
    if !trimmed.starts_with('[') {
        return (None, line);
    }
    let Some(close) = trimmed.find(']') else {
        return (None, line);
    };
    let timestamp = trimmed[1..close].to_string();
    let rest = &trimmed[close + 1..];
    // 括号后约定跟一个空格，缺失时也容忍
    let payload = rest.strip_prefix(' ').unwrap_or(rest);
    (Some(timestamp), payload)
}

/// 提取 UID 标记后的首个 token（去掉前导空格）。
fn extract_uid(payload: &str) -> Option<String> {
    let marker = if payload.contains(MARK_UID_LONG) {
        MARK_UID_LONG
    } else if payload.contains(MARK_UID_SHORT) {
        MARK_UID_SHORT
    } else {
        return None;
    };
    let start = payload.find(marker)? + marker.len();
    let token = payload[start..].trim_start().split_whitespace().next()?;
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}
