use std::sync::mpsc::SyncSender;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::indicator::Indicator;
use crate::model::{MotionStatus, OutgoingMessage};
use crate::pipeline::enqueue_best_effort;
use crate::proto::{EventBody, ParsedEvent};
use crate::state::{HubState, TagDecision};
use crate::storage::EventLog;

/// 枢纽业务处理器：串口事件 -> 状态落位 -> 三路扇出。
///
/// 扇出固定顺序：指示输出、日志追加、发布入队；三者相互独立，
/// 任何一路失败都不影响其余两路。
pub struct HubProcessor {
    state: Arc<Mutex<HubState>>,
    indicator: Indicator<'static>,
    event_log: EventLog,
    publish_tx: SyncSender<OutgoingMessage>,
    boot: Instant,
}

impl HubProcessor {
    pub fn new(
        state: Arc<Mutex<HubState>>,
        indicator: Indicator<'static>,
        event_log: EventLog,
        publish_tx: SyncSender<OutgoingMessage>,
        boot: Instant,
    ) -> Self {
        Self {
            state,
            indicator,
            event_log,
            publish_tx,
            boot,
        }
    }

    pub fn handle_event(&mut self, event: ParsedEvent) {
        let external_ts = event.timestamp.as_deref();
        match event.body {
            EventBody::TagRead { ref uid, truncated } => {
                if truncated {
                    log::warn!("UID truncated to {} chars: {}", crate::model::MAX_UID_LEN, uid);
                }
                self.handle_tag(uid, external_ts);
            }
            EventBody::MotionOn { rfid_activated } => {
                let motion = if rfid_activated {
                    MotionStatus::DetectedRfidActive
                } else {
                    MotionStatus::Detected
                };
                self.handle_motion(motion, external_ts);
            }
            EventBody::MotionOff { rfid_sleep } => {
                let motion = if rfid_sleep {
                    MotionStatus::NoMotionRfidSleep
                } else {
                    MotionStatus::NoMotion
                };
                self.handle_motion(motion, external_ts);
            }
            EventBody::MotionOther(ref text) => {
                // 未知的 PIR 上报按数据记录，不改状态
                log::info!("PIR (unclassified): {}", text);
                self.append_log("PIR_EVENT", text, external_ts);
            }
            EventBody::Unrecognized(ref text) => {
                log::info!("unrecognized line: {}", text);
            }
        }
    }

    fn handle_tag(&mut self, uid: &str, external_ts: Option<&str>) {
        let now_ms = self.uptime_ms();
        let decision = match self.state.lock() {
            Ok(mut state) => state.handle_tag_read(uid, now_ms),
            Err(_) => return,
        };
        let granted = match decision {
            TagDecision::Suppressed => {
                log::debug!("duplicate read suppressed: {}", uid);
                return;
            }
            TagDecision::Granted => true,
            TagDecision::Denied => false,
        };
        log::info!("tag {}: {}", uid, if granted { "granted" } else { "denied" });

        // 1. 指示输出（蜂鸣期间同步阻塞）
        if let Err(err) = self.indicator.signal_access(granted) {
            log::warn!("indicator update failed: {:?}", err);
        }
        // 2. 日志
        let status = if granted { "AUTHORIZED" } else { "UNAUTHORIZED" };
        self.append_log(
            "ACCESS_EVENT",
            &format!("UID={}, Status={}", uid, status),
            external_ts,
        );
        // 3. 上行入队（尽力而为）
        enqueue_best_effort(&self.publish_tx, OutgoingMessage::access(uid, granted));

        if let Ok(state) = self.state.lock() {
            state.tag_history().log_stats();
        }
    }

    fn handle_motion(&mut self, motion: MotionStatus, external_ts: Option<&str>) {
        let detected = motion.is_detected();
        if let Ok(mut state) = self.state.lock() {
            state.handle_motion(motion);
        }
        if let Err(err) = self.indicator.signal_motion(detected) {
            log::warn!("indicator update failed: {:?}", err);
        }
        self.append_log("PIR_EVENT", motion.as_str(), external_ts);
        enqueue_best_effort(&self.publish_tx, OutgoingMessage::motion(detected));
    }

    /// 日志失败降级：记诊断 + 打 SD 故障状态，不中断处理。
    fn append_log(&self, event_type: &str, message: &str, external_ts: Option<&str>) {
        if let Err(err) = self.event_log.append(event_type, message, external_ts) {
            log::warn!("event log append failed: {}", err);
            if let Ok(mut state) = self.state.lock() {
                if state.sd_ready() {
                    state.set_sd_ready(false);
                }
            }
        }
    }

    fn uptime_ms(&self) -> u64 {
        self.boot.elapsed().as_millis() as u64
    }
}
