use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use embedded_graphics::{
    mono_font::{ascii::FONT_6X10, MonoTextStyleBuilder},
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Baseline, Text},
};
use esp_idf_hal::i2c::I2cDriver;
use ssd1306::{prelude::*, I2CDisplayInterface, Ssd1306};

use crate::model::TAG_NONE;
use crate::state::{try_snapshot, HubState, StatusSnapshot};

/// 状态锁的有界等待参数：3 次尝试，每次间隔 10ms。
const SNAPSHOT_ATTEMPTS: u32 = 3;
const SNAPSHOT_INTERVAL_MS: u64 = 10;

/// 把快照渲染成固定版式的文本帧（纯函数，便于测试）。
pub fn format_frame(snapshot: &StatusSnapshot) -> Vec<String> {
    let coarse = if snapshot.last_tag == TAG_NONE {
        "WAITING TAG"
    } else {
        "TAG DETECTED"
    };
    vec![
        "== ACCESS HUB ==".to_string(),
        snapshot.access_status.as_str().to_string(),
        snapshot.motion.as_str().to_string(),
        format!("TAG: {}", snapshot.last_tag),
        coarse.to_string(),
        format!(
            "NET {} MQTT {}",
            if snapshot.wifi_connected { "UP" } else { "DOWN" },
            if snapshot.mqtt_connected { "OK" } else { "--" }
        ),
    ]
}

/// 启动显示刷新任务：周期性快照共享状态并重绘 OLED。
///
/// 面板由本任务独占，绘制慢不会卡住状态锁的生产者；
/// 拿不到状态锁就沿用上一帧快照继续刷新。
pub fn spawn_display_task(
    i2c: I2cDriver<'static>,
    state: Arc<Mutex<HubState>>,
    period_ms: u64,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let interface = I2CDisplayInterface::new(i2c);
        let mut display = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
            .into_buffered_graphics_mode();
        if let Err(err) = display.init() {
            log::warn!("OLED init failed: {:?}", err);
            return;
        }
        let text_style = MonoTextStyleBuilder::new()
            .font(&FONT_6X10)
            .text_color(BinaryColor::On)
            .build();

        let mut last: Option<StatusSnapshot> = None;
        loop {
            let snapshot = match try_snapshot(&state, SNAPSHOT_ATTEMPTS, SNAPSHOT_INTERVAL_MS) {
                Some(snapshot) => {
                    last = Some(snapshot.clone());
                    snapshot
                }
                None => match last.clone() {
                    // 锁竞争超时：用旧值刷新
                    Some(stale) => stale,
                    None => {
                        thread::sleep(Duration::from_millis(period_ms));
                        continue;
                    }
                },
            };

            display.clear_buffer();
            let mut draw_ok = true;
            for (row, line) in format_frame(&snapshot).iter().enumerate() {
                let point = Point::new(0, (row as i32) * 10);
                if Text::with_baseline(line, point, text_style, Baseline::Top)
                    .draw(&mut display)
                    .is_err()
                {
                    draw_ok = false;
                    break;
                }
            }
            if draw_ok {
                if let Err(err) = display.flush() {
                    log::warn!("OLED flush failed: {:?}", err);
                }
            }

            thread::sleep(Duration::from_millis(period_ms));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AccessStatus, MotionStatus};

    fn snapshot() -> StatusSnapshot {
        StatusSnapshot {
            access_status: AccessStatus::SystemReady,
            last_tag: TAG_NONE.to_string(),
            motion: MotionStatus::NoMotion,
            wifi_connected: false,
            mqtt_connected: false,
        }
    }

    #[test]
    fn frame_is_idempotent_for_equal_snapshots() {
        let snap = snapshot();
        assert_eq!(format_frame(&snap), format_frame(&snap));
    }

    #[test]
    fn sentinel_tag_renders_waiting() {
        let frame = format_frame(&snapshot());
        assert!(frame.contains(&"WAITING TAG".to_string()));
        assert!(frame.contains(&"TAG: NONE".to_string()));
        assert!(frame.contains(&"SYSTEM READY".to_string()));
    }

    #[test]
    fn detected_tag_renders_coarse_status() {
        let mut snap = snapshot();
        snap.last_tag = "224c8d04".to_string();
        snap.access_status = AccessStatus::Granted;
        let frame = format_frame(&snap);
        assert!(frame.contains(&"TAG DETECTED".to_string()));
        assert!(frame.contains(&"ACCESS GRANTED".to_string()));
    }

    #[test]
    fn network_state_reflected_in_frame() {
        let mut snap = snapshot();
        snap.wifi_connected = true;
        snap.mqtt_connected = true;
        let frame = format_frame(&snap);
        assert!(frame.contains(&"NET UP MQTT OK".to_string()));
    }
}
