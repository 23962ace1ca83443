use std::sync::mpsc::Sender;
use std::thread;

use esp_idf_hal::delay::{FreeRtos, NON_BLOCK};
use esp_idf_hal::uart::UartRxDriver;

use crate::proto::{parse_line, ParsedEvent};
use crate::serial::LineReader;

/// 空转时的让出间隔（毫秒）。串口读取走非阻塞轮询，
/// 没有数据就短睡一拍，避免饿死低优先级任务。
const IDLE_SLEEP_MS: u32 = 10;

/// 启动串口摄取任务：字节流 -> 行 -> 解析事件 -> 管线。
pub fn spawn_uart_task(
    rx: UartRxDriver<'static>,
    event_tx: Sender<ParsedEvent>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = LineReader::new();
        let mut buf = [0u8; 64];
        loop {
            match rx.read(&mut buf, NON_BLOCK) {
                Ok(count) if count > 0 => {
                    reader.push_bytes(&buf[..count], |line| {
                        log::debug!("serial line: {}", line);
                        let _ = event_tx.send(parse_line(&line));
                    });
                }
                Ok(_) => {
                    FreeRtos::delay_ms(IDLE_SLEEP_MS);
                }
                Err(err) => {
                    log::warn!("UART RX error: {:?}", err);
                    FreeRtos::delay_ms(IDLE_SLEEP_MS);
                }
            }
        }
    })
}
