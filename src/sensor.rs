use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use esp_idf_hal::delay::BLOCK;
use esp_idf_hal::i2c::I2cDriver;
use esp_idf_hal::sys::EspError;

use crate::state::HubState;
use crate::storage::EventLog;

const AHT10_ADDR: u8 = 0x38;
const CMD_INIT: [u8; 3] = [0xE1, 0x08, 0x00];
const CMD_MEASURE: [u8; 3] = [0xAC, 0x33, 0x00];

/// 一次温湿度读数。
#[derive(Clone, Copy, Debug)]
pub struct Measurement {
    pub temperature: f32,
    pub humidity: f32,
}

/// AHT10 温湿度传感器（I2C）。
pub struct Aht10<'d> {
    i2c: I2cDriver<'d>,
}

impl<'d> Aht10<'d> {
    pub fn new(mut i2c: I2cDriver<'d>) -> Result<Self, EspError> {
        i2c.write(AHT10_ADDR, &CMD_INIT, BLOCK)?;
        thread::sleep(Duration::from_millis(20));
        Ok(Self { i2c })
    }

    /// 触发一次测量并读回结果；传感器忙或未校准时返回 None。
    pub fn read(&mut self) -> Result<Option<Measurement>, EspError> {
        self.i2c.write(AHT10_ADDR, &CMD_MEASURE, BLOCK)?;
        // 数据手册给出的典型测量时长 75ms
        thread::sleep(Duration::from_millis(80));
        let mut buf = [0u8; 6];
        self.i2c.read(AHT10_ADDR, &mut buf, BLOCK)?;
        // 状态字节：bit7 忙标志、bit3 校准标志
        if (buf[0] & 0x88) != 0x08 {
            return Ok(None);
        }
        let raw_humidity =
            ((buf[1] as u32) << 12) | ((buf[2] as u32) << 4) | ((buf[3] >> 4) as u32);
        let raw_temp = (((buf[3] & 0x0F) as u32) << 16) | ((buf[4] as u32) << 8) | buf[5] as u32;
        Ok(Some(Measurement {
            humidity: (raw_humidity as f32 / 1_048_576.0) * 100.0,
            temperature: (raw_temp as f32 / 1_048_576.0) * 200.0 - 50.0,
        }))
    }
}

/// 启动环境记录任务：放行后按固定周期把温湿度写入事件日志。
///
/// 开关位由刷卡判定驱动（放行开启、拒绝关闭）；传感器或总线
/// 故障只跳过当个周期。
pub fn spawn_sensor_task(
    i2c: I2cDriver<'static>,
    state: Arc<Mutex<HubState>>,
    event_log: EventLog,
    interval_secs: u64,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut sensor = match Aht10::new(i2c) {
            Ok(sensor) => sensor,
            Err(err) => {
                log::warn!("AHT10 init failed: {:?}", err);
                return;
            }
        };
        let interval = Duration::from_secs(interval_secs);
        let mut last_read: Option<Instant> = None;
        loop {
            thread::sleep(Duration::from_secs(1));

            let enabled = state
                .lock()
                .map(|state| state.sensor_logging_enabled())
                .unwrap_or(false);
            if !enabled {
                continue;
            }
            if let Some(at) = last_read {
                if at.elapsed() < interval {
                    continue;
                }
            }
            last_read = Some(Instant::now());

            match sensor.read() {
                Ok(Some(m)) => {
                    let line = format!("Temp={:.2} C, Hum={:.2} %", m.temperature, m.humidity);
                    log::info!("sensor: {}", line);
                    if let Err(err) = event_log.append("SENSOR_READ", &line, None) {
                        log::warn!("sensor log append failed: {}", err);
                    }
                }
                Ok(None) => log::warn!("AHT10 busy or uncalibrated, skipping cycle"),
                Err(err) => log::warn!("AHT10 read failed: {:?}", err),
            }
        }
    })
}
