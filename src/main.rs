// 模块划分：串口、协议、处理管线、外设与网络
mod access;
mod display;
mod indicator;
mod model;
mod mqtt;
mod net;
mod pipeline;
mod processor;
mod proto;
mod sensor;
mod serial;
mod state;
mod storage;
mod topics;
mod uart_link;

use std::sync::{Arc, Mutex};
use std::time::Instant;

use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{AnyInputPin, AnyOutputPin, OutputPin};
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::prelude::*;
use esp_idf_hal::uart;

use indicator::Indicator;
use pipeline::spawn_processor_loop;
use processor::HubProcessor;

fn main() {
    // ESP-IDF 运行时初始化（链接补丁 & 日志）
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    log::info!("access hub booting (ESP-IDF)...");
    let boot = Instant::now();

    let peripherals = Peripherals::take().unwrap();
    let pins = peripherals.pins;
    let modem = peripherals.modem;

    // 指示输出最先就绪：后续任何初始化失败都要能提示出来
    let mut indicator = Indicator::new(
        pins.gpio5.downgrade_output(),
        pins.gpio6.downgrade_output(),
        pins.gpio7.downgrade_output(),
        pins.gpio8.downgrade_output(),
    )
    .unwrap();

    // 串口摄取：读卡/感应单元的上报链路（只收不发）
    let uart_config = uart::config::Config::new().baudrate(Hertz(9_600));
    let uart = match uart::UartDriver::new(
        peripherals.uart1,
        pins.gpio17,
        pins.gpio18,
        AnyInputPin::none(),
        AnyOutputPin::none(),
        &uart_config,
    ) {
        Ok(uart) => uart,
        Err(err) => {
            // 没有串口就没有事件来源，属于致命故障
            log::error!("UART init failed: {:?}", err);
            indicator.halt_blinking();
        }
    };
    let (_uart_tx, uart_rx) = uart.into_split();

    // 共享状态
    let settings = model::HubSettings::default();
    let state = Arc::new(Mutex::new(state::HubState::bootstrap(settings.clone())));

    // SD 卡挂载：失败降级为无持久日志运行
    let _sd_mount = match storage::mount_sd(
        peripherals.spi2,
        pins.gpio12,
        pins.gpio11,
        pins.gpio13,
        pins.gpio10,
    ) {
        Ok(mount) => {
            log::info!("SD card mounted at {}", storage::MOUNT_POINT);
            if let Ok(mut state) = state.lock() {
                state.set_sd_ready(true);
            }
            Some(mount)
        }
        Err(err) => {
            log::warn!("SD mount failed, logging disabled: {:?}", err);
            if let Ok(mut state) = state.lock() {
                state.set_sd_ready(false);
            }
            let _ = indicator.flash_error();
            None
        }
    };
    let event_log = storage::EventLog::new(storage::LOG_PATH, boot);

    // OLED 状态屏
    let i2c_config = I2cConfig::new().baudrate(400.kHz().into());
    match I2cDriver::new(peripherals.i2c0, pins.gpio1, pins.gpio2, &i2c_config) {
        Ok(i2c) => {
            display::spawn_display_task(i2c, state.clone(), settings.display_period_ms);
        }
        Err(err) => log::warn!("display I2C init failed: {:?}", err),
    }

    // AHT10 环境记录（独立总线）
    match I2cDriver::new(peripherals.i2c1, pins.gpio3, pins.gpio4, &i2c_config) {
        Ok(i2c) => {
            sensor::spawn_sensor_task(
                i2c,
                state.clone(),
                event_log.clone(),
                settings.sensor_interval_secs,
            );
        }
        Err(err) => log::warn!("sensor I2C init failed: {:?}", err),
    }

    // 处理管线：串口输入 -> 业务处理 -> 三路扇出
    let pipeline::HubChannels {
        event_tx,
        event_rx,
        publish_tx,
        publish_rx,
    } = pipeline::HubChannels::new(settings.publish_queue_max);
    let processor = HubProcessor::new(state.clone(), indicator, event_log, publish_tx, boot);
    let _processor_handle = spawn_processor_loop(processor, event_rx);
    let _uart_handle = uart_link::spawn_uart_task(uart_rx, event_tx);

    // 网络栈：入网后拉起 MQTT 发布（失败不阻塞本地门禁）
    let _wifi_handle = net::spawn_wifi_task(modem, state, publish_rx, settings);

    // 主循环保持任务存活
    loop {
        FreeRtos::delay_ms(1000);
    }
}
