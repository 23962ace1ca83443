use core::convert::TryInto;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use embedded_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};
use esp_idf_hal::modem::Modem;
use esp_idf_hal::sys::EspError;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};

use crate::model::{AccessStatus, HubSettings, OutgoingMessage};
use crate::mqtt;
use crate::state::HubState;

const WIFI_SSID: &str = env!("WIFI_SSID");
const WIFI_PASS: &str = env!("WIFI_PASS");

/// 启动网络连接任务。
///
/// 稳态策略：入网失败按固定间隔无限重试（不设上限），入网成功后
/// 一次性拉起 MQTT 发布任务，之后持续监测链路并在掉线时重连。
/// 网络的任何故障都不影响本地门禁、日志与显示。
pub fn spawn_wifi_task(
    modem: Modem,
    state: Arc<Mutex<HubState>>,
    publish_rx: Receiver<OutgoingMessage>,
    settings: HubSettings,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let retry = Duration::from_secs(settings.wifi_retry_secs);
        // 栈初始化失败视为本次上电无网络：枢纽保持离线可用
        let mut wifi = match create_wifi(modem) {
            Ok(wifi) => wifi,
            Err(err) => {
                log::error!("Wi-Fi stack init failed, running offline: {:?}", err);
                return;
            }
        };

        // 首次入网：无限重试
        while let Err(err) = join(&mut wifi) {
            log::warn!("Wi-Fi connect failed: {:?}", err);
            set_wifi_health(&state, false);
            thread::sleep(retry);
        }
        mark_wifi_connected(&state);

        // 入网成功后仅此一次拉起发布任务
        let _publisher = mqtt::spawn_publisher_task(state.clone(), publish_rx, settings.clone());

        // 链路监测与重连
        loop {
            thread::sleep(retry);
            match wifi.is_connected() {
                Ok(true) => {}
                Ok(false) => {
                    log::warn!("Wi-Fi link lost, reconnecting");
                    set_wifi_health(&state, false);
                    if let Err(err) = join(&mut wifi) {
                        log::warn!("Wi-Fi reconnect failed: {:?}", err);
                    } else {
                        mark_wifi_connected(&state);
                    }
                }
                Err(err) => {
                    log::warn!("Wi-Fi status query failed: {:?}", err);
                }
            }
        }
    })
}

/// 构建并配置 STA 模式的 Wi-Fi 驱动。
fn create_wifi(modem: Modem) -> Result<BlockingWifi<EspWifi<'static>>, EspError> {
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take().ok();
    let mut wifi = BlockingWifi::wrap(EspWifi::new(modem, sys_loop.clone(), nvs)?, sys_loop)?;

    let auth_method = if WIFI_PASS.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPA2Personal
    };

    let wifi_configuration: Configuration = Configuration::Client(ClientConfiguration {
        ssid: WIFI_SSID.try_into().unwrap_or_default(),
        bssid: None,
        auth_method,
        password: WIFI_PASS.try_into().unwrap_or_default(),
        channel: None,
        ..Default::default()
    });

    wifi.set_configuration(&wifi_configuration)?;
    wifi.start()?;
    log::info!("Wi-Fi started");
    Ok(wifi)
}

/// 入网并等待网络接口就绪。
fn join(wifi: &mut BlockingWifi<EspWifi<'static>>) -> Result<(), EspError> {
    wifi.connect()?;
    log::info!("Wi-Fi connected to {}", WIFI_SSID);
    wifi.wait_netif_up()?;
    log::info!("Wi-Fi netif up");
    Ok(())
}

fn mark_wifi_connected(state: &Arc<Mutex<HubState>>) {
    if let Ok(mut state) = state.lock() {
        state.update_health(Some(true), None);
        state.set_access_status(AccessStatus::WifiConnected);
    }
}

fn set_wifi_health(state: &Arc<Mutex<HubState>>, connected: bool) {
    if let Ok(mut state) = state.lock() {
        state.update_health(Some(connected), None);
    }
}
