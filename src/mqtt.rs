use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use esp_idf_hal::sys::EspError;
use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration, QoS};

use crate::model::{HubSettings, OutgoingMessage};
use crate::state::HubState;
use crate::topics::{topic_for, TOPIC_STATUS};

const MQTT_BROKER_URL: &str = env!("MQTT_BROKER_URL");
const MQTT_CLIENT_ID: &str = match option_env!("MQTT_CLIENT_ID") {
    Some(id) => id,
    None => "access-hub",
};

/// 会话保活间隔。
const KEEP_ALIVE_SECS: u64 = 60;
/// 域名解析与握手的网络超时。
const NETWORK_TIMEOUT_SECS: u64 = 5;
/// 建连等待上限（超时放弃本轮，退避重来）。
const CONNECT_WAIT_SECS: u64 = 5;
/// 队列单次等待：即便无消息也按此节拍回来检查会话活性。
const DRAIN_WAIT_SECS: u64 = 1;

/// 启动 MQTT 发布任务（Wi-Fi 首次入网后拉起一次，永不退出）。
///
/// 状态机：Disconnected -> Connecting -> Connected/Publishing，
/// 会话丢失退避固定间隔后回到 Disconnected 重来。发布为
/// QoS0 即发即弃，与上游有界队列的尽力语义一致。
pub fn spawn_publisher_task(
    state: Arc<Mutex<HubState>>,
    publish_rx: Receiver<OutgoingMessage>,
    settings: HubSettings,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let backoff = Duration::from_secs(settings.mqtt_backoff_secs);
        loop {
            match run_session(&state, &publish_rx) {
                Ok(SessionEnd::QueueClosed) => {
                    log::warn!("publish queue closed, publisher exiting");
                    return;
                }
                Ok(SessionEnd::Lost) => log::warn!("MQTT session lost"),
                Ok(SessionEnd::ConnectTimeout) => log::warn!("MQTT connect timed out"),
                Err(err) => log::warn!("MQTT session error: {:?}", err),
            }
            set_mqtt_health(&state, false);
            thread::sleep(backoff);
        }
    })
}

/// 一轮会话的收场方式。
enum SessionEnd {
    ConnectTimeout,
    Lost,
    QueueClosed,
}

fn run_session(
    state: &Arc<Mutex<HubState>>,
    publish_rx: &Receiver<OutgoingMessage>,
) -> Result<SessionEnd, EspError> {
    let conf = MqttClientConfiguration {
        client_id: Some(MQTT_CLIENT_ID),
        keep_alive_interval: Some(Duration::from_secs(KEEP_ALIVE_SECS)),
        network_timeout: Duration::from_secs(NETWORK_TIMEOUT_SECS),
        ..Default::default()
    };
    log::info!("MQTT connecting to {}", MQTT_BROKER_URL);
    let (mut client, mut connection) = EspMqttClient::new(MQTT_BROKER_URL, &conf)?;

    // 回调只做一件事：把 broker 事件折叠成会话活性标志
    let session_up = Arc::new(AtomicBool::new(false));
    let flag = session_up.clone();
    let _event_thread = thread::spawn(move || {
        while let Ok(event) = connection.next() {
            match event.payload() {
                EventPayload::Connected(_) => flag.store(true, Ordering::SeqCst),
                EventPayload::Disconnected => flag.store(false, Ordering::SeqCst),
                EventPayload::Error(err) => log::warn!("MQTT event error: {:?}", err),
                _ => {}
            }
        }
        // 连接对象随会话一起销毁，线程自然收尾
        flag.store(false, Ordering::SeqCst);
    });

    // 等待建连（域名解析与握手由客户端内部完成）
    let deadline = Instant::now() + Duration::from_secs(CONNECT_WAIT_SECS);
    while !session_up.load(Ordering::SeqCst) {
        if Instant::now() >= deadline {
            return Ok(SessionEnd::ConnectTimeout);
        }
        thread::sleep(Duration::from_millis(100));
    }
    log::info!("MQTT session established");
    set_mqtt_health(state, true);

    // 上线通告
    if let Err(err) = client.publish(
        TOPIC_STATUS,
        QoS::AtMostOnce,
        false,
        br#"{"type":"STATUS","uid":"","status":"ONLINE"}"#,
    ) {
        log::warn!("MQTT status announce failed: {:?}", err);
    }

    // Connected：按节拍抽干发布队列，空转时顺带检查会话活性
    loop {
        if !session_up.load(Ordering::SeqCst) {
            return Ok(SessionEnd::Lost);
        }
        match publish_rx.recv_timeout(Duration::from_secs(DRAIN_WAIT_SECS)) {
            Ok(message) => {
                let topic = topic_for(message.kind);
                let payload = message.to_payload();
                log::info!("MQTT publish {} -> {}", topic, payload);
                // QoS0 不重试，丢了就丢了
                if let Err(err) =
                    client.publish(topic, QoS::AtMostOnce, false, payload.as_bytes())
                {
                    log::warn!("MQTT publish failed: {:?}", err);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return Ok(SessionEnd::QueueClosed),
        }
    }
}

fn set_mqtt_health(state: &Arc<Mutex<HubState>>, connected: bool) {
    if let Ok(mut state) = state.lock() {
        state.update_health(None, Some(connected));
    }
}
