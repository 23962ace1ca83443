use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TrySendError};
use std::thread;

use crate::model::OutgoingMessage;
use crate::processor::HubProcessor;
use crate::proto::ParsedEvent;

/// 处理管线的通道集合（串口事件 + 上行发布队列）。
///
/// 发布队列有界（容量见 HubSettings），满了直接丢弃新消息，
/// 不给生产者施加背压。
pub struct HubChannels {
    pub event_tx: Sender<ParsedEvent>,
    pub event_rx: Receiver<ParsedEvent>,
    pub publish_tx: SyncSender<OutgoingMessage>,
    pub publish_rx: Receiver<OutgoingMessage>,
}

impl HubChannels {
    pub fn new(publish_capacity: usize) -> Self {
        let (event_tx, event_rx) = mpsc::channel();
        let (publish_tx, publish_rx) = mpsc::sync_channel(publish_capacity);
        Self {
            event_tx,
            event_rx,
            publish_tx,
            publish_rx,
        }
    }
}

/// 尽力入队：队满丢最新一条（保留最旧），只记日志。
pub fn enqueue_best_effort(publish_tx: &SyncSender<OutgoingMessage>, message: OutgoingMessage) {
    match publish_tx.try_send(message) {
        Ok(()) => {}
        Err(TrySendError::Full(message)) => {
            log::warn!("publish queue full, dropping: {}", message);
        }
        Err(TrySendError::Disconnected(message)) => {
            log::warn!("publish queue closed, dropping: {}", message);
        }
    }
}

/// 启动处理器线程：阻塞消费串口事件，执行扇出。
pub fn spawn_processor_loop(
    mut processor: HubProcessor,
    event_rx: Receiver<ParsedEvent>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while let Ok(event) = event_rx.recv() {
            processor.handle_event(event);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OutgoingMessage;

    #[test]
    fn bounded_queue_keeps_oldest_drops_newest() {
        let (publish_tx, publish_rx) = mpsc::sync_channel(5);
        for i in 0..7 {
            let mut message = OutgoingMessage::motion(true);
            message.status = format!("MSG{}", i);
            enqueue_best_effort(&publish_tx, message);
        }
        let drained: Vec<String> = publish_rx.try_iter().map(|m| m.status).collect();
        // 恰好保留容量条，且是先入队的那几条
        assert_eq!(drained, vec!["MSG0", "MSG1", "MSG2", "MSG3", "MSG4"]);
    }

    #[test]
    fn queue_accepts_again_after_drain() {
        let (publish_tx, publish_rx) = mpsc::sync_channel(2);
        enqueue_best_effort(&publish_tx, OutgoingMessage::motion(true));
        enqueue_best_effort(&publish_tx, OutgoingMessage::motion(false));
        enqueue_best_effort(&publish_tx, OutgoingMessage::motion(true)); // 丢弃
        assert_eq!(publish_rx.try_iter().count(), 2);
        enqueue_best_effort(&publish_tx, OutgoingMessage::motion(false));
        assert_eq!(publish_rx.try_iter().count(), 1);
    }
}
