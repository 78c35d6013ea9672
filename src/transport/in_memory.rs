use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::protocol::Message;
use crate::transport::Transport;

#[derive(Default)]
struct Queue {
    items: Mutex<VecDeque<Message>>,
    ready: Notify,
    writer_gone: AtomicBool,
    reader_gone: AtomicBool,
}

impl Queue {
    fn push(&self, msg: Message) -> anyhow::Result<()> {
        if self.reader_gone.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("Channel closed"));
        }
        self.items
            .lock()
            .map_err(|_| anyhow::anyhow!("Channel poisoned"))?
            .push_back(msg);
        self.ready.notify_one();
        Ok(())
    }

    fn pop(&self) -> anyhow::Result<Option<Message>> {
        Ok(self
            .items
            .lock()
            .map_err(|_| anyhow::anyhow!("Channel poisoned"))?
            .pop_front())
    }
}

/// One end of an in-process channel pair. Dropping an end closes the
/// channel: the other end drains what was already sent, then fails.
pub struct InMemoryTransport {
    recv_queue: Arc<Queue>,
    send_queue: Arc<Queue>,
}

impl InMemoryTransport {
    pub fn pair() -> (Self, Self) {
        let q1 = Arc::new(Queue::default());
        let q2 = Arc::new(Queue::default());
        (
            Self {
                recv_queue: q1.clone(),
                send_queue: q2.clone(),
            },
            Self {
                recv_queue: q2,
                send_queue: q1,
            },
        )
    }
}

impl Drop for InMemoryTransport {
    fn drop(&mut self) {
        self.recv_queue.reader_gone.store(true, Ordering::SeqCst);
        self.send_queue.writer_gone.store(true, Ordering::SeqCst);
        self.send_queue.ready.notify_one();
    }
}

#[async_trait::async_trait]
impl Transport for InMemoryTransport {
    async fn send(&mut self, msg: Message) -> anyhow::Result<()> {
        self.send_queue.push(msg)
    }

    async fn recv(&mut self) -> anyhow::Result<Message> {
        loop {
            if let Some(msg) = self.recv_queue.pop()? {
                return Ok(msg);
            }
            if self.recv_queue.writer_gone.load(Ordering::SeqCst) {
                return Err(anyhow::anyhow!("Channel closed"));
            }
            // notify_one keeps a permit, so a send racing this check is not lost
            self.recv_queue.ready.notified().await;
        }
    }
}
