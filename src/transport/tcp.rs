use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::time::{timeout, Duration};

use crate::config::MAX_MESSAGE_SIZE;
use crate::protocol::Message;
use crate::transport::Transport;

/// Length-prefixed `bincode` frames over a TCP stream: a 4-byte big-endian
/// length, then the payload.
pub struct TcpTransport {
    stream: TcpStream,
    /// `None` waits forever, which a client queued in the lobby needs.
    timeout_duration: Option<Duration>,
    max_message_size: u32,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            timeout_duration: None,
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }

    pub fn with_timeout(stream: TcpStream, timeout_duration: Duration) -> Self {
        Self {
            timeout_duration: Some(timeout_duration),
            ..Self::new(stream)
        }
    }

    pub fn with_config(
        stream: TcpStream,
        timeout_duration: Option<Duration>,
        max_message_size: u32,
    ) -> Self {
        Self {
            stream,
            timeout_duration,
            max_message_size,
        }
    }

    pub async fn connect<A: ToSocketAddrs>(addr: A) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::new(stream))
    }
}

fn write_error(e: std::io::Error) -> anyhow::Error {
    if e.kind() == std::io::ErrorKind::BrokenPipe || e.kind() == std::io::ErrorKind::ConnectionReset {
        anyhow::anyhow!("Connection closed by peer")
    } else {
        anyhow::anyhow!("Write error: {}", e)
    }
}

fn read_error(e: std::io::Error) -> anyhow::Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        anyhow::anyhow!("Connection closed by peer")
    } else if e.kind() == std::io::ErrorKind::ConnectionReset {
        anyhow::anyhow!("Connection reset by peer")
    } else {
        anyhow::anyhow!("Read error: {}", e)
    }
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, msg: Message) -> anyhow::Result<()> {
        let data = bincode::serialize(&msg)
            .map_err(|e| anyhow::anyhow!("Serialization error: {}", e))?;

        if data.len() as u64 > u64::from(self.max_message_size) {
            return Err(anyhow::anyhow!(
                "Message too large: {} bytes (max: {})",
                data.len(),
                self.max_message_size
            ));
        }

        let limit = self.timeout_duration;
        let stream = &mut self.stream;
        let send_op = async move {
            let len = (data.len() as u32).to_be_bytes();
            stream.write_all(&len).await.map_err(write_error)?;
            stream.write_all(&data).await.map_err(write_error)?;
            stream.flush().await.map_err(write_error)?;
            anyhow::Ok(())
        };

        match limit {
            Some(limit) => timeout(limit, send_op)
                .await
                .map_err(|_| anyhow::anyhow!("Send timeout after {:?}", limit))?,
            None => send_op.await,
        }
    }

    async fn recv(&mut self) -> anyhow::Result<Message> {
        let max = self.max_message_size;
        let limit = self.timeout_duration;
        let stream = &mut self.stream;
        let recv_op = async move {
            let mut len_buf = [0u8; 4];
            stream.read_exact(&mut len_buf).await.map_err(read_error)?;

            let len = u32::from_be_bytes(len_buf);
            if len > max {
                return Err(anyhow::anyhow!("Message too large: {} bytes (max: {})", len, max));
            }
            if len == 0 {
                return Err(anyhow::anyhow!("Invalid message length: 0"));
            }

            let mut buf = vec![0u8; len as usize];
            stream.read_exact(&mut buf).await.map_err(read_error)?;

            let msg = bincode::deserialize(&buf)
                .map_err(|e| anyhow::anyhow!("Deserialization error: {}", e))?;
            anyhow::Ok(msg)
        };

        match limit {
            Some(limit) => timeout(limit, recv_op)
                .await
                .map_err(|_| anyhow::anyhow!("Receive timeout after {:?}", limit))?,
            None => recv_op.await,
        }
    }
}
