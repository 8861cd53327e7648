use crate::error::AuctionError;
use std::{io::ErrorKind, net::TcpStream, time::Duration};
use tracing::{debug, info, warn};
use tungstenite::{stream::MaybeTlsStream, Message, WebSocket};

/// Source of raw push frames for one session.
pub trait FrameSource {
    /// `Ok(None)` when nothing arrived within the poll window.
    fn next_frame(&mut self) -> Result<Option<String>, AuctionError>;
    /// Releases the underlying transport. Safe to call more than once.
    fn close(&mut self);
    fn is_open(&self) -> bool;
}

/// Push socket owned by exactly one session. Closed on [`FrameSource::close`]
/// or on drop, whichever comes first.
pub struct LiveConnection {
    url: String,
    socket: Option<WebSocket<MaybeTlsStream<TcpStream>>>,
}

impl LiveConnection {
    pub fn open(url: &str, poll_interval: Duration) -> Result<Self, AuctionError> {
        let (socket, _) =
            tungstenite::connect(url).map_err(|e| AuctionError::ConnectionError(format!("connect {url}: {e}")))?;
        if let MaybeTlsStream::Plain(stream) = socket.get_ref() {
            stream
                .set_read_timeout(Some(poll_interval))
                .map_err(|e| AuctionError::ConnectionError(format!("configure {url}: {e}")))?;
        }
        info!("Connected to {url}");
        Ok(LiveConnection {
            url: url.to_string(),
            socket: Some(socket),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl FrameSource for LiveConnection {
    fn next_frame(&mut self) -> Result<Option<String>, AuctionError> {
        let socket = self
            .socket
            .as_mut()
            .ok_or_else(|| AuctionError::ConnectionError("connection already closed".to_string()))?;
        match socket.read() {
            Ok(Message::Text(text)) => Ok(Some(text)),
            Ok(Message::Binary(bytes)) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| AuctionError::MalformedEvent(format!("binary frame is not UTF-8: {e}"))),
            Ok(Message::Close(frame)) => {
                debug!("Close frame from {}: {frame:?}", self.url);
                self.close();
                Err(AuctionError::ConnectionError("the house closed the connection".to_string()))
            }
            Ok(_) => Ok(None),
            Err(tungstenite::Error::Io(e)) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(None),
            Err(e) => {
                warn!("Push socket {} failed: {e}", self.url);
                self.socket = None;
                Err(AuctionError::ConnectionError(e.to_string()))
            }
        }
    }

    fn close(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            if let Err(e) = socket.close(None).and_then(|_| socket.flush()) {
                debug!("Close handshake with {} incomplete: {e}", self.url);
            }
            info!("Disconnected from {}", self.url);
        }
    }

    fn is_open(&self) -> bool {
        self.socket.is_some()
    }
}

impl Drop for LiveConnection {
    fn drop(&mut self) {
        self.close();
    }
}
