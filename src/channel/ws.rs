//! WebSocket transport.
//!
//! The handshake runs in blocking mode, then the socket switches to
//! non-blocking so `poll` can return immediately when no frame is waiting.

use std::io::ErrorKind;
use std::net::TcpStream;

use tungstenite::WebSocket;
use tungstenite::protocol::Message;

use super::{Channel, ChannelError};

/// A WebSocket connection to the remote context.
pub struct WsChannel {
    ws: WebSocket<TcpStream>,
}

impl WsChannel {
    /// Accept a server-side WebSocket handshake on `stream`.
    pub fn accept(stream: TcpStream) -> Result<Self, ChannelError> {
        let ws = tungstenite::accept(stream).map_err(|e| ChannelError::WebSocket(e.to_string()))?;
        Self::from_socket(ws)
    }

    /// Wrap an already established socket.
    pub fn from_socket(ws: WebSocket<TcpStream>) -> Result<Self, ChannelError> {
        ws.get_ref().set_nonblocking(true)?;
        Ok(Self { ws })
    }

    /// Peer address, for logging.
    pub fn peer(&self) -> Option<std::net::SocketAddr> {
        self.ws.get_ref().peer_addr().ok()
    }
}

impl Channel for WsChannel {
    fn post(&mut self, frame: String) -> Result<(), ChannelError> {
        match self.ws.send(Message::Text(frame.into())) {
            Ok(()) => Ok(()),
            // Frame is buffered inside tungstenite; it goes out on the next flush.
            Err(tungstenite::Error::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => Ok(()),
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                Err(ChannelError::Closed)
            }
            Err(e) => Err(ChannelError::WebSocket(e.to_string())),
        }
    }

    fn poll(&mut self) -> Result<Option<String>, ChannelError> {
        loop {
            match self.ws.read() {
                Ok(Message::Text(text)) => return Ok(Some(text.as_str().to_owned())),
                Ok(Message::Close(_)) => return Err(ChannelError::Closed),
                // Ping/pong/binary frames carry no bridge traffic
                Ok(_) => continue,
                Err(tungstenite::Error::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => {
                    if let Err(e) = self.ws.flush()
                        && !matches!(e, tungstenite::Error::Io(ref io) if io.kind() == ErrorKind::WouldBlock)
                    {
                        return Err(ChannelError::WebSocket(e.to_string()));
                    }
                    return Ok(None);
                }
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return Err(ChannelError::Closed);
                }
                Err(e) => return Err(ChannelError::WebSocket(e.to_string())),
            }
        }
    }
}
