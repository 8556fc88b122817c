//! Newline-delimited TCP transport on `tokio-util` codecs.
//!
//! Inbound lines are split on `\n` as raw bytes and decoded lossily, so
//! a stray non-UTF-8 byte costs only the characters it corrupts. Outbound
//! lines go through `LinesCodec`.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_util::codec::{
    AnyDelimiterCodec, AnyDelimiterCodecError, FramedRead, FramedWrite, LinesCodec,
    LinesCodecError,
};

use crate::{
    next_connection_id, Connection, ConnectionId, Transport, TransportError,
    DEFAULT_MAX_LINE_LENGTH,
};

/// A TCP [`Transport`] that frames each connection as text lines.
pub struct TcpLineTransport {
    listener: TcpListener,
    max_line_length: usize,
}

impl TcpLineTransport {
    /// Binds a new line transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "TCP line transport listening");
        Ok(Self {
            listener,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        })
    }

    /// Sets the longest inbound line accepted before the connection is
    /// treated as broken.
    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    /// Returns the local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for TcpLineTransport {
    type Connection = TcpLineConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let conn = TcpLineConnection::from_stream(stream, self.max_line_length);
        tracing::debug!(id = %conn.id, %addr, "accepted TCP connection");
        Ok(conn)
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A single line-framed TCP connection.
///
/// The socket is split so the read half and the write half sit behind
/// separate locks.
pub struct TcpLineConnection {
    id: ConnectionId,
    reader: Mutex<FramedRead<OwnedReadHalf, AnyDelimiterCodec>>,
    writer: Mutex<FramedWrite<OwnedWriteHalf, LinesCodec>>,
}

impl TcpLineConnection {
    /// Opens a client connection to `addr` with the default line limit.
    pub async fn connect(addr: &str) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| TransportError::ConnectionClosed(e.to_string()))?;
        Ok(Self::from_stream(stream, DEFAULT_MAX_LINE_LENGTH))
    }

    /// Wraps an established stream.
    pub fn from_stream(stream: TcpStream, max_line_length: usize) -> Self {
        let (read, write) = stream.into_split();
        Self {
            id: next_connection_id(),
            reader: Mutex::new(FramedRead::new(
                read,
                AnyDelimiterCodec::new_with_max_length(
                    b"\n".to_vec(),
                    Vec::new(),
                    max_line_length,
                ),
            )),
            writer: Mutex::new(FramedWrite::new(write, LinesCodec::new())),
        }
    }
}

impl Connection for TcpLineConnection {
    type Error = TransportError;

    async fn send(&self, line: &str) -> Result<(), Self::Error> {
        self.writer
            .lock()
            .await
            .send(line)
            .await
            .map_err(|e| match e {
                LinesCodecError::Io(io) => TransportError::SendFailed(io),
                other => TransportError::Framing(other.to_string()),
            })
    }

    async fn recv(&self) -> Result<Option<String>, Self::Error> {
        match self.reader.lock().await.next().await {
            Some(Ok(raw)) => {
                let raw = raw.strip_suffix(b"\r").unwrap_or(&raw[..]);
                Ok(Some(String::from_utf8_lossy(raw).into_owned()))
            }
            Some(Err(AnyDelimiterCodecError::Io(e))) => {
                Err(TransportError::ReceiveFailed(e))
            }
            Some(Err(AnyDelimiterCodecError::MaxChunkLengthExceeded)) => Err(
                TransportError::Framing("line exceeds maximum length".into()),
            ),
            None => Ok(None),
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        SinkExt::<&str>::close(&mut *self.writer.lock().await)
            .await
            .map_err(|e| match e {
                LinesCodecError::Io(io) => TransportError::SendFailed(io),
                other => TransportError::Framing(other.to_string()),
            })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
