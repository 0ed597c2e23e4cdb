/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Framed FIX connections.
//!
//! Sockets live on the tokio side; session agents are synchronous and
//! poll-driven. [`pump_inbound`] is the boundary: it reads whole frames from
//! a connection and forwards them through a crossbeam channel that the
//! session manager agent drains inside `do_work`.

use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use quorumfix_core::types::ConnectionId;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tracing::{debug, warn};

use crate::codec::{CodecError, FixFrameCodec};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Decoded frame tagged with its transport connection.
#[derive(Debug, Clone)]
pub struct InboundFrame {
    /// The connection the frame arrived on.
    pub connection_id: ConnectionId,
    /// One whole FIX message.
    pub frame: Bytes,
}

/// One framed FIX connection.
#[derive(Debug)]
pub struct FixConnection {
    connection_id: ConnectionId,
    framed: Framed<TcpStream, FixFrameCodec>,
}

impl FixConnection {
    /// Dials a counterparty.
    ///
    /// # Errors
    /// Returns `CodecError::Io` when the connection cannot be established.
    pub async fn connect(addr: SocketAddr, codec: FixFrameCodec) -> Result<Self, CodecError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::from_stream(stream, codec))
    }

    fn from_stream(stream: TcpStream, codec: FixFrameCodec) -> Self {
        let connection_id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::SeqCst));
        Self {
            connection_id,
            framed: Framed::new(stream, codec),
        }
    }

    /// This connection's transport id.
    #[must_use]
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Sends one complete frame.
    ///
    /// # Errors
    /// Returns `CodecError` when the socket rejects the frame.
    pub async fn send_frame(&mut self, frame: Bytes) -> Result<(), CodecError> {
        self.framed.send(frame).await
    }

    /// Receives the next whole frame; `None` on a clean close.
    ///
    /// # Errors
    /// Returns `CodecError` on framing or socket faults.
    pub async fn next_frame(&mut self) -> Option<Result<BytesMut, CodecError>> {
        self.framed.next().await
    }
}

/// Listener accepting framed FIX connections.
#[derive(Debug)]
pub struct FixAcceptor {
    listener: TcpListener,
    codec: FixFrameCodec,
}

impl FixAcceptor {
    /// Binds to an address.
    ///
    /// # Errors
    /// Returns `CodecError::Io` when the bind fails.
    pub async fn bind(addr: SocketAddr, codec: FixFrameCodec) -> Result<Self, CodecError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, codec })
    }

    /// The bound local address.
    ///
    /// # Errors
    /// Returns `CodecError::Io` when the socket is gone.
    pub fn local_addr(&self) -> Result<SocketAddr, CodecError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts the next inbound connection.
    ///
    /// # Errors
    /// Returns `CodecError::Io` when the accept fails.
    pub async fn accept(&self) -> Result<FixConnection, CodecError> {
        let (stream, peer) = self.listener.accept().await?;
        stream.set_nodelay(true)?;
        let connection = FixConnection::from_stream(stream, self.codec.clone());
        debug!(
            connection_id = connection.connection_id().value(),
            %peer,
            "accepted fix connection"
        );
        Ok(connection)
    }
}

/// Reads frames from `connection` until close or error, forwarding each to
/// the synchronous side through `tx`.
///
/// Runs as a tokio task per connection; returns when the peer closes, the
/// framing fails, or every receiver is gone.
pub async fn pump_inbound(
    mut connection: FixConnection,
    tx: crossbeam_channel::Sender<InboundFrame>,
) {
    let connection_id = connection.connection_id();
    while let Some(result) = connection.next_frame().await {
        match result {
            Ok(frame) => {
                let inbound = InboundFrame {
                    connection_id,
                    frame: frame.freeze(),
                };
                if tx.send(inbound).is_err() {
                    return;
                }
            }
            Err(err) => {
                warn!(
                    connection_id = connection_id.value(),
                    %err,
                    "inbound framing failed, dropping connection"
                );
                return;
            }
        }
    }
    debug!(
        connection_id = connection_id.value(),
        "fix connection closed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorumfix_core::types::Timestamp;
    use quorumfix_tagvalue::{FixEncoder, tags};

    fn test_frame(seq: u64) -> Bytes {
        let mut encoder = FixEncoder::new("FIX.4.4");
        encoder.put_str(tags::MSG_TYPE, "0");
        encoder.put_uint(tags::MSG_SEQ_NUM, seq);
        encoder.put_timestamp(tags::SENDING_TIME, Timestamp::from_millis(0));
        encoder.finish().freeze()
    }

    #[tokio::test]
    async fn test_round_trip_over_tcp() {
        let acceptor = FixAcceptor::bind("127.0.0.1:0".parse().unwrap(), FixFrameCodec::new())
            .await
            .unwrap();
        let addr = acceptor.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut connection = FixConnection::connect(addr, FixFrameCodec::new())
                .await
                .unwrap();
            connection.send_frame(test_frame(1)).await.unwrap();
            connection.send_frame(test_frame(2)).await.unwrap();
        });

        let mut server_side = acceptor.accept().await.unwrap();
        let first = server_side.next_frame().await.unwrap().unwrap();
        let second = server_side.next_frame().await.unwrap().unwrap();
        assert_eq!(first.as_ref(), test_frame(1).as_ref());
        assert_eq!(second.as_ref(), test_frame(2).as_ref());

        client.await.unwrap();
    }

    #[tokio::test]
    async fn test_pump_inbound_forwards_frames() {
        let acceptor = FixAcceptor::bind("127.0.0.1:0".parse().unwrap(), FixFrameCodec::new())
            .await
            .unwrap();
        let addr = acceptor.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut connection = FixConnection::connect(addr, FixFrameCodec::new())
                .await
                .unwrap();
            connection.send_frame(test_frame(7)).await.unwrap();
        });

        let server_side = acceptor.accept().await.unwrap();
        let expected_id = server_side.connection_id();
        let (tx, rx) = crossbeam_channel::unbounded();
        pump_inbound(server_side, tx).await;

        let inbound = rx.try_recv().unwrap();
        assert_eq!(inbound.connection_id, expected_id);
        assert_eq!(inbound.frame.as_ref(), test_frame(7).as_ref());

        client.await.unwrap();
    }

    #[test]
    fn test_connection_ids_are_unique() {
        let a = NEXT_CONNECTION_ID.fetch_add(1, Ordering::SeqCst);
        let b = NEXT_CONNECTION_ID.fetch_add(1, Ordering::SeqCst);
        assert!(b > a);
    }
}
