//! HTTPU server (C5) and multicast listener (C2).
//!
//! Grounded on `original_source/pkg/net/httpu/serve.go` for the
//! per-datagram dispatch shape, and on the teacher's shutdown-broadcast
//! idiom (`secuaas-NetSentinel/aggregator/src/pipeline/mod.rs`) for
//! cooperative cancellation.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use crate::codec::{self, SsdpRequest, SsdpResponse};
use crate::error::HttpuError;

pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 2048;
pub const SSDP_MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
pub const SSDP_PORT: u16 = 1900;

/// A handler never fails the serve loop — errors are logged internally
/// and an empty response list returned (spec.md §4.5).
pub trait Handler: Send + Sync + 'static {
    fn serve_message(&self, req: SsdpRequest, remote: SocketAddr) -> Vec<SsdpResponse>;
}

/// Binds a UDP socket for multicast receive, joining `group` on every
/// address in `interfaces` (spec.md §4.2). At least one join must
/// succeed; per-interface failures are logged and skipped.
pub fn bind_multicast(
    local_port: u16,
    group: Ipv4Addr,
    interfaces: &[Ipv4Addr],
) -> Result<std::net::UdpSocket, HttpuError> {
    use socket2::{Domain, Protocol, Socket, Type};

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    let bind_addr: SocketAddr = (IpAddr::V4(Ipv4Addr::UNSPECIFIED), local_port).into();
    socket.bind(&bind_addr.into())?;
    socket.set_multicast_loop_v4(true)?;

    let mut joined = 0usize;
    for iface in interfaces {
        match socket.join_multicast_v4(&group, iface) {
            Ok(()) => joined += 1,
            Err(e) => warn!(interface = %iface, error = %e, "failed to join multicast group on interface"),
        }
    }
    if joined == 0 {
        return Err(HttpuError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "no-joined-interfaces: multicast group join failed on every interface",
        )));
    }

    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

struct BufferPool {
    free: Sender<Vec<u8>>,
    recv: Receiver<Vec<u8>>,
    buf_size: usize,
}

impl BufferPool {
    fn new(capacity: usize, buf_size: usize) -> Self {
        let (free, recv) = bounded(capacity);
        Self { free, recv, buf_size }
    }

    fn get(&self) -> Vec<u8> {
        self.recv.try_recv().unwrap_or_else(|_| vec![0u8; self.buf_size])
    }

    fn put(&self, mut buf: Vec<u8>) {
        buf.clear();
        buf.resize(self.buf_size, 0);
        let _ = self.free.try_send(buf);
    }
}

/// Runs the HTTPU server loop: one task per received datagram, each
/// dispatching to `handler` and writing responses back to the peer.
/// Exits only on a read error from the socket or on shutdown signal
/// (spec.md §4.5).
pub async fn serve(
    socket: Arc<UdpSocket>,
    handler: Arc<dyn Handler>,
    max_message_bytes: usize,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), HttpuError> {
    let pool = Arc::new(BufferPool::new(64, max_message_bytes));

    loop {
        let mut buf = pool.get();
        let (n, peer) = tokio::select! {
            result = socket.recv_from(&mut buf) => match result {
                Ok(v) => v,
                Err(e) => {
                    error!("httpu server: read error, stopping: {}", e);
                    return Err(e.into());
                }
            },
            _ = shutdown.recv() => {
                debug!("httpu server: shutdown received");
                return Ok(());
            }
        };

        let payload = codec::normalize_trailing_whitespace(&buf[..n]);
        let handler = Arc::clone(&handler);
        let socket = Arc::clone(&socket);
        let pool = Arc::clone(&pool);

        tokio::spawn(async move {
            match codec::decode_request(&payload) {
                Ok(req) => {
                    for resp in handler.serve_message(req, peer) {
                        let encoded = codec::encode_response(&resp);
                        if let Err(e) = socket.send_to(&encoded, peer).await {
                            warn!(peer = %peer, error = %e, "httpu server: failed to write response");
                        }
                    }
                }
                Err(e) => {
                    debug!(peer = %peer, error = %e, "httpu server: dropping unparsable datagram");
                }
            }
            pool.put(buf);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct EchoHandler {
        calls: AtomicUsize,
    }

    impl Handler for EchoHandler {
        fn serve_message(&self, req: SsdpRequest, _remote: SocketAddr) -> Vec<SsdpResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(req.method, "M-SEARCH");
            let mut resp = SsdpResponse::new(200, "OK");
            resp.headers.push("ST", "upnp:rootdevice");
            vec![resp]
        }
    }

    #[tokio::test]
    async fn dispatches_one_task_per_datagram_and_replies() {
        let socket = Arc::new(UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap());
        let addr = socket.local_addr().unwrap();
        let handler = Arc::new(EchoHandler { calls: AtomicUsize::new(0) });
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let server_handle = tokio::spawn(serve(Arc::clone(&socket), handler.clone(), DEFAULT_MAX_MESSAGE_BYTES, shutdown_rx));

        let client = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let mut req = SsdpRequest::new("M-SEARCH", "*");
        req.headers.push("ST", "ssdp:all");
        client.send_to(&codec::encode_request(&req), addr).await.unwrap();

        let mut buf = [0u8; 2048];
        let (n, _) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let resp = codec::decode_response(&buf[..n]).unwrap();
        assert_eq!(resp.reason, "OK");

        let _ = shutdown_tx.send(());
        server_handle.abort();
    }
}
