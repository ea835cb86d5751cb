//! HTTPU client (C4): HTTP-shaped request/response over UDP.
//!
//! Grounded on `original_source/pkg/net/httpu/{httpu,multiclient}.go`.
//! The client is synchronous and mutex-guarded, matching the source's
//! single `net.PacketConn` guarded by one mutex per client — `do` calls
//! on one client serialize, and multi-source fan-out runs each
//! delegate's blocking `do` on its own thread.

use std::net::{IpAddr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use crate::codec::{self, SsdpRequest, SsdpResponse};
use crate::error::HttpuError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const RESPONSE_BUF_SIZE: usize = 2048;
const INTER_SEND_PACING: Duration = Duration::from_millis(5);
/// Granularity at which a cancellable read re-checks the shared
/// cancellation flag (see `MultiHttpuClient::do_request`) instead of
/// blocking for the full request timeout in one syscall.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub trait HttpuClientLike: Send + Sync {
    fn do_request(
        &self,
        req: &SsdpRequest,
        host: &str,
        n_sends: usize,
        deadline: Option<Duration>,
    ) -> Result<Vec<SsdpResponse>, HttpuError>;
}

/// Single bound UDP socket on one local IPv4/IPv6 address.
pub struct HttpuClient {
    socket: Mutex<UdpSocket>,
    local_addr: IpAddr,
}

impl HttpuClient {
    pub fn bind(local_addr: IpAddr) -> Result<Self, HttpuError> {
        let socket =
            UdpSocket::bind((local_addr, 0)).map_err(|e| HttpuError::Bind(local_addr, e))?;
        Ok(Self { socket: Mutex::new(socket), local_addr })
    }

    pub fn local_addr(&self) -> IpAddr {
        self.local_addr
    }

    /// Same request/response cycle as [`HttpuClientLike::do_request`], but
    /// polls `cancel` at [`CANCEL_POLL_INTERVAL`] granularity — between
    /// sends and while waiting for responses — so a caller fanning this
    /// delegate out alongside siblings (see `MultiHttpuClient`) can cut it
    /// short as soon as another delegate has already failed, instead of
    /// blocking for the full `deadline`.
    fn do_request_cancellable(
        &self,
        req: &SsdpRequest,
        host: &str,
        n_sends: usize,
        deadline: Option<Duration>,
        cancel: &AtomicBool,
    ) -> Result<Vec<SsdpResponse>, HttpuError> {
        let dest: SocketAddr = host
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| HttpuError::UnresolvableHost(host.to_string()))?;

        let buf = codec::encode_request(req);
        let timeout = deadline.unwrap_or(DEFAULT_TIMEOUT);
        let read_deadline = Instant::now() + timeout;

        let socket = self.socket.lock().unwrap();

        for i in 0..n_sends {
            if cancel.load(Ordering::Relaxed) {
                return Ok(Vec::new());
            }
            let sent = socket.send_to(&buf, dest)?;
            if sent < buf.len() {
                return Err(HttpuError::ShortWrite { sent, expected: buf.len() });
            }
            if i + 1 < n_sends {
                thread::sleep(INTER_SEND_PACING);
            }
        }

        let mut responses = Vec::new();
        let mut rbuf = [0u8; RESPONSE_BUF_SIZE];
        loop {
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            let remaining = read_deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            socket.set_read_timeout(Some(remaining.min(CANCEL_POLL_INTERVAL)))?;

            match socket.recv_from(&mut rbuf) {
                Ok((n, _peer)) => match codec::decode_response(&rbuf[..n]) {
                    Ok(mut resp) => {
                        resp.headers.push(codec::X_LOCAL_ADDRESS, self.local_addr.to_string());
                        responses.push(resp);
                    }
                    Err(e) => {
                        tracing::debug!("httpu: dropping unparsable response: {}", e);
                    }
                },
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(e) => {
                    tracing::debug!("httpu: non-fatal read error: {}", e);
                }
            }
        }

        Ok(responses)
    }
}

impl HttpuClientLike for HttpuClient {
    fn do_request(
        &self,
        req: &SsdpRequest,
        host: &str,
        n_sends: usize,
        deadline: Option<Duration>,
    ) -> Result<Vec<SsdpResponse>, HttpuError> {
        self.do_request_cancellable(req, host, n_sends, deadline, &AtomicBool::new(false))
    }
}

/// Fans a request out over one delegate client per source address
/// (spec.md §4.4 "multi-source fan-out"). Runs all delegates
/// concurrently and concatenates their responses; the first delegate
/// error is returned, and a shared cancellation flag lets siblings still
/// waiting on a read cut short as soon as one delegate has failed rather
/// than blocking out the remainder of the deadline.
pub struct MultiHttpuClient {
    delegates: Vec<HttpuClient>,
}

impl MultiHttpuClient {
    pub fn new(delegates: Vec<HttpuClient>) -> Result<Self, HttpuError> {
        if delegates.is_empty() {
            return Err(HttpuError::NoDelegates);
        }
        Ok(Self { delegates })
    }

    pub fn for_addresses(addresses: &[IpAddr]) -> Result<Self, HttpuError> {
        let delegates = addresses
            .iter()
            .map(|addr| HttpuClient::bind(*addr))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(delegates)
    }
}

impl HttpuClientLike for MultiHttpuClient {
    fn do_request(
        &self,
        req: &SsdpRequest,
        host: &str,
        n_sends: usize,
        deadline: Option<Duration>,
    ) -> Result<Vec<SsdpResponse>, HttpuError> {
        let cancel = AtomicBool::new(false);
        let results: Vec<Result<Vec<SsdpResponse>, HttpuError>> = thread::scope(|scope| {
            let handles: Vec<_> = self
                .delegates
                .iter()
                .map(|d| {
                    let cancel = &cancel;
                    scope.spawn(move || {
                        let result = d.do_request_cancellable(req, host, n_sends, deadline, cancel);
                        if result.is_err() {
                            cancel.store(true, Ordering::Relaxed);
                        }
                        result
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().expect("delegate thread panicked")).collect()
        });

        let mut all = Vec::new();
        for result in results {
            all.extend(result?);
        }
        Ok(all)
    }
}
