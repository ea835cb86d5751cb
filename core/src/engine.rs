//! Reflector engine (C8): the main capture → classify → route → rewrite
//! → re-emit loop.
//!
//! Grounded on `secuaas-NetSentinel/capture/src/capture/af_packet.rs`
//! for the parser-thread/bounded-channel/consumer-loop shape, and on
//! `original_source/pkg/net/reflector/serve.go` for the routing and
//! rewrite rules (spec.md §4.8, §8).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{bounded, RecvTimeoutError};
use tracing::{debug, info, warn};

use crate::capture::RawCapture;
use crate::config::Config;
use crate::error::EngineError;
use crate::frame::{self, ClassifiedFrame};
use crate::mac::MacAddr;
use crate::policy::PolicyTables;

const CHANNEL_CAPACITY: usize = 100;
const PARSER_RECV_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(500);

/// Runs the reflector loop until `running` is cleared. Returns once the
/// parser thread exits (on a fatal capture error) or the flag is
/// cleared and the remaining queued frames have drained.
pub fn run(cfg: &Config, running: Arc<AtomicBool>) -> Result<(), EngineError> {
    let policy = PolicyTables::build(&cfg.devices);
    let capture = RawCapture::open(&cfg.net_interface)?;
    let bridge_mac = capture.bridge_mac();
    let capture = Arc::new(Mutex::new(capture));

    let (tx, rx) = bounded::<ClassifiedFrame>(CHANNEL_CAPACITY);

    let parser_capture = Arc::clone(&capture);
    let parser_running = Arc::clone(&running);
    let parser = thread::spawn(move || parser_loop(parser_capture, parser_running, tx));

    info!(interface = %cfg.net_interface, bridge_mac = %bridge_mac, "reflector engine started");

    while running.load(Ordering::Relaxed) {
        match rx.recv_timeout(PARSER_RECV_TIMEOUT) {
            Ok(mut classified) => route_and_emit(&mut classified, &policy, bridge_mac, &capture),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    running.store(false, Ordering::Relaxed);
    parser.join().map_err(|_| EngineError::ParserPanicked)??;
    Ok(())
}

fn parser_loop(
    capture: Arc<Mutex<RawCapture>>,
    running: Arc<AtomicBool>,
    tx: crossbeam_channel::Sender<ClassifiedFrame>,
) -> Result<(), EngineError> {
    while running.load(Ordering::Relaxed) {
        let raw = {
            let mut cap = capture.lock().unwrap();
            cap.next_frame()?
        };
        let Some(raw) = raw else { continue };

        match frame::parse(raw) {
            Ok(classified) => {
                if tx.send(classified).is_err() {
                    break;
                }
            }
            Err(e) => debug!("reflector: dropping unparsable frame: {}", e),
        }
    }
    Ok(())
}

/// Decides the target VLANs for one classified frame per spec.md §4.8:
/// - never re-emits a frame whose source MAC is the bridge's own (the
///   BPF filter already excludes these; this is a second, in-process
///   guard against re-ingestion loops)
/// - queries fan out by origin VLAN to `queryFanout[vlan]`
/// - responses/advertisements fan out by source MAC to
///   `responseFanout[mac]`
///
/// Pure and `pcap`-free so it can be tested without a live interface.
fn route_targets(classified: &ClassifiedFrame, policy: &PolicyTables, bridge_mac: MacAddr) -> Vec<u16> {
    if classified.src_mac() == bridge_mac {
        return Vec::new();
    }

    if classified.is_query {
        match classified.vlan_id() {
            Some(vlan) => policy.query_targets(vlan).map(<[u16]>::to_vec).unwrap_or_default(),
            None => Vec::new(),
        }
    } else {
        policy.response_targets(&classified.src_mac()).map(<[u16]>::to_vec).unwrap_or_default()
    }
}

/// Rewrites VLAN id, source MAC (to the bridge's own) and destination
/// MAC (to the canonical multicast MAC for the frame's IP family) for
/// re-emission onto `vlan`. Pure and `pcap`-free, same reason as
/// [`route_targets`].
fn rewrite_for_target(classified: &mut ClassifiedFrame, bridge_mac: MacAddr, vlan: u16) {
    classified.set_vlan_id(vlan);
    classified.set_src_mac(bridge_mac);
    classified.set_dst_mac(MacAddr::multicast_for(classified.is_ipv6));
}

fn route_and_emit(
    classified: &mut ClassifiedFrame,
    policy: &PolicyTables,
    bridge_mac: MacAddr,
    capture: &Arc<Mutex<RawCapture>>,
) {
    for vlan in route_targets(classified, policy, bridge_mac) {
        rewrite_for_target(classified, bridge_mac, vlan);

        let mut cap = capture.lock().unwrap();
        if let Err(e) = cap.send(&classified.raw) {
            warn!(vlan, error = %e, "reflector: failed to re-emit frame");
        }
    }
}
