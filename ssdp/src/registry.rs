//! SSDP registry (C6): a listener-visible cache of live device entries,
//! keyed by USN, updated by NOTIFY traffic.
//!
//! Grounded on `original_source/pkg/net/ssdp/registry.go` for the exact
//! lock discipline: a plain mutex around `by_usn`, a reader-preferring
//! lock around the listener set, and delivery that never holds the
//! `by_usn` lock across a listener send (spec.md §4.6, §5).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::error;
use url::Url;

use crate::codec::SsdpRequest;
use crate::error::RegistryError;

pub const MIN_MAX_AGE: i64 = 1;
pub const MAX_MAX_AGE: i64 = 86400;
pub const DEFAULT_SEARCH_PORT: u16 = 1900;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub remote_addr: SocketAddr,
    pub usn: String,
    pub nt: String,
    pub server: String,
    pub host: String,
    pub wakeup: String,
    pub location: Url,
    pub boot_id: i32,
    pub config_id: i32,
    pub search_port: u16,
    pub last_update: DateTime<Utc>,
    pub cache_expiry: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Alive,
    Update,
    ByeBye,
}

#[derive(Debug, Clone)]
pub struct Update {
    pub usn: String,
    pub event_type: EventType,
    pub entry: Option<Arc<Entry>>,
}

pub type ListenerId = u64;

pub struct Registry {
    by_usn: Mutex<HashMap<String, Arc<Entry>>>,
    listeners: RwLock<Vec<(ListenerId, SyncSender<Update>)>>,
    next_listener_id: AtomicU64,
}

impl Registry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            by_usn: Mutex::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
        })
    }

    /// Registers a new listener. Delivery is synchronous and may block
    /// (spec.md §4.6, §5) — the returned `Receiver` uses a rendezvous
    /// channel (capacity 0), so a slow listener throttles the registry.
    pub fn add_listener(&self) -> (ListenerId, Receiver<Update>) {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = sync_channel(0);
        self.listeners.write().unwrap().push((id, tx));
        (id, rx)
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.listeners.write().unwrap().retain(|(listener_id, _)| *listener_id != id);
    }

    pub fn get(&self, usn: &str) -> Option<Arc<Entry>> {
        self.by_usn.lock().unwrap().get(usn).cloned()
    }

    pub fn len(&self) -> usize {
        self.by_usn.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Only `NOTIFY` is handled; other methods are ignored (spec.md
    /// §4.6). Returns `Ok(())` even when the message is ignored or
    /// rejected — rejection is observable only via the logged warning
    /// and an unchanged registry, per spec.md scenario 6.
    pub fn serve_message(&self, req: &SsdpRequest, remote: SocketAddr) {
        if !req.method.eq_ignore_ascii_case("NOTIFY") {
            return;
        }
        let Some(nts) = req.header("NTS") else {
            error!("ssdp registry: NOTIFY missing NTS header");
            return;
        };

        let result = match nts {
            "ssdp:alive" => self.handle_alive(req, remote),
            "ssdp:update" => self.handle_update(req, remote),
            "ssdp:byebye" => self.handle_byebye(req),
            other => Err(RegistryError::UnknownNts(other.to_string())),
        };

        if let Err(e) = result {
            error!("ssdp registry: rejected NOTIFY: {}", e);
        }
    }

    fn handle_alive(&self, req: &SsdpRequest, remote: SocketAddr) -> Result<(), RegistryError> {
        let entry = Arc::new(entry_from_request(req, remote, Utc::now())?);
        let usn = entry.usn.clone();
        self.by_usn.lock().unwrap().insert(usn.clone(), Arc::clone(&entry));
        self.publish(Update { usn, event_type: EventType::Alive, entry: Some(entry) });
        Ok(())
    }

    fn handle_update(&self, req: &SsdpRequest, remote: SocketAddr) -> Result<(), RegistryError> {
        let mut entry = entry_from_request(req, remote, Utc::now())?;
        if let Some(next_boot_id) = req.header("NEXTBOOTID.UPNP.ORG") {
            entry.boot_id = parse_i32(next_boot_id, "NEXTBOOTID.UPNP.ORG")?;
        }
        let entry = Arc::new(entry);
        let usn = entry.usn.clone();
        self.by_usn.lock().unwrap().insert(usn.clone(), Arc::clone(&entry));
        self.publish(Update { usn, event_type: EventType::Update, entry: Some(entry) });
        Ok(())
    }

    fn handle_byebye(&self, req: &SsdpRequest) -> Result<(), RegistryError> {
        let usn = req.header("USN").ok_or(RegistryError::MissingHeader("USN"))?.to_string();
        let removed = self.by_usn.lock().unwrap().remove(&usn);
        self.publish(Update { usn, event_type: EventType::ByeBye, entry: removed });
        Ok(())
    }

    /// Holds the listener read-lock for the duration of the fan-out
    /// loop; never holds `by_usn`'s lock here (spec.md §4.6, §5).
    fn publish(&self, update: Update) {
        let listeners = self.listeners.read().unwrap();
        for (_, sender) in listeners.iter() {
            let _ = sender.send(update.clone());
        }
    }
}

fn parse_i32(value: &str, header: &'static str) -> Result<i32, RegistryError> {
    value
        .trim()
        .parse()
        .map_err(|_| RegistryError::InvalidInteger { header, value: value.to_string() })
}

fn parse_upnp_int_header(req: &SsdpRequest, header: &'static str, default: i32) -> Result<i32, RegistryError> {
    match req.header(header) {
        Some(v) => parse_i32(v, header),
        None => Ok(default),
    }
}

fn parse_max_age(cache_control: &str) -> Result<i64, RegistryError> {
    let max_age = cache_control
        .split(',')
        .find_map(|part| {
            let part = part.trim();
            part.to_ascii_lowercase().strip_prefix("max-age")?;
            part.splitn(2, '=').nth(1).map(str::trim)
        })
        .and_then(|v| v.parse::<i64>().ok())
        .ok_or(RegistryError::MissingHeader("CACHE-CONTROL"))?;

    if !(MIN_MAX_AGE..=MAX_MAX_AGE).contains(&max_age) {
        return Err(RegistryError::InvalidMaxAge(max_age));
    }
    Ok(max_age)
}

/// Builds an `Entry` from a NOTIFY request's headers, per spec.md §4.6's
/// header parsing rules and §3's `Entry` invariants. Deterministic given
/// a fixed `now` (spec.md §8: "newEntryFromRequest is deterministic").
pub fn entry_from_request(req: &SsdpRequest, remote: SocketAddr, now: DateTime<Utc>) -> Result<Entry, RegistryError> {
    let cache_control = req.header("CACHE-CONTROL").ok_or(RegistryError::MissingHeader("CACHE-CONTROL"))?;
    let max_age = parse_max_age(cache_control)?;

    let location_raw = req.header("LOCATION").ok_or(RegistryError::MissingHeader("LOCATION"))?;
    let location = Url::parse(location_raw)?;

    let usn = req.header("USN").ok_or(RegistryError::MissingHeader("USN"))?.to_string();

    let boot_id = parse_upnp_int_header(req, "BOOTID.UPNP.ORG", -1)?;
    let config_id = parse_upnp_int_header(req, "CONFIGID.UPNP.ORG", -1)?;

    let search_port = match req.header("SEARCHPORT.UPNP.ORG") {
        Some(v) => {
            let parsed = parse_i32(v, "SEARCHPORT.UPNP.ORG")?;
            if !(1..=65535).contains(&parsed) {
                return Err(RegistryError::InvalidSearchPort(parsed as i64));
            }
            parsed as u16
        }
        None => DEFAULT_SEARCH_PORT,
    };

    Ok(Entry {
        remote_addr: remote,
        usn,
        nt: req.header("NT").unwrap_or_default().to_string(),
        server: req.header("SERVER").unwrap_or_default().to_string(),
        host: req.header("HOST").unwrap_or_default().to_string(),
        wakeup: req.header("WAKEUP").unwrap_or_default().to_string(),
        location,
        boot_id,
        config_id,
        search_port,
        last_update: now,
        cache_expiry: now + ChronoDuration::seconds(max_age),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SsdpRequest;
    use std::net::{IpAddr, Ipv4Addr};

    fn notify(nts: &str, usn: &str, extra: &[(&str, &str)]) -> SsdpRequest {
        let mut req = SsdpRequest::new("NOTIFY", "*");
        req.headers.push("NTS", nts);
        req.headers.push("USN", usn);
        req.headers.push("CACHE-CONTROL", "max-age=60");
        req.headers.push("LOCATION", "http://192.168.1.5:80/description.xml");
        for (k, v) in extra {
            req.headers.push(*k, *v);
        }
        req
    }

    fn remote() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 5)), 1900)
    }

    #[test]
    fn alive_then_byebye_scenario_4() {
        let registry = Registry::new();
        let (_id, rx) = registry.add_listener();

        let listener_thread = std::thread::spawn(move || {
            let first = rx.recv().unwrap();
            let second = rx.recv().unwrap();
            (first, second)
        });

        registry.serve_message(&notify("ssdp:alive", "uuid:x", &[]), remote());
        registry.serve_message(&notify("ssdp:byebye", "uuid:x", &[]), remote());

        let (alive, byebye) = listener_thread.join().unwrap();
        assert_eq!(alive.event_type, EventType::Alive);
        assert!(alive.entry.is_some());
        assert_eq!(byebye.event_type, EventType::ByeBye);
        assert_eq!(byebye.entry.unwrap().usn, "uuid:x");
        assert!(registry.get("uuid:x").is_none());
    }

    #[test]
    fn rejects_out_of_range_max_age_scenario_6() {
        let registry = Registry::new();
        let req = notify("ssdp:alive", "uuid:y", &[]);
        let mut bad = req.clone();
        bad.headers.remove("CACHE-CONTROL");
        bad.headers.push("CACHE-CONTROL", "max-age=0");

        registry.serve_message(&bad, remote());
        assert!(registry.get("uuid:y").is_none());

        bad.headers.remove("CACHE-CONTROL");
        bad.headers.push("CACHE-CONTROL", "max-age=100000");
        registry.serve_message(&bad, remote());
        assert!(registry.get("uuid:y").is_none());
    }

    #[test]
    fn entry_from_request_is_deterministic() {
        let req = notify("ssdp:alive", "uuid:z", &[]);
        let now = Utc::now();
        let a = entry_from_request(&req, remote(), now).unwrap();
        let b = entry_from_request(&req, remote(), now).unwrap();
        assert_eq!(a, b);
        assert!(a.cache_expiry > a.last_update);
        assert!((a.cache_expiry - a.last_update).num_seconds() <= MAX_MAX_AGE);
    }

    #[test]
    fn update_overrides_boot_id_from_nextbootid_header() {
        let req = notify("ssdp:update", "uuid:w", &[("NEXTBOOTID.UPNP.ORG", "7"), ("BOOTID.UPNP.ORG", "3")]);
        let entry = entry_from_request(&req, remote(), Utc::now()).unwrap();
        // entry_from_request alone uses BOOTID.UPNP.ORG; the override to
        // NEXTBOOTID.UPNP.ORG happens in Registry::handle_update.
        assert_eq!(entry.boot_id, 3);

        let registry = Registry::new();
        registry.serve_message(&req, remote());
        let stored = registry.get("uuid:w").unwrap();
        assert_eq!(stored.boot_id, 7);
    }
}
