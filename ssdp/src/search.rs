//! One-shot SSDP search (C4 consumer), grounded on
//! `original_source/pkg/net/ssdp/search.go::SSDPRawSearchCtx`: sends an
//! `M-SEARCH` over a [`HttpuClientLike`], deduplicates responses by
//! `LOCATION + "\0" + USN`, and discards anything whose `ST` doesn't
//! match the requested search target (unless the target is a wildcard).

use std::collections::HashSet;
use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::codec::{SsdpRequest, SsdpResponse};
use crate::error::HttpuError;
use crate::httpu::client::HttpuClientLike;

pub const SSDP_ALL: &str = "ssdp:all";
pub const UPNP_ROOTDEVICE: &str = "upnp:rootdevice";
pub const DEFAULT_MX: u8 = 2;
pub const SSDP_MULTICAST_HOST: &str = "239.255.255.250:1900";

fn is_wildcard_target(st: &str) -> bool {
    st == SSDP_ALL || st == UPNP_ROOTDEVICE
}

fn dedup_key(location: &str, resp: &SsdpResponse) -> String {
    let usn = resp.header("USN").unwrap_or("");
    format!("{location}\0{usn}")
}

fn matches_target(resp: &SsdpResponse, target: &str) -> bool {
    if is_wildcard_target(target) {
        return true;
    }
    resp.header("ST") == Some(target)
}

/// Builds the `M-SEARCH *` request for a search target, per spec.md
/// §4.4 (`HOST`/`MAN`/`MX`/`ST` headers).
pub fn build_request(search_target: &str, mx: u8) -> SsdpRequest {
    let mut req = SsdpRequest::new("M-SEARCH", "*");
    req.headers.push("HOST", SSDP_MULTICAST_HOST);
    req.headers.push("MAN", "\"ssdp:discover\"");
    req.headers.push("MX", mx.to_string());
    req.headers.push("ST", search_target);
    req
}

/// Performs a raw SSDP search, returning de-duplicated, target-matching
/// responses in first-seen order. Matches `SSDPRawSearchCtx`
/// (`original_source/pkg/net/ssdp/search.go:44-47`): any response whose
/// status isn't `200` or whose `LOCATION` doesn't parse as a URL is
/// discarded before the `ST` match and dedup steps even run.
pub fn raw_search(
    client: &dyn HttpuClientLike,
    search_target: &str,
    num_sends: usize,
    deadline: Option<Duration>,
) -> Result<Vec<SsdpResponse>, HttpuError> {
    let req = build_request(search_target, DEFAULT_MX);
    let all = client.do_request(&req, SSDP_MULTICAST_HOST, num_sends, deadline)?;

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for resp in all {
        if !resp.is_ok() {
            debug!(status = resp.status_code, "search: discarding non-200 response");
            continue;
        }
        let location = resp.header("LOCATION").unwrap_or("");
        if Url::parse(location).is_err() {
            debug!(location, "search: discarding response with unparsable LOCATION");
            continue;
        }
        if !matches_target(&resp, search_target) {
            debug!(st = resp.header("ST").unwrap_or(""), target = search_target, "search: discarding non-matching ST");
            continue;
        }
        let key = dedup_key(location, &resp);
        if seen.insert(key) {
            out.push(resp);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeClient {
        responses: Mutex<Vec<SsdpResponse>>,
    }

    impl HttpuClientLike for FakeClient {
        fn do_request(
            &self,
            _req: &SsdpRequest,
            _host: &str,
            _n_sends: usize,
            _deadline: Option<Duration>,
        ) -> Result<Vec<SsdpResponse>, HttpuError> {
            Ok(self.responses.lock().unwrap().clone())
        }
    }

    fn response(st: &str, location: &str, usn: &str) -> SsdpResponse {
        let mut resp = SsdpResponse::new(200, "OK");
        resp.headers.push("ST", st);
        resp.headers.push("LOCATION", location);
        resp.headers.push("USN", usn);
        resp
    }

    #[test]
    fn deduplicates_by_location_and_usn() {
        let client = FakeClient {
            responses: Mutex::new(vec![
                response("upnp:rootdevice", "http://192.168.1.2/desc.xml", "uuid:a"),
                response("upnp:rootdevice", "http://192.168.1.2/desc.xml", "uuid:a"),
                response("upnp:rootdevice", "http://192.168.1.3/desc.xml", "uuid:b"),
            ]),
        };
        let results = raw_search(&client, "upnp:rootdevice", 1, None).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn filters_out_responses_with_mismatched_search_target() {
        let client = FakeClient {
            responses: Mutex::new(vec![
                response("urn:schemas-upnp-org:device:MediaServer:1", "http://x/desc.xml", "uuid:c"),
                response("upnp:rootdevice", "http://y/desc.xml", "uuid:d"),
            ]),
        };
        let results = raw_search(&client, "upnp:rootdevice", 1, None).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].header("USN"), Some("uuid:d"));
    }

    #[test]
    fn discards_non_200_responses() {
        let mut not_found = response("upnp:rootdevice", "http://x/desc.xml", "uuid:f");
        not_found.status_code = 404;
        not_found.reason = "Not Found".to_string();
        let client = FakeClient { responses: Mutex::new(vec![not_found]) };
        let results = raw_search(&client, "upnp:rootdevice", 1, None).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn discards_responses_with_unparsable_location() {
        let client = FakeClient {
            responses: Mutex::new(vec![response("upnp:rootdevice", "not a url", "uuid:g")]),
        };
        let results = raw_search(&client, "upnp:rootdevice", 1, None).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn wildcard_target_accepts_any_st() {
        let client = FakeClient {
            responses: Mutex::new(vec![response(
                "urn:schemas-upnp-org:device:MediaServer:1",
                "http://x/desc.xml",
                "uuid:e",
            )]),
        };
        let results = raw_search(&client, SSDP_ALL, 1, None).unwrap();
        assert_eq!(results.len(), 1);
    }
}
