//! Minimal DNS message header parsing, just enough to classify an mDNS
//! packet as query or response and extract question names for
//! diagnostics (spec.md §4.7, §3 "extracted query strings").

pub const DNS_HEADER_LEN: usize = 12;

/// `is_query = ¬QR_bit` plus best-effort question names. Never panics on
/// malformed input; returns `None` only if the buffer is too short even
/// for the fixed header.
pub fn classify(payload: &[u8]) -> Option<(bool, Vec<String>)> {
    if payload.len() < DNS_HEADER_LEN {
        return None;
    }
    let flags = u16::from_be_bytes([payload[2], payload[3]]);
    let qr_bit = (flags >> 15) & 0x1;
    let is_query = qr_bit == 0;
    let qdcount = u16::from_be_bytes([payload[4], payload[5]]) as usize;

    let mut names = Vec::new();
    let mut offset = DNS_HEADER_LEN;
    for _ in 0..qdcount {
        match read_name(payload, offset) {
            Some((name, next)) => {
                names.push(name);
                offset = next + 4; // skip QTYPE + QCLASS
            }
            None => break,
        }
    }

    Some((is_query, names))
}

/// Reads a (possibly compressed) DNS name label sequence starting at
/// `offset`. Returns the decoded name and the offset just past the
/// terminating zero label. Best-effort: returns `None` on malformed
/// input rather than panicking.
fn read_name(buf: &[u8], mut offset: usize) -> Option<(String, usize)> {
    let mut labels = Vec::new();
    let start = offset;
    let mut hops = 0;

    loop {
        hops += 1;
        if hops > 128 {
            return None; // guard against compression loops
        }
        let len = *buf.get(offset)?;
        if len == 0 {
            offset += 1;
            break;
        }
        if len & 0xC0 == 0xC0 {
            // Compression pointer: only valid to follow, not to rewrite.
            let _ = buf.get(offset + 1)?;
            offset += 2;
            break;
        }
        let label_start = offset + 1;
        let label_end = label_start + len as usize;
        let label = buf.get(label_start..label_end)?;
        labels.push(String::from_utf8_lossy(label).into_owned());
        offset = label_end;
    }

    if offset == start {
        return None;
    }
    Some((labels.join("."), offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(flags: u16, qdcount: u16) -> Vec<u8> {
        let mut buf = vec![0u8; DNS_HEADER_LEN];
        buf[2..4].copy_from_slice(&flags.to_be_bytes());
        buf[4..6].copy_from_slice(&qdcount.to_be_bytes());
        buf
    }

    #[test]
    fn classifies_query_with_one_question() {
        let mut buf = header(0x0000, 1);
        buf.extend_from_slice(&[5]);
        buf.extend_from_slice(b"_http");
        buf.extend_from_slice(&[4]);
        buf.extend_from_slice(b"_tcp");
        buf.push(0);
        buf.extend_from_slice(&[0, 12, 0, 1]); // QTYPE PTR, QCLASS IN

        let (is_query, names) = classify(&buf).unwrap();
        assert!(is_query);
        assert_eq!(names, vec!["_http._tcp".to_string()]);
    }

    #[test]
    fn classifies_response_via_qr_bit() {
        let buf = header(0x8000, 0);
        let (is_query, names) = classify(&buf).unwrap();
        assert!(!is_query);
        assert!(names.is_empty());
    }

    #[test]
    fn rejects_too_short_buffer() {
        assert!(classify(&[0u8; 4]).is_none());
    }
}
