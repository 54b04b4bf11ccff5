//! Client IP extraction from HTTP headers.
//!
//! Takes the rightmost parseable `X-Forwarded-For` entry (the value our own
//! edge appended) and falls back to the socket remote address when the
//! header is missing or unparseable.

use axum::http::HeaderMap;
use std::net::IpAddr;

pub fn extract_client_ip(headers: &HeaderMap, socket_addr: IpAddr) -> IpAddr {
    extract_from_x_forwarded_for(headers).unwrap_or(socket_addr)
}

fn extract_from_x_forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    let xff = headers.get("x-forwarded-for")?.to_str().ok()?;

    xff.split(',')
        .filter_map(|s| s.trim().parse::<IpAddr>().ok())
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn falls_back_to_socket_address() {
        let headers = HeaderMap::new();
        let socket: IpAddr = "198.51.100.7".parse().unwrap();
        assert_eq!(extract_client_ip(&headers, socket), socket);
    }

    #[test]
    fn takes_rightmost_forwarded_entry() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.1, 198.51.100.1"),
        );
        let socket: IpAddr = "192.0.2.1".parse().unwrap();
        assert_eq!(
            extract_client_ip(&headers, socket),
            "198.51.100.1".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn skips_unparseable_entries() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.1, unknown"),
        );
        let socket: IpAddr = "192.0.2.1".parse().unwrap();
        assert_eq!(
            extract_client_ip(&headers, socket),
            "203.0.113.1".parse::<IpAddr>().unwrap()
        );
    }
}
