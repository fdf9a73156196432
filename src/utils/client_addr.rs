use actix_web::HttpRequest;
use std::net::{IpAddr, SocketAddr};

// Extracts the client address. Relies on the immediate upstream proxy
// correctly setting X-Forwarded-For or X-Real-IP. The first entry of
// X-Forwarded-For is the original client.
pub fn extract_client_addr(req: &HttpRequest) -> Option<String> {
    if let Some(forwarded_for) = req.headers().get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded_for.to_str() {
            if let Some(first_ip) = forwarded_str.split(',').next() {
                let first_ip = first_ip.trim();
                if !first_ip.is_empty() {
                    return Some(first_ip.to_string());
                }
            }
        }
    }

    if let Some(real_ip) = req.headers().get("x-real-ip") {
        if let Ok(real_ip_str) = real_ip.to_str() {
            let real_ip_str = real_ip_str.trim();
            if !real_ip_str.is_empty() {
                return Some(real_ip_str.to_string());
            }
        }
    }

    req.peer_addr().map(|peer_addr| peer_addr.ip().to_string())
}

/// Normalises a raw client address into an IP. Anything unparseable counts as
/// "no address available".
pub fn parse_client_ip(raw: &str) -> Option<IpAddr> {
    let raw = raw.trim();
    if let Ok(ip) = raw.parse::<IpAddr>() {
        return Some(ip);
    }
    // Some proxies forward "ip:port" or "[v6]:port".
    if let Ok(socket) = raw.parse::<SocketAddr>() {
        return Some(socket.ip());
    }
    raw.strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .and_then(|inner| inner.parse::<IpAddr>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_forwarded_for_takes_first_entry() {
        let req = TestRequest::default()
            .insert_header(("x-forwarded-for", "203.0.113.7, 10.0.0.1"))
            .insert_header(("x-real-ip", "10.0.0.2"))
            .to_http_request();
        assert_eq!(extract_client_addr(&req).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_real_ip_used_without_forwarded_for() {
        let req = TestRequest::default()
            .insert_header(("x-real-ip", "198.51.100.4"))
            .to_http_request();
        assert_eq!(extract_client_addr(&req).as_deref(), Some("198.51.100.4"));
    }

    #[test]
    fn test_peer_addr_fallback() {
        let req = TestRequest::default()
            .peer_addr("192.0.2.9:5555".parse().unwrap())
            .to_http_request();
        assert_eq!(extract_client_addr(&req).as_deref(), Some("192.0.2.9"));
    }

    #[test]
    fn test_no_address_at_all() {
        let req = TestRequest::default().to_http_request();
        assert_eq!(extract_client_addr(&req), None);
    }

    #[test]
    fn test_parse_client_ip_variants() {
        assert_eq!(parse_client_ip("127.0.0.1"), Some("127.0.0.1".parse().unwrap()));
        assert_eq!(parse_client_ip(" 2001:db8::1 "), Some("2001:db8::1".parse().unwrap()));
        assert_eq!(parse_client_ip("10.1.2.3:8080"), Some("10.1.2.3".parse().unwrap()));
        assert_eq!(parse_client_ip("[2001:db8::2]:443"), Some("2001:db8::2".parse().unwrap()));
        assert_eq!(parse_client_ip("[2001:db8::3]"), Some("2001:db8::3".parse().unwrap()));
        assert_eq!(parse_client_ip("unknown"), None);
        assert_eq!(parse_client_ip(""), None);
    }
}
