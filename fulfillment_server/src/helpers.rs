use std::{net::IpAddr, str::FromStr};

use actix_web::HttpRequest;
use hmac::{Hmac, Mac};
use log::{debug, trace, warn};
use regex::Regex;
use sha2::Sha256;

/// Get the remote IP address from the request. It uses 3 sources to determine the IP address, in decreasing order
/// of preference:
/// 1. The `X-Forwarded-For` header, iif `use_x_forwarded_for` is set to true in the configuration.
/// 2. The `Forwarded` header, iif `use_forwarded` is set to true in the configuration.
/// 3. The peer address from the connection info.
pub fn get_remote_ip(req: &HttpRequest, use_x_forwarded_for: bool, use_forwarded: bool) -> Option<IpAddr> {
    let mut result = None;
    if use_x_forwarded_for {
        trace!("Checking X-Forwarded-For header");
        result = req
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| IpAddr::from_str(s.trim()).ok());
        if let Some(ip) = result {
            debug!("Using X-Forwarded-For header for remote address: {ip}");
        }
    }
    if use_forwarded && result.is_none() {
        trace!("Checking Forwarded header");
        let re = Regex::new(r#"for="?(?P<ip>[^;,"]+)"#).ok();
        result = req
            .headers()
            .get("Forwarded")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| re.as_ref().and_then(|re| re.captures(v)))
            .and_then(|caps| caps.name("ip"))
            .map(|m| m.as_str())
            .and_then(|s| IpAddr::from_str(s).ok());
        if let Some(ip) = result {
            debug!("Using Forwarded header for remote address: {ip}");
        }
    }
    result.or_else(|| {
        let peer_addr = req.connection_info().peer_addr().map(|a| a.to_string());
        trace!("Using Peer address for remote address: {:?}", peer_addr);
        peer_addr.and_then(|s| IpAddr::from_str(&s).ok())
    })
}

/// The base64-encoded HMAC-SHA256 of `data` under `secret`.
pub fn calculate_hmac(secret: &str, data: &[u8]) -> String {
    match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
        Ok(mut mac) => {
            mac.update(data);
            base64::encode(mac.finalize().into_bytes())
        },
        Err(e) => {
            // HMAC accepts keys of any length, so this is unreachable in practice
            warn!("🔐️ Could not create HMAC instance. {e}");
            String::default()
        },
    }
}

/// Checks a base64-encoded HMAC-SHA256 `signature` of `data` in constant time.
pub fn verify_hmac(secret: &str, data: &[u8], signature: &str) -> bool {
    let signature = match base64::decode(signature.trim()) {
        Ok(s) => s,
        Err(e) => {
            debug!("🔐️ Signature is not valid base64. {e}");
            return false;
        },
    };
    match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
        Ok(mut mac) => {
            mac.update(data);
            mac.verify_slice(&signature).is_ok()
        },
        Err(_) => false,
    }
}

/// The message the authentication service signs for a caller.
pub fn identity_message(id: i64, role: &str) -> String {
    format!("{id}:{role}")
}

#[cfg(test)]
mod test {
    use actix_web::test::TestRequest;

    use super::*;

    #[test]
    fn hmac_depends_on_key_and_data() {
        let hmac = calculate_hmac("secret", br#"{"order_id":"ORD-1"}"#);
        assert_eq!(hmac.len(), 44);
        assert_eq!(hmac, calculate_hmac("secret", br#"{"order_id":"ORD-1"}"#));
        assert_ne!(hmac, calculate_hmac("other secret", br#"{"order_id":"ORD-1"}"#));
        assert_ne!(hmac, calculate_hmac("secret", br#"{"order_id":"ORD-2"}"#));
    }

    #[test]
    fn verify_accepts_only_matching_signatures() {
        let data = br#"{"order_id":"ORD-1","transaction_status":"settlement"}"#;
        let signature = calculate_hmac("secret", data);
        assert!(verify_hmac("secret", data, &signature));
        assert!(!verify_hmac("wrong", data, &signature));
        assert!(!verify_hmac("secret", b"tampered", &signature));
        assert!(!verify_hmac("secret", data, "not base64!"));
    }

    #[test]
    fn identity_message_format() {
        assert_eq!(identity_message(42, "driver"), "42:driver");
    }

    #[test]
    fn remote_ip_from_headers() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", "203.0.113.9, 10.0.0.1"))
            .insert_header(("Forwarded", "for=198.51.100.7;proto=https"))
            .peer_addr("127.0.0.1:4000".parse().unwrap())
            .to_http_request();
        assert_eq!(get_remote_ip(&req, true, true), Some("203.0.113.9".parse().unwrap()));
        assert_eq!(get_remote_ip(&req, false, true), Some("198.51.100.7".parse().unwrap()));
        assert_eq!(get_remote_ip(&req, false, false), Some("127.0.0.1".parse().unwrap()));
    }
}
