//! Listen address normalisation.

use std::net::{SocketAddr, ToSocketAddrs};

/// Port used when neither a port nor a fallback is configured.
pub const DEFAULT_PORT: &str = ":8080";

/// Normalise a configured port so it always carries a colon.
///
/// Empty `port` falls back to `fallback`, and an empty fallback to
/// [`DEFAULT_PORT`]. Values that already contain a colon (`":3000"`,
/// `"0.0.0.0:5000"`) are returned unchanged; bare numbers get a leading colon.
pub fn normalize_port(port: &str, fallback: &str) -> String {
    let p = if port.is_empty() { fallback } else { port };
    if p.is_empty() {
        return DEFAULT_PORT.to_string();
    }
    if p.contains(':') {
        return p.to_string();
    }
    format!(":{}", p)
}

/// Resolve a normalised address into something a listener can bind.
///
/// `":8080"` means every interface, so it becomes `0.0.0.0:8080`.
pub fn resolve_bind_address(addr: &str) -> std::io::Result<SocketAddr> {
    let full = if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    };

    full.to_socket_addrs()?.next().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("address {} did not resolve", addr),
        )
    })
}
