//! TCP listener binding.
//!
//! # Responsibilities
//! - Resolve the configured address
//! - Bind the TCP listener
//! - Report failures as `ServerError::Bind` carrying the address

use tokio::net::TcpListener;

use crate::error::ServerError;
use crate::net::address::resolve_bind_address;

/// Bind a TCP listener on a normalised address (`":8080"`, `"127.0.0.1:0"`).
pub async fn bind(addr: &str) -> Result<TcpListener, ServerError> {
    let bind_error = |source| ServerError::Bind {
        addr: addr.to_string(),
        source,
    };

    let socket_addr = resolve_bind_address(addr).map_err(bind_error)?;
    let listener = TcpListener::bind(socket_addr).await.map_err(bind_error)?;

    let local_addr = listener.local_addr().map_err(bind_error)?;
    tracing::info!(
        address = %local_addr,
        "Listener bound"
    );

    Ok(listener)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_ephemeral_port() {
        let listener = bind("127.0.0.1:0").await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn bind_conflict_names_address() {
        let first = bind("127.0.0.1:0").await.unwrap();
        let taken = first.local_addr().unwrap().to_string();

        let err = bind(&taken).await.unwrap_err();
        match err {
            ServerError::Bind { addr, .. } => assert_eq!(addr, taken),
            other => panic!("unexpected error: {other}"),
        }
    }
}
