//! Listener socket binding.
//!
//! # Responsibilities
//! - Resolve and bind the configured address
//! - Hand a non-blocking std listener to the HTTP server
//!
//! # Design Decisions
//! - Binding happens only after initial authentication succeeded, so the
//!   port is never open while the gateway cannot serve traffic

use std::net::{SocketAddr, TcpListener, ToSocketAddrs};

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// The configured address did not resolve.
    Resolve(String, std::io::Error),
    /// Failed to bind to address.
    Bind(SocketAddr, std::io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Resolve(addr, e) => write!(f, "Failed to resolve {}: {}", addr, e),
            ListenerError::Bind(addr, e) => write!(f, "Failed to bind {}: {}", addr, e),
        }
    }
}

impl std::error::Error for ListenerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ListenerError::Resolve(_, e) | ListenerError::Bind(_, e) => Some(e),
        }
    }
}

/// Bind the listener socket described by `config`.
pub fn bind(config: &ListenerConfig) -> Result<TcpListener, ListenerError> {
    let address = config.bind_address();
    let addr = address
        .to_socket_addrs()
        .map_err(|e| ListenerError::Resolve(address.clone(), e))?
        .next()
        .ok_or_else(|| {
            ListenerError::Resolve(
                address.clone(),
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "no addresses"),
            )
        })?;

    let listener = TcpListener::bind(addr).map_err(|e| ListenerError::Bind(addr, e))?;
    listener
        .set_nonblocking(true)
        .map_err(|e| ListenerError::Bind(addr, e))?;

    tracing::info!(address = %listener.local_addr().unwrap_or(addr), "Listener bound");
    Ok(listener)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TlsConfig;

    fn config(port: u16) -> ListenerConfig {
        ListenerConfig {
            bind_host: "127.0.0.1".into(),
            port,
            tls: TlsConfig::default(),
        }
    }

    #[test]
    fn binds_and_reports_port_in_use() {
        let first = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = first.local_addr().unwrap().port();

        let err = bind(&config(port)).unwrap_err();
        assert!(matches!(err, ListenerError::Bind(..)));

        drop(first);
        let listener = bind(&config(port)).unwrap();
        assert_eq!(listener.local_addr().unwrap().port(), port);
    }

    #[test]
    fn unresolvable_host_is_reported() {
        let mut cfg = config(8443);
        cfg.bind_host = "not a host".into();
        assert!(matches!(bind(&cfg), Err(ListenerError::Resolve(..))));
    }
}
