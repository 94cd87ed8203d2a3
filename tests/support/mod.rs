//! Shared helpers for integration tests

#![allow(dead_code)]

pub mod mock_server;

pub use mock_server::{MockSmtpServer, SmtpCommand};

/// A local port with nothing listening on it
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}
