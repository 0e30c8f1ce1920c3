//! Free-port discovery for new instances.
//!
//! Ports are probed, never reserved: another process can still grab a port
//! between the probe here and the moment the container runtime binds it.
//! That window is an accepted limitation of a single-operator tool.

use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::time::Duration;

use crate::error::{OrchestratorError, Result};

/// How far above the requested base the scan will look before giving up.
pub const SCAN_WINDOW: u16 = 100;

const PROBE_TIMEOUT: Duration = Duration::from_millis(200);

/// The two kinds of ports an instance needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortClass {
    App,
    Cache,
}

impl PortClass {
    pub fn as_str(self) -> &'static str {
        match self {
            PortClass::App => "app",
            PortClass::Cache => "cache",
        }
    }
}

/// Find the lowest port >= `base` that nothing on localhost is listening
/// on. A port is probed by attempting a TCP connect: an accepted connection
/// means in use, a refused or timed-out connect means free.
pub fn find_free_port(class: PortClass, base: u16) -> Result<u16> {
    find_free_port_within(class, base, SCAN_WINDOW)
}

fn find_free_port_within(class: PortClass, base: u16, window: u16) -> Result<u16> {
    let limit = base.saturating_add(window);
    for port in base..=limit {
        if !is_listening(port) {
            return Ok(port);
        }
    }
    Err(OrchestratorError::PortExhaustion {
        class: class.as_str(),
        base,
        limit,
    })
}

fn is_listening(port: u16) -> bool {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    TcpStream::connect_timeout(&addr, PROBE_TIMEOUT).is_ok()
}
