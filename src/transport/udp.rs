//! UDP transport to a Logstash `udp` input

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use super::{Transport, encode};
use crate::error::TransportError;
use crate::record::LogRecord;

/// Resolve a collector address, preferring IPv4 like most Logstash inputs
pub fn resolve(host: &str, port: u16) -> io::Result<SocketAddr> {
    let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no address found for {}:{}", host, port)))
}

/// Non-blocking datagram sender bound to an ephemeral local port
pub struct UdpTransport {
    socket: UdpSocket,
    collector: SocketAddr,
    append_newline: bool,
}

impl UdpTransport {
    pub fn new(collector: SocketAddr, append_newline: bool) -> io::Result<Self> {
        let local: SocketAddr = if collector.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(local)?;
        // A full send buffer must never stall the supervisor handshake
        socket.set_nonblocking(true)?;
        log::debug!("UDP transport bound to {} for collector {}", socket.local_addr()?, collector);
        Ok(Self {
            socket,
            collector,
            append_newline,
        })
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, record: &LogRecord) -> Result<usize, TransportError> {
        let bytes = encode(record, self.append_newline)?;
        match self.socket.send_to(&bytes, self.collector) {
            Ok(sent) => Ok(sent),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(TransportError::WouldBlock),
            Err(e) => Err(TransportError::Send {
                target: self.collector.to_string(),
                source: e,
            }),
        }
    }

    fn describe(&self) -> String {
        format!("udp://{}", self.collector)
    }
}
