// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Byte stream transports carrying GIOP messages.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};

use tracing::debug;

use crate::config::OrbConfig;
use crate::core::{CorbaError, Result};

/// A connected, ordered byte stream.
///
/// Reads and writes block. A timeout surfaces as a framing error and the
/// connection should be dropped afterwards.
pub trait Transport: Send {
    /// Fill `buf` completely.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()>;

    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Whether a read would return data without blocking.
    fn is_data_available(&mut self) -> Result<bool>;

    /// Peer address for diagnostics.
    fn peer_address(&self) -> Option<String>;

    fn close(&mut self) -> Result<()>;
}

/// TCP transport.
pub struct TcpTransport {
    stream: TcpStream,
    peer: Option<SocketAddr>,
}

impl TcpTransport {
    /// Connect to `host:port` using the timeouts of `config`.
    pub fn connect(host: &str, port: u16, config: &OrbConfig) -> Result<Self> {
        let mut last_error = None;
        for address in (host, port).to_socket_addrs()? {
            let attempt = match config.connect_timeout() {
                Some(timeout) => TcpStream::connect_timeout(&address, timeout),
                None => TcpStream::connect(address),
            };
            match attempt {
                Ok(stream) => {
                    debug!(peer = %address, "connected");
                    return Self::from_stream(stream, config);
                }
                Err(e) => last_error = Some(e),
            }
        }
        Err(match last_error {
            Some(e) => e.into(),
            None => CorbaError::framing("connect", format!("no address for {host}:{port}")),
        })
    }

    /// Wrap an accepted or already connected stream.
    pub fn from_stream(stream: TcpStream, config: &OrbConfig) -> Result<Self> {
        stream.set_nodelay(true)?;
        stream.set_read_timeout(config.receive_timeout())?;
        stream.set_write_timeout(config.send_timeout())?;
        let peer = stream.peer_addr().ok();
        Ok(Self { stream, peer })
    }
}

impl Transport for TcpTransport {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.stream.read_exact(buf)?;
        Ok(())
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write_all(data)?;
        self.stream.flush()?;
        Ok(())
    }

    fn is_data_available(&mut self) -> Result<bool> {
        self.stream.set_nonblocking(true)?;
        let mut first_byte = [0u8; 1];
        let peeked = self.stream.peek(&mut first_byte);
        self.stream.set_nonblocking(false)?;
        match peeked {
            // end of stream is reported as readable so the reader sees it
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn peer_address(&self) -> Option<String> {
        self.peer.map(|addr| addr.to_string())
    }

    fn close(&mut self) -> Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != ErrorKind::NotConnected => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// In-memory transport: reads come from a preloaded buffer, writes are
/// collected.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
    closed: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inbound(data: &[u8]) -> Self {
        let mut transport = Self::new();
        transport.push_inbound(data);
        transport
    }

    /// Queue bytes for the next reads.
    pub fn push_inbound(&mut self, data: &[u8]) {
        self.inbound.extend(data);
    }

    /// Everything written so far.
    pub fn written(&self) -> &[u8] {
        &self.outbound
    }

    pub fn take_written(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.outbound)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Transport for MemoryTransport {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.closed {
            return Err(CorbaError::framing("IO", "transport closed"));
        }
        if self.inbound.len() < buf.len() {
            self.inbound.clear();
            return Err(CorbaError::framing("IO", "unexpected end of stream"));
        }
        let count = buf.len();
        for (slot, byte) in buf.iter_mut().zip(self.inbound.drain(..count)) {
            *slot = byte;
        }
        Ok(())
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        if self.closed {
            return Err(CorbaError::framing("IO", "transport closed"));
        }
        self.outbound.extend_from_slice(data);
        Ok(())
    }

    fn is_data_available(&mut self) -> Result<bool> {
        Ok(!self.inbound.is_empty())
    }

    fn peer_address(&self) -> Option<String> {
        Some("memory".to_string())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_memory_transport() {
        let mut transport = MemoryTransport::with_inbound(&[1, 2, 3]);
        assert!(transport.is_data_available().expect("available"));
        let mut buf = [0u8; 2];
        transport.read_exact(&mut buf).expect("read");
        assert_eq!(buf, [1, 2]);

        let mut buf = [0u8; 4];
        assert!(transport.read_exact(&mut buf).is_err());
        assert!(!transport.is_data_available().expect("available"));

        transport.write_all(b"abc").expect("write");
        assert_eq!(transport.take_written(), b"abc".to_vec());
        transport.close().expect("close");
        assert!(transport.write_all(b"x").is_err());
    }

    #[test]
    fn test_tcp_transport_echo() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let mut transport = TcpTransport::from_stream(stream, &OrbConfig::default()).expect("wrap");
            let mut buf = [0u8; 4];
            transport.read_exact(&mut buf).expect("read");
            transport.write_all(&buf).expect("write");
        });

        let mut client = TcpTransport::connect("127.0.0.1", port, &OrbConfig::default()).expect("connect");
        assert!(client.peer_address().is_some());
        client.write_all(b"GIOP").expect("write");
        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).expect("read");
        assert_eq!(&buf, b"GIOP");
        server.join().expect("join");
        client.close().expect("close");
    }
}
