//! Line Transport
//!
//! Abstracts the simulator connection for testability. Provides:
//! - LineTransport trait: line-delimited send/receive
//! - TcpLineTransport: persistent TCP stream for production
//!
//! The in-process simulator in [`crate::mock`] provides the test-side
//! implementation.

use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use dss_protocol::framing::strip_terminator;
use dss_protocol::Framing;

/// Line-delimited exchange over a single persistent stream.
///
/// `recv_line` returns `Ok(None)` on a clean end of stream; callers treat
/// that as "no more messages", never as a retriable failure.
pub trait LineTransport {
    /// Send one line. The framing terminator is appended and the whole
    /// record goes out in a single write.
    fn send_line(&mut self, line: &str) -> io::Result<()>;

    /// Block for one complete line, terminator stripped.
    fn recv_line(&mut self) -> io::Result<Option<String>>;
}

/// TCP transport for production use.
pub struct TcpLineTransport {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    framing: Framing,
}

impl TcpLineTransport {
    /// Connect to the simulator.
    ///
    /// A `read_timeout` of `None` blocks indefinitely on receive; with a
    /// timeout set, a timed-out read is reported as end of stream.
    pub fn connect(
        host: &str,
        port: u16,
        framing: Framing,
        connect_timeout: Duration,
        read_timeout: Option<Duration>,
    ) -> io::Result<Self> {
        let stream = connect_first(host, port, connect_timeout)?;
        stream.set_read_timeout(read_timeout)?;
        stream.set_nodelay(true)?;

        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self {
            reader,
            writer: stream,
            framing,
        })
    }
}

fn connect_first(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let addrs = (host, port).to_socket_addrs()?;
    let mut last_err = None;

    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }

    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no addresses resolved for {}:{}", host, port),
        )
    }))
}

impl LineTransport for TcpLineTransport {
    fn send_line(&mut self, line: &str) -> io::Result<()> {
        let record = format!("{}{}", line, self.framing.terminator());
        self.writer.write_all(record.as_bytes())?;
        self.writer.flush()
    }

    fn recv_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => Ok(None),
            Ok(_) => {
                strip_terminator(&mut line);
                Ok(Some(line))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    fn connect_timeout() -> Duration {
        Duration::from_secs(5)
    }

    #[test]
    fn test_send_and_receive_lf() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            assert_eq!(line, "HELO\n");
            stream.write_all(b"OK\n").unwrap();
        });

        let mut transport = TcpLineTransport::connect(
            "127.0.0.1",
            addr.port(),
            Framing::Lf,
            connect_timeout(),
            None,
        )
        .unwrap();

        transport.send_line("HELO").unwrap();
        assert_eq!(transport.recv_line().unwrap(), Some("OK".to_string()));
        server.join().unwrap();
    }

    #[test]
    fn test_crlf_framing_on_send() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 6];
            stream.read_exact(&mut buf).unwrap();
            assert_eq!(&buf, b"REDY\r\n");
        });

        let mut transport = TcpLineTransport::connect(
            "127.0.0.1",
            addr.port(),
            Framing::Crlf,
            connect_timeout(),
            None,
        )
        .unwrap();

        transport.send_line("REDY").unwrap();
        server.join().unwrap();
    }

    #[test]
    fn test_lenient_receive_strips_crlf() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"DATA 2 124\r\n").unwrap();
        });

        // Client configured for LF still tokenizes CRLF input.
        let mut transport = TcpLineTransport::connect(
            "127.0.0.1",
            addr.port(),
            Framing::Lf,
            connect_timeout(),
            None,
        )
        .unwrap();

        assert_eq!(transport.recv_line().unwrap(), Some("DATA 2 124".to_string()));
        server.join().unwrap();
    }

    #[test]
    fn test_peer_close_is_end_of_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });

        let mut transport = TcpLineTransport::connect(
            "127.0.0.1",
            addr.port(),
            Framing::Lf,
            connect_timeout(),
            None,
        )
        .unwrap();

        server.join().unwrap();
        assert_eq!(transport.recv_line().unwrap(), None);
    }

    #[test]
    fn test_read_timeout_is_end_of_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            // Accept and hold the connection open without writing.
            let (stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(300));
            drop(stream);
        });

        let mut transport = TcpLineTransport::connect(
            "127.0.0.1",
            addr.port(),
            Framing::Lf,
            connect_timeout(),
            Some(Duration::from_millis(50)),
        )
        .unwrap();

        assert_eq!(transport.recv_line().unwrap(), None);
        server.join().unwrap();
    }
}
