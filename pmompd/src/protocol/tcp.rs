use std::io;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, bounded};
use tracing::debug;

use super::{Connector, Transport};
use crate::model::ServerDescriptor;

impl Transport for TcpStream {
    fn set_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.set_read_timeout(timeout)?;
        self.set_write_timeout(timeout)
    }

    fn shutdown(&mut self) {
        let _ = TcpStream::shutdown(self, Shutdown::Both);
    }
}

/// Plain TCP connection to `hostname:port`.
///
/// Name resolution and every connection attempt share one deadline, so a
/// host with several unreachable addresses still fails within `timeout`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    fn connect(
        &self,
        server: &ServerDescriptor,
        timeout: Duration,
    ) -> io::Result<Box<dyn Transport>> {
        let deadline = Instant::now() + timeout;
        let address = format!("{}:{}", server.hostname, server.port);
        let addrs = resolve(&server.hostname, server.port, timeout)?;

        let stream = connect_before(&address, &addrs, deadline, TcpStream::connect_timeout)?;
        // Greeting is read under the same timeout; the session clears it once
        // the handshake is done.
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        let _ = stream.set_nodelay(true);
        Ok(Box::new(stream))
    }
}

/// Resolves on a helper thread so a stuck resolver cannot outlast `timeout`.
fn resolve(hostname: &str, port: u16, timeout: Duration) -> io::Result<Vec<SocketAddr>> {
    let (tx, rx) = bounded(1);
    let host = hostname.to_string();
    thread::Builder::new()
        .name("pmompd-resolve".into())
        .spawn(move || {
            let result = (host.as_str(), port)
                .to_socket_addrs()
                .map(|addrs| addrs.collect::<Vec<_>>());
            let _ = tx.send(result);
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("Resolving {} timed out", hostname),
        )),
        Err(RecvTimeoutError::Disconnected) => Err(io::Error::other(format!(
            "Resolver for {} exited without an answer",
            hostname
        ))),
    }
}

/// Tries each address in turn with what is left of the time budget.
fn connect_before<T>(
    address: &str,
    addrs: &[SocketAddr],
    deadline: Instant,
    mut attempt: impl FnMut(&SocketAddr, Duration) -> io::Result<T>,
) -> io::Result<T> {
    let mut last_err = None;

    for addr in addrs {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("Connection to {} timed out", address),
            ));
        }
        match attempt(addr, remaining) {
            Ok(stream) => {
                debug!("Connected to MPD at {} via {}", address, addr);
                return Ok(stream);
            }
            Err(err) => {
                debug!("Connection attempt to {} via {} failed: {}", address, addr, err);
                last_err = Some(err);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("No socket addresses resolved for {}", address),
        )
    }))
}
