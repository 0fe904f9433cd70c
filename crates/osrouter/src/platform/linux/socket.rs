//! Async rtnetlink socket.

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};

use bytes::BytesMut;
use netlink_sys::{Socket, SocketAddr, protocols};
use tokio::io::Interest;
use tokio::io::unix::AsyncFd;
use tokio::sync::Mutex;

use super::builder::MessageBuilder;
use super::message::{MessageIter, NLMSG_ERROR, NlMsgError};

/// Negative acknowledgement from the kernel.
#[derive(Debug)]
pub struct Nack {
    /// Positive errno.
    pub errno: i32,
    /// Extended ACK message, if the kernel sent one.
    pub message: Option<String>,
}

/// Outcome of a request that expects an ACK.
#[derive(Debug)]
pub enum RequestError {
    /// The kernel rejected the request.
    Nack(Nack),
    /// The socket itself failed.
    Io(io::Error),
}

impl From<io::Error> for RequestError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// NETLINK_ROUTE socket bound to a kernel-assigned port.
pub struct RouteSocket {
    fd: AsyncFd<Socket>,
    seq: AtomicU32,
    pid: u32,
    // One request/ACK exchange at a time
    exchange: Mutex<()>,
}

impl std::fmt::Debug for RouteSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteSocket")
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

impl RouteSocket {
    /// Open and bind a socket. Must run inside a tokio runtime.
    pub fn open() -> io::Result<Self> {
        let mut socket = Socket::new(protocols::NETLINK_ROUTE)?;
        socket.set_non_blocking(true)?;

        let mut addr = SocketAddr::new(0, 0);
        socket.bind(&addr)?;
        socket.get_address(&mut addr)?;
        let pid = addr.port_number();

        // Extended ACK is optional
        socket.set_ext_ack(true).ok();

        Ok(Self {
            fd: AsyncFd::new(socket)?,
            seq: AtomicU32::new(1),
            pid,
            exchange: Mutex::new(()),
        })
    }

    /// Send a request and wait for its ACK.
    pub async fn request_ack(&self, builder: MessageBuilder) -> Result<(), RequestError> {
        let _exchange = self.exchange.lock().await;
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let msg = builder.finish(seq, self.pid);
        self.send(&msg).await?;

        loop {
            let data = self.recv().await?;
            for (header, payload) in MessageIter::new(&data) {
                if header.nlmsg_seq != seq || header.nlmsg_type != NLMSG_ERROR {
                    continue;
                }
                let Some(err) = NlMsgError::from_bytes(payload) else {
                    return Err(RequestError::Io(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "truncated netlink error message",
                    )));
                };
                if err.error == 0 {
                    return Ok(());
                }
                return Err(RequestError::Nack(Nack {
                    errno: -err.error,
                    message: err.ext_message(header, payload).map(str::to_string),
                }));
            }
        }
    }

    async fn send(&self, msg: &[u8]) -> io::Result<()> {
        loop {
            let mut guard = self.fd.ready(Interest::WRITABLE).await?;
            match guard.try_io(|inner| inner.get_ref().send(msg, 0)) {
                Ok(result) => return result.map(|_| ()),
                Err(_would_block) => continue,
            }
        }
    }

    async fn recv(&self) -> io::Result<Vec<u8>> {
        let mut buf = BytesMut::with_capacity(32768);
        loop {
            let mut guard = self.fd.ready(Interest::READABLE).await?;
            match guard.try_io(|inner| inner.get_ref().recv(&mut buf, 0)) {
                Ok(result) => {
                    result?;
                    return Ok(buf.to_vec());
                }
                Err(_would_block) => continue,
            }
        }
    }
}
