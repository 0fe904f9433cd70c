//! Linux applier over rtnetlink.
//!
//! Addresses, routes, rules and MTU go through a NETLINK_ROUTE socket. DNS
//! servers are written to a resolv.conf file.

mod builder;
mod encode;
mod message;
mod socket;

use std::ffi::CString;
use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use self::builder::MessageBuilder;
use self::socket::{RequestError, RouteSocket};
use crate::applier::{ApplyResult, PlatformApplier};
use crate::config::Mutation;
use crate::error::{AppliedState, ApplyError, ErrorKind};

/// Default resolver configuration file.
pub const DEFAULT_RESOLV_CONF: &str = "/etc/resolv.conf";

/// Default time to wait for a kernel ACK.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Applies mutations to the running Linux kernel.
///
/// The netlink socket is opened on first use, so the applier can be created
/// outside a tokio runtime.
#[derive(Debug)]
pub struct LinuxApplier {
    socket: OnceCell<RouteSocket>,
    resolv_conf: PathBuf,
    ack_timeout: Duration,
}

impl Default for LinuxApplier {
    fn default() -> Self {
        Self::new()
    }
}

impl LinuxApplier {
    /// Create an applier with default settings.
    pub fn new() -> Self {
        Self {
            socket: OnceCell::new(),
            resolv_conf: PathBuf::from(DEFAULT_RESOLV_CONF),
            ack_timeout: DEFAULT_ACK_TIMEOUT,
        }
    }

    /// Write DNS servers to `path` instead of `/etc/resolv.conf`.
    pub fn with_resolv_conf(mut self, path: impl Into<PathBuf>) -> Self {
        self.resolv_conf = path.into();
        self
    }

    /// Set how long to wait for each kernel ACK.
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Path DNS servers are written to.
    pub fn resolv_conf(&self) -> &Path {
        &self.resolv_conf
    }

    async fn socket(&self) -> Result<&RouteSocket, ApplyError> {
        self.socket
            .get_or_try_init(|| async { RouteSocket::open() })
            .await
            .map_err(|e| io_error("open netlink socket", &e))
    }

    async fn request(&self, builder: MessageBuilder) -> ApplyResult {
        let socket = self.socket().await?;
        let msg_type = builder.msg_type();
        let result = tokio::time::timeout(self.ack_timeout, socket.request_ack(builder)).await;

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(RequestError::Nack(nack))) => {
                let description = io::Error::from_raw_os_error(nack.errno).to_string();
                let message = match nack.message {
                    Some(ext) => format!("{description}: {ext}"),
                    None => description,
                };
                tracing::debug!(msg_type, errno = nack.errno, %message, "netlink request rejected");
                Err(ApplyError::new(classify_errno(nack.errno), message))
            }
            Ok(Err(RequestError::Io(e))) => {
                Err(io_error("netlink exchange", &e).with_state(AppliedState::Indeterminate))
            }
            Err(_) => Err(ApplyError::transient(format!(
                "no netlink ACK within {:?}",
                self.ack_timeout
            ))
            .with_state(AppliedState::Indeterminate)),
        }
    }

    async fn write_resolv_conf(&self, servers: &[IpAddr]) -> ApplyResult {
        let mut contents = String::from("# Generated by osrouter\n");
        for server in servers {
            contents.push_str(&format!("nameserver {server}\n"));
        }

        let mut tmp = self.resolv_conf.clone().into_os_string();
        tmp.push(".osrouter.tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| io_error(&format!("write {}", tmp.display()), &e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.resolv_conf).await {
            tokio::fs::remove_file(&tmp).await.ok();
            return Err(io_error(
                &format!("replace {}", self.resolv_conf.display()),
                &e,
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl PlatformApplier for LinuxApplier {
    fn name(&self) -> &str {
        "linux"
    }

    async fn apply(&self, mutation: &Mutation) -> ApplyResult {
        match mutation {
            Mutation::AddAddress(addr) | Mutation::RemoveAddress(addr) => {
                let index = ifindex(addr.dev())?;
                let add = matches!(mutation, Mutation::AddAddress(_));
                self.request(encode::address(addr, index, add)).await
            }
            Mutation::AddRoute(route) | Mutation::RemoveRoute(route) => {
                let oif = route.dev().map(ifindex).transpose()?;
                let add = matches!(mutation, Mutation::AddRoute(_));
                self.request(encode::route(route, oif, add)).await
            }
            Mutation::AddRule(rule) => self.request(encode::rule(rule, true)).await,
            Mutation::RemoveRule(rule) => self.request(encode::rule(rule, false)).await,
            Mutation::SetMtu(mtu) => {
                let index = ifindex(mtu.dev())?;
                self.request(encode::mtu(index, mtu.mtu())).await
            }
            Mutation::SetDns(servers) => self.write_resolv_conf(servers).await,
        }
    }
}

/// Resolve an interface name to its index.
fn ifindex(name: &str) -> Result<u32, ApplyError> {
    let c_name = CString::new(name)
        .map_err(|_| ApplyError::not_found(format!("invalid interface name {name:?}")))?;
    // SAFETY: c_name is a valid NUL-terminated string.
    let index = unsafe { libc::if_nametoindex(c_name.as_ptr()) };
    if index == 0 {
        return Err(ApplyError::not_found(format!("interface {name} not found")));
    }
    Ok(index)
}

/// Map a kernel errno to an error kind.
pub fn classify_errno(errno: i32) -> ErrorKind {
    match errno {
        libc::EPERM | libc::EACCES => ErrorKind::PermissionDenied,
        libc::ENOENT | libc::ENODEV | libc::ESRCH | libc::EADDRNOTAVAIL => ErrorKind::NotFound,
        libc::EEXIST => ErrorKind::AlreadyExists,
        libc::EBUSY | libc::EAGAIN | libc::ENOBUFS | libc::EINTR => ErrorKind::Transient,
        _ => ErrorKind::Conflict,
    }
}

fn io_error(context: &str, e: &io::Error) -> ApplyError {
    let kind = match e.raw_os_error() {
        Some(errno) => classify_errno(errno),
        None => match e.kind() {
            io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            io::ErrorKind::NotFound => ErrorKind::NotFound,
            io::ErrorKind::AlreadyExists => ErrorKind::AlreadyExists,
            io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut => {
                ErrorKind::Transient
            }
            _ => ErrorKind::Conflict,
        },
    };
    ApplyError::new(kind, format!("{context}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;

    #[test]
    fn test_classify_errno() {
        assert_eq!(classify_errno(libc::EPERM), ErrorKind::PermissionDenied);
        assert_eq!(classify_errno(libc::EACCES), ErrorKind::PermissionDenied);
        assert_eq!(classify_errno(libc::ENODEV), ErrorKind::NotFound);
        assert_eq!(classify_errno(libc::ESRCH), ErrorKind::NotFound);
        assert_eq!(classify_errno(libc::EADDRNOTAVAIL), ErrorKind::NotFound);
        assert_eq!(classify_errno(libc::EEXIST), ErrorKind::AlreadyExists);
        assert_eq!(classify_errno(libc::EBUSY), ErrorKind::Transient);
        assert_eq!(classify_errno(libc::ENOBUFS), ErrorKind::Transient);
        assert_eq!(classify_errno(libc::ENETUNREACH), ErrorKind::Conflict);
        assert_eq!(classify_errno(libc::EINVAL), ErrorKind::Conflict);
    }

    #[test]
    fn test_io_error_kind() {
        let err = io_error("open", &io::Error::from_raw_os_error(libc::EACCES));
        assert!(err.is_permission_denied());
        assert!(err.message().starts_with("open: "));

        let err = io_error("write", &io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_missing_interface_is_not_found() {
        let err = ifindex("osr-missing0").unwrap_err();
        assert!(err.is_not_found());
        assert!(ifindex("bad\0name").unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_unknown_device_fails_before_netlink() {
        let applier = LinuxApplier::new();
        let config = NetworkConfig::new()
            .address("osr-missing0", "10.9.9.9/32")
            .unwrap();
        let mutation = Mutation::AddAddress(config.addresses()[0].clone());

        let err = applier.apply(&mutation).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.state(), AppliedState::NotApplied);
    }

    #[tokio::test]
    async fn test_dns_rewrites_resolv_conf() {
        let dir = std::env::temp_dir().join(format!("osrouter-dns-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("resolv.conf");
        tokio::fs::write(&path, "nameserver 192.0.2.1\n").await.unwrap();

        let applier = LinuxApplier::new().with_resolv_conf(&path);
        let servers = vec!["100.100.100.100".parse().unwrap(), "fd7a::53".parse().unwrap()];
        applier.apply(&Mutation::SetDns(servers)).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(
            contents,
            "# Generated by osrouter\nnameserver 100.100.100.100\nnameserver fd7a::53\n"
        );
        assert!(!dir.join("resolv.conf.osrouter.tmp").exists());

        let missing = LinuxApplier::new().with_resolv_conf(dir.join("nope/resolv.conf"));
        let err = missing.apply(&Mutation::SetDns(Vec::new())).await.unwrap_err();
        assert!(err.is_not_found());

        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
