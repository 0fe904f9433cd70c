//! Netlink request construction.

use std::net::IpAddr;

use zerocopy::{Immutable, IntoBytes};

use super::message::{NLA_HDRLEN, NLMSG_HDRLEN, NlAttr, NlMsgHdr, nlmsg_align};

/// Builder for a single netlink request.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    buf: Vec<u8>,
}

impl MessageBuilder {
    /// Start a request with the given type and flags.
    pub fn new(msg_type: u16, flags: u16) -> Self {
        let header = NlMsgHdr {
            nlmsg_len: NLMSG_HDRLEN as u32,
            nlmsg_type: msg_type,
            nlmsg_flags: flags,
            ..Default::default()
        };
        let mut buf = Vec::with_capacity(128);
        buf.extend_from_slice(header.as_bytes());
        buf.resize(NLMSG_HDRLEN, 0);
        Self { buf }
    }

    /// Append a fixed-size family header.
    pub fn append<T: IntoBytes + Immutable>(&mut self, data: &T) {
        self.buf.extend_from_slice(data.as_bytes());
        self.pad();
    }

    /// Append an attribute.
    ///
    /// `data` must fit the 16-bit attribute length; interface names are
    /// bounded by `IFNAMSIZ` when the configuration is built.
    pub fn append_attr(&mut self, attr_type: u16, data: &[u8]) {
        let attr = NlAttr {
            nla_len: (NLA_HDRLEN + data.len()) as u16,
            nla_type: attr_type,
        };
        self.buf.extend_from_slice(attr.as_bytes());
        self.buf.extend_from_slice(data);
        self.pad();
    }

    /// Append a u32 attribute (native endian).
    pub fn append_attr_u32(&mut self, attr_type: u16, value: u32) {
        self.append_attr(attr_type, &value.to_ne_bytes());
    }

    /// Append a null-terminated string attribute.
    pub fn append_attr_str(&mut self, attr_type: u16, value: &str) {
        let mut data = Vec::with_capacity(value.len() + 1);
        data.extend_from_slice(value.as_bytes());
        data.push(0);
        self.append_attr(attr_type, &data);
    }

    /// Append an address attribute in network order.
    pub fn append_attr_addr(&mut self, attr_type: u16, addr: IpAddr) {
        match addr {
            IpAddr::V4(v4) => self.append_attr(attr_type, &v4.octets()),
            IpAddr::V6(v6) => self.append_attr(attr_type, &v6.octets()),
        }
    }

    /// Message type from the header.
    pub fn msg_type(&self) -> u16 {
        u16::from_ne_bytes([self.buf[4], self.buf[5]])
    }

    /// Finish with the given sequence number and port ID.
    pub fn finish(mut self, seq: u32, pid: u32) -> Vec<u8> {
        let len = self.buf.len() as u32;
        self.buf[0..4].copy_from_slice(&len.to_ne_bytes());
        self.buf[8..12].copy_from_slice(&seq.to_ne_bytes());
        self.buf[12..16].copy_from_slice(&pid.to_ne_bytes());
        self.buf
    }

    fn pad(&mut self) {
        let aligned = nlmsg_align(self.buf.len());
        self.buf.resize(aligned, 0);
    }
}
