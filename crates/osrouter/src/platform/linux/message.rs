//! rtnetlink wire structures.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Netlink message and attribute alignment.
pub const NLMSG_ALIGNTO: usize = 4;

#[inline]
pub const fn nlmsg_align(len: usize) -> usize {
    (len + NLMSG_ALIGNTO - 1) & !(NLMSG_ALIGNTO - 1)
}

/// Size of the netlink message header.
pub const NLMSG_HDRLEN: usize = nlmsg_align(std::mem::size_of::<NlMsgHdr>());

/// Size of the attribute header.
pub const NLA_HDRLEN: usize = 4;

pub const NLMSG_ERROR: u16 = 2;

pub const RTM_NEWLINK: u16 = 16;
pub const RTM_NEWADDR: u16 = 20;
pub const RTM_DELADDR: u16 = 21;
pub const RTM_NEWROUTE: u16 = 24;
pub const RTM_DELROUTE: u16 = 25;
pub const RTM_NEWRULE: u16 = 32;
pub const RTM_DELRULE: u16 = 33;

pub const NLM_F_REQUEST: u16 = 0x01;
pub const NLM_F_ACK: u16 = 0x04;
pub const NLM_F_EXCL: u16 = 0x200;
pub const NLM_F_CREATE: u16 = 0x400;

// Extended ACK flags on NLMSG_ERROR
pub const NLM_F_CAPPED: u16 = 0x100;
pub const NLM_F_ACK_TLVS: u16 = 0x200;
pub const NLMSGERR_ATTR_MSG: u16 = 1;

// Address attributes
pub const IFA_ADDRESS: u16 = 1;
pub const IFA_LOCAL: u16 = 2;

// Route attributes
pub const RTA_DST: u16 = 1;
pub const RTA_OIF: u16 = 4;
pub const RTA_GATEWAY: u16 = 5;
pub const RTA_PRIORITY: u16 = 6;
pub const RTA_TABLE: u16 = 15;

// Rule attributes
pub const FRA_DST: u16 = 1;
pub const FRA_SRC: u16 = 2;
pub const FRA_IIFNAME: u16 = 3;
pub const FRA_PRIORITY: u16 = 6;
pub const FRA_FWMARK: u16 = 10;
pub const FRA_TABLE: u16 = 15;
pub const FRA_FWMASK: u16 = 16;

// Link attributes
pub const IFLA_MTU: u16 = 4;

pub const RTPROT_STATIC: u8 = 4;

pub const RT_SCOPE_UNIVERSE: u8 = 0;
pub const RT_SCOPE_LINK: u8 = 253;
pub const RT_SCOPE_NOWHERE: u8 = 255;

pub const RTN_UNICAST: u8 = 1;
pub const RTN_BLACKHOLE: u8 = 6;
pub const RTN_UNREACHABLE: u8 = 7;
pub const RTN_PROHIBIT: u8 = 8;

pub const FR_ACT_TO_TBL: u8 = 1;
pub const FR_ACT_BLACKHOLE: u8 = 6;
pub const FR_ACT_UNREACHABLE: u8 = 7;
pub const FR_ACT_PROHIBIT: u8 = 8;

/// Netlink message header (struct nlmsghdr).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlMsgHdr {
    pub nlmsg_len: u32,
    pub nlmsg_type: u16,
    pub nlmsg_flags: u16,
    pub nlmsg_seq: u32,
    pub nlmsg_pid: u32,
}

/// Netlink attribute header (struct nlattr / struct rtattr).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlAttr {
    pub nla_len: u16,
    pub nla_type: u16,
}

/// Error or ACK payload (struct nlmsgerr).
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, Immutable, KnownLayout)]
pub struct NlMsgError {
    /// Negative errno, or 0 for an ACK.
    pub error: i32,
    /// Header of the request being answered.
    pub msg: NlMsgHdr,
}

impl NlMsgError {
    pub fn from_bytes(data: &[u8]) -> Option<&Self> {
        Self::ref_from_prefix(data).ok().map(|(r, _)| r)
    }

    /// Kernel explanation from the extended ACK, if any.
    pub fn ext_message<'a>(&self, header: &NlMsgHdr, payload: &'a [u8]) -> Option<&'a str> {
        if header.nlmsg_flags & NLM_F_ACK_TLVS == 0 {
            return None;
        }
        // The original request follows the error code, whole or capped to
        // its header.
        let echoed = if header.nlmsg_flags & NLM_F_CAPPED != 0 {
            NLMSG_HDRLEN
        } else {
            self.msg.nlmsg_len as usize
        };
        let offset = nlmsg_align(4 + echoed);
        let attrs = payload.get(offset..)?;

        AttrIter::new(attrs)
            .find(|(kind, _)| *kind == NLMSGERR_ATTR_MSG)
            .and_then(|(_, data)| std::str::from_utf8(data).ok())
            .map(|s| s.trim_end_matches('\0'))
    }
}

/// Address message (struct ifaddrmsg).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct IfAddrMsg {
    pub ifa_family: u8,
    pub ifa_prefixlen: u8,
    pub ifa_flags: u8,
    pub ifa_scope: u8,
    pub ifa_index: u32,
}

/// Route message (struct rtmsg).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct RtMsg {
    pub rtm_family: u8,
    pub rtm_dst_len: u8,
    pub rtm_src_len: u8,
    pub rtm_tos: u8,
    pub rtm_table: u8,
    pub rtm_protocol: u8,
    pub rtm_scope: u8,
    pub rtm_type: u8,
    pub rtm_flags: u32,
}

/// FIB rule header (struct fib_rule_hdr).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct FibRuleHdr {
    pub family: u8,
    pub dst_len: u8,
    pub src_len: u8,
    pub tos: u8,
    pub table: u8,
    pub res1: u8,
    pub res2: u8,
    pub action: u8,
    pub flags: u32,
}

/// Link message (struct ifinfomsg).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct IfInfoMsg {
    pub ifi_family: u8,
    pub ifi_pad: u8,
    pub ifi_type: u16,
    pub ifi_index: i32,
    pub ifi_flags: u32,
    pub ifi_change: u32,
}

/// Iterator over netlink messages in a receive buffer.
///
/// Stops at the first malformed header.
pub struct MessageIter<'a> {
    data: &'a [u8],
}

impl<'a> MessageIter<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl<'a> Iterator for MessageIter<'a> {
    type Item = (&'a NlMsgHdr, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let (header, _) = NlMsgHdr::ref_from_prefix(self.data).ok()?;
        let len = header.nlmsg_len as usize;
        if len < NLMSG_HDRLEN || len > self.data.len() {
            self.data = &[];
            return None;
        }

        let payload = &self.data[NLMSG_HDRLEN..len];
        self.data = self.data.get(nlmsg_align(len)..).unwrap_or(&[]);
        Some((header, payload))
    }
}

/// Iterator over attributes, yielding (type, payload).
pub struct AttrIter<'a> {
    data: &'a [u8],
}

impl<'a> AttrIter<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl<'a> Iterator for AttrIter<'a> {
    type Item = (u16, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let (attr, _) = NlAttr::ref_from_prefix(self.data).ok()?;
        let len = attr.nla_len as usize;
        if len < NLA_HDRLEN || len > self.data.len() {
            self.data = &[];
            return None;
        }

        let payload = &self.data[NLA_HDRLEN..len];
        self.data = self.data.get(nlmsg_align(len)..).unwrap_or(&[]);
        Some((attr.nla_type & 0x3fff, payload))
    }
}
