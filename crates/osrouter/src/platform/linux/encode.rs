//! Mutation to rtnetlink request encoding.

use std::net::IpAddr;

use super::builder::MessageBuilder;
use super::message::*;
use crate::config::{DeclaredAddress, DeclaredRoute, DeclaredRouteType, DeclaredRule, Family, RuleAction};

fn family_of(addr: IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => libc::AF_INET as u8,
        IpAddr::V6(_) => libc::AF_INET6 as u8,
    }
}

fn create_flags(add: bool) -> u16 {
    if add {
        NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL
    } else {
        NLM_F_REQUEST | NLM_F_ACK
    }
}

/// Build an RTM_NEWADDR or RTM_DELADDR request.
pub fn address(addr: &DeclaredAddress, ifindex: u32, add: bool) -> MessageBuilder {
    let msg_type = if add { RTM_NEWADDR } else { RTM_DELADDR };
    let mut builder = MessageBuilder::new(msg_type, create_flags(add));

    builder.append(&IfAddrMsg {
        ifa_family: family_of(addr.address()),
        ifa_prefixlen: addr.prefix_len(),
        ifa_scope: RT_SCOPE_UNIVERSE,
        ifa_index: ifindex,
        ..Default::default()
    });
    // IPv4 needs IFA_LOCAL for the interface address itself
    if addr.is_ipv4() {
        builder.append_attr_addr(IFA_LOCAL, addr.address());
    }
    builder.append_attr_addr(IFA_ADDRESS, addr.address());
    builder
}

/// Build an RTM_NEWROUTE or RTM_DELROUTE request.
pub fn route(route: &DeclaredRoute, oif: Option<u32>, add: bool) -> MessageBuilder {
    let msg_type = if add { RTM_NEWROUTE } else { RTM_DELROUTE };
    let mut builder = MessageBuilder::new(msg_type, create_flags(add));

    let rtm_type = match route.route_type() {
        DeclaredRouteType::Unicast => RTN_UNICAST,
        DeclaredRouteType::Blackhole => RTN_BLACKHOLE,
        DeclaredRouteType::Unreachable => RTN_UNREACHABLE,
        DeclaredRouteType::Prohibit => RTN_PROHIBIT,
    };
    let scope = if !add {
        RT_SCOPE_NOWHERE
    } else if rtm_type == RTN_UNICAST && route.gateway().is_none() {
        RT_SCOPE_LINK
    } else {
        RT_SCOPE_UNIVERSE
    };
    let table = route.table();

    builder.append(&RtMsg {
        rtm_family: family_of(route.destination()),
        rtm_dst_len: route.prefix_len(),
        rtm_table: if table < 256 { table as u8 } else { 0 },
        rtm_protocol: if add { RTPROT_STATIC } else { 0 },
        rtm_scope: scope,
        rtm_type,
        ..Default::default()
    });

    if route.prefix_len() > 0 {
        builder.append_attr_addr(RTA_DST, route.destination());
    }
    if let Some(gw) = route.gateway() {
        builder.append_attr_addr(RTA_GATEWAY, gw);
    }
    if let Some(oif) = oif {
        builder.append_attr_u32(RTA_OIF, oif);
    }
    if let Some(metric) = route.metric() {
        builder.append_attr_u32(RTA_PRIORITY, metric);
    }
    builder.append_attr_u32(RTA_TABLE, table);
    builder
}

/// Build an RTM_NEWRULE or RTM_DELRULE request.
pub fn rule(rule: &DeclaredRule, add: bool) -> MessageBuilder {
    let msg_type = if add { RTM_NEWRULE } else { RTM_DELRULE };
    let mut builder = MessageBuilder::new(msg_type, create_flags(add));

    let (action, table) = match rule.action() {
        RuleAction::Lookup(table) => (FR_ACT_TO_TBL, Some(table)),
        RuleAction::Blackhole => (FR_ACT_BLACKHOLE, None),
        RuleAction::Unreachable => (FR_ACT_UNREACHABLE, None),
        RuleAction::Prohibit => (FR_ACT_PROHIBIT, None),
    };
    let family = match rule.family() {
        Family::Inet => libc::AF_INET as u8,
        Family::Inet6 => libc::AF_INET6 as u8,
    };

    builder.append(&FibRuleHdr {
        family,
        src_len: rule.src().map_or(0, |(_, len)| len),
        dst_len: rule.dst().map_or(0, |(_, len)| len),
        table: table.filter(|t| *t < 256).map_or(0, |t| t as u8),
        action,
        ..Default::default()
    });

    builder.append_attr_u32(FRA_PRIORITY, rule.priority());
    if let Some((addr, _)) = rule.src() {
        builder.append_attr_addr(FRA_SRC, addr);
    }
    if let Some((addr, _)) = rule.dst() {
        builder.append_attr_addr(FRA_DST, addr);
    }
    if let Some(iif) = rule.iif() {
        builder.append_attr_str(FRA_IIFNAME, iif);
    }
    if let Some(mark) = rule.fwmark() {
        builder.append_attr_u32(FRA_FWMARK, mark);
    }
    if let Some(mask) = rule.fwmask() {
        builder.append_attr_u32(FRA_FWMASK, mask);
    }
    if let Some(table) = table {
        builder.append_attr_u32(FRA_TABLE, table);
    }
    builder
}

/// Build an RTM_NEWLINK request setting the MTU.
pub fn mtu(ifindex: u32, mtu: u32) -> MessageBuilder {
    let mut builder = MessageBuilder::new(RTM_NEWLINK, NLM_F_REQUEST | NLM_F_ACK);
    builder.append(&IfInfoMsg {
        ifi_index: ifindex as i32,
        ..Default::default()
    });
    builder.append_attr_u32(IFLA_MTU, mtu);
    builder
}
