// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! OpenVPN Status Feed Parser
//!
//! Decodes the status document the VPN server rewrites periodically (or the
//! reply of the management interface `status` command) into a
//! [`StatusSnapshot`]. The format is not versioned, so:
//!
//! - columns are always resolved by the names declared in each section's
//!   header row, never by position
//! - a section whose header lacks `Common Name` is skipped, the rest of the
//!   document is still used
//! - [`StatusSnapshot::lookup`] falls back through three explicit tiers
//!   ([`MatchTier`]): client list, routing table, then a heuristic scan for
//!   the identity followed by the first IPv4-shaped token on that line
//!
//! Both layouts are understood:
//!
//! ```text
//! OpenVPN CLIENT LIST                      TITLE,OpenVPN 2.6.8 ...
//! Updated,2024-05-01 10:00:00              HEADER,CLIENT_LIST,Common Name,Real Address,...
//! Common Name,Real Address,...             CLIENT_LIST,routerA,203.0.113.7:51820,...
//! routerA,203.0.113.7:51820,...            HEADER,ROUTING_TABLE,Virtual Address,...
//! ROUTING TABLE                            ROUTING_TABLE,10.8.0.5,routerA,...
//! Virtual Address,Common Name,...          END
//! 10.8.0.5,routerA,...
//! GLOBAL STATS
//! END
//! ```
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Map an identity to its live tunnel address

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::LazyLock;
use thiserror::Error;

use crate::domain::identity::Identity;

static IPV4_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{1,3}(?:\.\d{1,3}){3}\b").unwrap_or_else(|e| unreachable!("static pattern: {e}"))
});

#[derive(Debug, Error)]
pub enum StatusFeedError {
    #[error("status feed unavailable: {0}")]
    Unavailable(String),
}

/// Source of status documents (file, management socket).
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Read and parse a fresh snapshot. Nothing is cached between calls.
    async fn snapshot(&self) -> Result<StatusSnapshot, StatusFeedError>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    ClientList,
    RoutingTable,
}

/// Which lookup tier produced an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    ClientList,
    RoutingTable,
    Heuristic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LiveAddress {
    pub address: IpAddr,
    pub tier: MatchTier,
}

/// One connected client as listed in the client-list section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionRecord {
    pub common_name: String,
    /// Public address as reported, possibly with a `:port` suffix.
    pub real_address: Option<String>,
    pub virtual_address: Option<IpAddr>,
    pub bytes_received: Option<u64>,
    pub bytes_sent: Option<u64>,
    pub connected_since: Option<String>,
    pub connected_at: Option<DateTime<Utc>>,
}

impl ConnectionRecord {
    pub fn real_ip(&self) -> Option<IpAddr> {
        self.real_address.as_deref().and_then(parse_address)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteEntry {
    pub common_name: String,
    /// `None` for non-host routes (iroute subnets) and tap MAC entries.
    pub virtual_address: Option<IpAddr>,
    pub real_address: Option<String>,
    pub last_ref: Option<String>,
}

/// Point-in-time view of one status document.
#[derive(Debug, Clone, Default)]
pub struct StatusSnapshot {
    pub clients: Vec<ConnectionRecord>,
    pub routes: Vec<RouteEntry>,
    /// Sections dropped because their header could not be resolved.
    pub skipped_sections: Vec<SectionKind>,
    lines: Vec<RawLine>,
}

/// One non-empty document line, kept for the heuristic tier.
#[derive(Debug, Clone)]
struct RawLine {
    text: String,
    /// Common name of the record this line was parsed into, if any.
    owner: Option<String>,
}

impl StatusSnapshot {
    pub fn parse(document: &str) -> Self {
        Parser::default().run(document)
    }

    pub fn client(&self, identity: &Identity) -> Option<&ConnectionRecord> {
        self.clients.iter().find(|c| c.common_name == identity.as_str())
    }

    /// Resolve the live tunnel address of `identity`.
    pub fn lookup(&self, identity: &Identity) -> Option<LiveAddress> {
        self.lookup_client_list(identity)
            .or_else(|| self.lookup_routing_table(identity))
            .or_else(|| self.lookup_heuristic(identity))
    }

    fn lookup_client_list(&self, identity: &Identity) -> Option<LiveAddress> {
        self.clients
            .iter()
            .filter(|c| c.common_name == identity.as_str())
            .find_map(|c| c.virtual_address)
            .map(|address| LiveAddress { address, tier: MatchTier::ClientList })
    }

    fn lookup_routing_table(&self, identity: &Identity) -> Option<LiveAddress> {
        self.routes
            .iter()
            .filter(|r| r.common_name == identity.as_str())
            .find_map(|r| r.virtual_address)
            .map(|address| LiveAddress { address, tier: MatchTier::RoutingTable })
    }

    /// Last resort for documents the section parser could not make sense of.
    /// Rows already parsed as another client's record are never considered.
    fn lookup_heuristic(&self, identity: &Identity) -> Option<LiveAddress> {
        self.lines
            .iter()
            .filter(|line| line.owner.as_deref().is_none_or(|owner| owner == identity.as_str()))
            .filter(|line| has_token(&line.text, identity.as_str()))
            .find_map(|line| first_ipv4_token(&line.text))
            .map(|ip| LiveAddress {
                address: IpAddr::V4(ip),
                tier: MatchTier::Heuristic,
            })
    }
}

/// `word` appears as a whole field, bounded by a delimiter, whitespace or
/// the line edges.
fn has_token(line: &str, word: &str) -> bool {
    line.split(|c: char| c == ',' || c.is_whitespace()).any(|token| token == word)
}

fn first_ipv4_token(line: &str) -> Option<Ipv4Addr> {
    IPV4_TOKEN
        .find_iter(line)
        .find_map(|m| m.as_str().parse::<Ipv4Addr>().ok())
}

/// Parse `1.2.3.4`, `1.2.3.4:1194`, `udp4:1.2.3.4:1194`, `[2001:db8::1]:1194`
/// or a bare IPv6 address.
pub fn parse_address(raw: &str) -> Option<IpAddr> {
    let s = raw.trim();
    if let Ok(ip) = s.parse() {
        return Some(ip);
    }

    // OpenVPN 2.5+ prefixes real addresses with the transport, e.g. `tcp4-server:`
    let s = match s.split_once(':') {
        Some((proto, rest)) if proto.starts_with("udp") || proto.starts_with("tcp") => rest,
        _ => s,
    };
    if let Ok(ip) = s.parse() {
        return Some(ip);
    }

    if let Some(rest) = s.strip_prefix('[') {
        return rest.split(']').next()?.parse().ok();
    }

    match s.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => host.parse().ok(),
        _ => None,
    }
}

/// Column indices resolved from a header row.
#[derive(Debug, Clone, Default)]
struct ColumnMap {
    common_name: usize,
    real_address: Option<usize>,
    virtual_address: Option<usize>,
    bytes_received: Option<usize>,
    bytes_sent: Option<usize>,
    connected_since: Option<usize>,
    connected_since_epoch: Option<usize>,
    last_ref: Option<usize>,
}

impl ColumnMap {
    fn resolve(names: &[&str]) -> Option<Self> {
        let find = |wanted: &str| {
            names
                .iter()
                .position(|name| name.trim().eq_ignore_ascii_case(wanted))
        };

        Some(Self {
            common_name: find("Common Name")?,
            real_address: find("Real Address"),
            virtual_address: find("Virtual Address"),
            bytes_received: find("Bytes Received"),
            bytes_sent: find("Bytes Sent"),
            connected_since: find("Connected Since"),
            connected_since_epoch: find("Connected Since (time_t)"),
            last_ref: find("Last Ref"),
        })
    }

    fn client(&self, fields: &[&str]) -> Option<ConnectionRecord> {
        let common_name = field(fields, Some(self.common_name))?.to_string();
        Some(ConnectionRecord {
            common_name,
            real_address: field(fields, self.real_address).map(str::to_string),
            virtual_address: field(fields, self.virtual_address).and_then(parse_address),
            bytes_received: field(fields, self.bytes_received).and_then(|v| v.parse().ok()),
            bytes_sent: field(fields, self.bytes_sent).and_then(|v| v.parse().ok()),
            connected_since: field(fields, self.connected_since).map(str::to_string),
            connected_at: field(fields, self.connected_since_epoch)
                .and_then(|v| v.parse::<i64>().ok())
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        })
    }

    fn route(&self, fields: &[&str]) -> Option<RouteEntry> {
        let common_name = field(fields, Some(self.common_name))?.to_string();
        Some(RouteEntry {
            common_name,
            virtual_address: field(fields, self.virtual_address).and_then(parse_address),
            real_address: field(fields, self.real_address).map(str::to_string),
            last_ref: field(fields, self.last_ref).map(str::to_string),
        })
    }
}

fn field<'a>(fields: &[&'a str], index: Option<usize>) -> Option<&'a str> {
    index
        .and_then(|i| fields.get(i))
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn split_fields(line: &str) -> Vec<&str> {
    if line.contains('\t') {
        line.split('\t').collect()
    } else {
        line.split(',').collect()
    }
}

/// Position inside a version 1 document. Version 2/3 documents stay `Outside`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Outside,
    /// Line right after a section title; may be `Updated,<time>`.
    Titled(SectionKind),
    /// Next line is the section header.
    Header(SectionKind),
    Rows(SectionKind),
}

struct Parser {
    snapshot: StatusSnapshot,
    section: Section,
    titled_columns: Option<ColumnMap>,
    client_columns: Option<ColumnMap>,
    route_columns: Option<ColumnMap>,
}

impl Default for Parser {
    fn default() -> Self {
        Self {
            snapshot: StatusSnapshot::default(),
            section: Section::Outside,
            titled_columns: None,
            client_columns: None,
            route_columns: None,
        }
    }
}

impl Parser {
    fn run(mut self, document: &str) -> StatusSnapshot {
        for line in document.lines() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let owner = self.line(line);
            self.snapshot.lines.push(RawLine {
                text: line.to_string(),
                owner,
            });
        }
        self.snapshot
    }

    /// Consume one line; returns the common name of the record it produced.
    fn line(&mut self, line: &str) -> Option<String> {
        // Version 1 titles contain no delimiter, so no data row can match one.
        match line.trim() {
            "OpenVPN CLIENT LIST" | "CLIENT LIST" => {
                self.enter(SectionKind::ClientList);
                return None;
            }
            "ROUTING TABLE" => {
                self.enter(SectionKind::RoutingTable);
                return None;
            }
            "GLOBAL STATS" | "END" => {
                self.section = Section::Outside;
                return None;
            }
            _ => {}
        }

        let fields = split_fields(line);
        match self.section {
            Section::Outside => self.tagged_row(&fields),
            Section::Titled(kind) if fields[0].trim() == "Updated" => {
                self.section = Section::Header(kind);
                None
            }
            Section::Titled(kind) | Section::Header(kind) => {
                self.titled_columns = self.resolve(&fields, kind);
                self.section = Section::Rows(kind);
                None
            }
            Section::Rows(kind) => {
                let columns = self.titled_columns.as_ref()?;
                push_record(&mut self.snapshot, kind, columns, &fields)
            }
        }
    }

    /// Versions 2 and 3: every row carries its tag in the first field.
    fn tagged_row(&mut self, fields: &[&str]) -> Option<String> {
        match fields[0].trim() {
            "HEADER" => {
                let columns = fields.get(2..).unwrap_or_default();
                match fields.get(1).map(|s| s.trim()) {
                    Some("CLIENT_LIST") => {
                        self.client_columns = self.resolve(columns, SectionKind::ClientList);
                    }
                    Some("ROUTING_TABLE") => {
                        self.route_columns = self.resolve(columns, SectionKind::RoutingTable);
                    }
                    _ => {}
                }
                None
            }
            "CLIENT_LIST" if fields.len() > 1 => {
                let columns = self.client_columns.as_ref()?;
                push_record(&mut self.snapshot, SectionKind::ClientList, columns, &fields[1..])
            }
            "ROUTING_TABLE" if fields.len() > 1 => {
                let columns = self.route_columns.as_ref()?;
                push_record(&mut self.snapshot, SectionKind::RoutingTable, columns, &fields[1..])
            }
            _ => None,
        }
    }

    fn enter(&mut self, kind: SectionKind) {
        self.section = Section::Titled(kind);
        self.titled_columns = None;
    }

    fn resolve(&mut self, names: &[&str], kind: SectionKind) -> Option<ColumnMap> {
        let columns = ColumnMap::resolve(names);
        if columns.is_none() {
            tracing::warn!(section = ?kind, header = ?names, "Status header has no 'Common Name' column, skipping section");
            self.snapshot.skipped_sections.push(kind);
        }
        columns
    }
}

/// Store a parsed row; returns the common name it belongs to.
fn push_record(snapshot: &mut StatusSnapshot, kind: SectionKind, columns: &ColumnMap, fields: &[&str]) -> Option<String> {
    match kind {
        SectionKind::ClientList => {
            let record = columns.client(fields)?;
            let owner = record.common_name.clone();
            snapshot.clients.push(record);
            Some(owner)
        }
        SectionKind::RoutingTable => {
            let entry = columns.route(fields)?;
            let owner = entry.common_name.clone();
            snapshot.routes.push(entry);
            Some(owner)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> Identity {
        Identity::parse(raw).unwrap()
    }

    fn ip(raw: &str) -> IpAddr {
        raw.parse().unwrap()
    }

    const V1: &str = "\
OpenVPN CLIENT LIST
Updated,Thu Jun 18 08:12:15 2015
Common Name,Real Address,Bytes Received,Bytes Sent,Connected Since
client1,198.51.100.20:1194,12345,67890,Thu Jun 18 04:23:03 2015
routerB,203.0.113.9:40012,10,20,Thu Jun 18 07:00:00 2015
ROUTING TABLE
Virtual Address,Common Name,Real Address,Last Ref
10.8.0.6,client1,198.51.100.20:1194,Thu Jun 18 08:12:09 2015
192.168.88.0/24,routerB,203.0.113.9:40012,Thu Jun 18 08:00:00 2015
10.8.0.10,routerB,203.0.113.9:40012,Thu Jun 18 08:00:00 2015
GLOBAL STATS
Max bcast/mcast queue length,0
END
";

    const V2: &str = "\
TITLE,OpenVPN 2.6.8 x86_64-pc-linux-gnu
TIME,2024-05-01 10:00:00,1714557600
HEADER,CLIENT_LIST,Common Name,Real Address,Virtual Address,Virtual IPv6 Address,Bytes Received,Bytes Sent,Connected Since,Connected Since (time_t),Username,Client ID,Peer ID,Data Channel Cipher
CLIENT_LIST,routerA,udp4:203.0.113.7:51820,10.8.0.5,,2048,4096,2024-05-01 09:00:00,1714554000,UNDEF,0,0,AES-256-GCM
HEADER,ROUTING_TABLE,Virtual Address,Common Name,Real Address,Last Ref,Last Ref (time_t)
ROUTING_TABLE,10.8.0.5,routerA,udp4:203.0.113.7:51820,2024-05-01 09:59:58,1714557598
GLOBAL_STATS,Max bcast/mcast queue length,0
END
";

    #[test]
    fn test_parse_v1_sections() {
        let snapshot = StatusSnapshot::parse(V1);
        assert_eq!(snapshot.clients.len(), 2);
        assert_eq!(snapshot.routes.len(), 3);
        assert!(snapshot.skipped_sections.is_empty());

        let client1 = snapshot.client(&id("client1")).unwrap();
        assert_eq!(client1.real_address.as_deref(), Some("198.51.100.20:1194"));
        assert_eq!(client1.real_ip(), Some(ip("198.51.100.20")));
        assert_eq!(client1.bytes_received, Some(12345));
        assert_eq!(client1.bytes_sent, Some(67890));
        assert_eq!(client1.virtual_address, None);
    }

    #[test]
    fn test_v1_lookup_uses_routing_table() {
        let snapshot = StatusSnapshot::parse(V1);
        assert_eq!(
            snapshot.lookup(&id("client1")),
            Some(LiveAddress { address: ip("10.8.0.6"), tier: MatchTier::RoutingTable })
        );
        // subnet iroute entries are not host addresses
        assert_eq!(snapshot.lookup(&id("routerB")).map(|l| l.address), Some(ip("10.8.0.10")));
    }

    #[test]
    fn test_parse_v2_tagged_rows() {
        let snapshot = StatusSnapshot::parse(V2);
        let router = snapshot.client(&id("routerA")).unwrap();
        assert_eq!(router.virtual_address, Some(ip("10.8.0.5")));
        assert_eq!(router.real_ip(), Some(ip("203.0.113.7")));
        assert_eq!(router.connected_at.map(|t| t.timestamp()), Some(1714554000));
        assert_eq!(
            snapshot.lookup(&id("routerA")),
            Some(LiveAddress { address: ip("10.8.0.5"), tier: MatchTier::ClientList })
        );
    }

    #[test]
    fn test_parse_v3_tab_delimited() {
        let document = V2.replace(',', "\t");
        let snapshot = StatusSnapshot::parse(&document);
        assert_eq!(snapshot.lookup(&id("routerA")).map(|l| l.address), Some(ip("10.8.0.5")));
    }

    #[test]
    fn test_client_list_without_routing_table() {
        let document = "\
OpenVPN CLIENT LIST
Updated,2024-05-01 10:00:00
Common Name,Real Address,Virtual Address,Bytes Received,Bytes Sent,Connected Since
routerA,203.0.113.7:51820,10.8.0.5,100,200,2024-05-01 09:00:00
END
";
        let snapshot = StatusSnapshot::parse(document);
        assert!(snapshot.routes.is_empty());
        assert_eq!(
            snapshot.lookup(&id("routerA")),
            Some(LiveAddress { address: ip("10.8.0.5"), tier: MatchTier::ClientList })
        );
    }

    #[test]
    fn test_column_order_does_not_matter() {
        let a = "\
OpenVPN CLIENT LIST
Common Name,Real Address,Virtual Address,Bytes Received,Bytes Sent,Connected Since
routerA,203.0.113.7:51820,10.8.0.5,100,200,2024-05-01 09:00:00
END
";
        let b = "\
OpenVPN CLIENT LIST
Connected Since,Virtual Address,Bytes Sent,Common Name,Bytes Received,Real Address
2024-05-01 09:00:00,10.8.0.5,200,routerA,100,203.0.113.7:51820
END
";
        let (a, b) = (StatusSnapshot::parse(a), StatusSnapshot::parse(b));
        assert_eq!(a.lookup(&id("routerA")), b.lookup(&id("routerA")));
        assert_eq!(a.client(&id("routerA")), b.client(&id("routerA")));
    }

    #[test]
    fn test_bad_header_skips_only_that_section() {
        let document = "\
OpenVPN CLIENT LIST
Name,Address,Tunnel
routerA,203.0.113.7:51820,10.8.0.99
ROUTING TABLE
Virtual Address,Common Name,Real Address,Last Ref
10.8.0.5,routerA,203.0.113.7:51820,now
END
";
        let snapshot = StatusSnapshot::parse(document);
        assert_eq!(snapshot.skipped_sections, vec![SectionKind::ClientList]);
        assert!(snapshot.clients.is_empty());
        assert_eq!(
            snapshot.lookup(&id("routerA")),
            Some(LiveAddress { address: ip("10.8.0.5"), tier: MatchTier::RoutingTable })
        );
    }

    #[test]
    fn test_heuristic_fallback_when_sections_are_missing() {
        let document = "\
some banner
routerC connected from 203.0.113.50 assigned 10.8.0.77
";
        let snapshot = StatusSnapshot::parse(document);
        assert_eq!(
            snapshot.lookup(&id("routerC")),
            Some(LiveAddress { address: ip("203.0.113.50"), tier: MatchTier::Heuristic })
        );
    }

    #[test]
    fn test_heuristic_skips_invalid_octets() {
        let snapshot = StatusSnapshot::parse("routerC 999.1.1.1 then 10.8.0.7\n");
        assert_eq!(snapshot.lookup(&id("routerC")).map(|l| l.address), Some(ip("10.8.0.7")));
    }

    #[test]
    fn test_heuristic_matches_whole_identity_only() {
        let snapshot = StatusSnapshot::parse("CLIENT_LIST,client10,203.0.113.7:51820,10.8.0.10\n");
        assert_eq!(snapshot.lookup(&id("client1")), None);

        let snapshot = StatusSnapshot::parse("peer client10 at 203.0.113.7\npeer client1 at 203.0.113.8\n");
        assert_eq!(snapshot.lookup(&id("client1")).map(|l| l.address), Some(ip("203.0.113.8")));
    }

    #[test]
    fn test_heuristic_ignores_rows_of_other_clients() {
        // routerB's row mentions routerA in a free-text column.
        let document = "\
HEADER,CLIENT_LIST,Common Name,Real Address,Username
CLIENT_LIST,routerB,203.0.113.9:40012,routerA
";
        let snapshot = StatusSnapshot::parse(document);
        assert_eq!(snapshot.clients.len(), 1);
        assert_eq!(snapshot.lookup(&id("routerA")), None);
    }

    #[test]
    fn test_v1_rows_named_like_tags() {
        let document = "\
OpenVPN CLIENT LIST
Updated,2024-05-01 10:00:00
Common Name,Real Address,Virtual Address,Bytes Received,Bytes Sent,Connected Since
TIME,203.0.113.7:51820,10.8.0.5,1,2,2024-05-01 09:00:00
HEADER,203.0.113.8:51820,10.8.0.6,1,2,2024-05-01 09:00:00
TITLE,203.0.113.9:51820,10.8.0.7,1,2,2024-05-01 09:00:00
Updated,203.0.113.10:51820,10.8.0.8,1,2,2024-05-01 09:00:00
END
";
        let snapshot = StatusSnapshot::parse(document);
        assert_eq!(snapshot.clients.len(), 4);
        for (name, address) in [("TIME", "10.8.0.5"), ("HEADER", "10.8.0.6"), ("TITLE", "10.8.0.7"), ("Updated", "10.8.0.8")] {
            assert_eq!(
                snapshot.lookup(&id(name)),
                Some(LiveAddress { address: ip(address), tier: MatchTier::ClientList })
            );
        }
    }

    #[test]
    fn test_not_found() {
        let snapshot = StatusSnapshot::parse(V2);
        assert_eq!(snapshot.lookup(&id("ghost")), None);
        assert_eq!(StatusSnapshot::parse("").lookup(&id("ghost")), None);
    }

    #[test]
    fn test_crlf_line_endings() {
        let snapshot = StatusSnapshot::parse(&V2.replace('\n', "\r\n"));
        assert_eq!(snapshot.lookup(&id("routerA")).map(|l| l.tier), Some(MatchTier::ClientList));
    }

    #[test]
    fn test_parse_address_forms() {
        assert_eq!(parse_address("10.8.0.5"), Some(ip("10.8.0.5")));
        assert_eq!(parse_address("1.2.3.4:1194"), Some(ip("1.2.3.4")));
        assert_eq!(parse_address("tcp4-server:1.2.3.4:443"), Some(ip("1.2.3.4")));
        assert_eq!(parse_address("[2001:db8::1]:1194"), Some(ip("2001:db8::1")));
        assert_eq!(parse_address("2001:db8::1"), Some(ip("2001:db8::1")));
        assert_eq!(parse_address("192.168.88.0/24"), None);
        assert_eq!(parse_address("ae:12:34:56:78:9a"), None);
        assert_eq!(parse_address(""), None);
    }
}
