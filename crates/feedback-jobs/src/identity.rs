//! Caller identity resolution for loopback TCP connections.
//!
//! The kernel socket tables (`/proc/net/tcp`, `/proc/net/tcp6`) record the
//! owning uid of every local socket. For a loopback caller the client end of
//! the connection appears there, which gives the uid without any cooperation
//! from the client. The uid is then mapped to an account name through the
//! system user database (NSS), so directory-backed accounts resolve too.

use std::fs;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use nix::unistd::{Uid, User};
use tracing::{debug, warn};

use feedback_core::defaults::PROC_NET_TCP_PATHS;
use feedback_core::{CallerHandle, Error, IdentityResolver, Result};

/// Maps numeric uids to account names.
pub trait AccountDirectory: Send + Sync {
    /// `Ok(None)` when the uid has no account; `Err` when the directory
    /// itself could not be consulted.
    fn account_name(&self, uid: u32) -> Result<Option<String>>;
}

/// The system user database, queried with `getpwuid_r`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAccounts;

impl AccountDirectory for SystemAccounts {
    fn account_name(&self, uid: u32) -> Result<Option<String>> {
        User::from_uid(Uid::from_raw(uid))
            .map(|user| user.map(|u| u.name))
            .map_err(|e| {
                Error::IdentityUnavailable(format!("user database lookup for uid {}: {}", uid, e))
            })
    }
}

/// Resolves loopback callers through the kernel socket tables.
#[derive(Clone)]
pub struct PeerIdentityResolver {
    socket_tables: Vec<PathBuf>,
    accounts: Arc<dyn AccountDirectory>,
}

impl Default for PeerIdentityResolver {
    fn default() -> Self {
        Self {
            socket_tables: PROC_NET_TCP_PATHS.iter().map(PathBuf::from).collect(),
            accounts: Arc::new(SystemAccounts),
        }
    }
}

impl PeerIdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_socket_tables(mut self, tables: Vec<PathBuf>) -> Self {
        self.socket_tables = tables;
        self
    }

    pub fn with_accounts(mut self, accounts: Arc<dyn AccountDirectory>) -> Self {
        self.accounts = accounts;
        self
    }

    fn peer_uid(&self, caller: &CallerHandle) -> Result<u32> {
        let peer = normalize(caller.peer);
        let local = caller.local.map(normalize);
        let mut readable = false;

        for table in &self.socket_tables {
            let content = match fs::read_to_string(table) {
                Ok(content) => content,
                Err(e) => {
                    debug!(table = %table.display(), error = %e, "Socket table unreadable");
                    continue;
                }
            };
            readable = true;
            if let Some(uid) = find_socket_owner(&content, peer, local) {
                return Ok(uid);
            }
        }

        if readable {
            Err(Error::IdentityUnavailable(format!(
                "no socket owner found for {}",
                caller
            )))
        } else {
            Err(Error::IdentityUnavailable(
                "no socket table could be read".to_string(),
            ))
        }
    }

    fn account_name(&self, uid: u32) -> Result<String> {
        self.accounts
            .account_name(uid)?
            .ok_or_else(|| Error::IdentityLookupFailed(format!("no account for uid {}", uid)))
    }
}

impl IdentityResolver for PeerIdentityResolver {
    fn resolve(&self, caller: &CallerHandle) -> Result<String> {
        if !caller.peer.ip().is_loopback() && !is_mapped_loopback(caller.peer.ip()) {
            warn!(caller = %caller, "Refusing identity for non-loopback caller");
            return Err(Error::IdentityUnavailable(format!(
                "caller {} is not on the loopback interface",
                caller
            )));
        }
        let uid = self.peer_uid(caller)?;
        let username = self.account_name(uid)?;
        debug!(caller = %caller, uid, username = %username, "Caller identity resolved");
        Ok(username)
    }
}

fn is_mapped_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().is_some_and(|v4| v4.is_loopback()),
        IpAddr::V4(_) => false,
    }
}

fn normalize(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => SocketAddr::new(IpAddr::V4(v4), addr.port()),
            None => addr,
        },
        IpAddr::V4(_) => addr,
    }
}

/// Find the uid owning the socket whose local address is `peer`
/// (and whose remote address is `server`, when known).
fn find_socket_owner(table: &str, peer: SocketAddr, server: Option<SocketAddr>) -> Option<u32> {
    table.lines().skip(1).find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 8 {
            return None;
        }
        let local = normalize(parse_socket_addr(fields[1])?);
        if local != peer {
            return None;
        }
        if let Some(server) = server {
            let remote = normalize(parse_socket_addr(fields[2])?);
            if remote != server {
                return None;
            }
        }
        fields[7].parse().ok()
    })
}

/// Parse a kernel `ADDR:PORT` hex pair. Addresses are stored as 32-bit words
/// in host byte order.
fn parse_socket_addr(field: &str) -> Option<SocketAddr> {
    let (addr, port) = field.split_once(':')?;
    let port = u16::from_str_radix(port, 16).ok()?;
    let ip = match addr.len() {
        8 => {
            let word = u32::from_str_radix(addr, 16).ok()?;
            IpAddr::V4(Ipv4Addr::from(word.to_le_bytes()))
        }
        32 => {
            let mut octets = [0u8; 16];
            for (i, chunk) in octets.chunks_mut(4).enumerate() {
                let word = u32::from_str_radix(addr.get(i * 8..i * 8 + 8)?, 16).ok()?;
                chunk.copy_from_slice(&word.to_le_bytes());
            }
            IpAddr::V6(Ipv6Addr::from(octets))
        }
        _ => return None,
    };
    Some(SocketAddr::new(ip, port))
}
