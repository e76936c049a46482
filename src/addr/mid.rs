//! The fixed mid-layer address layout.
//!
//! Every mid-layer address starts with a native-endian `u16` family. The
//! remaining fields follow the C layout of the upstream stack:
//!
//! ```text
//! in:  family u16 | port be16 | addr be32                          (8)
//! in6: family u16 | port be16 | addr [u8; 16] | scope_id u32      (24)
//! un:  family u16 | path [u8; 108]                               (110)
//! ll:  family u16 | protocol be16 | ifindex i32 | hatype u16 |
//!      pkttype u8 | halen u8 | addr [u8; 8]                       (20)
//! ```
//!
//! Buffers handed over by the upstream stack carry no alignment guarantee,
//! so fields are read and written byte-wise.

use std::net::{Ipv4Addr, Ipv6Addr};

use super::{
    Family, Inet6Addr, InetAddr, LinkAddr, SockAddr, UnixAddr, LINK_ADDR_MAX, UNIX_PATH_MAX,
};
use crate::error::{Error, Result};

const FAMILY_LEN: usize = 2;

/// Size of the mid-layer `sockaddr_in`.
pub const SOCKADDR_IN_LEN: usize = 8;
/// Size of the mid-layer `sockaddr_in6`.
pub const SOCKADDR_IN6_LEN: usize = 24;
/// Size of the mid-layer `sockaddr_un`.
pub const SOCKADDR_UN_LEN: usize = FAMILY_LEN + UNIX_PATH_MAX;
/// Size of the mid-layer `sockaddr_ll`.
pub const SOCKADDR_LL_LEN: usize = 20;
/// Size of the mid-layer `sockaddr_storage`, large enough for any family.
pub const SOCKADDR_STORAGE_LEN: usize = 112;

/// Offset of `sll_addr`, everything before it is required.
const LL_HEADER_LEN: usize = 12;

/// Encodes `addr` in the mid-layer layout into `buf`.
///
/// Returns the number of bytes written. If `buf` is too small nothing is
/// written and [`Error::AddrLenMismatch`] is returned.
pub fn encode(addr: &SockAddr, buf: &mut [u8]) -> Result<usize> {
    let len = encoded_len(addr);
    if buf.len() < len {
        return Err(Error::AddrLenMismatch {
            family: addr.family(),
            expected: len,
            actual: buf.len(),
        });
    }

    let buf = &mut buf[..len];
    buf[..FAMILY_LEN].copy_from_slice(&addr.family().code().to_ne_bytes());
    match addr {
        SockAddr::Unspecified => {}
        SockAddr::V4(addr) => {
            buf[2..4].copy_from_slice(&addr.port.to_be_bytes());
            buf[4..8].copy_from_slice(&addr.ip.octets());
        }
        SockAddr::V6(addr) => {
            buf[2..4].copy_from_slice(&addr.port.to_be_bytes());
            buf[4..20].copy_from_slice(&addr.ip.octets());
            buf[20..24].copy_from_slice(&addr.scope_id.to_ne_bytes());
        }
        SockAddr::Unix(addr) => {
            let path = addr.as_bytes();
            buf[FAMILY_LEN..FAMILY_LEN + path.len()].copy_from_slice(path);
            if len > FAMILY_LEN + path.len() {
                // Null terminator.
                buf[FAMILY_LEN + path.len()] = 0;
            }
        }
        SockAddr::Packet(addr) => {
            let hw_addr = addr.hw_addr();
            buf[2..4].copy_from_slice(&addr.protocol.to_be_bytes());
            buf[4..8].copy_from_slice(&addr.ifindex.to_ne_bytes());
            buf[8..10].copy_from_slice(&addr.hatype.to_ne_bytes());
            buf[10] = addr.pkttype;
            buf[11] = hw_addr.len() as u8;
            buf[LL_HEADER_LEN..].fill(0);
            buf[LL_HEADER_LEN..LL_HEADER_LEN + hw_addr.len()].copy_from_slice(hw_addr);
        }
    }
    Ok(len)
}

/// Returns the number of bytes [`encode`] writes for `addr`.
pub(crate) fn encoded_len(addr: &SockAddr) -> usize {
    match addr {
        SockAddr::Unspecified => FAMILY_LEN,
        SockAddr::V4(_) => SOCKADDR_IN_LEN,
        SockAddr::V6(_) => SOCKADDR_IN6_LEN,
        SockAddr::Unix(addr) => {
            let path = addr.as_bytes();
            match path.first() {
                // Unnamed and abstract addresses have no terminator.
                Some(0) | None => FAMILY_LEN + path.len(),
                Some(_) if path.len() < UNIX_PATH_MAX => FAMILY_LEN + path.len() + 1,
                Some(_) => FAMILY_LEN + path.len(),
            }
        }
        SockAddr::Packet(_) => SOCKADDR_LL_LEN,
    }
}

/// Decodes a mid-layer address from `buf`.
///
/// The length of `buf` is validated against the family it declares before
/// any family specific field is read.
pub fn decode(buf: &[u8]) -> Result<SockAddr> {
    if buf.len() < FAMILY_LEN {
        return Err(Error::AddrLenMismatch {
            family: Family::Unspec,
            expected: FAMILY_LEN,
            actual: buf.len(),
        });
    }
    let family = Family::from_code(u16::from_ne_bytes([buf[0], buf[1]]))?;
    check_len(family, buf, min_len(family))?;

    match family {
        Family::Unspec => Ok(SockAddr::Unspecified),
        Family::Inet => Ok(SockAddr::V4(InetAddr::new(
            Ipv4Addr::new(buf[4], buf[5], buf[6], buf[7]),
            u16::from_be_bytes([buf[2], buf[3]]),
        ))),
        Family::Inet6 => {
            let mut ip = [0; 16];
            ip.copy_from_slice(&buf[4..20]);
            Ok(SockAddr::V6(Inet6Addr::new(
                Ipv6Addr::from(ip),
                u16::from_be_bytes([buf[2], buf[3]]),
                u32::from_ne_bytes([buf[20], buf[21], buf[22], buf[23]]),
            )))
        }
        Family::Unix => {
            let end = buf.len().min(SOCKADDR_UN_LEN);
            let mut path = &buf[FAMILY_LEN..end];
            if path.first().map_or(false, |b| *b != 0) {
                if let Some(nul) = path.iter().position(|b| *b == 0) {
                    path = &path[..nul];
                }
            }
            UnixAddr::new(path).map(SockAddr::Unix)
        }
        Family::Packet => {
            let halen = buf[11] as usize;
            if halen > LINK_ADDR_MAX {
                return Err(Error::AddrLenMismatch {
                    family,
                    expected: LINK_ADDR_MAX,
                    actual: halen,
                });
            }
            check_len(family, buf, LL_HEADER_LEN + halen)?;
            let mut addr = LinkAddr::new(
                u16::from_be_bytes([buf[2], buf[3]]),
                i32::from_ne_bytes([buf[4], buf[5], buf[6], buf[7]]),
                &buf[LL_HEADER_LEN..LL_HEADER_LEN + halen],
            )?;
            addr.hatype = u16::from_ne_bytes([buf[8], buf[9]]);
            addr.pkttype = buf[10];
            Ok(SockAddr::Packet(addr))
        }
    }
}

/// Smallest buffer that can hold an address of `family`.
const fn min_len(family: Family) -> usize {
    match family {
        Family::Unspec | Family::Unix => FAMILY_LEN,
        Family::Inet => SOCKADDR_IN_LEN,
        Family::Inet6 => SOCKADDR_IN6_LEN,
        Family::Packet => LL_HEADER_LEN,
    }
}

fn check_len(family: Family, buf: &[u8], expected: usize) -> Result<()> {
    if buf.len() < expected {
        Err(Error::AddrLenMismatch {
            family,
            expected,
            actual: buf.len(),
        })
    } else {
        Ok(())
    }
}
