//! Protocol-independent socket addresses.
//!
//! [`SockAddr`] is the address type crossing the mid-layer boundary. It is
//! converted to the fixed mid-layer byte layout by [`encode`] and [`decode`],
//! and to the host's `libc::sockaddr_*` structures by the `native` module.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use crate::error::{Error, Result};

mod mid;
pub(crate) mod native;

pub use self::mid::{
    decode, encode, SOCKADDR_IN6_LEN, SOCKADDR_IN_LEN, SOCKADDR_LL_LEN, SOCKADDR_STORAGE_LEN,
    SOCKADDR_UN_LEN,
};

/// Maximum length of a Unix-domain path, in bytes.
pub const UNIX_PATH_MAX: usize = 108;

/// Maximum length of a link-layer (hardware) address, in bytes.
pub const LINK_ADDR_MAX: usize = 8;

/// Mid-layer address family.
///
/// The discriminants are the mid-layer numeric values, which differ from the
/// host's `AF_*` values.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Family {
    /// Unspecified family.
    Unspec = 0,
    /// IP protocol family version 4.
    Inet = 1,
    /// IP protocol family version 6.
    Inet6 = 2,
    /// Link-layer packet family.
    Packet = 3,
    /// Unix-domain family.
    Unix = 6,
}

impl Family {
    /// Returns the mid-layer numeric value.
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Parses a mid-layer numeric value.
    pub fn from_code(code: u16) -> Result<Family> {
        match code {
            0 => Ok(Family::Unspec),
            1 => Ok(Family::Inet),
            2 => Ok(Family::Inet6),
            3 => Ok(Family::Packet),
            6 => Ok(Family::Unix),
            _ => Err(Error::UnsupportedFamily(code)),
        }
    }

    /// Returns the host `AF_*` value.
    pub(crate) fn to_host(self) -> Result<libc::c_int> {
        match self {
            Family::Unspec => Ok(libc::AF_UNSPEC),
            Family::Inet => Ok(libc::AF_INET),
            Family::Inet6 => Ok(libc::AF_INET6),
            Family::Unix => Ok(libc::AF_UNIX),
            #[cfg(any(target_os = "android", target_os = "linux"))]
            Family::Packet => Ok(libc::AF_PACKET),
            #[cfg(not(any(target_os = "android", target_os = "linux")))]
            Family::Packet => Err(Error::UnsupportedFamily(self.code())),
        }
    }

    /// Parses a host `AF_*` value.
    pub(crate) fn from_host(family: libc::c_int) -> Result<Family> {
        match family {
            libc::AF_UNSPEC => Ok(Family::Unspec),
            libc::AF_INET => Ok(Family::Inet),
            libc::AF_INET6 => Ok(Family::Inet6),
            libc::AF_UNIX => Ok(Family::Unix),
            #[cfg(any(target_os = "android", target_os = "linux"))]
            libc::AF_PACKET => Ok(Family::Packet),
            _ => Err(Error::UnsupportedFamily(family as u16)),
        }
    }
}

/// A protocol-independent socket address.
///
/// The family of the address is the variant, see [`SockAddr::family`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SockAddr {
    /// No address (`AF_UNSPEC`), e.g. to dissolve a datagram association.
    Unspecified,
    /// IPv4 address and port.
    V4(InetAddr),
    /// IPv6 address, port and scope.
    V6(Inet6Addr),
    /// Unix-domain path.
    Unix(UnixAddr),
    /// Link-layer address.
    Packet(LinkAddr),
}

impl SockAddr {
    /// Returns the address family of this address.
    pub const fn family(&self) -> Family {
        match self {
            SockAddr::Unspecified => Family::Unspec,
            SockAddr::V4(_) => Family::Inet,
            SockAddr::V6(_) => Family::Inet6,
            SockAddr::Unix(_) => Family::Unix,
            SockAddr::Packet(_) => Family::Packet,
        }
    }

    /// Returns the address as an IP socket address, if it is one.
    pub fn as_socket(&self) -> Option<SocketAddr> {
        match self {
            SockAddr::V4(addr) => Some(SocketAddr::V4((*addr).into())),
            SockAddr::V6(addr) => Some(SocketAddr::V6((*addr).into())),
            _ => None,
        }
    }

    /// Returns the Unix-domain address, if it is one.
    pub fn as_unix(&self) -> Option<&UnixAddr> {
        match self {
            SockAddr::Unix(addr) => Some(addr),
            _ => None,
        }
    }
}

impl From<SocketAddr> for SockAddr {
    fn from(addr: SocketAddr) -> SockAddr {
        match addr {
            SocketAddr::V4(addr) => SockAddr::V4(addr.into()),
            SocketAddr::V6(addr) => SockAddr::V6(addr.into()),
        }
    }
}

impl From<InetAddr> for SockAddr {
    fn from(addr: InetAddr) -> SockAddr {
        SockAddr::V4(addr)
    }
}

impl From<Inet6Addr> for SockAddr {
    fn from(addr: Inet6Addr) -> SockAddr {
        SockAddr::V6(addr)
    }
}

impl From<UnixAddr> for SockAddr {
    fn from(addr: UnixAddr) -> SockAddr {
        SockAddr::Unix(addr)
    }
}

impl From<LinkAddr> for SockAddr {
    fn from(addr: LinkAddr) -> SockAddr {
        SockAddr::Packet(addr)
    }
}

/// IPv4 socket address.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct InetAddr {
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl InetAddr {
    pub const fn new(ip: Ipv4Addr, port: u16) -> InetAddr {
        InetAddr { ip, port }
    }
}

impl From<SocketAddrV4> for InetAddr {
    fn from(addr: SocketAddrV4) -> InetAddr {
        InetAddr::new(*addr.ip(), addr.port())
    }
}

impl From<InetAddr> for SocketAddrV4 {
    fn from(addr: InetAddr) -> SocketAddrV4 {
        SocketAddrV4::new(addr.ip, addr.port)
    }
}

/// IPv6 socket address.
///
/// Flow information is not part of the mid-layer address and is dropped
/// when converting from a [`SocketAddrV6`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Inet6Addr {
    pub ip: Ipv6Addr,
    pub port: u16,
    pub scope_id: u32,
}

impl Inet6Addr {
    pub const fn new(ip: Ipv6Addr, port: u16, scope_id: u32) -> Inet6Addr {
        Inet6Addr { ip, port, scope_id }
    }
}

impl From<SocketAddrV6> for Inet6Addr {
    fn from(addr: SocketAddrV6) -> Inet6Addr {
        Inet6Addr::new(*addr.ip(), addr.port(), addr.scope_id())
    }
}

impl From<Inet6Addr> for SocketAddrV6 {
    fn from(addr: Inet6Addr) -> SocketAddrV6 {
        SocketAddrV6::new(addr.ip, addr.port, 0, addr.scope_id)
    }
}

/// Unix-domain socket address.
///
/// Holds up to [`UNIX_PATH_MAX`] bytes. An empty path is an unnamed
/// address; a path starting with a null byte is an abstract name (Linux).
#[derive(Copy, Clone)]
pub struct UnixAddr {
    path: [u8; UNIX_PATH_MAX],
    len: u8,
}

impl UnixAddr {
    /// Creates an address from the raw path bytes, without a null
    /// terminator.
    ///
    /// Fails with [`Error::AddrLenMismatch`] if `path` is longer than
    /// [`UNIX_PATH_MAX`].
    pub fn new(path: &[u8]) -> Result<UnixAddr> {
        if path.len() > UNIX_PATH_MAX {
            return Err(Error::AddrLenMismatch {
                family: Family::Unix,
                expected: UNIX_PATH_MAX,
                actual: path.len(),
            });
        }
        let mut addr = UnixAddr::unnamed();
        addr.path[..path.len()].copy_from_slice(path);
        addr.len = path.len() as u8;
        Ok(addr)
    }

    /// Creates an address from a filesystem path.
    pub fn from_pathname<P: AsRef<Path>>(path: P) -> Result<UnixAddr> {
        UnixAddr::new(path.as_ref().as_os_str().as_bytes())
    }

    /// Creates an unnamed address.
    pub const fn unnamed() -> UnixAddr {
        UnixAddr {
            path: [0; UNIX_PATH_MAX],
            len: 0,
        }
    }

    /// Returns the raw path bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.path[..self.len as usize]
    }

    /// Returns the filesystem path, if this is a pathname address.
    pub fn as_pathname(&self) -> Option<&Path> {
        match self.as_bytes().first() {
            Some(0) | None => None,
            Some(_) => Some(Path::new(std::ffi::OsStr::from_bytes(self.as_bytes()))),
        }
    }

    pub fn is_unnamed(&self) -> bool {
        self.len == 0
    }

    pub fn is_abstract(&self) -> bool {
        self.as_bytes().first() == Some(&0)
    }
}

impl PartialEq for UnixAddr {
    fn eq(&self, other: &UnixAddr) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for UnixAddr {}

impl std::hash::Hash for UnixAddr {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state)
    }
}

impl fmt::Debug for UnixAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unnamed() {
            write!(f, "(unnamed)")
        } else if let Some(path) = self.as_pathname() {
            write!(f, "{:?} (pathname)", path)
        } else {
            let name = String::from_utf8_lossy(&self.as_bytes()[1..]);
            write!(f, "\"{}\" (abstract)", name)
        }
    }
}

/// Link-layer socket address (`AF_PACKET`).
#[derive(Copy, Clone)]
pub struct LinkAddr {
    /// Physical-layer protocol, in host byte order.
    pub protocol: u16,
    /// Interface index.
    pub ifindex: i32,
    /// ARP hardware type.
    pub hatype: u16,
    /// Packet type.
    pub pkttype: u8,
    addr: [u8; LINK_ADDR_MAX],
    halen: u8,
}

impl LinkAddr {
    /// Creates a link-layer address.
    ///
    /// Fails with [`Error::AddrLenMismatch`] if `hw_addr` is longer than
    /// [`LINK_ADDR_MAX`].
    pub fn new(protocol: u16, ifindex: i32, hw_addr: &[u8]) -> Result<LinkAddr> {
        if hw_addr.len() > LINK_ADDR_MAX {
            return Err(Error::AddrLenMismatch {
                family: Family::Packet,
                expected: LINK_ADDR_MAX,
                actual: hw_addr.len(),
            });
        }
        let mut addr = [0; LINK_ADDR_MAX];
        addr[..hw_addr.len()].copy_from_slice(hw_addr);
        Ok(LinkAddr {
            protocol,
            ifindex,
            hatype: 0,
            pkttype: 0,
            addr,
            halen: hw_addr.len() as u8,
        })
    }

    /// Returns the hardware address.
    pub fn hw_addr(&self) -> &[u8] {
        &self.addr[..self.halen as usize]
    }
}

impl PartialEq for LinkAddr {
    fn eq(&self, other: &LinkAddr) -> bool {
        self.protocol == other.protocol
            && self.ifindex == other.ifindex
            && self.hatype == other.hatype
            && self.pkttype == other.pkttype
            && self.hw_addr() == other.hw_addr()
    }
}

impl Eq for LinkAddr {}

impl std::hash::Hash for LinkAddr {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.protocol.hash(state);
        self.ifindex.hash(state);
        self.hatype.hash(state);
        self.pkttype.hash(state);
        self.hw_addr().hash(state);
    }
}

impl fmt::Debug for LinkAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkAddr")
            .field("protocol", &format_args!("{:#06x}", self.protocol))
            .field("ifindex", &self.ifindex)
            .field("hatype", &self.hatype)
            .field("pkttype", &self.pkttype)
            .field("hw_addr", &self.hw_addr())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, SocketAddr};

    use super::{Family, LinkAddr, SockAddr, UnixAddr, UNIX_PATH_MAX};
    use crate::error::Error;

    #[test]
    fn family_codes() {
        for family in [
            Family::Unspec,
            Family::Inet,
            Family::Inet6,
            Family::Packet,
            Family::Unix,
        ] {
            assert_eq!(Family::from_code(family.code()), Ok(family));
        }
        assert_eq!(Family::from_code(4), Err(Error::UnsupportedFamily(4)));
    }

    #[test]
    fn unix_path_bound() {
        assert!(UnixAddr::new(&[b'a'; UNIX_PATH_MAX]).is_ok());
        assert_eq!(
            UnixAddr::new(&[b'a'; UNIX_PATH_MAX + 1]),
            Err(Error::AddrLenMismatch {
                family: Family::Unix,
                expected: UNIX_PATH_MAX,
                actual: UNIX_PATH_MAX + 1,
            })
        );
    }

    #[test]
    fn unix_kinds() {
        let addr = UnixAddr::from_pathname("/tmp/sock").unwrap();
        assert_eq!(addr.as_pathname().unwrap().to_str(), Some("/tmp/sock"));
        assert!(!addr.is_abstract());

        let addr = UnixAddr::new(b"\0name").unwrap();
        assert!(addr.is_abstract());
        assert!(addr.as_pathname().is_none());

        assert!(UnixAddr::unnamed().is_unnamed());
    }

    #[test]
    fn link_addr_bound() {
        let addr = LinkAddr::new(0x0806, 2, &[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(addr.hw_addr(), &[1, 2, 3, 4, 5, 6]);
        assert!(matches!(
            LinkAddr::new(0x0806, 2, &[0; 9]),
            Err(Error::AddrLenMismatch { expected: 8, actual: 9, .. })
        ));
    }

    #[test]
    fn from_std() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let sockaddr = SockAddr::from(addr);
        assert_eq!(sockaddr.family(), Family::Inet);
        match sockaddr {
            SockAddr::V4(v4) => {
                assert_eq!(v4.ip, Ipv4Addr::LOCALHOST);
                assert_eq!(v4.port, 8080);
            }
            _ => panic!("unexpected address: {:?}", sockaddr),
        }
        assert_eq!(sockaddr.as_socket(), Some(addr));
    }
}
