//! Conversion between [`SockAddr`] and the host's socket address structures.
//!
//! This is the only place host byte order is dealt with.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::{mem, ptr};

use super::{Family, Inet6Addr, InetAddr, SockAddr, UnixAddr};
use crate::error::{Error, Result};

/// Get the `sun_path` field offset of `sockaddr_un` for the target OS.
///
/// On Linux, this function equates to the same value as
/// `size_of::<sa_family_t>()`, but some other implementations include
/// other fields before `sun_path`, so the expression more portably
/// describes the size of the address structure.
pub(crate) fn path_offset(sockaddr: &libc::sockaddr_un) -> usize {
    let base = sockaddr as *const _ as usize;
    let path = &sockaddr.sun_path as *const _ as usize;
    path - base
}

/// Returns a zeroed `sockaddr_storage`.
pub(crate) fn zeroed_storage() -> libc::sockaddr_storage {
    // SAFETY: `libc::sockaddr_storage` zero filled is properly initialized,
    // `0` is `AF_UNSPEC`.
    unsafe { mem::zeroed() }
}

/// Converts `addr` into the host representation.
pub(crate) fn to_native(addr: &SockAddr) -> Result<(libc::sockaddr_storage, libc::socklen_t)> {
    let mut storage = zeroed_storage();
    let len = match addr {
        SockAddr::Unspecified => {
            storage.ss_family = libc::AF_UNSPEC as libc::sa_family_t;
            mem::size_of::<libc::sa_family_t>()
        }
        SockAddr::V4(addr) => {
            // SAFETY: `sockaddr_storage` is large enough and suitably
            // aligned for every `sockaddr_*` type.
            let sin = unsafe { &mut *(&mut storage as *mut _ as *mut libc::sockaddr_in) };
            sin.sin_family = libc::AF_INET as libc::sa_family_t;
            sin.sin_port = addr.port.to_be();
            sin.sin_addr = libc::in_addr {
                s_addr: u32::from_ne_bytes(addr.ip.octets()),
            };
            #[cfg(any(
                target_os = "dragonfly",
                target_os = "freebsd",
                target_os = "netbsd",
                target_os = "openbsd",
                target_vendor = "apple",
            ))]
            {
                sin.sin_len = mem::size_of::<libc::sockaddr_in>() as u8;
            }
            mem::size_of::<libc::sockaddr_in>()
        }
        SockAddr::V6(addr) => {
            // SAFETY: see above.
            let sin6 = unsafe { &mut *(&mut storage as *mut _ as *mut libc::sockaddr_in6) };
            sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
            sin6.sin6_port = addr.port.to_be();
            sin6.sin6_addr = libc::in6_addr {
                s6_addr: addr.ip.octets(),
            };
            sin6.sin6_scope_id = addr.scope_id;
            #[cfg(any(
                target_os = "dragonfly",
                target_os = "freebsd",
                target_os = "netbsd",
                target_os = "openbsd",
                target_vendor = "apple",
            ))]
            {
                sin6.sin6_len = mem::size_of::<libc::sockaddr_in6>() as u8;
            }
            mem::size_of::<libc::sockaddr_in6>()
        }
        SockAddr::Unix(addr) => {
            // SAFETY: see above.
            let sun = unsafe { &mut *(&mut storage as *mut _ as *mut libc::sockaddr_un) };
            sun.sun_family = libc::AF_UNIX as libc::sa_family_t;
            let path = addr.as_bytes();
            if path.len() > sun.sun_path.len() {
                return Err(Error::AddrLenMismatch {
                    family: Family::Unix,
                    expected: sun.sun_path.len(),
                    actual: path.len(),
                });
            }
            // SAFETY: `path` and `sun_path` don't overlap and the length was
            // checked above. The null terminator, if there is room for one,
            // is already written as the storage is zeroed.
            unsafe {
                ptr::copy_nonoverlapping(
                    path.as_ptr(),
                    sun.sun_path.as_mut_ptr().cast::<u8>(),
                    path.len(),
                )
            };
            let mut len = path_offset(sun) + path.len();
            // +1 for the null byte at the end of a pathname, not needed for
            // abstract names (which start with a null byte).
            match path.first() {
                Some(&0) | None => {}
                Some(_) if path.len() < sun.sun_path.len() => len += 1,
                Some(_) => {}
            }
            len
        }
        #[cfg(any(target_os = "android", target_os = "linux"))]
        SockAddr::Packet(addr) => {
            // SAFETY: see above.
            let sll = unsafe { &mut *(&mut storage as *mut _ as *mut libc::sockaddr_ll) };
            let hw_addr = addr.hw_addr();
            sll.sll_family = libc::AF_PACKET as libc::c_ushort;
            sll.sll_protocol = addr.protocol.to_be();
            sll.sll_ifindex = addr.ifindex;
            sll.sll_hatype = addr.hatype;
            sll.sll_pkttype = addr.pkttype;
            sll.sll_halen = hw_addr.len() as u8;
            sll.sll_addr[..hw_addr.len()].copy_from_slice(hw_addr);
            mem::size_of::<libc::sockaddr_ll>()
        }
        #[cfg(not(any(target_os = "android", target_os = "linux")))]
        SockAddr::Packet(_) => return Err(Error::UnsupportedFamily(Family::Packet.code())),
    };
    Ok((storage, len as libc::socklen_t))
}

/// Converts a host address of `len` bytes into a [`SockAddr`].
pub(crate) fn from_native(
    storage: &libc::sockaddr_storage,
    len: libc::socklen_t,
) -> Result<SockAddr> {
    // Never look past the storage, whatever the host claims.
    let len = (len as usize).min(mem::size_of::<libc::sockaddr_storage>());
    if len < mem::size_of::<libc::sa_family_t>() {
        // E.g. `accept(2)` on an unnamed Unix socket on some platforms.
        return Ok(SockAddr::Unspecified);
    }
    let family = Family::from_host(storage.ss_family as libc::c_int)?;
    let expect = |expected: usize| {
        if len < expected {
            Err(Error::AddrLenMismatch {
                family,
                expected,
                actual: len,
            })
        } else {
            Ok(())
        }
    };

    match family {
        Family::Unspec => Ok(SockAddr::Unspecified),
        Family::Inet => {
            expect(mem::size_of::<libc::sockaddr_in>())?;
            // SAFETY: the family and length were checked above.
            let sin = unsafe { &*(storage as *const _ as *const libc::sockaddr_in) };
            Ok(SockAddr::V4(InetAddr::new(
                Ipv4Addr::from(sin.sin_addr.s_addr.to_ne_bytes()),
                u16::from_be(sin.sin_port),
            )))
        }
        Family::Inet6 => {
            expect(mem::size_of::<libc::sockaddr_in6>())?;
            // SAFETY: the family and length were checked above.
            let sin6 = unsafe { &*(storage as *const _ as *const libc::sockaddr_in6) };
            Ok(SockAddr::V6(Inet6Addr::new(
                Ipv6Addr::from(sin6.sin6_addr.s6_addr),
                u16::from_be(sin6.sin6_port),
                sin6.sin6_scope_id,
            )))
        }
        Family::Unix => {
            // SAFETY: the family was checked above, `sun_path` is only read
            // up to `len`.
            let sun = unsafe { &*(storage as *const _ as *const libc::sockaddr_un) };
            let offset = path_offset(sun);
            let path_len = len.saturating_sub(offset).min(sun.sun_path.len());
            // SAFETY: going from `c_char` to `u8` is fine in this context.
            let mut path = unsafe {
                &*(&sun.sun_path[..path_len] as *const [libc::c_char] as *const [u8])
            };
            // On FreeBSD and Darwin an unnamed address comes back as an all
            // zero path of non-zero length. Linux leaves the path out, and an
            // all zero path there is an abstract name.
            if cfg!(not(any(target_os = "android", target_os = "linux")))
                && path.iter().all(|b| *b == 0)
            {
                path = &[];
            } else if path.first().map_or(false, |b| *b != 0) {
                // Pathname, drop the null terminator and anything after it.
                if let Some(nul) = path.iter().position(|b| *b == 0) {
                    path = &path[..nul];
                }
            }
            UnixAddr::new(path).map(SockAddr::Unix)
        }
        #[cfg(any(target_os = "android", target_os = "linux"))]
        Family::Packet => {
            // `sll_addr` is fixed size, `sll_halen` describes its use.
            expect(mem::size_of::<libc::sockaddr_ll>() - 8)?;
            // SAFETY: the family and length were checked above.
            let sll = unsafe { &*(storage as *const _ as *const libc::sockaddr_ll) };
            let halen = (sll.sll_halen as usize).min(sll.sll_addr.len());
            let mut addr = super::LinkAddr::new(
                u16::from_be(sll.sll_protocol),
                sll.sll_ifindex,
                &sll.sll_addr[..halen],
            )?;
            addr.hatype = sll.sll_hatype;
            addr.pkttype = sll.sll_pkttype;
            Ok(SockAddr::Packet(addr))
        }
        #[cfg(not(any(target_os = "android", target_os = "linux")))]
        Family::Packet => Err(Error::UnsupportedFamily(family.code())),
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};

    use super::{from_native, path_offset, to_native};
    use crate::addr::{Inet6Addr, InetAddr, SockAddr, UnixAddr};
    use crate::error::Error;

    #[test]
    fn inet_host_layout() {
        let addr = SockAddr::V4(InetAddr::new(Ipv4Addr::new(127, 0, 0, 1), 8080));
        let (storage, len) = to_native(&addr).unwrap();
        assert_eq!(len as usize, std::mem::size_of::<libc::sockaddr_in>());
        assert_eq!(storage.ss_family as libc::c_int, libc::AF_INET);
        let sin = unsafe { &*(&storage as *const _ as *const libc::sockaddr_in) };
        assert_eq!(sin.sin_port.to_ne_bytes(), [0x1F, 0x90]);
        assert_eq!(sin.sin_addr.s_addr.to_ne_bytes(), [127, 0, 0, 1]);
        assert_eq!(from_native(&storage, len), Ok(addr));
    }

    #[test]
    fn inet6_round_trip() {
        let addr = SockAddr::V6(Inet6Addr::new(Ipv6Addr::LOCALHOST, 9000, 3));
        let (storage, len) = to_native(&addr).unwrap();
        assert_eq!(from_native(&storage, len), Ok(addr));
    }

    #[test]
    fn pathname_address() {
        const PATH: &str = "./foo/bar.txt";
        const PATH_LEN: usize = 13;

        // Pathname addresses do have a null terminator, so `socklen` is
        // expected to be `PATH_LEN` + `offset` + 1.
        let address = SockAddr::Unix(UnixAddr::from_pathname(PATH).unwrap());
        let (storage, actual) = to_native(&address).unwrap();
        let sun = unsafe { &*(&storage as *const _ as *const libc::sockaddr_un) };
        let offset = path_offset(sun);
        assert_eq!((PATH_LEN + offset + 1) as libc::socklen_t, actual);
        assert_eq!(from_native(&storage, actual), Ok(address));
    }

    #[test]
    fn abstract_address() {
        const PATH: &[u8] = &[0, 116, 111, 107, 105, 111];

        // Abstract addresses do not have a null terminator, so `socklen` is
        // expected to be `PATH.len()` + `offset`.
        let address = SockAddr::Unix(UnixAddr::new(PATH).unwrap());
        let (storage, actual) = to_native(&address).unwrap();
        let sun = unsafe { &*(&storage as *const _ as *const libc::sockaddr_un) };
        assert_eq!((PATH.len() + path_offset(sun)) as libc::socklen_t, actual);
        assert_eq!(from_native(&storage, actual), Ok(address));
    }

    #[test]
    #[cfg(any(target_os = "android", target_os = "linux"))]
    fn abstract_address_of_nul_bytes() {
        for path in [&b"\0"[..], b"\0\0", b"\0\0\0", &[0; 64]] {
            let address = SockAddr::Unix(UnixAddr::new(path).unwrap());
            let (storage, len) = to_native(&address).unwrap();
            assert_eq!(from_native(&storage, len), Ok(address), "{:?}", path);
        }
    }

    #[test]
    fn unnamed_address() {
        let address = SockAddr::Unix(UnixAddr::unnamed());
        let (storage, len) = to_native(&address).unwrap();
        assert_eq!(from_native(&storage, len), Ok(address));
    }

    #[test]
    fn short_host_length() {
        let addr = SockAddr::V4(InetAddr::new(Ipv4Addr::LOCALHOST, 1));
        let (storage, _) = to_native(&addr).unwrap();
        assert!(matches!(
            from_native(&storage, 4),
            Err(Error::AddrLenMismatch { .. })
        ));
    }

    #[test]
    #[cfg(any(target_os = "android", target_os = "linux"))]
    fn link_layer_round_trip() {
        let mut link = crate::addr::LinkAddr::new(0x88cc, 2, &[2, 0, 0, 0, 0, 1]).unwrap();
        link.pkttype = 1;
        let addr = SockAddr::Packet(link);
        let (storage, len) = to_native(&addr).unwrap();
        let sll = unsafe { &*(&storage as *const _ as *const libc::sockaddr_ll) };
        assert_eq!(sll.sll_protocol.to_ne_bytes(), [0x88, 0xcc]);
        assert_eq!(from_native(&storage, len), Ok(addr));
    }
}
