//! Socket operations.
//!
//! Every function translates its mid-layer arguments, calls the host
//! primitive and translates the results back. Descriptors are plain
//! [`RawFd`]s; the adapter never closes them, that's up to the caller.
//!
//! Translation failures are reported before the host is called. Host
//! failures are returned as [`Error::Host`] and produce no output.

use std::io::{IoSlice, IoSliceMut};
use std::mem;
use std::os::fd::RawFd;

use libc::{c_int, c_void, socklen_t};
use log::trace;

use crate::addr::native::{from_native, to_native, zeroed_storage};
use crate::addr::{Family, SockAddr};
use crate::error::{Error, Result};
use crate::flags::{MsgFlags, OFlags};
use crate::msg::{self, HostRecv, RecvMeta, RecvMsg, SendMsg};
use crate::sockopt::{self, OptValue, SockOpt};

/// Mid-layer socket type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum SockType {
    /// Stream socket.
    Stream = 1,
    /// Datagram socket.
    Dgram = 2,
    /// Raw socket.
    Raw = 3,
}

impl SockType {
    /// Returns the mid-layer numeric value.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Parses a mid-layer numeric value.
    pub fn from_code(code: i32) -> Option<SockType> {
        match code {
            1 => Some(SockType::Stream),
            2 => Some(SockType::Dgram),
            3 => Some(SockType::Raw),
            _ => None,
        }
    }

    pub(crate) fn to_host(self) -> c_int {
        match self {
            SockType::Stream => libc::SOCK_STREAM,
            SockType::Dgram => libc::SOCK_DGRAM,
            SockType::Raw => libc::SOCK_RAW,
        }
    }

    pub(crate) fn from_host(ty: c_int) -> Option<SockType> {
        match ty {
            libc::SOCK_STREAM => Some(SockType::Stream),
            libc::SOCK_DGRAM => Some(SockType::Dgram),
            libc::SOCK_RAW => Some(SockType::Raw),
            _ => None,
        }
    }
}

/// Protocol number.
///
/// IP protocols use the IANA numbers, which the host shares. For
/// [`Family::Packet`] sockets the value is an Ethernet protocol, e.g.
/// [`Protocol::ETH_P_ALL`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Protocol(pub i32);

impl Protocol {
    /// Default protocol for the socket type.
    pub const IP: Protocol = Protocol(0);
    pub const ICMP: Protocol = Protocol(1);
    pub const IGMP: Protocol = Protocol(2);
    /// Every packet, for link-layer sockets.
    pub const ETH_P_ALL: Protocol = Protocol(3);
    pub const IPIP: Protocol = Protocol(4);
    pub const TCP: Protocol = Protocol(6);
    pub const UDP: Protocol = Protocol(17);
    pub const IPV6: Protocol = Protocol(41);
    pub const ICMPV6: Protocol = Protocol(58);
    pub const RAW: Protocol = Protocol(255);

    /// Returns the host protocol value for a socket of `family`.
    pub(crate) fn to_host(self, family: Family) -> c_int {
        match family {
            // Link-layer sockets take the protocol in network byte order.
            Family::Packet => (self.0 as u16).to_be() as c_int,
            _ => self.0,
        }
    }
}

/// Creates a socket, returning the new descriptor.
///
/// The descriptor is created with the close-on-exec flag set.
pub fn socket(family: Family, ty: SockType, protocol: Protocol) -> Result<RawFd> {
    if family == Family::Unspec {
        return Err(Error::UnsupportedFamily(family.code()));
    }
    let domain = family.to_host()?;
    let proto = protocol.to_host(family);

    #[cfg(any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "illumos",
        target_os = "linux",
        target_os = "netbsd",
        target_os = "openbsd",
    ))]
    let fd = syscall!(socket(domain, ty.to_host() | libc::SOCK_CLOEXEC, proto))?;

    #[cfg(not(any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "illumos",
        target_os = "linux",
        target_os = "netbsd",
        target_os = "openbsd",
    )))]
    let fd = {
        let fd = syscall!(socket(domain, ty.to_host(), proto))?;
        // Don't leak the descriptor if setting the flag fails.
        if let Err(err) = syscall!(fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC)) {
            let _ = unsafe { libc::close(fd) };
            return Err(err.into());
        }
        fd
    };

    trace!(
        "created socket; fd={}, family={:?}, type={:?}, protocol={}",
        fd,
        family,
        ty,
        protocol.0
    );
    Ok(fd)
}

/// Binds `fd` to `addr`.
pub fn bind(fd: RawFd, addr: &SockAddr) -> Result<()> {
    let (storage, len) = to_native(addr)?;
    syscall!(bind(fd, (&storage as *const libc::sockaddr_storage).cast(), len))?;
    Ok(())
}

/// Connects `fd` to `addr`.
///
/// Connecting a datagram socket to [`SockAddr::Unspecified`] dissolves its
/// association.
pub fn connect(fd: RawFd, addr: &SockAddr) -> Result<()> {
    let (storage, len) = to_native(addr)?;
    syscall!(connect(fd, (&storage as *const libc::sockaddr_storage).cast(), len))?;
    Ok(())
}

/// Marks `fd` as accepting connections.
pub fn listen(fd: RawFd, backlog: i32) -> Result<()> {
    syscall!(listen(fd, backlog))?;
    Ok(())
}

/// Accepts a connection on `fd`, returning the new descriptor and the
/// address of the peer.
///
/// The new descriptor is created with the close-on-exec flag set.
pub fn accept(fd: RawFd) -> Result<(RawFd, SockAddr)> {
    let mut storage = zeroed_storage();
    let mut len = mem::size_of::<libc::sockaddr_storage>() as socklen_t;
    let addr_ptr = (&mut storage as *mut libc::sockaddr_storage).cast::<libc::sockaddr>();

    #[cfg(any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "illumos",
        target_os = "linux",
        target_os = "netbsd",
        target_os = "openbsd",
    ))]
    let conn = syscall!(accept4(fd, addr_ptr, &mut len, libc::SOCK_CLOEXEC))?;

    #[cfg(not(any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "illumos",
        target_os = "linux",
        target_os = "netbsd",
        target_os = "openbsd",
    )))]
    let conn = {
        let conn = syscall!(accept(fd, addr_ptr, &mut len))?;
        if let Err(err) = syscall!(fcntl(conn, libc::F_SETFD, libc::FD_CLOEXEC)) {
            let _ = unsafe { libc::close(conn) };
            return Err(err.into());
        }
        conn
    };

    match from_native(&storage, len) {
        Ok(addr) => Ok((conn, addr)),
        Err(err) => {
            // The caller never learns about the descriptor, so it's ours to
            // close.
            let _ = unsafe { libc::close(conn) };
            Err(err)
        }
    }
}

/// Sends `buf` on `fd`, to `addr` if given.
///
/// Returns the number of bytes sent.
pub fn send_to(fd: RawFd, buf: &[u8], flags: MsgFlags, addr: Option<&SockAddr>) -> Result<usize> {
    let bufs = [IoSlice::new(buf)];
    let mut msg = SendMsg::new(&bufs);
    if let Some(addr) = addr {
        msg = msg.with_addr(addr);
    }
    send_msg(fd, &msg, flags)
}

/// Sends a scatter-gather message on `fd`.
///
/// Returns the number of bytes sent.
pub fn send_msg(fd: RawFd, msg: &SendMsg<'_>, flags: MsgFlags) -> Result<usize> {
    let mut host = msg::translate_send(msg)?;
    let hdr = host.header();
    let n = syscall!(sendmsg(fd, &hdr, send_flags(flags)))? as usize;
    debug_assert!(n <= msg.len());
    Ok(n)
}

/// Send flags as passed to the host, shared by all send variants.
fn send_flags(flags: MsgFlags) -> c_int {
    // Broken connections are reported as `EPIPE`, never as a signal.
    #[cfg(any(target_os = "android", target_os = "linux"))]
    let flags = flags.to_host() | libc::MSG_NOSIGNAL;
    #[cfg(not(any(target_os = "android", target_os = "linux")))]
    let flags = flags.to_host();
    flags
}

/// Receives data on `fd` into `buf`.
///
/// Returns the number of bytes received and the source address, if the
/// host reported one (connected stream sockets don't).
pub fn recv_from(fd: RawFd, buf: &mut [u8], flags: MsgFlags) -> Result<(usize, Option<SockAddr>)> {
    let mut bufs = [IoSliceMut::new(buf)];
    let meta = recv_msg(fd, &mut RecvMsg::new(&mut bufs), flags)?;
    Ok((meta.len, meta.addr))
}

/// Receives a scatter-gather message on `fd`.
///
/// With [`MsgFlags::TRUNC`] the returned length is the real length of the
/// datagram, which may exceed the buffers.
pub fn recv_msg(fd: RawFd, msg: &mut RecvMsg<'_, '_>, flags: MsgFlags) -> Result<RecvMeta> {
    let mut host = HostRecv::new();
    let mut hdr = host.header(msg);
    let n = syscall!(recvmsg(fd, &mut hdr, flags.to_host()))? as usize;
    let meta = host.finish(&hdr, n);
    debug_assert!(flags.contains(MsgFlags::TRUNC) || meta.len <= msg.capacity());
    Ok(meta)
}

/// Returns the local address of `fd`.
pub fn local_addr(fd: RawFd) -> Result<SockAddr> {
    let mut storage = zeroed_storage();
    let mut len = mem::size_of::<libc::sockaddr_storage>() as socklen_t;
    syscall!(getsockname(
        fd,
        (&mut storage as *mut libc::sockaddr_storage).cast(),
        &mut len,
    ))?;
    from_native(&storage, len)
}

/// Returns the address of the peer `fd` is connected to.
pub fn peer_addr(fd: RawFd) -> Result<SockAddr> {
    let mut storage = zeroed_storage();
    let mut len = mem::size_of::<libc::sockaddr_storage>() as socklen_t;
    syscall!(getpeername(
        fd,
        (&mut storage as *mut libc::sockaddr_storage).cast(),
        &mut len,
    ))?;
    from_native(&storage, len)
}

/// Reads a socket option.
pub fn getsockopt(fd: RawFd, opt: SockOpt) -> Result<OptValue> {
    sockopt::get(fd, opt)
}

/// Sets a socket option.
pub fn setsockopt(fd: RawFd, opt: SockOpt, value: OptValue) -> Result<()> {
    sockopt::set(fd, opt, value)
}

/// Returns the number of bytes that can be read from `fd` without blocking.
pub fn available(fd: RawFd) -> Result<usize> {
    let mut avail: c_int = 0;
    syscall!(ioctl(fd, libc::FIONREAD, &mut avail as *mut c_int as *mut c_void))?;
    Ok(avail as usize)
}

/// Duplicates `fd`.
pub fn dup(fd: RawFd) -> Result<RawFd> {
    Ok(syscall!(dup(fd))?)
}

/// Returns the status flags of `fd`.
pub fn fcntl_getfl(fd: RawFd) -> Result<OFlags> {
    syscall!(fcntl(fd, libc::F_GETFL))
        .map(OFlags::from_host)
        .map_err(Error::from)
}

/// Sets the status flags of `fd`.
pub fn fcntl_setfl(fd: RawFd, flags: OFlags) -> Result<()> {
    syscall!(fcntl(fd, libc::F_SETFL, flags.to_host()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Protocol, SockType};
    use crate::addr::Family;

    #[test]
    fn sock_type_codes() {
        for ty in [SockType::Stream, SockType::Dgram, SockType::Raw] {
            assert_eq!(SockType::from_code(ty.code()), Some(ty));
            assert_eq!(SockType::from_host(ty.to_host()), Some(ty));
        }
        assert_eq!(SockType::from_code(0), None);
    }

    #[test]
    fn packet_protocol_byte_order() {
        assert_eq!(
            Protocol::ETH_P_ALL.to_host(Family::Packet),
            (3u16).to_be() as libc::c_int
        );
        assert_eq!(Protocol::UDP.to_host(Family::Inet), libc::IPPROTO_UDP);
        assert_eq!(Protocol::TCP.to_host(Family::Inet6), libc::IPPROTO_TCP);
    }
}
