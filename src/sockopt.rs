//! Socket option translation.
//!
//! Options are addressed by the typed [`SockOpt`] enum, which is translated
//! from the mid-layer `(level, name)` namespace by [`SockOpt::from_mid`].
//! Values travel as [`OptValue`] and are converted to the host encoding
//! (`c_int`, `linger`, `timeval`) only when calling the host.

use std::os::fd::RawFd;
use std::time::Duration;
use std::{mem, ptr};

use libc::{c_int, c_void, socklen_t};

use crate::errno::Errno;
use crate::error::{Error, Result};
use crate::socket::SockType;

/// Mid-layer `SOL_SOCKET` level.
pub const SOL_SOCKET: i32 = 1;
/// Mid-layer `IPPROTO_TCP` level.
pub const IPPROTO_TCP: i32 = 6;
/// Mid-layer `IPPROTO_IPV6` level.
pub const IPPROTO_IPV6: i32 = 41;

/// A socket option understood by the adapter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum SockOpt {
    /// `SO_REUSEADDR`, a [`OptValue::Bool`].
    ReuseAddr,
    /// `SO_TYPE`, read only, a [`OptValue::Type`].
    Type,
    /// `SO_ERROR`, read only, a [`OptValue::Error`].
    Error,
    /// `SO_SNDBUF`, a [`OptValue::Int`].
    SndBuf,
    /// `SO_RCVBUF`, a [`OptValue::Int`].
    RcvBuf,
    /// `SO_KEEPALIVE`, a [`OptValue::Bool`].
    KeepAlive,
    /// `SO_LINGER`, a [`OptValue::Linger`].
    Linger,
    /// `SO_REUSEPORT`, a [`OptValue::Bool`].
    ReusePort,
    /// `SO_RCVTIMEO`, a [`OptValue::Timeout`].
    RcvTimeout,
    /// `SO_SNDTIMEO`, a [`OptValue::Timeout`].
    SndTimeout,
    /// `TCP_NODELAY`, a [`OptValue::Bool`].
    TcpNoDelay,
    /// `TCP_KEEPIDLE`, a [`OptValue::Int`] in seconds.
    TcpKeepIdle,
    /// `TCP_KEEPINTVL`, a [`OptValue::Int`] in seconds.
    TcpKeepIntvl,
    /// `TCP_KEEPCNT`, a [`OptValue::Int`].
    TcpKeepCnt,
    /// `IPV6_V6ONLY`, a [`OptValue::Bool`].
    Ipv6V6Only,
}

/// (option, mid-layer level, mid-layer name).
static MID_OPTS: &[(SockOpt, i32, i32)] = &[
    (SockOpt::ReuseAddr, SOL_SOCKET, 2),
    (SockOpt::Type, SOL_SOCKET, 3),
    (SockOpt::Error, SOL_SOCKET, 4),
    (SockOpt::SndBuf, SOL_SOCKET, 7),
    (SockOpt::RcvBuf, SOL_SOCKET, 8),
    (SockOpt::KeepAlive, SOL_SOCKET, 9),
    (SockOpt::Linger, SOL_SOCKET, 13),
    (SockOpt::ReusePort, SOL_SOCKET, 15),
    (SockOpt::RcvTimeout, SOL_SOCKET, 20),
    (SockOpt::SndTimeout, SOL_SOCKET, 21),
    (SockOpt::TcpNoDelay, IPPROTO_TCP, 1),
    (SockOpt::TcpKeepIdle, IPPROTO_TCP, 2),
    (SockOpt::TcpKeepIntvl, IPPROTO_TCP, 3),
    (SockOpt::TcpKeepCnt, IPPROTO_TCP, 4),
    (SockOpt::Ipv6V6Only, IPPROTO_IPV6, 26),
];

impl SockOpt {
    /// Translates a mid-layer `(level, name)` pair.
    ///
    /// Unknown options fail with `ENOPROTOOPT` without reaching the host.
    pub fn from_mid(level: i32, name: i32) -> Result<SockOpt> {
        MID_OPTS
            .iter()
            .find(|(_, l, n)| *l == level && *n == name)
            .map(|(opt, _, _)| *opt)
            .ok_or(Error::Host(Errno::NoProtoOpt))
    }

    /// Returns the mid-layer `(level, name)` pair.
    pub fn to_mid(self) -> (i32, i32) {
        MID_OPTS
            .iter()
            .find(|(opt, _, _)| *opt == self)
            .map(|(_, level, name)| (*level, *name))
            // Every variant has a table entry.
            .unwrap_or((0, 0))
    }

    /// Returns the host `(level, name)` pair.
    fn to_host(self) -> (c_int, c_int) {
        match self {
            SockOpt::ReuseAddr => (libc::SOL_SOCKET, libc::SO_REUSEADDR),
            SockOpt::Type => (libc::SOL_SOCKET, libc::SO_TYPE),
            SockOpt::Error => (libc::SOL_SOCKET, libc::SO_ERROR),
            SockOpt::SndBuf => (libc::SOL_SOCKET, libc::SO_SNDBUF),
            SockOpt::RcvBuf => (libc::SOL_SOCKET, libc::SO_RCVBUF),
            SockOpt::KeepAlive => (libc::SOL_SOCKET, libc::SO_KEEPALIVE),
            SockOpt::Linger => (libc::SOL_SOCKET, libc::SO_LINGER),
            SockOpt::ReusePort => (libc::SOL_SOCKET, libc::SO_REUSEPORT),
            SockOpt::RcvTimeout => (libc::SOL_SOCKET, libc::SO_RCVTIMEO),
            SockOpt::SndTimeout => (libc::SOL_SOCKET, libc::SO_SNDTIMEO),
            SockOpt::TcpNoDelay => (libc::IPPROTO_TCP, libc::TCP_NODELAY),
            #[cfg(not(target_vendor = "apple"))]
            SockOpt::TcpKeepIdle => (libc::IPPROTO_TCP, libc::TCP_KEEPIDLE),
            #[cfg(target_vendor = "apple")]
            SockOpt::TcpKeepIdle => (libc::IPPROTO_TCP, libc::TCP_KEEPALIVE),
            SockOpt::TcpKeepIntvl => (libc::IPPROTO_TCP, libc::TCP_KEEPINTVL),
            SockOpt::TcpKeepCnt => (libc::IPPROTO_TCP, libc::TCP_KEEPCNT),
            SockOpt::Ipv6V6Only => (libc::IPPROTO_IPV6, libc::IPV6_V6ONLY),
        }
    }

    fn is_read_only(self) -> bool {
        matches!(self, SockOpt::Type | SockOpt::Error)
    }
}

/// Value of a socket option.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OptValue {
    Bool(bool),
    Int(i32),
    /// Socket type, from `SO_TYPE`.
    Type(SockType),
    /// Pending error, from `SO_ERROR`. `None` if there is none.
    Error(Option<Errno>),
    /// Linger time, `None` if lingering is disabled.
    Linger(Option<Duration>),
    /// Timeout, `None` blocks forever.
    Timeout(Option<Duration>),
}

/// Reads `opt` from `fd`.
pub(crate) fn get(fd: RawFd, opt: SockOpt) -> Result<OptValue> {
    let (level, name) = opt.to_host();
    match opt {
        SockOpt::ReuseAddr
        | SockOpt::KeepAlive
        | SockOpt::ReusePort
        | SockOpt::TcpNoDelay
        | SockOpt::Ipv6V6Only => {
            let value: c_int = unsafe { getsockopt(fd, level, name)? };
            Ok(OptValue::Bool(value != 0))
        }
        SockOpt::SndBuf
        | SockOpt::RcvBuf
        | SockOpt::TcpKeepIdle
        | SockOpt::TcpKeepIntvl
        | SockOpt::TcpKeepCnt => {
            let value: c_int = unsafe { getsockopt(fd, level, name)? };
            Ok(OptValue::Int(value))
        }
        SockOpt::Type => {
            let value: c_int = unsafe { getsockopt(fd, level, name)? };
            SockType::from_host(value)
                .map(OptValue::Type)
                .ok_or(Error::Host(Errno::AdapterFailure))
        }
        SockOpt::Error => {
            let value: c_int = unsafe { getsockopt(fd, level, name)? };
            Ok(OptValue::Error(match value {
                0 => None,
                errno => Some(Errno::from_host(errno)),
            }))
        }
        SockOpt::Linger => {
            let value: libc::linger = unsafe { getsockopt(fd, level, name)? };
            Ok(OptValue::Linger(if value.l_onoff != 0 {
                Some(Duration::from_secs(value.l_linger as u64))
            } else {
                None
            }))
        }
        SockOpt::RcvTimeout | SockOpt::SndTimeout => {
            let value: libc::timeval = unsafe { getsockopt(fd, level, name)? };
            Ok(OptValue::Timeout(from_timeval(value)))
        }
    }
}

/// Sets `opt` on `fd`.
///
/// The value must be of the kind documented on the option, otherwise
/// `EINVAL` is returned without calling the host. Read-only options fail
/// with `ENOPROTOOPT`.
pub(crate) fn set(fd: RawFd, opt: SockOpt, value: OptValue) -> Result<()> {
    if opt.is_read_only() {
        return Err(Error::Host(Errno::NoProtoOpt));
    }
    let (level, name) = opt.to_host();
    match (opt, value) {
        (
            SockOpt::ReuseAddr
            | SockOpt::KeepAlive
            | SockOpt::ReusePort
            | SockOpt::TcpNoDelay
            | SockOpt::Ipv6V6Only,
            OptValue::Bool(value),
        ) => unsafe { setsockopt(fd, level, name, value as c_int) },
        (
            SockOpt::SndBuf
            | SockOpt::RcvBuf
            | SockOpt::TcpKeepIdle
            | SockOpt::TcpKeepIntvl
            | SockOpt::TcpKeepCnt,
            OptValue::Int(value),
        ) => unsafe { setsockopt(fd, level, name, value as c_int) },
        (SockOpt::Linger, OptValue::Linger(linger)) => {
            let value = libc::linger {
                l_onoff: linger.is_some() as c_int,
                l_linger: linger.map_or(0, |d| d.as_secs().min(c_int::MAX as u64) as c_int),
            };
            unsafe { setsockopt(fd, level, name, value) }
        }
        (SockOpt::RcvTimeout | SockOpt::SndTimeout, OptValue::Timeout(timeout)) => {
            unsafe { setsockopt(fd, level, name, into_timeval(timeout)?) }
        }
        _ => Err(Error::Host(Errno::Inval)),
    }
}

/// Caller must ensure `T` is the correct type for `level` and `name`.
unsafe fn getsockopt<T>(fd: RawFd, level: c_int, name: c_int) -> Result<T> {
    let mut payload: mem::MaybeUninit<T> = mem::MaybeUninit::zeroed();
    let mut len = mem::size_of::<T>() as socklen_t;
    syscall!(getsockopt(
        fd,
        level,
        name,
        payload.as_mut_ptr().cast::<c_void>(),
        &mut len,
    ))?;
    debug_assert_eq!(len as usize, mem::size_of::<T>());
    // SAFETY: `getsockopt` initialised `payload` for us.
    Ok(payload.assume_init())
}

/// Caller must ensure `T` is the correct type for `level` and `name`.
unsafe fn setsockopt<T>(fd: RawFd, level: c_int, name: c_int, payload: T) -> Result<()> {
    let payload = ptr::addr_of!(payload).cast::<c_void>();
    syscall!(setsockopt(
        fd,
        level,
        name,
        payload,
        mem::size_of::<T>() as socklen_t,
    ))?;
    Ok(())
}

fn from_timeval(duration: libc::timeval) -> Option<Duration> {
    if duration.tv_sec == 0 && duration.tv_usec == 0 {
        None
    } else {
        let sec = duration.tv_sec as u64;
        let nsec = (duration.tv_usec as u32) * 1000;
        Some(Duration::new(sec, nsec))
    }
}

/// A zero `duration` is rejected, the host reads it as no timeout at all.
fn into_timeval(duration: Option<Duration>) -> Result<libc::timeval> {
    match duration {
        Some(duration) if duration.is_zero() => Err(Error::Host(Errno::Inval)),
        // https://github.com/rust-lang/libc/issues/1848
        #[cfg_attr(target_env = "musl", allow(deprecated))]
        Some(duration) => {
            let secs = duration.as_secs().min(libc::time_t::MAX as u64) as libc::time_t;
            let mut usecs = duration.subsec_micros() as libc::suseconds_t;
            // Round up, rather than truncate to no timeout.
            if secs == 0 && usecs == 0 {
                usecs = 1;
            }
            Ok(libc::timeval {
                tv_sec: secs,
                tv_usec: usecs,
            })
        }
        None => Ok(libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{from_timeval, into_timeval, SockOpt, IPPROTO_TCP, SOL_SOCKET};
    use crate::errno::Errno;
    use crate::error::Error;
    use std::time::Duration;

    #[test]
    fn mid_namespace() {
        assert_eq!(SockOpt::from_mid(SOL_SOCKET, 2), Ok(SockOpt::ReuseAddr));
        assert_eq!(SockOpt::from_mid(IPPROTO_TCP, 1), Ok(SockOpt::TcpNoDelay));
        assert_eq!(SockOpt::from_mid(41, 26), Ok(SockOpt::Ipv6V6Only));
        assert_eq!(SockOpt::Linger.to_mid(), (SOL_SOCKET, 13));
        assert_eq!(
            SockOpt::from_mid(SOL_SOCKET, 999),
            Err(Error::Host(Errno::NoProtoOpt))
        );
    }

    #[test]
    fn timeval() {
        assert_eq!(from_timeval(into_timeval(None).unwrap()), None);
        let timeout = Duration::new(3, 250_000_000);
        assert_eq!(
            from_timeval(into_timeval(Some(timeout)).unwrap()),
            Some(timeout)
        );
    }

    #[test]
    fn timeval_below_resolution() {
        assert_eq!(
            into_timeval(Some(Duration::ZERO)).map(|_| ()),
            Err(Error::Host(Errno::Inval))
        );
        assert_eq!(
            from_timeval(into_timeval(Some(Duration::from_nanos(1))).unwrap()),
            Some(Duration::from_micros(1))
        );
    }
}
