use std::os::fd::RawFd;
use std::{error, fmt, io};

use crate::addr::Family;
use crate::errno::Errno;

/// A specialized `Result` type for adapter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the adapter.
///
/// Translation errors ([`UnsupportedFamily`], [`AddrLenMismatch`] and
/// [`Registration`]) are detected before the host is called. Host failures
/// are normalised through [`Errno`] and never retried.
///
/// [`UnsupportedFamily`]: Error::UnsupportedFamily
/// [`AddrLenMismatch`]: Error::AddrLenMismatch
/// [`Registration`]: Error::Registration
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The family tag has no mid-layer or host counterpart.
    UnsupportedFamily(u16),
    /// A buffer or payload length doesn't fit the declared family.
    AddrLenMismatch {
        family: Family,
        expected: usize,
        actual: usize,
    },
    /// A host call failed.
    Host(Errno),
    /// Name resolution failed.
    Resolve(ResolveError),
    /// Name resolution failed with a system error (`EAI_SYSTEM`).
    ResolveSystem(Errno),
    /// The readiness bridge was asked to operate on a registration in the
    /// wrong state.
    Registration(RegistrationError),
}

impl Error {
    /// Returns the mid-layer error code, if this is a host error.
    pub fn errno(&self) -> Option<Errno> {
        match self {
            Error::Host(errno) | Error::ResolveSystem(errno) => Some(*errno),
            _ => None,
        }
    }

    /// Returns true if a name resolution found nothing for the query.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::Resolve(ResolveError::NoName) | Error::Resolve(ResolveError::NoData)
        )
    }

    /// Returns true if the host reported the operation would block.
    pub fn is_would_block(&self) -> bool {
        matches!(self, Error::Host(Errno::Again))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Host(
            err.raw_os_error()
                .map_or(Errno::AdapterFailure, Errno::from_host),
        )
    }
}

impl From<RegistrationError> for Error {
    fn from(err: RegistrationError) -> Error {
        Error::Registration(err)
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        match err {
            Error::Host(errno) => match errno.to_host() {
                Some(code) => io::Error::from_raw_os_error(code),
                None => io::Error::new(io::ErrorKind::Other, err),
            },
            Error::UnsupportedFamily(_) => io::Error::new(io::ErrorKind::Unsupported, err),
            Error::AddrLenMismatch { .. } => io::Error::new(io::ErrorKind::InvalidInput, err),
            Error::Resolve(_) | Error::ResolveSystem(_) => io::Error::new(io::ErrorKind::Other, err),
            Error::Registration(RegistrationError::NotRegistered(_)) => {
                io::Error::new(io::ErrorKind::NotFound, err)
            }
            Error::Registration(RegistrationError::AlreadyRegistered(_)) => {
                io::Error::new(io::ErrorKind::AlreadyExists, err)
            }
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnsupportedFamily(family) => write!(f, "unsupported address family {}", family),
            Error::AddrLenMismatch {
                family,
                expected,
                actual,
            } => write!(
                f,
                "address length mismatch for {:?}: expected {} bytes, got {}",
                family, expected, actual
            ),
            Error::Host(errno) => write!(f, "host call failed: {}", errno),
            Error::Resolve(err) => write!(f, "name resolution failed: {}", err),
            Error::ResolveSystem(errno) => write!(f, "name resolution system error: {}", errno),
            Error::Registration(err) => fmt::Display::fmt(err, f),
        }
    }
}

impl error::Error for Error {}

/// Host name resolution failure, the `EAI_*` space.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ResolveError {
    /// Invalid value for the hint flags.
    BadFlags,
    /// Name or service not known.
    NoName,
    /// Temporary failure in name resolution.
    Again,
    /// Non-recoverable failure in name resolution.
    Fail,
    /// No address associated with the name.
    NoData,
    /// Address family not supported.
    Family,
    /// Socket type not supported.
    SockType,
    /// Service not supported for the socket type.
    Service,
    /// Memory allocation failure.
    Memory,
    /// Argument buffer overflow.
    Overflow,
}

impl ResolveError {
    /// Returns the mid-layer `EAI_*` code.
    pub const fn code(self) -> i32 {
        match self {
            ResolveError::BadFlags => -1,
            ResolveError::NoName => -2,
            ResolveError::Again => -3,
            ResolveError::Fail => -4,
            ResolveError::NoData => -5,
            ResolveError::Family => -6,
            ResolveError::SockType => -7,
            ResolveError::Service => -8,
            ResolveError::Memory => -10,
            ResolveError::Overflow => -12,
        }
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ResolveError::BadFlags => "invalid value for hint flags",
            ResolveError::NoName => "name or service not known",
            ResolveError::Again => "temporary failure in name resolution",
            ResolveError::Fail => "non-recoverable failure in name resolution",
            ResolveError::NoData => "no address associated with name",
            ResolveError::Family => "address family not supported",
            ResolveError::SockType => "socket type not supported",
            ResolveError::Service => "service not supported for socket type",
            ResolveError::Memory => "memory allocation failure",
            ResolveError::Overflow => "argument buffer overflow",
        };
        f.write_str(msg)
    }
}

/// Operation on a readiness registration in the wrong state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RegistrationError {
    /// `update` or `remove` on a descriptor without a registration.
    NotRegistered(RawFd),
    /// `add` on a descriptor that is already registered.
    AlreadyRegistered(RawFd),
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationError::NotRegistered(fd) => write!(f, "fd {} is not registered", fd),
            RegistrationError::AlreadyRegistered(fd) => {
                write!(f, "fd {} is already registered", fd)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::{Error, ResolveError};
    use crate::errno::Errno;

    #[test]
    fn from_io_error_normalises() {
        let err = Error::from(io::Error::from_raw_os_error(libc::ECONNRESET));
        assert_eq!(err, Error::Host(Errno::ConnReset));
        assert_eq!(err.errno(), Some(Errno::ConnReset));

        let err = Error::from(io::Error::new(io::ErrorKind::Other, "no os error"));
        assert_eq!(err, Error::Host(Errno::AdapterFailure));
    }

    #[test]
    fn into_io_error() {
        let err: io::Error = Error::Host(Errno::Pipe).into();
        assert_eq!(err.raw_os_error(), Some(libc::EPIPE));

        let err: io::Error = Error::UnsupportedFamily(99).into();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn not_found() {
        assert!(Error::Resolve(ResolveError::NoName).is_not_found());
        assert!(!Error::Resolve(ResolveError::Again).is_not_found());
        assert!(!Error::ResolveSystem(Errno::NoMem).is_not_found());
    }
}
