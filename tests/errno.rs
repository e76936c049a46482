use std::io;

use midsock::{Errno, Error, RegistrationError, ResolveError};

mod util;
use util::init;

#[test]
fn mid_values() {
    init();
    assert_eq!(Errno::from_host(libc::EAGAIN).code(), 11);
    assert_eq!(Errno::from_host(libc::EINPROGRESS).code(), 119);
    assert_eq!(Errno::from_host(libc::ECONNREFUSED).code(), 111);
    assert_eq!(Errno::from_host(libc::EADDRINUSE).code(), 112);
    assert_eq!(Errno::from_host(libc::ENOTCONN).code(), 128);
}

#[test]
fn every_host_value_maps_somewhere() {
    init();
    for host in 1..200 {
        let errno = Errno::from_host(host);
        if errno == Errno::AdapterFailure {
            continue;
        }
        // Aliases map back to the first host value, which maps to the same
        // mid-layer value.
        let back = errno.to_host().expect("mapped errno without host value");
        assert_eq!(Errno::from_host(back), errno, "host errno {}", host);
        assert_eq!(Errno::from_code(errno.code()), Some(errno));
    }
}

#[test]
fn unmapped_is_adapter_failure() {
    init();
    let errno = Errno::from_host(100_000);
    assert_eq!(errno, Errno::AdapterFailure);
    assert_eq!(errno.code(), 5);
    assert_eq!(errno.to_host(), None);
}

#[test]
fn from_io_error() {
    init();
    let err = Error::from(io::Error::from_raw_os_error(libc::ECONNRESET));
    assert_eq!(err, Error::Host(Errno::ConnReset));
    assert_eq!(err.errno(), Some(Errno::ConnReset));

    let err = Error::from(io::Error::new(io::ErrorKind::Other, "no os error"));
    assert_eq!(err, Error::Host(Errno::AdapterFailure));
}

#[test]
fn into_io_error() {
    init();
    let err: io::Error = Error::Host(Errno::Again).into();
    assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    assert_eq!(err.raw_os_error(), Some(libc::EAGAIN));

    let err: io::Error = Error::Registration(RegistrationError::NotRegistered(3)).into();
    assert_eq!(err.kind(), io::ErrorKind::NotFound);
}

#[test]
fn not_found() {
    init();
    assert!(Error::Resolve(ResolveError::NoName).is_not_found());
    assert!(Error::Resolve(ResolveError::NoData).is_not_found());
    assert!(!Error::Resolve(ResolveError::Again).is_not_found());
    assert!(!Error::Host(Errno::NoEnt).is_not_found());
}

#[test]
fn display() {
    init();
    let msg = Error::Host(Errno::ConnRefused).to_string();
    assert!(msg.contains("Connection refused"), "{}", msg);
    assert!(msg.contains("111"), "{}", msg);
    assert_eq!(ResolveError::NoName.code(), -2);
}
