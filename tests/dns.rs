#![cfg(feature = "dns")]

use std::net::{Ipv4Addr, Ipv6Addr};

use midsock::dns::{self, AddrInfoHints};
use midsock::socket::{Protocol, SockType};
use midsock::{AiFlags, Error, Family, Inet6Addr, InetAddr, ResolveError, SockAddr};

mod util;
use util::init;

fn numeric(family: Family) -> AddrInfoHints {
    AddrInfoHints {
        flags: AiFlags::NUMERICHOST | AiFlags::NUMERICSERV,
        family,
        socktype: Some(SockType::Stream),
        ..AddrInfoHints::default()
    }
}

#[test]
fn numeric_inet() {
    init();
    let hints = numeric(Family::Inet);
    let list = dns::resolve(Some("127.0.0.1"), Some("80"), Some(&hints)).unwrap();
    assert_eq!(list.len(), 1);

    let info = list.first().unwrap();
    assert_eq!(info.family, Family::Inet);
    assert_eq!(info.socktype, Some(SockType::Stream));
    assert_eq!(info.protocol, Protocol::TCP);
    assert_eq!(
        info.addr,
        SockAddr::V4(InetAddr::new(Ipv4Addr::LOCALHOST, 80))
    );
    dns::release(list);
}

#[test]
fn numeric_inet6() {
    init();
    let hints = numeric(Family::Inet6);
    let list = dns::resolve(Some("::1"), Some("443"), Some(&hints)).unwrap();
    let addrs: Vec<_> = list.iter().map(|info| info.addr).collect();
    assert_eq!(
        addrs,
        [SockAddr::V6(Inet6Addr::new(Ipv6Addr::LOCALHOST, 443, 0))]
    );
}

#[test]
fn service_only() {
    init();
    let hints = AddrInfoHints {
        flags: AiFlags::PASSIVE | AiFlags::NUMERICSERV,
        family: Family::Inet,
        socktype: Some(SockType::Dgram),
        ..AddrInfoHints::default()
    };
    let list = dns::resolve(None, Some("5353"), Some(&hints)).unwrap();
    for info in list {
        assert_eq!(
            info.addr,
            SockAddr::V4(InetAddr::new(Ipv4Addr::UNSPECIFIED, 5353))
        );
        assert_eq!(info.socktype, Some(SockType::Dgram));
    }
}

#[test]
fn invalid_numeric_host() {
    init();
    let hints = numeric(Family::Unspec);
    let err = dns::resolve(Some("not an address"), None, Some(&hints)).unwrap_err();
    assert_eq!(err, Error::Resolve(ResolveError::NoName));
    assert!(err.is_not_found());
}

#[test]
#[ignore = "depends on the host resolver"]
fn non_existent_host() {
    init();
    // `.invalid` names never resolve (RFC 6761).
    let err = dns::resolve(Some("midsock-test.invalid"), None, None).unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {:?}", err);
}

#[test]
fn interior_nul() {
    init();
    assert_eq!(
        dns::resolve(Some("local\0host"), None, None),
        Err(Error::Resolve(ResolveError::NoName))
    );
    assert_eq!(
        dns::resolve(None, Some("8\00"), None),
        Err(Error::Resolve(ResolveError::NoName))
    );
}

#[test]
#[cfg(any(target_os = "android", target_os = "linux"))]
fn unsupported_family_hint() {
    init();
    let hints = numeric(Family::Packet);
    assert_eq!(
        dns::resolve(Some("127.0.0.1"), None, Some(&hints)),
        Err(Error::Resolve(ResolveError::Family))
    );
}
