use std::net::{Ipv4Addr, Ipv6Addr};

use midsock::addr::{self, SOCKADDR_IN6_LEN, SOCKADDR_IN_LEN, SOCKADDR_STORAGE_LEN};
use midsock::{Error, Family, Inet6Addr, InetAddr, LinkAddr, SockAddr, UnixAddr};
use rand::Rng;

mod util;
use util::init;

fn random_addr(rng: &mut impl Rng) -> SockAddr {
    match rng.random_range(0..7) {
        0 => SockAddr::Unspecified,
        1 => SockAddr::V4(InetAddr::new(
            Ipv4Addr::from(rng.random::<u32>()),
            rng.random(),
        )),
        2 => SockAddr::V6(Inet6Addr::new(
            Ipv6Addr::from(rng.random::<u128>()),
            rng.random(),
            rng.random(),
        )),
        3 => {
            // Pathname, without NUL bytes.
            let len = rng.random_range(1..=addr::UNIX_PATH_MAX);
            let path: Vec<u8> = (0..len).map(|_| rng.random_range(1..=255)).collect();
            SockAddr::Unix(UnixAddr::new(&path).unwrap())
        }
        4 => {
            // Abstract, anything goes after the leading NUL.
            let len = rng.random_range(1..=addr::UNIX_PATH_MAX);
            let mut path = vec![0; len];
            rng.fill(&mut path[1..]);
            SockAddr::Unix(UnixAddr::new(&path).unwrap())
        }
        5 => SockAddr::Unix(UnixAddr::unnamed()),
        _ => {
            let len = rng.random_range(0..=addr::LINK_ADDR_MAX);
            let mut hw = vec![0; len];
            rng.fill(&mut hw[..]);
            let mut addr = LinkAddr::new(rng.random(), rng.random(), &hw).unwrap();
            addr.hatype = rng.random();
            addr.pkttype = rng.random();
            SockAddr::Packet(addr)
        }
    }
}

#[test]
fn encode_decode_law() {
    init();
    let mut rng = rand::rng();
    let mut buf = [0; SOCKADDR_STORAGE_LEN];
    for _ in 0..2_000 {
        let addr = random_addr(&mut rng);
        let n = addr::encode(&addr, &mut buf).unwrap();
        assert!(n <= SOCKADDR_STORAGE_LEN);
        assert_eq!(addr::decode(&buf[..n]).unwrap(), addr, "{:?}", addr);
    }
}

#[test]
fn inet_layout() {
    init();
    let addr = SockAddr::V4(InetAddr::new(Ipv4Addr::new(127, 0, 0, 1), 8080));
    let mut buf = [0xAA; SOCKADDR_IN_LEN];
    assert_eq!(addr::encode(&addr, &mut buf).unwrap(), SOCKADDR_IN_LEN);
    let family = 1u16.to_ne_bytes();
    assert_eq!(buf, [family[0], family[1], 0x1F, 0x90, 127, 0, 0, 1]);
}

#[test]
fn inet6_layout() {
    init();
    let ip = Ipv6Addr::LOCALHOST;
    let addr = SockAddr::V6(Inet6Addr::new(ip, 443, 7));
    let mut buf = [0; SOCKADDR_IN6_LEN];
    assert_eq!(addr::encode(&addr, &mut buf).unwrap(), SOCKADDR_IN6_LEN);
    assert_eq!(u16::from_ne_bytes([buf[0], buf[1]]), 2);
    assert_eq!(&buf[2..4], &[0x01, 0xBB]);
    assert_eq!(&buf[4..20], &ip.octets());
    assert_eq!(u32::from_ne_bytes([buf[20], buf[21], buf[22], buf[23]]), 7);
}

#[test]
fn encode_too_small() {
    init();
    let addr = SockAddr::V6(Inet6Addr::new(Ipv6Addr::LOCALHOST, 1, 0));
    let mut buf = [0xAA; SOCKADDR_IN6_LEN - 1];
    assert_eq!(
        addr::encode(&addr, &mut buf),
        Err(Error::AddrLenMismatch {
            family: Family::Inet6,
            expected: SOCKADDR_IN6_LEN,
            actual: SOCKADDR_IN6_LEN - 1,
        })
    );
    // Nothing written.
    assert!(buf.iter().all(|b| *b == 0xAA));
}

#[test]
fn decode_short_buffers() {
    init();
    assert!(matches!(
        addr::decode(&[]),
        Err(Error::AddrLenMismatch { actual: 0, .. })
    ));
    assert!(matches!(
        addr::decode(&[1]),
        Err(Error::AddrLenMismatch { actual: 1, .. })
    ));

    let family = 1u16.to_ne_bytes();
    assert_eq!(
        addr::decode(&[family[0], family[1], 0, 80]),
        Err(Error::AddrLenMismatch {
            family: Family::Inet,
            expected: SOCKADDR_IN_LEN,
            actual: 4,
        })
    );
}

#[test]
fn decode_unknown_family() {
    init();
    let family = 99u16.to_ne_bytes();
    assert_eq!(
        addr::decode(&[family[0], family[1], 0, 0, 0, 0, 0, 0]),
        Err(Error::UnsupportedFamily(99))
    );
}

#[test]
fn decode_unix_stops_at_nul() {
    init();
    let family = 6u16.to_ne_bytes();
    let mut buf = vec![family[0], family[1]];
    buf.extend_from_slice(b"/tmp/sock\0garbage");
    let addr = addr::decode(&buf).unwrap();
    let unix = addr.as_unix().unwrap();
    assert_eq!(unix.as_bytes(), b"/tmp/sock");
    assert_eq!(unix.as_pathname(), Some(std::path::Path::new("/tmp/sock")));
}

#[test]
fn unix_max_path() {
    init();
    let path = [b'a'; addr::UNIX_PATH_MAX];
    let addr = SockAddr::Unix(UnixAddr::new(&path).unwrap());
    let mut buf = [0; SOCKADDR_STORAGE_LEN];
    // No room for, and no need of, a terminator.
    assert_eq!(addr::encode(&addr, &mut buf).unwrap(), 2 + addr::UNIX_PATH_MAX);
    assert_eq!(addr::decode(&buf[..2 + addr::UNIX_PATH_MAX]).unwrap(), addr);

    let too_long = [b'a'; addr::UNIX_PATH_MAX + 1];
    assert!(matches!(
        UnixAddr::new(&too_long),
        Err(Error::AddrLenMismatch {
            family: Family::Unix,
            ..
        })
    ));
}

#[test]
fn link_addr_too_long() {
    init();
    assert!(LinkAddr::new(3, 1, &[0; addr::LINK_ADDR_MAX + 1]).is_err());

    let family = 3u16.to_ne_bytes();
    let mut buf = [0; 20];
    buf[..2].copy_from_slice(&family);
    buf[11] = 9; // halen
    assert!(matches!(
        addr::decode(&buf),
        Err(Error::AddrLenMismatch {
            family: Family::Packet,
            ..
        })
    ));
}

#[test]
fn std_conversions() {
    init();
    let std_addr: std::net::SocketAddr = "[::1]:9000".parse().unwrap();
    let addr = SockAddr::from(std_addr);
    assert_eq!(addr.family(), Family::Inet6);
    assert_eq!(addr.as_socket(), Some(std_addr));
    assert_eq!(SockAddr::Unspecified.as_socket(), None);
}
