use midsock::sockopt::{IPPROTO_TCP, SOL_SOCKET};
use midsock::{AiFlags, Errno, Error, MsgFlags, OFlags, SockOpt};
use rand::Rng;

mod util;
use util::init;

/// Returns a random union of `flags`.
fn random_subset(rng: &mut impl Rng, flags: &[i32]) -> i32 {
    flags
        .iter()
        .filter(|_| rng.random_bool(0.5))
        .fold(0, |acc, flag| acc | flag)
}

#[test]
fn msg_flags_invertible() {
    init();
    let known = [
        MsgFlags::PEEK.bits(),
        MsgFlags::TRUNC.bits(),
        MsgFlags::DONTWAIT.bits(),
        MsgFlags::WAITALL.bits(),
    ];
    let mut rng = rand::rng();
    for _ in 0..1_000 {
        let flags = MsgFlags::from_bits(random_subset(&mut rng, &known));
        assert_eq!(MsgFlags::from_host(flags.to_host()), flags, "{:?}", flags);
    }
}

#[test]
fn o_flags_invertible() {
    init();
    let known = [
        OFlags::APPEND.bits(),
        OFlags::EXCL.bits(),
        OFlags::NONBLOCK.bits(),
    ];
    let mut rng = rand::rng();
    for _ in 0..1_000 {
        let access = rng.random_range(0..3);
        let flags = OFlags::from_bits(access | random_subset(&mut rng, &known));
        assert_eq!(OFlags::from_host(flags.to_host()), flags, "{:?}", flags);
        assert_eq!(flags.to_host() & libc::O_ACCMODE, access);
    }
}

#[test]
fn ai_flags_invertible() {
    init();
    let known = [
        AiFlags::PASSIVE.bits(),
        AiFlags::CANONNAME.bits(),
        AiFlags::NUMERICHOST.bits(),
        AiFlags::V4MAPPED.bits(),
        AiFlags::ALL.bits(),
        AiFlags::ADDRCONFIG.bits(),
        AiFlags::NUMERICSERV.bits(),
    ];
    let mut rng = rand::rng();
    for _ in 0..1_000 {
        let flags = AiFlags::from_bits(random_subset(&mut rng, &known));
        assert_eq!(AiFlags::from_host(flags.to_host()), flags, "{:?}", flags);
    }
}

#[test]
fn mid_values() {
    init();
    assert_eq!(MsgFlags::PEEK.bits(), 0x02);
    assert_eq!(MsgFlags::TRUNC.bits(), 0x20);
    assert_eq!(MsgFlags::DONTWAIT.bits(), 0x40);
    assert_eq!(MsgFlags::WAITALL.bits(), 0x100);
    assert_eq!(OFlags::NONBLOCK.bits(), 0x4000);
    assert_eq!(AiFlags::NUMERICSERV.bits(), 0x400);
}

#[test]
fn sock_opt_namespace() {
    init();
    assert_eq!(SockOpt::from_mid(SOL_SOCKET, 2).unwrap(), SockOpt::ReuseAddr);
    assert_eq!(SockOpt::from_mid(IPPROTO_TCP, 1).unwrap(), SockOpt::TcpNoDelay);
    assert_eq!(SockOpt::TcpNoDelay.to_mid(), (IPPROTO_TCP, 1));

    for opt in [
        SockOpt::ReuseAddr,
        SockOpt::Type,
        SockOpt::Error,
        SockOpt::SndBuf,
        SockOpt::RcvBuf,
        SockOpt::KeepAlive,
        SockOpt::Linger,
        SockOpt::ReusePort,
        SockOpt::RcvTimeout,
        SockOpt::SndTimeout,
        SockOpt::TcpNoDelay,
        SockOpt::TcpKeepIdle,
        SockOpt::TcpKeepIntvl,
        SockOpt::TcpKeepCnt,
        SockOpt::Ipv6V6Only,
    ] {
        let (level, name) = opt.to_mid();
        assert_eq!(SockOpt::from_mid(level, name).unwrap(), opt);
    }

    assert_eq!(
        SockOpt::from_mid(SOL_SOCKET, 9999),
        Err(Error::Host(Errno::NoProtoOpt))
    );
}
