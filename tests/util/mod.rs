// Not all functions are used by all tests.
#![allow(dead_code)]

use std::net::Ipv4Addr;
use std::os::fd::RawFd;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Once;
use std::{env, process};

use midsock::socket::{self, Protocol, SockType};
use midsock::{Family, InetAddr, SockAddr};

pub fn init() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        env_logger::try_init().expect("unable to initialise logger");
    })
}

pub fn assert_sync<T: Sync>() {}
pub fn assert_send<T: Send>() {}

/// Descriptor closed on drop.
#[derive(Debug)]
pub struct Fd(pub RawFd);

impl Drop for Fd {
    fn drop(&mut self) {
        unsafe { libc::close(self.0) };
    }
}

/// Creates a connected pair of Unix sockets of type `ty`.
pub fn socketpair(ty: libc::c_int) -> (Fd, Fd) {
    let mut fds = [-1; 2];
    let res = unsafe { libc::socketpair(libc::AF_UNIX, ty, 0, fds.as_mut_ptr()) };
    assert_eq!(res, 0, "socketpair: {}", std::io::Error::last_os_error());
    (Fd(fds[0]), Fd(fds[1]))
}

/// Creates a pipe, returning the reading and writing end.
pub fn pipe() -> (Fd, Fd) {
    let mut fds = [-1; 2];
    let res = unsafe { libc::pipe(fds.as_mut_ptr()) };
    assert_eq!(res, 0, "pipe: {}", std::io::Error::last_os_error());
    (Fd(fds[0]), Fd(fds[1]))
}

/// Address any local address can bind to.
pub fn any_local_address() -> SockAddr {
    SockAddr::V4(InetAddr::new(Ipv4Addr::LOCALHOST, 0))
}

/// Creates a socket bound to a random loopback port, returning it and its
/// address.
pub fn bound_socket(ty: SockType, protocol: Protocol) -> (Fd, SockAddr) {
    let fd = Fd(socket::socket(Family::Inet, ty, protocol).expect("unable to create socket"));
    socket::bind(fd.0, &any_local_address()).expect("unable to bind socket");
    let addr = socket::local_addr(fd.0).expect("unable to get local address");
    (fd, addr)
}

/// Creates a TCP listener on a random loopback port.
pub fn tcp_listener() -> (Fd, SockAddr) {
    let (fd, addr) = bound_socket(SockType::Stream, Protocol::TCP);
    socket::listen(fd.0, 128).expect("unable to listen");
    (fd, addr)
}

/// Returns a path for a Unix socket that doesn't exist yet.
pub fn temp_path(name: &str) -> PathBuf {
    static NEXT: AtomicUsize = AtomicUsize::new(0);

    let n = NEXT.fetch_add(1, Ordering::Relaxed);
    let path = env::temp_dir().join(format!("midsock-{}-{}-{}.sock", name, process::id(), n));
    let _ = std::fs::remove_file(&path);
    path
}
