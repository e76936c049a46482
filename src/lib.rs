#![warn(missing_debug_implementations, rust_2018_idioms, unused_imports)]
// Disallow warnings in examples.
#![doc(test(attr(deny(warnings))))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A protocol-independent socket adaptation layer.
//!
//! Midsock sits between an upstream networking stack, which speaks a fixed
//! "mid-layer" vocabulary of address layouts, flag values and error codes,
//! and the host's POSIX sockets. Every operation translates its arguments to
//! the host, calls the host primitive and translates the results back.
//!
//! The main parts are:
//! * [`addr`]: the mid-layer address layouts and the [`SockAddr`] type.
//! * [`MsgFlags`], [`OFlags`], [`AiFlags`] and [`SockOpt`]: flag and socket
//!   option translation.
//! * [`Errno`] and [`Error`]: every failure, normalised.
//! * [`socket`]: the socket operations themselves.
//! * [`Bridge`]: readiness callbacks driven by the host's `epoll(7)` or
//!   `poll(2)`.
//! * [`dns`]: name resolution.
//!
//! # Examples
//!
//! A datagram sent over loopback.
//!
//! ```
//! # fn main() -> Result<(), midsock::Error> {
//! use std::net::Ipv4Addr;
//!
//! use midsock::socket::{self, Protocol, SockType};
//! use midsock::{Family, InetAddr, MsgFlags, SockAddr};
//!
//! let any = SockAddr::V4(InetAddr::new(Ipv4Addr::LOCALHOST, 0));
//! let receiver = socket::socket(Family::Inet, SockType::Dgram, Protocol::UDP)?;
//! socket::bind(receiver, &any)?;
//! let addr = socket::local_addr(receiver)?;
//!
//! let sender = socket::socket(Family::Inet, SockType::Dgram, Protocol::UDP)?;
//! socket::send_to(sender, b"hello", MsgFlags::empty(), Some(&addr))?;
//!
//! let mut buf = [0; 16];
//! let (n, from) = socket::recv_from(receiver, &mut buf, MsgFlags::empty())?;
//! assert_eq!(&buf[..n], b"hello");
//! assert_eq!(from.map(|addr| addr.family()), Some(Family::Inet));
//! # unsafe { libc::close(receiver); libc::close(sender); }
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! This crate has the following optional features:
//! * `os-poll` (default): the readiness [`Bridge`].
//! * `dns` (default): the [`dns`] module.
//!
//! # Platforms
//!
//! Unix hosts only. Linux and Android use `epoll(7)`, other hosts `poll(2)`.
//! Building with `RUSTFLAGS="--cfg midsock_force_poll_poll"` selects
//! `poll(2)` everywhere. Link-layer addresses ([`Family::Packet`]) are only
//! supported by the host on Linux and Android.

#[cfg(not(unix))]
compile_error!("midsock only supports Unix hosts");

// Macros must be defined before other modules that use them.
#[macro_use]
mod macros;

pub mod addr;
mod errno;
mod error;
mod flags;
pub mod msg;
pub mod socket;
pub mod sockopt;

pub use addr::{Family, Inet6Addr, InetAddr, LinkAddr, SockAddr, UnixAddr};
pub use errno::Errno;
pub use error::{Error, RegistrationError, ResolveError, Result};
pub use flags::{AiFlags, MsgFlags, OFlags};
pub use sockopt::{OptValue, SockOpt};

cfg_os_poll! {
    pub mod poll;
    mod sys;

    pub use poll::{Bridge, Event, Interest, Readiness};
}

cfg_dns! {
    pub mod dns;
}
