//! Translation of mid-layer flag words to host flag words and back.
//!
//! Every flag namespace is described by a table of (mid-layer bit, host bit)
//! pairs. Translating a word clears the source bit and sets the target bit
//! for every pair present. Bits not in the table are passed through
//! unchanged, so translating to the host and back reproduces any word
//! composed of supported bits.

use std::{fmt, ops};

use libc::c_int;

/// Translates `flags` using `table`, mapping the left column to the right
/// column when `forward` is true and the other way around otherwise.
fn convert(mut flags: c_int, table: &[(c_int, c_int)], forward: bool) -> c_int {
    let mut out = 0;
    for &(mid, host) in table {
        let (from, to) = if forward { (mid, host) } else { (host, mid) };
        if flags & from != 0 {
            flags &= !from;
            out |= to;
        }
    }
    out | flags
}

macro_rules! mid_flags {
    (
        $(#[$meta: meta])*
        $name: ident, $table: ident {
            $(
                $(#[$flag_meta: meta])*
                $flag: ident = $mid: literal => $host: expr;
            )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
        #[repr(transparent)]
        pub struct $name(c_int);

        impl $name {
            $(
                $(#[$flag_meta])*
                pub const $flag: $name = $name($mid);
            )+

            /// Returns an empty set of flags.
            pub const fn empty() -> $name {
                $name(0)
            }

            /// Creates flags from a raw mid-layer word, unknown bits are kept.
            pub const fn from_bits(bits: c_int) -> $name {
                $name(bits)
            }

            /// Returns the raw mid-layer word.
            pub const fn bits(self) -> c_int {
                self.0
            }

            /// Returns true if all bits in `other` are set.
            pub const fn contains(self, other: $name) -> bool {
                self.0 & other.0 == other.0
            }

            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            /// Translates to the host flag word.
            pub fn to_host(self) -> c_int {
                convert(self.0, $table, true)
            }

            /// Translates a host flag word.
            pub fn from_host(flags: c_int) -> $name {
                $name(convert(flags, $table, false))
            }
        }

        impl ops::BitOr for $name {
            type Output = Self;

            #[inline]
            fn bitor(self, other: Self) -> Self {
                $name(self.0 | other.0)
            }
        }

        impl ops::BitOrAssign for $name {
            #[inline]
            fn bitor_assign(&mut self, other: Self) {
                self.0 |= other.0;
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let mut one = false;
                let mut rest = self.0;
                $(
                    if self.0 & $mid != 0 {
                        if one {
                            write!(f, " | ")?
                        }
                        write!(f, stringify!($flag))?;
                        rest &= !$mid;
                        one = true
                    }
                )+
                if rest != 0 {
                    if one {
                        write!(f, " | ")?
                    }
                    write!(f, "{:#x}", rest)?;
                    one = true
                }
                if !one {
                    write!(f, "(empty)")?
                }
                Ok(())
            }
        }

        static $table: &[(c_int, c_int)] = &[
            $( ($mid, $host), )+
        ];
    };
}

mid_flags! {
    /// Flags of the send and receive operations (`MSG_*`).
    MsgFlags, MSG_FLAGS {
        /// Return data without removing it from the queue.
        PEEK = 0x02 => libc::MSG_PEEK;
        /// Report the real length of a truncated datagram; as an output
        /// flag, the datagram was truncated.
        TRUNC = 0x20 => libc::MSG_TRUNC;
        /// Don't block.
        DONTWAIT = 0x40 => libc::MSG_DONTWAIT;
        /// Block until the full request is satisfied.
        WAITALL = 0x100 => libc::MSG_WAITALL;
    }
}

mid_flags! {
    /// Descriptor status flags (`fcntl(F_GETFL)`/`fcntl(F_SETFL)`).
    ///
    /// The access mode bits (`O_RDONLY`, `O_WRONLY`, `O_RDWR`) share their
    /// values between the mid-layer and the host and are passed through.
    OFlags, O_FLAGS {
        /// Append on each write.
        APPEND = 0x0400 => libc::O_APPEND;
        /// Exclusive use.
        EXCL = 0x0800 => libc::O_EXCL;
        /// Non-blocking mode.
        NONBLOCK = 0x4000 => libc::O_NONBLOCK;
    }
}

mid_flags! {
    /// Address-info flags (`AI_*`).
    AiFlags, AI_FLAGS {
        /// The address is intended for `bind`.
        PASSIVE = 0x1 => libc::AI_PASSIVE;
        /// Request the canonical name.
        CANONNAME = 0x2 => libc::AI_CANONNAME;
        /// The node is a numeric address, don't resolve it.
        NUMERICHOST = 0x4 => libc::AI_NUMERICHOST;
        /// Return IPv4-mapped IPv6 addresses.
        V4MAPPED = 0x8 => libc::AI_V4MAPPED;
        /// Return both IPv4-mapped and IPv6 addresses.
        ALL = 0x10 => libc::AI_ALL;
        /// Only return families configured on the host.
        ADDRCONFIG = 0x20 => libc::AI_ADDRCONFIG;
        /// The service is a numeric port, don't resolve it.
        NUMERICSERV = 0x400 => libc::AI_NUMERICSERV;
    }
}

impl OFlags {
    /// Access mode bits, shared with the host.
    pub const ACCMODE: c_int = 0o3;
}
