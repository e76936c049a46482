//! Normalisation of host `errno` values into the mid-layer error space.

use std::fmt;

use libc::c_int;

macro_rules! errno_table {
    (
        $(
            $(#[$target: meta])*
            $name: ident = $code: literal => $host: ident, $desc: literal;
        )+
    ) => {
        /// Mid-layer error code.
        ///
        /// Every host error value the adapter can observe maps to exactly one
        /// variant, see [`Errno::from_host`]. Values without a mid-layer
        /// counterpart map to [`Errno::AdapterFailure`].
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        #[non_exhaustive]
        pub enum Errno {
            $(
                #[doc = $desc]
                $name,
            )+
            /// The host reported an error the adapter has no mapping for.
            AdapterFailure,
        }

        impl Errno {
            /// Returns the mid-layer numeric value of the error.
            ///
            /// [`Errno::AdapterFailure`] is reported as `EIO` on the wire.
            pub const fn code(self) -> i32 {
                match self {
                    $( Errno::$name => $code, )+
                    Errno::AdapterFailure => 5,
                }
            }

            /// Returns the variant for a mid-layer numeric value.
            pub fn from_code(code: i32) -> Option<Errno> {
                match code {
                    $( $code => Some(Errno::$name), )+
                    _ => None,
                }
            }

            fn description(self) -> &'static str {
                match self {
                    $( Errno::$name => $desc, )+
                    Errno::AdapterFailure => "unmapped host error",
                }
            }
        }

        /// (host value, mid-layer variant) pairs. Platforms aliasing two
        /// values (e.g. `EOPNOTSUPP` and `ENOTSUP` on Linux) resolve to the
        /// first entry.
        static HOST_ERRNO: &[(c_int, Errno)] = &[
            $(
                $(#[$target])*
                (libc::$host, Errno::$name),
            )+
        ];
    };
}

errno_table! {
    Perm = 1 => EPERM, "Operation not permitted.";
    NoEnt = 2 => ENOENT, "No such file or directory.";
    Srch = 3 => ESRCH, "No such process.";
    Intr = 4 => EINTR, "Interrupted system call.";
    Io = 5 => EIO, "I/O error.";
    NxIo = 6 => ENXIO, "No such device or address.";
    TooBig = 7 => E2BIG, "Argument list too long.";
    NoExec = 8 => ENOEXEC, "Exec format error.";
    BadF = 9 => EBADF, "Bad file descriptor.";
    Child = 10 => ECHILD, "No child processes.";
    Again = 11 => EAGAIN, "Resource temporarily unavailable, operation would block.";
    NoMem = 12 => ENOMEM, "Out of memory.";
    Acces = 13 => EACCES, "Permission denied.";
    Fault = 14 => EFAULT, "Bad address.";
    Busy = 16 => EBUSY, "Device or resource busy.";
    Exist = 17 => EEXIST, "File exists.";
    XDev = 18 => EXDEV, "Cross-device link.";
    NoDev = 19 => ENODEV, "No such device.";
    NotDir = 20 => ENOTDIR, "Not a directory.";
    IsDir = 21 => EISDIR, "Is a directory.";
    Inval = 22 => EINVAL, "Invalid argument.";
    NFile = 23 => ENFILE, "File table overflow.";
    MFile = 24 => EMFILE, "Too many open files.";
    NotTy = 25 => ENOTTY, "Not a typewriter.";
    FBig = 27 => EFBIG, "File too large.";
    NoSpc = 28 => ENOSPC, "No space left on device.";
    SPipe = 29 => ESPIPE, "Illegal seek.";
    RoFs = 30 => EROFS, "Read-only file system.";
    MLink = 31 => EMLINK, "Too many links.";
    Pipe = 32 => EPIPE, "Broken pipe.";
    Dom = 33 => EDOM, "Argument out of domain.";
    Range = 34 => ERANGE, "Result too large.";
    NoMsg = 35 => ENOMSG, "No message of the desired type.";
    DeadLk = 45 => EDEADLK, "Resource deadlock avoided.";
    NoLck = 46 => ENOLCK, "No locks available.";
    #[cfg(any(target_os = "android", target_os = "linux", target_vendor = "apple"))]
    NoStr = 60 => ENOSTR, "Not a stream.";
    #[cfg(any(target_os = "android", target_os = "linux", target_vendor = "apple"))]
    NoData = 61 => ENODATA, "No data available.";
    #[cfg(any(target_os = "android", target_os = "linux", target_vendor = "apple"))]
    Time = 62 => ETIME, "Stream ioctl timeout.";
    #[cfg(any(target_os = "android", target_os = "linux", target_vendor = "apple"))]
    NoSr = 63 => ENOSR, "No stream resources.";
    Proto = 71 => EPROTO, "Protocol error.";
    BadMsg = 77 => EBADMSG, "Invalid data message.";
    NoSys = 88 => ENOSYS, "Function not implemented.";
    NotEmpty = 90 => ENOTEMPTY, "Directory not empty.";
    NameTooLong = 91 => ENAMETOOLONG, "File name too long.";
    Loop = 92 => ELOOP, "Too many levels of symbolic links.";
    OpNotSupp = 95 => EOPNOTSUPP, "Operation not supported on socket.";
    PfNoSupport = 96 => EPFNOSUPPORT, "Protocol family not supported.";
    ConnReset = 104 => ECONNRESET, "Connection reset by peer.";
    NoBufs = 105 => ENOBUFS, "No buffer space available.";
    AfNoSupport = 106 => EAFNOSUPPORT, "Address family not supported by protocol family.";
    ProtoType = 107 => EPROTOTYPE, "Protocol wrong type for socket.";
    NotSock = 108 => ENOTSOCK, "Socket operation on non-socket.";
    NoProtoOpt = 109 => ENOPROTOOPT, "Protocol not available.";
    Shutdown = 110 => ESHUTDOWN, "Can't send after socket shutdown.";
    ConnRefused = 111 => ECONNREFUSED, "Connection refused.";
    AddrInUse = 112 => EADDRINUSE, "Address already in use.";
    ConnAborted = 113 => ECONNABORTED, "Software caused connection abort.";
    NetUnreach = 114 => ENETUNREACH, "Network is unreachable.";
    NetDown = 115 => ENETDOWN, "Network is down.";
    TimedOut = 116 => ETIMEDOUT, "Connection timed out.";
    HostDown = 117 => EHOSTDOWN, "Host is down.";
    HostUnreach = 118 => EHOSTUNREACH, "No route to host.";
    InProgress = 119 => EINPROGRESS, "Operation now in progress.";
    Already = 120 => EALREADY, "Operation already in progress.";
    DestAddrReq = 121 => EDESTADDRREQ, "Destination address required.";
    MsgSize = 122 => EMSGSIZE, "Message too long.";
    ProtoNoSupport = 123 => EPROTONOSUPPORT, "Protocol not supported.";
    SocktNoSupport = 124 => ESOCKTNOSUPPORT, "Socket type not supported.";
    AddrNotAvail = 125 => EADDRNOTAVAIL, "Can't assign requested address.";
    NetReset = 126 => ENETRESET, "Network dropped connection on reset.";
    IsConn = 127 => EISCONN, "Socket is already connected.";
    NotConn = 128 => ENOTCONN, "Socket is not connected.";
    TooManyRefs = 129 => ETOOMANYREFS, "Too many references: can't splice.";
    NotSup = 134 => ENOTSUP, "Unsupported value.";
    IlSeq = 138 => EILSEQ, "Illegal byte sequence.";
    Overflow = 139 => EOVERFLOW, "Value overflow.";
    Canceled = 140 => ECANCELED, "Operation canceled.";
}

impl Errno {
    /// Normalises a host `errno` value.
    pub fn from_host(errno: c_int) -> Errno {
        HOST_ERRNO
            .iter()
            .find(|(host, _)| *host == errno)
            .map_or(Errno::AdapterFailure, |(_, mid)| *mid)
    }

    /// Returns the host value of the error, `None` for
    /// [`Errno::AdapterFailure`] or errors the host doesn't define.
    pub fn to_host(self) -> Option<c_int> {
        HOST_ERRNO
            .iter()
            .find(|(_, mid)| *mid == self)
            .map(|(host, _)| *host)
    }

    /// Returns the normalised value of the calling thread's `errno`.
    ///
    /// Only meaningful immediately after the host call that failed.
    pub(crate) fn last() -> Errno {
        std::io::Error::last_os_error()
            .raw_os_error()
            .map_or(Errno::AdapterFailure, Errno::from_host)
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (mid errno {})", self.description(), self.code())
    }
}
