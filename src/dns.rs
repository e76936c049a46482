//! Name resolution.
//!
//! [`resolve`] translates an address-info query to the host's
//! `getaddrinfo(3)` and its results back to mid-layer types. The host list is
//! freed before `resolve` returns; the caller owns the returned
//! [`AddrInfoList`] and gives it back with [`release`], or simply drops it.
//!
//! ```
//! # fn main() -> Result<(), midsock::Error> {
//! use std::net::Ipv4Addr;
//!
//! use midsock::dns::{self, AddrInfoHints};
//! use midsock::{AiFlags, Family, InetAddr, SockAddr};
//!
//! let hints = AddrInfoHints {
//!     flags: AiFlags::NUMERICHOST | AiFlags::NUMERICSERV,
//!     family: Family::Inet,
//!     ..AddrInfoHints::default()
//! };
//! let list = dns::resolve(Some("127.0.0.1"), Some("8080"), Some(&hints))?;
//! let first = list.first().unwrap();
//! assert_eq!(first.addr, SockAddr::V4(InetAddr::new(Ipv4Addr::LOCALHOST, 8080)));
//! dns::release(list);
//! # Ok(())
//! # }
//! ```

use std::ffi::{CStr, CString};
use std::{mem, ptr, slice, vec};

use libc::c_int;
use log::{debug, trace};

use crate::addr::native::{from_native, zeroed_storage};
use crate::addr::{Family, SockAddr};
use crate::errno::Errno;
use crate::error::{Error, ResolveError, Result};
use crate::flags::AiFlags;
use crate::socket::{Protocol, SockType};

/// Hints restricting the results of [`resolve`].
///
/// The default hints accept any family, socket type and protocol.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AddrInfoHints {
    pub flags: AiFlags,
    /// [`Family::Unspec`] accepts any family.
    pub family: Family,
    /// `None` accepts any socket type.
    pub socktype: Option<SockType>,
    /// [`Protocol::IP`] accepts any protocol.
    pub protocol: Protocol,
}

impl Default for AddrInfoHints {
    fn default() -> AddrInfoHints {
        AddrInfoHints {
            flags: AiFlags::empty(),
            family: Family::Unspec,
            socktype: None,
            protocol: Protocol::IP,
        }
    }
}

/// A single result of [`resolve`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddrInfo {
    pub flags: AiFlags,
    pub family: Family,
    /// `None` if the host returned a socket type without a mid-layer value.
    pub socktype: Option<SockType>,
    pub protocol: Protocol,
    pub addr: SockAddr,
    /// Only set on the first result, and only if requested with
    /// [`AiFlags::CANONNAME`].
    pub canonname: Option<String>,
}

/// Results of [`resolve`], in host order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddrInfoList {
    nodes: Vec<AddrInfo>,
}

impl AddrInfoList {
    pub fn first(&self) -> Option<&AddrInfo> {
        self.nodes.first()
    }

    pub fn iter(&self) -> slice::Iter<'_, AddrInfo> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl<'a> IntoIterator for &'a AddrInfoList {
    type Item = &'a AddrInfo;
    type IntoIter = slice::Iter<'a, AddrInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for AddrInfoList {
    type Item = AddrInfo;
    type IntoIter = vec::IntoIter<AddrInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_iter()
    }
}

/// Resolves `node` and `service`.
///
/// At least one of `node` and `service` must be given, the host rejects the
/// query otherwise.
///
/// # Errors
///
/// Host failures are returned as [`Error::Resolve`], or
/// [`Error::ResolveSystem`] carrying the normalised `errno`. A name
/// containing a NUL byte can't be resolved and is rejected with
/// [`ResolveError::NoName`] without calling the host.
pub fn resolve(
    node: Option<&str>,
    service: Option<&str>,
    hints: Option<&AddrInfoHints>,
) -> Result<AddrInfoList> {
    let c_node = node.map(to_cstring).transpose()?;
    let c_service = service.map(to_cstring).transpose()?;
    let c_hints = hints.map(to_host_hints).transpose()?;

    let mut res: *mut libc::addrinfo = ptr::null_mut();
    let rc = unsafe {
        libc::getaddrinfo(
            c_node.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
            c_service.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
            c_hints
                .as_ref()
                .map_or(ptr::null(), |h| h as *const libc::addrinfo),
            &mut res,
        )
    };
    if rc != 0 {
        let err = resolve_error(rc);
        debug!(
            "resolving failed; node={:?}, service={:?}, error={}",
            node, service, err
        );
        return Err(err);
    }

    // Frees the host list on return, including on translation errors.
    let host = HostList(res);
    let nodes = host.translate()?;
    debug!(
        "resolved; node={:?}, service={:?}, results={}",
        node,
        service,
        nodes.len()
    );
    Ok(AddrInfoList { nodes })
}

/// Releases a list returned by [`resolve`].
pub fn release(list: AddrInfoList) {
    trace!("releasing address-info list; results={}", list.len());
    drop(list);
}

fn to_cstring(s: &str) -> Result<CString> {
    CString::new(s).map_err(|_| Error::Resolve(ResolveError::NoName))
}

fn to_host_hints(hints: &AddrInfoHints) -> Result<libc::addrinfo> {
    // SAFETY: all zero is a valid `addrinfo`, with null pointers.
    let mut host: libc::addrinfo = unsafe { mem::zeroed() };
    host.ai_flags = hints.flags.to_host();
    host.ai_family = hints.family.to_host()?;
    host.ai_socktype = hints.socktype.map_or(0, SockType::to_host);
    host.ai_protocol = hints.protocol.to_host(hints.family);
    Ok(host)
}

fn resolve_error(rc: c_int) -> Error {
    let err = match rc {
        libc::EAI_SYSTEM => return Error::ResolveSystem(Errno::last()),
        libc::EAI_BADFLAGS => ResolveError::BadFlags,
        libc::EAI_NONAME => ResolveError::NoName,
        libc::EAI_AGAIN => ResolveError::Again,
        libc::EAI_FAIL => ResolveError::Fail,
        #[cfg(all(target_os = "linux", target_env = "gnu"))]
        libc::EAI_NODATA => ResolveError::NoData,
        libc::EAI_FAMILY => ResolveError::Family,
        libc::EAI_SOCKTYPE => ResolveError::SockType,
        libc::EAI_SERVICE => ResolveError::Service,
        libc::EAI_MEMORY => ResolveError::Memory,
        #[cfg(any(target_os = "linux", target_os = "freebsd", target_vendor = "apple"))]
        libc::EAI_OVERFLOW => ResolveError::Overflow,
        // Nothing closer in the mid-layer space.
        _ => ResolveError::Fail,
    };
    Error::Resolve(err)
}

/// Host result list, freed on drop.
struct HostList(*mut libc::addrinfo);

impl HostList {
    fn translate(&self) -> Result<Vec<AddrInfo>> {
        let mut nodes = Vec::new();
        let mut cur = self.0;
        while !cur.is_null() {
            // SAFETY: `getaddrinfo` returned a valid list, which lives until
            // `self` is dropped.
            let ai = unsafe { &*cur };
            nodes.push(translate_node(ai)?);
            cur = ai.ai_next;
        }
        Ok(nodes)
    }
}

impl Drop for HostList {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe { libc::freeaddrinfo(self.0) };
        }
    }
}

fn translate_node(ai: &libc::addrinfo) -> Result<AddrInfo> {
    let family = Family::from_host(ai.ai_family)?;
    let addr = if ai.ai_addr.is_null() {
        SockAddr::Unspecified
    } else {
        let mut storage = zeroed_storage();
        let len = (ai.ai_addrlen as usize).min(mem::size_of::<libc::sockaddr_storage>());
        // SAFETY: `ai_addr` points to `ai_addrlen` bytes, and `len` fits the
        // storage.
        unsafe {
            ptr::copy_nonoverlapping(
                ai.ai_addr.cast::<u8>(),
                (&mut storage as *mut libc::sockaddr_storage).cast::<u8>(),
                len,
            )
        };
        from_native(&storage, len as libc::socklen_t)?
    };
    let canonname = if ai.ai_canonname.is_null() {
        None
    } else {
        // SAFETY: the host NUL terminates the name.
        let name = unsafe { CStr::from_ptr(ai.ai_canonname) };
        Some(name.to_string_lossy().into_owned())
    };
    Ok(AddrInfo {
        flags: AiFlags::from_host(ai.ai_flags),
        family,
        socktype: SockType::from_host(ai.ai_socktype),
        protocol: Protocol(ai.ai_protocol),
        addr,
        canonname,
    })
}
