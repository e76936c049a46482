//! Scatter-gather message translation.
//!
//! [`SendMsg`] and [`RecvMsg`] describe a `sendmsg(2)`/`recvmsg(2)` call in
//! mid-layer terms. They are turned into a host `msghdr` right before the
//! host call. Buffers are handed to the host in order and are never
//! coalesced or split.

use std::io::{IoSlice, IoSliceMut};
use std::{fmt, mem, ptr};

use libc::c_uint;
use log::debug;

use crate::addr::native::{from_native, to_native, zeroed_storage};
use crate::addr::SockAddr;
use crate::errno::Errno;
use crate::error::{Error, Result};
use crate::flags::MsgFlags;

/// An outgoing message.
pub struct SendMsg<'a> {
    addr: Option<&'a SockAddr>,
    bufs: &'a [IoSlice<'a>],
    control: &'a [u8],
}

impl<'a> SendMsg<'a> {
    /// Creates a message sending `bufs`, in order.
    pub fn new(bufs: &'a [IoSlice<'a>]) -> SendMsg<'a> {
        SendMsg {
            addr: None,
            bufs,
            control: &[],
        }
    }

    /// Sets the destination address.
    pub fn with_addr(mut self, addr: &'a SockAddr) -> SendMsg<'a> {
        self.addr = Some(addr);
        self
    }

    /// Sets the ancillary data, in the host's `cmsghdr` format, see
    /// [`encode_control`].
    pub fn with_control(mut self, control: &'a [u8]) -> SendMsg<'a> {
        self.control = control;
        self
    }

    /// Total number of bytes in the buffers.
    pub fn len(&self) -> usize {
        self.bufs.iter().map(|buf| buf.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for SendMsg<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendMsg")
            .field("addr", &self.addr)
            .field("bufs", &self.bufs.len())
            .field("len", &self.len())
            .field("control", &self.control.len())
            .finish()
    }
}

/// An incoming message.
pub struct RecvMsg<'a, 'b> {
    bufs: &'a mut [IoSliceMut<'b>],
    control: &'a mut [u8],
}

impl<'a, 'b> RecvMsg<'a, 'b> {
    /// Creates a message receiving into `bufs`, in order.
    pub fn new(bufs: &'a mut [IoSliceMut<'b>]) -> RecvMsg<'a, 'b> {
        RecvMsg {
            bufs,
            control: &mut [],
        }
    }

    /// Sets the buffer receiving ancillary data.
    pub fn with_control(mut self, control: &'a mut [u8]) -> RecvMsg<'a, 'b> {
        self.control = control;
        self
    }

    /// Total number of bytes the buffers can hold.
    pub fn capacity(&self) -> usize {
        self.bufs.iter().map(|buf| buf.len()).sum()
    }
}

impl fmt::Debug for RecvMsg<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecvMsg")
            .field("bufs", &self.bufs.len())
            .field("capacity", &self.capacity())
            .field("control", &self.control.len())
            .finish()
    }
}

/// What the host reported about a received message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecvMeta {
    /// Number of bytes received.
    pub len: usize,
    /// Source address, if the host reported one.
    pub addr: Option<SockAddr>,
    /// Number of bytes of ancillary data received.
    pub control_len: usize,
    /// Output flags, e.g. [`MsgFlags::TRUNC`].
    pub flags: MsgFlags,
}

/// A send translated to host types.
///
/// Owns the native address so the `msghdr` built by [`HostSend::header`]
/// stays valid while `self` is alive.
pub(crate) struct HostSend<'m> {
    name: Option<(libc::sockaddr_storage, libc::socklen_t)>,
    msg: &'m SendMsg<'m>,
}

/// Translates `msg`, failing before the host is called if the address
/// can't be represented.
pub(crate) fn translate_send<'m>(msg: &'m SendMsg<'m>) -> Result<HostSend<'m>> {
    let name = msg.addr.map(to_native).transpose()?;
    Ok(HostSend { name, msg })
}

impl HostSend<'_> {
    /// Returns the host header, only valid while `self` isn't moved.
    pub(crate) fn header(&mut self) -> libc::msghdr {
        // SAFETY: all zero is a valid `msghdr`, some platforms have padding
        // fields.
        let mut hdr: libc::msghdr = unsafe { mem::zeroed() };
        if let Some((storage, len)) = self.name.as_mut() {
            hdr.msg_name = (storage as *mut libc::sockaddr_storage).cast();
            hdr.msg_namelen = *len;
        }
        // `IoSlice` is guaranteed to be ABI compatible with `iovec`.
        hdr.msg_iov = self.msg.bufs.as_ptr() as *mut libc::iovec;
        hdr.msg_iovlen = self.msg.bufs.len() as _;
        if !self.msg.control.is_empty() {
            // The host only reads the control region on send.
            hdr.msg_control = self.msg.control.as_ptr() as *mut libc::c_void;
            hdr.msg_controllen = self.msg.control.len() as _;
        }
        hdr
    }
}

/// Storage for a receive translated to host types.
pub(crate) struct HostRecv {
    name: libc::sockaddr_storage,
}

impl HostRecv {
    pub(crate) fn new() -> HostRecv {
        HostRecv {
            name: zeroed_storage(),
        }
    }

    /// Returns the host header for `msg`, only valid while neither `self`
    /// nor `msg` is moved.
    pub(crate) fn header(&mut self, msg: &mut RecvMsg<'_, '_>) -> libc::msghdr {
        // SAFETY: see `HostSend::header`.
        let mut hdr: libc::msghdr = unsafe { mem::zeroed() };
        hdr.msg_name = (&mut self.name as *mut libc::sockaddr_storage).cast();
        hdr.msg_namelen = mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
        // `IoSliceMut` is guaranteed to be ABI compatible with `iovec`.
        hdr.msg_iov = msg.bufs.as_mut_ptr().cast::<libc::iovec>();
        hdr.msg_iovlen = msg.bufs.len() as _;
        if !msg.control.is_empty() {
            hdr.msg_control = msg.control.as_mut_ptr().cast();
            hdr.msg_controllen = msg.control.len() as _;
        }
        hdr
    }

    /// Translates what the host reported in `hdr` after receiving `len`
    /// bytes.
    ///
    /// The data is already received at this point, a source address that
    /// can't be translated is dropped rather than failing the receive.
    pub(crate) fn finish(&self, hdr: &libc::msghdr, len: usize) -> RecvMeta {
        let addr = match hdr.msg_namelen {
            0 => None,
            namelen => match from_native(&self.name, namelen) {
                Ok(SockAddr::Unspecified) => None,
                Ok(addr) => Some(addr),
                Err(err) => {
                    debug!(
                        "dropping untranslatable source address; family={}, error={}",
                        self.name.ss_family, err
                    );
                    None
                }
            },
        };
        RecvMeta {
            len,
            addr,
            control_len: hdr.msg_controllen as usize,
            flags: MsgFlags::from_host(hdr.msg_flags),
        }
    }
}

/// Returns the number of bytes needed to hold one control message with
/// `data_len` bytes of data.
#[allow(unused_unsafe)] // Safe functions in newer `libc` versions.
pub fn control_space(data_len: usize) -> usize {
    unsafe { libc::CMSG_SPACE(data_len as c_uint) as usize }
}

/// Value of `cmsg_len` for a message with `data_len` bytes of data.
#[allow(unused_unsafe)]
fn control_len(data_len: usize) -> usize {
    unsafe { libc::CMSG_LEN(data_len as c_uint) as usize }
}

/// Length of the, aligned, control message header.
fn control_header_len() -> usize {
    control_len(0)
}

/// Appends a control message to `buf` at `offset`, returning the offset of
/// the next message.
///
/// Fails with `ENOBUFS` if `buf` can't hold the message, without writing
/// anything.
pub fn encode_control(
    buf: &mut [u8],
    offset: usize,
    level: i32,
    ty: i32,
    data: &[u8],
) -> Result<usize> {
    let space = control_space(data.len());
    if buf.len() < offset || buf.len() - offset < space {
        return Err(Error::Host(Errno::NoBufs));
    }
    let buf = &mut buf[offset..offset + space];
    buf.fill(0);

    // SAFETY: all zero is a valid `cmsghdr`.
    let mut cmsg: libc::cmsghdr = unsafe { mem::zeroed() };
    cmsg.cmsg_len = control_len(data.len()) as _;
    cmsg.cmsg_level = level;
    cmsg.cmsg_type = ty;
    // SAFETY: `buf` holds at least `space` bytes, which is larger than the
    // header. The control buffer may be unaligned.
    unsafe { ptr::write_unaligned(buf.as_mut_ptr().cast::<libc::cmsghdr>(), cmsg) };
    let header_len = control_header_len();
    buf[header_len..header_len + data.len()].copy_from_slice(data);
    Ok(offset + space)
}

/// A single received control message.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ControlMessage<'a> {
    pub level: i32,
    pub ty: i32,
    pub data: &'a [u8],
}

/// Iterator over the control messages in a received control region.
///
/// Only pass the first [`RecvMeta::control_len`] bytes of the control
/// buffer.
#[derive(Clone, Debug)]
pub struct ControlMessages<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> ControlMessages<'a> {
    pub fn new(buf: &'a [u8]) -> ControlMessages<'a> {
        ControlMessages { buf, offset: 0 }
    }
}

impl<'a> Iterator for ControlMessages<'a> {
    type Item = ControlMessage<'a>;

    fn next(&mut self) -> Option<ControlMessage<'a>> {
        let rest = &self.buf[self.offset.min(self.buf.len())..];
        if rest.len() < mem::size_of::<libc::cmsghdr>() {
            return None;
        }
        // SAFETY: `rest` holds at least a header, which may be unaligned.
        let cmsg = unsafe { ptr::read_unaligned(rest.as_ptr().cast::<libc::cmsghdr>()) };
        let header_len = control_header_len();
        let len = cmsg.cmsg_len as usize;
        if len < header_len || len > rest.len() {
            // Truncated (`MSG_CTRUNC`) or malformed.
            return None;
        }
        self.offset += control_space(len - header_len);
        Some(ControlMessage {
            level: cmsg.cmsg_level,
            ty: cmsg.cmsg_type,
            data: &rest[header_len..len],
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::{IoSlice, IoSliceMut};
    use std::net::Ipv4Addr;

    use super::{
        control_space, encode_control, translate_send, ControlMessages, HostRecv, RecvMsg,
        SendMsg,
    };
    use crate::addr::{InetAddr, SockAddr};
    use crate::errno::Errno;
    use crate::error::Error;

    #[test]
    fn send_header_preserves_buffers() {
        let (a, b, c) = (b"one".as_slice(), b"".as_slice(), b"three".as_slice());
        let bufs = [IoSlice::new(a), IoSlice::new(b), IoSlice::new(c)];
        let addr = SockAddr::V4(InetAddr::new(Ipv4Addr::LOCALHOST, 9));
        let msg = SendMsg::new(&bufs).with_addr(&addr);
        assert_eq!(msg.len(), 8);

        let mut host = translate_send(&msg).unwrap();
        let hdr = host.header();
        assert_eq!(hdr.msg_iovlen as usize, 3);
        let iov = unsafe { std::slice::from_raw_parts(hdr.msg_iov, 3) };
        assert_eq!(iov[0].iov_base as *const u8, a.as_ptr());
        assert_eq!(iov[0].iov_len, 3);
        assert_eq!(iov[1].iov_len, 0);
        assert_eq!(iov[2].iov_base as *const u8, c.as_ptr());
        assert_eq!(iov[2].iov_len, 5);
        assert_eq!(
            hdr.msg_namelen as usize,
            std::mem::size_of::<libc::sockaddr_in>()
        );
        assert!(hdr.msg_control.is_null());
    }

    #[test]
    fn untranslatable_source_address() {
        let mut buf = [0u8; 4];
        let mut bufs = [IoSliceMut::new(&mut buf)];
        let mut msg = RecvMsg::new(&mut bufs);
        let mut host = HostRecv::new();
        let mut hdr = host.header(&mut msg);

        // A host family without a mid-layer value.
        host.name.ss_family = libc::AF_APPLETALK as libc::sa_family_t;
        hdr.msg_namelen = 16;
        let meta = host.finish(&hdr, 3);
        assert_eq!(meta.len, 3);
        assert_eq!(meta.addr, None);
    }

    #[test]
    fn control_messages() {
        let mut buf = vec![0u8; control_space(4) + control_space(3)];
        let next = encode_control(&mut buf, 0, 1, 2, &[1, 2, 3, 4]).unwrap();
        assert_eq!(next, control_space(4));
        let end = encode_control(&mut buf, next, 3, 4, &[5, 6, 7]).unwrap();
        assert_eq!(end, buf.len());

        let msgs: Vec<_> = ControlMessages::new(&buf).collect();
        assert_eq!(msgs.len(), 2);
        assert_eq!((msgs[0].level, msgs[0].ty, msgs[0].data), (1, 2, &[1, 2, 3, 4][..]));
        assert_eq!((msgs[1].level, msgs[1].ty, msgs[1].data), (3, 4, &[5, 6, 7][..]));
    }

    #[test]
    fn control_buffer_too_small() {
        let mut buf = vec![0xAAu8; control_space(8) - 1];
        assert_eq!(
            encode_control(&mut buf, 0, 1, 1, &[0; 8]),
            Err(Error::Host(Errno::NoBufs))
        );
        assert!(buf.iter().all(|b| *b == 0xAA));
    }

    #[test]
    fn truncated_control_region() {
        let mut buf = vec![0u8; control_space(16)];
        encode_control(&mut buf, 0, 1, 1, &[9; 16]).unwrap();
        assert_eq!(ControlMessages::new(&buf[..control_space(4)]).count(), 0);
        assert_eq!(ControlMessages::new(&[]).count(), 0);
    }
}
