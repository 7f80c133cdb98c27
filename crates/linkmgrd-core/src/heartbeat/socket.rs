//! Raw-socket transport for the software heartbeat engine (§4.1).
//!
//! Production code talks to an `AF_PACKET` raw socket filtered down to ICMP
//! Echo frames destined for this port's blade IP; tests substitute
//! [`InMemorySocket`] so the state machine above can be exercised without a
//! NIC.

use std::io;

use crate::error::ProbeError;

/// Transport boundary the heartbeat engine sends/receives raw Ethernet
/// frames through.
pub trait IcmpSocket: Send {
    fn send(&mut self, frame: &[u8]) -> io::Result<()>;
    /// Non-blocking receive: `Ok(None)` means nothing is queued right now.
    fn try_recv(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>>;
}

/// `AF_PACKET` raw socket bound to a single interface, with a BPF filter
/// restricting delivery to ICMP Echo Request/Reply (§4.1: "listen only for
/// heartbeat traffic, never the whole interface").
pub struct RawEthernetSocket {
    socket: socket2::Socket,
    iface: String,
}

impl RawEthernetSocket {
    #[cfg(target_os = "linux")]
    pub fn open(iface: &str) -> Result<Self, ProbeError> {
        use socket2::{Domain, Protocol, Type};

        let proto = Protocol::from((libc::ETH_P_ALL as u16).to_be() as i32);
        let socket = socket2::Socket::new(Domain::PACKET, Type::RAW, Some(proto)).map_err(|source| {
            ProbeError::SocketOpen {
                iface: iface.to_string(),
                source,
            }
        })?;
        socket.set_nonblocking(true).map_err(|source| ProbeError::SocketOpen {
            iface: iface.to_string(),
            source,
        })?;

        let if_index = interface_index(iface).map_err(|source| ProbeError::SocketBind {
            iface: iface.to_string(),
            source,
        })?;
        bind_to_interface(&socket, if_index).map_err(|source| ProbeError::SocketBind {
            iface: iface.to_string(),
            source,
        })?;
        attach_icmp_filter(&socket).map_err(|source| ProbeError::FilterAttach {
            iface: iface.to_string(),
            source,
        })?;

        Ok(Self {
            socket,
            iface: iface.to_string(),
        })
    }

    #[cfg(not(target_os = "linux"))]
    pub fn open(iface: &str) -> Result<Self, ProbeError> {
        Err(ProbeError::SocketOpen {
            iface: iface.to_string(),
            source: io::Error::new(io::ErrorKind::Unsupported, "raw AF_PACKET sockets require Linux"),
        })
    }

    pub fn iface(&self) -> &str {
        &self.iface
    }
}

#[cfg(target_os = "linux")]
fn interface_index(iface: &str) -> io::Result<libc::c_uint> {
    use std::ffi::CString;
    let cname = CString::new(iface).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "NUL in iface name"))?;
    let index = unsafe { libc::if_nametoindex(cname.as_ptr()) };
    if index == 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(index)
    }
}

#[cfg(target_os = "linux")]
fn bind_to_interface(socket: &socket2::Socket, if_index: libc::c_uint) -> io::Result<()> {
    use std::mem;
    use std::os::fd::AsRawFd;

    let mut addr: libc::sockaddr_ll = unsafe { mem::zeroed() };
    addr.sll_family = libc::AF_PACKET as u16;
    addr.sll_protocol = (libc::ETH_P_ALL as u16).to_be();
    addr.sll_ifindex = if_index as i32;

    let ret = unsafe {
        libc::bind(
            socket.as_raw_fd(),
            &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
            mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
        )
    };
    if ret != 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Attach a classic BPF program accepting only ICMP-over-IPv4 frames,
/// mirroring the kernel-side filtering the original engine installs so the
/// strand never wakes up on unrelated traffic.
#[cfg(target_os = "linux")]
fn attach_icmp_filter(socket: &socket2::Socket) -> io::Result<()> {
    use std::os::fd::AsRawFd;

    // ldh [12]; jeq #0x0800, next, reject; ldb [23]; jeq #1, accept, reject
    let program: [libc::sock_filter; 5] = [
        libc::sock_filter { code: 0x28, jt: 0, jf: 0, k: 12 },
        libc::sock_filter { code: 0x15, jt: 0, jf: 2, k: 0x0800 },
        libc::sock_filter { code: 0x30, jt: 0, jf: 0, k: 23 },
        libc::sock_filter { code: 0x15, jt: 0, jf: 1, k: 1 },
        libc::sock_filter { code: 0x06, jt: 0, jf: 0, k: 0x40000 },
    ];
    let fprog = libc::sock_fprog {
        len: program.len() as u16,
        filter: program.as_ptr() as *mut libc::sock_filter,
    };
    let ret = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_ATTACH_FILTER,
            &fprog as *const libc::sock_fprog as *const libc::c_void,
            std::mem::size_of::<libc::sock_fprog>() as libc::socklen_t,
        )
    };
    if ret != 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

impl IcmpSocket for RawEthernetSocket {
    fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        use std::io::Write;
        match (&self.socket).write(frame) {
            Ok(_) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn try_recv(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        use std::os::fd::AsRawFd;
        let ret = unsafe {
            libc::recv(
                self.socket.as_raw_fd(),
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                0,
            )
        };
        if ret >= 0 {
            Ok(Some(ret as usize))
        } else {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                Ok(None)
            } else {
                Err(err)
            }
        }
    }
}

/// In-memory stand-in for tests: frames pushed with `inject` are what the
/// next `try_recv` returns, and `sent` records every frame handed to
/// `send`.
#[derive(Default)]
pub struct InMemorySocket {
    pub sent: Vec<Vec<u8>>,
    inbound: std::collections::VecDeque<Vec<u8>>,
}

impl InMemorySocket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject(&mut self, frame: Vec<u8>) {
        self.inbound.push_back(frame);
    }
}

impl IcmpSocket for InMemorySocket {
    fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        self.sent.push(frame.to_vec());
        Ok(())
    }

    fn try_recv(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        match self.inbound.pop_front() {
            Some(frame) => {
                let n = frame.len().min(buf.len());
                buf[..n].copy_from_slice(&frame[..n]);
                Ok(Some(n))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_socket_round_trips_injected_frames() {
        let mut sock = InMemorySocket::new();
        sock.inject(vec![1, 2, 3]);
        let mut buf = [0u8; 16];
        let n = sock.try_recv(&mut buf).unwrap().unwrap();
        assert_eq!(&buf[..n], &[1, 2, 3]);
        assert!(sock.try_recv(&mut buf).unwrap().is_none());
    }

    #[test]
    fn in_memory_socket_records_sent_frames() {
        let mut sock = InMemorySocket::new();
        sock.send(&[9, 9]).unwrap();
        assert_eq!(sock.sent, vec![vec![9, 9]]);
    }
}
