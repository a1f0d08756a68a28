//! TCP listener setup.
//!
//! The listener is created through raw sockets on Unix so `SO_REUSEADDR`
//! is set before bind — a dev server restarts constantly and must not trip
//! over TIME_WAIT. If the configured port is taken anyway, the next few
//! ports are tried before giving up.

use std::net::{IpAddr, SocketAddr, TcpListener};

use anyhow::{Context, Result, anyhow};

use crate::debug;

/// How many sequential ports to try past the configured one.
const MAX_PORT_RETRIES: u16 = 10;

/// Bind with retry; returns the listener and the address actually bound.
pub fn bind_with_retry(host: IpAddr, base_port: u16) -> Result<(TcpListener, SocketAddr)> {
    let mut last_error = None;

    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(host, port);
        match bind_reuseaddr(addr) {
            Ok(listener) => {
                let actual = listener.local_addr().context("local_addr failed")?;
                if offset > 0 {
                    debug!("serve"; "port {base_port} busy, using {port}");
                }
                return Ok((listener, actual));
            }
            Err(e) => {
                last_error = Some(e);
            }
        }
    }

    Err(anyhow!(
        "failed to bind {host} after {MAX_PORT_RETRIES} attempts: {}",
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

#[cfg(unix)]
fn bind_reuseaddr(addr: SocketAddr) -> std::io::Result<TcpListener> {
    use std::os::fd::FromRawFd;

    unsafe {
        let family = if addr.is_ipv4() {
            libc::AF_INET
        } else {
            libc::AF_INET6
        };
        let fd = libc::socket(family, libc::SOCK_STREAM, 0);
        if fd < 0 {
            return Err(std::io::Error::last_os_error());
        }

        let one: libc::c_int = 1;
        if libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            (&one as *const libc::c_int).cast(),
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        ) < 0
        {
            let err = std::io::Error::last_os_error();
            libc::close(fd);
            return Err(err);
        }

        let rc = match addr {
            SocketAddr::V4(v4) => {
                let sin = libc::sockaddr_in {
                    sin_family: libc::AF_INET as libc::sa_family_t,
                    sin_port: v4.port().to_be(),
                    sin_addr: libc::in_addr {
                        s_addr: u32::from_be_bytes(v4.ip().octets()).to_be(),
                    },
                    sin_zero: [0; 8],
                };
                libc::bind(
                    fd,
                    (&sin as *const libc::sockaddr_in).cast(),
                    std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
                )
            }
            SocketAddr::V6(v6) => {
                let mut sin6: libc::sockaddr_in6 = std::mem::zeroed();
                sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
                sin6.sin6_port = v6.port().to_be();
                sin6.sin6_addr.s6_addr = v6.ip().octets();
                libc::bind(
                    fd,
                    (&sin6 as *const libc::sockaddr_in6).cast(),
                    std::mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t,
                )
            }
        };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            libc::close(fd);
            return Err(err);
        }

        if libc::listen(fd, 128) < 0 {
            let err = std::io::Error::last_os_error();
            libc::close(fd);
            return Err(err);
        }

        Ok(TcpListener::from_raw_fd(fd))
    }
}

#[cfg(not(unix))]
fn bind_reuseaddr(addr: SocketAddr) -> std::io::Result<TcpListener> {
    TcpListener::bind(addr)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_bind_ephemeral() {
        // Port 0: the OS picks; retry logic is not exercised but the raw
        // socket path is
        let (listener, addr) = bind_with_retry(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).unwrap();
        assert_ne!(addr.port(), 0);
        drop(listener);
    }

    #[test]
    fn test_retry_past_busy_port() {
        let (first, addr) = bind_with_retry(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).unwrap();
        // The same port is now busy; binding it again should slide to the
        // next one
        let (second, addr2) = bind_with_retry(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port()).unwrap();
        assert_ne!(addr.port(), addr2.port());
        drop(first);
        drop(second);
    }
}
