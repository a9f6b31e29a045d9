//! Host IP resolution for summary records.

use std::net::IpAddr;
use tracing::debug;

/// Environment variable that overrides every other source.
pub const HOST_IP_ENV: &str = "MYPRVIP";

/// Resolve the address reported in the first column of summary rows.
///
/// Order: `MYPRVIP`, the configured `host_ip`, then the first non-loopback
/// IPv4 address among the host's interfaces.
pub fn resolve_host_ip(configured: Option<&str>) -> Option<String> {
    resolve_host_ip_with(std::env::var(HOST_IP_ENV).ok(), configured, interface_addrs)
}

fn resolve_host_ip_with(
    env: Option<String>,
    configured: Option<&str>,
    interfaces: impl FnOnce() -> Vec<IpAddr>,
) -> Option<String> {
    let non_empty = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };
    if let Some(ip) = env.as_deref().and_then(non_empty) {
        debug!(source = HOST_IP_ENV, "host ip from environment");
        return Some(ip);
    }
    if let Some(ip) = configured.and_then(non_empty) {
        return Some(ip);
    }
    first_non_loopback_ipv4(&interfaces())
}

fn first_non_loopback_ipv4(addrs: &[IpAddr]) -> Option<String> {
    addrs
        .iter()
        .find(|addr| addr.is_ipv4() && !addr.is_loopback())
        .map(|addr| addr.to_string())
}

/// IPv4 addresses of every interface, in the order the system lists them.
#[cfg(unix)]
fn interface_addrs() -> Vec<IpAddr> {
    use std::net::Ipv4Addr;

    let mut head: *mut libc::ifaddrs = std::ptr::null_mut();
    // SAFETY: on success `head` owns a list released by freeifaddrs below.
    if unsafe { libc::getifaddrs(&mut head) } != 0 {
        debug!(error = %std::io::Error::last_os_error(), "getifaddrs failed");
        return Vec::new();
    }

    let mut addrs = Vec::new();
    let mut cursor = head;
    while !cursor.is_null() {
        // SAFETY: `cursor` is a live node of the getifaddrs list.
        let ifa = unsafe { &*cursor };
        if !ifa.ifa_addr.is_null() {
            // SAFETY: ifa_addr is non-null and points at a sockaddr whose
            // family says whether it is a sockaddr_in.
            let family = unsafe { (*ifa.ifa_addr).sa_family };
            if i32::from(family) == libc::AF_INET {
                let sin = unsafe { &*(ifa.ifa_addr as *const libc::sockaddr_in) };
                let ip = Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr));
                addrs.push(IpAddr::V4(ip));
            }
        }
        cursor = ifa.ifa_next;
    }
    // SAFETY: `head` came from a successful getifaddrs and is freed once.
    unsafe { libc::freeifaddrs(head) };
    addrs
}

#[cfg(not(unix))]
fn interface_addrs() -> Vec<IpAddr> {
    Vec::new()
}
