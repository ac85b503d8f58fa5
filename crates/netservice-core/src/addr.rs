//! Extraction of numeric host strings from raw socket address records
//!
//! The discovery stack hands over resolved addresses as raw `sockaddr`
//! buffers. This module interprets them just far enough to discriminate IPv4
//! from IPv6 and produce a numeric host literal. No hostname lookup is ever
//! performed.

use std::mem;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV6};
use thiserror::Error;

const SOCKADDR_IN_LEN: usize = mem::size_of::<libc::sockaddr_in>();
const SOCKADDR_IN6_LEN: usize = mem::size_of::<libc::sockaddr_in6>();

/// Errors produced while extracting an address from raw records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The record sequence was empty
    #[error("service has no address records")]
    NoAddress,

    /// The first record could not be parsed as a socket address
    #[error("malformed socket address record: {0}")]
    MalformedAddress(&'static str),
}

/// A raw socket address record as delivered by the discovery stack
///
/// The buffer follows the platform `sockaddr_in` / `sockaddr_in6` layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAddress(Vec<u8>);

impl RawAddress {
    /// Wraps a raw socket address buffer
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Builds a raw record from a socket address
    pub fn from_socket_addr(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(v4) => {
                let mut buf = vec![0u8; SOCKADDR_IN_LEN];
                write_family(&mut buf, libc::AF_INET as u16);
                buf[2..4].copy_from_slice(&v4.port().to_be_bytes());
                buf[4..8].copy_from_slice(&v4.ip().octets());
                Self(buf)
            }
            SocketAddr::V6(v6) => {
                let mut buf = vec![0u8; SOCKADDR_IN6_LEN];
                write_family(&mut buf, libc::AF_INET6 as u16);
                buf[2..4].copy_from_slice(&v6.port().to_be_bytes());
                buf[4..8].copy_from_slice(&v6.flowinfo().to_ne_bytes());
                buf[8..24].copy_from_slice(&v6.ip().octets());
                buf[24..28].copy_from_slice(&v6.scope_id().to_ne_bytes());
                Self(buf)
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parses the record into a socket address
    ///
    /// The address family discriminates IPv4 from IPv6; buffers of an
    /// unrecognized family or insufficient length are rejected.
    pub fn to_socket_addr(&self) -> Result<SocketAddr, AddressError> {
        let buf = self.0.as_slice();
        if buf.len() < 2 {
            return Err(AddressError::MalformedAddress(
                "record too short for an address family",
            ));
        }

        let family = address_family(buf) as i32;
        if family == libc::AF_INET {
            if buf.len() < SOCKADDR_IN_LEN {
                return Err(AddressError::MalformedAddress(
                    "record too short for sockaddr_in",
                ));
            }
            let port = u16::from_be_bytes([buf[2], buf[3]]);
            let ip = Ipv4Addr::new(buf[4], buf[5], buf[6], buf[7]);
            Ok(SocketAddr::new(IpAddr::V4(ip), port))
        } else if family == libc::AF_INET6 {
            if buf.len() < SOCKADDR_IN6_LEN {
                return Err(AddressError::MalformedAddress(
                    "record too short for sockaddr_in6",
                ));
            }
            let port = u16::from_be_bytes([buf[2], buf[3]]);
            let flowinfo = u32::from_ne_bytes([buf[4], buf[5], buf[6], buf[7]]);
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&buf[8..24]);
            let scope_id = u32::from_ne_bytes([buf[24], buf[25], buf[26], buf[27]]);
            Ok(SocketAddr::V6(SocketAddrV6::new(
                Ipv6Addr::from(octets),
                port,
                flowinfo,
                scope_id,
            )))
        } else {
            Err(AddressError::MalformedAddress("unrecognized address family"))
        }
    }
}

/// Extracts the numeric host string from a sequence of raw address records
///
/// Only the first record is consulted; an empty sequence yields
/// [`AddressError::NoAddress`]. The result is an IPv4/IPv6 literal suitable
/// for outbound connection attempts, though IPv6 link-local addresses remain
/// scoped to their interface.
pub fn extract_address(records: &[RawAddress]) -> Result<String, AddressError> {
    let record = records.first().ok_or(AddressError::NoAddress)?;
    let addr = record.to_socket_addr()?;
    Ok(addr.ip().to_string())
}

// BSD-derived platforms prefix sockaddr with a length byte and store the
// family in the second byte; elsewhere the family is a native-endian u16 at
// offset zero.
#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
fn address_family(buf: &[u8]) -> u16 {
    buf[1] as u16
}

#[cfg(not(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
)))]
fn address_family(buf: &[u8]) -> u16 {
    u16::from_ne_bytes([buf[0], buf[1]])
}

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
fn write_family(buf: &mut [u8], family: u16) {
    buf[0] = buf.len() as u8;
    buf[1] = family as u8;
}

#[cfg(not(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
)))]
fn write_family(buf: &mut [u8], family: u16) {
    buf[0..2].copy_from_slice(&family.to_ne_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_ipv4() {
        let record = RawAddress::from_socket_addr("127.0.0.1:1234".parse().unwrap());
        assert_eq!(extract_address(&[record]), Ok("127.0.0.1".to_string()));
    }

    #[test]
    fn test_extract_ipv6() {
        let record = RawAddress::from_socket_addr("[fe80::1]:8080".parse().unwrap());
        assert_eq!(extract_address(&[record]), Ok("fe80::1".to_string()));
    }

    #[test]
    fn test_empty_sequence() {
        assert_eq!(extract_address(&[]), Err(AddressError::NoAddress));
    }

    #[test]
    fn test_truncated_record() {
        let record = RawAddress::new(vec![0u8; 1]);
        assert_eq!(
            extract_address(&[record]),
            Err(AddressError::MalformedAddress(
                "record too short for an address family"
            ))
        );
    }

    #[test]
    fn test_unknown_family() {
        // AF_APPLETALK-sized garbage, long enough for the family probe
        let mut buf = vec![0u8; SOCKADDR_IN_LEN];
        buf[0] = 0xfe;
        buf[1] = 0xfe;
        let record = RawAddress::new(buf);
        assert!(matches!(
            extract_address(&[record]),
            Err(AddressError::MalformedAddress(_))
        ));
    }

    #[test]
    fn test_only_first_record_is_used() {
        let first = RawAddress::from_socket_addr("10.0.0.1:80".parse().unwrap());
        let second = RawAddress::from_socket_addr("10.0.0.2:80".parse().unwrap());
        assert_eq!(
            extract_address(&[first, second]),
            Ok("10.0.0.1".to_string())
        );
    }

    #[test]
    fn test_round_trip_preserves_port() {
        let addr: SocketAddr = "192.168.1.42:8089".parse().unwrap();
        let record = RawAddress::from_socket_addr(addr);
        assert_eq!(record.to_socket_addr(), Ok(addr));
    }
}
