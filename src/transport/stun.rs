//! Minimal STUN binding client (RFC 5389), enough to learn the
//! server-reflexive address of the media socket.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use rand::RngCore;
use tokio::net::UdpSocket;

const MAGIC_COOKIE: u32 = 0x2112_A442;
const BINDING_REQUEST: u16 = 0x0001;
const BINDING_SUCCESS: u16 = 0x0101;
const ATTR_MAPPED_ADDRESS: u16 = 0x0001;
const ATTR_XOR_MAPPED_ADDRESS: u16 = 0x0020;
const HEADER_LEN: usize = 20;
const DEFAULT_PORT: u16 = 3478;
const FAMILY_V4: u8 = 0x01;
const FAMILY_V6: u8 = 0x02;

pub(crate) const PROBE_TIMEOUT: Duration = Duration::from_millis(1500);

#[derive(Debug, thiserror::Error)]
pub(crate) enum StunError {
    #[error("invalid STUN url: {0}")]
    InvalidUrl(String),
    #[error("could not resolve {0}")]
    Unresolved(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("malformed response: {0}")]
    Malformed(&'static str),
}

pub(crate) type TransactionId = [u8; 12];

/// `stun:host[:port]` to `(host, port)`.
pub(crate) fn parse_url(url: &str) -> Result<(String, u16), StunError> {
    let rest = url
        .strip_prefix("stun:")
        .ok_or_else(|| StunError::InvalidUrl(url.to_string()))?;
    let (host, port) = match rest.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse().map_err(|_| StunError::InvalidUrl(url.to_string()))?;
            (host, port)
        }
        None => (rest, DEFAULT_PORT),
    };
    if host.is_empty() {
        return Err(StunError::InvalidUrl(url.to_string()));
    }
    Ok((host.to_string(), port))
}

pub(crate) fn binding_request(transaction_id: &TransactionId) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN);
    buf.put_u16(BINDING_REQUEST);
    buf.put_u16(0);
    buf.put_u32(MAGIC_COOKIE);
    buf.put_slice(transaction_id);
    buf.freeze()
}

/// Extracts the mapped address from a binding success response for
/// `transaction_id`. XOR-MAPPED-ADDRESS wins over MAPPED-ADDRESS.
pub(crate) fn parse_binding_response(packet: &[u8], transaction_id: &TransactionId) -> Result<SocketAddr, StunError> {
    if packet.len() < HEADER_LEN {
        return Err(StunError::Malformed("short header"));
    }
    let mut header = &packet[..HEADER_LEN];
    let message_type = header.get_u16();
    let length = header.get_u16() as usize;
    let cookie = header.get_u32();
    if message_type != BINDING_SUCCESS {
        return Err(StunError::Malformed("not a binding success"));
    }
    if cookie != MAGIC_COOKIE || header != transaction_id {
        return Err(StunError::Malformed("transaction mismatch"));
    }
    if packet.len() < HEADER_LEN + length {
        return Err(StunError::Malformed("truncated attributes"));
    }

    let mut attrs = &packet[HEADER_LEN..HEADER_LEN + length];
    let mut mapped = None;
    while attrs.remaining() >= 4 {
        let attr_type = attrs.get_u16();
        let attr_len = attrs.get_u16() as usize;
        if attrs.remaining() < attr_len {
            return Err(StunError::Malformed("truncated attribute"));
        }
        let value = &attrs[..attr_len];
        match attr_type {
            ATTR_XOR_MAPPED_ADDRESS => return decode_address(value, Some(transaction_id)),
            ATTR_MAPPED_ADDRESS => mapped = Some(decode_address(value, None)?),
            _ => {}
        }
        // attributes are padded to 4 bytes
        let padded = (attr_len + 3) & !3;
        attrs.advance(padded.min(attrs.remaining()));
    }
    mapped.ok_or(StunError::Malformed("no mapped address"))
}

fn decode_address(mut value: &[u8], xor: Option<&TransactionId>) -> Result<SocketAddr, StunError> {
    if value.len() < 4 {
        return Err(StunError::Malformed("short address"));
    }
    value.advance(1);
    let family = value.get_u8();
    let mut port = value.get_u16();
    if xor.is_some() {
        port ^= (MAGIC_COOKIE >> 16) as u16;
    }
    let ip = match family {
        FAMILY_V4 if value.len() >= 4 => {
            let mut ip = value.get_u32();
            if xor.is_some() {
                ip ^= MAGIC_COOKIE;
            }
            IpAddr::V4(Ipv4Addr::from(ip))
        }
        FAMILY_V6 if value.len() >= 16 => {
            let mut ip = [0u8; 16];
            ip.copy_from_slice(&value[..16]);
            if let Some(transaction_id) = xor {
                let mut mask = [0u8; 16];
                mask[..4].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
                mask[4..].copy_from_slice(transaction_id);
                for (byte, m) in ip.iter_mut().zip(mask) {
                    *byte ^= m;
                }
            }
            IpAddr::V6(Ipv6Addr::from(ip))
        }
        _ => return Err(StunError::Malformed("unsupported address family")),
    };
    Ok(SocketAddr::new(ip, port))
}

/// Sends one binding request from `socket` and waits for the answer.
/// Must run before the socket is handed to the peer driver.
pub(crate) async fn probe(socket: &UdpSocket, url: &str, timeout: Duration) -> Result<SocketAddr, StunError> {
    let (host, port) = parse_url(url)?;
    let server = tokio::net::lookup_host((host.as_str(), port))
        .await?
        .find(|addr| addr.is_ipv4())
        .ok_or_else(|| StunError::Unresolved(host.clone()))?;

    let mut transaction_id = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut transaction_id);
    socket.send_to(&binding_request(&transaction_id), server).await?;

    let mut buf = [0u8; 1024];
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let (n, from) = tokio::time::timeout_at(deadline, socket.recv_from(&mut buf))
            .await
            .map_err(|_| StunError::Timeout(timeout))??;
        if from != server {
            continue;
        }
        match parse_binding_response(&buf[..n], &transaction_id) {
            Ok(addr) => {
                tracing::debug!("stun {} mapped us to {}", server, addr);
                return Ok(addr);
            }
            Err(StunError::Malformed("transaction mismatch")) => continue,
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TXID: TransactionId = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];

    fn response(attrs: &[(u16, Vec<u8>)]) -> Vec<u8> {
        let mut body = BytesMut::new();
        for (attr_type, value) in attrs {
            body.put_u16(*attr_type);
            body.put_u16(value.len() as u16);
            body.put_slice(value);
            while body.len() % 4 != 0 {
                body.put_u8(0);
            }
        }
        let mut packet = BytesMut::new();
        packet.put_u16(BINDING_SUCCESS);
        packet.put_u16(body.len() as u16);
        packet.put_u32(MAGIC_COOKIE);
        packet.put_slice(&TXID);
        packet.put_slice(&body);
        packet.to_vec()
    }

    fn xor_v4(addr: SocketAddr) -> Vec<u8> {
        let SocketAddr::V4(v4) = addr else { unreachable!() };
        let mut value = vec![0, FAMILY_V4];
        value.extend_from_slice(&(v4.port() ^ (MAGIC_COOKIE >> 16) as u16).to_be_bytes());
        value.extend_from_slice(&(u32::from(*v4.ip()) ^ MAGIC_COOKIE).to_be_bytes());
        value
    }

    #[test]
    fn urls() {
        assert_eq!(parse_url("stun:stun.l.google.com:19302").unwrap(), ("stun.l.google.com".into(), 19302));
        assert_eq!(parse_url("stun:example.org").unwrap(), ("example.org".into(), 3478));
        assert!(parse_url("turn:example.org:3478").is_err());
        assert!(parse_url("stun::3478").is_err());
        assert!(parse_url("stun:host:port").is_err());
    }

    #[test]
    fn request_header() {
        let request = binding_request(&TXID);
        assert_eq!(request.len(), 20);
        assert_eq!(&request[..4], &[0x00, 0x01, 0x00, 0x00]);
        assert_eq!(&request[4..8], &[0x21, 0x12, 0xA4, 0x42]);
        assert_eq!(&request[8..], &TXID);
    }

    #[test]
    fn xor_mapped_address_is_decoded() {
        let addr: SocketAddr = "203.0.113.7:54321".parse().unwrap();
        let packet = response(&[(0x8022, b"test".to_vec()), (ATTR_XOR_MAPPED_ADDRESS, xor_v4(addr))]);
        assert_eq!(parse_binding_response(&packet, &TXID).unwrap(), addr);
    }

    #[test]
    fn plain_mapped_address_is_a_fallback() {
        let mut value = vec![0, FAMILY_V4];
        value.extend_from_slice(&4000u16.to_be_bytes());
        value.extend_from_slice(&[198, 51, 100, 1]);
        let packet = response(&[(ATTR_MAPPED_ADDRESS, value)]);
        assert_eq!(parse_binding_response(&packet, &TXID).unwrap(), "198.51.100.1:4000".parse().unwrap());
    }

    #[test]
    fn foreign_transaction_is_rejected() {
        let addr: SocketAddr = "203.0.113.7:1".parse().unwrap();
        let packet = response(&[(ATTR_XOR_MAPPED_ADDRESS, xor_v4(addr))]);
        let other = [9u8; 12];
        assert!(matches!(
            parse_binding_response(&packet, &other),
            Err(StunError::Malformed("transaction mismatch"))
        ));
        assert!(parse_binding_response(&packet[..12], &TXID).is_err());
    }
}
