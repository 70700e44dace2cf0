use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::common::error::{Error, Result};
use crate::common::reader::ByteCursor;

/// 请求头携带的目标地址
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    Ip(SocketAddr),
    Domain(String, u16),
}

impl Address {
    pub fn port(&self) -> u16 {
        match self {
            Address::Ip(addr) => addr.port(),
            Address::Domain(_, port) => *port,
        }
    }

    pub fn host(&self) -> String {
        match self {
            Address::Ip(addr) => addr.ip().to_string(),
            Address::Domain(domain, _) => domain.clone(),
        }
    }

    /// 从 VMess 请求头读取地址
    /// atyp: 0x01=IPv4, 0x02=Domain(1 字节长度前缀), 0x03=IPv6
    pub fn decode_vmess(atyp: u8, reader: &mut ByteCursor<'_>, port: u16) -> Result<Self> {
        match atyp {
            0x01 => {
                let o = reader.read(4)?;
                let ip = Ipv4Addr::new(o[0], o[1], o[2], o[3]);
                Ok(Address::Ip(SocketAddr::new(IpAddr::V4(ip), port)))
            }
            0x02 => {
                let len = reader.read_u8()? as usize;
                let raw = reader.read(len)?;
                let domain = String::from_utf8(raw.to_vec()).map_err(|_| Error::InvalidDomain)?;
                Ok(Address::Domain(domain, port))
            }
            0x03 => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(reader.read(16)?);
                let ip = Ipv6Addr::from(octets);
                Ok(Address::Ip(SocketAddr::new(IpAddr::V6(ip), port)))
            }
            other => Err(Error::UnknownAddressType(other)),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Ip(addr) => write!(f, "{}", addr),
            Address::Domain(domain, port) => write!(f, "{}:{}", domain, port),
        }
    }
}
