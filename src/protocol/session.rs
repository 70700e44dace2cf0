use std::fmt;

use crate::common::addr::Address;
use crate::common::error::{Error, Result};
use crate::protocol::crypto;

/// body 的 AEAD 套件(padding/security 字节低半字节)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityType {
    Legacy,
    Aes128Gcm,
    ChaCha20Poly1305,
    None,
}

impl SecurityType {
    /// 头部阶段接受 {1, 3, 4, 5};Legacy/None 在 body 阶段才被拒绝
    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            0x01 => Ok(SecurityType::Legacy),
            0x03 => Ok(SecurityType::Aes128Gcm),
            0x04 => Ok(SecurityType::ChaCha20Poly1305),
            0x05 => Ok(SecurityType::None),
            other => Err(Error::UnsupportedSecurity(other)),
        }
    }

    pub fn to_byte(&self) -> u8 {
        match self {
            SecurityType::Legacy => 0x01,
            SecurityType::Aes128Gcm => 0x03,
            SecurityType::ChaCha20Poly1305 => 0x04,
            SecurityType::None => 0x05,
        }
    }

    /// 该套件的 body 是否可由本解码器打开
    pub fn has_aead_body(&self) -> bool {
        matches!(self, SecurityType::Aes128Gcm | SecurityType::ChaCha20Poly1305)
    }
}

impl fmt::Display for SecurityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SecurityType::Legacy => "Legacy",
            SecurityType::Aes128Gcm => "AES-128-GCM",
            SecurityType::ChaCha20Poly1305 => "ChaCha20-Poly1305",
            SecurityType::None => "None",
        };
        f.write_str(name)
    }
}

/// 请求命令。Mux (0x03) 未实现,解析时直接拒绝。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Tcp,
    Udp,
}

impl Command {
    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            0x01 => Ok(Command::Tcp),
            0x02 => Ok(Command::Udp),
            other => Err(Error::UnsupportedCommand(other)),
        }
    }

    pub fn to_byte(&self) -> u8 {
        match self {
            Command::Tcp => 0x01,
            Command::Udp => 0x02,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Command::Tcp => "TCP",
            Command::Udp => "UDP",
        })
    }
}

/// option 字节低 5 位的具名展开;高 3 位保留,必须为零。
/// 只有 chunk_masking (M) 和 global_padding (P) 影响 body 解码。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// S: 标准 chunk stream
    pub chunk_stream: bool,
    /// R: 连接复用
    pub connection_reuse: bool,
    /// M: 长度掩码(SHAKE keystream 以方向 IV 作种子)
    pub chunk_masking: bool,
    /// P: 全局 padding
    pub global_padding: bool,
    /// A: 认证长度变体
    pub authenticated_length: bool,
}

impl RequestOptions {
    pub fn from_byte(b: u8) -> Result<Self> {
        if b >> 5 != 0 {
            return Err(Error::ReservedBitsSet(b));
        }
        Ok(Self {
            chunk_stream: b & 0x01 != 0,
            connection_reuse: b & 0x02 != 0,
            chunk_masking: b & 0x04 != 0,
            global_padding: b & 0x08 != 0,
            authenticated_length: b & 0x10 != 0,
        })
    }

    pub fn to_byte(&self) -> u8 {
        let mut b = 0u8;
        if self.chunk_stream {
            b |= 0x01;
        }
        if self.connection_reuse {
            b |= 0x02;
        }
        if self.chunk_masking {
            b |= 0x04;
        }
        if self.global_padding {
            b |= 0x08;
        }
        if self.authenticated_length {
            b |= 0x10;
        }
        b
    }
}

/// 请求头解出的会话参数。
///
/// 由请求方向的 HeaderCodec 填充一次,之后 body 解码与响应方向解码
/// 都把它当只读值使用。
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub timestamp: u64,
    pub version: u8,
    pub body_iv: [u8; 16],
    pub body_key: [u8; 16],
    pub response_header: u8,
    pub options: RequestOptions,
    pub padding_len: u8,
    pub security: SecurityType,
    pub command: Command,
    pub port: u16,
    pub address: Address,
}

impl Session {
    /// 响应方向的 (key, iv),由请求方向逐一 MD5 派生
    pub fn server_key_iv(&self) -> ([u8; 16], [u8; 16]) {
        crypto::derive_response_key_iv(&self.body_key, &self.body_iv)
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "vmess v{} {} {} security={} options=0x{:02x} padding={}",
            self.version,
            self.command,
            self.address,
            self.security,
            self.options.to_byte(),
            self.padding_len,
        )
    }
}
