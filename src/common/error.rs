use thiserror::Error;

/// 解码失败的种类。任何错误都终止当前解码调用,不返回部分结果;
/// 恢复策略(通常是丢弃整个包)由调用方决定。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("read past end of package")]
    UnexpectedEof,

    #[error("no timestamp in the auth window matched the tag")]
    AuthFailed,

    #[error("{0} called out of order")]
    InvalidState(&'static str),

    #[error("unsupported header version: {0}")]
    VersionMismatch(u8),

    #[error("reserved option bits set: 0x{0:02x}")]
    ReservedBitsSet(u8),

    #[error("unknown address type: 0x{0:02x}")]
    UnknownAddressType(u8),

    #[error("command 0x{0:02x} hasn't been implemented")]
    UnsupportedCommand(u8),

    #[error("header FNV1a checksum mismatch: expected 0x{expected:08x}, got 0x{actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("response header doesn't match the request")]
    ResponseHeaderMismatch,

    #[error("security type 0x{0:02x} has no decodable AEAD body")]
    UnsupportedSecurity(u8),

    #[error("AEAD tag verification failed for body frame {0}")]
    AuthTagMismatch(usize),

    #[error("domain name is not valid UTF-8")]
    InvalidDomain,
}

pub type Result<T> = std::result::Result<T, Error>;
