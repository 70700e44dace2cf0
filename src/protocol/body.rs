use aes_gcm::aead::Aead;
use aes_gcm::{Aes128Gcm, KeyInit, Nonce};
use chacha20poly1305::ChaCha20Poly1305;
use tracing::{debug, trace};

use crate::common::error::{Error, Result};
use crate::common::reader::ByteCursor;
use crate::protocol::crypto::{self, ShakeSizeParser};
use crate::protocol::session::{RequestOptions, SecurityType};

/// 每个方向一个 AEAD 实例;nonce = 帧序号 be16 || 方向 IV[2..12]
enum BodyCipher {
    Gcm(Aes128Gcm),
    ChaCha(ChaCha20Poly1305),
}

impl BodyCipher {
    fn new(security: SecurityType, key: &[u8; 16]) -> Result<Self> {
        match security {
            SecurityType::Aes128Gcm => Ok(BodyCipher::Gcm(Aes128Gcm::new(key.into()))),
            SecurityType::ChaCha20Poly1305 => {
                let extended = crypto::chacha20_key(key);
                Ok(BodyCipher::ChaCha(ChaCha20Poly1305::new((&extended).into())))
            }
            other => Err(Error::UnsupportedSecurity(other.to_byte())),
        }
    }

    fn open(&self, nonce: &[u8; 12], sealed: &[u8]) -> std::result::Result<Vec<u8>, aes_gcm::aead::Error> {
        match self {
            BodyCipher::Gcm(cipher) => cipher.decrypt(Nonce::from_slice(nonce), sealed),
            BodyCipher::ChaCha(cipher) => cipher.decrypt(Nonce::from_slice(nonce), sealed),
        }
    }
}

/// 方向无关的 AEAD 帧循环。
///
/// 请求方向传 body_key/body_iv,响应方向传派生的 server_key/server_iv,
/// 帧协议完全相同。循环直到 `data` 耗尽,返回按序的明文帧。
pub fn decode_stream(
    data: &[u8],
    key: &[u8; 16],
    iv: &[u8; 16],
    options: &RequestOptions,
    security: SecurityType,
) -> Result<Vec<Vec<u8>>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let cipher = BodyCipher::new(security, key)?;

    // 一条连续的 keystream 贯穿整个循环
    let seed = if options.chunk_masking { Some(&iv[..]) } else { None };
    let mut shake = ShakeSizeParser::new(seed);

    let mut nonce = [0u8; 12];
    nonce[2..].copy_from_slice(&iv[2..12]);

    let mut reader = ByteCursor::new(data);
    let mut frames = Vec::new();
    let mut index: u16 = 0;

    while !reader.exhausted() {
        // padding 在长度掩码之前取,即使最终被丢弃也必须消费 keystream
        let padding = if options.global_padding {
            shake.next_padding_len() as usize
        } else {
            0
        };
        let fake_len = reader.read_u16_be()?;
        let real_len = shake.decode_size(fake_len) as usize;
        let chunk = reader.read(real_len)?;

        let sealed_len = real_len.checked_sub(padding).ok_or(Error::UnexpectedEof)?;
        let sealed = &chunk[..sealed_len];

        nonce[..2].copy_from_slice(&index.to_be_bytes());

        // 零长度终结帧没有 tag,按空帧收下
        if sealed.is_empty() {
            frames.push(Vec::new());
            index = index.wrapping_add(1);
            continue;
        }

        let plain = cipher
            .open(&nonce, sealed)
            .map_err(|_| Error::AuthTagMismatch(index as usize))?;
        trace!(frame = index, len = plain.len(), "body frame opened");
        frames.push(plain);
        index = index.wrapping_add(1);
    }

    debug!(frames = frames.len(), bytes = data.len(), "body decoded");
    Ok(frames)
}
