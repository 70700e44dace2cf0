use hmac::{Hmac, Mac};
use md5::{Digest as Md5Digest, Md5};
use sha3::{Shake128, Shake128Reader};

type HmacMd5 = Hmac<Md5>;

/// cmd key 固定后缀(协议常量,含连字符的 ASCII UUID 字面量)
const CMD_KEY_SUFFIX: &[u8; 36] = b"c48619fe-8f02-49e0-b9e9-edf763e17e21";

/// 请求头解密密钥: MD5(uuid || 固定后缀)
pub fn header_key(uuid: &[u8; 16]) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(uuid);
    hasher.update(CMD_KEY_SUFFIX);
    hasher.finalize().into()
}

/// 请求头解密 IV: MD5(timestamp_be64 重复 4 次)
pub fn header_iv(timestamp: u64) -> [u8; 16] {
    let ts = timestamp.to_be_bytes();
    let mut hasher = Md5::new();
    for _ in 0..4 {
        hasher.update(ts);
    }
    hasher.finalize().into()
}

/// 响应方向 key/iv 由请求方向逐一 MD5 派生
pub fn derive_response_key_iv(body_key: &[u8; 16], body_iv: &[u8; 16]) -> ([u8; 16], [u8; 16]) {
    (Md5::digest(body_key).into(), Md5::digest(body_iv).into())
}

/// ChaCha20-Poly1305 扩展密钥: MD5(K) || MD5(MD5(K))
pub fn chacha20_key(key: &[u8; 16]) -> [u8; 32] {
    let front = Md5::digest(key);
    let back = Md5::digest(front);
    let mut out = [0u8; 32];
    out[..16].copy_from_slice(&front);
    out[16..].copy_from_slice(&back);
    out
}

/// 认证标签校验: HMAC-MD5(uuid, timestamp_be64),constant time 比较
pub fn verify_auth_tag(uuid: &[u8; 16], timestamp: u64, tag: &[u8]) -> bool {
    let mut mac = HmacMd5::new_from_slice(uuid).unwrap();
    mac.update(&timestamp.to_be_bytes());
    mac.verify_slice(tag).is_ok()
}

pub fn fnv1a_hash(data: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c9dc5;
    for &byte in data {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(0x01000193);
    }
    hash
}

/// ShakeSizeParser masks frame lengths and sizes padding using a Shake128
/// keystream.
///
/// The keystream is one continuous XOF read across the whole body; for each
/// frame the padding draw (when enabled) comes before the length draw, and
/// skipping either desynchronizes every later frame.
pub struct ShakeSizeParser {
    reader: Shake128Reader,
}

impl ShakeSizeParser {
    /// `seed` is the direction IV when chunk masking is on, `None` otherwise.
    /// An unseeded parser still draws from the empty-input Shake128 stream.
    pub fn new(seed: Option<&[u8]>) -> Self {
        use sha3::digest::{ExtendableOutput, Update};
        let mut hasher = Shake128::default();
        if let Some(seed) = seed {
            hasher.update(seed);
        }
        Self {
            reader: hasher.finalize_xof(),
        }
    }

    fn next_mask(&mut self) -> u16 {
        use sha3::digest::XofReader;
        let mut buf = [0u8; 2];
        self.reader.read(&mut buf);
        u16::from_be_bytes(buf)
    }

    pub fn decode_size(&mut self, masked: u16) -> u16 {
        masked ^ self.next_mask()
    }

    pub fn next_padding_len(&mut self) -> u16 {
        self.next_mask() % 64
    }
}
