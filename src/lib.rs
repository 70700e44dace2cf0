//! Passive decoder for legacy VMess packages.
//!
//! 给定抓到的原始密文和密钥材料,离线还原两个方向的内容:请求方向的
//! 会话参数(目标地址、AEAD 套件、选项)与明文分片,以及配对响应方向
//! 的明文分片。纯被动解码:不含网络 I/O,不含加密方向。
//!
//! ```no_run
//! use openvmess::{RequestDecoder, ResponseDecoder};
//!
//! # fn main() -> openvmess::Result<()> {
//! let uuid = "b831381d-6324-4d53-ad4f-8cda48b30811".parse().unwrap();
//! # let (client_pkg, server_pkg): (Vec<u8>, Vec<u8>) = (vec![], vec![]);
//! let mut request = RequestDecoder::new(uuid, &client_pkg);
//! request.authenticate(None)?;
//! let session = request.decode_header()?;
//! let client_frames = request.decode_body()?;
//!
//! let mut response = ResponseDecoder::from_session(&session, &server_pkg);
//! response.decode_header()?;
//! let server_frames = response.decode_body()?;
//! # Ok(())
//! # }
//! ```

pub mod common;
pub mod protocol;

pub use common::addr::Address;
pub use common::error::{Error, Result};
pub use protocol::decoder::{RequestDecoder, ResponseDecoder};
pub use protocol::session::{Command, RequestOptions, SecurityType, Session};
