pub mod body;
pub mod crypto;
pub mod decoder;
pub mod header;
pub mod session;

pub use decoder::{RequestDecoder, ResponseDecoder};
pub use session::{Command, RequestOptions, SecurityType, Session};
