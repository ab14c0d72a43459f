mod decode;
pub mod encode;
mod error;

pub use decode::{Command, Decoder};
pub use error::ProtocolError;
