use thiserror::Error;

/// Fatal framing faults. Any of these means the byte stream can no longer
/// be trusted and the connection must be dropped.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unexpected byte {0:#04x} at frame start")]
    UnexpectedByte(u8),
    #[error("length is not a decimal integer")]
    InvalidLength,
    #[error("length {0} out of range")]
    LengthOutOfRange(i64),
    #[error("bulk string payload missing CRLF terminator")]
    MissingTerminator,
}
