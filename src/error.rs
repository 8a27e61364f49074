use thiserror::Error;

/// Why a single frame was not turned into a record.
///
/// Every variant is scoped to the frame it came from; none of them affect
/// the decoding of later frames.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid header prefix 0x{0:04X}")]
    HeaderPrefixMismatch(u16),

    #[error("packet_length {declared} does not match {received} bytes received")]
    LengthMismatch { declared: u16, received: usize },

    #[error("unhandled tcp function 0x{0:02X}")]
    UnsupportedFunction(u8),

    #[error("unsupported device function 0x{0:02X}")]
    UnsupportedDeviceFunction(u8),

    #[error("unrecognized frame: register={register} packet_length={packet_length}")]
    UnrecognizedFrame { register: u16, packet_length: u16 },

    #[error("truncated frame: needed {needed} bytes, {available} available")]
    TruncatedFrame { needed: usize, available: usize },
}

impl DecodeError {
    /// True for frames that are valid but carry no telemetry (heartbeats,
    /// parameter reads/writes), as opposed to frames that were rejected.
    pub fn is_unhandled(&self) -> bool {
        matches!(self, DecodeError::UnsupportedFunction(_))
    }

    /// Short stable name, used as a statistics key.
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::HeaderPrefixMismatch(_) => "header_prefix_mismatch",
            DecodeError::LengthMismatch { .. } => "length_mismatch",
            DecodeError::UnsupportedFunction(_) => "unsupported_function",
            DecodeError::UnsupportedDeviceFunction(_) => "unsupported_device_function",
            DecodeError::UnrecognizedFrame { .. } => "unrecognized_frame",
            DecodeError::TruncatedFrame { .. } => "truncated_frame",
        }
    }
}
