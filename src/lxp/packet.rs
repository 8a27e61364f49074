use crate::error::DecodeError;
use crate::lxp::layout::{HEADER_SIZE, TRANSLATED_DATA_SIZE, UNCOUNTED_BYTES};

use nom::{bytes::complete::take, combinator::map, IResult};
use nom_derive::{Nom, Parse};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Serialize, Serializer};

/// Magic at the start of every frame, `A1 1A` on the wire.
pub const PREFIX: u16 = 0x1AA1;

// {{{ TcpFunction
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum TcpFunction {
    Heartbeat = 0xC1,
    TranslatedData = 0xC2,
    ReadParam = 0xC3,
    WriteParam = 0xC4,
}
// }}}

// {{{ DeviceFunction
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum DeviceFunction {
    ReadHold = 0x03,
    ReadInput = 0x04,
    WriteSingle = 0x06,
    WriteMulti = 0x10,
}
// }}}

// Serial {{{
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Serial([u8; 10]);

impl Serial {
    pub fn new(input: [u8; 10]) -> Self {
        Self(input)
    }

    pub fn data(&self) -> [u8; 10] {
        self.0
    }

    fn parse_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        map(take(10usize), |b: &[u8]| {
            let mut r = [0; 10];
            r.copy_from_slice(b);
            Self(r)
        })(input)
    }

    /// Serial as text, without the trailing NUL/space/0xFF fill some
    /// firmware pads short serials with.
    pub fn trimmed(&self) -> String {
        let end = self
            .0
            .iter()
            .rposition(|b| !matches!(b, 0x00 | b' ' | 0xFF))
            .map_or(0, |i| i + 1);

        String::from_utf8_lossy(&self.0[..end]).into_owned()
    }
}

impl Serialize for Serial {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.trimmed())
    }
}

impl std::str::FromStr for Serial {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() > 10 {
            anyhow::bail!("{} must be at most 10 characters", s);
        }

        let mut r = [0; 10];
        r[..s.len()].copy_from_slice(s.as_bytes());
        Ok(Self(r))
    }
}

impl std::fmt::Display for Serial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.trimmed())
    }
}

impl std::fmt::Debug for Serial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.trimmed())
    }
} // }}}

/////////////
//
// HEADER
//
/////////////

#[derive(Clone, Debug, Eq, PartialEq, Nom)]
#[nom(LittleEndian)]
pub struct Header {
    pub prefix: u16,
    pub protocol_version: u16,
    pub packet_length: u16,
    pub address: u8,
    pub function: u8,
    #[nom(Parse = "Serial::parse_bytes")]
    pub serial_number: Serial,
    pub reserved: u16,
}

impl Header {
    /// Parses and validates the envelope of a complete frame.
    pub fn decode(frame: &[u8]) -> Result<Self, DecodeError> {
        let truncated = DecodeError::TruncatedFrame {
            needed: HEADER_SIZE,
            available: frame.len(),
        };

        if frame.len() < HEADER_SIZE {
            return Err(truncated);
        }

        let (_, header) = Self::parse(frame).map_err(|_| truncated)?;

        if header.prefix != PREFIX {
            return Err(DecodeError::HeaderPrefixMismatch(header.prefix));
        }

        if usize::from(header.packet_length) + UNCOUNTED_BYTES != frame.len() {
            return Err(DecodeError::LengthMismatch {
                declared: header.packet_length,
                received: frame.len(),
            });
        }

        Ok(header)
    }

    pub fn tcp_function(&self) -> Option<TcpFunction> {
        TcpFunction::try_from(self.function).ok()
    }

    pub fn is_data(&self) -> bool {
        self.tcp_function() == Some(TcpFunction::TranslatedData)
    }
}

/////////////
//
// TRANSLATED DATA
//
/////////////

#[derive(Clone, Debug, Eq, PartialEq, Nom)]
#[nom(LittleEndian)]
pub struct TranslatedData {
    pub address: u8,
    pub device_function: u8,
    #[nom(Parse = "Serial::parse_bytes")]
    pub serial_number: Serial,
    pub register: u16,
    // followed by the value length byte, which is not used
}

impl TranslatedData {
    /// Parses the sub-header at the start of `input` (the bytes after the
    /// frame header) and returns it with the register values that follow.
    pub fn decode(input: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let truncated = DecodeError::TruncatedFrame {
            needed: TRANSLATED_DATA_SIZE,
            available: input.len(),
        };

        if input.len() < TRANSLATED_DATA_SIZE {
            return Err(truncated);
        }

        let (_, data) = Self::parse(input).map_err(|_| truncated)?;

        Ok((data, &input[TRANSLATED_DATA_SIZE..]))
    }
}

/// Checks the Modbus CRC16 the device appends after the translated data.
/// Decoding never depends on this; it is available to callers that want to
/// drop corrupted frames.
pub fn checksum_valid(frame: &[u8]) -> bool {
    let len = frame.len();
    if len < HEADER_SIZE + 2 {
        return false;
    }

    let data = &frame[HEADER_SIZE..len - 2];
    checksum(data) == frame[len - 2..]
}

pub fn checksum(data: &[u8]) -> [u8; 2] {
    crc16::State::<crc16::MODBUS>::calculate(data).to_le_bytes()
}
