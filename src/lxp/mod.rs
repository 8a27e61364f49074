pub mod codes;
pub mod dispatch;
pub mod inverter;
pub mod layout;
pub mod packet;
pub mod record;
pub mod scaling;
pub mod section;

use crate::error::DecodeError;

use self::packet::{Header, TranslatedData};
use self::record::Record;

/// Decodes one complete frame into a record.
///
/// Frames for functions other than translated data (heartbeats, parameter
/// reads and writes) come back as `DecodeError::UnsupportedFunction`; see
/// `DecodeError::is_unhandled`.
pub fn decode_frame(frame: &[u8]) -> Result<Record, DecodeError> {
    let header = Header::decode(frame)?;

    if !header.is_data() {
        return Err(DecodeError::UnsupportedFunction(header.function));
    }

    let (data, values) = TranslatedData::decode(&frame[layout::HEADER_SIZE..])?;
    let selection = dispatch::select(data.device_function, data.register, header.packet_length)?;

    Record::assemble(&header, &data, selection, values)
}
