use crate::error::DecodeError;
use crate::lxp::packet::DeviceFunction;
use crate::lxp::section::SectionId;

/// Which sections a data frame carries.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Selection {
    All,
    Section1,
    Section2,
    Section3,
}

/// `(register, packet_length, selection)`. Any pair not listed here is
/// rejected.
pub const ROUTES: [(u16, u16, Selection); 4] = [
    (SectionId::Section1.register(), FULL_READ, Selection::All),
    (SectionId::Section1.register(), SECTION_READ, Selection::Section1),
    (SectionId::Section2.register(), SECTION_READ, Selection::Section2),
    (SectionId::Section3.register(), SECTION_READ, Selection::Section3),
];

/// `packet_length` of a read of all three sections.
const FULL_READ: u16 = 285;
/// `packet_length` of a single-section read.
const SECTION_READ: u16 = 111;

pub fn select(
    device_function: u8,
    register: u16,
    packet_length: u16,
) -> Result<Selection, DecodeError> {
    if DeviceFunction::try_from(device_function).ok() != Some(DeviceFunction::ReadInput) {
        return Err(DecodeError::UnsupportedDeviceFunction(device_function));
    }

    ROUTES
        .iter()
        .find(|(r, l, _)| *r == register && *l == packet_length)
        .map(|(_, _, selection)| *selection)
        .ok_or(DecodeError::UnrecognizedFrame {
            register,
            packet_length,
        })
}

impl Selection {
    pub fn loads(self, id: SectionId) -> bool {
        self.offset(id).is_some()
    }

    /// Where the section starts within the register values, if carried.
    pub fn offset(self, id: SectionId) -> Option<usize> {
        match (self, id) {
            (Selection::All, SectionId::Section1) => Some(0),
            (Selection::All, SectionId::Section2) => Some(SectionId::Section1.layout().size()),
            (Selection::All, SectionId::Section3) => Some(
                SectionId::Section1.layout().size() + SectionId::Section2.layout().size(),
            ),
            (Selection::Section1, SectionId::Section1)
            | (Selection::Section2, SectionId::Section2)
            | (Selection::Section3, SectionId::Section3) => Some(0),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes() {
        assert_eq!(select(4, 0, 285), Ok(Selection::All));
        assert_eq!(select(4, 0, 111), Ok(Selection::Section1));
        assert_eq!(select(4, 40, 111), Ok(Selection::Section2));
        assert_eq!(select(4, 80, 111), Ok(Selection::Section3));
    }

    #[test]
    fn single_section_routes_start_at_section_register() {
        for id in SectionId::ALL {
            let selection = select(4, id.register(), 111).unwrap();
            assert_eq!(selection.offset(id), Some(0));
            assert_eq!(
                SectionId::ALL.iter().filter(|other| selection.loads(**other)).count(),
                1
            );
        }
    }

    #[test]
    fn device_function_checked_first() {
        for function in [0x03, 0x06, 0x10, 0x00, 0xFF] {
            assert_eq!(
                select(function, 0, 285),
                Err(DecodeError::UnsupportedDeviceFunction(function))
            );
        }
    }

    #[test]
    fn unknown_pairs_rejected() {
        for (register, len) in [(0, 110), (40, 285), (80, 285), (120, 111), (1, 111), (0, 0)] {
            assert_eq!(
                select(4, register, len),
                Err(DecodeError::UnrecognizedFrame {
                    register,
                    packet_length: len
                })
            );
        }
    }

    #[test]
    fn offsets() {
        assert_eq!(Selection::All.offset(SectionId::Section1), Some(0));
        assert_eq!(Selection::All.offset(SectionId::Section2), Some(80));
        assert_eq!(Selection::All.offset(SectionId::Section3), Some(160));
        assert_eq!(Selection::Section3.offset(SectionId::Section3), Some(0));
        assert_eq!(Selection::Section3.offset(SectionId::Section1), None);

        for id in SectionId::ALL {
            assert!(Selection::All.loads(id));
        }
        assert!(Selection::Section2.loads(SectionId::Section2));
        assert!(!Selection::Section2.loads(SectionId::Section1));
        assert!(!Selection::Section2.loads(SectionId::Section3));
    }
}
