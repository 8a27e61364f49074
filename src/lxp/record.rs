use crate::error::DecodeError;
use crate::lxp::dispatch::Selection;
use crate::lxp::layout::RawValue;
use crate::lxp::packet::{Header, TranslatedData};
use crate::lxp::scaling::{ScaledSection, ScaledValue};
use crate::lxp::section::{RawSection, RawSection1, RawSection2, RawSection3, SectionId};

use serde::Serialize;
use serde_json::Value;

/// One section of a record: the raw struct, its calibrated readings and
/// whether this frame carried it at all.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Section<R> {
    raw: R,
    scaled: ScaledSection,
    loaded: bool,
}

impl<R: RawSection> Section<R> {
    fn loaded(raw: R) -> Self {
        let scaled = ScaledSection::from_fields(raw.fields());
        Self {
            raw,
            scaled,
            loaded: true,
        }
    }

    /// Placeholder for a section the frame did not carry; values are zero.
    fn absent() -> Self {
        let raw = R::default();
        let scaled = ScaledSection::from_fields(raw.fields());
        Self {
            raw,
            scaled,
            loaded: false,
        }
    }

    fn decode(selection: Selection, values: &[u8]) -> Result<Self, DecodeError> {
        match selection.offset(R::ID) {
            Some(offset) => {
                let input = values.get(offset..).unwrap_or_default();
                Ok(Self::loaded(R::decode(input).map_err(|err| match err {
                    // report against the whole value area
                    DecodeError::TruncatedFrame { needed, .. } => DecodeError::TruncatedFrame {
                        needed: offset + needed,
                        available: values.len(),
                    },
                    other => other,
                })?))
            }
            None => Ok(Self::absent()),
        }
    }

    pub fn raw(&self) -> &R {
        &self.raw
    }

    pub fn scaled(&self) -> &ScaledSection {
        &self.scaled
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

/// Everything decoded from one data frame. Serials are stored trimmed of
/// their fill bytes.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Record {
    pub serial_number: String,
    pub datalog: String,
    pub section1: Section<RawSection1>,
    pub section2: Section<RawSection2>,
    pub section3: Section<RawSection3>,
}

impl Record {
    /// Decodes the selected sections out of `values`. Fails on the first
    /// section that doesn't fit; no partial record is returned.
    pub fn assemble(
        header: &Header,
        data: &TranslatedData,
        selection: Selection,
        values: &[u8],
    ) -> Result<Self, DecodeError> {
        Ok(Self {
            serial_number: data.serial_number.trimmed(),
            datalog: header.serial_number.trimmed(),
            section1: Section::decode(selection, values)?,
            section2: Section::decode(selection, values)?,
            section3: Section::decode(selection, values)?,
        })
    }

    pub fn is_loaded(&self, id: SectionId) -> bool {
        match id {
            SectionId::Section1 => self.section1.loaded,
            SectionId::Section2 => self.section2.loaded,
            SectionId::Section3 => self.section3.loaded,
        }
    }

    pub fn loaded_sections(&self) -> Vec<SectionId> {
        SectionId::ALL
            .into_iter()
            .filter(|id| self.is_loaded(*id))
            .collect()
    }

    pub fn scaled(&self, id: SectionId) -> &ScaledSection {
        match id {
            SectionId::Section1 => &self.section1.scaled,
            SectionId::Section2 => &self.section2.scaled,
            SectionId::Section3 => &self.section3.scaled,
        }
    }

    /// Flat `(name, value)` list of every loaded reading, as written to the
    /// sinks. Word arrays are expanded to `<name>_<index>`.
    pub fn sink_fields(&self) -> Vec<(String, Value)> {
        let mut fields = Vec::new();

        for id in self.loaded_sections() {
            for reading in self.scaled(id).readings() {
                match &reading.value {
                    ScaledValue::Raw(RawValue::Words(words)) => {
                        for (i, word) in words.iter().enumerate() {
                            fields.push((format!("{}_{}", reading.name, i), Value::from(*word)));
                        }
                    }
                    value => {
                        let value = serde_json::to_value(value).unwrap_or(Value::Null);
                        fields.push((reading.name.to_owned(), value));
                    }
                }
            }
        }

        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lxp::packet::{Serial, PREFIX};

    fn header(packet_length: u16) -> Header {
        Header {
            prefix: PREFIX,
            protocol_version: 2,
            packet_length,
            address: 1,
            function: 0xC2,
            serial_number: "BA12345678".parse().unwrap(),
            reserved: 0,
        }
    }

    fn data(register: u16) -> TranslatedData {
        TranslatedData {
            address: 1,
            device_function: 4,
            serial_number: "AB12345678".parse().unwrap(),
            register,
        }
    }

    #[test]
    fn absent_sections_are_zeroed() {
        let mut values = vec![0; 80];
        values[0..4].copy_from_slice(&1234i32.to_le_bytes());

        let record =
            Record::assemble(&header(111), &data(40), Selection::Section2, &values).unwrap();

        assert_eq!(record.loaded_sections(), vec![SectionId::Section2]);
        assert_eq!(record.section2.scaled().float("PV1_Energy_Total"), Some(123.4));
        assert_eq!(record.section1.raw(), &RawSection1::default());
        assert_eq!(record.section1.scaled().float("PV1_Voltage"), Some(0.0));
        assert!(!record.section3.is_loaded());
        assert_eq!(record.serial_number, "AB12345678");
        assert_eq!(record.datalog, "BA12345678");
    }

    #[test]
    fn serials_are_trimmed() {
        let mut data = data(0);
        data.serial_number = Serial::new(*b"AB1234\0\0\0\0");
        let mut header = header(111);
        header.serial_number = Serial::new([b'B', b'A', b'9', b' ', b' ', 0xFF, 0xFF, 0, 0, 0]);

        let record = Record::assemble(&header, &data, Selection::Section1, &[0; 80]).unwrap();

        assert_eq!(record.serial_number, "AB1234");
        assert_eq!(record.datalog, "BA9");
    }

    #[test]
    fn truncated_section_fails_whole_record() {
        let values = vec![0; 200];
        assert_eq!(
            Record::assemble(&header(285), &data(0), Selection::All, &values),
            Err(DecodeError::TruncatedFrame {
                needed: 216,
                available: 200
            })
        );
    }

    #[test]
    fn sink_fields_expand_word_arrays() {
        let mut values = vec![0; 80];
        values[10..12].copy_from_slice(&7u16.to_le_bytes());
        values[28..30].copy_from_slice(&9u16.to_le_bytes());

        let record =
            Record::assemble(&header(111), &data(80), Selection::Section3, &values).unwrap();
        let fields = record.sink_fields();

        assert!(fields.contains(&("BMS_Status_0".to_owned(), Value::from(7))));
        assert!(fields.contains(&("BMS_Status_9".to_owned(), Value::from(9))));
        assert!(!fields.iter().any(|(name, _)| name == "BMS_Status"));
        assert!(!fields.iter().any(|(name, _)| name == "PV1_Voltage"));
        assert_eq!(fields.len(), 18 + 10);
    }
}
