//! Byte layouts of every structure carried in a data frame.
//!
//! Offsets are relative to the start of the structure they belong to. The
//! tables are the reference the section decoders are checked against, and
//! the source of the field names used by the scaling table and the sinks.

use nom::{
    bytes::complete::take,
    combinator::map,
    multi::count,
    number::complete::{le_i16, le_i32, le_i8, le_u16, le_u32, le_u8},
    IResult,
};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Width {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    /// opaque byte string, eg a serial number
    Bytes(usize),
    /// array of unsigned 16-bit words
    Words(usize),
    /// consumed to keep offsets aligned, never surfaced
    Padding(usize),
}

impl Width {
    pub const fn size(self) -> usize {
        match self {
            Width::U8 | Width::I8 => 1,
            Width::U16 | Width::I16 => 2,
            Width::U32 | Width::I32 => 4,
            Width::Bytes(n) | Width::Padding(n) => n,
            Width::Words(n) => n * 2,
        }
    }

    pub const fn is_signed(self) -> bool {
        matches!(self, Width::I8 | Width::I16 | Width::I32)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldLayout {
    pub name: &'static str,
    pub offset: usize,
    pub width: Width,
}

impl FieldLayout {
    const fn new(name: &'static str, offset: usize, width: Width) -> Self {
        Self {
            name,
            offset,
            width,
        }
    }

    const fn pad(offset: usize, len: usize) -> Self {
        Self::new("_", offset, Width::Padding(len))
    }

    pub fn is_padding(&self) -> bool {
        matches!(self.width, Width::Padding(_))
    }

    pub fn end(&self) -> usize {
        self.offset + self.width.size()
    }
}

#[derive(Debug)]
pub struct Layout {
    pub name: &'static str,
    pub fields: &'static [FieldLayout],
}

impl Layout {
    /// Total bytes the structure occupies on the wire, padding included.
    pub const fn size(&self) -> usize {
        let mut size = 0;
        let mut i = 0;
        while i < self.fields.len() {
            let end = self.fields[i].offset + self.fields[i].width.size();
            if end > size {
                size = end;
            }
            i += 1;
        }
        size
    }

    /// Fields that carry data, in wire order.
    pub fn named_fields(&self) -> impl Iterator<Item = &'static FieldLayout> {
        self.fields.iter().filter(|f| !f.is_padding())
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldLayout> {
        self.named_fields().find(|f| f.name == name)
    }

    /// Reads every named field out of `input` without any knowledge of the
    /// typed structs. Returns None if `input` is shorter than the layout.
    pub fn read_all(&self, input: &[u8]) -> Option<Vec<(&'static str, RawValue)>> {
        if input.len() < self.size() {
            return None;
        }

        self.named_fields()
            .map(|f| f.read(input).map(|v| (f.name, v)))
            .collect()
    }
}

/// A register value exactly as found on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RawValue {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    Bytes(Vec<u8>),
    Words(Vec<u16>),
}

impl RawValue {
    /// Numeric value widened to f64; None for byte strings and word arrays.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            RawValue::U8(v) => Some(f64::from(v)),
            RawValue::I8(v) => Some(f64::from(v)),
            RawValue::U16(v) => Some(f64::from(v)),
            RawValue::I16(v) => Some(f64::from(v)),
            RawValue::U32(v) => Some(f64::from(v)),
            RawValue::I32(v) => Some(f64::from(v)),
            RawValue::Bytes(_) | RawValue::Words(_) => None,
        }
    }
}

impl FieldLayout {
    /// Generic little-endian read of this field from the start of its
    /// structure. Padding reads as None.
    pub fn read(&self, input: &[u8]) -> Option<RawValue> {
        let input = input.get(self.offset..)?;

        let parsed: IResult<&[u8], RawValue> = match self.width {
            Width::U8 => map(le_u8, RawValue::U8)(input),
            Width::I8 => map(le_i8, RawValue::I8)(input),
            Width::U16 => map(le_u16, RawValue::U16)(input),
            Width::I16 => map(le_i16, RawValue::I16)(input),
            Width::U32 => map(le_u32, RawValue::U32)(input),
            Width::I32 => map(le_i32, RawValue::I32)(input),
            Width::Bytes(n) => map(take(n), |b: &[u8]| RawValue::Bytes(b.to_vec()))(input),
            Width::Words(n) => map(count(le_u16, n), RawValue::Words)(input),
            Width::Padding(_) => return None,
        };

        parsed.ok().map(|(_, value)| value)
    }
}

use Width::*;

pub const HEADER: Layout = Layout {
    name: "Header",
    fields: &[
        FieldLayout::new("Prefix", 0, U16),
        FieldLayout::new("ProtocolVersion", 2, U16),
        FieldLayout::new("PacketLength", 4, U16),
        FieldLayout::new("Address", 6, U8),
        FieldLayout::new("Function", 7, U8),
        FieldLayout::new("SerialNumber", 8, Bytes(10)),
        FieldLayout::new("Reserved", 18, U16),
    ],
};

pub const TRANSLATED_DATA: Layout = Layout {
    name: "TranslatedData",
    fields: &[
        FieldLayout::new("Address", 0, U8),
        FieldLayout::new("DeviceFunction", 1, U8),
        FieldLayout::new("SerialNumber", 2, Bytes(10)),
        FieldLayout::new("Register", 12, U16),
        FieldLayout::pad(14, 1), // value length byte
    ],
};

pub const SECTION1: Layout = Layout {
    name: "Section1",
    fields: &[
        FieldLayout::new("Status", 0, U16),
        FieldLayout::new("PV1_Voltage", 2, I16),
        FieldLayout::new("PV2_Voltage", 4, I16),
        FieldLayout::new("PV3_Voltage", 6, I16),
        FieldLayout::new("Battery_Voltage", 8, I16),
        FieldLayout::new("SOC", 10, I8),
        FieldLayout::new("SOH", 11, I8),
        FieldLayout::pad(12, 2),
        FieldLayout::new("PV1_Power", 14, I16),
        FieldLayout::new("PV2_Power", 16, I16),
        FieldLayout::new("PV3_Power", 18, I16),
        FieldLayout::new("Charge_Power", 20, I16),
        FieldLayout::new("Discharge_Power", 22, I16),
        FieldLayout::new("Voltage_AC_R", 24, I16),
        FieldLayout::new("Voltage_AC_S", 26, I16),
        FieldLayout::new("Voltage_AC_T", 28, I16),
        FieldLayout::new("Frequency_Grid", 30, I16),
        FieldLayout::new("ActiveCharge_Power", 32, I16),
        FieldLayout::new("ActiveInverter_Power", 34, I16),
        FieldLayout::new("Inductor_Current", 36, I16),
        FieldLayout::new("Grid_Power_Factor", 38, I16),
        FieldLayout::new("Voltage_EPS_R", 40, I16),
        FieldLayout::new("Voltage_EPS_S", 42, I16),
        FieldLayout::new("Voltage_EPS_T", 44, I16),
        FieldLayout::new("Frequency_EPS", 46, I16),
        FieldLayout::new("Active_EPS_Power", 48, I16),
        FieldLayout::new("Apparent_EPS_Power", 50, I16),
        FieldLayout::new("Power_To_Grid", 52, I16),
        FieldLayout::new("Power_From_Grid", 54, I16),
        FieldLayout::new("PV1_Energy_Today", 56, I16),
        FieldLayout::new("PV2_Energy_Today", 58, I16),
        FieldLayout::new("PV3_Energy_Today", 60, I16),
        FieldLayout::new("ActiveInverter_Energy_Today", 62, I16),
        FieldLayout::new("AC_Charging_Today", 64, I16),
        FieldLayout::new("Charging_Today", 66, I16),
        FieldLayout::new("Discharging_Today", 68, I16),
        FieldLayout::new("EPS_Today", 70, I16),
        FieldLayout::new("Exported_Today", 72, I16),
        FieldLayout::new("Grid_Today", 74, I16),
        FieldLayout::new("Bus1_Voltage", 76, I16),
        FieldLayout::new("Bus2_Voltage", 78, I16),
    ],
};

pub const SECTION2: Layout = Layout {
    name: "Section2",
    fields: &[
        FieldLayout::new("PV1_Energy_Total", 0, I32),
        FieldLayout::new("PV2_Energy_Total", 4, I32),
        FieldLayout::new("PV3_Energy_Total", 8, I32),
        FieldLayout::new("ActiveInverter_Energy_Total", 12, I32),
        FieldLayout::new("AC_Charging_Total", 16, I32),
        FieldLayout::new("Charging_Total", 20, I32),
        FieldLayout::new("Discharging_Total", 24, I32),
        FieldLayout::new("EPS_Total", 28, I32),
        FieldLayout::new("Exported_Total", 32, I32),
        FieldLayout::new("Grid_Total", 36, I32),
        FieldLayout::new("FaultCode", 40, U32),
        FieldLayout::new("WarningCode", 44, U32),
        FieldLayout::new("Inner_Temperature", 48, I16),
        FieldLayout::new("Radiator1_Temperature", 50, I16),
        FieldLayout::new("Radiator2_Temperature", 52, I16),
        FieldLayout::new("Battery_Temperature", 54, I16),
        FieldLayout::pad(56, 2), // radiator 3 on some models
        FieldLayout::new("Runtime", 58, U32),
        FieldLayout::pad(62, 18), // auto-test block
    ],
};

pub const SECTION3: Layout = Layout {
    name: "Section3",
    fields: &[
        FieldLayout::new("BatteryComType", 0, I16),
        FieldLayout::new("BMS_Max_Charge_Current", 2, I16),
        FieldLayout::new("BMS_Max_Discharge_Current", 4, I16),
        FieldLayout::new("BMS_Charge_Voltage_Reference", 6, I16),
        FieldLayout::new("BMS_Discharge_Cutoff", 8, I16),
        FieldLayout::new("BMS_Status", 10, Words(10)),
        FieldLayout::new("BMS_Inverter_Status", 30, I16),
        FieldLayout::new("Battery_Parallel_Count", 32, I16),
        FieldLayout::new("Battery_Capacity", 34, I16),
        FieldLayout::new("Battery_Current", 36, I16),
        FieldLayout::new("BMS_Event1", 38, I16),
        FieldLayout::new("BMS_Event2", 40, I16),
        FieldLayout::new("MaxCell_Voltage", 42, I16),
        FieldLayout::new("MinCell_Voltage", 44, I16),
        FieldLayout::new("MaxCell_Temp", 46, I16),
        FieldLayout::new("MinCell_Temp", 48, I16),
        FieldLayout::new("BMS_FW_Update_State", 50, I16),
        FieldLayout::new("Cycle_Count", 52, I16),
        FieldLayout::new("BatteryInverter_Voltage", 54, I16),
    ],
};

pub const HEADER_SIZE: usize = HEADER.size();
pub const TRANSLATED_DATA_SIZE: usize = TRANSLATED_DATA.size();

/// Frame offset of the first register value.
pub const VALUES_OFFSET: usize = HEADER_SIZE + TRANSLATED_DATA_SIZE;

/// Bytes not counted by the header's packet_length: prefix, version and the
/// length field itself.
pub const UNCOUNTED_BYTES: usize = 6;
