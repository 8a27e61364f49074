use crate::error::DecodeError;
use crate::lxp::layout::{self, Layout, RawValue};

use nom::{multi::fill, number::complete::le_u16, IResult};
use nom_derive::{Nom, Parse};
use serde::Serialize;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
pub enum SectionId {
    Section1,
    Section2,
    Section3,
}

impl SectionId {
    pub const ALL: [SectionId; 3] = [SectionId::Section1, SectionId::Section2, SectionId::Section3];

    pub fn layout(self) -> &'static Layout {
        match self {
            SectionId::Section1 => &layout::SECTION1,
            SectionId::Section2 => &layout::SECTION2,
            SectionId::Section3 => &layout::SECTION3,
        }
    }

    /// First input register of the block.
    pub const fn register(self) -> u16 {
        match self {
            SectionId::Section1 => 0,
            SectionId::Section2 => 40,
            SectionId::Section3 => 80,
        }
    }
}

impl std::fmt::Display for SectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.layout().name)
    }
}

/// A fixed-layout block of input registers.
pub trait RawSection: Clone + Default + for<'a> Parse<&'a [u8]> {
    const ID: SectionId;

    /// Data-carrying fields in wire order, matching the layout's named fields.
    fn values(&self) -> Vec<RawValue>;

    fn decode(input: &[u8]) -> Result<Self, DecodeError> {
        let needed = Self::ID.layout().size();
        let truncated = DecodeError::TruncatedFrame {
            needed,
            available: input.len(),
        };

        if input.len() < needed {
            return Err(truncated);
        }

        Self::parse(&input[..needed])
            .map(|(_, section)| section)
            .map_err(|_| truncated)
    }

    fn fields(&self) -> Vec<(&'static str, RawValue)> {
        Self::ID
            .layout()
            .named_fields()
            .map(|f| f.name)
            .zip(self.values())
            .collect()
    }
}

fn bms_status_words(input: &[u8]) -> IResult<&[u8], [u16; 10]> {
    let mut words = [0; 10];
    let (input, ()) = fill(le_u16, &mut words)(input)?;
    Ok((input, words))
}

// {{{ RawSection1
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Nom)]
#[nom(LittleEndian)]
pub struct RawSection1 {
    pub status: u16,
    pub pv1_voltage: i16,
    pub pv2_voltage: i16,
    pub pv3_voltage: i16,
    pub battery_voltage: i16,
    pub soc: i8,
    pub soh: i8,

    #[nom(SkipBefore(2))] // internal fault
    pub pv1_power: i16,
    pub pv2_power: i16,
    pub pv3_power: i16,
    pub charge_power: i16,
    pub discharge_power: i16,

    pub voltage_ac_r: i16,
    pub voltage_ac_s: i16,
    pub voltage_ac_t: i16,
    pub frequency_grid: i16,
    pub active_charge_power: i16,
    pub active_inverter_power: i16,
    pub inductor_current: i16,
    pub grid_power_factor: i16,

    pub voltage_eps_r: i16,
    pub voltage_eps_s: i16,
    pub voltage_eps_t: i16,
    pub frequency_eps: i16,
    pub active_eps_power: i16,
    pub apparent_eps_power: i16,
    pub power_to_grid: i16,
    pub power_from_grid: i16,

    pub pv1_energy_today: i16,
    pub pv2_energy_today: i16,
    pub pv3_energy_today: i16,
    pub active_inverter_energy_today: i16,
    pub ac_charging_today: i16,
    pub charging_today: i16,
    pub discharging_today: i16,
    pub eps_today: i16,
    pub exported_today: i16,
    pub grid_today: i16,

    pub bus1_voltage: i16,
    pub bus2_voltage: i16,
}

impl RawSection for RawSection1 {
    const ID: SectionId = SectionId::Section1;

    fn values(&self) -> Vec<RawValue> {
        use RawValue::{I16, I8, U16};

        vec![
            U16(self.status),
            I16(self.pv1_voltage),
            I16(self.pv2_voltage),
            I16(self.pv3_voltage),
            I16(self.battery_voltage),
            I8(self.soc),
            I8(self.soh),
            I16(self.pv1_power),
            I16(self.pv2_power),
            I16(self.pv3_power),
            I16(self.charge_power),
            I16(self.discharge_power),
            I16(self.voltage_ac_r),
            I16(self.voltage_ac_s),
            I16(self.voltage_ac_t),
            I16(self.frequency_grid),
            I16(self.active_charge_power),
            I16(self.active_inverter_power),
            I16(self.inductor_current),
            I16(self.grid_power_factor),
            I16(self.voltage_eps_r),
            I16(self.voltage_eps_s),
            I16(self.voltage_eps_t),
            I16(self.frequency_eps),
            I16(self.active_eps_power),
            I16(self.apparent_eps_power),
            I16(self.power_to_grid),
            I16(self.power_from_grid),
            I16(self.pv1_energy_today),
            I16(self.pv2_energy_today),
            I16(self.pv3_energy_today),
            I16(self.active_inverter_energy_today),
            I16(self.ac_charging_today),
            I16(self.charging_today),
            I16(self.discharging_today),
            I16(self.eps_today),
            I16(self.exported_today),
            I16(self.grid_today),
            I16(self.bus1_voltage),
            I16(self.bus2_voltage),
        ]
    }
}
// }}}

// {{{ RawSection2
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Nom)]
#[nom(LittleEndian)]
pub struct RawSection2 {
    pub pv1_energy_total: i32,
    pub pv2_energy_total: i32,
    pub pv3_energy_total: i32,
    pub active_inverter_energy_total: i32,
    pub ac_charging_total: i32,
    pub charging_total: i32,
    pub discharging_total: i32,
    pub eps_total: i32,
    pub exported_total: i32,
    pub grid_total: i32,

    pub fault_code: u32,
    pub warning_code: u32,

    pub inner_temperature: i16,
    pub radiator1_temperature: i16,
    pub radiator2_temperature: i16,
    pub battery_temperature: i16,

    #[nom(SkipBefore(2))]
    pub runtime: u32,
    // 18 reserved bytes (auto-test block) follow
}

impl RawSection for RawSection2 {
    const ID: SectionId = SectionId::Section2;

    fn values(&self) -> Vec<RawValue> {
        use RawValue::{I16, I32, U32};

        vec![
            I32(self.pv1_energy_total),
            I32(self.pv2_energy_total),
            I32(self.pv3_energy_total),
            I32(self.active_inverter_energy_total),
            I32(self.ac_charging_total),
            I32(self.charging_total),
            I32(self.discharging_total),
            I32(self.eps_total),
            I32(self.exported_total),
            I32(self.grid_total),
            U32(self.fault_code),
            U32(self.warning_code),
            I16(self.inner_temperature),
            I16(self.radiator1_temperature),
            I16(self.radiator2_temperature),
            I16(self.battery_temperature),
            U32(self.runtime),
        ]
    }
}
// }}}

// {{{ RawSection3
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Nom)]
#[nom(LittleEndian)]
pub struct RawSection3 {
    pub battery_com_type: i16,
    pub bms_max_charge_current: i16,
    pub bms_max_discharge_current: i16,
    pub bms_charge_voltage_reference: i16,
    pub bms_discharge_cutoff: i16,

    #[nom(Parse = "bms_status_words")]
    pub bms_status: [u16; 10],
    pub bms_inverter_status: i16,

    pub battery_parallel_count: i16,
    pub battery_capacity: i16,
    pub battery_current: i16,

    pub bms_event1: i16,
    pub bms_event2: i16,

    pub max_cell_voltage: i16,
    pub min_cell_voltage: i16,
    pub max_cell_temp: i16,
    pub min_cell_temp: i16,

    pub bms_fw_update_state: i16,
    pub cycle_count: i16,
    pub battery_inverter_voltage: i16,
}

impl RawSection for RawSection3 {
    const ID: SectionId = SectionId::Section3;

    fn values(&self) -> Vec<RawValue> {
        use RawValue::{Words, I16};

        vec![
            I16(self.battery_com_type),
            I16(self.bms_max_charge_current),
            I16(self.bms_max_discharge_current),
            I16(self.bms_charge_voltage_reference),
            I16(self.bms_discharge_cutoff),
            Words(self.bms_status.to_vec()),
            I16(self.bms_inverter_status),
            I16(self.battery_parallel_count),
            I16(self.battery_capacity),
            I16(self.battery_current),
            I16(self.bms_event1),
            I16(self.bms_event2),
            I16(self.max_cell_voltage),
            I16(self.min_cell_voltage),
            I16(self.max_cell_temp),
            I16(self.min_cell_temp),
            I16(self.bms_fw_update_state),
            I16(self.cycle_count),
            I16(self.battery_inverter_voltage),
        ]
    }
}
// }}}

#[cfg(test)]
mod tests {
    use super::*;

    // every byte distinct, so any offset mistake shows up as a wrong value
    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + 3) as u8).collect()
    }

    fn assert_matches_layout<S: RawSection>() {
        let layout = S::ID.layout();
        let input = pattern(layout.size());

        let section = S::decode(&input).unwrap();
        assert_eq!(section.fields(), layout.read_all(&input).unwrap());
        assert_eq!(section.values().len(), layout.named_fields().count());
    }

    #[test]
    fn decoders_match_layout_tables() {
        assert_matches_layout::<RawSection1>();
        assert_matches_layout::<RawSection2>();
        assert_matches_layout::<RawSection3>();
    }

    #[test]
    fn truncated_input() {
        assert_eq!(
            RawSection1::decode(&[0; 79]),
            Err(DecodeError::TruncatedFrame {
                needed: 80,
                available: 79
            })
        );
        assert_eq!(
            RawSection3::decode(&[]),
            Err(DecodeError::TruncatedFrame {
                needed: 56,
                available: 0
            })
        );
    }

    #[test]
    fn signed_values() {
        let mut input = vec![0; 80];
        input[2..4].copy_from_slice(&(-5i16).to_le_bytes());
        input[10] = 0x9C; // -100
        input[0..2].copy_from_slice(&0xFFFFu16.to_le_bytes());

        let s1 = RawSection1::decode(&input).unwrap();
        assert_eq!(s1.status, 0xFFFF);
        assert_eq!(s1.pv1_voltage, -5);
        assert_eq!(s1.soc, -100);
    }

    #[test]
    fn extra_bytes_are_ignored() {
        let mut input = vec![0; 200];
        input[40..44].copy_from_slice(&16u32.to_le_bytes());
        let s2 = RawSection2::decode(&input).unwrap();
        assert_eq!(s2.fault_code, 16);
    }
}
