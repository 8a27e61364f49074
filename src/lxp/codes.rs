//! Human-readable descriptions of the status word and the fault/warning
//! bitmaps, published alongside the numeric values.

pub fn status_text(status: u16) -> &'static str {
    match status {
        0x00 => "Standby",
        0x02 => "FW Updating",
        0x04 => "PV On-grid",
        0x08 => "PV Charge",
        0x0C => "PV Charge On-grid",
        0x10 => "Battery On-grid",
        0x11 => "Bypass",
        0x14 => "PV & Battery On-grid",
        0x19 => "PV Charge + Bypass",
        0x20 => "AC Charge",
        0x28 => "PV & AC Charge",
        0x40 => "Battery Off-grid",
        0x80 => "PV Off-grid",
        0x88 => "PV Charge Off-grid",
        0xC0 => "PV & Battery Off-grid",
        _ => "Unknown",
    }
}

const FAULTS: [&str; 32] = [
    "E000: Internal communication fault 1",
    "E001: Model fault",
    "E002: BatOnMosFail",
    "E003: CT Fail",
    "E004: Reserved",
    "E005: Reserved",
    "E006: Reserved",
    "E007: Reserved",
    "E008: CAN communication error in parallel system",
    "E009: master lost in parallel system",
    "E010: multiple master units in parallel system",
    "E011: AC input inconsistent in parallel system",
    "E012: UPS short",
    "E013: Reverse current on UPS output",
    "E014: Bus short",
    "E015: Phase error in three phase system",
    "E016: Relay check fault",
    "E017: Internal communication fault 2",
    "E018: Internal communication fault 3",
    "E019: Bus voltage high",
    "E020: EPS connection fault",
    "E021: PV voltage high",
    "E022: Over current protection",
    "E023: Neutral fault",
    "E024: PV short",
    "E025: Radiator temperature over range",
    "E026: Internal fault",
    "E027: Sample inconsistent between Main CPU and redundant CPU",
    "E028: Reserved",
    "E029: Reserved",
    "E030: Reserved",
    "E031: Internal communication fault 4",
];

const WARNINGS: [&str; 32] = [
    "W000: Battery communication failure",
    "W001: AFCI communication failure",
    "W002: AFCI high",
    "W003: Meter communication failure",
    "W004: Both charge and discharge forbidden by battery",
    "W005: Auto test failed",
    "W006: Reserved",
    "W007: LCD communication failure",
    "W008: FW version mismatch",
    "W009: Fan stuck",
    "W010: Reserved",
    "W011: Parallel number out of range",
    "W012: Bat On Mos",
    "W013: Overtemperature (NTC reading is too high)",
    "W014: Reserved",
    "W015: Battery reverse connection",
    "W016: Grid power outage",
    "W017: Grid voltage out of range",
    "W018: Grid frequency out of range",
    "W019: Reserved",
    "W020: PV insulation low",
    "W021: Leakage current high",
    "W022: DCI high",
    "W023: PV short",
    "W024: Reserved",
    "W025: Battery voltage high",
    "W026: Battery voltage low",
    "W027: Battery open circuit",
    "W028: EPS overload",
    "W029: EPS voltage high",
    "W030: Meter reverse connection",
    "W031: DCV high",
];

// lowest set bit wins
fn first_bit(table: &'static [&'static str; 32], value: u32) -> &'static str {
    if value == 0 {
        return "OK";
    }
    table[value.trailing_zeros() as usize]
}

pub fn fault_text(value: u32) -> &'static str {
    first_bit(&FAULTS, value)
}

pub fn warning_text(value: u32) -> &'static str {
    first_bit(&WARNINGS, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status() {
        assert_eq!(status_text(0x0C), "PV Charge On-grid");
        assert_eq!(status_text(0x10), "Battery On-grid");
        assert_eq!(status_text(0x99), "Unknown");
    }

    #[test]
    fn bitmaps() {
        assert_eq!(fault_text(0), "OK");
        assert_eq!(warning_text(0), "OK");
        assert_eq!(fault_text(0x10), "E004: Reserved");
        assert_eq!(warning_text(1 << 16), "W016: Grid power outage");
        assert_eq!(fault_text(0x8000_0000), "E031: Internal communication fault 4");
        assert_eq!(warning_text(0b1100), "W002: AFCI high");
    }
}
