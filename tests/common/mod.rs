#![allow(dead_code)]

use lxp_telemetry::lxp::layout::{self, Layout, Width, HEADER_SIZE, UNCOUNTED_BYTES, VALUES_OFFSET};
use lxp_telemetry::lxp::packet::{checksum, PREFIX};
use lxp_telemetry::prelude::*;

pub fn common_setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub const SERIAL: &str = "AB12345678";
pub const DATALOG: &str = "BA12345678";

/// Builds frames byte by byte, the way the inverter puts them on the wire.
#[derive(Clone, Debug)]
pub struct FrameBuilder {
    prefix: u16,
    protocol_version: u16,
    function: u8,
    device_function: u8,
    register: u16,
    values: Vec<u8>,
    packet_length: Option<u16>,
    bad_checksum: bool,
}

impl FrameBuilder {
    /// A read-input data frame carrying `values_len` bytes of register
    /// values, all zero.
    pub fn new(register: u16, values_len: usize) -> Self {
        Self {
            prefix: PREFIX,
            protocol_version: 2,
            function: 0xC2,
            device_function: 0x04,
            register,
            values: vec![0; values_len],
            packet_length: None,
            bad_checksum: false,
        }
    }

    /// Register 0, packet_length 111.
    pub fn section1() -> Self {
        Self::new(0, 80)
    }

    /// Register 40, packet_length 111.
    pub fn section2() -> Self {
        Self::new(40, 80)
    }

    /// Register 80, packet_length 111.
    pub fn section3() -> Self {
        Self::new(80, 80)
    }

    /// Register 0, packet_length 285.
    pub fn all() -> Self {
        Self::new(0, 254)
    }

    pub fn prefix(mut self, prefix: u16) -> Self {
        self.prefix = prefix;
        self
    }

    pub fn function(mut self, function: u8) -> Self {
        self.function = function;
        self
    }

    pub fn device_function(mut self, device_function: u8) -> Self {
        self.device_function = device_function;
        self
    }

    pub fn register(mut self, register: u16) -> Self {
        self.register = register;
        self
    }

    pub fn packet_length(mut self, packet_length: u16) -> Self {
        self.packet_length = Some(packet_length);
        self
    }

    pub fn bad_checksum(mut self) -> Self {
        self.bad_checksum = true;
        self
    }

    /// Writes `value` little-endian into the named field of `layout`, which
    /// starts `base` bytes into the register values.
    pub fn put(mut self, layout: &Layout, base: usize, name: &str, value: i64) -> Self {
        let field = layout
            .field(name)
            .unwrap_or_else(|| panic!("{} has no field {}", layout.name, name));
        let at = base + field.offset;
        let size = field.width.size();
        let bytes = value.to_le_bytes();

        match field.width {
            Width::Words(_) | Width::Bytes(_) => {
                panic!("use put_words for {}", name)
            }
            _ => self.values[at..at + size].copy_from_slice(&bytes[..size]),
        }
        self
    }

    pub fn put_words(mut self, layout: &Layout, base: usize, name: &str, words: &[u16]) -> Self {
        let field = layout.field(name).unwrap();
        for (i, word) in words.iter().enumerate() {
            let at = base + field.offset + i * 2;
            self.values[at..at + 2].copy_from_slice(&word.to_le_bytes());
        }
        self
    }

    pub fn s1(self, name: &str, value: i64) -> Self {
        self.put(&layout::SECTION1, 0, name, value)
    }

    pub fn s2(self, name: &str, value: i64) -> Self {
        self.put(&layout::SECTION2, 0, name, value)
    }

    pub fn s3(self, name: &str, value: i64) -> Self {
        self.put(&layout::SECTION3, 0, name, value)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(VALUES_OFFSET + self.values.len() + 2);

        // header
        frame.extend_from_slice(&self.prefix.to_le_bytes());
        frame.extend_from_slice(&self.protocol_version.to_le_bytes());
        frame.extend_from_slice(&[0, 0]); // packet_length, patched below
        frame.push(1);
        frame.push(self.function);
        frame.extend_from_slice(DATALOG.as_bytes());
        frame.extend_from_slice(&[0, 0]);
        assert_eq!(frame.len(), HEADER_SIZE);

        // translated data
        frame.push(0);
        frame.push(self.device_function);
        frame.extend_from_slice(SERIAL.as_bytes());
        frame.extend_from_slice(&self.register.to_le_bytes());
        frame.push(self.values.len() as u8);
        assert_eq!(frame.len(), VALUES_OFFSET);

        frame.extend_from_slice(&self.values);

        let mut crc = checksum(&frame[HEADER_SIZE..]);
        if self.bad_checksum {
            crc[0] ^= 0xFF;
        }
        frame.extend_from_slice(&crc);

        let packet_length = self
            .packet_length
            .unwrap_or((frame.len() - UNCOUNTED_BYTES) as u16);
        frame[4..6].copy_from_slice(&packet_length.to_le_bytes());

        frame
    }
}

pub fn config(yaml: &str) -> ConfigWrapper {
    ConfigWrapper::from_config(Config::from_yaml(yaml).unwrap())
}

/// Sinks off, nothing to connect to.
pub fn offline_config() -> ConfigWrapper {
    config(
        r#"
inverters: []
mqtt:
  enabled: false
  host: localhost
influx:
  enabled: false
  url: http://localhost:8086
  database: lxp
"#,
    )
}

/// MQTT "enabled" so records get turned into messages; nothing connects in
/// tests since the client is never started.
pub fn mqtt_config() -> ConfigWrapper {
    config(
        r#"
inverters: []
mqtt:
  enabled: true
  host: localhost
  namespace: lxp
influx:
  enabled: true
  url: http://localhost:8086
  database: lxp
strict_checksum: true
"#,
    )
}
