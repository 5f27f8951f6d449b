use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::entry::{CHECKSUM_OFFSET, Entry, EntryKind};
use crate::error::{Error, Result};
use crate::record::{
    CONTROL_OFFSET, ControlByte, EntryRecord, TEMPERATURE_OFFSET, check_name, check_temperature,
    decode_name, decode_temperature, encode_name, encode_temperature, parse_temperature,
    split_fields,
};

/// Maximum length of an alarm name in bytes.
pub const ALARM_NAME_LENGTH: usize = 20;

fn allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == ' '
}

/// A temperature alarm: a name and a target in °F.
///
/// Binary layout: bytes 0-19 hold the NUL padded name, 20-29 are unused,
/// byte 30 is the temperature low byte and bit 7 of byte 31 the offset flag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Alarm {
    name: String,
    temperature: u16,
}

impl Alarm {
    pub fn new(name: impl Into<String>, temperature: u16) -> Result<Self> {
        let name = name.into();
        check_name(EntryKind::Alarm, &name, ALARM_NAME_LENGTH, allowed)?;
        let temperature = check_temperature(temperature as i64)?;
        Ok(Self { name, temperature })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn temperature(&self) -> u16 {
        self.temperature
    }
}

impl EntryRecord for Alarm {
    const KIND: EntryKind = EntryKind::Alarm;

    fn to_entry(&self) -> Result<Entry> {
        let mut data = [0u8; CHECKSUM_OFFSET];
        encode_name(EntryKind::Alarm, &self.name, &mut data[..ALARM_NAME_LENGTH])?;

        let (low, temp_offset) = encode_temperature(self.temperature);
        data[TEMPERATURE_OFFSET] = low;
        data[CONTROL_OFFSET] = ControlByte {
            temp_offset,
            ..Default::default()
        }
        .pack();

        Ok(Entry::seal(EntryKind::Alarm, &data))
    }

    fn from_entry(entry: &Entry) -> Result<Self> {
        let name = decode_name(entry, ALARM_NAME_LENGTH)?;
        let bytes = entry.bytes();
        let control = ControlByte::unpack(bytes[CONTROL_OFFSET]);
        Alarm::new(
            name,
            decode_temperature(bytes[TEMPERATURE_OFFSET], control.temp_offset),
        )
    }
}

impl FromStr for Alarm {
    type Err = Error;

    /// Parses `name | temperature`.
    fn from_str(line: &str) -> Result<Self> {
        match split_fields(line)[..] {
            [name, temperature] => Alarm::new(name, parse_temperature(line, temperature)?),
            _ => Err(Error::malformed(line, "expected name | temperature")),
        }
    }
}

impl fmt::Display for Alarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<26} | {:>3}", self.name, self.temperature)
    }
}
