//! Pieces shared by the program and alarm codecs: the record trait, the
//! `Record` sum type, the packed control byte and name/temperature helpers.

use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use serde::Serialize;

use crate::alarm::Alarm;
use crate::entry::{Entry, EntryKind};
use crate::error::{Bound, Error, Result};
use crate::program::Program;
use crate::{TEMP_MAX, TEMP_MIN, TEMP_MOD};

/// Byte offsets inside the 35 data bytes of an entry.
pub(crate) const TEMPERATURE_OFFSET: usize = 30;
pub(crate) const CONTROL_OFFSET: usize = 31;

const TEMP_FLAG: u8 = 0x80;
const AFTER_TIMER_SHIFT: u8 = 5;
const POWER_SHIFT: u8 = 2;
const TIMER_START_SHIFT: u8 = 0;
const CODE_MASK: u8 = 0x03;

/// A record that travels as one checksummed entry.
pub trait EntryRecord: Sized + Clone + Ord + Hash + fmt::Display {
    const KIND: EntryKind;

    fn to_entry(&self) -> Result<Entry>;

    fn from_entry(entry: &Entry) -> Result<Self>;

    /// Decodes a raw 36 byte span, verifying its checksum first.
    fn decode(bytes: &[u8]) -> Result<Self> {
        let entry = Entry::new(Self::KIND, bytes)?;
        Self::from_entry(&entry)
    }
}

/// Either kind of record, as read from a line of text or an image region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Record {
    Program(Program),
    Alarm(Alarm),
}

impl Record {
    pub fn kind(&self) -> EntryKind {
        match self {
            Record::Program(_) => EntryKind::Program,
            Record::Alarm(_) => EntryKind::Alarm,
        }
    }

    /// A line with at least two separators is a program, anything else an alarm.
    pub fn classify(line: &str) -> EntryKind {
        if line.matches('|').count() >= 2 {
            EntryKind::Program
        } else {
            EntryKind::Alarm
        }
    }
}

impl FromStr for Record {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        match Record::classify(line) {
            EntryKind::Program => line.parse().map(Record::Program),
            EntryKind::Alarm => line.parse().map(Record::Alarm),
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Record::Program(p) => p.fmt(f),
            Record::Alarm(a) => a.fmt(f),
        }
    }
}

impl From<Program> for Record {
    fn from(p: Program) -> Self {
        Record::Program(p)
    }
}

impl From<Alarm> for Record {
    fn from(a: Alarm) -> Self {
        Record::Alarm(a)
    }
}

/// Byte 31 of an entry.
///
/// ```text
/// bit 7     temperature offset (add 255)
/// bits 5-6  after timer
/// bit 4     unused
/// bits 2-3  power level
/// bits 0-1  timer start
/// ```
/// Alarms only use bit 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct ControlByte {
    pub temp_offset: bool,
    pub after_timer: u8,
    pub power: u8,
    pub timer_start: u8,
}

impl ControlByte {
    pub fn pack(self) -> u8 {
        let mut byte = 0;
        if self.temp_offset {
            byte |= TEMP_FLAG;
        }
        byte |= (self.after_timer & CODE_MASK) << AFTER_TIMER_SHIFT;
        byte |= (self.power & CODE_MASK) << POWER_SHIFT;
        byte |= (self.timer_start & CODE_MASK) << TIMER_START_SHIFT;
        byte
    }

    pub fn unpack(byte: u8) -> Self {
        Self {
            temp_offset: byte & TEMP_FLAG != 0,
            after_timer: (byte >> AFTER_TIMER_SHIFT) & CODE_MASK,
            power: (byte >> POWER_SHIFT) & CODE_MASK,
            timer_start: (byte >> TIMER_START_SHIFT) & CODE_MASK,
        }
    }
}

/// Splits a temperature into the stored low byte and the offset flag.
pub(crate) fn encode_temperature(temperature: u16) -> (u8, bool) {
    if temperature > TEMP_MOD {
        ((temperature - TEMP_MOD) as u8, true)
    } else {
        (temperature as u8, false)
    }
}

/// Clamped to the maximum in case a corrupt entry sets a high low byte.
pub(crate) fn decode_temperature(low: u8, offset: bool) -> u16 {
    let mut temperature = low as u16;
    if offset {
        temperature += TEMP_MOD;
    }
    temperature.min(TEMP_MAX)
}

pub(crate) fn check_temperature(value: i64) -> Result<u16> {
    if value < TEMP_MIN as i64 {
        return Err(Error::TemperatureOutOfRange {
            value,
            bound: Bound::Low,
        });
    }
    if value > TEMP_MAX as i64 {
        return Err(Error::TemperatureOutOfRange {
            value,
            bound: Bound::High,
        });
    }
    Ok(value as u16)
}

fn title(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::Program => "Program",
        EntryKind::Alarm => "Alarm",
    }
}

pub(crate) fn check_name(
    kind: EntryKind,
    name: &str,
    max: usize,
    allowed: impl Fn(char) -> bool,
) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidName(format!("{} name blank", title(kind))));
    }
    if name.len() > max {
        return Err(Error::NameTooLong {
            kind,
            name: name.to_string(),
            max,
        });
    }
    // the text form trims every field
    if name.trim() != name {
        return Err(Error::InvalidName(format!(
            "{kind} name {name:?} has leading or trailing spaces"
        )));
    }
    if !name.chars().all(allowed) {
        return Err(Error::InvalidName(format!(
            "invalid characters in {kind} name {name:?}"
        )));
    }
    Ok(())
}

/// Copies a name into its NUL padded field.
pub(crate) fn encode_name(kind: EntryKind, name: &str, field: &mut [u8]) -> Result<()> {
    let bytes = name.as_bytes();
    if bytes.len() > field.len() {
        return Err(Error::NameTooLong {
            kind,
            name: name.to_string(),
            max: field.len(),
        });
    }
    field.fill(0);
    field[..bytes.len()].copy_from_slice(bytes);
    Ok(())
}

/// Reads a NUL terminated name; a missing terminator takes the whole field.
pub(crate) fn decode_name(entry: &Entry, width: usize) -> Result<String> {
    let bytes = entry.bytes();
    let field = &bytes[..width];
    let end = field.iter().position(|&b| b == 0).unwrap_or(width);
    if end == 0 {
        let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
        return Err(Error::InvalidName(format!(
            "{} name blank in entry {hex}",
            title(entry.kind())
        )));
    }
    let name = &field[..end];
    if !name.is_ascii() {
        return Err(Error::InvalidName(format!(
            "non-ASCII {} name in entry",
            entry.kind()
        )));
    }
    Ok(String::from_utf8_lossy(name).into_owned())
}

/// Splits a text line into its trimmed `|` separated fields.
pub(crate) fn split_fields(line: &str) -> Vec<&str> {
    let mut fields: Vec<&str> = line.trim().split('|').map(str::trim).collect();
    if fields.len() > 1 && fields.last() == Some(&"") {
        fields.pop();
    }
    fields
}

pub(crate) fn parse_temperature(line: &str, token: &str) -> Result<u16> {
    let value = token
        .parse::<i64>()
        .map_err(|_| Error::malformed(line, format!("temperature {token:?} is not a number")))?;
    check_temperature(value)
}
