use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use byteorder::{ReadBytesExt, WriteBytesExt};
use serde::Serialize;

use crate::entry::{CHECKSUM_OFFSET, Entry, EntryKind};
use crate::error::{Error, Result};
use crate::fields::{AfterTimer, PowerLevel, TimerStart, Timer};
use crate::record::{
    ControlByte, EntryRecord, TEMPERATURE_OFFSET, check_name, check_temperature, decode_name,
    decode_temperature, encode_name, encode_temperature, parse_temperature, split_fields,
};

/// Maximum length of a program name in bytes.
pub const PROGRAM_NAME_LENGTH: usize = 26;

fn allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || "(),./: -".contains(c)
}

/// A cooking program.
///
/// Ordering is by name, then temperature, power, timer, timer start and
/// after timer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Program {
    name: String,
    temperature: u16,
    power: PowerLevel,
    timer: Timer,
    timer_start: TimerStart,
    after_timer: AfterTimer,
}

impl Program {
    /// Validates the fields. Without a timer the start and after-timer
    /// settings are meaningless and are reset to their defaults.
    pub fn new(
        name: impl Into<String>,
        temperature: u16,
        power: PowerLevel,
        timer: Timer,
        timer_start: TimerStart,
        after_timer: AfterTimer,
    ) -> Result<Self> {
        let name = name.into();
        check_name(EntryKind::Program, &name, PROGRAM_NAME_LENGTH, allowed)?;
        let temperature = check_temperature(temperature as i64)?;

        let (timer_start, after_timer) = if timer.is_off() {
            (TimerStart::AtBeginning, AfterTimer::Continue)
        } else {
            (timer_start, after_timer)
        };

        Ok(Self {
            name,
            temperature,
            power,
            timer,
            timer_start,
            after_timer,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn temperature(&self) -> u16 {
        self.temperature
    }

    pub fn power(&self) -> PowerLevel {
        self.power
    }

    pub fn timer(&self) -> Timer {
        self.timer
    }

    pub fn timer_start(&self) -> TimerStart {
        self.timer_start
    }

    pub fn after_timer(&self) -> AfterTimer {
        self.after_timer
    }
}

impl EntryRecord for Program {
    const KIND: EntryKind = EntryKind::Program;

    fn to_entry(&self) -> Result<Entry> {
        let mut data = [0u8; CHECKSUM_OFFSET];
        encode_name(
            EntryKind::Program,
            &self.name,
            &mut data[..PROGRAM_NAME_LENGTH],
        )?;

        let (low, temp_offset) = encode_temperature(self.temperature);
        let control = ControlByte {
            temp_offset,
            after_timer: self.after_timer.code(),
            power: self.power.code(),
            timer_start: self.timer_start.code(),
        };

        let mut wtr = &mut data[TEMPERATURE_OFFSET..];
        wtr.write_u8(low)?;
        wtr.write_u8(control.pack())?;
        wtr.write_u8(self.timer.hours())?;
        wtr.write_u8(self.timer.minutes())?;
        wtr.write_u8(self.timer.seconds())?;

        Ok(Entry::seal(EntryKind::Program, &data))
    }

    fn from_entry(entry: &Entry) -> Result<Self> {
        let name = decode_name(entry, PROGRAM_NAME_LENGTH)?;

        let bytes = entry.bytes();
        let mut rdr = Cursor::new(&bytes[TEMPERATURE_OFFSET..CHECKSUM_OFFSET]);
        let low = rdr.read_u8()?;
        let control = ControlByte::unpack(rdr.read_u8()?);
        let hours = rdr.read_u8()?;
        let minutes = rdr.read_u8()?;
        let seconds = rdr.read_u8()?;

        Program::new(
            name,
            decode_temperature(low, control.temp_offset),
            PowerLevel::from_code(control.power)?,
            Timer::new(hours as i32, minutes as i32, seconds as i32)?,
            TimerStart::from_code(control.timer_start)?,
            AfterTimer::from_code(control.after_timer)?,
        )
    }
}

impl FromStr for Program {
    type Err = Error;

    /// Parses `name | temperature | power | timer [| timer start | after timer]`.
    fn from_str(line: &str) -> Result<Self> {
        let fields = split_fields(line);
        if fields.len() < 4 {
            return Err(Error::malformed(
                line,
                "expected name | temperature | power | timer",
            ));
        }

        let temperature = parse_temperature(line, fields[1])?;
        let power: PowerLevel = fields[2].parse()?;
        let timer: Timer = fields[3].parse()?;

        let (timer_start, after_timer) = if timer.is_off() {
            if fields.len() > 4 {
                return Err(Error::malformed(line, "unexpected fields after 'no timer'"));
            }
            (TimerStart::AtBeginning, AfterTimer::Continue)
        } else {
            match fields[4..] {
                [start, after] => (start.parse()?, after.parse()?),
                _ => {
                    return Err(Error::malformed(
                        line,
                        "a timer needs both a timer start and an after timer",
                    ));
                }
            }
        };

        Program::new(fields[0], temperature, power, timer, timer_start, after_timer)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<26} | {:>3} | {:>6} | ",
            self.name, self.temperature, self.power
        )?;
        if self.timer.is_off() {
            f.write_str("no timer")
        } else {
            write!(
                f,
                "{:>8} | {:<18} | {}",
                self.timer, self.timer_start, self.after_timer
            )
        }
    }
}
