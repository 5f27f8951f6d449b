//! Merging programs and alarms from any number of sources into one
//! duplicate-free collection.

use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::hash::Hash;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use log::{info, warn};
use serde::Serialize;

use crate::alarm::Alarm;
use crate::error::Result;
use crate::image::{ImageReader, ImageWriter};
use crate::program::Program;
use crate::record::{EntryRecord, Record};

/// Maximum number of programs, and separately of alarms, written to one image.
pub const MAX_ENTRIES: usize = 80;

/// Receives human readable notes about non-fatal conditions.
pub trait Reporter {
    fn report(&mut self, message: &str);
}

/// Forwards reports to the `log` facade as warnings.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&mut self, message: &str) {
        warn!("{message}");
    }
}

impl Reporter for Vec<String> {
    fn report(&mut self, message: &str) {
        self.push(message.to_string());
    }
}

/// An insertion ordered set.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct RecordSet<T: Eq + Hash> {
    items: Vec<T>,
    #[serde(skip)]
    seen: HashSet<T>,
}

impl<T: Eq + Hash> Default for RecordSet<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            seen: HashSet::new(),
        }
    }
}

impl<T: Clone + Eq + Hash + Ord> RecordSet<T> {
    /// Returns false if an equal value is already present.
    pub fn insert(&mut self, value: T) -> bool {
        if !self.seen.insert(value.clone()) {
            return false;
        }
        self.items.push(value);
        true
    }

    pub fn sort(&mut self) {
        self.items.sort();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

/// Where a source's records come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Image,
    Text,
}

impl SourceKind {
    /// `.fa1` files (any case) are images, everything else is text.
    pub fn of(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("fa1") => SourceKind::Image,
            _ => SourceKind::Text,
        }
    }
}

/// Reads every program, then every alarm, out of an image.
pub fn records_from_image(mut reader: ImageReader) -> Result<Vec<Record>> {
    let mut records: Vec<Record> = reader
        .records::<Program>()
        .map(|r| r.map(Record::Program))
        .collect::<Result<_>>()?;
    for alarm in reader.records::<Alarm>() {
        records.push(Record::Alarm(alarm?));
    }
    Ok(records)
}

/// Parses one record per non-blank line.
pub fn records_from_text<R: BufRead>(reader: R) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(line.parse()?);
    }
    Ok(records)
}

/// The merged programs and alarms of a run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Collection {
    programs: RecordSet<Program>,
    alarms: RecordSet<Alarm>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn programs(&self) -> &[Program] {
        self.programs.as_slice()
    }

    pub fn alarms(&self) -> &[Alarm] {
        self.alarms.as_slice()
    }

    /// Adds a record, reporting it instead if it is a duplicate.
    pub fn insert(&mut self, record: Record, reporter: &mut dyn Reporter) -> bool {
        let added = match &record {
            Record::Program(p) => self.programs.insert(p.clone()),
            Record::Alarm(a) => self.alarms.insert(a.clone()),
        };
        if !added {
            reporter.report(&format!("Skipping duplicate {} {}", record.kind(), record));
        }
        added
    }

    /// Adds every record of a source; returns how many were new.
    pub fn extend<I>(&mut self, records: I, reporter: &mut dyn Reporter) -> usize
    where
        I: IntoIterator<Item = Record>,
    {
        let mut added = 0;
        for record in records {
            if self.insert(record, reporter) {
                added += 1;
            }
        }
        added
    }

    /// Reads a whole source and merges it. Nothing is merged if the source
    /// fails part way.
    pub fn load<P: AsRef<Path>>(&mut self, path: P, reporter: &mut dyn Reporter) -> Result<usize> {
        let path = path.as_ref();
        let records = match SourceKind::of(path) {
            SourceKind::Image => records_from_image(ImageReader::open(path)?)?,
            SourceKind::Text => records_from_text(BufReader::new(File::open(path)?))?,
        };
        let total = records.len();
        let added = self.extend(records, reporter);
        info!("{}: {total} records, {added} new", path.display());
        Ok(added)
    }

    /// Orders both kinds by their natural order.
    pub fn sort(&mut self) {
        self.programs.sort();
        self.alarms.sort();
    }

    /// Reports each kind holding more than `MAX_ENTRIES`; true if both fit.
    pub fn check_capacity(&self, reporter: &mut dyn Reporter) -> bool {
        let mut fits = true;
        for (kind, count) in [("programs", self.programs.len()), ("alarms", self.alarms.len())] {
            if count > MAX_ENTRIES {
                reporter.report(&format!(
                    "Too many {kind} to fit in one file ({count}, max {MAX_ENTRIES})"
                ));
                fits = false;
            }
        }
        fits
    }

    /// Writes the listing rendered by `Display`.
    pub fn write_text<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write!(out, "{self}")
    }

    pub fn write_image(&self, out: &mut ImageWriter) -> Result<()> {
        write_all(out, self.programs.iter())?;
        write_all(out, self.alarms.iter())?;
        out.finish()
    }

    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

/// Programs first, then a blank line if both kinds are present, then alarms.
impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for program in self.programs.iter() {
            writeln!(f, "{program}")?;
        }
        if !self.programs.is_empty() && !self.alarms.is_empty() {
            writeln!(f)?;
        }
        for alarm in self.alarms.iter() {
            writeln!(f, "{alarm}")?;
        }
        Ok(())
    }
}

fn write_all<'a, T: EntryRecord + 'a>(
    out: &mut ImageWriter,
    records: impl Iterator<Item = &'a T>,
) -> Result<()> {
    for record in records {
        out.write(record)?;
    }
    Ok(())
}
