//! The 8K device image.
//!
//! An image is 8192 bytes written to a USB stick. The first 4096 bytes hold
//! programs, the second 4096 bytes alarms. Each region is a run of 256 byte
//! blocks, every block holding up to 7 entries of 36 bytes followed by 4 bytes
//! of filler. Unused space is 0xFF, so an entry whose first byte has the high
//! bit set ends the region.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use log::{debug, warn};

use crate::entry::{ENTRY_LENGTH, Entry, EntryKind};
use crate::error::{Error, Result};
use crate::record::EntryRecord;

/// Total length of an image.
pub const IMAGE_LENGTH: usize = 8192;

/// Offset of the alarm region; also the length of each region.
pub const ALARM_OFFSET: usize = 4096;

pub const BLOCK_LENGTH: usize = 256;

/// Padding at the end of every block.
pub const FILLER_LENGTH: usize = 4;

pub const ENTRIES_PER_BLOCK: usize = (BLOCK_LENGTH - FILLER_LENGTH) / ENTRY_LENGTH;

/// First byte of the region and first byte past it.
pub fn region(kind: EntryKind) -> (usize, usize) {
    match kind {
        EntryKind::Program => (0, ALARM_OFFSET),
        EntryKind::Alarm => (ALARM_OFFSET, IMAGE_LENGTH),
    }
}

/// Next entry position and end of entry space in the current block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    offset: usize,
    limit: usize,
}

impl Cursor {
    fn start(kind: EntryKind) -> Self {
        let (base, _) = region(kind);
        Self {
            offset: base,
            limit: base + BLOCK_LENGTH - FILLER_LENGTH,
        }
    }

    fn next_block(&mut self) {
        self.offset += FILLER_LENGTH;
        self.limit += BLOCK_LENGTH;
        debug!("advancing to block at {:#06x}", self.offset);
    }
}

/// Reads entries out of a complete image, one region at a time.
pub struct ImageReader {
    image: Vec<u8>,
    programs: Cursor,
    alarms: Cursor,
}

impl ImageReader {
    /// Fails with `TruncatedImage` unless `image` is exactly 8192 bytes.
    pub fn from_bytes(image: Vec<u8>) -> Result<Self> {
        if image.len() != IMAGE_LENGTH {
            return Err(Error::TruncatedImage(image.len()));
        }
        Ok(Self {
            image,
            programs: Cursor::start(EntryKind::Program),
            alarms: Cursor::start(EntryKind::Alarm),
        })
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut image = Vec::with_capacity(IMAGE_LENGTH);
        reader.read_to_end(&mut image)?;
        Self::from_bytes(image)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_bytes(fs::read(path)?)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.image
    }

    /// Returns the next entry in the region, or `None` once the region ends.
    pub fn read_entry(&mut self, kind: EntryKind) -> Result<Option<Entry>> {
        let (_, bound) = region(kind);
        let cursor = match kind {
            EntryKind::Program => &mut self.programs,
            EntryKind::Alarm => &mut self.alarms,
        };

        let end = cursor.offset + ENTRY_LENGTH;
        if end > cursor.limit || end > bound {
            return Ok(None);
        }
        if self.image[cursor.offset] & 0x80 != 0 {
            return Ok(None);
        }

        let entry = Entry::new(kind, &self.image[cursor.offset..end])?;
        debug!("read {kind} entry at {:#06x}", cursor.offset);
        cursor.offset = end;
        if cursor.offset + ENTRY_LENGTH > cursor.limit {
            cursor.next_block();
        }
        Ok(Some(entry))
    }

    pub fn read<T: EntryRecord>(&mut self) -> Result<Option<T>> {
        match self.read_entry(T::KIND)? {
            Some(entry) => T::from_entry(&entry).map(Some),
            None => Ok(None),
        }
    }

    /// Iterates over the remaining records of one kind.
    pub fn records<T: EntryRecord>(&mut self) -> Records<'_, T> {
        Records {
            reader: self,
            done: false,
            _kind: std::marker::PhantomData,
        }
    }
}

pub struct Records<'a, T> {
    reader: &'a mut ImageReader,
    done: bool,
    _kind: std::marker::PhantomData<T>,
}

impl<T: EntryRecord> Iterator for Records<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let next = self.reader.read::<T>().transpose();
        if !matches!(next, Some(Ok(_))) {
            self.done = true;
        }
        next
    }
}

enum Sink {
    Memory(Vec<u8>),
    External(Box<dyn Write>),
}

/// Accumulates entries into a 0xFF filled image and writes it out in one go.
pub struct ImageWriter {
    sink: Option<Sink>,
    image: Vec<u8>,
    programs: Cursor,
    alarms: Cursor,
    written: bool,
    finished: bool,
}

impl ImageWriter {
    pub fn new<W: Write + 'static>(sink: W) -> Self {
        Self::with_sink(Sink::External(Box::new(sink)))
    }

    /// An image kept in memory; its bytes are available after `finish`.
    pub fn in_memory() -> Self {
        Self::with_sink(Sink::Memory(Vec::with_capacity(IMAGE_LENGTH)))
    }

    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }

    fn with_sink(sink: Sink) -> Self {
        Self {
            sink: Some(sink),
            image: vec![0xFF; IMAGE_LENGTH],
            programs: Cursor::start(EntryKind::Program),
            alarms: Cursor::start(EntryKind::Alarm),
            written: false,
            finished: false,
        }
    }

    pub fn write_entry(&mut self, entry: &Entry) -> Result<()> {
        self.append(entry.kind(), &entry.bytes())
    }

    pub fn write<T: EntryRecord>(&mut self, record: &T) -> Result<()> {
        self.write_entry(&record.to_entry()?)
    }

    fn append(&mut self, kind: EntryKind, bytes: &[u8]) -> Result<()> {
        if self.finished {
            return Err(Error::WriterFinished);
        }
        let (_, bound) = region(kind);
        let cursor = match kind {
            EntryKind::Program => &mut self.programs,
            EntryKind::Alarm => &mut self.alarms,
        };

        let len = bytes.len();
        if cursor.offset + len > cursor.limit {
            cursor.next_block();
        }
        if cursor.offset + len > cursor.limit {
            return Err(Error::EntryTooLong(len));
        }
        if cursor.offset + len > bound {
            return Err(Error::CapacityExceeded(kind));
        }

        self.image[cursor.offset..cursor.offset + len].copy_from_slice(bytes);
        cursor.offset += len;
        self.written = true;
        Ok(())
    }

    /// Flushes the image to the sink, if anything was written, and releases
    /// an external sink. The writer is closed afterwards: further writes fail
    /// and further calls do nothing, even if this one failed.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        let written = std::mem::take(&mut self.written);
        match self.sink.take() {
            Some(Sink::Memory(mut buf)) => {
                if written {
                    buf.extend_from_slice(&self.image);
                }
                self.sink = Some(Sink::Memory(buf));
            }
            Some(Sink::External(mut w)) if written => {
                w.write_all(&self.image)?;
                w.flush()?;
            }
            Some(Sink::External(_)) | None => {}
        }
        Ok(())
    }

    /// The flushed bytes of an in-memory image.
    pub fn bytes(&self) -> Result<&[u8]> {
        match &self.sink {
            Some(Sink::Memory(buf)) => Ok(buf),
            _ => Err(Error::NotAnInMemoryBuffer),
        }
    }
}

impl Drop for ImageWriter {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!("failed to flush image: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::Alarm;
    use crate::program::Program;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn program(i: usize) -> Program {
        format!("P{i} | 100 | Fast | off").parse().unwrap()
    }

    fn alarm(i: usize) -> Alarm {
        Alarm::new(format!("A{i}"), 150).unwrap()
    }

    fn finished(mut out: ImageWriter) -> Vec<u8> {
        out.finish().unwrap();
        out.bytes().unwrap().to_vec()
    }

    #[derive(Clone, Default)]
    struct SharedSink(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn geometry() {
        assert_eq!(7, ENTRIES_PER_BLOCK);
        assert_eq!(0, ALARM_OFFSET % BLOCK_LENGTH);
    }

    #[test]
    fn rejects_wrong_sizes() {
        for len in [0, 36, IMAGE_LENGTH - 1, IMAGE_LENGTH + 1] {
            let err = ImageReader::from_bytes(vec![0xFF; len]).err().unwrap();
            assert!(matches!(err, Error::TruncatedImage(n) if n == len));
        }
    }

    #[test]
    fn blank_image_is_empty() {
        let mut input = ImageReader::from_bytes(vec![0xFF; IMAGE_LENGTH]).unwrap();
        assert!(input.read::<Program>().unwrap().is_none());
        assert!(input.read::<Alarm>().unwrap().is_none());
    }

    #[test]
    fn nothing_written_means_nothing_flushed() {
        let out = ImageWriter::in_memory();
        assert!(finished(out).is_empty());
    }

    #[test]
    fn entries_skip_block_filler() {
        let mut out = ImageWriter::in_memory();
        for i in 0..8 {
            out.write(&program(i)).unwrap();
        }
        let bytes = finished(out);
        assert_eq!(IMAGE_LENGTH, bytes.len());

        // seventh entry ends at 252, eighth starts the second block
        assert_eq!([0xFF; 4], bytes[252..256]);
        assert_eq!(b"P7", &bytes[256..258]);
        assert_eq!(0xFF, bytes[256 + ENTRY_LENGTH]);

        let mut input = ImageReader::from_bytes(bytes).unwrap();
        let read: Vec<Program> = input.records().collect::<Result<_>>().unwrap();
        assert_eq!((0..8).map(program).collect::<Vec<_>>(), read);
    }

    #[test]
    fn filler_content_is_ignored() {
        let mut out = ImageWriter::in_memory();
        for i in 0..9 {
            out.write(&program(i)).unwrap();
        }
        let mut bytes = finished(out);
        bytes[252..256].copy_from_slice(&[0, 1, 2, 3]);

        let mut input = ImageReader::from_bytes(bytes).unwrap();
        assert_eq!(9, input.records::<Program>().count());
    }

    #[test]
    fn regions_are_independent() {
        let mut out = ImageWriter::in_memory();
        out.write(&alarm(0)).unwrap();
        out.write(&program(0)).unwrap();
        let bytes = finished(out);
        assert_eq!(b"P0", &bytes[..2]);
        assert_eq!(b"A0", &bytes[ALARM_OFFSET..ALARM_OFFSET + 2]);

        let mut input = ImageReader::from_bytes(bytes).unwrap();
        let programs: Vec<Program> = input.records().collect::<Result<_>>().unwrap();
        let alarms: Vec<Alarm> = input.records().collect::<Result<_>>().unwrap();
        assert_eq!(vec![program(0)], programs);
        assert_eq!(vec![alarm(0)], alarms);
    }

    #[test]
    fn full_regions() {
        let per_region = (ALARM_OFFSET / BLOCK_LENGTH) * ENTRIES_PER_BLOCK;
        let mut out = ImageWriter::in_memory();
        for i in 0..per_region {
            out.write(&program(i)).unwrap();
            out.write(&alarm(i)).unwrap();
        }
        let err = out.write(&program(per_region)).unwrap_err();
        assert!(err.to_string().contains("Too many programs"), "{err}");
        let err = out.write(&alarm(per_region)).unwrap_err();
        assert!(matches!(err, Error::CapacityExceeded(EntryKind::Alarm)));

        let mut input = ImageReader::from_bytes(finished(out)).unwrap();
        assert_eq!(per_region, input.records::<Program>().count());
        assert_eq!(per_region, input.records::<Alarm>().count());
    }

    #[test]
    fn corrupt_entry_is_fatal() {
        let mut out = ImageWriter::in_memory();
        out.write(&program(0)).unwrap();
        out.write(&program(1)).unwrap();
        let mut bytes = finished(out);
        bytes[ENTRY_LENGTH + 3] ^= 0x10;

        let mut input = ImageReader::from_bytes(bytes).unwrap();
        let results: Vec<Result<Program>> = input.records().collect();
        assert_eq!(2, results.len());
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::ChecksumMismatch { .. })));
    }

    #[test]
    fn external_sink_gets_one_image() {
        let sink = SharedSink::default();
        let mut out = ImageWriter::new(sink.clone());
        out.write(&program(0)).unwrap();
        assert!(matches!(out.bytes(), Err(Error::NotAnInMemoryBuffer)));
        out.finish().unwrap();
        out.finish().unwrap();
        assert_eq!(IMAGE_LENGTH, sink.0.borrow().len());
    }

    #[test]
    fn finished_writer_refuses_entries() {
        let mut out = ImageWriter::in_memory();
        out.write(&program(0)).unwrap();
        out.finish().unwrap();
        assert!(matches!(out.write(&program(1)), Err(Error::WriterFinished)));
        out.finish().unwrap();
        assert_eq!(IMAGE_LENGTH, out.bytes().unwrap().len());

        let sink = SharedSink::default();
        let mut out = ImageWriter::new(sink.clone());
        out.write(&alarm(0)).unwrap();
        out.finish().unwrap();
        assert!(matches!(out.write(&alarm(1)), Err(Error::WriterFinished)));
        drop(out);
        assert_eq!(IMAGE_LENGTH, sink.0.borrow().len());
    }

    /// Accepts `budget` bytes, then fails every write.
    struct FailingSink {
        seen: Rc<RefCell<Vec<u8>>>,
        budget: usize,
    }

    impl Write for FailingSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.budget == 0 {
                return Err(std::io::Error::other("disk full"));
            }
            let n = buf.len().min(self.budget);
            self.budget -= n;
            self.seen.borrow_mut().extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_flush_is_not_retried_on_drop() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let mut out = ImageWriter::new(FailingSink {
                seen: seen.clone(),
                budget: 1000,
            });
            out.write(&program(0)).unwrap();
            assert!(matches!(out.finish(), Err(Error::Io(_))));
        }
        assert_eq!(1000, seen.borrow().len());
    }

    #[test]
    fn drop_flushes() {
        let sink = SharedSink::default();
        {
            let mut out = ImageWriter::new(sink.clone());
            out.write(&alarm(3)).unwrap();
        }
        let bytes = sink.0.borrow().clone();
        let mut input = ImageReader::from_bytes(bytes).unwrap();
        assert_eq!(Some(alarm(3)), input.read::<Alarm>().unwrap());
    }

    #[test]
    fn reads_from_file() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        {
            let mut out = ImageWriter::create(tmp.path()).unwrap();
            out.write(&program(5)).unwrap();
            out.finish().unwrap();
        }
        let mut input = ImageReader::open(tmp.path()).unwrap();
        assert_eq!(Some(program(5)), input.read::<Program>().unwrap());
        assert_eq!(None, input.read::<Program>().unwrap());
    }
}
