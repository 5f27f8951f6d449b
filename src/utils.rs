use std::fs;
use std::io::{self, Write};
use std::path::Path;
use owo_colors::OwoColorize;

use crate::entry::ENTRY_LENGTH;
use crate::image::{ALARM_OFFSET, BLOCK_LENGTH, FILLER_LENGTH};

/// What a byte of an image is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRole {
    /// Inside entry `index` (0-6) of its block.
    Entry { index: usize },
    Filler,
}

pub fn byte_role(offset: usize) -> ByteRole {
    let in_block = offset % BLOCK_LENGTH;
    if in_block >= BLOCK_LENGTH - FILLER_LENGTH {
        ByteRole::Filler
    } else {
        ByteRole::Entry { index: in_block / ENTRY_LENGTH }
    }
}

/// "programs" or "alarms" plus the block number within that region.
pub fn block_label(offset: usize) -> String {
    let (name, base) = if offset < ALARM_OFFSET {
        ("programs", 0)
    } else {
        ("alarms", ALARM_OFFSET)
    };
    format!("{name} block {:>2}", (offset - base) / BLOCK_LENGTH)
}

pub fn hex_dump_file<P: AsRef<Path>, W: Write>(
    out: &mut W,
    file_path: P,
    bytes_per_line: usize,
) -> io::Result<()> {
    let buffer = fs::read(&file_path)?;
    writeln!(out, "Hex dump of: {:?} ({} bytes)", file_path.as_ref(), buffer.len())?;

    for (i, chunk) in buffer.chunks(bytes_per_line).enumerate() {
        let offset = i * bytes_per_line;
        if offset % BLOCK_LENGTH == 0 || i == 0 {
            writeln!(out, "{}", format!("-- {} --", block_label(offset)).cyan())?;
        }
        let hex = chunk
            .iter()
            .enumerate()
            .map(|(j, b)| match byte_role(offset + j) {
                ByteRole::Filler => format!("{:02X}", b).dimmed().to_string(),
                ByteRole::Entry { .. } => format!("{:02X}", b),
            })
            .collect::<Vec<_>>()
            .join(" ");
        let ascii = chunk.iter().map(|&b| to_char(b)).collect::<String>();
        let pad = " ".repeat((bytes_per_line - chunk.len()) * 3);

        writeln!(out, "{:06X}  {}{}  |{}|", offset, hex, pad, ascii)?;
    }

    Ok(())
}

/// Reports the first differing byte with `context` bytes around it.
/// Returns whether the files differ.
pub fn diff_files<P: AsRef<Path>, W: Write>(
    out: &mut W,
    file1: P,
    file2: P,
    context: usize,
) -> io::Result<bool> {
    let bytes1 = fs::read(&file1)?;
    let bytes2 = fs::read(&file2)?;
    let len = usize::max(bytes1.len(), bytes2.len());

    writeln!(out, "Comparing: {:?} vs {:?}", file1.as_ref(), file2.as_ref())?;

    for i in 0..len {
        let b1 = *bytes1.get(i).unwrap_or(&0);
        let b2 = *bytes2.get(i).unwrap_or(&0);

        if b1 != b2 {
            let headline = format!(
                "Difference at byte {} ({}, {:?}): {:02X} != {:02X}",
                i,
                block_label(i),
                byte_role(i),
                b1,
                b2
            );
            writeln!(out, "\n{}", headline.red().bold())?;

            let start = i.saturating_sub(context);
            let end = usize::min(i + context, len);

            for j in start..end {
                let a = *bytes1.get(j).unwrap_or(&0);
                let b = *bytes2.get(j).unwrap_or(&0);
                let line = format!("[{:04}] {:02X} vs {:02X}  | {} {}", j, a, b, to_char(a), to_char(b));
                if a != b {
                    writeln!(out, "{} {}", ">>".yellow().bold(), line.yellow().bold())?;
                } else {
                    writeln!(out, "   {}", line)?;
                }
            }
            return Ok(true);
        }
    }

    writeln!(out, "{}", "Files are identical.".green().bold())?;
    Ok(false)
}

/// Compares two images block by block and lists the differing bytes of up
/// to `max_blocks` blocks. Returns the number of differing blocks shown.
pub fn diff_blocks<P: AsRef<Path>, W: Write>(
    out: &mut W,
    file1: P,
    file2: P,
    max_blocks: usize,
) -> io::Result<usize> {
    let bytes1 = fs::read(&file1)?;
    let bytes2 = fs::read(&file2)?;
    let len = usize::max(bytes1.len(), bytes2.len());

    let total_blocks = len.div_ceil(BLOCK_LENGTH);
    let mut shown = 0;

    for block in 0..total_blocks {
        let start = block * BLOCK_LENGTH;
        let byte1 = |i: usize| *bytes1.get(i).unwrap_or(&0xFF);
        let byte2 = |i: usize| *bytes2.get(i).unwrap_or(&0xFF);

        if (start..start + BLOCK_LENGTH).all(|i| byte1(i) == byte2(i)) {
            continue;
        }

        writeln!(out, "\n{} ({}-{}):", block_label(start), start, start + BLOCK_LENGTH - 1)?;
        for i in start..start + BLOCK_LENGTH {
            let (a, b) = (byte1(i), byte2(i));
            if a != b {
                let role = match byte_role(i) {
                    ByteRole::Entry { index } => format!("entry {index}"),
                    ByteRole::Filler => "filler".to_string(),
                };
                let line = format!("Byte {:05} ({}): {:02X} vs {:02X} | {} {}", i, role, a, b, to_char(a), to_char(b));
                writeln!(out, "{} {}", ">>".yellow().bold(), line.yellow().bold())?;
            }
        }

        shown += 1;
        if shown >= max_blocks {
            writeln!(out, "\nMax diff blocks reached.")?;
            break;
        }
    }

    if shown == 0 {
        writeln!(out, "All blocks are identical.")?;
    }

    Ok(shown)
}

pub fn to_char(b: u8) -> char {
    if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;
    use std::io::Write;

    fn image_file(edit: impl FnOnce(&mut Vec<u8>)) -> NamedTempFile {
        let mut data = vec![0xFF; crate::IMAGE_LENGTH];
        edit(&mut data);
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(&data).unwrap();
        f
    }

    #[test]
    fn roles_and_labels() {
        assert_eq!(ByteRole::Entry { index: 0 }, byte_role(0));
        assert_eq!(ByteRole::Entry { index: 6 }, byte_role(251));
        assert_eq!(ByteRole::Filler, byte_role(252));
        assert_eq!(ByteRole::Entry { index: 1 }, byte_role(256 + 36));
        assert_eq!("programs block  0", block_label(0));
        assert_eq!("programs block 15", block_label(4095));
        assert_eq!("alarms block  1", block_label(ALARM_OFFSET + 300));
    }

    #[test]
    fn hex_dump_lists_every_block() {
        let f = image_file(|_| {});
        let mut out = Vec::new();
        hex_dump_file(&mut out, f.path(), 16).unwrap();
        let text = String::from_utf8_lossy(&out);
        assert_eq!(32, text.matches("block").count());
        assert!(text.contains("alarms block 15"));
    }

    #[test]
    fn diff_files_detects_change() {
        let a = image_file(|_| {});
        let b = image_file(|d| d[300] = 0x41);
        let mut out = Vec::new();
        assert!(diff_files(&mut out, a.path(), b.path(), 2).unwrap());
        assert!(String::from_utf8_lossy(&out).contains("Difference at byte 300"));

        let mut out = Vec::new();
        assert!(!diff_files(&mut out, a.path(), a.path(), 2).unwrap());
    }

    #[test]
    fn diff_blocks_counts_changed_blocks() {
        let a = image_file(|_| {});
        let b = image_file(|d| {
            d[5] = 0;
            d[ALARM_OFFSET + 254] = 0;
        });
        let mut out = Vec::new();
        assert_eq!(2, diff_blocks(&mut out, a.path(), b.path(), 10).unwrap());
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("entry 0"));
        assert!(text.contains("filler"));

        let mut out = Vec::new();
        assert_eq!(1, diff_blocks(&mut out, a.path(), b.path(), 1).unwrap());
    }
}
