use std::io::Write;

use controlfreak::image::ALARM_OFFSET;
use controlfreak::merge::records_from_image;
use controlfreak::{
    AfterTimer, Alarm, Collection, ImageReader, ImageWriter, MAX_ENTRIES, PowerLevel, Program,
    Record, Timer, TimerStart,
};
use tempfile::{Builder, NamedTempFile};

const LINES: &str = "\
Butter (Clarified) | 240 | Slow | 0:20:00 | At Set Temperature | Keep Warm
Carrots (Caramelize) | 300 | Medium | no timer
Boiling | 212
";

fn text_file(contents: &str) -> NamedTempFile {
    let mut f = NamedTempFile::new().unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    f
}

fn image_file() -> NamedTempFile {
    Builder::new().suffix(".FA1").tempfile().unwrap()
}

#[test]
fn text_to_image_and_back() {
    let source = text_file(LINES);
    let mut notes: Vec<String> = Vec::new();

    let mut merged = Collection::new();
    assert_eq!(3, merged.load(source.path(), &mut notes).unwrap());
    assert_eq!(2, merged.programs().len());
    assert_eq!(1, merged.alarms().len());

    let butter = &merged.programs()[0];
    assert_eq!("Butter (Clarified)", butter.name());
    assert_eq!(240, butter.temperature());
    assert_eq!(PowerLevel::Slow, butter.power());
    assert_eq!(Timer::new(0, 20, 0).unwrap(), butter.timer());
    assert_eq!(TimerStart::AtSetTemperature, butter.timer_start());
    assert_eq!(AfterTimer::KeepWarm, butter.after_timer());

    merged.sort();
    let text = merged.to_text();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(4, lines.len());
    assert!(lines[0].starts_with("Butter (Clarified)"));
    assert!(lines[1].starts_with("Carrots (Caramelize)"));
    assert!(lines[1].ends_with("no timer"));
    assert_eq!("", lines[2]);
    assert!(lines[3].starts_with("Boiling"));
    assert!(lines[3].ends_with("212"));

    assert!(merged.check_capacity(&mut notes));
    let image = image_file();
    {
        let mut out = ImageWriter::create(image.path()).unwrap();
        merged.write_image(&mut out).unwrap();
    }
    assert_eq!(controlfreak::IMAGE_LENGTH, std::fs::metadata(image.path()).unwrap().len() as usize);

    let mut again = Collection::new();
    assert_eq!(3, again.load(image.path(), &mut notes).unwrap());
    assert_eq!(merged.programs(), again.programs());
    assert_eq!(merged.alarms(), again.alarms());
    assert_eq!(text, again.to_text());
    assert!(notes.is_empty(), "{notes:?}");
}

#[test]
fn merging_the_same_records_twice() {
    let first = text_file(LINES);
    let second = text_file("Boiling|212\nSimmer | 185\n");
    let mut notes: Vec<String> = Vec::new();

    let mut merged = Collection::new();
    merged.load(first.path(), &mut notes).unwrap();
    assert_eq!(1, merged.load(second.path(), &mut notes).unwrap());
    assert_eq!(2, merged.alarms().len());
    assert_eq!(1, notes.len());
    assert!(notes[0].contains("duplicate alarm Boiling"), "{}", notes[0]);
}

#[test]
fn too_many_alarms_still_reports_text() {
    let mut merged = Collection::new();
    let mut notes: Vec<String> = Vec::new();
    for i in 0..=MAX_ENTRIES {
        let alarm = Alarm::new(format!("Alarm {i}"), 150).unwrap();
        merged.insert(Record::from(alarm), &mut notes);
    }

    assert!(!merged.check_capacity(&mut notes));
    assert_eq!(1, notes.len());
    assert!(notes[0].starts_with("Too many alarms"));
    assert_eq!(MAX_ENTRIES + 1, merged.to_text().lines().count());
}

#[test]
fn program_and_alarm_regions_do_not_mix() {
    let mut out = ImageWriter::in_memory();
    let program = Program::new(
        "Sear",
        450,
        PowerLevel::Max,
        Timer::OFF,
        TimerStart::AtBeginning,
        AfterTimer::Continue,
    )
    .unwrap();
    for i in 0..10 {
        out.write(&Alarm::new(format!("Hold {i}"), 100 + i).unwrap()).unwrap();
    }
    out.write(&program).unwrap();
    out.finish().unwrap();

    let bytes = out.bytes().unwrap().to_vec();
    assert_eq!(b"Sear", &bytes[..4]);
    assert_eq!(0xFF, bytes[36]);
    assert_eq!(b"Hold 0", &bytes[ALARM_OFFSET..ALARM_OFFSET + 6]);

    let records = records_from_image(ImageReader::from_bytes(bytes).unwrap()).unwrap();
    assert_eq!(11, records.len());
    assert_eq!(Record::Program(program), records[0]);
    assert!(records[1..].iter().all(|r| matches!(r, Record::Alarm(_))));
}

#[test]
fn bad_line_rejects_the_whole_source() {
    let source = text_file("Good | 100\nBad | 999\n");
    let mut merged = Collection::new();
    let mut notes: Vec<String> = Vec::new();
    let err = merged.load(source.path(), &mut notes).unwrap_err();
    assert!(err.to_string().contains("999"), "{err}");
    assert!(merged.alarms().is_empty());
}
