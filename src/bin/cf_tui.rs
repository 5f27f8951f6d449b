//! Interactive TUI viewer for .FA1 images.
//!
//! Keys: ↑/k/Mouse-Up  ↓/j/Mouse-Down  ←/→ switch view  g-goto  q-quit

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseEventKind},
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, layout::{Constraint, Direction, Layout, Rect}, style::{Color, Modifier, Style}, text::{Line, Span}, widgets::{Block, Borders, Paragraph}, Frame, Terminal};
use std::{cmp, fs, io, path::PathBuf, time::Duration};

use controlfreak::image::ALARM_OFFSET;
use controlfreak::merge::records_from_image;
use controlfreak::utils::{block_label, byte_role, to_char, ByteRole};
use controlfreak::{ImageReader, Record};

/// CLI arguments.
#[derive(Parser)]
struct Args {
    image_a: PathBuf,
    image_b: Option<PathBuf>,
}

/// One rendered line (offset, hex, ascii, per-byte diff flags)
struct HexLine {
    off: usize,
    hex_spans: Vec<Span<'static>>,
    ascii_spans: Vec<Span<'static>>,
}

/// Colour of a byte by region and role; differences win.
fn byte_colour(offset: usize, value: u8, diff: bool) -> Color {
    if diff {
        return Color::Red;
    }
    match byte_role(offset) {
        ByteRole::Filler => Color::DarkGray,
        ByteRole::Entry { .. } if value == 0xFF => Color::DarkGray,
        ByteRole::Entry { index } => {
            let even = index % 2 == 0;
            match (offset < ALARM_OFFSET, even) {
                (true, true) => Color::White,
                (true, false) => Color::Gray,
                (false, true) => Color::LightCyan,
                (false, false) => Color::Cyan,
            }
        }
    }
}

fn build_lines(buf_a: &[u8], buf_b: Option<&[u8]>, bytes: usize) -> Vec<HexLine> {
    let mut out = Vec::new();
    for (row, chunk_a) in buf_a.chunks(bytes).enumerate() {
        let offset = row * bytes;
        let chunk_b = buf_b.and_then(|b| b.get(offset..cmp::min(offset + bytes, b.len()))).unwrap_or(&[]);

        let mut hex_spans = Vec::with_capacity(bytes * 2);
        let mut ascii_spans = Vec::with_capacity(bytes);

        for (i, &a) in chunk_a.iter().enumerate() {
            let b = *chunk_b.get(i).unwrap_or(&0);
            let diff = buf_b.is_some() && a != b;

            let fg = byte_colour(offset + i, a, diff);
            hex_spans.push(Span::styled(format!("{:02X}", a), Style::default().fg(fg)));
            if i != bytes - 1 {
                hex_spans.push(Span::raw(" "));
            }
            ascii_spans.push(Span::styled(to_char(a).to_string(), Style::default().fg(fg)));
        }

        out.push(HexLine { off: offset, hex_spans, ascii_spans });
    }
    out
}

/// Decoded records of an image, or the error that stopped decoding.
fn build_entries(buf: &[u8]) -> Vec<Line<'static>> {
    let decoded = ImageReader::from_bytes(buf.to_vec()).and_then(records_from_image);
    match decoded {
        Ok(records) if records.is_empty() => vec![Line::from("(no entries)")],
        Ok(records) => records
            .into_iter()
            .map(|r| {
                let (tag, colour) = match r {
                    Record::Program(_) => ("P", Color::White),
                    Record::Alarm(_) => ("A", Color::Cyan),
                };
                Line::from(vec![
                    Span::styled(format!("{tag} "), Style::default().fg(Color::Yellow)),
                    Span::styled(r.to_string(), Style::default().fg(colour)),
                ])
            })
            .collect(),
        Err(e) => vec![Line::from(Span::styled(e.to_string(), Style::default().fg(Color::Red)))],
    }
}

enum Mode { View, Goto }

/// Menu options for the TUI
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum MenuItem {
    HexView,
    Entries,
}

impl MenuItem {
    fn all() -> &'static [MenuItem] {
        &[MenuItem::HexView, MenuItem::Entries]
    }
    fn title(&self) -> &'static str {
        match self {
            MenuItem::HexView => "Hex View",
            MenuItem::Entries => "Entries",
        }
    }
}

struct Pane {
    title: String,
    hex: Vec<HexLine>,
    entries: Vec<Line<'static>>,
}

struct App {
    panes: Vec<Pane>,
    scroll: usize,
    bytes_per_line: usize,
    mode: Mode,
    goto_input: String,
    menu_selected: usize,
}

impl App {
    fn try_jump(&mut self) -> Result<()> {
        let s = self.goto_input.trim();
        if s.is_empty() { return Ok(()); }
        let off = if let Some(hex) = s.strip_prefix("0x") {
            usize::from_str_radix(hex, 16)?
        } else if let Some(hex) = s.strip_suffix('h').or_else(|| s.strip_suffix('H')) {
            usize::from_str_radix(hex, 16)?
        } else { s.parse()? };
        self.scroll = off / self.bytes_per_line;
        Ok(())
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let buf_a = fs::read(&args.image_a).with_context(|| format!("Reading {:?}", args.image_a))?;
    let buf_b = if let Some(p) = &args.image_b {
        Some(fs::read(p).with_context(|| format!("Reading {:?}", p))?)
    } else { None };

    let bytes = 16;
    let mut panes = vec![Pane {
        title: args.image_a.display().to_string(),
        hex: build_lines(&buf_a, buf_b.as_deref(), bytes),
        entries: build_entries(&buf_a),
    }];
    if let (Some(path), Some(buf)) = (&args.image_b, &buf_b) {
        panes.push(Pane {
            title: path.display().to_string(),
            hex: build_lines(buf, Some(&buf_a), bytes),
            entries: build_entries(buf),
        });
    }
    let mut app = App { panes, scroll: 0, bytes_per_line: bytes, mode: Mode::View, goto_input: String::new(), menu_selected: 0 };

    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut term = Terminal::new(backend)?;

    let res = run(&mut term, &mut app);

    terminal::disable_raw_mode()?;
    execute!(term.backend_mut(), DisableMouseCapture, LeaveAlternateScreen)?;
    term.show_cursor()?;
    res
}

fn run(term: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        let mut should_quit = false;

        term.draw(|f: &mut Frame| draw(f, app))?;

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(k) if k.kind == KeyEventKind::Press => match app.mode {
                    Mode::View => match k.code {
                        KeyCode::Char('q') => should_quit = true,
                        KeyCode::Up | KeyCode::Char('k') => app.scroll = app.scroll.saturating_sub(1),
                        KeyCode::Down | KeyCode::Char('j') => app.scroll += 1,
                        KeyCode::Char('g') | KeyCode::Char('G') => { app.mode = Mode::Goto; app.goto_input.clear(); }
                        KeyCode::Left => app.menu_selected = app.menu_selected.saturating_sub(1),
                        KeyCode::Right => app.menu_selected = (app.menu_selected + 1).min(MenuItem::all().len() - 1),
                        _ => {}
                    },
                    Mode::Goto => match k.code {
                        KeyCode::Esc => app.mode = Mode::View,
                        KeyCode::Enter => if app.try_jump().is_ok() { app.mode = Mode::View },
                        KeyCode::Backspace => { app.goto_input.pop(); },
                        KeyCode::Char(c) => app.goto_input.push(c),
                        _ => {}
                    },
                },
                Event::Mouse(m) if matches!(app.mode, Mode::View) => match m.kind {
                    MouseEventKind::ScrollUp => app.scroll = app.scroll.saturating_sub(1),
                    MouseEventKind::ScrollDown => app.scroll += 1,
                    _ => {}
                },
                _ => {}
            }
        }

        if should_quit { break; }
    }

    Ok(())
}

fn draw(f: &mut Frame, app: &App) {
    let menu_items = MenuItem::all();
    let menu_spans: Vec<Span> = menu_items.iter().enumerate().map(|(i, item)| {
        if i == app.menu_selected {
            Span::styled(
                format!(" {} ", item.title()),
                Style::default().fg(Color::Black).bg(Color::Yellow).add_modifier(Modifier::BOLD),
            )
        } else {
            Span::styled(format!(" {} ", item.title()), Style::default().fg(Color::Yellow))
        }
    }).collect();

    let constraints = if matches!(app.mode, Mode::Goto) {
        vec![Constraint::Length(1), Constraint::Min(1), Constraint::Length(3), Constraint::Length(2)]
    } else {
        vec![Constraint::Length(1), Constraint::Min(1), Constraint::Length(2)]
    };
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(f.size());

    f.render_widget(Paragraph::new(Line::from(menu_spans)), rows[0]);

    let pane_constraints = vec![Constraint::Ratio(1, app.panes.len() as u32); app.panes.len()];
    let areas = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(pane_constraints)
        .split(rows[1]);

    for (pane, area) in app.panes.iter().zip(areas.iter()) {
        match menu_items[app.menu_selected] {
            MenuItem::HexView => draw_hex(f, *area, pane, app.scroll),
            MenuItem::Entries => draw_entries(f, *area, pane, app.scroll),
        }
    }

    if matches!(app.mode, Mode::Goto) {
        let prompt = Paragraph::new(Line::from(vec![
            Span::styled("Goto offset: ", Style::default().fg(Color::Yellow)),
            Span::raw(app.goto_input.as_str()),
        ]))
            .block(Block::default().borders(Borders::ALL).title("Input"));
        f.render_widget(prompt, rows[2]);
    }

    let help = Line::from(vec![
        Span::styled("↑/k", Style::default().fg(Color::Cyan)), Span::raw(" Scroll   "),
        Span::styled("←/→", Style::default().fg(Color::Cyan)), Span::raw(" View   "),
        Span::styled("g", Style::default().fg(Color::Cyan)), Span::raw(" Goto   "),
        Span::styled("q", Style::default().fg(Color::Cyan)), Span::raw(" Quit"),
    ]);
    let bar = Paragraph::new(help).block(Block::default().borders(Borders::TOP));
    if let Some(help_area) = rows.last() {
        f.render_widget(bar, *help_area);
    }
}

/// Draws the hex view of one image, labelling the block of the top line.
fn draw_hex(f: &mut Frame, area: Rect, pane: &Pane, scroll: usize) {
    let lines = &pane.hex;
    let max_rows = area.height.saturating_sub(2) as usize;
    let start = cmp::min(scroll, lines.len().saturating_sub(max_rows));
    let slice = &lines[start..cmp::min(start + max_rows, lines.len())];

    let label = slice.first().map(|l| block_label(l.off)).unwrap_or_default();
    let header = Span::styled(
        format!(" {} - {} ", pane.title, label),
        Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
    );
    let block = Block::default().borders(Borders::ALL).title(header);

    let body: Vec<Line> = slice
        .iter()
        .map(|l| {
            let mut spans = Vec::with_capacity(l.hex_spans.len() + l.ascii_spans.len() + 4);
            spans.push(Span::styled(format!("{:06X}", l.off), Style::default().fg(Color::DarkGray)));
            spans.push(Span::raw("  "));
            spans.extend(l.hex_spans.clone());
            spans.push(Span::raw("  |"));
            spans.extend(l.ascii_spans.clone());
            spans.push(Span::raw("|"));
            Line::from(spans)
        })
        .collect();

    f.render_widget(Paragraph::new(body).block(block), area);
}

fn draw_entries(f: &mut Frame, area: Rect, pane: &Pane, scroll: usize) {
    let max_rows = area.height.saturating_sub(2) as usize;
    let start = cmp::min(scroll, pane.entries.len().saturating_sub(max_rows));
    let end = cmp::min(start + max_rows, pane.entries.len());

    let header = Span::styled(
        format!(" {} ", pane.title),
        Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
    );
    let block = Block::default().borders(Borders::ALL).title(header);
    f.render_widget(Paragraph::new(pane.entries[start..end].to_vec()).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use controlfreak::{Alarm, ImageWriter};

    #[test]
    fn filler_and_unused_bytes_are_grey() {
        assert_eq!(Color::DarkGray, byte_colour(252, 0xFF, false));
        assert_eq!(Color::DarkGray, byte_colour(0, 0xFF, false));
        assert_eq!(Color::White, byte_colour(0, b'A', false));
        assert_eq!(Color::Cyan, byte_colour(ALARM_OFFSET + 36, b'A', false));
        assert_eq!(Color::Red, byte_colour(252, 0xFF, true));
    }

    #[test]
    fn lines_cover_the_image() {
        let buf = vec![0xFF; controlfreak::IMAGE_LENGTH];
        let lines = build_lines(&buf, None, 16);
        assert_eq!(512, lines.len());
        assert_eq!(0x1FF0, lines[511].off);
    }

    #[test]
    fn entries_are_decoded() {
        let mut out = ImageWriter::in_memory();
        out.write(&Alarm::new("Boiling", 212).unwrap()).unwrap();
        out.finish().unwrap();
        let lines = build_entries(out.bytes().unwrap());
        assert_eq!(1, lines.len());

        let lines = build_entries(&[0u8; 10]);
        assert_eq!(1, lines.len());
    }
}
