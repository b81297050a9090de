pub mod charting;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Axis, Chart, Dataset, GraphType, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::app::{App, AppState};
use crate::session::{CharState, MistakeEntry};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

const TYPING_LEGEND: &str =
    "(→) new / (←) restart / (tab) stop / (^l) lang / (^k) category / (^d) time / (^t) theme / (^e) export / (esc)ape";
const RESULTS_LEGEND: &str = "(r)etry / (n)ew / (^e) export / (esc)ape";

/// Colors that change with the theme toggle
struct Palette {
    base: Style,
    correct: Color,
    incorrect: Color,
    accent: Color,
}

impl Palette {
    fn new(dark: bool) -> Self {
        if dark {
            Self {
                base: Style::default().fg(Color::Gray).bg(Color::Black),
                correct: Color::LightGreen,
                incorrect: Color::LightRed,
                accent: Color::LightMagenta,
            }
        } else {
            Self {
                base: Style::default(),
                correct: Color::Green,
                incorrect: Color::Red,
                accent: Color::Magenta,
            }
        }
    }
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let palette = Palette::new(self.trainer.settings().dark_theme);
        buf.set_style(area, palette.base);

        match self.state {
            AppState::Typing => render_typing(self, &palette, area, buf),
            AppState::Results => render_results(self, &palette, area, buf),
        }
    }
}

fn render_typing(app: &App, palette: &Palette, area: Rect, buf: &mut Buffer) {
    let engine = app.trainer.engine();
    let settings = app.trainer.settings();

    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let green_bold_style = bold_style.fg(palette.correct);
    let red_bold_style = bold_style.fg(palette.incorrect);
    let dim_bold_style = bold_style.add_modifier(Modifier::DIM);
    let underlined_dim_bold_style = dim_bold_style.add_modifier(Modifier::UNDERLINED);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let prompt: String = engine.target().iter().collect();
    let max_chars_per_line = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
    let prompt_occupied_lines = if prompt.width() <= max_chars_per_line as usize {
        1
    } else {
        ((prompt.width() as f64 / max_chars_per_line as f64).ceil() + 1.0) as u16
    };
    let padding = area.height.saturating_sub(prompt_occupied_lines + 4) / 2;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(1), // session settings and goal
            Constraint::Length(1), // live metrics
            Constraint::Length(padding),
            Constraint::Length(prompt_occupied_lines),
            Constraint::Min(0),
            Constraint::Length(1), // status
            Constraint::Length(1), // legend
        ])
        .split(area);

    let goal = app.trainer.goal();
    let duration = match settings.test_duration {
        0 => "untimed".to_string(),
        secs => format!("{secs}s"),
    };
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            format!("{} · {} · {}", settings.language, settings.category, duration),
            bold_style,
        ),
        Span::styled(
            format!("   next goal: {} {} cpm", goal.tier, goal.threshold),
            Style::default().fg(palette.accent),
        ),
    ]))
    .alignment(Alignment::Center);
    header.render(chunks[0], buf);

    let metrics = engine.metrics();
    let speed = metrics
        .speed
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string());
    let mut metrics_line = format!(
        "{speed} cpm   {}% acc   {}%   rhythm {:.0}",
        metrics.accuracy, metrics.progress, metrics.rhythm
    );
    if let Some(left) = metrics.seconds_left {
        metrics_line.push_str(&format!("   {}:{:02}", left / 60, left % 60));
    }
    Paragraph::new(Span::styled(metrics_line, dim_bold_style))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

    let spans = engine
        .target()
        .iter()
        .zip(engine.char_states())
        .enumerate()
        .map(|(idx, (&expected, state))| match state {
            CharState::Correct => Span::styled(expected.to_string(), green_bold_style),
            CharState::Incorrect => {
                let typed = engine.typed().get(idx).copied().unwrap_or(expected);
                Span::styled(
                    match typed {
                        ' ' => "·".to_owned(),
                        c => c.to_string(),
                    },
                    red_bold_style,
                )
            }
            CharState::Current => Span::styled(expected.to_string(), underlined_dim_bold_style),
            CharState::Pending => Span::styled(expected.to_string(), dim_bold_style),
        })
        .collect::<Vec<Span>>();

    Paragraph::new(Line::from(spans))
        .alignment(if prompt_occupied_lines == 1 {
            Alignment::Center
        } else {
            Alignment::Left
        })
        .wrap(Wrap { trim: true })
        .render(chunks[3], buf);

    render_status(app, chunks[5], buf);
    Paragraph::new(Span::styled(TYPING_LEGEND, italic_style))
        .wrap(Wrap { trim: true })
        .render(chunks[6], buf);
}

fn render_results(app: &App, palette: &Palette, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let report = app.trainer.last_report();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(1),    // history chart
            Constraint::Length(1), // stats
            Constraint::Length(1), // goal
            Constraint::Length(report.len().max(1) as u16),
            Constraint::Length(1), // status
            Constraint::Length(1), // legend
        ])
        .split(area);

    let series = app.trainer.chart();
    let (sessions, y_max) = charting::compute_chart_params(&series);
    let datasets = vec![
        Dataset::default()
            .name("cpm")
            .marker(ratatui::symbols::Marker::Braille)
            .style(Style::default().fg(palette.accent))
            .graph_type(GraphType::Line)
            .data(&series.speeds),
        Dataset::default()
            .name("acc %")
            .marker(ratatui::symbols::Marker::Braille)
            .style(Style::default().fg(palette.correct))
            .graph_type(GraphType::Line)
            .data(&series.accuracies),
    ];

    Chart::new(datasets)
        .x_axis(
            Axis::default()
                .title("session")
                .bounds([1.0, sessions])
                .labels(vec![
                    Span::styled("1", bold_style),
                    Span::styled(charting::format_label(sessions), bold_style),
                ]),
        )
        .y_axis(
            Axis::default()
                .bounds([0.0, y_max])
                .labels(vec![
                    Span::styled("0", bold_style),
                    Span::styled(charting::format_label(y_max), bold_style),
                ]),
        )
        .render(chunks[0], buf);

    let stats = match app.trainer.last_session() {
        Some(session) => format!(
            "{} cpm   {}% acc   {} mistakes   {:.2} sd",
            session.record.speed,
            session.record.accuracy,
            session.record.mistakes,
            session.rhythm_std_dev
        ),
        None => "nothing typed".to_string(),
    };
    Paragraph::new(Span::styled(stats, bold_style))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

    let goal = app.trainer.goal();
    Paragraph::new(Span::styled(
        format!(
            "average {} cpm, next goal: {} {} cpm",
            app.trainer
                .results()
                .average_speed(app.trainer.settings().language),
            goal.tier,
            goal.threshold
        ),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(chunks[2], buf);

    let lines = if report.is_empty() {
        vec![Line::from(Span::styled(
            "no mistakes found",
            Style::default().fg(palette.correct),
        ))]
    } else {
        report_lines(&report, palette)
    };
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(chunks[3], buf);

    render_status(app, chunks[4], buf);
    Paragraph::new(Span::styled(RESULTS_LEGEND, italic_style)).render(chunks[5], buf);
}

fn char_label(c: char) -> String {
    match c {
        ' ' => "Space".to_string(),
        c => format!("'{c}'"),
    }
}

fn report_lines(report: &[MistakeEntry], palette: &Palette) -> Vec<Line<'static>> {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    report
        .iter()
        .map(|entry| {
            let mut spans = vec![Span::styled(
                format!("{} ×{}  ", char_label(entry.character), entry.count),
                bold_style.fg(palette.incorrect),
            )];
            spans.push(Span::raw(
                entry
                    .contexts
                    .iter()
                    .map(|c| format!("…{c}…"))
                    .collect::<Vec<_>>()
                    .join("  "),
            ));
            Line::from(spans)
        })
        .collect()
}

fn render_status(app: &App, area: Rect, buf: &mut Buffer) {
    if let Some(status) = &app.status {
        Paragraph::new(Span::styled(
            status.as_str(),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center)
        .render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Locale, PracticeText, TextCatalog};
    use crate::config::{FileConfigStore, Settings};
    use crate::runtime::AppEvent;
    use crate::storage::{KeyValueStore, MemoryStore};
    use crate::submit::NoopSubmitter;
    use crate::trainer::Trainer;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::rc::Rc;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    fn at(ms: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(1_700_000_000_000 + ms)
    }

    fn create_test_app(content: &str, settings: Settings) -> (App, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let catalog = TextCatalog::new(vec![PracticeText {
            id: 1,
            language: settings.language,
            category: "quotes".into(),
            content: content.into(),
        }]);
        let store: Rc<dyn KeyValueStore> = Rc::new(MemoryStore::new());
        let trainer = Trainer::with_parts(
            settings,
            catalog,
            store,
            Box::new(NoopSubmitter),
            StdRng::seed_from_u64(1),
        );
        let app = App::new(
            trainer,
            Box::new(FileConfigStore::with_path(dir.path().join("config.json"))),
            dir.path().to_path_buf(),
        );
        (app, dir)
    }

    fn en_settings() -> Settings {
        Settings {
            language: Locale::En,
            test_duration: 0,
            ..Settings::default()
        }
    }

    fn render(app: &App, width: u16, height: u16) -> Buffer {
        let area = Rect::new(0, 0, width, height);
        let mut buffer = Buffer::empty(area);
        app.render(area, &mut buffer);
        buffer
    }

    fn rendered_text(buffer: &Buffer) -> String {
        buffer.content().iter().map(|c| c.symbol()).collect()
    }

    fn type_str(app: &mut App, s: &str) {
        for (i, c) in s.chars().enumerate() {
            app.handle_event(
                AppEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)),
                at(i as u64 * 100),
            );
        }
    }

    fn find_cell(buffer: &Buffer, symbol: &str) -> (u16, u16) {
        let area = buffer.area;
        for y in 0..area.height {
            for x in 0..area.width {
                if buffer[(x, y)].symbol() == symbol {
                    return (x, y);
                }
            }
        }
        panic!("{symbol} not rendered");
    }

    #[test]
    fn test_typing_screen_shows_prompt_and_header() {
        let (app, _dir) = create_test_app("hello world", en_settings());
        let text = rendered_text(&render(&app, 100, 24));

        assert!(text.contains("hello world"));
        assert!(text.contains("en · all · untimed"));
        assert!(text.contains("next goal: easy 40 cpm"));
    }

    #[test]
    fn test_timed_session_shows_countdown() {
        let (app, _dir) = create_test_app(
            "hello",
            Settings {
                test_duration: 90,
                ..en_settings()
            },
        );
        let text = rendered_text(&render(&app, 100, 24));
        assert!(text.contains("1:30"));
    }

    #[test]
    fn test_char_states_are_colored() {
        let (mut app, _dir) = create_test_app("xyz", en_settings());
        type_str(&mut app, "xq");

        let buffer = render(&app, 100, 24);
        let (x, y) = find_cell(&buffer, "x");
        assert_eq!(buffer[(x, y)].fg, Color::Green);
        assert_eq!(buffer[(x + 1, y)].symbol(), "q");
        assert_eq!(buffer[(x + 1, y)].fg, Color::Red);
        assert!(buffer[(x + 2, y)]
            .modifier
            .contains(Modifier::UNDERLINED));
    }

    #[test]
    fn test_dark_theme_sets_background() {
        let (app, _dir) = create_test_app(
            "abc",
            Settings {
                dark_theme: true,
                ..en_settings()
            },
        );
        let buffer = render(&app, 60, 20);
        assert_eq!(buffer[(0, 0)].bg, Color::Black);
    }

    #[test]
    fn test_results_screen_lists_mistakes() {
        let (mut app, _dir) = create_test_app("the cat", en_settings());
        type_str(&mut app, "the cot");
        assert_eq!(app.state, AppState::Results);

        let text = rendered_text(&render(&app, 100, 30));
        assert!(text.contains("86% acc"));
        assert!(text.contains("1 mistakes"));
        assert!(text.contains("'a' ×1"));
        assert!(text.contains("(r)etry"));
    }

    #[test]
    fn test_clean_session_reports_no_mistakes() {
        let (mut app, _dir) = create_test_app("ok", en_settings());
        type_str(&mut app, "ok");
        let text = rendered_text(&render(&app, 100, 30));
        assert!(text.contains("100% acc"));
        assert!(text.contains("no mistakes found"));
    }

    #[test]
    fn test_missed_space_is_labelled() {
        let (mut app, _dir) = create_test_app("a b", en_settings());
        type_str(&mut app, "a_b");
        let text = rendered_text(&render(&app, 100, 30));
        assert!(text.contains("Space ×1"));
        assert!(!text.contains("' ' ×1"));
    }

    #[test]
    fn test_status_message_rendered() {
        let (mut app, _dir) = create_test_app("abc", en_settings());
        app.status = Some("no results to export".into());
        let text = rendered_text(&render(&app, 100, 24));
        assert!(text.contains("no results to export"));
    }

    #[test]
    fn test_small_and_large_areas_do_not_panic() {
        let (mut app, _dir) = create_test_app(&"long text ".repeat(40), en_settings());
        for (w, h) in [(1, 1), (10, 3), (20, 5), (200, 60)] {
            let buffer = render(&app, w, h);
            assert_eq!(buffer.area, Rect::new(0, 0, w, h));
        }

        app.handle_event(
            AppEvent::Key(KeyEvent::new(KeyCode::Tab, KeyModifiers::NONE)),
            at(0),
        );
        for (w, h) in [(1, 1), (20, 5), (200, 60)] {
            render(&app, w, h);
        }
    }
}
