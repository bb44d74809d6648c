use crate::app::{App, View};
use crate::geo::BlocCounts;
use crate::map::style::bloc_rgb;
use image::RgbImage;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, LineGauge, Paragraph, Widget, Wrap},
    Frame,
};

const INFO_WIDTH: u16 = 34;

/// Render the UI
pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Map + info
            Constraint::Length(3), // Slider
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    let main = if app.show_info && chunks[0].width > INFO_WIDTH * 2 {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(10), Constraint::Length(INFO_WIDTH)])
            .split(chunks[0])
    } else {
        Layout::default()
            .constraints([Constraint::Min(0)])
            .split(chunks[0])
    };

    render_map(frame, app, main[0]);
    if main.len() > 1 {
        let counts = app.bloc_counts();
        render_info(frame, app, counts, main[1]);
    }
    render_slider(frame, app, chunks[1]);
    render_status_bar(frame, app, chunks[2]);
}

fn render_map(frame: &mut Frame, app: &mut App, area: Rect) {
    let title = match &app.view {
        View::Image(period, _) | View::Missing(period) => format!(" Top Import Source {period} "),
        View::Empty => " Top Import Source ".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            title,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if let View::Missing(period) = app.view {
        let notice = Paragraph::new(vec![
            Line::from(Span::styled(
                format!("No map found for {period}"),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                "press g to generate it",
                Style::default().fg(Color::DarkGray),
            )),
        ])
        .alignment(Alignment::Center);
        frame.render_widget(notice, centered_rows(inner, 2));
        return;
    }

    // Half-block cells carry two pixel rows each
    if let Some(image) = app.fitted_image(inner.width as u32, inner.height as u32 * 2) {
        frame.render_widget(ImageWidget { image }, inner);
    }
}

fn centered_rows(area: Rect, rows: u16) -> Rect {
    let top = area.y + area.height.saturating_sub(rows) / 2;
    Rect::new(area.x, top, area.width, rows.min(area.height))
}

/// Draws an RGB image with one `▀` per two vertical pixels, centred in the area
struct ImageWidget<'a> {
    image: &'a RgbImage,
}

impl Widget for ImageWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (width, height) = self.image.dimensions();
        let cols = (width as u16).min(area.width);
        let rows = (height.div_ceil(2) as u16).min(area.height);
        let x0 = area.x + (area.width - cols) / 2;
        let y0 = area.y + (area.height - rows) / 2;

        let rgb = |x: u32, y: u32| {
            let [r, g, b] = self.image.get_pixel(x, y).0;
            Color::Rgb(r, g, b)
        };

        for row in 0..rows {
            let top = row as u32 * 2;
            for col in 0..cols {
                let x = col as u32;
                let fg = rgb(x, top);
                let bg = if top + 1 < height { rgb(x, top + 1) } else { Color::Reset };
                buf[(x0 + col, y0 + row)].set_char('▀').set_fg(fg).set_bg(bg);
            }
        }
    }
}

fn render_info(frame: &mut Frame, app: &App, counts: Option<BlocCounts>, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(" Info ", Style::default().fg(Color::Cyan)));

    let label = Style::default().fg(Color::DarkGray);
    let value = Style::default().fg(Color::White);
    let session = &app.session;

    let mut lines = Vec::new();
    if let Some(period) = session.current() {
        lines.push(Line::from(vec![
            Span::styled("Month    ", label),
            Span::styled(period.to_string(), value.add_modifier(Modifier::BOLD)),
            Span::styled(
                format!("  ({}/{})", session.index() + 1, session.labels().len()),
                label,
            ),
        ]));
        let path = app.store().path_for(period);
        let (text, color) = match app.view {
            View::Image(..) => (path.display().to_string(), Color::Green),
            _ => ("not found".to_string(), Color::Yellow),
        };
        lines.push(Line::from(vec![
            Span::styled("Image    ", label),
            Span::styled(text, Style::default().fg(color)),
        ]));
    }

    let playback = match (session.is_playing(), app.loop_playback()) {
        (true, true) => "playing (loop)",
        (true, false) => "playing",
        (false, _) => "paused",
    };
    lines.push(Line::from(vec![
        Span::styled("Playback ", label),
        Span::styled(playback, value),
    ]));

    if let Some(counts) = counts {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled("Countries led by", label)));
        for (bloc, count) in counts {
            let (name, color) = match bloc {
                Some(bloc) => {
                    let (r, g, b) = bloc_rgb(bloc);
                    (bloc.label(), Color::Rgb(r, g, b))
                }
                None => ("Unknown", Color::Gray),
            };
            lines.push(Line::from(vec![
                Span::styled("  ■ ", Style::default().fg(color)),
                Span::styled(format!("{name:<8}"), value),
                Span::styled(count.to_string(), value.add_modifier(Modifier::BOLD)),
            ]));
        }
    }

    lines.push(Line::default());
    for help in [
        "←/→ h/l  step",
        "Home/End first/last",
        "space    play/pause",
        "g        generate month",
        "r        refresh",
        "i        toggle info",
        "q/Esc    quit",
    ] {
        lines.push(Line::from(Span::styled(help, label)));
    }

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn render_slider(frame: &mut Frame, app: &App, area: Rect) {
    let session = &app.session;
    let count = session.labels().len();
    let ratio = if count > 1 {
        session.index() as f64 / (count - 1) as f64
    } else {
        1.0
    };

    let first = session.labels().first().map(|p| p.to_string()).unwrap_or_default();
    let last = session.labels().last().map(|p| p.to_string()).unwrap_or_default();
    let label = session
        .current()
        .map(|p| p.to_string())
        .unwrap_or_else(|| "--".to_string());

    let gauge = LineGauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(Span::styled(format!(" {first} .. {last} "), Style::default().fg(Color::DarkGray))),
        )
        .filled_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .unfilled_style(Style::default().fg(Color::DarkGray))
        .label(Span::styled(label, Style::default().fg(Color::Yellow)))
        .ratio(ratio.clamp(0.0, 1.0));
    frame.render_widget(gauge, area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(
            if app.session.is_playing() { " ▶ " } else { " ❚❚ " },
            Style::default().fg(Color::Green),
        ),
        Span::styled(
            if app.has_generator() { "[G]enerate " } else { "[g]enerate " },
            Style::default().fg(if app.has_generator() { Color::Green } else { Color::DarkGray }),
        ),
    ];
    if let Some(status) = &app.status {
        spans.push(Span::styled("| ", Style::default().fg(Color::DarkGray)));
        spans.push(Span::styled(status.clone(), Style::default().fg(Color::Yellow)));
    }
    spans.push(Span::styled(
        " | h/l:step space:play g:gen r:refresh i:info q:quit",
        Style::default().fg(Color::DarkGray),
    ));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
