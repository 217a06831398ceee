use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::Receiver,
        Arc,
    },
    time::Duration,
};

use crossterm::{
    event::{
        self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture,
        Event, KeyCode, KeyEventKind, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        block::Title, Axis, Block, BorderType, Borders, Chart, Clear, Dataset, GraphType,
        Paragraph,
    },
    Frame, Terminal,
};

use crate::app::{App, XAxisMode};
use crate::config::YScale;
use crate::constants::UI_FRAME_MS;
use crate::history::Sample;
use crate::sampler::Snapshot;
use crate::util::{format_clock, format_latency, format_stats};

pub fn run(mut app: App, updates: Receiver<Snapshot>, running: Arc<AtomicBool>) -> io::Result<()> {
    // Initialize terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture, EnableFocusChange)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app_loop(&mut terminal, &mut app, &updates, &running);
    running.store(false, Ordering::Relaxed);

    // Cleanup
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        DisableFocusChange
    )?;
    terminal.show_cursor()?;

    res
}

fn run_app_loop<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    updates: &Receiver<Snapshot>,
    running: &AtomicBool,
) -> io::Result<()> {
    let frame_rate = Duration::from_millis(UI_FRAME_MS);

    while running.load(Ordering::Relaxed) {
        app.drain(updates);
        terminal.draw(|f| draw(f, app))?;

        // Handle input
        if event::poll(frame_rate)? && !handle_event(app, event::read()?) {
            return Ok(());
        }
    }
    Ok(())
}

/// Applies one terminal event to the app. Returns `false` when the user asked to quit.
fn handle_event(app: &mut App, event: Event) -> bool {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
            KeyCode::Char('q') | KeyCode::Char('c') | KeyCode::Esc => return false,
            KeyCode::Char('t') => app.toggle_x_axis(),
            KeyCode::Char('y') => app.toggle_y_scale(),
            _ => {}
        },
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::Moved | MouseEventKind::Drag(_) => app.on_pointer(mouse.column, mouse.row),
            _ => {}
        },
        Event::FocusLost => app.clear_pointer(),
        _ => {}
    }
    true
}

pub fn draw(f: &mut Frame, app: &mut App) {
    // ============= whole screen layout ============
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(8),    // Chart
            Constraint::Length(1), // Bottom Status Bar
        ])
        .split(f.size());

    draw_chart(f, app, main_chunks[0]);
    draw_stats_overlay(f, app);
    draw_tooltip(f, app);
    draw_status_bar(f, app, main_chunks[1]);
}

fn x_labels(app: &App) -> Vec<String> {
    let samples = &app.snapshot.samples;
    if samples.is_empty() {
        return vec!["0".to_string(), "1".to_string()];
    }
    let last = samples.len() - 1;
    let picks = [0, last / 2, last];
    match app.x_axis {
        XAxisMode::Index => picks.iter().map(|i| i.to_string()).collect(),
        XAxisMode::Clock => picks
            .iter()
            .map(|&i| format_clock(&samples[i].timestamp))
            .collect(),
    }
}

fn y_labels(bounds: [f64; 2]) -> Vec<String> {
    let mid = (bounds[0] + bounds[1]) / 2.0;
    [bounds[0], mid, bounds[1]]
        .iter()
        .map(|v| format!("{:.0}", v))
        .collect()
}

// Approximates where Chart puts its plotting area inside `inner`:
// y labels and the y axis on the left, x labels and the x axis at the bottom.
fn plot_area(inner: Rect, x_labels: &[String], y_labels: &[String]) -> Rect {
    let y_width = y_labels.iter().map(|l| l.len()).max().unwrap_or(0) as u16;
    let first_x = x_labels.first().map_or(0, |l| l.len()) as u16;
    let left = y_width.max(first_x.saturating_sub(1)).min(inner.width / 3) + 1;
    let x = inner.x.saturating_add(left);
    let height = inner.height.saturating_sub(2);
    Rect::new(x, inner.y, inner.right().saturating_sub(x), height)
}

/// Splits the window into runs of present latencies, clipped at `ceiling`.
fn line_segments(samples: &[Sample], ceiling: f64) -> Vec<Vec<(f64, f64)>> {
    let mut segments = Vec::new();
    let mut current = Vec::new();
    for (i, sample) in samples.iter().enumerate() {
        match sample.latency_ms {
            Some(ms) => current.push((i as f64, ms.min(ceiling))),
            None if !current.is_empty() => segments.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

fn draw_chart(f: &mut Frame, app: &mut App, area: Rect) {
    let x_bounds = app.x_bounds();
    let y_bounds = app.y_bounds();
    let samples = &app.snapshot.samples;

    let segments = line_segments(samples, y_bounds[1]);
    let latest: Vec<(f64, f64)> = samples
        .last()
        .and_then(|s| s.latency_ms)
        .map(|ms| ((samples.len() - 1) as f64, ms.min(y_bounds[1])))
        .into_iter()
        .collect();
    let hovered: Vec<(f64, f64)> = app
        .hover
        .and_then(|h| h.sample.latency_ms.map(|ms| (h.index as f64, ms.min(y_bounds[1]))))
        .into_iter()
        .collect();

    // one line per run of present samples, so gaps stay visible
    let mut datasets: Vec<Dataset> = segments
        .iter()
        .map(|segment| {
            // a lone point has no line to draw
            let graph_type = if segment.len() == 1 {
                GraphType::Scatter
            } else {
                GraphType::Line
            };
            Dataset::default()
                .marker(Marker::Braille)
                .graph_type(graph_type)
                .style(Style::default().fg(Color::Cyan))
                .data(segment)
        })
        .collect();
    if !latest.is_empty() {
        datasets.push(
            Dataset::default()
                .marker(Marker::Dot)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(Color::Yellow))
                .data(&latest),
        );
    }
    if !hovered.is_empty() {
        datasets.push(
            Dataset::default()
                .marker(Marker::Block)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(Color::Magenta))
                .data(&hovered),
        );
    }

    // latest point label, "<value>ms"
    let latest_label = match app.snapshot.latest().and_then(|s| s.latency_ms) {
        Some(ms) => format!(" latest {}ms ", ms),
        None => " waiting for reply ".to_string(),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" Real-time Latency Chart [{}] ", app.target))
        .title(
            Title::from(Span::styled(
                latest_label,
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ))
            .alignment(Alignment::Right),
        );

    let x_text = x_labels(app);
    let y_text = y_labels(y_bounds);
    app.plot_area = plot_area(block.inner(area), &x_text, &y_text);

    let x_title = match app.x_axis {
        XAxisMode::Index => "Ping Number",
        XAxisMode::Clock => "Time",
    };
    let y_title = match app.y_scale {
        YScale::Fixed(_) => "Ping Time (ms, fixed)",
        YScale::Auto => "Ping Time (ms)",
    };

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .title(Span::styled(x_title, Style::default().fg(Color::DarkGray)))
                .style(Style::default().fg(Color::Gray))
                .bounds(x_bounds)
                .labels(x_text.into_iter().map(Span::raw).collect()),
        )
        .y_axis(
            Axis::default()
                .title(Span::styled(y_title, Style::default().fg(Color::DarkGray)))
                .style(Style::default().fg(Color::Gray))
                .bounds(y_bounds)
                .labels(y_text.into_iter().map(Span::raw).collect()),
        )
        .hidden_legend_constraints((Constraint::Length(0), Constraint::Length(0)));
    f.render_widget(chart, area);
}

fn draw_stats_overlay(f: &mut Frame, app: &App) {
    let plot = app.plot_area;
    let lines = format_stats(app.snapshot.stats.as_ref());
    let width = lines.iter().map(|l| l.len()).max().unwrap_or(0) as u16 + 4;
    let height = lines.len() as u16 + 2;
    if plot.width < width + 1 || plot.height < height {
        return;
    }
    let area = Rect::new(plot.right() - width - 1, plot.y, width, height);

    let text: Vec<Line> = lines
        .into_iter()
        .map(|l| Line::from(Span::styled(l, Style::default().fg(Color::White))))
        .collect();
    let overlay = Paragraph::new(text).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(Clear, area);
    f.render_widget(overlay, area);
}

fn draw_tooltip(f: &mut Frame, app: &App) {
    let Some(hover) = app.hover else {
        return;
    };
    let lines = [
        format!("#{}", hover.index),
        format_clock(&hover.sample.timestamp),
        format_latency(hover.sample.latency_ms),
    ];
    let width = lines.iter().map(|l| l.len()).max().unwrap_or(0) as u16 + 4;
    let height = lines.len() as u16 + 2;

    let screen = f.size();
    if screen.width < width || screen.height < height {
        return;
    }
    // right of and above the pointer, pushed back inside the screen
    let x = hover.column.saturating_add(2).min(screen.right() - width);
    let y = hover.row.saturating_sub(height).max(screen.y);
    let area = Rect::new(x, y, width, height);

    let text: Vec<Line> = lines.into_iter().map(Line::from).collect();
    let tooltip = Paragraph::new(text).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(Color::Magenta)),
    );
    f.render_widget(Clear, area);
    f.render_widget(tooltip, area);
}

fn draw_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let snap = &app.snapshot;
    let mut spans = vec![
        Span::styled(
            " PING ",
            Style::default().bg(Color::White).fg(Color::Black).add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(" samples {}/{}", snap.samples.len(), snap.capacity)),
        Span::raw(format!(" | ticks {}", snap.ticks)),
        Span::raw(" | "),
        Span::styled("skipped ", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
        Span::raw(format!(
            "{} (timeout {}, unreachable {}, no latency {}, launch {})",
            snap.skipped.total(),
            snap.skipped.timeout,
            snap.skipped.exit,
            snap.skipped.unparsed,
            snap.skipped.launch
        )),
    ];
    if let Some(reason) = snap.last_skip {
        spans.push(Span::styled(
            format!(" last: {}", reason.label()),
            Style::default().fg(Color::DarkGray),
        ));
    }
    spans.push(Span::raw(" | q quit, t time axis, y scale"));

    let status_bar =
        Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Rgb(20, 20, 20)));
    f.render_widget(status_bar, area);
}
