use grid_editor::formula::{FormulaOutcome, RenderInstruction};
use grid_editor::grid::GridAccess;
use grid_editor::persist::SnapshotStore;
use grid_editor::{Coord, value::format_number};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{BarChart, Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap},
};

use crate::app::{App, AppMode, column_name};

const ROW_LABEL_WIDTH: u16 = 5;

pub fn draw<S: SnapshotStore>(f: &mut Frame, app: &mut App<S>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(2)].as_ref())
        .split(f.size());

    let top = chunks[0];
    let status_area = chunks[1];

    if app.chart.is_some() {
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)].as_ref())
            .split(top);
        draw_grid(f, body[0], app);
        draw_chart(f, body[1], app);
    } else {
        draw_grid(f, top, app);
    }
    draw_status(f, status_area, app);

    if let Some(notice) = app.notices.front() {
        let area = centered(f.size(), 50, 7);
        let p = Paragraph::new(vec![
            Line::from(notice.body.as_str()),
            Line::from(""),
            Line::from(Span::styled(
                "Enter/Esc to dismiss",
                Style::default().fg(Color::DarkGray),
            )),
        ])
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(notice.title.as_str())
                .border_style(Style::default().fg(Color::Yellow)),
        );
        f.render_widget(Clear, area);
        f.render_widget(p, area);
    }
}

fn draw_grid<S: SnapshotStore>(f: &mut Frame, area: Rect, app: &mut App<S>) {
    let block = Block::default().borders(Borders::ALL).title("Sheet1");
    let (rows, cols) = {
        let g = app.session.grid();
        (g.row_count(), g.col_count())
    };
    if cols == 0 {
        let p = Paragraph::new("Empty sheet: press o to add a row, O to add a column").block(block);
        f.render_widget(p, area);
        return;
    }

    // borders + header row
    app.scroll_to_focus(area.height.saturating_sub(3) as usize);
    app.refresh_render_cache();

    let header_style = Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD);
    let header = Row::new(
        std::iter::once(Cell::from(""))
            .chain((0..cols).map(|c| Cell::from(column_name(c))))
            .collect::<Vec<_>>(),
    )
    .style(header_style);

    let end = (app.row_offset + app.visible_rows).min(rows);
    let point = app.session.selection().point();
    let mut table_rows = Vec::with_capacity(end.saturating_sub(app.row_offset));
    for r in app.row_offset..end {
        let mut cells = Vec::with_capacity(cols + 1);
        cells.push(Cell::from((r + 1).to_string()).style(header_style));
        for c in 0..cols {
            let at = Coord::new(r, c);
            let Some(instr) = app.render(at) else {
                cells.push(Cell::from(""));
                continue;
            };
            let mut style = cell_style(&instr);
            if point == Some(at) {
                style = style.bg(Color::Blue).fg(Color::Black);
            } else if app.in_selection(at) {
                style = style.bg(Color::DarkGray);
            }
            cells.push(Cell::from(instr.text).style(style));
        }
        table_rows.push(Row::new(cells));
    }

    let mut widths = vec![Constraint::Length(ROW_LABEL_WIDTH)];
    widths.extend(column_widths(area.width.saturating_sub(ROW_LABEL_WIDTH + 1), cols));
    let table = Table::new(table_rows, widths)
        .header(header)
        .block(block)
        .column_spacing(1);

    f.render_widget(table, area);
}

/// Map cell metadata onto terminal attributes. Font size has no
/// terminal equivalent and only shows up in the status line.
fn cell_style(instr: &RenderInstruction) -> Style {
    let mut style = Style::default();
    if instr.style.is_bold() {
        style = style.add_modifier(Modifier::BOLD);
    }
    if instr.style.is_italic() {
        style = style.add_modifier(Modifier::ITALIC);
    }
    if let Some(color) = instr.color.as_deref().and_then(|c| c.parse::<Color>().ok()) {
        style = style.fg(color);
    }
    if instr.highlighted {
        style = style.bg(Color::Yellow).fg(Color::Black);
    }
    style
}

fn draw_status<S: SnapshotStore>(f: &mut Frame, area: Rect, app: &mut App<S>) {
    let mode = match app.mode {
        AppMode::Normal => "NORMAL",
        AppMode::Input(_) => "INPUT",
    };
    let mut spans = vec![
        Span::styled(
            format!("[{mode}] "),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(app.status.clone()),
    ];
    if let AppMode::Input(_) = app.mode {
        spans.push(Span::raw(format!(" | {}_", app.input)));
    } else if let Some(p) = app.session.selection().point()
        && let Some(instr) = app.render(p)
    {
        spans.push(Span::styled(
            format!(" | {}{}: {}", column_name(p.col), p.row + 1, preview(&instr)),
            Style::default().fg(Color::DarkGray),
        ));
        if let Some(size) = &instr.style.font_size {
            spans.push(Span::styled(format!(" ({size})"), Style::default().fg(Color::DarkGray)));
        }
    }
    let p = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::TOP));
    f.render_widget(p, area);
}

/// Raw text, plus the evaluated value for formula cells.
fn preview(instr: &RenderInstruction) -> String {
    match &instr.formula {
        FormulaOutcome::NotFormula => instr.text.clone(),
        FormulaOutcome::Evaluated(v) => format!("{} = {v}", instr.text),
        FormulaOutcome::Failed(e) => format!("{} ({e})", instr.text),
    }
}

fn draw_chart<S: SnapshotStore>(f: &mut Frame, area: Rect, app: &App<S>) {
    let Some(req) = &app.chart else {
        return;
    };
    let data: Vec<(&str, u64)> = req
        .labels
        .iter()
        .map(String::as_str)
        .zip(req.values.iter().map(|v| v.max(0.0).round() as u64))
        .collect();
    let caption = req
        .labels
        .iter()
        .zip(&req.values)
        .map(|(l, v)| format!("{l}: {}", format_number(*v)))
        .collect::<Vec<_>>()
        .join("  ");
    let n = data.len().max(1) as u16;
    let bar_width = (area.width.saturating_sub(2) / n).saturating_sub(1).clamp(1, 12);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)].as_ref())
        .split(area);
    let chart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("{} chart (Esc to close)", req.kind)),
        )
        .data(data.as_slice())
        .bar_width(bar_width)
        .bar_gap(1)
        .bar_style(Style::default().fg(Color::Green))
        .value_style(Style::default().fg(Color::Black).bg(Color::Green));
    f.render_widget(chart, chunks[0]);
    f.render_widget(
        Paragraph::new(caption)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL)),
        chunks[1],
    );
}

fn column_widths(total_width: u16, cols: usize) -> Vec<Constraint> {
    if cols == 0 {
        return vec![];
    }
    // one space of spacing between columns
    let w = usize::from(total_width).saturating_sub(2 + (cols - 1));
    let per = (w / cols).clamp(6, 24) as u16;
    (0..cols).map(|_| Constraint::Length(per)).collect()
}

fn centered(area: Rect, width_pct: u16, height: u16) -> Rect {
    let width = area.width * width_pct / 100;
    Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height: height.min(area.height),
    }
}
