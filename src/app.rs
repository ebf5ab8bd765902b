use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;

use grid_editor::chart::{ChartKind, ChartRequest};
use grid_editor::find::FindOutcome;
use grid_editor::formula::RenderInstruction;
use grid_editor::grid::GridAccess;
use grid_editor::persist::SnapshotStore;
use grid_editor::style::Format;
use grid_editor::text::TextFn;
use grid_editor::transfer::TransferKind;
use grid_editor::{Coord, GridError, Session};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    Edit,
    FontSize,
    Color,
    Find,
    Replace { target: String },
    Export,
    Import,
}

impl Prompt {
    pub fn label(&self) -> String {
        match self {
            Prompt::Edit => "Edit".into(),
            Prompt::FontSize => "Font size (px)".into(),
            Prompt::Color => "Color".into(),
            Prompt::Find => "Find".into(),
            Prompt::Replace { target } => format!("Replace '{target}' with (blank = highlight)"),
            Prompt::Export => "Export CSV to".into(),
            Prompt::Import => "Import CSV from".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppMode {
    Normal,
    /// One-line input; Enter submits, Esc cancels
    Input(Prompt),
}

/// A blocking message; keys go to the popup until it is dismissed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub body: String,
}

impl Notice {
    fn error(e: &GridError) -> Self {
        Self {
            title: "Error".into(),
            body: e.to_string(),
        }
    }

    fn info(body: impl Into<String>) -> Self {
        Self {
            title: "Info".into(),
            body: body.into(),
        }
    }
}

pub struct App<S> {
    pub should_quit: bool,
    pub session: Session<S>,

    // UI state
    pub mode: AppMode,
    pub status: String,
    pub input: String,
    pub notices: VecDeque<Notice>,
    pub chart: Option<ChartRequest>,

    // Cursor: `anchor` is where the selection started, `focus` where it ends
    pub anchor: Coord,
    pub focus: Coord,
    pub row_offset: usize,
    pub visible_rows: usize,

    render_cache: HashMap<Coord, RenderInstruction>,
    /// Formula failures already reported, keyed by cell and raw text
    reported: HashSet<(Coord, String)>,
}

impl<S: SnapshotStore> App<S> {
    pub fn new(session: Session<S>) -> Self {
        Self {
            should_quit: false,
            session,
            mode: AppMode::Normal,
            status: "Arrows select, Shift+Up/Down select a column, e edit, ? keys, q quit".into(),
            input: String::new(),
            notices: VecDeque::new(),
            chart: None,
            anchor: Coord::new(0, 0),
            focus: Coord::new(0, 0),
            row_offset: 0,
            visible_rows: 20,
            render_cache: HashMap::new(),
            reported: HashSet::new(),
        }
    }

    pub fn notify_error(&mut self, e: GridError) {
        tracing::warn!(error = %e, "action failed");
        self.status = e.to_string();
        self.notices.push_back(Notice::error(&e));
    }

    pub fn notify(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        self.status = msg.clone();
        self.notices.push_back(Notice::info(msg));
    }

    pub fn dismiss_notice(&mut self) {
        self.notices.pop_front();
    }

    pub fn has_selection(&self) -> bool {
        self.session.selection().point().is_some()
    }

    // ===== Selection =====

    /// Move the cursor and select the single cell under it.
    pub fn move_by(&mut self, drow: isize, dcol: isize) {
        let (rows, cols) = self.dims();
        if rows == 0 || cols == 0 {
            return;
        }
        // with nothing selected the first move only re-selects the cursor
        let (drow, dcol) = if self.has_selection() { (drow, dcol) } else { (0, 0) };
        let to = Coord::new(step(self.focus.row, drow, rows), step(self.focus.col, dcol, cols));
        self.select(to, to);
    }

    /// Grow the selection from the anchor to a new focus.
    pub fn extend_by(&mut self, drow: isize, dcol: isize) {
        let (rows, cols) = self.dims();
        if rows == 0 || cols == 0 {
            return;
        }
        if !self.has_selection() {
            return self.move_by(0, 0);
        }
        let to = Coord::new(step(self.focus.row, drow, rows), step(self.focus.col, dcol, cols));
        self.select(self.anchor, to);
    }

    pub fn deselect(&mut self) {
        self.session.deselect();
        self.status = "Selection cleared".into();
    }

    fn select(&mut self, anchor: Coord, focus: Coord) {
        match self.session.select(anchor, focus) {
            Ok(()) => {
                self.anchor = anchor;
                self.focus = focus;
                self.status = match self.session.selection().column() {
                    Some(c) => format!("Column {} selected", column_name(c)),
                    None => format!("{}{}", column_name(focus.col), focus.row + 1),
                };
            }
            Err(e) => self.notify_error(e),
        }
    }

    fn dims(&self) -> (usize, usize) {
        let g = self.session.grid();
        (g.row_count(), g.col_count())
    }

    /// Cells inside the current selection rectangle.
    pub fn in_selection(&self, at: Coord) -> bool {
        if !self.has_selection() {
            return false;
        }
        let (r0, r1) = ordered(self.anchor.row, self.focus.row);
        let (c0, c1) = ordered(self.anchor.col, self.focus.col);
        (r0..=r1).contains(&at.row) && (c0..=c1).contains(&at.col)
    }

    // ===== Prompts =====

    pub fn begin_prompt(&mut self, prompt: Prompt) {
        if prompt == Prompt::Edit {
            let Some(p) = self.session.selection().point() else {
                return self.notify_error(GridError::NoSelection("select a cell to edit"));
            };
            self.input = self
                .session
                .grid()
                .cell(p.row, p.col)
                .map(|v| v.to_string())
                .unwrap_or_default();
        } else {
            self.input.clear();
        }
        self.status = format!("{}: Enter to apply, Esc to cancel", prompt.label());
        self.mode = AppMode::Input(prompt);
    }

    pub fn cancel_prompt(&mut self) {
        self.mode = AppMode::Normal;
        self.input.clear();
        self.status = "Cancelled".into();
    }

    pub fn input_push(&mut self, c: char) {
        self.input.push(c);
    }

    pub fn input_pop(&mut self) {
        self.input.pop();
    }

    pub fn submit_prompt(&mut self) {
        let AppMode::Input(prompt) = std::mem::replace(&mut self.mode, AppMode::Normal) else {
            return;
        };
        let input = std::mem::take(&mut self.input);
        match prompt {
            Prompt::Edit => match self.session.edit_selected(&input) {
                Ok(at) => self.status = format!("Updated {}{}", column_name(at.col), at.row + 1),
                Err(e) => self.notify_error(e),
            },
            Prompt::FontSize => match input.trim().parse::<u32>() {
                Ok(px) => self.format(Format::FontSize(px)),
                Err(_) => self.notify(format!("'{input}' is not a font size")),
            },
            Prompt::Color => {
                if input.trim().is_empty() {
                    self.status = "No color given".into();
                } else {
                    self.format(Format::Color(input.trim().to_string()));
                }
            }
            Prompt::Find => {
                if input.is_empty() {
                    self.status = "Nothing to find".into();
                } else {
                    self.begin_prompt(Prompt::Replace { target: input });
                }
            }
            Prompt::Replace { target } => match self.session.find_replace(&target, &input) {
                Ok(FindOutcome::Highlighted(cells)) => {
                    self.status = format!("Highlighted {} cell(s), h to clear", cells.len());
                }
                Ok(FindOutcome::Replaced(n)) => self.notify(format!("Replaced {n} occurrence(s)")),
                Err(e) => self.notify_error(e),
            },
            Prompt::Export => self.transfer(input, true),
            Prompt::Import => self.transfer(input, false),
        }
    }

    fn transfer(&mut self, path: String, export: bool) {
        if path.trim().is_empty() {
            self.status = "Cancelled: no path".into();
            return;
        }
        let path = PathBuf::from(path.trim());
        let result = if export {
            self.session.export(TransferKind::Csv, &path)
        } else {
            self.session.import(TransferKind::Csv, &path)
        };
        match result {
            Ok(rows) if export => self.notify(format!("Exported {rows} row(s) to {}", path.display())),
            Ok(rows) => self.notify(format!("Imported {rows} row(s) from {}", path.display())),
            Err(e) => self.notify_error(e),
        }
    }

    // ===== Commands =====

    pub fn format(&mut self, format: Format) {
        match self.session.apply_format(format) {
            Ok(style) => self.status = format!("Style: {}", describe_style(&style)),
            Err(e) => self.notify_error(e),
        }
    }

    pub fn clear_highlights(&mut self) {
        match self.session.clear_highlights() {
            Ok(n) => self.status = format!("Cleared {n} highlight(s)"),
            Err(e) => self.notify_error(e),
        }
    }

    pub fn dedup(&mut self) {
        match self.session.dedup() {
            Ok(n) => self.notify(format!("Removed {n} duplicate value(s)")),
            Err(e) => self.notify_error(e),
        }
    }

    pub fn add_row(&mut self) {
        match self.session.add_row() {
            Ok(r) => self.status = format!("Inserted row {}", r + 1),
            Err(e) => self.notify_error(e),
        }
    }

    pub fn delete_row(&mut self) {
        match self.session.delete_row() {
            Ok(r) => self.status = format!("Deleted row {}", r + 1),
            Err(e) => self.notify_error(e),
        }
    }

    pub fn add_column(&mut self) {
        match self.session.add_column() {
            Ok(c) => self.status = format!("Inserted column {}", column_name(c)),
            Err(e) => self.notify_error(e),
        }
    }

    pub fn delete_column(&mut self) {
        match self.session.delete_column() {
            Ok(c) => self.status = format!("Deleted column {}", column_name(c)),
            Err(e) => self.notify_error(e),
        }
    }

    pub fn text_fn(&mut self, func: TextFn) {
        match self.session.apply_text_fn(func) {
            Ok(true) => self.status = format!("Applied {func}"),
            Ok(false) => self.status = format!("{func}: nothing to change"),
            Err(e) => self.notify_error(e),
        }
    }

    pub fn chart(&mut self, kind: ChartKind) {
        match self.session.create_chart(kind) {
            Ok(req) => {
                self.status = format!("{} chart of {} value(s), Esc to close", kind, req.values.len());
                self.chart = Some(req);
            }
            Err(e) => self.notify_error(e),
        }
    }

    pub fn save(&mut self) {
        match self.session.save() {
            Ok(()) => self.notify("Data saved"),
            Err(e) => self.notify_error(e),
        }
    }

    pub fn restore(&mut self) {
        match self.session.restore() {
            Ok(true) => self.notify("Data restored"),
            Ok(false) => self.notify("No saved data found"),
            Err(e) => self.notify_error(e),
        }
    }

    pub fn undo(&mut self) {
        let msg = if self.session.undo() { "Undone" } else { "Nothing to undo" };
        self.status = msg.into();
    }

    pub fn redo(&mut self) {
        let msg = if self.session.redo() { "Redone" } else { "Nothing to redo" };
        self.status = msg.into();
    }

    // ===== Rendering support =====

    /// Drop cached render instructions if the grid asked for a render.
    pub fn refresh_render_cache(&mut self) -> bool {
        let stale = self.session.take_render_request();
        if stale {
            self.render_cache.clear();
        }
        stale
    }

    /// Render instruction for a visible cell, evaluating it on first use.
    ///
    /// A formula that fails is reported once per cell and text.
    pub fn render(&mut self, at: Coord) -> Option<RenderInstruction> {
        if let Some(hit) = self.render_cache.get(&at) {
            return Some(hit.clone());
        }
        let instr = self.session.render_cell(at.row, at.col).ok()?;
        if let Some(err) = instr.failed()
            && self.reported.insert((at, instr.text.clone()))
        {
            let e = GridError::FormulaError(err.clone());
            self.notify_error(e);
        }
        self.render_cache.insert(at, instr.clone());
        Some(instr)
    }

    /// Keep the focused row inside the visible window.
    pub fn scroll_to_focus(&mut self, visible_rows: usize) {
        self.visible_rows = visible_rows.max(1);
        if self.focus.row < self.row_offset {
            self.row_offset = self.focus.row;
        } else if self.focus.row >= self.row_offset + self.visible_rows {
            self.row_offset = self.focus.row + 1 - self.visible_rows;
        }
        let rows = self.session.grid().row_count();
        self.row_offset = self.row_offset.min(rows.saturating_sub(1));
    }
}

fn step(at: usize, delta: isize, len: usize) -> usize {
    at.saturating_add_signed(delta).min(len - 1)
}

fn ordered(a: usize, b: usize) -> (usize, usize) {
    if a <= b { (a, b) } else { (b, a) }
}

fn describe_style(style: &grid_editor::style::CellStyle) -> String {
    let mut parts = Vec::new();
    if style.is_bold() {
        parts.push("bold".to_string());
    }
    if style.is_italic() {
        parts.push("italic".to_string());
    }
    if let Some(size) = &style.font_size {
        parts.push(size.clone());
    }
    if let Some(color) = &style.color {
        parts.push(color.clone());
    }
    if parts.is_empty() {
        "plain".into()
    } else {
        parts.join(", ")
    }
}

/// Spreadsheet column name: 0 -> A, 25 -> Z, 26 -> AA.
pub fn column_name(mut col: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (col % 26) as u8);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use grid_editor::SessionConfig;
    use grid_editor::persist::MemoryStore;
    use grid_editor::value::default_seed;

    fn app() -> App<MemoryStore> {
        let session =
            Session::new(MemoryStore::default(), SessionConfig::default(), default_seed()).unwrap();
        App::new(session)
    }

    #[test]
    fn column_names() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(27), "AB");
        assert_eq!(column_name(701), "ZZ");
    }

    #[test]
    fn shift_extends_into_a_column_selection() {
        let mut a = app();
        a.move_by(1, 1);
        assert_eq!(a.session.selection().point(), Some(Coord::new(0, 0)));
        a.move_by(1, 1);
        a.extend_by(2, 0);
        assert_eq!(a.session.selection().column(), Some(1));
        assert!(a.in_selection(Coord::new(3, 1)));
        assert!(!a.in_selection(Coord::new(3, 0)));
    }

    #[test]
    fn failures_become_notices() {
        let mut a = app();
        a.dedup();
        assert_eq!(a.notices.len(), 1);
        assert_eq!(a.notices[0].title, "Error");
        a.dismiss_notice();
        assert!(a.notices.is_empty());
    }

    #[test]
    fn broken_formula_reported_once() {
        let mut a = app();
        a.move_by(0, 0);
        a.begin_prompt(Prompt::Edit);
        a.input = "=NOPE(1)".into();
        a.submit_prompt();
        a.refresh_render_cache();
        assert!(a.render(Coord::new(0, 0)).unwrap().failed().is_some());
        assert_eq!(a.notices.len(), 1);
        a.refresh_render_cache();
        a.render(Coord::new(0, 0));
        assert_eq!(a.notices.len(), 1);
    }

    #[test]
    fn find_then_replace() {
        let mut a = app();
        a.begin_prompt(Prompt::Find);
        a.input = "Bob".into();
        a.submit_prompt();
        assert_eq!(a.mode, AppMode::Input(Prompt::Replace { target: "Bob".into() }));
        a.input = "Robert".into();
        a.submit_prompt();
        assert_eq!(a.session.matrix()[2][0], grid_editor::CellValue::text("Robert"));
    }
}
