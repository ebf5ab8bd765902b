use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use grid_editor::chart::ChartKind;
use grid_editor::persist::{SnapshotStore, SqliteStore};
use grid_editor::session::{DEFAULT_HIGHLIGHT_CLASS, DEFAULT_SNAPSHOT_KEY};
use grid_editor::style::Format;
use grid_editor::text::TextFn;
use grid_editor::value::default_seed;
use grid_editor::{Session, SessionConfig, logging};
use ratatui::{backend::CrosstermBackend, prelude::*};

mod app;
mod ui;

use app::{App, AppMode, Prompt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Terminal spreadsheet editor")]
struct Args {
    /// SQLite file holding saved snapshots
    #[arg(long, value_name = "PATH", default_value = "grid-editor.db")]
    db: PathBuf,

    /// Snapshot slot to save to and restore from
    #[arg(long, default_value = DEFAULT_SNAPSHOT_KEY)]
    key: String,

    /// Do not load the saved snapshot at startup
    #[arg(long)]
    no_restore: bool,

    /// Start from an empty sheet instead of the sample data
    #[arg(long)]
    empty: bool,

    /// Write logs to this file (nothing is logged otherwise)
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn restore_terminal(mut terminal: Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = logging::init(args.log_file.as_deref(), &args.log_level);

    let store = SqliteStore::open(&args.db)
        .with_context(|| format!("failed to open {}", args.db.display()))?;
    let config = SessionConfig {
        snapshot_key: args.key.clone(),
        highlight_class: DEFAULT_HIGHLIGHT_CLASS.to_string(),
    };
    let initial = if args.empty { Vec::new() } else { default_seed() };
    let session = Session::new(store, config, initial)?;
    tracing::info!(db = %args.db.display(), key = %args.key, "session started");

    let mut app = App::new(session);
    if !args.no_restore {
        match app.session.restore() {
            Ok(true) => app.status = "Restored saved data".into(),
            Ok(false) => {}
            Err(e) => app.notify_error(e),
        }
    }

    let mut terminal = setup_terminal()?;

    let mut last_tick = Instant::now();
    let tick_rate = Duration::from_millis(100);

    let res = run_app(&mut terminal, &mut app, tick_rate, &mut last_tick);

    restore_terminal(terminal)?;
    if let Err(e) = res {
        eprintln!("Error: {e:?}");
    }
    Ok(())
}

fn run_app<S: SnapshotStore>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App<S>,
    tick_rate: Duration,
    last_tick: &mut Instant,
) -> Result<()> {
    // Redraw only when state changes or on tick
    let mut dirty = true;
    loop {
        let tick_due = last_tick.elapsed() >= tick_rate;
        if dirty || tick_due {
            terminal.draw(|f| ui::draw(f, app))?;
            dirty = false;
            if tick_due {
                *last_tick = Instant::now();
            }
        }

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::from_secs(0));

        if crossterm::event::poll(timeout)?
            && let Event::Key(key) = event::read()?
        {
            if !app.notices.is_empty() {
                // a notice blocks everything else until dismissed
                if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
                    app.dismiss_notice();
                }
            } else {
                match app.mode {
                    AppMode::Normal => handle_key_normal(app, key),
                    AppMode::Input(_) => handle_key_input(app, key),
                }
            }
            dirty = true;
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn handle_key_normal<S: SnapshotStore>(app: &mut App<S>, key: KeyEvent) {
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Up if shift => app.extend_by(-1, 0),
        KeyCode::Down if shift => app.extend_by(1, 0),
        KeyCode::Left if shift => app.extend_by(0, -1),
        KeyCode::Right if shift => app.extend_by(0, 1),
        KeyCode::Up => app.move_by(-1, 0),
        KeyCode::Down => app.move_by(1, 0),
        KeyCode::Left => app.move_by(0, -1),
        KeyCode::Right => app.move_by(0, 1),
        KeyCode::PageUp => app.move_by(-(app.visible_rows as isize), 0),
        KeyCode::PageDown => app.move_by(app.visible_rows as isize, 0),
        KeyCode::Esc => {
            if app.chart.take().is_some() {
                app.status = "Chart closed".into();
            } else {
                app.deselect();
            }
        }
        KeyCode::Char('e') | KeyCode::Enter => app.begin_prompt(Prompt::Edit),
        KeyCode::Char('b') => app.format(Format::Bold),
        KeyCode::Char('i') => app.format(Format::Italic),
        KeyCode::Char('f') => app.begin_prompt(Prompt::FontSize),
        KeyCode::Char('k') => app.begin_prompt(Prompt::Color),
        KeyCode::Char('/') => app.begin_prompt(Prompt::Find),
        KeyCode::Char('h') => app.clear_highlights(),
        KeyCode::Char('d') => app.dedup(),
        KeyCode::Char('o') => app.add_row(),
        KeyCode::Char('O') => app.add_column(),
        KeyCode::Char('x') => app.delete_row(),
        KeyCode::Char('X') => app.delete_column(),
        KeyCode::Char('t') => app.text_fn(TextFn::Trim),
        KeyCode::Char('U') => app.text_fn(TextFn::Upper),
        KeyCode::Char('L') => app.text_fn(TextFn::Lower),
        KeyCode::Char('1') => app.chart(ChartKind::Bar),
        KeyCode::Char('2') => app.chart(ChartKind::Line),
        KeyCode::Char('3') => app.chart(ChartKind::Pie),
        KeyCode::Char('s') => app.save(),
        KeyCode::Char('r') => app.restore(),
        KeyCode::Char('E') => app.begin_prompt(Prompt::Export),
        KeyCode::Char('I') => app.begin_prompt(Prompt::Import),
        KeyCode::Char('u') => app.undo(),
        KeyCode::Char('y') => app.redo(),
        KeyCode::Char('?') => app.notify(HELP),
        _ => {}
    }
}

fn handle_key_input<S: SnapshotStore>(app: &mut App<S>, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.submit_prompt(),
        KeyCode::Esc => app.cancel_prompt(),
        KeyCode::Backspace => app.input_pop(),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => app.input_push(c),
        _ => {}
    }
}

const HELP: &str = "arrows select | shift+arrows extend | e edit | b/i bold/italic | \
f font size | k color | / find & replace | h clear highlights | d dedup column | \
o/O add row/col | x/X delete row/col | t/U/L trim/upper/lower | 1/2/3 bar/line/pie | \
s save | r restore | E/I export/import csv | u/y undo/redo | q quit";
