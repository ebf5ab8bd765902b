//! Per-cell formatting metadata.
//!
//! Styles live beside the values in the grid's metadata channel and are
//! keyed by coordinate only. Overwriting or clearing a value leaves its
//! style alone, and structural edits never prune entries.

use crate::error::Result;
use crate::grid::GridAccess;
use crate::selection::SelectionTracker;
use crate::value::Coord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Normal,
    Italic,
}

/// Formatting attributes; `None` means "use the default".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellStyle {
    pub font_weight: Option<FontWeight>,
    pub font_style: Option<FontStyle>,
    /// Stored with its unit, e.g. `"14px"`
    pub font_size: Option<String>,
    pub color: Option<String>,
}

impl CellStyle {
    /// Overlay every attribute `other` sets onto `self`.
    pub fn merge(&mut self, other: &CellStyle) {
        if other.font_weight.is_some() {
            self.font_weight = other.font_weight;
        }
        if other.font_style.is_some() {
            self.font_style = other.font_style;
        }
        if other.font_size.is_some() {
            self.font_size.clone_from(&other.font_size);
        }
        if other.color.is_some() {
            self.color.clone_from(&other.color);
        }
    }

    pub fn is_bold(&self) -> bool {
        self.font_weight == Some(FontWeight::Bold)
    }

    pub fn is_italic(&self) -> bool {
        self.font_style == Some(FontStyle::Italic)
    }
}

/// Everything the grid stores about a cell besides its value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellMeta {
    pub style: CellStyle,
    /// Presentation class, e.g. the find highlight
    pub class_name: Option<String>,
}

impl CellMeta {
    pub fn has_class(&self, class: &str) -> bool {
        self.class_name.as_deref() == Some(class)
    }

    /// Merge `update` into `self` attribute by attribute.
    pub fn merge(&mut self, update: &CellMeta) {
        self.style.merge(&update.style);
        if update.class_name.is_some() {
            self.class_name.clone_from(&update.class_name);
        }
    }
}

/// A formatting action from the toolbar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Format {
    /// Toggle bold/normal
    Bold,
    /// Toggle italic/normal
    Italic,
    /// Font size in pixels
    FontSize(u32),
    /// Any color string the front end understands (`#rrggbb`, `red`, ...)
    Color(String),
}

/// Apply `format` to the point-selected cell and request a render.
///
/// Returns the resulting style of the cell.
pub fn apply_format<G: GridAccess + ?Sized>(
    grid: &mut G,
    selection: &SelectionTracker,
    format: Format,
) -> Result<CellStyle> {
    let Coord { row, col } = selection.require_point("select a cell to format")?;
    let mut meta = grid.cell_meta(row, col)?;
    let style = &mut meta.style;
    match format {
        Format::Bold => {
            style.font_weight = Some(if style.is_bold() {
                FontWeight::Normal
            } else {
                FontWeight::Bold
            });
        }
        Format::Italic => {
            style.font_style = Some(if style.is_italic() {
                FontStyle::Normal
            } else {
                FontStyle::Italic
            });
        }
        Format::FontSize(px) => style.font_size = Some(format!("{px}px")),
        Format::Color(color) => style.color = Some(color),
    }
    let style = meta.style.clone();
    grid.set_cell_meta(row, col, meta)?;
    grid.request_render();
    tracing::debug!(row, col, ?style, "applied format");
    Ok(style)
}
