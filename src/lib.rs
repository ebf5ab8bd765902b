//! Command-and-state core of a small spreadsheet editor.
//!
//! Every command reaches cell data through [`grid::GridAccess`]; the
//! [`session::Session`] owns the grid together with the derived selection
//! state, the formula engine and the snapshot store.

pub mod chart;
pub mod dedup;
pub mod error;
pub mod find;
pub mod formula;
pub mod grid;
pub mod logging;
pub mod persist;
pub mod selection;
pub mod session;
pub mod structure;
pub mod style;
pub mod text;
pub mod transfer;
pub mod value;

pub use error::{GridError, Result};
pub use session::{Session, SessionConfig};
pub use value::{CellValue, Coord, Matrix};
