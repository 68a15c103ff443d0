#![allow(dead_code)]

//! The show file format (§4.3): marchers, sheets, field geometry, and the
//! binary codec for both the modern and 3.3-and-earlier dialects.

pub mod error;
pub mod extras;
pub mod legacy;
pub mod marcher;
pub mod mode;
pub mod sheet;
pub mod show;

pub use error::ShowError;
pub use extras::{BackgroundImage, Curve, PrintContinuity};
pub use marcher::{Marcher, MarcherError, MarcherFlags, SymbolKind};
pub use mode::{ShowMode, ShowModeKind};
pub use sheet::Sheet;
pub use show::{RejectUnknownVersion, Show, VersionMismatchHandler, CURRENT_MAJOR, CURRENT_MINOR};
