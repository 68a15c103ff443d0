use calchart_core::{BlockError, ReaderError};
use std::error;
use std::fmt;

/// Decode/encode failures for the show file format (§7). Decode errors are
/// fatal to the invocation that raised them; continuity errors are handled
/// separately by the evaluator (`calchart_continuity::EvalError`) and never
/// surface here.
#[derive(Debug)]
pub enum ShowError {
    BadMagic,
    DecodeTruncated,
    DecodeTagMismatch { opened: [u8; 4], closed: [u8; 4] },
    DecodeUnknownVersion { major: u8, minor: u8 },
    MissingBlock { tag: [u8; 4] },
    MarcherCountMismatch { expected: u32, found: usize },
    RangeError(String),
    ContinuityInconsistency {
        sheet: usize,
        symbol: u8,
        marcher: usize,
    },
    Utf8,
}

impl From<ReaderError> for ShowError {
    fn from(e: ReaderError) -> Self {
        match e {
            ReaderError::Truncated { .. } => ShowError::DecodeTruncated,
            ReaderError::MissingNulTerminator => ShowError::DecodeTruncated,
        }
    }
}

impl From<BlockError> for ShowError {
    fn from(e: BlockError) -> Self {
        match e {
            BlockError::Truncated => ShowError::DecodeTruncated,
            BlockError::TagMismatch { opened, closed } => {
                ShowError::DecodeTagMismatch { opened, closed }
            }
        }
    }
}

impl From<crate::marcher::MarcherError> for ShowError {
    fn from(e: crate::marcher::MarcherError) -> Self {
        match e {
            crate::marcher::MarcherError::Reader(r) => r.into(),
            crate::marcher::MarcherError::RangeError { symbol } => {
                ShowError::RangeError(format!("symbol index {} out of range 0..7", symbol))
            }
            crate::marcher::MarcherError::RefIndexOutOfRange { which } => {
                ShowError::RangeError(format!("reference point index {} out of range 0..3", which))
            }
        }
    }
}

impl error::Error for ShowError {}
impl fmt::Display for ShowError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::BadMagic => write!(f, "missing INGL magic"),
            Self::DecodeTruncated => write!(f, "decode truncated before declared size"),
            Self::DecodeTagMismatch { opened, closed } => write!(
                f,
                "END sentinel tag {:?} does not match opening tag {:?}",
                String::from_utf8_lossy(closed),
                String::from_utf8_lossy(opened)
            ),
            Self::DecodeUnknownVersion { major, minor } => {
                write!(f, "unknown show version {}.{}", major, minor)
            }
            Self::MissingBlock { tag } => {
                write!(f, "missing required block {:?}", String::from_utf8_lossy(tag))
            }
            Self::MarcherCountMismatch { expected, found } => write!(
                f,
                "sheet has {} marcher entries, show declares {}",
                found, expected
            ),
            Self::RangeError(msg) => write!(f, "range error: {}", msg),
            Self::ContinuityInconsistency {
                sheet,
                symbol,
                marcher,
            } => write!(
                f,
                "sheet {} symbol {} marcher {}: inconsistent legacy continuity index",
                sheet, symbol, marcher
            ),
            Self::Utf8 => write!(f, "invalid utf-8"),
        }
    }
}
