use crate::error::ShowError;
use crate::mode::ShowMode;
use crate::sheet::Sheet;
use calchart_core::block::{construct_block, find_block, parse_out_labels};
use calchart_core::{Reader, Writer};
use log::{debug, info, warn};

pub const CURRENT_MAJOR: u8 = 3;
pub const CURRENT_MINOR: u8 = 4;

const LEGACY_MAX_MAJOR: u8 = 3;
const LEGACY_MAX_MINOR: u8 = 3;

const DEFAULT_INSTRUMENT: &str = "default";

/// Asked whenever the `GURK` version carrier names a version newer than
/// [`CURRENT_MAJOR`].`CURRENT_MINOR` (§6, §9). Implementers with no
/// interactive host can pass [`RejectUnknownVersion`].
pub trait VersionMismatchHandler {
    fn should_proceed(&self, major: u8, minor: u8) -> bool;
}

/// The non-interactive default: any version this build doesn't recognize
/// is a hard error.
pub struct RejectUnknownVersion;

impl VersionMismatchHandler for RejectUnknownVersion {
    fn should_proceed(&self, _major: u8, _minor: u8) -> bool {
        false
    }
}

/// A whole drill (§3, §GLOSSARY): every marcher's label/instrument, the
/// ordered sheets, the selection and playback cursor, and the field
/// geometry it's laid out against.
#[derive(Clone, Debug, PartialEq)]
pub struct Show {
    pub num_marchers: u32,
    pub labels: Vec<String>,
    pub instruments: Vec<String>,
    pub description: String,
    pub sheets: Vec<Sheet>,
    pub current_sheet: u32,
    pub selection: Vec<u32>,
    pub mode: ShowMode,
}

impl Show {
    /// A blank show with `num_marchers` performers, numbered labels, no
    /// sheets (§6).
    pub fn create_new(num_marchers: u32) -> Self {
        Show {
            num_marchers,
            labels: (1..=num_marchers).map(|n| n.to_string()).collect(),
            instruments: vec![DEFAULT_INSTRUMENT.to_string(); num_marchers as usize],
            description: String::new(),
            sheets: Vec::new(),
            current_sheet: 0,
            selection: Vec::new(),
            mode: ShowMode::default(),
        }
    }

    pub fn decode(bytes: &[u8], version_handler: &dyn VersionMismatchHandler) -> Result<Self, ShowError> {
        let mut r = Reader::new(bytes);

        let magic = r.get_bytes(4)?;
        if magic != b"INGL" {
            return Err(ShowError::BadMagic);
        }

        // The oldest files carry the literal marker "GURK" with no embedded
        // version at all; newer ones replace its last two bytes with the
        // ASCII digits of major.minor (§4.3 ingest step 2).
        let gurk = r.get_bytes(4)?;
        if gurk == b"GURK" {
            info!("decoding legacy dialect, unversioned GURK marker");
            return crate::legacy::decode_legacy(&mut r);
        }
        if &gurk[0..2] != b"GU" {
            return Err(ShowError::BadMagic);
        }
        let major = gurk[2].wrapping_sub(b'0');
        let minor = gurk[3].wrapping_sub(b'0');

        if (major, minor) <= (LEGACY_MAX_MAJOR, LEGACY_MAX_MINOR) {
            info!("decoding legacy dialect, version {}.{}", major, minor);
            return crate::legacy::decode_legacy(&mut r);
        }

        if (major, minor) > (CURRENT_MAJOR, CURRENT_MINOR) {
            if !version_handler.should_proceed(major, minor) {
                return Err(ShowError::DecodeUnknownVersion { major, minor });
            }
            warn!(
                "proceeding past unknown version {}.{} on handler's say-so",
                major, minor
            );
        }

        let top_blocks = parse_out_labels(&mut r);
        let show_block = find_block(&top_blocks, b"SHOW").ok_or(ShowError::MissingBlock { tag: *b"SHOW" })?;
        let mut show_reader = show_block.reader;
        let blocks = parse_out_labels(&mut show_reader);

        let num_marchers = {
            let b = find_block(&blocks, b"SIZE").ok_or(ShowError::MissingBlock { tag: *b"SIZE" })?;
            let mut r = b.reader;
            r.get::<u32>()?
        };

        let labels = {
            let b = find_block(&blocks, b"LABL").ok_or(ShowError::MissingBlock { tag: *b"LABL" })?;
            let mut r = b.reader;
            let mut out = Vec::new();
            while !r.is_empty() {
                out.push(r.get_string()?);
            }
            out
        };

        let instruments = match find_block(&blocks, b"INST") {
            Some(b) => {
                let mut r = b.reader;
                let mut out = Vec::new();
                while !r.is_empty() {
                    out.push(r.get_string()?);
                }
                out
            }
            None => vec![DEFAULT_INSTRUMENT.to_string(); num_marchers as usize],
        };

        let description = match find_block(&blocks, b"DESC") {
            Some(b) => {
                let mut r = b.reader;
                r.get_string()?
            }
            None => String::new(),
        };

        let mut sheets = Vec::new();
        for b in blocks.iter().filter(|b| &b.tag == b"SHET") {
            let mut r = b.reader;
            sheets.push(Sheet::decode(&mut r, num_marchers)?);
        }

        let selection = match find_block(&blocks, b"SELE") {
            Some(b) => {
                let mut r = b.reader;
                let mut out = Vec::new();
                while !r.is_empty() {
                    out.push(r.get::<u32>()?);
                }
                out
            }
            None => Vec::new(),
        };

        let current_sheet = {
            let b = find_block(&blocks, b"CURR").ok_or(ShowError::MissingBlock { tag: *b"CURR" })?;
            let mut r = b.reader;
            r.get::<u32>()?
        };

        let mode = {
            let b = find_block(&blocks, b"MODE").ok_or(ShowError::MissingBlock { tag: *b"MODE" })?;
            let mut r = b.reader;
            ShowMode::decode(&mut r)?
        };

        debug!(
            "decoded show: {} marchers, {} sheets",
            num_marchers,
            sheets.len()
        );

        Ok(Show {
            num_marchers,
            labels,
            instruments,
            description,
            sheets,
            current_sheet,
            selection,
            mode,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Writer::new();
        out.append_bytes(b"INGL");
        out.append_bytes(b"GU");
        out.append(b'0' + CURRENT_MAJOR);
        out.append(b'0' + CURRENT_MINOR);

        let mut show_body = Writer::new();

        show_body.append_bytes(&construct_block(b"SIZE", &self.num_marchers.to_be_bytes()));

        {
            let mut w = Writer::new();
            for label in &self.labels {
                w.append_null_terminated_string(label);
            }
            show_body.append_bytes(&construct_block(b"LABL", w.as_bytes()));
        }

        if !self
            .instruments
            .iter()
            .all(|i| i == DEFAULT_INSTRUMENT)
        {
            let mut w = Writer::new();
            for instrument in &self.instruments {
                w.append_null_terminated_string(instrument);
            }
            show_body.append_bytes(&construct_block(b"INST", w.as_bytes()));
        }

        if !self.description.is_empty() {
            let mut w = Writer::new();
            w.append_null_terminated_string(&self.description);
            show_body.append_bytes(&construct_block(b"DESC", w.as_bytes()));
        }

        for sheet in &self.sheets {
            show_body.append_bytes(&sheet.encode());
        }

        if !self.selection.is_empty() {
            let mut w = Writer::new();
            for index in &self.selection {
                w.append(*index);
            }
            show_body.append_bytes(&construct_block(b"SELE", w.as_bytes()));
        }

        show_body.append_bytes(&construct_block(b"CURR", &self.current_sheet.to_be_bytes()));

        {
            let mut w = Writer::new();
            self.mode.encode(&mut w);
            show_body.append_bytes(&construct_block(b"MODE", w.as_bytes()));
        }

        out.append_bytes(&construct_block(b"SHOW", show_body.as_bytes()));
        out.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_show_round_trips() {
        let show = Show::create_new(2);
        let bytes = show.encode();
        let decoded = Show::decode(&bytes, &RejectUnknownVersion).unwrap();
        assert_eq!(decoded, show);
        assert_eq!(decoded.current_sheet, 0);
        assert!(decoded.sheets.is_empty());
    }

    #[test]
    fn round_trips_a_show_with_one_sheet() {
        let mut show = Show::create_new(1);
        let mut sheet = crate::sheet::Sheet::new(1, "sheet 1");
        sheet.beats = 8;
        show.sheets.push(sheet);
        show.current_sheet = 0;

        let bytes = show.encode();
        let decoded = Show::decode(&bytes, &RejectUnknownVersion).unwrap();
        assert_eq!(decoded.sheets.len(), 1);
        assert_eq!(decoded.sheets[0].beats, 8);
    }

    #[test]
    fn unknown_version_without_handler_is_rejected() {
        let show = Show::create_new(1);
        let mut bytes = show.encode();
        // Patch the GURK version bytes to 9.9.
        bytes[6] = b'9';
        bytes[7] = b'9';
        let err = Show::decode(&bytes, &RejectUnknownVersion).unwrap_err();
        assert!(matches!(err, ShowError::DecodeUnknownVersion { major: 9, minor: 9 }));
    }

    struct AlwaysProceed;
    impl VersionMismatchHandler for AlwaysProceed {
        fn should_proceed(&self, _major: u8, _minor: u8) -> bool {
            true
        }
    }

    #[test]
    fn unknown_version_with_handler_proceeds_and_decodes() {
        let show = Show::create_new(1);
        let mut bytes = show.encode();
        bytes[6] = b'9';
        bytes[7] = b'9';
        let decoded = Show::decode(&bytes, &AlwaysProceed).unwrap();
        assert_eq!(decoded.num_marchers, 1);
    }
}
