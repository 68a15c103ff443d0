//! Decode-only support for the 3.3-and-earlier dialect (§4.3). Older shows
//! stored each marcher's fields in parallel arrays indexed by marcher
//! number rather than as self-describing per-marcher records, and gave each
//! marcher a raw continuity-index number instead of dispatching by symbol.
//! Upgrading folds that index back down to the modern per-symbol model,
//! which requires every marcher sharing a symbol to also share an index —
//! the consistency check this module exists to run.

use crate::error::ShowError;
use crate::marcher::{Marcher, SymbolKind};
use crate::mode::ShowMode;
use crate::sheet::Sheet;
use crate::show::Show;
use calchart_core::block::{find_block, parse_out_labels};
#[cfg(test)]
use calchart_core::block::construct_block;
use calchart_core::{Coord, Reader};
#[cfg(test)]
use calchart_core::Writer;
use calchart_continuity::Continuity;
use log::{debug, warn};
use std::collections::BTreeMap;

const DEFAULT_INSTRUMENT: &str = "default";

pub fn decode_legacy(reader: &mut Reader) -> Result<Show, ShowError> {
    let top = parse_out_labels(reader);
    let show_block = find_block(&top, b"SHOW").ok_or(ShowError::MissingBlock { tag: *b"SHOW" })?;
    let mut r = show_block.reader;
    let blocks = parse_out_labels(&mut r);

    let num_marchers = {
        let b = find_block(&blocks, b"SIZE").ok_or(ShowError::MissingBlock { tag: *b"SIZE" })?;
        let mut r = b.reader;
        r.get::<u32>()?
    };

    let labels = match find_block(&blocks, b"LABL") {
        Some(b) => {
            let mut r = b.reader;
            let mut out = Vec::new();
            while !r.is_empty() {
                out.push(r.get_string()?);
            }
            out
        }
        None => (1..=num_marchers).map(|n| n.to_string()).collect(),
    };

    let description = match find_block(&blocks, b"DESC") {
        Some(b) => {
            let mut r = b.reader;
            r.get_string()?
        }
        None => String::new(),
    };

    let mut sheets = Vec::new();
    for (sheet_index, b) in blocks.iter().filter(|b| &b.tag == b"SHET").enumerate() {
        let mut r = b.reader;
        sheets.push(decode_legacy_sheet(&mut r, num_marchers, sheet_index)?);
    }

    debug!(
        "decoded legacy show: {} marchers, {} sheets",
        num_marchers,
        sheets.len()
    );

    Ok(Show {
        num_marchers,
        labels,
        instruments: vec![DEFAULT_INSTRUMENT.to_string(); num_marchers as usize],
        description,
        sheets,
        current_sheet: 0,
        selection: Vec::new(),
        mode: ShowMode::default(),
    })
}

fn decode_legacy_sheet(
    reader: &mut Reader,
    num_marchers: u32,
    sheet_index: usize,
) -> Result<Sheet, ShowError> {
    let blocks = parse_out_labels(reader);
    let n = num_marchers as usize;

    let name = match find_block(&blocks, b"NAME") {
        Some(b) => {
            let mut r = b.reader;
            r.get_string()?
        }
        None => String::new(),
    };

    let beats = match find_block(&blocks, b"DURA") {
        Some(b) => {
            let mut r = b.reader;
            r.get::<u16>()? as u32
        }
        None => 0,
    };

    let positions = {
        let b = find_block(&blocks, b"POS ").ok_or(ShowError::MissingBlock { tag: *b"POS " })?;
        let mut r = b.reader;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(Coord::read(&mut r)?);
        }
        out
    };

    let ref_positions: Vec<[Coord; 3]> = match find_block(&blocks, b"REFP") {
        Some(b) => {
            let mut r = b.reader;
            let mut out = Vec::with_capacity(n);
            for _ in 0..n {
                out.push([
                    Coord::read(&mut r)?,
                    Coord::read(&mut r)?,
                    Coord::read(&mut r)?,
                ]);
            }
            out
        }
        None => positions.iter().map(|p| [*p; 3]).collect(),
    };

    let symbols = {
        let b = find_block(&blocks, b"SYMB").ok_or(ShowError::MissingBlock { tag: *b"SYMB" })?;
        let mut r = b.reader;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(SymbolKind::from_u8(r.get::<u8>()?)?);
        }
        out
    };

    let continuity_indices = {
        let b = find_block(&blocks, b"TYPE").ok_or(ShowError::MissingBlock { tag: *b"TYPE" })?;
        let mut r = b.reader;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(r.get::<u8>()?);
        }
        out
    };

    let flipped = match find_block(&blocks, b"LABL") {
        Some(b) => {
            let mut r = b.reader;
            let mut out = Vec::with_capacity(n);
            for _ in 0..n {
                out.push(r.get::<u8>()? != 0);
            }
            out
        }
        None => vec![false; n],
    };

    let continuity_texts: BTreeMap<u8, String> = match find_block(&blocks, b"CONT") {
        Some(b) => {
            let mut r = b.reader;
            let mut out = BTreeMap::new();
            while !r.is_empty() {
                let index = r.get::<u8>()?;
                let text = r.get_string()?;
                out.insert(index, text);
            }
            out
        }
        None => BTreeMap::new(),
    };

    check_continuity_consistency(sheet_index, &symbols, &continuity_indices)?;

    let mut symbol_to_index: BTreeMap<SymbolKind, u8> = BTreeMap::new();
    for (symbol, index) in symbols.iter().zip(continuity_indices.iter()) {
        symbol_to_index.entry(*symbol).or_insert(*index);
    }

    let mut continuity_by_symbol = BTreeMap::new();
    for (symbol, index) in symbol_to_index {
        let text = continuity_texts.get(&index).cloned().unwrap_or_default();
        continuity_by_symbol.insert(symbol, Continuity::from_text(&text));
    }

    let mut marchers = Vec::with_capacity(n);
    for i in 0..n {
        let mut m = Marcher::new(positions[i]);
        m.ref_positions = ref_positions[i];
        m.symbol = symbols[i];
        m.flags.label_flipped = flipped[i];
        marchers.push(m);
    }

    Ok(Sheet {
        name,
        beats,
        marchers,
        continuity_by_symbol,
        print_continuity: Default::default(),
        backgrounds: Vec::new(),
        curves: Vec::new(),
    })
}

/// The 3.3-and-earlier dialect let two marchers sharing a symbol point at
/// different continuity indices; the modern model has exactly one
/// continuity per symbol, so that can't be represented (§7
/// `ContinuityInconsistency`).
fn check_continuity_consistency(
    sheet_index: usize,
    symbols: &[SymbolKind],
    indices: &[u8],
) -> Result<(), ShowError> {
    let mut seen: BTreeMap<SymbolKind, u8> = BTreeMap::new();
    for (marcher, (symbol, index)) in symbols.iter().zip(indices.iter()).enumerate() {
        match seen.get(symbol) {
            Some(expected) if *expected != *index => {
                warn!(
                    "sheet {} symbol {:?} marcher {}: continuity index {} disagrees with {}",
                    sheet_index, symbol, marcher, index, expected
                );
                return Err(ShowError::ContinuityInconsistency {
                    sheet: sheet_index,
                    symbol: symbol.to_u8(),
                    marcher,
                });
            }
            Some(_) => {}
            None => {
                seen.insert(*symbol, *index);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_legacy_bytes(
        num_marchers: u32,
        positions: &[Coord],
        symbols: &[SymbolKind],
        indices: &[u8],
        continuity_texts: &[(u8, &str)],
        beats: u16,
    ) -> Vec<u8> {
        let mut sheet_body = Writer::new();
        sheet_body.append_bytes(&construct_block(b"NAME", b"sheet 1\0"));
        sheet_body.append_bytes(&construct_block(b"DURA", &beats.to_be_bytes()));
        {
            let mut w = Writer::new();
            for p in positions {
                p.write(&mut w);
            }
            sheet_body.append_bytes(&construct_block(b"POS ", w.as_bytes()));
        }
        {
            let mut w = Writer::new();
            for s in symbols {
                w.append(s.to_u8());
            }
            sheet_body.append_bytes(&construct_block(b"SYMB", w.as_bytes()));
        }
        {
            let mut w = Writer::new();
            for i in indices {
                w.append(*i);
            }
            sheet_body.append_bytes(&construct_block(b"TYPE", w.as_bytes()));
        }
        {
            let mut w = Writer::new();
            for (index, text) in continuity_texts {
                w.append(*index);
                w.append_null_terminated_string(text);
            }
            sheet_body.append_bytes(&construct_block(b"CONT", w.as_bytes()));
        }
        let sheet_block = construct_block(b"SHET", sheet_body.as_bytes());

        let mut show_body = Writer::new();
        show_body.append_bytes(&construct_block(b"SIZE", &num_marchers.to_be_bytes()));
        show_body.append_bytes(&sheet_block);
        let show_block = construct_block(b"SHOW", show_body.as_bytes());

        let mut out = Writer::new();
        out.append_bytes(b"INGL");
        out.append_bytes(b"GU");
        out.append(b'0' + 3);
        out.append(b'0' + 3);
        out.append_bytes(&show_block);
        out.into_bytes()
    }

    #[test]
    fn decodes_a_minimal_legacy_show() {
        let bytes = build_legacy_bytes(
            2,
            &[Coord::new(0, 0), Coord::new(16, 0)],
            &[SymbolKind::Plain, SymbolKind::Plain],
            &[1, 1],
            &[(1, "MT 4 E")],
            4,
        );
        let mut r = Reader::new(&bytes[8..]);
        let show = decode_legacy(&mut r).unwrap();
        assert_eq!(show.num_marchers, 2);
        assert_eq!(show.sheets.len(), 1);
        assert_eq!(show.sheets[0].beats, 4);
        assert_eq!(show.sheets[0].marchers[1].position, Coord::new(16, 0));
        assert!(matches!(
            show.sheets[0].continuity_by_symbol[&SymbolKind::Plain],
            Continuity::Parsed(_)
        ));
    }

    #[test]
    fn rejects_inconsistent_continuity_index_for_shared_symbol() {
        let bytes = build_legacy_bytes(
            2,
            &[Coord::new(0, 0), Coord::new(16, 0)],
            &[SymbolKind::Plain, SymbolKind::Plain],
            &[1, 2],
            &[(1, "MT 4 E"), (2, "MT 4 W")],
            4,
        );
        let mut r = Reader::new(&bytes[8..]);
        let err = decode_legacy(&mut r).unwrap_err();
        assert!(matches!(err, ShowError::ContinuityInconsistency { .. }));
    }
}
