use calchart_continuity::Continuity;
use calchart_core::Coord;
use calchart_show::{Marcher, RejectUnknownVersion, Show, SymbolKind};

#[test]
fn minimal_show_round_trips_through_encode_decode() {
    let mut show = Show::create_new(1);
    let mut sheet = calchart_show::Sheet::new(1, "sheet 1");
    sheet.beats = 4;
    sheet.marchers[0] = Marcher::new(Coord::new(0, 0));
    sheet
        .continuity_by_symbol
        .insert(SymbolKind::Plain, Continuity::from_text("MT 4 E"));
    show.sheets.push(sheet);

    let bytes = show.encode();
    let decoded = Show::decode(&bytes, &RejectUnknownVersion).unwrap();

    assert_eq!(decoded, show);
}

#[test]
fn unknown_top_level_block_is_skipped_without_corrupting_the_rest() {
    let show = Show::create_new(2);
    let mut bytes = show.encode();

    // Splice an unrecognised, validly-framed block in right after the
    // header, mirroring an injected `ZZZZ` block at the top level (§8
    // scenario 6).
    let injected = calchart_core::block::construct_block(b"ZZZZ", b"unknown payload");
    let header_len = 8; // INGL + GURK+version
    bytes.splice(header_len..header_len, injected);

    let decoded = Show::decode(&bytes, &RejectUnknownVersion).unwrap();
    assert_eq!(decoded, show);
}

#[test]
fn empty_show_has_no_sheets_and_current_sheet_zero() {
    let show = Show::create_new(0);
    let bytes = show.encode();
    let decoded = Show::decode(&bytes, &RejectUnknownVersion).unwrap();
    assert_eq!(decoded.current_sheet, 0);
    assert!(decoded.sheets.is_empty());
}
