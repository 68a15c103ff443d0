use crate::error::ShowError;
use crate::extras::{BackgroundImage, Curve, PrintContinuity};
use crate::marcher::{Marcher, SymbolKind};
use calchart_core::block::{construct_block, find_block, parse_out_labels};
use calchart_core::{Reader, Writer};
use calchart_continuity::Continuity;
use log::{debug, warn};
use std::collections::BTreeMap;

/// A single "frame" of the drill (§3, §GLOSSARY).
#[derive(Clone, Debug, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub beats: u32,
    pub marchers: Vec<Marcher>,
    pub continuity_by_symbol: BTreeMap<SymbolKind, Continuity>,
    pub print_continuity: PrintContinuity,
    pub backgrounds: Vec<BackgroundImage>,
    pub curves: Vec<(Curve, Vec<u32>)>,
}

impl Sheet {
    pub fn new(num_marchers: usize, name: impl Into<String>) -> Self {
        Sheet {
            name: name.into(),
            beats: 0,
            marchers: vec![Marcher::new(calchart_core::Coord::ZERO); num_marchers],
            continuity_by_symbol: BTreeMap::new(),
            print_continuity: PrintContinuity::default(),
            backgrounds: Vec::new(),
            curves: Vec::new(),
        }
    }

    pub fn decode(reader: &mut Reader, num_marchers: u32) -> Result<Self, ShowError> {
        let blocks = parse_out_labels(reader);

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
                r.get::<u32>()?
            }
            None => 0,
        };

        let mut marchers = Vec::new();
        if let Some(b) = find_block(&blocks, b"PNTS") {
            let mut r = b.reader;
            while !r.is_empty() {
                marchers.push(Marcher::decode(&mut r)?);
            }
        }
        if marchers.len() != num_marchers as usize {
            return Err(ShowError::MarcherCountMismatch {
                expected: num_marchers,
                found: marchers.len(),
            });
        }

        let mut continuity_by_symbol = BTreeMap::new();
        if let Some(b) = find_block(&blocks, b"VCNT") {
            let mut r = b.reader;
            for evct in parse_out_labels(&mut r) {
                if &evct.tag != b"EVCT" {
                    continue;
                }
                let mut er = evct.reader;
                let symbol = SymbolKind::from_u8(er.get::<u8>()?)?;
                let text = er.get_string()?;
                continuity_by_symbol.insert(symbol, Continuity::from_text(&text));
            }
        }

        let print_continuity = match find_block(&blocks, b"PCNT") {
            Some(b) => {
                let mut r = b.reader;
                PrintContinuity::decode(&mut r)?
            }
            None => PrintContinuity::default(),
        };

        let mut backgrounds = Vec::new();
        if let Some(b) = find_block(&blocks, b"BACK") {
            let mut r = b.reader;
            let count = r.get::<u32>()?;
            for _ in 0..count {
                backgrounds.push(BackgroundImage::decode(&mut r)?);
            }
        }

        let mut curves_raw = Vec::new();
        if let Some(b) = find_block(&blocks, b"CURV") {
            let mut r = b.reader;
            let count = r.get::<u32>()?;
            for _ in 0..count {
                curves_raw.push(Curve::decode(&mut r)?);
            }
        }
        let mut assignments_raw = Vec::new();
        if let Some(b) = find_block(&blocks, b"CASS") {
            let mut r = b.reader;
            let count = r.get::<u32>()?;
            for _ in 0..count {
                assignments_raw.push(r.get_vec::<u32>()?);
            }
        }
        let curves = curves_raw
            .into_iter()
            .zip(assignments_raw.into_iter().chain(std::iter::repeat(Vec::new())))
            .collect();

        debug!("decoded sheet {:?}: {} beats", name, beats);

        Ok(Sheet {
            name,
            beats,
            marchers,
            continuity_by_symbol,
            print_continuity,
            backgrounds,
            curves,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut body = Writer::new();

        body.append_bytes(&construct_block(b"NAME", {
            let mut w = Writer::new();
            w.append_null_terminated_string(&self.name);
            &w.into_bytes()
        }));

        body.append_bytes(&construct_block(b"DURA", &self.beats.to_be_bytes()));

        {
            let mut pnts = Writer::new();
            for marcher in &self.marchers {
                marcher.encode(&mut pnts);
            }
            body.append_bytes(&construct_block(b"PNTS", pnts.as_bytes()));
        }

        {
            let mut vcnt = Writer::new();
            for (symbol, continuity) in &self.continuity_by_symbol {
                let mut evct = Writer::new();
                evct.append(symbol.to_u8());
                let text = match continuity {
                    Continuity::Parsed(_) => continuity_to_text(continuity),
                    Continuity::Unparsed { text, .. } => text.clone(),
                };
                evct.append_null_terminated_string(&text);
                vcnt.append_bytes(&construct_block(b"EVCT", evct.as_bytes()));
            }
            body.append_bytes(&construct_block(b"VCNT", vcnt.as_bytes()));
        }

        {
            let mut pcnt = Writer::new();
            self.print_continuity.encode(&mut pcnt);
            body.append_bytes(&construct_block(b"PCNT", pcnt.as_bytes()));
        }

        {
            let mut back = Writer::new();
            back.append(self.backgrounds.len() as u32);
            for image in &self.backgrounds {
                image.encode(&mut back);
            }
            body.append_bytes(&construct_block(b"BACK", back.as_bytes()));
        }

        {
            let mut curv = Writer::new();
            curv.append(self.curves.len() as u32);
            for (curve, _) in &self.curves {
                curve.encode(&mut curv);
            }
            body.append_bytes(&construct_block(b"CURV", curv.as_bytes()));

            let mut cass = Writer::new();
            cass.append(self.curves.len() as u32);
            for (_, assigned) in &self.curves {
                cass.append_vec(assigned);
            }
            body.append_bytes(&construct_block(b"CASS", cass.as_bytes()));
        }

        construct_block(b"SHET", body.as_bytes())
    }
}

/// `Continuity` doesn't own its original source text once parsed; we
/// re-derive a textual form for round-tripping by walking the AST back into
/// the same surface syntax the parser accepts. Kept deliberately small: the
/// evaluator's own tests already cover every `Procedure` case.
fn continuity_to_text(continuity: &Continuity) -> String {
    let procedures = match continuity.procedures() {
        Some(p) => p,
        None => return String::new(),
    };
    if procedures.is_empty() {
        warn!("encoding an empty continuity");
    }
    procedures
        .iter()
        .map(procedure_to_text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// The parser's compass-direction keyword table, in degrees, in the order
/// it checks them. Used in reverse here so an encoded direction re-lexes as
/// `Value::Direction` rather than decaying into a bare `Value::Number`.
const COMPASS_TOKENS: [(&str, f32); 8] = [
    ("N", 0.0),
    ("NE", 45.0),
    ("E", 90.0),
    ("SE", 135.0),
    ("S", 180.0),
    ("SW", 225.0),
    ("W", 270.0),
    ("NW", 315.0),
];

fn direction_to_text(d: f32) -> String {
    match COMPASS_TOKENS.iter().find(|(_, deg)| *deg == d) {
        Some((token, _)) => token.to_string(),
        None => {
            warn!("direction {} isn't a compass multiple of 45, encoding as a plain number", d);
            format!("{}", d)
        }
    }
}

fn value_to_text(value: &calchart_continuity::Value) -> String {
    use calchart_continuity::{PointRef, Value};
    match value {
        Value::Number(n) => format!("{}", n),
        Value::Direction(d) => direction_to_text(*d),
        Value::Variable(c) => c.to_string(),
        Value::Point(PointRef::StartPoint) => "SP".to_string(),
        Value::Point(PointRef::NextPoint) => "NP".to_string(),
        Value::Point(PointRef::Reference(n)) => format!("R{}", n),
        Value::Add(a, b) => format!("({} + {})", value_to_text(a), value_to_text(b)),
        Value::Sub(a, b) => format!("({} - {})", value_to_text(a), value_to_text(b)),
        Value::Mul(a, b) => format!("({} * {})", value_to_text(a), value_to_text(b)),
        Value::Div(a, b) => format!("({} / {})", value_to_text(a), value_to_text(b)),
    }
}

fn procedure_to_text(procedure: &calchart_continuity::Procedure) -> String {
    use calchart_continuity::Procedure;
    match procedure {
        Procedure::MarkTime { beats, direction } => {
            format!("MT {} {}", value_to_text(beats), value_to_text(direction))
        }
        Procedure::Close { beats, direction } => {
            format!("CLOSE {} {}", value_to_text(beats), value_to_text(direction))
        }
        Procedure::EvenMarch { steps, direction } => {
            format!("EM {} {}", value_to_text(steps), value_to_text(direction))
        }
        Procedure::FlowTo { beats, direction } => {
            format!("FM {} {}", value_to_text(beats), value_to_text(direction))
        }
        Procedure::FlowToPoint { to, beats } => {
            format!("FMTO {} {}", value_to_text(to), value_to_text(beats))
        }
        Procedure::MagicMove { to } => format!("MAGIC {}", value_to_text(to)),
        Procedure::Countermarch {
            pivot,
            steps,
            direction,
        } => format!(
            "CM {} {} {}",
            value_to_text(pivot),
            value_to_text(steps),
            value_to_text(direction)
        ),
        Procedure::ExpandedMarch {
            steps,
            direction,
            spacing,
        } => format!(
            "EXPAND {} {} {}",
            value_to_text(steps),
            value_to_text(direction),
            value_to_text(spacing)
        ),
        Procedure::GridSnap { size } => format!("GRID {}", value_to_text(size)),
        Procedure::SetVariable { var, value } => format!("{} = {}", var, value_to_text(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calchart_core::Coord;

    #[test]
    fn round_trips_an_empty_sheet() {
        let sheet = Sheet::new(2, "sheet 1");
        let bytes = sheet.encode();
        let mut r = Reader::new(&bytes);
        let blocks = parse_out_labels(&mut r);
        assert_eq!(blocks.len(), 1);
        assert_eq!(&blocks[0].tag, b"SHET");
        let mut inner = blocks[0].reader;
        let decoded = Sheet::decode(&mut inner, 2).unwrap();
        assert_eq!(decoded, sheet);
    }

    #[test]
    fn round_trips_marchers_and_continuity() {
        let mut sheet = Sheet::new(1, "sheet 1");
        sheet.beats = 4;
        sheet.marchers[0] = Marcher::new(Coord::new(0, 0));
        sheet
            .continuity_by_symbol
            .insert(SymbolKind::Plain, Continuity::from_text("MT 4 E"));

        let bytes = sheet.encode();
        let mut r = Reader::new(&bytes);
        let blocks = parse_out_labels(&mut r);
        let mut inner = blocks[0].reader;
        let decoded = Sheet::decode(&mut inner, 1).unwrap();
        assert_eq!(decoded.beats, 4);
        assert_eq!(
            decoded.continuity_by_symbol.get(&SymbolKind::Plain),
            Some(&Continuity::from_text("MT 4 E"))
        );
    }

    #[test]
    fn rejects_marcher_count_mismatch() {
        let sheet = Sheet::new(3, "sheet 1");
        let bytes = sheet.encode();
        let mut r = Reader::new(&bytes);
        let blocks = parse_out_labels(&mut r);
        let mut inner = blocks[0].reader;
        let err = Sheet::decode(&mut inner, 5).unwrap_err();
        assert!(matches!(err, ShowError::MarcherCountMismatch { .. }));
    }
}
