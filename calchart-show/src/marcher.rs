use calchart_core::{Coord, Reader, ReaderError, Writer};
use std::error;
use std::fmt;

/// The visual glyph a group of marchers shares a continuity by (§3, §GLOSSARY).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SymbolKind {
    Plain = 0,
    Sol = 1,
    BackSlash = 2,
    Slash = 3,
    X = 4,
    SolidBackSlash = 5,
    SolidSlash = 6,
    SolidX = 7,
}

impl SymbolKind {
    pub const ALL: [SymbolKind; 8] = [
        SymbolKind::Plain,
        SymbolKind::Sol,
        SymbolKind::BackSlash,
        SymbolKind::Slash,
        SymbolKind::X,
        SymbolKind::SolidBackSlash,
        SymbolKind::SolidSlash,
        SymbolKind::SolidX,
    ];

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Result<Self, MarcherError> {
        SymbolKind::ALL
            .iter()
            .find(|s| s.to_u8() == value)
            .ok_or(MarcherError::RangeError { symbol: value })
            .copied()
    }
}

#[derive(Debug)]
pub enum MarcherError {
    Reader(ReaderError),
    RangeError { symbol: u8 },
    RefIndexOutOfRange { which: u8 },
}

impl From<ReaderError> for MarcherError {
    fn from(e: ReaderError) -> Self {
        MarcherError::Reader(e)
    }
}

impl error::Error for MarcherError {}
impl fmt::Display for MarcherError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Reader(e) => write!(f, "{}", e),
            Self::RangeError { symbol } => write!(f, "symbol index {} out of range 0..7", symbol),
            Self::RefIndexOutOfRange { which } => {
                write!(f, "reference point index {} out of range 0..3", which)
            }
        }
    }
}

/// `label_flipped`/`label_invisible` are packed into a single flags byte on
/// the wire (§4.3's marcher entry names only one `flipped` byte; we use its
/// low two bits).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MarcherFlags {
    pub label_flipped: bool,
    pub label_invisible: bool,
}

impl MarcherFlags {
    fn from_byte(b: u8) -> Self {
        MarcherFlags {
            label_flipped: b & 0b01 != 0,
            label_invisible: b & 0b10 != 0,
        }
    }

    fn to_byte(self) -> u8 {
        (self.label_flipped as u8) | ((self.label_invisible as u8) << 1)
    }
}

/// One performer's state on one sheet (§3).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Marcher {
    pub position: Coord,
    pub ref_positions: [Coord; 3],
    pub symbol: SymbolKind,
    pub flags: MarcherFlags,
}

impl Marcher {
    pub fn new(position: Coord) -> Self {
        Marcher {
            position,
            ref_positions: [position; 3],
            symbol: SymbolKind::Plain,
            flags: MarcherFlags::default(),
        }
    }

    /// Reference point `which` in `0..=3`; `0` is the primary position.
    pub fn ref_pos(&self, which: u8) -> Result<Coord, MarcherError> {
        match which {
            0 => Ok(self.position),
            1..=3 => Ok(self.ref_positions[(which - 1) as usize]),
            _ => Err(MarcherError::RefIndexOutOfRange { which }),
        }
    }

    pub fn set_ref_pos(&mut self, which: u8, pos: Coord) -> Result<(), MarcherError> {
        match which {
            0 => {
                self.position = pos;
                Ok(())
            }
            1..=3 => {
                self.ref_positions[(which - 1) as usize] = pos;
                Ok(())
            }
            _ => Err(MarcherError::RefIndexOutOfRange { which }),
        }
    }

    /// `BE8 len || pos || ref_count:BE8 || ref_count x (which:BE8, pos) || symbol:BE8 || flipped:BE8`
    /// (§4.3). The length byte lets us skip unknown trailing fields a newer
    /// writer might add.
    pub fn decode(reader: &mut Reader) -> Result<Self, MarcherError> {
        let len = reader.get::<u8>()? as usize;
        let mut body = reader.first(len)?;
        reader.advance(len)?;

        let position = Coord::read(&mut body)?;
        let mut ref_positions = [position; 3];
        let ref_count = body.get::<u8>()?;
        for _ in 0..ref_count {
            let which = body.get::<u8>()?;
            let pos = Coord::read(&mut body)?;
            if !(1..=3).contains(&which) {
                return Err(MarcherError::RefIndexOutOfRange { which });
            }
            ref_positions[(which - 1) as usize] = pos;
        }
        let symbol = SymbolKind::from_u8(body.get::<u8>()?)?;
        let flags = MarcherFlags::from_byte(body.get::<u8>()?);

        Ok(Marcher {
            position,
            ref_positions,
            symbol,
            flags,
        })
    }

    pub fn encode(&self, writer: &mut Writer) {
        let mut body = Writer::new();
        self.position.write(&mut body);

        let custom_refs: Vec<(u8, Coord)> = (1u8..=3)
            .filter_map(|which| {
                let pos = self.ref_positions[(which - 1) as usize];
                if pos != self.position {
                    Some((which, pos))
                } else {
                    None
                }
            })
            .collect();
        body.append(custom_refs.len() as u8);
        for (which, pos) in custom_refs {
            body.append(which);
            pos.write(&mut body);
        }

        body.append(self.symbol.to_u8());
        body.append(self.flags.to_byte());

        let bytes = body.into_bytes();
        writer.append(bytes.len() as u8);
        writer.append_bytes(&bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_with_default_refs() {
        let m = Marcher::new(Coord::new(4, -4));
        let mut w = Writer::new();
        m.encode(&mut w);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        let decoded = Marcher::decode(&mut r).unwrap();
        assert_eq!(decoded, m);
    }

    #[test]
    fn round_trips_with_custom_reference_points() {
        let mut m = Marcher::new(Coord::new(0, 0));
        m.set_ref_pos(1, Coord::new(16, 0)).unwrap();
        m.symbol = SymbolKind::SolidX;
        m.flags.label_flipped = true;
        let mut w = Writer::new();
        m.encode(&mut w);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        let decoded = Marcher::decode(&mut r).unwrap();
        assert_eq!(decoded, m);
        assert_eq!(decoded.ref_pos(1).unwrap(), Coord::new(16, 0));
        assert_eq!(decoded.ref_pos(2).unwrap(), Coord::new(0, 0));
    }

    #[test]
    fn decoder_skips_unknown_trailing_fields_via_length_prefix() {
        let m = Marcher::new(Coord::new(1, 1));
        let mut w = Writer::new();
        m.encode(&mut w);
        let mut bytes = w.into_bytes();
        // Simulate a newer writer appending a field we don't understand.
        bytes[0] += 2;
        bytes.push(0xAA);
        bytes.push(0xBB);
        let mut r = Reader::new(&bytes);
        let decoded = Marcher::decode(&mut r).unwrap();
        assert_eq!(decoded.position, Coord::new(1, 1));
    }
}
