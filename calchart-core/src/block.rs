use crate::reader::{Reader, ReaderError};
use log::warn;
use std::error;
use std::fmt;

/// `{4-char tag}{BE uint32 size}{payload}{"END "}{4-char tag}`
///
/// The envelope every CalChart block — `SHOW`, `SHET`, `PNTS`, ... — is
/// framed in. Blocks nest: `payload` may itself contain further blocks.
#[derive(Debug)]
pub enum BlockError {
    Truncated,
    TagMismatch {
        opened: [u8; 4],
        closed: [u8; 4],
    },
}

impl error::Error for BlockError {}
impl fmt::Display for BlockError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "block truncated before its declared size"),
            Self::TagMismatch { opened, closed } => write!(
                f,
                "END sentinel tag {:?} does not match opening tag {:?}",
                String::from_utf8_lossy(closed),
                String::from_utf8_lossy(opened)
            ),
        }
    }
}

/// One parsed-out `(tag, sub_reader)` pair: the tag that opened the block
/// and a reader scoped to exactly its payload.
#[derive(Clone, Copy, Debug)]
pub struct Block<'a> {
    pub tag: [u8; 4],
    pub reader: Reader<'a>,
}

/// `construct_block` composes a block's bytes; this is its exact mirror —
/// see [`crate::writer::construct_block`].
pub fn construct_block(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    crate::writer::construct_block(tag, payload)
}

/// Repeatedly parse `(tag, size)` headers out of `reader`, yielding a
/// sub-reader scoped to each block's payload and verifying the trailing
/// `"END " || tag` sentinel.
///
/// Tolerant of truncation and tag mismatches: on either, parsing stops and
/// whatever was successfully parsed so far is returned — this is how the
/// format achieves forward-compatible partial reads (§4.2).
pub fn parse_out_labels<'a>(reader: &mut Reader<'a>) -> Vec<Block<'a>> {
    let mut out = Vec::new();
    loop {
        let before = *reader;
        match read_one_block(reader) {
            Ok(block) => out.push(block),
            Err(_) => {
                *reader = before;
                break;
            }
        }
    }
    out
}

fn read_one_block<'a>(reader: &mut Reader<'a>) -> Result<Block<'a>, BlockError> {
    if reader.remaining() < 8 {
        return Err(BlockError::Truncated);
    }
    let tag: [u8; 4] = read_tag(reader)?;
    let size = reader.get::<u32>().map_err(|_| BlockError::Truncated)? as usize;

    if reader.remaining() < size + 8 {
        return Err(BlockError::Truncated);
    }

    let sub_reader = reader.first(size).map_err(|_| BlockError::Truncated)?;
    reader.advance(size).map_err(|_| BlockError::Truncated)?;

    let sentinel = read_tag(reader)?;
    if &sentinel != b"END " {
        return Err(BlockError::Truncated);
    }
    let closing_tag = read_tag(reader)?;
    if closing_tag != tag {
        warn!(
            "block END tag mismatch: opened {:?} closed {:?}",
            String::from_utf8_lossy(&tag),
            String::from_utf8_lossy(&closing_tag)
        );
        return Err(BlockError::TagMismatch {
            opened: tag,
            closed: closing_tag,
        });
    }

    Ok(Block {
        tag,
        reader: sub_reader,
    })
}

fn read_tag<'a>(reader: &mut Reader<'a>) -> Result<[u8; 4], BlockError> {
    let bytes = reader.get_bytes(4).map_err(|_: ReaderError| BlockError::Truncated)?;
    let mut tag = [0u8; 4];
    tag.copy_from_slice(bytes);
    Ok(tag)
}

/// Look up a block by tag in an already-parsed label list. Returns the
/// first match, mirroring the show decoder's fixed dispatch table.
pub fn find_block<'a, 'b>(blocks: &'b [Block<'a>], tag: &[u8; 4]) -> Option<&'b Block<'a>> {
    blocks.iter().find(|b| &b.tag == tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_single_block() {
        let bytes = construct_block(b"NAME", b"sheet 1");
        let mut r = Reader::new(&bytes);
        let blocks = parse_out_labels(&mut r);
        assert_eq!(blocks.len(), 1);
        assert_eq!(&blocks[0].tag, b"NAME");
        assert_eq!(blocks[0].reader.as_slice(), b"sheet 1");
        assert!(r.is_empty());
    }

    #[test]
    fn nested_blocks_parse_independently() {
        let inner = construct_block(b"NAME", b"hi");
        let outer = construct_block(b"SHET", &inner);
        let mut r = Reader::new(&outer);
        let blocks = parse_out_labels(&mut r);
        assert_eq!(blocks.len(), 1);
        let mut inner_reader = blocks[0].reader;
        let inner_blocks = parse_out_labels(&mut inner_reader);
        assert_eq!(inner_blocks.len(), 1);
        assert_eq!(&inner_blocks[0].tag, b"NAME");
    }

    #[test]
    fn partial_tolerance_on_truncation() {
        let mut bytes = construct_block(b"NAME", b"ok");
        bytes.truncate(bytes.len() - 2); // chop off the closing tag
        let mut r = Reader::new(&bytes);
        let blocks = parse_out_labels(&mut r);
        assert!(blocks.is_empty());
    }

    #[test]
    fn unknown_trailing_bytes_stop_parsing_without_panicking() {
        let mut bytes = construct_block(b"NAME", b"ok");
        bytes.extend_from_slice(&[0xFF, 0xFF]);
        let mut r = Reader::new(&bytes);
        let blocks = parse_out_labels(&mut r);
        assert_eq!(blocks.len(), 1);
    }
}
