#![allow(dead_code)]

//! Byte-level primitives shared by every CalChart codec: a cursor over an
//! immutable span (`Reader`), an append-only sink (`Writer`), and the
//! block-framed container envelope that both the modern and legacy file
//! dialects nest their data inside.

pub mod block;
pub mod coord;
pub mod reader;
pub mod writer;

pub use block::{construct_block, parse_out_labels, Block, BlockError};
pub use coord::Coord;
pub use reader::{Reader, ReaderError, Scalar};
pub use writer::Writer;
