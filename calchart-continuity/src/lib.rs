#![allow(dead_code)]

//! Continuity: the domain-specific language marchers' drill instructions are
//! written in, its AST, its legacy-text parser, and the evaluator that turns
//! a parsed continuity into a stream of motion [`commands::Command`]s.
//!
//! This crate has no dependency on `calchart-show` by design: the evaluator
//! consumes a narrow [`eval::EvalInput`] rather than a live `Sheet`, so the
//! parser and evaluator can be exercised (and fuzzed) standalone.

pub mod ast;
pub mod commands;
pub mod eval;
pub mod parser;

pub use ast::{PointRef, Procedure, Value};
pub use commands::{Command, StepStyle};
pub use eval::{evaluate, EvalError, EvalInput, EvalOutput, Variables};
pub use parser::{ContinuityCorrection, NoCorrection, ParseError, Parser};

use log::debug;

/// One marcher's continuity on one sheet: either the parsed procedure list,
/// ready to evaluate, or (for content the parser can't yet handle) the
/// original legacy text alongside a diagnostic, kept so round-tripping
/// through the show file format never loses data (§4.4, §7).
#[derive(Clone, Debug, PartialEq)]
pub enum Continuity {
    Parsed(Vec<Procedure>),
    Unparsed { text: String, error: ParseError },
}

impl Continuity {
    /// Parse legacy continuity text, falling back to `Unparsed` (rather than
    /// failing the whole decode) on a syntax error.
    pub fn from_text(text: &str) -> Self {
        match Parser::parse(text) {
            Ok(procedures) => {
                debug!("parsed continuity: {} procedure(s)", procedures.len());
                Continuity::Parsed(procedures)
            }
            Err(error) => Continuity::Unparsed {
                text: text.to_string(),
                error,
            },
        }
    }

    pub fn from_text_with_correction(text: &str, handler: &dyn ContinuityCorrection) -> Self {
        match Parser::parse_with_correction(text, handler) {
            Ok(procedures) => Continuity::Parsed(procedures),
            Err(error) => Continuity::Unparsed {
                text: text.to_string(),
                error,
            },
        }
    }

    pub fn procedures(&self) -> Option<&[Procedure]> {
        match self {
            Continuity::Parsed(p) => Some(p),
            Continuity::Unparsed { .. } => None,
        }
    }

    /// Evaluate this continuity for one marcher on one sheet. An `Unparsed`
    /// continuity evaluates to a single sheet-length `MarkTime` in place, so
    /// a show with one bad continuity still animates everything else.
    pub fn evaluate(&self, input: &EvalInput, vars: &mut Variables) -> EvalOutput {
        match self {
            Continuity::Parsed(procedures) => evaluate(procedures, input, vars),
            Continuity::Unparsed { error, .. } => EvalOutput {
                commands: vec![Command::Still {
                    start: input.start,
                    beats: input.sheet_beats,
                    style: StepStyle::MarkTime,
                    facing: 0.0,
                }],
                errors: vec![format!("unparsed continuity: {}", error)],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calchart_core::Coord;

    fn input(beats: u32) -> EvalInput {
        EvalInput {
            start: Coord::ZERO,
            reference_points: [Coord::ZERO; 3],
            next_point: None,
            sheet_beats: beats,
        }
    }

    #[test]
    fn from_text_parses_good_input() {
        let c = Continuity::from_text("MT 4 E");
        assert!(matches!(c, Continuity::Parsed(_)));
    }

    #[test]
    fn from_text_keeps_bad_input_around() {
        let c = Continuity::from_text("BOGUS");
        assert!(matches!(c, Continuity::Unparsed { .. }));
    }

    #[test]
    fn unparsed_continuity_still_evaluates_to_a_full_sheet() {
        let c = Continuity::from_text("BOGUS");
        let mut vars = Variables::new();
        let out = c.evaluate(&input(8), &mut vars);
        let total: u32 = out.commands.iter().map(Command::num_beats).sum();
        assert_eq!(total, 8);
        assert!(!out.errors.is_empty());
    }
}
