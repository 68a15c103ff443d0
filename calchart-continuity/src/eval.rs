use crate::ast::{PointRef, Procedure, Value};
use crate::commands::{Command, StepStyle};
use calchart_core::coord::quantize_8way;
use calchart_core::Coord;
use std::collections::HashMap;
use std::error;
use std::fmt;

/// The standard marching rate: coord-units covered per beat by a plain
/// `EvenMarch`/`FlowTo` step, grounded in the worked example in §4.4
/// (8 beats of `EM 8 E` covering 32 coord-units).
pub const STANDARD_STEP_RATE: f32 = 4.0;

#[derive(Clone, Debug, PartialEq)]
pub enum EvalError {
    UndefinedVariable(char),
    ExpectedScalarGotPoint,
    ExpectedPointGotScalar,
    NoNextPoint,
    DivisionByZero,
}

impl error::Error for EvalError {}
impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::UndefinedVariable(c) => write!(f, "undefined variable {}", c),
            Self::ExpectedScalarGotPoint => write!(f, "expected a number, got a point"),
            Self::ExpectedPointGotScalar => write!(f, "expected a point, got a number"),
            Self::NoNextPoint => write!(f, "NP referenced with no following sheet"),
            Self::DivisionByZero => write!(f, "division by zero"),
        }
    }
}

/// Everything the evaluator needs about one marcher on one sheet, without
/// requiring a dependency on `calchart-show`'s `Show`/`Sheet` types (§2:
/// the continuity crate is a standalone peer of the show crate).
#[derive(Clone, Copy, Debug)]
pub struct EvalInput {
    pub start: Coord,
    pub reference_points: [Coord; 3],
    pub next_point: Option<Coord>,
    pub sheet_beats: u32,
}

/// Named variables (`A`..`Z`) carried across one compile for one marcher
/// (§4.4).
pub type Variables = HashMap<char, f32>;

#[derive(Clone, Debug, Default)]
pub struct EvalOutput {
    pub commands: Vec<Command>,
    pub errors: Vec<String>,
}

struct Evaluator<'a> {
    input: &'a EvalInput,
    vars: &'a mut Variables,
    current: Coord,
    facing: f32,
    commands: Vec<Command>,
    errors: Vec<String>,
}

fn resolve_scalar(value: &Value, vars: &Variables) -> Result<f32, EvalError> {
    match value {
        Value::Number(n) => Ok(*n),
        Value::Direction(d) => Ok(*d),
        Value::Variable(c) => vars.get(c).copied().ok_or(EvalError::UndefinedVariable(*c)),
        Value::Point(_) => Err(EvalError::ExpectedScalarGotPoint),
        Value::Add(a, b) => Ok(resolve_scalar(a, vars)? + resolve_scalar(b, vars)?),
        Value::Sub(a, b) => Ok(resolve_scalar(a, vars)? - resolve_scalar(b, vars)?),
        Value::Mul(a, b) => Ok(resolve_scalar(a, vars)? * resolve_scalar(b, vars)?),
        Value::Div(a, b) => {
            let denom = resolve_scalar(b, vars)?;
            if denom == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(resolve_scalar(a, vars)? / denom)
        }
    }
}

fn resolve_point(value: &Value, input: &EvalInput) -> Result<Coord, EvalError> {
    match value {
        Value::Point(PointRef::StartPoint) => Ok(input.start),
        Value::Point(PointRef::NextPoint) => input.next_point.ok_or(EvalError::NoNextPoint),
        Value::Point(PointRef::Reference(n)) => Ok(input.reference_points[(*n - 1) as usize]),
        _ => Err(EvalError::ExpectedPointGotScalar),
    }
}

fn vector_for(rate: f32, direction_degrees: f32) -> Coord {
    let theta = direction_degrees.to_radians();
    let dx = rate * theta.sin();
    let dy = -rate * theta.cos();
    Coord::new(dx.round() as i16, dy.round() as i16)
}

fn round_to_grid(v: i16, grid: i16) -> i16 {
    if grid <= 0 {
        return v;
    }
    let half = grid / 2;
    ((v + half).div_euclid(grid)) * grid
}

impl<'a> Evaluator<'a> {
    fn run_one(&mut self, procedure: &Procedure) -> Result<(), EvalError> {
        match procedure {
            Procedure::MarkTime { beats, direction } => {
                let beats_n = resolve_scalar(beats, self.vars)?.round().max(0.0) as u32;
                let dir = resolve_scalar(direction, self.vars)?;
                self.commands.push(Command::Still {
                    start: self.current,
                    beats: beats_n,
                    style: StepStyle::MarkTime,
                    facing: quantize_8way(dir),
                });
                self.facing = dir;
            }
            Procedure::Close { beats, direction } => {
                let beats_n = resolve_scalar(beats, self.vars)?.round().max(0.0) as u32;
                let dir = resolve_scalar(direction, self.vars)?;
                self.commands.push(Command::Still {
                    start: self.current,
                    beats: beats_n,
                    style: StepStyle::Close,
                    facing: quantize_8way(dir),
                });
                self.facing = dir;
            }
            Procedure::EvenMarch { steps, direction } => {
                let steps_n = resolve_scalar(steps, self.vars)?.round().max(0.0) as u32;
                let dir = resolve_scalar(direction, self.vars)?;
                let movement = vector_for(STANDARD_STEP_RATE * steps_n as f32, dir);
                self.commands.push(Command::Move {
                    start: self.current,
                    beats: steps_n,
                    movement,
                    facing: quantize_8way(dir),
                });
                self.current = self.current.add(movement);
                self.facing = dir;
            }
            Procedure::FlowTo { beats, direction } => {
                let beats_n = resolve_scalar(beats, self.vars)?.round().max(0.0) as u32;
                let dir = resolve_scalar(direction, self.vars)?;
                let movement = vector_for(STANDARD_STEP_RATE * beats_n as f32, dir);
                self.commands.push(Command::Move {
                    start: self.current,
                    beats: beats_n,
                    movement,
                    facing: quantize_8way(dir),
                });
                self.current = self.current.add(movement);
                self.facing = dir;
            }
            Procedure::FlowToPoint { to, beats } => {
                let target = resolve_point(to, self.input)?;
                let beats_n = resolve_scalar(beats, self.vars)?.round().max(0.0) as u32;
                let movement = target.sub(self.current);
                let dir = self.current.bearing_to(target);
                self.commands.push(Command::Move {
                    start: self.current,
                    beats: beats_n,
                    movement,
                    facing: quantize_8way(dir),
                });
                self.current = target;
                self.facing = dir;
            }
            Procedure::MagicMove { to } => {
                let target = resolve_point(to, self.input)?;
                let movement = target.sub(self.current);
                self.commands.push(Command::Move {
                    start: self.current,
                    beats: 0,
                    movement,
                    facing: quantize_8way(self.facing),
                });
                self.current = target;
            }
            Procedure::Countermarch {
                pivot,
                steps,
                direction,
            } => {
                let origin = resolve_point(pivot, self.input)?;
                let steps_n = resolve_scalar(steps, self.vars)?.round().max(0.0) as u32;
                let _final_facing = resolve_scalar(direction, self.vars)?;
                let radius = origin.distance(self.current);
                let ang_start = origin.bearing_to(self.current);
                let ang_end = ang_start + 180.0;
                let face_offset = 90.0;
                self.commands.push(Command::Rotate {
                    start: self.current,
                    beats: steps_n,
                    origin,
                    radius,
                    ang_start,
                    ang_end,
                    face_offset,
                });
                let last = *self.commands.last().unwrap();
                self.current = last.end();
                self.facing = last.facing_direction_at_beat(steps_n);
            }
            Procedure::ExpandedMarch {
                steps,
                direction,
                spacing,
            } => {
                let steps_n = resolve_scalar(steps, self.vars)?.round().max(0.0) as u32;
                let dir = resolve_scalar(direction, self.vars)?;
                let spacing_v = resolve_scalar(spacing, self.vars)?;
                let movement = vector_for(spacing_v * steps_n as f32, dir);
                self.commands.push(Command::Move {
                    start: self.current,
                    beats: steps_n,
                    movement,
                    facing: quantize_8way(dir),
                });
                self.current = self.current.add(movement);
                self.facing = dir;
            }
            Procedure::GridSnap { size } => {
                let grid = resolve_scalar(size, self.vars)?.round().max(1.0) as i16;
                let snapped = Coord::new(
                    round_to_grid(self.current.x, grid),
                    round_to_grid(self.current.y, grid),
                );
                let movement = snapped.sub(self.current);
                self.commands.push(Command::Move {
                    start: self.current,
                    beats: 0,
                    movement,
                    facing: quantize_8way(self.facing),
                });
                self.current = snapped;
            }
            Procedure::SetVariable { var, value } => {
                let v = resolve_scalar(value, self.vars)?;
                self.vars.insert(*var, v);
            }
        }
        Ok(())
    }
}

/// Scale a command's beat count, preserving its rate (used to truncate at
/// the budget per §4.4's `BudgetOverrun` handling).
fn scale_command_to_beats(cmd: Command, new_beats: u32) -> Command {
    if cmd.num_beats() == 0 || new_beats == cmd.num_beats() {
        return cmd;
    }
    let fraction = new_beats as f32 / cmd.num_beats() as f32;
    match cmd {
        Command::Still { start, style, facing, .. } => Command::Still {
            start,
            beats: new_beats,
            style,
            facing,
        },
        Command::Move {
            start,
            movement,
            facing,
            ..
        } => Command::Move {
            start,
            beats: new_beats,
            movement: Coord::new(
                (movement.x as f32 * fraction).round() as i16,
                (movement.y as f32 * fraction).round() as i16,
            ),
            facing,
        },
        Command::Rotate {
            start,
            origin,
            radius,
            ang_start,
            ang_end,
            face_offset,
            ..
        } => Command::Rotate {
            start,
            beats: new_beats,
            origin,
            radius,
            ang_start,
            ang_end: ang_start + (ang_end - ang_start) * fraction,
            face_offset,
        },
    }
}

/// Evaluate one marcher's continuity on one sheet, enforcing the per-sheet
/// beat budget invariant (§4.4, §8): the total beats emitted always equals
/// `input.sheet_beats`, padding with a trailing `Still` (`BudgetUnderrun`,
/// a warning) or truncating (`BudgetOverrun`, reported as an error).
pub fn evaluate(
    procedures: &[Procedure],
    input: &EvalInput,
    vars: &mut Variables,
) -> EvalOutput {
    let mut evaluator = Evaluator {
        input,
        vars,
        current: input.start,
        facing: 0.0,
        commands: Vec::new(),
        errors: Vec::new(),
    };

    for procedure in procedures {
        if let Err(e) = evaluator.run_one(procedure) {
            evaluator.errors.push(e.to_string());
        }
    }

    let mut commands = evaluator.commands;
    let total: u32 = commands.iter().map(Command::num_beats).sum();
    let budget = input.sheet_beats;

    if total < budget {
        let shortfall = budget - total;
        commands.push(Command::Still {
            start: evaluator.current,
            beats: shortfall,
            style: StepStyle::MarkTime,
            facing: quantize_8way(evaluator.facing),
        });
    } else if total > budget {
        evaluator
            .errors
            .push("Ran out of time".to_string());
        let mut remaining = budget;
        let mut truncated = Vec::new();
        for cmd in commands {
            if remaining == 0 {
                break;
            }
            if cmd.num_beats() <= remaining {
                remaining -= cmd.num_beats();
                truncated.push(cmd);
            } else {
                truncated.push(scale_command_to_beats(cmd, remaining));
                remaining = 0;
            }
        }
        commands = truncated;
    }

    EvalOutput {
        commands,
        errors: evaluator.errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn input(beats: u32) -> EvalInput {
        EvalInput {
            start: Coord::ZERO,
            reference_points: [Coord::ZERO; 3],
            next_point: None,
            sheet_beats: beats,
        }
    }

    #[test]
    fn mark_time_matches_scenario_1() {
        let procs = Parser::parse("MT 4 E").unwrap();
        let mut vars = Variables::new();
        let out = evaluate(&procs, &input(4), &mut vars);
        assert!(out.errors.is_empty());
        assert_eq!(out.commands.len(), 1);
        assert_eq!(out.commands[0].position_at_beat(3), Coord::ZERO);
        assert_eq!(out.commands[0].facing_direction_at_beat(3), 90.0);
    }

    #[test]
    fn even_march_matches_scenario_2() {
        let procs = Parser::parse("EM 8 E").unwrap();
        let mut vars = Variables::new();
        let out = evaluate(&procs, &input(8), &mut vars);
        assert_eq!(out.commands[0].position_at_beat(4), Coord::new(16, 0));
        assert_eq!(out.commands[0].position_at_beat(8), Coord::new(32, 0));
    }

    #[test]
    fn underrun_pads_with_trailing_mark_time() {
        let procs = Parser::parse("MT 2 N").unwrap();
        let mut vars = Variables::new();
        let out = evaluate(&procs, &input(4), &mut vars);
        let total: u32 = out.commands.iter().map(Command::num_beats).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn overrun_truncates_and_reports_error() {
        let procs = Parser::parse("MT 10 N").unwrap();
        let mut vars = Variables::new();
        let out = evaluate(&procs, &input(4), &mut vars);
        let total: u32 = out.commands.iter().map(Command::num_beats).sum();
        assert_eq!(total, 4);
        assert!(out.errors.iter().any(|e| e.contains("Ran out of time")));
    }

    #[test]
    fn zero_beat_pivot_reports_previous_position_and_next_facing() {
        // Move 0 beats by (0,0) facing East, then MarkTime 4 beats facing North.
        let procs = vec![
            Procedure::FlowTo {
                beats: Value::Number(0.0),
                direction: Value::Direction(90.0),
            },
            Procedure::MarkTime {
                beats: Value::Number(4.0),
                direction: Value::Direction(0.0),
            },
        ];
        let mut vars = Variables::new();
        let out = evaluate(&procs, &input(4), &mut vars);
        assert_eq!(out.commands[0].num_beats(), 0);
        assert_eq!(out.commands[0].end(), Coord::ZERO);
        assert_eq!(out.commands[1].facing_direction_at_beat(0), 0.0);
    }
}
