use calchart_core::coord::quantize_8way;
use calchart_core::Coord;

/// The marching style a viewer uses to choose a step glyph (§4.4).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepStyle {
    MarkTime,
    StandAndPlay,
    Close,
    HighStep,
}

/// One low-level motion command, the evaluator's output unit (§4.4).
///
/// Every variant reports `num_beats`, `position_at_beat`,
/// `facing_direction_at_beat`, `end`, and `step_style` through the
/// inherent methods below rather than a shared trait — there's exactly one
/// implementing type family (no dynamic dispatch needed) and the original
/// has no virtual table to mirror (§9: "no virtual tables").
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    Still {
        start: Coord,
        beats: u32,
        style: StepStyle,
        facing: f32,
    },
    Move {
        start: Coord,
        beats: u32,
        movement: Coord,
        facing: f32,
    },
    Rotate {
        start: Coord,
        beats: u32,
        origin: Coord,
        radius: f32,
        ang_start: f32,
        ang_end: f32,
        face_offset: f32,
    },
}

impl Command {
    pub fn num_beats(&self) -> u32 {
        match self {
            Command::Still { beats, .. } => *beats,
            Command::Move { beats, .. } => *beats,
            Command::Rotate { beats, .. } => *beats,
        }
    }

    pub fn start(&self) -> Coord {
        match self {
            Command::Still { start, .. } => *start,
            Command::Move { start, .. } => *start,
            Command::Rotate { start, .. } => *start,
        }
    }

    /// Position at `beat`, `beat` in `0..=num_beats()`. Exact for
    /// `Still`/`Move` (linear interpolation truncated to coord-units);
    /// circular for `Rotate`.
    pub fn position_at_beat(&self, beat: u32) -> Coord {
        match self {
            Command::Still { start, .. } => *start,
            Command::Move {
                start,
                beats,
                movement,
                ..
            } => {
                let end = start.add(*movement);
                if *beats == 0 {
                    end
                } else {
                    let t = beat as f32 / *beats as f32;
                    start.lerp_truncated(end, t)
                }
            }
            Command::Rotate {
                origin,
                radius,
                ang_start,
                ang_end,
                beats,
                ..
            } => {
                let t = if *beats == 0 {
                    1.0
                } else {
                    beat as f32 / *beats as f32
                };
                let theta = (ang_start + (ang_end - ang_start) * t).to_radians();
                let x = origin.x as f32 + radius * theta.sin();
                let y = origin.y as f32 - radius * theta.cos();
                Coord::new(x.round() as i16, y.round() as i16)
            }
        }
    }

    /// Facing direction at `beat`. Constant (8-way quantized) for
    /// `Still`/`Move`; tangent to the arc, offset by `face_offset`, for
    /// `Rotate`.
    pub fn facing_direction_at_beat(&self, beat: u32) -> f32 {
        match self {
            Command::Still { facing, .. } => *facing,
            Command::Move { facing, .. } => *facing,
            Command::Rotate {
                ang_start,
                ang_end,
                beats,
                face_offset,
                ..
            } => {
                let t = if *beats == 0 {
                    1.0
                } else {
                    beat as f32 / *beats as f32
                };
                let theta = ang_start + (ang_end - ang_start) * t;
                quantize_8way(theta + face_offset)
            }
        }
    }

    pub fn end(&self) -> Coord {
        self.position_at_beat(self.num_beats())
    }

    pub fn step_style(&self) -> StepStyle {
        match self {
            Command::Still { style, .. } => *style,
            Command::Move { .. } => StepStyle::HighStep,
            Command::Rotate { .. } => StepStyle::HighStep,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn still_position_is_constant() {
        let c = Command::Still {
            start: Coord::new(1, 2),
            beats: 4,
            style: StepStyle::MarkTime,
            facing: 90.0,
        };
        assert_eq!(c.position_at_beat(0), Coord::new(1, 2));
        assert_eq!(c.position_at_beat(3), Coord::new(1, 2));
        assert_eq!(c.end(), Coord::new(1, 2));
    }

    #[test]
    fn move_interpolates_linearly() {
        let c = Command::Move {
            start: Coord::new(0, 0),
            beats: 8,
            movement: Coord::new(32, 0),
            facing: 90.0,
        };
        assert_eq!(c.position_at_beat(4), Coord::new(16, 0));
        assert_eq!(c.position_at_beat(8), Coord::new(32, 0));
        assert_eq!(c.end(), Coord::new(32, 0));
    }

    #[test]
    fn zero_beat_move_still_reports_end_position() {
        let c = Command::Move {
            start: Coord::new(0, 0),
            beats: 0,
            movement: Coord::new(0, 0),
            facing: 90.0,
        };
        assert_eq!(c.num_beats(), 0);
        assert_eq!(c.position_at_beat(0), Coord::new(0, 0));
    }
}
