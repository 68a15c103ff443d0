/// A point a `Value` can refer to, resolved against the evaluator's
/// [`crate::eval::EvalInput`] rather than a live `Show`/`Sheet` — see the
/// crate-level docs for why this crate does not depend on `calchart-show`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointRef {
    /// `SP` — the marcher's position on the current sheet.
    StartPoint,
    /// `NP` — the marcher's position on the next sheet, if any.
    NextPoint,
    /// `R1`..`R3` — an alternate reference stance.
    Reference(u8),
}

/// A leaf value a [`Procedure`] takes as an argument: a number, a compass
/// direction (degrees, 0 == North, clockwise), a named variable, or a
/// point reference.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Number(f32),
    Direction(f32),
    Variable(char),
    Point(PointRef),
    Add(Box<Value>, Box<Value>),
    Sub(Box<Value>, Box<Value>),
    Mul(Box<Value>, Box<Value>),
    Div(Box<Value>, Box<Value>),
}

/// One drill instruction. A `Continuity` (§3) is a list of these.
///
/// This is a deliberate subset of the original's command vocabulary (§4.4:
/// "a family of `Procedure`... variants (subset)") chosen to exercise every
/// `Command` shape the evaluator can produce: standing still, straight-line
/// motion, arcing motion, and variable assignment.
#[derive(Clone, Debug, PartialEq)]
pub enum Procedure {
    /// `MT <beats> <direction>` — mark time in place, facing `direction`.
    MarkTime { beats: Value, direction: Value },
    /// `CLOSE <beats> <direction>` — mark time with the "close" step style.
    Close { beats: Value, direction: Value },
    /// `EM <steps> <direction>` — even march: `steps` beats of straight-line
    /// motion at the standard marching rate, facing `direction`.
    EvenMarch { steps: Value, direction: Value },
    /// `FM <beats> <direction>` — march `beats` beats in a straight line
    /// facing (and moving toward) `direction`, at the standard rate.
    FlowTo { beats: Value, direction: Value },
    /// `FMTO <point> <beats>` — march to `point` in a straight line over
    /// `beats` beats; facing is derived from the direction of travel.
    FlowToPoint { to: Value, beats: Value },
    /// `MAGIC <point>` — teleport to `point` with zero beats elapsed.
    MagicMove { to: Value },
    /// `CM <pivot> <steps> <direction>` — countermarch: arc around `pivot`
    /// for `steps` beats, ending facing `direction`.
    Countermarch {
        pivot: Value,
        steps: Value,
        direction: Value,
    },
    /// `EXPAND <steps> <direction> <spacing>` — march outward from the
    /// current position by `spacing` coord-units per beat, `steps` beats,
    /// facing `direction`.
    ExpandedMarch {
        steps: Value,
        direction: Value,
        spacing: Value,
    },
    /// `GRID <size>` — snap the current position to the nearest multiple of
    /// `size` coord-units on both axes, zero beats elapsed.
    GridSnap { size: Value },
    /// `<var> = <expr>` — bind a variable for the remainder of this
    /// evaluation (and, per §4.4, across sheets for the same marcher).
    SetVariable { var: char, value: Value },
}
