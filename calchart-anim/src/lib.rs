#![allow(dead_code)]

//! The animation compiler and timeline (§4.5): turns a [`calchart_show::Show`]
//! into, per sheet and marcher, a compiled `Command` stream with prefix-sum
//! indexing for O(log n) beat lookup, plus a cursor that can seek, step
//! forward/backward, and report collisions.

use calchart_continuity::{Command, EvalInput, StepStyle, Variables};
use calchart_core::Coord;
use calchart_show::Show;
use log::{debug, warn};
use std::error;
use std::fmt;

#[derive(Debug)]
pub enum AnimError {
    SheetIndexOutOfRange(usize),
    NoMarchers,
}

impl error::Error for AnimError {}
impl fmt::Display for AnimError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::SheetIndexOutOfRange(i) => write!(f, "sheet index {} out of range", i),
            Self::NoMarchers => write!(f, "show has no marchers"),
        }
    }
}

/// One marcher's compiled command stream for one sheet, plus a running
/// prefix-sum of beats for binary-search lookup (§4.5 step 3).
#[derive(Clone, Debug)]
struct CompiledMarcher {
    commands: Vec<Command>,
    /// `prefix[k]` = total beats in `commands[..k]`; `prefix.len() == commands.len() + 1`.
    prefix: Vec<u32>,
    errors: Vec<String>,
}

impl CompiledMarcher {
    fn total_beats(&self) -> u32 {
        *self.prefix.last().unwrap_or(&0)
    }

    /// Binary-search the prefix sums for the command index owning `beat`
    /// and the local beat offset within it. `beat` may run up to and
    /// including `total_beats()`, which resolves to the last command's own
    /// inclusive end (§4.5 allows `b` up to `num_beats(k)`).
    fn locate(&self, beat: u32) -> (usize, u32) {
        if self.commands.is_empty() {
            return (0, 0);
        }
        let total = self.total_beats();
        let clamped = beat.min(total);
        if clamped == total {
            let last = self.commands.len() - 1;
            return (last, self.commands[last].num_beats());
        }
        match self.prefix.binary_search(&clamped) {
            Ok(idx) => (idx, 0),
            Err(idx) => {
                let cmd_idx = idx - 1;
                (cmd_idx, clamped - self.prefix[cmd_idx])
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarcherState {
    pub position: Coord,
    pub facing: f32,
    pub step_style: StepStyle,
}

impl Default for MarcherState {
    fn default() -> Self {
        MarcherState {
            position: Coord::ZERO,
            facing: 0.0,
            step_style: StepStyle::MarkTime,
        }
    }
}

/// One marcher cursor's position in the per-sheet command stream (§4.5
/// state machine: `InCommand(k, b)`).
#[derive(Clone, Copy, Debug, Default)]
struct Cursor {
    command: usize,
    beat_in_command: u32,
}

/// The compiled, steppable timeline for a whole show (§4.5).
pub struct Animation {
    sheets: Vec<Vec<CompiledMarcher>>,
    current_sheet: usize,
    cursors: Vec<Cursor>,
    collision_radius_sq: i32,
}

/// Default collision-warning threshold: within one step (16 coord-units)
/// Chebyshev distance, matching the configuration surface in §6.
pub const DEFAULT_COLLISION_RADIUS: i32 = 16;

/// Explicit configuration inputs (§6): no ambient globals, every knob is a
/// plain field passed into [`Animation::compile_with_config`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimationConfig {
    pub collision_radius: i32,
    pub dot_ratio: f32,
    pub point_line_ratio: f32,
    pub symbol_line_ratio: f32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        AnimationConfig {
            collision_radius: DEFAULT_COLLISION_RADIUS,
            dot_ratio: 0.5,
            point_line_ratio: 0.5,
            symbol_line_ratio: 0.5,
        }
    }
}

impl Animation {
    /// Compile every sheet/marcher's continuity into a command stream.
    /// Variable state for each marcher carries over from the previous
    /// sheet (§4.5 step 2).
    pub fn compile(show: &Show) -> Result<Self, AnimError> {
        Self::compile_with_config(show, AnimationConfig::default())
    }

    pub fn compile_with_config(show: &Show, config: AnimationConfig) -> Result<Self, AnimError> {
        Self::compile_with_collision_radius(show, config.collision_radius)
    }

    pub fn compile_with_collision_radius(show: &Show, collision_radius: i32) -> Result<Self, AnimError> {
        let num_marchers = show.num_marchers as usize;
        if num_marchers == 0 && !show.sheets.is_empty() {
            return Err(AnimError::NoMarchers);
        }

        let mut vars: Vec<Variables> = (0..num_marchers).map(|_| Variables::new()).collect();
        let mut sheets = Vec::with_capacity(show.sheets.len());

        for (sheet_index, sheet) in show.sheets.iter().enumerate() {
            let next_sheet = show.sheets.get(sheet_index + 1);
            let mut compiled = Vec::with_capacity(num_marchers);

            for (marcher_index, marcher) in sheet.marchers.iter().enumerate() {
                let continuity = sheet.continuity_by_symbol.get(&marcher.symbol);
                let input = EvalInput {
                    start: marcher.position,
                    reference_points: marcher.ref_positions,
                    next_point: next_sheet
                        .and_then(|s| s.marchers.get(marcher_index))
                        .map(|m| m.position),
                    sheet_beats: sheet.beats,
                };

                let output = match continuity {
                    Some(c) => c.evaluate(&input, &mut vars[marcher_index]),
                    None => calchart_continuity::EvalOutput {
                        commands: vec![Command::Still {
                            start: marcher.position,
                            beats: sheet.beats,
                            style: StepStyle::MarkTime,
                            facing: 0.0,
                        }],
                        errors: Vec::new(),
                    },
                };

                if !output.errors.is_empty() {
                    warn!(
                        "sheet {} marcher {}: {} continuity error(s)",
                        sheet_index,
                        marcher_index,
                        output.errors.len()
                    );
                }

                let mut prefix = Vec::with_capacity(output.commands.len() + 1);
                let mut running = 0u32;
                prefix.push(0);
                for cmd in &output.commands {
                    running += cmd.num_beats();
                    prefix.push(running);
                }

                compiled.push(CompiledMarcher {
                    commands: output.commands,
                    prefix,
                    errors: output.errors,
                });
            }

            sheets.push(compiled);
        }

        debug!("compiled {} sheet(s)", sheets.len());

        let cursors = vec![Cursor::default(); num_marchers];
        let mut anim = Animation {
            sheets,
            current_sheet: 0,
            cursors,
            collision_radius_sq: collision_radius * collision_radius,
        };
        anim.skip_zero_forward_all();
        Ok(anim)
    }

    pub fn num_sheets(&self) -> usize {
        self.sheets.len()
    }

    pub fn current_sheet(&self) -> usize {
        self.current_sheet
    }

    /// Jump directly to `(sheet_index, beat)`, bypassing stepwise cursor
    /// movement (§4.5 "Seek semantics").
    pub fn seek(&mut self, sheet_index: usize, beat: u32) -> Result<(), AnimError> {
        if sheet_index >= self.sheets.len() {
            return Err(AnimError::SheetIndexOutOfRange(sheet_index));
        }
        self.current_sheet = sheet_index;
        for (marcher_index, compiled) in self.sheets[sheet_index].iter().enumerate() {
            let (k, b) = compiled.locate(beat);
            self.cursors[marcher_index] = Cursor {
                command: k,
                beat_in_command: b,
            };
        }
        self.skip_zero_forward_all();
        Ok(())
    }

    /// State for every marcher at the cursor's current position, resolving
    /// the zero-beat pivot rule: a cursor landing exactly on a boundary
    /// whose preceding command has zero beats reports that command's end
    /// position but the current command's start facing (§4.5).
    pub fn states(&self) -> Vec<MarcherState> {
        let compiled = &self.sheets[self.current_sheet];
        compiled
            .iter()
            .zip(self.cursors.iter())
            .map(|(m, cursor)| Self::state_for(m, cursor))
            .collect()
    }

    fn state_for(m: &CompiledMarcher, cursor: &Cursor) -> MarcherState {
        if m.commands.is_empty() {
            return MarcherState::default();
        }
        let idx = cursor.command.min(m.commands.len() - 1);
        let cmd = &m.commands[idx];
        if cursor.beat_in_command == 0 && idx > 0 {
            let prev = &m.commands[idx - 1];
            if prev.num_beats() == 0 {
                return MarcherState {
                    position: prev.end(),
                    facing: cmd.facing_direction_at_beat(0),
                    step_style: cmd.step_style(),
                };
            }
        }
        MarcherState {
            position: cmd.position_at_beat(cursor.beat_in_command),
            facing: cmd.facing_direction_at_beat(cursor.beat_in_command),
            step_style: cmd.step_style(),
        }
    }

    /// Advance every marcher cursor by one beat; once every cursor has
    /// reached the end of the current sheet, move to the next sheet and
    /// reset cursors, clamping at the last sheet (§4.5 "Bidirectional
    /// stepping").
    pub fn next_beat(&mut self) {
        let sheet_len = self.sheets[self.current_sheet].len();
        let mut any_advanced = false;

        for i in 0..sheet_len {
            let m = &self.sheets[self.current_sheet][i];
            if m.commands.is_empty() {
                continue;
            }
            let cursor = self.cursors[i];
            let cmd_beats = m.commands[cursor.command].num_beats();
            let is_last_command = cursor.command + 1 == m.commands.len();
            if cursor.beat_in_command < cmd_beats {
                let next = cursor.beat_in_command + 1;
                if next < cmd_beats || is_last_command {
                    // Either still inside this command, or this is the
                    // sheet's last command and there is no next command to
                    // roll into — rest at the inclusive end beat instead.
                    self.cursors[i].beat_in_command = next;
                } else {
                    self.cursors[i] = Cursor {
                        command: cursor.command + 1,
                        beat_in_command: 0,
                    };
                }
                any_advanced = true;
            } else if cursor.command + 1 < m.commands.len() {
                self.cursors[i] = Cursor {
                    command: cursor.command + 1,
                    beat_in_command: 0,
                };
                any_advanced = true;
            }
        }

        if !any_advanced && self.current_sheet + 1 < self.sheets.len() {
            self.current_sheet += 1;
            for i in 0..self.sheets[self.current_sheet].len() {
                self.cursors[i] = Cursor::default();
            }
        }
        self.skip_zero_forward_all();
    }

    /// Symmetric to [`Animation::next_beat`]: steps every cursor back one
    /// beat, crossing into the previous sheet's final command when needed.
    pub fn prev_beat(&mut self) {
        let sheet_len = self.sheets[self.current_sheet].len();
        let mut any_stepped_back = false;

        for i in 0..sheet_len {
            let m = &self.sheets[self.current_sheet][i];
            if m.commands.is_empty() {
                continue;
            }
            let cursor = self.cursors[i];
            if cursor.beat_in_command > 0 {
                self.cursors[i].beat_in_command -= 1;
                any_stepped_back = true;
            } else if cursor.command > 0 {
                let prev_beats = m.commands[cursor.command - 1].num_beats();
                self.cursors[i] = Cursor {
                    command: cursor.command - 1,
                    beat_in_command: prev_beats.saturating_sub(1),
                };
                any_stepped_back = true;
            }
        }

        if !any_stepped_back && self.current_sheet > 0 {
            self.current_sheet -= 1;
            for i in 0..self.sheets[self.current_sheet].len() {
                let m = &self.sheets[self.current_sheet][i];
                let last_cmd = m.commands.len().saturating_sub(1);
                let last_beat = m.commands.get(last_cmd).map(|c| c.num_beats()).unwrap_or(0);
                self.cursors[i] = Cursor {
                    command: last_cmd,
                    beat_in_command: last_beat,
                };
            }
        }
        self.skip_zero_backward_all();
    }

    pub fn goto_sheet(&mut self, sheet_index: usize) -> Result<(), AnimError> {
        self.seek(sheet_index, 0)
    }

    /// A leading or boundary zero-beat command is a pivot, not a distinct
    /// stop: never leave a cursor resting on one if a following command
    /// exists (§4.4 "Zero-beat commands").
    fn skip_zero_forward_all(&mut self) {
        for i in 0..self.cursors.len() {
            let m = &self.sheets[self.current_sheet][i];
            while let Some(cmd) = m.commands.get(self.cursors[i].command) {
                if cmd.num_beats() == 0 && self.cursors[i].command + 1 < m.commands.len() {
                    self.cursors[i].command += 1;
                    self.cursors[i].beat_in_command = 0;
                } else {
                    break;
                }
            }
        }
    }

    fn skip_zero_backward_all(&mut self) {
        for i in 0..self.cursors.len() {
            let m = &self.sheets[self.current_sheet][i];
            while self.cursors[i].beat_in_command == 0 && self.cursors[i].command > 0 {
                let prev = &m.commands[self.cursors[i].command - 1];
                if prev.num_beats() == 0 {
                    self.cursors[i].command -= 1;
                } else {
                    break;
                }
            }
        }
    }

    /// All colliding marcher-index pairs at the current beat, computed in
    /// O(M^2) (§4.5 "Collision detection"; acceptable at the documented
    /// scale of up to a few hundred marchers).
    pub fn collisions(&self) -> Vec<(usize, usize)> {
        let states = self.states();
        let mut out = Vec::new();
        for i in 0..states.len() {
            for j in (i + 1)..states.len() {
                if states[i].position.chebyshev_distance_sq(states[j].position) <= self.collision_radius_sq {
                    out.push((i, j));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calchart_continuity::Continuity;
    use calchart_show::{Marcher, Sheet, SymbolKind};

    #[test]
    fn minimal_show_seek_matches_scenario_1() {
        let mut show = Show::create_new(1);
        let mut sheet = Sheet::new(1, "sheet 1");
        sheet.beats = 4;
        sheet.marchers[0] = Marcher::new(Coord::new(0, 0));
        sheet
            .continuity_by_symbol
            .insert(SymbolKind::Plain, Continuity::from_text("MT 4 E"));
        show.sheets.push(sheet);

        let mut anim = Animation::compile(&show).unwrap();
        anim.seek(0, 3).unwrap();
        let states = anim.states();
        assert_eq!(states[0].position, Coord::new(0, 0));
        assert_eq!(states[0].facing, 90.0);
        assert!(anim.collisions().is_empty());
    }

    fn two_marcher_show() -> Show {
        let mut show = Show::create_new(2);
        let mut sheet = Sheet::new(2, "sheet 1");
        sheet.beats = 8;
        sheet.marchers[0] = Marcher::new(Coord::new(0, 0));
        sheet.marchers[0].symbol = SymbolKind::Plain;
        sheet.marchers[1] = Marcher::new(Coord::new(32, 0));
        sheet.marchers[1].symbol = SymbolKind::Sol;
        sheet
            .continuity_by_symbol
            .insert(SymbolKind::Plain, Continuity::from_text("EM 8 E"));
        sheet
            .continuity_by_symbol
            .insert(SymbolKind::Sol, Continuity::from_text("MT 8 E"));
        show.sheets.push(sheet);
        show
    }

    #[test]
    fn two_marcher_collision_matches_scenario_2() {
        let show = two_marcher_show();
        let mut anim = Animation::compile(&show).unwrap();

        anim.seek(0, 4).unwrap();
        let states = anim.states();
        assert_eq!(states[0].position, Coord::new(16, 0));
        assert_eq!(states[1].position, Coord::new(32, 0));
        assert!(anim.collisions().is_empty());

        anim.seek(0, 8).unwrap();
        let states = anim.states();
        assert_eq!(states[0].position, Coord::new(32, 0));
        assert_eq!(states[1].position, Coord::new(32, 0));
        assert_eq!(anim.collisions(), vec![(0, 1)]);
    }

    #[test]
    fn forward_then_backward_returns_to_start_matches_scenario_4() {
        let show = two_marcher_show();

        let mut forward = Animation::compile(&show).unwrap();
        for _ in 0..8 {
            forward.next_beat();
        }
        let forward_states = forward.states();

        let mut backward = Animation::compile(&show).unwrap();
        backward.seek(0, 8).unwrap();
        for _ in 0..8 {
            backward.prev_beat();
        }
        let backward_states = backward.states();

        assert_eq!(forward_states[0].position, Coord::new(32, 0));
        assert_eq!(backward_states[0].position, Coord::new(0, 0));
    }

    #[test]
    fn zero_beat_pivot_reports_previous_position_matches_scenario_3() {
        let mut show = Show::create_new(1);
        let mut sheet = Sheet::new(1, "sheet 1");
        sheet.beats = 4;
        sheet.marchers[0] = Marcher::new(Coord::new(0, 0));
        sheet
            .continuity_by_symbol
            .insert(SymbolKind::Plain, Continuity::from_text("MAGIC SP\nMT 4 N"));
        show.sheets.push(sheet);

        let anim = Animation::compile(&show).unwrap();
        let states = anim.states();
        assert_eq!(states[0].position, Coord::new(0, 0));
        assert_eq!(states[0].facing, 0.0);
    }
}
