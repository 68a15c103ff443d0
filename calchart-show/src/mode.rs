use calchart_core::{Reader, ReaderError, Writer};

const NUM_YARD_LINES: usize = 53;
const NUM_SPRING_LINES: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShowModeKind {
    Standard,
    SpringShow,
}

impl ShowModeKind {
    fn to_u8(self) -> u8 {
        match self {
            ShowModeKind::Standard => 0,
            ShowModeKind::SpringShow => 1,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => ShowModeKind::SpringShow,
            _ => ShowModeKind::Standard,
        }
    }
}

/// Field geometry a show is laid out against (§3).
#[derive(Clone, Debug, PartialEq)]
pub struct ShowMode {
    pub kind: ShowModeKind,
    pub field_size: (i32, i32),
    pub field_offset: (i32, i32),
    pub hash_w: i32,
    pub hash_e: i32,
    pub yard_lines: Vec<String>,
    pub spring_lines: Vec<String>,
}

/// Standard college-field numbering: yard markers every 5 yards from goal
/// line to midfield and back, laid out two array slots apart, padded with
/// blank entries for the setback beyond the field proper.
fn standard_yard_lines() -> Vec<String> {
    let numbers = [
        0, 5, 10, 15, 20, 25, 30, 35, 40, 45, 50, 45, 40, 35, 30, 25, 20, 15, 10, 5, 0,
    ];
    let mut lines = Vec::with_capacity(NUM_YARD_LINES);
    for (i, n) in numbers.iter().enumerate() {
        lines.push(n.to_string());
        if i + 1 != numbers.len() {
            lines.push(String::new());
        }
    }
    while lines.len() < NUM_YARD_LINES {
        lines.push(String::new());
    }
    lines
}

fn standard_spring_lines() -> Vec<String> {
    (1..=NUM_SPRING_LINES).map(|n| n.to_string()).collect()
}

impl Default for ShowMode {
    fn default() -> Self {
        ShowMode {
            kind: ShowModeKind::Standard,
            field_size: (160 * 8, 84 * 8),
            field_offset: (0, 0),
            hash_w: 32 * 8,
            hash_e: 52 * 8,
            yard_lines: standard_yard_lines(),
            spring_lines: standard_spring_lines(),
        }
    }
}

impl ShowMode {
    pub fn decode(reader: &mut Reader) -> Result<Self, ReaderError> {
        let kind = ShowModeKind::from_u8(reader.get::<u8>()?);
        let field_size = (reader.get::<i32>()?, reader.get::<i32>()?);
        let field_offset = (reader.get::<i32>()?, reader.get::<i32>()?);
        let hash_w = reader.get::<i32>()?;
        let hash_e = reader.get::<i32>()?;
        let mut yard_lines = Vec::with_capacity(NUM_YARD_LINES);
        for _ in 0..NUM_YARD_LINES {
            yard_lines.push(reader.get_string()?);
        }
        let mut spring_lines = Vec::with_capacity(NUM_SPRING_LINES);
        for _ in 0..NUM_SPRING_LINES {
            spring_lines.push(reader.get_string()?);
        }
        Ok(ShowMode {
            kind,
            field_size,
            field_offset,
            hash_w,
            hash_e,
            yard_lines,
            spring_lines,
        })
    }

    pub fn encode(&self, writer: &mut Writer) {
        writer.append(self.kind.to_u8());
        writer.append(self.field_size.0);
        writer.append(self.field_size.1);
        writer.append(self.field_offset.0);
        writer.append(self.field_offset.1);
        writer.append(self.hash_w);
        writer.append(self.hash_e);
        for line in self.yard_lines.iter().take(NUM_YARD_LINES) {
            writer.append_null_terminated_string(line);
        }
        for i in 0..NUM_SPRING_LINES {
            writer.append_null_terminated_string(
                self.spring_lines.get(i).map(String::as_str).unwrap_or(""),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_53_yard_lines_and_5_spring_lines() {
        let mode = ShowMode::default();
        assert_eq!(mode.yard_lines.len(), NUM_YARD_LINES);
        assert_eq!(mode.spring_lines.len(), NUM_SPRING_LINES);
    }

    #[test]
    fn round_trips() {
        let mode = ShowMode::default();
        let mut w = Writer::new();
        mode.encode(&mut w);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        let decoded = ShowMode::decode(&mut r).unwrap();
        assert_eq!(decoded, mode);
    }
}
