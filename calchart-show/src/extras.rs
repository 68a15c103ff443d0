use calchart_core::{Coord, Reader, ReaderError, Writer};

/// Print-only continuity text (§4.3 `PCNT`). Round-trips unchanged; nothing
/// in this crate renders it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrintContinuity {
    pub number: String,
    pub body: String,
}

impl PrintContinuity {
    pub fn decode(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(PrintContinuity {
            number: reader.get_string()?,
            body: reader.get_string()?,
        })
    }

    pub fn encode(&self, writer: &mut Writer) {
        writer.append_null_terminated_string(&self.number);
        writer.append_null_terminated_string(&self.body);
    }
}

/// A background reference image positioned over the field (§4.3 `BACK`).
#[derive(Clone, Debug, PartialEq)]
pub struct BackgroundImage {
    pub left: i32,
    pub top: i32,
    pub scaled_width: i32,
    pub scaled_height: i32,
    pub data: Vec<u8>,
}

impl BackgroundImage {
    pub fn decode(reader: &mut Reader) -> Result<Self, ReaderError> {
        let left = reader.get::<i32>()?;
        let top = reader.get::<i32>()?;
        let scaled_width = reader.get::<i32>()?;
        let scaled_height = reader.get::<i32>()?;
        let len = reader.get::<u32>()? as usize;
        let data = reader.get_bytes(len)?.to_vec();
        Ok(BackgroundImage {
            left,
            top,
            scaled_width,
            scaled_height,
            data,
        })
    }

    pub fn encode(&self, writer: &mut Writer) {
        writer.append(self.left);
        writer.append(self.top);
        writer.append(self.scaled_width);
        writer.append(self.scaled_height);
        writer.append(self.data.len() as u32);
        writer.append_bytes(&self.data);
    }
}

/// A planar curve a set of marchers is evenly redistributed along
/// (§GLOSSARY, SPEC_FULL §2). Represented as an ordered list of control
/// points; marchers are reprojected onto it by even arc-length spacing.
#[derive(Clone, Debug, PartialEq)]
pub struct Curve {
    pub control_points: Vec<Coord>,
}

impl Curve {
    pub fn decode(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Curve {
            control_points: reader.get_vec::<Coord>()?,
        })
    }

    pub fn encode(&self, writer: &mut Writer) {
        writer.append_vec(&self.control_points);
    }

    fn segment_lengths(&self) -> Vec<f32> {
        self.control_points
            .windows(2)
            .map(|w| w[0].distance(w[1]))
            .collect()
    }

    /// Position at arc-length fraction `t` in `0.0..=1.0` along the curve.
    /// A curve with fewer than two control points is degenerate and returns
    /// its single point (or the origin if empty).
    pub fn point_at_fraction(&self, t: f32) -> Coord {
        if self.control_points.is_empty() {
            return Coord::ZERO;
        }
        if self.control_points.len() == 1 {
            return self.control_points[0];
        }
        let lengths = self.segment_lengths();
        let total: f32 = lengths.iter().sum();
        if total == 0.0 {
            return self.control_points[0];
        }
        let target = t.clamp(0.0, 1.0) * total;
        let mut covered = 0.0;
        for (i, seg_len) in lengths.iter().enumerate() {
            if target <= covered + seg_len || i == lengths.len() - 1 {
                let local_t = if *seg_len == 0.0 {
                    0.0
                } else {
                    (target - covered) / seg_len
                };
                return self.control_points[i].lerp_truncated(self.control_points[i + 1], local_t);
            }
            covered += seg_len;
        }
        *self.control_points.last().unwrap()
    }

    /// Evenly redistribute `count` marchers along the curve's arc length
    /// (§3 Sheet invariant (c): "curve assignment overrides free-hand
    /// position via deterministic re-projection").
    pub fn redistribute(&self, count: usize) -> Vec<Coord> {
        if count == 0 {
            return Vec::new();
        }
        if count == 1 {
            return vec![self.point_at_fraction(0.5)];
        }
        (0..count)
            .map(|i| self.point_at_fraction(i as f32 / (count - 1) as f32))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_continuity_round_trips() {
        let pc = PrintContinuity {
            number: "1".to_string(),
            body: "MT 4 E".to_string(),
        };
        let mut w = Writer::new();
        pc.encode(&mut w);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert_eq!(PrintContinuity::decode(&mut r).unwrap(), pc);
    }

    #[test]
    fn background_image_round_trips() {
        let img = BackgroundImage {
            left: 1,
            top: 2,
            scaled_width: 100,
            scaled_height: 50,
            data: vec![1, 2, 3, 4],
        };
        let mut w = Writer::new();
        img.encode(&mut w);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert_eq!(BackgroundImage::decode(&mut r).unwrap(), img);
    }

    #[test]
    fn curve_redistributes_evenly_along_a_straight_line() {
        let curve = Curve {
            control_points: vec![Coord::new(0, 0), Coord::new(100, 0)],
        };
        let points = curve.redistribute(5);
        assert_eq!(points.len(), 5);
        assert_eq!(points[0], Coord::new(0, 0));
        assert_eq!(points[4], Coord::new(100, 0));
        assert_eq!(points[2], Coord::new(50, 0));
    }

    #[test]
    fn curve_round_trips() {
        let curve = Curve {
            control_points: vec![Coord::new(0, 0), Coord::new(10, 10), Coord::new(20, 0)],
        };
        let mut w = Writer::new();
        curve.encode(&mut w);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert_eq!(Curve::decode(&mut r).unwrap(), curve);
    }
}
