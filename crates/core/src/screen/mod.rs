use std::collections::HashMap;

use crate::color::Color;
use crate::Result;

/// One captured frame of screen pixels, row-major.
#[derive(Debug, Clone, Default)]
pub struct PixelFrame {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<Color>,
}

impl PixelFrame {
    pub fn new(width: usize, height: usize, pixels: Vec<Color>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }
}

/// Contract of the external screen-capture source. `Ok(None)` means no new
/// frame is available yet; implementations must not block indefinitely.
pub trait PixelSource: Send {
    fn capture_frame(&mut self) -> Result<Option<PixelFrame>>;
}

/// Mean color over the whole frame; black for an empty one.
pub fn average_color(frame: &PixelFrame) -> Color {
    if frame.is_empty() {
        return Color::BLACK;
    }
    let mut sums = [0_u64; 3];
    for pixel in &frame.pixels {
        sums[0] += u64::from(pixel.r);
        sums[1] += u64::from(pixel.g);
        sums[2] += u64::from(pixel.b);
    }
    let count = frame.pixels.len() as u64;
    Color::new(
        (sums[0] / count) as u8,
        (sums[1] / count) as u8,
        (sums[2] / count) as u8,
    )
}

/// Most common color after grouping similar pixels. `tolerance` is the width
/// of each channel bucket; the winning bucket is averaged so the result is a
/// representative shade rather than a quantisation artifact.
pub fn dominant_color(frame: &PixelFrame, tolerance: u8) -> Color {
    if frame.is_empty() {
        return Color::BLACK;
    }
    let bucket = u16::from(tolerance.max(1));
    let mut groups: HashMap<(u16, u16, u16), (u64, [u64; 3])> = HashMap::new();
    for pixel in &frame.pixels {
        let key = (
            u16::from(pixel.r) / bucket,
            u16::from(pixel.g) / bucket,
            u16::from(pixel.b) / bucket,
        );
        let entry = groups.entry(key).or_insert((0, [0; 3]));
        entry.0 += 1;
        entry.1[0] += u64::from(pixel.r);
        entry.1[1] += u64::from(pixel.g);
        entry.1[2] += u64::from(pixel.b);
    }
    groups
        .into_values()
        .max_by_key(|(count, _)| *count)
        .map(|(count, sums)| {
            Color::new(
                (sums[0] / count) as u8,
                (sums[1] / count) as u8,
                (sums[2] / count) as u8,
            )
        })
        .unwrap_or(Color::BLACK)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_of(colors: &[Color]) -> PixelFrame {
        PixelFrame::new(colors.len(), 1, colors.to_vec())
    }

    #[test]
    fn average_of_an_empty_frame_is_black() {
        assert_eq!(average_color(&PixelFrame::default()), Color::BLACK);
    }

    #[test]
    fn average_mixes_channels_independently() {
        let frame = frame_of(&[Color::new(255, 0, 0), Color::new(0, 255, 0)]);
        assert_eq!(average_color(&frame), Color::new(127, 127, 0));
    }

    #[test]
    fn dominant_picks_the_largest_group() {
        let frame = frame_of(&[
            Color::new(250, 0, 0),
            Color::new(252, 2, 1),
            Color::new(255, 4, 3),
            Color::new(0, 0, 255),
        ]);
        let dominant = dominant_color(&frame, 30);
        assert!(dominant.r > 200);
        assert!(dominant.b < 10);
    }

    #[test]
    fn dominant_groups_within_tolerance() {
        // Two near-identical blues outvote two far-apart reds.
        let frame = frame_of(&[
            Color::new(0, 0, 200),
            Color::new(0, 0, 201),
            Color::new(255, 0, 0),
            Color::new(100, 0, 0),
        ]);
        let dominant = dominant_color(&frame, 16);
        assert_eq!(dominant, Color::new(0, 0, 200));
    }
}
