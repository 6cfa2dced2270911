//! Pickup colors. The palette is the closed set of colors that pickups and
//! crates can carry.

use crate::rng::{pick_index, UnitSource};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Color {
    Red,
    Yellow,
    Green,
    Purple,
    Blue,
    Orange,
}

pub const DEFAULT_PALETTE: [Color; 6] = [
    Color::Red,
    Color::Yellow,
    Color::Green,
    Color::Purple,
    Color::Blue,
    Color::Orange,
];

impl Color {
    pub fn name(&self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Yellow => "yellow",
            Color::Green => "green",
            Color::Purple => "purple",
            Color::Blue => "blue",
            Color::Orange => "orange",
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Palette entries with duplicates removed, first occurrence wins.
pub fn distinct(palette: &[Color]) -> Vec<Color> {
    let mut out: Vec<Color> = Vec::with_capacity(palette.len());
    for &color in palette {
        if !out.contains(&color) {
            out.push(color);
        }
    }
    out
}

/// Uniform pick from a non-empty palette.
pub fn random_color(palette: &[Color], source: &mut impl UnitSource) -> Color {
    palette[pick_index(source, palette.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SequenceSource;

    #[test]
    fn test_distinct_keeps_first_occurrence() {
        let palette = [
            Color::Blue,
            Color::Red,
            Color::Blue,
            Color::Green,
            Color::Red,
        ];
        let expected = vec![Color::Blue, Color::Red, Color::Green];
        assert_eq!(distinct(&palette), expected);
    }

    #[test]
    fn test_random_color_spans_palette() {
        let mut source = SequenceSource::new(vec![0.0, 0.5, 0.99]);
        assert_eq!(random_color(&DEFAULT_PALETTE, &mut source), Color::Red);
        assert_eq!(random_color(&DEFAULT_PALETTE, &mut source), Color::Purple);
        assert_eq!(random_color(&DEFAULT_PALETTE, &mut source), Color::Orange);
    }
}
