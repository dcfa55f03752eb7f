//! Categorical palette and initial cell-set color assignment.
//!
//! Reference classes are colored largest first. Query classes take the color
//! of the reference class with the same name, so a predicted "B cell" is drawn
//! like the reference "B cell".

use crate::coordination::{CellSetColor, CellSetPath, Rgb};

/// Categorical colors, cycled when there are more classes than entries.
pub const PALETTE: [Rgb; 17] = [
    [31, 119, 180],
    [255, 127, 14],
    [174, 199, 232],
    [255, 187, 120],
    [44, 160, 44],
    [152, 223, 138],
    [148, 103, 189],
    [197, 176, 213],
    [140, 86, 75],
    [196, 156, 148],
    [227, 119, 194],
    [247, 182, 210],
    [255, 152, 150],
    [188, 189, 34],
    [219, 219, 141],
    [23, 190, 207],
    [158, 218, 229],
];

/// Palette entry `i`, wrapping around.
#[must_use]
pub fn palette_color(i: usize) -> Rgb {
    PALETTE[i % PALETTE.len()]
}

/// Colors for reference classes given as `(name, size)`: descending size
/// order, ties keep their input order.
#[must_use]
pub fn seed_reference_colors(
    parent: &str,
    classes: &[(String, usize)],
) -> Vec<CellSetColor> {
    let mut by_size: Vec<&(String, usize)> = classes.iter().collect();
    by_size.sort_by(|a, b| b.1.cmp(&a.1));
    by_size
        .into_iter()
        .enumerate()
        .map(|(i, (name, _))| CellSetColor {
            path: CellSetPath::new(parent, name.clone()),
            color: palette_color(i),
        })
        .collect()
}

/// Colors for query classes: the same-named reference color when there is
/// one, otherwise the palette entry for the class position.
#[must_use]
pub fn seed_query_colors(
    parent: &str,
    classes: &[String],
    reference: &[CellSetColor],
) -> Vec<CellSetColor> {
    classes
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let color = reference
                .iter()
                .find(|c| &c.path.name == name)
                .map_or_else(|| palette_color(i), |c| c.color);
            CellSetColor {
                path: CellSetPath::new(parent, name.clone()),
                color,
            }
        })
        .collect()
}
