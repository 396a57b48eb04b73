use crate::pattern::CharacterData;
use crate::region::RenderRegion;

/// Plain-text snapshot of the visible grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameText {
    columns: usize,
    rows: usize,
    cells: Vec<char>,
}

impl FrameText {
    pub fn blank(columns: usize, rows: usize) -> Self {
        Self {
            columns,
            rows,
            cells: vec![' '; columns * rows],
        }
    }

    /// Projects characters back onto grid cells. Later characters overwrite earlier ones;
    /// invisible characters and cells outside the visible grid are dropped.
    pub fn capture(characters: &[CharacterData], region: &RenderRegion) -> Self {
        let mut frame = Self::blank(region.columns as usize, region.rows as usize);
        if region.spacing_x <= 0.0 || region.spacing_y <= 0.0 {
            return frame;
        }
        for character in characters {
            if character.opacity <= 0.0 {
                continue;
            }
            let column = (character.x / region.spacing_x).round();
            let row = (character.y / region.spacing_y).round();
            if column < 0.0 || row < 0.0 {
                continue;
            }
            frame.set(column as usize, row as usize, character.glyph);
        }
        frame
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn get(&self, column: usize, row: usize) -> Option<char> {
        if column >= self.columns || row >= self.rows {
            return None;
        }
        self.cells.get(row * self.columns + column).copied()
    }

    pub fn set(&mut self, column: usize, row: usize, glyph: char) {
        if column >= self.columns || row >= self.rows {
            return;
        }
        self.cells[row * self.columns + column] = glyph;
    }

    pub fn lines(&self) -> Vec<String> {
        if self.columns == 0 {
            return vec![String::new(); self.rows];
        }
        self.cells
            .chunks(self.columns)
            .map(|row| row.iter().collect())
            .collect()
    }

    pub fn to_text(&self) -> String {
        let lines = self.lines();
        if lines.is_empty() {
            return String::new();
        }
        let mut value = lines.join("\n");
        value.push('\n');
        value
    }
}

#[cfg(test)]
mod tests {
    use super::FrameText;
    use crate::font::FontBook;
    use crate::options::Spacing;
    use crate::pattern::CharacterData;
    use crate::region::{compute_region, SurfaceSize};

    #[test]
    fn capture_places_glyphs_on_their_cells() {
        let region = compute_region(
            SurfaceSize::new(30, 20),
            10.0,
            &FontBook::new().face("mono"),
            &['#'],
            Spacing {
                x: Some(10.0),
                y: Some(10.0),
            },
            1,
        );
        let frame = FrameText::capture(
            &[
                CharacterData::new(0.0, 0.0, 'a'),
                CharacterData::new(20.0, 10.0, 'b'),
                CharacterData::new(20.0, 10.0, 'c'),
                CharacterData::new(10.0, 0.0, 'z').with_opacity(0.0),
                CharacterData::new(-10.0, 0.0, 'x'),
            ],
            &region,
        );
        assert_eq!(frame.to_text(), "a  \n  c\n");
        assert_eq!(frame.get(2, 1), Some('c'));
        assert_eq!(frame.get(3, 1), None);
    }

    #[test]
    fn empty_grid_renders_empty_text() {
        assert_eq!(FrameText::blank(0, 0).to_text(), "");
        assert_eq!(FrameText::blank(2, 1).to_text(), "  \n");
    }
}
