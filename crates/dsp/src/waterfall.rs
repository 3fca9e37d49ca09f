use serde::{Deserialize, Serialize};

pub const DEFAULT_WIDTH: usize = 1024;
pub const DEFAULT_HEIGHT: usize = 256;

/// Where the newest row lands when drawn top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    NewestAtBottom,
    NewestAtTop,
}

/// Circular H x W history of spectra.
///
/// `cursor` always points at the most recently written row. An append
/// advances the cursor first and then overwrites that slot, so the
/// oldest row sits at `cursor + 1` (mod H).
pub struct Waterfall {
    width: usize,
    height: usize,
    cells: Vec<f32>,
    cursor: usize,
    appended: u64,
}

impl Waterfall {
    pub fn new(width: usize, height: usize) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            cells: vec![0.0; width * height],
            // First append lands on slot 0
            cursor: height - 1,
            appended: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Total rows appended since creation or the last clear
    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// Rows currently holding data (never more than H)
    pub fn filled(&self) -> usize {
        self.appended.min(self.height as u64) as usize
    }

    /// Copy one spectrum into the next slot, truncating to W or zero-padding.
    pub fn append(&mut self, row: &[f32]) {
        self.cursor = (self.cursor + 1) % self.height;
        let start = self.cursor * self.width;
        let slot = &mut self.cells[start..start + self.width];
        let n = row.len().min(self.width);
        slot[..n].copy_from_slice(&row[..n]);
        slot[n..].fill(0.0);
        self.appended += 1;
    }

    /// Row by physical slot index.
    pub fn slot(&self, index: usize) -> &[f32] {
        let start = (index % self.height) * self.width;
        &self.cells[start..start + self.width]
    }

    /// Row by age: 0 is the newest, H-1 the oldest.
    pub fn row_by_age(&self, age: usize) -> Option<&[f32]> {
        if age >= self.height {
            return None;
        }
        let index = (self.cursor + self.height - age) % self.height;
        Some(self.slot(index))
    }

    /// All H rows, newest first, starting at the cursor.
    pub fn rows_newest_first(&self) -> impl Iterator<Item = &[f32]> + '_ {
        (0..self.height).filter_map(move |age| self.row_by_age(age))
    }

    /// Row to draw at screen line `y` (0 = top).
    pub fn screen_row(&self, y: usize, orientation: Orientation) -> Option<&[f32]> {
        if y >= self.height {
            return None;
        }
        match orientation {
            Orientation::NewestAtTop => self.row_by_age(y),
            Orientation::NewestAtBottom => self.row_by_age(self.height - 1 - y),
        }
    }

    pub fn clear(&mut self) {
        self.cells.fill(0.0);
        self.cursor = self.height - 1;
        self.appended = 0;
    }
}

impl Default for Waterfall {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}

/// Decides which frames feed the waterfall: one append every `every` frames.
#[derive(Debug, Clone)]
pub struct Cadence {
    every: u32,
    frames: u64,
}

impl Cadence {
    pub fn new(every: u32) -> Self {
        Self {
            every: every.max(1),
            frames: 0,
        }
    }

    pub fn every(&self) -> u32 {
        self.every
    }

    pub fn set_every(&mut self, every: u32) {
        self.every = every.max(1);
    }

    /// Count one frame; true when this frame should append a row.
    pub fn tick(&mut self) -> bool {
        self.frames += 1;
        self.frames % self.every as u64 == 0
    }
}

impl Default for Cadence {
    fn default() -> Self {
        Self::new(1)
    }
}
