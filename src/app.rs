use std::{sync::mpsc::Receiver, time::Instant};

use ratatui::layout::Rect;

use crate::config::YScale;
use crate::constants::{AUTO_SCALE_FLOOR_MS, AUTO_SCALE_HEADROOM};
use crate::history::Sample;
use crate::sampler::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XAxisMode {
    Index,
    Clock,
}

/// Sample under the mouse pointer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hover {
    pub index: usize,
    pub sample: Sample,
    pub column: u16,
    pub row: u16,
}

// Main application state
pub struct App {
    pub target: String,
    pub snapshot: Snapshot,
    pub x_axis: XAxisMode,
    pub y_scale: YScale,
    fixed_ceiling: Option<f64>,
    pub hover: Option<Hover>,
    pointer: Option<(u16, u16)>,
    // plot area of the last frame, for pointer mapping
    pub plot_area: Rect,
    pub last_update: Instant,
}

impl App {
    pub fn new(target: String, capacity: usize, y_scale: YScale) -> App {
        let fixed_ceiling = match y_scale {
            YScale::Fixed(max) => Some(max),
            YScale::Auto => None,
        };
        App {
            target,
            snapshot: Snapshot::empty(capacity),
            x_axis: XAxisMode::Index,
            y_scale,
            fixed_ceiling,
            hover: None,
            pointer: None,
            plot_area: Rect::default(),
            last_update: Instant::now(),
        }
    }

    /// Takes every pending snapshot, keeping the newest. Returns whether anything arrived.
    pub fn drain(&mut self, updates: &Receiver<Snapshot>) -> bool {
        let mut changed = false;
        while let Ok(snapshot) = updates.try_recv() {
            self.snapshot = snapshot;
            changed = true;
        }
        if changed {
            self.last_update = Instant::now();
            self.refresh_hover();
        }
        changed
    }

    pub fn x_bounds(&self) -> [f64; 2] {
        let last = self.snapshot.samples.len().saturating_sub(1).max(1);
        [0.0, last as f64]
    }

    pub fn y_bounds(&self) -> [f64; 2] {
        match self.y_scale {
            YScale::Fixed(max) => [0.0, max],
            YScale::Auto => {
                let peak = self.snapshot.stats.map_or(0.0, |s| s.max);
                [0.0, (peak * AUTO_SCALE_HEADROOM).max(AUTO_SCALE_FLOOR_MS)]
            }
        }
    }

    pub fn toggle_x_axis(&mut self) {
        self.x_axis = match self.x_axis {
            XAxisMode::Index => XAxisMode::Clock,
            XAxisMode::Clock => XAxisMode::Index,
        };
    }

    /// Switches between auto scale and the configured fixed ceiling.
    pub fn toggle_y_scale(&mut self) {
        self.y_scale = match (self.y_scale, self.fixed_ceiling) {
            (YScale::Auto, Some(max)) => YScale::Fixed(max),
            (YScale::Auto, None) => {
                // freeze the current auto ceiling
                let [_, max] = self.y_bounds();
                self.fixed_ceiling = Some(max);
                YScale::Fixed(max)
            }
            (YScale::Fixed(_), _) => YScale::Auto,
        };
        self.refresh_hover();
    }

    pub fn on_pointer(&mut self, column: u16, row: u16) {
        self.pointer = Some((column, row));
        self.refresh_hover();
    }

    pub fn clear_pointer(&mut self) {
        self.pointer = None;
        self.hover = None;
    }

    fn refresh_hover(&mut self) {
        self.hover = self.pointer.and_then(|(column, row)| {
            let (x, y) = screen_to_data(self.plot_area, self.x_bounds(), self.y_bounds(), column, row)?;
            let (index, sample) = self.snapshot.nearest(x, y)?;
            Some(Hover {
                index,
                sample: *sample,
                column,
                row,
            })
        });
    }
}

/// Maps a terminal cell inside `plot` to chart coordinates, using the cell centre.
pub fn screen_to_data(
    plot: Rect,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
    column: u16,
    row: u16,
) -> Option<(f64, f64)> {
    if plot.width == 0 || plot.height == 0 {
        return None;
    }
    if column < plot.x || column >= plot.right() || row < plot.y || row >= plot.bottom() {
        return None;
    }
    let fx = (f64::from(column - plot.x) + 0.5) / f64::from(plot.width);
    let fy = (f64::from(row - plot.y) + 0.5) / f64::from(plot.height);
    let x = x_bounds[0] + fx * (x_bounds[1] - x_bounds[0]);
    let y = y_bounds[1] - fy * (y_bounds[1] - y_bounds[0]);
    Some((x, y))
}
