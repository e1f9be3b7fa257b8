//! Horizontal tab stops.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Default interval between tab stops.
pub const DEFAULT_TAB_INTERVAL: u16 = 8;

/// Ordered set of tab-stop columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabStops {
    stops: BTreeSet<u16>,
    cols: u16,
}

impl TabStops {
    /// Default stops every eight columns, excluding column 0.
    #[must_use]
    pub fn new(cols: u16) -> Self {
        let mut tabs = Self {
            stops: BTreeSet::new(),
            cols,
        };
        tabs.reset();
        tabs
    }

    /// Restore the default stops for the current width.
    pub fn reset(&mut self) {
        self.stops = (DEFAULT_TAB_INTERVAL..self.cols)
            .step_by(usize::from(DEFAULT_TAB_INTERVAL))
            .collect();
    }

    /// HTS: set a stop at `col`.
    pub fn set(&mut self, col: u16) {
        if col < self.cols {
            self.stops.insert(col);
        }
    }

    /// TBC 0: clear the stop at `col`.
    pub fn clear(&mut self, col: u16) {
        self.stops.remove(&col);
    }

    /// TBC 3: clear every stop.
    pub fn clear_all(&mut self) {
        self.stops.clear();
    }

    #[must_use]
    pub fn is_set(&self, col: u16) -> bool {
        self.stops.contains(&col)
    }

    /// The first stop strictly right of `col`, or the last column.
    #[must_use]
    pub fn next_after(&self, col: u16) -> u16 {
        let last = self.cols.saturating_sub(1);
        self.stops
            .range(col.saturating_add(1)..)
            .next()
            .copied()
            .unwrap_or(last)
            .min(last)
    }

    /// The last stop strictly left of `col`, or column 0.
    #[must_use]
    pub fn prev_before(&self, col: u16) -> u16 {
        self.stops.range(..col).next_back().copied().unwrap_or(0)
    }

    /// Adapt to a width change: stops past the new width are dropped and
    /// added columns receive default stops.
    pub fn realize_width(&mut self, cols: u16) {
        let old = self.cols;
        self.cols = cols;
        if cols < old {
            self.stops.retain(|&c| c < cols);
        } else {
            let first = old.div_ceil(DEFAULT_TAB_INTERVAL) * DEFAULT_TAB_INTERVAL;
            self.stops
                .extend((first.max(DEFAULT_TAB_INTERVAL)..cols).step_by(usize::from(DEFAULT_TAB_INTERVAL)));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.stops.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_every_eight_columns() {
        let tabs = TabStops::new(80);
        let stops: Vec<u16> = tabs.iter().collect();
        assert_eq!(stops.first(), Some(&8));
        assert_eq!(stops.last(), Some(&72));
        assert_eq!(stops.len(), 9);
        assert!(!tabs.is_set(0));
    }

    #[test]
    fn next_and_prev() {
        let tabs = TabStops::new(20);
        assert_eq!(tabs.next_after(0), 8);
        assert_eq!(tabs.next_after(8), 16);
        assert_eq!(tabs.next_after(16), 19);
        assert_eq!(tabs.prev_before(17), 16);
        assert_eq!(tabs.prev_before(8), 0);
    }

    #[test]
    fn set_and_clear() {
        let mut tabs = TabStops::new(20);
        tabs.set(3);
        assert_eq!(tabs.next_after(0), 3);
        tabs.clear(3);
        assert_eq!(tabs.next_after(0), 8);
        tabs.clear_all();
        assert_eq!(tabs.next_after(0), 19);
        tabs.set(50);
        assert!(!tabs.is_set(50));
    }

    #[test]
    fn realize_width_trims_and_regenerates() {
        let mut tabs = TabStops::new(20);
        tabs.set(5);
        tabs.realize_width(10);
        assert_eq!(tabs.iter().collect::<Vec<_>>(), vec![5, 8]);
        tabs.realize_width(30);
        assert_eq!(tabs.iter().collect::<Vec<_>>(), vec![5, 8, 16, 24]);
    }
}
