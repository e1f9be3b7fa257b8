//! Dirty-row tracking for incremental redraw.

use std::collections::BTreeSet;

/// Rows changed since the renderer last looked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Damage {
    /// Screen rows to repaint.
    pub rows: BTreeSet<u16>,
    /// Repaint everything (screen swap, resize, reset, scroll).
    pub full: bool,
}

impl Damage {
    pub fn mark_row(&mut self, row: u16) {
        if !self.full {
            self.rows.insert(row);
        }
    }

    /// Mark rows `[top, bottom]`.
    pub fn mark_rows(&mut self, top: u16, bottom: u16) {
        if !self.full {
            self.rows.extend(top..=bottom);
        }
    }

    pub fn mark_full(&mut self) {
        self.full = true;
        self.rows.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.full && self.rows.is_empty()
    }

    /// Whether `row` needs repainting.
    #[must_use]
    pub fn contains(&self, row: u16) -> bool {
        self.full || self.rows.contains(&row)
    }

    /// Return the accumulated damage and reset.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_accumulate_until_taken() {
        let mut d = Damage::default();
        assert!(d.is_empty());
        d.mark_row(3);
        d.mark_rows(5, 6);
        assert!(d.contains(5));
        assert!(!d.contains(4));
        let taken = d.take();
        assert_eq!(taken.rows.into_iter().collect::<Vec<_>>(), vec![3, 5, 6]);
        assert!(d.is_empty());
    }

    #[test]
    fn full_damage_subsumes_rows() {
        let mut d = Damage::default();
        d.mark_full();
        d.mark_row(1);
        assert!(d.rows.is_empty());
        assert!(d.contains(42));
    }
}
