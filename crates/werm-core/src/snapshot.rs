//! Serializable terminal state, used for `@state` restore.
//!
//! The schema is versioned; a payload with another version, or whose
//! screens disagree with its declared size, is rejected and the caller
//! falls back to a blank terminal.

use serde::{Deserialize, Serialize};

use crate::config::TerminalConfig;
use crate::cursor::CursorStyle;
use crate::error::{DimensionError, SnapshotError};
use crate::grid::Row;
use crate::modes::Modes;
use crate::palette::Palette;
use crate::screen::Screen;
use crate::scrollback::Scrollback;
use crate::tabs::TabStops;
use crate::terminal::Terminal;

/// Current schema version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSnapshot {
    pub version: u32,
    pub cols: u16,
    pub rows: u16,
    pub primary: Screen,
    pub alternate: Screen,
    #[serde(default)]
    pub alternate_active: bool,
    /// History rows, oldest first.
    #[serde(default)]
    pub scrollback: Vec<Row>,
    #[serde(default)]
    pub discarded_rows: u64,
    #[serde(default)]
    pub scroll_region: Option<(u16, u16)>,
    #[serde(default)]
    pub tab_stops: Vec<u16>,
    #[serde(default)]
    pub modes: Modes,
    #[serde(default)]
    pub cursor_style: CursorStyle,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub palette: Palette,
}

impl TerminalSnapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode and check the version. Dimensions are checked on restore.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_str(json)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        Ok(snapshot)
    }

    fn validate(&self) -> Result<(), SnapshotError> {
        if self.cols == 0 || self.rows == 0 {
            return Err(DimensionError::InvalidDimension {
                cols: self.cols,
                rows: self.rows,
            }
            .into());
        }
        let active = if self.alternate_active {
            &self.alternate
        } else {
            &self.primary
        };
        if active.cols() != self.cols || active.rows() != self.rows {
            return Err(SnapshotError::Dimensions(format!(
                "active screen is {}x{}, snapshot declares {}x{}",
                active.cols(),
                active.rows(),
                self.cols,
                self.rows
            )));
        }
        for (name, screen) in [("primary", &self.primary), ("alternate", &self.alternate)] {
            if screen.cols() == 0 || screen.rows() == 0 || !screen.grid().is_consistent() {
                return Err(SnapshotError::Dimensions(format!("{name} screen rows are ragged")));
            }
            let cursor = screen.cursor;
            if cursor.row >= screen.rows() || cursor.col >= screen.cols() {
                return Err(SnapshotError::Dimensions(format!(
                    "{name} cursor ({}, {}) outside the screen",
                    cursor.row, cursor.col
                )));
            }
        }
        if let Some((top, bottom)) = self.scroll_region {
            if top >= bottom || bottom >= self.rows {
                return Err(SnapshotError::Dimensions(format!(
                    "scroll region {top}..={bottom} outside {} rows",
                    self.rows
                )));
            }
        }
        Ok(())
    }
}

impl Terminal {
    /// Capture the full state.
    #[must_use]
    pub fn snapshot(&self) -> TerminalSnapshot {
        TerminalSnapshot {
            version: SNAPSHOT_VERSION,
            cols: self.cols(),
            rows: self.rows(),
            primary: self.primary_screen().clone(),
            alternate: self.alternate_screen().clone(),
            alternate_active: self.is_alternate_active(),
            scrollback: self.scrollback().iter().cloned().collect(),
            discarded_rows: self.discarded_rows(),
            scroll_region: self.scroll_region(),
            tab_stops: self.tab_stops().iter().collect(),
            modes: *self.modes(),
            cursor_style: self.cursor_style(),
            title: self.title().to_owned(),
            palette: self.palette().clone(),
        }
    }

    /// Rebuild a terminal from a snapshot.
    pub fn from_snapshot(
        snapshot: TerminalSnapshot,
        config: TerminalConfig,
    ) -> Result<Self, SnapshotError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        snapshot.validate()?;

        let mut scrollback = Scrollback::new(config.scrollback_capacity);
        for mut row in snapshot.scrollback {
            row.set_width(snapshot.cols);
            let _ = scrollback.push(row);
        }
        scrollback.set_discarded(snapshot.discarded_rows + scrollback.discarded());

        let mut tabs = TabStops::new(snapshot.cols);
        tabs.clear_all();
        for col in snapshot.tab_stops {
            tabs.set(col);
        }

        Ok(Self::from_parts(
            config,
            snapshot.primary,
            snapshot.alternate,
            snapshot.alternate_active,
            scrollback,
            snapshot.scroll_region,
            tabs,
            snapshot.modes,
            snapshot.cursor_style,
            snapshot.palette,
            snapshot.title,
        ))
    }

    /// Decode `@state` JSON into a terminal.
    pub fn restore_json(json: &str, config: TerminalConfig) -> Result<Self, SnapshotError> {
        Self::from_snapshot(TerminalSnapshot::from_json(json)?, config)
    }
}
