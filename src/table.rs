/*
 * This file is part of Ispcool.
 *
 * Copyright (C) 2025 Ispcool contributors
 *
 * Ispcool is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Ispcool is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Ispcool. If not, see <https://www.gnu.org/licenses/>.
 */

use std::io;

use serde_json::json;
use thiserror::Error;

use crate::ect::ThermalFunction;
use crate::logger;

#[derive(Error, Debug)]
pub enum CoolingError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("parse error: {0}")]
    Parse(String),
}

/// One row of the fps throttling table. `index` is the opaque driver-data
/// identifier assigned at construction: the position of the entry among the
/// distinct fps values, in configuration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FpsEntry {
    pub fps: u32,
    pub index: u32,
}

/// Physical ordering of the distinct fps values in the table, fixed once at
/// construction from the first adjacent pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Ordered table of distinct fps caps, immutable after construction.
///
/// Cooling levels count from the least-throttled end: level 0 is always the
/// highest fps cap and `max_level()` the lowest, independent of whether the
/// configuration listed the values ascending or descending. Tables with
/// fewer than two distinct values have no recorded order.
#[derive(Debug, Clone)]
pub struct FpsTable {
    entries: Vec<FpsEntry>,
    order: Option<SortOrder>,
}

enum Query {
    MaxLevel,
    LevelOf(u32),
    FpsAt(u32),
}

impl FpsTable {
    /// Build the table from a plain fps sequence. Consecutive duplicates are
    /// collapsed (first occurrence wins). The remaining values must be
    /// strictly monotonic in one direction; mixed-order input is rejected
    /// rather than silently producing wrong levels.
    pub fn from_fps(fps_values: &[u32]) -> Result<FpsTable, CoolingError> {
        let mut entries: Vec<FpsEntry> = Vec::with_capacity(fps_values.len());
        let mut last: Option<u32> = None;
        for &fps in fps_values {
            if last == Some(fps) {
                continue;
            }
            entries.push(FpsEntry {
                fps,
                index: entries.len() as u32,
            });
            last = Some(fps);
        }

        let order = detect_order(&entries)?;

        for entry in &entries {
            logger::log_event(
                "fps_table_entry",
                json!({ "index": entry.index, "fps": entry.fps }),
            );
        }

        Ok(FpsTable { entries, order })
    }

    /// Build the table from an ECT thermal function: one candidate entry per
    /// temperature range, carrying the range's max frequency as the fps cap.
    pub fn from_function(function: &ThermalFunction) -> Result<FpsTable, CoolingError> {
        let fps: Vec<u32> = function
            .range_list
            .iter()
            .map(|range| range.max_frequency)
            .collect();
        Self::from_fps(&fps)
    }

    pub fn entries(&self) -> &[FpsEntry] {
        &self.entries
    }

    pub fn order(&self) -> Option<SortOrder> {
        self.order
    }

    /// Highest valid cooling level, i.e. distinct entry count minus one.
    pub fn max_level(&self) -> Result<u32, CoolingError> {
        self.lookup(Query::MaxLevel)
    }

    /// Translate an fps cap to its cooling level.
    pub fn fps_to_level(&self, fps: u32) -> Result<u32, CoolingError> {
        self.lookup(Query::LevelOf(fps))
    }

    /// Translate a cooling level to its fps cap.
    pub fn level_to_fps(&self, level: u32) -> Result<u32, CoolingError> {
        self.lookup(Query::FpsAt(level))
    }

    // All three query modes run over the same enumeration so the two
    // translation directions cannot drift apart.
    fn lookup(&self, query: Query) -> Result<u32, CoolingError> {
        if self.entries.is_empty() {
            return Err(CoolingError::InvalidArgument(
                "fps table has no entries".to_string(),
            ));
        }
        let max_level = (self.entries.len() - 1) as u32;

        match query {
            Query::MaxLevel => Ok(max_level),
            Query::LevelOf(fps) => {
                for (i, entry) in self.entries.iter().enumerate() {
                    if entry.fps == fps {
                        return Ok(self.position_level_map(i as u32, max_level));
                    }
                }
                Err(CoolingError::InvalidArgument(format!(
                    "no table entry for fps {}",
                    fps
                )))
            }
            Query::FpsAt(level) => {
                if level > max_level {
                    return Err(CoolingError::InvalidArgument(format!(
                        "level {} above max level {}",
                        level, max_level
                    )));
                }
                let pos = self.position_level_map(level, max_level);
                Ok(self.entries[pos as usize].fps)
            }
        }
    }

    // Level 0 sits at the least-throttled (highest fps) end. The mapping is
    // an involution, so it converts positions to levels and levels back to
    // positions.
    fn position_level_map(&self, value: u32, max_level: u32) -> u32 {
        match self.order {
            Some(SortOrder::Ascending) => max_level - value,
            _ => value,
        }
    }
}

fn detect_order(entries: &[FpsEntry]) -> Result<Option<SortOrder>, CoolingError> {
    if entries.len() < 2 {
        return Ok(None);
    }
    let descend = entries[0].fps > entries[1].fps;
    for pair in entries.windows(2) {
        let holds = if descend {
            pair[0].fps > pair[1].fps
        } else {
            pair[0].fps < pair[1].fps
        };
        if !holds {
            return Err(CoolingError::InvalidArgument(format!(
                "fps values not strictly {}: {} followed by {}",
                if descend { "descending" } else { "ascending" },
                pair[0].fps,
                pair[1].fps
            )));
        }
    }
    Ok(Some(if descend {
        SortOrder::Descending
    } else {
        SortOrder::Ascending
    }))
}
