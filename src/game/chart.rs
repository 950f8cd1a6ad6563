use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::config::TimingConfig;
use crate::game::note::{GROUND_LANE_COUNT, Lane, Note};
use crate::game::rotation::GROUP_COUNT;

// Generated rail track: one left-rail note every RAIL_SPACING_S seconds,
// staggered per group so neighbouring segments never share a rail instant.
pub const RAIL_SPACING_S: f32 = 1.6;
pub const RAIL_FIRST_S: f32 = 1.5;
pub const RAIL_GROUP_STAGGER_S: f32 = 0.1;

// Segment thinning: group g drops base note i when i % 8 == g or (i + 3) % 8 == g.
const THIN_SECOND_OFFSET: usize = 3;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("note {index} at {time}s comes before the previous note at {previous}s")]
    Unsorted {
        index: usize,
        previous: f32,
        time: f32,
    },
    #[error("note {index} has invalid time {time}")]
    InvalidTime { index: usize, time: f32 },
    #[error("note {index} uses lane {lane:?} outside the table's lanes")]
    LaneOutOfRange { index: usize, lane: Lane },
    #[error("chart duration {0} is invalid")]
    InvalidDuration(f32),
    #[error("chart duration {duration}s needs more than {max_buckets} lookup buckets")]
    TooLong { duration: f32, max_buckets: usize },
    #[error("expected 8 ring segments, built {0}")]
    SegmentCount(usize),
    #[error("failed to read chart: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse chart: {0}")]
    Json(#[from] serde_json::Error),
}

/// One authored note before it is compiled into a segment.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChartEntry {
    pub time: f32,
    pub lane: Lane,
}

pub fn parse_json(content: &str) -> Result<Vec<ChartEntry>, ChartError> {
    let entries: Vec<ChartEntry> = serde_json::from_str(content)?;
    Ok(entries)
}

pub fn load(path: &Path) -> Result<Vec<ChartEntry>, ChartError> {
    let content = std::fs::read_to_string(path)?;
    let entries = parse_json(&content)?;
    info!("Loaded {} chart entries from '{}'.", entries.len(), path.display());
    Ok(entries)
}

/// Last authored note time, before the start offset is applied.
#[inline(always)]
pub fn base_chart_end(entries: &[ChartEntry]) -> f32 {
    entries.iter().fold(0.0_f32, |acc, e| acc.max(e.time))
}

/// Left-rail notes for one group, up to and excluding `until`.
pub fn rail_track(group_id: usize, until: f32) -> Vec<ChartEntry> {
    let mut out = Vec::new();
    let mut i = 0u32;
    loop {
        // Accumulating f32 steps drifts; derive each time from the step count.
        let time = RAIL_FIRST_S + RAIL_GROUP_STAGGER_S * group_id as f32 + RAIL_SPACING_S * i as f32;
        if time >= until {
            break;
        }
        out.push(ChartEntry {
            time,
            lane: Lane::RailLeft,
        });
        i += 1;
    }
    out
}

#[inline(always)]
fn keeps_entry(index: usize, group_id: usize) -> bool {
    index % GROUP_COUNT != group_id && (index + THIN_SECOND_OFFSET) % GROUP_COUNT != group_id
}

/// Rejects base charts that are not chronological or carry negative or
/// non-finite times. Thinning works on authored order, so it must match time order.
pub fn validate_entries(entries: &[ChartEntry]) -> Result<(), ChartError> {
    let mut previous = 0.0_f32;
    for (index, entry) in entries.iter().enumerate() {
        if !entry.time.is_finite() || entry.time < 0.0 {
            return Err(ChartError::InvalidTime {
                index,
                time: entry.time,
            });
        }
        if entry.time < previous {
            return Err(ChartError::Unsorted {
                index,
                previous,
                time: entry.time,
            });
        }
        previous = entry.time;
    }
    Ok(())
}

/// Compiles the notes of one ring segment from the shared base chart:
/// thinned ground notes plus the segment's generated rail track, shifted by
/// the global start offset and sorted chronologically.
pub fn compile_segment(
    entries: &[ChartEntry],
    group_id: usize,
    timing: &TimingConfig,
) -> Result<Vec<Note>, ChartError> {
    validate_entries(entries)?;
    let chart_end = base_chart_end(entries);
    let mut notes: Vec<Note> = entries
        .iter()
        .enumerate()
        .filter(|(i, e)| !e.lane.is_rail() && keeps_entry(*i, group_id))
        .map(|(_, e)| *e)
        // Authored rail notes are kept as-is; the generated track is added on top.
        .chain(entries.iter().copied().filter(|e| e.lane.is_rail()))
        .chain(rail_track(group_id, chart_end))
        .map(|e| Note::new(e.time + timing.global_start_offset, e.lane))
        .collect();
    notes.sort_by(|a, b| a.time.total_cmp(&b.time));
    debug!("Segment {group_id}: compiled {} notes.", notes.len());
    Ok(notes)
}

/// Built-in chart used when no chart file is supplied: a 60 second
/// alternating ground pattern that sweeps across the four lanes.
pub fn demo_chart() -> Vec<ChartEntry> {
    const GROUND: [Lane; GROUND_LANE_COUNT] = [Lane::FarLeft, Lane::NearLeft, Lane::NearRight, Lane::FarRight];
    const PATTERN: [usize; 8] = [0, 1, 2, 3, 2, 1, 0, 3];
    let step = 0.25_f32;
    (0..240u32)
        .map(|i| ChartEntry {
            time: step * i as f32,
            lane: GROUND[PATTERN[i as usize % PATTERN.len()]],
        })
        .collect()
}
