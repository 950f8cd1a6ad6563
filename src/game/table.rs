use crate::config::TimingConfig;
use crate::game::chart::ChartError;
use crate::game::note::{LANE_COUNT, Lane, Note};

// Sentinel for "no actionable note in this lane".
const NO_NOTE: u32 = u32::MAX;

/// Upper bound on table rows; a bit over 29 hours at the default density.
pub const MAX_BUCKETS: usize = 1 << 20;

/// Precomputed per-bucket lookup of the actionable note in each lane.
///
/// Buckets are `1 / table_density` seconds wide. Bucket `i` covers the
/// instant `i / table_density` and stores, per lane, the index of the note a
/// tap at that instant should be judged against. Only the `has_hit`/`missed`
/// flags of the owned notes change after construction.
#[derive(Clone, Debug)]
pub struct ChartTable {
    notes: Vec<Note>,
    lane_count: usize,
    density: f32,
    window: f32,
    // Flattened [bucket][lane].
    slots: Vec<u32>,
}

impl ChartTable {
    /// Builds the lookup table for a chronologically sorted note list.
    ///
    /// Two cursors walk the notes once: `expired` skips notes whose window
    /// closed before the bucket instant, and a scan from there assigns every
    /// note whose window has opened to its lane. A lane keeps an earlier note
    /// while that note is upcoming or still inside the penalty grace period,
    /// then yields to the next one.
    pub fn build(
        notes: Vec<Note>,
        lane_count: usize,
        duration: f32,
        timing: &TimingConfig,
    ) -> Result<Self, ChartError> {
        let lane_count = lane_count.min(LANE_COUNT);
        let bucket_count = Self::bucket_count_for(duration, timing)?;
        validate_notes(&notes, lane_count)?;

        let density = timing.table_density;
        let window = timing.consideration_window;
        let penalty = timing.penalty_window;
        let slot_count = bucket_count
            .checked_mul(lane_count)
            .ok_or(ChartError::TooLong {
                duration,
                max_buckets: MAX_BUCKETS,
            })?;
        let mut slots = vec![NO_NOTE; slot_count];

        let mut expired = 0usize;
        for (bucket, row) in slots.chunks_exact_mut(lane_count.max(1)).enumerate() {
            let t = bucket as f32 / density;
            while expired < notes.len() && notes[expired].time + window < t {
                expired += 1;
            }
            let mut k = expired;
            while k < notes.len() && notes[k].time - window < t {
                let lane = notes[k].lane.index();
                let held = row[lane];
                if held == NO_NOTE || notes[held as usize].time + penalty < t {
                    row[lane] = k as u32;
                }
                k += 1;
            }
        }

        Ok(Self {
            notes,
            lane_count,
            density,
            window,
            slots,
        })
    }

    /// Number of buckets a table of `duration` seconds needs, refusing
    /// durations past `MAX_BUCKETS`.
    pub fn bucket_count_for(duration: f32, timing: &TimingConfig) -> Result<usize, ChartError> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(ChartError::InvalidDuration(duration));
        }
        let rows = (duration * timing.table_density).ceil();
        if !(rows <= MAX_BUCKETS as f32) {
            return Err(ChartError::TooLong {
                duration,
                max_buckets: MAX_BUCKETS,
            });
        }
        Ok(rows as usize)
    }

    #[inline(always)]
    pub fn bucket_count(&self) -> usize {
        if self.lane_count == 0 {
            0
        } else {
            self.slots.len() / self.lane_count
        }
    }

    #[inline(always)]
    pub fn bucket_time(&self, bucket: usize) -> f32 {
        bucket as f32 / self.density
    }

    /// Bucket for an elapsed time, or `None` before the chart or past its end.
    #[inline(always)]
    pub fn bucket_for(&self, elapsed: f32) -> Option<usize> {
        if !(elapsed >= 0.0) {
            return None;
        }
        let bucket = (elapsed * self.density).floor() as usize;
        (bucket < self.bucket_count()).then_some(bucket)
    }

    #[inline(always)]
    pub fn candidate(&self, bucket: usize, lane: Lane) -> Option<usize> {
        let lane = lane.index();
        if lane >= self.lane_count || bucket >= self.bucket_count() {
            return None;
        }
        match self.slots[bucket * self.lane_count + lane] {
            NO_NOTE => None,
            idx => Some(idx as usize),
        }
    }

    /// Pending note a tap on `lane` at `elapsed` should be judged against.
    ///
    /// A stored candidate that was already hit or missed is skipped in favour
    /// of the next pending same-lane note whose window contains `elapsed`.
    pub fn candidate_at(&self, elapsed: f32, lane: Lane) -> Option<usize> {
        let first = self.bucket_for(elapsed)
            .and_then(|bucket| self.candidate(bucket, lane))?;
        if self.notes[first].is_pending() {
            return Some(first);
        }
        self.notes[first + 1..]
            .iter()
            .enumerate()
            .take_while(|(_, n)| n.time - self.window < elapsed)
            .find(|(_, n)| n.lane == lane && n.is_pending() && n.time + self.window > elapsed)
            .map(|(offset, _)| first + 1 + offset)
    }

    #[inline(always)]
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    #[inline(always)]
    pub fn note(&self, index: usize) -> Option<&Note> {
        self.notes.get(index)
    }

    #[inline(always)]
    pub fn note_mut(&mut self, index: usize) -> Option<&mut Note> {
        self.notes.get_mut(index)
    }

    /// Clears hit/miss flags so the same compiled chart can be replayed.
    pub fn reset_flags(&mut self) {
        for note in &mut self.notes {
            note.has_hit = false;
            note.missed = false;
        }
    }
}

fn validate_notes(notes: &[Note], lane_count: usize) -> Result<(), ChartError> {
    let mut previous = 0.0_f32;
    for (index, note) in notes.iter().enumerate() {
        if !note.time.is_finite() || note.time < 0.0 {
            return Err(ChartError::InvalidTime {
                index,
                time: note.time,
            });
        }
        if note.lane.index() >= lane_count {
            return Err(ChartError::LaneOutOfRange {
                index,
                lane: note.lane,
            });
        }
        if note.time < previous {
            return Err(ChartError::Unsorted {
                index,
                previous,
                time: note.time,
            });
        }
        previous = note.time;
    }
    Ok(())
}
