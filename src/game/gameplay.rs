use log::{debug, info, warn};
use std::sync::mpsc::{self, Receiver, Sender};

use crate::config::{Config, TimingConfig};
use crate::game::chart::{self, ChartEntry, ChartError};
use crate::game::judgment::{self, MISS_LABEL, SHIFT_LEFT_LABEL, SHIFT_RIGHT_LABEL, Tier};
use crate::game::note::{LANE_COUNT, Lane};
use crate::game::rotation::{GROUP_COUNT, RotationStart, RotationStateMachine, ShiftDirection, SlotPose};
use crate::game::scores::{ScoreDelta, ScoreKeeper, ScoreState};
use crate::game::table::ChartTable;

// Extra table length past the last note so late taps and the sweep still resolve.
const TABLE_TAIL_SECONDS: f32 = 1.0;

/// One ring segment: its compiled notes and score multiplier.
#[derive(Clone, Debug)]
pub struct Segment {
    pub group_id: usize,
    pub table: ChartTable,
    pub multiplier: f64,
}

/// A tap as delivered by the host's input layer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Tap {
    pub elapsed: f32,
    pub lane_index: usize,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TableSide {
    Own,
    Mirror,
}

/// A note claimed by a tap, before any rotation side effects.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct JudgedNote {
    pub side: TableSide,
    pub note_index: usize,
    pub tier: Tier,
    /// Signed tap offset in seconds; positive is late.
    pub offset_s: f32,
    pub score: ScoreDelta,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct JudgementOutcome {
    pub lane: Lane,
    pub group: usize,
    pub note_index: usize,
    pub tier: Tier,
    pub offset_s: f32,
    pub score: ScoreDelta,
    pub rotation: Option<RotationStart>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    /// Text for the judgement readout.
    Label {
        text: &'static str,
        combo: u32,
    },
    NoteHit {
        group: usize,
        note_index: usize,
        tier: Tier,
    },
    NoteMissed {
        group: usize,
        note_index: usize,
    },
    RotationStarted(RotationStart),
    RotationFinished {
        direction: ShiftDirection,
        current_group: usize,
    },
}

/// Resolves which table and note a tap on `lane` refers to.
///
/// Ground lanes only consult `own`. A rail is shared with the neighbouring
/// group on that side, so when `own` has nothing for a rail lane the same
/// rail is looked up in `mirror` under its mirrored lane.
pub fn find_candidate(
    elapsed: f32,
    lane: Lane,
    own: &ChartTable,
    mirror: &ChartTable,
) -> Option<(TableSide, usize)> {
    if let Some(idx) = own.candidate_at(elapsed, lane) {
        return Some((TableSide::Own, idx));
    }
    if lane.is_rail() {
        return mirror
            .candidate_at(elapsed, lane.mirrored())
            .map(|idx| (TableSide::Mirror, idx));
    }
    None
}

/// Judges one tap against the active table (and, for rails, its mirror).
///
/// Returns `None` when there is no candidate, the tap falls outside the
/// candidate's consideration window, or the offset earns no tier. A note is
/// marked hit exactly once; a hit note is never scored again.
pub fn handle_action(
    elapsed: f32,
    lane: Lane,
    own: &mut ChartTable,
    mirror: &mut ChartTable,
    multiplier: f64,
    scores: &mut ScoreKeeper,
    timing: &TimingConfig,
) -> Option<JudgedNote> {
    let (side, note_index) = find_candidate(elapsed, lane, own, mirror)?;
    let table = match side {
        TableSide::Own => own,
        TableSide::Mirror => mirror,
    };
    let note = table.note_mut(note_index)?;
    if !note.is_pending() || !judgment::in_consideration_window(note.time, elapsed, timing) {
        return None;
    }
    let tier = judgment::judge(note.time, elapsed, timing)?;
    note.has_hit = true;
    let offset_s = elapsed - note.time;
    let score = scores.on_judged(tier, multiplier);
    Some(JudgedNote {
        side,
        note_index,
        tier,
        offset_s,
        score,
    })
}

fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    debug_assert_ne!(a, b);
    if a < b {
        let (lo, hi) = items.split_at_mut(b);
        (&mut lo[a], &mut hi[0])
    } else {
        let (lo, hi) = items.split_at_mut(a);
        (&mut hi[0], &mut lo[b])
    }
}

fn min_rail_spacing(segments: &[Segment]) -> Option<f32> {
    segments
        .iter()
        .flat_map(|seg| {
            seg.table
                .notes()
                .iter()
                .filter(|n| n.lane.is_rail())
                .map(|n| n.time)
                .collect::<Vec<_>>()
                .windows(2)
                .map(|w| w[1] - w[0])
                .collect::<Vec<_>>()
        })
        .fold(None, |acc: Option<f32>, gap| Some(acc.map_or(gap, |a| a.min(gap))))
}

/// All mutable state of one play session: ring segments, score, rotation,
/// miss-sweep cursors and the outgoing event queue. Everything runs on the
/// caller's frame thread; taps from other threads go through `tap_sender`.
pub struct Session {
    timing: TimingConfig,
    segments: [Segment; GROUP_COUNT],
    scores: ScoreKeeper,
    rotation: RotationStateMachine,
    sweep_cursors: [usize; GROUP_COUNT],
    // When the current group became main; notes that closed earlier are not its misses.
    active_since: f32,
    chart_end: f32,
    events: Vec<GameEvent>,
    tap_tx: Sender<Tap>,
    tap_rx: Receiver<Tap>,
}

impl Session {
    /// Compiles all eight ring segments from one base chart.
    pub fn new(config: &Config, entries: &[ChartEntry]) -> Result<Self, ChartError> {
        let timing = config.timing;
        let duration = chart::base_chart_end(entries)
            + timing.global_start_offset
            + timing.consideration_window
            + TABLE_TAIL_SECONDS;
        chart::validate_entries(entries)?;
        ChartTable::bucket_count_for(duration, &timing)?;
        let mut segments = Vec::with_capacity(GROUP_COUNT);
        for group_id in 0..GROUP_COUNT {
            let notes = chart::compile_segment(entries, group_id, &timing)?;
            segments.push(Segment {
                group_id,
                table: ChartTable::build(notes, LANE_COUNT, duration, &timing)?,
                multiplier: config.segment_multipliers[group_id],
            });
        }
        let segments: [Segment; GROUP_COUNT] = segments
            .try_into()
            .map_err(|built: Vec<Segment>| ChartError::SegmentCount(built.len()))?;
        Ok(Self::from_segments(timing, segments))
    }

    pub fn from_segments(timing: TimingConfig, segments: [Segment; GROUP_COUNT]) -> Self {
        let chart_end = segments
            .iter()
            .map(|s| s.table.bucket_count() as f32 / timing.table_density)
            .fold(0.0_f32, f32::max);
        let closest_rails = min_rail_spacing(&segments);
        if let Some(gap) = closest_rails.filter(|&gap| timing.rotation_duration > gap) {
            warn!(
                "Rotation duration {:.3}s exceeds the closest rail spacing {gap:.3}s; rail hits during a rotation will be ignored.",
                timing.rotation_duration
            );
        }
        let (tap_tx, tap_rx) = mpsc::channel();
        info!(
            "Session ready: {} notes across {GROUP_COUNT} segments, {chart_end:.1}s.",
            segments.iter().map(|s| s.table.notes().len()).sum::<usize>()
        );
        Self {
            timing,
            segments,
            scores: ScoreKeeper::new(),
            rotation: RotationStateMachine::new(timing.rotation_duration),
            sweep_cursors: [0; GROUP_COUNT],
            active_since: f32::NEG_INFINITY,
            chart_end,
            events: Vec::new(),
            tap_tx,
            tap_rx,
        }
    }

    #[inline(always)]
    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    #[inline(always)]
    pub fn score(&self) -> ScoreState {
        self.scores.state()
    }

    #[inline(always)]
    pub fn rotation(&self) -> &RotationStateMachine {
        &self.rotation
    }

    #[inline(always)]
    pub fn current_group(&self) -> usize {
        self.rotation.current_group()
    }

    #[inline(always)]
    pub fn poses(&self) -> &[SlotPose; GROUP_COUNT] {
        self.rotation.poses()
    }

    #[inline(always)]
    pub fn segment(&self, group: usize) -> Option<&Segment> {
        self.segments.get(group)
    }

    #[inline(always)]
    pub fn chart_end(&self) -> f32 {
        self.chart_end
    }

    #[inline(always)]
    pub fn is_finished(&self, elapsed: f32) -> bool {
        elapsed >= self.chart_end && !self.rotation.is_animating()
    }

    /// Sender for hosts that receive input on another thread. Queued taps
    /// are judged at the start of the next `update`.
    pub fn tap_sender(&self) -> Sender<Tap> {
        self.tap_tx.clone()
    }

    pub fn drain_events(&mut self) -> std::vec::Drain<'_, GameEvent> {
        self.events.drain(..)
    }

    /// Judges a tap on `lane_index` at `elapsed`. Unknown lanes and lanes
    /// without an actionable note are silent no-ops.
    pub fn handle_tap(&mut self, elapsed: f32, lane_index: usize) -> Option<JudgementOutcome> {
        let lane = Lane::from_index(lane_index)?;
        let main = self.rotation.current_group();
        let mirror = match lane {
            Lane::RailLeft => self.rotation.slot_at(1),
            _ => self.rotation.slot_at(-1),
        };
        let multiplier = self.segments[main].multiplier;
        let (own, other) = pair_mut(&mut self.segments, main, mirror);
        let judged = handle_action(
            elapsed,
            lane,
            &mut own.table,
            &mut other.table,
            multiplier,
            &mut self.scores,
            &self.timing,
        )?;
        let group = match judged.side {
            TableSide::Own => main,
            TableSide::Mirror => mirror,
        };
        debug!(
            concat!(
                "TAP HIT: tier={:?}, lane={:?}, group={}, note={}, ",
                "elapsed_s={:.4}, offset_ms={:.2}, points={:.1}, combo={}"
            ),
            judged.tier,
            lane,
            group,
            judged.note_index,
            elapsed,
            judged.offset_s * 1000.0,
            judged.score.points,
            judged.score.combo_after,
        );
        self.events.push(GameEvent::NoteHit {
            group,
            note_index: judged.note_index,
            tier: judged.tier,
        });

        let rotation = ShiftDirection::from_rail(lane).and_then(|direction| {
            let start = self.rotation.begin(direction, elapsed)?;
            self.active_since = elapsed;
            Some(start)
        });
        let text = match rotation.map(|r| r.direction) {
            Some(ShiftDirection::GoLeft) => SHIFT_LEFT_LABEL,
            Some(ShiftDirection::GoRight) => SHIFT_RIGHT_LABEL,
            None => judged.tier.label(),
        };
        self.events.push(GameEvent::Label {
            text,
            combo: judged.score.combo_after,
        });
        if let Some(start) = rotation {
            self.events.push(GameEvent::RotationStarted(start));
        }

        Some(JudgementOutcome {
            lane,
            group,
            note_index: judged.note_index,
            tier: judged.tier,
            offset_s: judged.offset_s,
            score: judged.score,
            rotation,
        })
    }

    /// Flags every ground note of the main group whose window closed before
    /// `elapsed` without a hit. Returns the number of notes newly missed.
    /// Rail notes are optional shift cues: a hit extends the combo, but an
    /// unhit rail is never a miss and never resets it.
    pub fn sweep_misses(&mut self, elapsed: f32) -> usize {
        let main = self.rotation.current_group();
        let window = self.timing.consideration_window;
        let table = &mut self.segments[main].table;
        let mut cursor = self.sweep_cursors[main];
        let mut missed = 0usize;
        while let Some(note) = table.note_mut(cursor) {
            let closes_at = note.time + window;
            if closes_at >= elapsed {
                break;
            }
            if !note.lane.is_rail() && note.is_pending() && closes_at >= self.active_since {
                note.missed = true;
                missed += 1;
                self.scores.on_missed();
                debug!(
                    "TAP MISS: group={main}, note={cursor}, lane={:?}, note_time_s={:.4}, elapsed_s={elapsed:.4}",
                    note.lane, note.time
                );
                self.events.push(GameEvent::NoteMissed {
                    group: main,
                    note_index: cursor,
                });
            }
            cursor += 1;
        }
        self.sweep_cursors[main] = cursor;
        if missed > 0 {
            self.events.push(GameEvent::Label {
                text: MISS_LABEL,
                combo: 0,
            });
        }
        missed
    }

    /// Per-frame step: judge queued taps, advance the rotation, then sweep
    /// misses, so a tap queued for this frame can still claim its note.
    pub fn update(&mut self, elapsed: f32) {
        while let Ok(tap) = self.tap_rx.try_recv() {
            self.handle_tap(tap.elapsed, tap.lane_index);
        }
        if let Some(direction) = self.rotation.tick(elapsed) {
            self.events.push(GameEvent::RotationFinished {
                direction,
                current_group: self.rotation.current_group(),
            });
        }
        self.sweep_misses(elapsed);
    }

    /// Rewinds to a fresh session over the same compiled segments.
    pub fn restart(&mut self) {
        for seg in &mut self.segments {
            seg.table.reset_flags();
        }
        self.scores.reset();
        self.rotation = RotationStateMachine::new(self.timing.rotation_duration);
        self.sweep_cursors = [0; GROUP_COUNT];
        self.active_since = f32::NEG_INFINITY;
        self.events.clear();
        while self.tap_rx.try_recv().is_ok() {}
        info!("Session restarted.");
    }
}
