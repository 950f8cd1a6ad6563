use log::{debug, info};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::game::gameplay::{GameEvent, Session, Tap};
use crate::game::scores::ScoreState;

/* -------------------- runner constants -------------------- */
const DEFAULT_FRAME_RATE: f32 = 120.0;
const DEFAULT_JITTER_S: f32 = 0.02;
const DEFAULT_ACCURACY: f64 = 0.95;

#[derive(Copy, Clone, Debug)]
pub struct RunOptions {
    pub frame_rate: f32,
    /// Tap every due note of the main group automatically.
    pub autoplay: bool,
    pub seed: u64,
    /// Half-width of the uniform timing error added to autoplay taps.
    pub jitter_s: f32,
    /// Chance that autoplay taps a given note at all.
    pub accuracy: f64,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            frame_rate: DEFAULT_FRAME_RATE,
            autoplay: true,
            seed: 0,
            jitter_s: DEFAULT_JITTER_S,
            accuracy: DEFAULT_ACCURACY,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    pub score: ScoreState,
    pub hits: usize,
    pub misses: usize,
    pub rotations: usize,
    pub frames: u64,
}

/// Plays the session to the end on a fixed timestep. Autoplay taps are sent
/// through the session's tap queue, the same path a threaded input layer uses.
pub fn run(session: &mut Session, opts: &RunOptions) -> RunSummary {
    let dt = 1.0 / opts.frame_rate.max(1.0);
    let mut rng = StdRng::seed_from_u64(opts.seed);
    let taps = session.tap_sender();
    let mut summary = RunSummary::default();
    let mut prev = 0.0_f32;

    info!(
        "Running {:.1}s chart at {:.0} fps (autoplay: {}).",
        session.chart_end(),
        opts.frame_rate,
        opts.autoplay
    );
    loop {
        let elapsed = summary.frames as f32 * dt;
        if opts.autoplay {
            let main = session.current_group();
            if let Some(segment) = session.segment(main) {
                for note in segment.table.notes() {
                    if note.time > elapsed {
                        break;
                    }
                    if note.time <= prev || !note.is_pending() {
                        continue;
                    }
                    if !rng.random_bool(opts.accuracy.clamp(0.0, 1.0)) {
                        continue;
                    }
                    let jitter = if opts.jitter_s > 0.0 {
                        rng.random_range(-opts.jitter_s..=opts.jitter_s)
                    } else {
                        0.0
                    };
                    // The receiver lives in `session`, so the send cannot fail here.
                    let _ = taps.send(Tap {
                        elapsed: note.time + jitter,
                        lane_index: note.lane.index(),
                    });
                }
            }
        }

        session.update(elapsed);
        for event in session.drain_events() {
            match event {
                GameEvent::NoteHit { .. } => summary.hits += 1,
                GameEvent::NoteMissed { .. } => summary.misses += 1,
                GameEvent::RotationStarted(start) => {
                    summary.rotations += 1;
                    info!(
                        "Rotation {:?}: group {} -> {} at {elapsed:.3}s.",
                        start.direction, start.previous_group, start.current_group
                    );
                }
                GameEvent::RotationFinished { current_group, .. } => {
                    debug!("Rotation settled on group {current_group}.");
                }
                GameEvent::Label { text, combo } => {
                    debug!("{text} (combo {combo})");
                }
            }
        }

        summary.frames += 1;
        prev = elapsed;
        if session.is_finished(elapsed) {
            break;
        }
    }
    summary.score = session.score();
    info!(
        "Finished: score {:.0}, best combo {}, {} hits, {} misses, {} rotations.",
        summary.score.score,
        summary.score.highest_combo,
        summary.hits,
        summary.misses,
        summary.rotations
    );
    summary
}
