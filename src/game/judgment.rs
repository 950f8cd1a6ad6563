use crate::config::TimingConfig;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    Perfect,
    Great,
    Ok,
}

pub const PERFECT_WEIGHT: f64 = 3.0;
pub const GREAT_WEIGHT: f64 = 2.0;
pub const OK_WEIGHT: f64 = 1.0;

pub const MISS_LABEL: &str = "Miss!";
pub const SHIFT_LEFT_LABEL: &str = "Shift Left!";
pub const SHIFT_RIGHT_LABEL: &str = "Shift Right!";

impl Tier {
    #[inline(always)]
    pub const fn weight(self) -> f64 {
        match self {
            Self::Perfect => PERFECT_WEIGHT,
            Self::Great => GREAT_WEIGHT,
            Self::Ok => OK_WEIGHT,
        }
    }

    /// Text shown by the judgement readout.
    #[inline(always)]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Perfect => "Perfect!",
            Self::Great => "Nice",
            Self::Ok => "Almost",
        }
    }
}

/// Classify a tap against a note's nominal time.
///
/// Thresholds are exclusive and checked tightest first. Returns `None` when
/// the offset is at or beyond the Ok window; the caller leaves such a note
/// unjudged so a later, closer tap can still claim it.
#[inline(always)]
pub fn judge(nominal_time: f32, action_time: f32, timing: &TimingConfig) -> Option<Tier> {
    let delta = (action_time - nominal_time).abs();
    if delta < timing.perfect_window {
        Some(Tier::Perfect)
    } else if delta < timing.great_window {
        Some(Tier::Great)
    } else if delta < timing.ok_window {
        Some(Tier::Ok)
    } else {
        None
    }
}

/// Whether `action_time` lies inside the note's consideration window.
#[inline(always)]
pub fn in_consideration_window(nominal_time: f32, action_time: f32, timing: &TimingConfig) -> bool {
    action_time > nominal_time - timing.consideration_window
        && action_time < nominal_time + timing.consideration_window
}
