use serde::{Deserialize, Serialize};

pub const LANE_COUNT: usize = 6;
pub const GROUND_LANE_COUNT: usize = 4;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    FarLeft,
    NearLeft,
    NearRight,
    FarRight,
    // Rail lanes sit on the seams between neighbouring groups.
    RailLeft,
    RailRight,
}

impl Lane {
    pub const ALL: [Self; LANE_COUNT] = [
        Self::FarLeft,
        Self::NearLeft,
        Self::NearRight,
        Self::FarRight,
        Self::RailLeft,
        Self::RailRight,
    ];

    #[inline(always)]
    pub const fn index(self) -> usize {
        match self {
            Self::FarLeft => 0,
            Self::NearLeft => 1,
            Self::NearRight => 2,
            Self::FarRight => 3,
            Self::RailLeft => 4,
            Self::RailRight => 5,
        }
    }

    /// Maps a raw input index (0..=3 ground, 4 left rail, 5 right rail).
    /// Anything else is not a lane and yields `None`.
    #[inline(always)]
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < LANE_COUNT {
            Some(Self::ALL[index])
        } else {
            None
        }
    }

    #[inline(always)]
    pub const fn is_rail(self) -> bool {
        matches!(self, Self::RailLeft | Self::RailRight)
    }

    /// The same physical rail as seen from the neighbouring group.
    #[inline(always)]
    pub const fn mirrored(self) -> Self {
        match self {
            Self::RailLeft => Self::RailRight,
            Self::RailRight => Self::RailLeft,
            other => other,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Note {
    pub time: f32,
    pub lane: Lane,
    pub has_hit: bool,
    pub missed: bool,
}

impl Note {
    #[inline(always)]
    pub const fn new(time: f32, lane: Lane) -> Self {
        Self {
            time,
            lane,
            has_hit: false,
            missed: false,
        }
    }

    /// Neither hit nor flagged by the miss sweep.
    #[inline(always)]
    pub const fn is_pending(&self) -> bool {
        !self.has_hit && !self.missed
    }
}

#[cfg(test)]
mod tests {
    use super::{LANE_COUNT, Lane};

    #[test]
    fn lane_index_round_trips_and_rejects_unknown() {
        for lane in Lane::ALL {
            assert_eq!(Lane::from_index(lane.index()), Some(lane));
        }
        assert_eq!(Lane::from_index(LANE_COUNT), None);
        assert_eq!(Lane::from_index(usize::MAX), None);
    }

    #[test]
    fn only_rails_mirror() {
        assert_eq!(Lane::RailLeft.mirrored(), Lane::RailRight);
        assert_eq!(Lane::RailRight.mirrored(), Lane::RailLeft);
        assert_eq!(Lane::NearLeft.mirrored(), Lane::NearLeft);
        assert!(Lane::RailRight.is_rail());
        assert!(!Lane::FarRight.is_rail());
    }
}
