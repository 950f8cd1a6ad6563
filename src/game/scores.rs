use crate::game::judgment::Tier;

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ScoreState {
    pub score: f64,
    pub combo: u32,
    pub highest_combo: u32,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ScoreDelta {
    pub tier: Tier,
    pub points: f64,
    pub combo_before: u32,
    pub combo_after: u32,
}

/// Combo and score accumulator for one play session.
#[derive(Clone, Debug, Default)]
pub struct ScoreKeeper {
    state: ScoreState,
}

impl ScoreKeeper {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn state(&self) -> ScoreState {
        self.state
    }

    /// Every judged hit extends the combo by one regardless of tier, then
    /// scores `weight * (1 + combo) * segment_multiplier` using the new combo.
    pub fn on_judged(&mut self, tier: Tier, segment_multiplier: f64) -> ScoreDelta {
        let combo_before = self.state.combo;
        self.state.combo = combo_before.saturating_add(1);
        let points = tier.weight() * (1.0 + self.state.combo as f64) * segment_multiplier;
        self.state.score += points;
        self.state.highest_combo = self.state.highest_combo.max(self.state.combo);
        ScoreDelta {
            tier,
            points,
            combo_before,
            combo_after: self.state.combo,
        }
    }

    #[inline(always)]
    pub fn on_missed(&mut self) {
        self.state.combo = 0;
    }

    pub fn reset(&mut self) {
        self.state = ScoreState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::ScoreKeeper;
    use crate::game::judgment::Tier;

    #[test]
    fn hit_scores_with_post_increment_combo() {
        let mut keeper = ScoreKeeper::new();
        let first = keeper.on_judged(Tier::Perfect, 2.0);
        assert_eq!(first.combo_before, 0);
        assert_eq!(first.combo_after, 1);
        assert!((first.points - 3.0 * 2.0 * 2.0).abs() < 1e-9);
        let second = keeper.on_judged(Tier::Ok, 1.0);
        assert!((second.points - 1.0 * 3.0).abs() < 1e-9);
        assert!((keeper.state().score - 15.0).abs() < 1e-9);
    }

    #[test]
    fn miss_resets_combo_but_keeps_score_and_best() {
        let mut keeper = ScoreKeeper::new();
        for _ in 0..4 {
            keeper.on_judged(Tier::Great, 1.0);
        }
        let before = keeper.state().score;
        keeper.on_missed();
        let state = keeper.state();
        assert_eq!(state.combo, 0);
        assert_eq!(state.highest_combo, 4);
        assert_eq!(state.score, before);
        keeper.on_judged(Tier::Ok, 1.0);
        assert_eq!(keeper.state().combo, 1);
        assert_eq!(keeper.state().highest_combo, 4);
    }

    #[test]
    fn combo_grows_by_one_for_every_tier() {
        let mut keeper = ScoreKeeper::new();
        for (i, tier) in [Tier::Ok, Tier::Perfect, Tier::Great].into_iter().enumerate() {
            keeper.on_judged(tier, 1.0);
            assert_eq!(keeper.state().combo, i as u32 + 1);
        }
    }
}
