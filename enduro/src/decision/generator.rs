use crate::decision::{Decision, DecisionContext, DecisionKind};
use log::debug;

/// Minimum number of laps between two decisions.
pub const DEFAULT_DECISION_SPACING: u32 = 10;

/// DecisionGenerator checks the trigger predicates of all decision kinds in priority order and
/// hands out decision ids.
#[derive(Debug, Clone)]
pub struct DecisionGenerator {
    spacing: u32,
    next_id: u32,
}

impl Default for DecisionGenerator {
    fn default() -> Self {
        DecisionGenerator::new(DEFAULT_DECISION_SPACING)
    }
}

impl DecisionGenerator {
    pub fn new(spacing: u32) -> DecisionGenerator {
        DecisionGenerator { spacing, next_id: 1 }
    }

    pub fn spacing(&self) -> u32 {
        self.spacing
    }

    /// is_spaced checks if enough laps passed since the last decision. A decision is allowed at
    /// lap L only if L - last_decision_lap >= spacing.
    pub fn is_spaced(&self, lap: u32, last_decision_lap: Option<u32>) -> bool {
        match last_decision_lap {
            Some(last) => lap.saturating_sub(last) >= self.spacing && lap > last,
            None => true,
        }
    }

    /// check returns the decision of the first triggered kind, if any and if the spacing allows
    /// one.
    pub fn check(&mut self, ctx: &DecisionContext, last_decision_lap: Option<u32>) -> Option<Decision> {
        if !self.is_spaced(ctx.lap, last_decision_lap) {
            return None;
        }

        let kind = DecisionKind::PRIORITY
            .into_iter()
            .find(|kind| kind.is_triggered(ctx))?;

        let decision = kind.build(self.next_id, ctx);
        self.next_id += 1;
        debug!(
            "Generated decision {} ({:?}) in lap {}",
            decision.id, decision.kind, ctx.lap
        );
        Some(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::templates::tests::calm_context;

    #[test]
    fn calm_race_triggers_nothing() {
        let mut generator = DecisionGenerator::default();
        assert!(generator.check(&calm_context(60), None).is_none());
    }

    #[test]
    fn spacing_blocks_decisions_for_ten_laps() {
        let mut generator = DecisionGenerator::default();
        let mut ctx = calm_context(30);
        ctx.frustration = 80.0;

        assert!(generator.check(&ctx, Some(21)).is_none());
        ctx.lap = 31;
        assert!(generator.check(&ctx, Some(21)).is_some());
    }

    #[test]
    fn first_decision_needs_no_spacing() {
        let mut generator = DecisionGenerator::default();
        let mut ctx = calm_context(2);
        ctx.distraction = 65.0;
        assert!(generator.check(&ctx, None).is_some());
    }

    #[test]
    fn kinds_are_checked_in_priority_order() {
        let mut generator = DecisionGenerator::default();
        let mut ctx = calm_context(60);
        ctx.tire_wear = 45.0;
        ctx.laps_to_pit_window = 30;
        ctx.frustration = 90.0;
        ctx.laps_behind_same_driver = 15;

        let decision = generator.check(&ctx, None).unwrap();
        assert_eq!(decision.kind, DecisionKind::PitStrategy);

        ctx.lap = 40;
        let decision = generator.check(&ctx, None).unwrap();
        assert_eq!(decision.kind, DecisionKind::Passing);
    }

    #[test]
    fn decision_ids_increase() {
        let mut generator = DecisionGenerator::new(1);
        let mut ctx = calm_context(10);
        ctx.frustration = 90.0;

        let first = generator.check(&ctx, None).unwrap();
        ctx.lap = 11;
        let second = generator.check(&ctx, Some(10)).unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
    }
}
