//! Decision orchestrator
//!
//! The single authoritative decision engine. Entry evaluation layers
//! confidence adjustments from market context, dealer positioning, and
//! gamma exposure on top of a configured base, clamps to [0, 100], and
//! runs the sizing chain for accepted signals. Exit evaluation walks a
//! fixed priority order and stops at the first firing check.

use super::types::{
    Entry, EntryCalculations, EntryDecision, Exit, ExitCalculations, ExitDecision, ExitReason,
};
use crate::config::Config;
use crate::market::{ContextCache, GexService};
use crate::position::{Position, PositionManager};
use crate::risk::{PositionSizingService, RiskManager};
use crate::signal::{ConfluenceCalculator, Signal};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

/// Composes caches, risk, sizing, and confluence into decisions
pub struct DecisionOrchestrator {
    context_cache: Arc<ContextCache>,
    gex: Arc<GexService>,
    risk: Arc<RiskManager>,
    sizing: Arc<PositionSizingService>,
    confluence: ConfluenceCalculator,
    base_confidence: Decimal,
    min_confidence: Decimal,
    profit_target_pct: Decimal,
    stop_loss_pct: Decimal,
    max_hold: Duration,
}

impl DecisionOrchestrator {
    /// Build an orchestrator over its collaborators
    pub fn new(
        context_cache: Arc<ContextCache>,
        gex: Arc<GexService>,
        risk: Arc<RiskManager>,
        sizing: Arc<PositionSizingService>,
        config: &Config,
    ) -> Self {
        Self {
            context_cache,
            gex,
            risk,
            sizing,
            confluence: ConfluenceCalculator::default(),
            base_confidence: config.confidence.base_confidence,
            min_confidence: config.confidence.min_confidence,
            profit_target_pct: config.exit.profit_target_pct,
            stop_loss_pct: config.exit.stop_loss_pct,
            max_hold: Duration::hours(config.exit.max_hold_hours),
        }
    }

    /// Evaluate a validated signal for entry
    ///
    /// `recent` supplies same-symbol signals for confluence scoring. A
    /// context outage rejects the signal; a missing GEX reading merely
    /// drops that adjustment.
    pub async fn decide_entry(&self, signal: &Signal, recent: &[Signal]) -> EntryDecision {
        let mut reasoning = Vec::new();
        let mut calc = EntryCalculations {
            base_confidence: self.base_confidence,
            ..EntryCalculations::default()
        };

        let context = match self.context_cache.get_context().await {
            Ok(context) => context,
            Err(e) => {
                // No usable context, not even stale: reject rather than
                // decide against a silent default.
                reasoning.push(format!("market context unavailable: {e}"));
                return self.reject(signal, reasoning, calc);
            }
        };
        reasoning.push(format!(
            "market context: volatility {} trend {:?} regime {:?}",
            context.volatility, context.trend, context.regime
        ));

        let filters = self.risk.apply_market_filters(signal, &context);

        let gex_signal = self
            .gex
            .latest_signal(&signal.symbol, &signal.timeframe)
            .await;

        let confluence = self.confluence.calculate(signal, recent);
        calc.confluence_score = Some(confluence.score);
        reasoning.push(format!(
            "confluence {:?}: {} agreeing, {} disagreeing",
            confluence.category,
            confluence.agreeing.len(),
            confluence.disagreeing.len()
        ));

        calc.context_adjustment = self.risk.context_adjustment(signal, &context);
        reasoning.push(format!("context adjustment {:+}", calc.context_adjustment));

        calc.positioning_adjustment = self.risk.positioning_adjustment(signal, &context);
        reasoning.push(format!(
            "positioning adjustment {:+}",
            calc.positioning_adjustment
        ));

        match &gex_signal {
            Some(gex) => {
                let weight = self.gex.effective_weight(gex);
                calc.gex_weight = Some(weight);
                calc.gex_adjustment = self.risk.gex_adjustment(signal, gex, weight);
                reasoning.push(format!(
                    "gex adjustment {:+} (weight {})",
                    calc.gex_adjustment, weight
                ));
            }
            None => {
                reasoning.push("no gamma exposure data, proceeding without".to_string());
            }
        }

        calc.raw_confidence = calc.base_confidence
            + calc.context_adjustment
            + calc.positioning_adjustment
            + calc.gex_adjustment;
        calc.final_confidence = calc.raw_confidence.clamp(Decimal::ZERO, dec!(100));
        reasoning.push(format!(
            "confidence {} (raw {})",
            calc.final_confidence, calc.raw_confidence
        ));

        if !filters.passed {
            let reason = filters
                .rejection_reason
                .unwrap_or_else(|| "market filter failed".to_string());
            reasoning.push(reason);
            return self.reject(signal, reasoning, calc);
        }

        if calc.final_confidence < self.min_confidence {
            reasoning.push(format!(
                "confidence {} below minimum {}",
                calc.final_confidence, self.min_confidence
            ));
            return self.reject(signal, reasoning, calc);
        }

        let sizing = self
            .sizing
            .calculate(calc.final_confidence, &context, confluence.category);
        let chain_size = sizing.size;
        calc.sizing = Some(sizing.calculations);
        calc.risk_size_multiplier = Some(filters.position_size_multiplier);

        let final_size = (Decimal::from(chain_size) * filters.position_size_multiplier)
            .floor()
            .to_i64()
            .unwrap_or(0)
            .max(0);
        calc.final_size = final_size;
        reasoning.push(format!(
            "size {} after risk multiplier {} (chain size {})",
            final_size, filters.position_size_multiplier, chain_size
        ));

        if final_size < self.sizing.min_size() {
            reasoning.push(format!(
                "size {} below minimum {}",
                final_size,
                self.sizing.min_size()
            ));
            return self.reject(signal, reasoning, calc);
        }

        EntryDecision {
            decision: Entry::Enter,
            signal: signal.clone(),
            confidence: calc.final_confidence,
            size: final_size,
            reasoning,
            calculations: calc,
        }
    }

    fn reject(
        &self,
        signal: &Signal,
        reasoning: Vec<String>,
        calculations: EntryCalculations,
    ) -> EntryDecision {
        EntryDecision {
            decision: Entry::Reject,
            signal: signal.clone(),
            confidence: calculations.final_confidence,
            size: 0,
            reasoning,
            calculations,
        }
    }

    /// Evaluate an open position for exit at the current price
    pub async fn decide_exit(&self, position: &Position, current_price: Decimal) -> ExitDecision {
        self.decide_exit_at(position, current_price, Utc::now())
            .await
    }

    /// Clock-injected variant of [`decide_exit`](Self::decide_exit)
    ///
    /// Checks run in fixed priority: profit target, stop loss, GEX flip
    /// against the held direction, maximum hold time. The first match
    /// wins; ties resolve by this order, never by magnitude.
    pub async fn decide_exit_at(
        &self,
        position: &Position,
        current_price: Decimal,
        now: DateTime<Utc>,
    ) -> ExitDecision {
        let unrealized_pnl = PositionManager::unrealized_pnl(position, current_price);
        let entry_cost = position.entry_cost();
        let pnl_pct = if entry_cost > Decimal::ZERO {
            unrealized_pnl / entry_cost * dec!(100)
        } else {
            Decimal::ZERO
        };
        let held = now - position.entry_time;

        let flip = self
            .gex
            .detect_flip(&position.symbol, &position.timeframe)
            .await;
        let flip_against = flip.has_flipped
            && flip.current_direction == Some(position.direction.opposite());

        let calc = ExitCalculations {
            unrealized_pnl,
            pnl_pct,
            held_hours: held.num_hours(),
            profit_target_hit: pnl_pct >= self.profit_target_pct,
            stop_loss_hit: pnl_pct <= -self.stop_loss_pct,
            gex_flip_against: flip_against,
            max_hold_exceeded: held > self.max_hold,
        };

        let mut reasoning = vec![format!(
            "unrealized pnl {} ({}% of entry cost)",
            unrealized_pnl,
            pnl_pct.round_dp(2)
        )];

        let reason = if calc.profit_target_hit {
            reasoning.push(format!(
                "profit target {}% reached",
                self.profit_target_pct
            ));
            Some(ExitReason::ProfitTarget)
        } else if calc.stop_loss_hit {
            reasoning.push(format!("stop loss {}% breached", self.stop_loss_pct));
            Some(ExitReason::StopLoss)
        } else if calc.gex_flip_against {
            reasoning.push(format!(
                "gex flipped against held {:?}",
                position.direction
            ));
            Some(ExitReason::GexFlip)
        } else if calc.max_hold_exceeded {
            reasoning.push(format!(
                "held {}h, beyond maximum {}h",
                calc.held_hours,
                self.max_hold.num_hours()
            ));
            Some(ExitReason::MaxHoldTime)
        } else {
            reasoning.push("no exit condition met".to_string());
            None
        };

        ExitDecision {
            decision: if reason.is_some() { Exit::Exit } else { Exit::Hold },
            position_id: position.id,
            reason,
            reasoning,
            calculations: calc,
        }
    }
}
