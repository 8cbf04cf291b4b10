//! Position bookkeeping
//!
//! Opens positions for accepted entries (refusing duplicates per signal
//! and enforcing count and exposure limits), refreshes marks, and
//! realizes P&L on close. All P&L uses the standard options contract
//! multiplier.

use super::store::PositionStore;
use super::types::{Position, PositionStatus, CONTRACT_MULTIPLIER};
use crate::config::RiskConfig;
use crate::risk::RiskError;
use crate::signal::Signal;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Tracks open positions and computes P&L
pub struct PositionManager {
    store: Arc<dyn PositionStore>,
    max_open_positions: usize,
    max_exposure: Decimal,
}

impl PositionManager {
    /// Create a manager over `store` with the configured limits
    pub fn new(store: Arc<dyn PositionStore>, config: &RiskConfig) -> Self {
        Self {
            store,
            max_open_positions: config.max_open_positions,
            max_exposure: config.max_exposure,
        }
    }

    /// Open a position for an accepted entry decision
    ///
    /// Rejects when a non-closed position already exists for the signal,
    /// when the open-position count is at its limit, or when the added
    /// entry cost would exceed the exposure limit.
    pub async fn open_position(
        &self,
        signal: &Signal,
        entry_price: Decimal,
        quantity: i64,
    ) -> Result<Position, RiskError> {
        if let Some(existing) = self
            .store
            .get_by_signal(signal.id)
            .await
            .map_err(store_error)?
        {
            if existing.is_open() {
                return Err(RiskError::DuplicateEntry(signal.id));
            }
        }

        let open = self.store.open_positions().await.map_err(store_error)?;
        if open.len() >= self.max_open_positions {
            return Err(RiskError::MaxPositionsReached(self.max_open_positions));
        }

        let current_exposure: Decimal = open.iter().map(Position::entry_cost).sum();
        let additional = entry_price * Decimal::from(quantity) * CONTRACT_MULTIPLIER;
        if current_exposure + additional > self.max_exposure {
            return Err(RiskError::MaxExposureExceeded {
                current: current_exposure,
                additional,
                limit: self.max_exposure,
            });
        }

        let position = Position {
            id: Uuid::new_v4(),
            signal_id: signal.id,
            symbol: signal.symbol.clone(),
            timeframe: signal.timeframe.clone(),
            direction: signal.direction,
            quantity,
            entry_price,
            entry_time: Utc::now(),
            current_price: None,
            unrealized_pnl: None,
            exit_price: None,
            exit_time: None,
            realized_pnl: None,
            status: PositionStatus::Open,
        };

        self.store
            .insert(position.clone())
            .await
            .map_err(store_error)?;

        tracing::info!(
            position_id = %position.id,
            signal_id = %signal.id,
            symbol = %position.symbol,
            quantity,
            entry_price = %entry_price,
            "Opened position"
        );

        Ok(position)
    }

    /// Unrealized P&L of a position at `current_price`
    pub fn unrealized_pnl(position: &Position, current_price: Decimal) -> Decimal {
        (current_price - position.entry_price)
            * Decimal::from(position.quantity)
            * CONTRACT_MULTIPLIER
    }

    /// Update a position's mark and stored unrealized P&L
    pub async fn refresh_price(
        &self,
        id: Uuid,
        current_price: Decimal,
    ) -> Result<Position, RiskError> {
        let mut position = self
            .store
            .get(id)
            .await
            .map_err(store_error)?
            .ok_or(RiskError::PositionNotFound(id))?;

        if !position.is_open() {
            return Err(RiskError::PositionClosed(id));
        }

        position.current_price = Some(current_price);
        position.unrealized_pnl = Some(Self::unrealized_pnl(&position, current_price));
        self.store
            .update(position.clone())
            .await
            .map_err(store_error)?;

        Ok(position)
    }

    /// Close a position and return its realized P&L
    ///
    /// Closed positions are immutable afterwards.
    pub async fn close_position(&self, id: Uuid, exit_price: Decimal) -> Result<Decimal, RiskError> {
        let mut position = self
            .store
            .get(id)
            .await
            .map_err(store_error)?
            .ok_or(RiskError::PositionNotFound(id))?;

        if !position.is_open() {
            return Err(RiskError::PositionClosed(id));
        }

        let realized = Self::unrealized_pnl(&position, exit_price);
        position.exit_price = Some(exit_price);
        position.exit_time = Some(Utc::now());
        position.realized_pnl = Some(realized);
        position.status = PositionStatus::Closed;
        self.store.update(position).await.map_err(store_error)?;

        tracing::info!(position_id = %id, realized_pnl = %realized, "Closed position");

        Ok(realized)
    }

    /// All currently open positions
    pub async fn open_positions(&self) -> Result<Vec<Position>, RiskError> {
        self.store.open_positions().await.map_err(store_error)
    }

    /// The position opened by a signal, if any
    pub async fn position_for_signal(
        &self,
        signal_id: Uuid,
    ) -> Result<Option<Position>, RiskError> {
        self.store.get_by_signal(signal_id).await.map_err(store_error)
    }
}

fn store_error(e: anyhow::Error) -> RiskError {
    RiskError::Store(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::InMemoryPositionStore;
    use crate::signal::{Direction, SignalMetadata, SignalSource};
    use rust_decimal_macros::dec;

    fn make_signal() -> Signal {
        Signal::new(
            SignalSource::Tradingview,
            "SPY",
            Direction::Call,
            "15m",
            Utc::now(),
            SignalMetadata::default(),
        )
    }

    fn manager() -> PositionManager {
        PositionManager::new(Arc::new(InMemoryPositionStore::new()), &RiskConfig::default())
    }

    #[tokio::test]
    async fn test_open_position() {
        let m = manager();
        let signal = make_signal();

        let position = m.open_position(&signal, dec!(2.50), 4).await.unwrap();
        assert_eq!(position.signal_id, signal.id);
        assert_eq!(position.quantity, 4);
        assert!(position.is_open());
        assert_eq!(m.open_positions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_entry_rejected() {
        let m = manager();
        let signal = make_signal();

        m.open_position(&signal, dec!(2.50), 2).await.unwrap();
        let err = m.open_position(&signal, dec!(2.60), 2).await.unwrap_err();
        assert!(matches!(err, RiskError::DuplicateEntry(id) if id == signal.id));
    }

    #[tokio::test]
    async fn test_reentry_allowed_after_close() {
        let m = manager();
        let signal = make_signal();

        let position = m.open_position(&signal, dec!(2.50), 2).await.unwrap();
        m.close_position(position.id, dec!(3.00)).await.unwrap();

        // The prior position is closed, so the same signal may open again.
        assert!(m.open_position(&signal, dec!(2.80), 1).await.is_ok());
    }

    #[tokio::test]
    async fn test_unrealized_pnl_formula() {
        let store = Arc::new(InMemoryPositionStore::new());
        let config = RiskConfig {
            max_exposure: dec!(1000000),
            ..RiskConfig::default()
        };
        let m = PositionManager::new(store, &config);
        let signal = make_signal();
        let position = m.open_position(&signal, dec!(100), 10).await.unwrap();

        // (105 - 100) * 10 * 100 = 5000.
        assert_eq!(
            PositionManager::unrealized_pnl(&position, dec!(105)),
            dec!(5000)
        );
        // (97 - 100) * 10 * 100 = -3000.
        assert_eq!(
            PositionManager::unrealized_pnl(&position, dec!(97)),
            dec!(-3000)
        );
    }

    #[tokio::test]
    async fn test_refresh_price_updates_mark() {
        let store = Arc::new(InMemoryPositionStore::new());
        let config = RiskConfig {
            max_exposure: dec!(1000000),
            ..RiskConfig::default()
        };
        let m = PositionManager::new(store, &config);
        let signal = make_signal();
        let position = m.open_position(&signal, dec!(100), 10).await.unwrap();

        let updated = m.refresh_price(position.id, dec!(105)).await.unwrap();
        assert_eq!(updated.current_price, Some(dec!(105)));
        assert_eq!(updated.unrealized_pnl, Some(dec!(5000)));
    }

    #[tokio::test]
    async fn test_close_position_realizes_pnl() {
        let store = Arc::new(InMemoryPositionStore::new());
        let config = RiskConfig {
            max_exposure: dec!(1000000),
            ..RiskConfig::default()
        };
        let m = PositionManager::new(store, &config);
        let signal = make_signal();
        let position = m.open_position(&signal, dec!(100), 10).await.unwrap();

        let realized = m.close_position(position.id, dec!(105)).await.unwrap();
        assert_eq!(realized, dec!(5000));

        // Closed positions are immutable.
        let err = m.close_position(position.id, dec!(110)).await.unwrap_err();
        assert!(matches!(err, RiskError::PositionClosed(_)));
        let err = m.refresh_price(position.id, dec!(110)).await.unwrap_err();
        assert!(matches!(err, RiskError::PositionClosed(_)));
    }

    #[tokio::test]
    async fn test_max_open_positions_enforced() {
        let store = Arc::new(InMemoryPositionStore::new());
        let config = RiskConfig {
            max_open_positions: 2,
            ..RiskConfig::default()
        };
        let m = PositionManager::new(store, &config);

        m.open_position(&make_signal(), dec!(1), 1).await.unwrap();
        m.open_position(&make_signal(), dec!(1), 1).await.unwrap();
        let err = m
            .open_position(&make_signal(), dec!(1), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, RiskError::MaxPositionsReached(2)));
    }

    #[tokio::test]
    async fn test_max_exposure_enforced() {
        let store = Arc::new(InMemoryPositionStore::new());
        let config = RiskConfig {
            max_exposure: dec!(1000),
            ..RiskConfig::default()
        };
        let m = PositionManager::new(store, &config);

        // 2.50 * 2 * 100 = 500 held.
        m.open_position(&make_signal(), dec!(2.50), 2).await.unwrap();
        // Another 600 would exceed the 1000 limit.
        let err = m
            .open_position(&make_signal(), dec!(3.00), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, RiskError::MaxExposureExceeded { .. }));
    }

    #[tokio::test]
    async fn test_close_unknown_position() {
        let m = manager();
        let err = m.close_position(Uuid::new_v4(), dec!(1)).await.unwrap_err();
        assert!(matches!(err, RiskError::PositionNotFound(_)));
    }
}
