//! Position persistence boundary
//!
//! The engine talks to positions through [`PositionStore`]; the
//! in-memory implementation backs tests and paper trading, while a
//! database-backed implementation can be substituted without touching
//! the decision path.

use super::types::{Position, PositionStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// CRUD over positions, keyed by id and by originating signal id
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Persist a new position
    async fn insert(&self, position: Position) -> anyhow::Result<()>;

    /// Replace an existing position
    async fn update(&self, position: Position) -> anyhow::Result<()>;

    /// Fetch by position id
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Position>>;

    /// Fetch the most recent position opened by a signal
    async fn get_by_signal(&self, signal_id: Uuid) -> anyhow::Result<Option<Position>>;

    /// All currently open positions
    async fn open_positions(&self) -> anyhow::Result<Vec<Position>>;
}

/// HashMap-backed store for tests and paper trading
pub struct InMemoryPositionStore {
    positions: RwLock<HashMap<Uuid, Position>>,
}

impl InMemoryPositionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            positions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryPositionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PositionStore for InMemoryPositionStore {
    async fn insert(&self, position: Position) -> anyhow::Result<()> {
        let mut positions = self.positions.write().await;
        positions.insert(position.id, position);
        Ok(())
    }

    async fn update(&self, position: Position) -> anyhow::Result<()> {
        let mut positions = self.positions.write().await;
        if !positions.contains_key(&position.id) {
            anyhow::bail!("position {} not found", position.id);
        }
        positions.insert(position.id, position);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Position>> {
        let positions = self.positions.read().await;
        Ok(positions.get(&id).cloned())
    }

    async fn get_by_signal(&self, signal_id: Uuid) -> anyhow::Result<Option<Position>> {
        let positions = self.positions.read().await;
        Ok(positions
            .values()
            .filter(|p| p.signal_id == signal_id)
            .max_by_key(|p| p.entry_time)
            .cloned())
    }

    async fn open_positions(&self) -> anyhow::Result<Vec<Position>> {
        let positions = self.positions.read().await;
        Ok(positions
            .values()
            .filter(|p| p.status == PositionStatus::Open)
            .cloned()
            .collect())
    }
}
