//! Sequential population of agents drawn round by round

use tracing::debug;

use crate::{Error, Result, agents::AgentBatch};

/// Ordered pool of agents with a monotone cursor.
///
/// Each call to [`next_batch`](Self::next_batch) hands out the next block of
/// unseen rows, so batches drawn from one distribution never overlap. The
/// cursor never wraps.
#[derive(Debug, Clone)]
pub struct SequentialPopulationDistribution {
    pool: AgentBatch,
    cursor: usize,
}

impl SequentialPopulationDistribution {
    pub fn new(pool: AgentBatch) -> Self {
        debug!(agents = pool.len(), "population pool created");
        Self { pool, cursor: 0 }
    }

    /// Take the next `n` agents.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolExhausted`] when fewer than `n` agents remain. The
    /// cursor is left where it was.
    pub fn next_batch(&mut self, n: usize) -> Result<AgentBatch> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(Error::PoolExhausted {
                requested: n,
                remaining,
            });
        }
        let batch = self.pool.slice(self.cursor, self.cursor + n);
        self.cursor += n;
        Ok(batch)
    }

    /// Check up front that `rounds` draws of `per_round` agents fit in the pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InsufficientPool`] otherwise.
    pub fn ensure_capacity(&self, rounds: usize, per_round: usize) -> Result<()> {
        let needed = rounds.checked_mul(per_round);
        match needed {
            Some(needed) if needed <= self.remaining() => Ok(()),
            _ => Err(Error::InsufficientPool {
                available: self.remaining(),
                rounds,
                per_round,
            }),
        }
    }

    pub fn remaining(&self) -> usize {
        self.pool.len() - self.cursor
    }

    pub fn consumed(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }
}
