// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Partial result accumulation
//!
//! Engine workers stream partial results into one [`ResultCollector`]. All
//! state sits behind a single lock. The first error, or the last completed
//! part, locks the sink and delivers the outcome exactly once; anything
//! arriving after that is refused.

use super::error::{ExecutionError, ExecutionResult};
use crate::pattern::Literal;
use parking_lot::Mutex;
use tokio::sync::oneshot;

/// One output row, in result schema column order
pub type ResultRow = Vec<Literal>;

pub type Delivery = ExecutionResult<Vec<ResultRow>>;

#[derive(Debug)]
struct CollectorState {
    rows: Vec<ResultRow>,
    expected_parts: usize,
    completed_parts: usize,
    locked: bool,
    sender: Option<oneshot::Sender<Delivery>>,
}

#[derive(Debug)]
pub struct ResultCollector {
    state: Mutex<CollectorState>,
}

impl ResultCollector {
    /// Collector waiting for `expected_parts` completed parts, and the
    /// receiver its single delivery goes to
    pub fn new(expected_parts: usize) -> (Self, oneshot::Receiver<Delivery>) {
        let (sender, receiver) = oneshot::channel();
        let collector = Self {
            state: Mutex::new(CollectorState {
                rows: Vec::new(),
                expected_parts,
                completed_parts: 0,
                locked: false,
                sender: Some(sender),
            }),
        };
        (collector, receiver)
    }

    /// Decode a bincode-encoded batch of rows and append it
    pub fn accept(&self, payload: &[u8]) -> ExecutionResult<()> {
        let mut state = self.state.lock();
        if state.locked {
            return Err(ExecutionError::SinkLocked);
        }
        match bincode::deserialize::<Vec<ResultRow>>(payload) {
            Ok(rows) => {
                state.rows.extend(rows);
                Ok(())
            }
            Err(e) => {
                let error = ExecutionError::Decode(e.to_string());
                Self::lock_with(&mut state, Err(error.clone()));
                Err(error)
            }
        }
    }

    pub fn accept_rows(&self, rows: Vec<ResultRow>) -> ExecutionResult<()> {
        let mut state = self.state.lock();
        if state.locked {
            return Err(ExecutionError::SinkLocked);
        }
        state.rows.extend(rows);
        Ok(())
    }

    /// Mark one part finished. Delivers the rows when every part is done.
    pub fn complete_part(&self) -> ExecutionResult<()> {
        let mut state = self.state.lock();
        if state.locked {
            return Err(ExecutionError::SinkLocked);
        }
        state.completed_parts += 1;
        if state.completed_parts >= state.expected_parts {
            let rows = std::mem::take(&mut state.rows);
            log::debug!("all {} parts complete, delivering {} rows", state.expected_parts, rows.len());
            Self::lock_with(&mut state, Ok(rows));
        }
        Ok(())
    }

    /// Lock the sink with `error`. Returns false if it was already locked.
    pub fn fail(&self, error: ExecutionError) -> bool {
        let mut state = self.state.lock();
        if state.locked {
            return false;
        }
        log::warn!("result collection failed: {}", error);
        state.rows.clear();
        Self::lock_with(&mut state, Err(error));
        true
    }

    pub fn is_locked(&self) -> bool {
        self.state.lock().locked
    }

    fn lock_with(state: &mut CollectorState, delivery: Delivery) {
        state.locked = true;
        if let Some(sender) = state.sender.take() {
            // the caller may have stopped waiting
            let _ = sender.send(delivery);
        }
    }
}

/// Encode rows the way [`ResultCollector::accept`] expects them
pub fn encode_rows(rows: &[ResultRow]) -> ExecutionResult<Vec<u8>> {
    bincode::serialize(rows).map_err(|e| ExecutionError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivers_once_after_all_parts() {
        let (collector, mut receiver) = ResultCollector::new(2);
        collector
            .accept(&encode_rows(&[vec![Literal::Int(1)]]).unwrap())
            .unwrap();
        collector.complete_part().unwrap();
        assert!(receiver.try_recv().is_err());

        collector.accept_rows(vec![vec![Literal::Int(2)]]).unwrap();
        collector.complete_part().unwrap();
        let rows = receiver.try_recv().unwrap().unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!(collector.accept_rows(vec![]), Err(ExecutionError::SinkLocked));
        assert_eq!(collector.complete_part(), Err(ExecutionError::SinkLocked));
        assert!(!collector.fail(ExecutionError::Timeout(1)));
    }

    #[test]
    fn test_decode_error_locks_sink() {
        let (collector, mut receiver) = ResultCollector::new(1);
        collector.accept_rows(vec![vec![Literal::Bool(true)]]).unwrap();
        let err = collector.accept(&[0xff, 0xff, 0xff]).unwrap_err();
        assert!(matches!(err, ExecutionError::Decode(_)));
        assert!(collector.is_locked());
        assert!(matches!(
            receiver.try_recv().unwrap(),
            Err(ExecutionError::Decode(_))
        ));
        assert_eq!(
            collector.accept(&encode_rows(&[]).unwrap()),
            Err(ExecutionError::SinkLocked)
        );
    }
}
