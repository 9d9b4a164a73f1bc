//! Dispatch of task requests to the active strategy.

use crate::strategies::{Strategy, StrategyResult, TaskRequest};
use sift_core::{AppError, AppResult};
use tracing::Instrument;

/// Holds at most one [`Strategy`] and forwards requests to it.
#[derive(Debug, Default)]
pub struct TaskProcessor {
    strategy: Option<Strategy>,
}

impl TaskProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(strategy: Strategy) -> Self {
        let mut processor = Self::new();
        processor.set_strategy(strategy);
        processor
    }

    /// Replace the active strategy.
    pub fn set_strategy(&mut self, strategy: Strategy) {
        let old = self
            .strategy
            .as_ref()
            .map(|s| s.kind().to_string())
            .unwrap_or_else(|| "none".to_string());
        tracing::info!("Strategy changed: {} -> {}", old, strategy.kind());
        self.strategy = Some(strategy);
    }

    pub fn strategy(&self) -> Option<&Strategy> {
        self.strategy.as_ref()
    }

    pub fn strategy_mut(&mut self) -> Option<&mut Strategy> {
        self.strategy.as_mut()
    }

    /// Remove and return the active strategy.
    pub fn take_strategy(&mut self) -> Option<Strategy> {
        self.strategy.take()
    }

    /// Run `request` on the active strategy.
    ///
    /// # Errors
    /// `AppError::NoStrategy` if none is set; `AppError::Task` if the request
    /// is for a different strategy; otherwise whatever the strategy returns.
    pub async fn execute_task(&self, request: TaskRequest) -> AppResult<StrategyResult> {
        let strategy = self.strategy.as_ref().ok_or(AppError::NoStrategy)?;

        let span = tracing::info_span!("task", strategy = %strategy.kind());
        tracing::debug!("Executing {} request", request.kind());

        strategy.run(request).instrument(span).await
    }
}
