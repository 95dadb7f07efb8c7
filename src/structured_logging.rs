//! Structured logging for creation runs

use crate::observability::{LogLevel, LogLine};
use crate::orchestrator::CreationState;

/// Emits run-scoped `tracing` events tagged with the run's correlation ID
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    context_id: String,
}

impl StructuredLogger {
    pub fn new(context_id: String) -> Self {
        Self { context_id }
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    pub fn log_line(&self, line: &LogLine) {
        match line.level {
            LogLevel::Info => tracing::info!(
                context_id = %self.context_id,
                state = %line.state,
                "{}",
                line.message
            ),
            LogLevel::Warn => tracing::warn!(
                context_id = %self.context_id,
                state = %line.state,
                "{}",
                line.message
            ),
            LogLevel::Error => tracing::error!(
                context_id = %self.context_id,
                state = %line.state,
                "{}",
                line.message
            ),
        }
    }

    pub fn log_state_transition(&self, from: CreationState, to: CreationState) {
        tracing::debug!(
            context_id = %self.context_id,
            from = %from,
            to = %to,
            "State transition"
        );
    }

    pub fn log_endpoint_probe(
        &self,
        url: &str,
        success: bool,
        latency_ms: u64,
        height: Option<u64>,
    ) {
        tracing::debug!(
            context_id = %self.context_id,
            url = %url,
            success = %success,
            latency_ms = %latency_ms,
            block_height = ?height,
            "Endpoint probe"
        );
    }

    pub fn log_step_submitted(&self, index: usize, step: &str, blockhash: &str) {
        tracing::debug!(
            context_id = %self.context_id,
            index = %index,
            step = %step,
            blockhash = %blockhash,
            "Submitting transaction step"
        );
    }

    pub fn log_step_confirmed(&self, index: usize, step: &str, signature: &str, latency_ms: u64) {
        tracing::debug!(
            context_id = %self.context_id,
            index = %index,
            step = %step,
            signature = %signature,
            latency_ms = %latency_ms,
            "Transaction step confirmed"
        );
    }

    pub fn log_step_failed(&self, index: usize, step: &str, error: &str) {
        tracing::warn!(
            context_id = %self.context_id,
            index = %index,
            step = %step,
            error = %error,
            "Transaction step failed"
        );
    }

    pub fn log_run_finished(&self, success: bool, mint: Option<&str>, elapsed_ms: u64) {
        tracing::info!(
            context_id = %self.context_id,
            success = %success,
            mint = ?mint,
            elapsed_ms = %elapsed_ms,
            "Creation run finished"
        );
    }
}
