//! Crate-wide tunables, following `CloudLLMConfig`'s convention: a plain
//! struct with a manual `Default` impl, no configuration-file parser.

use std::time::Duration;

use crate::dispatcher::DispatcherConfig;

/// Default iteration cap for [`crate::solver::ReactSolver`].
pub const DEFAULT_REACT_MAX_ITERATIONS: usize = 10;

/// Default iteration cap for [`crate::solver::SimpleSolver`].
pub const DEFAULT_SIMPLE_SOLVER_MAX_ITERATIONS: usize = 5;

#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub max_iterations: usize,
    pub call_timeout: Duration,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            max_iterations: DEFAULT_REACT_MAX_ITERATIONS,
            call_timeout: Duration::from_secs(60),
        }
    }
}

/// Top-level configuration for an embedding application wiring up the
/// coordination core.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub dispatcher: DispatcherConfig,
    pub solver: SolverConfig,
    /// Default deadline for [`crate::aggregator::AsyncAggregator::wait_for_events`]
    /// calls that don't specify their own.
    pub aggregator_wait_timeout: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        CoreConfig {
            dispatcher: DispatcherConfig::default(),
            solver: SolverConfig::default(),
            aggregator_wait_timeout: Duration::from_secs(30),
        }
    }
}
