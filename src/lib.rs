//! An event-driven agent coordination core: typed event routing, async
//! fan-out dispatch, correlation-id aggregation, and an iterative
//! tool-using solver loop over a pluggable LLM gateway.
//!
//! The four coupled subsystems are [`router::Router`],
//! [`dispatcher::AsyncDispatcher`], [`aggregator::AsyncAggregator`], and
//! the solvers in [`solver`]; [`broker::Broker`] is the façade tying a
//! [`gateway::Gateway`] and [`tool::ToolRegistry`] together for the
//! solvers to drive.

pub mod aggregator;
pub mod broker;
pub mod chat_session;
pub mod config;
pub mod context_strategy;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod gateway;
pub mod message;
pub mod router;
pub mod solver;
pub mod tool;
pub mod tracer;

pub use aggregator::{AsyncAggregator, ReduceOutcome, Reducer};
pub use broker::Broker;
pub use chat_session::ChatSession;
pub use config::CoreConfig;
pub use dispatcher::{AsyncDispatcher, DispatcherConfig};
pub use error::{CoreError, ToolError};
pub use event::{Event, EventKind};
pub use gateway::Gateway;
pub use message::{CompletionConfig, GatewayResponse, Message, Role, ToolCall, ToolDefinition};
pub use router::{AsyncSubscriber, Router};
pub use solver::{GoalState, HistoryStep, Plan, ReactSolver, SimpleSolver, SolverOutcome};
pub use tool::{Tool, ToolRegistry, ToolResult};
pub use tracer::{NullTracer, Tracer};
