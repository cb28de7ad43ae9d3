//! The agent loop: the heart of Loopwright.
//!
//! One `send` runs a bounded sequence of rounds:
//!
//! 1. **Stream** a model response, forwarding text as it arrives
//! 2. **Collect** tool calls, reassembled from positional fragments
//! 3. **Execute** them in declared order and append the results
//! 4. **Repeat** until a round has no tool calls or the round cap is hit
//!
//! Cancellation is cooperative and leaves history as it was before the
//! interrupted round began.

pub mod loop_runner;
pub mod round;
pub mod session;
pub mod stream_event;

pub use loop_runner::{AgentLoop, DEFAULT_MAX_ROUNDS, DEFAULT_SYSTEM_PROMPT};
pub use round::{RoundAccumulator, RoundResult, run_round};
pub use session::{ChatSession, SessionHandle, TurnOutcome};
pub use stream_event::AgentEvent;
