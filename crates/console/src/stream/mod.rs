//! Stream-side processing: classifying raw transport events and
//! accumulating partial tool-call arguments.

mod accumulator;
mod classifier;

#[cfg(test)]
mod accumulator_tests;
#[cfg(test)]
pub(crate) mod test_utils;

pub use accumulator::{AccumulatedToolCall, ArgumentAccumulator};
pub use classifier::{classify, AgentEvent, ToolCallFragment, ToolPhase};
