//! Exception and priority resolution.
//!
//! Rule outcomes are a closed set of variants so every resolution path is
//! handled exhaustively. Policies are pure: they only look at the rule set
//! and the current round's candidates.

mod policies;
mod resolver;

pub use policies::ExceptionTieBreak;
pub use resolver::{resolve_exceptions, RuleOutcome};
