//! Error handling foundation for chatrelay.
//!
//! Only the `Result` alias lives here. Domain errors (`LlmError`,
//! `DispatchError`, ...) are defined next to the code that raises them and
//! travel inside a rootcause `Report`, so a failure logged at the dispatch
//! boundary still carries the provider detail that caused it.

use rootcause::Report;

/// Result alias over rootcause's `Report`, parameterized by the domain
/// error carried as the report's context.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
