/*!
 * Line-by-line subtitle translation over a chat-completion service.
 *
 * This module contains the translation pipeline. It is split into several submodules:
 *
 * - `response`: Immutable record of one exchange and its audit dump
 * - `session`: Dialogue history and single-request exchanges
 * - `rate_budget`: Fixed-window token accounting with cooldown
 * - `context`: Run-wide state passed to every file
 * - `progress`: ETA tracking and progress bar
 * - `orchestrator`: Per-file loop, retry policy and batch processing
 */

// Re-export main types for easier usage
pub use self::context::RunContext;
pub use self::orchestrator::{BatchSummary, FileReport, FileState, Orchestrator, RetryPolicy, TranslationOptions};
pub use self::rate_budget::{BudgetAction, RateBudget};
pub use self::response::ResponseRecord;
pub use self::session::{CandidateSelector, ConversationSession, Exchange, FirstCandidate, SamplingParams};

// Submodules
pub mod context;
pub mod orchestrator;
pub mod progress;
pub mod rate_budget;
pub mod response;
pub mod session;
