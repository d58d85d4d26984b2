//! Testing infrastructure for tickwatch.
//!
//! - **Traits**: Abstractions for the status query, action dispatch, and
//!   the pause between cycles
//! - **Mocks**: Scripted and recording test doubles for those traits
//!
//! # Example
//!
//! ```rust,ignore
//! use tickwatch::testing::{MockDispatcher, MockSleeper, MockStatusSource};
//!
//! let source = MockStatusSource::new().with_repeated_report(960, 1, 0, 4);
//! let dispatcher = MockDispatcher::new();
//! let sleeper = MockSleeper::new();
//! ```

pub mod mocks;
pub mod traits;

// Re-export commonly used types
pub use mocks::*;
pub use traits::*;
