//! Pipeline stages for page-to-Markdown extraction.
//!
//! Each submodule implements exactly one transformation step, so each is
//! testable on its own and the renderer never needs a browser to be tested.
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──▶ extract ──▶ node ──▶ render ──▶ normalize
//! (driver)  (root/sections) (typed tree) (tag dispatch) (cleanup)
//!                                 │
//!                                 ├─▶ table   (pipe tables)
//!                                 └─▶ decode  (percent-encoded code)
//! ```
//!
//! 1. [`fetch`]    : navigate, wait, capture; retry with exponential
//!    backoff. The only stage with network I/O
//! 2. [`extract`]  : choose the content root and sections per site profile
//! 3. [`node`]     : map the parsed DOM into [`node::Element`] values with a
//!    resolved [`node::Tag`]
//! 4. [`render`]   : recursive, exhaustive tag dispatch into raw Markdown
//! 5. [`table`]    : ragged-tolerant `<table>` conversion
//! 6. [`decode`]   : fail-soft percent-decoding of embedded code samples
//! 7. [`normalize`]: deterministic, idempotent whitespace cleanup

pub mod decode;
pub mod extract;
pub mod fetch;
pub mod node;
pub mod normalize;
pub mod render;
pub mod table;
