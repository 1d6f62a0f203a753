//! The line-oriented wire protocol: a bounded byte-accumulator, a whitespace
//! tokenizer, and the command dispatcher that ties both to the rest of the
//! crate's state.

pub mod dispatch;
pub mod line;
pub mod token;

pub use dispatch::{DispatchContext, Dispatcher, Response};
pub use line::{LineBuffer, LineEvent, LINE_CAPACITY};
pub use token::{tokenize, MAX_TOKENS};
