//! Context-window pipeline: token counting, budgeted history, conversion

pub mod convert;
pub mod counter;
pub mod history;

pub use convert::{
    HistoryFormat, MessageFormatConverter, ModelMessage, ModelRequest, ModelResponse,
    RequestPart, ResponsePart, TokenUsage,
};
pub use counter::{SubwordEstimator, TokenCounter, Tokenizer, TokenizerError};
pub use history::MessageHistoryProvider;
