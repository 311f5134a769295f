//! Text-generation providers.

mod openai;
mod types;

pub use openai::OpenAiClient;
