//! Google Cloud REST backends. Auth is via API key in a query parameter.

pub mod gemini;
pub mod language;
pub mod speech;
pub mod tts;

pub use gemini::GeminiModel;
pub use language::GoogleSentiment;
pub use speech::GoogleSpeech;
pub use tts::GoogleTts;
