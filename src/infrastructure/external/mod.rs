pub mod google_speech;
pub mod google_speech_adapter;

pub use google_speech::GoogleSpeechClient;
pub use google_speech_adapter::GoogleSpeechAdapter;
