pub mod command_handler;
pub mod playback_coordinator;
pub mod service_container;
pub mod session;
pub mod state_machine;
pub mod traits;
pub mod transcription_orchestrator;

pub use command_handler::CommandHandler;
pub use playback_coordinator::{PlaybackConfig, PlaybackCoordinator, PlaybackEvent};
pub use service_container::{AppConfig, ServiceContainer};
pub use session::{Session, StatusSnapshot};
pub use state_machine::{RecordingState, RecordingStateMachine, StateEvent};
pub use transcription_orchestrator::{TranscriptionConfig, TranscriptionOrchestrator};
