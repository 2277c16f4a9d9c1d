pub mod highlight;
pub mod recorder;
pub mod transcript;

pub use highlight::highlight_for;
pub use recorder::Recorder;
pub use transcript::{
    TranscribedWord, WordAlternative, WordSegment, flatten_segments, joined_text,
};
