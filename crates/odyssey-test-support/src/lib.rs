//! Shared test mocks and utilities for the Odyssey session engine.

mod audio;
mod clock;
mod generator;
mod store;
mod stream;

pub use audio::{AudioCall, RecordingAudio};
pub use clock::{FixedClock, ManualClock, RecordingSleeper};
pub use generator::ScriptedGenerator;
pub use store::{FailingStore, QuotaStore};
pub use stream::{RecordingStream, StreamCall};
