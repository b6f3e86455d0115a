//! Track download pipeline

pub mod error;
pub mod quality;
pub mod scheduler;
pub mod stream;
pub mod task;

pub use error::TrackError;
pub use quality::QualityTier;
pub use scheduler::Scheduler;
pub use stream::PlainStream;
