pub mod aggregator;
pub mod pipeline;
pub mod post;
pub mod resolver;

pub use aggregator::{Aggregator, Batch, BatchSink, Event, Submitted};
pub use pipeline::{CuratorCommand, IntakePipeline, IntakeReport};
pub use post::{ChannelPost, MediaAttachment};
