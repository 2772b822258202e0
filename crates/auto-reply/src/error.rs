#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("refusing to enqueue an empty chunk")]
    EmptyChunk,

    #[error("delivery queue is full ({capacity} pending)")]
    Full { capacity: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Channel(#[from] ringle_channels::Error),

    #[error(transparent)]
    Memory(#[from] ringle_memory::MemoryError),
}

pub type Result<T> = std::result::Result<T, Error>;
