use async_trait::async_trait;
use tokio::sync::mpsc;

/// Delivery failure for a single payload. Non-fatal to the scheduler:
/// the booking is logged and skipped, never retried within the tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The queue consumer is gone.
    Closed,
    /// Bounded queue is full (backpressure).
    QueueFull,
}

impl std::fmt::Display for PublishError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishError::Closed => write!(f, "publish queue closed"),
            PublishError::QueueFull => write!(f, "publish queue full"),
        }
    }
}

impl std::error::Error for PublishError {}

/// Hands a serialized booking to the message broker. Fire-and-forget:
/// success or error, no further acknowledgment contract.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, payload: &[u8]) -> Result<(), PublishError>;
}

/// In-process queue publisher over a bounded channel. The consumer half
/// is handed out at construction; a broker-backed implementation slots
/// in behind the same trait.
pub struct QueuePublisher {
    tx: mpsc::Sender<Vec<u8>>,
}

impl QueuePublisher {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Publisher for QueuePublisher {
    async fn publish(&self, payload: &[u8]) -> Result<(), PublishError> {
        self.tx.try_send(payload.to_vec()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PublishError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => PublishError::Closed,
        })
    }
}
