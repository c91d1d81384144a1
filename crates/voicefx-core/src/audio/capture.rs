//! Contract for the microphone side of the system.

use crate::{Analyser, CoreResult};

use std::future::Future;

use tokio::sync::mpsc;

/// Event emitted by an active capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// Next piece of encoded audio, in capture order.
    Chunk(Vec<u8>),
    /// Terminal event; emitted exactly once per capture.
    Stopped,
}

/// Live audio input plus incremental encoding into container chunks.
///
/// Implementations must deliver chunks in capture order on the event
/// channel and follow them with exactly one [`CaptureEvent::Stopped`]
/// once [`CaptureDevice::end_capture`] is called. Chunks may be held back
/// until the capture ends when the container header needs the final length.
pub trait CaptureDevice: Send + Sync + 'static {
    /// Handle to an open input stream; clones refer to the same stream.
    type Stream: Clone + Send + Sync + 'static;

    /// Handle to one in-progress capture.
    type Capture: Send + 'static;

    /// Media type of the container the chunks concatenate into.
    fn media_type(&self) -> &'static str;

    /// Opens the input stream, prompting for access if the platform does.
    fn acquire_stream(&self) -> impl Future<Output = CoreResult<Self::Stream>> + Send;

    /// Starts encoding the stream; chunks and the stop event go to `events`.
    fn begin_capture(
        &self,
        stream: &Self::Stream,
        events: mpsc::UnboundedSender<CaptureEvent>,
    ) -> CoreResult<Self::Capture>;

    /// Requests the capture to finish. The stop event arrives asynchronously.
    fn end_capture(&self, capture: Self::Capture);

    /// Feeds raw input samples to `analyser` for as long as it is alive.
    fn attach_analyser(&self, stream: &Self::Stream, analyser: &Analyser) -> CoreResult<()>;
}
