//! Domain types shared by every layer.

mod destination;
mod exit;
mod naming;
mod request;
mod state;
mod stream_id;

pub use destination::{Destination, DestinationError, Platform};
pub use exit::{ExitReason, ExitReport};
pub use naming::{DEFAULT_JOB_PREFIX, JobNaming, NamingError};
pub use request::{BroadcastRequest, StreamSnapshot};
pub use state::{InvalidTransition, JobState};
pub use stream_id::{MAX_STREAM_ID_LEN, StreamId, StreamIdError};
