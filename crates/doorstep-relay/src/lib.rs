pub mod dispatcher;
pub mod envelope;
pub mod inbound;

pub use dispatcher::{RelayDispatcher, RelayFailure, RelayOutcome, RelaySettings};
pub use envelope::{ClientMeta, OutboundEnvelope, VisitorSubmission};
pub use inbound::{OperatorReply, parse_operator_reply};

/// Line prefix carried in every relayed payload so operator replies can be
/// routed back to the originating session.
pub(crate) const SESSION_MARKER: &str = "Session:";
