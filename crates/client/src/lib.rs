//! KDDart DAL client: session handling, request signing and response
//! normalization.
//!
//! The client owns one session against one DAL service. Operations are
//! async and never fail outright: transport problems, server errors and
//! local precondition failures all come back as a [`DalResponse`].
//!
//! No GUI concepts. No retries. No request queue.

pub mod client;
pub mod dal_util;
pub mod events;
pub mod guard;
pub mod params;
pub mod response;
pub mod session;
pub mod signature;
pub mod transport;

pub use client::{ClientError, DalClient};
pub use dalclient_config::ResponseFormat;
pub use events::SessionEvent;
pub use params::Params;
pub use response::{
    DalResponse, ErrorResponse, JsonResponse, RecordSource, ResponseMeta, RowData, TagSelection,
    XmlResponse,
};
pub use session::{Identity, SessionPhase};
pub use transport::{HttpMethod, HttpRequest, ReqwestTransport, Transport, TransportOutcome};
