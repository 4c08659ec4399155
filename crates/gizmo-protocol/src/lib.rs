//! Wire contract between the Gizmo host and its remote controllers.
//!
//! The protocol is a stream of newline-delimited frames. Each frame carries a
//! JSON [`Envelope`] of the form `{"type": <tag>, "payload": <base64>}` where
//! the payload is itself the base64 encoding of a JSON body whose shape
//! depends on the tag. Keeping the outer shape uniform lets peers skip or
//! reject messages they do not understand without parsing their bodies.
//!
//! - [`framing`] splits byte streams into frames and terminates outgoing ones.
//! - [`envelope`] handles the outer shape and the opaque payload encoding.
//! - [`messages`] catalogues every request and response body.
//! - [`model`] defines the pages, executors, actions and apps being edited.

pub mod envelope;
pub mod framing;
pub mod messages;
pub mod model;

pub use envelope::{
    DecodeError, EncodeError, Envelope, PayloadError, decode_payload, encode_payload,
};
pub use framing::{
    FRAME_DELIMITER, FrameDecoder, FrameError, FrameReadError, FrameReader, encode_frame,
};
pub use messages::{
    AppIconDataResponse, AppsListResponse, CreateExecutorRequest, DeleteExecutorRequest,
    DeletePageRequest, ErrorMessage, ExecuteActionRequest, ExecutorOutcome, FocusedAppUpdate,
    GetAppIconRequest, INVALID_MESSAGE_FORMAT, MessageType, PageRequest, PageUpdatedResponse,
    PagesListResponse, Request, Response, ShortcutsListResponse, SwapExecutorRequest,
    UNSUPPORTED_MESSAGE_TYPE, UpdateAppInfoRequest, UpdateExecutorRequest,
};
pub use model::{
    Action, ActionContext, ActionContextOption, AppInfo, Document, Executor, Modifiers, Page,
    SlotLocation,
};
