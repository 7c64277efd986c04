//! HTTP route handlers.

mod align;
mod health;
mod streams;
mod write;

pub use align::{align_handler, AlignRequest, AlignResponse};
pub use health::{health, health_routes, HealthResponse};
pub use streams::{stop_stream_handler, StopRequest, StopResponse};
pub use write::{write_handler, WriteRequest};
