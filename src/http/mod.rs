//! Local control surface used by the collector.
//!
//! # Data Flow
//! ```text
//! collector (SCRAPER_ADDRESS=http://127.0.0.1:<port>)
//!     → request.rs (request id set and echoed back)
//!     → server.rs (router, body limit, trace span)
//!     → handlers.rs (bridge endpoint, record submitter, cache, users)
//!     → response.rs (BridgeError → {"error": ..} + status)
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use handlers::{BridgeStatus, ConnectionStatus, SiteUser};
pub use request::X_REQUEST_ID;
pub use response::ErrorBody;
pub use server::{AppState, HttpServer, SessionEntry};
