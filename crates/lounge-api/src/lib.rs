pub mod auth;
pub mod credentials;
pub mod error;
pub mod ledger;
pub mod messages;
pub mod middleware;
pub mod profile;
pub mod router;
pub mod sessions;
pub mod state;
pub mod validation;

pub use router::build_router;
pub use state::{AppState, AppStateInner, SessionSettings};
