mod auth;
mod stream;
mod svr;
mod sync;

pub use auth::{Authorized, authenticate};
pub use svr::{AppState, build_app, startup};
