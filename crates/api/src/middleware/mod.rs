//! Request pipeline stages, outermost first:
//!
//! access log → panic recovery → CORS → authentication → authorization
//!
//! The first three wrap every route; the last two wrap protected routes only.
//! Each stage is a plain `from_fn` middleware; `app::router_with` composes
//! them with `tower::ServiceBuilder` in this order.

pub mod access_log;
pub mod authn;
pub mod authz;
pub mod cors;
pub mod recovery;
