//! The single public tool surface: parameter parsing, response rendering,
//! and mode dispatch.

pub mod dispatch;
pub mod params;
pub mod render;

pub use dispatch::Gateway;
pub use params::{GatewayMode, GatewayParams, GatewayResponse, Outcome};
