//! Validated value types shared by the client.

mod api_url;
mod endpoint;

pub use api_url::ApiUrl;
pub use endpoint::{EndpointPattern, ExemptEndpoints};
