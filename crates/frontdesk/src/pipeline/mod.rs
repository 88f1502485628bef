//! The request pipeline.
//!
//! Every outbound API call passes through [`RequestPipeline::dispatch`], the
//! single place where the access token is read from the credential store and
//! attached. [`RequestPipeline::classify`] decides whether a failed attempt
//! means the session expired; recovery is left to the
//! [`RefreshCoordinator`](crate::RefreshCoordinator).

mod client;
mod request;

pub use client::{Attempt, Classification, RequestPipeline};
pub use request::{Access, ApiRequest, ApiResponse};
