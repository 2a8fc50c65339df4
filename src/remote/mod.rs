//! Access to the ERP backend.
//!
//! - **Client**: authenticated JSON over HTTP ([`ApiClient`])
//! - **Resource**: query state with stale-while-revalidate ([`Query`]) and
//!   mutation wrappers ([`Mutation`])
//! - **Entities**: endpoint catalogue for business collections

mod client;
mod entities;
mod resource;

pub use client::{ApiClient, DEFAULT_TIMEOUT, error_message};
pub use entities::{Entity, Page};
pub use resource::{Mutation, Query, RemoteResource};
