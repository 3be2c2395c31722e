//! Request handler module
//!
//! Routes incoming requests to the landing page or one of the relay
//! operations that forward to the upstream agent.

mod landing;
mod relay;
pub mod router;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main entry point
pub use router::handle_request;
