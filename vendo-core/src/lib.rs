//! Vendo Core
//!
//! Core library for provisioning and terminating vended accounts through an
//! asynchronous catalog service. Every operation is a two-phase protocol:
//! submit a request, then poll the operation record until it settles.
//!
//! ## Module Structure
//!
//! - `request` - Account definitions and the validated provisioning request
//! - `params` - Translation of string mappings into ordered key/value pairs
//! - `client` - The provisioning client boundary and its error taxonomy
//! - `waiter` - Generic "wait for target status" polling engine
//! - `handle` - Durable resource handles and the store that persists them
//! - `lifecycle` - Create and Delete flows composing all of the above
//! - `token` - Idempotency tokens for submissions

pub mod client;
pub mod handle;
pub mod lifecycle;
pub mod params;
pub mod request;
pub mod token;
pub mod waiter;
