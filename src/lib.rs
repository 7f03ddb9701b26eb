//! movies_api: movie catalog REST backend with a bearer-token admin path.
//!
//! Public routes read the catalog; admin routes (edit/delete) require a token
//! obtained from `/v1/signin`. This lib exposes the auth layer, the sled-backed
//! catalog store and the Axum router.

pub mod auth;
pub mod config;
pub mod error;
pub mod identity;
pub mod logging;
pub mod middleware;
pub mod models;
pub mod poster;
// REST API module: Axum router, handlers and shared state
pub mod rest;
pub mod storage;
