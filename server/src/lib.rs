// Life of a request:
// 0. Panic recovery wraps everything below (stack captured by a panic hook)
// 1. CORS preflights are answered immediately
// 2. Protected routes: bearer token verified, principal attached to the
//    request (401 otherwise)
// 3. Handler runs, scoping every store call by the principal's subject id
//     - Config activation runs as one transaction in the store
//     - Submissions are relayed to the execution service unchanged
// 4. Result rendered as a JSON envelope
//
// System components:
//  - Token authority (HS256, offline verification)
//  - Relational store (PostgreSQL in production, SQLite for development)
//  - Execution service client

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod api;
pub mod auth;
pub mod config;
pub mod server;
pub mod store;
pub mod upstream;
