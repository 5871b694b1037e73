//! Integration tests: the batch engine against a real SQLite store, and
//! the HTTP providers against a local fake server.

mod fake_provider;
mod providers;
mod scripted;
