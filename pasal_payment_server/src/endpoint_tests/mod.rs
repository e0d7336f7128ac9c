//! Endpoint tests run against the full route set, backed by a throwaway SQLite database per test.
mod helpers;

mod admin;
mod orders;
mod payments;
