//! Integration tests driving the HTTP router against the in-memory store

mod api_tests;
