//! Cart slice integration tests.

mod properties;
