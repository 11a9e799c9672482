//! Integration tests for cortex-lens.
//!
//! Live warehouse tests read SNOWFLAKE_TEST_URL; everything else is offline.

pub mod ask_test;
pub mod dashboard_test;
pub mod snowflake_test;
