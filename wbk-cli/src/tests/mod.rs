//! Shared test harness modules for the `wbk` CLI.

use super::*;

mod helpers;
