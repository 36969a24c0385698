//! Test suites for actor bootstrap, launch and TCP sessions.

mod session_behaviour;
pub(crate) mod support;
