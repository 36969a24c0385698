//! Layering behaviour of the derived configuration loader.

use std::ffi::{OsStr, OsString};
use std::sync::{Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;
use rstest::rstest;

use actorcore_config::{Config, DispatchMode, Endpoint, OrthoConfig};

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

struct EnvOverride {
    key: &'static str,
    previous: Option<OsString>,
    guard: Option<MutexGuard<'static, ()>>,
}

impl EnvOverride {
    fn set_var(key: &'static str, value: &OsStr) -> Self {
        let guard = ENV_MUTEX.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = std::env::var_os(key);
        // Environment mutation is `unsafe` on the 2024 edition; the guard
        // serialises every test that touches the process environment.
        unsafe { std::env::set_var(key, value) };
        Self {
            key,
            previous,
            guard: Some(guard),
        }
    }
}

impl Drop for EnvOverride {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(value) => unsafe { std::env::set_var(self.key, value) },
            None => unsafe { std::env::remove_var(self.key) },
        }
        drop(self.guard.take());
    }
}

fn args(extra: &[&str]) -> Vec<OsString> {
    std::iter::once("actord")
        .chain(extra.iter().copied())
        .map(OsString::from)
        .collect()
}

#[rstest]
fn cli_flags_override_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(PoisonError::into_inner);
    let config = Config::load_from_iter(args(&["--name", "guider", "--dispatch-mode", "direct"]))
        .expect("configuration should load");
    assert_eq!(config.name(), "guider");
    assert_eq!(config.dispatch_mode(), DispatchMode::Direct);
}

#[rstest]
fn environment_overrides_listen_endpoint() {
    let _env = EnvOverride::set_var("ACTORCORE_LISTEN", OsStr::new("tcp://127.0.0.1:7010"));
    let config = Config::load_from_iter(args(&[])).expect("configuration should load");
    assert_eq!(config.listen(), &Endpoint::tcp("127.0.0.1", 7010));
}
