//! Behavioural tests for command sessions over TCP.

use std::cell::RefCell;

use actorcore_config::DispatchMode;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use super::support::{self, TestWorld};

type StepResult = Result<(), String>;

#[fixture]
fn world() -> RefCell<TestWorld> {
    support::world()
}

#[given("a running actor in {mode} mode")]
fn given_running_actor(world: &RefCell<TestWorld>, mode: String) -> StepResult {
    let mode = mode
        .parse::<DispatchMode>()
        .map_err(|error| format!("invalid dispatch mode '{mode}': {error}"))?;
    let mut world = world.borrow_mut();
    world.use_successful_loader(mode);
    world.bootstrap();
    match world.bootstrap_error() {
        Some(error) => Err(format!("bootstrap failed: {error}")),
        None => Ok(()),
    }
}

#[when("a client connects")]
fn when_client_connects(world: &RefCell<TestWorld>) {
    world.borrow_mut().connect_client();
}

#[when("the client sends \"{line}\"")]
fn when_client_sends(world: &RefCell<TestWorld>, line: String) {
    world.borrow_mut().send_command(&line);
}

#[when("the actor shuts down")]
fn when_actor_shuts_down(world: &RefCell<TestWorld>) {
    world.borrow_mut().stop();
}

#[then("the client receives \"{reply}\"")]
fn then_client_receives(world: &RefCell<TestWorld>, reply: String) {
    let replies = world.borrow().replies.clone();
    assert!(
        replies.contains(&reply),
        "expected {reply:?} among {replies:?}"
    );
}

#[then("the client session is closed")]
fn then_session_closed(world: &RefCell<TestWorld>) {
    assert!(
        world.borrow_mut().client_sees_eof(),
        "session should be closed after shutdown"
    );
}

#[scenario(path = "tests/features/actor_session.feature")]
fn actor_session(world: RefCell<TestWorld>) {
    let _ = world;
}
