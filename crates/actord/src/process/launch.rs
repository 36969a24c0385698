//! Supervises actor launch sequencing and runtime orchestration.

use std::sync::Arc;

use tracing::info;

use crate::bootstrap::{ActorComponents, ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::health::{HealthReporter, StructuredHealthReporter};

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Runs the actor with the production collaborators until a termination
/// signal arrives.
///
/// # Errors
///
/// Returns [`LaunchError`] when bootstrap fails or shutdown does not
/// complete cleanly.
pub fn run_actor(components: ActorComponents) -> Result<(), LaunchError> {
    run_actor_with(
        &SystemConfigLoader,
        Arc::new(StructuredHealthReporter::new()),
        components,
        &SystemShutdownSignal::new(),
    )
}

/// Runs the actor with injected collaborators.
///
/// # Errors
///
/// Same as [`run_actor`].
pub fn run_actor_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    components: ActorComponents,
    shutdown: &dyn ShutdownSignal,
) -> Result<(), LaunchError> {
    info!(target: PROCESS_TARGET, "starting actor runtime");
    let actor = bootstrap_with(loader, reporter, components)?;
    info!(
        target: PROCESS_TARGET,
        actor = %actor.config().name(),
        addr = %actor.local_addr(),
        "actor ready"
    );

    let waited = shutdown.wait();
    let stopped = actor.shutdown();
    waited?;
    stopped?;
    info!(
        target: PROCESS_TARGET,
        "shutdown sequence completed"
    );
    Ok(())
}
