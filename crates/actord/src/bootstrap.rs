//! Actor bootstrap orchestration.

use std::net::SocketAddr;
use std::sync::Arc;

use actorcore_config::{Config, Endpoint};
use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;
use tracing::{info, warn};

use crate::dispatch::{
    ActorContext, CommandSet, CommandSetError, CoreCommands, DispatchCore, DispatchError,
    DispatchHandle, DispatchSettings, Validator, VerbTable,
};
use crate::health::HealthReporter;
use crate::hub::{BackoffPolicy, HubCallbacks, HubClient, HubError, HubHandle, HubLink};
use crate::process::ShutdownError;
use crate::registry::{ConnectionRegistry, LineSubmitter, SessionHandler};
use crate::telemetry::{self, TelemetryError, TelemetryHandle};
use crate::transport::{ListenerError, ListenerHandle, SocketListener};
use crate::workers::{StartOptions, WorkerError, WorkerManager, WorkerRole};

const ACTOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::actor");

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the actor configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader that returns an already resolved configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// A command set could not be attached.
    #[error("failed to attach command set: {source}")]
    CommandSet {
        /// Underlying vocabulary error.
        #[source]
        source: CommandSetError,
    },
    /// The command listener could not be bound or started.
    #[error("failed to start command listener: {source}")]
    Listener {
        /// Underlying listener error.
        #[source]
        source: ListenerError,
    },
    /// The hub link could not be started.
    #[error("failed to start hub link: {source}")]
    Hub {
        /// Underlying hub error.
        #[source]
        source: HubError,
    },
    /// The dispatch thread could not be started.
    #[error("failed to start dispatcher: {source}")]
    Dispatch {
        /// Underlying dispatch error.
        #[source]
        source: DispatchError,
    },
    /// Worker threads could not be started.
    #[error("failed to start workers: {source}")]
    Workers {
        /// Underlying worker error.
        #[source]
        source: WorkerError,
    },
}

/// Command sets and worker roles an actor is built with, on top of the core
/// command set every actor answers.
#[derive(Default)]
pub struct ActorComponents {
    command_sets: Vec<Box<dyn CommandSet>>,
    worker_roles: Vec<WorkerRole>,
}

impl ActorComponents {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_command_set(mut self, set: impl CommandSet + 'static) -> Self {
        self.command_sets.push(Box::new(set));
        self
    }

    #[must_use]
    pub fn with_worker_role(mut self, role: WorkerRole) -> Self {
        self.worker_roles.push(role);
        self
    }
}

/// A running actor: listener, dispatcher, optional hub link and workers.
pub struct Actor {
    config: Config,
    telemetry: TelemetryHandle,
    core: Arc<DispatchCore>,
    verbs: Arc<VerbTable>,
    workers: Arc<WorkerManager>,
    listener: ListenerHandle,
    dispatch: DispatchHandle,
    hub: Option<HubHandle>,
}

impl Actor {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Address the command listener is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    #[must_use]
    pub fn context(&self) -> &ActorContext {
        self.core.context()
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Arc<DispatchCore> {
        &self.core
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        self.core.registry()
    }

    /// Vocabulary; command sets may be attached while the actor runs.
    #[must_use]
    pub fn verbs(&self) -> &Arc<VerbTable> {
        &self.verbs
    }

    #[must_use]
    pub fn workers(&self) -> &Arc<WorkerManager> {
        &self.workers
    }

    #[must_use]
    pub fn hub_link(&self) -> Option<&HubLink> {
        self.hub.as_ref().map(HubHandle::link)
    }

    /// Stops accepting connections, drains the dispatch queue, drops the hub
    /// link, stops the workers and finally closes every live session.
    ///
    /// # Errors
    ///
    /// Returns the first thread that failed to stop cleanly; the remaining
    /// steps still run.
    pub fn shutdown(self) -> Result<(), ShutdownError> {
        let Self {
            core,
            workers,
            listener,
            dispatch,
            hub,
            ..
        } = self;
        let mut first_error = None;

        listener.shutdown();
        if let Err(source) = listener.join() {
            first_error.get_or_insert(ShutdownError::Listener { source });
        }
        dispatch.shutdown();
        if let Err(source) = dispatch.join() {
            first_error.get_or_insert(ShutdownError::Dispatch { source });
        }
        if let Some(hub) = hub {
            hub.shutdown();
            if let Err(source) = hub.join() {
                first_error.get_or_insert(ShutdownError::Hub { source });
            }
        }
        workers.shutdown();

        let registry = core.registry();
        for connection_id in registry.connection_ids() {
            if let Err(error) = registry.shutdown_session(connection_id, "actor shutting down") {
                warn!(
                    target: ACTOR_TARGET,
                    connection_id,
                    error = %error,
                    "failed to close session"
                );
            }
        }
        info!(target: ACTOR_TARGET, "actor stopped");
        first_error.map_or(Ok(()), Err)
    }
}

/// Forwards hub link events to the dispatcher and the health reporter.
struct HubObserver {
    core: Arc<DispatchCore>,
    reporter: Arc<dyn HealthReporter>,
    endpoint: Endpoint,
}

impl HubCallbacks for HubObserver {
    fn connection_changed(&self, connected: bool) {
        if connected {
            self.reporter.hub_connected(&self.endpoint);
        } else {
            self.reporter.hub_disconnected(&self.endpoint);
        }
        self.core.connection_changed(connected);
    }

    fn reply_received(&self, line: &str) {
        self.core.reply_received(line);
    }
}

/// Bootstraps the actor using the supplied collaborators.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    components: ActorComponents,
) -> Result<Actor, BootstrapError> {
    reporter.bootstrap_starting();
    match build_actor(loader, &reporter, components) {
        Ok(actor) => {
            reporter.bootstrap_succeeded(actor.config());
            Ok(actor)
        }
        Err(error) => {
            reporter.bootstrap_failed(&error);
            Err(error)
        }
    }
}

fn build_actor(
    loader: &dyn ConfigLoader,
    reporter: &Arc<dyn HealthReporter>,
    components: ActorComponents,
) -> Result<Actor, BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    let telemetry =
        telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;

    let verbs = Arc::new(VerbTable::new());
    verbs
        .attach_command_set(&CoreCommands)
        .map_err(|source| BootstrapError::CommandSet { source })?;
    for set in &components.command_sets {
        verbs
            .attach_command_set(set.as_ref())
            .map_err(|source| BootstrapError::CommandSet { source })?;
    }

    let hub_client = config
        .hub()
        .map(|endpoint| HubClient::new(endpoint.clone(), BackoffPolicy::from_config(&config)));
    let registry = Arc::new(ConnectionRegistry::new());
    let core = DispatchCore::new(
        DispatchSettings::from_config(&config),
        Arc::clone(&registry),
        Arc::clone(&verbs) as Arc<dyn Validator>,
        hub_client.as_ref().map(HubClient::link),
    );

    let workers = Arc::new(WorkerManager::new(
        components.worker_roles,
        core.context().clone(),
        config.worker_join_timeout(),
        Arc::clone(reporter),
    ));
    if !workers.roles().is_empty() {
        workers
            .start_threads(&StartOptions::fresh(), None)
            .map_err(|source| BootstrapError::Workers { source })?;
    }

    let dispatch = core
        .start()
        .map_err(|source| BootstrapError::Dispatch { source })?;

    let listener = SocketListener::bind(config.listen())
        .map_err(|source| BootstrapError::Listener { source })?;
    let handler = SessionHandler::new(registry, Arc::clone(&core) as Arc<dyn LineSubmitter>);
    let listener = listener
        .start(Arc::new(handler))
        .map_err(|source| BootstrapError::Listener { source })?;
    reporter.listener_bound(listener.local_addr());

    let hub = match hub_client {
        Some(client) => {
            let observer = HubObserver {
                core: Arc::clone(&core),
                reporter: Arc::clone(reporter),
                endpoint: client.link().endpoint().clone(),
            };
            Some(
                client
                    .start(Arc::new(observer))
                    .map_err(|source| BootstrapError::Hub { source })?,
            )
        }
        None => None,
    };

    Ok(Actor {
        config,
        telemetry,
        core,
        verbs,
        workers,
        listener,
        dispatch,
        hub,
    })
}
