//! The component dependency container.
//!
//! A [`Container`] owns a list of [`ComponentConfiguration`]s. Calling
//! [`Container::initialize`] creates every component, walks the dependency graph
//! depth first, fills each [`Dependency`]( crate::Dependency ) slot with a fully
//! initialised dependency, and runs lifecycle-init in dependency order.
//! [`Container::finish`] runs lifecycle-finish in exactly the reverse order.
//!
//! Dependency cycles always abort startup, whatever the components' fail-on-error
//! policy. Every other failure aborts startup only if the failing component is
//! required; optional components are logged, rolled back and left out.

mod dependency_path ;
mod startup ;

use std::collections::HashMap ;
use std::sync::{ Arc, Mutex, RwLock, PoisonError };
use std::sync::atomic::{ AtomicBool, Ordering };
use itertools::Itertools ;
use thiserror::Error ;
use tracing::{ debug, info, warn };

use crate::component::{ BoxError, Component, InjectionError };
use crate::configuration::ComponentConfiguration ;
use crate::identity::{ Identity, PublicReference };
use crate::multicast::multicast_silently ;
use crate::utils::{ catch_panic, catch_panic_as, Panicked };
use startup::Startup ;

pub use dependency_path::DependencyChain ;



/// Errors raised by the [`Container`].
#[derive( Debug, Error )]
pub enum ContainerError {

    /// The component's constructor failed.
    #[error( "Failed to create component {identity}: {source}" )]
    Creation { identity: Identity, #[source] source: BoxError },

    /// A dependency slot names an identity no available public component provides.
    #[error( "Component {requester} requires {dependency}, which is not available" )]
    MissingDependency { requester: Identity, dependency: Identity },

    /// A dependency chain revisits a component already on the chain.
    #[error( "Cyclic dependency: {chain}" )]
    CyclicDependency { chain: DependencyChain },

    /// Listing the component's dependency slots panicked.
    #[error( "Component {identity} failed to declare its dependencies: {source}" )]
    Dependencies { identity: Identity, #[source] source: BoxError },

    /// The resolved dependency has a different type than the slot expects.
    #[error( "Failed to inject into {requester}: {source}" )]
    Injection { requester: Identity, #[source] source: InjectionError },

    /// Lifecycle-init failed.
    #[error( "Failed to initialize component {identity}: {source}" )]
    Initialization { identity: Identity, #[source] source: BoxError },

    /// Nothing is registered, initialised and public under this identity.
    #[error( "No such component: {0}" )]
    NoSuchComponent( Identity ),

    /// Lookups are refused while the container is starting up or shutting down.
    #[error( "Requests are disabled, cannot look up {0}" )]
    RequestsDisabled( Identity ),

    /// The component exists but is not an `Arc` of the requested type.
    #[error( "Component {identity} is a {found}, not a {requested}" )]
    TypeMismatch { identity: Identity, requested: &'static str, found: &'static str },

    /// [`Container::initialize`] was called on a running container.
    #[error( "Container is already initialized" )]
    AlreadyInitialized,

    /// Startup panicked outside any single component's lifecycle.
    #[error( "Container startup panicked: {0}" )]
    Panicked( #[from] Panicked ),

}

/// Startup outcome of one configured component.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash )]
pub enum ComponentStatus {
    /// Created but not yet initialised. Only observable on an aborted startup.
    Created,
    /// Lifecycle-init succeeded; the component takes part in shutdown.
    Initialized,
    /// An optional component failed and was left out.
    Unavailable,
}

impl std::fmt::Display for ComponentStatus {
    fn fmt( &self, f: &mut std::fmt::Formatter<'_> ) -> std::fmt::Result {
        match self {
            Self::Created => write!( f, "CREATED" ),
            Self::Initialized => write!( f, "INITIALIZED" ),
            Self::Unavailable => write!( f, "UNAVAILABLE" ),
        }
    }
}

/// Observer of container lifecycle transitions.
///
/// Listeners run outside the container's lifecycle lock and may call back into
/// the container, including [`Container::finish`].
pub trait ContainerListener: Send + Sync {
    /// Called after a successful startup, once lookups are enabled.
    fn post_initialize( &self, _container: &Container ) {}
    /// Called before shutdown starts, while lookups still succeed.
    fn pre_destroy( &self, _container: &Container ) {}
}

pub(crate) struct ManagedComponent {
    pub configuration: ComponentConfiguration,
    pub instance: Arc<dyn Component>,
    pub public_reference: PublicReference,
}

#[derive( Default )]
struct Registry {
    running: bool,
    public_components: HashMap<Identity, PublicReference>,
    initialize_order: Vec<ManagedComponent>,
    statuses: Vec<( Identity, ComponentStatus )>,
}

/// Owns component configurations and the components built from them.
///
/// Configuration happens through `&mut self` before startup; everything after
/// that takes `&self`, so a started container can be shared behind an `Arc`.
///
/// # Example
///
/// ```
/// use std::sync::Arc ;
/// use plugin_deploy::{ Component, Container, Dependency, Injectable };
///
/// trait Store: Send + Sync { fn name( &self ) -> String ; }
///
/// struct MemoryStore ;
/// impl Component for MemoryStore {}
/// impl Store for MemoryStore { fn name( &self ) -> String { "memory".into() }}
///
/// #[derive( Default )]
/// struct Service { store: Dependency<dyn Store> }
/// impl Component for Service {
///     fn dependencies( &self ) -> Vec<&dyn Injectable> { vec![ &self.store ] }
/// }
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut container = Container::new();
/// container.add_public_component::<dyn Store, _, _, _>(
///     || Ok( MemoryStore ),
///     | store | store as Arc<dyn Store>,
/// );
/// container.add_private_component(|| Ok( Service::default() ), true );
/// container.initialize()?;
///
/// let store = container.lookup::<dyn Store>()?;
/// assert_eq!( store.name(), "memory" );
/// container.finish();
/// # Ok(())
/// # }
/// ```
#[derive( Default )]
pub struct Container {
    configurations: Vec<ComponentConfiguration>,
    listeners: Vec<Arc<dyn ContainerListener>>,
    registry: RwLock<Registry>,
    requests_disabled: AtomicBool,
    finishing: AtomicBool,
    lifecycle: Mutex<()>,
}

impl Container {

    pub fn new() -> Self { Self::default() }

    /// Registers a configuration. Returns `false` and keeps the existing one if a
    /// configuration with the same identity is already registered.
    pub fn add_configuration( &mut self, configuration: ComponentConfiguration ) -> bool {
        if self.configurations.contains( &configuration ) {
            debug!( component = %configuration.identity(), "Configuration already registered, ignoring" );
            return false ;
        }
        self.configurations.push( configuration );
        true
    }

    /// Registers a private component, identified by its implementation type.
    pub fn add_private_component<C, F>( &mut self, factory: F, fail_on_error: bool ) -> bool
    where
        C: Component,
        F: Fn() -> Result<C, BoxError> + Send + Sync + 'static,
    {
        self.add_configuration( ComponentConfiguration::private( factory, fail_on_error ))
    }

    /// Registers a required component requested as `I`.
    pub fn add_public_component<I, C, F, E>( &mut self, factory: F, expose: E ) -> bool
    where
        I: ?Sized + Send + Sync + 'static,
        C: Component,
        F: Fn() -> Result<C, BoxError> + Send + Sync + 'static,
        E: Fn( Arc<C> ) -> Arc<I> + Send + Sync + 'static,
    {
        self.add_configuration( ComponentConfiguration::public( factory, expose ))
    }

    pub fn add_listener( &mut self, listener: Arc<dyn ContainerListener> ) {
        self.listeners.push( listener );
    }

    #[inline] pub fn configurations( &self ) -> &[ComponentConfiguration] { &self.configurations }

    /// Creates, wires and initialises every configured component.
    ///
    /// On failure every component initialised so far is finished in reverse order
    /// and the container is left empty.
    ///
    /// # Errors
    /// - [`ContainerError::CyclicDependency`] for any dependency cycle
    /// - any creation, injection, missing dependency or initialisation error of a
    ///   component that fails on error
    /// - [`ContainerError::AlreadyInitialized`] if the container is running
    pub fn initialize( &self ) -> Result<(), ContainerError> {

        let lifecycle = self.lifecycle.lock().unwrap_or_else( PoisonError::into_inner );
        if self.read_registry().running { return Err( ContainerError::AlreadyInitialized )}

        let result = {
            let _gate = RequestsGate::close( &self.requests_disabled );
            let mut startup = Startup::new( &self.configurations );
            let outcome = catch_panic_as(|| startup.run(), ContainerError::Panicked );
            let ( initialized, public_components, statuses ) = startup.into_parts();
            match outcome {
                Ok(()) => {
                    *self.write_registry() = Registry { running: true, public_components, initialize_order: initialized, statuses };
                    Ok(())
                },
                Err( error ) => {
                    warn!( %error, "Container startup aborted, rolling back" );
                    shutdown( initialized );
                    *self.write_registry() = Registry { statuses, ..Registry::default() };
                    Err( error )
                },
            }
        };

        self.log_report();
        drop( lifecycle );

        if result.is_ok() {
            multicast_silently( "post_initialize", &self.listeners, | listener | {
                listener.post_initialize( self );
                Ok(())
            });
        }

        result

    }

    /// Returns the public reference registered for `identity`.
    ///
    /// # Errors
    /// - [`ContainerError::RequestsDisabled`] during startup or shutdown
    /// - [`ContainerError::NoSuchComponent`] if nothing initialised is registered
    ///   publicly under `identity`
    /// - [`ContainerError::TypeMismatch`] if the reference is not an `Arc<T>`
    pub fn get_component<T>( &self, identity: &Identity ) -> Result<Arc<T>, ContainerError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        if self.requests_disabled.load( Ordering::SeqCst ) {
            return Err( ContainerError::RequestsDisabled( identity.clone() ));
        }
        let registry = self.read_registry();
        let reference = registry.public_components.get( identity )
            .ok_or_else(|| ContainerError::NoSuchComponent( identity.clone() ))?;
        reference.downcast::<T>().ok_or_else(|| ContainerError::TypeMismatch {
            identity: identity.clone(),
            requested: std::any::type_name::<T>(),
            found: reference.type_name(),
        })
    }

    /// Shorthand for [`get_component`]( Self::get_component ) with `Identity::of::<T>()`.
    ///
    /// # Errors
    /// See [`get_component`]( Self::get_component ).
    pub fn lookup<T>( &self ) -> Result<Arc<T>, ContainerError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.get_component( &Identity::of::<T>() )
    }

    /// Status of every configured component after the last startup, in declaration order.
    pub fn statuses( &self ) -> Vec<( Identity, ComponentStatus )> {
        self.read_registry().statuses.clone()
    }

    /// Identities of the running components in initialisation order.
    pub fn initialize_order( &self ) -> Vec<Identity> {
        self.read_registry().initialize_order.iter()
            .map(| component | component.configuration.identity().clone() )
            .collect()
    }

    /// Finishes every running component in reverse initialisation order.
    ///
    /// Best effort: failures are logged per component and never escalate. A call
    /// made while another one is in progress, e.g. from a listener, returns
    /// immediately.
    pub fn finish( &self ) {

        if self.finishing.swap( true, Ordering::SeqCst ) { return }
        if !self.read_registry().running {
            self.finishing.store( false, Ordering::SeqCst );
            return ;
        }

        multicast_silently( "pre_destroy", &self.listeners, | listener | {
            listener.pre_destroy( self );
            Ok(())
        });

        let lifecycle = self.lifecycle.lock().unwrap_or_else( PoisonError::into_inner );
        let gate = RequestsGate::close( &self.requests_disabled );
        let registry = std::mem::take( &mut *self.write_registry() );
        shutdown( registry.initialize_order );
        drop( gate );
        drop( lifecycle );
        self.finishing.store( false, Ordering::SeqCst );

        info!( "Container finished" );

    }

    fn log_report( &self ) {
        let registry = self.read_registry();
        info!(
            running = registry.running,
            components = %registry.statuses.iter()
                .map(|( identity, status )| format!( "{}: {}", identity, status ))
                .join( ", " ),
            "Container startup report",
        );
    }

    fn read_registry( &self ) -> std::sync::RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else( PoisonError::into_inner )
    }

    fn write_registry( &self ) -> std::sync::RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else( PoisonError::into_inner )
    }

}

impl std::fmt::Debug for Container {
    fn fmt( &self, f: &mut std::fmt::Formatter<'_> ) -> std::fmt::Result {
        f.debug_struct( "Container" )
            .field( "configurations", &self.configurations )
            .field( "initialize_order", &self.initialize_order() )
            .finish_non_exhaustive()
    }
}

/// Refuses lookups until dropped, including while unwinding.
struct RequestsGate<'a>( &'a AtomicBool );

impl<'a> RequestsGate<'a> {
    fn close( requests_disabled: &'a AtomicBool ) -> Self {
        requests_disabled.store( true, Ordering::SeqCst );
        Self( requests_disabled )
    }
}

impl Drop for RequestsGate<'_> {
    fn drop( &mut self ) { self.0.store( false, Ordering::SeqCst ) }
}

fn shutdown( initialize_order: Vec<ManagedComponent> ) {
    initialize_order.into_iter().rev().for_each(| component | {
        let identity = component.configuration.identity();
        match catch_panic(|| component.instance.finish() ) {
            Ok(()) => debug!( component = %identity, "Component finished" ),
            Err( error ) => warn!( component = %identity, %error, "Component failed to finish" ),
        }
    });
}
