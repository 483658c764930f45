//! One execution context's plugin registry.
//!
//! A [`Deployment`] instantiates plugins on demand, at most once per name, and is
//! the only owner of the instances it creates. Everything it hands out is a
//! [`PluginHandle`] holding weak references. [`Deployment::finish`] drops every
//! strong reference and closes the context, after which nothing the deployment
//! produced can keep the context reachable.

use std::any::Any ;
use std::collections::HashMap ;
use std::sync::{ Arc, Mutex, MutexGuard, Weak, PoisonError };
use std::sync::atomic::{ AtomicBool, Ordering };
use thiserror::Error ;
use tracing::{ debug, info };

use crate::component::BoxError ;
use crate::context::{ ExecutionContext, LeakProbe, PluginInstance, TypeLookupError, TypeShape, invoke_in_context };
use crate::identity::{ Identity, PublicReference };
use crate::multicast::multicast_silently ;
use crate::plugin::{ LifecycleHook, Plugin };
use crate::plugin_handle::{ PluginHandle, PluginUndeployed };



/// Errors raised while requesting or driving a plugin.
#[derive( Debug, Error )]
pub enum PluginError {

    /// The context has no loadable type with this name.
    #[error( "Plugin type {name} could not be loaded: {source}" )]
    NotFound { name: String, #[source] source: TypeLookupError },

    /// The name resolved to an abstract type or an interface.
    #[error( "Plugin type {name} is not concrete ({shape})" )]
    NotConcrete { name: String, shape: TypeShape },

    /// The name resolved to a type that is not a plugin.
    #[error( "Type {name} is not a plugin" )]
    NotAPlugin { name: String },

    /// The plugin type does not declare the requested contract.
    #[error( "Plugin type {name} does not implement {contract}" )]
    ContractNotImplemented { name: String, contract: Identity },

    /// The plugin is already cached under a different contract.
    #[error( "Plugin {name} is a {cached}, not a {requested}" )]
    TypeMismatch { name: String, cached: Identity, requested: Identity },

    /// The plugin's factory failed.
    #[error( "Failed to instantiate plugin {name}: {source}" )]
    Instantiation { name: String, #[source] source: BoxError },

    /// The plugin's lifecycle-init failed.
    #[error( "Failed to initialize plugin {name}: {source}" )]
    Initialization { name: String, #[source] source: BoxError },

    /// The plugin's lifecycle-finish failed.
    #[error( "Failed to finish plugin {name}: {source}" )]
    Finish { name: String, #[source] source: BoxError },

    /// The deployment has been torn down.
    #[error( "Deployment {0} is finished" )]
    Finished( String ),

    #[error( transparent )]
    Undeployed( #[from] PluginUndeployed ),

}

struct CachedHandle {
    contract: Identity,
    handle: Box<dyn Any + Send + Sync>,
}

struct DeploymentState {
    context: Arc<dyn ExecutionContext>,
    registry: HashMap<String, CachedHandle>,
    /// Each plugin with the reference it was exposed under, which need not share
    /// the plugin's allocation.
    strong_references: Vec<( Arc<dyn Plugin>, PublicReference )>,
    subscribers: Vec<Weak<dyn Plugin>>,
    deployed: Arc<AtomicBool>,
}

/// The plugin registry of one execution context.
///
/// Requests are serialised; a plugin's lifecycle-init must not request plugins
/// from its own deployment.
pub struct Deployment {
    name: String,
    state: Mutex<Option<DeploymentState>>,
}

impl Deployment {

    pub fn new( context: Arc<dyn ExecutionContext> ) -> Self {
        Self {
            name: context.name().to_string(),
            state: Mutex::new( Some( DeploymentState {
                context,
                registry: HashMap::new(),
                strong_references: Vec::new(),
                subscribers: Vec::new(),
                deployed: Arc::new( AtomicBool::new( true )),
            })),
        }
    }

    #[inline] pub fn name( &self ) -> &str { &self.name }

    /// Returns the handle for the plugin type `name`, requested as `T`.
    ///
    /// The first request instantiates the plugin, runs `hook`'s pre-initialize
    /// callback and the plugin's lifecycle-init inside the context, and caches the
    /// handle. Later requests return the cached handle and ignore `hook`.
    ///
    /// # Errors
    /// - [`PluginError::TypeMismatch`] if `name` is cached under another contract
    /// - [`PluginError::NotFound`], [`PluginError::NotConcrete`],
    ///   [`PluginError::NotAPlugin`] or [`PluginError::ContractNotImplemented`] if
    ///   `name` does not resolve to a concrete plugin implementing `T`
    /// - [`PluginError::Instantiation`] or [`PluginError::Initialization`] if the
    ///   plugin fails to start, including by panicking; nothing is cached or kept
    ///   alive in that case
    /// - [`PluginError::Finished`] after [`finish`]( Self::finish )
    ///
    /// # Panics
    /// If the instance does not satisfy a contract its type declares. That is a
    /// packaging error, not a runtime condition.
    pub fn get_plugin<T>(
        &self,
        name: &str,
        hook: Option<Arc<dyn LifecycleHook<T>>>,
    ) -> Result<PluginHandle<T>, PluginError>
    where
        T: ?Sized + Send + Sync + 'static,
    {

        let mut guard = self.lock();
        let state = guard.as_mut().ok_or_else(|| PluginError::Finished( self.name.clone() ))?;
        let contract = Identity::of::<T>();

        if let Some( cached ) = state.registry.get( name ) {
            return cached.handle.downcast_ref::<PluginHandle<T>>().cloned().ok_or_else(|| PluginError::TypeMismatch {
                name: name.to_string(),
                cached: cached.contract.clone(),
                requested: contract,
            });
        }

        let plugin_type = state.context.load_type( name )
            .map_err(| source | PluginError::NotFound { name: name.to_string(), source })?;
        match plugin_type.shape() {
            TypeShape::Concrete => {},
            TypeShape::Foreign => return Err( PluginError::NotAPlugin { name: name.to_string() }),
            shape => return Err( PluginError::NotConcrete { name: name.to_string(), shape }),
        }
        if !plugin_type.implements( &contract ) {
            return Err( PluginError::ContractNotImplemented { name: name.to_string(), contract });
        }

        let instance = invoke_in_context( state.context.as_ref(), || plugin_type.instantiate() )
            .ok_or_else(|| PluginError::NotConcrete { name: name.to_string(), shape: plugin_type.shape() })?
            .map_err(| source | PluginError::Instantiation { name: name.to_string(), source })?;

        let exposed = plugin_type.cast( &contract, &instance ).flatten()
            .unwrap_or_else(|| panic!( "Plugin {} declares {} but its instance does not implement it", name, contract ));
        let handle = Self::bind( state, name, &exposed, &instance, &contract, hook );

        // The locals keep the plugin alive during init; it is owned only once init succeeded.
        handle.initialize()?;

        let PluginInstance { lifecycle, .. } = instance ;
        state.subscribers.push( Arc::downgrade( &lifecycle ));
        state.strong_references.push(( lifecycle, exposed ));
        state.registry.insert( name.to_string(), CachedHandle { contract, handle: Box::new( handle.clone() )});
        debug!( deployment = %self.name, plugin = name, "Plugin deployed" );

        Ok( handle )

    }

    fn bind<T>(
        state: &DeploymentState,
        name: &str,
        exposed: &PublicReference,
        instance: &PluginInstance,
        contract: &Identity,
        hook: Option<Arc<dyn LifecycleHook<T>>>,
    ) -> PluginHandle<T>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let typed = exposed.downcast::<T>()
            .unwrap_or_else(|| panic!( "Plugin {} declares {} but its instance does not implement it", name, contract ));
        PluginHandle::new(
            name.to_string(),
            Arc::downgrade( &typed ),
            Arc::downgrade( &instance.lifecycle ),
            Arc::downgrade( &state.context ),
            Arc::clone( &state.deployed ),
            hook,
        )
    }

    /// `true` if at least one plugin has been requested and is cached.
    pub fn has_plugins( &self ) -> bool {
        self.lock().as_ref().is_some_and(| state | !state.registry.is_empty() )
    }

    /// A weak observer of this deployment's context.
    pub fn context_probe( &self ) -> LeakProbe {
        self.lock().as_ref().map(| state | LeakProbe::new( &state.context )).unwrap_or_default()
    }

    pub fn is_finished( &self ) -> bool { self.lock().is_none() }

    /// Tears the deployment down.
    ///
    /// Runs lifecycle-finish on every plugin inside the context, ignoring
    /// failures, then drops every strong reference and closes the context. All
    /// previously issued handles are undeployed afterwards. Calling this twice is
    /// a no-op.
    pub fn finish( &self ) {

        let Some( state ) = self.lock().take() else { return };
        let DeploymentState { context, registry, strong_references, subscribers, deployed } = state ;
        deployed.store( false, Ordering::SeqCst );

        let failed = invoke_in_context( context.as_ref(), || {
            let live = subscribers.iter().filter_map( Weak::upgrade ).collect::<Vec<_>>();
            multicast_silently( "finish", &live, | plugin | plugin.finish() )
        });

        let plugins = registry.len();
        drop( registry );
        drop( strong_references );
        context.close();
        drop( context );

        info!( deployment = %self.name, plugins, failed, "Deployment finished" );

    }

    fn lock( &self ) -> MutexGuard<'_, Option<DeploymentState>> {
        self.state.lock().unwrap_or_else( PoisonError::into_inner )
    }

}

impl std::fmt::Debug for Deployment {
    fn fmt( &self, f: &mut std::fmt::Formatter<'_> ) -> std::fmt::Result {
        let guard = self.lock();
        f.debug_struct( "Deployment" )
            .field( "name", &self.name )
            .field( "plugins", &guard.as_ref().map(| state | state.registry.keys().cloned().collect::<Vec<_>>() ))
            .finish()
    }
}
