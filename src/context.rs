//! Isolated execution contexts and the plugin types they can load.
//!
//! An [`ExecutionContext`] is the namespace a deployment's plugin code lives in.
//! How a context actually loads and sandboxes code is up to its implementation;
//! this crate only needs to look types up by name, run code with the context
//! active, and close the context on teardown.
//!
//! Entering a context is explicit: [`ExecutionContext::enter`] returns a
//! [`ContextGuard`] that restores the previous state when dropped, including
//! while unwinding.

use std::any::Any ;
use std::collections::HashMap ;
use std::sync::{ Arc, RwLock, Weak, PoisonError };
use std::sync::atomic::{ AtomicBool, AtomicUsize, Ordering };
use thiserror::Error ;

use crate::component::BoxError ;
use crate::identity::{ Identity, PublicReference };
use crate::plugin::Plugin ;
use crate::utils::catch_panic ;



/// Errors returned when a context cannot produce a type.
#[derive( Debug, Error )]
pub enum TypeLookupError {
    /// The context has no type with this name.
    #[error( "Type {0} not found" )] NotFound( String ),
    /// The context has been closed and loads nothing anymore.
    #[error( "Context {0} is closed" )] Closed( String ),
}

/// An isolated namespace plugin code is loaded and run in.
pub trait ExecutionContext: Send + Sync + 'static {

    /// Human readable name, used in logs and errors.
    fn name( &self ) -> &str ;

    /// Looks up a type by its fully qualified name.
    ///
    /// # Errors
    /// Fails if the type is unknown or the context is closed.
    fn load_type( &self, name: &str ) -> Result<PluginType, TypeLookupError> ;

    /// Makes this context the active one until the returned guard is dropped.
    fn enter( &self ) -> ContextGuard<'_> { ContextGuard::inactive() }

    /// Releases the context. Called once, when its deployment is torn down.
    fn close( &self ) {}

}

/// Restores the previously active context when dropped.
#[must_use = "the context is left as soon as the guard is dropped"]
pub struct ContextGuard<'a> {
    exit: Option<Box<dyn FnOnce() + 'a>>,
}

impl<'a> ContextGuard<'a> {

    /// A guard that runs `exit` when dropped.
    pub fn new( exit: impl FnOnce() + 'a ) -> Self {
        Self { exit: Some( Box::new( exit )) }
    }

    /// A guard with nothing to restore.
    pub fn inactive() -> Self {
        Self { exit: None }
    }

}

impl Drop for ContextGuard<'_> {
    fn drop( &mut self ) {
        if let Some( exit ) = self.exit.take() { exit() }
    }
}

impl std::fmt::Debug for ContextGuard<'_> {
    fn fmt( &self, f: &mut std::fmt::Formatter<'_> ) -> std::fmt::Result {
        f.debug_struct( "ContextGuard" ).field( "active", &self.exit.is_some() ).finish()
    }
}

/// Runs `f` with `context` active.
pub(crate) fn invoke_in_context<R>( context: &dyn ExecutionContext, f: impl FnOnce() -> R ) -> R {
    let _active = context.enter();
    f()
}

/// A weak observer of an execution context.
///
/// Hosts keep a probe after undeploying to check the context actually became
/// unreachable, i.e. nothing leaked a strong reference to it.
#[derive( Clone, Default )]
pub struct LeakProbe( Option<Weak<dyn ExecutionContext>> );

impl LeakProbe {

    pub fn new( context: &Arc<dyn ExecutionContext> ) -> Self {
        Self( Some( Arc::downgrade( context )))
    }

    /// `true` once nothing holds the context anymore.
    pub fn is_collected( &self ) -> bool {
        self.0.as_ref().map_or( true, | context | context.strong_count() == 0 )
    }

}

impl std::fmt::Debug for LeakProbe {
    fn fmt( &self, f: &mut std::fmt::Formatter<'_> ) -> std::fmt::Result {
        f.debug_tuple( "LeakProbe" ).field( &self.is_collected() ).finish()
    }
}

/// What kind of type a name resolved to.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash )]
pub enum TypeShape {
    /// An instantiable plugin.
    Concrete,
    /// A plugin base that cannot be instantiated on its own.
    Abstract,
    /// A contract with no implementation.
    Interface,
    /// A loadable type that is not a plugin at all.
    Foreign,
}

impl std::fmt::Display for TypeShape {
    fn fmt( &self, f: &mut std::fmt::Formatter ) -> std::fmt::Result { write!( f, "{:?}", self )}
}

/// A freshly instantiated plugin: the lifecycle view and the type-erased view
/// share one allocation.
pub(crate) struct PluginInstance {
    pub lifecycle: Arc<dyn Plugin>,
    pub erased: Arc<dyn Any + Send + Sync>,
}

type Factory = Arc<dyn Fn() -> Result<PluginInstance, BoxError> + Send + Sync> ;
type Cast = Arc<dyn Fn( Arc<dyn Any + Send + Sync> ) -> Option<PublicReference> + Send + Sync> ;

/// A type an [`ExecutionContext`] can produce by name.
///
/// Concrete types carry a factory and the list of contracts (identities) they
/// declare to implement, each with the cast from the concrete type to it.
///
/// # Example
///
/// ```
/// use std::sync::Arc ;
/// use plugin_deploy::{ Plugin, PluginType };
///
/// trait Greeter: Send + Sync { fn greet( &self ) -> String ; }
///
/// struct English ;
/// impl Plugin for English {}
/// impl Greeter for English { fn greet( &self ) -> String { "hello".into() }}
///
/// let plugin_type = PluginType::concrete( "com.example.English", || Ok( English ))
///     .implementing::<dyn Greeter, English>(| plugin | plugin as Arc<dyn Greeter> );
/// assert!( plugin_type.implements( &plugin_deploy::Identity::of::<dyn Greeter>() ));
/// ```
#[derive( Clone )]
pub struct PluginType {
    name: String,
    shape: TypeShape,
    factory: Option<Factory>,
    contracts: HashMap<Identity, Cast>,
}

impl PluginType {

    /// An instantiable plugin type built by `factory`.
    pub fn concrete<P, F>( name: impl Into<String>, factory: F ) -> Self
    where
        P: Plugin,
        F: Fn() -> Result<P, BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            shape: TypeShape::Concrete,
            factory: Some( Arc::new( move || {
                let plugin = Arc::new( catch_panic( &factory )? );
                Ok( PluginInstance { erased: Arc::clone( &plugin ) as Arc<dyn Any + Send + Sync>, lifecycle: plugin })
            })),
            contracts: HashMap::new(),
        }
    }

    /// A type of the given shape that cannot be instantiated.
    pub fn uninstantiable( name: impl Into<String>, shape: TypeShape ) -> Self {
        Self { name: name.into(), shape, factory: None, contracts: HashMap::new() }
    }

    /// Declares that instances of `P` implement the contract `I`.
    ///
    /// `P` must be the concrete type the factory builds. Declaring a contract for
    /// any other type is a packaging error detected the first time the contract
    /// is requested.
    pub fn implementing<I, P>( mut self, expose: impl Fn( Arc<P> ) -> Arc<I> + Send + Sync + 'static ) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        P: Plugin,
    {
        let cast: Cast = Arc::new( move | erased | erased.downcast::<P>().ok()
            .map(| plugin | PublicReference::new( expose( plugin ))));
        self.contracts.insert( Identity::of::<I>(), cast );
        self
    }

    #[inline] pub fn name( &self ) -> &str { &self.name }
    #[inline] pub fn shape( &self ) -> TypeShape { self.shape }

    pub fn implements( &self, contract: &Identity ) -> bool {
        self.contracts.contains_key( contract )
    }

    pub fn contracts( &self ) -> impl Iterator<Item = &Identity> {
        self.contracts.keys()
    }

    pub(crate) fn instantiate( &self ) -> Option<Result<PluginInstance, BoxError>> {
        self.factory.as_ref().map(| factory | factory() )
    }

    /// `None` if the contract is not declared, `Some( None )` if the instance
    /// does not satisfy a declared contract.
    pub(crate) fn cast( &self, contract: &Identity, instance: &PluginInstance ) -> Option<Option<PublicReference>> {
        self.contracts.get( contract ).map(| cast | cast( Arc::clone( &instance.erased )))
    }

}

impl std::fmt::Debug for PluginType {
    fn fmt( &self, f: &mut std::fmt::Formatter<'_> ) -> std::fmt::Result {
        f.debug_struct( "PluginType" )
            .field( "name", &self.name )
            .field( "shape", &self.shape )
            .field( "contracts", &self.contracts.keys().collect::<Vec<_>>() )
            .finish_non_exhaustive()
    }
}

/// An in-process [`ExecutionContext`] backed by a table of registered types.
///
/// Tracks how many calls are currently running inside it and refuses to load
/// anything once closed.
#[derive( Debug )]
pub struct LocalContext {
    name: String,
    types: RwLock<HashMap<String, PluginType>>,
    active: AtomicUsize,
    closed: AtomicBool,
}

impl LocalContext {

    pub fn new( name: impl Into<String> ) -> Self {
        Self {
            name: name.into(),
            types: RwLock::new( HashMap::new() ),
            active: AtomicUsize::new( 0 ),
            closed: AtomicBool::new( false ),
        }
    }

    /// Registers `plugin_type`, replacing any type with the same name.
    pub fn with_type( self, plugin_type: PluginType ) -> Self {
        self.register( plugin_type );
        self
    }

    pub fn register( &self, plugin_type: PluginType ) {
        self.types.write().unwrap_or_else( PoisonError::into_inner )
            .insert( plugin_type.name().to_string(), plugin_type );
    }

    /// `true` while at least one call is running inside this context.
    pub fn is_active( &self ) -> bool { self.active.load( Ordering::SeqCst ) > 0 }

    pub fn is_closed( &self ) -> bool { self.closed.load( Ordering::SeqCst ) }

}

impl ExecutionContext for LocalContext {

    fn name( &self ) -> &str { &self.name }

    fn load_type( &self, name: &str ) -> Result<PluginType, TypeLookupError> {
        if self.is_closed() { return Err( TypeLookupError::Closed( self.name.clone() ))}
        self.types.read().unwrap_or_else( PoisonError::into_inner )
            .get( name )
            .cloned()
            .ok_or_else(|| TypeLookupError::NotFound( name.to_string() ))
    }

    fn enter( &self ) -> ContextGuard<'_> {
        self.active.fetch_add( 1, Ordering::SeqCst );
        ContextGuard::new(|| { self.active.fetch_sub( 1, Ordering::SeqCst ); })
    }

    fn close( &self ) {
        self.closed.store( true, Ordering::SeqCst );
        self.types.write().unwrap_or_else( PoisonError::into_inner ).clear();
    }

}
