//! Non-owning handles to deployed plugins.
//!
//! A [`PluginHandle`] never keeps a plugin or its execution context alive. Every
//! call first checks the owning deployment is still deployed, then upgrades its
//! weak references for the duration of the call only, and runs the call with
//! the plugin's context active.

use std::sync::{ Arc, Weak };
use std::sync::atomic::{ AtomicBool, Ordering };
use thiserror::Error ;

use crate::context::{ ExecutionContext, invoke_in_context };
use crate::deployment::PluginError ;
use crate::plugin::{ LifecycleHook, Plugin };
use crate::utils::catch_panic ;



/// The plugin behind a handle has been undeployed.
///
/// Distinct from anything a plugin itself returns, so callers can tell a
/// stale handle apart from an ordinary plugin failure.
#[derive( Debug, Clone, Error )]
#[error( "Plugin {name} has been undeployed" )]
pub struct PluginUndeployed { pub name: String }

/// Where a handle is in its lifecycle.
///
/// `Undeployed` is terminal.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash )]
pub enum HandleState {
    /// Created, lifecycle-init not yet completed.
    Unbound,
    /// Initialised and still deployed.
    Active,
    /// The deployment was finished or the plugin dropped.
    Undeployed,
}

struct HandleInner<T: ?Sized> {
    name: String,
    plugin: Weak<T>,
    lifecycle: Weak<dyn Plugin>,
    context: Weak<dyn ExecutionContext>,
    deployed: Arc<AtomicBool>,
    bound: AtomicBool,
    hook: Option<Arc<dyn LifecycleHook<T>>>,
}

/// A handle to a plugin requested as `T`, usually a trait object.
///
/// Clones share state: a clone of a handle is the same handle.
pub struct PluginHandle<T: ?Sized>( Arc<HandleInner<T>> );

impl<T: ?Sized + Send + Sync + 'static> PluginHandle<T> {

    pub(crate) fn new(
        name: String,
        plugin: Weak<T>,
        lifecycle: Weak<dyn Plugin>,
        context: Weak<dyn ExecutionContext>,
        deployed: Arc<AtomicBool>,
        hook: Option<Arc<dyn LifecycleHook<T>>>,
    ) -> Self {
        Self( Arc::new( HandleInner { name, plugin, lifecycle, context, deployed, bound: AtomicBool::new( false ), hook }))
    }

    /// The name the plugin was requested by.
    #[inline] pub fn name( &self ) -> &str { &self.0.name }

    /// Calls `f` on the live plugin, inside its execution context.
    ///
    /// Whatever `f` returns, including the plugin's own errors, is passed through
    /// untouched. Panics unwind to the caller after the context is restored.
    ///
    /// # Errors
    /// Returns [`PluginUndeployed`] if the owning deployment has been torn down.
    pub fn invoke<R>( &self, f: impl FnOnce( &T ) -> R ) -> Result<R, PluginUndeployed> {
        let ( plugin, _, context ) = self.upgrade()?;
        Ok( invoke_in_context( context.as_ref(), || f( &*plugin )))
    }

    /// Runs the hook's pre-initialize callback, then the plugin's lifecycle-init.
    ///
    /// # Errors
    /// [`PluginError::Undeployed`] for a stale handle, [`PluginError::Initialization`]
    /// if the hook or lifecycle-init fails or panics.
    pub fn initialize( &self ) -> Result<(), PluginError> {
        let ( plugin, lifecycle, context ) = self.upgrade()?;
        invoke_in_context( context.as_ref(), || catch_panic(|| {
            if let Some( hook ) = &self.0.hook { hook.pre_initialize( &*plugin ) }
            lifecycle.initialize()
        })).map_err(| source | PluginError::Initialization { name: self.0.name.clone(), source })?;
        self.0.bound.store( true, Ordering::SeqCst );
        Ok(())
    }

    /// Runs the plugin's lifecycle-finish, then the hook's post-finish callback.
    ///
    /// The hook runs even if lifecycle-finish fails.
    ///
    /// # Errors
    /// [`PluginError::Undeployed`] for a stale handle, [`PluginError::Finish`] if
    /// lifecycle-finish fails or panics.
    pub fn finish( &self ) -> Result<(), PluginError> {
        let ( plugin, lifecycle, context ) = self.upgrade()?;
        invoke_in_context( context.as_ref(), || {
            let result = catch_panic(|| lifecycle.finish() );
            if let Some( hook ) = &self.0.hook { hook.post_finish( &*plugin ) }
            result
        }).map_err(| source | PluginError::Finish { name: self.0.name.clone(), source })
    }

    pub fn state( &self ) -> HandleState {
        if !self.0.deployed.load( Ordering::SeqCst ) || self.0.plugin.strong_count() == 0 {
            return HandleState::Undeployed ;
        }
        match self.0.bound.load( Ordering::SeqCst ) {
            true => HandleState::Active,
            false => HandleState::Unbound,
        }
    }

    /// `true` if both handles are the same handle.
    pub fn ptr_eq( &self, other: &Self ) -> bool { Arc::ptr_eq( &self.0, &other.0 )}

    #[allow( clippy::type_complexity )]
    fn upgrade( &self ) -> Result<( Arc<T>, Arc<dyn Plugin>, Arc<dyn ExecutionContext> ), PluginUndeployed> {
        let undeployed = || PluginUndeployed { name: self.0.name.clone() };
        if !self.0.deployed.load( Ordering::SeqCst ) { return Err( undeployed() )}
        let plugin = self.0.plugin.upgrade().ok_or_else( undeployed )?;
        let lifecycle = self.0.lifecycle.upgrade().ok_or_else( undeployed )?;
        let context = self.0.context.upgrade().ok_or_else( undeployed )?;
        Ok(( plugin, lifecycle, context ))
    }

}

impl<T: ?Sized> Clone for PluginHandle<T> {
    fn clone( &self ) -> Self { Self( Arc::clone( &self.0 ))}
}

impl<T: ?Sized> std::fmt::Debug for PluginHandle<T> {
    fn fmt( &self, f: &mut std::fmt::Formatter<'_> ) -> std::fmt::Result {
        f.debug_struct( "PluginHandle" )
            .field( "name", &self.0.name )
            .field( "contract", &std::any::type_name::<T>() )
            .field( "deployed", &self.0.deployed.load( Ordering::SeqCst ))
            .finish_non_exhaustive()
    }
}
