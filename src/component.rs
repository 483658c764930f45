//! Managed component lifecycle and dependency slots.
//!
//! A component declares what it needs through [`Dependency`] fields and exposes
//! them to the [`Container`]( crate::Container ) via [`Component::dependencies`].
//! The container fills every slot with a fully initialised dependency before it
//! runs the component's own [`Component::initialize`].

use std::sync::{ Arc, OnceLock };
use thiserror::Error ;

use crate::identity::{ Identity, PublicReference };



/// Error type user supplied lifecycle code reports failures with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync> ;

/// A long-lived unit managed by the [`Container`]( crate::Container ).
///
/// Lifecycle methods take `&self`: the same instance is shared with every
/// dependent, so any state the lifecycle mutates lives behind interior mutability.
///
/// # Example
///
/// ```
/// use plugin_deploy::{ BoxError, Component, Dependency, Injectable };
///
/// trait Clock: Send + Sync { fn now( &self ) -> u64 ; }
///
/// struct Scheduler { clock: Dependency<dyn Clock> }
///
/// impl Component for Scheduler {
///     fn dependencies( &self ) -> Vec<&dyn Injectable> { vec![ &self.clock ] }
///     fn initialize( &self ) -> Result<(), BoxError> {
///         let _started_at = self.clock.get().map(| clock | clock.now() );
///         Ok(())
///     }
/// }
/// ```
pub trait Component: Send + Sync + 'static {

    /// Slots the container must fill before this component is initialised.
    fn dependencies( &self ) -> Vec<&dyn Injectable> { Vec::new() }

    /// Lifecycle-init. Runs once, after every dependency is initialised.
    ///
    /// # Errors
    /// Any error aborts or skips this component depending on its fail-on-error policy.
    fn initialize( &self ) -> Result<(), BoxError> { Ok(()) }

    /// Lifecycle-finish. Failures are logged and never escalate.
    ///
    /// # Errors
    /// Errors are reported to the log only.
    fn finish( &self ) -> Result<(), BoxError> { Ok(()) }

}

/// Error raised when a resolved reference cannot be assigned to a slot.
#[derive( Debug, Error )]
pub enum InjectionError {
    /// The registered public reference is not an `Arc` of the slot's type.
    #[error( "Slot expects {expected} but {identity} resolved to {found}" )]
    TypeMismatch { identity: Identity, expected: &'static str, found: &'static str },
}

/// The container-facing side of a dependency slot.
pub trait Injectable: Send + Sync {
    /// Identity this slot is resolved against.
    fn identity( &self ) -> &Identity ;
    /// Assigns the resolved reference. Assigning an already filled slot is a no-op.
    ///
    /// # Errors
    /// Fails if the reference does not hold the slot's type.
    fn inject( &self, reference: &PublicReference ) -> Result<(), InjectionError> ;
}

/// A typed dependency slot holding an `Arc<T>` once the container has filled it.
pub struct Dependency<T: ?Sized> {
    identity: Identity,
    value: OnceLock<Arc<T>>,
}

impl<T: ?Sized> Dependency<T> {

    /// A slot resolved against `Identity::of::<T>()`.
    pub fn new() -> Self {
        Self::named( Identity::of::<T>() )
    }

    /// A slot resolved against an explicit identity.
    pub fn named( identity: impl Into<Identity> ) -> Self {
        Self { identity: identity.into(), value: OnceLock::new() }
    }

    /// The injected dependency, `None` until the container has filled the slot.
    #[inline] pub fn get( &self ) -> Option<&Arc<T>> { self.value.get() }

}

impl<T: ?Sized> Default for Dependency<T> {
    fn default() -> Self { Self::new() }
}

impl<T: ?Sized + Send + Sync + 'static> Injectable for Dependency<T> {

    fn identity( &self ) -> &Identity { &self.identity }

    fn inject( &self, reference: &PublicReference ) -> Result<(), InjectionError> {
        let value = reference.downcast::<T>().ok_or_else(|| InjectionError::TypeMismatch {
            identity: self.identity.clone(),
            expected: std::any::type_name::<T>(),
            found: reference.type_name(),
        })?;
        let _ = self.value.set( value );
        Ok(())
    }

}

impl<T: ?Sized> std::fmt::Debug for Dependency<T> {
    fn fmt( &self, f: &mut std::fmt::Formatter<'_> ) -> std::fmt::Result {
        f.debug_struct( "Dependency" )
            .field( "identity", &self.identity )
            .field( "injected", &self.value.get().is_some() )
            .finish()
    }
}
