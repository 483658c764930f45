//! Declarative description of one manageable component.

use std::sync::Arc ;

use crate::component::{ BoxError, Component };
use crate::identity::{ Identity, PublicReference };



/// What a constructor produces: the managed instance and the reference lookups return.
pub(crate) struct Constructed {
    pub instance: Arc<dyn Component>,
    pub public_reference: PublicReference,
}

type Constructor = Arc<dyn Fn() -> Result<Constructed, BoxError> + Send + Sync> ;

/// Describes how to create a component and how it may be requested.
///
/// A configuration is either **private** (never visible to lookups, identified by
/// its implementation type, which dependency slots may still name) or **public**
/// (requested by its public identity).
/// Two configurations are equal when their [`identity`]( Self::identity ) is.
///
/// Immutable once built, apart from the builder methods consuming `self`.
#[derive( Clone )]
pub struct ComponentConfiguration {
    implementation: Identity,
    public_identity: Option<Identity>,
    fail_on_error: bool,
    constructor: Constructor,
}

impl ComponentConfiguration {

    /// A private component built by `factory`.
    pub fn private<C, F>( factory: F, fail_on_error: bool ) -> Self
    where
        C: Component,
        F: Fn() -> Result<C, BoxError> + Send + Sync + 'static,
    {
        Self {
            implementation: Identity::of::<C>(),
            public_identity: None,
            fail_on_error,
            constructor: Arc::new( move || {
                let instance = Arc::new( factory()? );
                Ok( Constructed {
                    public_reference: PublicReference::new( Arc::clone( &instance )),
                    instance,
                })
            }),
        }
    }

    /// A required component requested as `I` (usually a trait object).
    ///
    /// `expose` turns the created instance into the reference lookups return. It
    /// normally just coerces `Arc<C>` into `Arc<I>` but may substitute a wrapper.
    pub fn public<I, C, F, E>( factory: F, expose: E ) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        C: Component,
        F: Fn() -> Result<C, BoxError> + Send + Sync + 'static,
        E: Fn( Arc<C> ) -> Arc<I> + Send + Sync + 'static,
    {
        Self {
            implementation: Identity::of::<C>(),
            public_identity: Some( Identity::of::<I>() ),
            fail_on_error: true,
            constructor: Arc::new( move || {
                let instance = Arc::new( factory()? );
                Ok( Constructed {
                    public_reference: PublicReference::new( expose( Arc::clone( &instance ))),
                    instance,
                })
            }),
        }
    }

    /// Overrides the public identity, e.g. to register by a configured name.
    pub fn with_public_identity( mut self, identity: impl Into<Identity> ) -> Self {
        self.public_identity = Some( identity.into() );
        self
    }

    /// Overrides the fail-on-error policy.
    pub fn with_fail_on_error( mut self, fail_on_error: bool ) -> Self {
        self.fail_on_error = fail_on_error ;
        self
    }

    /// The public identity if present, else the implementation identity.
    #[inline] pub fn identity( &self ) -> &Identity {
        self.public_identity.as_ref().unwrap_or( &self.implementation )
    }

    #[inline] pub fn implementation( &self ) -> &Identity { &self.implementation }
    #[inline] pub fn public_identity( &self ) -> Option<&Identity> { self.public_identity.as_ref() }
    #[inline] pub fn is_public( &self ) -> bool { self.public_identity.is_some() }
    #[inline] pub fn fail_on_error( &self ) -> bool { self.fail_on_error }

    pub(crate) fn construct( &self ) -> Result<Constructed, BoxError> {
        ( self.constructor )()
    }

}

impl PartialEq for ComponentConfiguration {
    fn eq( &self, other: &Self ) -> bool { self.identity() == other.identity() }
}
impl Eq for ComponentConfiguration {}

impl std::hash::Hash for ComponentConfiguration {
    fn hash<H: std::hash::Hasher>( &self, state: &mut H ) { self.identity().hash( state )}
}

impl std::fmt::Debug for ComponentConfiguration {
    fn fmt( &self, f: &mut std::fmt::Formatter<'_> ) -> std::fmt::Result {
        f.debug_struct( "ComponentConfiguration" )
            .field( "implementation", &self.implementation )
            .field( "public_identity", &self.public_identity )
            .field( "fail_on_error", &self.fail_on_error )
            .finish_non_exhaustive()
    }
}
