//! Identities and type-erased references.
//!
//! Components and plugins are requested by an [`Identity`]. Whatever a registry
//! hands back for that identity travels as a [`PublicReference`] until the caller
//! downcasts it to the concrete `Arc<T>` it asked for.

use std::any::Any ;
use std::borrow::Cow ;
use std::sync::Arc ;



/// The name a component or plugin contract is requested by.
///
/// Two identities are equal when their names are equal. [`Identity::of`] derives
/// the name from a Rust type, which is the usual way to refer to a trait object
/// contract such as `dyn Repository`.
#[derive( Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord )]
pub struct Identity( Cow<'static, str> );

impl Identity {

    /// Identity named after the type `T`.
    pub fn of<T: ?Sized>() -> Self {
        Self( Cow::Borrowed( std::any::type_name::<T>() ))
    }

    /// Identity with an explicit name.
    pub fn named( name: impl Into<Cow<'static, str>> ) -> Self {
        Self( name.into() )
    }

    #[inline] pub fn name( &self ) -> &str { &self.0 }

}

impl std::fmt::Display for Identity {
    fn fmt( &self, f: &mut std::fmt::Formatter<'_> ) -> std::fmt::Result { write!( f, "{}", self.0 )}
}

impl From<&'static str> for Identity {
    fn from( name: &'static str ) -> Self { Self::named( name )}
}

/// A shared, type-erased `Arc<T>`.
///
/// Cloning is cheap and every clone points at the same underlying value.
#[derive( Clone )]
pub struct PublicReference {
    reference: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl PublicReference {

    /// Erases the type of `reference`. `T` may be unsized, e.g. `dyn Trait`.
    pub fn new<T>( reference: Arc<T> ) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Self { reference: Arc::new( reference ), type_name: std::any::type_name::<T>() }
    }

    /// Recovers the `Arc<T>` this reference was created from.
    ///
    /// Returns `None` if `T` is not exactly the type the reference was created with.
    pub fn downcast<T>( &self ) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.reference.downcast_ref::<Arc<T>>().cloned()
    }

    /// Name of the type this reference was created with.
    #[inline] pub fn type_name( &self ) -> &'static str { self.type_name }

}

impl std::fmt::Debug for PublicReference {
    fn fmt( &self, f: &mut std::fmt::Formatter<'_> ) -> std::fmt::Result {
        f.debug_struct( "PublicReference" )
            .field( "type_name", &self.type_name )
            .finish_non_exhaustive()
    }
}



#[cfg( test )]
mod tests {

    use super::* ;

    trait Greeter: Send + Sync { fn greet( &self ) -> &'static str ; }
    struct English ;
    impl Greeter for English { fn greet( &self ) -> &'static str { "hello" }}

    #[test]
    fn downcast_recovers_trait_object() {
        let reference = PublicReference::new( Arc::new( English ) as Arc<dyn Greeter> );
        let greeter = reference.downcast::<dyn Greeter>().expect( "same type" );
        assert_eq!( greeter.greet(), "hello" );
        assert!( reference.downcast::<English>().is_none() );
    }

    #[test]
    fn identity_of_type_matches_type_name() {
        assert_eq!( Identity::of::<dyn Greeter>().name(), std::any::type_name::<dyn Greeter>() );
        assert_eq!( Identity::named( "greeter" ), Identity::from( "greeter" ));
    }

}
