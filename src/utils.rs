//! Small helpers for accumulate-and-continue error handling.
//!
//! Several operations in this crate keep going after an individual part fails:
//! manifest entries that name unknown implementations, shutdown hooks that throw,
//! listeners that panic. These helpers give those paths a common shape.

use std::panic::{ catch_unwind, AssertUnwindSafe };

use crate::component::BoxError ;



/// Represents a successful operation where some parts failed but didn't prevent overall success.
/// The `Vec<E>` contains errors from the failed parts that were handled gracefully.
pub type PartialSuccess<T, E> = ( T, Vec<E> );

/// Builder-style appends for collections threaded through folds.
pub(crate) trait Merge<T> {
    fn merge( self, item: T ) -> Self ;
}

impl<T> Merge<T> for Vec<T> {
    fn merge( mut self, item: T ) -> Self {
        self.push( item );
        self
    }
}

/// Raised in place of a panic that escaped user supplied lifecycle code.
#[derive( Debug, thiserror::Error )]
#[error( "Panicked: {0}" )]
pub struct Panicked( pub String );

/// Runs `f`, turning a panic into an error so one misbehaving callee cannot
/// unwind through a best-effort loop.
pub(crate) fn catch_panic<T>( f: impl FnOnce() -> Result<T, BoxError> ) -> Result<T, BoxError> {
    catch_panic_as( f, | panicked | Box::new( panicked ) as BoxError )
}

/// [`catch_panic`] for callees with their own error type.
pub(crate) fn catch_panic_as<T, E>( f: impl FnOnce() -> Result<T, E>, on_panic: impl FnOnce( Panicked ) -> E ) -> Result<T, E> {
    match catch_unwind( AssertUnwindSafe( f )) {
        Ok( result ) => result,
        Err( payload ) => Err( on_panic( Panicked( panic_message( payload.as_ref() )))),
    }
}

fn panic_message( payload: &( dyn std::any::Any + Send )) -> String {
    payload.downcast_ref::<&str>().map(| message | ( *message ).to_string() )
        .or_else(|| payload.downcast_ref::<String>().cloned() )
        .unwrap_or_else(|| "<non-string panic payload>".to_string() )
}



#[cfg( test )]
mod tests {

    use super::* ;

    #[test]
    fn catch_panic_reports_message() {
        let result: Result<(), BoxError> = catch_panic(|| panic!( "boom" ));
        assert_eq!( result.unwrap_err().to_string(), "Panicked: boom" );
    }

    #[test]
    fn catch_panic_as_maps_into_callee_error() {
        let result: Result<(), String> = catch_panic_as(|| panic!( "{}", 42 ), | panicked | panicked.0 );
        assert_eq!( result, Err( "42".to_string() ));
    }

    #[test]
    fn merge_appends_in_order() {
        let merged = vec![ 1 ].merge( 2 ).merge( 3 );
        assert_eq!( merged, vec![ 1, 2, 3 ]);
    }

}
