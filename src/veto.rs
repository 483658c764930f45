use std::sync::atomic::{ AtomicBool, Ordering };
use thiserror::Error ;



/// [`Veto::veto`] was called after the decision was read.
#[derive( Debug, Clone, Copy, Error )]
#[error( "The veto has already been decided" )]
pub struct VetoClosed ;

/// A single-use token letting observers block a pending teardown.
///
/// Any number of observers may call [`veto`]( Self::veto ) while the token is
/// open. [`is_confirmed`]( Self::is_confirmed ) closes it and returns the decision.
#[derive( Debug )]
pub struct Veto {
    active: AtomicBool,
    confirmed: AtomicBool,
}

impl Veto {

    pub fn new() -> Self {
        Self { active: AtomicBool::new( true ), confirmed: AtomicBool::new( true ) }
    }

    /// Blocks the pending operation.
    ///
    /// # Errors
    /// Returns [`VetoClosed`] once the decision has been read.
    pub fn veto( &self ) -> Result<(), VetoClosed> {
        if !self.active.load( Ordering::SeqCst ) { return Err( VetoClosed )}
        self.confirmed.store( false, Ordering::SeqCst );
        Ok(())
    }

    /// Closes the token and returns `true` if nobody vetoed.
    pub fn is_confirmed( &self ) -> bool {
        self.active.store( false, Ordering::SeqCst );
        self.confirmed.load( Ordering::SeqCst )
    }

}

impl Default for Veto {
    fn default() -> Self { Self::new() }
}



#[cfg( test )]
mod tests {

    use super::* ;

    #[test]
    fn unvetoed_token_confirms() {
        assert!( Veto::new().is_confirmed() );
    }

    #[test]
    fn any_veto_blocks() {
        let veto = Veto::new();
        veto.veto().unwrap();
        veto.veto().unwrap();
        assert!( !veto.is_confirmed() );
    }

    #[test]
    fn veto_after_decision_is_rejected() {
        let veto = Veto::new();
        assert!( veto.is_confirmed() );
        assert!( veto.veto().is_err() );
        assert!( veto.is_confirmed() );
    }

}
