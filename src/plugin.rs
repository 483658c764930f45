//! Plugin lifecycle and the hooks a host can attach to it.

use crate::component::BoxError ;



/// The lifecycle every deployable plugin exposes.
///
/// Both operations run with the plugin's execution context active.
pub trait Plugin: Send + Sync + 'static {

    /// Lifecycle-init, run once when the plugin is first requested.
    ///
    /// # Errors
    /// A failure or panic discards the instance and is reported to the requester.
    fn initialize( &self ) -> Result<(), BoxError> { Ok(()) }

    /// Lifecycle-finish, run when the deployment is torn down.
    ///
    /// # Errors
    /// Failures during teardown are ignored.
    fn finish( &self ) -> Result<(), BoxError> { Ok(()) }

}

/// Callbacks around a plugin's lifecycle, attached once per handle.
///
/// `T` is the contract the plugin was requested as. Both callbacks run inside
/// the plugin's execution context.
pub trait LifecycleHook<T: ?Sized>: Send + Sync {
    /// Runs right before the plugin's lifecycle-init.
    fn pre_initialize( &self, _plugin: &T ) {}
    /// Runs right after the plugin's lifecycle-finish.
    fn post_finish( &self, _plugin: &T ) {}
}
