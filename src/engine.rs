//! The host-side owner of every deployment.
//!
//! An [`Engine`] maps each deployed [`Classpath`] to the [`Deployment`] of the
//! execution context created for it. Deploy, undeploy, redeploy and plugin
//! requests are serialised behind one lock, so no caller ever observes a
//! half-registered or half-torn-down deployment.
//!
//! Undeploying runs the veto protocol: every [`DeploymentListener`] is told the
//! classpath is about to go away and may block it through the [`Veto`] it is
//! handed. A vetoed undeploy leaves the deployment untouched.

use std::collections::HashMap ;
use std::path::{ Path, PathBuf };
use std::sync::{ Arc, Mutex, MutexGuard, RwLock, PoisonError };
use itertools::Itertools ;
use nonempty_collections::NEVec ;
use pipe_trait::Pipe ;
use thiserror::Error ;
use tracing::{ debug, info, warn };

use crate::component::{ BoxError, Component };
use crate::context::{ ExecutionContext, LeakProbe };
use crate::deployment::{ Deployment, PluginError };
use crate::multicast::multicast_silently ;
use crate::plugin::LifecycleHook ;
use crate::plugin_handle::PluginHandle ;
use crate::veto::Veto ;



/// A single location plugin code is loaded from.
#[derive( Debug, Clone, PartialEq, Eq, Hash )]
pub struct CodeLocation( pub PathBuf );

impl From<PathBuf> for CodeLocation {
    fn from( path: PathBuf ) -> Self { Self( path )}
}

impl From<&Path> for CodeLocation {
    fn from( path: &Path ) -> Self { Self( path.to_path_buf() )}
}

impl From<&str> for CodeLocation {
    fn from( path: &str ) -> Self { Self( PathBuf::from( path ))}
}

impl std::fmt::Display for CodeLocation {
    fn fmt( &self, f: &mut std::fmt::Formatter ) -> std::fmt::Result { write!( f, "{}", self.0.display() )}
}

/// An ordered, non-empty set of code locations deployed together.
#[derive( Debug, Clone )]
pub struct Classpath {
    locations: NEVec<CodeLocation>,
}

impl Classpath {

    pub fn new( first: impl Into<CodeLocation> ) -> Self {
        Self { locations: NEVec::new( first.into() ) }
    }

    /// Appends `location`, keeping the first occurrence of duplicates.
    pub fn with( mut self, location: impl Into<CodeLocation> ) -> Self {
        let location = location.into();
        if !self.locations().contains( &&location ) { self.locations.push( location ) }
        self
    }

    pub fn locations( &self ) -> Vec<&CodeLocation> {
        self.locations.iter().into_iter().collect()
    }

    /// The identity deployments of this classpath are registered under.
    pub fn id( &self ) -> ClasspathId {
        self.locations.iter().into_iter().join( ":" ).pipe( ClasspathId )
    }

}

/// The identity of a deployed classpath: its locations joined in order.
#[derive( Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash )]
pub struct ClasspathId( String );

impl ClasspathId {
    #[inline] pub fn as_str( &self ) -> &str { &self.0 }
}

impl std::fmt::Display for ClasspathId {
    fn fmt( &self, f: &mut std::fmt::Formatter ) -> std::fmt::Result { write!( f, "{}", self.0 )}
}

/// Creates the isolated execution context a classpath is deployed into.
pub trait ContextFactory: Send + Sync {
    /// # Errors
    /// Fails if the classpath cannot be loaded.
    fn create( &self, classpath: &Classpath ) -> Result<Arc<dyn ExecutionContext>, BoxError> ;
}

impl<F> ContextFactory for F
where
    F: Fn( &Classpath ) -> Result<Arc<dyn ExecutionContext>, BoxError> + Send + Sync,
{
    fn create( &self, classpath: &Classpath ) -> Result<Arc<dyn ExecutionContext>, BoxError> { self( classpath )}
}

/// Observes deployments coming and going.
///
/// Failures and panics of a listener are logged and ignored.
pub trait DeploymentListener: Send + Sync {

    fn classpath_deployed( &self, _classpath: &Classpath ) -> Result<(), BoxError> { Ok(()) }

    /// Called before a classpath is undeployed. Calling [`Veto::veto`] blocks it.
    fn classpath_undeploying( &self, _classpath: &Classpath, _veto: &Veto ) -> Result<(), BoxError> { Ok(()) }

    /// Called after the deployment has been torn down. Nothing can be blocked anymore.
    fn classpath_undeployed( &self, _classpath: &Classpath ) -> Result<(), BoxError> { Ok(()) }

}

#[derive( Debug, Error )]
pub enum EngineError {

    #[error( "Classpath {0} is not deployed" )]
    NotDeployed( ClasspathId ),

    #[error( "Failed to create an execution context for {classpath}: {source}" )]
    ContextCreation { classpath: ClasspathId, #[source] source: BoxError },

    /// A listener blocked the undeploy. The deployment is unchanged.
    #[error( "Undeploy of {0} was vetoed" )]
    UndeployVeto( ClasspathId ),

    #[error( transparent )]
    Plugin( #[from] PluginError ),

}

struct Deployed {
    classpath: Classpath,
    deployment: Arc<Deployment>,
}

type Deployments = HashMap<ClasspathId, Deployed> ;

/// Deploys classpaths into isolated contexts and hands out plugin handles.
pub struct Engine {
    context_factory: Box<dyn ContextFactory>,
    deployments: Mutex<Deployments>,
    listeners: RwLock<Vec<Arc<dyn DeploymentListener>>>,
}

impl Engine {

    pub fn new( context_factory: impl ContextFactory + 'static ) -> Self {
        Self {
            context_factory: Box::new( context_factory ),
            deployments: Mutex::new( HashMap::new() ),
            listeners: RwLock::new( Vec::new() ),
        }
    }

    pub fn add_listener( &self, listener: Arc<dyn DeploymentListener> ) {
        self.listeners.write().unwrap_or_else( PoisonError::into_inner ).push( listener );
    }

    /// Returns `true` if `listener` was registered.
    pub fn remove_listener( &self, listener: &Arc<dyn DeploymentListener> ) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else( PoisonError::into_inner );
        let before = listeners.len();
        listeners.retain(| registered | !Arc::ptr_eq( registered, listener ));
        listeners.len() != before
    }

    /// Ids of every deployed classpath, sorted.
    pub fn deployed( &self ) -> Vec<ClasspathId> {
        self.lock().keys().cloned().sorted().collect()
    }

    pub fn is_deployed( &self, classpath: &Classpath ) -> bool {
        self.lock().contains_key( &classpath.id() )
    }

    /// Deploys `classpath` into a fresh execution context.
    ///
    /// Deploying an already deployed classpath is a no-op.
    ///
    /// # Errors
    /// [`EngineError::ContextCreation`] if the context factory fails.
    pub fn deploy_plugin( &self, classpath: &Classpath ) -> Result<ClasspathId, EngineError> {
        let mut deployments = self.lock();
        self.deploy_locked( &mut deployments, classpath )
    }

    /// Tears the deployment of `classpath` down unless a listener vetoes it.
    ///
    /// The returned probe reports whether the torn down context became
    /// unreachable.
    ///
    /// # Errors
    /// - [`EngineError::NotDeployed`] if the classpath is not deployed
    /// - [`EngineError::UndeployVeto`] if a listener vetoed; the deployment and
    ///   every handle it issued stay valid
    pub fn undeploy_plugin( &self, classpath: &Classpath ) -> Result<LeakProbe, EngineError> {
        let mut deployments = self.lock();
        self.undeploy_locked( &mut deployments, classpath )
    }

    /// Undeploys `classpath` if deployed, then deploys it into a new context.
    ///
    /// # Errors
    /// As [`undeploy_plugin`]( Self::undeploy_plugin ) and
    /// [`deploy_plugin`]( Self::deploy_plugin ), except that redeploying a
    /// classpath that was never deployed is not an error.
    pub fn redeploy_plugin( &self, classpath: &Classpath ) -> Result<ClasspathId, EngineError> {
        let mut deployments = self.lock();
        if deployments.contains_key( &classpath.id() ) {
            self.undeploy_locked( &mut deployments, classpath )?;
        }
        self.deploy_locked( &mut deployments, classpath )
    }

    /// Requests the plugin type `name` from the deployment of `classpath`.
    ///
    /// # Errors
    /// [`EngineError::NotDeployed`] if the classpath is not deployed, otherwise
    /// whatever [`Deployment::get_plugin`] reports.
    pub fn get_plugin<T>(
        &self,
        classpath: &Classpath,
        name: &str,
        hook: Option<Arc<dyn LifecycleHook<T>>>,
    ) -> Result<PluginHandle<T>, EngineError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let deployments = self.lock();
        let id = classpath.id();
        let Deployed { deployment, .. } = deployments.get( &id ).ok_or( EngineError::NotDeployed( id ))?;
        Ok( deployment.get_plugin( name, hook )? )
    }

    fn deploy_locked( &self, deployments: &mut Deployments, classpath: &Classpath ) -> Result<ClasspathId, EngineError> {

        let id = classpath.id();
        if deployments.contains_key( &id ) {
            debug!( classpath = %id, "Classpath already deployed" );
            return Ok( id );
        }

        let deployment = self.context_factory.create( classpath )
            .map_err(| source | EngineError::ContextCreation { classpath: id.clone(), source })?
            .pipe( Deployment::new )
            .pipe( Arc::new );
        deployments.insert( id.clone(), Deployed { classpath: classpath.clone(), deployment });
        info!( classpath = %id, "Classpath deployed" );

        self.notify( "classpath_deployed", | listener | listener.classpath_deployed( classpath ));
        Ok( id )

    }

    fn undeploy_locked( &self, deployments: &mut Deployments, classpath: &Classpath ) -> Result<LeakProbe, EngineError> {

        let id = classpath.id();
        if !deployments.contains_key( &id ) { return Err( EngineError::NotDeployed( id ))}

        let veto = Veto::new();
        self.notify( "classpath_undeploying", | listener | listener.classpath_undeploying( classpath, &veto ));
        if !veto.is_confirmed() {
            info!( classpath = %id, "Undeploy vetoed" );
            return Err( EngineError::UndeployVeto( id ));
        }

        let Some( deployed ) = deployments.remove( &id ) else { return Err( EngineError::NotDeployed( id ))};
        Ok( self.tear_down( deployed ))

    }

    fn tear_down( &self, Deployed { classpath, deployment }: Deployed ) -> LeakProbe {
        let probe = deployment.context_probe();
        deployment.finish();
        drop( deployment );
        info!( classpath = %classpath.id(), collected = probe.is_collected(), "Classpath undeployed" );
        self.notify( "classpath_undeployed", | listener | listener.classpath_undeployed( &classpath ));
        probe
    }

    fn notify( &self, event: &'static str, notify: impl FnMut( &Arc<dyn DeploymentListener> ) -> Result<(), BoxError> ) {
        let listeners = self.listeners.read().unwrap_or_else( PoisonError::into_inner ).clone();
        multicast_silently( event, &listeners, notify );
    }

    fn lock( &self ) -> MutexGuard<'_, Deployments> {
        self.deployments.lock().unwrap_or_else( PoisonError::into_inner )
    }

}

impl Component for Engine {

    /// Undeploys everything without consulting listeners.
    fn finish( &self ) -> Result<(), BoxError> {
        let drained = self.lock().drain().map(|( _, deployed )| deployed ).collect::<Vec<_>>();
        if !drained.is_empty() { warn!( deployments = drained.len(), "Force-undeploying on shutdown" )}
        drained.into_iter().for_each(| deployed | { self.tear_down( deployed ); });
        Ok(())
    }

}

impl std::fmt::Debug for Engine {
    fn fmt( &self, f: &mut std::fmt::Formatter<'_> ) -> std::fmt::Result {
        f.debug_struct( "Engine" )
            .field( "deployed", &self.deployed() )
            .finish_non_exhaustive()
    }
}



#[cfg( test )]
mod tests {

    use super::* ;

    #[test]
    fn classpath_id_joins_locations_in_order() {
        let classpath = Classpath::new( "lib/a.jar" ).with( "lib/b.jar" ).with( "lib/a.jar" );
        assert_eq!( classpath.id().as_str(), "lib/a.jar:lib/b.jar" );
        assert_eq!( classpath.locations().len(), 2 );
    }

}
