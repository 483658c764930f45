//! A dependency container and a leak-resistant plugin deployment runtime.
//!
//! The crate has two halves that are usually used together: a [`Container`] that
//! builds long-lived host components in dependency order, and an [`Engine`]
//! (itself such a component) that deploys plugin code into isolated execution
//! contexts and hands out handles to the plugins inside.
//!
//! # Core Concepts
//!
//! - [`ComponentConfiguration`]: How to build a [`Component`], whether it is public
//! 	(requested by an [`Identity`], usually a trait object) or private, and
//! 	whether its failures abort startup (**fail-on-error**) or merely leave it out.
//!
//! - [`Dependency`]: A typed slot a component exposes through
//! 	[`Component::dependencies`]. The container fills every slot with a fully
//! 	initialised public component before the requester's own lifecycle-init runs.
//! 	Dependency cycles always abort startup and report the offending chain.
//!
//! - [`ExecutionContext`]: The isolated namespace plugin code lives in. It resolves
//! 	plugin type names to [`PluginType`]s and is entered for the duration of every
//! 	call into plugin code.
//!
//! - [`Deployment`]: One context's plugin registry. It holds the **only** strong
//! 	references to the plugins it instantiates, at most one per name.
//!
//! - [`PluginHandle`]: A weak handle to a deployed plugin. Calling through a handle
//! 	whose deployment was torn down fails with [`PluginUndeployed`] instead of
//! 	reaching a stale plugin, and no handle ever keeps a context alive.
//!
//! - [`Veto`]: The token [`DeploymentListener`]s receive before a classpath is
//! 	undeployed. Any listener may block the undeploy with it.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc ;
//! use plugin_deploy::{
//! 	BoxError, Classpath, Container, Engine, ExecutionContext, LocalContext, Plugin, PluginType,
//! };
//!
//! trait Greeter: Send + Sync { fn greet( &self, name: &str ) -> String ; }
//!
//! struct English ;
//! impl Plugin for English {}
//! impl Greeter for English {
//! 	fn greet( &self, name: &str ) -> String { format!( "Hello, {}!", name ) }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut container = Container::new();
//! container.add_public_component::<Engine, _, _, _>(
//! 	|| Ok( Engine::new(| classpath: &Classpath | -> Result<Arc<dyn ExecutionContext>, BoxError> {
//! 		let context = LocalContext::new( classpath.id().to_string() ).with_type(
//! 			PluginType::concrete( "greeter.English", || Ok( English ))
//! 				.implementing::<dyn Greeter, English>(| plugin | plugin as Arc<dyn Greeter> ),
//! 		);
//! 		Ok( Arc::new( context ) as Arc<dyn ExecutionContext> )
//! 	})),
//! 	| engine | engine,
//! );
//! container.initialize()?;
//!
//! let engine = container.lookup::<Engine>()?;
//! let classpath = Classpath::new( "plugins/greeter" );
//! engine.deploy_plugin( &classpath )?;
//!
//! let greeter = engine.get_plugin::<dyn Greeter>( &classpath, "greeter.English", None )?;
//! assert_eq!( greeter.invoke(| greeter | greeter.greet( "world" ))?, "Hello, world!" );
//!
//! engine.undeploy_plugin( &classpath )?;
//! assert!( greeter.invoke(| greeter | greeter.greet( "world" )).is_err() );
//! # drop( engine );
//! container.finish();
//! # Ok(())
//! # }
//! ```

mod identity ;
mod component ;
mod configuration ;
mod container ;
mod manifest ;
mod context ;
mod plugin ;
mod plugin_handle ;
mod deployment ;
mod veto ;
mod multicast ;
mod engine ;
mod utils ;

pub use identity::{ Identity, PublicReference };
pub use component::{ BoxError, Component, Dependency, Injectable, InjectionError };
pub use configuration::ComponentConfiguration ;
pub use container::{ Container, ContainerError, ContainerListener, ComponentStatus, DependencyChain };
pub use manifest::{ ContainerManifest, ComponentEntry, ComponentCatalog, ManifestError };
pub use context::{ ExecutionContext, ContextGuard, LocalContext, LeakProbe, PluginType, TypeShape, TypeLookupError };
pub use plugin::{ Plugin, LifecycleHook };
pub use plugin_handle::{ PluginHandle, HandleState, PluginUndeployed };
pub use deployment::{ Deployment, PluginError };
pub use veto::{ Veto, VetoClosed };
pub use engine::{ Engine, EngineError, Classpath, ClasspathId, CodeLocation, ContextFactory, DeploymentListener };
pub use utils::{ PartialSuccess, Panicked };
