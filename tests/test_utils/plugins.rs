pub mod plugins {

	use std::sync::Arc ;
	use std::sync::atomic::{ AtomicUsize, Ordering };
	use plugin_deploy::{
		BoxError, Classpath, Engine, ExecutionContext, LifecycleHook, LocalContext, Plugin, PluginType, TypeShape,
	};
	use crate::recorder::Recorder ;

	pub const ENGLISH: &str = "com.example.English" ;
	pub const TALLY: &str = "com.example.Tally" ;
	pub const STUBBORN: &str = "com.example.Stubborn" ;
	pub const BROKEN: &str = "com.example.Broken" ;
	pub const MISLABELED: &str = "com.example.Mislabeled" ;
	pub const ABSTRACT: &str = "com.example.AbstractGreeter" ;
	pub const INTERFACE: &str = "com.example.Greeter" ;
	pub const FOREIGN: &str = "com.example.Utilities" ;

	#[derive( Debug, Clone, PartialEq, Eq )]
	pub struct GreetError( pub String );

	pub trait Greeter: Send + Sync {
		fn greet( &self, name: &str ) -> Result<String, GreetError> ;
	}

	pub trait Counter: Send + Sync {
		fn increment( &self ) -> usize ;
	}

	pub struct English { recorder: Recorder }

	impl Plugin for English {
		fn initialize( &self ) -> Result<(), BoxError> {
			self.recorder.record( "English initialize" );
			Ok(())
		}
		fn finish( &self ) -> Result<(), BoxError> {
			self.recorder.record( "English finish" );
			Ok(())
		}
	}

	impl Greeter for English {
		fn greet( &self, name: &str ) -> Result<String, GreetError> {
			match name.is_empty() {
				true => Err( GreetError( "nobody to greet".to_string() )),
				false => Ok( format!( "Hello, {}!", name )),
			}
		}
	}

	/// Counts calls; implements two contracts.
	#[derive( Default )]
	pub struct Tally { count: AtomicUsize }

	impl Plugin for Tally {
		fn finish( &self ) -> Result<(), BoxError> { Err( "tally refuses to finish".into() ) }
	}

	impl Counter for Tally {
		fn increment( &self ) -> usize { self.count.fetch_add( 1, Ordering::SeqCst ) + 1 }
	}

	impl Greeter for Tally {
		fn greet( &self, _name: &str ) -> Result<String, GreetError> { Ok( self.increment().to_string() ) }
	}

	/// Fails its lifecycle-init.
	pub struct Stubborn { recorder: Recorder }

	impl Plugin for Stubborn {
		fn initialize( &self ) -> Result<(), BoxError> {
			self.recorder.record( "Stubborn initialize" );
			Err( "stubborn refuses to start".into() )
		}
	}

	impl Greeter for Stubborn {
		fn greet( &self, _name: &str ) -> Result<String, GreetError> { Ok( String::new() ) }
	}

	/// A context holding every fixture plugin type.
	pub fn context( name: &str, recorder: &Recorder ) -> LocalContext {
		let english = recorder.clone();
		let stubborn = recorder.clone();
		LocalContext::new( name )
			.with_type( PluginType::concrete( ENGLISH, move || Ok( English { recorder: english.clone() }))
				.implementing::<dyn Greeter, English>(| plugin | plugin as Arc<dyn Greeter> ))
			.with_type( PluginType::concrete( TALLY, || Ok( Tally::default() ))
				.implementing::<dyn Counter, Tally>(| plugin | plugin as Arc<dyn Counter> )
				.implementing::<dyn Greeter, Tally>(| plugin | plugin as Arc<dyn Greeter> ))
			.with_type( PluginType::concrete( STUBBORN, move || Ok( Stubborn { recorder: stubborn.clone() }))
				.implementing::<dyn Greeter, Stubborn>(| plugin | plugin as Arc<dyn Greeter> ))
			.with_type( PluginType::concrete( BROKEN, || Err::<English, BoxError>( "missing native library".into() ))
				.implementing::<dyn Greeter, English>(| plugin | plugin as Arc<dyn Greeter> ))
			.with_type( PluginType::concrete( MISLABELED, || Ok( Tally::default() ))
				.implementing::<dyn Greeter, English>(| plugin | plugin as Arc<dyn Greeter> ))
			.with_type( PluginType::uninstantiable( ABSTRACT, TypeShape::Abstract ))
			.with_type( PluginType::uninstantiable( INTERFACE, TypeShape::Interface ))
			.with_type( PluginType::uninstantiable( FOREIGN, TypeShape::Foreign ))
	}

	/// An engine deploying every classpath into a fresh fixture context.
	/// Classpaths with a location under `missing/` fail to load.
	pub fn engine( recorder: &Recorder ) -> Engine {
		let recorder = recorder.clone();
		Engine::new( move | classpath: &Classpath | -> Result<Arc<dyn ExecutionContext>, BoxError> {
			if classpath.locations().iter().any(| location | location.0.starts_with( "missing" )) {
				return Err( format!( "cannot read {}", classpath.id() ).into() );
			}
			recorder.record( format!( "context:{}", classpath.id() ));
			Ok( Arc::new( context( classpath.id().as_str(), &recorder )) as Arc<dyn ExecutionContext> )
		})
	}

	/// Records both hook callbacks.
	pub struct RecordingHook( pub Recorder );

	impl LifecycleHook<dyn Greeter> for RecordingHook {
		fn pre_initialize( &self, plugin: &dyn Greeter ) {
			self.0.record( format!( "pre_initialize:{}", plugin.greet( "hook" ).unwrap_or_default() ));
		}
		fn post_finish( &self, _plugin: &dyn Greeter ) {
			self.0.record( "post_finish" );
		}
	}

}
