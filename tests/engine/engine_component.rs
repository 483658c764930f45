use std::sync::Arc ;
use plugin_deploy::{ Classpath, Container, Engine };
use crate::listeners::Gatekeeper ;
use crate::plugins::{ engine, Greeter, ENGLISH };
use crate::recorder::Recorder ;

#[test]
fn container_shutdown_force_undeploys_everything() {

	let recorder = Recorder::default();
	let mut container = Container::new();
	let factory_recorder = recorder.clone();
	container.add_public_component::<Engine, _, _, _>( move || Ok( engine( &factory_recorder )), | engine | engine );
	container.initialize().unwrap();

	let engine = container.lookup::<Engine>().unwrap();
	// a veto does not apply to shutdown
	engine.add_listener( Arc::new( Gatekeeper::new( &recorder, true )));
	let classpath = Classpath::new( "plugins/a" );
	engine.deploy_plugin( &classpath ).unwrap();
	let greeter = engine.get_plugin::<dyn Greeter>( &classpath, ENGLISH, None ).unwrap();

	container.finish();

	assert!( engine.deployed().is_empty() );
	assert!( greeter.invoke(| greeter | greeter.greet( "anyone" )).is_err() );
	assert!( recorder.filtered( "undeploying:" ).is_empty() );
	assert_eq!( recorder.filtered( "undeployed:" ), vec![ "plugins/a" ]);
	assert!( recorder.position( "English finish" ).unwrap() < recorder.position( "undeployed:plugins/a" ).unwrap() );

}
