use std::sync::Arc ;
use plugin_deploy::{ Classpath, EngineError, HandleState };
use crate::listeners::Gatekeeper ;
use crate::plugins::{ engine, Greeter, ENGLISH };
use crate::recorder::Recorder ;

#[test]
fn veto_then_undeploy() {

	let recorder = Recorder::default();
	let engine = engine( &recorder );
	let gatekeeper = Arc::new( Gatekeeper::new( &recorder, false ));
	engine.add_listener( gatekeeper.clone() );

	let classpath = Classpath::new( "lib/greeting.jar" ).with( "lib/support.jar" );
	engine.deploy_plugin( &classpath ).unwrap();

	let greeter = engine.get_plugin::<dyn Greeter>( &classpath, ENGLISH, None ).unwrap();
	let same = engine.get_plugin::<dyn Greeter>( &classpath, ENGLISH, None ).unwrap();
	assert!( greeter.ptr_eq( &same ));

	gatekeeper.set_vetoing( true );
	assert!( matches!( engine.undeploy_plugin( &classpath ), Err( EngineError::UndeployVeto( _ ))));
	assert_eq!( greeter.invoke(| greeter | greeter.greet( "still here" )).unwrap().unwrap(), "Hello, still here!" );

	gatekeeper.set_vetoing( false );
	let probe = engine.undeploy_plugin( &classpath ).unwrap();

	let error = greeter.invoke(| greeter | greeter.greet( "gone" )).unwrap_err();
	assert_eq!( error.name, ENGLISH );
	assert_eq!( same.state(), HandleState::Undeployed );
	assert!( probe.is_collected() );
	assert_eq!( recorder.filtered( "undeployed:" ), vec![ "lib/greeting.jar:lib/support.jar" ]);

}
