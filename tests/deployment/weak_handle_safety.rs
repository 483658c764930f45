use std::sync::Arc ;
use plugin_deploy::{ Deployment, ExecutionContext, HandleState, LocalContext, PluginError };
use crate::plugins::{ context, Counter, Greeter, ENGLISH, TALLY };
use crate::recorder::Recorder ;

#[test]
fn handles_fail_after_finish() {

	let recorder = Recorder::default();
	let deployment = Deployment::new( Arc::new( context( "doomed", &recorder )));
	let greeter = deployment.get_plugin::<dyn Greeter>( ENGLISH, None ).unwrap();
	let clone = greeter.clone();

	deployment.finish();

	let error = greeter.invoke(| greeter | greeter.greet( "anyone" )).unwrap_err();
	assert_eq!( error.name, ENGLISH );
	assert!( clone.invoke(| greeter | greeter.greet( "anyone" )).is_err() );
	assert_eq!( greeter.state(), HandleState::Undeployed );
	assert!( matches!( greeter.initialize(), Err( PluginError::Undeployed( _ ))));
	assert!( matches!( greeter.finish(), Err( PluginError::Undeployed( _ ))));

}

#[test]
fn finish_runs_every_plugin_finish_and_ignores_failures() {

	let recorder = Recorder::default();
	let deployment = Deployment::new( Arc::new( context( "doomed", &recorder )));
	deployment.get_plugin::<dyn Counter>( TALLY, None ).unwrap();
	deployment.get_plugin::<dyn Greeter>( ENGLISH, None ).unwrap();

	deployment.finish();
	deployment.finish();

	assert_eq!( recorder.events(), vec![ "English initialize", "English finish" ]);
	assert!( deployment.is_finished() );
	assert!( !deployment.has_plugins() );
	assert!( matches!( deployment.get_plugin::<dyn Greeter>( ENGLISH, None ), Err( PluginError::Finished( _ ))));

}

#[test]
fn finish_closes_and_releases_the_context() {

	let recorder = Recorder::default();
	let context = Arc::new( context( "released", &recorder ));
	let deployment = Deployment::new( Arc::clone( &context ) as Arc<dyn ExecutionContext> );
	let greeter = deployment.get_plugin::<dyn Greeter>( ENGLISH, None ).unwrap();
	let probe = deployment.context_probe();

	assert!( !probe.is_collected() );
	deployment.finish();
	assert!( context.is_closed() );

	drop( context );
	assert!( probe.is_collected() );
	assert!( greeter.invoke(| _ | ()).is_err() );

}

#[test]
fn handles_never_keep_the_context_alive() {

	let recorder = Recorder::default();
	let context: Arc<LocalContext> = Arc::new( context( "weak", &recorder ));
	let deployment = Deployment::new( Arc::clone( &context ) as Arc<dyn ExecutionContext> );
	let handles = ( 0..4 ).map(| _ | deployment.get_plugin::<dyn Greeter>( ENGLISH, None ).unwrap() ).collect::<Vec<_>>();

	// the test's own reference and the deployment's
	assert_eq!( Arc::strong_count( &context ), 2 );
	deployment.finish();
	assert_eq!( Arc::strong_count( &context ), 1 );
	assert!( handles.iter().all(| handle | handle.invoke(| _ | ()).is_err() ));

}
