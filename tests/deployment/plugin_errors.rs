use std::sync::Arc ;
use plugin_deploy::{ Deployment, Identity, PluginError, TypeLookupError, TypeShape };
use crate::plugins::{
	context, Counter, Greeter, ABSTRACT, BROKEN, ENGLISH, FOREIGN, INTERFACE, MISLABELED, STUBBORN, TALLY,
};
use crate::recorder::Recorder ;

fn deployment() -> ( Deployment, Recorder ) {
	let recorder = Recorder::default();
	( Deployment::new( Arc::new( context( "errors", &recorder ))), recorder )
}

#[test]
fn unknown_name_is_not_found() {
	let ( deployment, _ ) = deployment();
	match deployment.get_plugin::<dyn Greeter>( "com.example.Nowhere", None ) {
		Err( PluginError::NotFound { name, source: TypeLookupError::NotFound( _ ) }) => assert_eq!( name, "com.example.Nowhere" ),
		other => panic!( "Expected not found, got {:?}", other ),
	}
}

#[test]
fn uninstantiable_types_are_rejected() {
	let ( deployment, _ ) = deployment();
	assert!( matches!(
		deployment.get_plugin::<dyn Greeter>( ABSTRACT, None ),
		Err( PluginError::NotConcrete { shape: TypeShape::Abstract, .. }),
	));
	assert!( matches!(
		deployment.get_plugin::<dyn Greeter>( INTERFACE, None ),
		Err( PluginError::NotConcrete { shape: TypeShape::Interface, .. }),
	));
	assert!( matches!(
		deployment.get_plugin::<dyn Greeter>( FOREIGN, None ),
		Err( PluginError::NotAPlugin { .. }),
	));
	assert!( !deployment.has_plugins() );
}

#[test]
fn undeclared_contract_is_rejected() {
	let ( deployment, _ ) = deployment();
	match deployment.get_plugin::<dyn Counter>( ENGLISH, None ) {
		Err( PluginError::ContractNotImplemented { name, contract }) => {
			assert_eq!( name, ENGLISH );
			assert_eq!( contract, Identity::of::<dyn Counter>() );
		},
		other => panic!( "Expected a contract error, got {:?}", other ),
	}
}

#[test]
fn cached_plugin_requested_as_another_contract_is_a_mismatch() {
	let ( deployment, _ ) = deployment();
	let counter = deployment.get_plugin::<dyn Counter>( TALLY, None ).unwrap();

	// Tally implements both, but the cache is keyed by the first request
	match deployment.get_plugin::<dyn Greeter>( TALLY, None ) {
		Err( PluginError::TypeMismatch { name, cached, requested }) => {
			assert_eq!( name, TALLY );
			assert_eq!( cached, Identity::of::<dyn Counter>() );
			assert_eq!( requested, Identity::of::<dyn Greeter>() );
		},
		other => panic!( "Expected a type mismatch, got {:?}", other ),
	}
	assert!( counter.ptr_eq( &deployment.get_plugin::<dyn Counter>( TALLY, None ).unwrap() ));
}

#[test]
fn factory_failure_is_an_instantiation_error() {
	let ( deployment, _ ) = deployment();
	match deployment.get_plugin::<dyn Greeter>( BROKEN, None ) {
		Err( PluginError::Instantiation { name, source }) => {
			assert_eq!( name, BROKEN );
			assert_eq!( source.to_string(), "missing native library" );
		},
		other => panic!( "Expected an instantiation error, got {:?}", other ),
	}
}

#[test]
fn failed_initialization_is_not_cached() {
	let ( deployment, recorder ) = deployment();

	assert!( matches!( deployment.get_plugin::<dyn Greeter>( STUBBORN, None ), Err( PluginError::Initialization { .. })));
	assert!( matches!( deployment.get_plugin::<dyn Greeter>( STUBBORN, None ), Err( PluginError::Initialization { .. })));

	assert_eq!( recorder.events(), vec![ "Stubborn initialize", "Stubborn initialize" ]);
	assert!( !deployment.has_plugins() );
}

#[test]
#[should_panic( expected = "does not implement it" )]
fn instance_violating_its_declared_contract_is_fatal() {
	let ( deployment, _ ) = deployment();
	let _ = deployment.get_plugin::<dyn Greeter>( MISLABELED, None );
}
