use plugin_deploy::{ ComponentCatalog, ComponentStatus, Container, ContainerManifest, Identity, ManifestError };
use crate::nodes::{ failing_node, node, Failure, Service };
use crate::recorder::Recorder ;

fn catalog( recorder: &Recorder ) -> ComponentCatalog {
	ComponentCatalog::new()
		.with( "storage", node( recorder, "storage", &[] ))
		.with( "api", node( recorder, "api", &[ "storage" ]))
		.with( "metrics", failing_node( recorder, "metrics", &[], Failure::Initialize ))
}

#[test]
fn manifest_entries_become_configurations_in_order() {

	let recorder = Recorder::default();
	let manifest = r#"
		[[component]]
		implementation = "api"

		[[component]]
		implementation = "storage"
	"#.parse::<ContainerManifest>().unwrap();

	let ( container, errors ) = Container::from_manifest( &manifest, &catalog( &recorder ));

	assert!( errors.is_empty() );
	assert_eq!(
		container.configurations().iter().map(| configuration | configuration.identity().clone() ).collect::<Vec<_>>(),
		vec![ Identity::named( "api" ), Identity::named( "storage" )],
	);

	container.initialize().unwrap();
	assert_eq!( recorder.filtered( "init:" ), vec![ "storage", "api" ]);
	assert_eq!( container.get_component::<dyn Service>( &"api".into() ).unwrap().name(), "api" );

}

#[test]
fn fail_on_error_can_be_relaxed_per_entry() {

	let recorder = Recorder::default();
	let manifest = r#"
		[[component]]
		implementation = "storage"

		[[component]]
		implementation = "metrics"
		fail-on-error = false
	"#.parse::<ContainerManifest>().unwrap();

	let ( container, errors ) = Container::from_manifest( &manifest, &catalog( &recorder ));
	assert!( errors.is_empty() );

	container.initialize().unwrap();
	assert_eq!( container.statuses(), vec![
		( Identity::named( "storage" ), ComponentStatus::Initialized ),
		( Identity::named( "metrics" ), ComponentStatus::Unavailable ),
	]);

}

#[test]
fn public_identity_can_be_renamed() {

	let recorder = Recorder::default();
	let manifest = r#"
		[[component]]
		implementation = "storage"
		public-identity = "primary-storage"
	"#.parse::<ContainerManifest>().unwrap();

	let ( container, _ ) = Container::from_manifest( &manifest, &catalog( &recorder ));
	container.initialize().unwrap();

	assert!( container.get_component::<dyn Service>( &"primary-storage".into() ).is_ok() );
	assert!( container.get_component::<dyn Service>( &"storage".into() ).is_err() );

}

#[test]
fn unknown_implementations_are_reported_and_skipped() {

	let recorder = Recorder::default();
	let manifest = r#"
		[[component]]
		implementation = "storage"

		[[component]]
		implementation = "cache"

		[[component]]
		implementation = "queue"

		[[component]]
		implementation = "storage"
	"#.parse::<ContainerManifest>().unwrap();

	let ( container, errors ) = Container::from_manifest( &manifest, &catalog( &recorder ));

	assert_eq!( errors.len(), 2 );
	assert!( matches!( &errors[0], ManifestError::UnknownImplementation( name ) if name == "cache" ));
	assert!( matches!( &errors[1], ManifestError::UnknownImplementation( name ) if name == "queue" ));
	// the duplicate storage entry is ignored
	assert_eq!( container.configurations().len(), 1 );

}
