pub mod nodes {

	use std::sync::Arc ;
	use std::sync::atomic::{ AtomicBool, Ordering };
	use plugin_deploy::{ BoxError, Component, ComponentConfiguration, Dependency, Injectable };
	use crate::recorder::Recorder ;

	/// The contract every test node is published under.
	pub trait Service: Send + Sync {
		fn name( &self ) -> &'static str ;
		fn is_initialized( &self ) -> bool ;
	}

	#[derive( Debug, Clone, Copy, PartialEq, Eq )]
	pub enum Failure { None, Create, DeclarePanic, Initialize, InitializePanic, Finish }

	/// A component named `name`, published as `dyn Service` under that name,
	/// depending on other nodes by name.
	pub struct Node {
		name: &'static str,
		dependencies: Vec<Dependency<dyn Service>>,
		failure: Failure,
		initialized: AtomicBool,
		recorder: Recorder,
	}

	impl Service for Node {
		fn name( &self ) -> &'static str { self.name }
		fn is_initialized( &self ) -> bool { self.initialized.load( Ordering::SeqCst ) }
	}

	impl Component for Node {

		fn dependencies( &self ) -> Vec<&dyn Injectable> {
			if self.failure == Failure::DeclarePanic { panic!( "{} panicked declaring dependencies", self.name ) }
			self.dependencies.iter().map(| dependency | dependency as &dyn Injectable ).collect()
		}

		fn initialize( &self ) -> Result<(), BoxError> {
			for dependency in &self.dependencies {
				let dependency = dependency.get().ok_or( "dependency was not injected" )?;
				if !dependency.is_initialized() {
					return Err( format!( "{} received uninitialized {}", self.name, dependency.name() ).into() );
				}
			}
			match self.failure {
				Failure::Initialize => return Err( format!( "{} refused to initialize", self.name ).into() ),
				Failure::InitializePanic => panic!( "{} panicked during initialize", self.name ),
				_ => {},
			}
			self.initialized.store( true, Ordering::SeqCst );
			self.recorder.record( format!( "init:{}", self.name ));
			Ok(())
		}

		fn finish( &self ) -> Result<(), BoxError> {
			self.recorder.record( format!( "finish:{}", self.name ));
			match self.failure {
				Failure::Finish => Err( format!( "{} refused to finish", self.name ).into() ),
				_ => Ok(()),
			}
		}

	}

	pub fn node( recorder: &Recorder, name: &'static str, dependencies: &[&'static str] ) -> ComponentConfiguration {
		failing_node( recorder, name, dependencies, Failure::None )
	}

	pub fn failing_node(
		recorder: &Recorder,
		name: &'static str,
		dependencies: &[&'static str],
		failure: Failure,
	) -> ComponentConfiguration {
		let recorder = recorder.clone();
		let dependencies = dependencies.to_vec();
		ComponentConfiguration::public::<dyn Service, Node, _, _>( move || {
			if failure == Failure::Create { return Err( format!( "{} refused to be created", name ).into() ) }
			recorder.record( format!( "create:{}", name ));
			Ok( Node {
				name,
				dependencies: dependencies.iter().map(| dependency | Dependency::named( *dependency )).collect(),
				failure,
				initialized: AtomicBool::new( false ),
				recorder: recorder.clone(),
			})
		}, | node | node as Arc<dyn Service> ).with_public_identity( name )
	}

}
