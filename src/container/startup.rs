use std::collections::HashMap ;
use std::sync::Arc ;
use tracing::{ debug, warn };

use crate::component::Component ;
use crate::configuration::{ ComponentConfiguration, Constructed };
use crate::identity::{ Identity, PublicReference };
use crate::utils::catch_panic ;
use super::{ ContainerError, ComponentStatus, ManagedComponent };
use super::dependency_path::DependencyPath ;



#[derive( Debug, Clone, Copy, PartialEq, Eq )]
enum EntryState { Created, Injected, Initialized, Dropped }

struct Entry {
    configuration: ComponentConfiguration,
    instance: Arc<dyn Component>,
    public_reference: PublicReference,
    state: EntryState,
    report_index: usize,
}

/// Working state of one container startup.
///
/// Nothing here is visible to lookups; the container publishes the outcome
/// through [`Startup::into_parts`] once the run has finished or aborted.
pub(super) struct Startup<'a> {
    configurations: &'a [ComponentConfiguration],
    entries: Vec<Entry>,
    public_components: HashMap<Identity, usize>,
    private_components: HashMap<Identity, usize>,
    initialize_order: Vec<usize>,
    report: Vec<( Identity, ComponentStatus )>,
}

/// What a startup leaves behind: initialised components in initialisation order,
/// the lookup table for the public ones, and the per component status report.
pub(super) type StartupParts = (
    Vec<ManagedComponent>,
    HashMap<Identity, PublicReference>,
    Vec<( Identity, ComponentStatus )>,
);

impl<'a> Startup<'a> {

    pub fn new( configurations: &'a [ComponentConfiguration] ) -> Self {
        Self {
            configurations,
            entries: Vec::with_capacity( configurations.len() ),
            public_components: HashMap::new(),
            private_components: HashMap::new(),
            initialize_order: Vec::new(),
            report: Vec::with_capacity( configurations.len() ),
        }
    }

    /// Runs the create, injection and sweep phases.
    ///
    /// # Errors
    /// Returns the first failure that aborts the whole startup: any failure of a
    /// component that fails on error, and every dependency cycle.
    pub fn run( &mut self ) -> Result<(), ContainerError> {

        self.create()?;

        for index in 0..self.entries.len() {
            if self.entries[index].state == EntryState::Created {
                let path = DependencyPath::root( index, self.identity( index ).clone() );
                self.resolve( index, &path )?;
            }
        }

        for index in 0..self.entries.len() {
            if self.entries[index].state == EntryState::Injected {
                self.initialize( index )?;
            }
        }

        Ok(())

    }

    fn create( &mut self ) -> Result<(), ContainerError> {
        for configuration in self.configurations {
            let identity = configuration.identity().clone();
            match catch_panic(|| configuration.construct() ) {
                Ok( Constructed { instance, public_reference }) => {
                    let index = self.entries.len();
                    match configuration.public_identity() {
                        Some( public_identity ) => self.public_components.insert( public_identity.clone(), index ),
                        None => self.private_components.insert( configuration.implementation().clone(), index ),
                    };
                    self.entries.push( Entry {
                        configuration: configuration.clone(),
                        instance,
                        public_reference,
                        state: EntryState::Created,
                        report_index: self.report.len(),
                    });
                    self.report.push(( identity, ComponentStatus::Created ));
                },
                Err( source ) => {
                    let error = ContainerError::Creation { identity: identity.clone(), source };
                    if configuration.fail_on_error() { return Err( error )}
                    warn!( component = %identity, %error, "Optional component could not be created" );
                    self.report.push(( identity, ComponentStatus::Unavailable ));
                },
            }
        }
        Ok(())
    }

    /// Depth-first injection of the component at `index`.
    ///
    /// Every dependency is initialised before its reference is assigned. If this
    /// walk initialised anything, at any depth, the requesting component is
    /// initialised too. Returns whether it did.
    fn resolve( &mut self, index: usize, path: &DependencyPath ) -> Result<bool, ContainerError> {

        let instance = Arc::clone( &self.entries[index].instance );
        let slots = match catch_panic(|| Ok( instance.dependencies() )) {
            Ok( slots ) => slots,
            Err( source ) => return self.reject( index, ContainerError::Dependencies {
                identity: self.identity( index ).clone(),
                source,
            }).map(|()| false ),
        };
        let mut triggered_initialization = false ;

        for slot in slots {

            let Some( dependency ) = self.provider( slot.identity() ) else {
                return self.reject( index, ContainerError::MissingDependency {
                    requester: self.identity( index ).clone(),
                    dependency: slot.identity().clone(),
                }).map(|()| triggered_initialization );
            };

            if path.contains( dependency ) {
                return Err( ContainerError::CyclicDependency {
                    chain: path.cycle( dependency, self.identity( dependency )),
                });
            }

            if self.entries[dependency].state == EntryState::Created {
                let forked = path.fork( dependency, self.identity( dependency ).clone() );
                triggered_initialization |= self.resolve( dependency, &forked )?;
            }

            if self.entries[dependency].state == EntryState::Injected {
                self.initialize( dependency )?;
                triggered_initialization = true ;
            }

            // Dropped while resolving its own dependencies or initialising.
            if self.entries[dependency].state != EntryState::Initialized {
                return self.reject( index, ContainerError::MissingDependency {
                    requester: self.identity( index ).clone(),
                    dependency: slot.identity().clone(),
                }).map(|()| triggered_initialization );
            }

            if let Err( source ) = slot.inject( &self.entries[dependency].public_reference ) {
                return self.reject( index, ContainerError::Injection {
                    requester: self.identity( index ).clone(),
                    source,
                }).map(|()| triggered_initialization );
            }

        }

        self.entries[index].state = EntryState::Injected ;
        if triggered_initialization { self.initialize( index )?; }

        Ok( triggered_initialization )

    }

    /// Runs lifecycle-init once. Optional failures roll the component back and drop it.
    fn initialize( &mut self, index: usize ) -> Result<(), ContainerError> {

        if self.entries[index].state == EntryState::Initialized { return Ok(()) }

        let instance = Arc::clone( &self.entries[index].instance );
        match catch_panic(|| instance.initialize() ) {
            Ok(()) => {
                debug!( component = %self.identity( index ), "Component initialized" );
                self.entries[index].state = EntryState::Initialized ;
                self.initialize_order.push( index );
                self.set_status( index, ComponentStatus::Initialized );
                Ok(())
            },
            Err( source ) => {
                let error = ContainerError::Initialization { identity: self.identity( index ).clone(), source };
                if self.entries[index].configuration.fail_on_error() { return Err( error )}
                warn!( component = %self.identity( index ), %error, "Optional component failed to initialize" );
                if let Err( error ) = catch_panic(|| instance.finish() ) {
                    warn!( component = %self.identity( index ), %error, "Rollback of failed component failed" );
                }
                self.drop_entry( index );
                Ok(())
            },
        }

    }

    fn reject( &mut self, index: usize, error: ContainerError ) -> Result<(), ContainerError> {
        if self.entries[index].configuration.fail_on_error() { return Err( error )}
        warn!( component = %self.identity( index ), %error, "Optional component unavailable" );
        self.drop_entry( index );
        Ok(())
    }

    /// The component a slot with `identity` is filled from: a public component
    /// registered under it, else a private component implemented by it.
    fn provider( &self, identity: &Identity ) -> Option<usize> {
        self.public_components.get( identity )
            .or_else(|| self.private_components.get( identity ))
            .copied()
    }

    fn drop_entry( &mut self, index: usize ) {
        self.entries[index].state = EntryState::Dropped ;
        let configuration = &self.entries[index].configuration ;
        let registry = match configuration.public_identity() {
            Some( _ ) => &mut self.public_components,
            None => &mut self.private_components,
        };
        if registry.get( configuration.identity() ) == Some( &index ) {
            registry.remove( configuration.identity() );
        }
        self.set_status( index, ComponentStatus::Unavailable );
    }

    fn set_status( &mut self, index: usize, status: ComponentStatus ) {
        let report_index = self.entries[index].report_index ;
        self.report[report_index].1 = status ;
    }

    fn identity( &self, index: usize ) -> &Identity {
        self.entries[index].configuration.identity()
    }

    /// Splits the startup into what the container publishes.
    ///
    /// Only initialised components survive; everything else is dropped here.
    pub fn into_parts( self ) -> StartupParts {

        let Self { entries, initialize_order, report, .. } = self ;
        let mut entries = entries.into_iter().map( Some ).collect::<Vec<_>>();

        let initialized = initialize_order.into_iter()
            .filter_map(| index | entries[index].take() )
            .map(| entry | ManagedComponent {
                configuration: entry.configuration,
                instance: entry.instance,
                public_reference: entry.public_reference,
            })
            .collect::<Vec<_>>();

        let public_components = initialized.iter()
            .filter_map(| component | component.configuration.public_identity()
                .map(| identity | ( identity.clone(), component.public_reference.clone() )))
            .collect();

        ( initialized, public_components, report )

    }

}
