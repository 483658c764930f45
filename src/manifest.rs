//! Declarative container configuration.
//!
//! A [`ContainerManifest`] lists the components a container should manage by
//! name. Names are resolved against a [`ComponentCatalog`], which maps them to
//! prototype [`ComponentConfiguration`]s registered in code:
//!
//! ```toml
//! [[component]]
//! implementation = "engine"
//!
//! [[component]]
//! implementation = "audit-log"
//! fail-on-error = false
//! ```

use std::collections::HashMap ;
use std::str::FromStr ;
use serde::Deserialize ;
use thiserror::Error ;
use tracing::warn ;

use crate::configuration::ComponentConfiguration ;
use crate::container::Container ;
use crate::identity::Identity ;
use crate::utils::{ Merge, PartialSuccess };



#[derive( Debug, Error )]
pub enum ManifestError {
    #[error( "Failed to parse manifest: {0}" )]
    Parse( #[from] toml::de::Error ),
    #[error( "Unknown component implementation: {0}" )]
    UnknownImplementation( String ),
}

/// One `[[component]]` entry.
#[derive( Debug, Clone, PartialEq, Eq, Deserialize )]
#[serde( rename_all = "kebab-case", deny_unknown_fields )]
pub struct ComponentEntry {
    /// The catalog name of the prototype.
    pub implementation: String,
    /// Overrides the prototype's fail-on-error policy.
    #[serde( default )]
    pub fail_on_error: Option<bool>,
    /// Overrides the prototype's public identity.
    #[serde( default )]
    pub public_identity: Option<String>,
}

/// The parsed manifest: component entries in declaration order.
#[derive( Debug, Clone, Default, PartialEq, Eq, Deserialize )]
#[serde( deny_unknown_fields )]
pub struct ContainerManifest {
    #[serde( default, rename = "component" )]
    pub components: Vec<ComponentEntry>,
}

impl FromStr for ContainerManifest {
    type Err = ManifestError ;
    fn from_str( source: &str ) -> Result<Self, Self::Err> { Ok( toml::from_str( source )? )}
}

/// Named prototype configurations a manifest can refer to.
#[derive( Debug, Clone, Default )]
pub struct ComponentCatalog {
    prototypes: HashMap<String, ComponentConfiguration>,
}

impl ComponentCatalog {

    pub fn new() -> Self { Self::default() }

    /// Registers `prototype` under `name`, replacing any previous one.
    pub fn with( mut self, name: impl Into<String>, prototype: ComponentConfiguration ) -> Self {
        self.prototypes.insert( name.into(), prototype );
        self
    }

    pub fn get( &self, name: &str ) -> Option<&ComponentConfiguration> { self.prototypes.get( name )}

    /// The configuration `entry` describes.
    ///
    /// # Errors
    /// [`ManifestError::UnknownImplementation`] if no prototype is registered
    /// under the entry's name.
    pub fn resolve( &self, entry: &ComponentEntry ) -> Result<ComponentConfiguration, ManifestError> {
        let prototype = self.get( &entry.implementation )
            .ok_or_else(|| ManifestError::UnknownImplementation( entry.implementation.clone() ))?
            .clone();
        let prototype = match entry.fail_on_error {
            Some( fail_on_error ) => prototype.with_fail_on_error( fail_on_error ),
            None => prototype,
        };
        Ok( match &entry.public_identity {
            Some( identity ) => prototype.with_public_identity( Identity::named( identity.clone() )),
            None => prototype,
        })
    }

}

impl Container {

    /// Builds an uninitialised container from `manifest`.
    ///
    /// Entries naming unknown implementations are reported and skipped; the rest
    /// are registered in manifest order.
    pub fn from_manifest( manifest: &ContainerManifest, catalog: &ComponentCatalog ) -> PartialSuccess<Self, ManifestError> {
        manifest.components.iter().fold(( Self::new(), Vec::new() ), |( mut container, errors ), entry | {
            match catalog.resolve( entry ) {
                Ok( configuration ) => {
                    container.add_configuration( configuration );
                    ( container, errors )
                },
                Err( error ) => {
                    warn!( %error, "Skipping manifest entry" );
                    ( container, errors.merge( error ))
                },
            }
        })
    }

}



#[cfg( test )]
mod tests {

    use super::* ;

    #[test]
    fn parses_kebab_case_entries() {
        let manifest = r#"
            [[component]]
            implementation = "engine"

            [[component]]
            implementation = "audit"
            fail-on-error = false
        "#.parse::<ContainerManifest>().unwrap();
        assert_eq!( manifest.components.len(), 2 );
        assert_eq!( manifest.components[1].fail_on_error, Some( false ));
        assert_eq!( manifest.components[0].public_identity, None );
    }

    #[test]
    fn rejects_unknown_fields() {
        let result = "[[component]]\nimplementation = \"a\"\nretries = 3\n".parse::<ContainerManifest>();
        assert!( matches!( result, Err( ManifestError::Parse( _ ))));
    }

}
