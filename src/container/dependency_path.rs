use itertools::Itertools ;

use crate::identity::Identity ;



/// The chain of components currently being resolved, root first.
///
/// Each recursive step works on its own fork so sibling branches never see
/// each other's entries.
#[derive( Debug, Clone, Default )]
pub(crate) struct DependencyPath( Vec<( usize, Identity )> );

impl DependencyPath {

    pub fn root( index: usize, identity: Identity ) -> Self {
        Self( vec![( index, identity )])
    }

    pub fn contains( &self, index: usize ) -> bool {
        self.0.iter().any(|( visited, _ )| *visited == index )
    }

    pub fn fork( &self, index: usize, identity: Identity ) -> Self {
        let mut path = self.0.clone();
        path.push(( index, identity ));
        Self( path )
    }

    /// The cycle closed by revisiting `index`: every identity from its first
    /// occurrence to the end of the path, followed by the revisited identity.
    pub fn cycle( &self, index: usize, identity: &Identity ) -> DependencyChain {
        let start = self.0.iter().position(|( visited, _ )| *visited == index ).unwrap_or( 0 );
        DependencyChain( self.0[start..].iter()
            .map(|( _, identity )| identity.clone() )
            .chain( std::iter::once( identity.clone() ))
            .collect() )
    }

}

/// A rendered dependency cycle, e.g. `A -> B -> A`.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct DependencyChain( Vec<Identity> );

impl DependencyChain {
    #[inline] pub fn identities( &self ) -> &[Identity] { &self.0 }
}

impl std::fmt::Display for DependencyChain {
    fn fmt( &self, f: &mut std::fmt::Formatter<'_> ) -> std::fmt::Result {
        write!( f, "{}", self.0.iter().join( " -> " ))
    }
}



#[cfg( test )]
mod tests {

    use super::* ;

    #[test]
    fn cycle_starts_at_first_occurrence() {
        let path = DependencyPath::root( 0, "root".into() )
            .fork( 1, "a".into() )
            .fork( 2, "b".into() );
        assert!( path.contains( 1 ));
        assert!( !path.contains( 3 ));
        assert_eq!( path.cycle( 1, &"a".into() ).to_string(), "a -> b -> a" );
    }

    #[test]
    fn forks_are_independent() {
        let root = DependencyPath::root( 0, "root".into() );
        let left = root.fork( 1, "left".into() );
        let right = root.fork( 2, "right".into() );
        assert!( !left.contains( 2 ));
        assert!( !right.contains( 1 ));
        assert!( !root.contains( 1 ));
    }

}
