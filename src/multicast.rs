use tracing::warn ;

use crate::component::BoxError ;
use crate::utils::catch_panic ;



/// Delivers `event` to every subscriber, ignoring individual failures.
///
/// Errors and panics raised by one subscriber are logged and never stop
/// delivery to the rest. Returns how many subscribers failed.
pub(crate) fn multicast_silently<'a, S, F>(
    event: &'static str,
    subscribers: impl IntoIterator<Item = &'a S>,
    mut notify: F,
) -> usize
where
    S: ?Sized + 'a,
    F: FnMut( &S ) -> Result<(), BoxError>,
{
    subscribers.into_iter()
        .filter_map(| subscriber | catch_panic(|| notify( subscriber )).err() )
        .inspect(| error | warn!( event, %error, "Subscriber failed, ignoring" ))
        .count()
}



#[cfg( test )]
mod tests {

    use super::* ;

    #[test]
    fn failures_do_not_stop_delivery() {
        let subscribers = [ 1, 2, 3, 4 ];
        let mut seen = Vec::new();
        let failed = multicast_silently( "test", &subscribers, | n | {
            seen.push( *n );
            match n {
                2 => Err( "refused".into() ),
                3 => panic!( "broken subscriber" ),
                _ => Ok(()),
            }
        });
        assert_eq!( failed, 2 );
        assert_eq!( seen, vec![ 1, 2, 3, 4 ]);
    }

}
