//! Live resources come back as inspectable substitutes.

use relink::{ObjectRef, Value};
use relink_integration_test::{
    ConnectError, Connection, FrozenLock, Guarded, Reconnector,
    create_test_codec,
};

fn round_trip(value: &Value) -> Value {
    let codec = create_test_codec();
    codec.decode(&codec.encode(value).unwrap()).unwrap()
}

#[test]
fn connection_becomes_a_reconnector() {
    let connection = Connection::open("db.internal:5432").unwrap();
    let session = connection.session();

    let decoded = round_trip(&Value::object(connection));
    let reconnector = decoded
        .as_object()
        .unwrap()
        .downcast_ref::<Reconnector>()
        .unwrap()
        .clone();

    assert_eq!(
        reconnector,
        Reconnector {
            address: "db.internal:5432".to_owned(),
            last_session: session
        }
    );

    let fresh = reconnector.reconnect().unwrap();
    assert_eq!(fresh.address(), "db.internal:5432");
    assert_ne!(fresh.session(), session);
}

#[test]
fn shared_connection_yields_one_reconnector() {
    let connection = ObjectRef::new(Connection::open("cache:6379").unwrap());
    let root = Value::map([
        ("reader", Value::Object(connection.clone())),
        ("writer", Value::Object(connection)),
    ]);

    let decoded = round_trip(&root);
    let map = decoded.as_map().unwrap();
    let reader = map.get_str("reader").unwrap();
    let writer = map.get_str("writer").unwrap();

    assert!(reader.as_object().unwrap().ptr_eq(writer.as_object().unwrap()));
    assert!(reader.as_object().unwrap().is::<Reconnector>());
}

#[test]
fn reconnector_encodes_again() {
    let connection = Connection::open("queue:5672").unwrap();
    let session = connection.session();

    let once = round_trip(&Value::object(connection));
    let twice = round_trip(&once);

    let reconnector =
        twice.as_object().unwrap().downcast_ref::<Reconnector>().unwrap();
    assert_eq!(reconnector.address, "queue:5672");
    assert_eq!(reconnector.last_session, session);
}

#[test]
fn reconnecting_to_a_bad_address_fails() {
    let reconnector =
        Reconnector { address: "nowhere".to_owned(), last_session: 0 };

    let error = reconnector.reconnect().unwrap_err();
    assert_eq!(error, ConnectError::InvalidAddress("nowhere".to_owned()));
    assert_eq!(error.to_string(), "`nowhere` is not a host:port address");
}

#[test]
fn lock_value_is_captured() {
    let decoded = round_trip(&Value::object(Guarded::new(5)));
    let frozen =
        *decoded.as_object().unwrap().downcast_ref::<FrozenLock>().unwrap();

    assert_eq!(frozen, FrozenLock { value: Some(5), was_held: false });

    let thawed = frozen.thaw();
    *thawed.0.lock() += 1;
    assert_eq!(*thawed.0.lock(), 6);
}

#[test]
fn held_lock_does_not_block_encoding() {
    let lock = ObjectRef::new(Guarded::new(9));
    let guard = lock.downcast_ref::<Guarded>().unwrap().0.lock();

    let decoded = round_trip(&Value::Object(lock.clone()));
    drop(guard);

    let frozen =
        decoded.as_object().unwrap().downcast_ref::<FrozenLock>().unwrap();
    assert_eq!(frozen, &FrozenLock { value: None, was_held: true });
    assert_eq!(frozen.thaw().0.into_inner(), 0);
}
