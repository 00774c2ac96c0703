use super::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug)]
struct Named {
    name: Mutex<String>,
    changed: AtomicBool,
}

impl Named {
    fn new(name: &str) -> Self {
        Self {
            name: Mutex::new(name.to_string()),
            changed: AtomicBool::new(false),
        }
    }

    fn name(&self) -> String {
        self.name.lock().expect("name").clone()
    }
}

#[derive(Debug)]
struct Other;

#[test]
fn store_is_idempotent_and_keeps_the_first_instance() {
    let registry = InstanceRegistry::new();
    let first = Arc::new(Named::new("first"));
    let second = Arc::new(Named::new("second"));

    assert!(registry.store("k", Arc::clone(&first)).is_stored());
    match registry.store("k", Arc::clone(&second)) {
        StoreOutcome::Existing(existing) => assert!(Arc::ptr_eq(&existing, &first)),
        StoreOutcome::Stored => panic!("slot must not be overwritten"),
    }

    let retrieved = registry.retrieve::<Named>("k").expect("stored");
    assert!(Arc::ptr_eq(&retrieved, &first));
    assert_eq!(retrieved.name(), "first");
}

#[test]
fn retrieve_missing_returns_none() {
    let registry = InstanceRegistry::new();
    assert!(registry.retrieve::<Named>("nope").is_none());
    assert!(registry.is_empty());
}

#[test]
fn factory_substitutes_existing_instance() {
    let registry = InstanceRegistry::new();
    let constructed = AtomicUsize::new(0);

    let one = registry.get_or_create("one", || {
        constructed.fetch_add(1, Ordering::SeqCst);
        Named::new("one")
    });
    let two = registry.get_or_create("two", || {
        constructed.fetch_add(1, Ordering::SeqCst);
        Named::new("two")
    });
    one.changed.store(true, Ordering::SeqCst);

    let three = registry.get_or_create("one", || {
        constructed.fetch_add(1, Ordering::SeqCst);
        Named::new("three")
    });

    assert_eq!(constructed.load(Ordering::SeqCst), 2);
    assert_eq!(two.name(), "two");
    assert_eq!(three.name(), "one");
    assert!(three.changed.load(Ordering::SeqCst));
    assert!(Arc::ptr_eq(&one, &three));
}

#[test]
fn singleton_shares_mutations_and_ignores_later_arguments() {
    let registry = InstanceRegistry::new();

    let one = registry.singleton(Some("first"), || Named::new("ONE"));
    let two = registry.singleton(Some("first"), || Named::new("ignored"));
    assert_eq!(two.name(), "ONE");

    *two.name.lock().expect("name") = "TWO".to_string();
    let three = registry.singleton(Some("first"), || Named::new("THREE"));

    assert_eq!(one.name(), "TWO");
    assert_eq!(three.name(), "TWO");
    assert!(Arc::ptr_eq(&one, &three));

    let default = registry.singleton(None, || Named::new("default"));
    assert_eq!(
        registry.names_for::<Named>(),
        vec!["first".to_string(), SINGLETON_NAME.to_string()]
    );
    assert_eq!(default.name(), "default");
}

#[test]
fn slots_are_scoped_per_type() {
    let registry = InstanceRegistry::new();
    registry.get_or_create("shared-name", || Named::new("named"));
    registry.get_or_create("shared-name", || Other);

    assert_eq!(registry.len(), 2);
    assert!(registry.retrieve::<Other>("shared-name").is_some());
    assert_eq!(
        registry
            .retrieve::<Named>("shared-name")
            .expect("named")
            .name(),
        "named"
    );
}
