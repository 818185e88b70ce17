#![no_main]

use libfuzzer_sys::fuzz_target;
use ferrous_registry::{Container, Key};
use std::collections::BTreeSet;

fuzz_target!(|data: &[u8]| {
    let container = Container::new();
    let mut expected = BTreeSet::new();

    // Each byte registers a u8 or a u16 under a short name.
    for &byte in data.iter().take(256) {
        let name = format!("s{}", byte & 0x3f);
        let result = if byte & 0x40 == 0 {
            container.set_value(name.clone(), byte)
        } else {
            container.set_value(name.clone(), u16::from(byte))
        };

        let key = if byte & 0x40 == 0 {
            Key::named::<u8>(name)
        } else {
            Key::named::<u16>(name)
        };
        let fresh = expected.insert(key.clone());
        match result {
            Ok(()) => assert!(fresh),
            Err(err) => {
                assert!(!fresh);
                assert!(err.is_already_set());
                assert_eq!(err.key_path(), vec![&key]);
            }
        }
    }

    assert_eq!(container.len(), expected.len());
    assert_eq!(container.keys(), expected.into_iter().collect::<Vec<_>>());
});
