use sharedptr::{DefaultDelete, Error, Shared, allocate_shared, make_shared_with};
use sharedptr_test_utils::*;
use std::{
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    ptr::NonNull,
};

#[derive(Debug)]
struct InvalidConfig(&'static str);

impl fmt::Display for InvalidConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid config: {}", self.0)
    }
}

impl std::error::Error for InvalidConfig {}

mod in_place {
    use super::*;

    #[test]
    fn round_trip_releases_the_single_allocation() {
        init_logging();
        let storage = CountingStorage::new();
        let drops = DropCounter::new();

        let shared = allocate_shared(storage.clone(), drops.track(1)).unwrap();
        assert_eq!(storage.allocations(), 1);
        assert!(storage.live_bytes() > 0);

        drop(shared);
        assert_eq!(drops.drops(), 1);
        assert_eq!(storage.live(), 0);
        assert_eq!(storage.live_bytes(), 0);
    }

    #[test]
    fn object_lives_inside_the_block() {
        let storage = CountingStorage::new();
        let shared = allocate_shared(storage.clone(), [0u64; 16]).unwrap();

        // A single allocation holds the counts and the object
        assert_eq!(storage.allocations(), 1);
        assert!(storage.live_bytes() >= std::mem::size_of::<[u64; 16]>());
        assert_eq!(shared.len(), 16);
    }

    #[test]
    fn allocation_failure_drops_the_value() {
        let drops = DropCounter::new();

        let result = allocate_shared(FailingStorage, drops.track(1));
        assert!(matches!(result, Err(Error::AllocationFailed { .. })));
        assert_eq!(drops.drops(), 1);
    }

    #[test]
    fn allocation_failure_skips_the_constructor() {
        let result = make_shared_with(FailingStorage, || -> Result<u8, InvalidConfig> {
            panic!("the constructor shouldn't run without storage")
        });
        assert!(matches!(result, Err(Error::AllocationFailed { .. })));
    }

    #[test]
    fn constructor_error_releases_storage() {
        let storage = CountingStorage::new();

        let result = make_shared_with(storage.clone(), || -> Result<u8, _> {
            Err(InvalidConfig("missing name"))
        });

        match result {
            Err(Error::Construction(source)) => {
                assert_eq!(source.to_string(), "invalid config: missing name")
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(storage.allocations(), 1);
        assert_eq!(storage.live(), 0);
    }

    #[test]
    fn constructor_panic_releases_storage() {
        let storage = CountingStorage::new();

        let result = catch_unwind(AssertUnwindSafe(|| {
            Shared::try_new_with_in(
                || -> Result<u8, InvalidConfig> { panic!("constructor panicked") },
                storage.clone(),
            )
        }));

        assert!(result.is_err());
        assert_eq!(storage.allocations(), 1);
        assert_eq!(storage.live(), 0);
    }

    #[test]
    fn string_errors_are_accepted() {
        let result = Shared::try_new_with(|| -> Result<u8, String> { Err("nope".into()) });
        assert_eq!(
            result.unwrap_err().to_string(),
            "Failed to construct the managed object"
        );
    }
}

mod owning {
    use super::*;

    #[test]
    fn allocation_failure_hands_object_to_deleter() {
        let drops = DropCounter::new();
        let object = NonNull::from(Box::leak(Box::new(drops.track(1))));

        let result = unsafe { Shared::from_raw_in(object, DefaultDelete, FailingStorage) };
        assert!(matches!(result, Err(Error::AllocationFailed { .. })));
        assert_eq!(drops.drops(), 1);
    }

    #[test]
    fn owning_block_is_released_after_weak_handles() {
        let storage = CountingStorage::new();
        let drops = DropCounter::new();
        let object = NonNull::from(Box::leak(Box::new(drops.track(1))));

        let shared =
            unsafe { Shared::from_raw_in(object, DefaultDelete, storage.clone()) }.unwrap();
        let weak = Shared::downgrade(&shared);

        drop(shared);
        assert_eq!(drops.drops(), 1);
        assert_eq!(storage.live(), 1);

        drop(weak);
        assert_eq!(storage.live(), 0);
    }
}
