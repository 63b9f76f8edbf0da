use sharedptr::{Shared, Weak, allocate_shared};
use sharedptr_test_utils::*;

mod lock {
    use super::*;

    #[test]
    fn lock_on_live_object_increments_strong_count() {
        init_logging();
        let shared = Shared::new(String::from("alive"));
        let weak = Shared::downgrade(&shared);

        let locked = weak.lock();
        assert_eq!(*locked, "alive");
        assert_eq!(Shared::use_count(&shared), 2);
        assert_eq!(weak.use_count(), 2);
    }

    #[test]
    fn lock_on_expired_object_returns_empty_handle() {
        let drops = DropCounter::new();
        let shared = Shared::new(drops.track(1));
        let weak = Shared::downgrade(&shared);
        drop(shared);

        let locked = weak.lock();
        assert_eq!(Shared::use_count(&locked), 0);
        assert!(Shared::get(&locked).is_none());
        assert!(Shared::as_ptr(&locked).is_none());

        // The strong count must never be resurrected
        assert_eq!(weak.use_count(), 0);
        drop(locked);
        assert_eq!(weak.use_count(), 0);
        assert_eq!(drops.drops(), 1);
    }

    #[test]
    fn upgrade() {
        let shared = Shared::new(1);
        let weak = Shared::downgrade(&shared);
        assert_eq!(weak.upgrade().as_deref(), Some(&1));

        drop(shared);
        assert!(weak.upgrade().is_none());
    }
}

mod expired {
    use super::*;

    #[test]
    fn empty_weak_is_expired() {
        let weak = Weak::<u8>::default();
        assert!(weak.expired());
        assert_eq!(weak.use_count(), 0);
    }

    #[test]
    fn expires_when_last_strong_handle_is_dropped() {
        let a = Shared::new(1);
        let b = a.clone();
        let weak = Weak::from(&a);

        drop(a);
        assert!(!weak.expired());
        drop(b);
        assert!(weak.expired());
    }
}

mod storage {
    use super::*;

    #[test]
    fn block_is_released_after_last_weak_handle() {
        let storage = CountingStorage::new();
        let drops = DropCounter::new();
        let shared = allocate_shared(storage.clone(), drops.track(1)).unwrap();
        let weak = Shared::downgrade(&shared);
        let weak_copy = weak.clone();

        drop(shared);
        assert_eq!(drops.drops(), 1);
        assert_eq!(storage.live(), 1);

        // The block's bookkeeping is still available to observers
        assert_eq!(weak.use_count(), 0);
        assert_eq!(weak.weak_count(), 2);

        drop(weak);
        assert_eq!(storage.live(), 1);
        drop(weak_copy);
        assert_eq!(storage.live(), 0);
        assert_eq!(storage.deallocations(), 1);
        assert_eq!(drops.drops(), 1);
    }

    #[test]
    fn weak_handles_dont_delay_object_destruction() {
        let storage = CountingStorage::new();
        let drops = DropCounter::new();
        let shared = allocate_shared(storage.clone(), drops.track(1)).unwrap();
        let observers = vec![Shared::downgrade(&shared); 3];

        drop(shared);
        assert_eq!(drops.drops(), 1);
        assert!(observers.iter().all(Weak::expired));

        drop(observers);
        assert_eq!(storage.live(), 0);
    }
}

mod copies {
    use super::*;

    #[test]
    fn clone_and_drop_update_weak_count() {
        let shared = Shared::new(());
        let weak = Shared::downgrade(&shared);
        assert_eq!(weak.weak_count(), 1);

        let copy = weak.clone();
        assert_eq!(weak.weak_count(), 2);

        drop(copy);
        assert_eq!(weak.weak_count(), 1);
        assert_eq!(Shared::use_count(&shared), 1);
    }

    #[test]
    fn take_leaves_source_empty() {
        let shared = Shared::new(7);
        let mut source = Shared::downgrade(&shared);
        let destination = std::mem::take(&mut source);

        assert!(source.expired());
        assert_eq!(source.weak_count(), 0);
        assert_eq!(destination.weak_count(), 1);
        assert_eq!(destination.use_count(), 1);
    }

    #[test]
    fn ptr_eq_compares_observed_blocks() {
        let shared = Shared::new(1);
        let weak = Shared::downgrade(&shared);
        assert!(weak.ptr_eq(&weak.clone()));
        assert!(!weak.ptr_eq(&Weak::new()));
        assert!(Weak::<u8>::new().ptr_eq(&Weak::new()));
    }

    #[test]
    fn expired_observers_of_reused_addresses_differ() {
        for _ in 0..100 {
            let first = Shared::from_box(Box::new([1u64; 4]));
            let first_weak = Shared::downgrade(&first);
            drop(first);

            // The second object may be allocated where the first one lived
            let second = Shared::from_box(Box::new([2u64; 4]));
            let second_weak = Shared::downgrade(&second);

            assert!(!first_weak.ptr_eq(&second_weak));
        }
    }

    #[test]
    fn swap() {
        let a = Shared::new('a');
        let b = Shared::new('b');
        let mut weak_a = Shared::downgrade(&a);
        let mut weak_b = Shared::downgrade(&b);

        weak_a.swap(&mut weak_b);
        assert_eq!(*weak_a.lock(), 'b');
        assert_eq!(*weak_b.lock(), 'a');
    }
}
