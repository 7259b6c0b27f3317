//! End-to-end scenarios exercising the public API as a caller would.

use mapalloc::test_support::serial;
use std::ptr;

#[test]
fn single_alloc_and_free() {
    let _guard = serial();
    let p = mapalloc::allocate(1);
    assert!(!p.is_null());
    mapalloc::release(p);
    assert!(mapalloc::snapshot().is_none());
}

#[test]
fn split_then_coalesce() {
    let _guard = serial();
    let a = mapalloc::allocate(100);
    let b = mapalloc::allocate(100);
    assert!(!a.is_null());
    assert!(!b.is_null());

    mapalloc::release(a);
    mapalloc::release(b);

    assert!(mapalloc::snapshot().is_none());
}

#[test]
fn overflow_refusal_does_not_initialize_the_heap() {
    let _guard = serial();
    assert!(mapalloc::zero_allocate(usize::MAX, 2).is_null());
    assert!(mapalloc::snapshot().is_none());
}

#[test]
fn realloc_grows_across_a_split_boundary() {
    let _guard = serial();
    let p = mapalloc::allocate(64);
    assert!(!p.is_null());
    unsafe { ptr::write_bytes(p, 0x5A, 64) };

    let q = mapalloc::reallocate(p, 4096);
    assert!(!q.is_null());
    let prefix = unsafe { std::slice::from_raw_parts(q, 64) };
    assert!(prefix.iter().all(|&b| b == 0x5A));

    mapalloc::release(q);
}

#[test]
fn expansion_preserves_every_prior_pointer() {
    let _guard = serial();
    let mut live = Vec::new();
    for i in 0..12 {
        let p = mapalloc::allocate(1024 * 1024);
        assert!(!p.is_null(), "allocation {i} of 1 MiB should succeed within the first region");
        unsafe { p.write(i as u8) };
        live.push(p);
    }

    let big = mapalloc::allocate(20 * 1024 * 1024);
    assert!(!big.is_null(), "a 20 MiB request should trigger region expansion");

    for (i, &p) in live.iter().enumerate() {
        assert_eq!(unsafe { p.read() }, i as u8, "expansion must not move or corrupt prior allocations");
    }

    let snap = mapalloc::snapshot().expect("heap must still be initialized");
    assert!(snap.heap_size >= 36 * 1024 * 1024);

    mapalloc::release(big);
    for p in live {
        mapalloc::release(p);
    }
    assert!(mapalloc::snapshot().is_none());
}

#[test]
fn teardown_then_reinit_starts_fresh() {
    let _guard = serial();
    let a = mapalloc::allocate(100);
    let b = mapalloc::allocate(100);
    mapalloc::release(a);
    mapalloc::release(b);
    assert!(mapalloc::snapshot().is_none());

    let p = mapalloc::allocate(1);
    assert!(!p.is_null());
    let snap = mapalloc::snapshot().expect("heap should be reinitialized");
    assert_eq!(snap.heap_size, mapalloc::heap::INIT_SIZE);
    mapalloc::release(p);
}
