use serial_test::serial;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tiercache::{cache_key, CacheConfig, CacheContext, CacheTier, Schema};

#[cache_key(name = "session.token", value = "String", default = "anonymous")]
pub struct SessionToken;

fn context() -> Arc<CacheContext> {
    CacheContext::builder()
        .schema(Schema::builder().key::<SessionToken>().build())
        .start_ready()
        .build()
}

#[test]
#[serial]
fn test_value_expires_after_ttl() {
    let ctx = context();
    let local = ctx.local();

    local.set::<SessionToken>("abc".to_string(), Some(Duration::from_millis(50)));
    assert_eq!(local.get::<SessionToken>(), "abc");
    assert!(local.has_ttl::<SessionToken>());

    thread::sleep(Duration::from_millis(100));

    assert_eq!(local.get::<SessionToken>(), "anonymous");
    assert!(!local.has::<SessionToken>());
    assert!(!local.has_ttl::<SessionToken>());
}

#[test]
#[serial]
fn test_lazy_eviction_notifies_exactly_once() {
    let ctx = context();
    let local = ctx.local();
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();

    local.set::<SessionToken>("abc".to_string(), Some(Duration::from_millis(30)));
    let _sub = local.subscribe_key::<SessionToken, _>(move || {
        c.fetch_add(1, Ordering::SeqCst);
    });

    thread::sleep(Duration::from_millis(60));

    // Nothing happens until the entry is read
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(local.len(), 1);

    local.get::<SessionToken>();
    local.get::<SessionToken>();
    local.has::<SessionToken>();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(local.len(), 0);
}

#[test]
#[serial]
fn test_zero_ttl_never_expires() {
    let ctx = context();
    let local = ctx.local();

    local.set::<SessionToken>("abc".to_string(), Some(Duration::ZERO));
    assert!(!local.has_ttl::<SessionToken>());
    thread::sleep(Duration::from_millis(20));
    assert_eq!(local.get::<SessionToken>(), "abc");
}

#[test]
#[serial]
fn test_set_replaces_expiry_wholesale() {
    let ctx = context();
    let local = ctx.local();

    local.set::<SessionToken>("short".to_string(), Some(Duration::from_millis(30)));
    local.set::<SessionToken>("forever".to_string(), None);
    assert!(!local.has_ttl::<SessionToken>());

    thread::sleep(Duration::from_millis(60));
    assert_eq!(local.get::<SessionToken>(), "forever");
}

#[test]
#[serial]
fn test_broadcast_ttl_expires_too() {
    let ctx = context();
    let broadcast = ctx.broadcast();

    broadcast.set_casual("presence.typing", true, Some(Duration::from_millis(30)));
    assert!(broadcast.has_ttl_casual("presence.typing"));

    thread::sleep(Duration::from_millis(60));
    assert_eq!(broadcast.get_casual::<bool>("presence.typing"), None);
}

#[test]
#[serial]
fn test_manual_sweep() {
    let ctx = context();
    ctx.local().set_casual("a", 1, Some(Duration::from_millis(20)));
    ctx.broadcast().set_casual("b", 2, Some(Duration::from_millis(20)));
    ctx.local().set_casual("c", 3, None);

    thread::sleep(Duration::from_millis(50));
    assert_eq!(ctx.sweep_expired(), 2);
    assert_eq!(ctx.local().len(), 1);
    assert!(ctx.broadcast().is_empty());
}

#[test]
#[serial]
fn test_background_sweeper() {
    let ctx = CacheContext::builder()
        .config(CacheConfig::default().with_sweep_interval(Duration::from_millis(10)))
        .build();
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    let _sub = ctx.local().subscribe("session.token", move || {
        c.fetch_add(1, Ordering::SeqCst);
    });

    ctx.local()
        .set_casual("session.token", "abc", Some(Duration::from_millis(20)));

    let mut waited = Duration::ZERO;
    while !ctx.local().is_empty() && waited < Duration::from_secs(2) {
        thread::sleep(Duration::from_millis(10));
        waited += Duration::from_millis(10);
    }

    // Set plus eviction, without any read
    assert!(ctx.local().is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
