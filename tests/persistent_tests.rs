use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tiercache::{cache_key, CacheContext, JsonFileStorage, MemoryStorage, Schema};

#[cache_key(name = "ui.language", value = "String", default = "en")]
pub struct Language;

#[cache_key(name = "window.bounds", value = "(u32, u32)", default = (800, 600))]
pub struct WindowBounds;

#[cache_key(name = "scratch.counter", value = "u32")]
pub struct NotDeclared;

fn schema() -> Schema {
    Schema::builder().key::<Language>().key::<WindowBounds>().build()
}

#[test]
fn test_defaults_until_set() {
    let ctx = CacheContext::builder()
        .schema(schema())
        .storage(MemoryStorage::new())
        .build();

    assert_eq!(ctx.persistent().get_persist::<Language>(), "en");
    assert_eq!(ctx.persistent().get_persist::<WindowBounds>(), (800, 600));
    assert!(!ctx.persistent().has_persist::<Language>());

    assert!(ctx.persistent().set_persist::<Language>("fr".to_string()));
    assert!(ctx.persistent().has_persist::<Language>());
    assert_eq!(ctx.persistent().get_persist::<Language>(), "fr");
}

#[test]
fn test_values_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache").join("persist.json");

    {
        let ctx = CacheContext::builder()
            .schema(schema())
            .storage(JsonFileStorage::open(&path).unwrap())
            .build();
        ctx.persistent().set_persist::<Language>("pt".to_string());
        ctx.persistent().set_persist::<WindowBounds>((1024, 768));
    }

    let restarted = CacheContext::builder()
        .schema(schema())
        .storage(JsonFileStorage::open(&path).unwrap())
        .build();
    assert_eq!(restarted.persistent().get_persist::<Language>(), "pt");
    assert_eq!(restarted.persistent().get_persist::<WindowBounds>(), (1024, 768));
}

#[test]
fn test_cleanup_keeps_disk_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("persist.json");
    let ctx = CacheContext::builder()
        .schema(schema())
        .storage(JsonFileStorage::open(&path).unwrap())
        .build();

    ctx.persistent().set_persist::<Language>("es".to_string());
    ctx.cleanup();
    assert!(ctx.persistent().is_empty());
    assert_eq!(ctx.persistent().get_persist::<Language>(), "es");
}

#[test]
fn test_undeclared_key_is_rejected() {
    let storage = Arc::new(MemoryStorage::new());
    let ctx = CacheContext::builder()
        .schema(schema())
        .shared_storage(storage.clone())
        .build();

    assert!(!ctx.persistent().set_persist::<NotDeclared>(5));
    assert_eq!(ctx.persistent().get_persist::<NotDeclared>(), 0);
    assert!(storage.is_empty());
}

#[test]
fn test_set_persist_notifies() {
    let ctx = CacheContext::builder().schema(schema()).build();
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    let _sub = ctx.persistent().subscribe_key::<Language, _>(move || {
        c.fetch_add(1, Ordering::SeqCst);
    });

    ctx.persistent().set_persist::<Language>("de".to_string());
    ctx.persistent().set_persist::<Language>("de".to_string());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_two_contexts_share_storage() {
    let storage = Arc::new(MemoryStorage::new());
    let first = CacheContext::builder()
        .schema(schema())
        .shared_storage(storage.clone())
        .build();
    let second = CacheContext::builder()
        .schema(schema())
        .shared_storage(storage)
        .build();

    first.persistent().set_persist::<Language>("nl".to_string());
    assert_eq!(second.persistent().get_persist::<Language>(), "nl");
}
