use kvs::errors::{ErrorKind, KvsResult};
use kvs::{key, CanonicalKey, Key, Kvs};
use kvs_int_test::test_util::{
    cleanup, create_test_context, run_test, TestBackend, TestContext, ALL_BACKENDS,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[ctor::ctor]
fn init() {
    colog::init();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Employee {
    name: String,
    tags: Vec<String>,
    manager: Option<Box<Employee>>,
}

fn employee(name: &str) -> Employee {
    Employee {
        name: name.to_string(),
        tags: vec!["a".to_string(), "b".to_string()],
        manager: None,
    }
}

fn on_every_backend<T>(test: T)
where
    T: Fn(&mut TestContext) -> KvsResult<()> + std::panic::RefUnwindSafe,
{
    for backend in ALL_BACKENDS {
        run_test(|| create_test_context(backend), &test, cleanup);
    }
}

fn collect_keys(store: &Kvs) -> KvsResult<Vec<CanonicalKey>> {
    store.keys()?.collect()
}

#[test]
fn test_example_scenario() {
    on_every_backend(|ctx| {
        let store = ctx.store_mut();
        store.set("a", &1)?;
        store.set("b", "two")?;
        assert!(store.contains("a")?);
        assert_eq!(store.get::<i32>("a")?, Some(1));

        store.delete("a")?;
        assert!(!store.contains("a")?);

        let items: Vec<(CanonicalKey, String)> = store.items()?.collect::<KvsResult<_>>()?;
        assert_eq!(items, vec![(CanonicalKey::from("b"), "two".to_string())]);
        Ok(())
    });
}

#[test]
fn test_round_trip_of_value_types() {
    on_every_backend(|ctx| {
        let store = ctx.store_mut();
        let mut boss = employee("grace");
        boss.manager = Some(Box::new(employee("ada")));
        let mut scores = BTreeMap::new();
        scores.insert("x".to_string(), 1.25f64);

        store.set("int", &-7i64)?;
        store.set("float", &3.5f64)?;
        store.set("bool", &true)?;
        store.set("text", "héllo")?;
        store.set("list", &vec![1, 2, 3])?;
        store.set("map", &scores)?;
        store.set("nested", &boss)?;
        store.set("some", &Some(5u8))?;

        assert_eq!(store.get::<i64>("int")?, Some(-7));
        assert_eq!(store.get::<f64>("float")?, Some(3.5));
        assert_eq!(store.get::<bool>("bool")?, Some(true));
        assert_eq!(store.get::<String>("text")?, Some("héllo".to_string()));
        assert_eq!(store.get::<Vec<i32>>("list")?, Some(vec![1, 2, 3]));
        assert_eq!(store.get::<BTreeMap<String, f64>>("map")?, Some(scores));
        assert_eq!(store.get::<Employee>("nested")?, Some(boss));
        assert_eq!(store.get::<u8>("some")?, Some(5));
        Ok(())
    });
}

#[test]
fn test_key_types() {
    on_every_backend(|ctx| {
        let store = ctx.store_mut();
        let set: BTreeSet<i32> = [3, 1, 2].into_iter().collect();

        store.set(42u64, "int")?;
        store.set(2.5f64, "float")?;
        store.set(false, "bool")?;
        store.set(b"raw".as_slice(), "bytes")?;
        store.set((1, "a", 2.0), "tuple")?;
        store.set(key!(0..10), "range")?;
        store.set(set.clone(), "set")?;
        store.set(Key::complex(1.0, -2.0), "complex")?;

        assert_eq!(store.get::<String>(42)?, Some("int".to_string()));
        assert_eq!(store.get::<String>(2.5f64)?, Some("float".to_string()));
        assert_eq!(store.get::<String>(false)?, Some("bool".to_string()));
        assert_eq!(store.get::<String>("raw")?, Some("bytes".to_string()));
        assert_eq!(store.get::<String>((1, "a", 2.0))?, Some("tuple".to_string()));
        assert_eq!(store.get::<String>(Key::range(0, 10, 1)?)?, Some("range".to_string()));
        assert_eq!(
            store.get::<String>(Key::frozen_set([2, 3, 1]))?,
            Some("set".to_string())
        );
        assert_eq!(store.get::<String>("(1-2j)")?, Some("complex".to_string()));
        assert_eq!(store.keys()?.count(), 8);
        Ok(())
    });
}

#[test]
fn test_intentional_key_collision() {
    on_every_backend(|ctx| {
        let store = ctx.store_mut();
        store.set(1, "first")?;
        store.set("1", "second")?;
        store.set(b"1".as_slice(), "third")?;

        assert_eq!(collect_keys(store)?, vec![CanonicalKey::from("1")]);
        assert_eq!(store.get::<String>(1)?, Some("third".to_string()));
        Ok(())
    });
}

#[test]
fn test_absence_semantics() {
    on_every_backend(|ctx| {
        let store = ctx.store_mut();
        assert_eq!(store.get::<i32>("never")?, None);

        store.set("k", &1)?;
        store.set("k", &None::<i32>)?;
        assert_eq!(store.get::<i32>("k")?, None);
        assert!(!store.contains("k")?);

        store.delete("k")?;
        store.delete("k")?;
        Ok(())
    });
}

#[test]
fn test_pop() {
    on_every_backend(|ctx| {
        let store = ctx.store_mut();
        store.set("k", &vec!["x", "y"])?;
        assert_eq!(
            store.pop::<Vec<String>>("k")?,
            Some(vec!["x".to_string(), "y".to_string()])
        );
        assert_eq!(store.get::<Vec<String>>("k")?, None);
        assert_eq!(store.pop::<Vec<String>>("k")?, None);
        Ok(())
    });
}

#[test]
fn test_enumeration_consistency() {
    on_every_backend(|ctx| {
        let store = ctx.store_mut();
        for i in 0..50 {
            store.set((i, "row"), &format!("value-{}", i))?;
        }

        let keys: BTreeSet<CanonicalKey> = store.keys()?.collect::<KvsResult<_>>()?;
        let items: Vec<(CanonicalKey, String)> = store.items()?.collect::<KvsResult<_>>()?;
        let values: Vec<String> = store.values()?.collect::<KvsResult<_>>()?;

        assert_eq!(keys.len(), 50);
        assert_eq!(
            keys,
            items.iter().map(|(k, _)| k.clone()).collect::<BTreeSet<_>>()
        );
        assert_eq!(values.len(), items.len());
        for (key, value) in items {
            assert_eq!(store.get::<String>(key)?, Some(value));
        }
        Ok(())
    });
}

#[test]
fn test_backend_parity() {
    fn script(store: &mut Kvs) -> KvsResult<Vec<(CanonicalKey, i64)>> {
        for i in 0..20i64 {
            store.set(i, &(i * i))?;
        }
        for i in (0..20i64).step_by(3) {
            store.delete(i)?;
        }
        store.set(4, &None::<i64>)?;
        let _ = store.pop::<i64>(5)?;
        store.set("extra", &-1i64)?;
        store.items()?.collect()
    }

    let mut memory = create_test_context(TestBackend::Memory).unwrap();
    let mut fjall = create_test_context(TestBackend::Fjall).unwrap();

    let from_memory = script(memory.store_mut()).unwrap();
    let from_fjall = script(fjall.store_mut()).unwrap();
    assert_eq!(from_memory, from_fjall);
    assert_eq!(
        collect_keys(memory.store()).unwrap(),
        collect_keys(fjall.store()).unwrap()
    );

    cleanup(memory).unwrap();
    cleanup(fjall).unwrap();
}

#[test]
fn test_clear_empties_the_store() {
    on_every_backend(|ctx| {
        let store = ctx.store_mut();
        for i in 0..100 {
            store.set(i, &i)?;
        }
        store.clear()?;
        assert_eq!(store.keys()?.count(), 0);
        assert_eq!(store.get::<i32>(7)?, None);

        store.set("after", &1)?;
        assert_eq!(store.keys()?.count(), 1);
        Ok(())
    });
}

#[test]
fn test_lifecycle_idempotence() {
    on_every_backend(|ctx| {
        let store = ctx.store_mut();
        store.set("a", &1)?;
        store.sync()?;
        store.optimize()?;
        store.close()?;
        store.close()?;
        assert!(store.is_closed());

        let err = store.get::<i32>("a").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::StoreAlreadyClosed);
        Ok(())
    });
}

#[test]
fn test_decode_errors_surface_per_element() {
    on_every_backend(|ctx| {
        let store = ctx.store_mut();
        store.set("a", &1)?;
        store.set("b", "not a number")?;
        store.set("c", &3)?;

        let decoded: Vec<KvsResult<i32>> = store.values()?.collect();
        assert_eq!(decoded.len(), 3);
        assert!(decoded[0].is_ok());
        assert_eq!(
            decoded[1].as_ref().unwrap_err().kind(),
            &ErrorKind::SerializationFailure
        );
        assert!(decoded[2].is_ok());
        Ok(())
    });
}

#[test]
fn test_call_and_attribute_access() {
    on_every_backend(|ctx| {
        let store = ctx.store_mut();
        store.call("count", Some(1))?;
        assert_eq!(store.call::<i32>("count", None)?, Some(1));

        store.set_attr("items", &"shadow")?;
        assert_eq!(store.attr::<String>("items")?, Some("shadow".to_string()));
        assert_eq!(store.items::<serde_json::Value>()?.count(), 2);

        store.del_attr("items")?;
        assert_eq!(store.attr::<String>("items")?, None);
        Ok(())
    });
}

#[test]
fn test_store_moves_across_threads() {
    let mut store = Kvs::in_memory();
    store.set("a", &1).unwrap();

    let handle = std::thread::spawn(move || {
        store.set("b", &2).unwrap();
        store
    });
    let store = handle.join().unwrap();
    assert_eq!(store.keys().unwrap().count(), 2);
}
