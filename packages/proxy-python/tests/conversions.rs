mod common;

use std::collections::{BTreeMap, BTreeSet};

use collection_literals::btree;
use proxy_core::{Complex32, Complex64, Error, Object};
use proxy_python::registry::{lookup_to_native, native_type_names, register_to_native};
use proxy_python::{PythonEnvironment, Result};
use pyo3::prelude::*;

use common::{define, environment, eval};

#[test]
fn test_scalars_round_trip_at_their_own_width() {
    let env = environment();

    let cases = vec![
        Object::Null,
        Object::Bool(true),
        Object::I8(-8),
        Object::I16(-1600),
        Object::I32(-320_000),
        Object::I64(-64_000_000_000),
        Object::U8(200),
        Object::U16(60_000),
        Object::U32(4_000_000_000),
        Object::F32(1.5),
        Object::F64(-2.25),
        Object::Complex32(Complex32::new(1.0, -1.0)),
        Object::Complex64(Complex64::new(0.5, 2.0)),
        Object::from("hello"),
        Object::bytes(vec![0u8, 1, 255]),
    ];

    for original in cases {
        let proxy = env.to_foreign(&original).unwrap();
        let back = env.to_native(&proxy).unwrap();
        match &original {
            Object::I8(v) => assert_eq!(back.convert::<i8>().unwrap(), *v),
            Object::I16(v) => assert_eq!(back.convert::<i16>().unwrap(), *v),
            Object::I32(v) => assert_eq!(back.convert::<i32>().unwrap(), *v),
            Object::U8(v) => assert_eq!(back.convert::<u8>().unwrap(), *v),
            Object::U16(v) => assert_eq!(back.convert::<u16>().unwrap(), *v),
            Object::U32(v) => assert_eq!(back.convert::<u32>().unwrap(), *v),
            Object::F32(v) => assert_eq!(back.convert::<f32>().unwrap(), *v),
            Object::Complex32(v) => assert_eq!(back.convert::<Complex32>().unwrap(), *v),
            _ => assert_eq!(back, original),
        }
    }
}

#[test]
fn test_python_types_map_to_expected_variants() {
    let env = environment();

    assert_eq!(env.to_native(&eval(&env, "None")).unwrap(), Object::Null);
    assert_eq!(env.to_native(&eval(&env, "False")).unwrap(), Object::Bool(false));
    assert_eq!(env.to_native(&eval(&env, "-7")).unwrap(), Object::I64(-7));
    assert_eq!(env.to_native(&eval(&env, "0.25")).unwrap(), Object::F64(0.25));
    assert_eq!(
        env.to_native(&eval(&env, "3-4j")).unwrap(),
        Object::Complex64(Complex64::new(3.0, -4.0))
    );
    assert_eq!(env.to_native(&eval(&env, "'text'")).unwrap(), Object::from("text"));
    assert_eq!(
        env.to_native(&eval(&env, "bytearray(b'ab')")).unwrap(),
        Object::bytes(b"ab".to_vec())
    );
}

#[test]
fn test_large_integers_come_back_unsigned() {
    let env = environment();

    let max = env.to_native(&eval(&env, "2**64 - 1")).unwrap();
    assert_eq!(max, Object::U64(u64::MAX));

    let above_signed = env.to_native(&eval(&env, "2**63")).unwrap();
    assert_eq!(above_signed, Object::U64(1 << 63));
    assert!(above_signed.convert::<i64>().is_err());

    let proxy = env.to_foreign(&Object::U64(u64::MAX)).unwrap();
    assert_eq!(env.to_native(&proxy).unwrap(), Object::U64(u64::MAX));
}

#[test]
fn test_containers_convert_element_wise() {
    let env = environment();

    let list = env.to_native(&eval(&env, "[1, 'two', 3.0]")).unwrap();
    assert_eq!(
        list,
        Object::Vector(vec![Object::I64(1), Object::from("two"), Object::F64(3.0)])
    );

    let tuple = env.to_native(&eval(&env, "(None, True)")).unwrap();
    assert_eq!(tuple, Object::Vector(vec![Object::Null, Object::Bool(true)]));

    let set = env.to_native(&eval(&env, "frozenset({1, 2})")).unwrap();
    let expected: BTreeSet<Object> = [Object::I64(1), Object::I64(2)].into_iter().collect();
    assert_eq!(set, Object::Set(expected));

    let map = env.to_native(&eval(&env, "{'a': 1, 'b': [2]}")).unwrap();
    let expected: BTreeMap<Object, Object> = btree! {
        Object::from("a") => Object::I64(1),
        Object::from("b") => Object::Vector(vec![Object::I64(2)]),
    };
    assert_eq!(map, Object::Map(expected));
}

#[test]
fn test_host_containers_reach_python_as_builtins() {
    let env = environment();
    let map = Object::Map(btree! {
        Object::from("gain") => Object::F64(2.0),
        Object::from("taps") => Object::Vector(vec![Object::I32(1), Object::I32(2)]),
    });

    let proxy = env.to_foreign(&map).unwrap();
    assert_eq!(proxy.class_name(), "dict");
    let taps = proxy.call_with("get", &[Object::from("taps")]).unwrap();
    assert_eq!(taps.class_name(), "list");
    assert_eq!(taps.convert::<Vec<i64>>().unwrap(), vec![1, 2]);
}

#[derive(Debug, PartialEq)]
struct Calibration {
    offset: f64,
}

#[test]
fn test_host_values_without_converter_round_trip() {
    let env = environment();
    let original = Object::opaque(Calibration { offset: 0.5 });

    let proxy = env.to_foreign(&original).unwrap();
    assert_eq!(proxy.class_name(), "proxy_bridge.HostObject");

    let back = env.to_native(&proxy).unwrap();
    assert_eq!(back, original);
    assert_eq!(
        back.downcast_opaque::<Calibration>(),
        Some(&Calibration { offset: 0.5 })
    );
}

#[test]
fn test_unconvertible_python_values() {
    let env = environment();
    let widget = define(&env, "class Widget:\n    pass\nw = Widget()\n", "w");

    match env.to_native(&widget) {
        Err(Error::NoConverter { from, .. }) => assert!(from.ends_with("Widget")),
        other => panic!("expected NoConverter, got {:?}", other),
    }

    // Inside a container the same value stays a proxy.
    let list = define(&env, "class Widget:\n    pass\nl = [1, Widget()]\n", "l");
    let Object::Vector(items) = env.to_native(&list).unwrap() else {
        panic!("expected a vector");
    };
    assert_eq!(items[0], Object::I64(1));
    let inner = items[1].as_proxy().unwrap();
    assert!(inner.class_name().ends_with("Widget"));
}

#[test]
fn test_builtin_converters_are_registered() {
    let _env = environment();
    let names = native_type_names();
    for expected in [
        "NoneType",
        "bool",
        "int",
        "float",
        "complex",
        "str",
        "bytes",
        "bytearray",
        "tuple",
        "list",
        "set",
        "frozenset",
        "dict",
        "numpy.ndarray",
        "proxy_bridge.HostObject",
    ] {
        assert!(names.iter().any(|n| n == expected), "missing {}", expected);
    }
}

#[test]
fn test_integer_boundaries() {
    let env = environment();
    for value in [0i64, -1, i64::MIN, i64::MAX] {
        let proxy = env.to_foreign(&Object::I64(value)).unwrap();
        assert_eq!(env.to_native(&proxy).unwrap(), Object::I64(value));
    }
    for value in [i8::MIN, i8::MAX] {
        let proxy = env.to_foreign(&Object::I8(value)).unwrap();
        assert_eq!(env.to_native(&proxy).unwrap().convert::<i8>().unwrap(), value);
    }
    let proxy = env.to_foreign(&Object::U64(0)).unwrap();
    assert_eq!(env.to_native(&proxy).unwrap(), Object::I64(0));
}

#[test]
fn test_narrow_integer_boundaries() {
    let env = environment();
    let round_trip = |object: Object| env.to_native(&env.to_foreign(&object).unwrap()).unwrap();

    for value in [i16::MIN, -1, i16::MAX] {
        assert_eq!(round_trip(Object::I16(value)).convert::<i16>().unwrap(), value);
    }
    for value in [i32::MIN, -1, i32::MAX] {
        assert_eq!(round_trip(Object::I32(value)).convert::<i32>().unwrap(), value);
    }
    for value in [u8::MIN, u8::MAX] {
        assert_eq!(round_trip(Object::U8(value)).convert::<u8>().unwrap(), value);
    }
    for value in [u16::MIN, u16::MAX] {
        assert_eq!(round_trip(Object::U16(value)).convert::<u16>().unwrap(), value);
    }
    for value in [u32::MIN, u32::MAX] {
        assert_eq!(round_trip(Object::U32(value)).convert::<u32>().unwrap(), value);
    }

    // -1 does not fit an unsigned type.
    assert!(round_trip(Object::I16(-1)).convert::<u16>().is_err());
}

#[test]
fn test_out_of_range_narrowing_is_an_error() {
    let env = environment();
    let wide = env.to_native(&eval(&env, "2**40")).unwrap();
    assert_eq!(wide, Object::I64(1 << 40));

    assert!(matches!(wide.convert::<i32>(), Err(Error::TypeMismatch { .. })));
    assert!(wide.convert::<u32>().is_err());
    assert_eq!(wide.convert::<i64>().unwrap(), 1 << 40);
}

fn fraction_as_first(_env: &PythonEnvironment, _obj: &Bound<'_, PyAny>) -> Result<Object> {
    Ok(Object::from("first"))
}

fn fraction_as_second(_env: &PythonEnvironment, _obj: &Bound<'_, PyAny>) -> Result<Object> {
    Ok(Object::from("second"))
}

#[test]
fn test_last_registration_wins() {
    let env = environment();
    let third = eval(&env, "__import__('fractions').Fraction(1, 3)");
    assert!(matches!(env.to_native(&third), Err(Error::NoConverter { .. })));

    register_to_native("fraction_as_first", "fractions.Fraction", fraction_as_first).unwrap();
    assert_eq!(env.to_native(&third).unwrap(), Object::from("first"));

    register_to_native("fraction_as_second", "fractions.Fraction", fraction_as_second).unwrap();
    assert_eq!(env.to_native(&third).unwrap(), Object::from("second"));
    assert!(lookup_to_native("fractions.Fraction").is_some());
}

#[test]
fn test_host_containers_round_trip() {
    let env = environment();

    let mixed = Object::Vector(vec![
        Object::from("label"),
        Object::I64(-3),
        Object::Complex64(Complex64::new(1.0, 1.0)),
    ]);
    let back = env.to_native(&env.to_foreign(&mixed).unwrap()).unwrap();
    assert_eq!(back, mixed);

    let set = Object::Set(
        [Object::I64(3), Object::I64(1), Object::from("x")]
            .into_iter()
            .collect(),
    );
    let back = env.to_native(&env.to_foreign(&set).unwrap()).unwrap();
    assert_eq!(back, set);

    let map = Object::Map(btree! {
        Object::from("rate") => Object::F64(48_000.0),
        Object::from("channels") => Object::I64(2),
    });
    let back = env.to_native(&env.to_foreign(&map).unwrap()).unwrap();
    assert_eq!(back, map);
}
