mod common;

use proxy_core::{BufferChunk, Complex32, DType, Object};

use common::{environment, eval, numpy_available};

#[test]
fn test_buffer_reaches_numpy_without_copy() {
    let env = environment();
    if !numpy_available(&env) {
        eprintln!("numpy not installed, skipping");
        return;
    }

    let chunk = BufferChunk::from_slice(&[1.0f32, 2.0, 3.0, 4.0]);
    let array = env.to_foreign(&Object::Buffer(chunk.clone())).unwrap();
    assert_eq!(array.class_name(), "numpy.ndarray");
    assert_eq!(array.get("dtype").unwrap().to_display(), "float32");

    let interface = array.get("__array_interface__").unwrap();
    let data = interface
        .call_with("get", &[Object::from("data")])
        .unwrap()
        .convert::<Vec<Object>>()
        .unwrap();
    assert_eq!(data[0].convert::<usize>().unwrap(), chunk.address());

    // Writes through numpy are visible in the chunk.
    array
        .call_with("__setitem__", &[Object::I64(0), Object::F64(9.5)])
        .unwrap();
    assert_eq!(chunk.as_slice::<f32>().unwrap(), &[9.5, 2.0, 3.0, 4.0]);
}

#[test]
fn test_vector_dtype_becomes_two_dimensional() {
    let env = environment();
    if !numpy_available(&env) {
        return;
    }

    let chunk = BufferChunk::new(DType::parse("int16,2").unwrap(), 3);
    let array = env.to_foreign(&Object::Buffer(chunk)).unwrap();
    let shape = array.get("shape").unwrap().convert::<Vec<usize>>().unwrap();
    assert_eq!(shape, vec![3, 2]);
}

#[test]
fn test_numpy_array_becomes_buffer() {
    let env = environment();
    if !numpy_available(&env) {
        return;
    }

    let array = eval(
        &env,
        "__import__('numpy').arange(6, dtype='complex64')",
    );
    let chunk: BufferChunk = env.to_native(&array).unwrap().convert().unwrap();
    assert_eq!(chunk.dtype().name(), "complex_float32");
    assert_eq!(chunk.elements(), 6);
    assert_eq!(chunk.as_slice::<Complex32>().unwrap()[5], Complex32::new(5.0, 0.0));
    drop(array);
    // The chunk keeps the array alive.
    assert_eq!(chunk.as_slice::<Complex32>().unwrap()[1], Complex32::new(1.0, 0.0));
}

#[test]
fn test_strided_array_is_made_contiguous() {
    let env = environment();
    if !numpy_available(&env) {
        return;
    }

    let strided = eval(&env, "__import__('numpy').arange(10, dtype='uint16')[::2]");
    let chunk: BufferChunk = env.to_native(&strided).unwrap().convert().unwrap();
    assert_eq!(chunk.as_slice::<u16>().unwrap(), &[0, 2, 4, 6, 8]);
}

#[test]
fn test_numpy_scalars_use_python_values() {
    let env = environment();
    if !numpy_available(&env) {
        return;
    }

    assert_eq!(
        env.to_native(&eval(&env, "__import__('numpy').float32(0.5)")).unwrap(),
        Object::F64(0.5)
    );
    assert_eq!(
        env.to_native(&eval(&env, "__import__('numpy').uint8(200)")).unwrap(),
        Object::I64(200)
    );
    assert_eq!(
        env.to_native(&eval(&env, "__import__('numpy').bool_(True)")).unwrap(),
        Object::Bool(true)
    );
}

#[test]
fn test_buffer_round_trip_shares_memory() {
    let env = environment();
    if !numpy_available(&env) {
        return;
    }

    let chunk = BufferChunk::from_slice(&[0.5f32, 1.5, 2.5]);
    let array = env.to_foreign(&Object::Buffer(chunk.clone())).unwrap();

    // SAFETY: no other view of the chunk is read or written concurrently.
    unsafe { chunk.as_mut_slice::<f32>().unwrap()[2] = -1.0 };

    let back: BufferChunk = env.to_native(&array).unwrap().convert().unwrap();
    assert_eq!(back.dtype(), chunk.dtype());
    assert_eq!(back.elements(), 3);
    assert_eq!(back.address(), chunk.address());
    assert_eq!(back.as_slice::<f32>().unwrap(), &[0.5, 1.5, -1.0]);
}

#[test]
fn test_complex_int_buffer_gets_component_axis() {
    let env = environment();
    if !numpy_available(&env) {
        return;
    }

    let components = BufferChunk::from_slice(&[1i16, -1, 2, -2, 3, -3]);
    let dtype = DType::parse("complex_int16").unwrap();
    let chunk = BufferChunk::from_shared(dtype, components.buffer().clone());
    assert_eq!(chunk.elements(), 3);

    let array = env.to_foreign(&Object::Buffer(chunk.clone())).unwrap();
    assert_eq!(array.get("dtype").unwrap().to_display(), "int16");
    let shape = array.get("shape").unwrap().convert::<Vec<i64>>().unwrap();
    assert_eq!(shape, vec![3, 2]);
    let second = array
        .call_with("__getitem__", &[Object::I64(1)])
        .unwrap()
        .call_with("tolist", &[])
        .unwrap();
    assert_eq!(second.convert::<Vec<i64>>().unwrap(), vec![2, -2]);

    // Back in the host the components arrive as a two-wide int16 vector over
    // the same memory.
    let back: BufferChunk = env.to_native(&array).unwrap().convert().unwrap();
    assert_eq!(back.dtype(), &DType::new("int16", 2).unwrap());
    assert_eq!(back.address(), chunk.address());
    assert_eq!(back.as_slice::<i16>().unwrap(), &[1, -1, 2, -2, 3, -3]);
}
