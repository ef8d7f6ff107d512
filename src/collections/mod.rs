mod var_heap;

pub use var_heap::*;

pub const VEC_INIT_SIZE: usize = 5;

pub fn grow_to<T: Clone>(vec: &mut Vec<T>, size: usize, pad: T) {
    if vec.len() >= size {
        return;
    }
    vec.reserve(size - vec.len());
    for _ in vec.len()..size {
        vec.push(pad.clone());
    }
}
