//! Shared shape helpers used by the lowering engine and backends.

/// Computes `product(dims)` with overflow checking.
pub fn checked_element_count_or_error<E, F>(dims: &[usize], mut on_overflow: F) -> Result<usize, E>
where
    F: FnMut() -> E,
{
    dims.iter()
        .try_fold(1usize, |count, &dim| count.checked_mul(dim))
        .ok_or_else(&mut on_overflow)
}

/// Builds row-major contiguous strides with overflow checking.
pub fn contiguous_strides_or_error<E, F>(
    dims: &[usize],
    mut on_overflow: F,
) -> Result<Vec<usize>, E>
where
    F: FnMut() -> E,
{
    let mut strides = vec![1usize; dims.len()];
    let mut running = 1usize;
    for (stride, &dim) in strides.iter_mut().zip(dims).rev() {
        *stride = running;
        running = running.checked_mul(dim).ok_or_else(&mut on_overflow)?;
    }
    Ok(strides)
}

/// Converts a flat row-major index into per-axis coordinates.
pub fn unravel_index(mut index: usize, dims: &[usize]) -> Vec<usize> {
    let mut coords = vec![0; dims.len()];
    for (coord, &dim) in coords.iter_mut().zip(dims).rev() {
        if dim == 0 {
            break;
        }
        *coord = index % dim;
        index /= dim;
    }
    coords
}
