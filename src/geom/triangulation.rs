/// Triangle indices for a row-major `u_count × v_count` vertex grid.
///
/// Wrapped directions connect the last column/row back to the first.
#[must_use]
pub fn triangulate_grid_wrapped(
    u_count: usize,
    v_count: usize,
    wrap_u: bool,
    wrap_v: bool,
) -> Vec<u32> {
    let u_count = if wrap_u { u_count.max(3) } else { u_count.max(2) };
    let v_count = if wrap_v { v_count.max(3) } else { v_count.max(2) };

    let quad_u = if wrap_u { u_count } else { u_count - 1 };
    let quad_v = if wrap_v { v_count } else { v_count - 1 };
    let mut indices = Vec::with_capacity(quad_u * quad_v * 6);

    let index = |u: usize, v: usize| u32::try_from(v * u_count + u).unwrap_or(u32::MAX);
    for v in 0..quad_v {
        let v1 = (v + 1) % v_count;
        for u in 0..quad_u {
            let u1 = (u + 1) % u_count;

            let i0 = index(u, v);
            let i1 = index(u1, v);
            let i2 = index(u, v1);
            let i3 = index(u1, v1);

            indices.extend_from_slice(&[i0, i1, i2]);
            indices.extend_from_slice(&[i2, i1, i3]);
        }
    }

    indices
}

#[must_use]
pub fn triangulate_grid(u_count: usize, v_count: usize) -> Vec<u32> {
    triangulate_grid_wrapped(u_count, v_count, false, false)
}
