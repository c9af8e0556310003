//! Random helpers for subdivision
//!
//! Every function takes its RNG explicitly so splitting stays reproducible
//! from a seed.

use rand::Rng;

/// Draw from an n-fold uniform sum distribution rescaled to `[a, b)`.
///
/// `n = 1` is uniform, `n = 2` is triangular, and larger `n` concentrates the
/// mass around `(a + b) / 2`.
pub fn uniform_sum<R: Rng + ?Sized>(rng: &mut R, n: u32, a: f32, b: f32) -> f32 {
    let n = n.max(1);
    let step = (b - a) as f64 / n as f64;
    let mut value = a as f64;
    for _ in 0..n {
        value += rng.random::<f64>() * step;
    }
    value as f32
}
