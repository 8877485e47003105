//! Haar wavelet decomposition and the fixed scoring tables.
//!
//! Everything here is pure math over 128x128 channel planes:
//! - RGB to YIQ color conversion
//! - in-place 2-D Haar decomposition
//! - selection of the top-magnitude coefficients
//! - the `WEIGHTS`/bin tables consumed by query scoring
//!
//! The numeric constants are load-bearing: changing any of them invalidates
//! every signature already stored in a catalog.

/// Side length of the working raster.
pub const NUM_PIXELS: usize = 128;

/// Size of one channel plane; also the coefficient index space.
pub const NUM_PIXELS_SQUARED: usize = NUM_PIXELS * NUM_PIXELS;

/// Number of top-magnitude coefficients retained per channel.
pub const NUM_COEFS: usize = 40;

/// Y, I and Q.
pub const NUM_CHANNELS: usize = 3;

/// Per-bin, per-channel score weights (columns are Y, I, Q). Bin 0 doubles
/// as the weight of the DC-luminance term.
pub const WEIGHTS: [[f32; 3]; 6] = [
    [5.00, 19.21, 34.37],
    [0.83, 1.26, 0.36],
    [1.01, 0.44, 0.45],
    [0.52, 0.53, 0.14],
    [0.47, 0.28, 0.18],
    [0.30, 0.14, 0.27],
];

// Truncated 1/sqrt(2), exactly as the scoring tables expect. Using the full
// precision constant shifts every stored DC term by ~1e-4.
const HALVING_SCALE: f64 = 0.7071;

// bin[y*128 + x] = min(max(y, x), 5): coefficient importance decays with
// distance from the upper-left (low frequency) corner.
static BIN: [u8; NUM_PIXELS_SQUARED] = build_bins();

const fn build_bins() -> [u8; NUM_PIXELS_SQUARED] {
    let mut bins = [5u8; NUM_PIXELS_SQUARED];
    let mut y = 0;
    while y < 5 {
        let mut x = 0;
        while x < 5 {
            bins[y * NUM_PIXELS + x] = if y > x { y as u8 } else { x as u8 };
            x += 1;
        }
        y += 1;
    }
    bins
}

/// Weight bin for a flat coefficient index.
#[inline]
pub fn coef_bin(index: usize) -> usize {
    BIN[index] as usize
}

/// Convert an interleaved RGB8 raster (row-major, `3 * NUM_PIXELS_SQUARED`
/// bytes) into Y, I and Q planes.
pub fn rgb_to_yiq(rgb: &[u8]) -> [Vec<f64>; 3] {
    debug_assert_eq!(rgb.len(), 3 * NUM_PIXELS_SQUARED);

    let mut y = vec![0.0; NUM_PIXELS_SQUARED];
    let mut i = vec![0.0; NUM_PIXELS_SQUARED];
    let mut q = vec![0.0; NUM_PIXELS_SQUARED];

    for (px, rgb) in rgb.chunks_exact(3).enumerate() {
        let (r, g, b) = (rgb[0] as f64, rgb[1] as f64, rgb[2] as f64);
        y[px] = 0.299 * r + 0.587 * g + 0.114 * b;
        i[px] = 0.596 * r - 0.275 * g - 0.321 * b;
        q[px] = 0.212 * r - 0.523 * g + 0.311 * b;
    }

    [y, i, q]
}

/// In-place 2-D Haar decomposition of one channel plane.
///
/// Halving passes run over every row, then every column. Differences are
/// scaled by the running factor as they are produced; the accumulated factor
/// lands on the first element of each lane at the end of its passes.
pub fn haar_2d(a: &mut [f64]) {
    debug_assert_eq!(a.len(), NUM_PIXELS_SQUARED);
    let mut t = [0.0f64; NUM_PIXELS / 2];

    for row in (0..NUM_PIXELS_SQUARED).step_by(NUM_PIXELS) {
        let mut c = 1.0;
        let mut h = NUM_PIXELS;
        while h > 1 {
            let h1 = h >> 1;
            c *= HALVING_SCALE;
            for k in 0..h1 {
                let j = row + 2 * k;
                t[k] = (a[j] - a[j + 1]) * c;
                a[row + k] = a[j] + a[j + 1];
            }
            a[row + h1..row + h].copy_from_slice(&t[..h1]);
            h = h1;
        }
        a[row] *= c;
    }

    for col in 0..NUM_PIXELS {
        let mut c = 1.0;
        let mut h = NUM_PIXELS;
        while h > 1 {
            let h1 = h >> 1;
            c *= HALVING_SCALE;
            for k in 0..h1 {
                let j = col + 2 * k * NUM_PIXELS;
                t[k] = (a[j] - a[j + NUM_PIXELS]) * c;
                a[col + k * NUM_PIXELS] = a[j] + a[j + NUM_PIXELS];
            }
            for k in 0..h1 {
                a[col + (h1 + k) * NUM_PIXELS] = t[k];
            }
            h = h1;
        }
        a[col] *= c;
    }
}

/// Decompose all three YIQ planes and normalize the DC terms back to the
/// unit pixel scale.
pub fn transform(channels: &mut [Vec<f64>; 3]) {
    for chan in channels.iter_mut() {
        haar_2d(chan);
        chan[0] /= 256.0 * 128.0;
    }
}

/// Pick the `NUM_COEFS` largest-magnitude coefficients of a decomposed
/// plane, excluding the DC term at index 0.
///
/// Ties on magnitude break toward the lower flat index, so extraction is
/// reproducible across platforms. The returned indices carry the sign of
/// their coefficient and are sorted ascending by signed value.
pub fn largest_coefs(chan: &[f64]) -> [i16; NUM_COEFS] {
    let mut order: Vec<u16> = (1..NUM_PIXELS_SQUARED as u16).collect();
    order.select_nth_unstable_by(NUM_COEFS - 1, |&a, &b| {
        chan[b as usize]
            .abs()
            .total_cmp(&chan[a as usize].abs())
            .then_with(|| a.cmp(&b))
    });

    let mut sig = [0i16; NUM_COEFS];
    for (slot, &index) in sig.iter_mut().zip(order[..NUM_COEFS].iter()) {
        *slot = if chan[index as usize] < 0.0 {
            -(index as i16)
        } else {
            index as i16
        };
    }
    sig.sort_unstable();
    sig
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bin_layout() {
        assert_eq!(coef_bin(1), 1);
        assert_eq!(coef_bin(NUM_PIXELS), 1);
        assert_eq!(coef_bin(NUM_PIXELS + 1), 1);
        assert_eq!(coef_bin(4 * NUM_PIXELS + 2), 4);
        assert_eq!(coef_bin(3 * NUM_PIXELS + 1), 3);
        assert_eq!(coef_bin(5), 5);
        assert_eq!(coef_bin(6 * NUM_PIXELS), 5);
        assert_eq!(coef_bin(NUM_PIXELS_SQUARED - 1), 5);
    }

    #[test]
    fn test_flat_raster_dc() {
        // A uniform gray image: the DC term is the mean pixel value on the
        // [0, 1] scale, every other coefficient is exactly zero.
        let rgb = vec![200u8; 3 * NUM_PIXELS_SQUARED];
        let mut channels = rgb_to_yiq(&rgb);
        transform(&mut channels);

        assert!((channels[0][0] - 200.0 / 256.0).abs() < 1e-3);
        assert!(channels[1][0].abs() < 1e-6);
        assert!(channels[2][0].abs() < 1e-6);
        assert!(channels[0][1..].iter().all(|&c| c == 0.0));
    }

    #[test]
    fn test_largest_coefs_tie_break() {
        // All-equal magnitudes: ties resolve to the lowest flat indices,
        // positive sign for non-negative coefficients.
        let chan = vec![0.0; NUM_PIXELS_SQUARED];
        let sig = largest_coefs(&chan);
        let expected: Vec<i16> = (1..=NUM_COEFS as i16).collect();
        assert_eq!(sig.to_vec(), expected);
    }

    #[test]
    fn test_largest_coefs_signs_and_order() {
        let mut chan = vec![0.0; NUM_PIXELS_SQUARED];
        chan[10] = -5.0;
        chan[300] = 4.0;
        chan[7] = 3.0;
        let sig = largest_coefs(&chan);

        assert!(sig.contains(&-10));
        assert!(sig.contains(&300));
        assert!(sig.contains(&7));
        // ascending signed order
        let mut sorted = sig;
        sorted.sort_unstable();
        assert_eq!(sig, sorted);
    }

    #[test]
    fn test_haar_2d_deterministic() {
        let mut a = vec![0.0; NUM_PIXELS_SQUARED];
        for (i, v) in a.iter_mut().enumerate() {
            *v = ((i * 31) % 255) as f64;
        }
        let mut b = a.clone();
        haar_2d(&mut a);
        haar_2d(&mut b);
        assert_eq!(a, b);
    }
}
