use std::f64::consts::PI;

use clap::ValueEnum;

use crate::loader::IntensityGrid;

//Coefficients with a magnitude below this are treated as numeric noise
const EPS: f64 = 1e-9;

//Hamming distance between two fingerprints (a proper metric on u64)
pub fn distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

///The set of supported fingerprint algorithms is fixed, so a closed enum
///dispatched through compute_fingerprint() replaces open polymorphism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Algorithm {
    ///Average hash: bit set where the sample meets the grid mean
    Ahash,
    ///Difference hash: bit set where a sample exceeds its right neighbour
    Dhash,
    ///DCT perceptual hash: bit set where a low frequency exceeds the AC mean
    Phash,
}

impl Algorithm {
    //Fixed grid each algorithm consumes (width, height)
    pub fn grid_size(self) -> (u32, u32) {
        match self {
            Algorithm::Ahash => (8, 8),
            Algorithm::Dhash => (9, 8),
            Algorithm::Phash => (32, 32),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Ahash => "aHash",
            Algorithm::Dhash => "dHash",
            Algorithm::Phash => "pHash",
        }
    }
}

///Map an intensity grid of the algorithm's required dimensions to a 64-bit
///fingerprint. Deterministic and pure. A grid of the wrong dimensions is a
///caller bug and panics rather than producing a silently wrong fingerprint.
pub fn compute_fingerprint(algo: Algorithm, grid: &IntensityGrid) -> u64 {
    let (w, h) = algo.grid_size();
    assert_eq!(
        (grid.width, grid.height),
        (w, h),
        "{} requires a {}x{} grid",
        algo.name(),
        w,
        h
    );

    match algo {
        Algorithm::Ahash => average_hash(grid),
        Algorithm::Dhash => difference_hash(grid),
        Algorithm::Phash => dct_hash(grid),
    }
}

//Bit i (row-major, i = y*8 + x) is set when sample >= mean. The comparison
//is non-strict, so a uniform grid hashes to all ones.
fn average_hash(grid: &IntensityGrid) -> u64 {
    let total: u64 = grid.data.iter().map(|&p| u64::from(p)).sum();
    let mean = total as f64 / 64.0;

    let mut bits: u64 = 0;
    for (i, &p) in grid.data.iter().enumerate() {
        if f64::from(p) >= mean {
            bits |= 1u64 << i;
        }
    }
    bits
}

//Eight strict left > right comparisons per row over a 9-wide grid. A
//constant grid hashes to zero because no strict inequality holds.
fn difference_hash(grid: &IntensityGrid) -> u64 {
    let mut bits: u64 = 0;
    let mut i = 0;
    for y in 0..8 {
        for x in 0..8 {
            if grid.get(x, y) > grid.get(x + 1, y) {
                bits |= 1u64 << i;
            }
            i += 1;
        }
    }
    bits
}

//Orthonormal 1-D DCT-II: out[u] = c(u) * sum_x in[x] * cos((2x+1)u*pi/2N)
//with c(0) = sqrt(1/N) and c(u>0) = sqrt(2/N).
fn dct_1d(input: &[f64], output: &mut [f64]) {
    let n = input.len();
    for u in 0..n {
        let mut sum = 0.0;
        for (x, &v) in input.iter().enumerate() {
            sum += v * ((((2 * x + 1) * u) as f64 * PI) / (2.0 * n as f64)).cos();
        }
        let scale = if u == 0 {
            (1.0 / n as f64).sqrt()
        } else {
            (2.0 / n as f64).sqrt()
        };
        output[u] = scale * sum;
    }
}

//Samples are normalised to [0,1], transformed with a separable orthonormal
//DCT-II, and the top-left 8x8 block of frequencies is thresholded against
//the mean of its AC coefficients. Near-zero coefficients are clamped to
//exactly zero and excluded from that mean; without the clamp, floating
//point noise flips bits on low-contrast images.
//
//Note this means an all-black grid hashes to 0 (its DC term is also zero)
//while any other constant grid hashes to 1 (only the DC bit survives).
fn dct_hash(grid: &IntensityGrid) -> u64 {
    const N: usize = 32;

    let mut rows = vec![[0f64; N]; N];
    for y in 0..N {
        for x in 0..N {
            rows[y][x] = f64::from(grid.get(x as u32, y as u32)) / 255.0;
        }
    }

    //Transform rows, then columns
    let mut row_freq = vec![[0f64; N]; N];
    for y in 0..N {
        dct_1d(&rows[y], &mut row_freq[y]);
    }
    let mut freq = vec![[0f64; N]; N];
    let mut col = [0f64; N];
    let mut col_out = [0f64; N];
    for v in 0..N {
        for y in 0..N {
            col[y] = row_freq[y][v];
        }
        dct_1d(&col, &mut col_out);
        for u in 0..N {
            freq[u][v] = col_out[u];
        }
    }

    //Top-left 8x8 block, row-major; index 0 is the DC term
    let mut low = [0f64; 64];
    for u in 0..8 {
        for v in 0..8 {
            let c = freq[u][v];
            low[u * 8 + v] = if c.abs() < EPS { 0.0 } else { c };
        }
    }

    //Mean of the AC coefficients, ignoring the clamped near-zero values
    let mut sum = 0.0;
    let mut count: u32 = 0;
    for &c in &low[1..] {
        if c.abs() >= EPS {
            sum += c;
            count += 1;
        }
    }
    let mean = if count > 0 { sum / f64::from(count) } else { 0.0 };

    let mut bits: u64 = 0;
    for (i, &c) in low.iter().enumerate() {
        if c - mean > EPS {
            bits |= 1u64 << i;
        }
    }
    bits
}
