use std::f64::consts::PI;

use tracing::warn;

/// Lowest single-period return a stochastic draw may produce.
pub const CATASTROPHIC_FLOOR: f64 = -0.5;
pub const MAX_RESAMPLE_ATTEMPTS: u32 = 100;

pub fn derive_seed(base_seed: u64, run: u32) -> u64 {
    let mixed = base_seed ^ ((run as u64) << 32) ^ run as u64;
    splitmix64(mixed)
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// xorshift64* generator. Each projection owns one, so runs never share state.
#[derive(Debug, Clone)]
pub struct Rng {
    state: u64,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 {
            0xA5A5_A5A5_A5A5_A5A5
        } else {
            seed
        };
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Uniform in the open interval (0, 1).
    pub fn next_f64(&mut self) -> f64 {
        const DENOM: f64 = (1_u64 << 53) as f64;
        let v = self.next_u64() >> 11;
        ((v as f64) + 0.5) / DENOM
    }

    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    pub fn standard_normal(&mut self) -> f64 {
        let u1 = self.next_f64().max(1e-12);
        let u2 = self.next_f64();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }
}

/// Normally distributed period returns with bounded rejection of wipeout draws.
#[derive(Debug, Clone)]
pub struct ReturnSampler {
    rng: Rng,
    floor: f64,
    max_attempts: u32,
    fallbacks: u32,
}

impl ReturnSampler {
    pub fn new(seed: u64) -> Self {
        Self::with_rng(Rng::new(seed))
    }

    pub fn with_rng(rng: Rng) -> Self {
        Self {
            rng,
            floor: CATASTROPHIC_FLOOR,
            max_attempts: MAX_RESAMPLE_ATTEMPTS,
            fallbacks: 0,
        }
    }

    pub fn with_floor(mut self, floor: f64, max_attempts: u32) -> Self {
        self.floor = floor;
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn sample(&mut self, mean: f64, volatility: f64) -> f64 {
        if volatility <= 0.0 {
            return mean;
        }

        for _ in 0..self.max_attempts {
            let draw = mean + volatility * self.rng.standard_normal();
            if draw >= self.floor {
                return draw;
            }
        }

        self.fallbacks += 1;
        warn!(
            mean,
            volatility,
            floor = self.floor,
            attempts = self.max_attempts,
            "return resampling exhausted; clamping draw to floor"
        );
        self.floor
    }

    /// Number of draws that fell back to the floor.
    pub fn fallbacks(&self) -> u32 {
        self.fallbacks
    }

    pub fn rng_mut(&mut self) -> &mut Rng {
        &mut self.rng
    }
}
