// Lorenz-attractor modulation source.
//
// Integrates dx = σ(y − x), dy = x(ρ − z) − y, dz = xy − βz with explicit
// Euler at a fixed dt, one step per scheduler iteration. Consumers read
// `scalar()`, the x coordinate mapped from roughly [-25, 25] into [0, 1]
// and clamped, for slow organic drift of filter cutoff and dynamics.
//
// The modulator knows nothing about playback: it keeps stepping while the
// transport is stopped, so restarting never snaps back to the seed point.
// If the state ever goes non-finite (only possible with a pathological
// config), it resets to the seed point.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChaosConfig {
    pub sigma: f64,
    pub rho: f64,
    pub beta: f64,
    pub dt: f64,
    pub seed_point: (f64, f64, f64),
}

impl Default for ChaosConfig {
    fn default() -> Self {
        ChaosConfig {
            sigma: 10.0,
            rho: 28.0,
            beta: 8.0 / 3.0,
            dt: 0.005,
            seed_point: (0.1, 0.0, 0.0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChaosState {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Clone, Debug)]
pub struct ChaosModulator {
    config: ChaosConfig,
    state: ChaosState,
}

impl ChaosModulator {
    pub fn new(config: ChaosConfig) -> Self {
        let (x, y, z) = config.seed_point;
        Self {
            config,
            state: ChaosState { x, y, z },
        }
    }

    pub fn state(&self) -> ChaosState {
        self.state
    }

    /// Advance one Euler step and return the new scalar.
    pub fn step(&mut self) -> f64 {
        let ChaosConfig {
            sigma,
            rho,
            beta,
            dt,
            ..
        } = self.config;
        let ChaosState { x, y, z } = self.state;
        let next = ChaosState {
            x: x + sigma * (y - x) * dt,
            y: y + (x * (rho - z) - y) * dt,
            z: z + (x * y - beta * z) * dt,
        };
        if next.x.is_finite() && next.y.is_finite() && next.z.is_finite() {
            self.state = next;
        } else {
            tracing::warn!("chaos state diverged, resetting to seed point");
            self.reset();
        }
        self.scalar()
    }

    pub fn reset(&mut self) {
        let (x, y, z) = self.config.seed_point;
        self.state = ChaosState { x, y, z };
    }

    /// x mapped into [0, 1].
    pub fn scalar(&self) -> f64 {
        ((self.state.x + 25.0) / 50.0).clamp(0.0, 1.0)
    }
}

impl Default for ChaosModulator {
    fn default() -> Self {
        Self::new(ChaosConfig::default())
    }
}
