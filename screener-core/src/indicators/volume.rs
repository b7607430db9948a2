//! Volume-spike ratio: latest volume against the mean of the bars before it.

/// Bars in the baseline window. The latest bar is not part of it.
pub const VOLUME_BASELINE_BARS: usize = 19;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeSpike {
    pub latest: f64,
    pub baseline: f64,
    pub ratio: f64,
}

/// `None` with fewer than `VOLUME_BASELINE_BARS + 1` bars or undefined volumes
/// in the window. A zero baseline gives an infinite ratio for any positive
/// latest volume and a zero ratio otherwise.
pub fn volume_spike(volumes: &[f64]) -> Option<VolumeSpike> {
    let n = volumes.len();
    if n < VOLUME_BASELINE_BARS + 1 {
        return None;
    }
    let latest = volumes[n - 1];
    let window = &volumes[(n - 1 - VOLUME_BASELINE_BARS)..(n - 1)];
    if !latest.is_finite() || window.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let baseline = window.iter().sum::<f64>() / VOLUME_BASELINE_BARS as f64;
    let ratio = if baseline > 0.0 {
        latest / baseline
    } else if latest > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };
    Some(VolumeSpike {
        latest,
        baseline,
        ratio,
    })
}
