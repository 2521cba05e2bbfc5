/// What the delay trend says about the bottleneck queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BandwidthUsage {
    #[default]
    Normal,
    Underusing,
    Overusing,
}

/// Externally visible state of the delay-based estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EstimatorState {
    #[default]
    Normal,
    /// Overuse detected, but the rate was already cut within the last RTT.
    Overusing,
    /// Overuse detected and the target was lowered.
    Decreasing,
}
