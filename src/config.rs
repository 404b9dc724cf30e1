//! Launch configuration
//!
//! Controls how the host-side drivers in [`crate::launch`] walk a batch: one
//! element after another on the calling thread, or spread over a rayon pool.
//! The kernels themselves never look at this; it only decides who calls them.
//!
//! # Examples
//!
//! ```
//! use trueno_dense::config::{LaunchConfig, Schedule};
//!
//! // Everything on the calling thread (bit-reproducible)
//! let seq = LaunchConfig::sequential();
//! assert_eq!(seq.schedule, Schedule::Sequential);
//!
//! // Custom configuration using builder pattern
//! let custom = LaunchConfig::new()
//!     .with_schedule(Schedule::Parallel)
//!     .with_gemm_lanes_per_group(64)
//!     .with_parallel_threshold(8)
//!     .build();
//! assert_eq!(custom.gemm_lanes_per_group, 64);
//! ```

use crate::batch::{LaneMap, GEMM_LANES_PER_GROUP};

/// Default number of batch elements below which a parallel launch stays sequential
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 4;

/// How a batched launch distributes its batch elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Schedule {
    /// One batch element at a time on the calling thread
    Sequential,
    /// One task per batch element on the rayon pool (`parallel` feature)
    Parallel,
    /// Best available for this build
    #[default]
    Auto,
}

impl Schedule {
    /// Parallel when the crate is built with the `parallel` feature, otherwise sequential
    pub fn select_best() -> Self {
        if cfg!(feature = "parallel") {
            Schedule::Parallel
        } else {
            Schedule::Sequential
        }
    }

    /// Concrete schedule this value stands for in the current build.
    ///
    /// `Auto` resolves through [`Schedule::select_best`]; `Parallel` degrades
    /// to `Sequential` when rayon is not compiled in.
    pub fn resolve(self) -> Self {
        match self {
            Schedule::Auto => Self::select_best(),
            Schedule::Parallel if !cfg!(feature = "parallel") => Schedule::Sequential,
            other => other,
        }
    }
}

/// Configuration for batched launches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    /// How batch elements are distributed
    pub schedule: Schedule,
    /// Lanes that split the output rows of one GEMM batch element in `launch_gemm`
    pub gemm_lanes_per_group: usize,
    /// Batches smaller than this run sequentially even under `Parallel`
    pub parallel_threshold: usize,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            schedule: Schedule::Auto,
            gemm_lanes_per_group: GEMM_LANES_PER_GROUP,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl LaunchConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the schedule
    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Set the GEMM group size. Zero is clamped to one.
    ///
    /// # Examples
    ///
    /// ```
    /// use trueno_dense::config::LaunchConfig;
    ///
    /// let config = LaunchConfig::new().with_gemm_lanes_per_group(0);
    /// assert_eq!(config.gemm_lanes_per_group, 1);
    /// ```
    pub fn with_gemm_lanes_per_group(mut self, lanes: usize) -> Self {
        self.gemm_lanes_per_group = lanes.max(1);
        self
    }

    /// Set the minimum batch count for parallel execution
    pub fn with_parallel_threshold(mut self, batches: usize) -> Self {
        self.parallel_threshold = batches;
        self
    }

    /// Finalize configuration (no-op, for builder pattern consistency)
    pub fn build(self) -> Self {
        self
    }

    /// Sequential preset: deterministic, bit-reproducible results
    pub fn sequential() -> Self {
        Self::new().with_schedule(Schedule::Sequential)
    }

    /// Parallel preset: every batch of two or more elements goes to rayon
    pub fn parallel() -> Self {
        Self::new()
            .with_schedule(Schedule::Parallel)
            .with_parallel_threshold(2)
    }

    /// Lane mapping for grouped GEMM launches
    pub fn gemm_lane_map(&self) -> LaneMap {
        LaneMap::grouped(self.gemm_lanes_per_group)
    }

    /// Schedule to actually use for a batch of `batches` elements
    pub fn schedule_for(&self, batches: usize) -> Schedule {
        match self.schedule.resolve() {
            Schedule::Parallel if batches >= self.parallel_threshold => Schedule::Parallel,
            _ => Schedule::Sequential,
        }
    }
}
