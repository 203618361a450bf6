//! Opt-in timing hooks for muscle evaluation, binding and preview meshing.
//!
//! Timing is only collected when the `engine_metrics` feature is enabled and
//! the target is not WASM (`std::time::Instant` is unavailable there). In every
//! other configuration the calls compile down to plain closure invocations.
//!
//! ```ignore
//! use anatomy_engine::geom::{GeomMetrics, TimingBucket};
//!
//! let mut metrics = GeomMetrics::default();
//! metrics.begin();
//! let sections = metrics.time(TimingBucket::Sections, || build_sections(&inputs));
//! if let Some(report) = metrics.end() {
//!     println!("sections: {} ns", report.sections_ns);
//! }
//! ```

/// Phases of an evaluation that accumulate time independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimingBucket {
    /// Surface evaluation of the four attachment points.
    Attachments,
    /// Muscle positions and the centerline curve.
    Curve,
    /// Cross-section frames and rest dimensions.
    Sections,
    /// Ring transform and surface construction.
    Loft,
    /// Nearest-vertex correspondence search.
    Bind,
    /// Blend pass of the vertex snap deformer.
    Deform,
    /// Surface grid sampling for previews.
    SurfaceTessellation,
    /// Grid triangulation for previews.
    Triangulation,
}

/// Cumulative nanoseconds per [`TimingBucket`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GeomTimingReport {
    pub attachments_ns: u64,
    pub curve_ns: u64,
    pub sections_ns: u64,
    pub loft_ns: u64,
    pub bind_ns: u64,
    pub deform_ns: u64,
    pub surface_tessellation_ns: u64,
    pub triangulation_ns: u64,
}

impl GeomTimingReport {
    #[must_use]
    pub fn total_ns(&self) -> u64 {
        self.attachments_ns
            .saturating_add(self.curve_ns)
            .saturating_add(self.sections_ns)
            .saturating_add(self.loft_ns)
            .saturating_add(self.bind_ns)
            .saturating_add(self.deform_ns)
            .saturating_add(self.surface_tessellation_ns)
            .saturating_add(self.triangulation_ns)
    }

    #[cfg(all(feature = "engine_metrics", not(target_arch = "wasm32")))]
    fn bucket_mut(&mut self, bucket: TimingBucket) -> &mut u64 {
        match bucket {
            TimingBucket::Attachments => &mut self.attachments_ns,
            TimingBucket::Curve => &mut self.curve_ns,
            TimingBucket::Sections => &mut self.sections_ns,
            TimingBucket::Loft => &mut self.loft_ns,
            TimingBucket::Bind => &mut self.bind_ns,
            TimingBucket::Deform => &mut self.deform_ns,
            TimingBucket::SurfaceTessellation => &mut self.surface_tessellation_ns,
            TimingBucket::Triangulation => &mut self.triangulation_ns,
        }
    }
}

/// Accumulator for timing evaluation phases.
///
/// When the `engine_metrics` feature is disabled (or on WASM), all methods
/// are no-ops and [`end`](Self::end) returns `None`.
#[derive(Debug, Default)]
pub struct GeomMetrics {
    #[cfg(all(feature = "engine_metrics", not(target_arch = "wasm32")))]
    report: GeomTimingReport,
}

impl GeomMetrics {
    /// Resets all timing counters to zero.
    pub fn begin(&mut self) {
        #[cfg(all(feature = "engine_metrics", not(target_arch = "wasm32")))]
        {
            self.report = GeomTimingReport::default();
        }
    }

    #[must_use]
    pub fn end(&self) -> Option<GeomTimingReport> {
        #[cfg(all(feature = "engine_metrics", not(target_arch = "wasm32")))]
        {
            Some(self.report.clone())
        }
        #[cfg(not(all(feature = "engine_metrics", not(target_arch = "wasm32"))))]
        {
            None
        }
    }

    pub fn time<R>(&mut self, bucket: TimingBucket, f: impl FnOnce() -> R) -> R {
        #[cfg(all(feature = "engine_metrics", not(target_arch = "wasm32")))]
        {
            let start = std::time::Instant::now();
            let result = f();
            let nanos = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);
            let slot = self.report.bucket_mut(bucket);
            *slot = slot.saturating_add(nanos);
            result
        }

        #[cfg(not(all(feature = "engine_metrics", not(target_arch = "wasm32"))))]
        {
            let _ = bucket;
            f()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_returns_closure_result() {
        let mut metrics = GeomMetrics::default();
        metrics.begin();
        let value = metrics.time(TimingBucket::Bind, || 41 + 1);
        assert_eq!(value, 42);

        #[cfg(all(feature = "engine_metrics", not(target_arch = "wasm32")))]
        assert!(metrics.end().is_some());
        #[cfg(not(all(feature = "engine_metrics", not(target_arch = "wasm32"))))]
        assert!(metrics.end().is_none());
    }

    #[test]
    fn total_sums_every_bucket() {
        let report = GeomTimingReport {
            attachments_ns: 1,
            curve_ns: 2,
            sections_ns: 3,
            loft_ns: 4,
            bind_ns: 5,
            deform_ns: 6,
            surface_tessellation_ns: 7,
            triangulation_ns: 8,
        };
        assert_eq!(report.total_ns(), 36);
    }
}
