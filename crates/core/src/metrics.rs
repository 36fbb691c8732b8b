use crate::domain::{CorrectionMetrics, CorrectionSettings, RawMetrics};

/// Largest outside-mask difference still counted as untouched linework.
/// Absorbs imperceptible provider noise outside the editable mask.
pub const FIDELITY_TOLERANCE: f64 = 0.004;

/// Interpret provider metrics against the settings that produced them.
///
/// Numbers are copied verbatim. `absolute_line_fidelity` reports whether
/// fidelity was achieved: it is only true when it was requested and the
/// outside-mask difference stayed within [`FIDELITY_TOLERANCE`]. A shortfall
/// is data, never an error.
pub fn evaluate(raw: &RawMetrics, settings: &CorrectionSettings) -> CorrectionMetrics {
    let achieved = settings.absolute_line_fidelity && raw.diff_outside_mask <= FIDELITY_TOLERANCE;

    if settings.absolute_line_fidelity && !achieved {
        tracing::warn!(
            diff_outside_mask = raw.diff_outside_mask,
            tolerance = FIDELITY_TOLERANCE,
            "line fidelity requested but not achieved"
        );
    }

    CorrectionMetrics {
        mask_coverage: raw.mask_coverage,
        denoise_used: raw.denoise_used,
        diff_in_mask: raw.diff_in_mask,
        diff_outside_mask: raw.diff_outside_mask,
        absolute_line_fidelity: achieved,
    }
}
