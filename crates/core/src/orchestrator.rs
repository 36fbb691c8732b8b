use chrono::Utc;

use crate::domain::{CorrectionSettings, Dimensions, EditSession, ImageData, RawMetrics, ReferenceImage};
use crate::error::{Error, ProviderError, Result};
use crate::metrics;

/// Shown when the provider fails without saying why.
pub const INTERRUPTED_MESSAGE: &str = "refinement interrupted";

/// Everything the provider receives for one correction.
#[derive(Debug, Clone, Copy)]
pub struct CorrectionRequest<'a> {
    pub source: &'a ImageData,
    pub settings: &'a CorrectionSettings,
    pub references: &'a [ReferenceImage],
    pub dimensions: Dimensions,
}

/// What a successful provider call returns.
#[derive(Debug, Clone)]
pub struct CorrectionOutput {
    pub result: ImageData,
    pub metrics: RawMetrics,
}

/// The external image-correction service. It alone decides how pixels change;
/// mode, scope and percentages are passed through untouched.
pub trait CorrectionProvider {
    fn correct(&self, request: &CorrectionRequest<'_>) -> std::result::Result<CorrectionOutput, ProviderError>;
}

/// Run a single correction attempt and assemble its session record.
///
/// Fails with [`Error::NoImage`] before contacting the provider when there is
/// no source. Provider failures become [`Error::CorrectionFailed`] and are not
/// retried. Nothing is cached: identical requests call the provider each time.
pub fn run(
    provider: &dyn CorrectionProvider,
    source: Option<&ImageData>,
    settings: &CorrectionSettings,
    references: &[ReferenceImage],
    dimensions: Dimensions,
) -> Result<EditSession> {
    let source = source.filter(|s| !s.is_empty()).ok_or(Error::NoImage)?;

    let request = CorrectionRequest {
        source,
        settings,
        references,
        dimensions,
    };
    let output = provider.correct(&request).map_err(|e| {
        tracing::warn!(error = %e, "correction provider failed");
        Error::CorrectionFailed(e.message().unwrap_or(INTERRUPTED_MESSAGE).to_string())
    })?;

    if output.result.is_empty() {
        tracing::warn!("correction provider returned an empty image");
        return Err(Error::CorrectionFailed(INTERRUPTED_MESSAGE.to_string()));
    }

    let session = EditSession {
        id: uuid::Uuid::new_v4().to_string(),
        original: source.clone(),
        result: output.result,
        settings: *settings,
        timestamp: Utc::now(),
        metrics: metrics::evaluate(&output.metrics, settings),
    };

    tracing::info!(
        session_id = %session.id,
        mode = %settings.mode,
        scope = %settings.scope,
        references = references.len(),
        line_fidelity = session.metrics.absolute_line_fidelity,
        "correction completed"
    );

    Ok(session)
}
