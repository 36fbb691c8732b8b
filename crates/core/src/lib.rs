pub mod catalog;
pub mod domain;
pub mod error;
pub mod hasher;
pub mod history;
pub mod metrics;
pub mod orchestrator;
pub mod retrieval;
pub mod settings;
pub mod store;
pub mod view;

use std::collections::BTreeSet;

use catalog::ReferenceCatalog;
use domain::*;
use error::{Error, Result};
use hasher::perceptual::{self, Fingerprint};
use history::SessionHistory;
use orchestrator::CorrectionProvider;
use settings::SettingsInput;
use store::StudioStore;
use view::{Transition, ViewState};

/// Snapshot of everything one correction attempt needs, taken when the
/// attempt starts. Later edits to the studio do not affect it.
#[derive(Debug, Clone)]
pub struct CorrectionTicket {
    source: ImageData,
    settings: CorrectionSettings,
    references: Vec<ReferenceImage>,
    dimensions: Dimensions,
}

impl CorrectionTicket {
    pub fn settings(&self) -> &CorrectionSettings {
        &self.settings
    }

    pub fn references(&self) -> &[ReferenceImage] {
        &self.references
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Call the provider. Safe to run away from the studio; hand the outcome
    /// back through [`Studio::finish_correction`].
    pub fn run(&self, provider: &dyn CorrectionProvider) -> Result<EditSession> {
        orchestrator::run(
            provider,
            Some(&self.source),
            &self.settings,
            &self.references,
            self.dimensions,
        )
    }
}

/// The main entry point: owns the catalog, settings, history and view, and
/// serializes every state change through `&mut self`.
pub struct Studio<S: StudioStore> {
    store: S,
    catalog: ReferenceCatalog,
    settings: CorrectionSettings,
    history: SessionHistory,
    view: ViewState,
    dimensions: Option<Dimensions>,
    source_fingerprint: Option<Fingerprint>,
    references: Vec<ReferenceImage>,
    in_flight: bool,
}

impl<S: StudioStore> Studio<S> {
    /// Load persisted state from `store`, falling back to built-in defaults
    /// for anything missing or unreadable.
    pub fn open(store: S) -> Self {
        let catalog = ReferenceCatalog::from_parts(store.load_catalog(), store.load_selection());
        let settings = store.load_settings();
        let mut studio = Self {
            store,
            catalog,
            settings,
            history: SessionHistory::new(),
            view: ViewState::new(),
            dimensions: None,
            source_fingerprint: None,
            references: Vec::new(),
            in_flight: false,
        };
        studio.refresh_references();
        studio
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn catalog(&self) -> &ReferenceCatalog {
        &self.catalog
    }

    pub fn settings(&self) -> &CorrectionSettings {
        &self.settings
    }

    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn dimensions(&self) -> Option<Dimensions> {
        self.dimensions
    }

    /// The current ranked references, recomputed whenever the source image,
    /// angle or enabled packs change.
    pub fn references(&self) -> &[ReferenceImage] {
        &self.references
    }

    /// Whether a correction attempt is outstanding.
    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    // ── Source image ─────────────────────────────────────────────────

    /// Load a new source image. Discards any current result.
    pub fn upload(&mut self, bytes: impl Into<Vec<u8>>) -> Result<Dimensions> {
        let data = ImageData::from(bytes.into());
        let dimensions = Dimensions::probe(&data)?;
        self.source_fingerprint = perceptual::compute_fingerprint(&data);
        self.dimensions = Some(dimensions);
        self.view.upload(data);
        self.refresh_references();
        Ok(dimensions)
    }

    /// Make the current result the new source, ready for another pass.
    /// Returns false when there is no result to promote.
    pub fn promote_result(&mut self) -> bool {
        let Some(source) = self.view.promote().cloned() else {
            return false;
        };
        self.set_source_metadata(&source);
        self.refresh_references();
        true
    }

    /// Reload a recorded session's original/result pair into the view.
    pub fn replay(&mut self, session_id: &str) -> Result<()> {
        let (original, result) = self.history.replay(session_id)?;
        self.set_source_metadata(&original);
        self.view.restore(original, result);
        self.refresh_references();
        Ok(())
    }

    pub fn set_view(&mut self, mode: ViewMode) -> Transition {
        self.view.request(mode)
    }

    // ── Settings ─────────────────────────────────────────────────────

    /// Validate `input` over the current settings and commit it.
    /// An invalid field leaves the current settings untouched.
    pub fn update_settings(&mut self, input: &SettingsInput) -> Result<CorrectionSettings> {
        let updated = settings::normalize_over(&self.settings, input)?;
        let angle_changed = updated.angle_tag != self.settings.angle_tag;
        self.settings = updated;
        if let Err(e) = self.store.save_settings(&self.settings) {
            tracing::warn!(error = %e, "failed to persist settings");
        }
        if angle_changed {
            self.refresh_references();
        }
        Ok(updated)
    }

    pub fn set_angle(&mut self, angle: AngleTag) -> CorrectionSettings {
        let input = SettingsInput {
            angle_tag: Some(angle.label().to_string()),
            ..SettingsInput::default()
        };
        // A known label always validates
        self.update_settings(&input).unwrap_or(self.settings)
    }

    // ── Catalog ──────────────────────────────────────────────────────

    pub fn create_pack(&mut self, name: &str, description: &str) -> Result<String> {
        let id = self.catalog.create_pack(name, description)?.id.clone();
        self.persist_catalog();
        self.persist_selection();
        Ok(id)
    }

    pub fn delete_pack(&mut self, pack_id: &str) -> Result<ReferencePack> {
        let pack = self.catalog.delete_pack(pack_id)?;
        self.persist_catalog();
        self.persist_selection();
        self.refresh_references();
        Ok(pack)
    }

    pub fn import_reference(
        &mut self,
        pack_id: &str,
        bytes: impl Into<Vec<u8>>,
        tags: BTreeSet<String>,
    ) -> Result<String> {
        let id = self
            .catalog
            .add_image(pack_id, ImageData::from(bytes.into()), tags)?
            .id
            .clone();
        self.persist_catalog();
        self.refresh_references();
        Ok(id)
    }

    pub fn remove_reference(&mut self, pack_id: &str, image_id: &str) -> Result<()> {
        self.catalog.remove_image(pack_id, image_id)?;
        self.persist_catalog();
        self.refresh_references();
        Ok(())
    }

    pub fn retag_reference(&mut self, pack_id: &str, image_id: &str, tags: BTreeSet<String>) -> Result<()> {
        self.catalog.set_image_tags(pack_id, image_id, tags)?;
        self.persist_catalog();
        self.refresh_references();
        Ok(())
    }

    pub fn set_pack_enabled(&mut self, pack_id: &str, enabled: bool) -> Result<()> {
        if self.catalog.set_enabled(pack_id, enabled)? {
            self.persist_selection();
            self.refresh_references();
        }
        Ok(())
    }

    // ── Correction ───────────────────────────────────────────────────

    /// Start a correction attempt: check preconditions, mark the studio busy
    /// and snapshot the inputs. Every ticket must be handed back through
    /// [`finish_correction`](Self::finish_correction).
    pub fn begin_correction(&mut self) -> Result<CorrectionTicket> {
        if self.in_flight {
            return Err(Error::CorrectionInFlight);
        }
        let source = self
            .view
            .original()
            .filter(|s| !s.is_empty())
            .cloned()
            .ok_or(Error::NoImage)?;
        let dimensions = match self.dimensions {
            Some(d) => d,
            None => Dimensions::probe(&source)?,
        };
        self.in_flight = true;
        Ok(CorrectionTicket {
            source,
            settings: self.settings,
            references: self.references.clone(),
            dimensions,
        })
    }

    /// Close the outstanding attempt. A success is recorded in history and,
    /// if the source has not been replaced meanwhile, shown as `After`.
    /// A failure is returned as-is and leaves the previous result in place.
    /// Without an outstanding ticket the outcome is discarded.
    pub fn finish_correction(&mut self, outcome: Result<EditSession>) -> Result<&EditSession> {
        if !self.in_flight {
            return Err(Error::NoCorrectionInFlight);
        }
        self.in_flight = false;
        let session = outcome?;
        let id = session.id.clone();

        if self.view.original() == Some(&session.original) {
            self.view.show_result(session.result.clone());
        } else {
            tracing::info!(session_id = %id, "source changed during correction, result kept in history only");
        }
        self.history.append(session);
        self.history
            .latest()
            .filter(|s| s.id == id)
            .ok_or(Error::SessionNotFound(id))
    }

    /// Run one correction end to end with `provider`.
    pub fn correct(&mut self, provider: &dyn CorrectionProvider) -> Result<&EditSession> {
        let ticket = self.begin_correction()?;
        let outcome = ticket.run(provider);
        self.finish_correction(outcome)
    }

    /// Empty the history. Irreversible; confirm with the user first.
    pub fn clear_history(&mut self) -> usize {
        let removed = self.history.clear();
        tracing::info!(removed, "cleared session history");
        removed
    }

    // ── Internals ────────────────────────────────────────────────────

    fn set_source_metadata(&mut self, source: &ImageData) {
        self.source_fingerprint = perceptual::compute_fingerprint(source);
        self.dimensions = match Dimensions::probe(source) {
            Ok(d) => Some(d),
            Err(e) => {
                tracing::warn!(error = %e, "could not read dimensions of new source");
                None
            }
        };
    }

    fn refresh_references(&mut self) {
        self.references = retrieval::rank_fingerprinted(
            self.source_fingerprint,
            &self.catalog.enabled_packs(),
            self.settings.angle_tag,
            retrieval::DEFAULT_RANK_LIMIT,
        );
    }

    fn persist_catalog(&self) {
        if let Err(e) = self.store.save_catalog(self.catalog.packs()) {
            tracing::warn!(error = %e, "failed to persist reference catalog");
        }
    }

    fn persist_selection(&self) {
        if let Err(e) = self.store.save_selection(self.catalog.enabled_ids()) {
            tracing::warn!(error = %e, "failed to persist pack selection");
        }
    }
}
