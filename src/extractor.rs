// Pipeline orchestration.
//
// Six stages run in a straight line: line grouping, body detection,
// header role inference, column banding, row normalization, and final
// shaping. Insufficient input (no body, no band samples) produces an
// empty-but-valid document so callers can retry with different OCR;
// only malformed input is an error.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::ExtractError;
use crate::lexicon::code_lexicon;
use crate::lines::{self, Line};
use crate::llm::{roles_from_fallback, FallbackGuard, HeaderRoleFallback, PatientNameFallback};
use crate::metadata::{self, Metadata};
use crate::output::{validate_tests, DocumentResult, ValidationSummary};
use crate::table::bands::build_bands;
use crate::table::body::{filter_body, find_body_start, DroppedLine};
use crate::table::header::{
    detect_ocr_header, evaluate_header_body_alignment, infer_header_from_body, AlignmentDetail,
    HeaderRoles, RoleSource,
};
use crate::table::rows::{
    apply_final_filters, build_rows, normalize_units_and_values, shape_tests,
    split_reference_ranges, truncate_to_columns, FilterStats,
};
use crate::ocr::TokenRecord;

/// Why a document came back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortCircuit {
    /// No line led with a resolvable test code.
    NoBodyDetected,
    /// No body line matched the header's column count, so no bands could
    /// be formed.
    NoBandSamples,
}

/// Alignment-gate outcome for the debug channel.
#[derive(Debug, Clone)]
pub struct AlignmentOutcome {
    pub score: f64,
    pub detail: AlignmentDetail,
    pub threshold: f64,
    pub fell_back_to_inferred: bool,
}

/// Stage provenance and rejection log for one extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractionDebug {
    pub body_start: Option<usize>,
    pub body_line_count: usize,
    pub dropped_lines: Vec<DroppedLine>,
    pub header_index: Option<usize>,
    pub header_source: Option<RoleSource>,
    pub header_roles: HeaderRoles,
    pub header_policy_valid: bool,
    pub alignment: Option<AlignmentOutcome>,
    pub short_circuit: Option<ShortCircuit>,
    pub filter_stats: FilterStats,
    pub validation: ValidationSummary,
}

/// A document plus its debug channel.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub document: DocumentResult,
    pub debug: ExtractionDebug,
}

/// Rule-first extractor for veterinary lab-report tables.
pub struct LabReportExtractor {
    settings: Settings,
    header_fallback: Option<Arc<dyn HeaderRoleFallback>>,
    patient_fallback: Option<Arc<dyn PatientNameFallback>>,
    guard: FallbackGuard,
}

impl LabReportExtractor {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            header_fallback: None,
            patient_fallback: None,
            guard: FallbackGuard::default(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Attach an optional header-role fallback capability.
    pub fn with_header_fallback(mut self, fallback: Arc<dyn HeaderRoleFallback>) -> Self {
        self.header_fallback = Some(fallback);
        self
    }

    /// Attach an optional patient-name fallback capability.
    pub fn with_patient_fallback(mut self, fallback: Arc<dyn PatientNameFallback>) -> Self {
        self.patient_fallback = Some(fallback);
        self
    }

    /// Extract one page from raw OCR token records.
    pub async fn extract_records(
        &self,
        records: Vec<TokenRecord>,
    ) -> Result<DocumentResult, ExtractError> {
        let lines = lines::group_lines(records, &self.settings)?;
        Ok(self.extract_lines_with_debug(lines).await?.document)
    }

    /// Extract one page from pre-grouped lines.
    pub async fn extract_lines(&self, lines: Vec<Line>) -> Result<DocumentResult, ExtractError> {
        Ok(self.extract_lines_with_debug(lines).await?.document)
    }

    /// Full extraction with the debug channel attached.
    pub async fn extract_lines_with_debug(
        &self,
        lines: Vec<Line>,
    ) -> Result<Extraction, ExtractError> {
        if code_lexicon().is_empty() {
            return Err(ExtractError::EmptyLexicon);
        }

        let mut dbg = ExtractionDebug::default();

        // Body detection. Without a body there is nothing to anchor
        // metadata or columns to: short-circuit to an empty document.
        let Some(body_start) = find_body_start(&lines) else {
            info!("no body detected");
            dbg.short_circuit = Some(ShortCircuit::NoBodyDetected);
            return Ok(Extraction {
                document: DocumentResult::default(),
                debug: dbg,
            });
        };
        dbg.body_start = Some(body_start);

        let (body, dropped) = filter_body(&lines, body_start);
        dbg.body_line_count = body.len();
        dbg.dropped_lines = dropped;

        // Header roles: OCR header, gated on body alignment, then rule
        // inference, then the optional external fallback.
        let mut header_index: Option<usize> = None;
        let mut header_source: Option<RoleSource> = None;
        let mut roles = HeaderRoles::default();

        if let Some((idx, ocr_roles)) = detect_ocr_header(&lines, body_start, &self.settings) {
            header_index = Some(idx);
            header_source = Some(RoleSource::Ocr);
            roles = ocr_roles;

            let (score, detail) =
                evaluate_header_body_alignment(&roles, &body, self.settings.preview_rows);
            let mut fell_back = false;
            if score < self.settings.header_alignment_threshold {
                warn!(score, "ocr header failed the alignment gate");
                if let Some((inferred, _sample)) = infer_header_from_body(&body, &self.settings) {
                    roles = inferred;
                    header_source = Some(RoleSource::Inferred);
                    header_index = None;
                    fell_back = true;
                }
            }
            dbg.alignment = Some(AlignmentOutcome {
                score,
                detail,
                threshold: self.settings.header_alignment_threshold,
                fell_back_to_inferred: fell_back,
            });
        } else if let Some((inferred, sample)) = infer_header_from_body(&body, &self.settings) {
            roles = inferred;
            header_source = Some(RoleSource::Inferred);

            if !roles.is_policy_valid() {
                if let Some(fallback) = &self.header_fallback {
                    debug!("rule-based roles failed policy; invoking fallback");
                    let result = self
                        .guard
                        .run(
                            self.settings.llm_max_concurrency,
                            fallback.infer_header_roles(&sample),
                        )
                        .await;
                    match result {
                        Ok(raw) => {
                            if let Some(llm_roles) = roles_from_fallback(raw) {
                                roles = llm_roles;
                                header_source = Some(RoleSource::Llm);
                            }
                        }
                        Err(err) => warn!(error = %err, "header fallback failed; keeping rule-based roles"),
                    }
                }
            }
        }
        dbg.header_index = header_index;
        dbg.header_source = header_source;
        dbg.header_policy_valid = roles.is_policy_valid();

        // Metadata comes from the region above the body, regardless of how
        // the rest of the table fares.
        let meta = metadata::extract_metadata(&lines, header_index, body_start, &self.settings);
        let meta = self.resolve_patient_fallback(meta, &lines, body_start).await;

        let empty_with_meta = |dbg: ExtractionDebug| Extraction {
            document: DocumentResult {
                hospital_name: meta.hospital_name.clone().unwrap_or_default(),
                client_name: meta.client_name.clone().unwrap_or_default(),
                patient_name: meta.patient_name.clone().unwrap_or_default(),
                inspection_date: meta.inspection_date.clone().unwrap_or_default(),
                tests: Vec::new(),
            },
            debug: dbg,
        };

        let k = roles.column_count();
        if k == 0 {
            info!("no usable header roles; returning metadata only");
            dbg.short_circuit = Some(ShortCircuit::NoBandSamples);
            dbg.header_roles = roles;
            return Ok(empty_with_meta(dbg));
        }

        let Some(bands) = build_bands(&body, k, self.settings.preview_rows) else {
            info!(k, "no band samples; returning metadata only");
            dbg.short_circuit = Some(ShortCircuit::NoBandSamples);
            dbg.header_roles = roles;
            return Ok(empty_with_meta(dbg));
        };

        // Row normalization and final shaping.
        let rows = build_rows(&body, &bands, &roles, self.settings.band_assignment_mode);
        let rows = truncate_to_columns(rows, k);
        let rows = split_reference_ranges(rows);
        let rows = normalize_units_and_values(rows);
        let candidates = shape_tests(&rows);
        let (tests, stats) = apply_final_filters(candidates, &roles, &self.settings);

        let document = DocumentResult {
            hospital_name: meta.hospital_name.clone().unwrap_or_default(),
            client_name: meta.client_name.clone().unwrap_or_default(),
            patient_name: meta.patient_name.clone().unwrap_or_default(),
            inspection_date: meta.inspection_date.clone().unwrap_or_default(),
            tests,
        };

        dbg.header_roles = roles;
        dbg.filter_stats = stats;
        dbg.validation = validate_tests(&document.tests).summary();
        info!(
            tests = document.tests.len(),
            body_lines = dbg.body_line_count,
            source = dbg.header_source.map(|s| s.as_str()).unwrap_or("none"),
            "extraction complete"
        );
        Ok(Extraction {
            document,
            debug: dbg,
        })
    }

    /// Ask the optional patient-name capability when rules found nothing.
    async fn resolve_patient_fallback(
        &self,
        mut meta: Metadata,
        lines: &[Line],
        body_start: usize,
    ) -> Metadata {
        let have_patient = meta
            .patient_name
            .as_deref()
            .map(|p| !p.trim().is_empty())
            .unwrap_or(false);
        if have_patient {
            return meta;
        }
        let Some(fallback) = &self.patient_fallback else {
            return meta;
        };

        let region = metadata::header_region_text(lines, body_start);
        let client = meta.client_name.clone();
        let result = self
            .guard
            .run(
                self.settings.llm_max_concurrency,
                fallback.extract_patient_name(&region, client.as_deref()),
            )
            .await;
        match result {
            Ok(name) => {
                let name = name.trim().to_string();
                let is_client_echo = client
                    .as_deref()
                    .map(|c| c.trim() == name)
                    .unwrap_or(false);
                if !name.is_empty() && !is_client_echo {
                    meta.patient_name = Some(name);
                }
            }
            Err(err) => warn!(error = %err, "patient-name fallback failed"),
        }
        meta
    }
}
