//! Evidence verification against a source document.
//!
//! A triple is considered grounded when its evidence text occurs in the
//! source document once all whitespace is removed from both. When the exact
//! evidence is missing, the verifier falls back to looking for the subject
//! and object names.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};
use crate::record::{ExtractedTriplet, RawRecord};

/// Evidence kept in report details is cut to this many characters.
pub const DETAIL_EVIDENCE_CHARS: usize = 100;

/// Anything carrying a subject, relation, object and evidence text.
pub trait Evidenced {
    /// Subject entity name.
    fn subject(&self) -> &str;
    /// Relation label.
    fn relation(&self) -> &str;
    /// Object entity name.
    fn object(&self) -> &str;
    /// Supporting text; empty when none was given.
    fn evidence(&self) -> &str;
}

impl Evidenced for ExtractedTriplet {
    fn subject(&self) -> &str {
        &self.subject
    }
    fn relation(&self) -> &str {
        &self.relation_type
    }
    fn object(&self) -> &str {
        &self.object
    }
    fn evidence(&self) -> &str {
        &self.evidence
    }
}

impl Evidenced for RawRecord {
    fn subject(&self) -> &str {
        &self.head
    }
    fn relation(&self) -> &str {
        &self.relation
    }
    fn object(&self) -> &str {
        &self.tail
    }
    fn evidence(&self) -> &str {
        &self.evidence
    }
}

/// Outcome of verifying one triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verification {
    /// No evidence text was supplied.
    EmptyEvidence,
    /// The evidence occurs in the source.
    EvidenceFound,
    /// Evidence missing, but both subject and object occur.
    BothEntitiesFound,
    /// Evidence missing, but one of subject and object occurs.
    OneEntityFound,
    /// Neither the evidence nor either entity occurs.
    NotFound,
}

impl Verification {
    /// Returns true for the outcomes that count as valid.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        matches!(
            self,
            Self::EvidenceFound | Self::BothEntitiesFound | Self::OneEntityFound
        )
    }
}

/// Per-triple report line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationDetail {
    /// 1-based position in the verified input.
    pub index: usize,
    /// Subject as given.
    pub subject: String,
    /// Relation as given.
    pub relation: String,
    /// Object as given.
    pub object: String,
    /// Evidence, cut to its first 100 characters.
    pub evidence: String,
    /// What the lookup found.
    pub outcome: Verification,
}

/// Aggregate verification result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Triples verified.
    pub total: usize,
    /// Triples with a valid outcome.
    pub valid: usize,
    /// Triples with an invalid outcome.
    pub invalid: usize,
    /// One line per verified triple, in input order.
    pub details: Vec<VerificationDetail>,
}

impl VerificationReport {
    /// Share of valid triples in `[0, 1]`; zero for an empty report.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.valid as f64 / self.total as f64
    }

    /// Details of the triples that failed verification.
    pub fn failures(&self) -> impl Iterator<Item = &VerificationDetail> {
        self.details.iter().filter(|d| !d.outcome.is_valid())
    }
}

/// Checks triples against one source document.
#[derive(Debug, Clone)]
pub struct EvidenceVerifier {
    whitespace: Regex,
    source: String,
}

impl EvidenceVerifier {
    /// Prepares `source_text` for lookups.
    ///
    /// # Errors
    /// [`GraphError::Internal`] if the whitespace pattern fails to compile.
    pub fn new(source_text: &str) -> GraphResult<Self> {
        let whitespace =
            Regex::new(r"\s+").map_err(|e| GraphError::internal(format!("whitespace pattern: {e}")))?;
        let source = whitespace.replace_all(source_text, "").into_owned();
        Ok(Self { whitespace, source })
    }

    fn squash(&self, text: &str) -> String {
        self.whitespace.replace_all(text.trim(), "").into_owned()
    }

    fn occurs(&self, text: &str) -> bool {
        let squashed = self.squash(text);
        !squashed.is_empty() && self.source.contains(&squashed)
    }

    /// Verifies one triple.
    #[must_use]
    pub fn verify(&self, triple: &impl Evidenced) -> Verification {
        if triple.evidence().trim().is_empty() {
            return Verification::EmptyEvidence;
        }
        if self.occurs(triple.evidence()) {
            return Verification::EvidenceFound;
        }
        match (self.occurs(triple.subject()), self.occurs(triple.object())) {
            (true, true) => Verification::BothEntitiesFound,
            (true, false) | (false, true) => Verification::OneEntityFound,
            (false, false) => Verification::NotFound,
        }
    }

    /// Verifies up to `limit` triples, in order.
    pub fn verify_all<'a, T, I>(&self, triples: I, limit: usize) -> VerificationReport
    where
        T: Evidenced + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let mut report = VerificationReport::default();
        for (index, triple) in triples.into_iter().take(limit).enumerate() {
            let outcome = self.verify(triple);
            report.total += 1;
            if outcome.is_valid() {
                report.valid += 1;
            } else {
                report.invalid += 1;
            }
            report.details.push(VerificationDetail {
                index: index + 1,
                subject: triple.subject().to_string(),
                relation: triple.relation().to_string(),
                object: triple.object().to_string(),
                evidence: triple.evidence().chars().take(DETAIL_EVIDENCE_CHARS).collect(),
                outcome,
            });
        }
        report
    }
}
