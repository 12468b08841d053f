// ==============================================================================
// report.rs - Query Result Reports
// ==============================================================================
// Description: Structured and text renderings of a query result page
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// ClinVar and transcript summaries are derived from each record's raw payload,
// not from the flattened columns.
// ==============================================================================

use serde::Serialize;
use std::fmt;

use crate::models::{ClinvarEntry, Transcript, VariantRecord};
use crate::query::VariantPage;

const UNKNOWN: &str = "<unknown>";
const NONE: &str = "<none>";

/// Report over one page of query results
#[derive(Debug, Clone, Serialize)]
pub struct VariantReport {
    pub total_variants: u64,
    pub returned: usize,
    pub offset: u64,
    pub variants: Vec<VariantSummary>,
}

/// Per-row view handed to report consumers
#[derive(Debug, Clone, Serialize)]
pub struct VariantSummary {
    pub vid: String,
    pub chromosome: String,
    pub position: Option<i64>,
    pub ref_allele: Option<String>,
    pub alt_allele: Option<String>,
    pub gene_symbols: Vec<String>,
    pub gnomad_af: f64,
    pub clinvar: Vec<ClinvarSummary>,
    pub transcripts: Vec<TranscriptSummary>,
    pub genotype: Option<String>,
    pub genotype_quality: Option<f64>,
    pub total_depth: Option<i64>,
    pub allele_depths: Vec<i64>,
    pub maternal_genotype: Option<String>,
    pub paternal_genotype: Option<String>,
    pub variant_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClinvarSummary {
    pub accession: Option<String>,
    pub ref_allele: Option<String>,
    pub alt_allele: Option<String>,
    pub is_allele_specific: Option<bool>,
    pub classification: Option<String>,
    pub review_status: Option<String>,
    pub diseases: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptSummary {
    pub gene: Option<String>,
    pub transcript: Option<String>,
    pub consequences: Vec<String>,
    pub hgvsc: Option<String>,
}

impl From<&ClinvarEntry> for ClinvarSummary {
    fn from(entry: &ClinvarEntry) -> Self {
        Self {
            accession: entry.accession.clone(),
            ref_allele: entry.ref_allele.clone(),
            alt_allele: entry.alt_allele.clone(),
            is_allele_specific: entry.is_allele_specific,
            classification: entry.germline_classification().map(str::to_string),
            review_status: entry.review_status.clone(),
            diseases: entry.disease_names().into_iter().map(str::to_string).collect(),
        }
    }
}

impl From<&Transcript> for TranscriptSummary {
    fn from(transcript: &Transcript) -> Self {
        Self {
            gene: transcript.hgnc.clone(),
            transcript: transcript.transcript.clone(),
            consequences: transcript.consequence.clone(),
            hgvsc: transcript.hgvsc.clone(),
        }
    }
}

impl VariantSummary {
    /// Summarize one record; fails only if its raw payload is not a variant
    pub fn from_record(record: &VariantRecord) -> serde_json::Result<Self> {
        let source = record.source_variant()?;

        Ok(Self {
            vid: record.vid.clone(),
            chromosome: record.chromosome.clone(),
            position: record.position,
            ref_allele: record.ref_allele.clone(),
            alt_allele: record.alt_allele.clone(),
            gene_symbols: record.gene_symbols.clone(),
            gnomad_af: record.gnomad_af,
            clinvar: source.clinvar.iter().map(ClinvarSummary::from).collect(),
            transcripts: source.transcripts.iter().map(TranscriptSummary::from).collect(),
            genotype: record.genotype.clone(),
            genotype_quality: record.genotype_quality,
            total_depth: record.total_depth,
            allele_depths: record.allele_depths.clone(),
            maternal_genotype: record.maternal_genotype.clone(),
            paternal_genotype: record.paternal_genotype.clone(),
            variant_type: record.variant_type.clone(),
        })
    }
}

impl VariantReport {
    pub fn from_page(page: &VariantPage) -> serde_json::Result<Self> {
        let variants = page
            .records
            .iter()
            .map(VariantSummary::from_record)
            .collect::<serde_json::Result<Vec<_>>>()?;

        Ok(Self {
            total_variants: page.total,
            returned: variants.len(),
            offset: page.offset,
            variants,
        })
    }
}

fn or<T: fmt::Display>(value: &Option<T>, fallback: &str) -> String {
    match value {
        Some(v) => v.to_string(),
        None => fallback.to_string(),
    }
}

impl fmt::Display for ClinvarSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let diseases = if self.diseases.is_empty() {
            UNKNOWN.to_string()
        } else {
            self.diseases.join(", ")
        };

        write!(
            f,
            "ClinVar ID: {}, Reference allele: {}, Alternate allele: {}, Allele-specific: {}, \
             Classification: {}, Review Status: {}, Diseases: {}",
            or(&self.accession, UNKNOWN),
            or(&self.ref_allele, UNKNOWN),
            or(&self.alt_allele, UNKNOWN),
            or(&self.is_allele_specific, UNKNOWN),
            or(&self.classification, UNKNOWN),
            or(&self.review_status, UNKNOWN),
            diseases
        )
    }
}

impl fmt::Display for TranscriptSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HGNC: {}, transcript: {}, consequences: {}, hgvsc: {}",
            or(&self.gene, UNKNOWN),
            or(&self.transcript, UNKNOWN),
            self.consequences.join(", "),
            or(&self.hgvsc, NONE)
        )
    }
}

impl fmt::Display for VariantSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<variant>")?;
        writeln!(f, "Chromosome: {}", self.chromosome)?;
        writeln!(f, "Position: {}", or(&self.position, NONE))?;
        writeln!(f, "Ref Allele: {}", or(&self.ref_allele, NONE))?;
        writeln!(f, "Alt Allele: {}", or(&self.alt_allele, NONE))?;
        writeln!(f, "Gene Symbols: {}", self.gene_symbols.join(", "))?;
        writeln!(f, "gnomAD AF: {}", self.gnomad_af)?;

        if self.clinvar.is_empty() {
            writeln!(f, "ClinVar Summary: <no ClinVar data>")?;
        } else {
            let entries: Vec<String> = self.clinvar.iter().map(ToString::to_string).collect();
            writeln!(f, "ClinVar Summary: {}", entries.join("; "))?;
        }

        for transcript in &self.transcripts {
            writeln!(f, "{}", transcript)?;
        }

        writeln!(
            f,
            "Genotype: {}, GQ: {}",
            or(&self.genotype, NONE),
            or(&self.genotype_quality, NONE)
        )?;
        writeln!(
            f,
            "Total Depth: {}, Allele Depths: {:?}",
            or(&self.total_depth, NONE),
            self.allele_depths
        )?;
        writeln!(
            f,
            "Maternal Genotype: {}, Paternal Genotype: {}",
            or(&self.maternal_genotype, NONE),
            or(&self.paternal_genotype, NONE)
        )?;
        writeln!(f, "Variant Type: {}", or(&self.variant_type, NONE))?;
        writeln!(f, "</variant>")
    }
}

impl fmt::Display for VariantReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total variants found: {}", self.total_variants)?;
        writeln!(
            f,
            "Displaying {} variants at offset {}:",
            self.returned, self.offset
        )?;
        for variant in &self.variants {
            write!(f, "{}", variant)?;
        }
        Ok(())
    }
}
