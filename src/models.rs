// ==============================================================================
// models.rs - Annotated Variant Data Models
// ==============================================================================
// Description: Source (Nirvana JSON) shapes and the persisted variant record
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::{Number, Value};

/// One genomic coordinate observation from the `positions` array
///
/// Transient: never persisted as its own row.
#[derive(Debug, Clone, Deserialize)]
pub struct Position {
    /// Chromosome name as written by the annotator (e.g., "chr1", "1", "chrX")
    pub chromosome: String,

    /// 1-based coordinate of the observation
    #[serde(default, deserialize_with = "lenient_number")]
    pub position: Option<Number>,

    /// Call quality (QUAL)
    #[serde(default, deserialize_with = "lenient_number")]
    pub quality: Option<Number>,

    /// Sample observations: [0] proband, [1] paternal, [2] maternal
    #[serde(default)]
    pub samples: Vec<Sample>,

    /// Candidate variants at this position, in source order
    #[serde(default)]
    pub variants: Vec<SourceVariant>,
}

impl Position {
    /// Sample at a positional role, if present
    pub fn sample(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }
}

/// Genotype observation for one sample at a position
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Sample {
    /// Usually a string such as "0|1"; kept as a JSON value so non-string
    /// genotypes pass through untouched
    #[serde(default)]
    pub genotype: Option<Value>,

    #[serde(default, rename = "genotypeQuality", deserialize_with = "lenient_number")]
    pub genotype_quality: Option<Number>,

    #[serde(default, rename = "totalDepth", deserialize_with = "lenient_number")]
    pub total_depth: Option<Number>,

    /// Expected to be a numeric list; anything else is tolerated
    #[serde(default, rename = "alleleDepths")]
    pub allele_depths: Option<Value>,
}

/// A variant as it appears in the source file, together with its verbatim JSON
#[derive(Debug, Clone)]
pub struct SourceVariant {
    pub variant: Variant,
    pub raw: Box<RawValue>,
}

impl<'de> Deserialize<'de> for SourceVariant {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        let variant = serde_json::from_str(raw.get()).map_err(de::Error::custom)?;
        Ok(Self { variant, raw })
    }
}

/// Candidate call nested under a position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    /// Unique variant identifier (e.g., "1-12345-A-G")
    pub vid: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chromosome: Option<String>,

    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub begin: Option<Number>,

    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub end: Option<Number>,

    #[serde(default, rename = "refAllele", skip_serializing_if = "Option::is_none")]
    pub ref_allele: Option<String>,

    #[serde(default, rename = "altAllele", skip_serializing_if = "Option::is_none")]
    pub alt_allele: Option<String>,

    #[serde(default, rename = "variantType", skip_serializing_if = "Option::is_none")]
    pub variant_type: Option<String>,

    #[serde(default)]
    pub transcripts: Vec<Transcript>,

    #[serde(default, rename = "clinvar-preview")]
    pub clinvar: Vec<ClinvarEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gnomad: Option<GnomadAnnotation>,
}

/// Transcript consequence entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    /// Transcript accession (e.g., "ENST00000357654.9")
    #[serde(default, deserialize_with = "lenient_string")]
    pub transcript: Option<String>,

    /// HGNC gene symbol
    #[serde(default, deserialize_with = "lenient_string")]
    pub hgnc: Option<String>,

    /// Sequence Ontology consequence terms
    #[serde(default)]
    pub consequence: Vec<String>,

    #[serde(default, rename = "isCanonical", deserialize_with = "lenient_flag")]
    pub is_canonical: Option<bool>,

    #[serde(default)]
    pub hgvsc: Option<String>,
}

/// ClinVar preview entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClinvarEntry {
    #[serde(default)]
    pub accession: Option<String>,

    #[serde(default, rename = "refAllele")]
    pub ref_allele: Option<String>,

    #[serde(default, rename = "altAllele")]
    pub alt_allele: Option<String>,

    #[serde(default, rename = "isAlleleSpecific")]
    pub is_allele_specific: Option<bool>,

    #[serde(default, rename = "reviewStatus")]
    pub review_status: Option<String>,

    #[serde(default)]
    pub classifications: Option<ClinvarClassifications>,
}

impl ClinvarEntry {
    /// Germline classification label, if the entry carries one
    pub fn germline_classification(&self) -> Option<&str> {
        self.classifications
            .as_ref()?
            .germline_classification
            .as_ref()?
            .classification
            .as_deref()
            .filter(|label| !label.is_empty())
    }

    /// Names of traits attached to "Disease" conditions
    pub fn disease_names(&self) -> Vec<&str> {
        let Some(germline) = self
            .classifications
            .as_ref()
            .and_then(|c| c.germline_classification.as_ref())
        else {
            return Vec::new();
        };

        germline
            .conditions
            .iter()
            .filter(|condition| condition.condition_type.as_deref() == Some("Disease"))
            .flat_map(|condition| condition.traits.iter())
            .map(|t| {
                t.name
                    .as_ref()
                    .and_then(|n| n.value.as_deref())
                    .unwrap_or("<unknown>")
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClinvarClassifications {
    #[serde(default, rename = "germlineClassification")]
    pub germline_classification: Option<GermlineClassification>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GermlineClassification {
    #[serde(default)]
    pub classification: Option<String>,

    #[serde(default)]
    pub conditions: Vec<ClinvarCondition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClinvarCondition {
    #[serde(default, rename = "type")]
    pub condition_type: Option<String>,

    #[serde(default)]
    pub traits: Vec<ClinvarTrait>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClinvarTrait {
    #[serde(default)]
    pub name: Option<ClinvarTraitName>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClinvarTraitName {
    #[serde(default)]
    pub value: Option<String>,
}

/// gnomAD population frequency annotation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GnomadAnnotation {
    /// Allele frequency across all populations
    #[serde(default, rename = "allAf", deserialize_with = "lenient_f64")]
    pub all_af: Option<f64>,
}

// Lenient scalar readers: a mistyped optional field degrades to a coerced value
// or None instead of failing the whole position.

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<Number>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => Some(n),
        Value::String(s) => s.trim().parse::<Number>().ok(),
        _ => None,
    })
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?.and_then(|n| n.as_f64()))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

/// Truthiness of any JSON value; null stays None
fn lenient_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::Bool(b) => Some(b),
        Value::Number(n) => Some(n.as_f64().map_or(true, |f| f != 0.0)),
        Value::String(s) => Some(!s.is_empty()),
        Value::Array(items) => Some(!items.is_empty()),
        Value::Object(map) => Some(!map.is_empty()),
    })
}

/// Normalized, flattened row of the `variants` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRecord {
    pub vid: String,
    pub chromosome: String,
    /// Ordinal of the variant within its position's variant list
    pub variant_index: i64,
    pub position: Option<i64>,
    pub quality: Option<f64>,
    pub begin_pos: Option<i64>,
    pub end_pos: Option<i64>,
    pub ref_allele: Option<String>,
    pub alt_allele: Option<String>,
    pub genotype: Option<String>,
    pub genotype_quality: Option<f64>,
    pub total_depth: Option<i64>,
    pub allele_depths: Vec<i64>,
    pub maternal_genotype: Option<String>,
    pub paternal_genotype: Option<String>,
    pub variant_type: Option<String>,
    pub gene_symbols: Vec<String>,
    pub canonical_transcripts: Vec<String>,
    pub transcript_consequences: Vec<String>,
    pub clinvar_classifications: Vec<String>,
    /// Defaults to 0.0 when the source has no gnomAD frequency
    pub gnomad_af: f64,
    /// Verbatim source JSON of the variant
    pub raw: String,
}

impl VariantRecord {
    /// Parse the stored source payload back into a typed variant
    pub fn source_variant(&self) -> serde_json::Result<Variant> {
        serde_json::from_str(&self.raw)
    }
}
