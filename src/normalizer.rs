// ==============================================================================
// normalizer.rs - Variant Normalization
// ==============================================================================
// Description: Flattens one source variant plus its position into a VariantRecord
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Rules:
//   - Samples are positional: [0] proband, [1] paternal, [2] maternal
//   - Genotypes: '|' → '/', '.' → '0' (e.g., "0|." → "0/0")
//   - Gene symbols, canonical transcripts and consequences come from the
//     transcript list; ClinVar germline classifications from clinvar-preview
//   - Missing gnomAD frequency → 0.0
//   - Absent numerics → None; allele depths keep numeric entries only
// ==============================================================================

use serde_json::{Number, Value};
use std::collections::BTreeSet;

use crate::models::{Position, Sample, SourceVariant, VariantRecord};

/// Sample index of the proband
pub const PROBAND_SAMPLE: usize = 0;
/// Sample index of the paternal genotype
pub const PATERNAL_SAMPLE: usize = 1;
/// Sample index of the maternal genotype
pub const MATERNAL_SAMPLE: usize = 2;

/// Normalize a genotype string to unphased, no-call-free form
///
/// Every phase separator becomes '/' and every missing allele becomes '0'.
///
/// # Examples
/// ```
/// use variant_store::normalizer::normalize_genotype;
///
/// assert_eq!(normalize_genotype("0|1"), "0/1");
/// assert_eq!(normalize_genotype("./."), "0/0");
/// assert_eq!(normalize_genotype("1|."), "1/0");
/// ```
pub fn normalize_genotype(genotype: &str) -> String {
    genotype.replace('|', "/").replace('.', "0")
}

/// Genotype column value for an optional sample
///
/// Strings are normalized; any other non-null JSON value is kept as its JSON
/// text unchanged; null or absent yields None.
fn sample_genotype(sample: Option<&Sample>) -> Option<String> {
    match sample?.genotype.as_ref()? {
        Value::String(genotype) => Some(normalize_genotype(genotype)),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn number_to_i64(number: &Number) -> Option<i64> {
    number
        .as_i64()
        .or_else(|| number.as_u64().and_then(|n| i64::try_from(n).ok()))
        .or_else(|| number.as_f64().map(|f| f.trunc() as i64))
}

fn coerce_i64(number: Option<&Number>) -> Option<i64> {
    number.and_then(number_to_i64)
}

fn coerce_f64(number: Option<&Number>) -> Option<f64> {
    number.and_then(Number::as_f64)
}

/// Numeric allele depths; non-numeric entries are dropped
fn allele_depths(value: Option<&Value>) -> Vec<i64> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::Number(n) => number_to_i64(n),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Build the persisted record for one variant
///
/// # Arguments
/// * `source` - Variant with its verbatim JSON
/// * `variant_index` - Ordinal of the variant within the position's variant list
/// * `position` - Enclosing position (chromosome, coordinate, quality, samples)
pub fn build_variant_record(
    source: &SourceVariant,
    variant_index: usize,
    position: &Position,
) -> VariantRecord {
    let variant = &source.variant;

    let proband = position.sample(PROBAND_SAMPLE);
    let paternal = position.sample(PATERNAL_SAMPLE);
    let maternal = position.sample(MATERNAL_SAMPLE);

    let mut gene_symbols = BTreeSet::new();
    let mut canonical_transcripts = BTreeSet::new();
    let mut consequences = BTreeSet::new();

    for transcript in &variant.transcripts {
        if let Some(symbol) = transcript.hgnc.as_deref().filter(|s| !s.is_empty()) {
            gene_symbols.insert(symbol.to_string());
        }

        if transcript.is_canonical == Some(true) {
            if let Some(id) = &transcript.transcript {
                canonical_transcripts.insert(id.clone());
            }
        }

        consequences.extend(transcript.consequence.iter().cloned());
    }

    let clinvar_classifications: BTreeSet<String> = variant
        .clinvar
        .iter()
        .filter_map(|entry| entry.germline_classification())
        .map(str::to_string)
        .collect();

    // Absent frequency is recorded as 0.0, not NULL
    let gnomad_af = variant
        .gnomad
        .as_ref()
        .and_then(|g| g.all_af)
        .unwrap_or(0.0);

    VariantRecord {
        vid: variant.vid.clone(),
        chromosome: position.chromosome.clone(),
        variant_index: variant_index as i64,
        position: coerce_i64(position.position.as_ref()),
        quality: coerce_f64(position.quality.as_ref()),
        begin_pos: coerce_i64(variant.begin.as_ref()),
        end_pos: coerce_i64(variant.end.as_ref()),
        ref_allele: variant.ref_allele.clone(),
        alt_allele: variant.alt_allele.clone(),
        genotype: sample_genotype(proband),
        genotype_quality: proband.and_then(|s| coerce_f64(s.genotype_quality.as_ref())),
        total_depth: proband.and_then(|s| coerce_i64(s.total_depth.as_ref())),
        allele_depths: allele_depths(proband.and_then(|s| s.allele_depths.as_ref())),
        maternal_genotype: sample_genotype(maternal),
        paternal_genotype: sample_genotype(paternal),
        variant_type: variant.variant_type.clone(),
        gene_symbols: gene_symbols.into_iter().collect(),
        canonical_transcripts: canonical_transcripts.into_iter().collect(),
        transcript_consequences: consequences.into_iter().collect(),
        clinvar_classifications: clinvar_classifications.into_iter().collect(),
        gnomad_af,
        raw: source.raw.get().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn position(value: Value) -> Position {
        serde_json::from_str(&value.to_string()).unwrap()
    }

    fn record(value: Value) -> VariantRecord {
        let position = position(value);
        build_variant_record(&position.variants[0], 0, &position)
    }

    #[test]
    fn test_normalize_genotype() {
        assert_eq!(normalize_genotype("0|1"), "0/1");
        assert_eq!(normalize_genotype("1|1"), "1/1");
        assert_eq!(normalize_genotype("./."), "0/0");
        assert_eq!(normalize_genotype(".|1"), "0/1");
        assert_eq!(normalize_genotype("0/1"), "0/1");
        assert_eq!(normalize_genotype("."), "0");

        let normalized = normalize_genotype("1|.|2|.");
        assert!(!normalized.contains('|'));
        assert!(!normalized.contains('.'));
        assert_eq!(normalized, "1/0/2/0");
    }

    #[test]
    fn test_full_record() {
        let r = record(json!({
            "chromosome": "chr17",
            "position": 43045712,
            "quality": 812.5,
            "samples": [
                { "genotype": "0|1", "genotypeQuality": 99, "totalDepth": 41, "alleleDepths": [20, 21] },
                { "genotype": "0/0" },
                { "genotype": "./1" }
            ],
            "variants": [{
                "vid": "17-43045712-T-C",
                "begin": 43045712,
                "end": 43045712,
                "refAllele": "T",
                "altAllele": "C",
                "variantType": "SNV",
                "transcripts": [
                    { "transcript": "ENST00000357654.9", "hgnc": "BRCA1", "consequence": ["missense_variant"], "isCanonical": true },
                    { "transcript": "ENST00000471181.7", "hgnc": "BRCA1", "consequence": ["missense_variant", "splice_region_variant"] }
                ],
                "clinvar-preview": [
                    { "classifications": { "germlineClassification": { "classification": "Pathogenic" } } },
                    { "classifications": { "germlineClassification": { "classification": "Pathogenic" } } },
                    { "accession": "RCV0001" }
                ],
                "gnomad": { "allAf": 0.0001 }
            }]
        }));

        assert_eq!(r.vid, "17-43045712-T-C");
        assert_eq!(r.chromosome, "chr17");
        assert_eq!(r.variant_index, 0);
        assert_eq!(r.position, Some(43045712));
        assert_eq!(r.quality, Some(812.5));
        assert_eq!(r.begin_pos, Some(43045712));
        assert_eq!(r.end_pos, Some(43045712));
        assert_eq!(r.ref_allele.as_deref(), Some("T"));
        assert_eq!(r.alt_allele.as_deref(), Some("C"));
        assert_eq!(r.genotype.as_deref(), Some("0/1"));
        assert_eq!(r.genotype_quality, Some(99.0));
        assert_eq!(r.total_depth, Some(41));
        assert_eq!(r.allele_depths, vec![20, 21]);
        assert_eq!(r.paternal_genotype.as_deref(), Some("0/0"));
        assert_eq!(r.maternal_genotype.as_deref(), Some("0/1"));
        assert_eq!(r.variant_type.as_deref(), Some("SNV"));
        assert_eq!(r.gene_symbols, vec!["BRCA1"]);
        assert_eq!(r.canonical_transcripts, vec!["ENST00000357654.9"]);
        assert_eq!(
            r.transcript_consequences,
            vec!["missense_variant", "splice_region_variant"]
        );
        assert_eq!(r.clinvar_classifications, vec!["Pathogenic"]);
        assert_eq!(r.gnomad_af, 0.0001);
    }

    #[test]
    fn test_missing_samples_yield_none() {
        let r = record(json!({
            "chromosome": "chr1",
            "samples": [{ "genotype": "1|1" }],
            "variants": [{ "vid": "1-10-A-G" }]
        }));

        assert_eq!(r.genotype.as_deref(), Some("1/1"));
        assert!(r.paternal_genotype.is_none());
        assert!(r.maternal_genotype.is_none());
        assert!(r.genotype_quality.is_none());
        assert!(r.total_depth.is_none());
        assert!(r.allele_depths.is_empty());
        assert!(r.position.is_none());
        assert!(r.quality.is_none());
    }

    #[test]
    fn test_no_samples_at_all() {
        let r = record(json!({
            "chromosome": "chr1",
            "variants": [{ "vid": "1-10-A-G" }]
        }));

        assert!(r.genotype.is_none());
        assert!(r.paternal_genotype.is_none());
        assert!(r.maternal_genotype.is_none());
    }

    #[test]
    fn test_non_string_genotype_passes_through() {
        let r = record(json!({
            "chromosome": "chr1",
            "samples": [{ "genotype": null }, { "genotype": 1 }],
            "variants": [{ "vid": "1-10-A-G" }]
        }));

        assert!(r.genotype.is_none());
        assert_eq!(r.paternal_genotype.as_deref(), Some("1"));
    }

    #[test]
    fn test_non_canonical_transcript() {
        let r = record(json!({
            "chromosome": "chr2",
            "variants": [{
                "vid": "2-50-G-A",
                "transcripts": [
                    { "transcript": "NM_000001.1", "hgnc": "GENE1", "consequence": ["intron_variant"], "isCanonical": false }
                ]
            }]
        }));

        assert!(r.canonical_transcripts.is_empty());
        assert_eq!(r.gene_symbols, vec!["GENE1"]);
        assert_eq!(r.transcript_consequences, vec!["intron_variant"]);
    }

    #[test]
    fn test_missing_gnomad_defaults_to_zero() {
        let r = record(json!({
            "chromosome": "chr2",
            "variants": [{ "vid": "2-50-G-A" }]
        }));
        assert_eq!(r.gnomad_af, 0.0);

        let r = record(json!({
            "chromosome": "chr2",
            "variants": [{ "vid": "2-50-G-A", "gnomad": {} }]
        }));
        assert_eq!(r.gnomad_af, 0.0);
    }

    #[test]
    fn test_allele_depths_keep_numbers_only() {
        let r = record(json!({
            "chromosome": "chr3",
            "samples": [{ "alleleDepths": [10, "n/a", 7.9, null, 3] }],
            "variants": [{ "vid": "3-1-C-G" }]
        }));
        assert_eq!(r.allele_depths, vec![10, 7, 3]);

        let r = record(json!({
            "chromosome": "chr3",
            "samples": [{ "alleleDepths": "10,3" }],
            "variants": [{ "vid": "3-1-C-G" }]
        }));
        assert!(r.allele_depths.is_empty());
    }

    #[test]
    fn test_float_coordinates_are_truncated() {
        let r = record(json!({
            "chromosome": "chr4",
            "position": 1000.0,
            "quality": 30,
            "samples": [{ "totalDepth": 12.0 }],
            "variants": [{ "vid": "4-1000-A-C", "begin": 1000.0, "end": 1001 }]
        }));

        assert_eq!(r.position, Some(1000));
        assert_eq!(r.quality, Some(30.0));
        assert_eq!(r.total_depth, Some(12));
        assert_eq!(r.begin_pos, Some(1000));
        assert_eq!(r.end_pos, Some(1001));
    }

    #[test]
    fn test_raw_is_verbatim_source() {
        let text = r#"{"chromosome":"chr5","variants":[{"vid":"5-9-T-A","gnomad":{"allAf":1.5e-05},"phylopScore":0.25}]}"#;
        let position: Position = serde_json::from_str(text).unwrap();
        let r = build_variant_record(&position.variants[0], 0, &position);

        assert_eq!(
            r.raw,
            r#"{"vid":"5-9-T-A","gnomad":{"allAf":1.5e-05},"phylopScore":0.25}"#
        );
        let reparsed: Value = serde_json::from_str(&r.raw).unwrap();
        assert_eq!(reparsed["phylopScore"], json!(0.25));
        assert_eq!(r.gnomad_af, 1.5e-05);
    }

    #[test]
    fn test_variant_index_is_preserved() {
        let position = position(json!({
            "chromosome": "chr6",
            "variants": [{ "vid": "6-1-A-C" }, { "vid": "6-1-A-G" }]
        }));
        let r = build_variant_record(&position.variants[1], 1, &position);
        assert_eq!(r.vid, "6-1-A-G");
        assert_eq!(r.variant_index, 1);
    }
}
