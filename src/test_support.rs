// ==============================================================================
// test_support.rs - Shared Test Fixtures
// ==============================================================================
// Description: Gzip writers and Nirvana/record builders used by unit tests
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{json, Value};
use std::io::Write;
use std::path::Path;

use crate::models::VariantRecord;

/// One complete gzip member holding `text`
pub fn gzip_bytes(text: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

pub fn write_gzip(path: &Path, text: &str) {
    std::fs::write(path, gzip_bytes(text)).unwrap();
}

/// One-position document followed by a `genes` section of `genes` entries
pub fn document_with_gene_trailer(genes: usize) -> String {
    let genes: Vec<Value> = (0..genes)
        .map(|i| json!({ "name": format!("GENE{i}"), "summary": format!("entry {i} of the gene section") }))
        .collect();
    // Built by hand: json! would sort "genes" ahead of "positions"
    format!(
        r#"{{"header":{{}},"positions":[{}],"genes":{}}}"#,
        position_json("chr1", 100, &[("1-100-A-G", "BRCA1")]),
        Value::Array(genes)
    )
}

/// Gzipped Nirvana document with a header, the given positions, and a trailing genes section
pub fn write_nirvana_file(path: &Path, positions: &[Value]) {
    let document = json!({
        "header": {
            "annotator": "Nirvana 3.18.1",
            "genomeAssembly": "GRCh38",
            "samples": ["proband", "father", "mother"]
        },
        "positions": positions,
        "genes": []
    });
    write_gzip(path, &document.to_string());
}

/// Position JSON with one SNV per `(vid, gene)` pair, all at `position`
pub fn position_json(chromosome: &str, position: i64, variants: &[(&str, &str)]) -> Value {
    let variants: Vec<Value> = variants
        .iter()
        .map(|(vid, gene)| {
            json!({
                "vid": vid,
                "chromosome": chromosome,
                "begin": position,
                "end": position,
                "refAllele": "A",
                "altAllele": "G",
                "variantType": "SNV",
                "transcripts": [{
                    "transcript": format!("ENST-{gene}"),
                    "hgnc": gene,
                    "consequence": ["missense_variant"],
                    "isCanonical": true
                }]
            })
        })
        .collect();

    json!({
        "chromosome": chromosome,
        "position": position,
        "quality": 100.0,
        "samples": [
            { "genotype": "0|1", "genotypeQuality": 99, "totalDepth": 30, "alleleDepths": [15, 15] },
            { "genotype": "0/0" },
            { "genotype": "./1" }
        ],
        "variants": variants
    })
}

/// Minimal stored record with the given sets and frequency
pub fn sample_record(
    vid: &str,
    chromosome: &str,
    begin: i64,
    genes: &[&str],
    classifications: &[&str],
    gnomad_af: f64,
) -> VariantRecord {
    VariantRecord {
        vid: vid.to_string(),
        chromosome: chromosome.to_string(),
        variant_index: 0,
        position: Some(begin),
        quality: Some(50.5),
        begin_pos: Some(begin),
        end_pos: Some(begin),
        ref_allele: Some("A".to_string()),
        alt_allele: Some("G".to_string()),
        genotype: Some("0/1".to_string()),
        genotype_quality: None,
        total_depth: None,
        allele_depths: Vec::new(),
        maternal_genotype: None,
        paternal_genotype: None,
        variant_type: Some("SNV".to_string()),
        gene_symbols: genes.iter().map(|g| g.to_string()).collect(),
        canonical_transcripts: Vec::new(),
        transcript_consequences: Vec::new(),
        clinvar_classifications: classifications.iter().map(|c| c.to_string()).collect(),
        gnomad_af,
        raw: json!({ "vid": vid, "chromosome": chromosome, "begin": begin }).to_string(),
    }
}
