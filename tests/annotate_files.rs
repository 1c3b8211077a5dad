//! End-to-end annotation through the library API with files on disk.
//!
//! Tests cover:
//! 1. VCF query against gzipped VCF and BED sources, reader threads included
//! 2. Depth sources from read-extent files
//! 3. Genome-order chromosome sorting
//! 4. Sort-order assertion on file input

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::TempDir;

use vanno::prelude::*;
use vanno::streaming::producer::spawn_producer;

fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn write_gz(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut encoder = GzEncoder::new(fs::File::create(&path).unwrap(), Compression::default());
    encoder.write_all(content.as_bytes()).unwrap();
    encoder.finish().unwrap();
    path
}

fn annotator(config: &str, registry: ReducerRegistry) -> Annotator {
    let sources = Config::parse(config).unwrap().sources(&registry).unwrap();
    Annotator::new(sources, registry)
}

/// Run with reader threads for the query and every source, as the CLI does.
fn run_files(annotator: &Annotator, query: &Path) -> Result<Vec<AnnotatedInterval>> {
    let name = query.display().to_string();
    let (stream, query_producer) = if query.to_string_lossy().contains(".vcf") {
        spawn_producer(name, VcfReader::from_path(query)?.records(), 16)?
    } else {
        spawn_producer(name, BedReader::from_path(query)?.records(), 16)?
    };
    let (inputs, mut producers) = annotator.open_sources()?;
    producers.push(query_producer);

    let mut out = Vec::new();
    let result = annotator.run(stream, inputs, |record| {
        out.push(record);
        Ok(())
    });
    for producer in producers {
        producer.join()?;
    }
    result.map(|_| out)
}

const DB_VCF: &str = "##fileformat=VCFv4.2
##INFO=<ID=AF,Number=A,Type=Float,Description=\"Allele frequency\">
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO
chr1\t100\trs1\tA\tT\t.\tPASS\tAF=0.01
chr1\t100\trs2\tA\tG\t.\tPASS\tAF=0.2
chr1\t500\trs3\tC\tT\t.\tPASS\tAF=0.5;COMMON
chr2\t10\trs4\tG\tA\t.\tPASS\tAF=0.9
";

const QUERY_VCF: &str = "##fileformat=VCFv4.2
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO
chr1\t100\t.\tA\tT\t50\tPASS\tDP=20
chr1\t300\t.\tG\tC\t50\tPASS\tDP=11
chr1\t500\t.\tC\tT\t50\tPASS\t.
chr2\t10\t.\tG\tA\t50\tPASS\t.
";

#[test]
fn test_vcf_query_with_gz_vcf_and_bed_sources() {
    let dir = TempDir::new().unwrap();
    let db = write_gz(&dir, "db.vcf.gz", DB_VCF);
    let genes = write_file(
        &dir,
        "genes.bed",
        "chr1\t50\t150\tGENE1\nchr1\t90\t600\tGENE2\nchr2\t0\t5\tGENE3\n",
    );
    let query = write_file(&dir, "query.vcf", QUERY_VCF);

    let config = format!(
        r#"
[[annotation]]
file = '{}'
fields = ["AF", "ID", "COMMON"]
ops = ["max", "uniq", "flag"]
names = ["db_af", "db_id", "common"]

[[annotation]]
file = '{}'
columns = [4]
ops = ["concat"]
names = ["gene"]
"#,
        db.display(),
        genes.display()
    );
    let a = annotator(&config, ReducerRegistry::new());
    let out = run_files(&a, &query).unwrap();

    assert_eq!(out.len(), 4);
    // strict: only rs1 shares the T allele
    assert_eq!(out[0].get("db_af"), Some(&Value::Float(0.01)));
    assert_eq!(out[0].get("db_id").unwrap().to_string(), "rs1");
    assert_eq!(out[0].get("gene").unwrap().to_string(), "GENE1,GENE2");

    assert_eq!(out[1].get("db_af"), None);
    assert_eq!(out[1].get("common"), Some(&Value::Bool(false)));
    assert_eq!(out[1].get("gene").unwrap().to_string(), "GENE2");

    assert_eq!(out[2].get("common"), Some(&Value::Bool(true)));
    assert_eq!(out[3].get("db_af"), Some(&Value::Float(0.9)));
    assert_eq!(out[3].get("gene"), None);
}

#[test]
fn test_depth_source_from_file() {
    let dir = TempDir::new().unwrap();
    // read extents need not be sorted
    let reads = write_file(
        &dir,
        "reads.bed",
        "chr1\t150\t250\tr3\nchr1\t0\t120\tr1\nchr1\t100\t200\tr2\n",
    );
    let query = write_file(&dir, "query.bed", "chr1\t110\t111\nchr1\t300\t400\n");

    let config = format!(
        "[[annotation]]\nfile = '{}'\ndepth = true\nnames = [\"coverage\"]\n",
        reads.display()
    );
    let a = annotator(&config, ReducerRegistry::new()).with_ends(true);
    let out = run_files(&a, &query).unwrap();

    assert_eq!(out[0].get("coverage"), Some(&Value::Int(2)));
    assert_eq!(out[0].get("left_coverage"), Some(&Value::Int(2)));
    assert_eq!(out[1].get("coverage"), Some(&Value::Int(0)));
}

#[test]
fn test_genome_order() {
    let dir = TempDir::new().unwrap();
    let source = write_file(
        &dir,
        "s.bed",
        "chr2\t0\t100\ttwo\nchr10\t0\t100\tten\n",
    );
    let query = write_file(&dir, "q.bed", "chr2\t10\t20\nchr10\t10\t20\n");
    let config = format!(
        "[[annotation]]\nfile = '{}'\ncolumns = [4]\nops = [\"first\"]\nnames = [\"name\"]\n",
        source.display()
    );
    let genome = Genome::from_reader("chr1\t1000\nchr2\t1000\nchr10\t1000\n".as_bytes()).unwrap();

    let a = annotator(&config, ReducerRegistry::new()).with_chrom_order(ChromOrder::Genome(genome));
    let out = run_files(&a, &query).unwrap();
    assert_eq!(out[0].get("name").unwrap().to_string(), "two");
    assert_eq!(out[1].get("name").unwrap().to_string(), "ten");
}

#[test]
fn test_unsorted_source_detected() {
    let dir = TempDir::new().unwrap();
    let source = write_file(&dir, "s.bed", "chr1\t500\t600\ta\nchr1\t100\t200\tb\n");
    let query = write_file(&dir, "q.bed", "chr1\t100\t200\nchr1\t550\t560\n");
    let config = format!(
        "[[annotation]]\nfile = '{}'\ncolumns = [4]\nops = [\"concat\"]\nnames = [\"n\"]\n",
        source.display()
    );

    let a = annotator(&config, ReducerRegistry::new()).with_check_sorted(true);
    let err = run_files(&a, &query).unwrap_err();
    assert!(matches!(err, AnnoError::Unsorted(_)), "{}", err);
}

#[test]
fn test_source_parse_error_names_file() {
    let dir = TempDir::new().unwrap();
    let source = write_file(
        &dir,
        "genes_bad.bed",
        "chr1\t100\t200\tok\nchr1\tNOTANUMBER\t300\tbad\n",
    );
    let query = write_file(&dir, "q.bed", "chr1\t100\t200\nchr1\t250\t260\n");
    let config = format!(
        "[[annotation]]\nfile = '{}'\ncolumns = [4]\nops = [\"concat\"]\nnames = [\"n\"]\n",
        source.display()
    );

    let a = annotator(&config, ReducerRegistry::new());
    let err = run_files(&a, &query).unwrap_err();
    assert!(matches!(err, AnnoError::Source { .. }), "{}", err);
    assert!(err.to_string().contains("genes_bad.bed"), "{}", err);
    assert!(err.to_string().contains("line 2"), "{}", err);
}

#[test]
fn test_query_parse_error_names_file() {
    let dir = TempDir::new().unwrap();
    let source = write_file(&dir, "s.bed", "chr1\t100\t200\ta\n");
    let query = write_file(&dir, "broken_query.bed", "chr1\t100\t200\nchr1\tx\t300\n");
    let config = format!(
        "[[annotation]]\nfile = '{}'\ncolumns = [4]\nops = [\"concat\"]\nnames = [\"n\"]\n",
        source.display()
    );

    let a = annotator(&config, ReducerRegistry::new());
    let err = run_files(&a, &query).unwrap_err();
    assert!(err.to_string().contains("broken_query.bed"), "{}", err);
}

#[test]
fn test_missing_source_file() {
    let dir = TempDir::new().unwrap();
    let config = format!(
        "[[annotation]]\nfile = '{}'\ncolumns = [4]\nops = [\"concat\"]\nnames = [\"n\"]\n",
        dir.path().join("missing.bed").display()
    );
    let a = annotator(&config, ReducerRegistry::new());
    let err = match a.open_sources() {
        Ok(_) => panic!("expected an error"),
        Err(e) => e,
    };
    assert!(err.to_string().contains("missing.bed"));
}
