//! CLI integration tests with fixture data files.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

use utrevo::codec::{ORACLE_CHANNELS, ORACLE_WIDTH};
use utrevo::sequence::{CAP5, POLY_A_LENGTH};

const CDS: &str = "AUGCCCAAGUAA";

/// Write the fixture data files a run needs into `dir`.
fn write_fixtures(dir: &Path) {
    // Expression matrix: two miRNAs that jointly cover Neuron and
    // Hepatocyte while staying silent in Fibroblast.
    fs::write(
        dir.join("expression_matrix.csv"),
        "MiRBase_ID,Fibroblast,Neuron,Hepatocyte\n\
         hsa-miR-124-3p,1.0,2000.0,1.0\n\
         hsa-miR-122-5p,1.0,1.0,2000.0\n",
    )
    .unwrap();

    // miRBase-style mature table (species 9606 only is kept).
    fs::write(
        dir.join("miR_Family_Info.txt"),
        "miR family\tSpecies ID\tMiRBase ID\tMature sequence\tSeed+m8\n\
         miR-124\t9606\thsa-miR-124-3p\tUAAGGCACGCGGUGAAUGCC\tAAGGCAC\n\
         miR-122\t9606\thsa-miR-122-5p\tUGGAGUGUGACAAUGGUGUUUG\tGGAGUGU\n\
         miR-122\t10090\tmmu-miR-122-5p\tUGGAGUGUGACAAUGGUGUUUG\tGGAGUGU\n",
    )
    .unwrap();

    // Oracle weights: two tissues, one zero-weight linear member.
    let oracle_dir = dir.join("oracle");
    fs::create_dir(&oracle_dir).unwrap();
    fs::write(oracle_dir.join("tissues.txt"), "fibroblast\nneurons\n").unwrap();
    let weights = vec![0u8; 2 * ORACLE_CHANNELS * ORACLE_WIDTH * 4];
    fs::write(oracle_dir.join("fold0_model0.bin"), weights).unwrap();

    // Empirical TE dataset for --te-data.
    let mut te = fs::File::create(dir.join("te_data.tsv")).unwrap();
    writeln!(te, "tx_id\tmean_te\ttx_sequence\tutr5_size").unwrap();
    writeln!(te, "tx1\t2.1\tACGTACGTACGTATGCCCAAGTAA\t8").unwrap();
    writeln!(te, "tx2\t1.4\tGGCCGGCCGGCCATGCCCAAGTAA\t6").unwrap();
}

/// Command with the fixture data paths and tiny-run parameters, but no
/// CDS, target, or length bounds; tests add those themselves.
fn data_command(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("utrevo").unwrap();
    cmd.arg("--expression")
        .arg(dir.join("expression_matrix.csv"))
        .arg("--mirna-table")
        .arg(dir.join("miR_Family_Info.txt"))
        .arg("--oracle-dir")
        .arg(dir.join("oracle"))
        .args(["--pop-size", "8"])
        .args(["--n-gen", "1"])
        .args(["--num-sites", "2"])
        .args(["--seed", "42"])
        .args(["--threads", "2"]);
    cmd
}

#[test]
fn test_minimal_cli_run_succeeds() {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path());
    let history = dir.path().join("history.csv");

    data_command(dir.path())
        .args(["--cds", CDS])
        .args(["--target", "Fibroblast"])
        .args(["--utr5-min", "4", "--utr5-max", "12"])
        .arg("--no-seed-from-data")
        .arg("--history")
        .arg(&history)
        .assert()
        .success()
        .stdout(predicate::str::contains("rank\tutr5_len"))
        .stderr(predicate::str::contains("Done!"));

    let history_text = fs::read_to_string(&history).unwrap();
    let mut lines = history_text.lines();
    assert_eq!(
        lines.next().unwrap(),
        "generation,sequence,utr5_accessibility,manufacturability,stability,specificity,overall"
    );

    // Generations 0 and 1, eight individuals each.
    let data_lines: Vec<&str> = lines.collect();
    assert_eq!(data_lines.len(), 16);

    for line in &data_lines {
        let fields: Vec<&str> = line.split(',').collect();
        assert_eq!(fields.len(), 7, "malformed history row: {line}");

        let generation: usize = fields[0].parse().unwrap();
        assert!(generation <= 1);

        // The sequence field is the full molecule: 5' cap through poly-A
        // tail.
        assert!(fields[1].starts_with(CAP5));
        assert!(fields[1].contains(CDS));
        assert!(fields[1].ends_with(&"A".repeat(POLY_A_LENGTH)));

        for value in &fields[2..] {
            let value: f64 = value.parse().unwrap();
            assert!((0.0..=1.0).contains(&value), "metric out of range: {line}");
        }
    }
}

#[test]
fn test_cli_run_with_te_data_seeds() {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path());

    data_command(dir.path())
        .args(["--cds", CDS])
        .args(["--target", "Fibroblast"])
        .args(["--utr5-min", "4", "--utr5-max", "12"])
        .arg("--te-data")
        .arg(dir.path().join("te_data.tsv"))
        .arg("--seed-from-data")
        .assert()
        .success()
        .stderr(predicate::str::contains("Sponge design: 2 miRNA(s)"));
}

#[test]
fn test_cli_rejects_inverted_bounds() {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path());

    data_command(dir.path())
        .args(["--cds", CDS])
        .args(["--target", "Fibroblast"])
        .args(["--utr5-min", "30", "--utr5-max", "20"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid configuration"));
}

#[test]
fn test_cli_rejects_unknown_target() {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path());

    data_command(dir.path())
        .args(["--cds", CDS])
        .args(["--target", "Osteoblast"])
        .args(["--utr5-min", "4", "--utr5-max", "12"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("unknown cell type"));
}

#[test]
fn test_cli_requires_cds_or_gene() {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path());

    data_command(dir.path())
        .args(["--target", "Fibroblast"])
        .args(["--utr5-min", "4", "--utr5-max", "12"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--cds or --gene"));
}

#[test]
fn test_cli_gene_registry_lookup() {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path());
    fs::write(dir.path().join("genes.tsv"), format!("MYGENE\t{}\n", CDS)).unwrap();

    data_command(dir.path())
        .args(["--gene", "mygene"])
        .arg("--gene-table")
        .arg(dir.path().join("genes.tsv"))
        .args(["--target", "Fibroblast"])
        .args(["--utr5-min", "4", "--utr5-max", "12"])
        .arg("--no-seed-from-data")
        .assert()
        .success();
}

#[test]
fn test_cli_unknown_gene_fails() {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path());
    fs::write(dir.path().join("genes.tsv"), format!("MYGENE\t{}\n", CDS)).unwrap();

    data_command(dir.path())
        .args(["--gene", "ABSENT1"])
        .arg("--gene-table")
        .arg(dir.path().join("genes.tsv"))
        .args(["--target", "Fibroblast"])
        .args(["--utr5-min", "4", "--utr5-max", "12"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_cli_missing_oracle_dir_fails() {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path());
    fs::remove_dir_all(dir.path().join("oracle")).unwrap();

    data_command(dir.path())
        .args(["--cds", CDS])
        .args(["--target", "Fibroblast"])
        .args(["--utr5-min", "4", "--utr5-max", "12"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("resource missing"));
}
