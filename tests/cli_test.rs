use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("payflow"));
    cmd.arg("tests/fixtures/test.csv");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "transaction,authorized,charged,refunded,cancelled,psp_reference",
        ))
        // t1: authorized 100, fully charged, 20 refunded.
        .stdout(predicate::str::contains("t1,100.00,100.00,20.00,0,mock_"))
        // t2: authorized 50, fully cancelled.
        .stdout(predicate::str::contains("t2,50.00,0,0,50.00,mock_"));

    Ok(())
}

#[test]
fn test_over_refund_is_reported_and_state_preserved() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "op, transaction, gateway, currency, amount").unwrap();
    writeln!(file, "open, t1, mockpay, USD,").unwrap();
    writeln!(file, "authorize, t1, , , 100.00").unwrap();
    writeln!(file, "charge, t1, , ,").unwrap();
    writeln!(file, "refund, t1, , , 250.00").unwrap();

    let mut cmd = Command::new(cargo_bin!("payflow"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("t1,100.00,100.00,0,0,mock_"))
        .stderr(predicate::str::contains("invariant violation"));
}

#[test]
fn test_malformed_rows_are_skipped() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "op, transaction, gateway, currency, amount").unwrap();
    writeln!(file, "open, t1, mockpay, USD,").unwrap();
    writeln!(file, "teleport, t1, , ,").unwrap();
    writeln!(file, "authorize, t1, , , 10.00").unwrap();

    let mut cmd = Command::new(cargo_bin!("payflow"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("t1,10.00,0,0,0,"))
        .stderr(predicate::str::contains("Error reading action"));
}
