use super::*;
use chrono::TimeZone;

fn v(n: i64) -> MigrationVersion {
    MigrationVersion::new(n)
}

fn catalog() -> Catalog {
    Catalog::new(vec![
        Migration::new(
            v(1),
            "create_users",
            "CREATE TABLE users (id INTEGER PRIMARY KEY, email VARCHAR);",
        ),
        Migration::new(
            v(2),
            "add_email_index",
            "CREATE INDEX users_email ON users (email);",
        ),
        Migration::new(v(3), "create_roles", "CREATE TABLE roles (id INTEGER);"),
    ])
    .unwrap()
}

fn entry(catalog: &Catalog, n: i64) -> LedgerEntry {
    let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, n as u32).unwrap();
    let checksum = catalog.get(v(n)).map(|m| m.checksum());
    LedgerEntry::new(v(n), at, checksum)
}

fn pending_versions(plan: &Plan<'_>) -> Vec<MigrationVersion> {
    plan.pending.iter().map(|m| m.version).collect()
}

// ── plan ───────────────────────────────────────────────────────────────

#[test]
fn test_empty_ledger_plans_whole_catalog_in_order() {
    let catalog = catalog();
    let plan = plan(&catalog, &[]).unwrap();
    assert_eq!(pending_versions(&plan), vec![v(1), v(2), v(3)]);
    assert_eq!(plan.applied, 0);
    assert!(plan.out_of_order.is_empty());
}

#[test]
fn test_fully_applied_ledger_plans_nothing() {
    let catalog = catalog();
    let entries = vec![entry(&catalog, 1), entry(&catalog, 2), entry(&catalog, 3)];
    let plan = plan(&catalog, &entries).unwrap();
    assert!(plan.is_empty());
    assert_eq!(plan.applied, 3);
}

#[test]
fn test_partial_ledger_plans_remainder() {
    let catalog = catalog();
    let entries = vec![entry(&catalog, 1)];
    let plan = plan(&catalog, &entries).unwrap();
    assert_eq!(pending_versions(&plan), vec![v(2), v(3)]);
}

#[test]
fn test_gap_is_planned_and_flagged_out_of_order() {
    let catalog = catalog();
    let entries = vec![entry(&catalog, 1), entry(&catalog, 3)];
    let plan = plan(&catalog, &entries).unwrap();
    assert_eq!(pending_versions(&plan), vec![v(2)]);
    assert_eq!(plan.out_of_order, vec![v(2)]);
}

#[test]
fn test_unknown_ledger_version_is_drift() {
    let catalog = catalog();
    let mut entries = vec![entry(&catalog, 1)];
    entries.push(LedgerEntry::new(v(9), Utc::now(), None));
    entries.push(LedgerEntry::new(v(7), Utc::now(), None));

    let err = plan(&catalog, &entries).unwrap_err();
    assert_eq!(
        err,
        PlanError::LedgerDrift {
            versions: vec![v(7), v(9)]
        }
    );
    assert!(err.to_string().contains("v007, v009"));
}

#[test]
fn test_changed_content_is_checksum_mismatch() {
    let catalog = catalog();
    let mut tampered = entry(&catalog, 2);
    tampered.checksum = Some("0".repeat(64));
    let entries = vec![entry(&catalog, 1), tampered];

    let err = plan(&catalog, &entries).unwrap_err();
    match err {
        PlanError::ChecksumMismatch {
            version, name, ..
        } => {
            assert_eq!(version, v(2));
            assert_eq!(name, "add_email_index");
        }
        other => panic!("expected checksum mismatch, got {other:?}"),
    }
}

#[test]
fn test_missing_checksum_is_accepted() {
    let catalog = catalog();
    let mut legacy = entry(&catalog, 1);
    legacy.checksum = None;
    let plan = plan(&catalog, &[legacy]).unwrap();
    assert_eq!(pending_versions(&plan), vec![v(2), v(3)]);
}

// ── audit ──────────────────────────────────────────────────────────────

#[test]
fn test_audit_reports_every_problem() {
    let catalog = catalog();
    let mut legacy = entry(&catalog, 1);
    legacy.checksum = None;
    let mut tampered = entry(&catalog, 2);
    tampered.checksum = Some("abc".to_string());
    let drift = LedgerEntry::new(v(8), Utc::now(), None);

    let report = audit(&catalog, &[legacy, tampered, drift]);

    assert_eq!(report.rows.len(), 3);
    assert_eq!(report.rows[0].status, AuditStatus::AppliedWithoutChecksum);
    assert!(matches!(
        report.rows[1].status,
        AuditStatus::ChecksumMismatch { ref recorded, .. } if recorded == "abc"
    ));
    assert_eq!(report.rows[2].status, AuditStatus::Pending);
    assert!(report.rows[2].applied_at.is_none());
    assert_eq!(report.drifted.len(), 1);
    assert_eq!(report.pending_count(), 1);
    assert_eq!(report.mismatches().count(), 1);
    assert!(!report.is_consistent());
}

#[test]
fn test_audit_clean_ledger_is_consistent() {
    let catalog = catalog();
    let entries = vec![entry(&catalog, 1), entry(&catalog, 2)];
    let report = audit(&catalog, &entries);
    assert!(report.is_consistent());
    assert_eq!(report.pending_count(), 1);
    assert_eq!(report.rows[0].status.as_str(), "applied");
}

#[test]
fn test_audit_serializes_status_inline() {
    let catalog = catalog();
    let report = audit(&catalog, &[]);
    let json = serde_yaml::to_string(&report.rows[0]).unwrap();
    assert!(json.contains("status: pending"));
    assert!(json.contains("name: create_users"));
}
