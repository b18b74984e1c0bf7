use super::*;
use shared::domain::ReportStatus;

fn report(id: &str, status: ReportStatus) -> Report {
    Report::new("u1", id, status)
}

fn list(reports: &[(&str, ReportStatus)]) -> ReportList {
    Arc::new(
        reports
            .iter()
            .map(|(id, status)| Arc::new(report(id, *status)))
            .collect(),
    )
}

fn statuses(list: &ReportList) -> Vec<(String, ReportStatus)> {
    list.iter()
        .map(|r| (r.report_id.to_string(), r.report_status))
        .collect()
}

#[test]
fn merge_replaces_status_of_matching_report() {
    let current = list(&[("r1", ReportStatus::Pending)]);
    let next = merge(&current, &ReportStatusUpdate::new("r1", ReportStatus::Queued));
    assert_eq!(statuses(&next), vec![("r1".to_string(), ReportStatus::Queued)]);
}

#[test]
fn merge_ignores_unknown_report() {
    let current = list(&[("r1", ReportStatus::Pending)]);
    let next = merge(&current, &ReportStatusUpdate::new("r2", ReportStatus::Failed));
    assert!(Arc::ptr_eq(&current, &next));
    assert_eq!(statuses(&next), vec![("r1".to_string(), ReportStatus::Pending)]);
}

#[test]
fn merge_keeps_length_order_and_untouched_elements() {
    let current = list(&[
        ("r1", ReportStatus::Pending),
        ("r2", ReportStatus::Processing),
        ("r3", ReportStatus::Failed),
    ]);
    let next = merge(&current, &ReportStatusUpdate::new("r2", ReportStatus::Completed));

    assert_eq!(next.len(), current.len());
    assert_eq!(
        statuses(&next),
        vec![
            ("r1".to_string(), ReportStatus::Pending),
            ("r2".to_string(), ReportStatus::Completed),
            ("r3".to_string(), ReportStatus::Failed),
        ]
    );
    assert!(Arc::ptr_eq(&current[0], &next[0]));
    assert!(Arc::ptr_eq(&current[2], &next[2]));
    assert!(!Arc::ptr_eq(&current[1], &next[1]));
}

#[test]
fn merge_never_touches_its_input() {
    let current = list(&[("r1", ReportStatus::Pending), ("r2", ReportStatus::Queued)]);
    let before = statuses(&current);
    let _ = merge(&current, &ReportStatusUpdate::new("r1", ReportStatus::Canceled));
    assert_eq!(statuses(&current), before);
    assert!(!Arc::ptr_eq(
        &current,
        &merge(&current, &ReportStatusUpdate::new("r1", ReportStatus::Canceled))
    ));
}

#[test]
fn merge_accepts_any_transition() {
    let current = list(&[("r1", ReportStatus::Completed)]);
    let next = merge(&current, &ReportStatusUpdate::new("r1", ReportStatus::Pending));
    assert_eq!(next[0].report_status, ReportStatus::Pending);
}

#[test]
fn reapplying_an_update_is_idempotent() {
    let current = list(&[("r1", ReportStatus::Pending), ("r2", ReportStatus::Queued)]);
    let update = ReportStatusUpdate::new("r2", ReportStatus::Processing);
    let once = merge(&current, &update);
    let twice = merge(&once, &update);
    assert_eq!(statuses(&once), statuses(&twice));
}

#[test]
fn sequential_updates_leave_last_status() {
    let registry = Registry::new();
    registry.replace_all(vec![report("r1", ReportStatus::Pending)]);

    registry.apply_update(&ReportStatusUpdate::new("r1", ReportStatus::Queued));
    registry.apply_update(&ReportStatusUpdate::new("r1", ReportStatus::Completed));

    assert_eq!(registry.snapshot()[0].report_status, ReportStatus::Completed);
}

#[test]
fn apply_update_reports_outcome_and_publishes_only_on_change() {
    let registry = Registry::new();
    registry.replace_all(vec![report("r1", ReportStatus::Pending)]);
    let before = registry.snapshot();

    assert_eq!(
        registry.apply_update(&ReportStatusUpdate::new("r2", ReportStatus::Failed)),
        MergeOutcome::Missing
    );
    assert!(Arc::ptr_eq(&before, &registry.snapshot()));

    assert_eq!(
        registry.apply_update(&ReportStatusUpdate::new("r1", ReportStatus::Queued)),
        MergeOutcome::Applied
    );
    assert!(!Arc::ptr_eq(&before, &registry.snapshot()));
    assert_eq!(before[0].report_status, ReportStatus::Pending);
}

#[test]
fn sequenced_updates_drop_older_deliveries() {
    let registry = Registry::new();
    registry.replace_all(vec![report("r1", ReportStatus::Pending)]);

    let completed = ReportStatusUpdate::new("r1", ReportStatus::Completed).with_seq(3);
    let late_queued = ReportStatusUpdate::new("r1", ReportStatus::Queued).with_seq(1);

    assert_eq!(registry.apply_update(&completed), MergeOutcome::Applied);
    assert_eq!(registry.apply_update(&late_queued), MergeOutcome::Stale);
    assert_eq!(registry.apply_update(&completed), MergeOutcome::Stale);
    assert_eq!(registry.snapshot()[0].report_status, ReportStatus::Completed);

    // updates without a sequence number are always authoritative
    assert_eq!(
        registry.apply_update(&ReportStatusUpdate::new("r1", ReportStatus::Pending)),
        MergeOutcome::Applied
    );
}

#[test]
fn append_adds_created_report_at_the_end() {
    let registry = Registry::new();
    registry.replace_all(vec![report("r1", ReportStatus::Queued)]);

    let created = Report::new("u1", "r9", ReportStatus::Pending);
    registry.append(created.clone());

    let snapshot = registry.snapshot();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(*snapshot[1], created);
}

#[test]
fn append_keeps_report_ids_unique() {
    let registry = Registry::new();
    registry.replace_all(vec![
        report("r1", ReportStatus::Pending),
        report("r2", ReportStatus::Pending),
    ]);

    registry.append(report("r1", ReportStatus::Queued));

    assert_eq!(
        statuses(&registry.snapshot()),
        vec![
            ("r1".to_string(), ReportStatus::Queued),
            ("r2".to_string(), ReportStatus::Pending),
        ]
    );
}

#[test]
fn replace_all_collapses_duplicate_ids() {
    let registry = Registry::new();
    registry.replace_all(vec![
        report("r1", ReportStatus::Pending),
        report("r2", ReportStatus::Queued),
        report("r1", ReportStatus::Failed),
    ]);

    assert_eq!(
        statuses(&registry.snapshot()),
        vec![
            ("r1".to_string(), ReportStatus::Pending),
            ("r2".to_string(), ReportStatus::Queued),
        ]
    );
    assert!(!registry.is_empty());
}

#[tokio::test]
async fn subscribers_observe_each_published_snapshot() {
    let registry = Registry::new();
    let mut rx = registry.subscribe();
    registry.replace_all(vec![report("r1", ReportStatus::Pending)]);

    rx.changed().await.expect("populated");
    assert_eq!(rx.borrow_and_update().len(), 1);

    registry.apply_update(&ReportStatusUpdate::new("nope", ReportStatus::Failed));
    assert!(!rx.has_changed().expect("sender alive"));

    registry.apply_update(&ReportStatusUpdate::new("r1", ReportStatus::Queued));
    rx.changed().await.expect("updated");
    assert_eq!(rx.borrow_and_update()[0].report_status, ReportStatus::Queued);
}
