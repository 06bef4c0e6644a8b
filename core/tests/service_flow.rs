use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use gradebook_core::{
    CatalogCache, CsvFileStore, EntryStore, GradeService, Grade, InMemoryStore, RawEntry,
    RequirementSources, ResolutionPolicy, ServiceError, ServiceSettings,
};
use tempfile::TempDir;

const CATALOG: &str = "\
科目ID,科目名,単位数,小区分ID
101,微積分Ⅰ,2,7
102,線形代数,2,7
103,English Reading,2,8
104,卒業研究,4,
";

fn write_requirements(dir: &Path, required_for_seven: u32) {
    let sources = RequirementSources::in_dir(dir);
    fs::write(
        &sources.rules,
        format!("小区分ID,単位数\n7,{required_for_seven}\n8,2\n"),
    )
    .unwrap();
    fs::write(
        &sources.subcategories,
        "小区分ID,小区分,大区分ID\n7,数理基礎,1\n8,語学,2\n",
    )
    .unwrap();
    fs::write(
        &sources.majors,
        "大区分ID,大区分,カテゴリID\n1,基盤科目,1\n2,教養科目,1\n",
    )
    .unwrap();
    fs::write(&sources.categories, "カテゴリID,カテゴリ区分\n1,全学共通\n").unwrap();
}

fn raw(name: &str, grade: &str) -> RawEntry {
    RawEntry::new(name, grade)
}

fn service_in<S: EntryStore>(dir: &Path, store: S) -> GradeService<S> {
    let catalog_path = dir.join("subjects.csv");
    fs::write(&catalog_path, CATALOG).unwrap();
    write_requirements(dir, 6);
    GradeService::new(
        Arc::new(CatalogCache::new(catalog_path)),
        store,
        RequirementSources::in_dir(dir),
    )
}

#[test]
fn compute_now_weights_by_catalog_credits() {
    let tmp = TempDir::new().unwrap();
    let service = service_in(tmp.path(), InMemoryStore::new());

    let report = service
        .compute_now(&[raw("微積分I", "a"), raw("卒業研究", "B")])
        .unwrap();

    assert_eq!(report.gpa, 3.33);
    assert_eq!(report.total_credits_counted, 6.0);
    assert_eq!(report.details.len(), 2);
    assert_eq!(report.details[0].grade, Grade::A);
    assert_eq!(report.details[1].field, "TBD");
    assert!(report.warnings.is_empty());
    assert!(service.store().is_empty().unwrap(), "compute never saves");
}

#[test]
fn lenient_compute_warns_and_skips_unknown_subjects() {
    let tmp = TempDir::new().unwrap();
    let service = service_in(tmp.path(), InMemoryStore::new());

    let report = service
        .compute_now(&[raw("線形代数", "B"), raw("量子力学", "A"), raw("", "A")])
        .unwrap();

    assert_eq!(report.gpa, 3.0);
    assert_eq!(report.details.len(), 1);
    assert_eq!(report.warnings.len(), 2);
    assert!(report.warnings[0].contains("量子力学"));
}

#[test]
fn strict_compute_rejects_the_whole_request() {
    let tmp = TempDir::new().unwrap();
    let service = service_in(tmp.path(), InMemoryStore::new()).with_settings(ServiceSettings {
        compute_policy: ResolutionPolicy::Strict,
        ..ServiceSettings::default()
    });

    let err = service
        .compute_now(&[raw("線形代数", "B"), raw("量子力学", "A")])
        .unwrap_err();
    assert!(matches!(err, ServiceError::Resolve(_)), "got {err:?}");
}

#[test]
fn save_then_summary_tracks_requirements() {
    let tmp = TempDir::new().unwrap();
    let store = CsvFileStore::new(tmp.path().join("saved_entries.csv"));
    let service = service_in(tmp.path(), store);

    let saved = service
        .save_lenient(&[raw("微積分Ⅰ", "A"), raw("English Reading", "C"), raw("量子力学", "A")])
        .unwrap();
    assert_eq!(saved.saved_count, 2);
    assert_eq!(saved.skipped_count, 1);

    let summary = service.summary().unwrap();
    assert_eq!(summary.total_credits_counted, 4.0);
    assert_eq!(summary.gpa, 3.0);
    let report = &summary.requirements;
    assert!(!report.ok);
    let seven = report.by_subcategory.iter().find(|row| row.id == 7).unwrap();
    assert_eq!((seven.required, seven.earned, seven.short), (6.0, 2.0, 4.0));
    assert_eq!(report.short_summary.total_short, 4.0);

    // Second save updates in place and completes the subcategory.
    service
        .save_lenient(&[raw("線形代数", "B"), raw("微積分I", "B")])
        .unwrap();
    write_requirements(tmp.path(), 4);

    let summary = service.summary().unwrap();
    assert_eq!(summary.details.len(), 3);
    assert!(summary.requirements.ok, "{:?}", summary.requirements);
    assert_eq!(summary.requirements.short_summary.total_short, 0.0);
    assert_eq!(summary.requirements.by_category[0].earned, 6.0);
}

#[test]
fn same_subject_twice_in_one_save_counts_once() {
    let tmp = TempDir::new().unwrap();
    let store = CsvFileStore::new(tmp.path().join("saved_entries.csv"));
    let service = service_in(tmp.path(), store);

    let saved = service
        .save_lenient(&[raw("微積分Ⅰ", "A"), raw("微積分I", "B")])
        .unwrap();

    assert_eq!(saved.saved_count, 1);
    assert_eq!(saved.skipped_count, 0);
    let stored = service.store().load_all().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].grade, Grade::B);
}

#[test]
fn failed_subjects_do_not_count_toward_requirements() {
    let tmp = TempDir::new().unwrap();
    let service = service_in(tmp.path(), InMemoryStore::new());

    service
        .save_lenient(&[raw("微積分Ⅰ", "F"), raw("線形代数", "A")])
        .unwrap();
    let summary = service.summary().unwrap();

    assert_eq!(summary.total_credits_counted, 4.0, "F still counts toward GPA");
    assert_eq!(summary.gpa, 2.0);
    let seven = &summary.requirements.by_subcategory[0];
    assert_eq!(seven.earned, 2.0);
}

#[test]
fn summary_keeps_entries_that_left_the_catalog() {
    let tmp = TempDir::new().unwrap();
    let service = service_in(tmp.path(), InMemoryStore::new());
    service.save_lenient(&[raw("線形代数", "A")]).unwrap();

    fs::write(
        tmp.path().join("subjects.csv"),
        "科目ID,科目名,単位数,小区分ID\n101,微積分Ⅰ,2,7\n",
    )
    .unwrap();
    service.reload_catalog().unwrap();

    let summary = service.summary().unwrap();
    assert_eq!(summary.details[0].name, "線形代数");
    assert_eq!(
        summary.warnings,
        vec!["subject_id '102' not found in catalog; using saved name/credits/field".to_owned()]
    );
}

#[test]
fn missing_requirement_table_fails_summary() {
    let tmp = TempDir::new().unwrap();
    let service = service_in(tmp.path(), InMemoryStore::new());
    fs::remove_file(RequirementSources::in_dir(tmp.path()).majors).unwrap();

    let err = service.summary().unwrap_err();
    assert!(matches!(err, ServiceError::Requirements(_)), "got {err:?}");
}

#[test]
fn subjects_lists_catalog_names() {
    let tmp = TempDir::new().unwrap();
    let service = service_in(tmp.path(), InMemoryStore::new());

    let names = service.subjects().unwrap();
    assert_eq!(names.len(), 4);
    assert!(names.contains(&"微積分Ⅰ".to_owned()));
}

#[test]
fn concurrent_saves_do_not_lose_updates() {
    let tmp = TempDir::new().unwrap();
    let service = Arc::new(service_in(
        tmp.path(),
        CsvFileStore::new(tmp.path().join("saved_entries.csv")),
    ));

    let names = ["微積分Ⅰ", "線形代数", "English Reading", "卒業研究"];
    let handles: Vec<_> = names
        .iter()
        .map(|name| {
            let service = Arc::clone(&service);
            let name = name.to_string();
            thread::spawn(move || {
                for _ in 0..10 {
                    service.save_lenient(&[raw(&name, "A")]).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(service.store().len().unwrap(), names.len());
}
