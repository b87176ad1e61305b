//! Case-wide write serialization across entity kinds.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;

use casestore::{
    Case, CaseError, DomainStateError, IngestModuleType, NewIngestJob, NewIngestModule, PersonId,
};
use chrono::{TimeZone, Utc};
use tempfile::tempdir;

fn job(data_source_id: i64, modules: &[&str]) -> NewIngestJob {
    NewIngestJob {
        data_source_id,
        host_name: "examiner".to_string(),
        start_date: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        settings_dir: "/settings".to_string(),
        modules: modules
            .iter()
            .map(|name| NewIngestModule::new(*name, IngestModuleType::FileLevel, "1.0"))
            .collect(),
    }
}

#[test]
fn test_mixed_writers_never_collide() {
    let dir = tempdir().unwrap();
    let case = Case::open(dir.path()).unwrap();
    let barrier = Barrier::new(3);
    const PER_WRITER: usize = 25;

    thread::scope(|s| {
        let persons = case.persons();
        let hosts = case.hosts();
        let jobs = case.ingest_jobs();
        let barrier = &barrier;

        s.spawn(move || {
            barrier.wait();
            for i in 0..PER_WRITER {
                persons.create_or_get(format!("person-{i}")).unwrap();
            }
        });
        s.spawn(move || {
            barrier.wait();
            for i in 0..PER_WRITER {
                hosts.create_or_get(format!("host-{i}")).unwrap();
            }
        });
        s.spawn(move || {
            barrier.wait();
            for i in 0..PER_WRITER {
                jobs.begin(job(i as i64, &["hash_lookup"])).unwrap();
            }
        });
    });

    assert_eq!(case.persons().list().unwrap().len(), PER_WRITER);
    assert_eq!(case.hosts().list().unwrap().len(), PER_WRITER);
    assert_eq!(case.ingest_jobs().list().unwrap().len(), PER_WRITER);
    assert_eq!(case.ingest_modules().list().unwrap().len(), 1);
    assert!(!case.write_lock().is_locked());
}

#[test]
fn test_readers_never_see_partial_jobs() {
    let dir = tempdir().unwrap();
    let case = Case::open(dir.path()).unwrap();
    let done = AtomicBool::new(false);
    let modules = ["a", "b", "c"];

    thread::scope(|s| {
        let jobs = case.ingest_jobs();
        let done = &done;
        s.spawn(move || {
            for i in 0..30 {
                jobs.begin(job(i, &modules)).unwrap();
            }
            done.store(true, Ordering::Release);
        });

        for _ in 0..2 {
            let jobs = case.ingest_jobs();
            s.spawn(move || {
                while !done.load(Ordering::Acquire) {
                    for stored in jobs.list().unwrap() {
                        assert_eq!(stored.modules().len(), modules.len());
                    }
                }
            });
        }
    });
}

#[test]
fn test_only_one_completion_wins() {
    let dir = tempdir().unwrap();
    let case = Case::open(dir.path()).unwrap();
    let jobs = case.ingest_jobs();
    let started = jobs.begin(job(1, &[])).unwrap();
    let barrier = Barrier::new(8);

    let outcomes: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let jobs = case.ingest_jobs();
                let mut copy = started.clone();
                let barrier = &barrier;
                s.spawn(move || {
                    let end = Utc.timestamp_opt(1_700_000_100 + i, 0).unwrap();
                    barrier.wait();
                    let result = jobs.set_end_date(&mut copy, end);
                    (result, copy.end_date(), end)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let winners: Vec<_> = outcomes.iter().filter(|(r, _, _)| r.is_ok()).collect();
    assert_eq!(winners.len(), 1);
    let (_, winner_end, requested) = winners[0];
    assert_eq!(*winner_end, Some(*requested));

    for (result, end, _) in outcomes.iter().filter(|(r, _, _)| r.is_err()) {
        assert!(matches!(
            result,
            Err(CaseError::DomainState(DomainStateError::EndDateAlreadySet { .. }))
        ));
        assert_eq!(*end, None);
    }

    let stored = jobs.get_by_id(started.id()).unwrap().unwrap();
    assert_eq!(stored.end_date(), *winner_end);
}

#[test]
fn test_failed_write_releases_lock() {
    let dir = tempdir().unwrap();
    let case = Case::open(dir.path()).unwrap();
    let host = case.hosts().create_or_get("lab-pc").unwrap();

    assert!(case.hosts().set_person(host.id(), Some(PersonId::new(42))).is_err());
    assert!(!case.write_lock().is_locked());
    assert!(case.persons().create_or_get("").is_err());
    assert!(!case.write_lock().is_locked());

    case.persons().create_or_get("Ivan").unwrap();
    assert_eq!(case.storage().idle_connections(), case.storage().pool_size());
}

#[test]
fn test_reader_sees_whole_writes_across_kinds() {
    let dir = tempdir().unwrap();
    let case = Case::open(dir.path()).unwrap();
    let writers_done = AtomicUsize::new(0);
    let barrier = Barrier::new(3);
    let modules = ["hash_lookup", "exif_parser", "keyword_search"];
    const ROUNDS: i64 = 20;

    thread::scope(|s| {
        let writers_done = &writers_done;
        let barrier = &barrier;

        let jobs = case.ingest_jobs();
        s.spawn(move || {
            barrier.wait();
            for i in 0..ROUNDS {
                jobs.begin(job(i, &modules)).unwrap();
            }
            writers_done.fetch_add(1, Ordering::Release);
        });

        let hosts = case.hosts();
        let persons = case.persons();
        s.spawn(move || {
            barrier.wait();
            for i in 0..ROUNDS {
                let owner = persons.create_or_get(format!("owner-{i}")).unwrap();
                let host = hosts.create_or_get(format!("host-{i}")).unwrap();
                let host = hosts.set_person(host.id(), Some(owner.id())).unwrap();
                assert_eq!(host.person_id(), Some(owner.id()));
            }
            writers_done.fetch_add(1, Ordering::Release);
        });

        let jobs = case.ingest_jobs();
        let hosts = case.hosts();
        let persons = case.persons();
        s.spawn(move || {
            barrier.wait();
            loop {
                let finished = writers_done.load(Ordering::Acquire) == 2;

                for stored in jobs.list().unwrap() {
                    let names: Vec<_> = stored.modules().iter().map(|m| m.unique_name()).collect();
                    assert_eq!(names, modules);
                }
                for host in hosts.list().unwrap() {
                    // An assigned owner is always a committed person row.
                    if let Some(owner) = host.person_id() {
                        let person = persons.get_by_id(owner).unwrap();
                        assert!(person.is_some(), "{host} points at a missing person");
                    }
                }

                if finished {
                    break;
                }
            }
        });
    });

    assert_eq!(case.ingest_jobs().list().unwrap().len(), ROUNDS as usize);
    let hosts = case.hosts().list().unwrap();
    assert_eq!(hosts.len(), ROUNDS as usize);
    assert!(hosts.iter().all(|h| h.person_id().is_some()));
}
