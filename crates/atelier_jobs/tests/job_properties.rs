//! Property tests for job status transitions.
//!
//! Random sequences of provider updates are pushed into a job through
//! [`JobTracker::ingest`]. Whatever the order, the status never moves
//! backwards, every snapshot satisfies the status/result/error invariants,
//! and once terminal the job never changes again.

use atelier_jobs::{JobStatus, JobTracker};
use atelier_models::testing::MockAdapter;
use atelier_models::{
    Dispatcher, GenerationRequest, GenerationResult, ModelRegistry, StatusUpdate, default_catalog,
};
use proptest::prelude::*;
use std::sync::Arc;

fn rank(status: JobStatus) -> u8 {
    match status {
        JobStatus::Queued => 0,
        JobStatus::Processing => 1,
        JobStatus::Completed | JobStatus::Failed => 2,
    }
}

fn arb_update() -> impl Strategy<Value = StatusUpdate> {
    prop_oneof![
        Just(StatusUpdate::Queued),
        proptest::option::of(0u8..=150).prop_map(|progress| StatusUpdate::Processing { progress }),
        Just(StatusUpdate::Completed(GenerationResult::VideoGen {
            video_url: "v.mp4".into(),
            thumbnail_url: None,
        })),
        // A result of the wrong type must fail the job, never complete it.
        Just(StatusUpdate::Completed(GenerationResult::AudioTts {
            audio_url: "a.mp3".into(),
        })),
        "[a-z ]{1,12}".prop_map(StatusUpdate::Failed),
    ]
}

mod prop_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn prop_transitions_are_monotonic(updates in prop::collection::vec(arb_update(), 1..20)) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                let mut dispatcher = Dispatcher::new(Arc::new(ModelRegistry::seeded(default_catalog()).unwrap()));
                dispatcher.register_adapter("runway-gen2", Arc::new(MockAdapter::pending("p")));
                let tracker = JobTracker::builder(Arc::new(dispatcher)).build();

                let job_id = tracker
                    .submit(GenerationRequest::video("prop"), Some("runway-gen2"))
                    .unwrap();
                let mut previous = tracker.get(&job_id).unwrap();

                for update in updates {
                    let job = tracker.ingest(&job_id, update).unwrap();
                    prop_assert!(rank(job.status()) >= rank(previous.status()));
                    prop_assert!(job.check().is_ok(), "{:?}", job.check());
                    if let Some(progress) = job.progress() {
                        prop_assert!(progress <= 100);
                    }
                    if previous.is_terminal() {
                        prop_assert_eq!(&job, &previous);
                    }
                    if job.status() == JobStatus::Completed {
                        prop_assert_eq!(job.result().unwrap().request_type(), job.request_type());
                    }
                    previous = job;
                }
                Ok(())
            })?;
        }
    }
}
