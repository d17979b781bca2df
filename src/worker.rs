use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::queue::JobQueue;
use crate::sandbox::{Judger, ResultSink};

pub async fn worker(
    id: u8,
    judger: Arc<Judger>,
    sink: Arc<dyn ResultSink>,
    queue: Arc<JobQueue>,
    token: CancellationToken,
) -> anyhow::Result<()> {
    log::info!("Worker {id} initialized");

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                log::info!("Worker {id} received shutdown signal, stopping");
                break;
            }

            job = queue.pop() => {
                let job_id = job.id;
                log::info!(
                    "Worker {id} got job {job_id} ({}, {} cases) from queue",
                    job.request.language,
                    job.request.test_cases.len()
                );

                // An in-flight job is never interrupted, shutdown waits for it
                let result = judger.judge(&job.request).await;

                let recorded = match &result {
                    Ok(report) => {
                        log::info!(
                            "Job {job_id} finished on worker {id}, passed: {}",
                            report.overall_passed
                        );
                        Some(report.clone())
                    }
                    Err(e) => {
                        log::error!("Job {job_id} failed on worker {id}: {e}");
                        None
                    }
                };

                // Answer first, the sink must never hold up the caller
                if job.responder.send(result).is_err() {
                    log::warn!("Caller of job {job_id} went away before the result was ready");
                }

                if let Some(report) = recorded {
                    report
                        .forward(sink.as_ref(), &job.problem_title, &job.request.code)
                        .await;
                }
            }
        };
    }

    log::info!("Worker {id} has shut down gracefully");
    Ok(())
}
