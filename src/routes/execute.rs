use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use super::{ErrorResponse, judge_error_response};
use crate::config::ProblemConfig;
use crate::queue::{JobQueue, JudgeJob};
use crate::sandbox::{ExecutionRequest, JudgeError, LanguageRegistry, TestCase};

/// Problem judged when a request brings neither cases nor a problem id
const DEFAULT_PROBLEM_ID: u32 = 0;

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub language: String,
    pub code: String,
    #[serde(default)]
    pub test_cases: Option<Vec<TestCase>>,
    #[serde(default)]
    pub problem_id: Option<u32>,
}

pub async fn post_execute_handler(
    job_queue: web::Data<JobQueue>,
    registry: web::Data<LanguageRegistry>,
    problems: web::Data<ProblemConfig>,
    body: web::Json<ExecuteRequest>,
) -> HttpResponse {
    let ExecuteRequest {
        language,
        code,
        test_cases,
        problem_id,
    } = body.into_inner();

    // Reject before anything is queued or written to disk
    if let Err(e) = registry.resolve(&language) {
        log::info!("Rejected submission: {e}");
        return judge_error_response(&e);
    }

    let (problem_title, test_cases) = match test_cases {
        Some(cases) if cases.is_empty() => {
            return HttpResponse::BadRequest().json(ErrorResponse::new("No test cases supplied"));
        }
        Some(cases) => ("custom".to_string(), cases),
        None => {
            let id = problem_id.unwrap_or(DEFAULT_PROBLEM_ID);
            match problems.iter().find(|p| p.id == id) {
                Some(problem) => (
                    problem.title.clone(),
                    problem.cases.iter().map(TestCase::from).collect(),
                ),
                None => return judge_error_response(&JudgeError::ProblemNotFound(id)),
            }
        }
    };

    let (tx, rx) = oneshot::channel();
    let job_id = job_queue.next_id();
    job_queue
        .push(JudgeJob {
            id: job_id,
            problem_title,
            request: ExecutionRequest {
                language,
                code,
                test_cases,
            },
            responder: tx,
        })
        .await;
    log::debug!("Sent job {job_id} to queue");

    match rx.await {
        Ok(Ok(report)) => {
            log::info!("Received report of job {job_id}");
            HttpResponse::Ok().json(report)
        }
        Ok(Err(e)) => judge_error_response(&e),
        Err(e) => {
            log::error!("Failed to receive result of job {job_id}: {e}");
            HttpResponse::InternalServerError()
                .json(ErrorResponse::new("Unexpected error occurred: judge unavailable"))
        }
    }
}
