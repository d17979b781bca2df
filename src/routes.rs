mod execute;
mod languages;

pub use execute::{ExecuteRequest, post_execute_handler};
pub use languages::{LanguageEntry, get_languages_handler};

use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::{HttpRequest, HttpResponse, web};
use serde::{Deserialize, Serialize};

use crate::sandbox::JudgeError;

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/execute").route(web::post().to(post_execute_handler)))
        .service(web::resource("/languages").route(web::get().to(get_languages_handler)));
}

pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let response =
        HttpResponse::BadRequest().json(ErrorResponse::new(format!("Invalid request: {err}")));
    InternalError::from_response(err, response).into()
}

/// Maps request-level faults onto the HTTP boundary
pub fn judge_error_response(err: &JudgeError) -> HttpResponse {
    match err {
        JudgeError::UnsupportedLanguage(_) => {
            HttpResponse::BadRequest().json(ErrorResponse::new(err.to_string()))
        }
        JudgeError::ProblemNotFound(_) => {
            HttpResponse::NotFound().json(ErrorResponse::new(err.to_string()))
        }
        _ => HttpResponse::InternalServerError().json(ErrorResponse::new(format!(
            "Unexpected error occurred: {err}"
        ))),
    }
}
