use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};

use crate::sandbox::LanguageRegistry;

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct LanguageEntry {
    pub name: String,
    pub compiled: bool,
}

pub async fn get_languages_handler(registry: web::Data<LanguageRegistry>) -> HttpResponse {
    let languages: Vec<_> = registry
        .profiles()
        .into_iter()
        .map(|p| LanguageEntry {
            name: p.name.clone(),
            compiled: p.requires_compilation(),
        })
        .collect();

    HttpResponse::Ok().json(languages)
}
