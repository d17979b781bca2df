use std::collections::HashMap;

use anyhow::{Result, bail};

use crate::config::{LanguageConfig, OneLanguageConfig};

use super::JudgeError;

/// Name of the artifact a compile step is expected to produce
pub const ARTIFACT_NAME: &str = "main";

/// How to build and run one language, with the source and artifact names substituted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageProfile {
    pub name: String,
    /// Source file name inside the workspace; its extension selects the toolchain
    pub source_file: String,
    compile: Option<Vec<String>>,
    run: Vec<String>,
}

impl LanguageProfile {
    pub fn new(
        name: &str,
        source_file: &str,
        compile: Option<Vec<String>>,
        run: Vec<String>,
    ) -> Result<Self> {
        if run.is_empty() {
            bail!("Language {name} has an empty run command");
        }
        if compile.as_ref().is_some_and(|c| c.is_empty()) {
            bail!("Language {name} has an empty compile command");
        }
        if source_file.is_empty() || source_file.contains('/') {
            bail!("Language {name} has an invalid source file name {source_file:?}");
        }

        Ok(Self {
            name: name.to_string(),
            source_file: source_file.to_string(),
            compile: compile.map(|c| apply_template(&c, source_file)),
            run: apply_template(&run, source_file),
        })
    }

    pub fn requires_compilation(&self) -> bool {
        self.compile.is_some()
    }

    pub fn compile_command(&self) -> Option<&[String]> {
        self.compile.as_deref()
    }

    pub fn run_command(&self) -> &[String] {
        &self.run
    }
}

impl TryFrom<&OneLanguageConfig> for LanguageProfile {
    type Error = anyhow::Error;

    fn try_from(config: &OneLanguageConfig) -> Result<Self> {
        Self::new(
            &config.name,
            &config.file_name,
            config.compile.clone(),
            config.run.clone(),
        )
    }
}

/// Read-only table of supported languages, built once at startup
#[derive(Debug, Default)]
pub struct LanguageRegistry {
    profiles: HashMap<String, LanguageProfile>,
}

impl LanguageRegistry {
    pub fn from_config(languages: &LanguageConfig) -> Result<Self> {
        let mut registry = Self::default();
        for language in languages.iter() {
            registry.insert(LanguageProfile::try_from(language)?)?;
        }
        Ok(registry)
    }

    pub fn insert(&mut self, profile: LanguageProfile) -> Result<()> {
        if self.profiles.contains_key(&profile.name) {
            bail!("Language {} is configured twice", profile.name);
        }
        self.profiles.insert(profile.name.clone(), profile);
        Ok(())
    }

    pub fn resolve(&self, language: &str) -> Result<&LanguageProfile, JudgeError> {
        self.profiles
            .get(language)
            .ok_or_else(|| JudgeError::UnsupportedLanguage(language.to_string()))
    }

    /// Supported languages sorted by name
    pub fn profiles(&self) -> Vec<&LanguageProfile> {
        let mut profiles: Vec<_> = self.profiles.values().collect();
        profiles.sort_by(|a, b| a.name.cmp(&b.name));
        profiles
    }
}

/// Replaces `%INPUT%` with the source file name and `%OUTPUT%` with the artifact name
fn apply_template(cmd_template: &[String], source_file: &str) -> Vec<String> {
    cmd_template
        .iter()
        .map(|s| {
            s.replace("%INPUT%", source_file)
                .replace("%OUTPUT%", ARTIFACT_NAME)
        })
        .collect()
}
