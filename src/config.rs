use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

#[derive(Parser)]
#[command(name = "judge", version = "1.0", about, long_about = None)]
pub struct CliArgs {
    /// Path to the configuration file
    #[arg(long = "config", short = 'c')]
    pub config_path: Option<String>,

    /// Whether to flush the existing results database
    #[arg(long = "flush-data", short = 'f', default_value_t = false)]
    pub flush_data: bool,

    /// Number of judge workers
    #[arg(long = "threads", short = 't', default_value_t = 2)]
    pub threads: u8,

    /// Do not forward test results to the results database
    #[arg(long = "no-persist", default_value_t = false)]
    pub no_persist: bool,
}

impl CliArgs {
    /// Load the configuration from the specified file, or the built-in defaults
    pub fn to_config(&self) -> std::io::Result<Config> {
        let Some(path) = &self.config_path else {
            return Ok(Config::default());
        };
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| e.into())
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub judge: JudgeConfig,
    pub languages: LanguageConfig,
    pub problems: ProblemConfig,
    pub persistence: PersistenceConfig,
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: Option<String>,
    pub bind_port: Option<u16>,
    /// Browser origins allowed to call the API, `"*"` allows any
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: None,
            bind_port: None,
            cors_origins: vec!["http://localhost:5173".to_string()],
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct JudgeConfig {
    /// Wall-clock budget of a single run, applied per test case
    pub time_limit_ms: u64,
    pub compile_time_limit_ms: u64,
    /// Cap on each captured stream; the excess is drained and dropped
    pub output_limit_bytes: usize,
    /// 1 runs test cases one after another. Concurrent cases still get a
    /// process each but share the workspace directory, so files one case
    /// writes are visible to the others.
    pub max_parallel_cases: usize,
    pub workspace_root: Option<PathBuf>,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            time_limit_ms: 10_000,
            compile_time_limit_ms: 30_000,
            output_limit_bytes: 1 << 20,
            max_parallel_cases: 1,
            workspace_root: None,
        }
    }
}

impl JudgeConfig {
    pub fn time_limit(&self) -> Duration {
        Duration::from_millis(self.time_limit_ms)
    }

    pub fn compile_time_limit(&self) -> Duration {
        Duration::from_millis(self.compile_time_limit_ms)
    }

    pub fn workspace_root(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("judge-workspaces"))
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OneLanguageConfig {
    pub name: String,
    pub file_name: String,
    #[serde(default)]
    pub compile: Option<Vec<String>>,
    pub run: Vec<String>,
}

#[derive(Deserialize, Debug)]
#[serde(transparent)]
pub struct LanguageConfig(pub Vec<OneLanguageConfig>);

impl std::ops::Deref for LanguageConfig {
    type Target = Vec<OneLanguageConfig>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Default for LanguageConfig {
    fn default() -> Self {
        let argv = |args: &[&str]| args.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self(vec![
            OneLanguageConfig {
                name: "python".to_string(),
                file_name: "main.py".to_string(),
                compile: None,
                run: argv(&["python3", "%INPUT%"]),
            },
            OneLanguageConfig {
                name: "c".to_string(),
                file_name: "main.c".to_string(),
                compile: Some(argv(&["gcc", "-O2", "-o", "%OUTPUT%", "%INPUT%", "-lm"])),
                run: argv(&["./%OUTPUT%"]),
            },
            OneLanguageConfig {
                name: "cpp".to_string(),
                file_name: "main.cpp".to_string(),
                compile: Some(argv(&["g++", "-O2", "-o", "%OUTPUT%", "%INPUT%"])),
                run: argv(&["./%OUTPUT%"]),
            },
            OneLanguageConfig {
                name: "java".to_string(),
                file_name: "Main.java".to_string(),
                compile: Some(argv(&["javac", "%INPUT%"])),
                run: argv(&["java", "-cp", ".", "Main"]),
            },
        ])
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OneProblemConfig {
    pub id: u32,
    pub title: String,
    pub cases: Vec<OneCaseConfig>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OneCaseConfig {
    pub input: String,
    pub expected_output: String,
}

#[derive(Deserialize, Debug)]
#[serde(transparent)]
pub struct ProblemConfig(pub Vec<OneProblemConfig>);

impl std::ops::Deref for ProblemConfig {
    type Target = Vec<OneProblemConfig>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Default for ProblemConfig {
    fn default() -> Self {
        let case = |input: &str, expected_output: &str| OneCaseConfig {
            input: input.to_string(),
            expected_output: expected_output.to_string(),
        };
        Self(vec![OneProblemConfig {
            id: 0,
            title: "Sum of Two Numbers".to_string(),
            cases: vec![
                case("3 5", "8"),
                case("-2 4", "2"),
                case("0 0", "0"),
                case("1000000 9999999", "10999999"),
                case("-7 -8", "-15"),
            ],
        }])
    }
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct PersistenceConfig {
    pub enabled: bool,
    pub database: Option<PathBuf>,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            database: None,
        }
    }
}
