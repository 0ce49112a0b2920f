use serde::Deserialize;

/// How an upload is judged against its prompt.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierMode {
    /// Ask the LLM a yes/no question about the prompt.
    Llm,
    /// Run label detection and match labels against the prompt.
    Labels,
}

impl ClassifierMode {
    fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "llm" => Ok(Self::Llm),
            "labels" => Ok(Self::Labels),
            other => anyhow::bail!("unknown CLASSIFIER_MODE {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub ttl_days: i64,
    pub guest_ttl_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    pub mode: ClassifierMode,
    pub api_key: String,
    pub vision_endpoint: String,
    pub gemini_endpoint: String,
    pub model: String,
    pub calls: u32,
    pub period_secs: u64,
    pub analyze_labels: Vec<String>,
}

impl ClassifierConfig {
    /// A zero quota would block every classifier call forever; a zero
    /// period would disable the throttle.
    fn check_throttle(&self) -> anyhow::Result<()> {
        if self.calls == 0 {
            anyhow::bail!("CLASSIFIER_CALLS must be at least 1");
        }
        if self.period_secs == 0 {
            anyhow::bail!("CLASSIFIER_PERIOD_SECS must be at least 1");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub rate_limit_enabled: bool,
    pub admin_emails: Vec<String>,
    pub session: SessionConfig,
    pub classifier: ClassifierConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let session = SessionConfig {
            ttl_days: parse_or("SESSION_TTL_DAYS", 7),
            guest_ttl_hours: parse_or("GUEST_SESSION_TTL_HOURS", 24),
        };
        let classifier = ClassifierConfig {
            mode: ClassifierMode::parse(
                &std::env::var("CLASSIFIER_MODE").unwrap_or_else(|_| "llm".into()),
            )?,
            api_key: std::env::var("GOOGLE_API_KEY").unwrap_or_default(),
            vision_endpoint: std::env::var("VISION_ENDPOINT")
                .unwrap_or_else(|_| "https://vision.googleapis.com/v1/images:annotate".into()),
            gemini_endpoint: std::env::var("GEMINI_ENDPOINT")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".into()),
            model: std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".into()),
            calls: parse_or("CLASSIFIER_CALLS", 10),
            period_secs: parse_or("CLASSIFIER_PERIOD_SECS", 60),
            analyze_labels: split_list(
                &std::env::var("ANALYZE_LABELS").unwrap_or_else(|_| "whiteboard,beard".into()),
            ),
        };
        classifier.check_throttle()?;
        if classifier.api_key.is_empty() {
            tracing::warn!("GOOGLE_API_KEY not set; classifier calls will fail");
        }

        Ok(Self {
            database_url,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parse_or("APP_PORT", 5000),
            allowed_origins: split_list(
                &std::env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".into()),
            ),
            rate_limit_enabled: std::env::var("RATE_LIMIT_ENABLED")
                .map(|v| !matches!(v.to_lowercase().as_str(), "false" | "0" | "no"))
                .unwrap_or(true),
            admin_emails: split_list(&std::env::var("ADMIN_EMAILS").unwrap_or_default())
                .into_iter()
                .map(|e| e.to_lowercase())
                .collect(),
            session,
            classifier,
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
