use std::env;
use std::path::PathBuf;

/// Which sampler strategy `OPTUNA_SAMPLER` selects; see DESIGN.md for the
/// resolution of the original service's `auto`/`tpe` distinction onto this
/// workspace's from-scratch sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerChoice {
    /// Sobol initial design, mixed UCB/EI acquisition schedule.
    Auto,
    /// Latin Hypercube initial design, UCB-only acquisition.
    Tpe,
}

impl SamplerChoice {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "tpe" => SamplerChoice::Tpe,
            _ => SamplerChoice::Auto,
        }
    }
}

/// Process-wide configuration read once from the environment at startup
/// (spec.md §6). Immutable once constructed.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub cors_allow_origins: Vec<String>,
    pub optuna_storage: Option<String>,
    pub optuna_sampler: SamplerChoice,
    pub optuna_sampler_seed: Option<u64>,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let cors_allow_origins = env::var("CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:8000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let optuna_storage = env::var("OPTUNA_STORAGE").ok().filter(|s| !s.is_empty());

        let optuna_sampler = env::var("OPTUNA_SAMPLER")
            .ok()
            .map(|raw| SamplerChoice::parse(&raw))
            .unwrap_or(SamplerChoice::Auto);

        let optuna_sampler_seed = env::var("OPTUNA_SAMPLER_SEED")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok());

        EngineConfig {
            cors_allow_origins,
            optuna_storage,
            optuna_sampler,
            optuna_sampler_seed,
        }
    }

    /// Where session records are persisted for warm-start (spec.md §4.6).
    /// Reuses `OPTUNA_STORAGE` when it names a filesystem path rather than
    /// a database URL, since this workspace persists sessions as JSON
    /// files instead of through an external storage backend; falls back
    /// to `./data` otherwise.
    pub fn state_dir(&self) -> PathBuf {
        match &self.optuna_storage {
            Some(raw) if !raw.contains("://") => PathBuf::from(raw),
            _ => PathBuf::from("./data"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampler_choice_defaults_to_auto_on_unrecognized_value() {
        assert_eq!(SamplerChoice::parse("bogus"), SamplerChoice::Auto);
        assert_eq!(SamplerChoice::parse("TPE"), SamplerChoice::Tpe);
    }
}
