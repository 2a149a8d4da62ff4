use serde::Deserialize;
use serde::Serialize;

/// An immutable catalog entry describing how to compile (optionally) and run
/// submissions written in one language.
///
/// Loaded once from the seed catalog at process start (see
/// `judge_core::catalog`); never mutated at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub id: i16,
    pub name: String,
    pub version: String,
    pub source_filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compile_cmd: Option<String>,
    pub run_cmd: String,
}

/// The subset of [`Language`] returned by `GET /languages/` and
/// `GET /languages/{id}` — commands are an implementation detail the client
/// never needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageSummary {
    pub id: i16,
    pub name: String,
    pub version: String,
}

impl From<&Language> for LanguageSummary {
    fn from(lang: &Language) -> Self {
        Self {
            id: lang.id,
            name: lang.name.clone(),
            version: lang.version.clone(),
        }
    }
}
