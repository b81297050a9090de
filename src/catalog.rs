use crate::error::{Error, Result};
use crate::mistakes::MistakeLedger;
use clap::ValueEnum;
use include_dir::{include_dir, Dir};
use itertools::Itertools;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, error, warn};

static TEXTS_DIR: Dir = include_dir!("src/texts");

const EMBEDDED_CATALOG: &str = "texts.json";

/// Number of pseudo-words in an adaptive drill
pub const DIFFICULT_WORD_COUNT: usize = 10;
/// How many of the most-missed characters feed an adaptive drill
pub const DIFFICULT_CHAR_POOL: usize = 5;
const MIN_WORD_LEN: usize = 3;
const MAX_WORD_LEN: usize = 9;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Locale {
    Ru,
    En,
}

impl Locale {
    /// The other supported locale, used for quick switching in the UI
    pub fn toggled(self) -> Self {
        match self {
            Locale::Ru => Locale::En,
            Locale::En => Locale::Ru,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeText {
    pub id: u32,
    pub language: Locale,
    pub category: String,
    pub content: String,
}

/// Category selection as configured by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryFilter {
    All,
    /// Adaptive drill built from the most-missed characters
    Difficult,
    Named(String),
}

impl From<&str> for CategoryFilter {
    fn from(s: &str) -> Self {
        match s {
            "all" | "" => CategoryFilter::All,
            "difficult" => CategoryFilter::Difficult,
            other => CategoryFilter::Named(other.to_string()),
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::All => write!(f, "all"),
            CategoryFilter::Difficult => write!(f, "difficult"),
            CategoryFilter::Named(name) => write!(f, "{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TextSource {
    Catalog { id: u32 },
    Adaptive,
}

/// The text selected as the target of the next session
#[derive(Debug, Clone, PartialEq)]
pub struct TargetText {
    pub content: String,
    pub source: TextSource,
}

/// In-memory set of practice texts
#[derive(Debug, Clone, Default)]
pub struct TextCatalog {
    texts: Vec<PracticeText>,
}

impl TextCatalog {
    pub fn new(texts: Vec<PracticeText>) -> Self {
        Self { texts }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let texts: Vec<PracticeText> = serde_json::from_str(json)?;
        Ok(Self::new(texts))
    }

    /// Catalog bundled into the binary. An unreadable bundle yields an empty catalog.
    pub fn embedded() -> Self {
        let Some(file) = TEXTS_DIR.get_file(EMBEDDED_CATALOG) else {
            error!("embedded catalog {EMBEDDED_CATALOG} missing");
            return Self::default();
        };
        let Some(contents) = file.contents_utf8() else {
            error!("embedded catalog is not valid utf-8");
            return Self::default();
        };
        Self::from_json(contents).unwrap_or_else(|e| {
            error!(error = %e, "failed to parse embedded catalog");
            Self::default()
        })
    }

    /// Load an external catalog file. Any failure is logged and yields an empty catalog.
    pub fn from_path(path: &Path) -> Self {
        let loaded = std::fs::read_to_string(path)
            .map_err(Error::from)
            .and_then(|json| Self::from_json(&json));

        match loaded {
            Ok(catalog) => {
                debug!(path = %path.display(), texts = catalog.len(), "loaded catalog");
                catalog
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to load catalog");
                Self::default()
            }
        }
    }

    pub fn texts(&self) -> &[PracticeText] {
        &self.texts
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn for_language(&self, language: Locale) -> Vec<&PracticeText> {
        self.texts
            .iter()
            .filter(|t| t.language == language)
            .collect()
    }

    /// Texts matching the language and category. Falls back to every text of
    /// the language when the category matches nothing.
    pub fn filter(&self, language: Locale, filter: &CategoryFilter) -> Vec<&PracticeText> {
        let by_language = self.for_language(language);

        let filtered: Vec<&PracticeText> = match filter {
            CategoryFilter::All => return by_language,
            CategoryFilter::Difficult => Vec::new(),
            CategoryFilter::Named(name) => by_language
                .iter()
                .copied()
                .filter(|t| &t.category == name)
                .collect(),
        };

        if filtered.is_empty() {
            debug!(%language, %filter, "no texts in category, using all texts for language");
            by_language
        } else {
            filtered
        }
    }

    /// Distinct categories known for a language, sorted
    pub fn categories(&self, language: Locale) -> Vec<&str> {
        self.for_language(language)
            .into_iter()
            .map(|t| t.category.as_str())
            .unique()
            .sorted()
            .collect()
    }

    /// Choose the target text for the next session
    pub fn pick<R: Rng>(
        &self,
        language: Locale,
        filter: &CategoryFilter,
        ledger: &MistakeLedger,
        rng: &mut R,
    ) -> Result<TargetText> {
        if *filter == CategoryFilter::Difficult {
            let difficult = ledger.top_difficult(DIFFICULT_CHAR_POOL);
            if !difficult.is_empty() {
                return Ok(TargetText {
                    content: generate_difficult_text(&difficult, rng),
                    source: TextSource::Adaptive,
                });
            }
        }

        let candidates = self.filter(language, filter);
        match candidates.choose(rng) {
            Some(text) => Ok(TargetText {
                content: text.content.clone(),
                source: TextSource::Catalog { id: text.id },
            }),
            None => {
                warn!(%language, "catalog has no texts for language");
                Err(Error::CatalogEmpty { language })
            }
        }
    }
}

/// Build a drill of pseudo-words drawn uniformly from `chars`.
///
/// The words are not meant to be pronounceable; they only concentrate
/// practice on the given characters.
pub fn generate_difficult_text<R: Rng>(chars: &[char], rng: &mut R) -> String {
    if chars.is_empty() {
        return String::new();
    }

    (0..DIFFICULT_WORD_COUNT)
        .map(|_| {
            let len = rng.gen_range(MIN_WORD_LEN..=MAX_WORD_LEN);
            (0..len)
                .map(|_| chars[rng.gen_range(0..chars.len())])
                .collect::<String>()
        })
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mistakes::MistakeMap;
    use assert_matches::assert_matches;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn text(id: u32, language: Locale, category: &str, content: &str) -> PracticeText {
        PracticeText {
            id,
            language,
            category: category.to_string(),
            content: content.to_string(),
        }
    }

    fn create_test_catalog() -> TextCatalog {
        TextCatalog::new(vec![
            text(1, Locale::En, "quotes", "stay hungry"),
            text(2, Locale::En, "code", "let x = 1;"),
            text(3, Locale::Ru, "quotes", "тише едешь"),
        ])
    }

    #[test]
    fn test_embedded_catalog_has_both_locales() {
        let catalog = TextCatalog::embedded();
        assert!(!catalog.is_empty());
        assert!(!catalog.for_language(Locale::En).is_empty());
        assert!(!catalog.for_language(Locale::Ru).is_empty());
    }

    #[test]
    fn test_from_json() {
        let json = r#"[{"id": 7, "language": "en", "category": "quotes", "content": "hi there"}]"#;
        let catalog = TextCatalog::from_json(json).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.texts()[0].language, Locale::En);
    }

    #[test]
    fn test_from_missing_path_is_empty() {
        let catalog = TextCatalog::from_path(Path::new("/definitely/not/here.json"));
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_from_path_with_bad_json_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("texts.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(TextCatalog::from_path(&path).is_empty());
    }

    #[test]
    fn test_filter_by_category() {
        let catalog = create_test_catalog();
        let texts = catalog.filter(Locale::En, &CategoryFilter::Named("code".into()));
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].id, 2);
    }

    #[test]
    fn test_filter_unknown_category_falls_back_to_language() {
        let catalog = create_test_catalog();
        let texts = catalog.filter(Locale::En, &CategoryFilter::Named("poetry".into()));
        assert_eq!(texts.len(), 2);
        assert!(texts.iter().all(|t| t.language == Locale::En));
    }

    #[test]
    fn test_categories_sorted_and_unique() {
        let mut catalog = create_test_catalog();
        catalog.texts.push(text(4, Locale::En, "code", "x"));
        assert_eq!(catalog.categories(Locale::En), vec!["code", "quotes"]);
    }

    #[test]
    fn test_category_filter_from_str() {
        assert_eq!(CategoryFilter::from("all"), CategoryFilter::All);
        assert_eq!(CategoryFilter::from("difficult"), CategoryFilter::Difficult);
        assert_eq!(
            CategoryFilter::from("code"),
            CategoryFilter::Named("code".into())
        );
        assert_eq!(CategoryFilter::Named("code".into()).to_string(), "code");
    }

    #[test]
    fn test_pick_empty_catalog() {
        let catalog = TextCatalog::default();
        let ledger = MistakeLedger::default();
        let mut rng = StdRng::seed_from_u64(1);
        let res = catalog.pick(Locale::Ru, &CategoryFilter::All, &ledger, &mut rng);
        assert_matches!(res, Err(Error::CatalogEmpty { language: Locale::Ru }));
    }

    #[test]
    fn test_pick_difficult_without_history_uses_catalog() {
        let catalog = create_test_catalog();
        let ledger = MistakeLedger::default();
        let mut rng = StdRng::seed_from_u64(1);
        let target = catalog
            .pick(Locale::Ru, &CategoryFilter::Difficult, &ledger, &mut rng)
            .unwrap();
        assert_eq!(target.source, TextSource::Catalog { id: 3 });
        assert_eq!(target.content, "тише едешь");
    }

    #[test]
    fn test_pick_difficult_with_history_generates_drill() {
        let catalog = create_test_catalog();
        let mut ledger = MistakeLedger::default();
        let mut map = MistakeMap::new();
        map.insert('q', 4);
        map.insert('z', 2);
        ledger.record(&map);

        let mut rng = StdRng::seed_from_u64(42);
        let target = catalog
            .pick(Locale::En, &CategoryFilter::Difficult, &ledger, &mut rng)
            .unwrap();
        assert_eq!(target.source, TextSource::Adaptive);
        assert!(target.content.chars().all(|c| c == 'q' || c == 'z' || c == ' '));
    }

    #[test]
    fn test_generate_difficult_text_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let chars = ['a', 'б', ' '];
        let drill = generate_difficult_text(&['x', 'y'], &mut rng);
        let words: Vec<&str> = drill.split(' ').collect();
        assert_eq!(words.len(), DIFFICULT_WORD_COUNT);
        for word in words {
            let len = word.chars().count();
            assert!((MIN_WORD_LEN..=MAX_WORD_LEN).contains(&len));
            assert!(word.chars().all(|c| c == 'x' || c == 'y'));
        }

        // a space among the difficult characters is kept as-is
        let drill = generate_difficult_text(&chars, &mut rng);
        assert!(drill.chars().all(|c| chars.contains(&c)));
    }

    #[test]
    fn test_generate_difficult_text_no_chars() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(generate_difficult_text(&[], &mut rng), "");
    }

    #[test]
    fn test_locale_serde_and_display() {
        assert_eq!(serde_json::to_string(&Locale::Ru).unwrap(), "\"ru\"");
        assert_eq!(Locale::En.to_string(), "en");
        assert_eq!(Locale::En.toggled(), Locale::Ru);
    }
}
