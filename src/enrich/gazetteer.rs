//! Country mentions from a built-in gazetteer
//!
//! Matches country names and their common aliases on word boundaries.

use crate::enrich::{ExtractionError, PlaceExtractor};
use async_trait::async_trait;
use regex::Regex;

/// Country name followed by the other spellings and demonyms that count as a mention
const COUNTRIES: &[(&str, &[&str])] = &[
    ("Afghanistan", &["Afghan", "Afghans"]),
    ("Argentina", &["Argentine", "Argentinian"]),
    ("Australia", &["Australian", "Australians"]),
    ("Austria", &["Austrian"]),
    ("Bangladesh", &["Bangladeshi"]),
    ("Belgium", &["Belgian"]),
    ("Brazil", &["Brazilian", "Brazilians"]),
    ("Canada", &["Canadian", "Canadians"]),
    ("Chile", &["Chilean"]),
    ("China", &["Chinese", "Beijing"]),
    ("Colombia", &["Colombian"]),
    ("Cuba", &["Cuban"]),
    ("Denmark", &["Danish"]),
    ("Egypt", &["Egyptian", "Egyptians"]),
    ("Ethiopia", &["Ethiopian"]),
    ("Finland", &["Finnish"]),
    ("France", &["French"]),
    ("Germany", &["German", "Germans"]),
    ("Ghana", &["Ghanaian"]),
    ("Greece", &["Greek"]),
    ("Hungary", &["Hungarian"]),
    ("India", &["Indian", "Indians"]),
    ("Indonesia", &["Indonesian"]),
    ("Iran", &["Iranian", "Iranians"]),
    ("Iraq", &["Iraqi", "Iraqis"]),
    ("Ireland", &["Irish"]),
    ("Israel", &["Israeli", "Israelis"]),
    ("Italy", &["Italian", "Italians"]),
    ("Japan", &["Japanese"]),
    ("Jordan", &["Jordanian"]),
    ("Kenya", &["Kenyan", "Kenyans"]),
    ("Lebanon", &["Lebanese"]),
    ("Libya", &["Libyan"]),
    ("Malaysia", &["Malaysian"]),
    ("Mexico", &["Mexican", "Mexicans"]),
    ("Morocco", &["Moroccan"]),
    ("Myanmar", &["Burma", "Burmese"]),
    ("Netherlands", &["Dutch", "Holland"]),
    ("New Zealand", &["New Zealander"]),
    ("Nigeria", &["Nigerian", "Nigerians"]),
    ("North Korea", &["North Korean", "Pyongyang"]),
    ("Norway", &["Norwegian"]),
    ("Pakistan", &["Pakistani", "Pakistanis"]),
    ("Peru", &["Peruvian"]),
    ("Philippines", &["Filipino", "Philippine"]),
    ("Poland", &["Polish"]),
    ("Portugal", &["Portuguese"]),
    ("Qatar", &["Qatari"]),
    ("Romania", &["Romanian"]),
    ("Russia", &["Russian", "Russians", "Moscow", "Kremlin"]),
    ("Saudi Arabia", &["Saudi"]),
    ("Somalia", &["Somali"]),
    ("South Africa", &["South African"]),
    ("South Korea", &["South Korean", "Seoul"]),
    ("Spain", &["Spanish"]),
    ("Sri Lanka", &["Sri Lankan"]),
    ("Sudan", &["Sudanese"]),
    ("Sweden", &["Swedish"]),
    ("Switzerland", &["Swiss"]),
    ("Syria", &["Syrian", "Syrians"]),
    ("Taiwan", &["Taiwanese"]),
    ("Thailand", &["Thai"]),
    ("Turkey", &["Turkish", "Turkiye"]),
    ("Uganda", &["Ugandan"]),
    ("Ukraine", &["Ukrainian", "Ukrainians", "Kyiv"]),
    ("United Arab Emirates", &["UAE", "Emirati"]),
    ("United Kingdom", &["UK", "Britain", "British"]),
    ("United States", &["US", "USA", "America", "American", "Americans"]),
    ("Venezuela", &["Venezuelan"]),
    ("Vietnam", &["Vietnamese"]),
    ("Yemen", &["Yemeni"]),
    ("Zimbabwe", &["Zimbabwean"]),
];

struct CountryPattern {
    name: String,
    pattern: Regex,
}

/// Place extractor backed by a built-in country gazetteer
///
/// Matching is case-sensitive on whole words, so "turkey" the bird or
/// "us" the pronoun are not mentions. Countries are ordered by mention count,
/// ties broken by first appearance.
pub struct GazetteerPlaceExtractor {
    countries: Vec<CountryPattern>,
}

impl GazetteerPlaceExtractor {
    /// Builds the extractor over the built-in gazetteer
    pub fn new() -> Result<Self, ExtractionError> {
        Self::with_entries(COUNTRIES)
    }

    /// Builds the extractor over a custom gazetteer
    pub fn with_entries(entries: &[(&str, &[&str])]) -> Result<Self, ExtractionError> {
        let countries = entries
            .iter()
            .map(|(name, aliases)| {
                let alternatives = std::iter::once(*name)
                    .chain(aliases.iter().copied())
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join("|");
                let pattern = Regex::new(&format!(r"\b(?:{})\b", alternatives))
                    .map_err(|e| ExtractionError::Places(e.to_string()))?;
                Ok(CountryPattern {
                    name: name.to_string(),
                    pattern,
                })
            })
            .collect::<Result<Vec<_>, ExtractionError>>()?;

        Ok(Self { countries })
    }

    /// Counts mentions and orders the countries found
    pub fn extract(&self, text: &str) -> Vec<String> {
        let mut found: Vec<(usize, usize, &str)> = self
            .countries
            .iter()
            .filter_map(|country| {
                let mut matches = country.pattern.find_iter(text);
                let first = matches.next()?;
                Some((1 + matches.count(), first.start(), country.name.as_str()))
            })
            .collect();

        found.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        found.into_iter().map(|(_, _, name)| name.to_string()).collect()
    }
}

#[async_trait]
impl PlaceExtractor for GazetteerPlaceExtractor {
    async fn countries(&self, text: &str) -> Result<Vec<String>, ExtractionError> {
        Ok(self.extract(text))
    }
}
