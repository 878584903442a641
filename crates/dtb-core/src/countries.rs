//! Flag emoji -> country -> language codes.

/// A country that can be requested with its flag emoji.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Country {
    /// ISO 3166-1 alpha-2 code.
    pub code: &'static str,
    pub name: &'static str,
    /// Language codes, preferred first. Matching against providers is
    /// case-insensitive.
    pub lang_codes: &'static [&'static str],
}

impl Country {
    /// The flag emoji (two regional indicator symbols).
    pub fn emoji(&self) -> String {
        self.code
            .chars()
            .filter_map(|c| {
                let c = c.to_ascii_uppercase();
                char::from_u32(REGIONAL_INDICATOR_A + (c as u32 - 'A' as u32))
            })
            .collect()
    }
}

const REGIONAL_INDICATOR_A: u32 = 0x1F1E6;
const VARIATION_SELECTOR_16: char = '\u{FE0F}';

pub const SUPPORTED_COUNTRIES: &[Country] = &[
    Country { code: "AU", name: "Australia", lang_codes: &["en"] },
    Country { code: "CA", name: "Canada", lang_codes: &["en"] },
    Country { code: "GB", name: "United Kingdom", lang_codes: &["en"] },
    Country { code: "US", name: "United States", lang_codes: &["en"] },
    Country { code: "UM", name: "U.S. Outlying Islands", lang_codes: &["en"] },
    Country { code: "DZ", name: "Algeria", lang_codes: &["ar"] },
    Country { code: "BH", name: "Bahrain", lang_codes: &["ar"] },
    Country { code: "EG", name: "Egypt", lang_codes: &["ar"] },
    Country { code: "SA", name: "Saudi Arabia", lang_codes: &["ar"] },
    Country { code: "CN", name: "China", lang_codes: &["zh-Hans", "zh"] },
    Country { code: "HK", name: "Hong Kong SAR China", lang_codes: &["zh-Hant", "zh"] },
    Country { code: "TW", name: "Taiwan", lang_codes: &["zh-Hant", "zh"] },
    Country { code: "FR", name: "France", lang_codes: &["fr"] },
    Country { code: "DE", name: "Germany", lang_codes: &["de"] },
    Country { code: "IN", name: "India", lang_codes: &["hi"] },
    Country { code: "IE", name: "Ireland", lang_codes: &["ga"] },
    Country { code: "IT", name: "Italy", lang_codes: &["it"] },
    Country { code: "JP", name: "Japan", lang_codes: &["ja"] },
    Country { code: "KR", name: "South Korea", lang_codes: &["ko"] },
    Country { code: "BR", name: "Brazil", lang_codes: &["pt-br", "pt"] },
    Country { code: "PT", name: "Portugal", lang_codes: &["pt-pt", "pt"] },
    Country { code: "RU", name: "Russia", lang_codes: &["ru"] },
    Country { code: "MX", name: "Mexico", lang_codes: &["es"] },
    Country { code: "ES", name: "Spain", lang_codes: &["es"] },
    Country { code: "VN", name: "Vietnam", lang_codes: &["vi"] },
    Country { code: "TH", name: "Thailand", lang_codes: &["th"] },
];

/// Resolve a flag emoji to a supported country.
///
/// Returns `None` for anything that isn't a supported flag; most reactions
/// aren't translation requests.
pub fn find_by_emoji(emoji: &str) -> Option<Country> {
    let code = flag_to_code(emoji)?;
    find_by_code(&code)
}

pub fn find_by_code(code: &str) -> Option<Country> {
    SUPPORTED_COUNTRIES
        .iter()
        .find(|c| c.code.eq_ignore_ascii_case(code))
        .copied()
}

fn flag_to_code(emoji: &str) -> Option<String> {
    let mut chars = emoji.chars().filter(|c| *c != VARIATION_SELECTOR_16);
    let a = regional_indicator_letter(chars.next()?)?;
    let b = regional_indicator_letter(chars.next()?)?;
    if chars.next().is_some() {
        return None;
    }
    Some([a, b].iter().collect())
}

fn regional_indicator_letter(c: char) -> Option<char> {
    let offset = (c as u32).checked_sub(REGIONAL_INDICATOR_A)?;
    if offset >= 26 {
        return None;
    }
    char::from_u32('A' as u32 + offset)
}
