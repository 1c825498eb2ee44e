// Fuzzy instrument lookup for the compare picker
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use shared::models::InstrumentMatch;

/// Ranks `instruments` against `query` by the better of the symbol and name scores.
/// An empty query returns every instrument ordered by symbol.
pub fn rank_instruments(query: &str, instruments: &[InstrumentMatch]) -> Vec<InstrumentMatch> {
    let query = query.trim();
    let mut sorted: Vec<InstrumentMatch> = instruments.to_vec();
    sorted.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    if query.is_empty() {
        return sorted;
    }

    let matcher = SkimMatcherV2::default().ignore_case();
    let mut scored: Vec<(i64, InstrumentMatch)> = sorted
        .into_iter()
        .filter_map(|instrument| {
            let by_symbol = matcher.fuzzy_match(&instrument.symbol, query);
            let by_name = matcher.fuzzy_match(&instrument.name, query);
            by_symbol.max(by_name).map(|score| (score, instrument))
        })
        .collect();

    // Stable sort keeps symbol order among equal scores.
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().map(|(_, instrument)| instrument).collect()
}
