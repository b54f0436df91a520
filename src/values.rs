//! Parser for the auxiliary score endpoint's slash-delimited payload,
//! `"2011/0/2012/0/.../2020/109.8251/2021/93.4883/"`: flat positional
//! year/score pairs, trailing slash optional, no escaping.

use crate::model::{FIRST_YEAR, LAST_YEAR, ScoreTable, in_score_range, in_year_window};

/// Parse a raw payload into a sparse year -> score table.
///
/// Pure and locale-independent. One malformed pair never poisons the rest:
/// the token stream keeps its positional alignment and the bad pair is
/// skipped. Years/scores outside the admitted ranges are dropped. Empty or
/// whitespace-only input yields an empty table; a trailing unmatched token
/// is ignored.
#[must_use]
pub fn parse_values(content: &str) -> ScoreTable {
    let text = unwrap_html(content);

    let mut scores = ScoreTable::new();
    let mut tokens = text.split('/');
    loop {
        let Some(year) = tokens.next() else { break };
        let Some(score) = tokens.next() else { break };

        let Ok(year) = year.trim().parse::<u16>() else {
            continue;
        };
        let Ok(score) = score.trim().parse::<f64>() else {
            continue;
        };

        if in_year_window(year) && in_score_range(score) {
            scores.insert(year, score);
        }
    }
    scores
}

/// The endpoint usually answers bare text, but some server configurations
/// wrap the payload in an HTML shell; take the document's text content in
/// that case.
fn unwrap_html(content: &str) -> std::borrow::Cow<'_, str> {
    if content.contains('<') {
        let html = scraper::Html::parse_document(content);
        html.root_element()
            .text()
            .map(str::trim)
            .collect::<String>()
            .into()
    } else {
        content.into()
    }
}

/// Back-fill a sparse table to the full canonical window, 0.0 meaning
/// "no admission that year". Zero is a real data point on this scale,
/// not a missing-value sentinel.
#[must_use]
pub fn complete_scores(sparse: &ScoreTable) -> ScoreTable {
    (FIRST_YEAR..=LAST_YEAR)
        .map(|year| (year, sparse.get(&year).copied().unwrap_or(0.0)))
        .collect()
}
