//! PGN movetext reading: a lightweight regex-based parser.

use std::sync::LazyLock;

use regex::Regex;

use crate::game_data::{GameMetadata, GameRecord};
use crate::position::STANDARD_START_FEN;

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\[(\w+)\s+"([^"]*)"\]"#).unwrap());
static HEADER_LINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[[^\]]*\]").unwrap());
static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{[^}]*\}").unwrap());
static LINE_COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m);.*$").unwrap());
/// Innermost variation only; applied until nothing changes to peel nested ones.
static VARIATION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\([^()]*\)").unwrap());
static NAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\d+").unwrap());
static MOVE_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+\.(?:\.\.)?").unwrap());
static RESULT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:1-0|0-1|1/2-1/2|\*)$").unwrap());
static GAME_START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*\[Event\s").unwrap());

/// Parse one PGN game. `None` when there are no moves or the game starts
/// from a non-standard position.
pub fn parse_pgn(pgn: &str) -> Option<GameRecord> {
    let mut metadata = GameMetadata {
        white: "Unknown".to_string(),
        black: "Unknown".to_string(),
        result: "*".to_string(),
        ..GameMetadata::default()
    };

    for cap in HEADER_RE.captures_iter(pgn) {
        let value = cap[2].to_string();
        match &cap[1] {
            "White" => metadata.white = value,
            "Black" => metadata.black = value,
            "Result" => metadata.result = value,
            "Date" => metadata.date = Some(value),
            "TimeControl" => metadata.time_control = Some(value),
            "ECO" => metadata.eco = Some(value),
            "Event" => metadata.event = Some(value),
            _ => {}
        }
    }

    if custom_start(pgn).is_some() {
        return None;
    }

    let moves = extract_moves(pgn);
    if moves.is_empty() {
        return None;
    }

    Some(GameRecord { metadata, moves })
}

/// The `FEN` header of a game set up from a non-standard position.
pub fn custom_start(pgn: &str) -> Option<String> {
    if extract_header(pgn, "SetUp").as_deref() != Some("1") {
        return None;
    }
    extract_header(pgn, "FEN").filter(|fen| fen.trim() != STANDARD_START_FEN)
}

/// Extract move tokens from PGN text (after removing headers, comments, variations).
pub fn extract_moves(pgn: &str) -> Vec<String> {
    let text = HEADER_LINE_RE.replace_all(pgn, " ");
    let text = COMMENT_RE.replace_all(&text, " ");
    let text = LINE_COMMENT_RE.replace_all(&text, " ");

    let mut text = text.into_owned();
    loop {
        let peeled = VARIATION_RE.replace_all(&text, " ");
        if peeled.len() == text.len() {
            break;
        }
        text = peeled.into_owned();
    }

    let text = NAG_RE.replace_all(&text, " ");
    let text = MOVE_NUMBER_RE.replace_all(&text, " ");

    text.split_whitespace()
        .filter(|t| !RESULT_RE.is_match(t))
        .map(str::to_string)
        .collect()
}

/// Split a multi-game PGN file at each `[Event` tag.
pub fn split_games(text: &str) -> Vec<&str> {
    let mut starts: Vec<usize> = GAME_START_RE.find_iter(text).map(|m| m.start()).collect();
    if starts.first() != Some(&0) {
        starts.insert(0, 0);
    }
    let ends = starts.iter().skip(1).copied().chain(std::iter::once(text.len()));
    starts
        .iter()
        .copied()
        .zip(ends)
        .map(|(start, end)| text[start..end].trim())
        .filter(|game| !game.is_empty())
        .collect()
}

/// Extract a string value from a PGN header (e.g. WhiteElo, Site).
pub fn extract_header(pgn: &str, header_name: &str) -> Option<String> {
    HEADER_RE
        .captures_iter(pgn)
        .find(|cap| &cap[1] == header_name)
        .map(|cap| cap[2].to_string())
        .filter(|value| !value.is_empty())
}
