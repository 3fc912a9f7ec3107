//! Column extraction from the final `RETURN` clause of an openCypher statement.
//!
//! Apache AGE needs the SQL column list of `cypher(...)` to match the
//! statement's projection, so the Postgres backend derives it from the text.
//!
//! ```ignore
//! let columns = extract_return_columns("MATCH (n) RETURN n.name AS name, n.age").unwrap();
//! assert_eq!(columns, vec!["name", "n.age"]);
//! ```

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "graph/return_clause.pest"]
struct ReturnClauseParser;

/// Errors that can occur while locating the projection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("No RETURN clause found in query")]
    NoReturnClause,
    #[error("RETURN * is not supported - please specify columns explicitly")]
    ReturnStarNotSupported,
    #[error("Invalid syntax: {0}")]
    InvalidSyntax(String),
}

/// Keywords that end a projection list.
const PROJECTION_TERMINATORS: &[&str] = &["ORDER", "SKIP", "LIMIT", "UNION"];

/// Extracts column names from the last top-level `RETURN` clause.
///
/// Aliased items (`expr AS alias`) yield the alias, other items yield the
/// expression text. `RETURN` keywords nested inside brackets (subqueries,
/// list comprehensions, map projections) are ignored.
pub fn extract_return_columns(query: &str) -> Result<Vec<String>, ParseError> {
    let statement = ReturnClauseParser::parse(Rule::statement, query)
        .map_err(|e| ParseError::InvalidSyntax(e.to_string()))?
        .next()
        .ok_or_else(|| ParseError::InvalidSyntax("empty statement".into()))?;

    let tokens: Vec<Pair<Rule>> = statement
        .into_inner()
        .filter(|p| p.as_rule() != Rule::EOI)
        .collect();

    let start = tokens
        .iter()
        .enumerate()
        .rev()
        .find(|(i, t)| {
            is_keyword(t, "RETURN")
                && !(*i > 0 && tokens[i - 1].as_rule() == Rule::symbol && tokens[i - 1].as_str() == ".")
        })
        .map(|(i, _)| i + 1)
        .ok_or(ParseError::NoReturnClause)?;

    let mut projection = &tokens[start..];
    if projection.first().is_some_and(|t| is_keyword(t, "DISTINCT")) {
        projection = &projection[1..];
    }
    let end = projection
        .iter()
        .position(|t| PROJECTION_TERMINATORS.iter().any(|k| is_keyword(t, k)))
        .unwrap_or(projection.len());
    let projection = &projection[..end];

    let mut columns = Vec::new();
    for item in projection.split(|t| t.as_rule() == Rule::symbol && t.as_str() == ",") {
        columns.push(column_name(query, item)?);
    }

    Ok(columns)
}

fn column_name(query: &str, item: &[Pair<Rule>]) -> Result<String, ParseError> {
    match item {
        [] => Err(ParseError::InvalidSyntax("empty projection item".into())),
        [only] if only.as_rule() == Rule::symbol && only.as_str() == "*" => {
            Err(ParseError::ReturnStarNotSupported)
        }
        [.., as_kw, alias] if is_keyword(as_kw, "AS") => Ok(unescape(alias.as_str())),
        [first, .., last] => {
            let text = &query[first.as_span().start()..last.as_span().end()];
            Ok(text.trim().to_string())
        }
        [single] => Ok(unescape(single.as_str())),
    }
}

fn is_keyword(token: &Pair<Rule>, keyword: &str) -> bool {
    token.as_rule() == Rule::word && token.as_str().eq_ignore_ascii_case(keyword)
}

fn unescape(name: &str) -> String {
    name.strip_prefix('`')
        .and_then(|n| n.strip_suffix('`'))
        .unwrap_or(name)
        .to_string()
}
