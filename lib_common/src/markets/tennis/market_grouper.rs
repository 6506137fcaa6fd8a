//! # Market Grouper
//!
//! Buckets the raw odds markets of a tennis match by their `group` attribute
//! ("Match Winner", "Set Betting", ...).
//!
//! The upstream delivers markets in one of two shapes:
//! - an array of market entries, or
//! - an object keyed by market id.
//!
//! Both produce the same output: group name -> entries in order of appearance.
//! Group names keep the order in which each group was first seen, and the keyed
//! shape is walked in the order the upstream sent it (`serde_json` is built with
//! `preserve_order`).
//! Entries taken from the keyed shape get their key injected as `market_id` so
//! the id survives grouping. Anything that is not an object, or that has no
//! string `group`, is skipped without failing the record.

use serde_json::{Map, Value};

use crate::errors::GroupingError;

/// Group name -> array of market entries. Groups are ordered by first
/// appearance, entries by source order.
pub type GroupedMarkets = Map<String, Value>;

/// Groups a market source by each entry's `group` attribute.
///
/// Returns `GroupingError::UnsupportedShape` only when `markets` itself is
/// neither an array nor an object; malformed entries inside it are skipped.
pub fn group_markets(markets: &Value) -> Result<GroupedMarkets, GroupingError> {
    let mut grouped = GroupedMarkets::new();

    match markets {
        Value::Array(entries) => {
            for entry in entries {
                if let Some(group) = group_of(entry) {
                    push_entry(&mut grouped, group, entry.clone());
                }
            }
        }
        Value::Object(entries) => {
            for (market_id, entry) in entries {
                let Some(group) = group_of(entry) else {
                    continue;
                };
                let mut with_id = entry.clone();
                if let Value::Object(fields) = &mut with_id {
                    fields.insert("market_id".to_string(), Value::String(market_id.clone()));
                }
                push_entry(&mut grouped, group, with_id);
            }
        }
        other => {
            return Err(GroupingError::UnsupportedShape {
                found: json_type_name(other),
            })
        }
    }

    Ok(grouped)
}

/// Returns copies of `matches` with `grouped_markets` attached where a
/// `rapid_data.raw_odds_data.markets` source is present and non-empty.
///
/// The input is never modified. A record whose market source cannot be
/// grouped is logged and passed through ungrouped; the other records are
/// unaffected.
pub fn process_matches(matches: &[Value]) -> Vec<Value> {
    matches
        .iter()
        .map(|record| {
            let mut processed = record.clone();
            let Some(markets) = market_source(record) else {
                return processed;
            };

            match group_markets(markets) {
                Ok(grouped) => {
                    if let Value::Object(fields) = &mut processed {
                        fields.insert("grouped_markets".to_string(), Value::Object(grouped));
                    }
                }
                Err(e) => {
                    log::warn!(
                        "Leaving markets ungrouped for match {}: {}",
                        record.get("match_id").unwrap_or(&Value::Null),
                        e
                    );
                }
            }
            processed
        })
        .collect()
}

fn push_entry(grouped: &mut GroupedMarkets, group: &str, entry: Value) {
    if let Value::Array(entries) = grouped
        .entry(group)
        .or_insert_with(|| Value::Array(Vec::new()))
    {
        entries.push(entry);
    }
}

fn group_of(entry: &Value) -> Option<&str> {
    entry.as_object()?.get("group")?.as_str()
}

/// The nested market source, if present and non-empty.
fn market_source(record: &Value) -> Option<&Value> {
    let markets = record
        .get("rapid_data")?
        .get("raw_odds_data")?
        .get("markets")?;

    let empty = match markets {
        Value::Null => true,
        Value::Array(entries) => entries.is_empty(),
        Value::Object(entries) => entries.is_empty(),
        _ => false,
    };
    (!empty).then_some(markets)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn groups_array_entries_in_source_order() {
        let markets = json!([
            {"group": "Match Winner", "sel": "A"},
            {"group": "Set Betting", "sel": "2-0"},
            {"group": "Match Winner", "sel": "B"},
        ]);

        let grouped = group_markets(&markets).unwrap();

        assert_eq!(grouped.len(), 2);
        assert_eq!(
            grouped["Match Winner"],
            json!([
                {"group": "Match Winner", "sel": "A"},
                {"group": "Match Winner", "sel": "B"}
            ])
        );
        assert_eq!(grouped["Set Betting"], json!([{"group": "Set Betting", "sel": "2-0"}]));
    }

    #[test]
    fn skips_entries_without_group_or_not_objects() {
        let markets = json!([
            {"group": "Match Winner", "sel": "A"},
            {"nogroup": "x"},
            "garbage",
            42,
            null,
            {"group": 7, "sel": "numeric group"},
            {"group": "Match Winner", "sel": "B"},
        ]);

        let grouped = group_markets(&markets).unwrap();

        assert_eq!(grouped.len(), 1);
        let sels: Vec<_> = grouped["Match Winner"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["sel"].clone())
            .collect();
        assert_eq!(sels, vec![json!("A"), json!("B")]);
    }

    #[test]
    fn array_entries_do_not_gain_market_id() {
        let grouped = group_markets(&json!([{"group": "Totals", "line": 22.5}])).unwrap();
        assert!(grouped["Totals"][0].get("market_id").is_none());
    }

    #[test]
    fn keyed_entries_get_market_id_injected() {
        let markets = json!({
            "m-1": {"group": "Match Winner", "sel": "A"},
            "m-2": {"sel": "no group"},
            "m-3": {"group": "Match Winner", "sel": "B"},
        });

        let grouped = group_markets(&markets).unwrap();

        assert_eq!(
            grouped["Match Winner"],
            json!([
                {"group": "Match Winner", "sel": "A", "market_id": "m-1"},
                {"group": "Match Winner", "sel": "B", "market_id": "m-3"}
            ])
        );
    }

    #[test]
    fn keyed_entries_keep_upstream_order_not_key_order() {
        let markets: Value = serde_json::from_str(
            r#"{
                "z-9": {"group": "Match Winner", "sel": "first"},
                "a-1": {"group": "Match Winner", "sel": "second"}
            }"#,
        )
        .unwrap();

        let grouped = group_markets(&markets).unwrap();

        let ids: Vec<_> = grouped["Match Winner"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["market_id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["z-9", "a-1"]);
    }

    #[test]
    fn group_names_follow_first_appearance() {
        let input = vec![json!({
            "match_id": "m1",
            "rapid_data": {"raw_odds_data": {"markets": [
                {"group": "Set Betting", "sel": "2-0"},
                {"group": "Match Winner", "sel": "A"},
                {"group": "Set Betting", "sel": "2-1"}
            ]}}
        })];

        let out = process_matches(&input);

        let groups: Vec<_> = out[0]["grouped_markets"]
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        assert_eq!(groups, vec!["Set Betting", "Match Winner"]);
        assert_eq!(
            serde_json::to_string(&out[0]["grouped_markets"]).unwrap(),
            r#"{"Set Betting":[{"group":"Set Betting","sel":"2-0"},{"group":"Set Betting","sel":"2-1"}],"Match Winner":[{"group":"Match Winner","sel":"A"}]}"#
        );
    }

    #[test]
    fn scalar_market_source_is_rejected() {
        assert_eq!(
            group_markets(&json!("not markets")),
            Err(GroupingError::UnsupportedShape { found: "string" })
        );
    }

    #[test]
    fn process_attaches_grouped_markets_without_touching_input() {
        let input = vec![json!({
            "match_id": "m1",
            "rapid_data": {"raw_odds_data": {"markets": [
                {"group": "Match Winner", "sel": "A"},
                {"group": "Match Winner", "sel": "B"},
                {"nogroup": "x"}
            ]}}
        })];
        let before = input.clone();

        let out = process_matches(&input);

        assert_eq!(input, before);
        assert_eq!(
            out[0]["grouped_markets"],
            json!({"Match Winner": [
                {"group": "Match Winner", "sel": "A"},
                {"group": "Match Winner", "sel": "B"}
            ]})
        );
        assert_eq!(out[0]["rapid_data"], input[0]["rapid_data"]);
    }

    #[test]
    fn process_passes_through_records_without_market_source() {
        let input = vec![
            json!({"match_id": "a"}),
            json!({"match_id": "b", "rapid_data": null}),
            json!({"match_id": "c", "rapid_data": {"raw_odds_data": {"markets": []}}}),
            json!("not even an object"),
        ];

        assert_eq!(process_matches(&input), input);
    }

    #[test]
    fn one_bad_record_does_not_affect_the_others() {
        let input = vec![
            json!({"match_id": "bad", "rapid_data": {"raw_odds_data": {"markets": "oops"}}}),
            json!({"match_id": "good", "rapid_data": {"raw_odds_data": {"markets": [{"group": "G"}]}}}),
        ];

        let out = process_matches(&input);

        assert_eq!(out[0], input[0]);
        assert_eq!(out[1]["grouped_markets"], json!({"G": [{"group": "G"}]}));
    }
}
