// Copyright (C) 2026 StarHuntingGames
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Mapping of raw top-list entries onto catalog records.
//!
//! The top lists are loosely typed JSON produced by another team, so the
//! coercions below mirror JavaScript's `Number(x)` and `String(x)` exactly
//! enough that records keep the values the catalog has always stored.

use serde_json::Value;

use crate::{GameDraft, GameFields, GameId};

/// One element of a top list. Each key keeps its raw JSON value; `None` means
/// the key was absent, which coerces differently from an explicit `null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalGameEntry {
    pub id: Option<Value>,
    pub app_id: Option<Value>,
    pub publisher_id: Option<Value>,
    pub publisher_name: Option<Value>,
    pub os: Option<Value>,
    pub version: Option<Value>,
}

impl ExternalGameEntry {
    /// Non-object values produce an entry with every key absent.
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };
        let field = |key: &str| object.get(key).cloned();

        Self {
            id: field("id"),
            app_id: field("appId"),
            publisher_id: field("publisher_id"),
            publisher_name: field("publisher_name"),
            os: field("os"),
            version: field("version"),
        }
    }
}

impl From<&Value> for ExternalGameEntry {
    fn from(value: &Value) -> Self {
        Self::from_value(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Neither `id` nor `appId` coerces to a non-zero number.
    NoNumericId,
    /// The selected id is fractional, infinite or outside the key range.
    NonIntegralId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportCandidate {
    /// Integral value of the entry's original `id`, if it has one.
    pub lookup_key: Option<GameId>,
    /// Key the record is written under, possibly taken from `appId`.
    pub id: GameId,
    pub fields: GameFields,
}

impl ImportCandidate {
    pub fn draft(&self) -> GameDraft {
        GameDraft::with_id(self.id, self.fields.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Candidate(ImportCandidate),
    Skip(SkipReason),
}

pub fn normalize(entry: &ExternalGameEntry) -> Normalized {
    let id_number = js_number(entry.id.as_ref());
    let app_id_number = js_number(entry.app_id.as_ref());

    // A falsy id always coerces to 0 or NaN, so this also covers missing ids.
    // An id of "0" lands here too and needs a usable appId to survive.
    if !is_truthy_number(id_number) && !is_truthy_number(app_id_number) {
        return Normalized::Skip(SkipReason::NoNumericId);
    }

    let trust_app_id = !is_truthy_number(id_number) && is_truthy_number(app_id_number);
    let selected = if trust_app_id {
        app_id_number
    } else {
        id_number
    };
    let Some(id) = integral_key(selected) else {
        return Normalized::Skip(SkipReason::NonIntegralId);
    };

    // storeId and bundleId have always been filled from publisher_id.
    let publisher_id = js_string(entry.publisher_id.as_ref());
    Normalized::Candidate(ImportCandidate {
        lookup_key: integral_key(id_number),
        id,
        fields: GameFields {
            store_id: publisher_id.clone(),
            bundle_id: publisher_id.clone(),
            publisher_id,
            name: js_string(entry.publisher_name.as_ref()),
            platform: js_string(entry.os.as_ref()),
            app_version: js_string(entry.version.as_ref()),
            is_published: true,
        },
    })
}

fn is_truthy_number(number: f64) -> bool {
    number != 0.0 && !number.is_nan()
}

fn integral_key(number: f64) -> Option<GameId> {
    let in_range = number >= i64::MIN as f64 && number < i64::MAX as f64;
    (number.is_finite() && number.fract() == 0.0 && in_range).then_some(number as GameId)
}

/// `Number(value)`; `None` stands for `undefined`.
pub fn js_number(value: Option<&Value>) -> f64 {
    match value {
        None => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(flag)) => f64::from(u8::from(*flag)),
        Some(Value::Number(number)) => number.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(text)) => parse_numeric_text(text),
        Some(array @ Value::Array(_)) => parse_numeric_text(&js_string(Some(array))),
        Some(Value::Object(_)) => f64::NAN,
    }
}

fn parse_numeric_text(raw: &str) -> f64 {
    let text = raw.trim();
    if text.is_empty() {
        return 0.0;
    }

    match text {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    for (prefixes, radix) in [(["0x", "0X"], 16), (["0o", "0O"], 8), (["0b", "0B"], 2)] {
        if let Some(digits) = prefixes.iter().find_map(|prefix| text.strip_prefix(prefix)) {
            return parse_radix_digits(digits, radix);
        }
    }

    // f64's parser also takes "inf" and "nan", which are not numeric literals here.
    let decimal_chars = text
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !decimal_chars {
        return f64::NAN;
    }
    text.parse::<f64>().unwrap_or(f64::NAN)
}

fn parse_radix_digits(digits: &str, radix: u32) -> f64 {
    if digits.is_empty() {
        return f64::NAN;
    }
    digits
        .chars()
        .try_fold(0.0_f64, |acc, c| {
            c.to_digit(radix)
                .map(|digit| acc * f64::from(radix) + f64::from(digit))
        })
        .unwrap_or(f64::NAN)
}

/// `String(value)`; `None` stands for `undefined`.
pub fn js_string(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        Some(Value::Number(number)) => {
            if let Some(int) = number.as_i64() {
                int.to_string()
            } else if let Some(uint) = number.as_u64() {
                uint.to_string()
            } else {
                format_js_float(number.as_f64().unwrap_or(f64::NAN))
            }
        }
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => js_string(Some(other)),
            })
            .collect::<Vec<_>>()
            .join(","),
        Some(Value::Object(_)) => "[object Object]".to_string(),
    }
}

fn format_js_float(number: f64) -> String {
    if number.is_nan() {
        "NaN".to_string()
    } else if number.is_infinite() {
        let sign = if number > 0.0 { "" } else { "-" };
        format!("{sign}Infinity")
    } else if number == 0.0 {
        "0".to_string()
    } else if number.fract() == 0.0 && number.abs() < 1e21 {
        format!("{number:.0}")
    } else {
        number.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candidate(value: Value) -> ImportCandidate {
        match normalize(&ExternalGameEntry::from_value(&value)) {
            Normalized::Candidate(candidate) => candidate,
            Normalized::Skip(reason) => panic!("entry {value} skipped: {reason:?}"),
        }
    }

    fn skip_reason(value: Value) -> SkipReason {
        match normalize(&ExternalGameEntry::from_value(&value)) {
            Normalized::Skip(reason) => reason,
            Normalized::Candidate(candidate) => {
                panic!("entry {value} unexpectedly produced {candidate:?}")
            }
        }
    }

    #[test]
    fn maps_top_list_entry_onto_game_fields() {
        let game = candidate(json!({
            "id": 42,
            "publisher_id": "p1",
            "publisher_name": "Game A",
            "os": "ios",
            "version": "1.0"
        }));

        assert_eq!(game.id, 42);
        assert_eq!(game.lookup_key, Some(42));
        assert_eq!(
            game.fields,
            GameFields {
                publisher_id: "p1".to_string(),
                name: "Game A".to_string(),
                platform: "ios".to_string(),
                store_id: "p1".to_string(),
                bundle_id: "p1".to_string(),
                app_version: "1.0".to_string(),
                is_published: true,
            }
        );
    }

    #[test]
    fn app_id_is_used_when_id_is_missing() {
        let game = candidate(json!({"appId": 7, "publisher_id": "p2", "os": "android"}));
        assert_eq!(game.id, 7);
        assert_eq!(game.lookup_key, None);
        assert_eq!(game.fields.platform, "android");
        assert_eq!(game.fields.name, "undefined");
        assert_eq!(game.fields.app_version, "undefined");
    }

    #[test]
    fn app_id_replaces_non_numeric_id() {
        let game = candidate(json!({"id": "com.example.game", "appId": "1234", "os": "ios"}));
        assert_eq!(game.id, 1234);
        assert_eq!(game.lookup_key, None);
    }

    #[test]
    fn numeric_id_wins_over_app_id() {
        let game = candidate(json!({"id": "15", "appId": 99}));
        assert_eq!(game.id, 15);
        assert_eq!(game.lookup_key, Some(15));
    }

    #[test]
    fn zero_string_id_falls_back_to_app_id_but_keeps_zero_lookup_key() {
        let game = candidate(json!({"id": "0", "appId": 9}));
        assert_eq!(game.id, 9);
        assert_eq!(game.lookup_key, Some(0));
    }

    #[test]
    fn entries_without_any_numeric_id_are_skipped() {
        assert_eq!(skip_reason(json!({"publisher_id": "p"})), SkipReason::NoNumericId);
        assert_eq!(skip_reason(json!({"id": null, "appId": "x"})), SkipReason::NoNumericId);
        assert_eq!(skip_reason(json!({"id": "abc"})), SkipReason::NoNumericId);
        assert_eq!(skip_reason(json!({"id": "0"})), SkipReason::NoNumericId);
        assert_eq!(skip_reason(json!({"id": 0, "appId": 0})), SkipReason::NoNumericId);
        assert_eq!(skip_reason(json!({"id": ""})), SkipReason::NoNumericId);
        assert_eq!(skip_reason(json!({"id": {}})), SkipReason::NoNumericId);
        assert_eq!(skip_reason(json!("not an object")), SkipReason::NoNumericId);
        assert_eq!(skip_reason(json!(null)), SkipReason::NoNumericId);
    }

    #[test]
    fn fractional_or_infinite_ids_are_skipped() {
        assert_eq!(skip_reason(json!({"id": 1.5})), SkipReason::NonIntegralId);
        assert_eq!(skip_reason(json!({"id": "Infinity"})), SkipReason::NonIntegralId);
        assert_eq!(skip_reason(json!({"id": "1e30"})), SkipReason::NonIntegralId);
    }

    #[test]
    fn number_coercion_follows_js_rules() {
        assert!(js_number(None).is_nan());
        assert_eq!(js_number(Some(&json!(null))), 0.0);
        assert_eq!(js_number(Some(&json!(true))), 1.0);
        assert_eq!(js_number(Some(&json!(" 12 "))), 12.0);
        assert_eq!(js_number(Some(&json!("0x10"))), 16.0);
        assert_eq!(js_number(Some(&json!("0b101"))), 5.0);
        assert_eq!(js_number(Some(&json!("1e3"))), 1000.0);
        assert_eq!(js_number(Some(&json!(".5"))), 0.5);
        assert_eq!(js_number(Some(&json!("   "))), 0.0);
        assert_eq!(js_number(Some(&json!([]))), 0.0);
        assert_eq!(js_number(Some(&json!(["8"]))), 8.0);
        assert!(js_number(Some(&json!([1, 2]))).is_nan());
        assert!(js_number(Some(&json!("inf"))).is_nan());
        assert!(js_number(Some(&json!("nan"))).is_nan());
        assert!(js_number(Some(&json!("12abc"))).is_nan());
        assert!(js_number(Some(&json!("0xZZ"))).is_nan());
        assert_eq!(js_number(Some(&json!("-Infinity"))), f64::NEG_INFINITY);
    }

    #[test]
    fn string_coercion_follows_js_rules() {
        assert_eq!(js_string(None), "undefined");
        assert_eq!(js_string(Some(&json!(null))), "null");
        assert_eq!(js_string(Some(&json!(2))), "2");
        assert_eq!(js_string(Some(&json!(2.0))), "2");
        assert_eq!(js_string(Some(&json!(1.5))), "1.5");
        assert_eq!(js_string(Some(&json!(false))), "false");
        assert_eq!(js_string(Some(&json!(["a", null, 3]))), "a,,3");
        assert_eq!(js_string(Some(&json!({"k": "v"}))), "[object Object]");
    }

    #[test]
    fn draft_carries_canonical_id() {
        let game = candidate(json!({"id": "abc", "appId": 5, "publisher_id": 77}));
        let draft = game.draft();
        assert_eq!(draft.id, Some(5));
        assert_eq!(draft.fields.publisher_id, "77");
        assert_eq!(draft.fields.store_id, "77");
        assert_eq!(draft.fields.bundle_id, "77");
    }
}
