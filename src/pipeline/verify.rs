//! Rumor verification: verdict vocabulary, overall merge, and note cleanup.

use crate::pipeline::json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const NOTE_MAX_CHARS: usize = 240;

/// Per-statement verdict. Anything the model invents maps to `Caution`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    True,
    False,
    Misleading,
    Caution,
}

impl Verdict {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "TRUE" => Verdict::True,
            "FALSE" => Verdict::False,
            "MISLEADING" => Verdict::Misleading,
            _ => Verdict::Caution,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Overall {
    Safe,
    False,
    Misleading,
    Caution,
    /// Nothing to evaluate
    Clear,
}

impl Overall {
    /// Recognised overall labels only; anything else is `None`
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "SAFE" => Some(Overall::Safe),
            "FALSE" => Some(Overall::False),
            "MISLEADING" => Some(Overall::Misleading),
            "CAUTION" => Some(Overall::Caution),
            "CLEAR" => Some(Overall::Clear),
            _ => None,
        }
    }

    pub fn merge(verdicts: &[Verdict]) -> Self {
        if verdicts.is_empty() {
            Overall::Clear
        } else if verdicts.contains(&Verdict::False) {
            Overall::False
        } else if verdicts.iter().all(|v| *v == Verdict::True) {
            Overall::Safe
        } else if verdicts.contains(&Verdict::Misleading) {
            Overall::Misleading
        } else {
            Overall::Caution
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementCheck {
    pub pattern: String,
    pub verdict: Verdict,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RumorVerdict {
    pub overall: Overall,
    pub matches: Vec<StatementCheck>,
}

impl RumorVerdict {
    pub fn clear() -> Self {
        Self {
            overall: Overall::Clear,
            matches: Vec::new(),
        }
    }

    /// Interpret model text. A recognised `overall` from the model is kept;
    /// a missing or unknown one is merged from the per-statement verdicts.
    pub fn parse(text: &str) -> Result<Self, String> {
        let object = json::parse_object(text)?;
        let entries = match object.get("matches") {
            Some(Value::Array(entries)) => entries.as_slice(),
            Some(_) => return Err("\"matches\" is not an array".to_string()),
            None => &[][..],
        };

        let matches: Vec<StatementCheck> = entries
            .iter()
            .map(|entry| StatementCheck {
                pattern: string_field(entry, "pattern"),
                verdict: Verdict::parse(&string_field(entry, "verdict")),
                note: clean_note(&string_field(entry, "note")),
            })
            .collect();

        let overall = object
            .get("overall")
            .and_then(Value::as_str)
            .and_then(Overall::parse)
            .unwrap_or_else(|| {
                let verdicts: Vec<Verdict> = matches.iter().map(|m| m.verdict).collect();
                Overall::merge(&verdicts)
            });

        Ok(Self { overall, matches })
    }
}

fn string_field(entry: &Value, key: &str) -> String {
    match entry.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Collapse whitespace, drop an echoed verdict prefix ("False: ..."), tame
/// all-caps text, and cap the length
pub fn clean_note(note: &str) -> String {
    let collapsed = note.split_whitespace().collect::<Vec<_>>().join(" ");
    let stripped = strip_verdict_prefix(&collapsed);

    let has_cased = stripped.chars().any(char::is_alphabetic);
    let shouting = has_cased && !stripped.chars().any(char::is_lowercase);
    let mut chars = stripped.chars();
    let mut cleaned = match chars.next() {
        Some(first) if shouting => {
            first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect()
        }
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };

    if cleaned.chars().count() > NOTE_MAX_CHARS {
        let truncated: String = cleaned.chars().take(NOTE_MAX_CHARS - 3).collect();
        cleaned = format!("{}…", truncated.trim_end());
    }
    cleaned
}

fn strip_verdict_prefix(note: &str) -> &str {
    for word in ["true", "false", "misleading", "caution"] {
        let Some(head) = note.get(..word.len()) else {
            continue;
        };
        if !head.eq_ignore_ascii_case(word) {
            continue;
        }
        let rest = note[word.len()..].trim_start();
        if let Some(after) = rest
            .strip_prefix('—')
            .or_else(|| rest.strip_prefix(['-', ':', '.']))
        {
            return after.trim_start();
        }
    }
    note
}
