use serde_json::{json, Value};
use strum::{EnumIter, IntoEnumIterator, IntoStaticStr};

/// The fixed mood palette offered by the picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
pub enum Mood {
    Happy,
    Excited,
    Celebrate,
    Inspired,
    Thoughtful,
    Relaxed,
    Chill,
    Hungry,
    Sad,
    Crying,
    Angry,
    Melting,
    Tired,
    Sick,
    Working,
    Blessed,
}

impl Mood {
    pub fn all() -> Vec<Mood> {
        Mood::iter().collect()
    }

    pub fn label(self) -> &'static str {
        self.into()
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Mood::Happy => "😊",
            Mood::Excited => "🤩",
            Mood::Celebrate => "🥳",
            Mood::Inspired => "🌈",
            Mood::Thoughtful => "🤔",
            Mood::Relaxed => "🧘",
            Mood::Chill => "☕️",
            Mood::Hungry => "🍕",
            Mood::Sad => "😔",
            Mood::Crying => "😭",
            Mood::Angry => "😤",
            Mood::Melting => "🫠",
            Mood::Tired => "😴",
            Mood::Sick => "🤢",
            Mood::Working => "💼",
            Mood::Blessed => "😇",
        }
    }

    pub fn to_value(self) -> Value {
        json!({"emoji": self.emoji(), "label": self.label()})
    }

    /// Matches a stored mood object by label, then by emoji.
    pub fn from_value(value: &Value) -> Option<Mood> {
        let label = value.get("label").and_then(Value::as_str);
        let emoji = value.get("emoji").and_then(Value::as_str);
        Mood::iter()
            .find(|mood| label == Some(mood.label()))
            .or_else(|| Mood::iter().find(|mood| emoji == Some(mood.emoji())))
    }
}

/// Short text for a stored mood object, which may come from outside the palette.
pub fn describe_mood(value: &Value) -> Option<String> {
    let emoji = value.get("emoji").and_then(Value::as_str);
    let label = value.get("label").and_then(Value::as_str);
    match (emoji, label) {
        (Some(emoji), Some(label)) => Some(format!("{emoji} {label}")),
        (Some(only), None) | (None, Some(only)) => Some(only.to_string()),
        (None, None) => None,
    }
}
