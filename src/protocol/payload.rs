use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

// The backend renders most numbers as JSON strings ("level": "0").
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(u64),
    Text(String),
}

pub fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => Ok(n),
        NumberOrText::Text(text) => text.trim().parse().map_err(de::Error::custom),
    }
}

pub fn lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let n = lenient_u64(deserializer)?;
    u32::try_from(n).map_err(de::Error::custom)
}

/// Like [`lenient_u64`], but `null` and `""` read as absent.
pub fn lenient_opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrText::Number(n)) => Ok(Some(n)),
        Some(NumberOrText::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(NumberOrText::Text(text)) => text.trim().parse().map(Some).map_err(de::Error::custom),
    }
}

pub fn lenient_opt_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    match lenient_opt_u64(deserializer)? {
        None => Ok(None),
        Some(n) => u32::try_from(n).map(Some).map_err(de::Error::custom),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListOrBlank<T> {
    List(Vec<T>),
    Blank(Option<String>),
}

/// A list that the backend reports as `""` or `null` when it has nothing.
pub fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    match ListOrBlank::<T>::deserialize(deserializer)? {
        ListOrBlank::List(items) => Ok(items),
        ListOrBlank::Blank(None) => Ok(Vec::new()),
        ListOrBlank::Blank(Some(text)) if text.trim().is_empty() => Ok(Vec::new()),
        ListOrBlank::Blank(Some(text)) => Err(de::Error::custom(format!(
            "expected a list, found text {:?}",
            text
        ))),
    }
}

/// One entry of a `-stack-list-variables` payload.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ListedVariable {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(rename = "type", default)]
    pub ty: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VariablesPayload {
    #[serde(default)]
    pub variables: Vec<ListedVariable>,
}

/// Payload of `-data-evaluate-expression`.
#[derive(Debug, Deserialize)]
pub struct ValuePayload {
    pub value: String,
}

/// Decode a typed view of a record payload; `None` when the shape does not match.
pub fn decode<T: DeserializeOwned>(payload: &Value) -> Option<T> {
    serde_json::from_value(payload.clone()).ok()
}

/// Pull the hex literal out of evaluated address text like `(int *) 0x7ffe3c`.
pub fn hex_literal(text: &str) -> Option<&str> {
    text.split(|c: char| c.is_whitespace() || c == '(' || c == ')' || c == '<' || c == '>')
        .find(|word| {
            word.len() > 2
                && (word.starts_with("0x") || word.starts_with("0X"))
                && word[2..].chars().all(|c| c.is_ascii_hexdigit())
        })
}

/// Parse a hex address string, with or without the `0x` prefix.
pub fn parse_address(text: &str) -> Option<u64> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u64::from_str_radix(digits, 16).ok()
}
