use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{DeserializeFromStr, DisplayFromStr, SerializeDisplay, serde_as};

/// The declared type of a method parameter.
///
/// Parsed from the type descriptors found in the method table, e.g. `int`,
/// `array(string)` or `enum(foo, bar)`. Descriptors that are not recognized
/// are kept verbatim as [`ParamType::Unknown`] and passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, DeserializeFromStr, SerializeDisplay)]
pub enum ParamType {
    /// `string`
    String,
    /// `int`
    Int,
    /// `float`
    Float,
    /// `boolean`
    Boolean,
    /// `array(T)`, sent as a comma separated list
    Array(Box<ParamType>),
    /// `enum(v1, v2, ...)`
    Enum(Vec<String>),
    /// Any other descriptor
    Unknown(String),
}

impl ParamType {
    /// Whether values of this type are sent as a comma separated list
    #[must_use]
    pub const fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }
}

/// Strip `prefix(` and `)` from `descriptor`, returning what is inside
fn unwrap_call<'a>(descriptor: &'a str, prefix: &str) -> Option<&'a str> {
    descriptor
        .strip_prefix(prefix)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
}

impl FromStr for ParamType {
    type Err = Infallible;

    fn from_str(descriptor: &str) -> Result<Self, Self::Err> {
        let trimmed = descriptor.trim();
        let param_type = match trimmed {
            "string" => Self::String,
            "int" => Self::Int,
            "float" => Self::Float,
            "boolean" => Self::Boolean,
            _ => {
                if let Some(inner) = unwrap_call(trimmed, "array") {
                    Self::Array(Box::new(inner.parse()?))
                } else if let Some(values) = unwrap_call(trimmed, "enum") {
                    Self::Enum(
                        values
                            .split(',')
                            .map(str::trim)
                            .filter(|v| !v.is_empty())
                            .map(String::from)
                            .collect(),
                    )
                } else {
                    Self::Unknown(descriptor.to_string())
                }
            }
        };
        Ok(param_type)
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
            Self::Boolean => f.write_str("boolean"),
            Self::Array(inner) => write!(f, "array({inner})"),
            Self::Enum(values) => write!(f, "enum({})", values.join(", ")),
            Self::Unknown(raw) => f.write_str(raw),
        }
    }
}

/// Declarative description of one remote API operation, as served by the
/// method table.
///
/// ```json
/// {
///     "name": "createListing",
///     "uri": "/listings",
///     "visibility": "private",
///     "http_method": "POST",
///     "params": {"tags": "array(string)", "price": "float", "quantity": "int"},
///     "defaults": {"materials": null, "shop_section_id": null},
///     "type": "Listing",
///     "description": "Creates a new Listing"
/// }
/// ```
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodSpec {
    /// Name the method is looked up by
    pub name: String,
    /// URI template with `:name` placeholders for positional parameters
    pub uri: String,
    /// HTTP verb
    #[serde_as(as = "DisplayFromStr")]
    pub http_method: Method,
    /// Declared parameters and their types
    #[serde(default)]
    pub params: HashMap<String, ParamType>,
    /// Default values of parameters; `null` means "no default"
    #[serde(default, deserialize_with = "deserialize_defaults")]
    pub defaults: HashMap<String, Value>,
    /// `public` or `private`; private methods require OAuth
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    /// The resource type this method returns
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    /// Human readable description
    #[serde(default)]
    pub description: String,
}

/// The API serves an empty JSON array instead of an empty object when a
/// method has no defaults.
fn deserialize_defaults<'de, D>(deserializer: D) -> Result<HashMap<String, Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => Ok(map.into_iter().collect()),
        Value::Null => Ok(HashMap::new()),
        Value::Array(items) if items.is_empty() => Ok(HashMap::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected an object of defaults, got {other}"
        ))),
    }
}

impl MethodSpec {
    /// Whether the method is marked `private` and thus needs OAuth
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.visibility.as_deref() == Some("private")
    }

    /// The non-null default for `param`, if any
    #[must_use]
    pub fn default_for(&self, param: &str) -> Option<&Value> {
        self.defaults.get(param).filter(|v| !v.is_null())
    }
}
