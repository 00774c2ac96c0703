//! Response envelope wire format.
//!
//! A response body is a JSON array; every element is an object carrying a
//! string `type` plus type-specific fields:
//!
//! ```text
//! [{"type":"alert","message":"hi"},
//!  {"type":"element_update","element_id":"x","html":"<b>y</b>"}]
//! ```
//!
//! Types the dispatcher does not know are kept as [`ResponseItem::Other`] so
//! that listeners can interpret their own item kinds.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

use crate::{
    domain::{ElementId, HandlerKey},
    error::{EnvelopeError, InvalidItem},
};

pub const ALERT: &str = "alert";
pub const CALLBACK: &str = "callback";
pub const ELEMENT_REPLACE: &str = "element_replace";
pub const ELEMENT_UPDATE: &str = "element_update";
pub const FUNCTION_CALL: &str = "function_call";
pub const REDIRECT: &str = "redirect";
pub const RELOAD: &str = "reload";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawItem", into = "RawItem")]
pub enum ResponseItem {
    Alert {
        message: String,
    },
    Callback {
        key: HandlerKey,
        parameters: Vec<Value>,
    },
    ElementReplace {
        element_id: ElementId,
        html: String,
    },
    ElementUpdate {
        element_id: ElementId,
        html: String,
    },
    /// Legacy escape hatch. Only names on the dispatcher's allow-list are
    /// ever invoked.
    FunctionCall {
        function: String,
        scope: Value,
        parameters: Vec<Value>,
    },
    Redirect {
        url: String,
    },
    Reload,
    Other {
        item_type: String,
        fields: Map<String, Value>,
    },
}

impl ResponseItem {
    pub fn item_type(&self) -> &str {
        match self {
            Self::Alert { .. } => ALERT,
            Self::Callback { .. } => CALLBACK,
            Self::ElementReplace { .. } => ELEMENT_REPLACE,
            Self::ElementUpdate { .. } => ELEMENT_UPDATE,
            Self::FunctionCall { .. } => FUNCTION_CALL,
            Self::Redirect { .. } => REDIRECT,
            Self::Reload => RELOAD,
            Self::Other { item_type, .. } => item_type,
        }
    }

    pub fn alert(message: impl Into<String>) -> Self {
        Self::Alert {
            message: message.into(),
        }
    }

    pub fn callback(key: impl Into<String>, parameters: Vec<Value>) -> Self {
        Self::Callback {
            key: HandlerKey::new(key),
            parameters,
        }
    }

    pub fn other(item_type: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self::Other {
            item_type: item_type.into(),
            fields,
        }
    }

    /// Field lookup for [`ResponseItem::Other`] items; `None` for built-ins.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Other { fields, .. } => fields.get(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawItem {
    #[serde(rename = "type")]
    item_type: String,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

#[derive(Deserialize)]
struct AlertFields {
    message: String,
}

#[derive(Deserialize)]
struct CallbackFields {
    key: HandlerKey,
    #[serde(default, deserialize_with = "one_or_many")]
    parameters: Vec<Value>,
}

#[derive(Deserialize)]
struct ElementFields {
    element_id: ElementId,
    html: String,
}

#[derive(Deserialize)]
struct FunctionCallFields {
    #[serde(rename = "fn", alias = "function_name")]
    function: String,
    #[serde(default)]
    scope: Value,
    #[serde(default, deserialize_with = "one_or_many")]
    parameters: Vec<Value>,
}

#[derive(Deserialize)]
struct RedirectFields {
    url: String,
}

/// Accepts an array, a single value (wrapped), or `null` (empty).
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(values) => values,
        Value::Null => Vec::new(),
        other => vec![other],
    })
}

fn fields_as<T: serde::de::DeserializeOwned>(
    item_type: &str,
    fields: Map<String, Value>,
) -> Result<T, InvalidItem> {
    serde_json::from_value(Value::Object(fields)).map_err(|e| InvalidItem::new(item_type, e))
}

impl TryFrom<RawItem> for ResponseItem {
    type Error = InvalidItem;

    fn try_from(raw: RawItem) -> Result<Self, Self::Error> {
        let RawItem { item_type, fields } = raw;
        let item = match item_type.as_str() {
            ALERT => {
                let f: AlertFields = fields_as(&item_type, fields)?;
                Self::Alert { message: f.message }
            }
            CALLBACK => {
                let f: CallbackFields = fields_as(&item_type, fields)?;
                Self::Callback {
                    key: f.key,
                    parameters: f.parameters,
                }
            }
            ELEMENT_REPLACE => {
                let f: ElementFields = fields_as(&item_type, fields)?;
                Self::ElementReplace {
                    element_id: f.element_id,
                    html: f.html,
                }
            }
            ELEMENT_UPDATE => {
                let f: ElementFields = fields_as(&item_type, fields)?;
                Self::ElementUpdate {
                    element_id: f.element_id,
                    html: f.html,
                }
            }
            FUNCTION_CALL => {
                let f: FunctionCallFields = fields_as(&item_type, fields)?;
                Self::FunctionCall {
                    function: f.function,
                    scope: f.scope,
                    parameters: f.parameters,
                }
            }
            REDIRECT => {
                let f: RedirectFields = fields_as(&item_type, fields)?;
                Self::Redirect { url: f.url }
            }
            RELOAD => Self::Reload,
            _ => Self::Other { item_type, fields },
        };
        Ok(item)
    }
}

impl From<ResponseItem> for RawItem {
    fn from(item: ResponseItem) -> Self {
        let item_type = item.item_type().to_string();
        let fields = match item {
            ResponseItem::Alert { message } => json!({ "message": message }),
            ResponseItem::Callback { key, parameters } => {
                json!({ "key": key, "parameters": parameters })
            }
            ResponseItem::ElementReplace { element_id, html }
            | ResponseItem::ElementUpdate { element_id, html } => {
                json!({ "element_id": element_id, "html": html })
            }
            ResponseItem::FunctionCall {
                function,
                scope,
                parameters,
            } => json!({ "fn": function, "scope": scope, "parameters": parameters }),
            ResponseItem::Redirect { url } => json!({ "url": url }),
            ResponseItem::Reload => json!({}),
            ResponseItem::Other { fields, .. } => Value::Object(fields),
        };
        let fields = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { item_type, fields }
    }
}

/// The ordered list of items returned by one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Envelope(pub Vec<ResponseItem>);

impl Envelope {
    pub fn new(items: Vec<ResponseItem>) -> Self {
        Self(items)
    }

    /// Parses a body that must be a JSON array of items. Fails as a whole if
    /// any element is malformed.
    pub fn parse(body: &str) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_str(body)?)
    }

    /// Like [`Envelope::parse`], but an empty body or a JSON `null` yields
    /// `Ok(None)`: the transport-level "no response" signal.
    pub fn parse_optional(body: &str) -> Result<Option<Self>, EnvelopeError> {
        if body.trim().is_empty() {
            return Ok(None);
        }
        match serde_json::from_str::<Value>(body)? {
            Value::Null => Ok(None),
            value => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    pub fn items(&self) -> &[ResponseItem] {
        &self.0
    }

    pub fn into_items(self) -> Vec<ResponseItem> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<Vec<ResponseItem>> for Envelope {
    fn from(items: Vec<ResponseItem>) -> Self {
        Self(items)
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
