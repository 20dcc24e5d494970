use serde::Serialize;

use crate::tree::XmlNode;

/// Error code management APIs use for "object not present".
pub const OBJECT_NOT_PRESENT_CODE: &str = "7";

/// A management API `<response>` envelope.
///
/// ```xml
/// <response status="success">
///   <result total-count="1" count="1"><entry name="lab">...</entry></result>
/// </response>
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    /// Value of the `status` attribute (`success`, `error`, ...).
    pub status: String,
    /// Value of the `code` attribute, when present.
    pub code: Option<String>,
    /// Message lines from `<msg>`, flattened.
    pub messages: Vec<String>,
    /// The `<result>` element, when present.
    #[serde(skip)]
    pub result: Option<XmlNode>,
}

impl ApiResponse {
    /// Interpret `node` as a response envelope. Returns `None` for any other root.
    pub fn from_node(node: &XmlNode) -> Option<Self> {
        if node.tag != "response" {
            return None;
        }
        Some(Self {
            status: node.attribute("status").unwrap_or_default().to_string(),
            code: node.attribute("code").map(ToString::to_string),
            messages: node.get_child("msg").map(message_lines).unwrap_or_default(),
            result: node.get_child("result").cloned(),
        })
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    /// True when the envelope reports that the requested object does not exist:
    /// either an error with the "object not present" code or a successful
    /// result holding zero records.
    pub fn is_object_missing(&self) -> bool {
        if !self.is_success() {
            return self.code.as_deref() == Some(OBJECT_NOT_PRESENT_CODE);
        }
        match &self.result {
            None => true,
            Some(result) => {
                result.attribute("count") == Some("0")
                    || result.attribute("total-count") == Some("0")
                    || result.is_empty()
            }
        }
    }

    /// The first element inside `<result>`, or the text placeholder the API
    /// returns in its place, wrapped in a text-only node.
    pub fn payload(&self) -> Option<&XmlNode> {
        let result = self.result.as_ref()?;
        match result.children.first() {
            Some(first) => Some(first),
            None if result.text.is_some() => Some(result),
            None => None,
        }
    }

    /// Messages joined for display.
    pub fn message(&self) -> String {
        self.messages.join("; ")
    }
}

fn message_lines(msg: &XmlNode) -> Vec<String> {
    let lines: Vec<String> = msg
        .get_children("line")
        .into_iter()
        .filter_map(|line| line.text.as_deref())
        .map(|text| text.trim().to_string())
        .collect();
    if !lines.is_empty() {
        return lines;
    }
    msg.text
        .as_deref()
        .map(|text| vec![text.trim().to_string()])
        .unwrap_or_default()
}
