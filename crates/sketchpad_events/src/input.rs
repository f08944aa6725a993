use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A response captured by the host before a run and handed to the interpreter.
///
/// Plain JSON maps onto the variants directly: `true`/`false` answer a confirmation, a
/// string answers a prompt, and an object is a UI interaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Confirm(bool),
    Prompt(String),
    Interaction(Interaction),
}

/// Something the user did to a surface, e.g. `{"classname": "canvas.mousedown", "event":
/// {"x": 3, "y": 4, "button": 0}}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub classname: String,
    #[serde(default)]
    pub event: Value,
}

impl Interaction {
    /// The interaction kind without its namespace (`"mousedown"` for `"canvas.mousedown"`).
    pub fn kind(&self) -> &str {
        self.classname
            .split_once('.')
            .map_or(self.classname.as_str(), |(_, kind)| kind)
    }
}
