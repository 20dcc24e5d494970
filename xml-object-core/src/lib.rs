//! XML parsing and writing primitives plus the loosely typed object model
//! (xmltodict-style) that firewall management APIs exchange.

pub mod object;
pub mod parser;
pub mod response;
pub mod tree;
pub mod writer;

pub use object::{from_object, from_object_element, to_object, ObjectError};
pub use parser::{parse, parse_file, parse_str, ParseError};
pub use response::ApiResponse;
pub use tree::XmlNode;
pub use writer::{write, write_file, WriteError};
