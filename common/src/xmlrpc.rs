//! XML-RPC message encoding and decoding.
//!
//! Only the client half of the protocol is implemented: `methodCall`
//! documents are produced and `methodResponse` documents (params or fault)
//! are consumed. Replies are first read into a small element tree so the
//! value decoder can walk it recursively.

use std::collections::BTreeMap;

use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    Reader, Writer,
};
use thiserror::Error;

use crate::value::Value;

/// Errors raised while encoding or decoding XML-RPC documents
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    /// The document is not well-formed XML
    #[error("xml error: {0}")]
    Xml(String),

    /// Writing the request document failed
    #[error("failed to write request: {0}")]
    Write(String),

    /// The document is well-formed but not a valid XML-RPC message
    #[error("malformed message: {0}")]
    Malformed(String),

    /// A `<value>` carries a type this client does not understand
    #[error("unsupported value type <{0}>")]
    UnsupportedType(String),

    /// A scalar element holds text that cannot be parsed as its type
    #[error("invalid <{kind}> value {text:?}")]
    InvalidScalar {
        /// Element name of the scalar
        kind: String,
        /// Raw element text
        text: String,
    },
}

/// A decoded `methodResponse`
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResponse {
    /// The single value inside `<params>`
    Success(Value),
    /// A `<fault>` reply
    Fault {
        /// `faultCode` member
        code:    i64,
        /// `faultString` member
        message: String,
    },
}

/// Encodes a `methodCall` document for `method` with the given parameters
pub fn encode_call(method: &str, params: &[Value]) -> Result<Vec<u8>, CodecError> {
    let mut writer = Writer::new(Vec::new());

    write(&mut writer, Event::Decl(BytesDecl::new("1.0", None, None)))?;
    start(&mut writer, "methodCall")?;
    start(&mut writer, "methodName")?;
    write(&mut writer, Event::Text(BytesText::new(method)))?;
    end(&mut writer, "methodName")?;

    start(&mut writer, "params")?;
    for param in params {
        start(&mut writer, "param")?;
        write_value(&mut writer, param)?;
        end(&mut writer, "param")?;
    }
    end(&mut writer, "params")?;
    end(&mut writer, "methodCall")?;

    Ok(writer.into_inner())
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), CodecError> {
    writer
        .write_event(event)
        .map_err(|e| CodecError::Write(e.to_string()))
}

fn start(writer: &mut Writer<Vec<u8>>, name: &str) -> Result<(), CodecError> {
    write(writer, Event::Start(BytesStart::new(name)))
}

fn end(writer: &mut Writer<Vec<u8>>, name: &str) -> Result<(), CodecError> {
    write(writer, Event::End(BytesEnd::new(name)))
}

fn write_scalar(writer: &mut Writer<Vec<u8>>, kind: &str, text: &str) -> Result<(), CodecError> {
    start(writer, kind)?;
    write(writer, Event::Text(BytesText::new(text)))?;
    end(writer, kind)
}

fn write_value(writer: &mut Writer<Vec<u8>>, value: &Value) -> Result<(), CodecError> {
    start(writer, "value")?;
    match value {
        Value::Nil => write(writer, Event::Empty(BytesStart::new("nil")))?,
        Value::Bool(b) => write_scalar(writer, "boolean", if *b { "1" } else { "0" })?,
        Value::Int(i) => {
            // <int> is 32 bits wide, larger values need the i8 extension
            let kind = if i32::try_from(*i).is_ok() { "int" } else { "i8" };
            write_scalar(writer, kind, &i.to_string())?;
        }
        Value::Double(d) => write_scalar(writer, "double", &d.to_string())?,
        Value::String(s) => write_scalar(writer, "string", s)?,
        Value::Array(items) => {
            start(writer, "array")?;
            start(writer, "data")?;
            for item in items {
                write_value(writer, item)?;
            }
            end(writer, "data")?;
            end(writer, "array")?;
        }
        Value::Struct(members) => {
            start(writer, "struct")?;
            for (name, member) in members {
                start(writer, "member")?;
                write_scalar(writer, "name", name)?;
                write_value(writer, member)?;
                end(writer, "member")?;
            }
            end(writer, "struct")?;
        }
    }
    end(writer, "value")
}

/// Decodes a `methodResponse` document
pub fn decode_response(body: &[u8]) -> Result<MethodResponse, CodecError> {
    let text = std::str::from_utf8(body).map_err(|e| CodecError::Xml(e.to_string()))?;
    let root = parse_tree(text)?;

    if root.name != "methodResponse" {
        return Err(CodecError::Malformed(format!(
            "expected <methodResponse>, got <{}>",
            root.name
        )));
    }

    if let Some(fault) = root.child("fault") {
        let value = decode_value(fault.required("value")?)?;
        let code = value.get("faultCode").and_then(Value::as_i64).ok_or_else(|| {
            CodecError::Malformed("fault without integer faultCode".to_string())
        })?;
        let message = value
            .get("faultString")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Ok(MethodResponse::Fault { code, message });
    }

    let param = root.required("params")?.required("param")?;
    let value = decode_value(param.required("value")?)?;
    Ok(MethodResponse::Success(value))
}

#[derive(Debug)]
enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug)]
struct Element {
    name:     String,
    children: Vec<Node>,
}

impl Element {
    fn new(start: &BytesStart<'_>) -> Result<Self, CodecError> {
        // namespaced extensions such as <ex:nil/> are matched on their local name
        let name = std::str::from_utf8(start.local_name().as_ref())
            .map_err(|e| CodecError::Xml(e.to_string()))?
            .to_string();
        Ok(Self {
            name,
            children: Vec::new(),
        })
    }

    fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|element| element.name == name)
    }

    fn required(&self, name: &str) -> Result<&Element, CodecError> {
        self.child(name).ok_or_else(|| {
            CodecError::Malformed(format!("<{}> without <{}>", self.name, name))
        })
    }

    fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) => Some(text.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    fn push_text(&mut self, text: &str) {
        if let Some(Node::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(Node::Text(text.to_string()));
        }
    }
}

fn parse_tree(text: &str) -> Result<Element, CodecError> {
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| CodecError::Xml(e.to_string()))?;

        match event {
            Event::Start(start) => stack.push(Element::new(&start)?),
            Event::Empty(start) => {
                let element = Element::new(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| CodecError::Xml("unbalanced end tag".to_string()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(content) => {
                let content = content
                    .unescape()
                    .map_err(|e| CodecError::Xml(e.to_string()))?;
                match stack.last_mut() {
                    Some(parent) => parent.push_text(&content),
                    None if content.trim().is_empty() => {}
                    None => {
                        return Err(CodecError::Xml("text outside of root element".to_string()))
                    }
                }
            }
            Event::CData(content) => {
                let content =
                    std::str::from_utf8(&content).map_err(|e| CodecError::Xml(e.to_string()))?;
                if let Some(parent) = stack.last_mut() {
                    parent.push_text(content);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(CodecError::Xml("unexpected end of document".to_string()));
    }
    root.ok_or_else(|| CodecError::Xml("empty document".to_string()))
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), CodecError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(CodecError::Xml("multiple root elements".to_string())),
    }
}

fn decode_value(value: &Element) -> Result<Value, CodecError> {
    let mut typed = value.elements();
    let Some(inner) = typed.next() else {
        // untyped values are strings
        return Ok(Value::String(value.text()));
    };
    if typed.next().is_some() {
        return Err(CodecError::Malformed(
            "<value> with more than one child".to_string(),
        ));
    }

    match inner.name.as_str() {
        "i4" | "int" | "i8" => {
            let text = inner.text();
            text.trim()
                .parse()
                .map(Value::Int)
                .map_err(|_| invalid_scalar(inner, text))
        }
        "boolean" => match inner.text().trim() {
            "1" | "true" => Ok(Value::Bool(true)),
            "0" | "false" => Ok(Value::Bool(false)),
            other => Err(invalid_scalar(inner, other.to_string())),
        },
        "double" => {
            let text = inner.text();
            text.trim()
                .parse()
                .map(Value::Double)
                .map_err(|_| invalid_scalar(inner, text))
        }
        "string" => Ok(Value::String(inner.text())),
        "dateTime.iso8601" => Ok(Value::String(inner.text().trim().to_string())),
        "nil" => Ok(Value::Nil),
        "array" => {
            let data = inner.required("data")?;
            data.elements()
                .filter(|element| element.name == "value")
                .map(decode_value)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        "struct" => {
            let mut members = BTreeMap::new();
            for member in inner.elements().filter(|element| element.name == "member") {
                let name = member.required("name")?.text();
                let value = decode_value(member.required("value")?)?;
                members.insert(name, value);
            }
            Ok(Value::Struct(members))
        }
        other => Err(CodecError::UnsupportedType(other.to_string())),
    }
}

fn invalid_scalar(element: &Element, text: String) -> CodecError {
    CodecError::InvalidScalar {
        kind: element.name.clone(),
        text,
    }
}
