//! Schema model: messages, fields, services and the message database

use std::collections::BTreeMap;
use std::fmt;

use crate::{Error, Result};

/// Array shape of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
    /// `type[] name` - length-prefixed on the wire
    Dynamic,
    /// `type[N] name`
    Fixed(usize),
}

/// Value of a constant field
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Bool(bool),
    Integer(i128),
    Float(f64),
    String(String),
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::Bool(b) => write!(f, "{}", b),
            ConstantValue::Integer(i) => write!(f, "{}", i),
            // Debug keeps the decimal point on whole numbers (1.0, not 1)
            ConstantValue::Float(v) => write!(f, "{:?}", v),
            ConstantValue::String(s) => write!(f, "{}", s),
        }
    }
}

/// One typed member of a message
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Primitive name or message type reference, aliases already applied
    pub ty: String,
    pub name: String,
    pub array: Option<ArrayKind>,
    /// Constant fields are never instance members
    pub constant: Option<ConstantValue>,
    /// Comment lines attached to the field, joined with '\n'
    pub comment: String,
}

impl Field {
    pub fn new(ty: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            name: name.into(),
            array: None,
            constant: None,
            comment: String::new(),
        }
    }

    pub fn with_array(mut self, array: ArrayKind) -> Self {
        self.array = Some(array);
        self
    }

    pub fn with_constant(mut self, value: ConstantValue) -> Self {
        self.constant = Some(value);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn is_array(&self) -> bool {
        self.array.is_some()
    }

    pub fn is_constant(&self) -> bool {
        self.constant.is_some()
    }

    /// Length of a fixed-size array, `None` for scalars and dynamic arrays
    pub fn fixed_length(&self) -> Option<usize> {
        match self.array {
            Some(ArrayKind::Fixed(n)) => Some(n),
            _ => None,
        }
    }
}

/// Which half of a service a message is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ServiceRole {
    Request,
    Response,
}

impl ServiceRole {
    /// 0 for the request, 1 for the response
    pub fn index(self) -> usize {
        match self {
            ServiceRole::Request => 0,
            ServiceRole::Response => 1,
        }
    }
}

/// Link from a service message to its paired half
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceLink {
    /// Service name without the Request/Response suffix
    pub name: String,
    pub role: ServiceRole,
    /// Id of the sibling message
    pub sibling: String,
}

/// A named, package-scoped ordered list of fields
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub package: Vec<String>,
    pub name: String,
    /// Serialization order
    pub fields: Vec<Field>,
    pub service: Option<ServiceLink>,
}

impl Message {
    pub fn new(package: Vec<String>, name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            package,
            name: name.into(),
            fields,
            service: None,
        }
    }

    /// `pkg/.../Name`
    pub fn id(&self) -> String {
        join_id(&self.package, &self.name)
    }

    pub fn is_service(&self) -> bool {
        self.service.is_some()
    }

    /// Fields that become instance members (constants excluded)
    pub fn instance_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| !f.is_constant())
    }

    pub fn constant_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.is_constant())
    }
}

/// Join package segments and a name into a message id
pub fn join_id(package: &[String], name: &str) -> String {
    let mut id = package.join("/");
    if !id.is_empty() {
        id.push('/');
    }
    id.push_str(name);
    id
}

/// The request/response pair parsed from one service unit
#[derive(Debug, Clone, PartialEq)]
pub struct ServicePair {
    pub request: Message,
    pub response: Message,
}

impl ServicePair {
    /// Pair two field lists as `{name}Request` / `{name}Response`, cross-linked by id
    pub fn new(package: Vec<String>, name: &str, request: Vec<Field>, response: Vec<Field>) -> Self {
        let mut request = Message::new(package.clone(), format!("{}Request", name), request);
        let mut response = Message::new(package, format!("{}Response", name), response);

        request.service = Some(ServiceLink {
            name: name.to_string(),
            role: ServiceRole::Request,
            sibling: response.id(),
        });
        response.service = Some(ServiceLink {
            name: name.to_string(),
            role: ServiceRole::Response,
            sibling: request.id(),
        });

        Self { request, response }
    }

    pub fn into_messages(self) -> [Message; 2] {
        [self.request, self.response]
    }
}

/// Id-keyed lookup of every message parsed in a session
///
/// Append-only while loading; generators only read from it.
#[derive(Debug, Clone, Default)]
pub struct MessageDatabase {
    messages: BTreeMap<String, Message>,
}

impl MessageDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a message. A colliding id is dropped and `false` returned.
    pub fn insert(&mut self, message: Message) -> bool {
        let id = message.id();
        if self.messages.contains_key(&id) {
            tracing::warn!("Duplicate message {} dropped", id);
            return false;
        }
        self.messages.insert(id, message);
        true
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.messages.contains_key(id)
    }

    /// Resolve a field type as seen from `owner`: exact id first, then
    /// relative to the owner's package.
    pub fn resolve(&self, owner: &Message, ty: &str) -> Option<&Message> {
        self.messages
            .get(ty)
            .or_else(|| self.messages.get(&join_id(&owner.package, ty)))
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages in id order
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.messages.keys().map(String::as_str)
    }

    /// Look up a selection by id; every message when `ids` is empty
    pub fn select(&self, ids: &[String]) -> Result<Vec<&Message>> {
        if ids.is_empty() {
            return Ok(self.iter().collect());
        }
        ids.iter()
            .map(|id| self.get(id).ok_or_else(|| Error::UnknownMessage(id.clone())))
            .collect()
    }
}
