use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use secrecy::SecretString;
use serde_json::Value;

use crate::{Association, ErrorKind, Result};

/// A file to upload as one part of a multipart request body
#[derive(Clone, PartialEq, Eq)]
pub struct FileArg {
    /// The file name reported to the server
    pub filename: String,
    /// Raw file contents
    pub contents: Vec<u8>,
}

impl FileArg {
    /// Create a file argument from a name and in-memory contents
    #[must_use]
    pub fn new(filename: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            contents: contents.into(),
        }
    }

    /// Read a file from disk. The file name is the last path component.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Io`] if the file cannot be read.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read(path)
            .await
            .map_err(|e| ErrorKind::Io(path.to_path_buf(), e))?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { filename, contents })
    }
}

impl fmt::Debug for FileArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileArg")
            .field("filename", &self.filename)
            .field("len", &self.contents.len())
            .finish()
    }
}

/// A single argument value passed to an API method.
///
/// Values keep their type until the request is encoded, so an integer
/// argument stays an integer in the compiled [`ApiRequest`](crate::ApiRequest).
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// A string
    Str(String),
    /// An integer
    Int(i64),
    /// An unsigned integer too large for `i64`, or from `u64`/`usize`
    UInt(u64),
    /// A floating point number
    Float(f64),
    /// A boolean
    Bool(bool),
    /// A sequence, sent comma separated
    List(Vec<Arg>),
    /// A file upload
    File(FileArg),
}

impl Arg {
    /// Whether this is an empty sequence
    #[must_use]
    pub fn is_empty_list(&self) -> bool {
        matches!(self, Self::List(items) if items.is_empty())
    }

    /// Whether this value is a file upload
    #[must_use]
    pub const fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }

    /// Convert a default value from the method table.
    /// `null` has no argument representation.
    pub(crate) fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_u64().map(Self::UInt))
                .or_else(|| n.as_f64().map(Self::Float)),
            Value::String(s) => Some(Self::Str(s.clone())),
            Value::Array(items) => Some(Self::List(items.iter().filter_map(Self::from_json).collect())),
            Value::Object(_) => Some(Self::Str(value.to_string())),
        }
    }
}

/// The wire form of a value: lists are comma joined, booleans are
/// `true`/`false`, files show their file name.
impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::UInt(u) => write!(f, "{u}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Self::File(file) => f.write_str(&file.filename),
        }
    }
}

macro_rules! arg_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Arg {
            fn from(value: $t) -> Self {
                Self::Int(i64::from(value))
            }
        })*
    };
}

arg_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for Arg {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<usize> for Arg {
    fn from(value: usize) -> Self {
        // usize is at most 64 bits on every supported target
        Self::UInt(value as u64)
    }
}

impl From<f32> for Arg {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<FileArg> for Arg {
    fn from(value: FileArg) -> Self {
        Self::File(value)
    }
}

impl<T: Into<Arg>> From<Vec<T>> for Arg {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Arg>, const N: usize> From<[T; N]> for Arg {
    fn from(values: [T; N]) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// One entry of the `includes` option
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Include {
    /// A plain association name
    Name(String),
    /// A full association descriptor
    Association(Association),
}

impl fmt::Display for Include {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Association(association) => write!(f, "{association}"),
        }
    }
}

impl From<&str> for Include {
    fn from(value: &str) -> Self {
        Self::Name(value.to_string())
    }
}

impl From<String> for Include {
    fn from(value: String) -> Self {
        Self::Name(value)
    }
}

impl From<Association> for Include {
    fn from(value: Association) -> Self {
        Self::Association(value)
    }
}

/// The arguments of a single method call.
///
/// Besides the method's declared parameters, every call accepts the reserved
/// options `fields`, `includes` and `api_key`.
///
/// ```
/// use etsy_lib::{Args, Association};
///
/// let args = Args::new()
///     .arg("listing_id", vec![101, 102])
///     .arg("limit", 25)
///     .fields(["title", "price"])
///     .include("Shop")
///     .include(Association::new("Images").fields(["url_75x75"]));
/// assert_eq!(args.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Args {
    pub(crate) values: BTreeMap<String, Arg>,
    pub(crate) fields: Option<Vec<String>>,
    pub(crate) includes: Option<Vec<Include>>,
    pub(crate) api_key: Option<SecretString>,
}

impl Args {
    /// An empty argument set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a declared parameter, replacing any earlier value
    #[must_use]
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<Arg>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Set a declared parameter if `value` is `Some`
    #[must_use]
    pub fn opt_arg(self, name: impl Into<String>, value: Option<impl Into<Arg>>) -> Self {
        match value {
            Some(value) => self.arg(name, value),
            None => self,
        }
    }

    /// Restrict the fields returned for the primary resource
    #[must_use]
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Include a related resource in the response
    #[must_use]
    pub fn include(mut self, include: impl Into<Include>) -> Self {
        self.includes
            .get_or_insert_with(Vec::new)
            .push(include.into());
        self
    }

    /// Use a different API key for this call only
    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }

    /// Number of declared parameters set
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no declared parameter is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The value of a declared parameter
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arg> {
        self.values.get(name)
    }
}
