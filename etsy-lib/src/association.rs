//! Descriptors for including related resources in a response.
//!
//! An [`Association`] serializes into the textual form the API expects in the
//! `includes` parameter:
//!
//! ```text
//! name[(field1,field2,...)][:scope][:limit[:offset]][/child]
//! ```
//!
//! ```
//! use etsy_lib::{Association, Bounds};
//!
//! let images = Association::new("Images")
//!     .fields(["url_75x75", "url_fullxfull"])
//!     .bounds(Bounds::new(1));
//! let shop = Association::new("Shop").child(Association::new("User"));
//!
//! assert_eq!(images.to_string(), "Images(url_75x75,url_fullxfull):1");
//! assert_eq!(shop.to_string(), "Shop/User");
//! ```
use std::fmt;

/// Pagination bounds of an [`Association`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bounds {
    /// Maximum number of associated records
    pub limit: u32,
    /// Number of associated records to skip
    pub offset: Option<u32>,
}

impl Bounds {
    /// Bounds with a limit and no offset
    #[must_use]
    pub const fn new(limit: u32) -> Self {
        Self {
            limit,
            offset: None,
        }
    }

    /// Bounds with both limit and offset
    #[must_use]
    pub const fn with_offset(limit: u32, offset: u32) -> Self {
        Self {
            limit,
            offset: Some(offset),
        }
    }
}

/// A request to include a related sub-resource in a response.
///
/// Associations nest: each node exclusively owns an optional child, which is
/// serialized after a `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Association {
    /// Name of the associated resource, e.g. `Images`
    pub name: String,
    /// Restrict the associated resource to these fields
    pub fields: Option<Vec<String>>,
    /// Named scope, e.g. `active`
    pub scope: Option<String>,
    /// Pagination of the associated records
    pub bounds: Option<Bounds>,
    /// Nested association of the associated resource
    pub child: Option<Box<Association>>,
}

impl Association {
    /// Create an association without fields, scope, bounds or child
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: None,
            scope: None,
            bounds: None,
            child: None,
        }
    }

    /// Only return the given fields of the associated resource
    #[must_use]
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Apply a named scope
    #[must_use]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Apply pagination bounds
    #[must_use]
    pub const fn bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Nest another association below this one
    #[must_use]
    pub fn child(mut self, child: Association) -> Self {
        self.child = Some(Box::new(child));
        self
    }
}

impl fmt::Display for Association {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(fields) = &self.fields {
            write!(f, "({})", fields.join(","))?;
        }
        if let Some(scope) = &self.scope {
            write!(f, ":{scope}")?;
        }
        if let Some(bounds) = &self.bounds {
            write!(f, ":{}", bounds.limit)?;
            if let Some(offset) = bounds.offset {
                write!(f, ":{offset}")?;
            }
        }
        if let Some(child) = &self.child {
            write!(f, "/{child}")?;
        }
        Ok(())
    }
}
