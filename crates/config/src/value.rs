//! Closed set of value and field types a Function's Settings/Inputs/Outputs
//! records may use, plus the parametric widgets (`Range`, `Slide`, `Enum`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Context, Error};

/// Name of a Settings/Inputs/Outputs field.
pub type FieldName = String;

/// The nine opaque vector tags the core passes between nodes without ever
/// inspecting their contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum VectorTag {
    Mat,
    MatBw,
    Contours,
    Circles,
    Segments,
    Point,
    Color,
    Corners,
    Pose3D,
}

impl VectorTag {
    /// The catalog discriminator string for this tag (`/api/funcs` format).
    #[must_use]
    pub fn type_name(self) -> &'static str {
        match self {
            VectorTag::Mat => "Mat",
            VectorTag::MatBw => "MatBW",
            VectorTag::Contours => "Contours",
            VectorTag::Circles => "Circles",
            VectorTag::Segments => "Segments",
            VectorTag::Point => "Point",
            VectorTag::Color => "Color",
            VectorTag::Corners => "Corners",
            VectorTag::Pose3D => "Pose3D",
        }
    }
}

/// An inclusive `[min, max]` pair, the value produced by a `RangeType` widget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

/// Declares the bounds and precision of a `Range`/`Slide` widget field.
///
/// Mirrors `opsi.manager.types.RangeType`/`Slide` from the source: both
/// widgets share validation logic, they differ only in whether `create`
/// yields a pair (`Range`) or a single coerced scalar (`Slide`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeWidget {
    pub min: f64,
    pub max: f64,
    pub decimal: bool,
}

impl RangeWidget {
    fn in_bounds(&self, v: f64) -> bool {
        v >= self.min && v <= self.max
    }

    /// Validates and coerces a caller-provided `(min, max)` pair against this
    /// widget's declared bounds, returning the `Range` to store on the node.
    pub fn create_range(&self, min: f64, max: f64, ctx: &Context) -> Result<Range, Error> {
        if min > max {
            return Err(Error::OutOfRange {
                context: ctx.clone(),
                message: format!("range min {min} is greater than max {max}"),
            });
        }
        if !self.in_bounds(min) || !self.in_bounds(max) {
            return Err(Error::OutOfRange {
                context: ctx.clone(),
                message: format!(
                    "range ({min}, {max}) is out of range [{}, {}]",
                    self.min, self.max
                ),
            });
        }
        Ok(Range { min, max })
    }

    /// Validates and coerces a caller-provided scalar against this widget's
    /// declared bounds, returning the clamp-free, range-checked scalar.
    pub fn create_slide(&self, value: f64, ctx: &Context) -> Result<f64, Error> {
        if !self.in_bounds(value) {
            return Err(Error::OutOfRange {
                context: ctx.clone(),
                message: format!(
                    "value {value} is out of range [{}, {}]",
                    self.min, self.max
                ),
            });
        }
        Ok(value)
    }

    /// The default value used when a settings field is omitted entirely and
    /// has no declared default: the widget's own minimum.
    #[must_use]
    pub fn default_range(&self) -> Range {
        Range {
            min: self.min,
            max: self.min,
        }
    }

    #[must_use]
    pub fn default_slide(&self) -> f64 {
        self.min
    }
}

/// Field type declaration. Schemas describe types as data (per the source's
/// `__init_subclass__` reflection being replaced with explicit values), not
/// as Rust generic parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ValueType {
    Int,
    Float,
    Bool,
    Str,
    /// Dynamic, unconstrained — accepts any `DynValue`.
    Any,
    Vector(VectorTag),
    Range(RangeWidget),
    Slide(RangeWidget),
    /// A finite enumeration expressed as a fixed sequence of string options.
    Enum(Vec<String>),
}

impl ValueType {
    /// The catalog discriminator string used by `/api/funcs` serialization.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Bool => "bool",
            ValueType::Str => "str",
            ValueType::Any => "Any",
            ValueType::Vector(tag) => tag.type_name(),
            ValueType::Range(_) => "Range",
            ValueType::Slide(_) => "Slide",
            ValueType::Enum(_) => "Enum",
        }
    }
}

/// A runtime value flowing through Settings/Inputs/Outputs records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DynValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Range(Range),
    Slide(f64),
    Enum(String),
    /// An `AnyType` field or an opaque vector value. The core never looks
    /// inside this; only module Functions interpret it.
    Any(Box<DynValue>),
}

impl DynValue {
    /// Returns whether this value's shape matches the declared field type.
    /// `AnyType` and vector-tagged fields accept anything (the core does not
    /// validate opaque payloads, only module code does).
    #[must_use]
    pub fn matches(&self, ty: &ValueType) -> bool {
        match (self, ty) {
            (DynValue::Int(_), ValueType::Int) => true,
            (DynValue::Float(_), ValueType::Float) => true,
            (DynValue::Float(_), ValueType::Int) => false,
            (DynValue::Bool(_), ValueType::Bool) => true,
            (DynValue::Str(_), ValueType::Str) => true,
            (DynValue::Range(_), ValueType::Range(_)) => true,
            (DynValue::Slide(_), ValueType::Slide(_)) => true,
            (DynValue::Enum(opt), ValueType::Enum(items)) => items.iter().any(|i| i == opt),
            (_, ValueType::Any) => true,
            (_, ValueType::Vector(_)) => true,
            _ => false,
        }
    }
}

/// One field of a Settings/Inputs/Outputs schema: a name, a type, and an
/// optional statically-declared default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: FieldName,
    pub value_type: ValueType,
    pub default: Option<DynValue>,
}

impl FieldSchema {
    #[must_use]
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            default: None,
        }
    }

    #[must_use]
    pub fn with_default(mut self, default: DynValue) -> Self {
        self.default = Some(default);
        self
    }
}

/// The full set of fields composing a Settings, Inputs, or Outputs record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<FieldSchema>,
}

impl Schema {
    #[must_use]
    pub fn new(fields: Vec<FieldSchema>) -> Self {
        Self { fields }
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// A record of named values: the concrete payload for a Settings, Inputs, or
/// Outputs instance.
pub type Record = BTreeMap<FieldName, DynValue>;
