use std::fmt;

/// Errors raised by the physics wrapper when building bodies and fixtures.
#[derive(Debug, Clone, PartialEq)]
pub enum PhysicsError {
    /// Zero-area polygon, non-positive extent, or non-finite coordinates.
    DegenerateShape(String),
    /// The body handle no longer refers to a live body.
    UnknownBody,
}

impl fmt::Display for PhysicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DegenerateShape(reason) => write!(f, "degenerate shape: {reason}"),
            Self::UnknownBody => write!(f, "body no longer exists"),
        }
    }
}

impl std::error::Error for PhysicsError {}

/// Reasons a game object refuses to be constructed or created.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateError {
    UnknownKind(u16),
    DegenerateShape(String),
    ZeroLengthDrag,
    MissingProperty(String),
    InvalidProperty { name: String, reason: String },
    /// Placing one more would exceed the kind's instance limit.
    InstanceLimit { kind: u16, max: usize },
    Physics(PhysicsError),
}

impl fmt::Display for CreateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownKind(tag) => write!(f, "no object registered for kind {tag}"),
            Self::DegenerateShape(reason) => write!(f, "degenerate shape: {reason}"),
            Self::ZeroLengthDrag => write!(f, "drag start and end coincide"),
            Self::MissingProperty(name) => write!(f, "missing property `{name}`"),
            Self::InvalidProperty { name, reason } => {
                write!(f, "invalid property `{name}`: {reason}")
            },
            Self::InstanceLimit { kind, max } => {
                write!(f, "kind {kind} allows at most {max} instances")
            },
            Self::Physics(e) => write!(f, "physics: {e}"),
        }
    }
}

impl std::error::Error for CreateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Physics(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PhysicsError> for CreateError {
    fn from(e: PhysicsError) -> Self {
        match e {
            PhysicsError::DegenerateShape(reason) => Self::DegenerateShape(reason),
            other => Self::Physics(other),
        }
    }
}

/// Level load/save failures. Any of these aborts the whole load.
#[derive(Debug)]
pub enum LevelError {
    Parse(serde_json::Error),
    Encode(serde_json::Error),
    UnknownKind(String),
    InvalidData { kind: String, reason: String },
    TooManyInstances { kind: String, max: usize },
    Create { kind: String, source: CreateError },
}

impl fmt::Display for LevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "malformed level data: {e}"),
            Self::Encode(e) => write!(f, "failed to encode level: {e}"),
            Self::UnknownKind(kind) => write!(f, "unknown game object type `{kind}`"),
            Self::InvalidData { kind, reason } => write!(f, "invalid `{kind}` record: {reason}"),
            Self::TooManyInstances { kind, max } => {
                write!(f, "level holds more than {max} `{kind}` objects")
            },
            Self::Create { kind, source } => write!(f, "failed to create `{kind}`: {source}"),
        }
    }
}

impl std::error::Error for LevelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(e) | Self::Encode(e) => Some(e),
            Self::Create { source, .. } => Some(source),
            _ => None,
        }
    }
}
