use thiserror::Error;

/// Malformed registration input or an illegal registry lifecycle step.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("method name must not be empty")]
    EmptyMethod,

    #[error("target name must not be empty")]
    EmptyTarget,

    #[error("class member name must not be empty")]
    EmptyMember,

    #[error("malformed injection descriptor: {0}")]
    MalformedDescriptor(String),

    #[error("unknown injection kind '{0}'")]
    UnknownKind(String),

    #[error("unknown policy '{0}' (expected STRICT, ERROR, WARN or IGNORE)")]
    UnknownPolicy(String),

    #[error("unknown group '{0}'; register the group before its injectors")]
    UnknownGroup(String),

    #[error(
        "registry is frozen; cannot register {what} after weaving has started. \
         Register all groups and injectors before calling freeze()"
    )]
    Frozen { what: String },
}
