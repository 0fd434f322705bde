use std::fmt;

/// Error types raised by the export pipeline itself.
///
/// Fetch and I/O failures travel as plain `anyhow` errors with context; these
/// variants cover the cases where the resource graph is inconsistent.
#[derive(Debug)]
pub enum ExportError {
    /// Two descriptors were registered for the same source entity
    DuplicateResource {
        resource_type: String,
        source_id: String,
    },

    /// References that pointed at entities that were never exported
    UnresolvedReferences(Vec<(String, String)>),

    /// A deferred renderer failed
    Render { file_name: String, message: String },

    /// Missing or contradictory configuration
    InvalidConfig(String),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::DuplicateResource {
                resource_type,
                source_id,
            } => {
                write!(
                    f,
                    "Resource {} with ID '{}' was already exported",
                    resource_type, source_id
                )
            }
            ExportError::UnresolvedReferences(references) => {
                write!(f, "{} unresolved reference(s):", references.len())?;

                for (resource_type, source_id) in references {
                    write!(f, " {}/{}", resource_type, source_id)?;
                }

                Ok(())
            }
            ExportError::Render { file_name, message } => {
                write!(f, "Failed to render {}: {}", file_name, message)
            }
            ExportError::InvalidConfig(msg) => {
                write!(f, "Invalid configuration: {}", msg)
            }
        }
    }
}

impl std::error::Error for ExportError {}
