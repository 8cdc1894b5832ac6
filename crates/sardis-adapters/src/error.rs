use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("adapter '{0}' is not registered")]
    UnknownAdapter(String),

    #[error("no route for org '{org}' rail '{rail}' currency '{currency}'")]
    NoRoute {
        org: String,
        rail: String,
        currency: String,
    },

    #[error("provider reference '{0}' not found")]
    UnknownReference(String),

    #[error("void not supported by adapter '{0}'")]
    VoidUnsupported(String),
}
