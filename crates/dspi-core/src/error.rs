use std::borrow::Cow;
use std::path::PathBuf;

use crate::NodeId;

#[derive(derive_more::Display, Debug)]
pub enum Error {
    #[display(fmt = "configuration '{}' not found", "_0.display()")]
    ConfigurationNotFound(PathBuf),
    #[display(fmt = "execution plan graph '{}' not found", "_0.display()")]
    GraphNotFound(PathBuf),
    #[display(fmt = "invalid configuration: {_0}")]
    InvalidConfiguration(Cow<'static, str>),
    #[display(fmt = "invalid node reference {_0}")]
    InvalidReference(NodeId),
    #[display(fmt = "invalid execution plan graph: {_0}")]
    InvalidGraph(Cow<'static, str>),
    #[display(fmt = "failed to serialize execution plan graph")]
    Serialization,
}

impl Error {
    pub fn invalid_configuration(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    pub fn invalid_graph(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidGraph(message.into())
    }
}

impl error_stack::Context for Error {}
