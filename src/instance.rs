use crate::error::{Error, ErrorKind, Result};

/// tenant context. every document and blob operation is namespaced by
/// the owning instance's domain; the engine never issues a store call
/// without it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    domain: String,
}

impl Instance {
    pub fn new<D>(domain: D) -> Result<Self>
    where
        D: Into<String>
    {
        let domain = domain.into();

        if domain.is_empty() || domain.contains('/') || domain.contains(char::is_whitespace) {
            return Err(Error::from((
                ErrorKind::IllegalFilename,
                "instance domain must be a non empty token without separators"
            )));
        }

        Ok(Instance { domain })
    }

    /// namespace prefix applied to every document and blob key
    pub fn namespace(&self) -> &str {
        &self.domain
    }
}

impl std::fmt::Display for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.domain)
    }
}
