//! The unit handed from C4/C5/C7 to the sink submitter.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Joined,
    Orphaned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub id: String,
    pub kind: Kind,
}

impl Classification {
    pub fn joined(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: Kind::Joined,
        }
    }

    pub fn orphaned(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: Kind::Orphaned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_to_the_sink_wire_format() {
        let c = Classification::joined("abc");
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, r#"{"id":"abc","kind":"joined"}"#);
    }
}
