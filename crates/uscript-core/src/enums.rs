//! Class-owned enumerations.

/// An enumeration declared inside a class.
///
/// Values are the tag's position, so at most 256 tags fit in the byte
/// representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDef {
    pub name: String,
    pub tags: Vec<String>,
}

impl EnumDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: Vec::new(),
        }
    }

    /// Value of a tag, matched case-insensitively.
    pub fn tag_value(&self, tag: &str) -> Option<u8> {
        self.tags
            .iter()
            .position(|t| t.eq_ignore_ascii_case(tag))
            .and_then(|i| u8::try_from(i).ok())
    }

    /// Tag spelling for a byte value.
    pub fn tag_name(&self, value: u8) -> Option<&str> {
        self.tags.get(value as usize).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_lookup_is_case_insensitive() {
        let mut e = EnumDef::new("EPhysics");
        e.tags = vec!["PHYS_None".into(), "PHYS_Walking".into()];
        assert_eq!(e.tag_value("phys_walking"), Some(1));
        assert_eq!(e.tag_value("PHYS_Flying"), None);
        assert_eq!(e.tag_name(0), Some("PHYS_None"));
        assert_eq!(e.tag_name(9), None);
    }
}
