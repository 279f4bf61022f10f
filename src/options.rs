#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeOptions {
    /// Permit payloads to select their own concrete decode type through
    /// the process-wide registry. Off by default; allowlisted subtypes
    /// of the declared type resolve regardless of this flag.
    pub support_auto_type: bool,
    /// Retry failed field lookups with the case-insensitive hash.
    pub smart_match: bool,
    /// Accept an array payload and map positions to fields in
    /// declaration order.
    pub array_to_object: bool,
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_support_auto_type(mut self, support_auto_type: bool) -> Self {
        self.support_auto_type = support_auto_type;
        self
    }

    pub fn with_smart_match(mut self, smart_match: bool) -> Self {
        self.smart_match = smart_match;
        self
    }

    pub fn with_array_to_object(mut self, array_to_object: bool) -> Self {
        self.array_to_object = array_to_object;
        self
    }
}
