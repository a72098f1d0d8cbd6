use std::borrow::Cow;

/// Source identifier - mostly static constants ("spatial", "agenda", "cinema")
pub type SourceId = Cow<'static, str>;

/// Administrative region code (French department: "75", "2A", "974")
pub type RegionCode = String;
